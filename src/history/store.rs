// History store
// Append-only ordered log of labelled samples; source of truth for both
// the pattern matcher and the classifier trainer

use thiserror::Error;

use crate::signal::{EegSample, EventKind};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("sample has no event label")]
    Unlabelled,
}

/// Ordered, insertion-order-significant sequence of labelled samples.
///
/// Append-only during normal operation; `clear` and `replace_all` are the
/// only whole-sequence mutations and both are atomic. Owned exclusively by
/// the pipeline; external processes request appends through the transport
/// mailbox, never by direct access.
#[derive(Debug, Default)]
pub struct HistoryStore {
    samples: Vec<EegSample>,
}

impl HistoryStore {
    pub fn new() -> Self {
        HistoryStore::default()
    }

    /// Append a labelled sample. Unlabelled samples are rejected so every
    /// stored element is usable by the matcher and the trainer.
    pub fn append(&mut self, sample: EegSample) -> Result<(), HistoryError> {
        if sample.event_name.is_none() {
            return Err(HistoryError::Unlabelled);
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All stored samples, oldest first
    pub fn samples(&self) -> &[EegSample] {
        &self.samples
    }

    /// Drop every stored sample
    pub fn clear(&mut self) {
        self.samples.clear();
        log::info!("History cleared");
    }

    /// Replace the whole sequence at once (load path). If any incoming
    /// sample is unlabelled the store is left untouched.
    pub fn replace_all(&mut self, samples: Vec<EegSample>) -> Result<(), HistoryError> {
        if samples.iter().any(|s| s.event_name.is_none()) {
            return Err(HistoryError::Unlabelled);
        }
        let count = samples.len();
        self.samples = samples;
        log::info!("History replaced with {} records", count);
        Ok(())
    }

    /// Number of stored samples per event kind, in wire-code order.
    /// Kinds with zero samples are included.
    pub fn class_counts(&self) -> Vec<(EventKind, usize)> {
        EventKind::ALL
            .iter()
            .map(|kind| {
                let count = self
                    .samples
                    .iter()
                    .filter(|s| s.event_name == Some(*kind))
                    .count();
                (*kind, count)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(kind: EventKind) -> EegSample {
        EegSample::new(50, 50, 0, [100; 8]).with_label(kind)
    }

    #[test]
    fn test_append_labelled() {
        let mut store = HistoryStore::new();
        store.append(labelled(EventKind::MoveLeft)).unwrap();

        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_append_unlabelled_rejected() {
        let mut store = HistoryStore::new();
        let result = store.append(EegSample::default());

        assert!(matches!(result, Err(HistoryError::Unlabelled)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut store = HistoryStore::new();
        store.append(labelled(EventKind::MoveLeft)).unwrap();
        store.append(labelled(EventKind::Stop)).unwrap();

        let labels: Vec<_> = store.samples().iter().map(|s| s.event_name).collect();
        assert_eq!(
            labels,
            vec![Some(EventKind::MoveLeft), Some(EventKind::Stop)]
        );
    }

    #[test]
    fn test_replace_all_atomic_on_failure() {
        let mut store = HistoryStore::new();
        store.append(labelled(EventKind::Stop)).unwrap();

        // One unlabelled sample poisons the whole batch
        let batch = vec![labelled(EventKind::MoveUp), EegSample::default()];
        assert!(store.replace_all(batch).is_err());

        // Original content untouched
        assert_eq!(store.len(), 1);
        assert_eq!(store.samples()[0].event_name, Some(EventKind::Stop));
    }

    #[test]
    fn test_class_counts() {
        let mut store = HistoryStore::new();
        store.append(labelled(EventKind::MoveLeft)).unwrap();
        store.append(labelled(EventKind::MoveLeft)).unwrap();
        store.append(labelled(EventKind::Stop)).unwrap();

        let counts = store.class_counts();
        assert!(counts.contains(&(EventKind::MoveLeft, 2)));
        assert!(counts.contains(&(EventKind::Stop, 1)));
        assert!(counts.contains(&(EventKind::MoveRight, 0)));
    }

    #[test]
    fn test_clear() {
        let mut store = HistoryStore::new();
        store.append(labelled(EventKind::MoveDown)).unwrap();
        store.clear();
        assert!(store.is_empty());
    }
}
