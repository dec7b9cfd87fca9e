// Classifier trainer
// Checks data sufficiency, performs a deterministic stratified split,
// fits the forest and reports fit quality. Training never mutates its
// input; a failed fit leaves the previously installed model untouched.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::classifier::forest::RandomForest;
use crate::config::{ClassifierConfig, ConfigError};
use crate::history::HistoryStore;
use crate::signal::{EegSample, EventKind};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("insufficient training data: {0}")]
    InsufficientData(String),

    #[error("degenerate split: {0}")]
    DegenerateSplit(String),

    #[error("training sample has no event label")]
    Unlabelled,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// A fitted classifier plus its training metadata. Produced only by
/// [`train`]; read-only once published to the predictor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub id: Uuid,

    /// Classes the model knows, in wire-code order; probability vectors
    /// from the forest are indexed by position in this list
    pub classes: Vec<EventKind>,

    pub forest: RandomForest,

    /// Number of samples the fit used (train + test)
    pub n_samples: usize,

    /// Per-class sample counts over the full training set
    pub class_counts: Vec<(EventKind, usize)>,

    pub train_accuracy: f64,
    pub test_accuracy: f64,

    /// Algorithm tag, `"random_forest"` for this revision
    pub model_type: String,

    pub trained_at: DateTime<Utc>,
}

/// Check whether a model can be trained on the given samples.
///
/// Returns `(true, "ready to train")` only when at least two distinct
/// labels are present and every present label has at least
/// `min_samples_per_class` examples.
pub fn can_train(samples: &[EegSample], min_samples_per_class: usize) -> (bool, String) {
    if samples.is_empty() {
        return (false, "insufficient data".to_string());
    }

    let counts = present_class_counts(samples);
    if counts.len() < 2 {
        return (
            false,
            format!("need at least two event classes, found {}", counts.len()),
        );
    }

    for (kind, count) in &counts {
        if *count < min_samples_per_class {
            return (
                false,
                format!(
                    "not enough samples for '{}': {} < {}",
                    kind.as_str(),
                    count,
                    min_samples_per_class
                ),
            );
        }
    }

    (true, "ready to train".to_string())
}

/// Fit a model on the given samples.
///
/// Splits into train/test partitions stratified by class with a shuffle
/// seeded from `config.seed`, fits the forest on the train partition and
/// scores both partitions. Deterministic for a fixed seed and unchanged
/// input.
pub fn train(
    samples: &[EegSample],
    config: &ClassifierConfig,
) -> Result<TrainedModel, TrainingError> {
    config.validate()?;

    let (ready, reason) = can_train(samples, config.min_samples_per_class);
    if !ready {
        return Err(TrainingError::InsufficientData(reason));
    }

    let class_counts = present_class_counts(samples);
    let classes: Vec<EventKind> = class_counts.iter().map(|(k, _)| *k).collect();

    log::info!(
        "Training random forest on {} samples across {} classes",
        samples.len(),
        classes.len()
    );

    let class_index = |kind: EventKind| classes.iter().position(|c| *c == kind);

    // Stratified split: shuffle each class's row indices and peel off the
    // test share, keeping at least one training row per class
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut train_idx: Vec<usize> = Vec::new();
    let mut test_idx: Vec<usize> = Vec::new();

    for kind in &classes {
        let mut rows: Vec<usize> = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.event_name == Some(*kind))
            .map(|(i, _)| i)
            .collect();
        rows.shuffle(&mut rng);

        let wanted = (rows.len() as f64 * config.test_size).round() as usize;
        let n_test = wanted.min(rows.len().saturating_sub(1));

        test_idx.extend(rows.drain(..n_test));
        train_idx.extend(rows);
    }

    if test_idx.is_empty() {
        return Err(TrainingError::DegenerateSplit(
            "test partition is empty; not enough samples for the configured test_size"
                .to_string(),
        ));
    }

    let distinct_train: std::collections::HashSet<_> = train_idx
        .iter()
        .filter_map(|i| samples[*i].event_name)
        .collect();
    if distinct_train.len() < 2 {
        return Err(TrainingError::DegenerateSplit(
            "train partition collapsed to a single class".to_string(),
        ));
    }

    let to_rows = |indices: &[usize]| -> Result<(Vec<_>, Vec<usize>), TrainingError> {
        let mut rows = Vec::with_capacity(indices.len());
        let mut labels = Vec::with_capacity(indices.len());
        for i in indices {
            let sample = &samples[*i];
            let kind = sample.event_name.ok_or(TrainingError::Unlabelled)?;
            // Present classes were derived from these same samples
            let label = class_index(kind).ok_or(TrainingError::Unlabelled)?;
            rows.push(sample.features());
            labels.push(label);
        }
        Ok((rows, labels))
    };

    let (train_rows, train_labels) = to_rows(&train_idx)?;
    let (test_rows, test_labels) = to_rows(&test_idx)?;

    let forest = RandomForest::fit(
        &train_rows,
        &train_labels,
        classes.len(),
        config.n_trees,
        config.max_depth,
        config.seed,
    );

    let accuracy = |rows: &[[f64; crate::signal::FEATURE_COUNT]], labels: &[usize]| {
        let correct = rows
            .iter()
            .zip(labels)
            .filter(|(row, label)| forest.predict(row) == **label)
            .count();
        correct as f64 / labels.len() as f64
    };

    let train_accuracy = accuracy(&train_rows, &train_labels);
    let test_accuracy = accuracy(&test_rows, &test_labels);

    log::info!(
        "Training complete: train_accuracy={:.3} test_accuracy={:.3}",
        train_accuracy,
        test_accuracy
    );

    Ok(TrainedModel {
        id: Uuid::new_v4(),
        classes,
        forest,
        n_samples: samples.len(),
        class_counts,
        train_accuracy,
        test_accuracy,
        model_type: "random_forest".to_string(),
        trained_at: Utc::now(),
    })
}

/// Per-class counts over the labels actually present, in wire-code order
fn present_class_counts(samples: &[EegSample]) -> Vec<(EventKind, usize)> {
    EventKind::ALL
        .iter()
        .filter_map(|kind| {
            let count = samples
                .iter()
                .filter(|s| s.event_name == Some(*kind))
                .count();
            (count > 0).then_some((*kind, count))
        })
        .collect()
}

/// Stateful trainer front end: owns the classifier configuration and the
/// pending-sample buffer fed by transport commands.
#[derive(Debug)]
pub struct Trainer {
    config: ClassifierConfig,
    pending: Vec<EegSample>,
}

impl Trainer {
    pub fn new(config: ClassifierConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Trainer {
            config,
            pending: Vec::new(),
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Queue a labelled sample contributed specifically for training
    /// (transport command type 2)
    pub fn add_pending(&mut self, sample: EegSample) -> Result<(), TrainingError> {
        if sample.event_name.is_none() {
            return Err(TrainingError::Unlabelled);
        }
        log::debug!(
            "Queued training sample: event={}",
            sample.event_name.map_or("?", |e| e.as_str())
        );
        self.pending.push(sample);
        Ok(())
    }

    pub fn pending(&self) -> &[EegSample] {
        &self.pending
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// The exact rows a training run would use: the history snapshot plus
    /// the pending buffer
    pub fn training_set(&self, history: &HistoryStore) -> Vec<EegSample> {
        let mut set = history.samples().to_vec();
        set.extend(self.pending.iter().cloned());
        set
    }

    pub fn can_train(&self, history: &HistoryStore) -> (bool, String) {
        can_train(
            &self.training_set(history),
            self.config.min_samples_per_class,
        )
    }

    pub fn train(&self, history: &HistoryStore) -> Result<TrainedModel, TrainingError> {
        train(&self.training_set(history), &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(kind: EventKind, attention: i32) -> EegSample {
        EegSample::new(attention, 50, 0, [100; 8]).with_label(kind)
    }

    /// Two clearly separated classes, `n` samples each
    fn two_class_samples(n: usize) -> Vec<EegSample> {
        let mut samples = Vec::new();
        for i in 0..n {
            samples.push(labelled(EventKind::MoveLeft, 10 + (i as i32 % 5)));
            samples.push(labelled(EventKind::MoveRight, 80 + (i as i32 % 5)));
        }
        samples
    }

    #[test]
    fn test_can_train_empty_history() {
        let (ready, reason) = can_train(&[], 10);
        assert!(!ready);
        assert_eq!(reason, "insufficient data");
    }

    #[test]
    fn test_can_train_single_class() {
        let samples: Vec<_> = (0..20)
            .map(|i| labelled(EventKind::Stop, 50 + i))
            .collect();
        let (ready, reason) = can_train(&samples, 10);
        assert!(!ready);
        assert!(reason.contains("two event classes"));
    }

    #[test]
    fn test_can_train_undersampled_class() {
        let mut samples = two_class_samples(10);
        samples.push(labelled(EventKind::Stop, 50)); // one lone stop sample

        let (ready, reason) = can_train(&samples, 10);
        assert!(!ready);
        assert!(reason.contains("stop"), "reason was: {}", reason);
    }

    #[test]
    fn test_can_train_sufficient() {
        let samples = two_class_samples(10);
        let (ready, reason) = can_train(&samples, 10);
        assert!(ready, "{}", reason);
        assert_eq!(reason, "ready to train");
    }

    #[test]
    fn test_train_separable_data() {
        let samples = two_class_samples(20);
        let config = ClassifierConfig {
            n_trees: 25,
            ..ClassifierConfig::default()
        };

        let model = train(&samples, &config).unwrap();
        assert_eq!(model.n_samples, 40);
        assert_eq!(model.model_type, "random_forest");
        assert_eq!(
            model.classes,
            vec![EventKind::MoveLeft, EventKind::MoveRight]
        );
        assert!(model.train_accuracy > 0.9);
        assert!(model.test_accuracy > 0.9);
        assert!(model
            .class_counts
            .contains(&(EventKind::MoveLeft, 20)));
    }

    #[test]
    fn test_train_is_deterministic() {
        let samples = two_class_samples(15);
        let config = ClassifierConfig {
            n_trees: 10,
            ..ClassifierConfig::default()
        };

        let a = train(&samples, &config).unwrap();
        let b = train(&samples, &config).unwrap();

        assert_eq!(a.train_accuracy, b.train_accuracy);
        assert_eq!(a.test_accuracy, b.test_accuracy);
    }

    #[test]
    fn test_train_refuses_insufficient_data() {
        let samples = two_class_samples(3);
        let config = ClassifierConfig::default(); // min 10 per class

        let err = train(&samples, &config).unwrap_err();
        assert!(matches!(err, TrainingError::InsufficientData(_)));
    }

    #[test]
    fn test_train_does_not_mutate_input() {
        let samples = two_class_samples(12);
        let before: Vec<_> = samples.iter().map(|s| s.attention).collect();

        let _ = train(&samples, &ClassifierConfig::default()).unwrap();

        let after: Vec<_> = samples.iter().map(|s| s.attention).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_trainer_pending_buffer() {
        let mut trainer = Trainer::new(ClassifierConfig::default()).unwrap();
        let history = HistoryStore::new();

        trainer
            .add_pending(labelled(EventKind::MoveUp, 40))
            .unwrap();
        assert_eq!(trainer.pending().len(), 1);

        // Pending samples count towards the training set
        assert_eq!(trainer.training_set(&history).len(), 1);

        assert!(trainer.add_pending(EegSample::default()).is_err());
    }

    #[test]
    fn test_trainer_combines_history_and_pending() {
        let mut trainer = Trainer::new(ClassifierConfig {
            min_samples_per_class: 2,
            ..ClassifierConfig::default()
        })
        .unwrap();

        let mut history = HistoryStore::new();
        for i in 0..4 {
            history
                .append(labelled(EventKind::MoveLeft, 10 + i))
                .unwrap();
        }
        for i in 0..2 {
            trainer
                .add_pending(labelled(EventKind::MoveRight, 80 + i))
                .unwrap();
        }

        let (ready, reason) = trainer.can_train(&history);
        assert!(ready, "{}", reason);
        assert_eq!(trainer.training_set(&history).len(), 6);
    }
}
