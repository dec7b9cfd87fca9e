// Classifier predictor
// Holds the single current trained model behind an atomically swapped
// reference; prediction reads one model reference per call, so retraining
// can hot-swap models without pausing tick processing.

use std::sync::{Arc, RwLock};

use crate::classifier::trainer::TrainedModel;
use crate::signal::{EegSample, EventKind};

/// Prediction result for one sample
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Argmax class
    pub event: EventKind,

    /// Probability mass of the argmax class, in [0, 1]
    pub confidence: f64,

    /// Full distribution over the model's known classes
    pub probabilities: Vec<(EventKind, f64)>,
}

/// Stateless predictor aside from the immutable current model
#[derive(Debug, Default)]
pub struct Predictor {
    model: RwLock<Option<Arc<TrainedModel>>>,
}

impl Predictor {
    pub fn new() -> Self {
        Predictor::default()
    }

    /// Atomically publish a newly trained model, replacing any previous one
    pub fn install(&self, model: TrainedModel) {
        log::info!(
            "Installing model {} (test_accuracy={:.3})",
            model.id,
            model.test_accuracy
        );
        let mut slot = self.model.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(model));
    }

    /// Remove the current model; prediction returns None afterwards
    pub fn clear(&self) {
        let mut slot = self.model.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    /// The currently installed model, if any
    pub fn current(&self) -> Option<Arc<TrainedModel>> {
        self.model
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.current().is_some()
    }

    /// Predict the event for a sample. None when no model is installed.
    pub fn predict(&self, sample: &EegSample) -> Option<Prediction> {
        let model = self.current()?;

        let proba = model.forest.predict_proba(&sample.features());
        let probabilities: Vec<(EventKind, f64)> = model
            .classes
            .iter()
            .copied()
            .zip(proba.iter().copied())
            .collect();

        let (event, confidence) = probabilities
            .iter()
            .copied()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        Some(Prediction {
            event,
            confidence,
            probabilities,
        })
    }
}
