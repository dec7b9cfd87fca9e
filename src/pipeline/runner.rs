// Background training runner
// Classifier fitting is the only operation with non-trivial wall-clock
// cost, so it runs on its own thread; the tick loop polls for the outcome
// and installs successful models. One run in flight at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use thiserror::Error;

use crate::classifier::trainer::{train, TrainedModel, TrainingError};
use crate::config::ClassifierConfig;
use crate::pipeline::trace::{TraceEntry, TraceWriter};
use crate::signal::EegSample;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("a training run is already in progress")]
    AlreadyTraining,
}

/// Result of a finished training run
#[derive(Debug)]
pub struct TrainingOutcome {
    pub result: Result<TrainedModel, TrainingError>,
    pub duration_ms: u128,
}

/// Off-tick training executor
pub struct TrainingRunner {
    outcome: Arc<Mutex<Option<TrainingOutcome>>>,
    in_progress: Arc<AtomicBool>,
    trace: Option<TraceWriter>,
}

impl TrainingRunner {
    pub fn new() -> Self {
        TrainingRunner {
            outcome: Arc::new(Mutex::new(None)),
            in_progress: Arc::new(AtomicBool::new(false)),
            trace: None,
        }
    }

    /// Attach a JSONL trace for run start/finish entries
    pub fn with_trace(mut self, trace: TraceWriter) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Kick off a training run on a snapshot of the training set.
    /// Refuses while a previous run is still in flight.
    pub fn request(
        &self,
        samples: Vec<EegSample>,
        config: ClassifierConfig,
    ) -> Result<(), RunnerError> {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            return Err(RunnerError::AlreadyTraining);
        }

        // A fresh run supersedes any uncollected outcome
        *self.outcome.lock().unwrap_or_else(|e| e.into_inner()) = None;

        let outcome = Arc::clone(&self.outcome);
        let in_progress = Arc::clone(&self.in_progress);
        let trace = self.trace.clone();

        if let Some(trace) = &trace {
            let entry = TraceEntry::with_data(
                "training",
                0.0,
                "training run started",
                serde_json::json!({ "n_samples": samples.len() }),
            );
            if let Err(e) = trace.write(&entry) {
                log::warn!("Failed to write trace entry: {}", e);
            }
        }

        thread::spawn(move || {
            let started = std::time::Instant::now();
            let result = train(&samples, &config);
            let duration_ms = started.elapsed().as_millis();

            if let Some(trace) = &trace {
                let entry = match &result {
                    Ok(model) => TraceEntry::with_data(
                        "training",
                        1.0,
                        "training run completed",
                        serde_json::json!({
                            "train_accuracy": model.train_accuracy,
                            "test_accuracy": model.test_accuracy,
                            "duration_ms": duration_ms as u64,
                        }),
                    ),
                    Err(e) => TraceEntry::new("training", 1.0, format!("training failed: {}", e)),
                };
                if let Err(e) = trace.write(&entry) {
                    log::warn!("Failed to write trace entry: {}", e);
                }
            }

            match &result {
                Ok(model) => log::info!(
                    "Background training finished in {} ms (test_accuracy={:.3})",
                    duration_ms,
                    model.test_accuracy
                ),
                Err(e) => log::warn!("Background training failed: {}", e),
            }

            *outcome.lock().unwrap_or_else(|e| e.into_inner()) =
                Some(TrainingOutcome { result, duration_ms });
            in_progress.store(false, Ordering::SeqCst);
        });

        Ok(())
    }

    /// Collect the finished outcome, if any. Returns each outcome once.
    pub fn poll(&self) -> Option<TrainingOutcome> {
        self.outcome
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    pub fn is_training(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }
}

impl Default for TrainingRunner {
    fn default() -> Self {
        Self::new()
    }
}
