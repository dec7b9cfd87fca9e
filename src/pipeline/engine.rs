// Tick engine
// Owns every pipeline component and runs the per-sample sequence:
// match/predict -> arbitrate -> publish -> drain commands. Training is
// handed to the background runner and its result installed on a later
// tick; nothing on the tick path blocks.

use thiserror::Error;

use crate::classifier::{Predictor, Trainer};
use crate::config::{ClassifierConfig, ConfigError, MatcherConfig};
use crate::decision::{Decision, DecisionArbiter, DecisionMode, DecisionSource};
use crate::history::{match_event, HistoryError, HistoryStore};
use crate::pipeline::runner::{RunnerError, TrainingRunner};
use crate::pipeline::trace::TraceWriter;
use crate::signal::{EegSample, EventKind};
use crate::transport::{CommandType, SharedTransport, TransportCommand, TransportError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    History(#[from] HistoryError),
}

/// The event decision pipeline.
///
/// One instance per acquisition stream. All methods run on the tick
/// thread; the only other thread is the training runner's, which never
/// touches pipeline state directly.
pub struct Pipeline {
    history: HistoryStore,
    matcher_config: MatcherConfig,
    trainer: Trainer,
    predictor: Predictor,
    arbiter: DecisionArbiter,
    runner: TrainingRunner,
    transport: Option<SharedTransport>,
    last_sample: Option<EegSample>,
}

impl Pipeline {
    pub fn new(
        matcher_config: MatcherConfig,
        classifier_config: ClassifierConfig,
    ) -> Result<Self, PipelineError> {
        matcher_config.validate()?;
        let confidence_threshold = classifier_config.confidence_threshold;
        let trainer = Trainer::new(classifier_config)?;

        Ok(Pipeline {
            history: HistoryStore::new(),
            matcher_config,
            trainer,
            predictor: Predictor::new(),
            arbiter: DecisionArbiter::new(DecisionMode::RuleOnly, confidence_threshold),
            runner: TrainingRunner::new(),
            transport: None,
            last_sample: None,
        })
    }

    /// Attach a JSONL trace to the training runner
    pub fn with_trace(mut self, trace: TraceWriter) -> Self {
        self.runner = TrainingRunner::new().with_trace(trace);
        self
    }

    /// Process one tick. `None` is an acquisition gap: the arbiter emits
    /// the empty decision, nothing is published, but the command mailbox
    /// is still drained so consumers are not starved.
    pub fn tick(&mut self, sample: Option<EegSample>) -> Decision {
        self.collect_training_outcome();

        let decision = match sample {
            None => Decision::none(),
            Some(sample) => {
                let rule = match_event(self.history.samples(), &sample, &self.matcher_config);

                // Predictor consulted only on the ML path
                let ml = if self.arbiter.mode() == DecisionMode::MlWithFallback {
                    self.predictor.predict(&sample)
                } else {
                    None
                };

                let decision = self.arbiter.decide(rule, ml);

                if let Some(transport) = &self.transport {
                    transport.publish(&sample, &decision);
                }
                self.last_sample = Some(sample);
                decision
            }
        };

        while let Some(command) = self.transport.as_ref().and_then(|t| t.drain()) {
            self.route_command(command);
        }

        decision
    }

    /// Tick with a sample the operator has already labelled: the label is
    /// the resolved event, and the sample joins the history for future
    /// matching.
    pub fn observe_labelled(&mut self, sample: EegSample, label: EventKind) -> Decision {
        let labelled = sample.with_label(label);

        let decision = Decision {
            event: Some(label),
            source: DecisionSource::Rule,
            confidence: 1.0,
            probabilities: None,
        };

        if let Some(transport) = &self.transport {
            transport.publish(&labelled, &decision);
        }

        // append cannot fail: the label was just set
        let _ = self.history.append(labelled.clone());
        self.last_sample = Some(labelled);

        while let Some(command) = self.transport.as_ref().and_then(|t| t.drain()) {
            self.route_command(command);
        }

        decision
    }

    /// Apply a drained mailbox command. Commands arriving before any
    /// sample has been observed, or without an event label, have nothing
    /// to record and are dropped with a warning.
    fn route_command(&mut self, command: TransportCommand) {
        let Some(last) = self.last_sample.clone() else {
            log::warn!("Command dropped: no sample observed yet");
            return;
        };
        let Some(event) = command.event else {
            log::warn!("Command dropped: no event label");
            return;
        };

        let labelled = last.with_label(event);
        match command.command_type {
            CommandType::SaveEvent => {
                if let Err(e) = self.history.append(labelled) {
                    log::warn!("Failed to append command sample: {}", e);
                } else {
                    log::debug!("Command appended '{}' to history", event.as_str());
                }
            }
            CommandType::SaveTraining => {
                if let Err(e) = self.trainer.add_pending(labelled) {
                    log::warn!("Failed to queue training sample: {}", e);
                }
            }
        }
    }

    /// Install a finished background model; a failed run leaves the
    /// current model active.
    fn collect_training_outcome(&mut self) {
        if let Some(outcome) = self.runner.poll() {
            match outcome.result {
                Ok(model) => self.predictor.install(model),
                Err(e) => log::warn!("Training run failed, keeping current model: {}", e),
            }
        }
    }

    /// Start a background training run over the current training set
    /// (history snapshot plus pending samples)
    pub fn request_training(&mut self) -> Result<(), PipelineError> {
        let samples = self.trainer.training_set(&self.history);
        self.runner
            .request(samples, self.trainer.config().clone())?;
        Ok(())
    }

    pub fn is_training(&self) -> bool {
        self.runner.is_training()
    }

    pub fn can_train(&self) -> (bool, String) {
        self.trainer.can_train(&self.history)
    }

    /// Create the shared memory segment and start publishing. An already
    /// enabled transport is torn down first.
    pub fn enable_transport(&mut self, name: &str) -> Result<(), PipelineError> {
        self.transport = Some(SharedTransport::create(name)?);
        Ok(())
    }

    /// Tear down the segment; pending unread commands are discarded
    pub fn disable_transport(&mut self) {
        self.transport = None;
    }

    pub fn transport_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Forward head-tracker gyro readings to the transport, if enabled
    pub fn update_gyro(&self, x: i32, y: i32, z: i32) {
        if let Some(transport) = &self.transport {
            transport.set_gyro(x, y, z);
        }
    }

    pub fn mode(&self) -> DecisionMode {
        self.arbiter.mode()
    }

    /// Switch decision mode; effective from the next tick
    pub fn set_mode(&mut self, mode: DecisionMode) {
        self.arbiter.set_mode(mode);
    }

    /// Replace the matcher tolerances wholesale between passes
    pub fn set_matcher_config(&mut self, config: MatcherConfig) -> Result<(), PipelineError> {
        config.validate()?;
        self.matcher_config = config;
        Ok(())
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Append a labelled sample directly (host application path)
    pub fn append_history(&mut self, sample: EegSample) -> Result<(), PipelineError> {
        self.history.append(sample)?;
        Ok(())
    }

    /// Atomically replace the history (load-from-file path)
    pub fn load_history(&mut self, samples: Vec<EegSample>) -> Result<(), PipelineError> {
        self.history.replace_all(samples)?;
        Ok(())
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    /// Install a model loaded from disk (startup path)
    pub fn install_model(&self, model: crate::classifier::TrainedModel) {
        self.predictor.install(model);
    }

    pub fn trainer(&self) -> &Trainer {
        &self.trainer
    }
}
