// MindLink - EEG event decision pipeline
// Module declarations

pub mod classifier;
pub mod config;
pub mod decision;
pub mod history;
pub mod pipeline;
pub mod signal;
pub mod storage;
pub mod transport;

pub use classifier::{Prediction, Predictor, TrainedModel, Trainer, TrainingError};
pub use config::{ClassifierConfig, ConfigError, MatcherConfig, Tolerances};
pub use decision::{Decision, DecisionArbiter, DecisionMode, DecisionSource};
pub use history::{match_event, HistoryError, HistoryStore, MatchVote};
pub use pipeline::{Pipeline, PipelineError, TrainingRunner};
pub use signal::{EegSample, EventKind, FEATURE_COUNT, FEATURE_NAMES};
pub use storage::{StorageError, StorageResult};
pub use transport::{
    CommandType, SharedTransport, Snapshot, TransportClient, TransportCommand, TransportError,
};
