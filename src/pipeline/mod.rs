// Pipeline module
// Ties matcher, classifier, arbiter and transport into the tick engine,
// with background training and an optional JSONL trace of training runs.

pub mod engine;
pub mod runner;
pub mod trace;

pub use engine::{Pipeline, PipelineError};
pub use runner::{RunnerError, TrainingOutcome, TrainingRunner};
pub use trace::{read_trace_file, TraceEntry, TraceError, TraceWriter};
