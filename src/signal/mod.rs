// Signal data model
// Feature samples produced by the acquisition layer and the event vocabulary

pub mod types;

pub use types::{EegSample, EventKind, FEATURE_COUNT, FEATURE_NAMES};
