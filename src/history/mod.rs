// Labelled sample history and the rule-based pattern matcher

pub mod matcher;
pub mod store;

pub use matcher::{match_event, MatchVote};
pub use store::{HistoryError, HistoryStore};
