// Decision arbitration between the rule-based and ML paths

pub mod arbiter;

pub use arbiter::{Decision, DecisionArbiter, DecisionMode, DecisionSource};
