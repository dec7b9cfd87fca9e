// Decision arbiter
// Combines the matcher vote and the classifier prediction into one
// resolved decision per tick, with a confidence-threshold fallback policy

use serde::{Deserialize, Serialize};

use crate::classifier::Prediction;
use crate::history::MatchVote;
use crate::signal::EventKind;

/// Which decision path is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionMode {
    /// Only the pattern matcher is consulted
    RuleOnly,

    /// Prefer the classifier when it is confident, fall back to the matcher
    MlWithFallback,
}

/// Which component produced a resolved decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionSource {
    #[serde(rename = "rule")]
    Rule,

    #[serde(rename = "ml")]
    Ml,

    #[serde(rename = "none")]
    None,
}

/// One resolved decision per tick
#[derive(Debug, Clone)]
pub struct Decision {
    pub event: Option<EventKind>,
    pub source: DecisionSource,

    /// 1.0 for rule-based votes, the argmax probability for ML decisions,
    /// 0.0 when nothing fired
    pub confidence: f64,

    /// Full class distribution; ML path only
    pub probabilities: Option<Vec<(EventKind, f64)>>,
}

impl Decision {
    /// The empty decision: no event, no source. Also emitted on an
    /// acquisition gap.
    pub fn none() -> Self {
        Decision {
            event: None,
            source: DecisionSource::None,
            confidence: 0.0,
            probabilities: None,
        }
    }
}

/// Mode-switchable arbiter; a mode change takes effect on the next call
#[derive(Debug)]
pub struct DecisionArbiter {
    mode: DecisionMode,
    confidence_threshold: f64,
}

impl DecisionArbiter {
    pub fn new(mode: DecisionMode, confidence_threshold: f64) -> Self {
        DecisionArbiter {
            mode,
            confidence_threshold,
        }
    }

    pub fn mode(&self) -> DecisionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DecisionMode) {
        if mode != self.mode {
            log::info!("Decision mode changed to {:?}", mode);
        }
        self.mode = mode;
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn set_confidence_threshold(&mut self, threshold: f64) {
        self.confidence_threshold = threshold;
    }

    /// Resolve one tick. In `MlWithFallback` a sufficiently confident
    /// prediction wins; otherwise the rule vote, if any; otherwise none.
    /// In `RuleOnly` the prediction argument is ignored entirely.
    pub fn decide(&self, rule: Option<MatchVote>, ml: Option<Prediction>) -> Decision {
        if self.mode == DecisionMode::MlWithFallback {
            if let Some(prediction) = ml {
                if prediction.confidence >= self.confidence_threshold {
                    return Decision {
                        event: Some(prediction.event),
                        source: DecisionSource::Ml,
                        confidence: prediction.confidence,
                        probabilities: Some(prediction.probabilities),
                    };
                }
            }
        }

        match rule {
            Some(vote) => Decision {
                event: Some(vote.event),
                source: DecisionSource::Rule,
                confidence: 1.0,
                probabilities: None,
            },
            None => Decision::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(event: EventKind, confidence: f64) -> Prediction {
        Prediction {
            event,
            confidence,
            probabilities: vec![(event, confidence)],
        }
    }

    fn vote(event: EventKind) -> MatchVote {
        MatchVote { event, votes: 3 }
    }

    #[test]
    fn test_confident_prediction_wins() {
        let arbiter = DecisionArbiter::new(DecisionMode::MlWithFallback, 0.6);

        let decision = arbiter.decide(
            Some(vote(EventKind::MoveLeft)),
            Some(prediction(EventKind::MoveRight, 0.9)),
        );

        assert_eq!(decision.source, DecisionSource::Ml);
        assert_eq!(decision.event, Some(EventKind::MoveRight));
        assert_eq!(decision.confidence, 0.9);
        assert!(decision.probabilities.is_some());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let arbiter = DecisionArbiter::new(DecisionMode::MlWithFallback, 0.6);
        let decision = arbiter.decide(None, Some(prediction(EventKind::Stop, 0.6)));
        assert_eq!(decision.source, DecisionSource::Ml);
    }

    #[test]
    fn test_low_confidence_falls_back_to_rule() {
        let arbiter = DecisionArbiter::new(DecisionMode::MlWithFallback, 0.6);

        let decision = arbiter.decide(
            Some(vote(EventKind::MoveLeft)),
            Some(prediction(EventKind::MoveRight, 0.4)),
        );

        assert_eq!(decision.source, DecisionSource::Rule);
        assert_eq!(decision.event, Some(EventKind::MoveLeft));
        assert_eq!(decision.confidence, 1.0);
        assert!(decision.probabilities.is_none());
    }

    #[test]
    fn test_no_model_no_rule_emits_none() {
        let arbiter = DecisionArbiter::new(DecisionMode::MlWithFallback, 0.6);
        let decision = arbiter.decide(None, None);

        assert_eq!(decision.event, None);
        assert_eq!(decision.source, DecisionSource::None);
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn test_rule_only_ignores_prediction() {
        let arbiter = DecisionArbiter::new(DecisionMode::RuleOnly, 0.6);

        let decision = arbiter.decide(
            Some(vote(EventKind::MoveDown)),
            Some(prediction(EventKind::MoveUp, 0.99)),
        );

        assert_eq!(decision.source, DecisionSource::Rule);
        assert_eq!(decision.event, Some(EventKind::MoveDown));
    }

    #[test]
    fn test_source_never_ml_below_threshold() {
        let arbiter = DecisionArbiter::new(DecisionMode::MlWithFallback, 0.8);

        for confidence in [0.0, 0.3, 0.5, 0.79] {
            let decision =
                arbiter.decide(None, Some(prediction(EventKind::Stop, confidence)));
            assert_ne!(decision.source, DecisionSource::Ml);
        }
    }

    #[test]
    fn test_mode_switch() {
        let mut arbiter = DecisionArbiter::new(DecisionMode::RuleOnly, 0.6);
        assert_eq!(arbiter.mode(), DecisionMode::RuleOnly);

        arbiter.set_mode(DecisionMode::MlWithFallback);
        let decision = arbiter.decide(None, Some(prediction(EventKind::Stop, 0.9)));
        assert_eq!(decision.source, DecisionSource::Ml);
    }
}
