// Signal types
// Defines the control-event vocabulary and the per-tick feature sample

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete control events the pipeline can resolve a sample to.
/// "No event" is represented as `Option<EventKind>::None` rather than a
/// variant, so labelled history entries can never carry an empty label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Move pointer left
    #[serde(rename = "ml")]
    MoveLeft,

    /// Move pointer right
    #[serde(rename = "mr")]
    MoveRight,

    /// Move pointer up
    #[serde(rename = "mu")]
    MoveUp,

    /// Move pointer down
    #[serde(rename = "md")]
    MoveDown,

    /// Halt all movement
    #[serde(rename = "stop")]
    Stop,
}

impl EventKind {
    /// All event kinds, in wire-code order
    pub const ALL: [EventKind; 5] = [
        EventKind::MoveLeft,
        EventKind::MoveRight,
        EventKind::MoveUp,
        EventKind::MoveDown,
        EventKind::Stop,
    ];

    /// Short string form used in history files and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MoveLeft => "ml",
            EventKind::MoveRight => "mr",
            EventKind::MoveUp => "mu",
            EventKind::MoveDown => "md",
            EventKind::Stop => "stop",
        }
    }

    /// Parse the short string form; returns None for anything else
    /// (including the empty string, which means "no event")
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ml" => Some(EventKind::MoveLeft),
            "mr" => Some(EventKind::MoveRight),
            "mu" => Some(EventKind::MoveUp),
            "md" => Some(EventKind::MoveDown),
            "stop" => Some(EventKind::Stop),
            _ => None,
        }
    }

    /// Human-readable name for logs and diagnostics
    pub fn display_name(&self) -> &'static str {
        match self {
            EventKind::MoveLeft => "Move Left",
            EventKind::MoveRight => "Move Right",
            EventKind::MoveUp => "Move Up",
            EventKind::MoveDown => "Move Down",
            EventKind::Stop => "Stop",
        }
    }
}

/// Number of numeric features fed to the matcher and the classifier
pub const FEATURE_COUNT: usize = 10;

/// Feature names, in the order produced by [`EegSample::features`]
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "attention",
    "meditation",
    "delta",
    "theta",
    "low_alpha",
    "high_alpha",
    "low_beta",
    "high_beta",
    "low_gamma",
    "high_gamma",
];

/// One timestamped observation from the headset.
///
/// `attention` and `meditation` are 0-100 eSense values; the eight band
/// powers are non-negative magnitudes. `signal` is contact quality and is
/// carried for the transport but never used for matching or classification.
/// A sample is immutable once appended to the history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EegSample {
    pub attention: i32,
    pub meditation: i32,
    pub signal: i32,
    pub delta: i32,
    pub theta: i32,
    pub low_alpha: i32,
    pub high_alpha: i32,
    pub low_beta: i32,
    pub high_beta: i32,
    pub low_gamma: i32,
    pub high_gamma: i32,

    /// Label assigned during data collection; None for unlabelled samples
    #[serde(default)]
    pub event_name: Option<EventKind>,

    /// Acquisition timestamp
    pub timestamp: DateTime<Utc>,
}

impl EegSample {
    /// Create an unlabelled sample with the current timestamp
    pub fn new(attention: i32, meditation: i32, signal: i32, bands: [i32; 8]) -> Self {
        EegSample {
            attention,
            meditation,
            signal,
            delta: bands[0],
            theta: bands[1],
            low_alpha: bands[2],
            high_alpha: bands[3],
            low_beta: bands[4],
            high_beta: bands[5],
            low_gamma: bands[6],
            high_gamma: bands[7],
            event_name: None,
            timestamp: Utc::now(),
        }
    }

    /// Return a copy of this sample carrying the given label
    pub fn with_label(&self, event: EventKind) -> Self {
        let mut labelled = self.clone();
        labelled.event_name = Some(event);
        labelled
    }

    /// Classifier feature vector: the ten matched fields, excluding
    /// contact quality
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.attention as f64,
            self.meditation as f64,
            self.delta as f64,
            self.theta as f64,
            self.low_alpha as f64,
            self.high_alpha as f64,
            self.low_beta as f64,
            self.high_beta as f64,
            self.low_gamma as f64,
            self.high_gamma as f64,
        ]
    }

    /// The matched fields as integers, in [`FEATURE_NAMES`] order
    pub fn matched_fields(&self) -> [i32; FEATURE_COUNT] {
        [
            self.attention,
            self.meditation,
            self.delta,
            self.theta,
            self.low_alpha,
            self.high_alpha,
            self.low_beta,
            self.high_beta,
            self.low_gamma,
            self.high_gamma,
        ]
    }
}

impl Default for EegSample {
    fn default() -> Self {
        EegSample::new(0, 0, 0, [0; 8])
    }
}
