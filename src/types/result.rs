//! Scoring and explanation results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Binary decision for a posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Fake,
    Real,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Fake => "Fake",
            Label::Real => "Real",
        }
    }
}

/// Thresholded fraud probability for one posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub label: Label,
    /// Probability that the posting is fraudulent (0.0 - 1.0)
    pub proba_fake: f64,
    pub threshold_used: f64,
}

/// One feature's signed contribution to the raw model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub feature: String,
    pub contrib: f64,
}

/// Ranked per-feature attribution of a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Row-independent offset of the model output
    pub bias: f64,
    /// Largest contributions first
    pub positive: Vec<Contribution>,
    /// Smallest (most negative) contributions first
    pub negative: Vec<Contribution>,
}

/// Liveness report for the health subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
