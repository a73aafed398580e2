//! Error taxonomy for feature assembly, inference and readiness.

use thiserror::Error;

/// Failure while turning a request into model features.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    /// The categorical record lacks a field the encoder was fitted on
    #[error("categorical record has no value for encoder field '{0}'")]
    MissingField(String),

    /// A boolean flag field carried something other than 0 or 1
    #[error("field '{field}' must be 0 or 1, got {value}")]
    InvalidFlag { field: &'static str, value: i64 },

    /// A segment came back with a width other than the artifact declares
    #[error("{segment} segment width {actual} does not match expected {expected}")]
    SegmentWidth {
        segment: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Failure reported by a classifier artifact.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifierError {
    /// The artifact only accepts dense rows; callers may retry densely
    #[error("classifier does not accept sparse input")]
    SparseInputUnsupported,

    /// The artifact cannot decompose its output into feature contributions
    #[error("classifier does not support contribution decomposition")]
    ContributionsUnsupported,

    /// Row width disagrees with the number of features the model was fit on
    #[error("row has {actual} features, classifier expects {expected}")]
    WidthMismatch { expected: usize, actual: usize },

    /// The model produced a value outside the probability range
    #[error("classifier produced invalid probability {0}")]
    InvalidProbability(f64),

    /// Anything the runtime itself raised
    #[error("classifier runtime error: {0}")]
    Runtime(String),
}

/// Errors surfaced by [`crate::InferenceEngine`] operations.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("feature assembly failed: {0}")]
    Assembly(#[from] TransformError),

    #[error("inference failed: {0}")]
    Inference(#[from] ClassifierError),

    #[error("model artifacts not loaded: {0}")]
    NotReady(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ScoringError {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::Assembly(_) => "assembly",
            ScoringError::Inference(_) => "inference",
            ScoringError::NotReady(_) => "not_ready",
            ScoringError::InvalidRequest(_) => "invalid_request",
        }
    }
}
