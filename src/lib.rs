//! Fake Job Posting Detector Library
//!
//! Scores job postings for fraud with a gradient-boosted tree model over
//! TF-IDF text features, one-hot categorical fields and binary flags, and
//! explains each score as ranked per-feature contributions.

pub mod config;
pub mod consumer;
pub mod decision;
pub mod error;
pub mod explainer;
pub mod feature_assembler;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod service;
pub mod sparse;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::AppConfig;
pub use consumer::PostingConsumer;
pub use error::{ClassifierError, ScoringError, TransformError};
pub use feature_assembler::{FeatureAssembler, FeatureIndex};
pub use models::inference::InferenceEngine;
pub use producer::ReplyProducer;
pub use service::{RequestHandler, RequestKind};
pub use sparse::SparseRow;
pub use types::{Attribution, Contribution, HealthReport, JobPostingRequest, Label, ScoreResult};
