//! Type definitions for the fake job detector

pub mod posting;
pub mod result;

pub use posting::{CategoricalRecord, ExplainRequest, JobPostingRequest};
pub use result::{Attribution, Contribution, HealthReport, Label, ScoreResult};
