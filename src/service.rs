//! Request handling between the NATS transport and the inference engine.
//!
//! Every request gets a request id. Failures reply with a generic message
//! plus that id; the underlying error is only logged.

use crate::error::ScoringError;
use crate::metrics::ServiceMetrics;
use crate::models::inference::InferenceEngine;
use crate::types::posting::{ExplainRequest, JobPostingRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info_span, warn};
use uuid::Uuid;

/// Operation a request subject maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Score,
    Explain,
    Health,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Score => "score",
            RequestKind::Explain => "explain",
            RequestKind::Health => "health",
        }
    }

    /// Generic message sent back when this operation fails
    fn failure_message(&self) -> &'static str {
        match self {
            RequestKind::Score => "Prediction error",
            RequestKind::Explain => "Explain error",
            RequestKind::Health => "Health error",
        }
    }
}

/// Body of a failed request's reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
    pub request_id: String,
}

/// Decodes requests, runs them against the engine and encodes the reply
#[derive(Clone)]
pub struct RequestHandler {
    engine: Arc<InferenceEngine>,
    metrics: Arc<ServiceMetrics>,
}

impl RequestHandler {
    pub fn new(engine: Arc<InferenceEngine>, metrics: Arc<ServiceMetrics>) -> Self {
        Self { engine, metrics }
    }

    /// Handle one request payload and return the JSON reply body
    pub fn handle(&self, kind: RequestKind, payload: &[u8]) -> Vec<u8> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("request", request_id = %request_id, kind = kind.as_str());
        let _guard = span.enter();

        let start = Instant::now();
        let result = match kind {
            RequestKind::Score => self.score(payload, start),
            RequestKind::Explain => self.explain(payload, start),
            RequestKind::Health => encode(&self.engine.health()),
        };

        result.unwrap_or_else(|failure| {
            let error = match &failure {
                Failure::Malformed(e) => {
                    warn!(error = %e, "Failed to deserialize request");
                    self.metrics.record_failure("invalid_request");
                    "Invalid request"
                }
                Failure::Scoring(ScoringError::InvalidRequest(reason)) => {
                    warn!(reason = %reason, "Rejected request");
                    self.metrics.record_failure("invalid_request");
                    "Invalid request"
                }
                Failure::Scoring(e) => {
                    error!(error = %e, error_kind = e.kind(), "Request failed");
                    self.metrics.record_failure(e.kind());
                    kind.failure_message()
                }
                Failure::Encode(e) => {
                    error!(error = %e, "Failed to encode reply");
                    self.metrics.record_failure("encode");
                    kind.failure_message()
                }
            };
            error_reply(error, request_id)
        })
    }

    fn score(&self, payload: &[u8], start: Instant) -> Result<Vec<u8>, Failure> {
        let posting: JobPostingRequest =
            serde_json::from_slice(payload).map_err(Failure::Malformed)?;
        let result = self.engine.score(&posting).map_err(Failure::Scoring)?;

        let elapsed = start.elapsed();
        self.metrics
            .record_score(elapsed, result.proba_fake, result.label);
        debug!(
            label = result.label.as_str(),
            proba_fake = result.proba_fake,
            processing_time_us = elapsed.as_micros() as u64,
            "Posting scored"
        );
        encode(&result)
    }

    fn explain(&self, payload: &[u8], start: Instant) -> Result<Vec<u8>, Failure> {
        let request: ExplainRequest =
            serde_json::from_slice(payload).map_err(Failure::Malformed)?;
        let attribution = self
            .engine
            .explain(&request.posting, request.top_n)
            .map_err(Failure::Scoring)?;

        let elapsed = start.elapsed();
        self.metrics.record_explain(elapsed);
        debug!(
            bias = attribution.bias,
            positive = attribution.positive.len(),
            negative = attribution.negative.len(),
            processing_time_us = elapsed.as_micros() as u64,
            "Posting explained"
        );
        encode(&attribution)
    }
}

enum Failure {
    Malformed(serde_json::Error),
    Scoring(ScoringError),
    Encode(serde_json::Error),
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Failure> {
    serde_json::to_vec(value).map_err(Failure::Encode)
}

fn error_reply(error: &str, request_id: String) -> Vec<u8> {
    let reply = ErrorReply {
        error: error.to_string(),
        request_id,
    };
    // Two plain strings always serialize
    serde_json::to_vec(&reply).unwrap_or_default()
}
