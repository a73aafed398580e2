//! Inference engine for fake job posting scoring and explanation

use crate::config::AppConfig;
use crate::decision::decide;
use crate::error::{ClassifierError, ScoringError};
use crate::explainer::{self, DEFAULT_TOP_N};
use crate::feature_assembler::{FeatureAssembler, FeatureIndex};
use crate::models::classifier::Classifier;
use crate::models::loader::{LoadedArtifacts, ModelLoader};
use crate::sparse::SparseRow;
use crate::types::posting::JobPostingRequest;
use crate::types::result::{Attribution, HealthReport, ScoreResult};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Everything needed to score a posting, loaded once at startup
pub struct ScoringContext {
    assembler: FeatureAssembler,
    classifier: Box<dyn Classifier>,
    /// Column names, built once from the fitted artifacts
    feature_index: FeatureIndex,
    loaded_at: DateTime<Utc>,
}

impl ScoringContext {
    /// Build a context, checking that the assembled width matches the classifier
    pub fn new(artifacts: LoadedArtifacts) -> Result<Self> {
        let assembler = FeatureAssembler::new(artifacts.vectorizer, artifacts.encoder);
        let classifier = artifacts.classifier;

        if let Some(expected) = classifier.num_features() {
            if expected != assembler.width() {
                bail!(
                    "classifier '{}' expects {} features but the transformers produce {}",
                    classifier.name(),
                    expected,
                    assembler.width()
                );
            }
        }

        let feature_index = assembler.feature_index();
        Ok(Self {
            assembler,
            classifier,
            feature_index,
            loaded_at: Utc::now(),
        })
    }

    pub fn feature_index(&self) -> &FeatureIndex {
        &self.feature_index
    }
}

enum EngineState {
    Ready(ScoringContext),
    NotReady(String),
}

/// Scores and explains postings against the loaded artifacts.
///
/// An engine whose artifacts failed to load still starts: it reports
/// unhealthy and refuses every request with [`ScoringError::NotReady`].
pub struct InferenceEngine {
    state: EngineState,
    threshold: f64,
    default_top_n: usize,
    /// Sparse rows the classifier refused and we re-ran densely
    dense_fallbacks: AtomicU64,
}

impl InferenceEngine {
    /// Create an engine from configuration. Never fails; a load error
    /// leaves the engine not ready.
    pub fn new(config: &AppConfig) -> Self {
        let loader = ModelLoader::new(&config.models);
        let engine = match loader.load_all().and_then(ScoringContext::new) {
            Ok(context) => Self::with_state(
                EngineState::Ready(context),
                config.detection.threshold,
            ),
            Err(e) => {
                error!(
                    models_dir = %loader.models_dir().display(),
                    error = %format!("{:#}", e),
                    "Failed to load model artifacts, starting in degraded mode"
                );
                Self::not_ready(format!("{:#}", e), config.detection.threshold)
            }
        };
        engine.with_default_top_n(config.detection.default_top_n)
    }

    /// Create a ready engine from already-loaded artifacts
    pub fn from_artifacts(artifacts: LoadedArtifacts, threshold: f64) -> Result<Self> {
        let context = ScoringContext::new(artifacts)?;
        Ok(Self::with_state(EngineState::Ready(context), threshold))
    }

    /// Create an engine that refuses all requests
    pub fn not_ready(reason: impl Into<String>, threshold: f64) -> Self {
        Self::with_state(EngineState::NotReady(reason.into()), threshold)
    }

    fn with_state(state: EngineState, threshold: f64) -> Self {
        if let EngineState::Ready(context) = &state {
            info!(
                features = context.feature_index.len(),
                model = %context.classifier.name(),
                threshold = threshold,
                "Inference engine initialized"
            );
        }
        Self {
            state,
            threshold,
            default_top_n: DEFAULT_TOP_N,
            dense_fallbacks: AtomicU64::new(0),
        }
    }

    /// Override the number of contributors listed when a request gives none
    pub fn with_default_top_n(mut self, top_n: usize) -> Self {
        self.default_top_n = top_n.max(1);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn default_top_n(&self) -> usize {
        self.default_top_n
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, EngineState::Ready(_))
    }

    /// Liveness report for health probes
    pub fn health(&self) -> HealthReport {
        match &self.state {
            EngineState::Ready(context) => HealthReport {
                healthy: true,
                loaded_at: Some(context.loaded_at),
                reason: None,
            },
            EngineState::NotReady(reason) => HealthReport {
                healthy: false,
                loaded_at: None,
                reason: Some(reason.clone()),
            },
        }
    }

    /// Number of requests that needed the dense retry
    pub fn dense_fallbacks(&self) -> u64 {
        self.dense_fallbacks.load(Ordering::Relaxed)
    }

    /// Column names of the assembled row, if loaded
    pub fn feature_index(&self) -> Option<&FeatureIndex> {
        self.context().ok().map(ScoringContext::feature_index)
    }

    fn context(&self) -> Result<&ScoringContext, ScoringError> {
        match &self.state {
            EngineState::Ready(context) => Ok(context),
            EngineState::NotReady(reason) => Err(ScoringError::NotReady(reason.clone())),
        }
    }

    /// Build the classifier's input row for a posting
    pub fn assemble(&self, posting: &JobPostingRequest) -> Result<SparseRow, ScoringError> {
        Ok(self.context()?.assembler.assemble(posting)?)
    }

    /// Probability and thresholded label for one posting
    pub fn score(&self, posting: &JobPostingRequest) -> Result<ScoreResult, ScoringError> {
        let context = self.context()?;
        let row = context.assembler.assemble(posting)?;
        let proba_fake = self.probability(context, &row)?;

        Ok(ScoreResult {
            label: decide(proba_fake, self.threshold),
            proba_fake,
            threshold_used: self.threshold,
        })
    }

    /// Bias plus the top `top_n` contributors on each side.
    ///
    /// `None` uses the configured default; `Some(0)` is rejected.
    pub fn explain(
        &self,
        posting: &JobPostingRequest,
        top_n: Option<usize>,
    ) -> Result<Attribution, ScoringError> {
        let top_n = match top_n {
            Some(0) => {
                return Err(ScoringError::InvalidRequest(
                    "top_n must be at least 1".to_string(),
                ))
            }
            Some(n) => n,
            None => self.default_top_n,
        };

        let context = self.context()?;
        let row = context.assembler.assemble(posting)?;
        let contributions = context.classifier.contributions(&row)?;
        Ok(explainer::explain(
            &contributions,
            &context.feature_index,
            top_n,
        )?)
    }

    /// Raw per-feature contributions with the bias last, in margin units
    pub fn contributions(&self, posting: &JobPostingRequest) -> Result<Vec<f64>, ScoringError> {
        let context = self.context()?;
        let row = context.assembler.assemble(posting)?;
        Ok(context.classifier.contributions(&row)?)
    }

    fn probability(&self, context: &ScoringContext, row: &SparseRow) -> Result<f64, ClassifierError> {
        let proba = match context.classifier.predict_proba_sparse(row) {
            Err(ClassifierError::SparseInputUnsupported) => {
                let previous = self.dense_fallbacks.fetch_add(1, Ordering::Relaxed);
                if previous == 0 {
                    warn!(
                        model = %context.classifier.name(),
                        width = row.width(),
                        "Classifier rejected sparse input, retrying with dense rows"
                    );
                } else {
                    debug!(model = %context.classifier.name(), "Dense retry");
                }
                context.classifier.predict_proba_dense(&row.to_dense())?
            }
            other => other?,
        };

        // NaN fails the range check too
        if !(0.0..=1.0).contains(&proba) {
            return Err(ClassifierError::InvalidProbability(proba));
        }
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crate::types::result::Label;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Only takes dense rows; probability grows with the row sum
    struct DenseOnly {
        width: usize,
        sparse_calls: Arc<AtomicUsize>,
    }

    impl Classifier for DenseOnly {
        fn name(&self) -> &str {
            "dense-only"
        }

        fn num_features(&self) -> Option<usize> {
            None
        }

        fn predict_proba_sparse(&self, _row: &SparseRow) -> Result<f64, ClassifierError> {
            self.sparse_calls.fetch_add(1, Ordering::SeqCst);
            Err(ClassifierError::SparseInputUnsupported)
        }

        fn predict_proba_dense(&self, row: &[f32]) -> Result<f64, ClassifierError> {
            assert_eq!(row.len(), self.width);
            assert!(row.iter().all(|v| !v.is_nan()));
            let sum: f32 = row.iter().sum();
            Ok((sum / (1.0 + sum)) as f64)
        }

        fn contributions(&self, _row: &SparseRow) -> Result<Vec<f64>, ClassifierError> {
            Err(ClassifierError::ContributionsUnsupported)
        }
    }

    /// Fails every call with a fixed error
    struct Broken(ClassifierError);

    impl Classifier for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn num_features(&self) -> Option<usize> {
            None
        }

        fn predict_proba_sparse(&self, _row: &SparseRow) -> Result<f64, ClassifierError> {
            Err(self.0.clone())
        }

        fn predict_proba_dense(&self, _row: &[f32]) -> Result<f64, ClassifierError> {
            panic!("dense path must not be taken");
        }

        fn contributions(&self, _row: &SparseRow) -> Result<Vec<f64>, ClassifierError> {
            Err(self.0.clone())
        }
    }

    fn engine_with(classifier: Box<dyn Classifier>) -> InferenceEngine {
        let mut artifacts = test_support::artifacts();
        artifacts.classifier = classifier;
        InferenceEngine::from_artifacts(artifacts, 0.5).unwrap()
    }

    fn engine() -> InferenceEngine {
        InferenceEngine::from_artifacts(test_support::artifacts(), 0.5).unwrap()
    }

    #[test]
    fn test_score_labels() {
        let engine = engine();

        let fake = engine.score(&test_support::suspicious_posting()).unwrap();
        assert_eq!(fake.label, Label::Fake);
        assert!(fake.proba_fake > 0.99);
        assert_eq!(fake.threshold_used, 0.5);

        let real = engine.score(&test_support::legitimate_posting()).unwrap();
        assert_eq!(real.label, Label::Real);
        assert!(real.proba_fake < 0.05);
        assert_eq!(engine.dense_fallbacks(), 0);
    }

    #[test]
    fn test_score_is_idempotent() {
        let engine = engine();
        let posting = test_support::suspicious_posting();
        let first = engine.score(&posting).unwrap();
        let second = engine.score(&posting).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dense_fallback_is_counted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(Box::new(DenseOnly {
            width: 24,
            sparse_calls: calls.clone(),
        }));

        let result = engine.score(&test_support::suspicious_posting()).unwrap();
        assert!((0.0..=1.0).contains(&result.proba_fake));
        engine.score(&test_support::legitimate_posting()).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.dense_fallbacks(), 2);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let engine = engine_with(Box::new(Broken(ClassifierError::Runtime("boom".into()))));
        let err = engine.score(&test_support::suspicious_posting()).unwrap_err();
        assert_eq!(err.kind(), "inference");
        assert_eq!(engine.dense_fallbacks(), 0);
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        struct Overconfident;
        impl Classifier for Overconfident {
            fn name(&self) -> &str {
                "overconfident"
            }
            fn num_features(&self) -> Option<usize> {
                None
            }
            fn predict_proba_sparse(&self, _row: &SparseRow) -> Result<f64, ClassifierError> {
                Ok(1.5)
            }
            fn predict_proba_dense(&self, _row: &[f32]) -> Result<f64, ClassifierError> {
                Ok(1.5)
            }
            fn contributions(&self, _row: &SparseRow) -> Result<Vec<f64>, ClassifierError> {
                Err(ClassifierError::ContributionsUnsupported)
            }
        }

        let engine = engine_with(Box::new(Overconfident));
        assert!(matches!(
            engine.score(&test_support::suspicious_posting()),
            Err(ScoringError::Inference(ClassifierError::InvalidProbability(p))) if p == 1.5
        ));
    }

    #[test]
    fn test_explain_contributions_sum_to_margin() {
        let engine = engine();
        let posting = test_support::suspicious_posting();

        let contributions = engine.contributions(&posting).unwrap();
        assert_eq!(contributions.len(), 25);

        let margin: f64 = contributions.iter().sum();
        let proba = engine.score(&posting).unwrap().proba_fake;
        let expected = 1.0 / (1.0 + (-margin).exp());
        assert!((proba - expected).abs() < 1e-9);
    }

    #[test]
    fn test_explain_lists() {
        let engine = engine();
        let attribution = engine
            .explain(&test_support::suspicious_posting(), Some(5))
            .unwrap();

        let positive: Vec<&str> = attribution.positive.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(positive, vec!["from", "home", "interview", "no", "required"]);
        assert_eq!(attribution.negative[0].feature, "employment_type_Full-time");
        assert!(attribution.negative[0].contrib < 0.0);
        assert!(positive
            .iter()
            .all(|p| attribution.negative.iter().all(|n| n.feature != *p)));
    }

    #[test]
    fn test_explain_default_and_zero_top_n() {
        let engine = engine().with_default_top_n(3);
        let attribution = engine
            .explain(&test_support::legitimate_posting(), None)
            .unwrap();
        assert_eq!(attribution.positive.len(), 3);
        assert_eq!(attribution.negative.len(), 3);

        let err = engine
            .explain(&test_support::legitimate_posting(), Some(0))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn test_explain_unsupported_classifier() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(Box::new(DenseOnly {
            width: 24,
            sparse_calls: calls,
        }));
        let err = engine
            .explain(&test_support::suspicious_posting(), Some(3))
            .unwrap_err();
        assert!(matches!(
            err,
            ScoringError::Inference(ClassifierError::ContributionsUnsupported)
        ));
    }

    #[test]
    fn test_width_mismatch_rejected_at_load() {
        let mut artifacts = test_support::artifacts();
        artifacts.classifier = Box::new(
            crate::models::booster::TreeEnsemble::from_json(
                &{
                    let mut model = test_support::model_json();
                    model["learner"]["learner_model_param"]["num_feature"] = "30".into();
                    model.to_string()
                },
                "xgboost",
            )
            .unwrap(),
        );
        assert!(InferenceEngine::from_artifacts(artifacts, 0.5).is_err());
    }

    #[test]
    fn test_not_ready_engine() {
        let engine = InferenceEngine::not_ready("models directory missing", 0.5);

        assert!(!engine.is_ready());
        let health = engine.health();
        assert!(!health.healthy);
        assert_eq!(health.reason.as_deref(), Some("models directory missing"));

        let err = engine.score(&test_support::suspicious_posting()).unwrap_err();
        assert_eq!(err.kind(), "not_ready");
        let err = engine
            .explain(&test_support::suspicious_posting(), None)
            .unwrap_err();
        assert_eq!(err.kind(), "not_ready");
    }

    #[test]
    fn test_new_degrades_on_missing_directory() {
        let mut config = AppConfig::default();
        config.models.models_dir = "/nonexistent/models/dir".to_string();
        config.detection.threshold = 0.3;

        let engine = InferenceEngine::new(&config);

        assert!(!engine.is_ready());
        assert_eq!(engine.threshold(), 0.3);
        assert!(engine.health().reason.unwrap().contains("does not exist"));
    }

    #[test]
    fn test_new_loads_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        test_support::write_artifacts(dir.path());
        let mut config = AppConfig::default();
        config.models.models_dir = dir.path().to_string_lossy().into_owned();

        let engine = InferenceEngine::new(&config);

        assert!(engine.is_ready());
        assert!(engine.health().healthy);
        assert!(engine.health().loaded_at.is_some());
        assert_eq!(engine.feature_index().map(FeatureIndex::len), Some(24));
    }
}
