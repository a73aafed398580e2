//! Configuration management for the fake job detector

use crate::decision::DEFAULT_THRESHOLD;
use crate::explainer::DEFAULT_TOP_N;
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Serialisation format of the classifier artifact
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierFormat {
    /// XGBoost JSON model - sparse input, probabilities and contributions
    #[default]
    XgboostJson,
    /// ONNX export - dense input and probabilities only (needs the `onnx` feature)
    Onnx,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    pub detection: DetectionConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for score requests
    pub score_subject: String,
    /// Subject for explain requests
    pub explain_subject: String,
    /// Subject for health probes
    pub health_subject: String,
    /// Queue group shared by all service instances
    pub queue_group: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            score_subject: "jobs.score".to_string(),
            explain_subject: "jobs.explain".to_string(),
            health_subject: "jobs.health".to_string(),
            queue_group: "fake-job-detector".to_string(),
        }
    }
}

/// Model artifacts configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory containing the fitted artifacts
    pub models_dir: String,
    /// TF-IDF vectorizer export
    pub vectorizer_file: String,
    /// One-hot encoder export
    pub encoder_file: String,
    /// Classifier model file for the `xgboost_json` format
    pub classifier_file: String,
    /// Classifier model file for the `onnx` format
    pub onnx_file: String,
    pub classifier_format: ClassifierFormat,
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            vectorizer_file: "tfidf_vectorizer.json".to_string(),
            encoder_file: "onehot_encoder.json".to_string(),
            classifier_file: "xgboost_model.json".to_string(),
            onnx_file: "xgboost_model.onnx".to_string(),
            classifier_format: ClassifierFormat::XgboostJson,
            onnx_threads: 1,
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Probability at or above which a posting is labelled fake
    pub threshold: f64,
    /// Contributors per side when an explain request gives no top_n
    pub default_top_n: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            default_top_n: DEFAULT_TOP_N,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of requests processed concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    pub metrics_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            metrics_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file plus environment
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path.
    ///
    /// Precedence, lowest first: built-in defaults, the file (optional),
    /// `FAKEJOB__SECTION__KEY` variables, then `MODEL_DIR` and `THRESHOLD`.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let threshold = match std::env::var("THRESHOLD") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<f64>()
                    .with_context(|| format!("THRESHOLD is not a number: {:?}", raw))?,
            ),
            Err(_) => None,
        };

        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("FAKEJOB")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("models.models_dir", std::env::var("MODEL_DIR").ok())?
            .set_override_option("detection.threshold", threshold)?
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let t = self.detection.threshold;
        if !(0.0..=1.0).contains(&t) {
            bail!("detection.threshold must be within [0, 1], got {}", t);
        }
        if self.detection.default_top_n == 0 {
            bail!("detection.default_top_n must be at least 1");
        }
        if self.pipeline.workers == 0 {
            bail!("pipeline.workers must be at least 1");
        }
        if self.pipeline.metrics_interval_secs == 0 {
            bail!("pipeline.metrics_interval_secs must be at least 1");
        }
        Ok(())
    }

    /// Directory holding the model artifacts
    pub fn models_dir(&self) -> &Path {
        Path::new(&self.models.models_dir)
    }
}
