//! Artifact loader for the vectorizer, encoder and classifier

use crate::config::{ClassifierFormat, ModelsConfig};
use crate::models::booster::TreeEnsemble;
use crate::models::classifier::Classifier;
use crate::models::encoder::{CategoricalEncoder, OneHotEncoder};
use crate::models::vectorizer::{TextVectorizer, TfidfVectorizer};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Name reported by the classifier in logs
const CLASSIFIER_NAME: &str = "xgboost";

/// The three fitted artifacts a scoring context is built from
pub struct LoadedArtifacts {
    pub vectorizer: Box<dyn TextVectorizer>,
    pub encoder: Box<dyn CategoricalEncoder>,
    pub classifier: Box<dyn Classifier>,
}

/// Loader for the fitted model artifacts
pub struct ModelLoader {
    models_dir: PathBuf,
    vectorizer_file: String,
    encoder_file: String,
    classifier_file: String,
    onnx_file: String,
    classifier_format: ClassifierFormat,
    /// Number of threads for ONNX inference
    #[cfg_attr(not(feature = "onnx"), allow(dead_code))]
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a loader for the configured artifact files
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            models_dir: PathBuf::from(&config.models_dir),
            vectorizer_file: config.vectorizer_file.clone(),
            encoder_file: config.encoder_file.clone(),
            classifier_file: config.classifier_file.clone(),
            onnx_file: config.onnx_file.clone(),
            classifier_format: config.classifier_format.clone(),
            onnx_threads: config.onnx_threads.max(1),
        }
    }

    /// Create a loader with default file names in `models_dir`
    pub fn with_models_dir<P: AsRef<Path>>(models_dir: P) -> Self {
        let config = ModelsConfig {
            models_dir: models_dir.as_ref().to_string_lossy().into_owned(),
            ..ModelsConfig::default()
        };
        Self::new(&config)
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Load the TF-IDF vectorizer
    pub fn load_vectorizer(&self) -> Result<TfidfVectorizer> {
        let path = self.models_dir.join(&self.vectorizer_file);
        info!(path = %path.display(), "Loading TF-IDF vectorizer");

        let vectorizer = TfidfVectorizer::load(&path)?;
        info!(vocabulary = vectorizer.vocabulary_size(), "Vectorizer loaded");
        Ok(vectorizer)
    }

    /// Load the one-hot encoder
    pub fn load_encoder(&self) -> Result<OneHotEncoder> {
        let path = self.models_dir.join(&self.encoder_file);
        info!(path = %path.display(), "Loading one-hot encoder");

        let encoder = OneHotEncoder::load(&path)?;
        info!(
            fields = ?encoder.input_fields(),
            width = encoder.width(),
            "Encoder loaded"
        );
        Ok(encoder)
    }

    /// Load the classifier in the configured format
    pub fn load_classifier(&self) -> Result<Box<dyn Classifier>> {
        match self.classifier_format {
            ClassifierFormat::XgboostJson => {
                let path = self.models_dir.join(&self.classifier_file);
                info!(model = CLASSIFIER_NAME, path = %path.display(), "Loading XGBoost model");
                let model = TreeEnsemble::load(&path, CLASSIFIER_NAME)?;
                info!(
                    model = CLASSIFIER_NAME,
                    trees = model.tree_count(),
                    features = ?model.num_features(),
                    "Model loaded successfully"
                );
                Ok(Box::new(model))
            }
            ClassifierFormat::Onnx => self.load_onnx(&self.models_dir.join(&self.onnx_file)),
        }
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(&self, path: &Path) -> Result<Box<dyn Classifier>> {
        let model = crate::models::onnx::OnnxClassifier::load(path, CLASSIFIER_NAME, self.onnx_threads)?;
        Ok(Box::new(model))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(&self, path: &Path) -> Result<Box<dyn Classifier>> {
        bail!(
            "{} is an ONNX model but this build lacks the `onnx` feature",
            path.display()
        )
    }

    /// Load all three artifacts, failing on the first that cannot be read
    pub fn load_all(&self) -> Result<LoadedArtifacts> {
        if !self.models_dir.is_dir() {
            bail!("models directory {} does not exist", self.models_dir.display());
        }

        let vectorizer = logged("vectorizer", self.load_vectorizer())?;
        let encoder = logged("encoder", self.load_encoder())?;
        let classifier = logged("classifier", self.load_classifier())?;

        info!(models_dir = %self.models_dir.display(), "All artifacts loaded");

        Ok(LoadedArtifacts {
            vectorizer: Box::new(vectorizer),
            encoder: Box::new(encoder),
            classifier,
        })
    }
}

fn logged<T>(artifact: &'static str, result: Result<T>) -> Result<T> {
    result
        .map_err(|e| {
            error!(artifact = artifact, error = %format!("{:#}", e), "Failed to load artifact");
            e
        })
        .context(artifact)
}
