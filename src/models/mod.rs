//! Fitted model artifacts and the inference engine built on them

pub mod booster;
pub mod classifier;
pub mod encoder;
pub mod inference;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod vectorizer;

pub use booster::TreeEnsemble;
pub use classifier::Classifier;
pub use encoder::{CategoricalEncoder, OneHotEncoder};
pub use inference::{InferenceEngine, ScoringContext};
pub use loader::{LoadedArtifacts, ModelLoader};
pub use vectorizer::{TextVectorizer, TfidfVectorizer};
