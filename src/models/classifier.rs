//! Classifier capability interface

use crate::error::ClassifierError;
use crate::sparse::SparseRow;

/// Binary probabilistic model consuming the assembled feature row.
///
/// Implementations that only take dense input return
/// [`ClassifierError::SparseInputUnsupported`] from
/// [`predict_proba_sparse`](Classifier::predict_proba_sparse); the inference
/// engine treats that variant, and only that variant, as a cue to retry with
/// [`predict_proba_dense`](Classifier::predict_proba_dense).
pub trait Classifier: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Number of input features, if the artifact declares it
    fn num_features(&self) -> Option<usize>;

    /// Probability of the positive (fake) class for a sparse row
    fn predict_proba_sparse(&self, row: &SparseRow) -> Result<f64, ClassifierError>;

    /// Probability of the positive class for a dense row
    fn predict_proba_dense(&self, row: &[f32]) -> Result<f64, ClassifierError>;

    /// Additive per-feature contributions to the raw (margin) output.
    ///
    /// Returns `row.width() + 1` values; the last one is the bias term.
    fn contributions(&self, row: &SparseRow) -> Result<Vec<f64>, ClassifierError>;
}
