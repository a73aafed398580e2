//! Thresholding of fraud probabilities into labels

use crate::types::result::Label;

/// Default decision threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Label a probability: `Fake` iff `proba_fake >= threshold`.
///
/// Equality counts as fake.
pub fn decide(proba_fake: f64, threshold: f64) -> Label {
    if proba_fake >= threshold {
        Label::Fake
    } else {
        Label::Real
    }
}
