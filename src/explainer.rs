//! Ranked attribution of a score to individual features.
//!
//! Ranking is deterministic: equal contributions are ordered by column,
//! lowest first. When there are at least `2 * top_n` features the negative
//! side skips features already listed as positive, so no feature appears on
//! both sides even when many contributions tie (usually at zero).

use crate::error::ClassifierError;
use crate::feature_assembler::FeatureIndex;
use crate::types::result::{Attribution, Contribution};
use std::cmp::Ordering;

/// Default number of contributors listed per side.
pub const DEFAULT_TOP_N: usize = 10;

/// Split raw contributions into bias and the top contributors on each side.
///
/// `contributions` must hold one value per column of `index` plus the bias
/// as the last element. With at least `2 * top_n` features the negative list
/// skips columns already listed as positive, even when that passes over a
/// lower column tied on value.
pub fn explain(
    contributions: &[f64],
    index: &FeatureIndex,
    top_n: usize,
) -> Result<Attribution, ClassifierError> {
    let n = index.len();
    if contributions.len() != n + 1 {
        return Err(ClassifierError::WidthMismatch {
            expected: n + 1,
            actual: contributions.len(),
        });
    }
    let (per_feature, bias) = contributions.split_at(n);
    let k = top_n.min(n);

    let positive = rank(per_feature, |a, b| b.total_cmp(&a))
        .take(k)
        .collect::<Vec<_>>();

    let mut listed = vec![false; n];
    if n / 2 >= top_n {
        for &col in &positive {
            listed[col] = true;
        }
    }
    let negative = rank(per_feature, |a, b| a.total_cmp(&b))
        .filter(|&col| !listed[col])
        .take(k)
        .collect::<Vec<_>>();

    Ok(Attribution {
        bias: bias[0],
        positive: named(&positive, per_feature, index),
        negative: named(&negative, per_feature, index),
    })
}

/// Column ids ordered by `by` on their values, ties broken by column.
fn rank<F>(values: &[f64], by: F) -> impl Iterator<Item = usize>
where
    F: Fn(f64, f64) -> Ordering,
{
    let mut order: Vec<usize> = (0..values.len()).collect();
    // + 0.0 folds -0.0 into 0.0 so signed zeros tie
    order.sort_by(|&a, &b| by(values[a] + 0.0, values[b] + 0.0).then(a.cmp(&b)));
    order.into_iter()
}

fn named(columns: &[usize], values: &[f64], index: &FeatureIndex) -> Vec<Contribution> {
    columns
        .iter()
        .map(|&col| Contribution {
            feature: index
                .name(col)
                .map(str::to_string)
                .unwrap_or_else(|| format!("f{}", col)),
            contrib: values[col],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(n: usize) -> FeatureIndex {
        FeatureIndex::from((0..n).map(|i| format!("feat_{}", i)).collect::<Vec<_>>())
    }

    fn features(list: &[Contribution]) -> Vec<&str> {
        list.iter().map(|c| c.feature.as_str()).collect()
    }

    #[test]
    fn test_bias_and_ordering() {
        let contribs = [0.3, -0.5, 0.9, 0.0, -0.1, 0.2, 1.5];
        let attribution = explain(&contribs, &index(6), 2).unwrap();

        assert_eq!(attribution.bias, 1.5);
        assert_eq!(features(&attribution.positive), vec!["feat_2", "feat_0"]);
        assert_eq!(features(&attribution.negative), vec!["feat_1", "feat_4"]);
        assert_eq!(attribution.positive[0].contrib, 0.9);
        assert_eq!(attribution.negative[0].contrib, -0.5);
    }

    #[test]
    fn test_ties_resolved_by_lowest_column() {
        let contribs = [0.4, 0.7, 0.4, 0.7, -0.2, -0.2, 0.0];
        let attribution = explain(&contribs, &index(6), 3).unwrap();

        assert_eq!(
            features(&attribution.positive),
            vec!["feat_1", "feat_3", "feat_0"]
        );
        assert_eq!(
            features(&attribution.negative),
            vec!["feat_4", "feat_5", "feat_2"]
        );
    }

    #[test]
    fn test_top_n_larger_than_feature_count() {
        let contribs = [0.1, -0.3, 0.2, 0.0];
        let attribution = explain(&contribs, &index(3), 10).unwrap();

        assert_eq!(attribution.positive.len(), 3);
        assert_eq!(attribution.negative.len(), 3);
        assert_eq!(
            features(&attribution.positive),
            vec!["feat_2", "feat_0", "feat_1"]
        );
        assert_eq!(
            features(&attribution.negative),
            vec!["feat_1", "feat_0", "feat_2"]
        );
    }

    #[test]
    fn test_zero_ties_do_not_repeat_across_sides() {
        // Only one non-zero contribution; both sides pad with zeros
        let mut contribs = vec![0.0; 10];
        contribs[7] = 0.8;
        contribs.push(-2.0);
        let attribution = explain(&contribs, &index(10), 5).unwrap();

        let pos = features(&attribution.positive);
        let neg = features(&attribution.negative);
        assert_eq!(pos, vec!["feat_7", "feat_0", "feat_1", "feat_2", "feat_3"]);
        assert_eq!(neg, vec!["feat_4", "feat_5", "feat_6", "feat_8", "feat_9"]);
        assert!(pos.iter().all(|p| !neg.contains(p)));
    }

    #[test]
    fn test_lists_are_monotonic() {
        let contribs: Vec<f64> = (0..50)
            .map(|i| ((i * 37) % 23) as f64 / 7.0 - 1.5)
            .chain(std::iter::once(0.25))
            .collect();
        let attribution = explain(&contribs, &index(50), 10).unwrap();

        assert_eq!(attribution.positive.len(), 10);
        assert_eq!(attribution.negative.len(), 10);
        assert!(attribution
            .positive
            .windows(2)
            .all(|w| w[0].contrib >= w[1].contrib));
        assert!(attribution
            .negative
            .windows(2)
            .all(|w| w[0].contrib <= w[1].contrib));
    }

    #[test]
    fn test_signed_zero_ties() {
        let contribs = [-0.0, 0.0, -0.0, 0.0];
        let attribution = explain(&contribs, &index(3), 1).unwrap();
        assert_eq!(features(&attribution.positive), vec!["feat_0"]);
        assert_eq!(features(&attribution.negative), vec!["feat_1"]);
    }

    #[test]
    fn test_huge_top_n_lists_every_feature() {
        let contribs = [0.3, -0.2, 0.1, 0.0, 0.5];
        let attribution = explain(&contribs, &index(4), usize::MAX / 2 + 1).unwrap();

        assert_eq!(attribution.positive.len(), 4);
        assert_eq!(attribution.negative.len(), 4);
        assert_eq!(
            features(&attribution.negative),
            vec!["feat_1", "feat_3", "feat_2", "feat_0"]
        );
    }

    #[test]
    fn test_length_mismatch() {
        let err = explain(&[0.1, 0.2], &index(3), 2).unwrap_err();
        assert_eq!(
            err,
            ClassifierError::WidthMismatch {
                expected: 4,
                actual: 2
            }
        );
    }
}
