//! Single-row sparse feature representation (CSR with one row).

/// One sparse row: sorted column indices with their non-zero values.
///
/// Absent columns are structural zeros. Tree models treat them as missing
/// values, which is why the sparse and dense views of the same row are kept
/// distinct instead of always materialising the dense one.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseRow {
    width: usize,
    indices: Vec<usize>,
    values: Vec<f32>,
}

impl SparseRow {
    /// Create an all-zero row of the given width.
    pub fn zeros(width: usize) -> Self {
        Self {
            width,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build a row from `(column, value)` pairs.
    ///
    /// Pairs are sorted by column; zero values and out-of-range columns are
    /// dropped, and a repeated column keeps the sum of its values.
    pub fn from_pairs(width: usize, mut pairs: Vec<(usize, f32)>) -> Self {
        pairs.sort_by_key(|&(col, _)| col);

        let mut indices: Vec<usize> = Vec::with_capacity(pairs.len());
        let mut values: Vec<f32> = Vec::with_capacity(pairs.len());
        for (col, value) in pairs {
            if col >= width {
                continue;
            }
            match indices.last() {
                Some(&last) if last == col => {
                    if let Some(v) = values.last_mut() {
                        *v += value;
                    }
                }
                _ => {
                    indices.push(col);
                    values.push(value);
                }
            }
        }

        let mut row = Self {
            width,
            indices,
            values,
        };
        row.prune_zeros();
        row
    }

    /// Build a row from a dense slice, keeping only non-zero entries.
    pub fn from_dense(dense: &[f32]) -> Self {
        let (indices, values) = dense
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .unzip();
        Self {
            width: dense.len(),
            indices,
            values,
        }
    }

    /// Concatenate rows column-wise, offsetting each segment's indices.
    pub fn hstack(segments: &[SparseRow]) -> Self {
        let width = segments.iter().map(|s| s.width).sum();
        let nnz = segments.iter().map(|s| s.nnz()).sum();

        let mut indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        let mut offset = 0;
        for segment in segments {
            indices.extend(segment.indices.iter().map(|&i| i + offset));
            values.extend_from_slice(&segment.values);
            offset += segment.width;
        }

        Self {
            width,
            indices,
            values,
        }
    }

    /// Total number of columns, including structural zeros.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Iterate over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Value at a column (zero when absent).
    pub fn get(&self, col: usize) -> f32 {
        self.indices
            .binary_search(&col)
            .map(|pos| self.values[pos])
            .unwrap_or(0.0)
    }

    /// Dense materialisation with zeros in absent columns.
    pub fn to_dense(&self) -> Vec<f32> {
        let mut dense = vec![0.0; self.width];
        for (col, value) in self.iter() {
            dense[col] = value;
        }
        dense
    }

    /// Dense view where absent columns are NaN (missing).
    pub fn to_dense_with_missing(&self) -> Vec<f32> {
        let mut dense = vec![f32::NAN; self.width];
        for (col, value) in self.iter() {
            dense[col] = value;
        }
        dense
    }

    fn prune_zeros(&mut self) {
        let mut keep = 0;
        for i in 0..self.indices.len() {
            if self.values[i] != 0.0 {
                self.indices[keep] = self.indices[i];
                self.values[keep] = self.values[i];
                keep += 1;
            }
        }
        self.indices.truncate(keep);
        self.values.truncate(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dense_drops_zeros() {
        let row = SparseRow::from_dense(&[1.0, 0.0, 0.0]);
        assert_eq!(row.width(), 3);
        assert_eq!(row.indices(), &[0]);
        assert_eq!(row.values(), &[1.0]);
    }

    #[test]
    fn test_from_pairs_sorts_and_merges() {
        let row = SparseRow::from_pairs(5, vec![(3, 0.5), (1, 0.25), (3, 0.5), (7, 1.0), (2, 0.0)]);
        assert_eq!(row.indices(), &[1, 3]);
        assert_eq!(row.values(), &[0.25, 1.0]);
    }

    #[test]
    fn test_hstack_offsets_segments() {
        let text = SparseRow::from_pairs(4, vec![(1, 0.6), (3, 0.8)]);
        let categorical = SparseRow::zeros(3);
        let numeric = SparseRow::from_dense(&[1.0, 0.0, 1.0]);

        let combined = SparseRow::hstack(&[text, categorical, numeric]);

        assert_eq!(combined.width(), 10);
        assert_eq!(combined.indices(), &[1, 3, 7, 9]);
        assert_eq!(combined.get(7), 1.0);
        assert_eq!(combined.get(8), 0.0);
    }

    #[test]
    fn test_dense_views() {
        let row = SparseRow::from_pairs(3, vec![(1, 2.0)]);
        assert_eq!(row.to_dense(), vec![0.0, 2.0, 0.0]);

        let with_missing = row.to_dense_with_missing();
        assert!(with_missing[0].is_nan());
        assert_eq!(with_missing[1], 2.0);
        assert!(with_missing[2].is_nan());
    }
}
