use serde::{Deserialize, Serialize};

/// A dense, row-major matrix of `f64` values.
///
/// Data points and covariates cross the plugin boundary as rows of one of
/// these, so the layout is fixed and the accessors are deliberately few.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    n_rows: usize,
    n_cols: usize,
    values: Vec<f64>,
}

impl Matrix {
    /// Create a matrix from a flat row-major buffer.
    ///
    /// # Panics
    /// Panics if `values.len() != n_rows * n_cols`.
    pub fn from_raw_parts(values: Vec<f64>, n_rows: usize, n_cols: usize) -> Self {
        assert_eq!(
            values.len(),
            n_rows * n_cols,
            "{} values cannot fill a {} x {} matrix",
            values.len(),
            n_rows,
            n_cols,
        );
        Self {
            n_rows,
            n_cols,
            values,
        }
    }

    /// Create a matrix from a set of equal-length rows.
    ///
    /// # Panics
    /// Panics if the rows are ragged.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, |row| row.len());
        let mut values = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            assert_eq!(row.len(), n_cols, "ragged rows");
            values.extend_from_slice(row);
        }
        Self {
            n_rows,
            n_cols,
            values,
        }
    }

    /// A single-column matrix over univariate data.
    pub fn from_column(xs: &[f64]) -> Self {
        Self {
            n_rows: xs.len(),
            n_cols: 1,
            values: xs.to_vec(),
        }
    }

    /// An empty (0 x 0) matrix, used as the "no covariates" marker.
    pub fn empty() -> Self {
        Self {
            n_rows: 0,
            n_cols: 0,
            values: Vec::new(),
        }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow row `ix`.
    ///
    /// # Panics
    /// Panics if `ix >= n_rows`.
    #[inline]
    pub fn row(&self, ix: usize) -> &[f64] {
        let start = ix * self.n_cols;
        &self.values[start..start + self.n_cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.n_cols.max(1)).take(self.n_rows)
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_views_follow_row_major_order() {
        let m = Matrix::from_raw_parts(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        assert_eq!(m.row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn from_rows_round_trips_through_rows_iter() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let m = Matrix::from_rows(&rows);
        let out: Vec<Vec<f64>> = m.rows().map(<[f64]>::to_vec).collect();
        assert_eq!(out, rows);
    }

    #[test]
    fn from_column_is_nx1() {
        let m = Matrix::from_column(&[0.5, 1.5]);
        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.n_cols(), 1);
        assert_eq!(m.row(1), &[1.5]);
    }

    #[test]
    #[should_panic]
    fn from_raw_parts_rejects_shape_mismatch() {
        let _ = Matrix::from_raw_parts(vec![1.0, 2.0, 3.0], 2, 2);
    }

    #[test]
    fn empty_matrix_has_no_rows() {
        let m = Matrix::empty();
        assert_eq!(m.n_rows(), 0);
        assert!(m.is_empty());
        assert_eq!(m.rows().count(), 0);
    }
}
