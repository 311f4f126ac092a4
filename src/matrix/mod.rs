use ndarray::{Array2, ArrayView2, Axis};

use crate::error::SelectError;

/// A labelled sample-by-feature matrix.
///
/// Rows are samples, columns are features. The selection core never mutates
/// a caller's matrix while evaluating leave-one-out variants; every variant
/// is derived as a fresh array. The preparation methods on this type
/// (`relative_abundance`, filters) do mutate in place and are meant to be
/// applied once, before selection starts.
#[derive(Debug, Clone)]
pub struct DataMatrix {
    values: Array2<f64>,
    sample_ids: Vec<String>,
    feature_names: Vec<String>,
}

impl DataMatrix {
    pub fn new(
        values: Array2<f64>,
        sample_ids: Vec<String>,
        feature_names: Vec<String>,
    ) -> Result<Self, SelectError> {
        let (nrows, ncols) = values.dim();
        if sample_ids.len() != nrows || feature_names.len() != ncols {
            return Err(SelectError::ShapeMismatch {
                rows: sample_ids.len(),
                cols: feature_names.len(),
                nrows,
                ncols,
            });
        }
        Ok(DataMatrix {
            values,
            sample_ids,
            feature_names,
        })
    }

    pub fn values(&self) -> ArrayView2<f64> {
        self.values.view()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Convert counts to fractional abundance: each row divided by its sum.
    pub fn relative_abundance(&mut self) {
        for mut row in self.values.rows_mut() {
            let total = row.sum();
            if total != 0.0 {
                row /= total;
            }
        }
    }

    /// Zero every entry below `limit`, then drop columns and rows that
    /// became entirely zero.
    pub fn apply_detection_limit(&mut self, limit: f64) {
        self.values.mapv_inplace(|v| if v < limit { 0.0 } else { v });
        self.drop_empty();
    }

    /// Keep a column only if its count of positive entries exceeds
    /// `round(tolerance * nrows)`.
    pub fn hard_zero_filter(&mut self, zero_tolerance: f64) {
        let nrows = self.values.nrows() as f64;
        let cutoff = (zero_tolerance * nrows).round();
        let keep: Vec<usize> = self
            .values
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, col)| col.iter().filter(|&&v| v > 0.0).count() as f64 > cutoff)
            .map(|(j, _)| j)
            .collect();
        self.retain_columns(&keep);
        self.drop_empty();
    }

    /// Remove all-zero columns, then all-zero rows.
    pub fn drop_empty(&mut self) {
        let keep_cols: Vec<usize> = self
            .values
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, col)| col.iter().any(|&v| v != 0.0))
            .map(|(j, _)| j)
            .collect();
        self.retain_columns(&keep_cols);

        let keep_rows: Vec<usize> = self
            .values
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().any(|&v| v != 0.0))
            .map(|(i, _)| i)
            .collect();
        if keep_rows.len() != self.values.nrows() {
            self.values = self.values.select(Axis(0), &keep_rows);
            self.sample_ids = keep_rows
                .iter()
                .map(|&i| self.sample_ids[i].clone())
                .collect();
        }
    }

    fn retain_columns(&mut self, keep: &[usize]) {
        if keep.len() != self.values.ncols() {
            self.values = self.values.select(Axis(1), keep);
            self.feature_names = keep
                .iter()
                .map(|&j| self.feature_names[j].clone())
                .collect();
        }
    }
}

/// Remove one index along `axis`, returning the remainder as a fresh array.
///
/// Shared by the leave-one-feature sweep (`Axis(1)`) and the jackknife
/// sample sweep (`Axis(0)`).
pub fn remove_index(data: ArrayView2<f64>, axis: Axis, index: usize) -> Array2<f64> {
    let keep: Vec<usize> = (0..data.len_of(axis)).filter(|&k| k != index).collect();
    data.select(axis, &keep)
}
