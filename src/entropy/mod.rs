use ndarray::{Array1, Array2, ArrayView2, Axis};
use nshare::IntoNalgebra;

use crate::error::SelectError;

/// Default precision exponent: eigenvalues below `10^-8` are treated as zero.
pub const DEFAULT_EPSILON_EXPONENT: i32 = 8;

/// The cleaned eigen-spectrum of a sample-by-feature matrix, together with
/// the von Neumann entropy derived from it.
///
/// The matrix is mean-centered (and, with `normalize`, scaled by the column
/// sample standard deviation, which makes the decomposition equivalent to
/// eigendecomposing a correlation rather than a covariance matrix), run
/// through an SVD, and the squared singular values are cleaned with an
/// epsilon threshold and normalized to sum to one.
///
/// A spectrum is recomputed fresh for every matrix variant; nothing is
/// cached across leave-one-out evaluations.
#[derive(Debug, Clone)]
pub struct EntropySpectrum {
    nrows: usize,
    ncols: usize,
    column_means: Array1<f64>,
    column_stds: Option<Array1<f64>>,
    normalized_eigenvalues: Array1<f64>,
}

impl EntropySpectrum {
    /// Compute the spectrum with the default precision exponent.
    pub fn compute(data: ArrayView2<f64>, normalize: bool) -> Result<Self, SelectError> {
        Self::compute_with_epsilon(data, normalize, DEFAULT_EPSILON_EXPONENT)
    }

    /// Compute the spectrum, treating eigenvalues below
    /// `10^-epsilon_exponent` as zero.
    pub fn compute_with_epsilon(
        data: ArrayView2<f64>,
        normalize: bool,
        epsilon_exponent: i32,
    ) -> Result<Self, SelectError> {
        let (nrows, ncols) = data.dim();
        if nrows < 2 {
            return Err(SelectError::InsufficientSamples { nrows });
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(SelectError::NonNumericInput);
        }
        let epsilon = 10f64.powi(-epsilon_exponent);

        let column_means = data
            .mean_axis(Axis(0))
            .ok_or(SelectError::NonNumericInput)?;
        let mut prepared = data.to_owned();
        for mut row in prepared.rows_mut() {
            row -= &column_means;
        }

        let column_stds = if normalize {
            let stds = prepared.std_axis(Axis(0), 1.0);
            for mut row in prepared.rows_mut() {
                row /= &stds;
            }
            Some(stds)
        } else {
            None
        };

        let normalized_eigenvalues = cleaned_spectrum(prepared, epsilon);

        Ok(EntropySpectrum {
            nrows,
            ncols,
            column_means,
            column_stds,
            normalized_eigenvalues,
        })
    }

    pub fn column_means(&self) -> &Array1<f64> {
        &self.column_means
    }

    pub fn column_stds(&self) -> Option<&Array1<f64>> {
        self.column_stds.as_ref()
    }

    /// The cleaned eigenvalue vector; sums to one within floating tolerance.
    pub fn normalized_eigenvalues(&self) -> &Array1<f64> {
        &self.normalized_eigenvalues
    }

    /// Von Neumann entropy: `-sum(p * log2(p))` over strictly positive
    /// eigenvalues. Bounded by `[0, log2(min(nrows, ncols))]`.
    pub fn von_neumann_entropy(&self) -> f64 {
        self.normalized_eigenvalues
            .iter()
            .filter(|&&p| p != 0.0)
            .map(|&p| -p * p.log2())
            .sum()
    }

    /// Number of zeroed eigenvalues, adjusted for the structural rank
    /// deficiency when there are fewer rows than columns (the SVD reports
    /// only `min(nrows, ncols)` singular values; the shortfall counts as
    /// zeros too).
    pub fn zeroed_eigenvalue_count(&self) -> usize {
        let zeros = self
            .normalized_eigenvalues
            .iter()
            .filter(|&&p| p == 0.0)
            .count();
        if self.nrows < self.ncols && zeros > 0 {
            zeros + (self.ncols - self.nrows)
        } else {
            zeros
        }
    }
}

/// Convenience wrapper when only the entropy value is needed.
pub fn von_neumann_entropy(data: ArrayView2<f64>, normalize: bool) -> Result<f64, SelectError> {
    Ok(EntropySpectrum::compute(data, normalize)?.von_neumann_entropy())
}

fn cleaned_spectrum(prepared: Array2<f64>, epsilon: f64) -> Array1<f64> {
    let singular_values = prepared.into_nalgebra().singular_values();
    let mut eigenvalues =
        Array1::from_iter(singular_values.iter().map(|&s| s * s));
    eigenvalues.mapv_inplace(|e| if e < epsilon { 0.0 } else { e });

    let total = eigenvalues.sum();
    eigenvalues.mapv_inplace(|e| {
        let p = e / total;
        if p < epsilon {
            0.0
        } else {
            p
        }
    });
    eigenvalues
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn fixture() -> ndarray::Array2<f64> {
        array![[1.0, 4.0, 5.0, 12.0], [5.0, 8.0, 9.0, 0.0], [6.0, 7.0, 11.0, 19.0]]
    }

    fn sorted(values: &Array1<f64>) -> Vec<f64> {
        let mut v: Vec<f64> = values.to_vec();
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        v
    }

    #[test]
    fn test_covariance_spectrum() {
        let spectrum = EntropySpectrum::compute(fixture().view(), false).unwrap();
        let eig = sorted(spectrum.normalized_eigenvalues());
        assert_eq!(eig.len(), 3);
        assert_abs_diff_eq!(eig[0], 0.0, epsilon = 1e-8);
        assert_abs_diff_eq!(eig[1], 0.1744152, epsilon = 1e-6);
        assert_abs_diff_eq!(eig[2], 0.8255848, epsilon = 1e-6);
        assert_abs_diff_eq!(spectrum.von_neumann_entropy(), 0.66770591, epsilon = 1e-6);
    }

    #[test]
    fn test_correlation_spectrum() {
        let spectrum = EntropySpectrum::compute(fixture().view(), true).unwrap();
        let eig = sorted(spectrum.normalized_eigenvalues());
        assert_abs_diff_eq!(eig[0], 0.0, epsilon = 1e-8);
        assert_abs_diff_eq!(eig[1], 0.29255695, epsilon = 1e-6);
        assert_abs_diff_eq!(eig[2], 0.70744305, epsilon = 1e-6);
    }

    #[test]
    fn test_eigenvalues_sum_to_one_and_entropy_bounded() {
        let data = array![
            [0.2, 1.4, 3.1, 0.9, 5.0],
            [1.1, 0.3, 2.2, 4.4, 0.1],
            [2.5, 2.5, 0.7, 1.8, 3.3],
            [0.4, 3.9, 1.0, 0.2, 2.6]
        ];
        for normalize in [false, true] {
            let spectrum = EntropySpectrum::compute(data.view(), normalize).unwrap();
            assert_abs_diff_eq!(spectrum.normalized_eigenvalues().sum(), 1.0, epsilon = 1e-10);
            let entropy = spectrum.von_neumann_entropy();
            let bound = (data.nrows().min(data.ncols()) as f64).log2();
            assert!(entropy >= 0.0 && entropy <= bound + 1e-12);
        }
    }

    #[test]
    fn test_zeroed_eigenvalue_count_adjusts_for_wide_matrix() {
        // 3x4 matrix: mean-centering leaves rank 2, so one reported
        // eigenvalue is zeroed and the missing fourth counts as well.
        let spectrum = EntropySpectrum::compute(fixture().view(), false).unwrap();
        assert_eq!(spectrum.zeroed_eigenvalue_count(), 2);
    }

    #[test]
    fn test_insufficient_samples() {
        let data = array![[1.0, 2.0, 3.0]];
        let res = EntropySpectrum::compute(data.view(), false);
        assert!(matches!(
            res,
            Err(SelectError::InsufficientSamples { nrows: 1 })
        ));
    }

    #[test]
    fn test_non_numeric_input() {
        let data = array![[1.0, f64::NAN], [2.0, 3.0]];
        let res = EntropySpectrum::compute(data.view(), false);
        assert!(matches!(res, Err(SelectError::NonNumericInput)));
    }

    #[test]
    fn test_entropy_is_deterministic() {
        let data = fixture();
        let a = von_neumann_entropy(data.view(), false).unwrap();
        let b = von_neumann_entropy(data.view(), false).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
