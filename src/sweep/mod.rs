use ndarray::{ArrayView2, Axis};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::entropy::von_neumann_entropy;
use crate::error::SelectError;
use crate::matrix::remove_index;

/// Build the worker pool shared by the feature sweep and the jackknife
/// iterations. `num_cpu` must be between 1 and the available parallelism.
pub fn worker_pool(num_cpu: usize) -> Result<ThreadPool, SelectError> {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if num_cpu == 0 || num_cpu > available {
        return Err(SelectError::InvalidWorkerCount {
            requested: num_cpu,
            available,
        });
    }
    Ok(ThreadPoolBuilder::new().num_threads(num_cpu).build()?)
}

/// One row of the leave-one-feature-out entropy table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProfileEntry {
    pub feature_index: usize,
    pub feature_name: String,
    pub entropy: f64,
}

/// The leave-one-feature-out entropy table: one entry per original feature,
/// ordered by feature index, plus the rank cap `min(rows, cols)` of the
/// matrix it was computed from.
#[derive(Debug, Clone)]
pub struct FeatureEntropyProfile {
    entries: Vec<ProfileEntry>,
    rank_cap: usize,
}

impl FeatureEntropyProfile {
    /// Assemble a profile from precomputed rows, e.g. when replaying a
    /// persisted entropy table. `rank_cap` must be the `min(rows, cols)` of
    /// the matrix the rows were derived from.
    pub fn from_entries(entries: Vec<ProfileEntry>, rank_cap: usize) -> Self {
        FeatureEntropyProfile { entries, rank_cap }
    }

    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    pub fn rank_cap(&self) -> usize {
        self.rank_cap
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entropies(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.entropy)
    }
}

/// For every feature index `i`, delete column `i` and compute the von
/// Neumann entropy of the remainder.
///
/// Work items run on the pool and may complete in any order; each carries
/// its originating feature index and results are scatter-written by that
/// index so the profile is always ordered by the original feature position.
pub fn feature_entropy_profile(
    data: ArrayView2<f64>,
    feature_names: &[String],
    normalize: bool,
    pool: &ThreadPool,
) -> Result<FeatureEntropyProfile, SelectError> {
    let (nrows, ncols) = data.dim();
    if feature_names.len() != ncols {
        return Err(SelectError::ShapeMismatch {
            rows: nrows,
            cols: feature_names.len(),
            nrows,
            ncols,
        });
    }
    log::debug!(
        "leave-one-feature sweep over {} features ({} samples, {} workers)",
        ncols,
        nrows,
        pool.current_num_threads()
    );

    let indexed: Vec<(usize, f64)> = pool.install(|| {
        (0..ncols)
            .into_par_iter()
            .map(|i| {
                let subset = remove_index(data, Axis(1), i);
                Ok((i, von_neumann_entropy(subset.view(), normalize)?))
            })
            .collect::<Result<_, SelectError>>()
    })?;

    let mut by_index = vec![0.0; ncols];
    for (i, entropy) in indexed {
        by_index[i] = entropy;
    }

    let entries = by_index
        .into_iter()
        .enumerate()
        .map(|(i, entropy)| ProfileEntry {
            feature_index: i,
            feature_name: feature_names[i].clone(),
            entropy,
        })
        .collect();

    Ok(FeatureEntropyProfile {
        entries,
        rank_cap: nrows.min(ncols),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("col{i}")).collect()
    }

    #[test]
    fn test_feature_entropy_profile() {
        let data = array![[1.0, 4.0, 5.0, 12.0], [5.0, 8.0, 9.0, 0.0], [6.0, 7.0, 11.0, 19.0]];
        let pool = worker_pool(1).unwrap();
        let profile = feature_entropy_profile(data.view(), &names(4), false, &pool).unwrap();

        let expected = [0.529410, 0.602077, 0.478102, 0.268291];
        assert_eq!(profile.len(), 4);
        assert_eq!(profile.rank_cap(), 3);
        for (entry, want) in profile.entries().iter().zip(expected) {
            assert_abs_diff_eq!(entry.entropy, want, epsilon = 1e-6);
        }
        assert_eq!(profile.entries()[1].feature_name, "col2");
        assert_eq!(profile.entries()[1].feature_index, 1);
    }

    #[test]
    fn test_profile_order_independent_of_worker_count() {
        let data = array![
            [0.2, 1.4, 3.1, 0.9, 5.0],
            [1.1, 0.3, 2.2, 4.4, 0.1],
            [2.5, 2.5, 0.7, 1.8, 3.3],
            [0.4, 3.9, 1.0, 0.2, 2.6]
        ];
        let serial = worker_pool(1).unwrap();
        let profile_serial =
            feature_entropy_profile(data.view(), &names(5), false, &serial).unwrap();

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let parallel = worker_pool(workers).unwrap();
        let profile_parallel =
            feature_entropy_profile(data.view(), &names(5), false, &parallel).unwrap();

        assert_eq!(profile_serial.entries(), profile_parallel.entries());
    }

    #[test]
    fn test_invalid_worker_count() {
        assert!(matches!(
            worker_pool(0),
            Err(SelectError::InvalidWorkerCount { requested: 0, .. })
        ));
        assert!(matches!(
            worker_pool(usize::MAX),
            Err(SelectError::InvalidWorkerCount { .. })
        ));
    }

    #[test]
    fn test_name_count_mismatch() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        let pool = worker_pool(1).unwrap();
        let res = feature_entropy_profile(data.view(), &names(3), false, &pool);
        assert!(matches!(res, Err(SelectError::ShapeMismatch { .. })));
    }
}
