use thiserror::Error;

/// Fatal error kinds for a selection run.
///
/// Any of these aborts the run as a whole; no partial result is returned.
/// Recoverable conditions (rank capping, bypassed empty iterations) are
/// reported as [`SelectWarning`]s attached to the result instead.
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("entropy computation requires at least 2 samples, got {nrows}")]
    InsufficientSamples { nrows: usize },

    #[error("matrix contains non-numeric (NaN or infinite) values")]
    NonNumericInput,

    #[error("no features passed the selection thresholds; relax the upper/lower factors")]
    NoFeaturesSelected,

    #[error("invalid worker count {requested}, expected 1..={available}")]
    InvalidWorkerCount { requested: usize, available: usize },

    #[error("at least one of upper_factor or lower_factor must be set")]
    EmptyThresholdConfig,

    #[error("label count does not match matrix shape: {rows} row ids / {cols} feature names for a {nrows}x{ncols} matrix")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        nrows: usize,
        ncols: usize,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Non-fatal conditions that were auto-corrected during a run.
///
/// Attached to the result so callers can log them without losing the
/// already-computed selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SelectWarning {
    /// The threshold test selected more features than the rank cap allows;
    /// the selection was trimmed by entropy deviation.
    RankCapApplied { selected: usize, rank_cap: usize },
    /// The reproducibility-filtered feature set exceeded the rank cap; the
    /// set was trimmed by occurrence count.
    JackknifeRankCapApplied { selected: usize, rank_cap: usize },
    /// A jackknife iteration selected zero features and was skipped rather
    /// than aborting the run.
    EmptySelectionBypassed { sample_index: usize },
}
