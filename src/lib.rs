//! Entropy-based information-rich feature selection.
//!
//! Ranks the features (columns) of a sample-by-feature matrix by how much
//! each one contributes to the spectral (von Neumann) entropy of the data,
//! selects the outliers against standard-deviation thresholds, and
//! estimates the stability of that selection with a leave-one-sample-out
//! jackknife.

pub mod entropy;
pub mod error;
pub mod jackknife;
pub mod matrix;
pub mod pipeline;
pub mod selection;
pub mod sweep;

pub use entropy::{von_neumann_entropy, EntropySpectrum};
pub use error::{SelectError, SelectWarning};
pub use jackknife::{
    jackknife_reproducibility, IterationSink, JackknifeReport, NullSink, ReproducibilityRow,
    ReproducibilityTally,
};
pub use matrix::DataMatrix;
pub use pipeline::{
    FeatureSelector, FeatureSelectorBuilder, FilterMethod, RunMode, SelectionOutcome,
};
pub use selection::{
    EntropySource, SelectionResult, SelectionRow, ThresholdConfig, ThresholdSelector,
};
pub use sweep::{feature_entropy_profile, worker_pool, FeatureEntropyProfile, ProfileEntry};
