use crate::error::{SelectError, SelectWarning};
use crate::jackknife::{
    jackknife_reproducibility, IterationSink, NullSink, ReproducibilityRow,
};
use crate::matrix::DataMatrix;
use crate::selection::{EntropySource, SelectionResult, ThresholdConfig, ThresholdSelector};
use crate::sweep::worker_pool;

/// Column filter applied before selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterMethod {
    None,
    /// Drop columns whose fraction of positive entries does not exceed the
    /// given zero-tolerance level.
    HardZeroFraction(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Single full-data selection; every selected feature is reported at
    /// implicit 100 % reproducibility.
    Quick,
    /// Full leave-one-sample-out reproducibility estimation.
    Full,
}

pub struct FeatureSelectorBuilder {
    threshold: ThresholdConfig,
    normalize: bool,
    num_workers: usize,
    mode: RunMode,
    reproducibility_threshold: u32,
    filter: FilterMethod,
    relative_abundance: bool,
    detection_limit: Option<f64>,
}

impl FeatureSelectorBuilder {
    pub fn new(threshold: ThresholdConfig) -> Self {
        FeatureSelectorBuilder {
            threshold,
            normalize: false,
            num_workers: 1,
            mode: RunMode::Full,
            reproducibility_threshold: 1,
            filter: FilterMethod::None,
            relative_abundance: false,
            detection_limit: None,
        }
    }

    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn reproducibility_threshold(mut self, threshold: u32) -> Self {
        self.reproducibility_threshold = threshold;
        self
    }

    pub fn filter(mut self, filter: FilterMethod) -> Self {
        self.filter = filter;
        self
    }

    /// Convert counts to fractional abundance before selection.
    pub fn relative_abundance(mut self, enable: bool) -> Self {
        self.relative_abundance = enable;
        self
    }

    pub fn detection_limit(mut self, limit: f64) -> Self {
        self.detection_limit = Some(limit);
        self
    }

    pub fn build(self) -> FeatureSelector {
        FeatureSelector {
            threshold: self.threshold,
            normalize: self.normalize,
            num_workers: self.num_workers,
            mode: self.mode,
            reproducibility_threshold: self.reproducibility_threshold,
            filter: self.filter,
            relative_abundance: self.relative_abundance,
            detection_limit: self.detection_limit,
        }
    }
}

/// Everything a run produces: the detailed selection table, the
/// reproducibility table, the final feature list, and the warnings raised
/// along the way.
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    detail: SelectionResult,
    reproducibility: Vec<ReproducibilityRow>,
    final_features: Vec<String>,
    warnings: Vec<SelectWarning>,
}

impl SelectionOutcome {
    /// The full-data per-feature selection table.
    pub fn detail(&self) -> &SelectionResult {
        &self.detail
    }

    pub fn reproducibility(&self) -> &[ReproducibilityRow] {
        &self.reproducibility
    }

    pub fn final_features(&self) -> &[String] {
        &self.final_features
    }

    pub fn warnings(&self) -> &[SelectWarning] {
        &self.warnings
    }
}

/// Front door of the crate: wires matrix preparation, the threshold
/// selector, and (in full mode) the jackknife reproducibility estimator.
pub struct FeatureSelector {
    threshold: ThresholdConfig,
    normalize: bool,
    num_workers: usize,
    mode: RunMode,
    reproducibility_threshold: u32,
    filter: FilterMethod,
    relative_abundance: bool,
    detection_limit: Option<f64>,
}

impl FeatureSelector {
    pub fn run(&self, matrix: &DataMatrix) -> Result<SelectionOutcome, SelectError> {
        self.run_with_sink(matrix, &mut NullSink)
    }

    /// Like [`run`](Self::run), but streams every jackknife iteration's
    /// detail table to `sink`.
    pub fn run_with_sink(
        &self,
        matrix: &DataMatrix,
        sink: &mut dyn IterationSink,
    ) -> Result<SelectionOutcome, SelectError> {
        let pool = worker_pool(self.num_workers)?;
        let prepared = self.prepare(matrix);
        log::info!(
            "selecting information-rich features from a {}x{} matrix ({:?} mode)",
            prepared.nrows(),
            prepared.ncols(),
            self.mode
        );

        let selector = ThresholdSelector::new(self.threshold).normalize(self.normalize);
        let detail = selector.select(
            EntropySource::Raw {
                data: prepared.values(),
                feature_names: prepared.feature_names(),
            },
            &pool,
        )?;
        let mut warnings = detail.warnings().to_vec();

        let (reproducibility, final_features) = match self.mode {
            RunMode::Quick => {
                let n = prepared.nrows() as u32;
                let rows: Vec<ReproducibilityRow> = detail
                    .selected_features()
                    .into_iter()
                    .map(|name| ReproducibilityRow {
                        feature_name: name.to_string(),
                        occurrence: n,
                        percentage: 100.0,
                    })
                    .collect();
                let features: Vec<String> =
                    rows.iter().map(|r| r.feature_name.clone()).collect();
                (rows, features)
            }
            RunMode::Full => {
                let report = jackknife_reproducibility(
                    prepared.values(),
                    prepared.feature_names(),
                    &selector,
                    self.reproducibility_threshold,
                    &pool,
                    sink,
                )?;
                warnings.extend_from_slice(report.warnings());
                let features: Vec<String> = report
                    .final_features()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                (report.rows().to_vec(), features)
            }
        };

        log::info!("{} information-rich features reported", final_features.len());
        Ok(SelectionOutcome {
            detail,
            reproducibility,
            final_features,
            warnings,
        })
    }

    fn prepare(&self, matrix: &DataMatrix) -> DataMatrix {
        let mut prepared = matrix.clone();
        if self.relative_abundance {
            prepared.relative_abundance();
        }
        if let Some(limit) = self.detection_limit {
            prepared.apply_detection_limit(limit);
        }
        if let FilterMethod::HardZeroFraction(tolerance) = self.filter {
            prepared.hard_zero_filter(tolerance);
        }
        prepared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn fixture_matrix() -> DataMatrix {
        let counts = array![
            [10.0, 1.0, 2.0, 0.0, 12.0, 50.0],
            [21.0, 4.0, 4.0, 1.0, 17.0, 30.0],
            [42.0, 10.0, 2.0, 0.0, 18.0, 26.0],
            [21.0, 6.0, 3.0, 0.0, 30.0, 23.0],
            [45.0, 14.0, 1.0, 0.0, 14.0, 25.0],
            [0.0, 14.0, 13.0, 0.0, 1.0, 4.0]
        ];
        let samples = (1..=6).map(|i| format!("sample{i}")).collect();
        let features = (1..=6).map(|i| format!("col{i}")).collect();
        DataMatrix::new(counts, samples, features).unwrap()
    }

    fn config() -> ThresholdConfig {
        let _ = env_logger::builder().is_test(true).try_init();
        ThresholdConfig::new(Some(1.0), Some(1.0)).unwrap()
    }

    #[test]
    fn test_quick_mode_reports_full_reproducibility() {
        let selector = FeatureSelectorBuilder::new(config())
            .mode(RunMode::Quick)
            .relative_abundance(true)
            .build();
        let outcome = selector.run(&fixture_matrix()).unwrap();

        assert_eq!(outcome.final_features(), &["col2", "col3", "col6"]);
        assert!(outcome.warnings().is_empty());
        for row in outcome.reproducibility() {
            assert_eq!(row.percentage, 100.0);
            assert_eq!(row.occurrence, 6);
        }
    }

    #[test]
    fn test_full_mode_orders_by_first_selection() {
        let selector = FeatureSelectorBuilder::new(config())
            .mode(RunMode::Full)
            .relative_abundance(true)
            .build();
        let outcome = selector.run(&fixture_matrix()).unwrap();

        assert_eq!(
            outcome.final_features(),
            &["col3", "col5", "col2", "col6", "col1"]
        );
        // The full-data detail table is reported alongside.
        assert_eq!(outcome.detail().selected_features(), vec!["col2", "col3", "col6"]);
    }

    #[test]
    fn test_full_mode_with_min_occurrence() {
        let selector = FeatureSelectorBuilder::new(config())
            .mode(RunMode::Full)
            .reproducibility_threshold(3)
            .relative_abundance(true)
            .build();
        let outcome = selector.run(&fixture_matrix()).unwrap();
        assert_eq!(outcome.final_features(), &["col3", "col2", "col6"]);
    }

    #[test]
    fn test_invalid_worker_count_checked_up_front() {
        let selector = FeatureSelectorBuilder::new(config())
            .num_workers(0)
            .build();
        let res = selector.run(&fixture_matrix());
        assert!(matches!(
            res,
            Err(SelectError::InvalidWorkerCount { requested: 0, .. })
        ));
    }

    #[test]
    fn test_hard_filter_runs_on_prepared_matrix() {
        // col4 has a single positive entry; at tolerance 0.6 it is dropped
        // before selection, so the detail table has five rows.
        let selector = FeatureSelectorBuilder::new(config())
            .mode(RunMode::Quick)
            .relative_abundance(true)
            .filter(FilterMethod::HardZeroFraction(0.6))
            .build();
        let outcome = selector.run(&fixture_matrix()).unwrap();
        assert_eq!(outcome.detail().rows().len(), 5);
        assert!(!outcome
            .detail()
            .rows()
            .iter()
            .any(|r| r.feature_name == "col4"));
    }
}
