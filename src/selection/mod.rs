use ndarray::ArrayView2;
use rayon::ThreadPool;

use crate::error::{SelectError, SelectWarning};
use crate::sweep::{feature_entropy_profile, FeatureEntropyProfile};

/// Upper/lower selection bounds expressed as multiples of the standard
/// deviation of the entropy profile. At least one bound must be set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdConfig {
    upper_factor: Option<f64>,
    lower_factor: Option<f64>,
}

impl ThresholdConfig {
    pub fn new(
        upper_factor: Option<f64>,
        lower_factor: Option<f64>,
    ) -> Result<Self, SelectError> {
        if upper_factor.is_none() && lower_factor.is_none() {
            return Err(SelectError::EmptyThresholdConfig);
        }
        Ok(ThresholdConfig {
            upper_factor,
            lower_factor,
        })
    }

    pub fn upper_factor(&self) -> Option<f64> {
        self.upper_factor
    }

    pub fn lower_factor(&self) -> Option<f64> {
        self.lower_factor
    }
}

/// Where the entropy profile comes from.
///
/// `Raw` computes the leave-one-feature sweep here; `Precomputed` replays a
/// profile produced earlier (the replay path tolerates empty selections
/// instead of failing with [`SelectError::NoFeaturesSelected`]).
pub enum EntropySource<'a> {
    Raw {
        data: ArrayView2<'a, f64>,
        feature_names: &'a [String],
    },
    Precomputed(FeatureEntropyProfile),
}

/// One row of the selection table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SelectionRow {
    pub feature_index: usize,
    pub feature_name: String,
    pub entropy: f64,
    pub selected: bool,
    /// Distance metric used to rank selected features when the rank cap is
    /// exceeded; only populated when capping occurred.
    pub deviation: Option<f64>,
    /// Selection flag before rank capping; only populated when capping
    /// occurred.
    pub selected_before_cap: Option<bool>,
}

/// The outcome of threshold-driven selection: the per-feature table, the
/// absolute thresholds applied, the rank cap, and any warnings raised.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    rows: Vec<SelectionRow>,
    upper_threshold: Option<f64>,
    lower_threshold: Option<f64>,
    rank_cap: usize,
    warnings: Vec<SelectWarning>,
}

impl SelectionResult {
    pub fn rows(&self) -> &[SelectionRow] {
        &self.rows
    }

    pub fn upper_threshold(&self) -> Option<f64> {
        self.upper_threshold
    }

    pub fn lower_threshold(&self) -> Option<f64> {
        self.lower_threshold
    }

    pub fn rank_cap(&self) -> usize {
        self.rank_cap
    }

    pub fn warnings(&self) -> &[SelectWarning] {
        &self.warnings
    }

    pub fn selected_count(&self) -> usize {
        self.rows.iter().filter(|r| r.selected).count()
    }

    /// Selected feature names in original feature order.
    pub fn selected_features(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.selected)
            .map(|r| r.feature_name.as_str())
            .collect()
    }
}

/// Selects information-rich features from an entropy profile.
///
/// A feature is selected when its leave-one-out entropy lies beyond
/// `mean ± factor·std` of the profile. If more features pass than the rank
/// cap `min(rows, cols)` allows, the selection is trimmed by entropy
/// deviation (stable, ties keep original feature order) and the cap is
/// reported as a warning rather than an error.
#[derive(Debug, Clone)]
pub struct ThresholdSelector {
    config: ThresholdConfig,
    normalize: bool,
    force_empty_output: bool,
}

impl ThresholdSelector {
    pub fn new(config: ThresholdConfig) -> Self {
        ThresholdSelector {
            config,
            normalize: false,
            force_empty_output: false,
        }
    }

    /// Use the correlation-equivalent entropy instead of the covariance
    /// form when computing profiles from raw data.
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Tolerate an empty selection instead of failing. Implied when the
    /// source is a precomputed profile.
    pub fn force_empty_output(mut self, force: bool) -> Self {
        self.force_empty_output = force;
        self
    }

    pub fn select(
        &self,
        source: EntropySource,
        pool: &ThreadPool,
    ) -> Result<SelectionResult, SelectError> {
        let (profile, force_output) = match source {
            EntropySource::Raw {
                data,
                feature_names,
            } => (
                feature_entropy_profile(data, feature_names, self.normalize, pool)?,
                self.force_empty_output,
            ),
            EntropySource::Precomputed(profile) => (profile, true),
        };

        let entropies: Vec<f64> = profile.entropies().collect();
        let mean = entropies.iter().sum::<f64>() / entropies.len() as f64;
        let std = sample_std(&entropies, mean);

        let upper_threshold = self.config.upper_factor().map(|f| mean + f * std);
        let lower_threshold = self.config.lower_factor().map(|f| mean - f * std);

        let mut rows: Vec<SelectionRow> = profile
            .entries()
            .iter()
            .map(|entry| {
                let above = upper_threshold.is_some_and(|t| entry.entropy > t);
                let below = lower_threshold.is_some_and(|t| entry.entropy < t);
                SelectionRow {
                    feature_index: entry.feature_index,
                    feature_name: entry.feature_name.clone(),
                    entropy: entry.entropy,
                    selected: above || below,
                    deviation: None,
                    selected_before_cap: None,
                }
            })
            .collect();

        let selected = rows.iter().filter(|r| r.selected).count();
        if selected == 0 && !force_output {
            return Err(SelectError::NoFeaturesSelected);
        }

        let rank_cap = profile.rank_cap();
        let mut warnings = Vec::new();
        if selected > rank_cap {
            log::warn!(
                "{selected} features passed the thresholds but the rank cap is {rank_cap}; trimming by entropy deviation"
            );
            warnings.push(SelectWarning::RankCapApplied { selected, rank_cap });
            self.apply_rank_cap(&mut rows, mean, rank_cap);
        }

        Ok(SelectionResult {
            rows,
            upper_threshold,
            lower_threshold,
            rank_cap,
            warnings,
        })
    }

    fn apply_rank_cap(&self, rows: &mut [SelectionRow], mean: f64, rank_cap: usize) {
        for row in rows.iter_mut() {
            row.deviation = Some(self.deviation(row.entropy, mean));
            row.selected_before_cap = Some(row.selected);
        }

        // Stable sort: ties keep original feature order.
        let mut ranked: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.selected)
            .map(|(i, _)| i)
            .collect();
        ranked.sort_by(|&a, &b| {
            rows[b]
                .deviation
                .partial_cmp(&rows[a].deviation)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for &i in &ranked[rank_cap..] {
            rows[i].selected = false;
        }
    }

    /// Distance-from-mean metric used to rank capped selections. The shape
    /// depends on which bounds are active.
    fn deviation(&self, entropy: f64, mean: f64) -> f64 {
        let dev = entropy - mean;
        match (
            self.config.upper_factor().is_some(),
            self.config.lower_factor().is_some(),
        ) {
            (true, true) => (dev - mean).abs(),
            (true, false) => dev - mean,
            _ => dev,
        }
    }
}

fn sample_std(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (ss / (n - 1) as f64).sqrt()
}
