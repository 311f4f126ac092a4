use std::collections::HashMap;

use ndarray::{ArrayView2, Axis};
use rayon::ThreadPool;

use crate::error::{SelectError, SelectWarning};
use crate::matrix::remove_index;
use crate::selection::{EntropySource, SelectionResult, ThresholdSelector};

/// Receives the detailed selection table of every jackknife iteration.
///
/// Persisting the tables (the original tool writes one CSV per iteration)
/// is the caller's responsibility; the core only hands them over, keeping
/// I/O out of the resampling loop.
pub trait IterationSink {
    fn record(&mut self, sample_index: usize, result: &SelectionResult);
}

/// Discards iteration details.
pub struct NullSink;

impl IterationSink for NullSink {
    fn record(&mut self, _sample_index: usize, _result: &SelectionResult) {}
}

/// Occurrence counts per feature across jackknife iterations, in first-seen
/// order.
#[derive(Debug, Clone, Default)]
pub struct ReproducibilityTally {
    order: Vec<String>,
    counts: HashMap<String, u32>,
}

impl ReproducibilityTally {
    fn record(&mut self, feature_name: &str) {
        match self.counts.get_mut(feature_name) {
            Some(count) => *count += 1,
            None => {
                self.order.push(feature_name.to_string());
                self.counts.insert(feature_name.to_string(), 1);
            }
        }
    }

    pub fn count(&self, feature_name: &str) -> u32 {
        self.counts.get(feature_name).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.order
            .iter()
            .map(|name| (name.as_str(), self.counts[name]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// One row of the reproducibility report.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReproducibilityRow {
    pub feature_name: String,
    pub occurrence: u32,
    pub percentage: f64,
}

/// The stability report of a full jackknife run: the filtered (and, if
/// necessary, rank-capped) reproducibility table and the final feature
/// list derived from it.
#[derive(Debug, Clone)]
pub struct JackknifeReport {
    rows: Vec<ReproducibilityRow>,
    warnings: Vec<SelectWarning>,
    n_iterations: usize,
}

impl JackknifeReport {
    pub fn rows(&self) -> &[ReproducibilityRow] {
        &self.rows
    }

    pub fn warnings(&self) -> &[SelectWarning] {
        &self.warnings
    }

    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    pub fn final_features(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.feature_name.as_str()).collect()
    }
}

/// Leave-one-sample-out reproducibility of the selection.
///
/// For every sample index, the sample is removed and the full feature sweep
/// plus threshold selection is repeated on the remainder with the same
/// feature set and configuration; empty iterations are tolerated. Distinct
/// warnings raised inside individual iterations are folded into the
/// report's warning list. The iterations run serially and each reuses
/// `pool` for its internal feature sweep, so parallelism stays bounded by
/// the pool size.
pub fn jackknife_reproducibility(
    data: ArrayView2<f64>,
    feature_names: &[String],
    selector: &ThresholdSelector,
    reproducibility_threshold: u32,
    pool: &ThreadPool,
    sink: &mut dyn IterationSink,
) -> Result<JackknifeReport, SelectError> {
    let (nrows, ncols) = data.dim();
    let rank_cap = nrows.min(ncols);
    let replay_selector = selector.clone().force_empty_output(true);

    let mut tally = ReproducibilityTally::default();
    let mut warnings = Vec::new();
    for j in 0..nrows {
        let subset = remove_index(data, Axis(0), j);
        let result = replay_selector.select(
            EntropySource::Raw {
                data: subset.view(),
                feature_names,
            },
            pool,
        )?;

        if result.selected_count() == 0 {
            log::warn!("jackknife iteration {j} selected no features; skipping");
            warnings.push(SelectWarning::EmptySelectionBypassed { sample_index: j });
        }
        // Warnings raised inside an iteration's selection would otherwise
        // only be visible through the sink; fold the distinct ones into
        // the report.
        for warning in result.warnings() {
            if !warnings.contains(warning) {
                warnings.push(*warning);
            }
        }
        for name in result.selected_features() {
            tally.record(name);
        }
        sink.record(j, &result);
    }

    let (rows, cap_warning) =
        summarize_tally(&tally, nrows, reproducibility_threshold, rank_cap);
    warnings.extend(cap_warning);

    Ok(JackknifeReport {
        rows,
        warnings,
        n_iterations: nrows,
    })
}

/// Filter the tally by minimum occurrence, convert counts to percentages,
/// and enforce the rank cap (tie-broken by occurrence, descending, stable).
fn summarize_tally(
    tally: &ReproducibilityTally,
    n_iterations: usize,
    reproducibility_threshold: u32,
    rank_cap: usize,
) -> (Vec<ReproducibilityRow>, Option<SelectWarning>) {
    let mut rows: Vec<ReproducibilityRow> = tally
        .iter()
        .filter(|&(_, count)| count >= reproducibility_threshold)
        .map(|(name, occurrence)| ReproducibilityRow {
            feature_name: name.to_string(),
            occurrence,
            percentage: occurrence as f64 / n_iterations as f64 * 100.0,
        })
        .collect();

    if rows.len() > rank_cap {
        let selected = rows.len();
        log::warn!(
            "{selected} features passed the reproducibility threshold but the rank cap is {rank_cap}; trimming by occurrence"
        );
        rows.sort_by(|a, b| b.occurrence.cmp(&a.occurrence));
        rows.truncate(rank_cap);
        (
            rows,
            Some(SelectWarning::JackknifeRankCapApplied { selected, rank_cap }),
        )
    } else {
        (rows, None)
    }
}
