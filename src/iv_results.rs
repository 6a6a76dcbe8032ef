//! Precomputed two-stage-least-squares results
//!
//! The IV estimation runs elsewhere; this module only reads its per-round
//! output (second-stage coefficient, its standard error and the first-stage
//! F statistic) for plotting.

use crate::fixtures::de_int;
use crate::output::SummaryRow;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One model/round row of the 2SLS results file
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IvResult {
    pub model: String,
    #[serde(deserialize_with = "de_int")]
    pub stage: i64,
    /// Causal effect estimate
    pub second_stage_coefficient: f64,
    pub second_stage_std_error: f64,
    /// Instrument strength
    pub first_stage_f_stat: f64,
}

impl SummaryRow for IvResult {
    const HEADER: &'static [&'static str] = &[
        "model",
        "stage",
        "second_stage_coefficient",
        "second_stage_std_error",
        "first_stage_f_stat",
    ];
}

impl IvResult {
    /// First-stage F above `threshold` (10 is the usual rule of thumb)
    pub fn is_strong_instrument(&self, threshold: f64) -> bool {
        self.first_stage_f_stat > threshold
    }
}

pub fn load_iv_results(path: &Path) -> Result<Vec<IvResult>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open 2SLS results {}", path.display()))?;

    let mut results = Vec::new();
    for (row_num, result) in reader.deserialize().enumerate() {
        let row: IvResult = result.with_context(|| {
            format!("Failed to read row {} of {}", row_num + 1, path.display())
        })?;
        results.push(row);
    }
    log::debug!("Loaded {} 2SLS rows from {}", results.len(), path.display());
    Ok(results)
}

/// Rows of one model within an inclusive stage range, sorted by stage.
pub fn select_model(results: &[IvResult], model: &str, stages: (i64, i64)) -> Vec<IvResult> {
    let mut selected: Vec<IvResult> = results
        .iter()
        .filter(|r| r.model == model && r.stage >= stages.0 && r.stage <= stages.1)
        .cloned()
        .collect();
    selected.sort_by_key(|r| r.stage);
    selected
}
