//! Contingency tables and the chi-square test of independence
//!
//! Mirrors the usual `crosstab` + `chi2_contingency` workflow: counts of two
//! categorical variables are cross-tabulated, the expected frequencies under
//! independence are derived from the margins, and the Pearson statistic is
//! compared against a chi-square distribution.

use anyhow::{bail, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::collections::{BTreeMap, BTreeSet};

/// Observed counts of two categorical variables
///
/// Rows and columns are sorted ascending and only contain categories that
/// were actually observed, so no row or column sums to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyTable<R, C> {
    rows: Vec<R>,
    cols: Vec<C>,
    counts: Vec<Vec<u64>>,
}

impl<R: Ord + Clone, C: Ord + Clone> ContingencyTable<R, C> {
    /// Cross-tabulate `(row, column)` category pairs.
    pub fn crosstab<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (R, C)>,
    {
        let mut cells: BTreeMap<R, BTreeMap<C, u64>> = BTreeMap::new();
        let mut col_set: BTreeSet<C> = BTreeSet::new();

        for (r, c) in pairs {
            col_set.insert(c.clone());
            *cells.entry(r).or_default().entry(c).or_insert(0) += 1;
        }

        let cols: Vec<C> = col_set.into_iter().collect();
        let mut rows = Vec::with_capacity(cells.len());
        let mut counts = Vec::with_capacity(cells.len());
        for (r, row_cells) in cells {
            counts.push(
                cols.iter()
                    .map(|c| row_cells.get(c).copied().unwrap_or(0))
                    .collect(),
            );
            rows.push(r);
        }

        Self { rows, cols, counts }
    }
}

impl<R, C> ContingencyTable<R, C> {
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn cols(&self) -> &[C] {
        &self.cols
    }

    /// counts[row][col]
    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.cols.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn row_sums(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn col_sums(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.cols.len()];
        for row in &self.counts {
            for (j, v) in row.iter().enumerate() {
                sums[j] += v;
            }
        }
        sums
    }

    /// Counts as floats, the shape the heatmap renderer takes
    pub fn counts_f64(&self) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .map(|row| row.iter().map(|&v| v as f64).collect())
            .collect()
    }
}

/// Result of a chi-square independence test
#[derive(Debug, Clone, PartialEq)]
pub struct ChiSquareTest {
    /// Pearson chi-square statistic (Yates-corrected when dof is 1)
    pub statistic: f64,
    pub p_value: f64,
    /// (rows - 1) * (columns - 1)
    pub dof: usize,
    /// Expected frequencies under independence, expected[row][col]
    pub expected: Vec<Vec<f64>>,
}

impl ChiSquareTest {
    pub fn expected_total(&self) -> f64 {
        self.expected.iter().flatten().sum()
    }

    /// Whether independence is rejected at significance level `alpha`
    pub fn rejects_independence(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Chi-square test of independence with Yates' correction for 2x2 tables.
pub fn chi2_contingency<R, C>(table: &ContingencyTable<R, C>) -> Result<ChiSquareTest> {
    chi2_contingency_with(table, true)
}

/// Chi-square test of independence.
///
/// When `correction` is set and the table has one degree of freedom, each
/// observed count is moved half a unit toward its expected value (never
/// past it) before the statistic is computed.
pub fn chi2_contingency_with<R, C>(
    table: &ContingencyTable<R, C>,
    correction: bool,
) -> Result<ChiSquareTest> {
    if table.is_empty() {
        bail!("Cannot run a chi-square test on an empty contingency table");
    }

    let (n_rows, n_cols) = table.shape();
    let row_sums = table.row_sums();
    let col_sums = table.col_sums();
    let total = table.total() as f64;

    let expected: Vec<Vec<f64>> = row_sums
        .iter()
        .map(|&r| {
            col_sums
                .iter()
                .map(|&c| r as f64 * c as f64 / total)
                .collect()
        })
        .collect();

    if expected.iter().flatten().any(|&e| e <= 0.0) {
        bail!("Contingency table has a zero expected frequency");
    }

    let dof = (n_rows - 1) * (n_cols - 1);
    if dof == 0 {
        return Ok(ChiSquareTest {
            statistic: 0.0,
            p_value: 1.0,
            dof,
            expected,
        });
    }

    let yates = correction && dof == 1;
    let mut statistic = 0.0;
    for (obs_row, exp_row) in table.counts.iter().zip(&expected) {
        for (&o, &e) in obs_row.iter().zip(exp_row) {
            let mut diff = o as f64 - e;
            if yates {
                diff = diff.signum() * (diff.abs() - 0.5).max(0.0);
            }
            statistic += diff * diff / e;
        }
    }

    let dist = ChiSquared::new(dof as f64)
        .map_err(|e| anyhow::anyhow!("Invalid chi-square distribution (dof {}): {}", dof, e))?;
    let p_value = dist.sf(statistic).clamp(0.0, 1.0);

    Ok(ChiSquareTest {
        statistic,
        p_value,
        dof,
        expected,
    })
}
