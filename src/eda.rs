//! Exploratory aggregates behind the EDA charts

use crate::fixtures::{FixtureRecord, Variable};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Correlation
// ============================================================================

/// Pairwise Pearson correlations between fixture variables
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub variables: Vec<Variable>,
    /// values[i][j] = corr(variables[i], variables[j])
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: Variable, b: Variable) -> Option<f64> {
        let i = self.variables.iter().position(|&v| v == a)?;
        let j = self.variables.iter().position(|&v| v == b)?;
        Some(self.values[i][j])
    }

    pub fn labels(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.label().to_string()).collect()
    }
}

/// Pearson correlation of every variable pair, using the rows where both
/// values are present. Fewer than two such rows, or a constant variable,
/// gives NaN.
pub fn correlation_matrix(records: &[&FixtureRecord], variables: &[Variable]) -> CorrelationMatrix {
    let columns: Vec<Vec<Option<f64>>> = variables
        .iter()
        .map(|v| records.iter().map(|r| v.value(r)).collect())
        .collect();

    let n = variables.len();
    let mut values = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(&columns[i], &columns[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix {
        variables: variables.to_vec(),
        values,
    }
}

fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

// ============================================================================
// Grouped means
// ============================================================================

/// Mean of an outcome per (group, series) cell, laid out for a grouped bar
/// chart: `values[series][group]`, `None` where a cell has no rows.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedMeans {
    pub groups: Vec<String>,
    pub series: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl GroupedMeans {
    pub fn get(&self, group: &str, series: &str) -> Option<f64> {
        let g = self.groups.iter().position(|x| x == group)?;
        let s = self.series.iter().position(|x| x == series)?;
        self.values[s][g]
    }
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn collect_means<G: Ord + Copy, S: Ord + Copy>(
    cells: &BTreeMap<(G, S), Mean>,
    groups: &[G],
    series: &[S],
) -> Vec<Vec<Option<f64>>> {
    series
        .iter()
        .map(|&s| {
            groups
                .iter()
                .map(|&g| cells.get(&(g, s)).and_then(Mean::value))
                .collect()
        })
        .collect()
}

/// Relative strength of the cup opponent, from the team/opponent rank
/// difference. Bins are right-inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RankDiffBin {
    MuchBetter,
    Better,
    LittleBetter,
    Neutral,
    LittleWorse,
    Worse,
    MuchWorse,
}

impl RankDiffBin {
    pub const ALL: [RankDiffBin; 7] = [
        RankDiffBin::MuchBetter,
        RankDiffBin::Better,
        RankDiffBin::LittleBetter,
        RankDiffBin::Neutral,
        RankDiffBin::LittleWorse,
        RankDiffBin::Worse,
        RankDiffBin::MuchWorse,
    ];

    /// Bin edges -20, -5, -1, 1, 5, 20
    pub fn from_rank_diff(diff: f64) -> Option<Self> {
        if diff.is_nan() {
            return None;
        }
        Some(if diff <= -20.0 {
            RankDiffBin::MuchBetter
        } else if diff <= -5.0 {
            RankDiffBin::Better
        } else if diff <= -1.0 {
            RankDiffBin::LittleBetter
        } else if diff <= 1.0 {
            RankDiffBin::Neutral
        } else if diff <= 5.0 {
            RankDiffBin::LittleWorse
        } else if diff <= 20.0 {
            RankDiffBin::Worse
        } else {
            RankDiffBin::MuchWorse
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            RankDiffBin::MuchBetter => "Much Better",
            RankDiffBin::Better => "Better",
            RankDiffBin::LittleBetter => "Little Better",
            RankDiffBin::Neutral => "Neutral",
            RankDiffBin::LittleWorse => "Little Worse",
            RankDiffBin::Worse => "Worse",
            RankDiffBin::MuchWorse => "Much Worse",
        }
    }
}

impl fmt::Display for RankDiffBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// League points in the next fixture by opponent strength and cup result,
/// for teams with at most 5 days until that fixture.
///
/// Every bin is present as a group; series are "Loss" and "Win".
pub fn performance_by_rank_diff(records: &[&FixtureRecord]) -> GroupedMeans {
    let mut cells: BTreeMap<(RankDiffBin, u8), Mean> = BTreeMap::new();

    for r in records {
        let Some(days) = r.next_fixture_days_round else { continue };
        if days > 5.0 {
            continue;
        }
        let (Some(diff), Some(win), Some(points)) =
            (r.rank_diff, r.team_win, r.next_team_points_round)
        else {
            continue;
        };
        let Some(bin) = RankDiffBin::from_rank_diff(diff) else { continue };
        let outcome = match win {
            w if w == 0.0 => 0u8,
            w if w == 1.0 => 1u8,
            _ => continue,
        };
        cells.entry((bin, outcome)).or_default().push(points);
    }

    GroupedMeans {
        groups: RankDiffBin::ALL.iter().map(|b| b.label().to_string()).collect(),
        series: vec!["Loss".to_string(), "Win".to_string()],
        values: collect_means(&cells, &RankDiffBin::ALL, &[0u8, 1u8]),
    }
}

/// Team category used for the recovery-days chart.
///
/// Follows the paper's variable mapping, where "Division" is the opponent's
/// division column and "Team Position" the team's own previous rank.
pub fn rank_category(record: &FixtureRecord) -> &'static str {
    let division = record.opponent_division;
    let position = record.team_league_rank_prev;
    match division {
        Some(1) if position.is_some_and(|p| p <= 6.0) => "Top 6",
        Some(1) if position.is_some_and(|p| p > 6.0) => "League 1",
        Some(2) => "League 2",
        Some(d) if d >= 3 => "League 3+",
        _ => "Other",
    }
}

/// League points after a cup fixture by recovery days and team category,
/// for 2 to 6 days of recovery (a single day is excluded).
///
/// Groups are the observed day counts in ascending order; series are the
/// observed categories in alphabetical order.
pub fn performance_by_fixture_days(records: &[&FixtureRecord]) -> GroupedMeans {
    let mut cells: BTreeMap<(i64, &'static str), Mean> = BTreeMap::new();

    for r in records {
        let (Some(days), Some(points)) = (r.next_fixture_days_round, r.next_team_points_round)
        else {
            continue;
        };
        if days > 6.0 || days == 1.0 {
            continue;
        }
        cells
            .entry((days.trunc() as i64, rank_category(r)))
            .or_default()
            .push(points);
    }

    let mut groups: Vec<i64> = cells.keys().map(|(d, _)| *d).collect();
    groups.dedup();
    let mut series: Vec<&'static str> = cells.keys().map(|(_, c)| *c).collect();
    series.sort_unstable();
    series.dedup();

    GroupedMeans {
        groups: groups.iter().map(|d| d.to_string()).collect(),
        series: series.iter().map(|s| s.to_string()).collect(),
        values: collect_means(&cells, &groups, &series),
    }
}
