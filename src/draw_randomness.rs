//! Draw randomness tests
//!
//! If the cup draw is random, the opponent a team meets in a round should be
//! independent of the fixture slot, and opponent strength (league position)
//! should be independent of opponent tier within the round. Each round is
//! tested separately with a chi-square contingency test.

use crate::contingency::{chi2_contingency, ChiSquareTest, ContingencyTable};
use crate::fixtures::{FixtureFilter, FixtureRecord};
use anyhow::Result;
use std::collections::HashSet;

/// Opponent divisions that take part in the tests
pub const VALID_DIVISIONS: [i64; 5] = [1, 2, 3, 4, 5];

/// Observed table and its test for one pair of categorical fields
#[derive(Debug, Clone)]
pub struct TableTest {
    pub observed: ContingencyTable<i64, i64>,
    pub test: ChiSquareTest,
}

impl TableTest {
    fn run(observed: ContingencyTable<i64, i64>) -> Result<Self> {
        let test = chi2_contingency(&observed)?;
        Ok(Self { observed, test })
    }
}

/// Opponent division x opponent rank for one round
#[derive(Debug, Clone)]
pub struct CombinedStageResult {
    pub stage: i64,
    /// Rows in the round after filtering
    pub rows: usize,
    pub rank_division: TableTest,
}

/// Fixture x division and fixture x rank for one round
#[derive(Debug, Clone)]
pub struct CompleteStageResult {
    pub stage: i64,
    pub rows: usize,
    pub fixture_division: TableTest,
    pub fixture_rank: TableTest,
}

/// Per-round results for one country, in round order
#[derive(Debug, Clone)]
pub struct DrawRandomnessReport<T> {
    pub country: String,
    pub stages: Vec<T>,
    /// Rounds without any usable rows
    pub skipped: Vec<i64>,
}

impl<T> DrawRandomnessReport<T> {
    fn new(country: &str) -> Self {
        Self {
            country: country.to_string(),
            stages: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, stage: i64, reason: &str) {
        log::warn!("{} for Round {} in {}. Skipping...", reason, stage, self.country);
        self.skipped.push(stage);
    }
}

/// Rows of one round in one country with a valid opponent division.
fn stage_rows<'a>(
    records: &[&'a FixtureRecord],
    country: &str,
    stage: i64,
) -> Vec<&'a FixtureRecord> {
    let rows = FixtureFilter::new()
        .country(country)
        .stage(stage)
        .allow_divisions(&VALID_DIVISIONS)
        .apply(records);
    log::debug!("{} Round {}: {} rows", country, stage, rows.len());
    rows
}

fn division_rank_table(rows: &[&FixtureRecord]) -> ContingencyTable<i64, i64> {
    ContingencyTable::crosstab(
        rows.iter()
            .filter_map(|r| Some((r.opponent_division?, r.opponent_league_rank_prev?))),
    )
}

fn fixture_division_table(rows: &[&FixtureRecord]) -> ContingencyTable<i64, i64> {
    ContingencyTable::crosstab(
        rows.iter()
            .filter_map(|r| Some((r.fixture_id, r.opponent_division?))),
    )
}

fn fixture_rank_table(rows: &[&FixtureRecord]) -> ContingencyTable<i64, i64> {
    ContingencyTable::crosstab(
        rows.iter()
            .filter_map(|r| Some((r.fixture_id, r.opponent_league_rank_prev?))),
    )
}

/// Test opponent division against opponent rank in each round `1..=max_stage`.
///
/// Rounds with no rows are skipped with a diagnostic rather than failing.
pub fn test_draw_randomness_combined(
    records: &[&FixtureRecord],
    country: &str,
    max_stage: i64,
) -> Result<DrawRandomnessReport<CombinedStageResult>> {
    let mut report = DrawRandomnessReport::new(country);

    for stage in 1..=max_stage {
        let rows = stage_rows(records, country, stage);
        if rows.is_empty() {
            report.skip(stage, "No data available");
            continue;
        }

        let table = division_rank_table(&rows);
        if table.is_empty() {
            report.skip(stage, "No opponent ranks available");
            continue;
        }

        report.stages.push(CombinedStageResult {
            stage,
            rows: rows.len(),
            rank_division: TableTest::run(table)?,
        });
    }

    Ok(report)
}

/// Test fixture id against opponent division and against opponent rank in
/// each round `1..=max_stage`.
pub fn test_complete_draw_randomness(
    records: &[&FixtureRecord],
    country: &str,
    max_stage: i64,
) -> Result<DrawRandomnessReport<CompleteStageResult>> {
    let mut report = DrawRandomnessReport::new(country);

    for stage in 1..=max_stage {
        let rows = stage_rows(records, country, stage);
        if rows.is_empty() {
            report.skip(stage, "No data available");
            continue;
        }

        let division = fixture_division_table(&rows);
        let rank = fixture_rank_table(&rows);
        if rank.is_empty() {
            report.skip(stage, "No opponent ranks available");
            continue;
        }

        report.stages.push(CompleteStageResult {
            stage,
            rows: rows.len(),
            fixture_division: TableTest::run(division)?,
            fixture_rank: TableTest::run(rank)?,
        });
    }

    Ok(report)
}

/// Share of distinct (opponent rank, opponent division) pairs in one round
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueCombinationStage {
    pub stage: i64,
    pub rows: usize,
    pub unique: usize,
    /// 100 * unique / rows, 0 for an empty round
    pub percentage: f64,
}

/// Percentage of unique opponent rank/division combinations per round for
/// one country and season.
///
/// Blank ranks or divisions count as their own value, so two rows with a
/// blank rank and the same division are one combination.
pub fn unique_combination_percentage(
    records: &[&FixtureRecord],
    country: &str,
    year: i64,
    max_stage: i64,
) -> Vec<UniqueCombinationStage> {
    let season = FixtureFilter::new()
        .country(country)
        .year(year)
        .stage_range(1, max_stage)
        .apply(records);

    (1..=max_stage)
        .map(|stage| {
            let mut rows = 0usize;
            let mut seen: HashSet<(Option<i64>, Option<i64>)> = HashSet::new();
            for r in season.iter().filter(|r| r.stage == stage) {
                rows += 1;
                seen.insert((r.opponent_league_rank_prev, r.opponent_division));
            }
            let percentage = if rows > 0 {
                seen.len() as f64 / rows as f64 * 100.0
            } else {
                0.0
            };
            UniqueCombinationStage {
                stage,
                rows,
                unique: seen.len(),
                percentage,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(country: &str, stage: i64, fixture: i64, div: i64, rank: Option<i64>) -> FixtureRecord {
        FixtureRecord {
            country_name: country.to_string(),
            stage,
            fixture_id: fixture,
            opponent_division: Some(div),
            opponent_league_rank_prev: rank,
            year: Some(2020),
            date: None,
            country_code: None,
            team_league_rank_prev: None,
            team_size: None,
            foreigners: None,
            mean_age: None,
            mean_value: None,
            total_value: None,
            distance: None,
            extra_time: None,
            team_home: None,
            team_win: None,
            rank_diff: None,
            next_team_points_round: None,
            next_team_points_round_plus: None,
            next_fixture_days_round: None,
        }
    }

    fn sample() -> Vec<FixtureRecord> {
        vec![
            record("Germany", 1, 10, 1, Some(3)),
            record("Germany", 1, 10, 2, Some(5)),
            record("Germany", 1, 11, 1, Some(5)),
            record("Germany", 1, 11, 3, Some(3)),
            record("Germany", 1, 12, 2, Some(8)),
            record("Germany", 1, 12, 9, Some(1)), // invalid division
            record("Germany", 2, 20, 1, Some(2)),
            record("Germany", 2, 20, 2, Some(2)),
            record("Germany", 2, 21, 1, None),
            record("Portugal", 1, 30, 1, Some(1)),
        ]
    }

    #[test]
    fn test_combined_skips_empty_rounds() {
        let data = sample();
        let refs: Vec<&FixtureRecord> = data.iter().collect();
        let report = test_draw_randomness_combined(&refs, "Germany", 3).unwrap();

        assert_eq!(report.stages.len(), 2);
        assert_eq!(report.skipped, vec![3]);

        let round1 = &report.stages[0];
        assert_eq!(round1.stage, 1);
        // The division 9 row is filtered out
        assert_eq!(round1.rows, 5);
        assert_eq!(round1.rank_division.observed.total(), 5);
        assert_eq!(round1.rank_division.observed.rows(), &[1, 2, 3]);
        assert_eq!(round1.rank_division.observed.cols(), &[3, 5, 8]);
        assert_eq!(round1.rank_division.test.dof, 2 * 2);

        // Blank ranks drop out of the rank table only
        let round2 = &report.stages[1];
        assert_eq!(round2.rows, 3);
        assert_eq!(round2.rank_division.observed.total(), 2);
    }

    #[test]
    fn test_complete_tables() {
        let data = sample();
        let refs: Vec<&FixtureRecord> = data.iter().collect();
        let report = test_complete_draw_randomness(&refs, "Germany", 2).unwrap();

        assert!(report.skipped.is_empty());
        let round1 = &report.stages[0];
        assert_eq!(round1.fixture_division.observed.rows(), &[10, 11, 12]);
        assert_eq!(round1.fixture_division.observed.total(), 5);
        assert_eq!(round1.fixture_rank.observed.cols(), &[3, 5, 8]);

        let expected_sum = round1.fixture_division.test.expected_total();
        assert!((expected_sum - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_country_skips_everything() {
        let data = sample();
        let refs: Vec<&FixtureRecord> = data.iter().collect();
        let report = test_draw_randomness_combined(&refs, "Spain", 4).unwrap();
        assert!(report.stages.is_empty());
        assert_eq!(report.skipped, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_unique_combination_percentage() {
        let data = sample();
        let refs: Vec<&FixtureRecord> = data.iter().collect();
        let stages = unique_combination_percentage(&refs, "Germany", 2020, 3);

        assert_eq!(stages.len(), 3);
        // Round 1: six rows, all distinct (rank, division) pairs
        assert_eq!(stages[0].rows, 6);
        assert_eq!(stages[0].unique, 6);
        assert!((stages[0].percentage - 100.0).abs() < 1e-12);
        // Round 2: (2,1), (2,2), (None,1)
        assert_eq!(stages[1].unique, 3);
        assert_eq!(stages[2].rows, 0);
        assert_eq!(stages[2].percentage, 0.0);
    }

    #[test]
    fn test_unique_combination_duplicates() {
        let data = vec![
            record("England", 1, 1, 2, Some(4)),
            record("England", 1, 2, 2, Some(4)),
            record("England", 1, 3, 3, Some(4)),
            record("England", 1, 4, 3, None),
        ];
        let refs: Vec<&FixtureRecord> = data.iter().collect();
        let stages = unique_combination_percentage(&refs, "England", 2020, 1);
        assert_eq!(stages[0].unique, 3);
        assert!((stages[0].percentage - 75.0).abs() < 1e-12);
    }
}
