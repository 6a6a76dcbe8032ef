//! Processed cup fixture records
//!
//! One record per cup participation: the team, its opponent, the draw
//! context (country, round, fixture) and what happened in the league
//! afterwards. Records are loaded once from CSV and never modified.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// A single cup fixture participation
///
/// `country_name`, `stage`, `fixture_id` and `opponent_division` columns are
/// required; every other column may be absent from the file or blank.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRecord {
    pub country_name: String,
    /// Cup round (1-based)
    #[serde(deserialize_with = "de_int")]
    pub stage: i64,
    #[serde(deserialize_with = "de_int")]
    pub fixture_id: i64,
    /// League tier of the opponent (column required, value may be blank)
    #[serde(deserialize_with = "de_opt_int")]
    pub opponent_division: Option<i64>,
    /// Opponent's league position in the previous season
    #[serde(default, deserialize_with = "de_opt_int")]
    pub opponent_league_rank_prev: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_int")]
    pub year: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub country_code: Option<f64>,

    // Team attributes
    #[serde(default, deserialize_with = "de_opt_num")]
    pub team_league_rank_prev: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub team_size: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub foreigners: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub mean_age: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub mean_value: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub total_value: Option<f64>,

    // Match attributes
    #[serde(default, deserialize_with = "de_opt_num")]
    pub distance: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub extra_time: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub team_home: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub team_win: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub rank_diff: Option<f64>,

    // Outcomes
    #[serde(default, deserialize_with = "de_opt_num")]
    pub next_team_points_round: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub next_team_points_round_plus: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_num")]
    pub next_fixture_days_round: Option<f64>,
}

/// Load every fixture record from a processed CSV file.
pub fn load_fixtures(path: &Path) -> Result<Vec<FixtureRecord>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open fixture CSV {}", path.display()))?;

    let mut records = Vec::new();
    for (row_num, result) in reader.deserialize().enumerate() {
        let record: FixtureRecord = result.with_context(|| {
            format!("Failed to read row {} of {}", row_num + 1, path.display())
        })?;
        records.push(record);
    }

    log::debug!("Loaded {} fixture records from {}", records.len(), path.display());
    Ok(records)
}

// ============================================================================
// Filtering
// ============================================================================

/// Row filter over categorical fields and a date window.
///
/// Unset criteria match everything. A row without a date never matches a
/// filter that has a date window.
#[derive(Debug, Clone, Default)]
pub struct FixtureFilter {
    pub country: Option<String>,
    pub year: Option<i64>,
    /// Inclusive stage range
    pub stages: Option<(i64, i64)>,
    /// Opponent divisions to drop
    pub excluded_divisions: Vec<i64>,
    /// Opponent divisions to keep (empty keeps all)
    pub allowed_divisions: Vec<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl FixtureFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn year(mut self, year: i64) -> Self {
        self.year = Some(year);
        self
    }

    pub fn stage(self, stage: i64) -> Self {
        self.stage_range(stage, stage)
    }

    pub fn stage_range(mut self, first: i64, last: i64) -> Self {
        self.stages = Some((first, last));
        self
    }

    pub fn exclude_divisions(mut self, divisions: &[i64]) -> Self {
        self.excluded_divisions.extend_from_slice(divisions);
        self
    }

    pub fn allow_divisions(mut self, divisions: &[i64]) -> Self {
        self.allowed_divisions.extend_from_slice(divisions);
        self
    }

    pub fn date_window(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn matches(&self, record: &FixtureRecord) -> bool {
        if let Some(country) = &self.country {
            if record.country_name != *country {
                return false;
            }
        }
        if let Some(year) = self.year {
            if record.year != Some(year) {
                return false;
            }
        }
        if let Some((first, last)) = self.stages {
            if record.stage < first || record.stage > last {
                return false;
            }
        }
        // A blank division is never equal to an excluded value, but can't be
        // in a whitelist either.
        if let Some(div) = record.opponent_division {
            if self.excluded_divisions.contains(&div) {
                return false;
            }
        }
        if !self.allowed_divisions.is_empty() {
            match record.opponent_division {
                Some(div) if self.allowed_divisions.contains(&div) => {}
                _ => return false,
            }
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(date) = record.date else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, records: &[&'a FixtureRecord]) -> Vec<&'a FixtureRecord> {
        records.iter().copied().filter(|r| self.matches(r)).collect()
    }
}

/// Borrow every record, the input shape the filters and tests work on.
pub fn as_refs(records: &[FixtureRecord]) -> Vec<&FixtureRecord> {
    records.iter().collect()
}

// ============================================================================
// Variables
// ============================================================================

/// Numeric fixture columns, with the labels used in the paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    LeaguePerformance,
    LeaguePerformanceNext,
    OpponentPosition,
    Division,
    CupWin,
    TeamPosition,
    TeamSize,
    ForeignPlayers,
    MeanAge,
    MeanMarketValue,
    TotalMarketValue,
    DistanceTraveled,
    ExtraTime,
    DaysTillLeagueFixture,
    TeamHome,
    Country,
}

impl Variable {
    pub const ALL: [Variable; 16] = [
        Variable::LeaguePerformance,
        Variable::LeaguePerformanceNext,
        Variable::OpponentPosition,
        Variable::Division,
        Variable::CupWin,
        Variable::TeamPosition,
        Variable::TeamSize,
        Variable::ForeignPlayers,
        Variable::MeanAge,
        Variable::MeanMarketValue,
        Variable::TotalMarketValue,
        Variable::DistanceTraveled,
        Variable::ExtraTime,
        Variable::DaysTillLeagueFixture,
        Variable::TeamHome,
        Variable::Country,
    ];

    /// Outcome variables (Y)
    pub const OUTCOMES: [Variable; 2] =
        [Variable::LeaguePerformance, Variable::LeaguePerformanceNext];

    /// Instruments (Z)
    pub const INSTRUMENTS: [Variable; 2] = [Variable::OpponentPosition, Variable::Division];

    /// Treatment (W)
    pub const TREATMENTS: [Variable; 1] = [Variable::CupWin];

    /// Controls (X)
    pub const CONTROLS: [Variable; 10] = [
        Variable::TeamPosition,
        Variable::DistanceTraveled,
        Variable::TeamSize,
        Variable::MeanAge,
        Variable::ForeignPlayers,
        Variable::MeanMarketValue,
        Variable::TotalMarketValue,
        Variable::ExtraTime,
        Variable::DaysTillLeagueFixture,
        Variable::Country,
    ];

    /// CSV column name
    pub fn column(self) -> &'static str {
        match self {
            Variable::LeaguePerformance => "next_team_points_round",
            Variable::LeaguePerformanceNext => "next_team_points_round_plus",
            Variable::OpponentPosition => "opponent_league_rank_prev",
            Variable::Division => "opponent_division",
            Variable::CupWin => "team_win",
            Variable::TeamPosition => "team_league_rank_prev",
            Variable::TeamSize => "team_size",
            Variable::ForeignPlayers => "foreigners",
            Variable::MeanAge => "mean_age",
            Variable::MeanMarketValue => "mean_value",
            Variable::TotalMarketValue => "total_value",
            Variable::DistanceTraveled => "distance",
            Variable::ExtraTime => "extra_time",
            Variable::DaysTillLeagueFixture => "next_fixture_days_round",
            Variable::TeamHome => "team_home",
            Variable::Country => "country_code",
        }
    }

    /// Label used on charts
    pub fn label(self) -> &'static str {
        match self {
            Variable::LeaguePerformance => "League Performance r",
            Variable::LeaguePerformanceNext => "League Performance r+1",
            Variable::OpponentPosition => "Opponent Position",
            Variable::Division => "Division",
            Variable::CupWin => "Cup Win",
            Variable::TeamPosition => "Team Position",
            Variable::TeamSize => "Team Size",
            Variable::ForeignPlayers => "Foreign Players",
            Variable::MeanAge => "Mean Age",
            Variable::MeanMarketValue => "Mean Market Value",
            Variable::TotalMarketValue => "Total Market Value",
            Variable::DistanceTraveled => "Distance Traveled",
            Variable::ExtraTime => "Extra Time",
            Variable::DaysTillLeagueFixture => "Days till League Fixture",
            Variable::TeamHome => "Team Home",
            Variable::Country => "Country",
        }
    }

    pub fn from_column(column: &str) -> Option<Variable> {
        Variable::ALL.into_iter().find(|v| v.column() == column)
    }

    pub fn value(self, record: &FixtureRecord) -> Option<f64> {
        match self {
            Variable::LeaguePerformance => record.next_team_points_round,
            Variable::LeaguePerformanceNext => record.next_team_points_round_plus,
            Variable::OpponentPosition => record.opponent_league_rank_prev.map(|v| v as f64),
            Variable::Division => record.opponent_division.map(|v| v as f64),
            Variable::CupWin => record.team_win,
            Variable::TeamPosition => record.team_league_rank_prev,
            Variable::TeamSize => record.team_size,
            Variable::ForeignPlayers => record.foreigners,
            Variable::MeanAge => record.mean_age,
            Variable::MeanMarketValue => record.mean_value,
            Variable::TotalMarketValue => record.total_value,
            Variable::DistanceTraveled => record.distance,
            Variable::ExtraTime => record.extra_time,
            Variable::DaysTillLeagueFixture => record.next_fixture_days_round,
            Variable::TeamHome => record.team_home,
            Variable::Country => record.country_code,
        }
    }
}

// ============================================================================
// Field parsing
// ============================================================================

/// Parse an integer written either as `3` or as a float `3.0`.
pub(crate) fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f: f64 = s.parse().ok()?;
    if f.is_finite() && f.fract() == 0.0 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_num(s: &str) -> Option<f64> {
    let s = s.trim();
    match s {
        "True" | "true" => Some(1.0),
        "False" | "false" => Some(0.0),
        _ => s.parse::<f64>().ok().filter(|v| !v.is_nan()),
    }
}

fn is_blank(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case("nan")
}

pub(crate) fn de_int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let s = String::deserialize(d)?;
    parse_int(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid integer '{}'", s)))
}

fn de_opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let s: Option<String> = Option::deserialize(d)?;
    match s {
        Some(s) if !is_blank(&s) => parse_int(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid integer '{}'", s))),
        _ => Ok(None),
    }
}

fn de_opt_num<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let s: Option<String> = Option::deserialize(d)?;
    match s {
        Some(s) if !is_blank(&s) => parse_num(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid number '{}'", s))),
        _ => Ok(None),
    }
}

fn de_opt_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let s: Option<String> = Option::deserialize(d)?;
    match s {
        Some(s) if !is_blank(&s) => {
            // Timestamps ("2020-01-04 15:00:00") keep only the date part
            let date_part = s.trim().get(..10).unwrap_or(s.trim());
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("invalid date '{}': {}", s, e)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(csv_text: &str) -> Result<Vec<FixtureRecord>> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixtures.csv");
        std::fs::write(&path, csv_text).unwrap();
        load_fixtures(&path)
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("3"), Some(3));
        assert_eq!(parse_int(" 3.0 "), Some(3));
        assert_eq!(parse_int("-2"), Some(-2));
        assert_eq!(parse_int("3.5"), None);
        assert_eq!(parse_int("abc"), None);
    }

    #[test]
    fn test_load_with_optional_columns() {
        let records = read(
            "country_name,stage,fixture_id,opponent_division,opponent_league_rank_prev,team_win,extra_col\n\
             Germany,1.0,100,2,5,1,x\n\
             Germany,2,101,,,,y\n",
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].stage, 1);
        assert_eq!(records[0].opponent_division, Some(2));
        assert_eq!(records[0].opponent_league_rank_prev, Some(5));
        assert_eq!(records[0].team_win, Some(1.0));
        assert_eq!(records[0].mean_age, None);
        assert_eq!(records[1].opponent_division, None);
        assert_eq!(records[1].team_win, None);
    }

    #[test]
    fn test_missing_required_column_fails() {
        let result = read("country_name,stage,opponent_division\nGermany,1,2\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_boolean_and_date_fields() {
        let records = read(
            "country_name,stage,fixture_id,opponent_division,extra_time,date\n\
             England,3,7,1,True,2020-01-04 15:00:00\n",
        )
        .unwrap();
        assert_eq!(records[0].extra_time, Some(1.0));
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2020, 1, 4));
    }

    #[test]
    fn test_filter() {
        let records = read(
            "country_name,year,stage,fixture_id,opponent_division,date\n\
             Germany,2020,1,1,1,2020-08-01\n\
             Germany,2020,2,2,4,2020-09-01\n\
             Germany,2021,1,3,2,2021-08-01\n\
             Portugal,2020,1,4,1,\n",
        )
        .unwrap();
        let refs = as_refs(&records);

        let germany = FixtureFilter::new().country("Germany").apply(&refs);
        assert_eq!(germany.len(), 3);

        let no_fourth = FixtureFilter::new()
            .country("Germany")
            .exclude_divisions(&[4])
            .apply(&refs);
        assert_eq!(no_fourth.len(), 2);

        let season = FixtureFilter::new().year(2020).stage(1).apply(&refs);
        assert_eq!(season.len(), 2);

        let window = FixtureFilter::new()
            .date_window(NaiveDate::from_ymd_opt(2020, 8, 15), None)
            .apply(&refs);
        // Undated Portugal row is dropped once a window is set
        assert_eq!(window.len(), 2);

        let top_two = FixtureFilter::new().allow_divisions(&[1, 2]).apply(&refs);
        assert_eq!(top_two.len(), 3);
    }

    #[test]
    fn test_variable_columns_round_trip() {
        for v in Variable::ALL {
            assert_eq!(Variable::from_column(v.column()), Some(v));
        }
        assert_eq!(Variable::DaysTillLeagueFixture.label(), "Days till League Fixture");
    }
}
