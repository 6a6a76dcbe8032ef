//! Integration tests for the draw randomness pipelines
//!
//! Runs both chi-square pipelines on a small hand-built fixture file covering
//! several countries, rounds that are skipped after filtering, and a 2x2
//! table that takes the continuity correction.

use chrono::NaiveDate;
use cup_causality_toolkit::pipeline::{
    run_complete_draw_randomness, run_draw_randomness, CompleteDrawRandomnessConfig,
    DrawRandomnessConfig, RenderConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FIXTURES: &str = "tests/fixtures/input/cup_fixtures.csv";

fn combined_config(plots_dir: &Path) -> DrawRandomnessConfig {
    DrawRandomnessConfig {
        input: PathBuf::from(FIXTURES),
        plots_dir: plots_dir.to_path_buf(),
        render: RenderConfig::at_dpi(20.0),
        ..DrawRandomnessConfig::default()
    }
}

fn complete_config(plots_dir: &Path) -> CompleteDrawRandomnessConfig {
    CompleteDrawRandomnessConfig {
        input: PathBuf::from(FIXTURES),
        plots_dir: plots_dir.to_path_buf(),
        render: RenderConfig::at_dpi(20.0),
        ..CompleteDrawRandomnessConfig::default()
    }
}

#[test]
fn test_combined_germany_rounds() {
    let dir = TempDir::new().unwrap();
    let output = run_draw_randomness(&combined_config(dir.path())).unwrap();

    assert_eq!(output.results.len(), 1);
    let report = &output.results[0];
    assert_eq!(report.country, "Germany");
    // Round 3 only has division 4 opponents, round 4 has no fixtures
    assert_eq!(report.skipped, vec![3, 4]);
    let stages: Vec<i64> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, vec![1, 2]);

    // Division 6 and division 4 opponents are dropped from round 1
    assert_eq!(report.stages[0].rows, 8);
    assert_eq!(report.stages[1].rows, 6);

    for stage in &report.stages {
        let t = &stage.rank_division;
        let (r, c) = t.observed.shape();
        assert_eq!(t.observed.total() as usize, stage.rows);
        assert!((t.test.expected_total() - stage.rows as f64).abs() < 1e-9);
        assert_eq!(t.test.dof, (r - 1) * (c - 1));
        assert!((0.0..=1.0).contains(&t.test.p_value));
    }
    assert_eq!(report.stages[0].rank_division.test.dof, 6);
    assert_eq!(report.stages[1].rank_division.test.dof, 4);
}

#[test]
fn test_combined_writes_charts_for_tested_rounds_only() {
    let dir = TempDir::new().unwrap();
    let output = run_draw_randomness(&combined_config(dir.path())).unwrap();

    for name in [
        "Observed_Rank_Division_Round_1_Germany.png",
        "Expected_Rank_Division_Round_1_Germany.png",
        "Observed_Rank_Division_Round_2_Germany.png",
        "Expected_Rank_Division_Round_2_Germany.png",
    ] {
        let path = dir.path().join(name);
        assert!(path.exists(), "missing {}", name);
        assert!(output.charts.contains(&path));
    }
    assert_eq!(output.charts.len(), 4);
    assert!(!dir.path().join("Observed_Rank_Division_Round_3_Germany.png").exists());
    assert!(!dir.path().join("Expected_Rank_Division_Round_4_Germany.png").exists());

    let png = fs::read(dir.path().join("Observed_Rank_Division_Round_1_Germany.png")).unwrap();
    assert_eq!(&png[1..4], b"PNG");
}

#[test]
fn test_combined_summary_lines() {
    let dir = TempDir::new().unwrap();
    let output = run_draw_randomness(&combined_config(dir.path())).unwrap();
    let lines: Vec<&str> = output.summary.lines().collect();

    assert_eq!(lines[0], "Germany");
    assert!(lines[1].starts_with("Round 1: Chi2 Statistic = "));
    assert!(lines[1].ends_with("Degrees of Freedom = 6"));
    assert!(lines[2].starts_with("Round 2: Chi2 Statistic = "));
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_rerun_is_deterministic() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let first = run_draw_randomness(&combined_config(first_dir.path())).unwrap();
    let second = run_draw_randomness(&combined_config(second_dir.path())).unwrap();

    assert_eq!(first.summary, second.summary);
    for (a, b) in first.results[0].stages.iter().zip(&second.results[0].stages) {
        assert_eq!(a.rank_division.test, b.rank_division.test);
    }
    for (a, b) in first.charts.iter().zip(&second.charts) {
        assert_eq!(a.file_name(), b.file_name());
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }
}

#[test]
fn test_batch_keeps_country_order() {
    let dir = TempDir::new().unwrap();
    let config = DrawRandomnessConfig {
        countries: vec!["Portugal".to_string(), "Germany".to_string()],
        ..combined_config(dir.path())
    };
    let output = run_draw_randomness(&config).unwrap();

    let countries: Vec<&str> = output.results.iter().map(|r| r.country.as_str()).collect();
    assert_eq!(countries, vec!["Portugal", "Germany"]);
    let portugal_at = output.summary.find("Portugal").unwrap();
    let germany_at = output.summary.find("Germany").unwrap();
    assert!(portugal_at < germany_at);
    assert!(dir.path().join("Observed_Rank_Division_Round_1_Portugal.png").exists());
}

#[test]
fn test_date_window_limits_rounds() {
    let dir = TempDir::new().unwrap();
    let config = DrawRandomnessConfig {
        date_window: (None, NaiveDate::from_ymd_opt(2020, 9, 1)),
        ..combined_config(dir.path())
    };
    let output = run_draw_randomness(&config).unwrap();
    assert_eq!(output.results[0].skipped, vec![2, 3, 4]);
    assert_eq!(output.charts.len(), 2);
}

#[test]
fn test_unknown_country_skips_every_round() {
    let dir = TempDir::new().unwrap();
    let config = DrawRandomnessConfig {
        countries: vec!["Atlantis".to_string()],
        ..combined_config(dir.path())
    };
    let output = run_draw_randomness(&config).unwrap();
    assert_eq!(output.results[0].skipped, vec![1, 2, 3, 4]);
    assert!(output.charts.is_empty());
}

#[test]
fn test_complete_portugal_rounds() {
    let dir = TempDir::new().unwrap();
    let output = run_complete_draw_randomness(&complete_config(dir.path())).unwrap();

    let report = &output.results[0];
    assert_eq!(report.country, "Portugal");
    assert_eq!(report.skipped, vec![3, 4, 5, 6]);
    // Division 3 is excluded, division 4 stays
    assert_eq!(report.stages[0].rows, 6);
    assert_eq!(report.stages[0].fixture_division.observed.cols(), &[1, 2, 4]);

    // Two fixtures, each with one division 1 and one division 2 opponent:
    // the corrected statistic is zero
    let division = &report.stages[1].fixture_division;
    assert_eq!(division.observed.shape(), (2, 2));
    assert_eq!(division.test.dof, 1);
    assert_eq!(division.test.statistic, 0.0);
    assert!((division.test.p_value - 1.0).abs() < 1e-12);

    let rank = &report.stages[1].fixture_rank;
    assert_eq!(rank.observed.shape(), (2, 3));
    assert_eq!(rank.test.dof, 2);
}

#[test]
fn test_complete_writes_four_charts_per_round() {
    let dir = TempDir::new().unwrap();
    let output = run_complete_draw_randomness(&complete_config(dir.path())).unwrap();

    assert_eq!(output.charts.len(), 8);
    for table in ["Observed", "Expected"] {
        for field in ["Division", "Rank"] {
            for stage in [1, 2] {
                let name = format!("{}_Fixture_{}_Round_{}_Portugal.png", table, field, stage);
                assert!(dir.path().join(&name).exists(), "missing {}", name);
            }
        }
    }

    assert!(output
        .summary
        .contains("Round 2: Fixture vs Division - Chi2 Statistic = 0.0000, p-value = 1.0000, Degrees of Freedom = 1"));
    assert!(output.summary.contains("Round 2: Fixture vs Rank - "));
}

#[test]
fn test_summary_csv() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("stats").join("complete.csv");
    let config = CompleteDrawRandomnessConfig {
        summary_csv: Some(csv_path.clone()),
        ..complete_config(dir.path())
    };
    run_complete_draw_randomness(&config).unwrap();

    let text = fs::read_to_string(&csv_path).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("country,stage,table,rows,statistic,p_value,dof")
    );
    // Two tests for each of the two rounds
    assert_eq!(lines.count(), 4);
}

#[test]
fn test_missing_input_is_error() {
    let dir = TempDir::new().unwrap();
    let config = DrawRandomnessConfig {
        input: dir.path().join("absent.csv"),
        ..combined_config(dir.path())
    };
    let err = run_draw_randomness(&config).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.csv"));
}
