//! Integration tests for the unique-combination, causal effect and EDA
//! pipelines.

use cup_causality_toolkit::fixtures::Variable;
use cup_causality_toolkit::pipeline::{
    run_causal_effect, run_eda, run_unique_combinations, CausalEffectConfig, CausalEffectKind,
    EdaConfig, RenderConfig, UniqueCombinationsConfig,
};
use cup_causality_toolkit::{load_fixtures, load_iv_results};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FIXTURES: &str = "tests/fixtures/input/cup_fixtures.csv";
const IV_RESULTS: &str = "tests/fixtures/input/iv_results.csv";

fn causal_config(kind: CausalEffectKind, plots_dir: &Path) -> CausalEffectConfig {
    CausalEffectConfig {
        input: PathBuf::from(IV_RESULTS),
        plots_dir: plots_dir.to_path_buf(),
        render: RenderConfig::at_dpi(20.0),
        ..CausalEffectConfig::for_kind(kind)
    }
}

#[test]
fn test_load_fixture_file() {
    let records = load_fixtures(Path::new(FIXTURES)).unwrap();
    assert_eq!(records.len(), 38);

    let first = &records[0];
    assert_eq!(first.country_name, "Germany");
    assert_eq!((first.stage, first.fixture_id), (1, 1));
    assert_eq!(first.extra_time, Some(1.0));

    // England round 3 has blank opponent ranks
    let blank_ranks = records
        .iter()
        .filter(|r| r.country_name == "England" && r.stage == 3)
        .filter(|r| r.opponent_league_rank_prev.is_none())
        .count();
    assert_eq!(blank_ranks, 2);
}

#[test]
fn test_unique_combinations() {
    let dir = TempDir::new().unwrap();
    let config = UniqueCombinationsConfig {
        input: PathBuf::from(FIXTURES),
        output_dir: dir.path().to_path_buf(),
        render: RenderConfig::at_dpi(20.0),
        ..UniqueCombinationsConfig::default()
    };
    let output = run_unique_combinations(&config).unwrap();

    let percentages: Vec<f64> = output.results.iter().map(|s| s.percentage).collect();
    assert_eq!(percentages, vec![75.0, 100.0, 50.0, 0.0, 0.0, 0.0]);
    // The 2021 fixture does not count towards 2020
    assert_eq!(output.results[0].rows, 4);

    let chart = dir.path().join("England_2020_unique_combinations.png");
    assert!(chart.exists());
    assert_eq!(output.charts, vec![chart]);
    assert!(output.summary.contains("Round 1: 3 unique of 4 combinations (75.0%)"));
}

#[test]
fn test_unique_combinations_without_rounds_skips_chart() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("unique.csv");
    let config = UniqueCombinationsConfig {
        input: PathBuf::from(FIXTURES),
        output_dir: dir.path().to_path_buf(),
        max_stage: 0,
        summary_csv: Some(csv_path.clone()),
        render: RenderConfig::at_dpi(20.0),
        ..UniqueCombinationsConfig::default()
    };
    let output = run_unique_combinations(&config).unwrap();

    assert!(output.results.is_empty());
    assert!(output.charts.is_empty());
    assert!(!dir.path().join("England_2020_unique_combinations.png").exists());
    // Header only
    assert_eq!(
        fs::read_to_string(&csv_path).unwrap(),
        "country,year,stage,rows,unique,percentage\n"
    );
}

#[test]
fn test_causal_effect_cup_win() {
    let dir = TempDir::new().unwrap();
    let output = run_causal_effect(&causal_config(CausalEffectKind::CupWin, dir.path())).unwrap();

    let stages: Vec<i64> = output.results.iter().map(|r| r.stage).collect();
    assert_eq!(stages, vec![1, 2, 3, 4, 5, 6]);
    assert!(output.results.iter().all(|r| r.model == "Model 7"));
    assert!(dir.path().join("causal_effect_cup_win.png").exists());

    // F above 10 in rounds 1 and 3
    let strong: Vec<&str> = output.summary.lines().filter(|l| l.ends_with(" *")).collect();
    assert_eq!(strong.len(), 2);
    assert!(strong[0].starts_with("Round 1:"));
    assert!(strong[1].starts_with("Round 3:"));

    // Round 4 is marked regardless of its F statistic
    let config = causal_config(CausalEffectKind::CupWin, dir.path());
    assert_eq!(config.highlighted_rounds(&output.results), vec![1, 3, 4]);
    assert!(output.summary.contains("Highlighted rounds: 1, 3, 4"));
}

#[test]
fn test_causal_effect_participation() {
    let dir = TempDir::new().unwrap();
    let output =
        run_causal_effect(&causal_config(CausalEffectKind::Participation, dir.path())).unwrap();

    let stages: Vec<i64> = output.results.iter().map(|r| r.stage).collect();
    assert_eq!(stages, vec![2, 3, 4, 5, 6]);
    assert!(dir.path().join("causal_effect_cup_participation.png").exists());

    // 9.5 passes the lower threshold, round 2 at 8.0 does not
    let strong = output.summary.lines().filter(|l| l.ends_with(" *")).count();
    assert_eq!(strong, 2);
    let config = causal_config(CausalEffectKind::Participation, dir.path());
    assert_eq!(config.highlighted_rounds(&output.results), vec![3, 5]);
    assert!(output.summary.contains("Highlighted rounds: 3, 5"));
}

#[test]
fn test_causal_effect_summary_csv() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("effects.csv");
    let config = CausalEffectConfig {
        summary_csv: Some(csv_path.clone()),
        ..causal_config(CausalEffectKind::CupWin, dir.path())
    };
    run_causal_effect(&config).unwrap();

    let written = load_iv_results(&csv_path).unwrap();
    assert_eq!(written.len(), 6);
    assert_eq!(written[0].first_stage_f_stat, 12.5);
}

#[test]
fn test_causal_effect_unknown_model_is_error() {
    let dir = TempDir::new().unwrap();
    let config = CausalEffectConfig {
        model: "Model 99".to_string(),
        ..causal_config(CausalEffectKind::CupWin, dir.path())
    };
    let err = run_causal_effect(&config).unwrap_err();
    assert!(err.to_string().contains("Model 99"));
    assert!(!dir.path().join("causal_effect_cup_win.png").exists());
}

#[test]
fn test_eda_charts() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("eda_means.csv");
    let config = EdaConfig {
        input: PathBuf::from(FIXTURES),
        output_dir: dir.path().to_path_buf(),
        summary_csv: Some(csv_path.clone()),
        render: RenderConfig::at_dpi(20.0),
        ..EdaConfig::default()
    };
    let output = run_eda(&config).unwrap();

    let chart_dir = dir.path().join("Combined");
    for name in [
        "correlation_heatmap.png",
        "performance_next_fixture_by_rank_diff.png",
        "performance_effect_fixture_days.png",
    ] {
        assert!(chart_dir.join(name).exists(), "missing {}", name);
    }
    assert_eq!(output.charts.len(), 3);

    let corr = &output.results.correlation;
    assert_eq!(corr.variables.len(), 15);
    let diag = corr
        .get(Variable::LeaguePerformance, Variable::LeaguePerformance)
        .unwrap();
    assert!((diag - 1.0).abs() < 1e-12);
    let sym_a = corr.get(Variable::CupWin, Variable::DistanceTraveled).unwrap();
    let sym_b = corr.get(Variable::DistanceTraveled, Variable::CupWin).unwrap();
    assert_eq!(sym_a, sym_b);

    assert_eq!(output.results.by_rank_diff.groups.len(), 7);
    assert_eq!(output.results.by_rank_diff.series, vec!["Loss", "Win"]);
    let days: Vec<&str> = output
        .results
        .by_fixture_days
        .groups
        .iter()
        .map(String::as_str)
        .collect();
    assert!(!days.contains(&"1"));
    assert!(!days.contains(&"7"));

    let text = fs::read_to_string(&csv_path).unwrap();
    assert!(text.starts_with("chart,group,series,mean\n"));
}
