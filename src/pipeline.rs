//! Pipeline functions for programmatic use by the CLI.
//!
//! Each analysis loads its input, computes its statistics, writes its charts
//! and returns the structured results together with a printable summary.

use crate::draw_randomness::{
    test_complete_draw_randomness, test_draw_randomness_combined, unique_combination_percentage,
    CombinedStageResult, CompleteStageResult, DrawRandomnessReport, TableTest,
    UniqueCombinationStage,
};
use crate::eda::{
    correlation_matrix, performance_by_fixture_days, performance_by_rank_diff, CorrelationMatrix,
    GroupedMeans,
};
use crate::fixtures::{as_refs, load_fixtures, FixtureFilter, FixtureRecord, Variable};
use crate::iv_results::{load_iv_results, select_model, IvResult};
use crate::output::{output_path, write_summary_csv, SummaryRow};
use crate::render::{
    hex, load_font, load_system_font, render_bar_chart, render_error_bar_chart, render_heatmap,
    BarChartSpec, BarSeries, ChartFont, Colormap, ErrorBarPoint, ErrorBarSpec, Figure,
    HeatmapGroup, HeatmapSpec, ValueFormat, YTicks,
};
use anyhow::{bail, Result};
use chrono::NaiveDate;
use plotters::style::RGBColor;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Default processed fixture dataset
pub const DEFAULT_FIXTURES: &str = "data/combined_cup_processed_participation.csv";

/// Structured results, the charts written for them and a printable summary
#[derive(Debug, Clone)]
pub struct PipelineOutput<T> {
    pub results: T,
    pub charts: Vec<PathBuf>,
    pub summary: String,
}

// ============================================================================
// Rendering options
// ============================================================================

/// Chart resolution and font shared by every pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Output resolution in dots per inch
    pub dpi: f32,
    /// TrueType font for chart text; a system font is used when unset
    pub font: Option<PathBuf>,
}

impl RenderConfig {
    pub fn at_dpi(dpi: f32) -> Self {
        Self { dpi, font: None }
    }

    /// Load the configured font. An explicit font must load; a missing
    /// system font only disables chart text.
    pub fn load_font(&self) -> Result<Option<ChartFont>> {
        if let Some(path) = &self.font {
            return load_font(path).map(Some);
        }
        match load_system_font() {
            Ok(font) => Ok(Some(font)),
            Err(e) => {
                log::warn!("{}. Charts will be rendered without text", e);
                Ok(None)
            }
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::at_dpi(300.0)
    }
}

/// Rows of `records` kept by the division and date filters.
fn prefilter<'a>(
    records: &'a [FixtureRecord],
    excluded_divisions: &[i64],
    date_window: (Option<NaiveDate>, Option<NaiveDate>),
) -> Vec<&'a FixtureRecord> {
    let refs = as_refs(records);
    let kept = FixtureFilter::new()
        .exclude_divisions(excluded_divisions)
        .date_window(date_window.0, date_window.1)
        .apply(&refs);
    log::debug!("{} of {} rows kept after exclusions", kept.len(), records.len());
    kept
}

// ============================================================================
// Draw randomness
// ============================================================================

/// One chi-square test as a summary CSV row
#[derive(Debug, Clone, Serialize)]
struct ChiSquareRow<'a> {
    country: &'a str,
    stage: i64,
    table: &'a str,
    rows: usize,
    statistic: f64,
    p_value: f64,
    dof: usize,
}

impl SummaryRow for ChiSquareRow<'_> {
    const HEADER: &'static [&'static str] =
        &["country", "stage", "table", "rows", "statistic", "p_value", "dof"];
}

impl<'a> ChiSquareRow<'a> {
    fn new(country: &'a str, stage: i64, table: &'a str, rows: usize, t: &TableTest) -> Self {
        Self {
            country,
            stage,
            table,
            rows,
            statistic: t.test.statistic,
            p_value: t.test.p_value,
            dof: t.test.dof,
        }
    }
}

fn chi_square_line(t: &TableTest) -> String {
    format!(
        "Chi2 Statistic = {:.4}, p-value = {:.4}, Degrees of Freedom = {}",
        t.test.statistic, t.test.p_value, t.test.dof
    )
}

/// Observed counts (integers) or expected frequencies (one decimal) of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableView {
    Observed,
    Expected,
}

impl TableView {
    fn name(self) -> &'static str {
        match self {
            TableView::Observed => "Observed",
            TableView::Expected => "Expected",
        }
    }
}

/// Heatmap of one side of a table test, styled like the other draw charts.
fn table_heatmap(
    figure: Figure,
    t: &TableTest,
    view: TableView,
    colormap: Colormap,
    title: &str,
    x_label: &str,
    y_label: &str,
) -> HeatmapSpec {
    let (values, format) = match view {
        TableView::Observed => (t.observed.counts_f64(), ValueFormat::Integer),
        TableView::Expected => (t.test.expected.clone(), ValueFormat::Fixed(1)),
    };
    let row_labels = t.observed.rows().iter().map(|r| r.to_string()).collect();
    let col_labels = t.observed.cols().iter().map(|c| c.to_string()).collect();
    HeatmapSpec::new(figure, values, row_labels, col_labels)
        .with_title(title)
        .with_axis_labels(x_label, y_label)
        .with_style(colormap, format)
}

/// Configuration for the opponent rank x division test.
#[derive(Debug, Clone)]
pub struct DrawRandomnessConfig {
    /// Processed fixture CSV
    pub input: PathBuf,
    /// Directory for the heatmaps
    pub plots_dir: PathBuf,
    /// Countries to test; processed in parallel, reported in this order
    pub countries: Vec<String>,
    /// Last round tested
    pub max_stage: i64,
    /// Opponent divisions dropped before testing
    pub excluded_divisions: Vec<i64>,
    pub date_window: (Option<NaiveDate>, Option<NaiveDate>),
    /// Heatmap file name; `{table}` is Observed or Expected
    pub file_template: String,
    /// Also write every test result to this CSV
    pub summary_csv: Option<PathBuf>,
    pub render: RenderConfig,
}

impl Default for DrawRandomnessConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_FIXTURES),
            plots_dir: PathBuf::from("plots"),
            countries: vec!["Germany".to_string()],
            max_stage: 4,
            excluded_divisions: vec![4],
            date_window: (None, None),
            file_template: "{table}_Rank_Division_Round_{stage}_{country}.png".to_string(),
            summary_csv: None,
            render: RenderConfig::at_dpi(100.0),
        }
    }
}

/// Test draw randomness (opponent division against opponent rank) per
/// round for each configured country, writing observed and expected
/// heatmaps for every tested round.
pub fn run_draw_randomness(
    config: &DrawRandomnessConfig,
) -> Result<PipelineOutput<Vec<DrawRandomnessReport<CombinedStageResult>>>> {
    let records = load_fixtures(&config.input)?;
    let rows = prefilter(&records, &config.excluded_divisions, config.date_window);
    let font = config.render.load_font()?;
    let figure = Figure::new(8.0, 6.0, config.render.dpi);

    let per_country = config
        .countries
        .par_iter()
        .map(|country| -> Result<(DrawRandomnessReport<CombinedStageResult>, Vec<PathBuf>)> {
            let report = test_draw_randomness_combined(&rows, country, config.max_stage)?;
            let mut charts = Vec::new();
            for stage in &report.stages {
                for (view, colormap) in [
                    (TableView::Observed, Colormap::YlGnBu),
                    (TableView::Expected, Colormap::YlOrRd),
                ] {
                    let title = format!(
                        "{} Rank-Division Combinations for Round {} - {}",
                        view.name(),
                        stage.stage,
                        country
                    );
                    let spec = table_heatmap(
                        figure,
                        &stage.rank_division,
                        view,
                        colormap,
                        &title,
                        "Opponent League Rank",
                        "Opponent Division",
                    );
                    let path = output_path(
                        &config.plots_dir,
                        &config.file_template,
                        &[
                            ("table", view.name().to_string()),
                            ("stage", stage.stage.to_string()),
                            ("country", country.clone()),
                        ],
                    )?;
                    render_heatmap(&spec, font.as_ref(), &path)?;
                    charts.push(path);
                }
            }
            Ok((report, charts))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut summary = String::new();
    let mut charts = Vec::new();
    let mut reports = Vec::new();
    for (report, country_charts) in per_country {
        writeln!(summary, "{}", report.country)?;
        for stage in &report.stages {
            writeln!(summary, "Round {}: {}", stage.stage, chi_square_line(&stage.rank_division))?;
        }
        charts.extend(country_charts);
        reports.push(report);
    }
    if let Some(path) = &config.summary_csv {
        let csv_rows: Vec<ChiSquareRow> = reports
            .iter()
            .flat_map(|report| {
                report.stages.iter().map(|s| {
                    ChiSquareRow::new(&report.country, s.stage, "rank_division", s.rows, &s.rank_division)
                })
            })
            .collect();
        write_summary_csv(path, &csv_rows)?;
    }

    Ok(PipelineOutput {
        results: reports,
        charts,
        summary,
    })
}

/// Configuration for the fixture x division / fixture x rank tests.
#[derive(Debug, Clone)]
pub struct CompleteDrawRandomnessConfig {
    pub input: PathBuf,
    pub plots_dir: PathBuf,
    pub countries: Vec<String>,
    pub max_stage: i64,
    pub excluded_divisions: Vec<i64>,
    pub date_window: (Option<NaiveDate>, Option<NaiveDate>),
    /// Heatmap file name; `{table}` is Observed or Expected, `{field}` is
    /// Division or Rank
    pub file_template: String,
    pub summary_csv: Option<PathBuf>,
    pub render: RenderConfig,
}

impl Default for CompleteDrawRandomnessConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_FIXTURES),
            plots_dir: PathBuf::from("plots"),
            countries: vec!["Portugal".to_string()],
            max_stage: 6,
            excluded_divisions: vec![3],
            date_window: (None, None),
            file_template: "{table}_Fixture_{field}_Round_{stage}_{country}.png".to_string(),
            summary_csv: None,
            render: RenderConfig::at_dpi(100.0),
        }
    }
}

/// Test whether the fixture slot is independent of opponent division and of
/// opponent rank in each round, writing four heatmaps per tested round.
pub fn run_complete_draw_randomness(
    config: &CompleteDrawRandomnessConfig,
) -> Result<PipelineOutput<Vec<DrawRandomnessReport<CompleteStageResult>>>> {
    let records = load_fixtures(&config.input)?;
    let rows = prefilter(&records, &config.excluded_divisions, config.date_window);
    let font = config.render.load_font()?;
    let figure = Figure::new(8.0, 6.0, config.render.dpi);

    let per_country = config
        .countries
        .par_iter()
        .map(|country| -> Result<(DrawRandomnessReport<CompleteStageResult>, Vec<PathBuf>)> {
            let report = test_complete_draw_randomness(&rows, country, config.max_stage)?;
            let mut charts = Vec::new();
            for stage in &report.stages {
                let tables = [
                    (TableView::Observed, "Division", &stage.fixture_division, Colormap::YlGnBu),
                    (TableView::Observed, "Rank", &stage.fixture_rank, Colormap::YlOrRd),
                    (TableView::Expected, "Division", &stage.fixture_division, Colormap::YlOrRd),
                    (TableView::Expected, "Rank", &stage.fixture_rank, Colormap::YlOrRd),
                ];
                for (view, field, table, colormap) in tables {
                    let title = format!(
                        "{} Fixture-{} Combinations for Round {} - {}",
                        view.name(),
                        field,
                        stage.stage,
                        country
                    );
                    let x_label = format!("Opponent {}", field);
                    let spec =
                        table_heatmap(figure, table, view, colormap, &title, &x_label, "Fixture ID");
                    let path = output_path(
                        &config.plots_dir,
                        &config.file_template,
                        &[
                            ("table", view.name().to_string()),
                            ("field", field.to_string()),
                            ("stage", stage.stage.to_string()),
                            ("country", country.clone()),
                        ],
                    )?;
                    render_heatmap(&spec, font.as_ref(), &path)?;
                    charts.push(path);
                }
            }
            Ok((report, charts))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut summary = String::new();
    let mut charts = Vec::new();
    let mut reports = Vec::new();
    for (report, country_charts) in per_country {
        writeln!(summary, "{}", report.country)?;
        for s in &report.stages {
            writeln!(
                summary,
                "Round {}: Fixture vs Division - {}",
                s.stage,
                chi_square_line(&s.fixture_division)
            )?;
            writeln!(
                summary,
                "Round {}: Fixture vs Rank - {}",
                s.stage,
                chi_square_line(&s.fixture_rank)
            )?;
        }
        charts.extend(country_charts);
        reports.push(report);
    }
    if let Some(path) = &config.summary_csv {
        let mut csv_rows = Vec::new();
        for report in &reports {
            for s in &report.stages {
                csv_rows.push(ChiSquareRow::new(&report.country, s.stage, "fixture_division", s.rows, &s.fixture_division));
                csv_rows.push(ChiSquareRow::new(&report.country, s.stage, "fixture_rank", s.rows, &s.fixture_rank));
            }
        }
        write_summary_csv(path, &csv_rows)?;
    }

    Ok(PipelineOutput {
        results: reports,
        charts,
        summary,
    })
}

// ============================================================================
// Unique combinations
// ============================================================================

#[derive(Debug, Clone)]
pub struct UniqueCombinationsConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub country: String,
    pub year: i64,
    pub max_stage: i64,
    pub file_template: String,
    pub summary_csv: Option<PathBuf>,
    pub render: RenderConfig,
}

impl Default for UniqueCombinationsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_FIXTURES),
            output_dir: PathBuf::from("data"),
            country: "England".to_string(),
            year: 2020,
            max_stage: 6,
            file_template: "{country}_{year}_unique_combinations.png".to_string(),
            summary_csv: None,
            render: RenderConfig::default(),
        }
    }
}

/// Bar chart of the share of unique opponent rank/division combinations
/// per round of one season.
pub fn run_unique_combinations(
    config: &UniqueCombinationsConfig,
) -> Result<PipelineOutput<Vec<UniqueCombinationStage>>> {
    let records = load_fixtures(&config.input)?;
    let refs = as_refs(&records);
    let stages = unique_combination_percentage(&refs, &config.country, config.year, config.max_stage);
    let mut summary = String::new();
    for s in &stages {
        writeln!(
            summary,
            "Round {}: {} unique of {} combinations ({:.1}%)",
            s.stage, s.unique, s.rows, s.percentage
        )?;
    }

    let mut charts = Vec::new();
    if stages.is_empty() {
        log::warn!(
            "No cup rounds up to {} for {} {}, skipping the bar chart",
            config.max_stage,
            config.country,
            config.year
        );
    } else {
        let path = render_unique_combinations(config, &stages)?;
        writeln!(summary, "Bar chart saved to {}", path.display())?;
        charts.push(path);
    }

    if let Some(csv_path) = &config.summary_csv {
        #[derive(Serialize)]
        struct Row<'a> {
            country: &'a str,
            year: i64,
            stage: i64,
            rows: usize,
            unique: usize,
            percentage: f64,
        }
        impl SummaryRow for Row<'_> {
            const HEADER: &'static [&'static str] =
                &["country", "year", "stage", "rows", "unique", "percentage"];
        }
        let rows: Vec<Row> = stages
            .iter()
            .map(|s| Row {
                country: &config.country,
                year: config.year,
                stage: s.stage,
                rows: s.rows,
                unique: s.unique,
                percentage: s.percentage,
            })
            .collect();
        write_summary_csv(csv_path, &rows)?;
    }

    Ok(PipelineOutput {
        results: stages,
        charts,
        summary,
    })
}

/// Bar chart of the unique combination share per round.
fn render_unique_combinations(
    config: &UniqueCombinationsConfig,
    stages: &[UniqueCombinationStage],
) -> Result<PathBuf> {
    let font = config.render.load_font()?;
    let series = BarSeries {
        name: "Unique Combination (%)".to_string(),
        values: stages.iter().map(|s| Some(s.percentage)).collect(),
        color: RGBColor(211, 211, 211),
    };
    let mut spec = BarChartSpec::new(
        Figure::new(10.0, 6.0, config.render.dpi),
        stages.iter().map(|s| s.stage.to_string()).collect(),
        vec![series],
    )
    .with_title(&format!(
        "Percentage of Unique Combinations of Opponent Position and Division for FA Cup {}",
        config.year
    ))
    .with_axis_labels("Cup Round", "Unique Combination (%)");
    spec.y_ticks = YTicks::Step(20.0);
    spec.reference_line = Some(100.0);

    let path = output_path(
        &config.output_dir,
        &config.file_template,
        &[
            ("country", config.country.clone()),
            ("year", config.year.to_string()),
        ],
    )?;
    render_bar_chart(&spec, font.as_ref(), &path)?;
    Ok(path)
}

// ============================================================================
// Causal effect
// ============================================================================

/// Which 2SLS estimate is plotted
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CausalEffectKind {
    /// Effect of winning the cup fixture
    CupWin,
    /// Effect of taking part in the cup round
    Participation,
}

#[derive(Debug, Clone)]
pub struct CausalEffectConfig {
    /// 2SLS results CSV
    pub input: PathBuf,
    pub plots_dir: PathBuf,
    pub model: String,
    /// Inclusive round range
    pub stages: (i64, i64),
    /// Rounds whose first-stage F exceeds this are marked
    pub f_threshold: f64,
    /// Rounds marked regardless of their F statistic
    pub always_highlight: Vec<i64>,
    /// Explicit x ticks; the plotted rounds when empty
    pub x_ticks: Vec<i64>,
    pub file_name: String,
    pub highlight_label: String,
    pub summary_csv: Option<PathBuf>,
    pub render: RenderConfig,
}

impl CausalEffectConfig {
    pub fn for_kind(kind: CausalEffectKind) -> Self {
        let results_dir = Path::new("results/combined/2SLS_Results");
        match kind {
            CausalEffectKind::CupWin => Self {
                input: results_dir.join("combined_2sls_results_2023.csv"),
                plots_dir: PathBuf::from("plots"),
                model: "Model 7".to_string(),
                stages: (1, 6),
                f_threshold: 10.0,
                always_highlight: vec![4],
                x_ticks: Vec::new(),
                file_name: "causal_effect_cup_win.png".to_string(),
                highlight_label: "F-stat. greater than 10".to_string(),
                summary_csv: None,
                render: RenderConfig::default(),
            },
            CausalEffectKind::Participation => Self {
                input: results_dir.join("combined_2sls_results_next_team_points_round_plus.csv"),
                plots_dir: PathBuf::from("plots"),
                model: "Model 7".to_string(),
                stages: (2, 6),
                f_threshold: 9.0,
                always_highlight: Vec::new(),
                x_ticks: (2..=6).collect(),
                file_name: "causal_effect_cup_participation.png".to_string(),
                highlight_label: "F-stat greater than 9".to_string(),
                summary_csv: None,
                render: RenderConfig::default(),
            },
        }
    }

    /// A round is marked on the chart when its instrument is strong or it
    /// is listed in `always_highlight`.
    pub fn is_highlighted(&self, r: &IvResult) -> bool {
        r.is_strong_instrument(self.f_threshold) || self.always_highlight.contains(&r.stage)
    }

    /// Stages of `selected` marked on the chart, in input order
    pub fn highlighted_rounds(&self, selected: &[IvResult]) -> Vec<i64> {
        selected
            .iter()
            .filter(|r| self.is_highlighted(r))
            .map(|r| r.stage)
            .collect()
    }
}

impl Default for CausalEffectConfig {
    fn default() -> Self {
        Self::for_kind(CausalEffectKind::CupWin)
    }
}

/// Plot the per-round causal effect estimates of one model with their
/// standard errors, marking rounds with a strong instrument.
pub fn run_causal_effect(config: &CausalEffectConfig) -> Result<PipelineOutput<Vec<IvResult>>> {
    let results = load_iv_results(&config.input)?;
    let selected = select_model(&results, &config.model, config.stages);
    if selected.is_empty() {
        bail!(
            "No rows for '{}' in rounds {}-{} of {}",
            config.model,
            config.stages.0,
            config.stages.1,
            config.input.display()
        );
    }
    let font = config.render.load_font()?;

    let points = selected
        .iter()
        .map(|r| ErrorBarPoint {
            x: r.stage as f64,
            y: r.second_stage_coefficient,
            err: r.second_stage_std_error,
            highlighted: config.is_highlighted(r),
        })
        .collect();
    let mut spec = ErrorBarSpec::new(Figure::new(10.0, 6.0, config.render.dpi), points)
        .with_axis_labels("Cup Round", "Causal Effect (Points in Next League Fixture)")
        .with_legend("Causal Effect", &config.highlight_label);
    spec.x_ticks = config.x_ticks.clone();

    let path = config.plots_dir.join(&config.file_name);
    render_error_bar_chart(&spec, font.as_ref(), &path)?;

    let mut summary = String::new();
    for r in &selected {
        writeln!(
            summary,
            "Round {}: Causal Effect = {:.4}, Std. Error = {:.4}, First-stage F = {:.2}{}",
            r.stage,
            r.second_stage_coefficient,
            r.second_stage_std_error,
            r.first_stage_f_stat,
            if r.is_strong_instrument(config.f_threshold) { " *" } else { "" }
        )?;
    }
    let marked: Vec<String> = config
        .highlighted_rounds(&selected)
        .iter()
        .map(|s| s.to_string())
        .collect();
    writeln!(summary, "Highlighted rounds: {}", marked.join(", "))?;

    if let Some(csv_path) = &config.summary_csv {
        write_summary_csv(csv_path, &selected)?;
    }

    Ok(PipelineOutput {
        results: selected,
        charts: vec![path],
        summary,
    })
}

// ============================================================================
// Exploratory charts
// ============================================================================

#[derive(Debug, Clone)]
pub struct EdaConfig {
    pub input: PathBuf,
    /// Charts go to `<output_dir>/<label>/`
    pub output_dir: PathBuf,
    /// Dataset label used as the output subdirectory
    pub label: String,
    pub summary_csv: Option<PathBuf>,
    pub render: RenderConfig,
}

impl Default for EdaConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("eda/data/combined_cup_processed_participation.csv"),
            output_dir: PathBuf::from("eda/plots/new"),
            label: "Combined".to_string(),
            summary_csv: None,
            render: RenderConfig::default(),
        }
    }
}

/// Aggregates behind the exploratory charts
#[derive(Debug, Clone)]
pub struct EdaResults {
    pub correlation: CorrelationMatrix,
    pub by_rank_diff: GroupedMeans,
    pub by_fixture_days: GroupedMeans,
}

const CUP_RESULT_COLORS: [&str; 2] = ["#A0A0A0", "#4C9A2A"];
const DIVISION_PALETTE: [&str; 4] = ["#A0A0A0", "#4C9A2A", "#6aa84f", "#808080"];

fn grouped_bar_series(means: &GroupedMeans, palette: &[&str]) -> Vec<BarSeries> {
    means
        .series
        .iter()
        .zip(&means.values)
        .enumerate()
        .map(|(i, (name, values))| BarSeries {
            name: name.clone(),
            values: values.clone(),
            color: palette_color(palette, i),
        })
        .collect()
}

fn palette_color(palette: &[&str], i: usize) -> RGBColor {
    hex(palette[i % palette.len()])
}

/// Correlation heatmap of the model variables, grouped as outcome (Y),
/// instrument (Z), treatment (W) and control (X).
fn correlation_heatmap(figure: Figure, correlation: &CorrelationMatrix) -> HeatmapSpec {
    let labels = correlation.labels();
    let mut spec = HeatmapSpec::new(figure, correlation.values.clone(), labels.clone(), labels)
        .with_style(Colormap::Greys, ValueFormat::Fixed(2));
    spec.colorbar_label = Some("Correlation Coefficient".to_string());
    spec.groups = [
        ("Y", Variable::OUTCOMES.len()),
        ("Z", Variable::INSTRUMENTS.len()),
        ("W", Variable::TREATMENTS.len()),
        ("X", Variable::CONTROLS.len()),
    ]
    .into_iter()
    .map(|(letter, size)| HeatmapGroup {
        letter: letter.to_string(),
        size,
    })
    .collect();
    spec.rotate_col_labels = true;
    spec.cell_borders = true;
    spec.annotation_pt = 9.0;
    spec
}

/// Render the exploratory charts: variable correlations, next-fixture
/// points by opponent strength and cup result, and league points by
/// recovery days and team division.
pub fn run_eda(config: &EdaConfig) -> Result<PipelineOutput<EdaResults>> {
    let records = load_fixtures(&config.input)?;
    let refs = as_refs(&records);
    let font = config.render.load_font()?;
    let dir = config.output_dir.join(&config.label);
    let mut charts = Vec::new();
    let mut summary = String::new();

    let variables: Vec<Variable> = Variable::OUTCOMES
        .iter()
        .chain(&Variable::INSTRUMENTS)
        .chain(&Variable::TREATMENTS)
        .chain(&Variable::CONTROLS)
        .copied()
        .collect();
    let correlation = correlation_matrix(&refs, &variables);
    let path = dir.join("correlation_heatmap.png");
    render_heatmap(
        &correlation_heatmap(Figure::new(10.0, 8.0, config.render.dpi), &correlation),
        font.as_ref(),
        &path,
    )?;
    writeln!(
        summary,
        "Correlation heatmap: {} variables over {} rows",
        variables.len(),
        refs.len()
    )?;
    charts.push(path);

    let by_rank_diff = performance_by_rank_diff(&refs);
    let mut spec = BarChartSpec::new(
        Figure::new(10.0, 6.0, config.render.dpi),
        by_rank_diff.groups.clone(),
        grouped_bar_series(&by_rank_diff, &CUP_RESULT_COLORS),
    )
    .with_axis_labels(
        "Relative Strength of Opponent in Cup Fixture",
        "Average Points in Next League Fixture",
    );
    spec.y_range = Some((0.0, 2.5));
    spec.y_ticks = YTicks::Explicit(vec![0.5, 1.0, 1.5, 2.0, 2.5]);
    spec.y_grid = true;
    spec.legend_title = Some("Cup Fixture Result".to_string());
    spec.legend_frame = false;
    let path = dir.join("performance_next_fixture_by_rank_diff.png");
    render_bar_chart(&spec, font.as_ref(), &path)?;
    charts.push(path);
    write_means_summary(&mut summary, "Next-fixture points by opponent strength", &by_rank_diff)?;

    let by_fixture_days = performance_by_fixture_days(&refs);
    if by_fixture_days.groups.is_empty() {
        log::warn!("No rows with 2 to 6 recovery days. Skipping recovery-days chart...");
    } else {
        let mut spec = BarChartSpec::new(
            Figure::new(10.0, 6.0, config.render.dpi),
            by_fixture_days.groups.clone(),
            grouped_bar_series(&by_fixture_days, &DIVISION_PALETTE),
        )
        .with_axis_labels(
            "Recovery Days Between Cup and League Fixture",
            "Average Points in League Fixture",
        );
        spec.y_range = Some((0.0, 3.0));
        spec.y_grid = true;
        spec.legend_title = Some("Team Division".to_string());
        spec.legend_frame = false;
        let path = dir.join("performance_effect_fixture_days.png");
        render_bar_chart(&spec, font.as_ref(), &path)?;
        charts.push(path);
    }
    write_means_summary(&mut summary, "League points by recovery days", &by_fixture_days)?;

    if let Some(csv_path) = &config.summary_csv {
        #[derive(Serialize)]
        struct Row<'a> {
            chart: &'a str,
            group: &'a str,
            series: &'a str,
            mean: f64,
        }
        impl SummaryRow for Row<'_> {
            const HEADER: &'static [&'static str] = &["chart", "group", "series", "mean"];
        }
        let mut rows = Vec::new();
        for (chart, means) in [
            ("rank_diff", &by_rank_diff),
            ("fixture_days", &by_fixture_days),
        ] {
            for (s, series) in means.series.iter().enumerate() {
                for (g, group) in means.groups.iter().enumerate() {
                    if let Some(mean) = means.values[s][g] {
                        rows.push(Row {
                            chart,
                            group,
                            series,
                            mean,
                        });
                    }
                }
            }
        }
        write_summary_csv(csv_path, &rows)?;
    }

    Ok(PipelineOutput {
        results: EdaResults {
            correlation,
            by_rank_diff,
            by_fixture_days,
        },
        charts,
        summary,
    })
}

fn write_means_summary(out: &mut String, title: &str, means: &GroupedMeans) -> Result<()> {
    writeln!(out, "{}", title)?;
    for (s, series) in means.series.iter().enumerate() {
        let cells: Vec<String> = means
            .groups
            .iter()
            .zip(&means.values[s])
            .map(|(group, v)| match v {
                Some(v) => format!("{} {:.2}", group, v),
                None => format!("{} -", group),
            })
            .collect();
        writeln!(out, "  {}: {}", series, cells.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_analysis_constants() {
        let combined = DrawRandomnessConfig::default();
        assert_eq!(combined.countries, vec!["Germany"]);
        assert_eq!(combined.max_stage, 4);
        assert_eq!(combined.excluded_divisions, vec![4]);

        let complete = CompleteDrawRandomnessConfig::default();
        assert_eq!(complete.countries, vec!["Portugal"]);
        assert_eq!(complete.max_stage, 6);
        assert_eq!(complete.excluded_divisions, vec![3]);

        let win = CausalEffectConfig::for_kind(CausalEffectKind::CupWin);
        assert_eq!((win.stages, win.f_threshold), ((1, 6), 10.0));
        assert_eq!(win.always_highlight, vec![4]);

        let participation = CausalEffectConfig::for_kind(CausalEffectKind::Participation);
        assert_eq!((participation.stages, participation.f_threshold), ((2, 6), 9.0));
        assert_eq!(participation.x_ticks, vec![2, 3, 4, 5, 6]);
    }

    fn iv(stage: i64, f: f64) -> IvResult {
        IvResult {
            model: "Model 7".to_string(),
            stage,
            second_stage_coefficient: 0.1,
            second_stage_std_error: 0.05,
            first_stage_f_stat: f,
        }
    }

    #[test]
    fn test_highlighted_rounds() {
        let rows = vec![iv(2, 10.0), iv(3, 10.5), iv(4, 2.0), iv(5, 9.5)];

        // Round 4 is always marked on the cup win chart, 10.0 is not above 10
        let win = CausalEffectConfig::for_kind(CausalEffectKind::CupWin);
        assert_eq!(win.highlighted_rounds(&rows), vec![3, 4]);

        let participation = CausalEffectConfig::for_kind(CausalEffectKind::Participation);
        assert_eq!(participation.highlighted_rounds(&rows), vec![2, 3, 5]);
    }

    #[test]
    fn test_palette_cycles() {
        assert_eq!(palette_color(&DIVISION_PALETTE, 4), palette_color(&DIVISION_PALETTE, 0));
        assert_eq!(palette_color(&CUP_RESULT_COLORS, 1), RGBColor(0x4c, 0x9a, 0x2a));
    }

    #[test]
    fn test_correlation_heatmap_groups_cover_variables() {
        let variables: Vec<Variable> = Variable::OUTCOMES
            .iter()
            .chain(&Variable::INSTRUMENTS)
            .chain(&Variable::TREATMENTS)
            .chain(&Variable::CONTROLS)
            .copied()
            .collect();
        let correlation = correlation_matrix(&[], &variables);
        let spec = correlation_heatmap(Figure::new(2.0, 2.0, 20.0), &correlation);
        let covered: usize = spec.groups.iter().map(|g| g.size).sum();
        assert_eq!(covered, 15);
        assert_eq!(spec.groups[0].letter, "Y");
    }
}
