//! Cup Analysis - draw randomness tests, causal effect plots and EDA charts
//!
//! Runs the analyses of the cup causality study on a processed fixture
//! dataset (or precomputed 2SLS results) and writes the charts as PNG files.
//! Set `RUST_LOG=info` to see every chart as it is written.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use cup_causality_toolkit::pipeline::{
    run_causal_effect, run_complete_draw_randomness, run_draw_randomness, run_eda,
    run_unique_combinations, CausalEffectConfig, CausalEffectKind, CompleteDrawRandomnessConfig,
    DrawRandomnessConfig, EdaConfig, RenderConfig, UniqueCombinationsConfig, DEFAULT_FIXTURES,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cup-analysis")]
#[command(about = "Draw randomness tests and causal effect charts for domestic cup competitions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Chart options shared by every subcommand
#[derive(Args)]
struct ChartArgs {
    /// Chart resolution in dots per inch
    #[arg(long)]
    dpi: Option<f32>,

    /// TrueType font for chart text (default: a system sans-serif font)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Also write the computed statistics to this CSV file
    #[arg(long)]
    summary_csv: Option<PathBuf>,
}

impl ChartArgs {
    fn render_config(&self, default: RenderConfig) -> RenderConfig {
        RenderConfig {
            dpi: self.dpi.unwrap_or(default.dpi),
            font: self.font.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Test opponent division against opponent rank per cup round
    DrawRandomness {
        /// Processed fixture CSV
        #[arg(short, long, env = "CUP_DATA", default_value = DEFAULT_FIXTURES)]
        input: PathBuf,

        /// Directory for the heatmaps
        #[arg(long, env = "CUP_PLOTS_DIR", default_value = "plots")]
        plots_dir: PathBuf,

        /// Countries to test (comma-separated)
        #[arg(long = "country", value_delimiter = ',', default_value = "Germany")]
        countries: Vec<String>,

        /// Last cup round tested
        #[arg(long, default_value = "4")]
        max_stage: i64,

        /// Opponent divisions dropped before testing (comma-separated)
        #[arg(long = "exclude-division", value_delimiter = ',', default_value = "4")]
        excluded_divisions: Vec<i64>,

        /// Only fixtures on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Only fixtures on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Test fixture id against opponent division and opponent rank per cup round
    DrawRandomnessComplete {
        #[arg(short, long, env = "CUP_DATA", default_value = DEFAULT_FIXTURES)]
        input: PathBuf,

        #[arg(long, env = "CUP_PLOTS_DIR", default_value = "plots")]
        plots_dir: PathBuf,

        #[arg(long = "country", value_delimiter = ',', default_value = "Portugal")]
        countries: Vec<String>,

        #[arg(long, default_value = "6")]
        max_stage: i64,

        #[arg(long = "exclude-division", value_delimiter = ',', default_value = "3")]
        excluded_divisions: Vec<i64>,

        #[arg(long)]
        from: Option<NaiveDate>,

        #[arg(long)]
        to: Option<NaiveDate>,

        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Percentage of unique opponent rank/division combinations per round
    UniqueCombinations {
        #[arg(short, long, env = "CUP_DATA", default_value = DEFAULT_FIXTURES)]
        input: PathBuf,

        /// Directory for the bar chart
        #[arg(long, env = "CUP_PLOTS_DIR", default_value = "data")]
        plots_dir: PathBuf,

        #[arg(long, default_value = "England")]
        country: String,

        /// Season year
        #[arg(long, default_value = "2020")]
        year: i64,

        #[arg(long, default_value = "6")]
        max_stage: i64,

        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Plot per-round 2SLS causal effect estimates with error bars
    CausalEffect {
        /// Which estimate to plot
        #[arg(long, value_enum, default_value = "cup-win")]
        kind: CausalEffectKind,

        /// 2SLS results CSV (default depends on --kind)
        #[arg(short, long, env = "CUP_IV_RESULTS")]
        input: Option<PathBuf>,

        #[arg(long, env = "CUP_PLOTS_DIR", default_value = "plots")]
        plots_dir: PathBuf,

        /// Model whose estimates are plotted
        #[arg(long, default_value = "Model 7")]
        model: String,

        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Correlation heatmap and grouped performance charts
    Eda {
        #[arg(
            short,
            long,
            env = "CUP_DATA",
            default_value = "eda/data/combined_cup_processed_participation.csv"
        )]
        input: PathBuf,

        /// Charts are written to <plots-dir>/<label>/
        #[arg(long, env = "CUP_PLOTS_DIR", default_value = "eda/plots/new")]
        plots_dir: PathBuf,

        /// Dataset label
        #[arg(long, default_value = "Combined")]
        label: String,

        #[command(flatten)]
        chart: ChartArgs,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let summary = match cli.command {
        Commands::DrawRandomness {
            input,
            plots_dir,
            countries,
            max_stage,
            excluded_divisions,
            from,
            to,
            chart,
        } => {
            let defaults = DrawRandomnessConfig::default();
            let config = DrawRandomnessConfig {
                input,
                plots_dir,
                countries,
                max_stage,
                excluded_divisions,
                date_window: (from, to),
                summary_csv: chart.summary_csv.clone(),
                render: chart.render_config(defaults.render.clone()),
                ..defaults
            };
            run_draw_randomness(&config)?.summary
        }
        Commands::DrawRandomnessComplete {
            input,
            plots_dir,
            countries,
            max_stage,
            excluded_divisions,
            from,
            to,
            chart,
        } => {
            let defaults = CompleteDrawRandomnessConfig::default();
            let config = CompleteDrawRandomnessConfig {
                input,
                plots_dir,
                countries,
                max_stage,
                excluded_divisions,
                date_window: (from, to),
                summary_csv: chart.summary_csv.clone(),
                render: chart.render_config(defaults.render.clone()),
                ..defaults
            };
            run_complete_draw_randomness(&config)?.summary
        }
        Commands::UniqueCombinations {
            input,
            plots_dir,
            country,
            year,
            max_stage,
            chart,
        } => {
            let defaults = UniqueCombinationsConfig::default();
            let config = UniqueCombinationsConfig {
                input,
                output_dir: plots_dir,
                country,
                year,
                max_stage,
                summary_csv: chart.summary_csv.clone(),
                render: chart.render_config(defaults.render.clone()),
                ..defaults
            };
            run_unique_combinations(&config)?.summary
        }
        Commands::CausalEffect {
            kind,
            input,
            plots_dir,
            model,
            chart,
        } => {
            let defaults = CausalEffectConfig::for_kind(kind);
            let config = CausalEffectConfig {
                input: input.unwrap_or_else(|| defaults.input.clone()),
                plots_dir,
                model,
                summary_csv: chart.summary_csv.clone(),
                render: chart.render_config(defaults.render.clone()),
                ..defaults
            };
            run_causal_effect(&config)?.summary
        }
        Commands::Eda {
            input,
            plots_dir,
            label,
            chart,
        } => {
            let defaults = EdaConfig::default();
            let config = EdaConfig {
                input,
                output_dir: plots_dir,
                label,
                summary_csv: chart.summary_csv.clone(),
                render: chart.render_config(defaults.render.clone()),
            };
            run_eda(&config)?.summary
        }
    };

    print!("{}", summary);
    Ok(())
}
