//! Cup Causality Toolkit
//!
//! Analysis tools for a causal-inference study of domestic cup competitions:
//! is the cup draw random, and what does a cup fixture do to league form?
//!
//! This library provides:
//! - `fixtures`: Loading and filtering of processed cup fixture records
//! - `contingency`: Cross-tabulation and chi-square independence testing
//! - `draw_randomness`: Per-round draw randomness tests and unique-combination ratios
//! - `iv_results`: Precomputed two-stage-least-squares results
//! - `eda`: Correlations and grouped means for exploratory charts
//! - `render`: PNG chart rendering (heatmaps, bar charts, error-bar plots)
//! - `output`: Output path templates and CSV summaries
//! - `pipeline`: End-to-end analyses used by the CLI
//!
//! Binaries:
//! - `cup-analysis`: Runs any of the analyses from the command line

pub mod contingency;
pub mod draw_randomness;
pub mod eda;
pub mod fixtures;
pub mod iv_results;
pub mod output;
pub mod pipeline;
pub mod render;

pub use contingency::{chi2_contingency, ChiSquareTest, ContingencyTable};
pub use fixtures::{load_fixtures, FixtureFilter, FixtureRecord, Variable};
pub use iv_results::{load_iv_results, IvResult};
