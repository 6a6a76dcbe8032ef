//! Chart rendering to PNG.
//!
//! Charts are drawn with `plotters` onto an in-memory bitmap and encoded
//! with `png`. Text uses a TrueType font registered with the `ab_glyph`
//! backend; without one, charts still render with their shapes and no text.

pub mod bar;
pub mod colormap;
pub mod error_bar;
pub mod figure;
pub mod heatmap;

pub use bar::{render_bar_chart, BarChartSpec, BarSeries, YTicks};
pub use colormap::Colormap;
pub use error_bar::{render_error_bar_chart, ErrorBarPoint, ErrorBarSpec};
pub use figure::{hex, load_font, load_system_font, ChartFont, Figure, Raster};
pub use heatmap::{render_heatmap, HeatmapGroup, HeatmapSpec, ValueFormat};
