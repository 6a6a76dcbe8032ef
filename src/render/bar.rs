//! Grouped bar charts.

use super::figure::{auto_ticks, format_tick, ticks_with_step, ChartFont, Figure, Raster, Root};
use anyhow::{bail, Result};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use std::path::Path;

const REFERENCE: RGBColor = RGBColor(128, 128, 128);
const GRID: RGBColor = RGBColor(178, 178, 178);
const LEGEND_EDGE: RGBColor = RGBColor(204, 204, 204);

/// One bar per category; `None` leaves a gap
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub name: String,
    pub values: Vec<Option<f64>>,
    pub color: RGBColor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum YTicks {
    Auto,
    Step(f64),
    Explicit(Vec<f64>),
}

#[derive(Debug, Clone)]
pub struct BarChartSpec {
    pub figure: Figure,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub categories: Vec<String>,
    pub series: Vec<BarSeries>,
    pub alpha: f64,
    /// Fixed y limits; zero to a little above the tallest bar otherwise
    pub y_range: Option<(f64, f64)>,
    pub y_ticks: YTicks,
    /// Dashed gray line at this value
    pub reference_line: Option<f64>,
    pub y_grid: bool,
    /// Legend is drawn when set, or when there is more than one series
    pub legend_title: Option<String>,
    pub legend_frame: bool,
}

impl BarChartSpec {
    pub fn new(figure: Figure, categories: Vec<String>, series: Vec<BarSeries>) -> Self {
        Self {
            figure,
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            categories,
            series,
            alpha: 0.8,
            y_range: None,
            y_ticks: YTicks::Auto,
            reference_line: None,
            y_grid: false,
            legend_title: None,
            legend_frame: true,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_axis_labels(mut self, x_label: &str, y_label: &str) -> Self {
        self.x_label = x_label.to_string();
        self.y_label = y_label.to_string();
        self
    }

    fn y_range(&self) -> (f64, f64) {
        if let Some(range) = self.y_range {
            return range;
        }
        let values = self.series.iter().flat_map(|s| s.values.iter().flatten().copied());
        let (lo, hi) = values
            .chain(self.reference_line)
            .fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if hi > lo {
            (lo * 1.05, hi * 1.05)
        } else {
            (0.0, 1.0)
        }
    }

    fn y_tick_values(&self, (lo, hi): (f64, f64)) -> Vec<f64> {
        match &self.y_ticks {
            YTicks::Auto => auto_ticks(lo, hi, 8),
            YTicks::Step(step) => ticks_with_step(lo, hi, *step),
            YTicks::Explicit(ticks) => ticks.clone(),
        }
    }

    /// Left edge and width of bar `s` in category `c`, in data units
    fn bar_slot(&self, c: usize, s: usize) -> (f64, f64) {
        let group_width = 0.8;
        let width = group_width / self.series.len() as f64;
        (c as f64 - group_width / 2.0 + s as f64 * width, width)
    }

    fn show_legend(&self) -> bool {
        self.series.len() > 1 || self.legend_title.is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            bail!("Bar chart has no categories");
        }
        if self.series.is_empty() {
            bail!("Bar chart has no series");
        }
        if let Some(s) = self.series.iter().find(|s| s.values.len() != self.categories.len()) {
            bail!(
                "Series '{}' has {} values for {} categories",
                s.name,
                s.values.len(),
                self.categories.len()
            );
        }
        Ok(())
    }

    pub fn draw(&self, font: Option<&ChartFont>) -> Result<Raster> {
        self.validate()?;
        Raster::paint(&self.figure, |root| self.paint(root, font))
    }

    fn paint(&self, root: &Root<'_>, font: Option<&ChartFont>) -> Result<()> {
        let fig = &self.figure;
        let (lo, hi) = self.y_range();
        let (x_lo, x_hi) = (-0.5, self.categories.len() as f64 - 0.5);

        let mut builder = ChartBuilder::on(root);
        builder.margin(fig.px(10.0));
        if let Some(font) = font {
            builder
                .x_label_area_size(fig.px(36.0))
                .y_label_area_size(fig.px(48.0));
            if !self.title.is_empty() {
                builder.caption(&self.title, (font.family(), fig.pt(12.0)));
            }
        }
        let category_ticks: Vec<f64> = (0..self.categories.len()).map(|i| i as f64).collect();
        let ticks = self.y_tick_values((lo, hi));
        let mut chart = builder.build_cartesian_2d(
            (x_lo..x_hi).with_key_points(category_ticks),
            (lo..hi).with_key_points(ticks.clone()),
        )?;

        let category_label = |v: &f64| {
            let i = v.round();
            if i < 0.0 {
                return String::new();
            }
            self.categories.get(i as usize).cloned().unwrap_or_default()
        };
        let value_label = |v: &f64| format_tick(*v);
        let mut mesh = chart.configure_mesh();
        mesh.disable_x_mesh()
            .disable_y_mesh()
            .x_label_formatter(&category_label)
            .y_label_formatter(&value_label)
            .axis_style(BLACK.stroke_width(fig.px(0.8)));
        if let Some(font) = font {
            mesh.label_style((font.family(), fig.pt(10.0)))
                .axis_desc_style((font.family(), fig.pt(12.0)));
            if !self.x_label.is_empty() {
                mesh.x_desc(self.x_label.as_str());
            }
            if !self.y_label.is_empty() {
                mesh.y_desc(self.y_label.as_str());
            }
        }
        mesh.draw()?;

        if self.y_grid {
            for &t in &ticks {
                chart.draw_series(DashedLineSeries::new(
                    vec![(x_lo, t), (x_hi, t)],
                    fig.px(3.7),
                    fig.px(1.6),
                    GRID.stroke_width(fig.px(0.5)),
                ))?;
            }
        }

        if let (Some(_), Some(title)) = (font, &self.legend_title) {
            // Legend heading without a swatch
            chart
                .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())?
                .label(title.as_str())
                .legend(|(x, y)| EmptyElement::at((x, y)));
        }

        let baseline = 0.0f64.clamp(lo, hi);
        let swatch = (fig.px(14.0) as i32, fig.px(4.0) as i32);
        for (s, series) in self.series.iter().enumerate() {
            let fill = series.color.mix(self.alpha).filled();
            let bars: Vec<[(f64, f64); 2]> = series
                .values
                .iter()
                .enumerate()
                .filter_map(|(c, v)| v.map(|v| (c, v.clamp(lo, hi))))
                .map(|(c, v)| {
                    let (x, w) = self.bar_slot(c, s);
                    [(x, v.max(baseline)), (x + w, v.min(baseline))]
                })
                .collect();

            chart
                .draw_series(bars.iter().map(|&corners| Rectangle::new(corners, fill)))?
                .label(series.name.as_str())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - swatch.1), (x + swatch.0, y + swatch.1)], fill)
                });
            let edge = BLACK.stroke_width(fig.px(0.5));
            chart.draw_series(bars.iter().map(|&corners| Rectangle::new(corners, edge)))?;
        }

        if let Some(value) = self.reference_line {
            chart.draw_series(DashedLineSeries::new(
                vec![(x_lo, value), (x_hi, value)],
                fig.px(3.7),
                fig.px(1.6),
                REFERENCE.stroke_width(fig.px(1.0)),
            ))?;
        }

        // Box around the plot area
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x_lo, hi), (x_hi, lo)],
            BLACK.stroke_width(fig.px(0.8)),
        )))?;

        if let Some(font) = font {
            if self.show_legend() {
                let (background, border) = if self.legend_frame {
                    (WHITE.mix(0.8), LEGEND_EDGE.to_rgba())
                } else {
                    (TRANSPARENT, TRANSPARENT)
                };
                chart
                    .configure_series_labels()
                    .position(SeriesLabelPosition::UpperRight)
                    .label_font((font.family(), fig.pt(10.0)))
                    .background_style(&background)
                    .border_style(&border)
                    .draw()?;
            }
        }
        Ok(())
    }
}

/// Draw `spec` and write it to `path` as a PNG.
pub fn render_bar_chart(spec: &BarChartSpec, font: Option<&ChartFont>, path: &Path) -> Result<()> {
    spec.draw(font)?.save_png(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::figure::hex;

    fn chart(series: Vec<BarSeries>) -> BarChartSpec {
        BarChartSpec::new(
            Figure::new(4.0, 3.0, 50.0),
            vec!["1".into(), "2".into(), "3".into()],
            series,
        )
    }

    #[test]
    fn test_bar_slots_split_group_width() {
        let spec = chart(vec![
            BarSeries { name: "Loss".into(), values: vec![None; 3], color: hex("#A0A0A0") },
            BarSeries { name: "Win".into(), values: vec![None; 3], color: hex("#4C9A2A") },
        ]);
        let (x0, w0) = spec.bar_slot(1, 0);
        let (x1, w1) = spec.bar_slot(1, 1);
        assert!((w0 - 0.4).abs() < 1e-12 && (w1 - 0.4).abs() < 1e-12);
        assert!((x0 - 0.6).abs() < 1e-12);
        assert!((x1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_auto_range_includes_reference_line() {
        let mut spec = chart(vec![BarSeries {
            name: "Unique".into(),
            values: vec![Some(40.0), Some(80.0), None],
            color: RGBColor(211, 211, 211),
        }]);
        spec.reference_line = Some(100.0);
        let (lo, hi) = spec.y_range();
        assert_eq!(lo, 0.0);
        assert!(hi >= 100.0);
    }

    #[test]
    fn test_step_ticks() {
        let mut spec = chart(vec![]);
        spec.y_ticks = YTicks::Step(20.0);
        assert_eq!(
            spec.y_tick_values((0.0, 105.0)),
            vec![0.0, 20.0, 40.0, 60.0, 80.0, 100.0]
        );
    }

    #[test]
    fn test_invalid_charts_are_errors() {
        let mismatched = chart(vec![BarSeries {
            name: "x".into(),
            values: vec![Some(1.0)],
            color: BLACK,
        }]);
        assert!(mismatched.draw(None).is_err());

        let empty = BarChartSpec::new(Figure::new(4.0, 3.0, 50.0), vec![], vec![]);
        let err = empty.draw(None).err().unwrap();
        assert!(err.to_string().contains("no categories"));
    }

    #[test]
    fn test_bars_are_filled() {
        let mut spec = chart(vec![BarSeries {
            name: "x".into(),
            values: vec![Some(1.0), Some(1.0), Some(1.0)],
            color: BLUE,
        }]);
        spec.alpha = 1.0;
        spec.y_range = Some((0.0, 2.0));
        spec.reference_line = Some(1.5);
        let raster = spec.draw(None).unwrap();
        assert!(raster.count_pixels(BLUE) > 100);
        assert!(raster.count_pixels(REFERENCE) > 0);
    }
}
