//! Point estimates with error bars, joined by a line.

use super::figure::{auto_ticks, format_tick, ChartFont, Figure, Raster, Root};
use anyhow::{bail, Result};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use std::path::Path;

const ZERO_LINE: RGBColor = RGBColor(128, 128, 128);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorBarPoint {
    pub x: f64,
    pub y: f64,
    /// Half-length of the error bar
    pub err: f64,
    /// Overlay a red cross marker
    pub highlighted: bool,
}

#[derive(Debug, Clone)]
pub struct ErrorBarSpec {
    pub figure: Figure,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<ErrorBarPoint>,
    /// Integer tick positions; the points' x values when empty
    pub x_ticks: Vec<i64>,
    pub line_label: String,
    pub highlight_label: String,
    pub zero_line: bool,
}

impl ErrorBarSpec {
    pub fn new(figure: Figure, points: Vec<ErrorBarPoint>) -> Self {
        Self {
            figure,
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            points,
            x_ticks: Vec::new(),
            line_label: String::new(),
            highlight_label: String::new(),
            zero_line: true,
        }
    }

    pub fn with_axis_labels(mut self, x_label: &str, y_label: &str) -> Self {
        self.x_label = x_label.to_string();
        self.y_label = y_label.to_string();
        self
    }

    pub fn with_legend(mut self, line_label: &str, highlight_label: &str) -> Self {
        self.line_label = line_label.to_string();
        self.highlight_label = highlight_label.to_string();
        self
    }

    fn x_ticks(&self) -> Vec<i64> {
        if !self.x_ticks.is_empty() {
            return self.x_ticks.clone();
        }
        let mut ticks: Vec<i64> = self.points.iter().map(|p| p.x.round() as i64).collect();
        ticks.dedup();
        ticks
    }

    /// Data limits padded by 5% on each side, always including zero when
    /// the zero line is drawn.
    fn ranges(&self) -> ((f64, f64), (f64, f64)) {
        let xs = self.points.iter().map(|p| p.x).chain(self.x_ticks.iter().map(|&t| t as f64));
        let (x_lo, x_hi) = min_max(xs);
        let ys = self.points.iter().flat_map(|p| [p.y - p.err.abs(), p.y + p.err.abs()]);
        let (mut y_lo, mut y_hi) = min_max(ys);
        if self.zero_line {
            y_lo = y_lo.min(0.0);
            y_hi = y_hi.max(0.0);
        }
        (pad(x_lo, x_hi), pad(y_lo, y_hi))
    }

    pub fn draw(&self, font: Option<&ChartFont>) -> Result<Raster> {
        if self.points.is_empty() {
            bail!("Error bar chart has no points");
        }
        if let Some(p) = self.points.iter().find(|p| !p.y.is_finite() || !p.err.is_finite()) {
            bail!("Non-finite estimate at x = {}", p.x);
        }
        Raster::paint(&self.figure, |root| self.paint(root, font))
    }

    fn paint(&self, root: &Root<'_>, font: Option<&ChartFont>) -> Result<()> {
        let fig = &self.figure;
        let ((x_lo, x_hi), (y_lo, y_hi)) = self.ranges();

        let mut builder = ChartBuilder::on(root);
        builder.margin(fig.px(10.0));
        if let Some(font) = font {
            builder
                .x_label_area_size(fig.px(36.0))
                .y_label_area_size(fig.px(54.0));
            if !self.title.is_empty() {
                builder.caption(&self.title, (font.family(), fig.pt(14.0)));
            }
        }
        let x_keys: Vec<f64> = self.x_ticks().into_iter().map(|t| t as f64).collect();
        let mut chart = builder.build_cartesian_2d(
            (x_lo..x_hi).with_key_points(x_keys),
            (y_lo..y_hi).with_key_points(auto_ticks(y_lo, y_hi, 8)),
        )?;

        let x_label = |v: &f64| format!("{}", v.round() as i64);
        let y_label = |v: &f64| format_tick(*v);
        let mut mesh = chart.configure_mesh();
        mesh.disable_x_mesh()
            .disable_y_mesh()
            .x_label_formatter(&x_label)
            .y_label_formatter(&y_label)
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

        if self.zero_line {
            chart.draw_series(DashedLineSeries::new(
                vec![(x_lo, 0.0), (x_hi, 0.0)],
                fig.px(3.7),
                fig.px(1.6),
                ZERO_LINE.stroke_width(fig.px(1.0)),
            ))?;
        }

        let line = BLACK.stroke_width(fig.px(1.0));
        chart.draw_series(self.points.iter().map(|p| {
            let e = p.err.abs();
            ErrorBar::new_vertical(p.x, p.y - e, p.y, p.y + e, line, fig.px(10.0))
        }))?;

        let marker = fig.px(3.0);
        let swatch = fig.px(10.0) as i32;
        let estimates =
            chart.draw_series(LineSeries::new(self.points.iter().map(|p| (p.x, p.y)), line))?;
        if !self.line_label.is_empty() {
            estimates
                .label(self.line_label.as_str())
                .legend(move |(x, y)| {
                    EmptyElement::at((x, y))
                        + PathElement::new(vec![(0, 0), (2 * swatch, 0)], line)
                        + Circle::new((swatch, 0), marker, BLACK.filled())
                });
        }
        chart.draw_series(
            self.points
                .iter()
                .map(|p| Circle::new((p.x, p.y), marker, BLACK.filled())),
        )?;

        // s=200 in matplotlib units is about 14pt across
        let cross = RED.stroke_width(fig.px(1.5));
        let cross_size = fig.px(7.0);
        let highlights = chart.draw_series(
            self.points
                .iter()
                .filter(|p| p.highlighted)
                .map(|p| Cross::new((p.x, p.y), cross_size, cross)),
        )?;
        if !self.highlight_label.is_empty() {
            highlights
                .label(self.highlight_label.as_str())
                .legend(move |(x, y)| Cross::new((x + swatch, y), cross_size, cross));
        }

        chart.draw_series(std::iter::once(Rectangle::new(
            [(x_lo, y_hi), (x_hi, y_lo)],
            BLACK.stroke_width(fig.px(0.8)),
        )))?;

        let has_legend = !self.line_label.is_empty() || !self.highlight_label.is_empty();
        if let Some(font) = font.filter(|_| has_legend) {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .label_font((font.family(), fig.pt(10.0)))
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()?;
        }
        Ok(())
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn pad(lo: f64, hi: f64) -> (f64, f64) {
    if !(hi > lo) {
        return (lo - 0.5, lo + 0.5);
    }
    let margin = (hi - lo) * 0.05;
    (lo - margin, hi + margin)
}

/// Draw `spec` and write it to `path` as a PNG.
pub fn render_error_bar_chart(
    spec: &ErrorBarSpec,
    font: Option<&ChartFont>,
    path: &Path,
) -> Result<()> {
    spec.draw(font)?.save_png(path)
}
