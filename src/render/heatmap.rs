//! Annotated heatmaps for contingency tables and correlation matrices.

use super::colormap::{contrasting_text, Colormap};
use super::figure::{auto_ticks, draw_label, format_tick, ChartFont, Figure, Raster, Root};
use anyhow::{bail, Result};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

const CELL_BORDER: RGBColor = RGBColor(128, 128, 128);

/// How cell values are printed inside the cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    Integer,
    /// Fixed number of decimals
    Fixed(usize),
}

impl ValueFormat {
    pub fn format(self, v: f64) -> String {
        match self {
            ValueFormat::Integer => format!("{}", v.round() as i64),
            ValueFormat::Fixed(decimals) => format!("{:.*}", decimals, v),
        }
    }
}

/// A block of consecutive rows/columns outlined and lettered on the chart
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapGroup {
    pub letter: String,
    pub size: usize,
}

/// Heatmap of `values[row][col]`, first row on top
#[derive(Debug, Clone)]
pub struct HeatmapSpec {
    pub figure: Figure,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
    pub colormap: Colormap,
    pub value_format: ValueFormat,
    /// Colour scale; data min/max when unset
    pub value_range: Option<(f64, f64)>,
    /// Draw a colour bar with this label
    pub colorbar_label: Option<String>,
    /// Variable groups along both axes (square matrices only)
    pub groups: Vec<HeatmapGroup>,
    pub rotate_col_labels: bool,
    pub cell_borders: bool,
    pub annotation_pt: f32,
}

/// Pixel bounds of the cell grid
#[derive(Debug, Clone, Copy)]
struct Grid {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl Grid {
    fn center_x(&self) -> i32 {
        (self.left + self.right) / 2
    }

    fn center_y(&self) -> i32 {
        (self.top + self.bottom) / 2
    }
}

impl HeatmapSpec {
    pub fn new(
        figure: Figure,
        values: Vec<Vec<f64>>,
        row_labels: Vec<String>,
        col_labels: Vec<String>,
    ) -> Self {
        Self {
            figure,
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            row_labels,
            col_labels,
            values,
            colormap: Colormap::YlGnBu,
            value_format: ValueFormat::Integer,
            value_range: None,
            colorbar_label: None,
            groups: Vec::new(),
            rotate_col_labels: false,
            cell_borders: false,
            annotation_pt: 10.0,
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

    pub fn with_style(mut self, colormap: Colormap, value_format: ValueFormat) -> Self {
        self.colormap = colormap;
        self.value_format = value_format;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            bail!("Heatmap has no rows");
        }
        if self.values.len() != self.row_labels.len() {
            bail!(
                "Heatmap has {} rows but {} row labels",
                self.values.len(),
                self.row_labels.len()
            );
        }
        if let Some(row) = self.values.iter().find(|r| r.len() != self.col_labels.len()) {
            bail!(
                "Heatmap row has {} cells but there are {} column labels",
                row.len(),
                self.col_labels.len()
            );
        }
        if !self.groups.is_empty() {
            let covered: usize = self.groups.iter().map(|g| g.size).sum();
            if covered != self.values.len() || covered != self.col_labels.len() {
                bail!("Heatmap groups cover {} of {} variables", covered, self.values.len());
            }
        }
        Ok(())
    }

    fn value_range(&self) -> (f64, f64) {
        if let Some(range) = self.value_range {
            return range;
        }
        let finite = self.values.iter().flatten().copied().filter(|v| v.is_finite());
        let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if lo.is_finite() {
            (lo, hi)
        } else {
            (0.0, 1.0)
        }
    }

    /// Margins around the grid as fractions of the figure: left, top,
    /// right, bottom
    fn margins(&self) -> (f32, f32, f32, f32) {
        let has_groups = !self.groups.is_empty();
        let right = match (has_groups, self.colorbar_label.is_some()) {
            (true, true) => 0.22,
            (false, true) | (true, false) => 0.16,
            (false, false) => 0.05,
        };
        let bottom = if self.rotate_col_labels { 0.28 } else { 0.12 };
        let top = if has_groups { 0.08 } else { 0.1 };
        (0.2, top, right, bottom)
    }

    /// Draw the chart into a new raster.
    pub fn draw(&self, font: Option<&ChartFont>) -> Result<Raster> {
        self.validate()?;
        Raster::paint(&self.figure, |root| self.paint(root, font))
    }

    fn paint(&self, root: &Root<'_>, font: Option<&ChartFont>) -> Result<()> {
        let fig = &self.figure;
        let rows = self.values.len() as f64;
        let cols = self.col_labels.len() as f64;
        let (left, top, right, bottom) = self.margins();

        let mut chart = ChartBuilder::on(root)
            .margin_left(fig.width_frac(left))
            .margin_top(fig.height_frac(top))
            .margin_right(fig.width_frac(right))
            .margin_bottom(fig.height_frac(bottom))
            .build_cartesian_2d(0f64..cols, 0f64..rows)?;

        let (grid_left, grid_top) = chart.backend_coord(&(0.0, rows));
        let (grid_right, grid_bottom) = chart.backend_coord(&(cols, 0.0));
        let grid = Grid {
            left: grid_left,
            top: grid_top,
            right: grid_right,
            bottom: grid_bottom,
        };
        let cw = f64::from(grid.right - grid.left) / cols;
        let ch = f64::from(grid.bottom - grid.top) / rows;
        // Row i sits between y = rows - i - 1 and y = rows - i
        let row_y = |i: f64| rows - i;

        let (vmin, vmax) = self.value_range();
        let cells: Vec<(usize, usize, f64, RGBColor)> = self
            .values
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().enumerate().map(move |(j, &v)| (i, j, v)))
            .filter(|(_, _, v)| v.is_finite())
            .map(|(i, j, v)| (i, j, v, self.colormap.map(v, vmin, vmax)))
            .collect();

        chart.draw_series(cells.iter().map(|&(i, j, _, color)| {
            let (x, y) = (j as f64, row_y(i as f64));
            Rectangle::new([(x, y), (x + 1.0, y - 1.0)], color.filled())
        }))?;
        if self.cell_borders {
            let border = CELL_BORDER.stroke_width(fig.px(0.5));
            chart.draw_series(cells.iter().map(|&(i, j, _, _)| {
                let (x, y) = (j as f64, row_y(i as f64));
                Rectangle::new([(x, y), (x + 1.0, y - 1.0)], border)
            }))?;
        }

        if let Some(font) = font {
            let size = fig.pt(self.annotation_pt).min(ch * 0.45).min(cw * 0.3);
            for &(i, j, v, color) in &cells {
                let ink = contrasting_text(color);
                let style = font
                    .style(size)
                    .color(&ink)
                    .pos(Pos::new(HPos::Center, VPos::Center));
                let at = (j as f64 + 0.5, row_y(i as f64) - 0.5);
                chart.draw_series(std::iter::once(Text::new(
                    self.value_format.format(v),
                    at,
                    style,
                )))?;
            }
        }

        // Tick labels
        let tick_size = fig.pt(10.0).min(ch * 0.6);
        for (i, label) in self.row_labels.iter().enumerate() {
            let (_, y) = chart.backend_coord(&(0.0, row_y(i as f64) - 0.5));
            let at = (grid.left - fig.px(4.0) as i32, y);
            draw_label(root, font, label, at, tick_size, (HPos::Right, VPos::Center), false)?;
        }
        let col_tick_size = fig.pt(10.0).min(cw * 0.8);
        for (j, label) in self.col_labels.iter().enumerate() {
            let (x, _) = chart.backend_coord(&(j as f64 + 0.5, 0.0));
            let at = (x, grid.bottom + fig.px(4.0) as i32);
            if self.rotate_col_labels {
                draw_label(root, font, label, at, col_tick_size, (HPos::Right, VPos::Center), true)?;
            } else {
                draw_label(root, font, label, at, col_tick_size, (HPos::Center, VPos::Top), false)?;
            }
        }

        if !self.groups.is_empty() {
            self.draw_groups(root, &mut chart, font, &grid, cw)?;
        }

        if let Some(label) = &self.colorbar_label {
            let offset = if self.groups.is_empty() { 0 } else { (cw * 1.2) as i32 };
            self.draw_colorbar(root, font, &grid, offset, (vmin, vmax), label)?;
        }

        let (_, fig_height) = fig.pixel_size();
        let below = fig_height as i32 - grid.bottom;
        let x_label_y = if self.rotate_col_labels {
            // Under the rotated tick labels
            grid.bottom + below * 3 / 4
        } else {
            grid.bottom + below * 11 / 20
        };
        let axis_size = fig.pt(12.0);
        draw_label(
            root,
            font,
            &self.x_label,
            (grid.center_x(), x_label_y),
            axis_size,
            (HPos::Center, VPos::Center),
            false,
        )?;
        draw_label(
            root,
            font,
            &self.y_label,
            (grid.left / 4, grid.center_y()),
            axis_size,
            (HPos::Center, VPos::Center),
            true,
        )?;
        draw_label(
            root,
            font,
            &self.title,
            (grid.center_x(), grid.top / 2),
            axis_size,
            (HPos::Center, VPos::Center),
            false,
        )?;
        Ok(())
    }

    /// Outline each group's diagonal block and its off-diagonal strips, and
    /// letter the groups above and to the right of the grid.
    fn draw_groups(
        &self,
        root: &Root<'_>,
        chart: &mut ChartContext<'_, BitMapBackend<'_>, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
        font: Option<&ChartFont>,
        grid: &Grid,
        cw: f64,
    ) -> Result<()> {
        let fig = &self.figure;
        let n = self.values.len() as f64;
        let outline = BLACK.stroke_width(fig.px(1.0));
        // (column, row) with row 0 on top
        let at = |col: f64, row: f64| (col, n - row);

        let mut start = 0usize;
        let mut boundaries = Vec::new();
        for group in &self.groups {
            let mid = start as f64 + group.size as f64 / 2.0;
            let (x, _) = chart.backend_coord(&at(mid, 0.0));
            let (_, y) = chart.backend_coord(&at(0.0, mid));
            let size = fig.pt(12.0);
            let above = (x, grid.top - fig.px(6.0) as i32);
            let beside = (grid.right + (cw * 0.5) as i32, y);
            draw_label(root, font, &group.letter, above, size, (HPos::Center, VPos::Bottom), false)?;
            draw_label(root, font, &group.letter, beside, size, (HPos::Center, VPos::Center), false)?;
            start += group.size;
            boundaries.push(start as f64);
        }
        boundaries.pop();

        chart.draw_series(boundaries.iter().flat_map(|&p| {
            [
                Rectangle::new([at(p, p), at(n, n)], outline),
                Rectangle::new([at(0.0, p), at(p, n)], outline),
                Rectangle::new([at(p, 0.0), at(n, p)], outline),
            ]
        }))?;
        Ok(())
    }

    fn draw_colorbar(
        &self,
        root: &Root<'_>,
        font: Option<&ChartFont>,
        grid: &Grid,
        offset: i32,
        (vmin, vmax): (f64, f64),
        label: &str,
    ) -> Result<()> {
        let fig = &self.figure;
        let x0 = grid.right + offset + fig.width_frac(0.03) as i32;
        let x1 = x0 + fig.width_frac(0.025) as i32;
        let height = (grid.bottom - grid.top).max(1);

        for s in 0..height {
            let t = 1.0 - f64::from(s) / f64::from(height);
            let y = grid.top + s;
            root.draw(&Rectangle::new(
                [(x0, y), (x1, y)],
                self.colormap.sample(t).filled(),
            ))?;
        }
        root.draw(&Rectangle::new(
            [(x0, grid.top), (x1, grid.bottom)],
            BLACK.stroke_width(fig.px(0.5)),
        ))?;

        let bar_y = |v: f64| {
            let t = if vmax > vmin { (v - vmin) / (vmax - vmin) } else { 0.0 };
            grid.bottom - (t * f64::from(height)).round() as i32
        };
        for tick in auto_ticks(vmin, vmax, 6) {
            let y = bar_y(tick);
            root.draw(&PathElement::new(
                vec![(x1, y), (x1 + fig.px(3.0) as i32, y)],
                BLACK.stroke_width(fig.px(0.5)),
            ))?;
            let at = (x1 + fig.px(4.0) as i32, y);
            draw_label(root, font, &format_tick(tick), at, fig.pt(9.0), (HPos::Left, VPos::Center), false)?;
        }
        let at = (x1 + fig.px(32.0) as i32, grid.center_y());
        draw_label(root, font, label, at, fig.pt(10.0), (HPos::Center, VPos::Center), true)
    }
}

/// Draw `spec` and write it to `path` as a PNG.
pub fn render_heatmap(spec: &HeatmapSpec, font: Option<&ChartFont>, path: &Path) -> Result<()> {
    spec.draw(font)?.save_png(path)
}
