//! Figure geometry, chart fonts and the RGB raster the charts are drawn on.

use anyhow::{anyhow, Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{register_font, FontStyle, FontTransform};
use std::path::Path;

/// Drawing area over a raster's pixel buffer
pub type Root<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Parse `#rrggbb`. Malformed input yields black.
pub fn hex(color: &str) -> RGBColor {
    let c = color.trim_start_matches('#');
    let channel = |i: usize| {
        c.get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    RGBColor(channel(0), channel(2), channel(4))
}

// ─── Figure geometry ────────────────────────────────────────────────────────

/// Physical figure size. Lengths given in points (line widths, font sizes)
/// are scaled by the resolution so charts look the same at any DPI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Figure {
    pub width_in: f32,
    pub height_in: f32,
    pub dpi: f32,
}

impl Figure {
    pub fn new(width_in: f32, height_in: f32, dpi: f32) -> Self {
        Self {
            width_in,
            height_in,
            dpi,
        }
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi).round().max(1.0) as u32,
            (self.height_in * self.dpi).round().max(1.0) as u32,
        )
    }

    /// Points to pixels, for font sizes
    pub fn pt(&self, points: f32) -> f64 {
        f64::from(points * self.dpi / 72.0)
    }

    /// Points to whole pixels, at least one
    pub fn px(&self, points: f32) -> u32 {
        (points * self.dpi / 72.0).round().max(1.0) as u32
    }

    /// Fraction of the figure width in pixels
    pub fn width_frac(&self, frac: f32) -> u32 {
        (self.pixel_size().0 as f32 * frac).round() as u32
    }

    /// Fraction of the figure height in pixels
    pub fn height_frac(&self, frac: f32) -> u32 {
        (self.pixel_size().1 as f32 * frac).round() as u32
    }
}

// ─── Fonts ──────────────────────────────────────────────────────────────────

/// A TrueType font registered with the chart backend under its own family
/// name. Charts drawn without one have no text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartFont {
    family: String,
}

impl ChartFont {
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Black text style at `size` pixels
    pub fn style(&self, size: f64) -> TextStyle<'_> {
        (self.family.as_str(), size).into_font().color(&BLACK)
    }
}

/// Load a system sans-serif font, trying several common paths.
pub fn load_system_font() -> Result<ChartFont> {
    let candidates = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/Library/Fonts/Arial.ttf",
        "/System/Library/Fonts/Helvetica.ttc",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];
    for path in &candidates {
        if let Ok(font) = load_font(Path::new(path)) {
            log::debug!("Loaded font: {}", path);
            return Ok(font);
        }
    }
    anyhow::bail!("No system font found. Tried: {}", candidates.join(", "))
}

/// Load a TrueType font (or the first face of a collection) and register it
/// for chart text.
pub fn load_font(path: &Path) -> Result<ChartFont> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read font {}", path.display()))?;
    ab_glyph::FontRef::try_from_slice(&data)
        .with_context(|| format!("Invalid font file {}", path.display()))?;

    let family = format!("chart:{}", path.display());
    // The backend keeps registered fonts for the life of the process
    let bytes: &'static [u8] = Box::leak(data.into_boxed_slice());
    register_font(&family, FontStyle::Normal, bytes)
        .map_err(|e| anyhow!("Failed to register font {}: {}", path.display(), e))?;
    Ok(ChartFont { family })
}

// ─── Raster ─────────────────────────────────────────────────────────────────

/// An RGB pixel buffer holding a drawn chart.
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    /// Draw onto a white figure-sized buffer.
    pub fn paint<F>(figure: &Figure, draw: F) -> Result<Self>
    where
        F: FnOnce(&Root<'_>) -> Result<()>,
    {
        let (width, height) = figure.pixel_size();
        let mut pixels = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
            root.fill(&WHITE)?;
            draw(&root)?;
            root.present()?;
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<RGBColor> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some(RGBColor(
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
        ))
    }

    /// Number of pixels exactly matching `color`
    pub fn count_pixels(&self, color: RGBColor) -> usize {
        self.pixels
            .chunks_exact(3)
            .filter(|p| (p[0], p[1], p[2]) == (color.0, color.1, color.2))
            .count()
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut output, self.width, self.height);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.pixels)?;
        }
        Ok(output)
    }

    /// Encode and write the chart, creating parent directories as needed.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let bytes = self.encode_png()?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Chart saved to {}", path.display());
        Ok(())
    }
}

/// Draw `text` at a pixel position of the root area. Nothing is drawn
/// without a font. Vertical text reads bottom to top.
#[allow(clippy::too_many_arguments)]
pub fn draw_label(
    root: &Root<'_>,
    font: Option<&ChartFont>,
    text: &str,
    at: (i32, i32),
    size: f64,
    anchor: (HPos, VPos),
    vertical: bool,
) -> Result<()> {
    let Some(font) = font else {
        return Ok(());
    };
    if text.is_empty() {
        return Ok(());
    }
    let mut style = font.style(size).pos(Pos::new(anchor.0, anchor.1));
    if vertical {
        style = style.transform(FontTransform::Rotate270);
    }
    root.draw(&Text::new(text, at, style))?;
    Ok(())
}

/// Multiples of `step` within [min, max]
pub fn ticks_with_step(min: f64, max: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) {
        return vec![min];
    }
    let first = (min / step - 1e-9).ceil() as i64;
    (first..)
        .map(|i| i as f64 * step)
        .take_while(|v| *v <= max + step * 1e-9)
        .map(|v| if v == 0.0 { 0.0 } else { v })
        .collect()
}

/// Round tick values spanning [min, max], as placed by the chart axes
pub fn auto_ticks(min: f64, max: f64, max_count: usize) -> Vec<f64> {
    if !(max > min) {
        return vec![min];
    }
    plotters::coord::types::RangedCoordf64::from(min..max).key_points(max_count)
}

/// Tick label: integers without decimals, others with up to two
pub fn format_tick(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        let s = format!("{:.2}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        assert_eq!(hex("#A0A0A0"), RGBColor(160, 160, 160));
        assert_eq!(hex("4C9A2A"), RGBColor(76, 154, 42));
        assert_eq!(hex("#zz"), RGBColor(0, 0, 0));
    }

    #[test]
    fn test_figure_pixels() {
        let fig = Figure::new(10.0, 6.0, 300.0);
        assert_eq!(fig.pixel_size(), (3000, 1800));
        assert!((fig.pt(72.0) - 300.0).abs() < 1e-4);
        assert_eq!(fig.px(0.01), 1);
        assert_eq!(fig.width_frac(0.1), 300);
    }

    #[test]
    fn test_paint_fills_white() {
        let raster = Raster::paint(&Figure::new(1.0, 1.0, 10.0), |root| {
            root.draw(&Rectangle::new([(2, 2), (5, 5)], BLACK.filled()))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(raster.pixel(3, 3), Some(BLACK));
        assert_eq!(raster.pixel(8, 8), Some(WHITE));
        assert_eq!(raster.pixel(10, 0), None);
    }

    #[test]
    fn test_missing_font_is_error() {
        let err = load_font(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(err.to_string().contains("font.ttf"));
    }

    #[test]
    fn test_ticks() {
        assert_eq!(
            ticks_with_step(0.0, 105.0, 20.0),
            vec![0.0, 20.0, 40.0, 60.0, 80.0, 100.0]
        );
        assert_eq!(ticks_with_step(0.1, 0.9, 0.5), vec![0.5]);
        let auto = auto_ticks(0.0, 100.0, 6);
        assert!(!auto.is_empty() && auto.len() <= 6);
        assert!(auto.iter().all(|t| (0.0..=100.0).contains(t)));
    }

    #[test]
    fn test_format_tick() {
        assert_eq!(format_tick(20.0), "20");
        assert_eq!(format_tick(-0.5), "-0.5");
        assert_eq!(format_tick(2.25), "2.25");
    }

    #[test]
    fn test_png_dimensions() {
        let raster = Raster::paint(&Figure::new(0.7, 0.5, 10.0), |_| Ok(())).unwrap();
        let bytes = raster.encode_png().unwrap();
        let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, 7);
        assert_eq!(reader.info().height, 5);
    }
}
