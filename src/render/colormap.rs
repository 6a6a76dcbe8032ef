//! Sequential colour maps for heatmaps.

use plotters::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    YlGnBu,
    YlOrRd,
    Greys,
}

const YL_GN_BU: [RGBColor; 9] = [
    RGBColor(0xff, 0xff, 0xd9),
    RGBColor(0xed, 0xf8, 0xb1),
    RGBColor(0xc7, 0xe9, 0xb4),
    RGBColor(0x7f, 0xcd, 0xbb),
    RGBColor(0x41, 0xb6, 0xc4),
    RGBColor(0x1d, 0x91, 0xc0),
    RGBColor(0x22, 0x5e, 0xa8),
    RGBColor(0x25, 0x34, 0x94),
    RGBColor(0x08, 0x1d, 0x58),
];

const YL_OR_RD: [RGBColor; 9] = [
    RGBColor(0xff, 0xff, 0xcc),
    RGBColor(0xff, 0xed, 0xa0),
    RGBColor(0xfe, 0xd9, 0x76),
    RGBColor(0xfe, 0xb2, 0x4c),
    RGBColor(0xfd, 0x8d, 0x3c),
    RGBColor(0xfc, 0x4e, 0x2a),
    RGBColor(0xe3, 0x1a, 0x1c),
    RGBColor(0xbd, 0x00, 0x26),
    RGBColor(0x80, 0x00, 0x26),
];

const GREYS: [RGBColor; 9] = [
    RGBColor(0xff, 0xff, 0xff),
    RGBColor(0xf0, 0xf0, 0xf0),
    RGBColor(0xd9, 0xd9, 0xd9),
    RGBColor(0xbd, 0xbd, 0xbd),
    RGBColor(0x96, 0x96, 0x96),
    RGBColor(0x73, 0x73, 0x73),
    RGBColor(0x52, 0x52, 0x52),
    RGBColor(0x25, 0x25, 0x25),
    RGBColor(0x00, 0x00, 0x00),
];

impl Colormap {
    fn anchors(self) -> &'static [RGBColor] {
        match self {
            Colormap::YlGnBu => &YL_GN_BU,
            Colormap::YlOrRd => &YL_OR_RD,
            Colormap::Greys => &GREYS,
        }
    }

    /// Colour at position `t` in [0, 1]. NaN maps to the low end.
    pub fn sample(self, t: f64) -> RGBColor {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let map = DerivedColorMap::new(self.anchors());
        ColorMap::<RGBColor, f64>::get_color_normalized(&map, t, 0.0, 1.0)
    }

    /// Colour for `value` on the scale [min, max]. A degenerate scale maps
    /// everything to the low end.
    pub fn map(self, value: f64, min: f64, max: f64) -> RGBColor {
        let t = if max > min {
            (value - min) / (max - min)
        } else {
            0.0
        };
        self.sample(t)
    }
}

/// Annotation colour that stays readable on `background`.
pub fn contrasting_text(background: RGBColor) -> RGBColor {
    let lum = 0.2126 * background.0 as f64
        + 0.7152 * background.1 as f64
        + 0.0722 * background.2 as f64;
    if lum < 0.408 * 255.0 {
        WHITE
    } else {
        BLACK
    }
}
