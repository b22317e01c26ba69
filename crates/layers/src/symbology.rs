//! Colors, named schemes and the color scales attached to layers.

use std::collections::BTreeMap;

use catalog::{RangeBucket, bucket_for};
use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const NO_DATA: Rgba = Rgba([200, 200, 200, 96]);
    pub const THRESHOLD: Rgba = Rgba([220, 38, 38, 255]);
    pub const OUTLINE: Rgba = Rgba([255, 255, 255, 200]);
    pub const SELECTED_OUTLINE: Rgba = Rgba([17, 24, 39, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba([r, g, b, 255])
    }

    /// `#rgb`, `#rrggbb` or `#rrggbbaa`; the leading `#` is optional.
    pub fn from_hex(raw: &str) -> Option<Self> {
        let hex = raw.trim().trim_start_matches('#');
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0u8, 0, 0, 255];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 17;
                }
                Some(Rgba(out))
            }
            6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
            8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.0;
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }

    /// Alpha scaled by `opacity` (clamped to `[0, 1]`).
    pub fn with_opacity(self, opacity: f32) -> Self {
        let [r, g, b, a] = self.0;
        let o = opacity.clamp(0.0, 1.0);
        Rgba([r, g, b, (a as f32 * o).round() as u8])
    }

    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mut out = [0u8; 4];
        for (i, o) in out.iter_mut().enumerate() {
            let a = self.0[i] as f64;
            let b = other.0[i] as f64;
            *o = (a + (b - a) * t).round() as u8;
        }
        Rgba(out)
    }
}

pub const DEFAULT_SCHEME: &str = "yellow_orange_red";

/// Interpolation stops for a named sequential scheme. Unknown names fall back
/// to the default scheme.
pub fn scheme_stops(name: Option<&str>) -> Vec<Rgba> {
    let stops: &[[u8; 3]] = match name.unwrap_or(DEFAULT_SCHEME) {
        "blues" => &[[239, 243, 255], [107, 174, 214], [8, 81, 156]],
        "greens" => &[[237, 248, 233], [116, 196, 118], [0, 109, 44]],
        "reds" => &[[254, 229, 217], [251, 106, 74], [165, 15, 21]],
        "purples" => &[[242, 240, 247], [158, 154, 200], [84, 39, 143]],
        "viridis" => &[[68, 1, 84], [59, 82, 139], [33, 145, 140], [94, 201, 98], [253, 231, 37]],
        "white_black" => &[[255, 255, 255], [0, 0, 0]],
        "black_white" => &[[0, 0, 0], [255, 255, 255]],
        _ => &[[255, 255, 178], [254, 178, 76], [240, 59, 32], [189, 0, 38]],
    };
    stops.iter().map(|[r, g, b]| Rgba::rgb(*r, *g, *b)).collect()
}

/// Fallback colors for categories without an explicit mapping.
pub const CATEGORY_PALETTE: [Rgba; 8] = [
    Rgba::rgb(31, 119, 180),
    Rgba::rgb(255, 127, 14),
    Rgba::rgb(44, 160, 44),
    Rgba::rgb(214, 39, 40),
    Rgba::rgb(148, 103, 189),
    Rgba::rgb(140, 86, 75),
    Rgba::rgb(227, 119, 194),
    Rgba::rgb(127, 127, 127),
];

#[derive(Debug, Clone, PartialEq)]
pub enum ColorScale {
    /// Piecewise-linear over `[min, max]`.
    Linear { min: f64, max: f64, stops: Vec<Rgba> },
    /// Explicit colors per category; others take palette colors by their
    /// position in `categories`.
    Categorical {
        colors: BTreeMap<String, Rgba>,
        categories: Vec<String>,
    },
    /// Explicit buckets; values outside every bucket get `Rgba::NO_DATA`.
    RangeMap { buckets: Vec<RangeBucket> },
}

impl ColorScale {
    pub fn linear(min: f64, max: f64, scheme: Option<&str>) -> Self {
        ColorScale::Linear {
            min,
            max,
            stops: scheme_stops(scheme),
        }
    }

    /// Category scale from a `value -> "#hex"` map; unparseable colors are ignored.
    pub fn categorical(value_map: &BTreeMap<String, String>, categories: Vec<String>) -> Self {
        let colors = value_map
            .iter()
            .filter_map(|(k, v)| Some((k.clone(), Rgba::from_hex(v)?)))
            .collect();
        ColorScale::Categorical { colors, categories }
    }

    pub fn color_for_value(&self, v: f64) -> Rgba {
        match self {
            ColorScale::Linear { min, max, stops } => {
                if !v.is_finite() || stops.is_empty() {
                    return Rgba::NO_DATA;
                }
                let span = max - min;
                let t = if span > 0.0 {
                    ((v - min) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                if stops.len() == 1 {
                    return stops[0];
                }
                let pos = t * (stops.len() - 1) as f64;
                let i = (pos.floor() as usize).min(stops.len() - 2);
                stops[i].lerp(stops[i + 1], pos - i as f64)
            }
            ColorScale::RangeMap { buckets } => bucket_for(buckets, v)
                .and_then(|i| Rgba::from_hex(&buckets[i].color))
                .unwrap_or(Rgba::NO_DATA),
            ColorScale::Categorical { .. } => self.color_for_category(&v.to_string()),
        }
    }

    pub fn color_for_category(&self, category: &str) -> Rgba {
        match self {
            ColorScale::Categorical { colors, categories } => {
                if let Some(c) = colors.get(category) {
                    return *c;
                }
                categories
                    .iter()
                    .position(|c| c == category)
                    .map(|i| CATEGORY_PALETTE[i % CATEGORY_PALETTE.len()])
                    .unwrap_or(Rgba::NO_DATA)
            }
            _ => category
                .parse::<f64>()
                .map(|v| self.color_for_value(v))
                .unwrap_or(Rgba::NO_DATA),
        }
    }
}

/// Presentation knobs shared by the factories.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerStyle {
    /// Marker radius per `sqrt(count)`, in pixels.
    pub marker_radius_scale: f64,
    pub threshold_marker_radius: f64,
    /// Upward pixel shift for labels sharing a centroid with a marker.
    pub label_lift_px: f32,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            marker_radius_scale: 6.0,
            threshold_marker_radius: 8.0,
            label_lift_px: 18.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip_and_short_forms() {
        assert_eq!(Rgba::from_hex("#ff0000"), Some(Rgba::rgb(255, 0, 0)));
        assert_eq!(Rgba::from_hex("0f0"), Some(Rgba::rgb(0, 255, 0)));
        assert_eq!(Rgba::from_hex("#00000080"), Some(Rgba([0, 0, 0, 128])));
        assert_eq!(Rgba::from_hex("#zzzzzz"), None);
        assert_eq!(Rgba::rgb(1, 2, 3).to_hex(), "#010203");
    }

    #[test]
    fn linear_scale_hits_endpoints() {
        let s = ColorScale::linear(0.0, 10.0, Some("white_black"));
        assert_eq!(s.color_for_value(0.0), Rgba::rgb(255, 255, 255));
        assert_eq!(s.color_for_value(10.0), Rgba::rgb(0, 0, 0));
        assert_eq!(s.color_for_value(20.0), Rgba::rgb(0, 0, 0));
        assert_eq!(s.color_for_value(5.0), Rgba::rgb(128, 128, 128));
        assert_eq!(s.color_for_value(f64::NAN), Rgba::NO_DATA);
    }

    #[test]
    fn categorical_prefers_explicit_colors() {
        let mut map = BTreeMap::new();
        map.insert("high".to_string(), "#ff0000".to_string());
        let s = ColorScale::categorical(&map, vec!["high".into(), "low".into()]);
        assert_eq!(s.color_for_category("high"), Rgba::rgb(255, 0, 0));
        assert_eq!(s.color_for_category("low"), CATEGORY_PALETTE[1]);
        assert_eq!(s.color_for_category("other"), Rgba::NO_DATA);
    }

    #[test]
    fn opacity_scales_alpha() {
        assert_eq!(Rgba::rgb(0, 0, 0).with_opacity(0.5).0[3], 128);
        assert_eq!(Rgba::rgb(0, 0, 0).with_opacity(3.0).0[3], 255);
    }
}
