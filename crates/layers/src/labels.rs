use std::collections::BTreeMap;

use foundation::math::Vec2;

/// A text annotation anchored at a region centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    /// Region key the label belongs to; labels are merged on it.
    pub key: String,
    pub text: String,
    pub position: Vec2,
    /// Screen-space shift, y up.
    pub pixel_offset: [f32; 2],
}

/// Compact metric text: `12345` -> `12.3k`, `2500000` -> `2.5M`, `0.126` -> `0.13`.
pub fn format_metric(v: f64) -> String {
    if !v.is_finite() {
        return String::from("n/a");
    }
    let abs = v.abs();
    let (scaled, suffix) = if abs >= 1e9 {
        (v / 1e9, "B")
    } else if abs >= 1e6 {
        (v / 1e6, "M")
    } else if abs >= 1e4 {
        (v / 1e3, "k")
    } else {
        (v, "")
    };
    let digits = if suffix.is_empty() && scaled.fract() == 0.0 {
        0
    } else if suffix.is_empty() && abs < 1.0 {
        2
    } else {
        1
    };
    let mut text = format!("{scaled:.digits$}");
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    text.push_str(suffix);
    text
}

/// Collapses labels sharing a key into one, joining texts with newlines.
///
/// Output follows first-seen key order; each merged label keeps the position
/// and offset of the first label seen for its key. Identical texts are kept
/// once.
pub fn merge_labels<'a>(labels: impl IntoIterator<Item = &'a TextLabel>) -> Vec<TextLabel> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: BTreeMap<String, TextLabel> = BTreeMap::new();
    for label in labels {
        match merged.get_mut(&label.key) {
            Some(existing) => {
                if !existing.text.split('\n').any(|t| t == label.text) {
                    existing.text.push('\n');
                    existing.text.push_str(&label.text);
                }
            }
            None => {
                order.push(label.key.clone());
                merged.insert(label.key.clone(), label.clone());
            }
        }
    }
    order
        .into_iter()
        .filter_map(|k| merged.remove(&k))
        .collect()
}
