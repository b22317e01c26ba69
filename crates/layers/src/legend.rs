//! Discrete legend entries derived from a layer's metadata.

use foundation::math::unique_desc;
use serde::Serialize;

use crate::labels::format_metric;
use crate::layer::{Extent, LayerMetadata};
use crate::symbology::{ColorScale, Rgba};

/// Distinct numeric values shown in full up to this many.
pub const MAX_NUMERIC_ENTRIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub value: Option<f64>,
    pub color: Rgba,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LegendEngine;

impl LegendEngine {
    pub fn build_legend(&self, metadata: &LayerMetadata) -> Vec<LegendEntry> {
        let scale = &metadata.color_scale;

        if let Some(Extent::Categorical(categories)) = &metadata.extent {
            let mut sorted = categories.clone();
            sorted.sort();
            sorted.dedup();
            return sorted
                .into_iter()
                .map(|c| LegendEntry {
                    color: scale.color_for_category(&c),
                    label: c,
                    value: None,
                })
                .collect();
        }

        if let ColorScale::RangeMap { buckets } = scale {
            return buckets
                .iter()
                .map(|b| LegendEntry {
                    label: format!("{} - {}", format_metric(b.min), format_metric(b.max)),
                    value: Some(b.min),
                    color: Rgba::from_hex(&b.color).unwrap_or(Rgba::NO_DATA),
                })
                .collect();
        }

        numeric_stops(&metadata.values)
            .into_iter()
            .map(|v| LegendEntry {
                label: format_metric(v),
                value: Some(v),
                color: scale.color_for_value(v),
            })
            .collect()
    }
}

/// Legend values, largest first: every distinct value when there are at most
/// five, else max, the values at the 25th/50th/75th percentile index of the
/// descending list, and min.
pub fn numeric_stops(values: &[f64]) -> Vec<f64> {
    let desc = unique_desc(values);
    let n = desc.len();
    if n <= MAX_NUMERIC_ENTRIES {
        return desc;
    }
    let at = |p: f64| desc[((n as f64 * p).floor() as usize).min(n - 1)];
    vec![desc[0], at(0.25), at(0.5), at(0.75), desc[n - 1]]
}
