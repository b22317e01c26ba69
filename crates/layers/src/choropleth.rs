//! Region-choropleth: regions filled by a metric (or category), with optional
//! threshold markers and value labels at region centroids.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use catalog::{Filter, Record, SliceConfig, record_f64, record_str, viz};
use foundation::math::finite_extent;
use serde_json::Value;

use crate::labels::{TextLabel, format_metric};
use crate::layer::{
    Extent, Layer, LayerData, LayerHandlers, LayerId, LayerKind, LayerMetadata, Marker, PickInfo,
    RegionFill,
};
use crate::options::{LayerCallbacks, LayerOptions, RegionClick, Tooltip};
use crate::registry::LayerFactory;
use crate::symbology::{ColorScale, Rgba};

#[derive(Debug, Default, Clone, Copy)]
pub struct ChoroplethFactory;

/// First row per region key.
pub(crate) fn rows_by_region<'a>(rows: &'a [Record], region_column: &str) -> BTreeMap<String, &'a Record> {
    let mut out = BTreeMap::new();
    for r in rows {
        if let Some(key) = record_str(r, region_column) {
            out.entry(key).or_insert(r);
        }
    }
    out
}

fn color_scale(config: &SliceConfig, full_rows: &[Record]) -> (ColorScale, Option<Extent>, Vec<f64>) {
    if let (true, Some(column)) = (config.is_categorical(), config.categorical_column.as_deref()) {
        let categories: Vec<String> = full_rows
            .iter()
            .filter_map(|r| record_str(r, column))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let scale = ColorScale::categorical(&config.value_map, categories.clone());
        return (scale, Some(Extent::Categorical(categories)), Vec::new());
    }

    let values: Vec<f64> = match config.primary_metric() {
        Some(metric) => full_rows.iter().filter_map(|r| record_f64(r, metric)).collect(),
        None => Vec::new(),
    };
    let extent = finite_extent(&values);
    let scale = if !config.range_map.is_empty() {
        ColorScale::RangeMap {
            buckets: config.range_map.clone(),
        }
    } else {
        let (min, max) = extent.unwrap_or((0.0, 0.0));
        ColorScale::linear(min, max, config.color_scheme.as_deref())
    };
    let extent = extent.map(|(min, max)| Extent::Numeric { min, max });
    (scale, extent, values)
}

fn handlers(options: &LayerOptions, metric: Option<String>) -> Arc<LayerHandlers> {
    let click_callbacks = options.callbacks.clone();
    let cross_filter = options
        .config
        .extra
        .get("cross_filter")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let region_column = options.config.region_column().to_string();
    let hover_callbacks: LayerCallbacks = options.callbacks.clone();

    Arc::new(LayerHandlers {
        on_click: Some(Arc::new(move |pick: &PickInfo| {
            if cross_filter {
                click_callbacks.add_filter(
                    pick.slice_id,
                    Filter::eq(region_column.clone(), pick.region_key.clone()),
                );
            }
            click_callbacks.click(RegionClick {
                slice_id: pick.slice_id,
                region_key: pick.region_key.clone(),
                region_name: pick.region_name.clone(),
            });
        })),
        on_hover: Some(Arc::new(move |pick: &PickInfo| {
            let title = pick.region_name.clone().unwrap_or_else(|| pick.region_key.clone());
            let lines = match (&metric, pick.value) {
                (Some(m), Some(v)) => vec![format!("{m}: {}", format_metric(v))],
                (_, None) => vec![String::from("No data")],
                (None, Some(v)) => vec![format_metric(v)],
            };
            hover_callbacks.set_tooltip(Some(Tooltip {
                slice_id: pick.slice_id,
                title,
                lines,
            }));
        })),
    })
}

impl LayerFactory for ChoroplethFactory {
    fn produce(&self, options: &LayerOptions) -> Vec<Layer> {
        let Some(geometry) = options.geometry.clone() else {
            return Vec::new();
        };
        let config = &options.config;
        let metric = config.primary_metric().map(str::to_string);
        let category_column = config
            .categorical_column
            .as_deref()
            .filter(|_| config.is_categorical());

        let (scale, extent, values) = color_scale(config, options.full_rows());
        let by_region = rows_by_region(&options.rows, config.region_column());
        let selected = options.selected_region();

        let mut fills = Vec::with_capacity(geometry.features.len());
        let mut markers = Vec::new();
        let mut labels = Vec::new();

        for (i, feature) in geometry.features.iter().enumerate() {
            let Some(key) = feature.key(config.feature_key()) else {
                continue;
            };
            let name = feature.name(config.feature_name_key());
            let row = by_region.get(&key).copied();
            let value = row.zip(metric.as_deref()).and_then(|(r, m)| record_f64(r, m));
            let category = row.zip(category_column).and_then(|(r, c)| record_str(r, c));

            let fill = match (&category, value) {
                (Some(c), _) => scale.color_for_category(c),
                (None, Some(v)) => scale.color_for_value(v),
                (None, None) => Rgba::NO_DATA,
            };
            let is_selected = selected == Some(key.as_str());
            fills.push(RegionFill {
                feature: i,
                key: key.clone(),
                name: name.clone(),
                value,
                category: category.clone(),
                fill,
                stroke: if is_selected { Rgba::SELECTED_OUTLINE } else { Rgba::OUTLINE },
                stroke_width: if is_selected { 3.0 } else { 1.0 },
            });

            let Some(centroid) = feature.shape.centroid() else {
                continue;
            };

            let mut marked = false;
            if let (Some(t), Some(v)) = (&config.threshold, value)
                && t.operator.holds(v, t.value)
            {
                marked = true;
                markers.push(Marker {
                    key: key.clone(),
                    name: name.clone(),
                    position: centroid,
                    radius_px: options.style.threshold_marker_radius,
                    color: t
                        .color
                        .as_deref()
                        .and_then(Rgba::from_hex)
                        .unwrap_or(Rgba::THRESHOLD),
                    value: v,
                });
            }

            if config.show_labels {
                let text = match (category, value) {
                    (Some(c), _) => Some(c),
                    (None, Some(v)) => Some(format_metric(v)),
                    (None, None) => None,
                };
                if let Some(text) = text {
                    let lift = if marked { options.style.label_lift_px } else { 0.0 };
                    labels.push(TextLabel {
                        key,
                        text,
                        position: centroid,
                        pixel_offset: [0.0, lift],
                    });
                }
            }
        }

        let id = options.slice_id;
        let handlers = handlers(options, metric);
        let metadata = Arc::new(LayerMetadata {
            color_scale: scale,
            extent,
            values,
        });

        let mut out = vec![
            Layer::new(
                LayerId::new(id, "regions"),
                id,
                LayerKind::Geometry,
                viz::REGION_CHOROPLETH,
                LayerData::Regions(fills),
            )
            .with_geometry(geometry)
            .with_handlers(handlers.clone())
            .with_metadata(metadata)
            .with_opacity(options.opacity),
        ];
        if !markers.is_empty() {
            out.push(
                Layer::new(
                    LayerId::new(id, "threshold"),
                    id,
                    LayerKind::Marker,
                    viz::REGION_CHOROPLETH,
                    LayerData::Markers(markers),
                )
                .with_handlers(handlers)
                .with_opacity(options.opacity),
            );
        }
        if !labels.is_empty() {
            out.push(
                Layer::new(
                    LayerId::new(id, "labels"),
                    id,
                    LayerKind::Text,
                    viz::REGION_CHOROPLETH,
                    LayerData::Text(labels),
                )
                .with_opacity(options.opacity),
            );
        }
        out
    }
}
