//! Region-feed: per-region lists of dated entries, counted against the
//! current instant (same calendar day) and drawn as sized circles.

use std::collections::BTreeMap;
use std::sync::Arc;

use catalog::{Record, SliceConfig, record_str, record_timestamp, row_entries, viz};
use foundation::time::{Timestamp, same_calendar_day};

use crate::layer::{
    Extent, Layer, LayerData, LayerHandlers, LayerId, LayerKind, LayerMetadata, Marker, PickInfo,
    RegionFill,
};
use crate::options::{LayerOptions, RegionClick, Tooltip};
use crate::registry::LayerFactory;
use crate::symbology::{ColorScale, Rgba};

#[derive(Debug, Default, Clone, Copy)]
pub struct FeedFactory;

/// Entries grouped by region key. A row's entries are the objects in its
/// entries column, or the row itself when that column is not an array.
pub fn region_entries(rows: &[Record], config: &SliceConfig) -> BTreeMap<String, Vec<Record>> {
    let mut out: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for row in rows {
        let Some(key) = record_str(row, config.region_column()) else {
            continue;
        };
        out.entry(key)
            .or_default()
            .extend(row_entries(row, config.entries_column()));
    }
    out
}

fn entry_matches(entry: &Record, column: Option<&str>, instant: Option<Timestamp>) -> bool {
    match (column, instant) {
        (Some(column), Some(instant)) => record_timestamp(entry, column)
            .is_some_and(|t| same_calendar_day(t, instant)),
        _ => true,
    }
}

/// Entries of one region that fall on the same calendar day as `instant`
/// (all of them when `instant` is `None` or the slice is not temporal).
pub fn feed_entries(
    rows: &[Record],
    config: &SliceConfig,
    region_key: &str,
    instant: Option<Timestamp>,
) -> Vec<Record> {
    let column = config.temporal_column.as_deref();
    region_entries(rows, config)
        .remove(region_key)
        .unwrap_or_default()
        .into_iter()
        .filter(|e| entry_matches(e, column, instant))
        .collect()
}

/// Counts per (region, calendar day), or per region when not temporal.
fn count_domain(entries: &BTreeMap<String, Vec<Record>>, column: Option<&str>) -> Vec<f64> {
    let mut values = Vec::new();
    for list in entries.values() {
        match column {
            Some(column) => {
                let mut per_day = BTreeMap::new();
                for e in list {
                    if let Some(t) = record_timestamp(e, column) {
                        *per_day.entry(t.date()).or_insert(0usize) += 1;
                    }
                }
                values.extend(per_day.into_values().map(|c| c as f64));
            }
            None => values.push(list.len() as f64),
        }
    }
    values
}

impl LayerFactory for FeedFactory {
    fn produce(&self, options: &LayerOptions) -> Vec<Layer> {
        let Some(geometry) = options.geometry.clone() else {
            return Vec::new();
        };
        let config = &options.config;
        let column = config.temporal_column.as_deref();
        let instant = options.temporal.as_ref().map(|t| t.current_instant);

        let entries = region_entries(options.full_rows(), config);
        let values = count_domain(&entries, column);
        let max = values.iter().copied().fold(0.0_f64, f64::max);
        let scale = ColorScale::linear(0.0, max, config.color_scheme.as_deref());
        let selected = options.selected_region();

        let mut fills = Vec::with_capacity(geometry.features.len());
        let mut markers = Vec::new();
        for (i, feature) in geometry.features.iter().enumerate() {
            let Some(key) = feature.key(config.feature_key()) else {
                continue;
            };
            let name = feature.name(config.feature_name_key());
            let count = entries
                .get(&key)
                .map(|list| list.iter().filter(|e| entry_matches(e, column, instant)).count())
                .unwrap_or(0) as f64;
            let is_selected = selected == Some(key.as_str());

            fills.push(RegionFill {
                feature: i,
                key: key.clone(),
                name: name.clone(),
                value: Some(count),
                category: None,
                fill: scale.color_for_value(count),
                stroke: if is_selected { Rgba::SELECTED_OUTLINE } else { Rgba::OUTLINE },
                stroke_width: if is_selected { 3.0 } else { 1.0 },
            });

            // Multipolygon regions get one marker, on their largest part.
            if count > 0.0
                && let Some(centroid) = feature.shape.centroid()
            {
                markers.push(Marker {
                    key,
                    name,
                    position: centroid,
                    radius_px: count.sqrt() * options.style.marker_radius_scale,
                    color: scale.color_for_value(count),
                    value: count,
                });
            }
        }

        let click_callbacks = options.callbacks.clone();
        let hover_callbacks = options.callbacks.clone();
        let handlers = Arc::new(LayerHandlers {
            on_click: Some(Arc::new(move |pick: &PickInfo| {
                click_callbacks.click(RegionClick {
                    slice_id: pick.slice_id,
                    region_key: pick.region_key.clone(),
                    region_name: pick.region_name.clone(),
                });
            })),
            on_hover: Some(Arc::new(move |pick: &PickInfo| {
                let count = pick.value.unwrap_or(0.0);
                hover_callbacks.set_tooltip(Some(Tooltip {
                    slice_id: pick.slice_id,
                    title: pick.region_name.clone().unwrap_or_else(|| pick.region_key.clone()),
                    lines: vec![format!("{count} entries")],
                }));
            })),
        });
        let metadata = Arc::new(LayerMetadata {
            color_scale: scale,
            extent: Some(Extent::Numeric { min: 0.0, max }),
            values,
        });

        let id = options.slice_id;
        let mut out = vec![
            Layer::new(
                LayerId::new(id, "regions"),
                id,
                LayerKind::Geometry,
                viz::REGION_FEED,
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
                    LayerId::new(id, "markers"),
                    id,
                    LayerKind::Marker,
                    viz::REGION_FEED,
                    LayerData::Markers(markers),
                )
                .with_handlers(handlers)
                .with_opacity(options.opacity),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{SelectionContext, TemporalContext};
    use crate::test_support::{Recorder, geometry, rows};
    use foundation::ids::SliceId;
    use foundation::time::{Granularity, parse_timestamp};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config() -> SliceConfig {
        SliceConfig {
            temporal_column: Some("date".into()),
            ..SliceConfig::default()
        }
    }

    fn feed_rows() -> Arc<Vec<Record>> {
        rows(json!([
            {"region": "A", "entries": [
                {"date": "2024-03-01", "title": "a1"},
                {"date": "2024-03-01T18:30:00", "title": "a2"},
                {"date": "2024-03-02T23:59:00", "title": "a3"}
            ]},
            {"region": "B", "entries": [
                {"date": "2024-03-02", "title": "b1"}
            ]},
            {"region": "C", "date": "2024-03-01", "title": "flat"}
        ]))
    }

    fn options_at(instant: &str) -> LayerOptions {
        let full = feed_rows();
        let mut o = LayerOptions::new(SliceId(3), config(), Arc::new(json!(null)), Arc::new(Vec::new()));
        o.geometry = Some(geometry());
        o.temporal = Some(TemporalContext {
            column: "date".into(),
            current_instant: parse_timestamp(instant).unwrap(),
            granularity: Granularity::Day,
            full_rows: full,
        });
        o
    }

    #[test]
    fn counts_same_calendar_day_only() {
        let layers = FeedFactory.produce(&options_at("2024-03-01T00:00:00"));
        let LayerData::Regions(fills) = layers[0].data.as_ref() else {
            panic!("regions expected");
        };
        let counts: Vec<_> = fills.iter().map(|f| f.value).collect();
        assert_eq!(counts, vec![Some(2.0), Some(0.0), Some(1.0)]);

        let LayerData::Markers(markers) = layers[1].data.as_ref() else {
            panic!("markers expected");
        };
        let keys: Vec<_> = markers.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "C"]);
        assert_eq!(markers[0].radius_px, 2.0_f64.sqrt() * 6.0);
    }

    #[test]
    fn color_domain_spans_all_days() {
        let layers = FeedFactory.produce(&options_at("2024-03-02"));
        let meta = layers[0].metadata.as_ref().unwrap();
        assert_eq!(meta.extent, Some(Extent::Numeric { min: 0.0, max: 2.0 }));
        let mut values = meta.values.clone();
        values.sort_by(f64::total_cmp);
        assert_eq!(values, vec![1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn region_entries_are_time_filtered() {
        let full = feed_rows();
        let instant = parse_timestamp("2024-03-01").unwrap();
        let titles: Vec<_> = feed_entries(&full, &config(), "A", Some(instant))
            .iter()
            .filter_map(|e| record_str(e, "title"))
            .collect();
        assert_eq!(titles, vec!["a1", "a2"]);
        assert_eq!(feed_entries(&full, &config(), "A", None).len(), 3);
        assert!(feed_entries(&full, &config(), "Z", Some(instant)).is_empty());
    }

    #[test]
    fn selection_is_outlined_and_clicks_are_routed() {
        let clicks: Recorder<RegionClick> = Recorder::default();
        let mut o = options_at("2024-03-01");
        o.selection = Some(SelectionContext {
            selected_region: Some("C".into()),
        });
        let c = clicks.clone();
        o.callbacks.on_click = Some(Arc::new(move |click: RegionClick| c.push(click)));

        let layers = FeedFactory.produce(&o);
        let LayerData::Regions(fills) = layers[0].data.as_ref() else {
            panic!("regions expected");
        };
        assert_eq!(fills[2].stroke, Rgba::SELECTED_OUTLINE);
        assert_eq!(fills[0].stroke, Rgba::OUTLINE);

        layers[1].click(1);
        assert_eq!(clicks.take()[0].region_key, "C");
    }

    #[test]
    fn multipolygon_marker_sits_on_the_largest_part() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"iso": "A", "name": "Archipelago"},
                "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[100.0, 0.0], [101.0, 0.0], [101.0, 1.0], [100.0, 1.0]]],
                    [[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]]
                ]}
            }]
        });
        let mut o = options_at("2024-03-01");
        o.geometry = Some(Arc::new(streaming::parse_region_geometry("xx", &doc).unwrap()));

        let layers = FeedFactory.produce(&o);
        let LayerData::Markers(markers) = layers[1].data.as_ref() else {
            panic!("markers expected");
        };
        assert_eq!(markers.len(), 1);
        assert!(markers[0].position.x < 4.0 && markers[0].position.y < 4.0);
    }
}
