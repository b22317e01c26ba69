//! Per-slice region selection and the region trend-chart modal.

use std::collections::BTreeMap;

use catalog::{Record, Slice, record_f64, record_str, record_timestamp};
use foundation::ids::SliceId;
use foundation::time::{Granularity, Timestamp};
use serde::Serialize;

/// An active region selection with its time-filtered entries.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRegion {
    pub slice_id: SliceId,
    pub region_key: String,
    pub region_name: Option<String>,
    pub entries: Vec<Record>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SelectionTransition {
    Selected,
    Replaced,
    Cleared,
}

/// Payload for the feed side panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPanel {
    pub region_name: String,
    pub entries: Vec<Record>,
    pub temporal_column: Option<String>,
    pub granularity: Granularity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub metric: String,
    pub points: Vec<(Timestamp, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartContent {
    /// Dated category values, oldest first.
    Timeline { points: Vec<(Timestamp, String)> },
    MultiMetric { series: Vec<MetricSeries> },
    Empty { message: String },
}

/// Payload for the region trend-chart modal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartModal {
    pub slice_id: SliceId,
    pub region_key: String,
    pub title: String,
    pub content: ChartContent,
}

/// Chart content for one region of a choropleth slice over its full rows.
pub fn build_chart(slice: &Slice, region_key: &str, rows: &[Record]) -> ChartContent {
    let config = &slice.config;
    let Some(column) = config.temporal_column.as_deref() else {
        return ChartContent::Empty {
            message: String::from("This slice has no temporal column to chart over."),
        };
    };
    let mut matching: Vec<(Timestamp, &Record)> = rows
        .iter()
        .filter(|r| record_str(r, config.region_column()).as_deref() == Some(region_key))
        .filter_map(|r| Some((record_timestamp(r, column)?, r)))
        .collect();
    matching.sort_by_key(|(t, _)| *t);
    if matching.is_empty() {
        return ChartContent::Empty {
            message: format!("No data for {region_key}."),
        };
    }

    if let (true, Some(category)) = (config.is_categorical(), config.categorical_column.as_deref()) {
        let points = matching
            .iter()
            .filter_map(|(t, r)| Some((*t, record_str(r, category)?)))
            .collect();
        return ChartContent::Timeline { points };
    }

    let series: Vec<MetricSeries> = config
        .chart_metrics()
        .into_iter()
        .map(|metric| MetricSeries {
            points: matching
                .iter()
                .filter_map(|(t, r)| Some((*t, record_f64(r, &metric)?)))
                .collect(),
            metric,
        })
        .filter(|s| !s.points.is_empty())
        .collect();
    if series.is_empty() {
        return ChartContent::Empty {
            message: format!("No numeric values for {region_key}."),
        };
    }
    ChartContent::MultiMetric { series }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionStateManager {
    selected: BTreeMap<SliceId, SelectedRegion>,
    modal: Option<ChartModal>,
}

impl SelectionStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects `region_key`, or clears when it is already selected. A
    /// different region replaces the current one in a single write.
    pub fn click_region(
        &mut self,
        slice_id: SliceId,
        region_key: &str,
        region_name: Option<String>,
        entries: Vec<Record>,
    ) -> SelectionTransition {
        let same = self
            .selected
            .get(&slice_id)
            .map(|current| current.region_key == region_key);
        if same == Some(true) {
            self.selected.remove(&slice_id);
            return SelectionTransition::Cleared;
        }
        self.selected.insert(
            slice_id,
            SelectedRegion {
                slice_id,
                region_key: region_key.to_string(),
                region_name,
                entries,
            },
        );
        if same.is_some() {
            SelectionTransition::Replaced
        } else {
            SelectionTransition::Selected
        }
    }

    pub fn selected(&self, slice_id: SliceId) -> Option<&SelectedRegion> {
        self.selected.get(&slice_id)
    }

    pub fn selected_key(&self, slice_id: SliceId) -> Option<&str> {
        self.selected.get(&slice_id).map(|s| s.region_key.as_str())
    }

    /// Clears the slice's selection (and its modal). Returns whether anything
    /// was open.
    pub fn clear(&mut self, slice_id: SliceId) -> bool {
        let had_modal = self.modal.as_ref().is_some_and(|m| m.slice_id == slice_id);
        if had_modal {
            self.modal = None;
        }
        self.selected.remove(&slice_id).is_some() || had_modal
    }

    /// Recomputes entries of every selection; identities are kept.
    pub fn refilter(&mut self, mut entries_for: impl FnMut(SliceId, &str) -> Vec<Record>) {
        for (id, sel) in self.selected.iter_mut() {
            sel.entries = entries_for(*id, &sel.region_key);
        }
    }

    pub fn side_panel(&self, slice: &Slice, granularity: Granularity) -> Option<FeedPanel> {
        let sel = self.selected.get(&slice.id)?;
        Some(FeedPanel {
            region_name: sel.region_name.clone().unwrap_or_else(|| sel.region_key.clone()),
            entries: sel.entries.clone(),
            temporal_column: slice.config.temporal_column.clone(),
            granularity,
        })
    }

    pub fn open_chart(
        &mut self,
        slice: &Slice,
        region_key: &str,
        region_name: Option<&str>,
        rows: &[Record],
    ) -> &ChartModal {
        let title = format!("{} - {}", region_name.unwrap_or(region_key), slice.name);
        self.modal.insert(ChartModal {
            slice_id: slice.id,
            region_key: region_key.to_string(),
            title,
            content: build_chart(slice, region_key, rows),
        })
    }

    pub fn chart(&self) -> Option<&ChartModal> {
        self.modal.as_ref()
    }

    pub fn close_chart(&mut self) -> bool {
        self.modal.take().is_some()
    }

    pub fn has_any(&self) -> bool {
        !self.selected.is_empty() || self.modal.is_some()
    }

    pub fn teardown(&mut self) {
        self.selected.clear();
        self.modal = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::SliceConfig;
    use foundation::time::parse_timestamp;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn reclick_clears_and_other_region_replaces() {
        let mut s = SelectionStateManager::new();
        let id = SliceId(1);
        assert_eq!(s.click_region(id, "A", None, Vec::new()), SelectionTransition::Selected);
        assert_eq!(s.click_region(id, "B", None, Vec::new()), SelectionTransition::Replaced);
        assert_eq!(s.selected_key(id), Some("B"));
        assert_eq!(s.click_region(id, "B", None, Vec::new()), SelectionTransition::Cleared);
        assert!(s.selected(id).is_none());
    }

    #[test]
    fn refilter_keeps_identity() {
        let mut s = SelectionStateManager::new();
        s.click_region(SliceId(1), "A", Some("Alpha".into()), vec![rec(json!({"n": 1}))]);
        s.refilter(|_, key| vec![rec(json!({"n": 2, "k": key}))]);
        let sel = s.selected(SliceId(1)).unwrap();
        assert_eq!(sel.region_key, "A");
        assert_eq!(sel.entries, vec![rec(json!({"n": 2, "k": "A"}))]);
    }

    #[test]
    fn clear_and_teardown() {
        let mut s = SelectionStateManager::new();
        s.click_region(SliceId(1), "A", None, Vec::new());
        s.click_region(SliceId(2), "A", None, Vec::new());
        assert!(s.clear(SliceId(1)));
        assert!(!s.clear(SliceId(1)));
        assert!(s.has_any());
        s.teardown();
        assert!(!s.has_any());
    }

    fn choropleth(config: SliceConfig) -> Slice {
        Slice::new(7, "Cases", "region_choropleth").with_config(config)
    }

    #[test]
    fn chart_without_temporal_column_is_explained() {
        let slice = choropleth(SliceConfig::default());
        assert!(matches!(build_chart(&slice, "A", &[]), ChartContent::Empty { .. }));
    }

    #[test]
    fn multi_metric_chart_drops_non_numeric() {
        let slice = choropleth(SliceConfig {
            temporal_column: Some("d".into()),
            metrics: vec!["a".into(), "b".into()],
            ..SliceConfig::default()
        });
        let rows = vec![
            rec(json!({"region": "A", "d": "2024-01-02", "a": "3", "b": "x"})),
            rec(json!({"region": "A", "d": "2024-01-01", "a": 1})),
            rec(json!({"region": "B", "d": "2024-01-01", "a": 9})),
        ];
        let ChartContent::MultiMetric { series } = build_chart(&slice, "A", &rows) else {
            panic!("expected a metric chart");
        };
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].metric, "a");
        assert_eq!(
            series[0].points,
            vec![
                (parse_timestamp("2024-01-01").unwrap(), 1.0),
                (parse_timestamp("2024-01-02").unwrap(), 3.0)
            ]
        );
        assert!(matches!(build_chart(&slice, "Z", &rows), ChartContent::Empty { .. }));
    }

    #[test]
    fn categorical_slices_chart_a_timeline() {
        let mut value_map = std::collections::BTreeMap::new();
        value_map.insert("high".to_string(), "#ff0000".to_string());
        let slice = choropleth(SliceConfig {
            temporal_column: Some("d".into()),
            categorical_column: Some("level".into()),
            value_map,
            ..SliceConfig::default()
        });
        let rows = vec![
            rec(json!({"region": "A", "d": "2024-02-01", "level": "low"})),
            rec(json!({"region": "A", "d": "2024-01-01", "level": "high"})),
        ];
        let mut s = SelectionStateManager::new();
        let modal = s.open_chart(&slice, "A", Some("Alpha"), &rows);
        assert_eq!(modal.title, "Alpha - Cases");
        let ChartContent::Timeline { points } = &modal.content else {
            panic!("expected a timeline");
        };
        let labels: Vec<_> = points.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(labels, vec!["high", "low"]);

        assert!(s.clear(SliceId(7)));
        assert!(s.chart().is_none());
    }
}
