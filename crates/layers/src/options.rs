//! The closed input record every factory consumes.

use std::sync::Arc;

use catalog::{Filter, Record, SliceConfig};
use foundation::ids::SliceId;
use foundation::math::Vec2;
use foundation::time::{Granularity, Timestamp};
use serde_json::Value;
use streaming::RegionGeometry;

use crate::symbology::LayerStyle;

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub slice_id: SliceId,
    pub title: String,
    pub lines: Vec<String>,
}

/// A region click routed out of a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionClick {
    pub slice_id: SliceId,
    pub region_key: String,
    pub region_name: Option<String>,
}

pub type AddFilterFn = Arc<dyn Fn(SliceId, Filter) + Send + Sync>;
pub type TooltipFn = Arc<dyn Fn(Option<Tooltip>) + Send + Sync>;
pub type ClickFn = Arc<dyn Fn(RegionClick) + Send + Sync>;

/// Side-effect routes available to factories. Absent routes are no-ops.
#[derive(Clone, Default)]
pub struct LayerCallbacks {
    pub add_filter: Option<AddFilterFn>,
    pub set_tooltip: Option<TooltipFn>,
    pub on_click: Option<ClickFn>,
}

impl LayerCallbacks {
    pub fn add_filter(&self, slice: SliceId, filter: Filter) {
        if let Some(f) = &self.add_filter {
            f(slice, filter);
        }
    }

    pub fn set_tooltip(&self, tooltip: Option<Tooltip>) {
        if let Some(f) = &self.set_tooltip {
            f(tooltip);
        }
    }

    pub fn click(&self, click: RegionClick) {
        if let Some(f) = &self.on_click {
            f(click);
        }
    }
}

impl std::fmt::Debug for LayerCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerCallbacks")
            .field("add_filter", &self.add_filter.is_some())
            .field("set_tooltip", &self.set_tooltip.is_some())
            .field("on_click", &self.on_click.is_some())
            .finish()
    }
}

/// Present when the slice declares a temporal column.
#[derive(Debug, Clone)]
pub struct TemporalContext {
    pub column: String,
    pub current_instant: Timestamp,
    pub granularity: Granularity,
    /// Every row, independent of the current instant.
    pub full_rows: Arc<Vec<Record>>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportHint {
    pub center: Vec2,
    pub zoom: f64,
    pub pitch: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionContext {
    pub selected_region: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LayerOptions {
    pub slice_id: SliceId,
    pub config: SliceConfig,
    /// Raw query result.
    pub payload: Arc<Value>,
    /// Rows for the current instant (all rows for non-temporal slices).
    pub rows: Arc<Vec<Record>>,
    pub callbacks: LayerCallbacks,
    pub geometry: Option<Arc<RegionGeometry>>,
    pub temporal: Option<TemporalContext>,
    pub viewport: Option<ViewportHint>,
    pub selection: Option<SelectionContext>,
    pub opacity: f32,
    pub style: LayerStyle,
}

impl LayerOptions {
    pub fn new(slice_id: SliceId, config: SliceConfig, payload: Arc<Value>, rows: Arc<Vec<Record>>) -> Self {
        Self {
            slice_id,
            config,
            payload,
            rows,
            callbacks: LayerCallbacks::default(),
            geometry: None,
            temporal: None,
            viewport: None,
            selection: None,
            opacity: 1.0,
            style: LayerStyle::default(),
        }
    }

    /// Rows spanning the whole series when temporal, else the current rows.
    pub fn full_rows(&self) -> &[Record] {
        match &self.temporal {
            Some(t) => &t.full_rows,
            None => &self.rows,
        }
    }

    pub fn selected_region(&self) -> Option<&str> {
        self.selection.as_ref()?.selected_region.as_deref()
    }
}
