use foundation::ids::SliceId;
use serde::{Deserialize, Serialize};

use crate::config::{Filter, SliceConfig};

/// Visualization-type tags understood by the default layer factories.
pub mod viz {
    pub const REGION_CHOROPLETH: &str = "region_choropleth";
    pub const REGION_FEED: &str = "region_feed";
}

/// One sub-visualization of the composited scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub id: SliceId,
    pub name: String,
    #[serde(alias = "viz_type")]
    pub visualization_type: String,
    #[serde(default, alias = "form_data")]
    pub config: SliceConfig,
}

impl Slice {
    pub fn new(id: u64, name: impl Into<String>, viz: impl Into<String>) -> Self {
        Self {
            id: SliceId(id),
            name: name.into(),
            visualization_type: viz.into(),
            config: SliceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SliceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn is_temporal(&self) -> bool {
        self.config.temporal_column.is_some()
    }
}

/// A whole dashboard: its slices plus dashboard-level filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub slices: Vec<Slice>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl DashboardConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
