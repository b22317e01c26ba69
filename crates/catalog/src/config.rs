use std::collections::BTreeMap;

use foundation::time::Granularity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Threshold comparison operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdOp {
    #[serde(rename = "=", alias = "==")]
    Eq,
    #[serde(rename = "!=", alias = "≠", alias = "<>")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=", alias = "≥")]
    Ge,
    #[serde(rename = "<=", alias = "≤")]
    Le,
}

impl ThresholdOp {
    /// Whether `value <op> threshold` holds.
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Eq => value == threshold,
            Self::Ne => value != threshold,
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Ge => value >= threshold,
            Self::Le => value <= threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(alias = "op")]
    pub operator: ThresholdOp,
    pub value: f64,
    /// Marker color, `#rrggbb` or `#rrggbbaa`.
    #[serde(default)]
    pub color: Option<String>,
}

/// One explicit bucket of a numeric range map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBucket {
    pub min: f64,
    pub max: f64,
    pub color: String,
}

impl RangeBucket {
    /// Buckets are half-open, `[min, max)`, except that `max` is inclusive for
    /// the last bucket of a map (see `bucket_for`).
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v < self.max
    }
}

/// Index of the bucket containing `v`, treating the largest `max` as inclusive.
pub fn bucket_for(buckets: &[RangeBucket], v: f64) -> Option<usize> {
    if let Some(i) = buckets.iter().position(|b| b.contains(v)) {
        return Some(i);
    }
    buckets.iter().position(|b| v == b.max)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub col: String,
    #[serde(default = "default_filter_op")]
    pub op: String,
    #[serde(default)]
    pub val: Value,
}

fn default_filter_op() -> String {
    "==".to_string()
}

impl Filter {
    pub fn eq(col: impl Into<String>, val: impl Into<Value>) -> Self {
        Self {
            col: col.into(),
            op: default_filter_op(),
            val: val.into(),
        }
    }
}

/// Open slice configuration record.
///
/// Known keys are typed; everything else is kept in `extra` and otherwise
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceConfig {
    /// Column holding each row's date.
    #[serde(default)]
    pub temporal_column: Option<String>,
    /// Reporting granularity (`day`, `P1M`, ...).
    #[serde(default, alias = "time_grain")]
    pub granularity: Option<String>,
    /// Region-set key for the geometry document (e.g. a country code).
    #[serde(default, alias = "country")]
    pub region_set: Option<String>,
    /// Row column joined against the geometry's region identifier.
    #[serde(default)]
    pub region_column: Option<String>,
    /// Feature property holding the region identifier.
    #[serde(default)]
    pub feature_key: Option<String>,
    /// Feature property holding the display name.
    #[serde(default)]
    pub feature_name_key: Option<String>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub categorical_column: Option<String>,
    /// Category value -> color.
    #[serde(default)]
    pub value_map: BTreeMap<String, String>,
    #[serde(default)]
    pub range_map: Vec<RangeBucket>,
    #[serde(default)]
    pub threshold: Option<ThresholdConfig>,
    #[serde(default)]
    pub color_scheme: Option<String>,
    /// Row column holding a nested list of entries (region feeds).
    #[serde(default)]
    pub entries_column: Option<String>,
    #[serde(default = "default_true")]
    pub show_labels: bool,
    /// Slices sharing a group behave like radio buttons when shown.
    #[serde(default)]
    pub toggle_group: Option<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_true() -> bool {
    true
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            temporal_column: None,
            granularity: None,
            region_set: None,
            region_column: None,
            feature_key: None,
            feature_name_key: None,
            metric: None,
            metrics: Vec::new(),
            categorical_column: None,
            value_map: BTreeMap::new(),
            range_map: Vec::new(),
            threshold: None,
            color_scheme: None,
            entries_column: None,
            show_labels: true,
            toggle_group: None,
            filters: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

pub const DEFAULT_REGION_COLUMN: &str = "region";
pub const DEFAULT_FEATURE_KEY: &str = "iso";
pub const DEFAULT_FEATURE_NAME_KEY: &str = "name";
pub const DEFAULT_ENTRIES_COLUMN: &str = "entries";

impl SliceConfig {
    pub fn granularity(&self) -> Granularity {
        Granularity::from_config(self.granularity.as_deref())
    }

    pub fn region_column(&self) -> &str {
        self.region_column.as_deref().unwrap_or(DEFAULT_REGION_COLUMN)
    }

    pub fn feature_key(&self) -> &str {
        self.feature_key.as_deref().unwrap_or(DEFAULT_FEATURE_KEY)
    }

    pub fn feature_name_key(&self) -> &str {
        self.feature_name_key
            .as_deref()
            .unwrap_or(DEFAULT_FEATURE_NAME_KEY)
    }

    pub fn entries_column(&self) -> &str {
        self.entries_column
            .as_deref()
            .unwrap_or(DEFAULT_ENTRIES_COLUMN)
    }

    /// Primary metric: `metric`, else the first of `metrics`.
    pub fn primary_metric(&self) -> Option<&str> {
        self.metric
            .as_deref()
            .or_else(|| self.metrics.first().map(String::as_str))
    }

    /// Metrics plotted in trend charts: `metrics`, else the primary metric.
    pub fn chart_metrics(&self) -> Vec<String> {
        if !self.metrics.is_empty() {
            return self.metrics.clone();
        }
        self.metric.iter().cloned().collect()
    }

    pub fn is_categorical(&self) -> bool {
        self.categorical_column.is_some() && !self.value_map.is_empty()
    }

    /// Copy with `extra` filters appended; exact duplicates are skipped.
    pub fn with_extra_filters(&self, extra: &[Filter]) -> Self {
        let mut out = self.clone();
        for f in extra {
            if !out.filters.contains(f) {
                out.filters.push(f.clone());
            }
        }
        out
    }
}
