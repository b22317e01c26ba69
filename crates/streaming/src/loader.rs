//! Per-slice query execution and result shaping.

use std::collections::BTreeMap;
use std::sync::Arc;

use catalog::{Filter, Record, Slice, row_entries, viz};
use foundation::ids::SliceId;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::GeometryFetchError;
use crate::series::TemporalSeries;
use crate::source::{QueryRequest, QuerySource, SourceError};

#[derive(Debug)]
pub enum LoadError {
    Query(SourceError),
    UnexpectedShape(String),
    Geometry(GeometryFetchError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Query(e) => write!(f, "query failed: {e}"),
            LoadError::UnexpectedShape(msg) => write!(f, "unexpected result shape: {msg}"),
            LoadError::Geometry(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Query(e) => Some(e),
            LoadError::Geometry(e) => Some(e),
            LoadError::UnexpectedShape(_) => None,
        }
    }
}

impl From<GeometryFetchError> for LoadError {
    fn from(e: GeometryFetchError) -> Self {
        LoadError::Geometry(e)
    }
}

/// Successful load of one slice.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSlice {
    pub slice_id: SliceId,
    /// Raw result exactly as returned by the query collaborator.
    pub payload: Value,
    pub records: Vec<Record>,
    pub series: Option<TemporalSeries>,
    /// Rows excluded from `series` because their date did not parse.
    pub unparseable_dates: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Loaded { rows: usize },
    Failed(String),
}

const ROW_KEYS: [&str; 2] = ["data", "records"];

/// Row array from a flat (`[...]`) or wrapped (`{data: [...]}`,
/// `{records: [...]}`, `{data: {records: [...]}}`) result.
///
/// Non-object rows are skipped.
pub fn extract_rows(payload: &Value) -> Result<Vec<Record>, LoadError> {
    fn rows_of(items: &[Value]) -> Vec<Record> {
        items
            .iter()
            .filter_map(|v| v.as_object().cloned())
            .collect()
    }

    fn find(v: &Value, depth: usize) -> Option<&Vec<Value>> {
        match v {
            Value::Array(items) => Some(items),
            Value::Object(map) if depth < 2 => ROW_KEYS
                .iter()
                .filter_map(|k| map.get(*k))
                .find_map(|inner| find(inner, depth + 1)),
            _ => None,
        }
    }

    match find(payload, 0) {
        Some(items) => Ok(rows_of(items)),
        None => Err(LoadError::UnexpectedShape(match payload {
            Value::Object(_) => "object without a row array".to_string(),
            Value::Null => "null".to_string(),
            other => format!("scalar {other}"),
        })),
    }
}

/// Runs slice queries and keeps each slice's load state.
pub struct SliceDataLoader {
    source: Arc<dyn QuerySource>,
    states: Mutex<BTreeMap<SliceId, LoadState>>,
}

impl SliceDataLoader {
    pub fn new(source: Arc<dyn QuerySource>) -> Self {
        Self {
            source,
            states: Mutex::new(BTreeMap::new()),
        }
    }

    /// Merges `extra_filters` into the slice configuration, issues one query
    /// and shapes the result.
    pub async fn load(&self, slice: &Slice, extra_filters: &[Filter]) -> Result<LoadedSlice, LoadError> {
        self.states.lock().insert(slice.id, LoadState::Loading);

        let config = slice.config.with_extra_filters(extra_filters);
        let request = QueryRequest::for_slice(slice, config);
        let result = self
            .source
            .execute(request)
            .await
            .map_err(LoadError::Query)
            .and_then(|payload| shape(slice, payload));

        let state = match &result {
            Ok(loaded) => {
                debug!(slice = %slice.id, rows = loaded.records.len(), "slice loaded");
                LoadState::Loaded {
                    rows: loaded.records.len(),
                }
            }
            Err(e) => {
                warn!(slice = %slice.id, "{e}");
                LoadState::Failed(e.to_string())
            }
        };
        self.states.lock().insert(slice.id, state);
        result
    }

    pub fn state(&self, id: SliceId) -> Option<LoadState> {
        self.states.lock().get(&id).cloned()
    }

    pub fn states(&self) -> BTreeMap<SliceId, LoadState> {
        self.states.lock().clone()
    }

    pub fn forget(&self, id: SliceId) {
        self.states.lock().remove(&id);
    }
}

/// Feed rows carry their dates on the nested entries, so the series of a
/// feed slice is built from those.
fn shape(slice: &Slice, payload: Value) -> Result<LoadedSlice, LoadError> {
    let records = extract_rows(&payload)?;
    let (series, unparseable_dates) = match slice.config.temporal_column.as_deref() {
        Some(column) if slice.visualization_type == viz::REGION_FEED => {
            let entries: Vec<Record> = records
                .iter()
                .flat_map(|r| row_entries(r, slice.config.entries_column()))
                .collect();
            let (series, bad) = TemporalSeries::from_records(column, &entries);
            (Some(series), bad)
        }
        Some(column) => {
            let (series, bad) = TemporalSeries::from_records(column, &records);
            (Some(series), bad)
        }
        None => (None, 0),
    };
    Ok(LoadedSlice {
        slice_id: slice.id,
        payload,
        records,
        series,
        unparseable_dates,
    })
}
