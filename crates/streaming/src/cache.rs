use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::geometry::{RegionGeometry, ValidationError, parse_region_geometry};
use crate::source::{GeometrySource, SourceError};

#[derive(Debug)]
pub enum GeometryFetchError {
    Fetch(SourceError),
    Validation(ValidationError),
}

impl std::fmt::Display for GeometryFetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryFetchError::Fetch(e) => write!(f, "geometry fetch failed: {e}"),
            GeometryFetchError::Validation(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GeometryFetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeometryFetchError::Fetch(e) => Some(e),
            GeometryFetchError::Validation(e) => Some(e),
        }
    }
}

/// Shared region-geometry cache.
///
/// Contract:
/// - One value per region-set key; once written it is immutable and every
///   caller receives the same `Arc`.
/// - Concurrent callers for an unresolved key share a single in-flight fetch.
/// - A failed fetch leaves the key unresolved so a later call retries.
pub struct RegionGeometryCache {
    source: Arc<dyn GeometrySource>,
    cells: Mutex<HashMap<String, Arc<OnceCell<Arc<RegionGeometry>>>>>,
    fetches: AtomicU64,
}

impl RegionGeometryCache {
    pub fn new(source: Arc<dyn GeometrySource>) -> Self {
        Self {
            source,
            cells: Mutex::new(HashMap::new()),
            fetches: AtomicU64::new(0),
        }
    }

    pub async fn get_or_fetch(
        &self,
        region_set: &str,
    ) -> Result<Arc<RegionGeometry>, GeometryFetchError> {
        let cell = self
            .cells
            .lock()
            .entry(region_set.to_string())
            .or_default()
            .clone();

        if let Some(hit) = cell.get() {
            debug!(region_set, "geometry cache hit");
            return Ok(hit.clone());
        }

        let geometry = cell
            .get_or_try_init(|| async {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                debug!(region_set, "fetching region geometry");
                let raw = self
                    .source
                    .fetch_geometry(region_set)
                    .await
                    .map_err(GeometryFetchError::Fetch)?;
                let parsed = parse_region_geometry(region_set, &raw)
                    .map_err(GeometryFetchError::Validation)?;
                Ok::<_, GeometryFetchError>(Arc::new(parsed))
            })
            .await
            .inspect_err(|e| warn!(region_set, "{e}"))?;

        Ok(geometry.clone())
    }

    /// Resolved value, without fetching.
    pub fn get_cached(&self, region_set: &str) -> Option<Arc<RegionGeometry>> {
        self.cells
            .lock()
            .get(region_set)
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of fetches issued to the source so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of resolved keys.
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{GeometryFetchError, RegionGeometryCache};
    use crate::source::MemoryGeometrySource;
    use futures_util::future::join_all;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn doc() -> serde_json::Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"iso": "A"},
                "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]}
            }]
        })
    }

    #[tokio::test]
    async fn resolved_key_is_shared_by_reference() {
        let src = Arc::new(MemoryGeometrySource::new());
        src.insert("fr", doc()).await;
        let cache = RegionGeometryCache::new(src.clone());

        let a = cache.get_or_fetch("fr").await.unwrap();
        for _ in 0..5 {
            let b = cache.get_or_fetch("fr").await.unwrap();
            assert!(Arc::ptr_eq(&a, &b));
        }
        assert_eq!(src.fetch_count(), 1);
        assert_eq!(cache.fetch_count(), 1);
        assert!(cache.get_cached("fr").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_fetch() {
        let src = Arc::new(MemoryGeometrySource::new().with_delay(Duration::from_millis(50)));
        src.insert("fr", doc()).await;
        let cache = RegionGeometryCache::new(src.clone());

        let results = join_all((0..8).map(|_| cache.get_or_fetch("fr"))).await;
        let first = results[0].as_ref().unwrap().clone();
        for r in &results {
            assert!(Arc::ptr_eq(&first, r.as_ref().unwrap()));
        }
        assert_eq!(src.fetch_count(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let src = Arc::new(MemoryGeometrySource::new());
        let cache = RegionGeometryCache::new(src.clone());

        let err = cache.get_or_fetch("fr").await.unwrap_err();
        assert!(matches!(err, GeometryFetchError::Fetch(_)));
        assert!(cache.get_cached("fr").is_none());
        assert!(cache.is_empty());

        src.insert("fr", doc()).await;
        assert!(cache.get_or_fetch("fr").await.is_ok());
        assert_eq!(src.fetch_count(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn invalid_documents_are_validation_errors() {
        let src = Arc::new(MemoryGeometrySource::new());
        src.insert("fr", json!({"type": "Topology"})).await;
        let cache = RegionGeometryCache::new(src);
        let err = cache.get_or_fetch("fr").await.unwrap_err();
        assert!(matches!(err, GeometryFetchError::Validation(_)));
    }
}
