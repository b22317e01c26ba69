//! Runs slice loads (query plus region geometry) off the scene state.

use std::sync::Arc;

use catalog::{Filter, Slice};
use foundation::ids::SliceId;
use futures_util::future::{join, join_all};
use streaming::{
    GeometrySource, LoadError, LoadedSlice, QuerySource, RegionGeometry, RegionGeometryCache,
    SliceDataLoader,
};

/// One slice load, tagged with the generation it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub slice: Slice,
    pub filters: Vec<Filter>,
    pub generation: u64,
}

#[derive(Debug)]
pub struct SliceResult {
    pub loaded: LoadedSlice,
    pub geometry: Option<Arc<RegionGeometry>>,
}

#[derive(Debug)]
pub struct Completion {
    pub slice_id: SliceId,
    pub generation: u64,
    pub result: Result<SliceResult, LoadError>,
}

#[derive(Clone)]
pub struct SceneLoader {
    data: Arc<SliceDataLoader>,
    geometry: Arc<RegionGeometryCache>,
}

impl SceneLoader {
    pub fn new(query: Arc<dyn QuerySource>, geometry: Arc<dyn GeometrySource>) -> Self {
        Self::from_parts(
            Arc::new(SliceDataLoader::new(query)),
            Arc::new(RegionGeometryCache::new(geometry)),
        )
    }

    /// Shares an existing cache, e.g. between dashboards.
    pub fn from_parts(data: Arc<SliceDataLoader>, geometry: Arc<RegionGeometryCache>) -> Self {
        Self { data, geometry }
    }

    pub fn data_loader(&self) -> &Arc<SliceDataLoader> {
        &self.data
    }

    pub fn geometry_cache(&self) -> &Arc<RegionGeometryCache> {
        &self.geometry
    }

    /// Query and geometry run concurrently; either failing fails the load.
    pub async fn run(&self, request: LoadRequest) -> Completion {
        let LoadRequest {
            slice,
            filters,
            generation,
        } = request;
        let region_set = slice.config.region_set.clone();
        let geometry = async {
            match region_set.as_deref() {
                Some(key) => self.geometry.get_or_fetch(key).await.map(Some),
                None => Ok(None),
            }
        };
        let (data, geometry) = join(self.data.load(&slice, &filters), geometry).await;
        let result = match (data, geometry) {
            (Ok(loaded), Ok(geometry)) => Ok(SliceResult { loaded, geometry }),
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(LoadError::Geometry(e)),
        };
        Completion {
            slice_id: slice.id,
            generation,
            result,
        }
    }

    /// Every request in parallel; completions come back in request order.
    pub async fn run_all(&self, requests: Vec<LoadRequest>) -> Vec<Completion> {
        join_all(requests.into_iter().map(|r| self.run(r))).await
    }
}

impl std::fmt::Debug for SceneLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneLoader")
            .field("cached_geometries", &self.geometry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::SliceConfig;
    use serde_json::json;
    use streaming::{GeometryFetchError, MemoryGeometrySource, MemoryQuerySource};

    fn slice(id: u64, region: &str) -> Slice {
        Slice::new(id, format!("s{id}"), "region_feed").with_config(SliceConfig {
            region_set: Some(region.into()),
            ..SliceConfig::default()
        })
    }

    #[tokio::test]
    async fn slices_sharing_a_region_set_share_geometry() {
        let query = Arc::new(MemoryQuerySource::new());
        query.respond(SliceId(1), json!([])).await;
        query.respond(SliceId(2), json!([])).await;
        let geo = Arc::new(MemoryGeometrySource::new());
        geo.insert("fr", json!({"type": "FeatureCollection", "features": []}))
            .await;
        let loader = SceneLoader::new(query, geo.clone());

        let done = loader
            .run_all(vec![
                LoadRequest { slice: slice(1, "fr"), filters: Vec::new(), generation: 1 },
                LoadRequest { slice: slice(2, "fr"), filters: Vec::new(), generation: 2 },
            ])
            .await;
        let a = done[0].result.as_ref().unwrap().geometry.clone().unwrap();
        let b = done[1].result.as_ref().unwrap().geometry.clone().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(geo.fetch_count(), 1);
        assert_eq!(done[1].generation, 2);
    }

    #[tokio::test]
    async fn geometry_failure_fails_only_that_slice() {
        let query = Arc::new(MemoryQuerySource::new());
        query.respond(SliceId(1), json!([])).await;
        query.respond(SliceId(2), json!([])).await;
        let geo = Arc::new(MemoryGeometrySource::new());
        geo.insert("fr", json!({"type": "FeatureCollection", "features": []}))
            .await;
        let loader = SceneLoader::new(query, geo);

        let done = loader
            .run_all(vec![
                LoadRequest { slice: slice(1, "fr"), filters: Vec::new(), generation: 1 },
                LoadRequest { slice: slice(2, "xx"), filters: Vec::new(), generation: 1 },
            ])
            .await;
        assert!(done[0].result.is_ok());
        assert!(matches!(
            done[1].result,
            Err(LoadError::Geometry(GeometryFetchError::Fetch(_)))
        ));
    }
}
