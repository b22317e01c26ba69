//! Collaborator boundaries: geometry documents and slice queries.
//!
//! Both traits return boxed futures so they stay dyn-compatible. HTTP
//! implementations talk to the dashboard backend; the in-memory ones serve
//! fixtures and count fetches.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use catalog::{Slice, SliceConfig};
use foundation::ids::SliceId;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug)]
pub struct SourceError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Query for one slice, with dashboard filters already merged into `config`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub slice_id: SliceId,
    pub visualization_type: String,
    pub config: SliceConfig,
}

impl QueryRequest {
    pub fn for_slice(slice: &Slice, config: SliceConfig) -> Self {
        Self {
            slice_id: slice.id,
            visualization_type: slice.visualization_type.clone(),
            config,
        }
    }
}

/// Fetches raw region geometry documents by region-set key.
pub trait GeometrySource: Send + Sync {
    fn fetch_geometry(&self, region_set: &str) -> BoxFuture<'_, Result<Value, SourceError>>;
}

/// Executes slice queries; results may be flat or wrapped in `data`.
pub trait QuerySource: Send + Sync {
    fn execute(&self, request: QueryRequest) -> BoxFuture<'_, Result<Value, SourceError>>;
}

async fn get_json(client: &reqwest::Client, url: &str) -> Result<Value, SourceError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| SourceError::with_source("HTTP request failed", e))?;
    if !resp.status().is_success() {
        return Err(SourceError::new(format!("HTTP error: {}", resp.status())));
    }
    resp.json::<Value>()
        .await
        .map_err(|e| SourceError::with_source("Failed to decode response", e))
}

/// Geometry over HTTP; `{region}` in the template is replaced by the key.
pub struct HttpGeometrySource {
    url_template: String,
    client: reqwest::Client,
}

impl HttpGeometrySource {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url_for(&self, region_set: &str) -> String {
        self.url_template.replace("{region}", region_set)
    }
}

impl GeometrySource for HttpGeometrySource {
    fn fetch_geometry(&self, region_set: &str) -> BoxFuture<'_, Result<Value, SourceError>> {
        let url = self.url_for(region_set);
        Box::pin(async move { get_json(&self.client, &url).await })
    }
}

/// Slice queries POSTed as JSON to a single endpoint.
pub struct HttpQuerySource {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpQuerySource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

impl QuerySource for HttpQuerySource {
    fn execute(&self, request: QueryRequest) -> BoxFuture<'_, Result<Value, SourceError>> {
        Box::pin(async move {
            let resp = self
                .client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|e| SourceError::with_source("HTTP request failed", e))?;
            if !resp.status().is_success() {
                return Err(SourceError::new(format!(
                    "query for {} failed: {}",
                    request.slice_id,
                    resp.status()
                )));
            }
            resp.json::<Value>()
                .await
                .map_err(|e| SourceError::with_source("Failed to decode response", e))
        })
    }
}

/// In-memory geometry documents, optionally delayed to widen race windows.
#[derive(Default)]
pub struct MemoryGeometrySource {
    documents: RwLock<HashMap<String, Value>>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl MemoryGeometrySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn insert(&self, region_set: impl Into<String>, doc: Value) {
        self.documents.write().await.insert(region_set.into(), doc);
    }

    pub async fn remove(&self, region_set: &str) -> Option<Value> {
        self.documents.write().await.remove(region_set)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl GeometrySource for MemoryGeometrySource {
    fn fetch_geometry(&self, region_set: &str) -> BoxFuture<'_, Result<Value, SourceError>> {
        let key = region_set.to_string();
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.documents
                .read()
                .await
                .get(&key)
                .cloned()
                .ok_or_else(|| SourceError::new(format!("no geometry for region set {key}")))
        })
    }
}

/// In-memory query results keyed by slice; `Err` entries simulate failures.
#[derive(Default)]
pub struct MemoryQuerySource {
    results: RwLock<HashMap<SliceId, Result<Value, String>>>,
    requests: RwLock<Vec<QueryRequest>>,
}

impl MemoryQuerySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn respond(&self, slice: SliceId, payload: Value) {
        self.results.write().await.insert(slice, Ok(payload));
    }

    pub async fn fail(&self, slice: SliceId, message: impl Into<String>) {
        self.results.write().await.insert(slice, Err(message.into()));
    }

    /// Requests seen so far, in arrival order.
    pub async fn requests(&self) -> Vec<QueryRequest> {
        self.requests.read().await.clone()
    }
}

impl QuerySource for MemoryQuerySource {
    fn execute(&self, request: QueryRequest) -> BoxFuture<'_, Result<Value, SourceError>> {
        Box::pin(async move {
            let slice = request.slice_id;
            self.requests.write().await.push(request);
            match self.results.read().await.get(&slice) {
                Some(Ok(v)) => Ok(v.clone()),
                Some(Err(msg)) => Err(SourceError::new(msg.clone())),
                None => Err(SourceError::new(format!("no result for {slice}"))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_template_substitutes_region() {
        let src = HttpGeometrySource::new("https://geo.example/{region}.geojson");
        assert_eq!(src.url_for("fr"), "https://geo.example/fr.geojson");
    }

    #[tokio::test]
    async fn memory_sources_count_and_fail() {
        let geo = MemoryGeometrySource::new();
        geo.insert("fr", json!({"type": "FeatureCollection", "features": []}))
            .await;
        assert!(geo.fetch_geometry("fr").await.is_ok());
        assert!(geo.fetch_geometry("de").await.is_err());
        assert_eq!(geo.fetch_count(), 2);

        let q = MemoryQuerySource::new();
        q.fail(SliceId(1), "backend down").await;
        let slice = Slice::new(1, "s", "region_feed");
        let err = q
            .execute(QueryRequest::for_slice(&slice, slice.config.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.message, "backend down");
        assert_eq!(q.requests().await.len(), 1);
    }
}
