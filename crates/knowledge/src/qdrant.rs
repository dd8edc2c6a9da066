//! Qdrant vector store over the REST API.
//!
//! Endpoints used:
//! - `GET /collections` (reachability)
//! - `GET /collections/{name}` (existence probe)
//! - `PUT /collections/{name}` (create, cosine distance)
//! - `PUT /collections/{name}/points?wait=true` (upsert)
//! - `POST /collections/{name}/points/search`
//! - `POST /collections/{name}/points/count`

use async_trait::async_trait;
use fixdesk_core::error::StoreError;
use fixdesk_core::knowledge::{ScoredPoint, VectorPoint, VectorStore};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub struct QdrantStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl QdrantStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client for Qdrant");
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Send a request against a collection endpoint; 404 means the collection is gone.
    async fn send_for(
        &self,
        collection: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, StoreError> {
        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionMissing(collection.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Qdrant returned error");
            return Err(StoreError::Request(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        Ok(response)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .request(reqwest::Method::GET, "/collections")
            .send()
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {e}", self.base_url)))?;

        if !response.status().is_success() {
            return Err(StoreError::Connection(format!(
                "{} answered HTTP {}",
                self.base_url,
                response.status().as_u16()
            )));
        }
        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError> {
        let path = format!("/collections/{collection}");
        match self.send_for(collection, self.request(reqwest::Method::GET, &path)).await {
            Ok(_) => Ok(true),
            Err(StoreError::CollectionMissing(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_collection(&self, collection: &str, vector_size: usize) -> Result<(), StoreError> {
        let path = format!("/collections/{collection}");
        let body = serde_json::json!({
            "vectors": { "size": vector_size, "distance": "Cosine" }
        });
        self.send_for(collection, self.request(reqwest::Method::PUT, &path).json(&body))
            .await?;
        debug!(collection, vector_size, "Created Qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<(), StoreError> {
        let path = format!("/collections/{collection}/points?wait=true");
        let body = serde_json::json!({
            "points": [{
                "id": point.id,
                "vector": point.vector,
                "payload": point.payload,
            }]
        });
        self.send_for(collection, self.request(reqwest::Method::PUT, &path).json(&body))
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let path = format!("/collections/{collection}/points/search");
        let body = serde_json::json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        let response = self
            .send_for(collection, self.request(reqwest::Method::POST, &path).json(&body))
            .await?;

        let parsed: QdrantResponse<Vec<ApiScoredPoint>> = response
            .json()
            .await
            .map_err(|e| StoreError::Request(format!("Failed to parse search response: {e}")))?;

        Ok(parsed.result.into_iter().map(ApiScoredPoint::into_point).collect())
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let path = format!("/collections/{collection}/points/count");
        let body = serde_json::json!({ "exact": true });
        let response = self
            .send_for(collection, self.request(reqwest::Method::POST, &path).json(&body))
            .await?;

        let parsed: QdrantResponse<ApiCount> = response
            .json()
            .await
            .map_err(|e| StoreError::Request(format!("Failed to parse count response: {e}")))?;
        Ok(parsed.result.count)
    }
}

// --- Qdrant API types (private) ---

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ApiScoredPoint {
    /// Integer or UUID string
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl ApiScoredPoint {
    fn into_point(self) -> ScoredPoint {
        let id = match self.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        ScoredPoint {
            id,
            score: self.score,
            payload: self.payload.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiCount {
    count: usize,
}
