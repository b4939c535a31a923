//! Qdrant client over the REST API.
//!
//! Only the three calls the retrieval path needs are implemented: listing
//! collections (liveness probe), the existence check and a top-k search with
//! payloads.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use vedakb_core::error::StoreError;
use vedakb_core::traits::VectorStore;
use vedakb_core::types::{Meta, ScoredPoint};

pub struct QdrantStore {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct QdrantPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl QdrantStore {
    /// Builds the HTTP client; no request is sent until the first call.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let connect_err = |message: String| StoreError::Connect { url: base_url.to_string(), message };
        reqwest::Url::parse(base_url).map_err(|e| connect_err(format!("invalid URL: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| connect_err(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn map_reqwest(&self, collection: &str, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else {
            StoreError::Request {
                collection: collection.to_string(),
                message: e.to_string(),
            }
        }
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(&self, collection: &str, response: Response) -> Result<T, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Status { status: status.as_u16(), message });
        }
        let body = response.text().await.map_err(|e| self.map_reqwest(collection, e))?;
        decode::<T>(&body)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn kind(&self) -> &'static str {
        "qdrant"
    }

    fn url(&self) -> &str {
        &self.base_url
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let url = format!("{}/collections", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| self.map_reqwest("*", e))?;
        let envelope: Envelope<CollectionsResult> = self.read_json("*", response).await?;
        Ok(envelope.result.collections.into_iter().map(|c| c.name).collect())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let url = format!("{}/collections/{}/exists", self.base_url, name);
        let response = self.client.get(&url).send().await.map_err(|e| self.map_reqwest(name, e))?;
        let envelope: Envelope<ExistsResult> = self.read_json(name, response).await?;
        Ok(envelope.result.exists)
    }

    async fn search(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>, StoreError> {
        let url = format!("{}/collections/{}/points/search", self.base_url, name);
        let body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
        });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_reqwest(name, e))?;
        let envelope: Envelope<Vec<QdrantPoint>> = self.read_json(name, response).await?;
        debug!(collection = name, hits = envelope.result.len(), "qdrant search");
        Ok(envelope.result.into_iter().map(into_scored_point).collect())
    }
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::Malformed(e.to_string()))
}

/// Point ids are either unsigned integers or UUID strings.
fn point_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn into_scored_point(point: QdrantPoint) -> ScoredPoint {
    let payload = point.payload.unwrap_or_default();
    let text = payload.get("text").and_then(Value::as_str).map(str::to_string);
    let metadata = payload.get("metadata").and_then(Value::as_object).map(|obj| {
        obj.iter()
            .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
            .collect::<Meta>()
    });
    ScoredPoint {
        id: point_id(&point.id),
        score: point.score,
        text,
        metadata,
    }
}
