use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{Passage, ScoredPoint};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// A vector store holding one or more named collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend label used in synthesized provenance (e.g. `qdrant`).
    fn kind(&self) -> &'static str;
    fn url(&self) -> &str;
    /// Lightweight liveness probe.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError>;
    /// Top-`k` similarity search, best match first.
    async fn search(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>, StoreError>;
}

/// Opens store handles; the connection manager retries through this seam.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, url: &str, timeout: Duration) -> Result<Arc<dyn VectorStore>, StoreError>;
}

/// Text generation over retrieved passages.
#[async_trait]
pub trait Composer: Send + Sync {
    async fn compose(&self, query: &str, passages: &[Passage]) -> anyhow::Result<String>;
}
