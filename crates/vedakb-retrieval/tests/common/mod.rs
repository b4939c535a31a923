#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vedakb_core::config::RetrievalSettings;
use vedakb_core::error::StoreError;
use vedakb_core::traits::{StoreConnector, VectorStore};
use vedakb_core::types::{Meta, NamingStrategy, ScoredPoint};
use vedakb_retrieval::{Backoff, ConnectionManager, RetryPolicy};

/// In-memory store: every collection holds a fixed result list that is
/// returned (truncated to `k`) for any query vector.
#[derive(Default)]
pub struct MockStore {
    collections: HashMap<String, Vec<ScoredPoint>>,
    failing: HashSet<String>,
    slow: HashMap<String, Duration>,
    pub list_calls: AtomicUsize,
    pub exists_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection whose points carry `texts` with descending scores.
    pub fn with_texts(mut self, name: &str, texts: &[&str]) -> Self {
        let points = texts
            .iter()
            .enumerate()
            .map(|(i, t)| point(&format!("{name}-{i}"), 1.0 - i as f32 * 0.1, Some(t), Some("doc.txt")))
            .collect();
        self.collections.insert(name.to_string(), points);
        self
    }

    pub fn with_points(mut self, name: &str, points: Vec<ScoredPoint>) -> Self {
        self.collections.insert(name.to_string(), points);
        self
    }

    /// Collection exists but every search on it errors.
    pub fn failing(mut self, name: &str) -> Self {
        self.collections.entry(name.to_string()).or_default();
        self.failing.insert(name.to_string());
        self
    }

    /// Collection exists but searches sleep for `delay` first.
    pub fn slow(mut self, name: &str, delay: Duration) -> Self {
        self.collections.entry(name.to_string()).or_default();
        self.slow.insert(name.to_string(), delay);
        self
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst) + self.exists_calls.load(Ordering::SeqCst) + self.searches()
    }
}

pub fn point(id: &str, score: f32, text: Option<&str>, source: Option<&str>) -> ScoredPoint {
    ScoredPoint {
        id: id.to_string(),
        score,
        text: text.map(str::to_string),
        metadata: source.map(|s| {
            let mut m = Meta::new();
            m.insert("source".to_string(), s.to_string());
            m
        }),
    }
}

#[async_trait]
impl VectorStore for MockStore {
    fn kind(&self) -> &'static str {
        "mock"
    }

    fn url(&self) -> &str {
        "mem://test"
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.collections.keys().cloned().collect())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.collections.contains_key(name))
    }

    async fn search(&self, name: &str, _vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>, StoreError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.slow.get(name) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(name) {
            return Err(StoreError::Backend(format!("{name} is broken")));
        }
        let points = self
            .collections
            .get(name)
            .ok_or_else(|| StoreError::Request { collection: name.to_string(), message: "not found".into() })?;
        Ok(points.iter().take(k).cloned().collect())
    }
}

/// Hands out the same store, failing the first `fail_first` attempts.
pub struct MockConnector {
    store: Arc<MockStore>,
    fail_first: usize,
    connect_delay: Option<Duration>,
    pub connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(store: Arc<MockStore>) -> Self {
        Self { store, fail_first: 0, connect_delay: None, connects: AtomicUsize::new(0) }
    }

    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn hanging_for(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub fn attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MockConnector {
    async fn connect(&self, url: &str, _timeout: Duration) -> Result<Arc<dyn VectorStore>, StoreError> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if attempt <= self.fail_first {
            return Err(StoreError::Connect { url: url.to_string(), message: format!("refused (attempt {attempt})") });
        }
        Ok(self.store.clone())
    }
}

pub fn policy(max_retries: u32, retry_delay: Duration) -> RetryPolicy {
    RetryPolicy {
        url: "mem://test".to_string(),
        connect_timeout: Duration::from_secs(2),
        max_retries,
        retry_delay,
        backoff: Backoff::Fixed,
    }
}

/// A manager already initialized against `store`.
pub async fn ready_manager(store: Arc<MockStore>) -> Arc<ConnectionManager> {
    let manager = Arc::new(ConnectionManager::new(Arc::new(MockConnector::new(store))));
    manager.initialize(&policy(1, Duration::from_millis(1))).await;
    manager
}

pub fn settings(instances: &[&str]) -> RetrievalSettings {
    RetrievalSettings {
        instances: instances.iter().map(|s| s.to_string()).collect(),
        naming: vedakb_core::config::NamingKind::Verbatim,
        ..RetrievalSettings::default()
    }
}

pub fn verbatim() -> NamingStrategy {
    NamingStrategy::Verbatim
}
