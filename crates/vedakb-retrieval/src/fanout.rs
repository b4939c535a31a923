//! Concurrent top-k search across every configured collection.
//!
//! Each collection is searched independently; its outcome lands in the slot
//! matching its position in the input, whatever order the futures complete
//! in. A failing collection only costs its own hits.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use vedakb_core::error::StoreError;
use vedakb_core::traits::VectorStore;
use vedakb_core::types::{CollectionRef, FanoutMode, Meta, RawHit, ScoredPoint};

use crate::connection::ConnectionManager;
use crate::resolver::CollectionResolver;

/// A collection that could not be searched, and why.
#[derive(Debug)]
pub struct CollectionFailure {
    pub collection: String,
    pub cause: StoreError,
}

#[derive(Debug)]
pub enum CollectionOutcome {
    Hits(Vec<RawHit>),
    Missing,
    Failed(StoreError),
}

#[derive(Debug, Default)]
pub struct FanoutOutcome {
    /// Hits in collection order, each collection's hits in store order.
    pub hits: Vec<RawHit>,
    pub failures: Vec<CollectionFailure>,
    pub missing: Vec<String>,
    /// Number of collections that were actually searched.
    pub searched: usize,
    /// True when the store was not ready and nothing was attempted.
    pub short_circuited: bool,
}

impl FanoutOutcome {
    fn collect(refs: &[CollectionRef], outcomes: Vec<CollectionOutcome>) -> Self {
        let mut out = Self::default();
        for (r, outcome) in refs.iter().zip(outcomes) {
            match outcome {
                CollectionOutcome::Hits(hits) => {
                    out.searched += 1;
                    out.hits.extend(hits);
                }
                CollectionOutcome::Missing => out.missing.push(r.resolved_name.clone()),
                CollectionOutcome::Failed(cause) => out.failures.push(CollectionFailure {
                    collection: r.resolved_name.clone(),
                    cause,
                }),
            }
        }
        out
    }
}

pub struct FanoutSearcher {
    connection: Arc<ConnectionManager>,
    resolver: CollectionResolver,
    search_timeout: Duration,
    mode: FanoutMode,
}

impl FanoutSearcher {
    pub fn new(connection: Arc<ConnectionManager>, resolver: CollectionResolver, search_timeout: Duration, mode: FanoutMode) -> Self {
        Self { connection, resolver, search_timeout, mode }
    }

    pub async fn search(&self, vector: &[f32], refs: &[CollectionRef], k: usize) -> FanoutOutcome {
        let Some(store) = self.connection.handle() else {
            warn!(state = %self.connection.state(), "vector store not ready; skipping search");
            return FanoutOutcome { short_circuited: true, ..FanoutOutcome::default() };
        };

        let outcomes = match self.mode {
            FanoutMode::Concurrent => {
                join_all(refs.iter().map(|r| self.search_one(store.as_ref(), r, vector, k))).await
            }
            FanoutMode::Sequential => {
                let mut outcomes = Vec::with_capacity(refs.len());
                for r in refs {
                    outcomes.push(self.search_one(store.as_ref(), r, vector, k).await);
                }
                outcomes
            }
        };
        let outcome = FanoutOutcome::collect(refs, outcomes);
        debug!(
            collections = refs.len(),
            searched = outcome.searched,
            missing = outcome.missing.len(),
            failed = outcome.failures.len(),
            hits = outcome.hits.len(),
            "fan-out finished"
        );
        outcome
    }

    async fn search_one(&self, store: &dyn VectorStore, collection: &CollectionRef, vector: &[f32], k: usize) -> CollectionOutcome {
        let name = collection.resolved_name.as_str();
        let limit = self.search_timeout;

        match timeout(limit, self.resolver.probe(store, collection)).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                warn!(collection = name, "collection does not exist; skipping");
                return CollectionOutcome::Missing;
            }
            Ok(Err(e)) => {
                error!(collection = name, error = %e, "existence check failed");
                return CollectionOutcome::Failed(e);
            }
            Err(_) => {
                error!(collection = name, timeout_ms = limit.as_millis() as u64, "existence check timed out");
                return CollectionOutcome::Failed(StoreError::Timeout(limit));
            }
        }

        match timeout(limit, store.search(name, vector, k)).await {
            Ok(Ok(points)) => {
                let hits: Vec<RawHit> = points.into_iter().filter_map(|p| to_raw_hit(store, name, p)).collect();
                debug!(collection = name, hits = hits.len(), "collection searched");
                CollectionOutcome::Hits(hits)
            }
            Ok(Err(e)) => {
                error!(collection = name, error = %e, "search failed");
                CollectionOutcome::Failed(e)
            }
            Err(_) => {
                error!(collection = name, timeout_ms = limit.as_millis() as u64, "search timed out");
                CollectionOutcome::Failed(StoreError::Timeout(limit))
            }
        }
    }
}

/// Attaches provenance to a point. Points without text are dropped.
pub(crate) fn to_raw_hit(store: &dyn VectorStore, collection: &str, point: ScoredPoint) -> Option<RawHit> {
    let text = point.text.filter(|t| !t.is_empty())?;
    let metadata = point.metadata.unwrap_or_else(|| fallback_metadata(store, collection, &point.id));
    Some(RawHit {
        collection: collection.to_string(),
        id: point.id,
        score: point.score,
        text,
        metadata,
    })
}

fn fallback_metadata(store: &dyn VectorStore, collection: &str, id: &str) -> Meta {
    let mut meta = Meta::new();
    meta.insert("source".to_string(), format!("{}:{}:{}:{}", store.kind(), store.url(), collection, id));
    meta
}
