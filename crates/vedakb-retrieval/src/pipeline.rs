use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use vedakb_core::config::RetrievalSettings;
use vedakb_core::traits::{Composer, Embedder};
use vedakb_core::types::{Citation, CollectionRef, ConnectionState, Passage, RankOrder};

use crate::aggregate::aggregate;
use crate::composer::citations;
use crate::connection::ConnectionManager;
use crate::error::RetrievalError;
use crate::fanout::{CollectionFailure, FanoutSearcher};
use crate::resolver::CollectionResolver;

/// Final text when no collection produced a usable passage.
pub const NO_KNOWLEDGE_MESSAGE: &str = "No relevant knowledge found.";

/// Passages for one query plus what went wrong along the way.
#[derive(Debug, Default)]
pub struct Retrieval {
    pub passages: Vec<Passage>,
    pub failures: Vec<CollectionFailure>,
    pub missing: Vec<String>,
    pub searched: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedAnswer {
    pub final_text: String,
    pub citations: Vec<Citation>,
    pub passages: Vec<Passage>,
}

/// Query-side entry point: embed, fan out, aggregate, optionally compose.
pub struct Retriever {
    connection: Arc<ConnectionManager>,
    embedder: Arc<dyn Embedder>,
    searcher: FanoutSearcher,
    collections: Vec<CollectionRef>,
    top_k: usize,
    ordering: RankOrder,
    embed_timeout: Duration,
}

impl Retriever {
    pub fn new(connection: Arc<ConnectionManager>, embedder: Arc<dyn Embedder>, settings: &RetrievalSettings) -> Self {
        let resolver = CollectionResolver::new(settings.naming_strategy());
        let collections = resolver.resolve(settings.instances.as_slice());
        if collections.is_empty() {
            warn!("no collection instances configured; every query will come back empty");
        }
        let searcher = FanoutSearcher::new(Arc::clone(&connection), resolver, settings.search_timeout(), settings.fanout);
        Self {
            connection,
            embedder,
            searcher,
            collections,
            top_k: settings.top_k,
            ordering: settings.ordering,
            embed_timeout: settings.embed_timeout(),
        }
    }

    /// Resolved collections, in configuration order.
    pub fn collections(&self) -> &[CollectionRef] {
        &self.collections
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub async fn retrieve(&self, query: &str) -> Result<Retrieval, RetrievalError> {
        self.retrieve_top_k(query, self.top_k).await
    }

    pub async fn retrieve_top_k(&self, query: &str, top_k: usize) -> Result<Retrieval, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        let state = self.connection.state();
        if state != ConnectionState::Ready {
            return Err(RetrievalError::NotReady(state));
        }
        if top_k == 0 {
            return Ok(Retrieval::default());
        }

        let vector = self.embed_query(query).await?;
        let outcome = self.searcher.search(&vector, &self.collections, top_k).await;
        if outcome.short_circuited {
            return Err(RetrievalError::NotReady(self.connection.state()));
        }
        let result = aggregate(outcome.hits, top_k, self.ordering);

        if result.is_empty() {
            warn!(collections = self.collections.len(), failed = outcome.failures.len(), "No results retrieved from any collection");
        } else {
            info!(count = result.len(), searched = outcome.searched, "Retrieved {} unique results", result.len());
        }
        Ok(Retrieval {
            passages: result.into_passages(),
            failures: outcome.failures,
            missing: outcome.missing,
            searched: outcome.searched,
        })
    }

    /// Retrieves and hands the passages to `composer`. A composer failure is
    /// folded into the answer text; citations are still returned.
    pub async fn answer(&self, query: &str, composer: &dyn Composer) -> Result<ComposedAnswer, RetrievalError> {
        self.answer_top_k(query, self.top_k, composer).await
    }

    pub async fn answer_top_k(&self, query: &str, top_k: usize, composer: &dyn Composer) -> Result<ComposedAnswer, RetrievalError> {
        let retrieval = self.retrieve_top_k(query, top_k).await?;
        if retrieval.passages.is_empty() {
            return Ok(ComposedAnswer {
                final_text: NO_KNOWLEDGE_MESSAGE.to_string(),
                citations: Vec::new(),
                passages: Vec::new(),
            });
        }
        let final_text = match composer.compose(query, &retrieval.passages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "composer failed");
                format!("Error composing: {e}")
            }
        };
        Ok(ComposedAnswer {
            final_text,
            citations: citations(&retrieval.passages),
            passages: retrieval.passages,
        })
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RetrievalError> {
        let embedder = Arc::clone(&self.embedder);
        let texts = vec![query.to_string()];
        let task = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts));
        let vectors = match timeout(self.embed_timeout, task).await {
            Err(_) => return Err(RetrievalError::EmbeddingTimeout(self.embed_timeout)),
            Ok(Err(join)) => return Err(RetrievalError::Embedding(join.to_string())),
            Ok(Ok(Err(e))) => return Err(RetrievalError::Embedding(format!("{e:#}"))),
            Ok(Ok(Ok(v))) => v,
        };
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("embedder returned no vector".to_string()))
    }
}
