//! Query path over a set of knowledge collections.
//!
//! A `ConnectionManager` owns the shared store handle and its readiness
//! state. `Retriever` resolves the configured instances into collection
//! names, embeds the query, fans the search out to every collection and
//! merges the hits into a bounded, deduplicated passage list that a
//! `Composer` can turn into an answer.

pub mod aggregate;
pub mod composer;
pub mod connection;
pub mod error;
pub mod fanout;
pub mod pipeline;
pub mod resolver;

use std::sync::Arc;

use vedakb_core::config::Settings;
use vedakb_core::traits::StoreConnector;
use vedakb_vector::DefaultConnector;

pub use aggregate::aggregate;
pub use composer::{build_prompt, citations, OllamaComposer};
pub use connection::{Backoff, ConnectionManager, RetryPolicy};
pub use error::RetrievalError;
pub use fanout::{CollectionFailure, CollectionOutcome, FanoutOutcome, FanoutSearcher};
pub use pipeline::{ComposedAnswer, Retrieval, Retriever, NO_KNOWLEDGE_MESSAGE};
pub use resolver::CollectionResolver;

/// Builds a manager over `connector` and runs the retry loop once. The
/// returned manager may be `Failed`; check `state()`.
pub async fn connect_with(connector: Arc<dyn StoreConnector>, settings: &Settings) -> Arc<ConnectionManager> {
    let manager = Arc::new(ConnectionManager::new(connector));
    manager.initialize(&RetryPolicy::from_settings(&settings.connection)).await;
    manager
}

/// `connect_with` using the URL-based default connector.
pub async fn connect(settings: &Settings) -> Arc<ConnectionManager> {
    connect_with(Arc::new(DefaultConnector), settings).await
}
