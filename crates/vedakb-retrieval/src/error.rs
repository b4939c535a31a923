use std::time::Duration;
use thiserror::Error;

use vedakb_core::types::ConnectionState;

/// Failures that make a whole query impossible.
///
/// Per-collection problems never surface here; they are reported in
/// `FanoutOutcome::failures` instead.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("vector store is not ready (state: {0})")]
    NotReady(ConnectionState),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("embedding timed out after {0:?}")]
    EmbeddingTimeout(Duration),
}
