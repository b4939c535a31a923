use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use vedakb_core::error::StoreError;
use vedakb_core::traits::{StoreConnector, VectorStore};

use crate::lance_store::LanceStore;
use crate::qdrant::QdrantStore;

/// Chooses the Qdrant REST client for `http(s)://` URLs and LanceDB otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConnector;

pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[async_trait]
impl StoreConnector for DefaultConnector {
    async fn connect(&self, url: &str, timeout: Duration) -> Result<Arc<dyn VectorStore>, StoreError> {
        if is_remote(url) {
            debug!(url, "opening qdrant client");
            Ok(Arc::new(QdrantStore::new(url, timeout)?))
        } else {
            debug!(url, "opening lancedb store");
            Ok(Arc::new(LanceStore::open(url).await?))
        }
    }
}
