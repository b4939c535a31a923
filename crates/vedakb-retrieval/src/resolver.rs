use tracing::warn;

use vedakb_core::error::StoreError;
use vedakb_core::traits::VectorStore;
use vedakb_core::types::{CollectionRef, NamingStrategy};

/// Maps logical instance names to concrete collection names.
#[derive(Debug, Clone, Default)]
pub struct CollectionResolver {
    strategy: NamingStrategy,
}

impl CollectionResolver {
    pub fn new(strategy: NamingStrategy) -> Self {
        Self { strategy }
    }

    /// Trims each name and applies the naming strategy. Order and duplicates
    /// are kept; blank names are dropped. Nothing is checked against the store.
    pub fn resolve<S: AsRef<str>>(&self, logical_names: &[S]) -> Vec<CollectionRef> {
        logical_names
            .iter()
            .map(|n| n.as_ref().trim())
            .filter(|n| !n.is_empty())
            .map(|n| CollectionRef {
                logical_name: n.to_string(),
                resolved_name: self.strategy.apply(n),
                exists: false,
            })
            .collect()
    }

    /// Raw existence query; errors are returned to the caller.
    pub async fn probe(&self, store: &dyn VectorStore, collection: &CollectionRef) -> Result<bool, StoreError> {
        store.collection_exists(&collection.resolved_name).await
    }

    /// Existence check that never fails: a missing collection or a backend
    /// error both read as `false`.
    pub async fn check_exists(&self, store: &dyn VectorStore, collection: &CollectionRef) -> bool {
        match self.probe(store, collection).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(collection = %collection.resolved_name, "collection does not exist");
                false
            }
            Err(e) => {
                warn!(collection = %collection.resolved_name, error = %e, "existence check failed");
                false
            }
        }
    }

    /// Returns copies of `refs` with `exists` filled in.
    pub async fn validate(&self, store: &dyn VectorStore, refs: &[CollectionRef]) -> Vec<CollectionRef> {
        let mut out = Vec::with_capacity(refs.len());
        for r in refs {
            let exists = self.check_exists(store, r).await;
            out.push(CollectionRef { exists, ..r.clone() });
        }
        out
    }
}
