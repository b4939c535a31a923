mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{point, ready_manager, verbatim, MockStore};
use vedakb_core::error::StoreError;
use vedakb_core::types::FanoutMode;
use vedakb_retrieval::{CollectionResolver, ConnectionManager, FanoutSearcher};

fn searcher(manager: Arc<ConnectionManager>, mode: FanoutMode) -> FanoutSearcher {
    FanoutSearcher::new(manager, CollectionResolver::new(verbatim()), Duration::from_millis(200), mode)
}

fn refs(names: &[&str]) -> Vec<vedakb_core::types::CollectionRef> {
    CollectionResolver::new(verbatim()).resolve(names)
}

#[tokio::test]
async fn not_ready_touches_nothing() {
    let store = Arc::new(MockStore::new().with_texts("a", &["x"]));
    let manager = Arc::new(ConnectionManager::new(Arc::new(common::MockConnector::new(store.clone()))));

    let outcome = searcher(manager, FanoutMode::Concurrent).search(&[0.1, 0.2], &refs(&["a", "b"]), 5).await;
    assert!(outcome.short_circuited);
    assert!(outcome.hits.is_empty());
    assert!(outcome.failures.is_empty());
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn one_failing_collection_does_not_sink_the_others() {
    let store = Arc::new(
        MockStore::new()
            .with_texts("a", &["from a"])
            .failing("b")
            .with_texts("c", &["from c"]),
    );
    let manager = ready_manager(store.clone()).await;

    let outcome = searcher(manager, FanoutMode::Concurrent).search(&[0.0], &refs(&["a", "b", "c"]), 5).await;
    let texts: Vec<&str> = outcome.hits.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, vec!["from a", "from c"]);
    assert_eq!(outcome.searched, 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].collection, "b");
    assert!(matches!(outcome.failures[0].cause, StoreError::Backend(_)));
    assert_eq!(store.searches(), 3);
}

#[tokio::test]
async fn missing_collection_is_skipped_without_search() {
    let store = Arc::new(MockStore::new().with_texts("a", &["from a"]));
    let manager = ready_manager(store.clone()).await;

    let outcome = searcher(manager, FanoutMode::Concurrent).search(&[0.0], &refs(&["ghost", "a"]), 5).await;
    assert_eq!(outcome.missing, vec!["ghost".to_string()]);
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.hits.len(), 1);
    assert_eq!(store.searches(), 1);
    assert_eq!(store.exists_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_text_dropped_and_missing_metadata_synthesized() {
    let store = Arc::new(MockStore::new().with_points(
        "a",
        vec![
            point("p1", 0.9, Some(""), Some("x.txt")),
            point("p2", 0.8, None, None),
            point("p3", 0.7, Some("kept"), None),
        ],
    ));
    let manager = ready_manager(store).await;

    let outcome = searcher(manager, FanoutMode::Concurrent).search(&[0.0], &refs(&["a"]), 5).await;
    assert_eq!(outcome.hits.len(), 1);
    let hit = &outcome.hits[0];
    assert_eq!(hit.text, "kept");
    assert_eq!(hit.collection, "a");
    assert_eq!(hit.metadata.get("source").map(String::as_str), Some("mock:mem://test:a:p3"));
}

#[tokio::test]
async fn slow_collection_times_out_as_failure() {
    let store = Arc::new(
        MockStore::new()
            .slow("slow", Duration::from_secs(5))
            .with_texts("fast", &["quick answer"]),
    );
    let manager = ready_manager(store).await;

    let outcome = searcher(manager, FanoutMode::Concurrent).search(&[0.0], &refs(&["slow", "fast"]), 5).await;
    assert_eq!(outcome.hits.len(), 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].collection, "slow");
    assert!(matches!(outcome.failures[0].cause, StoreError::Timeout(_)));
}

#[tokio::test]
async fn results_follow_collection_order_not_completion_order() {
    let store = Arc::new(
        MockStore::new()
            .with_texts("first", &["one"])
            .with_texts("second", &["two"]),
    );
    let manager = ready_manager(store).await;

    let outcome = searcher(manager, FanoutMode::Concurrent).search(&[0.0], &refs(&["second", "first"]), 5).await;
    let texts: Vec<&str> = outcome.hits.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, vec!["two", "one"]);
}

#[tokio::test]
async fn sequential_mode_matches_concurrent() {
    let store = Arc::new(
        MockStore::new()
            .with_texts("a", &["a0", "a1"])
            .failing("b")
            .with_texts("c", &["c0"]),
    );
    let manager = ready_manager(store).await;
    let names = refs(&["a", "b", "missing", "c"]);

    let concurrent = searcher(manager.clone(), FanoutMode::Concurrent).search(&[0.0], &names, 5).await;
    let sequential = searcher(manager, FanoutMode::Sequential).search(&[0.0], &names, 5).await;
    assert_eq!(concurrent.hits, sequential.hits);
    assert_eq!(concurrent.missing, sequential.missing);
    assert_eq!(concurrent.searched, sequential.searched);
    assert_eq!(concurrent.failures.len(), sequential.failures.len());
}

#[tokio::test]
async fn respects_k_per_collection() {
    let store = Arc::new(MockStore::new().with_texts("a", &["0", "1", "2", "3"]));
    let manager = ready_manager(store).await;

    let outcome = searcher(manager, FanoutMode::Concurrent).search(&[0.0], &refs(&["a"]), 2).await;
    assert_eq!(outcome.hits.len(), 2);
}
