//! Lifecycle of the shared vector-store handle.
//!
//! `ConnectionManager` is built once and shared by `Arc`. `initialize` is the
//! only writer (serialized by an async mutex); queries only read the state and
//! clone the handle.

use rand::Rng;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info};

use vedakb_core::config::{BackoffKind, ConnectionSettings};
use vedakb_core::error::StoreError;
use vedakb_core::traits::{StoreConnector, VectorStore};
use vedakb_core::types::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed,
    /// `delay * factor^(n-1)` capped at `max_delay`, plus up to half of it
    /// again when `jitter` is set.
    Exponential { factor: f64, max_delay: Duration, jitter: bool },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub url: String,
    pub connect_timeout: Duration,
    /// Total attempts, including the first.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        let backoff = match settings.backoff {
            BackoffKind::Fixed => Backoff::Fixed,
            BackoffKind::Exponential => Backoff::Exponential {
                factor: settings.backoff_factor,
                max_delay: settings.max_retry_delay(),
                jitter: settings.jitter,
            },
        };
        Self {
            url: settings.expanded_backend_url(),
            connect_timeout: settings.connect_timeout(),
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
            backoff,
        }
    }

    /// Sleep before the next attempt once `failed_attempt` (1-based) failed.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.retry_delay,
            Backoff::Exponential { factor, max_delay, jitter } => {
                let exp = factor.max(1.0).powi(failed_attempt.saturating_sub(1).min(i32::MAX as u32) as i32);
                let nanos = (self.retry_delay.as_nanos() as f64 * exp).min(max_delay.as_nanos() as f64);
                let base = nanos.round() as u64;
                let extra = if jitter { rand::thread_rng().gen_range(0..=base / 2) } else { 0 };
                Duration::from_nanos(base.saturating_add(extra))
            }
        }
    }
}

struct Inner {
    state: ConnectionState,
    store: Option<Arc<dyn VectorStore>>,
}

pub struct ConnectionManager {
    connector: Arc<dyn StoreConnector>,
    inner: RwLock<Inner>,
    init_lock: Mutex<()>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            inner: RwLock::new(Inner { state: ConnectionState::Disconnected, store: None }),
            init_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// The store handle, present only while `Ready`.
    pub fn handle(&self) -> Option<Arc<dyn VectorStore>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match inner.state {
            ConnectionState::Ready => inner.store.clone(),
            _ => None,
        }
    }

    fn set(&self, state: ConnectionState, store: Option<Arc<dyn VectorStore>>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.state = state;
        inner.store = store;
    }

    /// Connects with bounded retries. Never fails: the outcome is the
    /// returned (and stored) state. Calling it again re-initializes.
    pub async fn initialize(&self, policy: &RetryPolicy) -> ConnectionState {
        let _guard = self.init_lock.lock().await;
        self.set(ConnectionState::Connecting, None);
        let attempts = policy.max_retries.max(1);
        for attempt in 1..=attempts {
            match self.try_connect(policy).await {
                Ok(store) => {
                    info!(attempt, url = %policy.url, backend = store.kind(), "connected to vector store");
                    self.set(ConnectionState::Ready, Some(store));
                    return ConnectionState::Ready;
                }
                Err(e) => {
                    error!(attempt, max_attempts = attempts, url = %policy.url, error = %e, "vector store connection attempt failed");
                    if attempt < attempts {
                        sleep(policy.delay_after(attempt)).await;
                    }
                }
            }
        }
        error!(url = %policy.url, attempts, "max retries reached; vector store unavailable");
        self.set(ConnectionState::Failed, None);
        ConnectionState::Failed
    }

    async fn try_connect(&self, policy: &RetryPolicy) -> Result<Arc<dyn VectorStore>, StoreError> {
        let limit = policy.connect_timeout;
        let store = timeout(limit, self.connector.connect(&policy.url, limit))
            .await
            .map_err(|_| StoreError::Timeout(limit))??;
        let collections = timeout(limit, store.list_collections())
            .await
            .map_err(|_| StoreError::Timeout(limit))??;
        debug!(collections = collections.len(), "liveness probe succeeded");
        Ok(store)
    }
}
