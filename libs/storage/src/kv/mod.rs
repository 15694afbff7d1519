//! Durable key-value store.
//!
//! [`DurableStore`] fronts an asynchronous primary backend (SQLite by
//! default) and degrades to a synchronous [`StringStore`] whenever the primary
//! cannot open or an operation fails. Callers never see storage errors:
//! `get` returns `None`, writes become best-effort.

mod fallback;
mod sqlite;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

pub use fallback::StringStore;
pub use sqlite::SqliteBackend;

/// Asynchronous key-value backend.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Read a value. Absence is `Ok(None)`.
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Overwrite a value.
    async fn set(&self, key: &str, value: &Value) -> StorageResult<()>;

    /// Delete a value. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Delete every value.
    async fn clear(&self) -> StorageResult<()>;

    /// List all keys.
    async fn keys(&self) -> StorageResult<Vec<String>>;

    /// Release any open connection. The next operation reopens it.
    async fn close(&self) {}
}

/// Primary backend used when the platform has none.
#[derive(Debug, Default)]
pub struct UnavailableBackend;

#[async_trait]
impl KvBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn get(&self, _key: &str) -> StorageResult<Option<Value>> {
        Err(StorageError::Unavailable("primary backend disabled".into()))
    }

    async fn set(&self, _key: &str, _value: &Value) -> StorageResult<()> {
        Err(StorageError::Unavailable("primary backend disabled".into()))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("primary backend disabled".into()))
    }

    async fn clear(&self) -> StorageResult<()> {
        Err(StorageError::Unavailable("primary backend disabled".into()))
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        Err(StorageError::Unavailable("primary backend disabled".into()))
    }
}

/// Where a write ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Written to the primary backend.
    Primary,
    /// Primary failed; written to the fallback store.
    Fallback,
    /// Both backends failed; the write was dropped.
    Dropped,
}

/// Key-value store with graceful degradation.
pub struct DurableStore {
    primary: Arc<dyn KvBackend>,
    fallback: Arc<StringStore>,
    /// Set once the primary has failed, so the degradation is logged once.
    degraded: AtomicBool,
}

impl DurableStore {
    /// Create a store from explicit backends.
    pub fn new(primary: Arc<dyn KvBackend>, fallback: Arc<StringStore>) -> Self {
        Self {
            primary,
            fallback,
            degraded: AtomicBool::new(false),
        }
    }

    /// Build the store described by `config`.
    ///
    /// Nothing is opened here; the primary connects lazily on first use.
    pub fn from_config(config: &StorageConfig) -> Self {
        let primary: Arc<dyn KvBackend> = if config.primary_enabled {
            Arc::new(SqliteBackend::new(
                config.database_path(),
                config.schema_version,
            ))
        } else {
            Arc::new(UnavailableBackend)
        };

        let fallback = Arc::new(StringStore::open(
            config.fallback_path(),
            &config.fallback_namespace,
            config.fallback_quota_bytes,
        ));

        Self::new(primary, fallback)
    }

    /// The fallback string store.
    pub fn fallback(&self) -> &Arc<StringStore> {
        &self.fallback
    }

    /// Whether the primary backend has failed at least once.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn note_primary_failure(&self, op: &str, key: Option<&str>, err: &StorageError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(
                backend = self.primary.name(),
                op,
                key,
                error = %err,
                "Primary storage unavailable, using fallback store"
            );
        } else {
            debug!(
                backend = self.primary.name(),
                op,
                key,
                error = %err,
                "Primary storage operation failed"
            );
        }
    }

    /// Read a value. Never fails; absence and errors both yield `None`.
    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.primary.get(key).await {
            Ok(value) => value,
            Err(e) => {
                self.note_primary_failure("get", Some(key), &e);
                self.fallback.get(key)
            }
        }
    }

    /// Drop a stale fallback copy of `key` once the primary holds the
    /// authoritative value, so a later primary failure cannot resurrect it.
    fn forget_fallback(&self, key: &str) {
        if !self.fallback.contains(key) {
            return;
        }
        if let Err(e) = self.fallback.delete(key) {
            warn!(key, error = %e, "Failed to drop stale fallback value");
        }
    }

    /// Write a value, best-effort.
    pub async fn set(&self, key: &str, value: &Value) -> WriteOutcome {
        let err = match self.primary.set(key, value).await {
            Ok(()) => {
                self.forget_fallback(key);
                return WriteOutcome::Primary;
            }
            Err(e) => e,
        };
        self.note_primary_failure("set", Some(key), &err);

        match self.fallback.set(key, value) {
            Ok(()) => WriteOutcome::Fallback,
            Err(e) => {
                error!(key, error = %e, "Fallback write failed, value not persisted");
                WriteOutcome::Dropped
            }
        }
    }

    /// Delete a value, best-effort.
    pub async fn delete(&self, key: &str) {
        match self.primary.delete(key).await {
            Ok(()) => self.forget_fallback(key),
            Err(e) => {
                self.note_primary_failure("delete", Some(key), &e);
                if let Err(e) = self.fallback.delete(key) {
                    warn!(key, error = %e, "Fallback delete failed");
                }
            }
        }
    }

    /// Delete every value, best-effort.
    pub async fn clear(&self) {
        if let Err(e) = self.primary.clear().await {
            self.note_primary_failure("clear", None, &e);
        }
        if self.fallback.keys().is_empty() {
            return;
        }
        if let Err(e) = self.fallback.clear_namespace() {
            warn!(error = %e, "Fallback clear failed");
        }
    }

    /// List stored keys. Never fails; errors yield the fallback's keys.
    pub async fn keys(&self) -> Vec<String> {
        match self.primary.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                self.note_primary_failure("keys", None, &e);
                self.fallback.keys()
            }
        }
    }

    /// Release the primary connection.
    pub async fn close(&self) {
        self.primary.close().await;
        info!(backend = self.primary.name(), "Closed primary storage");
    }
}
