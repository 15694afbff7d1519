//! Storage maintenance: wipe everything, estimate usage.
//!
//! Both operations are best-effort. A failed deletion is logged and counted
//! but never stops the remaining deletions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::StorageResult;
use crate::kv::DurableStore;

/// File extension of primary databases.
const DATABASE_EXTENSION: &str = "sqlite3";

/// Lists and deletes primary databases.
#[async_trait]
pub trait DatabaseCatalog: Send + Sync {
    /// Names of every database present. An error means enumeration is not
    /// possible and the caller should fall back to well-known names.
    async fn list(&self) -> StorageResult<Vec<String>>;

    /// Delete one database. Deleting an absent database is not an error.
    async fn delete(&self, name: &str) -> StorageResult<()>;
}

/// Catalog over `*.sqlite3` files in a directory.
#[derive(Debug, Clone)]
pub struct FsCatalog {
    dir: PathBuf,
}

impl FsCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DatabaseCatalog for FsCatalog {
    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == DATABASE_EXTENSION).unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        // WAL mode leaves sidecar files next to the database.
        for suffix in ["", "-wal", "-shm"] {
            let path = self.dir.join(format!("{name}.{DATABASE_EXTENSION}{suffix}"));
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Deleted database file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// What a wipe managed to delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WipeReport {
    /// Databases deleted.
    pub databases_deleted: Vec<String>,
    /// Databases whose deletion failed.
    pub databases_failed: Vec<String>,
    /// Enumeration failed and well-known names were used instead.
    pub used_known_names: bool,
    /// Whether the fallback store was cleared.
    pub fallback_cleared: bool,
    /// Cache entries removed.
    pub cache_entries_deleted: usize,
}

/// Storage usage estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UsageEstimate {
    /// Bytes used and bytes available.
    Supported { usage: u64, quota: u64 },
    /// The platform cannot report usage.
    Unsupported,
}

/// Wipe and usage operations over all local data.
pub struct StorageMaintenance {
    store: Arc<DurableStore>,
    catalog: Arc<dyn DatabaseCatalog>,
    data_dir: PathBuf,
    cache_dir: PathBuf,
    known_databases: Vec<String>,
    quota_bytes: Option<u64>,
}

impl StorageMaintenance {
    /// Create maintenance for the store described by `config`.
    pub fn new(store: Arc<DurableStore>, config: &StorageConfig) -> Self {
        Self::with_catalog(store, Arc::new(FsCatalog::new(&config.data_dir)), config)
    }

    /// Create maintenance with an explicit database catalog.
    pub fn with_catalog(
        store: Arc<DurableStore>,
        catalog: Arc<dyn DatabaseCatalog>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            data_dir: config.data_dir.clone(),
            cache_dir: config.cache_dir.clone(),
            known_databases: config.known_databases.clone(),
            quota_bytes: config.storage_quota_bytes,
        }
    }

    /// Delete all local data: every database, the fallback store, the cache.
    ///
    /// Never fails. The store reopens a fresh database on its next use.
    pub async fn wipe_all(&self) -> WipeReport {
        let mut report = WipeReport::default();

        self.store.close().await;

        let names = match self.catalog.list().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Cannot enumerate databases, deleting well-known names");
                report.used_known_names = true;
                self.known_databases.clone()
            }
        };

        for name in names {
            match self.catalog.delete(&name).await {
                Ok(()) => report.databases_deleted.push(name),
                Err(e) => {
                    warn!(database = %name, error = %e, "Failed to delete database");
                    report.databases_failed.push(name);
                }
            }
        }

        match self.store.fallback().clear_all() {
            Ok(()) => report.fallback_cleared = true,
            Err(e) => warn!(error = %e, "Failed to clear fallback store"),
        }

        report.cache_entries_deleted = clear_dir(&self.cache_dir).await;

        info!(
            deleted = report.databases_deleted.len(),
            failed = report.databases_failed.len(),
            fallback_cleared = report.fallback_cleared,
            cache_entries = report.cache_entries_deleted,
            "Wiped local data"
        );

        report
    }

    /// Approximate bytes used under the data directory against the
    /// configured quota. Never fails.
    pub async fn estimate_usage(&self) -> UsageEstimate {
        let Some(quota) = self.quota_bytes else {
            return UsageEstimate::Unsupported;
        };

        let dir = self.data_dir.clone();
        match tokio::task::spawn_blocking(move || dir_size(&dir)).await {
            Ok(Ok(usage)) => UsageEstimate::Supported { usage, quota },
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                UsageEstimate::Supported { usage: 0, quota }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to measure storage usage");
                UsageEstimate::Unsupported
            }
            Err(e) => {
                warn!(error = %e, "Storage usage task failed");
                UsageEstimate::Unsupported
            }
        }
    }
}

/// Remove every entry in `dir`, one at a time. Returns how many went.
async fn clear_dir(dir: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Cannot list cache directory");
            }
            return 0;
        }
    };

    let mut deleted = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cache listing interrupted");
                break;
            }
        };

        let path = entry.path();
        let result = match entry.file_type().await {
            Ok(ft) if ft.is_dir() => tokio::fs::remove_dir_all(&path).await,
            _ => tokio::fs::remove_file(&path).await,
        };
        match result {
            Ok(()) => deleted += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete cache entry"),
        }
    }
    deleted
}

fn dir_size(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += metadata.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::kv::{SqliteBackend, StringStore};
    use serde_json::json;
    use std::sync::Mutex;

    /// Catalog whose deletions of selected names fail.
    struct ScriptedCatalog {
        names: Option<Vec<String>>,
        failing: Vec<String>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DatabaseCatalog for ScriptedCatalog {
        async fn list(&self) -> StorageResult<Vec<String>> {
            self.names
                .clone()
                .ok_or_else(|| StorageError::Unavailable("enumeration unsupported".into()))
        }

        async fn delete(&self, name: &str) -> StorageResult<()> {
            if self.failing.iter().any(|f| f == name) {
                return Err(StorageError::Unavailable(format!("{name} is blocked")));
            }
            self.deleted.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    fn memory_store() -> Arc<DurableStore> {
        Arc::new(DurableStore::new(
            Arc::new(SqliteBackend::in_memory(1)),
            Arc::new(StringStore::in_memory("gf:", 1024)),
        ))
    }

    #[tokio::test]
    async fn test_failed_deletion_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(ScriptedCatalog {
            names: Some(vec!["A".into(), "B".into(), "C".into()]),
            failing: vec!["A".into()],
            deleted: Mutex::new(Vec::new()),
        });

        let maintenance = StorageMaintenance::with_catalog(
            memory_store(),
            catalog.clone(),
            &StorageConfig::new(dir.path()),
        );
        let report = maintenance.wipe_all().await;

        assert_eq!(*catalog.deleted.lock().unwrap(), vec!["B", "C"]);
        assert_eq!(report.databases_deleted, vec!["B", "C"]);
        assert_eq!(report.databases_failed, vec!["A"]);
        assert!(!report.used_known_names);
        assert!(report.fallback_cleared);
    }

    #[tokio::test]
    async fn test_enumeration_failure_uses_known_names() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(ScriptedCatalog {
            names: None,
            failing: vec!["pinia".into()],
            deleted: Mutex::new(Vec::new()),
        });

        let maintenance = StorageMaintenance::with_catalog(
            memory_store(),
            catalog.clone(),
            &StorageConfig::new(dir.path()),
        );
        let report = maintenance.wipe_all().await;

        assert!(report.used_known_names);
        assert_eq!(
            report.databases_deleted,
            vec!["grayframe", "grayframe-db", "pinia-db", "app-db"]
        );
        assert_eq!(report.databases_failed, vec!["pinia"]);
    }

    #[tokio::test]
    async fn test_wipe_removes_files_and_store_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::new(dir.path());
        let store = Arc::new(DurableStore::from_config(&config));

        store.set("notes", &json!({"items": [1]})).await;
        store.fallback().set_item("unrelated", "x".into()).unwrap();
        std::fs::create_dir_all(config.cache_dir.join("thumbs")).unwrap();
        std::fs::write(config.cache_dir.join("a.bin"), b"123").unwrap();

        let maintenance = StorageMaintenance::new(Arc::clone(&store), &config);
        let report = maintenance.wipe_all().await;

        assert_eq!(report.databases_deleted, vec!["grayframe"]);
        assert_eq!(report.cache_entries_deleted, 2);
        assert!(!config.database_path().exists());
        assert_eq!(store.fallback().get_item("unrelated"), None);

        // Lazily reopened, empty
        assert_eq!(store.get("notes").await, None);
    }

    #[tokio::test]
    async fn test_estimate_usage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StorageConfig::new(dir.path());
        config.storage_quota_bytes = Some(1000);
        std::fs::write(dir.path().join("blob"), vec![0u8; 100]).unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("more"), vec![0u8; 20]).unwrap();

        let maintenance = StorageMaintenance::new(memory_store(), &config);
        assert_eq!(
            maintenance.estimate_usage().await,
            UsageEstimate::Supported {
                usage: 120,
                quota: 1000
            }
        );

        config.storage_quota_bytes = None;
        let maintenance = StorageMaintenance::new(memory_store(), &config);
        assert_eq!(maintenance.estimate_usage().await, UsageEstimate::Unsupported);
    }
}
