//! SQLite-backed primary store.
//!
//! One `kv` table keyed by container id. The connection is opened lazily on
//! first use and shared afterwards; concurrent first calls wait on the same
//! open instead of racing the schema setup.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, info};

use super::KvBackend;
use crate::error::{StorageError, StorageResult};

type SharedConnection = Arc<Mutex<Connection>>;

/// SQLite key-value backend.
pub struct SqliteBackend {
    /// Database file, or `None` for an in-memory database.
    path: Option<PathBuf>,
    schema_version: u32,
    conn: tokio::sync::Mutex<Option<SharedConnection>>,
}

impl SqliteBackend {
    /// Create a backend for the database file at `path`.
    pub fn new(path: impl Into<PathBuf>, schema_version: u32) -> Self {
        Self {
            path: Some(path.into()),
            schema_version,
            conn: tokio::sync::Mutex::new(None),
        }
    }

    /// Create an in-memory backend (for testing).
    pub fn in_memory(schema_version: u32) -> Self {
        Self {
            path: None,
            schema_version,
            conn: tokio::sync::Mutex::new(None),
        }
    }

    /// Get the shared connection, opening it on first use.
    async fn connection(&self) -> StorageResult<SharedConnection> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(Arc::clone(conn));
        }

        let path = self.path.clone();
        let version = self.schema_version;
        let conn =
            tokio::task::spawn_blocking(move || open_connection(path.as_deref(), version))
                .await??;

        info!(
            path = ?self.path,
            schema_version = version,
            "Opened primary storage"
        );

        let conn = Arc::new(Mutex::new(conn));
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Run a statement against the shared connection off the async thread.
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection().await?;
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StorageError::Unavailable("connection lock poisoned".into()))?;
            f(&guard).map_err(StorageError::from)
        })
        .await?
    }
}

/// Open the database and bring its schema up to `version`.
fn open_connection(path: Option<&Path>, version: u32) -> StorageResult<Connection> {
    let conn = match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(path)?;
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
            conn
        }
        None => Connection::open_in_memory()?,
    };

    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current > version {
        return Err(StorageError::Unavailable(format!(
            "database schema version {current} is newer than supported version {version}"
        )));
    }

    if current < version {
        conn.execute_batch(&format!(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            PRAGMA user_version = {version};
            COMMIT;
            "#
        ))?;
        debug!(from = current, to = version, "Upgraded storage schema");
    }

    Ok(conn)
}

#[async_trait]
impl KvBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let key = key.to_string();
        let raw: Option<String> = self
            .with_conn(move |conn| {
                conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()
            })
            .await?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> StorageResult<()> {
        let key = key.to_string();
        let text = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp_millis();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                params![key, text, now],
            )
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let key = key.to_string();
        self.with_conn(move |conn| conn.execute("DELETE FROM kv WHERE key = ?1", params![key]))
            .await?;
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM kv", [])).await?;
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(keys)
        })
        .await
    }

    async fn close(&self) {
        self.conn.lock().await.take();
    }
}
