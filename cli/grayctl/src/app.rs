//! Process wiring: store, containers, persistence.

use std::sync::Arc;

use anyhow::{Context, Result};
use grayframe_backup::BackupEngine;
use grayframe_storage::{
    DurableStore, PersistenceHandle, PersistencePlugin, Registry, StorageConfig,
    StorageMaintenance, WipeReport,
};
use grayframe_stores::AppStores;
use tracing::{debug, warn};

/// An opened, hydrated application.
pub struct App {
    pub config: StorageConfig,
    pub store: Arc<DurableStore>,
    pub stores: AppStores,
    pub registry: Registry,
    persistence: Option<PersistenceHandle>,
}

impl App {
    /// Open storage and load every container from it.
    pub async fn open(config: StorageConfig) -> Result<Self> {
        debug!(data_dir = %config.data_dir.display(), "Opening local data");

        let store = Arc::new(DurableStore::from_config(&config));
        let stores = AppStores::new();
        let registry = stores
            .registry()
            .context("Failed to register state containers")?;

        let persistence =
            PersistencePlugin::new(store.clone(), config.save_debounce).install(&registry);
        persistence.hydrated().await;

        if store.is_degraded() {
            warn!("Primary storage unavailable, using the fallback store");
        }

        Ok(Self {
            config,
            store,
            stores,
            registry,
            persistence: Some(persistence),
        })
    }

    pub fn backup(&self) -> BackupEngine<'_> {
        BackupEngine::new(&self.registry)
    }

    pub fn maintenance(&self) -> StorageMaintenance {
        StorageMaintenance::new(self.store.clone(), &self.config)
    }

    /// Delete all local data.
    ///
    /// Autosave is stopped first so nothing is written back afterwards.
    pub async fn wipe(mut self) -> WipeReport {
        if let Some(persistence) = self.persistence.take() {
            persistence.shutdown().await;
        }
        self.maintenance().wipe_all().await
    }

    /// Flush pending saves and release the database.
    pub async fn close(mut self) {
        if let Some(persistence) = self.persistence.take() {
            persistence.shutdown().await;
        }
        self.store.close().await;
    }
}
