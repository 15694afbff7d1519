//! # grayframe-storage
//!
//! Local persistence for grayframe state.
//!
//! ## Modules
//!
//! - `kv`: the durable key-value store (SQLite primary, string-store fallback)
//! - `container`: named state containers and the process-wide registry
//! - `persist`: hydration at startup and debounced autosave per container
//! - `maintenance`: wiping all local data and estimating usage
//!
//! ```text
//! Registry ──install──▶ PersistencePlugin ──get/set──▶ DurableStore
//!                                                       ├── SqliteBackend
//!                                                       └── StringStore (fallback)
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod kv;
pub mod maintenance;
pub mod persist;

pub use config::StorageConfig;
pub use container::{merge_patch, Container, Registry, Revision, Serializable, StateContainer};
pub use error::{ContainerError, StorageError, StorageResult};
pub use kv::{DurableStore, KvBackend, SqliteBackend, StringStore, UnavailableBackend, WriteOutcome};
pub use maintenance::{DatabaseCatalog, FsCatalog, StorageMaintenance, UsageEstimate, WipeReport};
pub use persist::{HydrateOutcome, PersistenceHandle, PersistencePlugin, SaveSchedule};
