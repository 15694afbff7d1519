//! # grayframe-backup
//!
//! Portable backups of application state.
//!
//! [`BackupEngine`] reads containers from a [`grayframe_storage::Registry`]
//! to build a [`BackupDocument`], and pushes a parsed document back into the
//! same containers. Import is tolerant: anything with the right overall
//! structure is accepted, records are normalized, and fields of the wrong
//! type are skipped rather than failing the import.

mod document;
mod engine;
mod error;
mod legacy;
mod normalize;
mod plan;
mod theme;

pub use document::{
    BackupDocument, BackupKind, ModulesSection, SettingsSection, ThemeSection, UserSection,
    BACKUP_VERSION,
};
pub use engine::{BackupEngine, ContainerIds, ImportMode, ImportReport};
pub use error::{BackupError, BackupResult};
pub use normalize::{normalize_note, normalize_status, normalize_task};
pub use theme::{parse_theme, serialize_theme, ThemeExport};
