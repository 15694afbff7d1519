//! Backup document wire format.
//!
//! ```json
//! {
//!   "kind": "full",
//!   "version": 1,
//!   "createdAt": "2026-01-02T03:04:05Z",
//!   "user": { "displayName": "Creator", "avatarDataUrl": null },
//!   "settings": { "enabled": { "notes": true, "tasks": true } },
//!   "modules": { "notes": { "items": [] }, "tasks": { "items": [] } },
//!   "theme": { "mode": "dark", "vars": { "bg": "#1F1F21" } }
//! }
//! ```
//!
//! `theme` is written only for `kind = "full"`. Field names and the `kind`
//! literals are a stable contract.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BackupError, BackupResult};

/// Document version written by this build. Informational on import.
pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    /// User profile, module settings, notes and tasks.
    Core,
    /// Core plus theme.
    Full,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Full => "full",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "core" => Some(Self::Core),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSection {
    pub display_name: String,
    pub avatar_data_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSection {
    pub enabled: BTreeMap<String, bool>,
}

/// Module payloads are opaque to the document; each container decides their
/// shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulesSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSection {
    /// `light` or `dark`.
    pub mode: String,
    pub vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub kind: BackupKind,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub user: UserSection,
    pub settings: SettingsSection,
    pub modules: ModulesSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeSection>,
}

impl BackupDocument {
    /// Pretty-printed UTF-8 JSON, the on-disk form.
    pub fn to_pretty_json(&self) -> BackupResult<String> {
        serde_json::to_string_pretty(self).map_err(BackupError::Encode)
    }

    /// `grayframe-{kind}-backup-YYYY-MM-DD-HH-MM-SS.json`, from `created_at`.
    pub fn suggested_file_name(&self) -> String {
        format!(
            "grayframe-{}-backup-{}.json",
            self.kind,
            self.created_at.format("%Y-%m-%d-%H-%M-%S")
        )
    }
}
