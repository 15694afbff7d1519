//! Standalone theme sharing as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BackupError, BackupResult};

/// A theme shared on its own, outside a backup document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeExport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub mode: String,
    pub vars: BTreeMap<String, String>,
}

pub fn serialize_theme(theme: &ThemeExport) -> BackupResult<String> {
    serde_json::to_string_pretty(theme).map_err(BackupError::Encode)
}

/// Parse a shared theme. `mode` must be `light` or `dark` and `vars` must be
/// present; non-string variables are dropped.
pub fn parse_theme(json: &str) -> BackupResult<ThemeExport> {
    let value: Value = serde_json::from_str(json).map_err(BackupError::InvalidJson)?;
    let Value::Object(map) = value else {
        return Err(BackupError::NotAnObject);
    };

    let mode = match map.get("mode").and_then(Value::as_str) {
        Some(mode @ ("light" | "dark")) => mode.to_string(),
        _ => return Err(BackupError::InvalidTheme("missing or bad `mode`")),
    };
    let Some(Value::Object(raw_vars)) = map.get("vars") else {
        return Err(BackupError::InvalidTheme("missing `vars`"));
    };

    Ok(ThemeExport {
        name: map.get("name").and_then(Value::as_str).map(str::to_string),
        mode,
        vars: string_entries(raw_vars),
    })
}

pub(crate) fn string_entries(map: &serde_json::Map<String, Value>) -> BTreeMap<String, String> {
    map.iter()
        .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
        .collect()
}
