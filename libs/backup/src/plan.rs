//! Import plans.
//!
//! A document is parsed completely into an [`ImportPlan`] before any
//! container is touched. Structural problems with the document as a whole
//! are errors; a field of the wrong type is skipped and counted.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::document::{BackupKind, ThemeSection, BACKUP_VERSION};
use crate::error::{BackupError, BackupResult};
use crate::normalize::module_items;
use crate::theme::string_entries;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AvatarChange {
    Keep,
    Set(String),
    Clear,
}

/// Validated changes extracted from a backup document.
#[derive(Debug, Clone)]
pub(crate) struct ImportPlan {
    pub kind: BackupKind,
    pub legacy: bool,
    pub version: Option<String>,
    pub display_name: Option<String>,
    pub avatar: AvatarChange,
    pub enabled: BTreeMap<String, bool>,
    pub notes: Option<Vec<Value>>,
    pub tasks: Option<Vec<Value>>,
    pub theme: Option<ThemeSection>,
    /// Fields dropped because their type was wrong.
    pub skipped: usize,
}

pub(crate) type Normalizer = fn(&Value, i64) -> Option<Value>;

impl ImportPlan {
    pub(crate) fn empty(kind: BackupKind, legacy: bool) -> Self {
        Self {
            kind,
            legacy,
            version: None,
            display_name: None,
            avatar: AvatarChange::Keep,
            enabled: BTreeMap::new(),
            notes: None,
            tasks: None,
            theme: None,
            skipped: 0,
        }
    }

    pub(crate) fn parse(text: &str, now_ms: i64) -> BackupResult<Self> {
        let value: Value = serde_json::from_str(text).map_err(BackupError::InvalidJson)?;
        Self::from_value(value, now_ms)
    }

    pub(crate) fn from_value(value: Value, now_ms: i64) -> BackupResult<Self> {
        let Value::Object(doc) = value else {
            return Err(BackupError::NotAnObject);
        };

        match doc.get("kind") {
            Some(Value::String(tag)) => {
                let kind =
                    BackupKind::parse(tag).ok_or_else(|| BackupError::UnknownKind(tag.clone()))?;
                Ok(Self::tagged(kind, &doc, now_ms))
            }
            Some(other) => Err(BackupError::UnknownKind(other.to_string())),
            None => match doc.get("stores") {
                Some(Value::Object(stores)) => Ok(Self::from_legacy(&doc, stores, now_ms)),
                _ => Err(BackupError::MissingKind),
            },
        }
    }

    fn tagged(kind: BackupKind, doc: &Map<String, Value>, now_ms: i64) -> Self {
        let mut plan = Self::empty(kind, false);
        plan.read_version(doc.get("version"));
        plan.read_user(doc.get("user"));
        plan.read_enabled(doc.get("settings").and_then(|s| s.get("enabled")));

        let modules = doc.get("modules");
        plan.notes = plan.read_module(
            modules.and_then(|m| m.get("notes")),
            crate::normalize::normalize_note,
            now_ms,
        );
        plan.tasks = plan.read_module(
            modules.and_then(|m| m.get("tasks")),
            crate::normalize::normalize_task,
            now_ms,
        );

        if kind == BackupKind::Full {
            plan.read_theme(doc.get("theme"));
        }
        plan
    }

    pub(crate) fn read_version(&mut self, raw: Option<&Value>) {
        self.version = match raw {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        if let Some(version) = &self.version {
            if version != &BACKUP_VERSION.to_string() {
                debug!(%version, current = BACKUP_VERSION, "Importing backup from another version");
            }
        }
    }

    pub(crate) fn read_user(&mut self, raw: Option<&Value>) {
        let Some(raw) = raw else { return };
        let Some(user) = raw.as_object() else {
            self.skipped += 1;
            return;
        };

        match user.get("displayName") {
            Some(Value::String(name)) => self.display_name = Some(name.clone()),
            Some(_) => self.skipped += 1,
            None => {}
        }
        match user.get("avatarDataUrl") {
            Some(Value::String(url)) => self.avatar = AvatarChange::Set(url.clone()),
            Some(Value::Null) => self.avatar = AvatarChange::Clear,
            Some(_) => self.skipped += 1,
            None => {}
        }
    }

    pub(crate) fn read_enabled(&mut self, raw: Option<&Value>) {
        let Some(raw) = raw else { return };
        let Some(entries) = raw.as_object() else {
            self.skipped += 1;
            return;
        };

        for (module, flag) in entries {
            match flag.as_bool() {
                Some(flag) => {
                    self.enabled.insert(module.clone(), flag);
                }
                None => self.skipped += 1,
            }
        }
    }

    pub(crate) fn read_module(
        &mut self,
        raw: Option<&Value>,
        normalize: Normalizer,
        now_ms: i64,
    ) -> Option<Vec<Value>> {
        let raw = raw?;
        let Some(items) = module_items(raw) else {
            self.skipped += 1;
            return None;
        };

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match normalize(item, now_ms) {
                Some(record) => records.push(record),
                None => self.skipped += 1,
            }
        }
        Some(records)
    }

    fn read_theme(&mut self, raw: Option<&Value>) {
        let Some(raw) = raw else { return };
        let mode = raw.get("mode").and_then(Value::as_str);
        let vars = raw.get("vars").and_then(Value::as_object);

        match (mode, vars) {
            (Some(mode @ ("light" | "dark")), Some(vars)) => {
                self.theme = Some(ThemeSection {
                    mode: mode.to_string(),
                    vars: string_entries(vars),
                });
            }
            _ => self.skipped += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 42;

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            ImportPlan::parse("not json", NOW),
            Err(BackupError::InvalidJson(_))
        ));
        assert!(matches!(
            ImportPlan::parse("[1, 2]", NOW),
            Err(BackupError::NotAnObject)
        ));
        assert!(matches!(
            ImportPlan::parse(r#"{"version": 1}"#, NOW),
            Err(BackupError::MissingKind)
        ));
        assert!(matches!(
            ImportPlan::parse(r#"{"kind": "partial"}"#, NOW),
            Err(BackupError::UnknownKind(kind)) if kind == "partial"
        ));
        assert!(matches!(
            ImportPlan::parse(r#"{"kind": 2}"#, NOW),
            Err(BackupError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_wrong_field_types_are_skipped() {
        let plan = ImportPlan::from_value(
            json!({
                "kind": "core",
                "version": 99,
                "user": {"displayName": 5, "avatarDataUrl": null},
                "settings": {"enabled": {"notes": false, "tasks": "yes", "calendar": true}},
                "modules": {"notes": "oops", "tasks": [{"title": "a"}, 3]}
            }),
            NOW,
        )
        .unwrap();

        assert_eq!(plan.version.as_deref(), Some("99"));
        assert_eq!(plan.display_name, None);
        assert_eq!(plan.avatar, AvatarChange::Clear);
        assert_eq!(
            plan.enabled,
            BTreeMap::from([("calendar".to_string(), true), ("notes".to_string(), false)])
        );
        assert!(plan.notes.is_none());
        assert_eq!(plan.tasks.as_ref().map(Vec::len), Some(1));
        // displayName, tasks flag, notes payload, task entry
        assert_eq!(plan.skipped, 4);
    }

    #[test]
    fn test_theme_read_only_for_full_documents() {
        let theme = json!({"mode": "light", "vars": {"bg": "#FFF"}});

        let core = ImportPlan::from_value(json!({"kind": "core", "theme": theme}), NOW).unwrap();
        assert!(core.theme.is_none());

        let full = ImportPlan::from_value(json!({"kind": "full", "theme": theme}), NOW).unwrap();
        assert_eq!(full.theme.unwrap().mode, "light");

        let bad = ImportPlan::from_value(
            json!({"kind": "full", "theme": {"mode": "blue", "vars": {}}}),
            NOW,
        )
        .unwrap();
        assert!(bad.theme.is_none());
        assert_eq!(bad.skipped, 1);
    }

    #[test]
    fn test_absent_sections_stay_absent() {
        let plan = ImportPlan::from_value(json!({"kind": "core"}), NOW).unwrap();
        assert_eq!(plan.avatar, AvatarChange::Keep);
        assert!(plan.display_name.is_none());
        assert!(plan.enabled.is_empty());
        assert!(plan.notes.is_none());
        assert!(plan.tasks.is_none());
        assert_eq!(plan.skipped, 0);
    }
}
