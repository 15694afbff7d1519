//! Export and import against a container registry.

use std::path::{Path, PathBuf};

use chrono::Utc;
use grayframe_storage::{Registry, StateContainer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::document::{
    BackupDocument, BackupKind, ModulesSection, SettingsSection, ThemeSection, UserSection,
    BACKUP_VERSION,
};
use crate::error::{BackupError, BackupResult};
use crate::plan::{AvatarChange, ImportPlan};

/// Registry ids of the containers a backup covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerIds {
    pub user: String,
    pub settings: String,
    pub notes: String,
    pub tasks: String,
    pub theme: String,
}

impl Default for ContainerIds {
    fn default() -> Self {
        Self {
            user: "userState".to_string(),
            settings: "moduleSettings".to_string(),
            notes: "notes".to_string(),
            tasks: "tasks".to_string(),
            theme: "theme".to_string(),
        }
    }
}

/// Which parts of a document an import may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// User data only. A theme block is ignored.
    Core,
    /// User data, plus the theme when the document is `kind = "full"`.
    Full,
}

/// What an import changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub kind: BackupKind,
    /// The document was an untagged store dump.
    pub legacy: bool,
    pub version: Option<String>,
    pub user_applied: bool,
    /// Number of module toggles applied.
    pub settings_applied: usize,
    /// Notes now in the container, if the document carried notes.
    pub notes_imported: Option<usize>,
    /// Tasks now in the container, if the document carried tasks.
    pub tasks_imported: Option<usize>,
    pub theme_applied: bool,
    /// Fields or records dropped for having the wrong shape.
    pub skipped_fields: usize,
}

/// Builds and restores backup documents.
///
/// The engine never touches storage. Imported state reaches disk through the
/// containers' normal autosave.
pub struct BackupEngine<'r> {
    registry: &'r Registry,
    ids: ContainerIds,
}

impl<'r> BackupEngine<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_ids(registry, ContainerIds::default())
    }

    pub fn with_ids(registry: &'r Registry, ids: ContainerIds) -> Self {
        Self { registry, ids }
    }

    pub fn export_core(&self) -> BackupResult<BackupDocument> {
        self.export(BackupKind::Core)
    }

    pub fn export_full(&self) -> BackupResult<BackupDocument> {
        self.export(BackupKind::Full)
    }

    pub fn export(&self, kind: BackupKind) -> BackupResult<BackupDocument> {
        let user: UserSection = self.section(&self.ids.user)?;
        let settings: SettingsSection = self.section(&self.ids.settings)?;
        let modules = ModulesSection {
            notes: self.module(&self.ids.notes)?,
            tasks: self.module(&self.ids.tasks)?,
        };
        let theme: Option<ThemeSection> = match kind {
            BackupKind::Full => Some(self.section(&self.ids.theme)?),
            BackupKind::Core => None,
        };

        debug!(%kind, "Exported backup");
        Ok(BackupDocument {
            kind,
            version: BACKUP_VERSION,
            created_at: Utc::now(),
            user,
            settings,
            modules,
            theme,
        })
    }

    /// Export and write the document atomically.
    ///
    /// If `path` is a directory the document gets its suggested file name
    /// inside it. Returns the written path.
    pub async fn export_to_file(&self, kind: BackupKind, path: &Path) -> BackupResult<PathBuf> {
        let document = self.export(kind)?;
        let json = document.to_pretty_json()?;

        let target = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => path.join(document.suggested_file_name()),
            _ => path.to_path_buf(),
        };
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = target.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes()).await?;
        tokio::fs::rename(&tmp, &target).await?;

        info!(path = %target.display(), %kind, "Wrote backup");
        Ok(target)
    }

    pub fn import_core(&self, text: &str) -> BackupResult<ImportReport> {
        self.import_str(text, ImportMode::Core)
    }

    pub fn import_full(&self, text: &str) -> BackupResult<ImportReport> {
        self.import_str(text, ImportMode::Full)
    }

    pub fn import_str(&self, text: &str, mode: ImportMode) -> BackupResult<ImportReport> {
        let plan = ImportPlan::parse(text, now_ms())?;
        Ok(self.apply(plan, mode))
    }

    pub fn import_value(&self, value: Value, mode: ImportMode) -> BackupResult<ImportReport> {
        let plan = ImportPlan::from_value(value, now_ms())?;
        Ok(self.apply(plan, mode))
    }

    pub async fn import_file(&self, path: &Path, mode: ImportMode) -> BackupResult<ImportReport> {
        let text = tokio::fs::read_to_string(path).await?;
        self.import_str(&text, mode)
    }

    fn container(&self, id: &str) -> BackupResult<&dyn StateContainer> {
        self.registry
            .get(id)
            .map(|c| c.as_ref())
            .ok_or_else(|| BackupError::MissingContainer(id.to_string()))
    }

    /// Container state in its export shape.
    fn snapshot(container: &dyn StateContainer) -> BackupResult<Value> {
        let value = match container.serializable() {
            Some(hooks) => hooks.to_snapshot()?,
            None => container.snapshot()?,
        };
        Ok(value)
    }

    fn section<T: DeserializeOwned>(&self, id: &str) -> BackupResult<T> {
        let value = Self::snapshot(self.container(id)?)?;
        serde_json::from_value(value).map_err(|source| BackupError::Snapshot {
            id: id.to_string(),
            source,
        })
    }

    /// Module payloads are optional; an unregistered module is left out.
    fn module(&self, id: &str) -> BackupResult<Option<Value>> {
        match self.registry.get(id) {
            Some(container) => Self::snapshot(container.as_ref()).map(Some),
            None => Ok(None),
        }
    }

    fn apply(&self, plan: ImportPlan, mode: ImportMode) -> ImportReport {
        let mut report = ImportReport {
            kind: plan.kind,
            legacy: plan.legacy,
            version: plan.version,
            user_applied: false,
            settings_applied: 0,
            notes_imported: None,
            tasks_imported: None,
            theme_applied: false,
            skipped_fields: plan.skipped,
        };

        let mut user = Map::new();
        if let Some(name) = plan.display_name {
            user.insert("displayName".into(), name.into());
        }
        match plan.avatar {
            AvatarChange::Set(url) => {
                user.insert("avatarDataUrl".into(), url.into());
            }
            AvatarChange::Clear => {
                user.insert("avatarDataUrl".into(), Value::Null);
            }
            AvatarChange::Keep => {}
        }
        if !user.is_empty() {
            report.user_applied = self.patch(&self.ids.user, Value::Object(user), &mut report);
        }

        if !plan.enabled.is_empty() {
            let count = plan.enabled.len();
            if self.patch(&self.ids.settings, json!({ "enabled": plan.enabled }), &mut report) {
                report.settings_applied = count;
            }
        }

        if let Some(items) = plan.notes {
            let count = items.len();
            if self.restore(&self.ids.notes, items, &mut report) {
                report.notes_imported = Some(count);
            }
        }
        if let Some(items) = plan.tasks {
            let count = items.len();
            if self.restore(&self.ids.tasks, items, &mut report) {
                report.tasks_imported = Some(count);
            }
        }

        // Plans only carry a theme for full documents and legacy dumps.
        match (mode, plan.theme) {
            (ImportMode::Full, Some(theme)) => {
                let partial = if theme.vars.is_empty() {
                    json!({ "mode": theme.mode })
                } else {
                    json!({ "mode": theme.mode, "vars": theme.vars })
                };
                report.theme_applied = self.patch(&self.ids.theme, partial, &mut report);
            }
            (ImportMode::Core, Some(_)) => {
                debug!("Core import ignores the theme block");
            }
            (_, None) => {}
        }

        info!(
            kind = %report.kind,
            legacy = report.legacy,
            notes = ?report.notes_imported,
            tasks = ?report.tasks_imported,
            theme = report.theme_applied,
            skipped = report.skipped_fields,
            "Imported backup"
        );
        report
    }

    fn patch(&self, id: &str, partial: Value, report: &mut ImportReport) -> bool {
        let Some(container) = self.registry.get(id) else {
            warn!(container = id, "Container not registered, section skipped");
            report.skipped_fields += 1;
            return false;
        };
        match container.patch(partial) {
            Ok(()) => true,
            Err(error) => {
                warn!(container = id, %error, "Section rejected, skipped");
                report.skipped_fields += 1;
                false
            }
        }
    }

    /// Replace a module's records, through its own hooks when it has them.
    fn restore(&self, id: &str, items: Vec<Value>, report: &mut ImportReport) -> bool {
        let Some(container) = self.registry.get(id) else {
            warn!(container = id, "Container not registered, module skipped");
            report.skipped_fields += 1;
            return false;
        };
        let payload = json!({ "items": items });
        let result = match container.serializable() {
            Some(hooks) => hooks.from_snapshot(payload),
            None => container.patch(payload),
        };
        match result {
            Ok(()) => true,
            Err(error) => {
                warn!(container = id, %error, "Module rejected, skipped");
                report.skipped_fields += 1;
                false
            }
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use grayframe_storage::Container;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Items {
        items: Vec<Value>,
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(Container::new(
                "userState",
                json!({"displayName": "Creator", "avatarDataUrl": null}),
            )))
            .unwrap();
        registry
            .register(Arc::new(Container::new(
                "moduleSettings",
                json!({"enabled": {"notes": true}}),
            )))
            .unwrap();
        registry
            .register(Arc::new(Container::new("notes", Items::default())))
            .unwrap();
        registry
    }

    #[test]
    fn test_missing_modules_are_left_out_of_export() {
        let registry = registry();
        let document = BackupEngine::new(&registry).export_core().unwrap();
        assert!(document.modules.notes.is_some());
        assert!(document.modules.tasks.is_none());
    }

    #[test]
    fn test_full_export_requires_theme_container() {
        let registry = registry();
        let err = BackupEngine::new(&registry).export_full().unwrap_err();
        assert!(matches!(err, BackupError::MissingContainer(id) if id == "theme"));
    }

    #[test]
    fn test_import_into_unregistered_module_is_skipped() {
        let registry = registry();
        let report = BackupEngine::new(&registry)
            .import_value(
                json!({"kind": "core", "modules": {"tasks": [{"title": "t"}]}}),
                ImportMode::Core,
            )
            .unwrap();
        assert_eq!(report.tasks_imported, None);
        assert_eq!(report.skipped_fields, 1);
    }

    #[test]
    fn test_snapshot_shape_mismatch() {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(Container::new("userState", json!("not a user"))))
            .unwrap();
        let err = BackupEngine::new(&registry).export_core().unwrap_err();
        assert!(matches!(err, BackupError::Snapshot { .. }));
    }
}
