//! # grayframe-stores
//!
//! The application's state containers. Each store owns its actions; the
//! persistence plugin and the backup engine see them only through
//! [`grayframe_storage::StateContainer`].
//!
//! | id               | store                 |
//! |------------------|-----------------------|
//! | `userState`      | [`UserStore`]         |
//! | `moduleSettings` | [`ModuleSettingsStore`] |
//! | `notes`          | [`NotesStore`]        |
//! | `tasks`          | [`TasksStore`]        |
//! | `theme`          | [`ThemeStore`]        |

mod notes;
mod settings;
mod tasks;
mod theme;
mod user;

use std::sync::Arc;

use grayframe_storage::{ContainerError, Registry};

pub use notes::{Note, NotePatch, NotesState, NotesStats, NotesStore};
pub use settings::{ModuleSettings, ModuleSettingsStore};
pub use tasks::{NewTask, Task, TaskPatch, TaskStatus, TasksState, TasksStats, TasksStore};
pub use theme::{ThemeMode, ThemeState, ThemeStore};
pub use user::{UserState, UserStore};

/// Current time in epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Every store the application uses.
#[derive(Clone)]
pub struct AppStores {
    pub user: UserStore,
    pub settings: ModuleSettingsStore,
    pub notes: NotesStore,
    pub tasks: Arc<TasksStore>,
    pub theme: ThemeStore,
}

impl AppStores {
    /// Create all stores with default state.
    pub fn new() -> Self {
        Self {
            user: UserStore::new(),
            settings: ModuleSettingsStore::new(),
            notes: NotesStore::new(),
            tasks: Arc::new(TasksStore::new()),
            theme: ThemeStore::new(),
        }
    }

    /// Build the registry handed to persistence and backup.
    pub fn registry(&self) -> Result<Registry, ContainerError> {
        let mut registry = Registry::new();
        registry.register(self.user.container())?;
        registry.register(self.settings.container())?;
        registry.register(self.notes.container())?;
        registry.register(self.tasks.clone())?;
        registry.register(self.theme.container())?;
        Ok(registry)
    }
}

impl Default for AppStores {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_holds_every_store() {
        let stores = AppStores::new();
        let registry = stores.registry().unwrap();
        assert_eq!(
            registry.ids(),
            vec!["moduleSettings", "notes", "tasks", "theme", "userState"]
        );
        assert!(registry.get("tasks").unwrap().serializable().is_some());
        assert!(registry.get("notes").unwrap().serializable().is_none());
    }
}
