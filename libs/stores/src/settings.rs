//! Module enable/disable settings.

use std::collections::BTreeMap;
use std::sync::Arc;

use grayframe_storage::{Container, StateContainer};
use serde::{Deserialize, Serialize};

/// Modules enabled by default.
const DEFAULT_MODULES: &[&str] = &["notes", "tasks"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    /// Module id to enabled flag. Unknown ids are kept as-is.
    pub enabled: BTreeMap<String, bool>,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_MODULES
                .iter()
                .map(|id| (id.to_string(), true))
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct ModuleSettingsStore {
    state: Arc<Container<ModuleSettings>>,
}

impl ModuleSettingsStore {
    pub const ID: &'static str = "moduleSettings";

    pub fn new() -> Self {
        Self {
            state: Arc::new(Container::new(Self::ID, ModuleSettings::default())),
        }
    }

    pub fn container(&self) -> Arc<dyn StateContainer> {
        self.state.clone()
    }

    pub fn get(&self) -> ModuleSettings {
        self.state.get()
    }

    pub fn is_enabled(&self, module: &str) -> bool {
        self.state
            .read(|s| s.enabled.get(module).copied().unwrap_or(false))
    }

    pub fn set_enabled(&self, module: &str, enabled: bool) {
        let module = module.to_string();
        self.state.update(|s| {
            s.enabled.insert(module, enabled);
        });
    }

    pub fn reset(&self) {
        self.state.replace(ModuleSettings::default());
    }
}

impl Default for ModuleSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}
