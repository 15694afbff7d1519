//! Theme store: light/dark mode plus named color variables.

use std::collections::BTreeMap;
use std::sync::Arc;

use grayframe_storage::{Container, ContainerError, Revision, StateContainer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    fn other(&self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Variables that follow the mode when the user has not customized them.
const SURFACE_VARS: &[&str] = &[
    "bg",
    "panel",
    "panelSubtle",
    "panelElev",
    "text",
    "textMuted",
    "border",
];

const LIGHT_VARS: &[(&str, &str)] = &[
    ("brandPrimary", "#2F2F33"),
    ("brandSecondary", "#B1B6C1"),
    ("accent", "#3EC9C7"),
    ("accentContrast", "#0E1A1A"),
    ("bg", "#F5F6F8"),
    ("panel", "#FFFFFF"),
    ("panelSubtle", "#F0F2F5"),
    ("panelElev", "#FFFFFF"),
    ("text", "#2F2F33"),
    ("textMuted", "#6B7079"),
    ("border", "#D9DCE2"),
    ("ok", "#30B16F"),
    ("warn", "#E8A23B"),
    ("danger", "#DF5B57"),
];

const DARK_VARS: &[(&str, &str)] = &[
    ("brandPrimary", "#2F2F33"),
    ("brandSecondary", "#B1B6C1"),
    ("accent", "#3EC9C7"),
    ("accentContrast", "#0A1515"),
    ("bg", "#1F1F21"),
    ("panel", "#2F2F33"),
    ("panelSubtle", "#242427"),
    ("panelElev", "#2B2B2E"),
    ("text", "#EDEDED"),
    ("textMuted", "#A0A0A0"),
    ("border", "#3A3A3D"),
    ("ok", "#30B16F"),
    ("warn", "#E8A23B"),
    ("danger", "#DF5B57"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeState {
    pub mode: ThemeMode,
    /// Variable name to CSS color.
    pub vars: BTreeMap<String, String>,
}

impl ThemeState {
    /// Stock palette for `mode`.
    pub fn defaults(mode: ThemeMode) -> Self {
        let table = match mode {
            ThemeMode::Light => LIGHT_VARS,
            ThemeMode::Dark => DARK_VARS,
        };
        Self {
            mode,
            vars: table
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Default for ThemeState {
    fn default() -> Self {
        Self::defaults(ThemeMode::default())
    }
}

#[derive(Clone)]
pub struct ThemeStore {
    state: Arc<Container<ThemeState>>,
}

impl ThemeStore {
    pub const ID: &'static str = "theme";

    pub fn new() -> Self {
        Self {
            state: Arc::new(Container::new(Self::ID, ThemeState::default())),
        }
    }

    pub fn container(&self) -> Arc<dyn StateContainer> {
        Arc::new(self.clone())
    }

    pub fn get(&self) -> ThemeState {
        self.state.get()
    }

    pub fn mode(&self) -> ThemeMode {
        self.state.read(|s| s.mode)
    }

    /// Switch mode. Surface colors still at the previous mode's stock value
    /// follow the new mode; customized colors are kept.
    pub fn set_mode(&self, mode: ThemeMode) {
        let next = ThemeState::defaults(mode);
        let prev = ThemeState::defaults(mode.other());
        self.state.update(|s| {
            s.mode = mode;
            for key in SURFACE_VARS {
                if s.vars.get(*key) == prev.vars.get(*key) {
                    if let Some(value) = next.vars.get(*key) {
                        s.vars.insert(key.to_string(), value.clone());
                    }
                }
            }
        });
    }

    pub fn set_var(&self, key: &str, value: impl Into<String>) {
        let (key, value) = (key.to_string(), value.into());
        self.state.update(|s| {
            s.vars.insert(key, value);
        });
    }

    /// Restore the stock palette for `mode`, or for the current mode.
    pub fn reset(&self, mode: Option<ThemeMode>) {
        let mode = mode.unwrap_or_else(|| self.mode());
        self.state.replace(ThemeState::defaults(mode));
    }

    pub fn import_theme(&self, theme: ThemeState) {
        self.state.replace(theme);
    }
}

impl Default for ThemeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateContainer for ThemeStore {
    fn id(&self) -> &str {
        self.state.id()
    }

    fn snapshot(&self) -> Result<Value, ContainerError> {
        self.state.snapshot()
    }

    /// A patch carrying only a known `mode` switches mode like
    /// [`ThemeStore::set_mode`]; anything else merges as usual.
    fn patch(&self, partial: Value) -> Result<(), ContainerError> {
        let mode_only = partial
            .as_object()
            .filter(|fields| fields.len() == 1)
            .and_then(|fields| fields.get("mode"))
            .and_then(Value::as_str)
            .and_then(ThemeMode::parse);

        match mode_only {
            Some(mode) => {
                self.set_mode(mode);
                Ok(())
            }
            None => self.state.patch(partial),
        }
    }

    fn subscribe(&self) -> watch::Receiver<Revision> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_set_mode_swaps_stock_surfaces_only() {
        let store = ThemeStore::new();
        store.set_var("panel", "#123456");

        store.set_mode(ThemeMode::Light);
        let state = store.get();
        assert_eq!(state.mode, ThemeMode::Light);
        assert_eq!(state.vars["bg"], "#F5F6F8");
        assert_eq!(state.vars["panel"], "#123456");
        // Not a surface variable
        assert_eq!(state.vars["accentContrast"], "#0A1515");
    }

    #[test]
    fn test_reset() {
        let store = ThemeStore::new();
        store.set_var("accent", "#000000");
        store.reset(Some(ThemeMode::Light));
        assert_eq!(store.get(), ThemeState::defaults(ThemeMode::Light));
    }

    #[test]
    fn test_mode_only_patch_swaps_surfaces() {
        let store = ThemeStore::new();
        store.set_var("panel", "#123456");

        store
            .container()
            .patch(serde_json::json!({"mode": "light"}))
            .unwrap();
        let state = store.get();
        assert_eq!(state.mode, ThemeMode::Light);
        assert_eq!(state.vars["bg"], "#F5F6F8");
        assert_eq!(state.vars["panel"], "#123456");

        store
            .container()
            .patch(serde_json::json!({"mode": "dark", "vars": {"bg": "#000000"}}))
            .unwrap();
        assert_eq!(store.get().vars["bg"], "#000000");
    }

    #[rstest]
    #[case("light", Some(ThemeMode::Light))]
    #[case("dark", Some(ThemeMode::Dark))]
    #[case("Dark", None)]
    #[case("sepia", None)]
    fn test_mode_parse(#[case] input: &str, #[case] expected: Option<ThemeMode>) {
        assert_eq!(ThemeMode::parse(input), expected);
    }
}
