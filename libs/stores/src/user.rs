//! User profile store.

use std::sync::Arc;

use grayframe_storage::{Container, StateContainer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserState {
    /// May be empty while the user is editing it.
    pub display_name: String,
    /// Avatar image as a data URL.
    pub avatar_data_url: Option<String>,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            display_name: "Creator".to_string(),
            avatar_data_url: None,
        }
    }
}

/// Store for the local user's profile.
#[derive(Clone)]
pub struct UserStore {
    state: Arc<Container<UserState>>,
}

impl UserStore {
    pub const ID: &'static str = "userState";

    pub fn new() -> Self {
        Self {
            state: Arc::new(Container::new(Self::ID, UserState::default())),
        }
    }

    pub fn container(&self) -> Arc<dyn StateContainer> {
        self.state.clone()
    }

    pub fn get(&self) -> UserState {
        self.state.get()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.state.update(|s| s.display_name = name);
    }

    pub fn set_avatar(&self, data_url: Option<String>) {
        self.state.update(|s| s.avatar_data_url = data_url);
    }

    pub fn clear_avatar(&self) {
        self.set_avatar(None);
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}
