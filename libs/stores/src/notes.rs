//! Notes store.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use grayframe_id::NoteId;
use grayframe_storage::{Container, StateContainer};
use serde::{Deserialize, Serialize};

use crate::now_ms;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesState {
    pub items: Vec<Note>,
}

/// Fields a note edit may change.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Summary shown on the settings page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesStats {
    pub count: usize,
    pub last_edited: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct NotesStore {
    state: Arc<Container<NotesState>>,
}

impl NotesStore {
    pub const ID: &'static str = "notes";

    pub fn new() -> Self {
        Self {
            state: Arc::new(Container::new(Self::ID, NotesState::default())),
        }
    }

    pub fn container(&self) -> Arc<dyn StateContainer> {
        self.state.clone()
    }

    pub fn items(&self) -> Vec<Note> {
        self.state.read(|s| s.items.clone())
    }

    pub fn count(&self) -> usize {
        self.state.read(|s| s.items.len())
    }

    /// Notes, most recently updated first.
    pub fn by_updated_desc(&self) -> Vec<Note> {
        let mut items = self.items();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        items
    }

    /// Create a note and return its id.
    pub fn create(&self, title: impl Into<String>, body: impl Into<String>) -> String {
        let now = now_ms();
        let note = Note {
            id: NoteId::new().to_string(),
            title: title.into(),
            body: body.into(),
            created_at: now,
            updated_at: now,
        };
        let id = note.id.clone();
        self.state.update(|s| s.items.push(note));
        id
    }

    /// Edit a note. Returns false if no note has `id`.
    pub fn update(&self, id: &str, patch: NotePatch) -> bool {
        self.state.update(|s| {
            let Some(note) = s.items.iter_mut().find(|n| n.id == id) else {
                return false;
            };
            if let Some(title) = patch.title {
                note.title = title;
            }
            if let Some(body) = patch.body {
                note.body = body;
            }
            note.updated_at = now_ms();
            true
        })
    }

    /// Remove a note. Returns false if no note has `id`.
    pub fn remove(&self, id: &str) -> bool {
        self.state.update(|s| {
            let before = s.items.len();
            s.items.retain(|n| n.id != id);
            s.items.len() != before
        })
    }

    /// Bump a note's `updatedAt`.
    pub fn touch(&self, id: &str, when: i64) {
        self.state.update(|s| {
            if let Some(note) = s.items.iter_mut().find(|n| n.id == id) {
                note.updated_at = when;
            }
        });
    }

    pub fn clear(&self) {
        self.state.replace(NotesState::default());
    }

    pub fn stats(&self) -> NotesStats {
        self.state.read(|s| NotesStats {
            count: s.items.len(),
            last_edited: s
                .items
                .iter()
                .map(|n| n.updated_at)
                .max()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        })
    }
}

impl Default for NotesStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crud() {
        let store = NotesStore::new();
        let id = store.create("Idea", "body");
        assert!(id.starts_with("note_"));
        assert_eq!(store.count(), 1);

        assert!(store.update(
            &id,
            NotePatch {
                title: Some("Better idea".into()),
                body: None,
            }
        ));
        let note = &store.items()[0];
        assert_eq!(note.title, "Better idea");
        assert_eq!(note.body, "body");

        assert!(!store.update("missing", NotePatch::default()));
        assert!(store.remove(&id));
        assert!(!store.remove(&id));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_stats_and_ordering() {
        let store = NotesStore::new();
        assert_eq!(
            store.stats(),
            NotesStats {
                count: 0,
                last_edited: None
            }
        );

        let a = store.create("a", "");
        let b = store.create("b", "");
        store.touch(&a, 2_000);
        store.touch(&b, 1_000);

        let ordered: Vec<_> = store.by_updated_desc().into_iter().map(|n| n.id).collect();
        assert_eq!(ordered, vec![a, b]);
        assert_eq!(
            store.stats().last_edited,
            Utc.timestamp_millis_opt(2_000).single()
        );
    }
}
