//! Tasks store.
//!
//! Unlike the other stores, tasks define their own export shape through
//! [`Serializable`]: `{"items": [...]}` out, and either that object or a bare
//! array of tasks in.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use grayframe_id::TaskId;
use grayframe_storage::{Container, ContainerError, Revision, Serializable, StateContainer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::now_ms;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Doing => "doing",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "doing" => Ok(Self::Doing),
            "done" => Ok(Self::Done),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<i64>,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksState {
    pub items: Vec<Task>,
}

/// Input for [`TasksStore::create`].
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub status: Option<TaskStatus>,
    pub due_at: Option<i64>,
}

/// Fields a task edit may change.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub due_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksStats {
    pub total: usize,
    pub open: usize,
    pub next_due: Option<DateTime<Utc>>,
}

pub struct TasksStore {
    state: Container<TasksState>,
}

impl TasksStore {
    pub const ID: &'static str = "tasks";

    pub fn new() -> Self {
        Self {
            state: Container::new(Self::ID, TasksState::default()),
        }
    }

    pub fn items(&self) -> Vec<Task> {
        self.state.read(|s| s.items.clone())
    }

    pub fn count(&self) -> usize {
        self.state.read(|s| s.items.len())
    }

    pub fn open_count(&self) -> usize {
        self.state
            .read(|s| s.items.iter().filter(|t| t.status != TaskStatus::Done).count())
    }

    pub fn done_count(&self) -> usize {
        self.count() - self.open_count()
    }

    /// Tasks, most recently updated first.
    pub fn by_updated_desc(&self) -> Vec<Task> {
        let mut items = self.items();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        items
    }

    /// Create a task and return its id.
    pub fn create(&self, new: NewTask) -> String {
        let now = now_ms();
        let task = Task {
            id: TaskId::new().to_string(),
            title: new.title,
            status: new.status.unwrap_or_default(),
            due_at: new.due_at,
            created_at: now,
            updated_at: now,
        };
        let id = task.id.clone();
        self.state.update(|s| s.items.push(task));
        id
    }

    /// Edit a task. Returns false if no task has `id`.
    pub fn update(&self, id: &str, patch: TaskPatch) -> bool {
        self.state.update(|s| {
            let Some(task) = s.items.iter_mut().find(|t| t.id == id) else {
                return false;
            };
            if let Some(title) = patch.title {
                task.title = title;
            }
            if let Some(status) = patch.status {
                task.status = status;
            }
            if patch.due_at.is_some() {
                task.due_at = patch.due_at;
            }
            task.updated_at = now_ms();
            true
        })
    }

    pub fn set_status(&self, id: &str, status: TaskStatus) -> bool {
        self.update(
            id,
            TaskPatch {
                status: Some(status),
                ..TaskPatch::default()
            },
        )
    }

    /// Remove a task. Returns false if no task has `id`.
    pub fn remove(&self, id: &str) -> bool {
        self.state.update(|s| {
            let before = s.items.len();
            s.items.retain(|t| t.id != id);
            s.items.len() != before
        })
    }

    pub fn clear(&self) {
        self.state.replace(TasksState::default());
    }

    pub fn stats(&self) -> TasksStats {
        self.state.read(|s| TasksStats {
            total: s.items.len(),
            open: s
                .items
                .iter()
                .filter(|t| t.status != TaskStatus::Done)
                .count(),
            next_due: s
                .items
                .iter()
                .filter_map(|t| t.due_at)
                .min()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        })
    }
}

impl Default for TasksStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateContainer for TasksStore {
    fn id(&self) -> &str {
        self.state.id()
    }

    fn snapshot(&self) -> Result<Value, ContainerError> {
        self.state.snapshot()
    }

    fn patch(&self, partial: Value) -> Result<(), ContainerError> {
        self.state.patch(partial)
    }

    fn subscribe(&self) -> watch::Receiver<Revision> {
        self.state.subscribe()
    }

    fn serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl Serializable for TasksStore {
    fn to_snapshot(&self) -> Result<Value, ContainerError> {
        self.state.snapshot()
    }

    fn from_snapshot(&self, snapshot: Value) -> Result<(), ContainerError> {
        let items = match snapshot {
            Value::Array(items) => Value::Array(items),
            Value::Object(mut map) => map.remove("items").unwrap_or(Value::Array(Vec::new())),
            other => other,
        };

        let items: Vec<Task> =
            serde_json::from_value(items).map_err(|source| ContainerError::Patch {
                id: Self::ID.to_string(),
                source,
            })?;
        self.state.replace(TasksState { items });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counts_and_status() {
        let store = TasksStore::new();
        let a = store.create(NewTask {
            title: "write".into(),
            ..NewTask::default()
        });
        store.create(NewTask {
            title: "ship".into(),
            status: Some(TaskStatus::Doing),
            due_at: Some(5_000),
        });

        assert_eq!(store.count(), 2);
        assert_eq!(store.open_count(), 2);

        assert!(store.set_status(&a, TaskStatus::Done));
        assert_eq!(store.done_count(), 1);
        assert_eq!(
            store.stats(),
            TasksStats {
                total: 2,
                open: 1,
                next_due: Utc.timestamp_millis_opt(5_000).single(),
            }
        );
    }

    #[test]
    fn test_from_snapshot_accepts_array_or_object() {
        let store = TasksStore::new();
        let task = json!({
            "id": "t1", "title": "x", "status": "doing",
            "createdAt": 1, "updatedAt": 2
        });

        store.from_snapshot(json!([task.clone()])).unwrap();
        assert_eq!(store.items()[0].status, TaskStatus::Doing);

        store.from_snapshot(json!({"items": []})).unwrap();
        assert_eq!(store.count(), 0);

        store.from_snapshot(json!({"items": [task]})).unwrap();
        assert_eq!(store.count(), 1);

        let err = store.from_snapshot(json!("nope")).unwrap_err();
        assert!(matches!(err, ContainerError::Patch { .. }));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_snapshot_omits_missing_due_date() {
        let store = TasksStore::new();
        store.create(NewTask {
            title: "x".into(),
            ..NewTask::default()
        });
        let snapshot = store.to_snapshot().unwrap();
        assert!(snapshot["items"][0].get("dueAt").is_none());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("doing".parse::<TaskStatus>(), Ok(TaskStatus::Doing));
        assert!("Doing".parse::<TaskStatus>().is_err());
    }
}
