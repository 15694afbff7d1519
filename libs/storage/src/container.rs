//! State containers.
//!
//! A container is a named, mutable, JSON-serializable state blob with a
//! change subscription and a bulk-patch entry point. Persistence and
//! backup only ever talk to containers through [`StateContainer`].

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::ContainerError;

/// Monotonic change counter carried by container notifications.
pub type Revision = u64;

/// A persisted, exportable unit of application state.
pub trait StateContainer: Send + Sync {
    /// Stable, unique identifier. Doubles as the storage key.
    fn id(&self) -> &str;

    /// Full current state as plain JSON.
    fn snapshot(&self) -> Result<Value, ContainerError>;

    /// Merge a partial state into the current state as one atomic step.
    ///
    /// Objects merge key by key; arrays, scalars and `null` replace.
    /// If the merged result does not fit the container's shape, the current
    /// state is kept and an error is returned.
    fn patch(&self, partial: Value) -> Result<(), ContainerError>;

    /// Receiver that observes a new revision after every mutation.
    fn subscribe(&self) -> watch::Receiver<Revision>;

    /// Custom snapshot hooks, if the container has them.
    fn serializable(&self) -> Option<&dyn Serializable> {
        None
    }
}

/// Optional capability: a container-defined export/import shape.
pub trait Serializable: Send + Sync {
    /// Produce the container's export representation.
    fn to_snapshot(&self) -> Result<Value, ContainerError>;

    /// Restore the container from its export representation.
    fn from_snapshot(&self, snapshot: Value) -> Result<(), ContainerError>;
}

/// Merge `patch` into `target`.
///
/// Both sides must be objects for a key-by-key merge; anything else replaces
/// `target` wholesale.
pub fn merge_patch(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge_patch(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Generic container over a serde-typed state.
pub struct Container<S> {
    id: String,
    state: RwLock<S>,
    changes: watch::Sender<Revision>,
}

impl<S> Container<S>
where
    S: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Create a container holding `initial`.
    pub fn new(id: impl Into<String>, initial: S) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            id: id.into(),
            state: RwLock::new(initial),
            changes,
        }
    }

    /// Read the state through a closure.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Clone the current state.
    pub fn get(&self) -> S {
        self.read(S::clone)
    }

    /// Mutate the state and notify subscribers.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let result = {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        };
        self.notify();
        result
    }

    /// Replace the whole state and notify subscribers.
    pub fn replace(&self, next: S) {
        self.update(|state| *state = next);
    }

    /// Current revision.
    pub fn revision(&self) -> Revision {
        *self.changes.borrow()
    }

    fn notify(&self) {
        self.changes.send_modify(|rev| *rev += 1);
    }
}

impl<S> StateContainer for Container<S>
where
    S: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn snapshot(&self) -> Result<Value, ContainerError> {
        self.read(|state| serde_json::to_value(state))
            .map_err(|source| ContainerError::Serialize {
                id: self.id.clone(),
                source,
            })
    }

    fn patch(&self, partial: Value) -> Result<(), ContainerError> {
        {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);

            let mut merged =
                serde_json::to_value(&*guard).map_err(|source| ContainerError::Serialize {
                    id: self.id.clone(),
                    source,
                })?;
            merge_patch(&mut merged, partial);

            *guard = serde_json::from_value(merged).map_err(|source| ContainerError::Patch {
                id: self.id.clone(),
                source,
            })?;
        }
        self.notify();
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Revision> {
        self.changes.subscribe()
    }
}

/// Process-wide set of containers, keyed by id.
///
/// Built once at startup and handed to the persistence plugin and the backup
/// engine.
#[derive(Clone, Default)]
pub struct Registry {
    containers: BTreeMap<String, Arc<dyn StateContainer>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container. Ids must be unique.
    pub fn register(&mut self, container: Arc<dyn StateContainer>) -> Result<(), ContainerError> {
        let id = container.id().to_string();
        if self.containers.contains_key(&id) {
            return Err(ContainerError::DuplicateId(id));
        }
        self.containers.insert(id, container);
        Ok(())
    }

    /// Look up a container by id.
    pub fn get(&self, id: &str) -> Option<&Arc<dyn StateContainer>> {
        self.containers.get(id)
    }

    /// Iterate over containers in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn StateContainer>> {
        self.containers.values()
    }

    /// Registered ids in order.
    pub fn ids(&self) -> Vec<&str> {
        self.containers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("ids", &self.ids()).finish()
    }
}
