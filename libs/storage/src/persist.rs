//! Persistence plugin.
//!
//! Binds every registered container to the [`DurableStore`]:
//!
//! 1. hydrate once from the stored snapshot (never fatal, never retried)
//! 2. watch for mutations and save the full state after a quiet window
//!
//! Each container gets one detached task that owns both steps, so a save can
//! never flush before that container's hydration has been applied or
//! abandoned. Saves for different containers are independent.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::container::{Registry, Revision, StateContainer};
use crate::kv::{DurableStore, WriteOutcome};

/// Result of hydrating one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrateOutcome {
    /// Stored snapshot merged into the container.
    Restored,
    /// Nothing stored; defaults kept.
    Empty,
    /// Stored value was not an object; defaults kept.
    Malformed,
    /// Stored snapshot did not fit the container; defaults kept.
    Rejected,
    /// The container was mutated before the stored snapshot arrived. The
    /// local state is kept and will overwrite the stored one.
    Superseded,
}

/// Per-container debounce state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveSchedule {
    /// No save pending.
    Idle,
    /// A save fires at `deadline` unless another mutation pushes it back.
    Pending { deadline: Instant },
}

impl SaveSchedule {
    /// A mutation arrived: (re)start the quiet window.
    pub fn on_change(&mut self, now: Instant, window: Duration) {
        *self = Self::Pending {
            deadline: now + window,
        };
    }

    /// The save fired.
    pub fn on_flush(&mut self) {
        *self = Self::Idle;
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Self::Idle => None,
            Self::Pending { deadline } => Some(*deadline),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Installs hydration and autosave on containers.
#[derive(Clone)]
pub struct PersistencePlugin {
    store: Arc<DurableStore>,
    debounce: Duration,
}

impl PersistencePlugin {
    /// Create a plugin saving to `store` after `debounce` of quiet.
    pub fn new(store: Arc<DurableStore>, debounce: Duration) -> Self {
        Self { store, debounce }
    }

    /// Load the stored snapshot for `container` and merge it in.
    pub async fn hydrate(&self, container: &dyn StateContainer) -> HydrateOutcome {
        let baseline = *container.subscribe().borrow();
        self.hydrate_since(container, baseline).await
    }

    /// Hydrate unless `container` has moved past revision `baseline`.
    ///
    /// Local mutations are newer than anything in storage, so they win and
    /// the stored snapshot is discarded.
    async fn hydrate_since(
        &self,
        container: &dyn StateContainer,
        baseline: Revision,
    ) -> HydrateOutcome {
        let key = container.id();

        let Some(saved) = self.store.get(key).await else {
            debug!(container = key, "Nothing stored, keeping defaults");
            return HydrateOutcome::Empty;
        };

        if !saved.is_object() {
            warn!(container = key, "Stored state is not an object, keeping defaults");
            return HydrateOutcome::Malformed;
        }

        let current = *container.subscribe().borrow();
        if current != baseline {
            warn!(
                container = key,
                baseline,
                current,
                "Container changed before hydration, discarding stored state"
            );
            return HydrateOutcome::Superseded;
        }

        match container.patch(saved) {
            Ok(()) => {
                debug!(container = key, "Hydrated container");
                HydrateOutcome::Restored
            }
            Err(e) => {
                error!(container = key, error = %e, "Hydrate failed, keeping defaults");
                HydrateOutcome::Rejected
            }
        }
    }

    /// Hydrate and start autosave for every container in `registry`.
    pub fn install(&self, registry: &Registry) -> PersistenceHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (pending_tx, pending_rx) = watch::channel(registry.len());
        let pending_tx = Arc::new(pending_tx);

        let tasks = registry
            .iter()
            .map(|container| {
                let worker = AutosaveWorker {
                    store: Arc::clone(&self.store),
                    container: Arc::clone(container),
                    debounce: self.debounce,
                    last_saved: None,
                };
                let plugin = self.clone();
                let pending_tx = Arc::clone(&pending_tx);
                let shutdown_rx = shutdown_rx.clone();
                // Subscribed here, not in the task, so a mutation made right
                // after install is both detected and saved.
                let changes = container.subscribe();
                let baseline = *changes.borrow();

                tokio::spawn(async move {
                    plugin
                        .hydrate_since(worker.container.as_ref(), baseline)
                        .await;
                    pending_tx.send_modify(|n| *n = n.saturating_sub(1));
                    worker.run(changes, shutdown_rx).await;
                })
            })
            .collect();

        info!(
            containers = registry.len(),
            debounce_ms = self.debounce.as_millis() as u64,
            "Persistence installed"
        );

        PersistenceHandle {
            tasks,
            shutdown: shutdown_tx,
            pending_hydrations: pending_rx,
        }
    }
}

/// Autosave loop state for one container.
struct AutosaveWorker {
    store: Arc<DurableStore>,
    container: Arc<dyn StateContainer>,
    debounce: Duration,
    /// Last snapshot that reached storage, to skip identical rewrites.
    last_saved: Option<Value>,
}

impl AutosaveWorker {
    async fn run(
        mut self,
        mut changes: watch::Receiver<Revision>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut schedule = SaveSchedule::Idle;
        // Dropping the handle without shutdown leaves autosave running.
        let mut detached = false;

        loop {
            if !detached && *shutdown.borrow() {
                break;
            }

            match schedule.deadline() {
                None => {
                    tokio::select! {
                        changed = changes.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            schedule.on_change(Instant::now(), self.debounce);
                        }
                        res = shutdown.changed(), if !detached => match res {
                            Ok(()) => break,
                            Err(_) => detached = true,
                        },
                    }
                }
                Some(deadline) => {
                    tokio::select! {
                        changed = changes.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            schedule.on_change(Instant::now(), self.debounce);
                        }
                        _ = tokio::time::sleep_until(deadline) => {
                            self.save().await;
                            schedule.on_flush();
                        }
                        res = shutdown.changed(), if !detached => match res {
                            Ok(()) => break,
                            Err(_) => detached = true,
                        },
                    }
                }
            }
        }

        // Flush whatever the debounce was still holding.
        if schedule.is_pending() || changes.has_changed().unwrap_or(false) {
            self.save().await;
        }
        debug!(container = self.container.id(), "Autosave stopped");
    }

    /// Snapshot the state as it is now and write it.
    async fn save(&mut self) {
        let key = self.container.id();

        let snapshot = match self.container.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(container = key, error = %e, "Snapshot failed, skipping save");
                return;
            }
        };

        if self.last_saved.as_ref() == Some(&snapshot) {
            debug!(container = key, "State unchanged since last save");
            return;
        }

        match self.store.set(key, &snapshot).await {
            WriteOutcome::Dropped => {
                error!(container = key, "Save failed, state kept in memory only");
            }
            outcome => {
                debug!(container = key, ?outcome, "Saved container");
                self.last_saved = Some(snapshot);
            }
        }
    }
}

/// Running persistence tasks.
pub struct PersistenceHandle {
    tasks: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
    pending_hydrations: watch::Receiver<usize>,
}

impl PersistenceHandle {
    /// Wait until every container has been hydrated (or given up on).
    pub async fn hydrated(&self) {
        let mut pending = self.pending_hydrations.clone();
        // Err means every task has exited, which also ends hydration.
        let _ = pending.wait_for(|n| *n == 0).await;
    }

    /// Flush pending saves and stop all autosave tasks.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Autosave task panicked");
            }
        }
        info!("Persistence stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::error::StorageResult;
    use crate::kv::{KvBackend, StringStore};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory backend that records every write.
    #[derive(Default)]
    struct RecordingBackend {
        entries: Mutex<BTreeMap<String, Value>>,
        writes: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingBackend {
        fn writes_for(&self, key: &str) -> Vec<Value> {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .collect()
        }
    }

    #[async_trait]
    impl KvBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &Value) -> StorageResult<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.clone());
            self.writes
                .lock()
                .unwrap()
                .push((key.to_string(), value.clone()));
            Ok(())
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn clear(&self) -> StorageResult<()> {
            self.entries.lock().unwrap().clear();
            Ok(())
        }

        async fn keys(&self) -> StorageResult<Vec<String>> {
            Ok(self.entries.lock().unwrap().keys().cloned().collect())
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Draft {
        title: String,
        words: u32,
    }

    /// Container whose snapshot always fails.
    struct Unserializable;

    impl StateContainer for Unserializable {
        fn id(&self) -> &str {
            "broken"
        }

        fn snapshot(&self) -> Result<Value, crate::ContainerError> {
            let mut bad = BTreeMap::new();
            bad.insert((1, 2), 3);
            serde_json::to_value(bad).map_err(|source| crate::ContainerError::Serialize {
                id: "broken".into(),
                source,
            })
        }

        fn patch(&self, _partial: Value) -> Result<(), crate::ContainerError> {
            Ok(())
        }

        fn subscribe(&self) -> watch::Receiver<Revision> {
            watch::channel(0).1
        }
    }

    fn setup() -> (Arc<RecordingBackend>, Arc<DurableStore>) {
        let backend = Arc::new(RecordingBackend::default());
        let store = Arc::new(DurableStore::new(
            backend.clone(),
            Arc::new(StringStore::in_memory("gf:", 1024)),
        ));
        (backend, store)
    }

    #[test]
    fn test_schedule_transitions() {
        let now = Instant::now();
        let mut schedule = SaveSchedule::Idle;
        assert_eq!(schedule.deadline(), None);

        schedule.on_change(now, Duration::from_millis(150));
        assert_eq!(schedule.deadline(), Some(now + Duration::from_millis(150)));

        schedule.on_change(now + Duration::from_millis(50), Duration::from_millis(150));
        assert_eq!(schedule.deadline(), Some(now + Duration::from_millis(200)));

        schedule.on_flush();
        assert!(!schedule.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_mutations_saves_once_with_final_state() {
        let (backend, store) = setup();
        let draft = Arc::new(Container::new("draft", Draft::default()));

        let mut registry = Registry::new();
        registry.register(draft.clone()).unwrap();

        let plugin = PersistencePlugin::new(store, Duration::from_millis(150));
        let handle = plugin.install(&registry);
        handle.hydrated().await;

        for title in ["a", "ab", "abc"] {
            draft.update(|d| d.title = title.to_string());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(backend.writes_for("draft").is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let writes = backend.writes_for("draft");
        assert_eq!(writes, vec![json!({"title": "abc", "words": 0})]);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_hydrate_restores_and_merges_defaults() {
        let (backend, store) = setup();
        backend
            .set("draft", &json!({"title": "saved"}))
            .await
            .unwrap();
        backend.writes.lock().unwrap().clear();

        let draft = Arc::new(Container::new(
            "draft",
            Draft {
                title: String::new(),
                words: 7,
            },
        ));
        let mut registry = Registry::new();
        registry.register(draft.clone()).unwrap();

        let handle = PersistencePlugin::new(store, Duration::from_millis(150)).install(&registry);
        handle.hydrated().await;

        assert_eq!(
            draft.get(),
            Draft {
                title: "saved".into(),
                words: 7
            }
        );
        handle.shutdown().await;
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Checklist {
        items: Vec<String>,
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_before_hydration_is_kept_and_saved() {
        let (backend, store) = setup();
        backend
            .set("checklist", &json!({"items": ["stored"]}))
            .await
            .unwrap();
        backend.writes.lock().unwrap().clear();

        let checklist = Arc::new(Container::new("checklist", Checklist::default()));
        let mut registry = Registry::new();
        registry.register(checklist.clone()).unwrap();

        let handle = PersistencePlugin::new(store, Duration::from_millis(150)).install(&registry);
        checklist.update(|c| c.items.push("fresh".into()));
        handle.hydrated().await;

        assert_eq!(checklist.get().items, vec!["fresh".to_string()]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            backend.writes_for("checklist"),
            vec![json!({"items": ["fresh"]})]
        );
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_hydrate_outcomes() {
        let (backend, store) = setup();
        let plugin = PersistencePlugin::new(store, Duration::from_millis(150));
        let draft = Container::new("draft", Draft::default());

        assert_eq!(plugin.hydrate(&draft).await, HydrateOutcome::Empty);

        backend.set("draft", &json!([1, 2])).await.unwrap();
        assert_eq!(plugin.hydrate(&draft).await, HydrateOutcome::Malformed);

        backend.set("draft", &json!({"words": "many"})).await.unwrap();
        assert_eq!(plugin.hydrate(&draft).await, HydrateOutcome::Rejected);
        assert_eq!(draft.get(), Draft::default());

        backend.set("draft", &json!({"words": 3})).await.unwrap();
        assert_eq!(plugin.hydrate(&draft).await, HydrateOutcome::Restored);
        assert_eq!(draft.get().words, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_save() {
        let (backend, store) = setup();
        let draft = Arc::new(Container::new("draft", Draft::default()));
        let mut registry = Registry::new();
        registry.register(draft.clone()).unwrap();

        let handle = PersistencePlugin::new(store, Duration::from_secs(60)).install(&registry);
        handle.hydrated().await;

        draft.update(|d| d.words = 42);
        tokio::task::yield_now().await;
        handle.shutdown().await;

        assert_eq!(
            backend.writes_for("draft"),
            vec![json!({"title": "", "words": 42})]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_failure_skips_save() {
        let (backend, store) = setup();
        let plugin = PersistencePlugin::new(store, Duration::from_millis(150));

        let mut worker = AutosaveWorker {
            store: Arc::clone(&plugin.store),
            container: Arc::new(Unserializable),
            debounce: plugin.debounce,
            last_saved: None,
        };
        worker.save().await;

        assert!(backend.writes_for("broken").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_state_is_not_rewritten() {
        let (backend, store) = setup();
        let draft = Arc::new(Container::new("draft", Draft::default()));
        let mut registry = Registry::new();
        registry.register(draft.clone()).unwrap();

        let handle = PersistencePlugin::new(store, Duration::from_millis(150)).install(&registry);
        handle.hydrated().await;

        draft.update(|d| d.words = 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        draft.update(|d| d.words = 1);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(backend.writes_for("draft").len(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_saves_survive_fallback() {
        let store = Arc::new(DurableStore::new(
            Arc::new(crate::kv::UnavailableBackend),
            Arc::new(StringStore::in_memory("gf:", 1024)),
        ));
        let draft = Arc::new(Container::new("draft", Draft::default()));
        let mut registry = Registry::new();
        registry.register(draft.clone()).unwrap();

        let handle =
            PersistencePlugin::new(Arc::clone(&store), Duration::from_millis(150)).install(&registry);
        handle.hydrated().await;

        draft.update(|d| d.title = "offline".into());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(
            store.fallback().get("draft"),
            Some(json!({"title": "offline", "words": 0}))
        );
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_outlives_dropped_handle() {
        let (backend, store) = setup();
        let draft = Arc::new(Container::new("draft", Draft::default()));
        let mut registry = Registry::new();
        registry.register(draft.clone()).unwrap();

        let handle = PersistencePlugin::new(store, Duration::from_millis(150)).install(&registry);
        handle.hydrated().await;
        drop(handle);

        draft.update(|d| d.title = "still saved".into());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(
            backend.writes_for("draft"),
            vec![json!({"title": "still saved", "words": 0})]
        );
    }
}
