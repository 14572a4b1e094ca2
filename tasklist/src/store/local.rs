//! In-process task store.
//!
//! Keeps tasks in an insertion-ordered `Vec` behind a mutex. Every write
//! applies immediately, bumps the revision, and returns the resulting
//! [`Snapshot`] so the caller can show it without a round trip. The same
//! snapshot is also pushed to live subscribers.

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::mpsc;

use tasklist_proto::task::{LOCAL_OWNER_ID, Task, TaskDraft, TaskId, TaskPatch};

use super::{BackendKind, Snapshot, StoreError, Subscription, TaskStore, WriteOutcome, now_ms};

/// Task store backed by process memory. No ownership filtering.
#[derive(Default)]
pub struct LocalStore {
    state: Mutex<LocalState>,
}

#[derive(Default)]
struct LocalState {
    tasks: Vec<Task>,
    revision: u64,
    subscribers: Vec<mpsc::UnboundedSender<Snapshot>>,
}

impl LocalState {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            scope: None,
            revision: self.revision,
            tasks: self.tasks.clone(),
        }
    }

    /// Bumps the revision and pushes the new state to live subscribers,
    /// pruning the ones that have been dropped.
    fn commit(&mut self) -> Snapshot {
        self.revision += 1;
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|tx| tx.send(snapshot.clone()).is_ok());
        snapshot
    }
}

impl LocalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Returns `true` if the store holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().tasks.is_empty()
    }

    /// Generates a `<millis>-<hex>` id for a task created at `timestamp`.
    fn generate_id(timestamp: u64) -> TaskId {
        let suffix: u64 = rand::rng().random();
        TaskId::new(format!("{timestamp}-{suffix:x}"))
    }
}

impl TaskStore for LocalStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn requires_identity(&self) -> bool {
        false
    }

    fn subscribe(&self, _owner: Option<&str>) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        // Receiver is alive, so the initial send cannot fail.
        let _ = tx.send(state.snapshot());
        state.subscribers.push(tx);
        drop(state);
        Ok(Subscription::new(None, rx))
    }

    async fn create(
        &self,
        _owner: Option<&str>,
        draft: TaskDraft,
    ) -> Result<WriteOutcome, StoreError> {
        let timestamp = now_ms();
        let task = Task::from_draft(
            Self::generate_id(timestamp),
            draft,
            timestamp,
            Some(LOCAL_OWNER_ID.to_string()),
        );
        tracing::debug!(task_id = %task.id, "local task created");

        let mut state = self.state.lock();
        state.tasks.push(task);
        Ok(WriteOutcome::Applied(state.commit()))
    }

    async fn update(
        &self,
        _owner: Option<&str>,
        id: &TaskId,
        patch: TaskPatch,
    ) -> Result<WriteOutcome, StoreError> {
        let mut state = self.state.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        task.apply(&patch);
        Ok(WriteOutcome::Applied(state.commit()))
    }

    async fn delete(&self, _owner: Option<&str>, id: &TaskId) -> Result<WriteOutcome, StoreError> {
        let mut state = self.state.lock();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != *id);
        if state.tasks.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(WriteOutcome::Applied(state.commit()))
    }
}
