//! Task store backed by a hosted [`DocumentCollection`].
//!
//! Writes are forwarded as requests and report [`WriteOutcome::Pending`]:
//! nothing becomes visible until the owner-scoped live query echoes the
//! change back as a new [`Snapshot`].

use std::sync::Arc;

use tokio::sync::mpsc;

use tasklist_proto::record::{TaskRecord, from_document, to_document};
use tasklist_proto::task::{TaskDraft, TaskId, TaskPatch};

use super::{BackendKind, Snapshot, StoreError, Subscription, TaskStore, WriteOutcome, now_ms};
use crate::cloud::{DocumentCollection, QuerySnapshot};

/// Cloud task store. Every operation is scoped to the signed-in owner.
pub struct RemoteStore<C> {
    collection: Arc<C>,
}

impl<C: DocumentCollection> RemoteStore<C> {
    /// Creates a store over a shared collection handle.
    #[must_use]
    pub const fn new(collection: Arc<C>) -> Self {
        Self { collection }
    }

    /// The underlying collection.
    #[must_use]
    pub const fn collection(&self) -> &Arc<C> {
        &self.collection
    }
}

/// Converts a query result into a snapshot for `owner`.
///
/// Documents that do not decode are skipped and logged. Documents without
/// any creation time fall back to the query's read time.
fn to_snapshot(owner: &str, query: QuerySnapshot) -> Snapshot {
    let read_ms = query.read_time.to_millis();
    let tasks = query
        .documents
        .into_iter()
        .filter_map(|doc| match from_document(doc.data) {
            Ok(record) => Some(record.to_task(doc.id, read_ms)),
            Err(e) => {
                tracing::warn!(doc_id = %doc.id, error = %e, "skipping malformed task document");
                None
            }
        })
        .collect();
    Snapshot {
        scope: Some(owner.to_string()),
        revision: query.sequence,
        tasks,
    }
}

impl<C: DocumentCollection> TaskStore for RemoteStore<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn requires_identity(&self) -> bool {
        true
    }

    fn subscribe(&self, owner: Option<&str>) -> Result<Subscription, StoreError> {
        let Some(owner) = owner else {
            tracing::debug!("no identity; serving an empty task list");
            return Ok(Subscription::signed_out());
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let scope = owner.to_string();
        let registration = self.collection.listen(
            owner,
            Box::new(move |query| {
                // Receiver gone means the subscription is being torn down.
                let _ = tx.send(to_snapshot(&scope, query));
            }),
        )?;
        tracing::info!(owner, "task subscription established");
        Ok(Subscription::with_registration(
            Some(owner.to_string()),
            rx,
            registration,
        ))
    }

    async fn create(&self, owner: Option<&str>, draft: TaskDraft) -> Result<WriteOutcome, StoreError> {
        let owner = owner.ok_or(StoreError::Unauthenticated)?;
        let record = TaskRecord::new(&draft, owner, now_ms());
        let id = self.collection.add(owner, to_document(&record)?).await?;
        tracing::debug!(task_id = %id, "create request accepted");
        Ok(WriteOutcome::Pending)
    }

    async fn update(
        &self,
        owner: Option<&str>,
        id: &TaskId,
        patch: TaskPatch,
    ) -> Result<WriteOutcome, StoreError> {
        let owner = owner.ok_or(StoreError::Unauthenticated)?;
        self.collection.update(owner, id, &patch).await?;
        tracing::debug!(task_id = %id, "update request accepted");
        Ok(WriteOutcome::Pending)
    }

    async fn delete(&self, owner: Option<&str>, id: &TaskId) -> Result<WriteOutcome, StoreError> {
        let owner = owner.ok_or(StoreError::Unauthenticated)?;
        self.collection.delete(owner, id).await?;
        tracing::debug!(task_id = %id, "delete request accepted");
        Ok(WriteOutcome::Pending)
    }
}
