//! In-process document collection.
//!
//! Behaves like the hosted task collection: JSON documents keyed by
//! server-assigned time-ordered ids, server timestamps on create and update,
//! owner-only write rules, and owner-filtered live queries that re-run after
//! every change. An outage switch makes every request fail with
//! [`CollectionError::Unavailable`].

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use uuid::Uuid;

use tasklist_proto::record::{ServerTimestamp, from_document, to_document};
use tasklist_proto::task::{TaskId, TaskPatch};

use super::{
    CollectionError, DocumentCollection, DocumentSnapshot, ListenerRegistration, QuerySnapshot,
    SnapshotListener,
};
use crate::store::now_ms;

/// Document collection held in process memory.
#[derive(Default)]
pub struct MemoryCollection {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    documents: BTreeMap<TaskId, serde_json::Value>,
    listeners: BTreeMap<u64, Listener>,
    next_listener_id: u64,
    sequence: u64,
    offline: bool,
    /// Write requests that reached the service (accepted or rejected).
    writes: u64,
}

struct Listener {
    owner: String,
    callback: SnapshotListener,
}

fn owner_of(document: &serde_json::Value) -> Option<&str> {
    document.get("ownerId").and_then(serde_json::Value::as_str)
}

impl Inner {
    fn ensure_online(&self) -> Result<(), CollectionError> {
        if self.offline {
            Err(CollectionError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn query(&mut self, owner: &str) -> QuerySnapshot {
        self.sequence += 1;
        QuerySnapshot {
            sequence: self.sequence,
            read_time: ServerTimestamp::from_millis(now_ms()),
            documents: self
                .documents
                .iter()
                .filter(|(_, doc)| owner_of(doc) == Some(owner))
                .map(|(id, doc)| DocumentSnapshot {
                    id: id.clone(),
                    data: doc.clone(),
                })
                .collect(),
        }
    }

    /// Re-runs the query for `owner` and delivers it to every listener
    /// scoped to that owner.
    fn notify(&mut self, owner: &str) {
        if !self.listeners.values().any(|l| l.owner == owner) {
            return;
        }
        let snapshot = self.query(owner);
        for listener in self.listeners.values().filter(|l| l.owner == owner) {
            (listener.callback)(snapshot.clone());
        }
    }

    fn check_owner(document: &serde_json::Value, caller: &str) -> Result<(), CollectionError> {
        if owner_of(document) == Some(caller) {
            Ok(())
        } else {
            Err(CollectionError::PermissionDenied)
        }
    }
}

impl MemoryCollection {
    /// Creates an empty, online collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a service outage (`true`) or recovery (`false`).
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Writes a document directly, bypassing access rules, as another device
    /// or an administrator would. Live queries for the affected owners are
    /// re-run.
    pub fn insert_raw(&self, id: TaskId, document: serde_json::Value) {
        let mut inner = self.inner.lock();
        let new_owner = owner_of(&document).map(str::to_string);
        let old_owner = inner
            .documents
            .insert(id, document)
            .and_then(|old| owner_of(&old).map(str::to_string));
        if let Some(owner) = &old_owner
            && old_owner != new_owner
        {
            inner.notify(owner);
        }
        if let Some(owner) = &new_owner {
            inner.notify(owner);
        }
    }

    /// Deletes a document directly, bypassing access rules.
    pub fn remove_raw(&self, id: &TaskId) {
        let mut inner = self.inner.lock();
        if let Some(owner) = inner
            .documents
            .remove(id)
            .and_then(|old| owner_of(&old).map(str::to_string))
        {
            inner.notify(&owner);
        }
    }

    /// Returns a copy of a stored document.
    #[must_use]
    pub fn document(&self, id: &TaskId) -> Option<serde_json::Value> {
        self.inner.lock().documents.get(id).cloned()
    }

    /// Number of stored documents across all owners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().documents.len()
    }

    /// Returns `true` if no documents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().documents.is_empty()
    }

    /// Number of write requests received so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.lock().writes
    }

    /// Number of live queries currently registered.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    fn unregister(inner: &Weak<Mutex<Inner>>, listener_id: u64) {
        if let Some(inner) = inner.upgrade() {
            inner.lock().listeners.remove(&listener_id);
            tracing::debug!(listener_id, "live query unregistered");
        }
    }
}

impl DocumentCollection for MemoryCollection {
    async fn add(&self, caller: &str, document: serde_json::Value) -> Result<TaskId, CollectionError> {
        let mut inner = self.inner.lock();
        inner.ensure_online()?;
        inner.writes += 1;
        Inner::check_owner(&document, caller)?;

        let mut record = from_document(document)?;
        record.created_at = Some(ServerTimestamp::from_millis(now_ms()));
        let id = TaskId::new(Uuid::now_v7().simple().to_string());
        inner.documents.insert(id.clone(), to_document(&record)?);
        inner.notify(caller);
        Ok(id)
    }

    async fn update(
        &self,
        caller: &str,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<(), CollectionError> {
        let mut inner = self.inner.lock();
        inner.ensure_online()?;
        inner.writes += 1;
        let document = inner
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| CollectionError::NotFound(id.clone()))?;
        Inner::check_owner(&document, caller)?;

        let mut record = from_document(document)?;
        record.apply(patch, ServerTimestamp::from_millis(now_ms()));
        inner.documents.insert(id.clone(), to_document(&record)?);
        inner.notify(caller);
        Ok(())
    }

    async fn delete(&self, caller: &str, id: &TaskId) -> Result<(), CollectionError> {
        let mut inner = self.inner.lock();
        inner.ensure_online()?;
        inner.writes += 1;
        let Some(document) = inner.documents.get(id) else {
            return Ok(());
        };
        Inner::check_owner(document, caller)?;

        inner.documents.remove(id);
        inner.notify(caller);
        Ok(())
    }

    fn listen(
        &self,
        owner: &str,
        listener: SnapshotListener,
    ) -> Result<ListenerRegistration, CollectionError> {
        let mut inner = self.inner.lock();
        inner.ensure_online()?;

        let listener_id = inner.next_listener_id;
        inner.next_listener_id += 1;
        let initial = inner.query(owner);
        listener(initial);
        inner.listeners.insert(
            listener_id,
            Listener {
                owner: owner.to_string(),
                callback: listener,
            },
        );
        drop(inner);
        tracing::debug!(listener_id, owner, "live query registered");

        let weak = Arc::downgrade(&self.inner);
        Ok(ListenerRegistration::new(move || {
            Self::unregister(&weak, listener_id);
        }))
    }
}
