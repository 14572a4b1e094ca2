//! Hosted document collection contract.
//!
//! The remote task store talks to the hosted service only through
//! [`DocumentCollection`]: schemaless JSON documents, server-assigned ids,
//! and owner-filtered live queries delivered to a callback. The service is
//! expected to enforce ownership on writes (a caller may only write
//! documents whose `ownerId` is its own uid).
//!
//! [`memory::MemoryCollection`] is an in-process implementation used by
//! tests and by the binary's cloud mode.

pub mod memory;

use std::fmt;

use tasklist_proto::record::{CodecError, ServerTimestamp};
use tasklist_proto::task::{TaskId, TaskPatch};

/// Errors reported by the document service.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    /// No document with this id.
    #[error("document not found: {0}")]
    NotFound(TaskId),

    /// The service's access rules rejected the request.
    #[error("permission denied")]
    PermissionDenied,

    /// The service could not be reached.
    #[error("service unavailable")]
    Unavailable,

    /// A stored document does not have the task shape.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// One document in a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// Service-assigned document id.
    pub id: TaskId,
    /// Raw document body.
    pub data: serde_json::Value,
}

/// Full result set of a live query at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    /// Service-wide sequence number, strictly increasing across deliveries.
    pub sequence: u64,
    /// When the service produced this result.
    pub read_time: ServerTimestamp,
    /// Every matching document.
    pub documents: Vec<DocumentSnapshot>,
}

/// Callback invoked with every query result.
///
/// Called while the service holds internal locks: it must not call back
/// into the collection.
pub type SnapshotListener = Box<dyn Fn(QuerySnapshot) + Send + Sync>;

/// Keeps a live query registered. Dropping it unregisters the listener
/// before returning; no callback fires afterwards.
pub struct ListenerRegistration {
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    /// Wraps the function that removes the listener.
    pub fn new(unregister: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unregister: Some(Box::new(unregister)),
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.unregister.is_some())
            .finish()
    }
}

/// A hosted collection of task documents.
pub trait DocumentCollection: Send + Sync {
    /// Add a document on behalf of `caller`. Returns the assigned id.
    fn add(
        &self,
        caller: &str,
        document: serde_json::Value,
    ) -> impl std::future::Future<Output = Result<TaskId, CollectionError>> + Send;

    /// Merge `patch` into an existing document owned by `caller`.
    fn update(
        &self,
        caller: &str,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl std::future::Future<Output = Result<(), CollectionError>> + Send;

    /// Delete a document owned by `caller`. Deleting a missing document
    /// succeeds.
    fn delete(
        &self,
        caller: &str,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), CollectionError>> + Send;

    /// Register a live query for documents with `ownerId == owner`.
    ///
    /// The listener receives the current result immediately and again after
    /// every change that affects it.
    fn listen(
        &self,
        owner: &str,
        listener: SnapshotListener,
    ) -> Result<ListenerRegistration, CollectionError>;
}
