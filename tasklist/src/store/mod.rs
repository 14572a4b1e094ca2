//! Task store abstraction for `Tasklist`.
//!
//! Defines the [`TaskStore`] trait that both backends satisfy:
//! - [`local::LocalStore`]: in-process list; writes apply synchronously and
//!   hand back the resulting snapshot
//! - [`remote::RemoteStore`]: hosted document collection; writes are only
//!   requests, confirmed later through the live subscription
//!
//! Exactly one backend is chosen at startup and kept for the life of the
//! process. The reconciliation engine only ever talks to this trait.

pub mod local;
pub mod remote;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use tasklist_proto::record::CodecError;
use tasklist_proto::task::{Task, TaskDraft, TaskId, TaskPatch};

use crate::cloud::CollectionError;

/// Which backend a store talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process list, no identity required.
    Local,
    /// Hosted document collection scoped by owner.
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "cloud"),
        }
    }
}

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend requires an owner and none was given.
    #[error("not signed in")]
    Unauthenticated,

    /// No task with this id exists in the backend.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The backend refused the write for this owner.
    #[error("permission denied")]
    PermissionDenied,

    /// The backend could not be reached.
    #[error("backend unavailable")]
    Unavailable,

    /// A stored document could not be converted.
    #[error("record codec error: {0}")]
    Codec(#[from] CodecError),
}

impl From<CollectionError> for StoreError {
    fn from(err: CollectionError) -> Self {
        match err {
            CollectionError::NotFound(id) => Self::NotFound(id),
            CollectionError::PermissionDenied => Self::PermissionDenied,
            CollectionError::Unavailable => Self::Unavailable,
            CollectionError::Codec(e) => Self::Codec(e),
        }
    }
}

/// A complete, point-in-time replacement list of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Owner filter this snapshot was produced for (`None` for the local
    /// backend).
    pub scope: Option<String>,
    /// Strictly increasing within one subscription.
    pub revision: u64,
    /// Every task in scope, in backend iteration order.
    pub tasks: Vec<Task>,
}

/// What a write did to the backend's visible state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write is already visible; this is the resulting snapshot.
    Applied(Snapshot),
    /// The write was accepted and will show up through the subscription.
    Pending,
}

/// A live feed of [`Snapshot`]s for one owner scope.
///
/// Dropping the subscription cancels it synchronously: the backend
/// registration is removed and any undelivered snapshots are discarded
/// together with the receiver.
pub struct Subscription {
    scope: Option<String>,
    rx: mpsc::UnboundedReceiver<Snapshot>,
    /// Backend-side registration, removed on drop.
    _registration: Option<Box<dyn Send>>,
}

impl Subscription {
    /// Wraps a snapshot receiver with no backend registration attached.
    #[must_use]
    pub const fn new(scope: Option<String>, rx: mpsc::UnboundedReceiver<Snapshot>) -> Self {
        Self {
            scope,
            rx,
            _registration: None,
        }
    }

    /// Wraps a snapshot receiver and keeps `registration` alive until the
    /// subscription is dropped.
    #[must_use]
    pub fn with_registration(
        scope: Option<String>,
        rx: mpsc::UnboundedReceiver<Snapshot>,
        registration: impl Send + 'static,
    ) -> Self {
        Self {
            scope,
            rx,
            _registration: Some(Box::new(registration)),
        }
    }

    /// Feed for nobody: one empty snapshot, then silence. Opens nothing on
    /// the backend.
    #[must_use]
    pub fn signed_out() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is held right here, so the send cannot fail.
        let _ = tx.send(Snapshot {
            scope: None,
            revision: 0,
            tasks: Vec::new(),
        });
        Self::with_registration(None, rx, tx)
    }

    /// Owner filter of this subscription.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Waits for the next snapshot. Returns `None` once the backend side
    /// has gone away.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Returns the next snapshot if one is already queued.
    pub fn try_recv(&mut self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Uniform create/update/delete/subscribe contract over both backends.
///
/// `owner` is the id of the signed-in identity, or `None` when nobody is
/// signed in. Backends that [require an identity](TaskStore::requires_identity)
/// reject writes without one.
pub trait TaskStore: Send + Sync {
    /// Return the kind of this store.
    fn kind(&self) -> BackendKind;

    /// Whether every operation must be scoped to a signed-in owner.
    fn requires_identity(&self) -> bool;

    /// Open a live feed of full snapshots for `owner`.
    ///
    /// The first snapshot is delivered immediately with the current state.
    /// Backends that require an identity answer `owner == None` with
    /// [`Subscription::signed_out`] instead of opening a backend query.
    fn subscribe(&self, owner: Option<&str>) -> Result<Subscription, StoreError>;

    /// Create a task from a sanitized draft.
    fn create(
        &self,
        owner: Option<&str>,
        draft: TaskDraft,
    ) -> impl std::future::Future<Output = Result<WriteOutcome, StoreError>> + Send;

    /// Apply a partial update to an existing task.
    fn update(
        &self,
        owner: Option<&str>,
        id: &TaskId,
        patch: TaskPatch,
    ) -> impl std::future::Future<Output = Result<WriteOutcome, StoreError>> + Send;

    /// Remove a task.
    fn delete(
        &self,
        owner: Option<&str>,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<WriteOutcome, StoreError>> + Send;
}

/// Returns the current timestamp in milliseconds since epoch.
pub(crate) fn now_ms() -> u64 {
    u64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
    )
    .unwrap_or(u64::MAX)
}
