//! Reconciliation engine for `Tasklist`.
//!
//! [`TaskEngine`] owns the single in-memory task view for a session. It
//! follows the identity provider, keeps exactly one store subscription
//! scoped to the current identity, replaces the view wholesale from each
//! accepted snapshot, and gates every mutation on validation and identity
//! before any backend call.
//!
//! Local writes come back as [`WriteOutcome::Applied`] and are shown at
//! once. Remote writes come back as [`WriteOutcome::Pending`] and are only
//! shown when the subscription echoes them; the view is never patched
//! optimistically.

pub mod dialog;
pub mod order;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use tasklist_proto::identity::{AuthErrorKind, Identity};
use tasklist_proto::task::{Task, TaskDraft, TaskId, TaskPatch, ValidationError};

use crate::auth::IdentityProvider;
use crate::auth::form::{AuthForm, AuthMode, credentials_acceptable};
use crate::store::{BackendKind, Snapshot, StoreError, Subscription, TaskStore, WriteOutcome};

pub use dialog::{DialogMode, DialogState};

/// Shown when a mutation is attempted in cloud mode without an identity.
pub const AUTH_REQUIRED_MESSAGE: &str = "Sign in to manage your tasks.";

/// Shown when sign-in is attempted with no auth service configured.
pub const AUTH_UNAVAILABLE_MESSAGE: &str =
    "Cannot reach the authentication service. Check your configuration.";

/// Errors returned by engine mutations.
#[derive(Debug, Error)]
pub enum MutationError {
    /// Input failed validation; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Cloud mode with nobody signed in; nothing was sent.
    #[error("sign-in required")]
    AuthRequired,

    /// The task is not in the current view.
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// The backend rejected or failed the request.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors returned by engine auth operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthFailure {
    /// No auth service is configured.
    #[error("authentication service unavailable")]
    Unavailable,

    /// Email or password failed the client-side check; nothing was sent.
    #[error("email and a password of at least 6 characters are required")]
    Incomplete,

    /// The auth service refused the request.
    #[error("auth rejected: {0}")]
    Rejected(#[from] AuthErrorKind),
}

/// Session state as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Local backend; always usable.
    Active,
    /// Cloud backend with nobody signed in.
    Unauthenticated,
    /// A sign-in or sign-up request is in flight.
    Authenticating,
    /// Cloud backend, signed in and subscribed.
    Authenticated,
}

/// What woke the engine in [`TaskEngine::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The identity changed; the view was cleared and resubscribed.
    IdentityChanged(Option<Identity>),
    /// A snapshot replaced the view.
    SnapshotApplied { revision: u64, tasks: usize },
    /// A snapshot was stale or for another scope and was dropped.
    SnapshotIgnored { revision: u64 },
    /// The backend closed the subscription.
    SubscriptionClosed,
}

enum Wake {
    Identity(bool),
    Snapshot(Option<Snapshot>),
}

/// Holds a flag up for as long as it lives.
struct PendingFlag<'a>(&'a mut bool);

impl<'a> PendingFlag<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for PendingFlag<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Waits on the subscription if there is one, otherwise never resolves.
async fn recv_snapshot(subscription: Option<&mut Subscription>) -> Option<Snapshot> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

/// Central state machine for one session.
pub struct TaskEngine<S, A> {
    store: Arc<S>,
    auth: Arc<A>,
    identity_rx: watch::Receiver<Option<Identity>>,
    identity_closed: bool,
    identity: Option<Identity>,
    subscription: Option<Subscription>,
    /// Display-ordered, deduplicated view.
    view: Vec<Task>,
    last_revision: Option<u64>,
    auth_pending: bool,
    auth_error: Option<String>,
    dialog: DialogState,
}

impl<S: TaskStore, A: IdentityProvider> TaskEngine<S, A> {
    /// Creates an engine over a store and an identity provider.
    ///
    /// The store is subscribed immediately for the current identity, which
    /// for the cloud backend may be nobody. Snapshots already queued by the
    /// backend are applied before returning.
    pub fn new(store: Arc<S>, auth: Arc<A>) -> Self {
        let mut identity_rx = auth.observe();
        let initial = identity_rx.borrow_and_update().clone();
        let mut engine = Self {
            store,
            auth,
            identity_rx,
            identity_closed: false,
            identity: None,
            subscription: None,
            view: Vec::new(),
            last_revision: None,
            auth_pending: false,
            auth_error: None,
            dialog: DialogState::default(),
        };
        tracing::info!(backend = %engine.store.kind(), "task engine started");
        engine.identity = initial;
        engine.resubscribe();
        engine.drain_pending();
        engine
    }

    // --- read-only surface ---

    /// Tasks in display order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.view
    }

    /// Looks a task up in the current view.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.view.iter().find(|t| t.id == *id)
    }

    /// Number of tasks not yet completed.
    #[must_use]
    pub fn incomplete_count(&self) -> usize {
        order::count_incomplete(&self.view)
    }

    /// Number of completed tasks.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        order::count_completed(&self.view)
    }

    /// Number of tasks in the view.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.view.len()
    }

    /// The signed-in identity, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Whether a sign-in or sign-up request is in flight.
    #[must_use]
    pub const fn is_auth_pending(&self) -> bool {
        self.auth_pending
    }

    /// Last message for the user, if not dismissed.
    #[must_use]
    pub fn auth_error(&self) -> Option<&str> {
        self.auth_error.as_deref()
    }

    /// Clears the last message.
    pub fn dismiss_auth_error(&mut self) {
        self.auth_error = None;
    }

    /// Current dialog state.
    #[must_use]
    pub const fn dialog(&self) -> &DialogState {
        &self.dialog
    }

    /// Which backend this session uses.
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.store.kind()
    }

    /// Whether the auth service is configured.
    #[must_use]
    pub fn auth_enabled(&self) -> bool {
        self.auth.is_enabled()
    }

    /// The store this engine writes to.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Revision of the last applied snapshot in the current scope.
    #[must_use]
    pub const fn last_revision(&self) -> Option<u64> {
        self.last_revision
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if !self.store.requires_identity() {
            SessionState::Active
        } else if self.auth_pending {
            SessionState::Authenticating
        } else if self.identity.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    // --- inbound events ---

    /// Waits for the next identity change or snapshot and applies it.
    ///
    /// Returns `None` once neither source can produce anything more.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        let watch_identity = !self.identity_closed;
        if !watch_identity && self.subscription.is_none() {
            return None;
        }
        let wake = {
            let identity_rx = &mut self.identity_rx;
            let subscription = self.subscription.as_mut();
            tokio::select! {
                changed = identity_rx.changed(), if watch_identity => Wake::Identity(changed.is_ok()),
                snapshot = recv_snapshot(subscription) => Wake::Snapshot(snapshot),
            }
        };
        Some(self.handle_wake(wake))
    }

    /// Applies every identity change and snapshot that is already queued,
    /// without waiting. Returns the number of snapshots applied.
    pub fn drain_pending(&mut self) -> usize {
        self.sync_identity();
        let mut applied = 0;
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                break;
            };
            let Some(snapshot) = subscription.try_recv() else {
                break;
            };
            if self.apply_snapshot(snapshot) {
                applied += 1;
            }
        }
        applied
    }

    fn handle_wake(&mut self, wake: Wake) -> EngineEvent {
        match wake {
            Wake::Identity(true) => {
                let identity = self.identity_rx.borrow_and_update().clone();
                self.apply_identity(identity.clone());
                EngineEvent::IdentityChanged(identity)
            }
            Wake::Identity(false) => {
                tracing::warn!("identity provider closed");
                self.identity_closed = true;
                EngineEvent::IdentityChanged(self.identity.clone())
            }
            Wake::Snapshot(Some(snapshot)) => {
                let revision = snapshot.revision;
                if self.apply_snapshot(snapshot) {
                    EngineEvent::SnapshotApplied {
                        revision,
                        tasks: self.view.len(),
                    }
                } else {
                    EngineEvent::SnapshotIgnored { revision }
                }
            }
            Wake::Snapshot(None) => {
                tracing::warn!("task subscription closed by backend");
                self.subscription = None;
                EngineEvent::SubscriptionClosed
            }
        }
    }

    /// Picks up an identity change already published by the provider.
    fn sync_identity(&mut self) {
        if self.identity_closed {
            return;
        }
        match self.identity_rx.has_changed() {
            Ok(true) => {
                let identity = self.identity_rx.borrow_and_update().clone();
                self.apply_identity(identity);
            }
            Ok(false) => {}
            Err(_) => self.identity_closed = true,
        }
    }

    /// Switches to `identity`. A change of user tears down the current
    /// subscription and clears the view before subscribing for the new
    /// owner.
    fn apply_identity(&mut self, identity: Option<Identity>) {
        let previous = self.identity.as_ref().map(|i| i.uid.as_str());
        let next = identity.as_ref().map(|i| i.uid.as_str());
        let changed = previous != next;
        if changed {
            tracing::info!(from = ?previous, to = ?next, "identity changed");
        }
        self.identity = identity;
        if !changed {
            return;
        }
        self.auth_error = None;
        if !self.store.requires_identity() {
            return;
        }
        // Cancel before clearing so no old-scope snapshot can land.
        self.subscription = None;
        self.view.clear();
        self.last_revision = None;
        self.dialog.close();
        self.resubscribe();
    }

    fn resubscribe(&mut self) {
        let owner = self.identity.as_ref().map(|i| i.uid.clone());
        match self.store.subscribe(owner.as_deref()) {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => {
                tracing::warn!(error = %e, "failed to subscribe to tasks");
                self.subscription = None;
            }
        }
    }

    /// Owner scope snapshots must carry to be applied.
    fn expected_scope(&self) -> Option<&str> {
        if self.store.requires_identity() {
            self.identity.as_ref().map(|i| i.uid.as_str())
        } else {
            None
        }
    }

    /// Replaces the view with `snapshot` if it belongs to the current scope
    /// and is newer than the last one applied. Returns whether it was
    /// applied. Signed out, only an empty list is accepted.
    fn apply_snapshot(&mut self, snapshot: Snapshot) -> bool {
        if self.store.requires_identity() && self.identity.is_none() && !snapshot.tasks.is_empty() {
            tracing::debug!(revision = snapshot.revision, "snapshot ignored: signed out");
            return false;
        }
        if snapshot.scope.as_deref() != self.expected_scope() {
            tracing::debug!(
                revision = snapshot.revision,
                scope = ?snapshot.scope,
                "snapshot ignored: foreign scope"
            );
            return false;
        }
        if let Some(last) = self.last_revision
            && snapshot.revision <= last
        {
            tracing::debug!(revision = snapshot.revision, last, "snapshot ignored: stale");
            return false;
        }

        let mut tasks = snapshot.tasks;
        if let Some(owner) = self.expected_scope() {
            let before = tasks.len();
            tasks.retain(|t| t.owner_id.as_deref() == Some(owner));
            let foreign = before - tasks.len();
            if foreign > 0 {
                tracing::warn!(foreign, "dropped tasks owned by another identity");
            }
        }
        let duplicates = order::dedupe_by_id(&mut tasks);
        if duplicates > 0 {
            tracing::warn!(duplicates, "dropped duplicate task ids");
        }
        order::sort_tasks(&mut tasks);

        tracing::debug!(revision = snapshot.revision, tasks = tasks.len(), "snapshot applied");
        self.view = tasks;
        self.last_revision = Some(snapshot.revision);
        true
    }

    // --- mutations ---

    /// Returns the owner to write as, or records the sign-in message and
    /// fails when the backend needs an identity and there is none.
    fn authorize(&mut self) -> Result<Option<String>, MutationError> {
        if !self.store.requires_identity() {
            return Ok(None);
        }
        match &self.identity {
            Some(identity) => Ok(Some(identity.uid.clone())),
            None => {
                tracing::debug!("mutation rejected: not signed in");
                self.auth_error = Some(AUTH_REQUIRED_MESSAGE.to_string());
                Err(MutationError::AuthRequired)
            }
        }
    }

    fn known_task(&self, id: &TaskId) -> Result<&Task, MutationError> {
        self.task(id)
            .ok_or_else(|| MutationError::UnknownTask(id.clone()))
    }

    /// Applies a write result: immediate snapshots are shown, pending
    /// writes wait for the subscription.
    fn settle(&mut self, op: &'static str, result: Result<WriteOutcome, StoreError>) -> Result<(), MutationError> {
        match result {
            Ok(WriteOutcome::Applied(snapshot)) => {
                self.apply_snapshot(snapshot);
                Ok(())
            }
            Ok(WriteOutcome::Pending) => Ok(()),
            Err(e) => {
                tracing::warn!(op, error = %e, "task write failed");
                Err(e.into())
            }
        }
    }

    async fn run_write<F>(&mut self, op: &'static str, write: F) -> Result<(), MutationError>
    where
        F: Future<Output = Result<WriteOutcome, StoreError>>,
    {
        let result = write.await;
        self.settle(op, result)
    }

    /// Creates a task from the quick-add field.
    ///
    /// # Errors
    ///
    /// [`MutationError::AuthRequired`] or [`MutationError::Validation`]
    /// before any backend call; [`MutationError::Store`] if the backend
    /// fails.
    pub async fn add_task(&mut self, title: &str) -> Result<(), MutationError> {
        let owner = self.authorize()?;
        let draft = TaskDraft::titled(title).sanitized()?;
        let store = Arc::clone(&self.store);
        self.run_write("create", store.create(owner.as_deref(), draft))
            .await
    }

    /// Flips the completion flag of a task in the view.
    ///
    /// # Errors
    ///
    /// [`MutationError::AuthRequired`], [`MutationError::UnknownTask`], or
    /// [`MutationError::Store`]. Failures are also logged.
    pub async fn toggle_task(&mut self, id: &TaskId) -> Result<(), MutationError> {
        let owner = self.authorize()?;
        let completed = self.known_task(id)?.completed;
        let store = Arc::clone(&self.store);
        self.run_write(
            "toggle",
            store.update(owner.as_deref(), id, TaskPatch::completed(!completed)),
        )
        .await
    }

    /// Deletes a task in the view.
    ///
    /// # Errors
    ///
    /// [`MutationError::AuthRequired`], [`MutationError::UnknownTask`], or
    /// [`MutationError::Store`]. Failures are also logged.
    pub async fn delete_task(&mut self, id: &TaskId) -> Result<(), MutationError> {
        let owner = self.authorize()?;
        self.known_task(id)?;
        let store = Arc::clone(&self.store);
        self.run_write("delete", store.delete(owner.as_deref(), id))
            .await
    }

    /// Opens an empty create dialog.
    ///
    /// # Errors
    ///
    /// [`MutationError::AuthRequired`] in cloud mode without an identity.
    pub fn open_create_dialog(&mut self) -> Result<(), MutationError> {
        self.authorize()?;
        self.dialog.open_create();
        Ok(())
    }

    /// Opens an edit dialog pre-filled from a task in the view.
    ///
    /// # Errors
    ///
    /// [`MutationError::AuthRequired`] or [`MutationError::UnknownTask`].
    pub fn open_edit_dialog(&mut self, id: &TaskId) -> Result<(), MutationError> {
        self.authorize()?;
        let task = self.known_task(id)?.clone();
        self.dialog.open_edit(&task);
        Ok(())
    }

    /// Closes the dialog and resets its values.
    pub fn close_dialog(&mut self) {
        self.dialog.close();
    }

    /// Submits dialog values. On success the dialog closes; on failure it
    /// stays open with its values.
    ///
    /// # Errors
    ///
    /// [`MutationError::AuthRequired`] or [`MutationError::Validation`]
    /// before any backend call, [`MutationError::UnknownTask`] when editing
    /// a task no longer in the view, [`MutationError::Store`] if the
    /// backend fails.
    pub async fn submit_dialog(&mut self, values: TaskDraft, mode: DialogMode) -> Result<(), MutationError> {
        let owner = self.authorize()?;
        self.dialog.values = values.clone();
        let draft = values.sanitized()?;
        let store = Arc::clone(&self.store);
        match mode {
            DialogMode::Create => {
                self.run_write("create", store.create(owner.as_deref(), draft))
                    .await?;
            }
            DialogMode::Edit(id) => {
                self.known_task(&id)?;
                self.run_write(
                    "edit",
                    store.update(owner.as_deref(), &id, draft.into_patch()),
                )
                .await?;
            }
        }
        self.dialog.close();
        Ok(())
    }

    /// Deletes the task open in the edit dialog and closes the dialog.
    /// Does nothing for a create dialog.
    ///
    /// # Errors
    ///
    /// Same as [`delete_task`](Self::delete_task).
    pub async fn delete_from_dialog(&mut self) -> Result<(), MutationError> {
        let Some(id) = self.dialog.editing().cloned() else {
            return Ok(());
        };
        self.delete_task(&id).await?;
        self.dialog.close();
        Ok(())
    }

    // --- auth ---

    /// Signs in with an existing account.
    ///
    /// # Errors
    ///
    /// [`AuthFailure::Unavailable`] without an auth service,
    /// [`AuthFailure::Incomplete`] for a blank email or a password under six
    /// characters, [`AuthFailure::Rejected`] when the service refuses. The matching
    /// message is recorded for the user.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<(), AuthFailure> {
        self.authenticate(AuthMode::SignIn, email, password).await
    }

    /// Creates an account and signs in with it.
    ///
    /// # Errors
    ///
    /// Same as [`sign_in`](Self::sign_in).
    pub async fn sign_up(&mut self, email: &str, password: &str) -> Result<(), AuthFailure> {
        self.authenticate(AuthMode::SignUp, email, password).await
    }

    /// Runs one sign-in or sign-up request. The email is trimmed and both
    /// fields must pass [`credentials_acceptable`] before the service is
    /// called. Dropping the returned future mid-request clears the pending
    /// flag.
    async fn authenticate(&mut self, mode: AuthMode, email: &str, password: &str) -> Result<(), AuthFailure> {
        if !self.auth.is_enabled() {
            self.auth_error = Some(AUTH_UNAVAILABLE_MESSAGE.to_string());
            return Err(AuthFailure::Unavailable);
        }
        let email = email.trim();
        if !credentials_acceptable(email, password) {
            tracing::debug!(?mode, "auth request not sent: incomplete credentials");
            return Err(AuthFailure::Incomplete);
        }
        self.auth_error = None;
        let auth = Arc::clone(&self.auth);
        let result = {
            let _pending = PendingFlag::raise(&mut self.auth_pending);
            match mode {
                AuthMode::SignIn => auth.sign_in(email, password).await,
                AuthMode::SignUp => auth.sign_up(email, password).await,
            }
        };
        match result {
            Ok(_) => {
                self.sync_identity();
                self.drain_pending();
                Ok(())
            }
            Err(kind) => {
                tracing::info!(code = %kind, ?mode, "auth request rejected");
                self.auth_error = Some(kind.message().to_string());
                Err(kind.into())
            }
        }
    }

    /// Submits the auth form in its current mode. The email is trimmed.
    /// Both fields are cleared on success; only the password on failure.
    ///
    /// # Errors
    ///
    /// [`AuthFailure::Incomplete`] if the form fails its submit guard,
    /// otherwise as [`sign_in`](Self::sign_in).
    pub async fn submit_auth_form(&mut self, form: &mut AuthForm) -> Result<(), AuthFailure> {
        if !self.auth.is_enabled() {
            self.auth_error = Some(AUTH_UNAVAILABLE_MESSAGE.to_string());
            return Err(AuthFailure::Unavailable);
        }
        if !form.is_submittable() {
            return Err(AuthFailure::Incomplete);
        }
        let email = form.email.clone();
        let password = form.password.clone();
        let result = self.authenticate(form.mode, &email, &password).await;
        if result.is_ok() {
            form.clear();
        } else {
            form.clear_password();
        }
        result
    }

    /// Switches the auth form between sign-in and sign-up and clears the
    /// last message.
    pub fn toggle_auth_mode(&mut self, form: &mut AuthForm) {
        form.toggle_mode();
        self.auth_error = None;
    }

    /// Signs out. Failures are logged, never surfaced.
    pub async fn sign_out(&mut self) {
        if !self.auth.is_enabled() {
            return;
        }
        let auth = Arc::clone(&self.auth);
        if let Err(e) = auth.sign_out().await {
            tracing::warn!(error = %e, "sign-out failed");
        }
        self.sync_identity();
    }
}
