//! Identity provider abstraction for `Tasklist`.
//!
//! Defines the [`IdentityProvider`] trait. Implementations:
//! - [`DisabledAuth`]: used with the local backend; never signs anyone in
//! - [`memory::MemoryAuthService`]: in-process auth service implementing
//!   the full error taxonomy
//!
//! Identity changes are published on a [`watch`] channel: a new receiver
//! sees the current value immediately and is woken on every sign-in and
//! sign-out.

pub mod form;
pub mod memory;

use tokio::sync::watch;

use tasklist_proto::identity::{AuthErrorKind, Identity};

/// Async auth service contract.
pub trait IdentityProvider: Send + Sync {
    /// Whether an auth service is configured at all.
    fn is_enabled(&self) -> bool;

    /// Observe the current identity and every later change.
    fn observe(&self) -> watch::Receiver<Option<Identity>>;

    /// Sign in with an existing account.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Identity, AuthErrorKind>> + Send;

    /// Create an account and sign in with it.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Identity, AuthErrorKind>> + Send;

    /// Sign the current identity out.
    fn sign_out(&self) -> impl std::future::Future<Output = Result<(), AuthErrorKind>> + Send;
}

/// Provider used when no auth service is configured.
///
/// Always reports "no identity"; every call fails with
/// [`AuthErrorKind::Unknown`].
pub struct DisabledAuth {
    identity: watch::Sender<Option<Identity>>,
}

impl DisabledAuth {
    /// Creates the provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: watch::Sender::new(None),
        }
    }
}

impl Default for DisabledAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for DisabledAuth {
    fn is_enabled(&self) -> bool {
        false
    }

    fn observe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Identity, AuthErrorKind> {
        Err(AuthErrorKind::Unknown)
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Identity, AuthErrorKind> {
        Err(AuthErrorKind::Unknown)
    }

    async fn sign_out(&self) -> Result<(), AuthErrorKind> {
        Ok(())
    }
}
