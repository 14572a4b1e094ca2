//! In-process email/password auth service.
//!
//! Accounts live in memory for the lifetime of the service. Implements the
//! same failure modes as the hosted service: malformed email, disabled
//! account, unknown user, wrong password, duplicate sign-up and weak
//! password. An outage switch makes every call fail with
//! [`AuthErrorKind::Unknown`].

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use tasklist_proto::identity::{AuthErrorKind, Identity, meets_password_policy};

use super::IdentityProvider;

struct Account {
    identity: Identity,
    password: String,
    disabled: bool,
}

#[derive(Default)]
struct Accounts {
    /// Keyed by lower-cased email.
    by_email: HashMap<String, Account>,
    offline: bool,
    /// Sign-in and sign-up calls received, successful or not.
    requests: u64,
}

/// Auth service held in process memory.
pub struct MemoryAuthService {
    accounts: Mutex<Accounts>,
    current: watch::Sender<Option<Identity>>,
}

impl Default for MemoryAuthService {
    fn default() -> Self {
        Self::new()
    }
}

/// Loose syntactic check: one `@`, non-empty local part, dotted domain,
/// no whitespace.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

impl MemoryAuthService {
    /// Creates a service with no accounts and nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(Accounts::default()),
            current: watch::Sender::new(None),
        }
    }

    /// Registers an account without signing in. Returns its identity.
    ///
    /// # Errors
    ///
    /// Same validation as [`IdentityProvider::sign_up`].
    pub fn register(&self, email: &str, password: &str) -> Result<Identity, AuthErrorKind> {
        let mut accounts = self.accounts.lock();
        if accounts.offline {
            return Err(AuthErrorKind::Unknown);
        }
        if !is_valid_email(email) {
            return Err(AuthErrorKind::InvalidEmail);
        }
        if !meets_password_policy(password) {
            return Err(AuthErrorKind::WeakPassword);
        }
        let key = email.to_lowercase();
        if accounts.by_email.contains_key(&key) {
            return Err(AuthErrorKind::EmailAlreadyInUse);
        }
        let identity = Identity::new(Uuid::now_v7().simple().to_string(), email);
        accounts.by_email.insert(
            key,
            Account {
                identity: identity.clone(),
                password: password.to_string(),
                disabled: false,
            },
        );
        drop(accounts);
        tracing::info!(uid = %identity.uid, "account registered");
        Ok(identity)
    }

    /// Disables an account. Later sign-ins fail with
    /// [`AuthErrorKind::UserDisabled`]; an active session is not ended.
    /// Returns `false` if no such account exists.
    pub fn disable_account(&self, email: &str) -> bool {
        self.accounts
            .lock()
            .by_email
            .get_mut(&email.to_lowercase())
            .map(|account| account.disabled = true)
            .is_some()
    }

    /// Simulates a service outage (`true`) or recovery (`false`).
    pub fn set_offline(&self, offline: bool) {
        self.accounts.lock().offline = offline;
    }

    /// Number of sign-in and sign-up requests that reached the service.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.accounts.lock().requests
    }

    /// Currently signed-in identity.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    fn authenticate(&self, email: &str, password: &str) -> Result<Identity, AuthErrorKind> {
        let accounts = self.accounts.lock();
        if accounts.offline {
            return Err(AuthErrorKind::Unknown);
        }
        if !is_valid_email(email) {
            return Err(AuthErrorKind::InvalidEmail);
        }
        let account = accounts
            .by_email
            .get(&email.to_lowercase())
            .ok_or(AuthErrorKind::UserNotFound)?;
        if account.disabled {
            return Err(AuthErrorKind::UserDisabled);
        }
        if account.password != password {
            return Err(AuthErrorKind::WrongPassword);
        }
        Ok(account.identity.clone())
    }
}

impl IdentityProvider for MemoryAuthService {
    fn is_enabled(&self) -> bool {
        true
    }

    fn observe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthErrorKind> {
        self.accounts.lock().requests += 1;
        let identity = self.authenticate(email, password)?;
        tracing::info!(uid = %identity.uid, "signed in");
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthErrorKind> {
        self.accounts.lock().requests += 1;
        let identity = self.register(email, password)?;
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthErrorKind> {
        if self.accounts.lock().offline {
            return Err(AuthErrorKind::Unknown);
        }
        if let Some(previous) = self.current.send_replace(None) {
            tracing::info!(uid = %previous.uid, "signed out");
        }
        Ok(())
    }
}
