//! Sign-in / sign-up form state.
//!
//! The form is owned by the presentation layer; the engine reads it on
//! submit and resets it according to the outcome (both fields cleared on
//! success, only the password on failure).

use tasklist_proto::identity::meets_password_policy;

/// Client-side check run before any auth request: the trimmed email is
/// non-empty and the password meets the policy.
#[must_use]
pub fn credentials_acceptable(email: &str, password: &str) -> bool {
    !email.trim().is_empty() && meets_password_policy(password)
}

/// Which auth action the form submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Sign in with an existing account.
    #[default]
    SignIn,
    /// Create a new account.
    SignUp,
}

impl AuthMode {
    /// The other mode.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::SignIn => Self::SignUp,
            Self::SignUp => Self::SignIn,
        }
    }
}

/// Email/password form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthForm {
    pub email: String,
    pub password: String,
    pub mode: AuthMode,
}

impl AuthForm {
    /// Creates a form pre-filled with credentials, in sign-in mode.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            mode: AuthMode::SignIn,
        }
    }

    /// Whether the submit control is enabled.
    #[must_use]
    pub fn is_submittable(&self) -> bool {
        credentials_acceptable(&self.email, &self.password)
    }

    /// Replaces both fields, keeping the current mode.
    pub fn fill(&mut self, email: impl Into<String>, password: impl Into<String>) {
        self.email = email.into();
        self.password = password.into();
    }

    /// Switches between sign-in and sign-up.
    pub const fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    /// Resets both fields after a successful submit.
    pub fn clear(&mut self) {
        self.email.clear();
        self.password.clear();
    }

    /// Keeps the email for retry and drops the password.
    pub fn clear_password(&mut self) {
        self.password.clear();
    }
}
