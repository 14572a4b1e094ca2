//! Authenticated identities and the auth error taxonomy.

use thiserror::Error;

/// Minimum password length accepted by the sign-in/sign-up form.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// An authenticated principal returned by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Opaque, stable user id. Used as the task owner filter.
    pub uid: String,
    /// Email address the identity signed in with.
    pub email: String,
}

impl Identity {
    /// Creates an identity from its parts.
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
        }
    }
}

/// Failure reasons reported by the auth service.
///
/// The `Display` form is the service error code; [`AuthErrorKind::message`]
/// is the text shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum AuthErrorKind {
    /// Email address is malformed.
    #[error("auth/invalid-email")]
    InvalidEmail,
    /// Account exists but has been disabled.
    #[error("auth/user-disabled")]
    UserDisabled,
    /// No account for this email.
    #[error("auth/user-not-found")]
    UserNotFound,
    /// Password does not match.
    #[error("auth/wrong-password")]
    WrongPassword,
    /// Sign-up with an email that already has an account.
    #[error("auth/email-already-in-use")]
    EmailAlreadyInUse,
    /// Sign-up password fails the password policy.
    #[error("auth/weak-password")]
    WeakPassword,
    /// Anything else.
    #[error("auth/unknown")]
    Unknown,
}

impl AuthErrorKind {
    /// User-facing description of the failure.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidEmail => "The email address is not formatted correctly.",
            Self::UserDisabled => "This account has been disabled. Please contact an administrator.",
            Self::UserNotFound => "No matching user was found. Try signing up instead.",
            Self::WrongPassword => "The password is incorrect.",
            Self::EmailAlreadyInUse => {
                "This email address is already registered. Try signing in instead."
            }
            Self::WeakPassword => "Passwords must be at least 6 characters long.",
            Self::Unknown => "Sign-in failed. Please wait a moment and try again.",
        }
    }
}

/// Returns `true` if `password` satisfies the client-side password policy.
#[must_use]
pub fn meets_password_policy(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}
