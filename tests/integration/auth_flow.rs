//! Integration tests for sign-in, sign-up, and mutation gating in cloud mode.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use tasklist::auth::form::{AuthForm, AuthMode};
use tasklist::auth::memory::MemoryAuthService;
use tasklist::cloud::memory::MemoryCollection;
use tasklist::engine::{
    AUTH_REQUIRED_MESSAGE, AuthFailure, DialogMode, MutationError, SessionState, TaskEngine,
};
use tasklist::store::remote::RemoteStore;
use tasklist_proto::identity::AuthErrorKind;
use tasklist_proto::task::{TaskDraft, TaskId};

type CloudEngine = TaskEngine<RemoteStore<MemoryCollection>, MemoryAuthService>;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn make_engine() -> (CloudEngine, Arc<MemoryCollection>, Arc<MemoryAuthService>) {
    let collection = Arc::new(MemoryCollection::new());
    let auth = Arc::new(MemoryAuthService::new());
    let store = RemoteStore::new(Arc::clone(&collection));
    let engine = TaskEngine::new(Arc::new(store), Arc::clone(&auth));
    (engine, collection, auth)
}

// ---------------------------------------------------------------------------
// Gating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_mutation_requires_identity() {
    let (mut engine, collection, _auth) = make_engine();
    assert_eq!(engine.state(), SessionState::Unauthenticated);
    let id = TaskId::new("any");

    assert!(matches!(
        engine.add_task("x").await,
        Err(MutationError::AuthRequired)
    ));
    assert_eq!(engine.auth_error(), Some(AUTH_REQUIRED_MESSAGE));
    engine.dismiss_auth_error();

    assert!(matches!(
        engine.toggle_task(&id).await,
        Err(MutationError::AuthRequired)
    ));
    assert!(matches!(
        engine.delete_task(&id).await,
        Err(MutationError::AuthRequired)
    ));
    assert!(matches!(
        engine.open_create_dialog(),
        Err(MutationError::AuthRequired)
    ));
    assert!(matches!(
        engine.open_edit_dialog(&id),
        Err(MutationError::AuthRequired)
    ));
    assert!(matches!(
        engine
            .submit_dialog(TaskDraft::titled("x"), DialogMode::Create)
            .await,
        Err(MutationError::AuthRequired)
    ));

    assert!(!engine.dialog().open);
    assert_eq!(engine.total_count(), 0);
    assert_eq!(collection.write_count(), 0);
    assert_eq!(collection.listener_count(), 0);
    assert_eq!(engine.auth_error(), Some(AUTH_REQUIRED_MESSAGE));
}

#[tokio::test]
async fn gating_is_checked_before_validation() {
    let (mut engine, collection, _auth) = make_engine();
    assert!(matches!(
        engine.add_task("   ").await,
        Err(MutationError::AuthRequired)
    ));
    assert_eq!(collection.write_count(), 0);
}

// ---------------------------------------------------------------------------
// Auth form
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sign_up_through_form_clears_fields_and_subscribes() {
    let (mut engine, collection, _auth) = make_engine();
    let mut form = AuthForm::new("  alice@example.com ", "secret1");
    engine.toggle_auth_mode(&mut form);
    assert_eq!(form.mode, AuthMode::SignUp);

    engine.submit_auth_form(&mut form).await.unwrap();
    assert_eq!(form, AuthForm {
        mode: AuthMode::SignUp,
        ..AuthForm::default()
    });
    assert_eq!(engine.state(), SessionState::Authenticated);
    assert!(!engine.is_auth_pending());
    assert_eq!(
        engine.identity().map(|i| i.email.as_str()),
        Some("alice@example.com")
    );
    assert_eq!(collection.listener_count(), 1);
}

#[tokio::test]
async fn failed_sign_in_keeps_email_and_clears_password() {
    let (mut engine, _collection, auth) = make_engine();
    auth.register("alice@example.com", "secret1").unwrap();

    let mut form = AuthForm::new("alice@example.com", "wrong-one");
    let result = engine.submit_auth_form(&mut form).await;
    assert_eq!(result, Err(AuthFailure::Rejected(AuthErrorKind::WrongPassword)));
    assert_eq!(form.email, "alice@example.com");
    assert!(form.password.is_empty());
    assert_eq!(
        engine.auth_error(),
        Some(AuthErrorKind::WrongPassword.message())
    );
    assert_eq!(engine.state(), SessionState::Unauthenticated);

    form.password = "secret1".to_string();
    engine.submit_auth_form(&mut form).await.unwrap();
    assert!(engine.auth_error().is_none());
    assert_eq!(engine.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn incomplete_form_is_not_submitted() {
    let (mut engine, _collection, auth) = make_engine();
    auth.register("alice@example.com", "secret1").unwrap();

    let mut form = AuthForm::new("alice@example.com", "12345");
    assert_eq!(
        engine.submit_auth_form(&mut form).await,
        Err(AuthFailure::Incomplete)
    );
    assert_eq!(form.password, "12345");

    let mut form = AuthForm::new("   ", "secret1");
    assert_eq!(
        engine.submit_auth_form(&mut form).await,
        Err(AuthFailure::Incomplete)
    );
    assert!(engine.identity().is_none());
    assert_eq!(auth.request_count(), 0);
}

#[tokio::test]
async fn each_error_kind_surfaces_its_message() {
    let (mut engine, _collection, auth) = make_engine();
    auth.register("taken@example.com", "secret1").unwrap();
    auth.register("blocked@example.com", "secret1").unwrap();
    auth.disable_account("blocked@example.com");

    let cases = [
        (AuthMode::SignIn, "not-an-email", "secret1", AuthErrorKind::InvalidEmail),
        (AuthMode::SignIn, "nobody@example.com", "secret1", AuthErrorKind::UserNotFound),
        (AuthMode::SignIn, "blocked@example.com", "secret1", AuthErrorKind::UserDisabled),
        (AuthMode::SignIn, "taken@example.com", "secret2", AuthErrorKind::WrongPassword),
        (AuthMode::SignUp, "taken@example.com", "secret1", AuthErrorKind::EmailAlreadyInUse),
    ];
    for (mode, email, password, expected) in cases {
        let result = match mode {
            AuthMode::SignIn => engine.sign_in(email, password).await,
            AuthMode::SignUp => engine.sign_up(email, password).await,
        };
        assert_eq!(result, Err(AuthFailure::Rejected(expected)), "{email}");
        assert_eq!(engine.auth_error(), Some(expected.message()));
        assert!(!engine.is_auth_pending());
    }

    assert_eq!(auth.request_count(), 5);
}

#[tokio::test]
async fn short_password_or_blank_email_never_reaches_the_service() {
    let (mut engine, _collection, auth) = make_engine();
    auth.register("alice@example.com", "secret1").unwrap();

    assert_eq!(
        engine.sign_in("alice@example.com", "123").await,
        Err(AuthFailure::Incomplete)
    );
    assert_eq!(
        engine.sign_in("nobody@example.com", "1").await,
        Err(AuthFailure::Incomplete)
    );
    assert_eq!(
        engine.sign_up("new@example.com", "12345").await,
        Err(AuthFailure::Incomplete)
    );
    assert_eq!(
        engine.sign_up("   ", "secret1").await,
        Err(AuthFailure::Incomplete)
    );

    assert_eq!(auth.request_count(), 0);
    assert!(!engine.is_auth_pending());
    assert!(engine.identity().is_none());
    assert!(engine.auth_error().is_none());
}

#[tokio::test]
async fn sign_in_trims_the_email() {
    let (mut engine, _collection, auth) = make_engine();
    auth.register("alice@example.com", "secret1").unwrap();
    engine
        .sign_in("  alice@example.com  ", "secret1")
        .await
        .unwrap();
    assert_eq!(engine.state(), SessionState::Authenticated);
    assert_eq!(auth.request_count(), 1);
}

#[tokio::test]
async fn service_outage_is_unknown_error() {
    let (mut engine, _collection, auth) = make_engine();
    auth.set_offline(true);
    assert_eq!(
        engine.sign_in("alice@example.com", "secret1").await,
        Err(AuthFailure::Rejected(AuthErrorKind::Unknown))
    );
    assert_eq!(engine.auth_error(), Some(AuthErrorKind::Unknown.message()));
}

#[tokio::test]
async fn sign_out_failure_is_not_surfaced() {
    let (mut engine, _collection, auth) = make_engine();
    engine.sign_up("alice@example.com", "secret1").await.unwrap();
    auth.set_offline(true);
    engine.sign_out().await;
    assert!(engine.auth_error().is_none());
    assert_eq!(engine.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn signed_in_mutations_reach_the_backend() {
    let (mut engine, collection, _auth) = make_engine();
    engine.sign_up("alice@example.com", "secret1").await.unwrap();
    engine.open_create_dialog().unwrap();
    engine
        .submit_dialog(TaskDraft::titled("Allowed"), DialogMode::Create)
        .await
        .unwrap();
    assert_eq!(collection.write_count(), 1);
    engine.drain_pending();
    assert_eq!(engine.total_count(), 1);
}
