//! Integration tests for cloud mode: the engine over the remote store and
//! the in-process document collection.
//!
//! Writes are requests only. Every visible change must come back through
//! the owner-scoped subscription, so each test drains the engine before
//! asserting on the view.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use serde_json::json;

use tasklist::auth::memory::MemoryAuthService;
use tasklist::cloud::memory::MemoryCollection;
use tasklist::engine::{DialogMode, EngineEvent, MutationError, SessionState, TaskEngine};
use tasklist::store::StoreError;
use tasklist::store::remote::RemoteStore;
use tasklist_proto::task::{TaskDraft, TaskId};

type CloudEngine = TaskEngine<RemoteStore<MemoryCollection>, MemoryAuthService>;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Engine signed in as a fresh account, plus the shared collection.
async fn signed_in_engine() -> (CloudEngine, Arc<MemoryCollection>) {
    let collection = Arc::new(MemoryCollection::new());
    let store = RemoteStore::new(Arc::clone(&collection));
    let mut engine = TaskEngine::new(Arc::new(store), Arc::new(MemoryAuthService::new()));
    engine.sign_up("alice@example.com", "secret1").await.unwrap();
    assert_eq!(engine.state(), SessionState::Authenticated);
    (engine, collection)
}

fn uid(engine: &CloudEngine) -> String {
    engine.identity().expect("signed in").uid.clone()
}

// ---------------------------------------------------------------------------
// Echo-confirmed writes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_is_visible_only_after_echo() {
    let (mut engine, collection) = signed_in_engine().await;
    assert_eq!(engine.total_count(), 0);

    engine.add_task("Draft report").await.unwrap();
    assert_eq!(engine.total_count(), 0, "no optimistic insert");
    assert_eq!(collection.len(), 1);

    assert_eq!(engine.drain_pending(), 1);
    assert_eq!(engine.total_count(), 1);
    let task = &engine.tasks()[0];
    assert_eq!(task.title, "Draft report");
    assert_eq!(task.owner_id.as_deref(), Some(uid(&engine).as_str()));
}

#[tokio::test]
async fn toggle_and_delete_wait_for_echo() {
    let (mut engine, _collection) = signed_in_engine().await;
    engine.add_task("A").await.unwrap();
    engine.drain_pending();
    let id = engine.tasks()[0].id.clone();

    engine.toggle_task(&id).await.unwrap();
    assert!(!engine.tasks()[0].completed, "no optimistic toggle");
    engine.drain_pending();
    assert!(engine.tasks()[0].completed);
    assert_eq!(engine.incomplete_count(), 0);

    engine.delete_task(&id).await.unwrap();
    assert_eq!(engine.total_count(), 1, "no optimistic delete");
    engine.drain_pending();
    assert_eq!(engine.total_count(), 0);
}

#[tokio::test]
async fn ordering_follows_created_millis_from_records() {
    let (mut engine, collection) = signed_in_engine().await;
    let owner = uid(&engine);
    collection.insert_raw(
        TaskId::new("late"),
        json!({ "ownerId": owner, "title": "Late", "createdAtMillis": 300 }),
    );
    collection.insert_raw(
        TaskId::new("early-done"),
        json!({ "ownerId": owner, "title": "Early done", "completed": true, "createdAtMillis": 100 }),
    );
    collection.insert_raw(
        TaskId::new("early"),
        json!({ "ownerId": owner, "title": "Early", "createdAtMillis": 200 }),
    );
    engine.drain_pending();

    let titles: Vec<_> = engine.tasks().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Early", "Late", "Early done"]);
}

#[tokio::test]
async fn external_changes_are_pushed() {
    let (mut engine, collection) = signed_in_engine().await;
    let owner = uid(&engine);
    collection.insert_raw(
        TaskId::new("from-phone"),
        json!({ "ownerId": owner, "title": "From phone", "dueDate": "" }),
    );

    let event = engine.next_event().await.unwrap();
    assert!(matches!(event, EngineEvent::SnapshotApplied { tasks: 1, .. }));
    let task = &engine.tasks()[0];
    assert_eq!(task.title, "From phone");
    assert!(task.due_date.is_none());

    collection.remove_raw(&TaskId::new("from-phone"));
    engine.drain_pending();
    assert_eq!(engine.total_count(), 0);
}

#[tokio::test]
async fn dialog_edit_is_sent_as_update() {
    let (mut engine, collection) = signed_in_engine().await;
    engine.add_task("Draft").await.unwrap();
    engine.drain_pending();
    let id = engine.tasks()[0].id.clone();

    engine.open_edit_dialog(&id).unwrap();
    let mut values = engine.dialog().values.clone();
    values.title = "Final".to_string();
    values.due_date = Some("2026-12-01".to_string());
    engine
        .submit_dialog(values, DialogMode::Edit(id.clone()))
        .await
        .unwrap();
    assert!(!engine.dialog().open);
    assert_eq!(engine.task(&id).unwrap().title, "Draft");

    engine.drain_pending();
    let task = engine.task(&id).unwrap();
    assert_eq!(task.title, "Final");
    assert_eq!(task.due_date.as_deref(), Some("2026-12-01"));

    let document = collection.document(&id).unwrap();
    assert!(document.get("updatedAt").is_some());
    assert_eq!(document["dueDate"], "2026-12-01");
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_failure_leaves_view_untouched() {
    let (mut engine, collection) = signed_in_engine().await;
    engine.add_task("Keep me").await.unwrap();
    engine.drain_pending();
    let before = engine.tasks().to_vec();

    collection.set_offline(true);
    let result = engine.add_task("Lost").await;
    assert!(matches!(
        result,
        Err(MutationError::Store(StoreError::Unavailable))
    ));
    let id = before[0].id.clone();
    assert!(engine.toggle_task(&id).await.is_err());
    assert!(engine.delete_task(&id).await.is_err());

    engine.drain_pending();
    assert_eq!(engine.tasks(), before.as_slice());
    assert!(engine.auth_error().is_none(), "store errors are not surfaced");

    collection.set_offline(false);
    engine.add_task("Back online").await.unwrap();
    engine.drain_pending();
    assert_eq!(engine.total_count(), 2);
}

#[tokio::test]
async fn failed_dialog_submit_keeps_dialog_open() {
    let (mut engine, collection) = signed_in_engine().await;
    engine.open_create_dialog().unwrap();
    collection.set_offline(true);

    let result = engine
        .submit_dialog(TaskDraft::titled("Later"), DialogMode::Create)
        .await;
    assert!(result.is_err());
    assert!(engine.dialog().open);
    assert_eq!(engine.dialog().values.title, "Later");
}

#[tokio::test]
async fn malformed_documents_do_not_break_the_view() {
    let (mut engine, collection) = signed_in_engine().await;
    let owner = uid(&engine);
    collection.insert_raw(
        TaskId::new("broken"),
        json!({ "ownerId": owner, "title": ["not", "text"] }),
    );
    collection.insert_raw(
        TaskId::new("fine"),
        json!({ "ownerId": owner, "title": "Fine" }),
    );
    engine.drain_pending();
    let ids: Vec<_> = engine.tasks().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["fine"]);
}
