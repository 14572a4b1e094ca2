//! Property-based tests for view ordering and derived counts.
//!
//! Uses proptest to verify:
//! 1. Sorting puts every incomplete task before every completed one, each
//!    partition ascending by creation time, and keeps the same tasks.
//! 2. Incomplete and completed counts always sum to the list length.
//! 3. Any snapshot delivered to the engine yields an ordered view with unique
//!    ids whose counts match the view.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use tokio::sync::mpsc;

use tasklist::auth::DisabledAuth;
use tasklist::engine::TaskEngine;
use tasklist::engine::order::{count_completed, count_incomplete, is_display_ordered, sort_tasks};
use tasklist::store::{BackendKind, Snapshot, StoreError, Subscription, TaskStore, WriteOutcome};
use tasklist_proto::task::{Task, TaskDraft, TaskId, TaskPatch};

/// Local-style store whose feed is pushed by the test.
#[derive(Default)]
struct FeedStore {
    feed: Mutex<Option<mpsc::UnboundedSender<Snapshot>>>,
}

impl FeedStore {
    fn push(&self, snapshot: Snapshot) {
        self.feed
            .lock()
            .as_ref()
            .expect("engine subscribed")
            .send(snapshot)
            .unwrap();
    }
}

impl TaskStore for FeedStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn requires_identity(&self) -> bool {
        false
    }

    fn subscribe(&self, _owner: Option<&str>) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.feed.lock() = Some(tx);
        Ok(Subscription::new(None, rx))
    }

    async fn create(&self, _owner: Option<&str>, _draft: TaskDraft) -> Result<WriteOutcome, StoreError> {
        Ok(WriteOutcome::Pending)
    }

    async fn update(
        &self,
        _owner: Option<&str>,
        _id: &TaskId,
        _patch: TaskPatch,
    ) -> Result<WriteOutcome, StoreError> {
        Ok(WriteOutcome::Pending)
    }

    async fn delete(&self, _owner: Option<&str>, _id: &TaskId) -> Result<WriteOutcome, StoreError> {
        Ok(WriteOutcome::Pending)
    }
}

/// Strategy for a task with a small id space so duplicates occur.
fn arb_task() -> impl Strategy<Value = Task> {
    (0u8..24, any::<bool>(), 0u64..1_000, "[a-zA-Z][a-zA-Z ]{0,15}").prop_map(
        |(id, completed, created_at, title)| Task {
            id: TaskId::new(format!("t-{id}")),
            title,
            description: String::new(),
            due_date: None,
            completed,
            created_at,
            owner_id: None,
        },
    )
}

fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(arb_task(), 0..48)
}

proptest! {
    #[test]
    fn sort_orders_partitions_and_preserves_members(mut tasks in arb_tasks()) {
        let mut before: Vec<_> = tasks.iter().map(|t| (t.id.clone(), t.created_at, t.completed)).collect();
        sort_tasks(&mut tasks);

        prop_assert!(is_display_ordered(&tasks));
        if let Some(first_done) = tasks.iter().position(|t| t.completed) {
            prop_assert!(tasks[first_done..].iter().all(|t| t.completed));
        }

        let mut after: Vec<_> = tasks.iter().map(|t| (t.id.clone(), t.created_at, t.completed)).collect();
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn counts_partition_the_list(tasks in arb_tasks()) {
        prop_assert_eq!(count_incomplete(&tasks) + count_completed(&tasks), tasks.len());
    }

    #[test]
    fn delivered_snapshots_yield_a_consistent_view(tasks in arb_tasks()) {
        let store = Arc::new(FeedStore::default());
        let mut engine = TaskEngine::new(Arc::clone(&store), Arc::new(DisabledAuth::new()));
        let distinct: HashSet<_> = tasks.iter().map(|t| t.id.clone()).collect();

        store.push(Snapshot { scope: None, revision: 1, tasks });
        prop_assert_eq!(engine.drain_pending(), 1);

        let view = engine.tasks();
        prop_assert!(is_display_ordered(view));
        let ids: HashSet<_> = view.iter().map(|t| t.id.clone()).collect();
        prop_assert_eq!(ids.len(), view.len());
        prop_assert_eq!(ids, distinct);
        prop_assert_eq!(engine.incomplete_count(), count_incomplete(view));
        prop_assert_eq!(engine.incomplete_count() + engine.completed_count(), engine.total_count());
        prop_assert!(view.iter().all(|t| !t.title.trim().is_empty()));
    }
}
