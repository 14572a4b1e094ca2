//! Pure ordering and counting functions over the task view.
//!
//! Incomplete tasks come first, completed tasks last; within each
//! partition tasks are ascending by creation time. The sort is stable, so
//! tasks created in the same millisecond keep backend iteration order.

use std::collections::HashSet;

use tasklist_proto::task::Task;

/// Sorts `tasks` in display order.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by_key(|task| (task.completed, task.created_at));
}

/// Removes later occurrences of an id already seen earlier in the list.
///
/// Returns the number of tasks dropped.
pub fn dedupe_by_id(tasks: &mut Vec<Task>) -> usize {
    let before = tasks.len();
    let mut seen = HashSet::with_capacity(tasks.len());
    tasks.retain(|task| seen.insert(task.id.clone()));
    before - tasks.len()
}

/// Number of tasks that are not completed.
#[must_use]
pub fn count_incomplete(tasks: &[Task]) -> usize {
    tasks.iter().filter(|task| !task.completed).count()
}

/// Number of completed tasks.
#[must_use]
pub fn count_completed(tasks: &[Task]) -> usize {
    tasks.iter().filter(|task| task.completed).count()
}

/// Returns `true` if `tasks` is already in display order.
#[must_use]
pub fn is_display_ordered(tasks: &[Task]) -> bool {
    tasks
        .windows(2)
        .all(|pair| (pair[0].completed, pair[0].created_at) <= (pair[1].completed, pair[1].created_at))
}
