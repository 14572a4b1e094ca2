//! Create/edit dialog state.

use tasklist_proto::task::{Task, TaskDraft, TaskId};

/// What a dialog submit does.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogMode {
    /// Create a new task from the dialog values.
    #[default]
    Create,
    /// Overwrite the editable fields of an existing task.
    Edit(TaskId),
}

/// The task dialog: whether it is open, what it submits, and the values
/// currently entered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DialogState {
    pub open: bool,
    pub mode: DialogMode,
    pub values: TaskDraft,
}

impl DialogState {
    /// Opens an empty create dialog.
    pub fn open_create(&mut self) {
        *self = Self {
            open: true,
            mode: DialogMode::Create,
            values: TaskDraft::default(),
        };
    }

    /// Opens an edit dialog pre-filled from `task`.
    pub fn open_edit(&mut self, task: &Task) {
        *self = Self {
            open: true,
            mode: DialogMode::Edit(task.id.clone()),
            values: TaskDraft {
                title: task.title.clone(),
                description: task.description.clone(),
                due_date: task.due_date.clone(),
                completed: task.completed,
            },
        };
    }

    /// Closes the dialog and resets it to an empty create dialog.
    pub fn close(&mut self) {
        *self = Self::default();
    }

    /// Id of the task being edited, if any.
    #[must_use]
    pub const fn editing(&self) -> Option<&TaskId> {
        match &self.mode {
            DialogMode::Edit(id) => Some(id),
            DialogMode::Create => None,
        }
    }
}
