//! Task model types.
//!
//! A [`Task`] is the only entity in the system. New tasks and full edits are
//! described by a [`TaskDraft`], partial updates by a [`TaskPatch`]. Drafts
//! must pass [`TaskDraft::sanitized`] before they reach any backend.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Owner id stamped on tasks created by the local backend.
pub const LOCAL_OWNER_ID: &str = "local-user";

/// Errors raised while validating task input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Task title is empty after trimming.
    #[error("task title cannot be empty")]
    TitleEmpty,
}

/// Opaque task identifier.
///
/// The local backend generates `<millis>-<hex suffix>` ids; remote backends
/// use whatever document id the service assigns. Never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string form of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single to-do item as held in the reconciled view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Unique, immutable identifier.
    pub id: TaskId,
    /// Trimmed, never empty.
    pub title: String,
    /// Trimmed free text, may be empty.
    pub description: String,
    /// Date-valued string; `None` means no due date.
    pub due_date: Option<String>,
    /// Whether the task is done.
    pub completed: bool,
    /// Creation time in milliseconds since epoch. Used only for ordering.
    pub created_at: u64,
    /// Identity that created the task. Used only for access filtering.
    pub owner_id: Option<String>,
}

impl Task {
    /// Builds a task from an already sanitized draft.
    #[must_use]
    pub fn from_draft(id: TaskId, draft: TaskDraft, created_at: u64, owner_id: Option<String>) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            due_date: draft.due_date,
            completed: draft.completed,
            created_at,
            owner_id,
        }
    }

    /// Applies the fields present in `patch`. `id`, `created_at` and
    /// `owner_id` are never touched.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(due_date) = &patch.due_date {
            self.due_date.clone_from(due_date);
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }
}

/// User-supplied task fields, as entered in a create or edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    /// Raw title text.
    pub title: String,
    /// Raw description text.
    pub description: String,
    /// Raw due date; blank values are treated as absent.
    pub due_date: Option<String>,
    /// Initial completion state.
    pub completed: bool,
}

impl TaskDraft {
    /// A draft with only a title, as produced by the quick-add field.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Trims title and description and drops a blank due date.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TitleEmpty`] if the trimmed title is empty.
    pub fn sanitized(self) -> Result<Self, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::TitleEmpty);
        }
        Ok(Self {
            title: title.to_string(),
            description: self.description.trim().to_string(),
            due_date: normalize_due_date(self.due_date),
            completed: self.completed,
        })
    }

    /// Converts a sanitized draft into a patch that overwrites every
    /// editable field.
    #[must_use]
    pub fn into_patch(self) -> TaskPatch {
        TaskPatch {
            title: Some(self.title),
            description: Some(self.description),
            due_date: Some(self.due_date),
            completed: Some(self.completed),
        }
    }
}

/// Partial update of a task's editable fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New due date; `Some(None)` clears it.
    pub due_date: Option<Option<String>>,
    /// New completion state.
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// A patch that only sets the completion flag.
    #[must_use]
    pub const fn completed(value: bool) -> Self {
        Self {
            title: None,
            description: None,
            due_date: None,
            completed: Some(value),
        }
    }
}

/// Maps blank due dates to `None`, leaving other values untouched.
#[must_use]
pub fn normalize_due_date(value: Option<String>) -> Option<String> {
    value.filter(|d| !d.trim().is_empty())
}
