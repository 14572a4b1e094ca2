//! Document shape of a task in the hosted task collection.
//!
//! One document per task:
//!
//! ```text
//! { title, description, dueDate, completed, ownerId,
//!   createdAt: <server timestamp>, createdAtMillis: <client millis> }
//! ```
//!
//! Ordering always uses `createdAtMillis`. The server `createdAt` is
//! informational and only consulted when a document lacks the client value.
//! Documents are schemaless JSON, so decoding tolerates missing and `null`
//! fields.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::task::{Task, TaskDraft, TaskId, TaskPatch};

/// Errors converting between [`TaskRecord`] and raw JSON documents.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The document could not be encoded.
    #[error("record encode error: {0}")]
    Encode(serde_json::Error),
    /// The document does not have the task shape.
    #[error("record decode error: {0}")]
    Decode(serde_json::Error),
}

/// Timestamp assigned by the document service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerTimestamp {
    /// Whole seconds since epoch.
    pub seconds: i64,
    /// Sub-second nanoseconds.
    pub nanos: u32,
}

impl ServerTimestamp {
    /// Builds a timestamp from milliseconds since epoch.
    #[must_use]
    pub fn from_millis(ms: u64) -> Self {
        Self {
            seconds: i64::try_from(ms / 1000).unwrap_or(i64::MAX),
            nanos: u32::try_from((ms % 1000) * 1_000_000).unwrap_or(0),
        }
    }

    /// Milliseconds since epoch. Pre-epoch values clamp to zero.
    #[must_use]
    pub fn to_millis(self) -> u64 {
        let secs = u64::try_from(self.seconds).unwrap_or(0);
        secs.saturating_mul(1000) + u64::from(self.nanos / 1_000_000)
    }
}

/// A task document as stored by the hosted collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    /// Empty string means no due date.
    #[serde(deserialize_with = "null_as_default")]
    pub due_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub completed: bool,
    pub owner_id: Option<String>,
    /// Filled in by the service on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<ServerTimestamp>,
    /// Client clock at creation. Authoritative for ordering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at_millis: Option<u64>,
    /// Filled in by the service on every update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<ServerTimestamp>,
}

impl TaskRecord {
    /// Builds the document written for a new task. The server timestamp is
    /// left for the service to fill.
    #[must_use]
    pub fn new(draft: &TaskDraft, owner_id: &str, created_at_millis: u64) -> Self {
        Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            due_date: draft.due_date.clone().unwrap_or_default(),
            completed: draft.completed,
            owner_id: Some(owner_id.to_string()),
            created_at: None,
            created_at_millis: Some(created_at_millis),
            updated_at: None,
        }
    }

    /// Creation time used for ordering: `createdAtMillis`, else the server
    /// `createdAt`, else `now_ms` (a pending write seen before the server
    /// resolved its timestamp).
    #[must_use]
    pub fn created_millis(&self, now_ms: u64) -> u64 {
        self.created_at_millis
            .or_else(|| self.created_at.map(ServerTimestamp::to_millis))
            .unwrap_or(now_ms)
    }

    /// Converts the document into a view task.
    #[must_use]
    pub fn to_task(&self, id: TaskId, now_ms: u64) -> Task {
        Task {
            id,
            title: self.title.clone(),
            description: self.description.clone(),
            due_date: if self.due_date.is_empty() {
                None
            } else {
                Some(self.due_date.clone())
            },
            completed: self.completed,
            created_at: self.created_millis(now_ms),
            owner_id: self.owner_id.clone(),
        }
    }

    /// Applies an update document, stamping `updatedAt`.
    pub fn apply(&mut self, patch: &TaskPatch, updated_at: ServerTimestamp) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(due_date) = &patch.due_date {
            self.due_date = due_date.clone().unwrap_or_default();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        self.updated_at = Some(updated_at);
    }
}

/// Encodes a record as a raw JSON document.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn to_document(record: &TaskRecord) -> Result<serde_json::Value, CodecError> {
    serde_json::to_value(record).map_err(CodecError::Encode)
}

/// Decodes a raw JSON document into a record.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if a field has the wrong type.
pub fn from_document(document: serde_json::Value) -> Result<TaskRecord, CodecError> {
    serde_json::from_value(document).map_err(CodecError::Decode)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
