//! Shared data model for `Tasklist`: tasks, identities, and the document
//! shape persisted by the hosted task collection.

pub mod identity;
pub mod record;
pub mod task;
