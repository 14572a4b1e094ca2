//! `Tasklist`: task list manager with local and cloud-synchronized storage.

pub mod auth;
pub mod cloud;
pub mod config;
pub mod engine;
pub mod render;
pub mod shell;
pub mod store;
