//! Plain-text rendering of the task view for the shell.

use std::fmt::Write as _;

use chrono::NaiveDate;

use tasklist_proto::identity::Identity;
use tasklist_proto::task::Task;

use crate::store::BackendKind;

/// Formats a stored `YYYY-MM-DD` due date with `format`. Values that do not
/// parse, or a format chrono rejects, are shown as stored.
#[must_use]
pub fn format_due_date(raw: &str, format: &str) -> String {
    let Ok(date) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") else {
        return raw.to_string();
    };
    let mut out = String::new();
    if write!(out, "{}", date.format(format)).is_err() {
        return raw.to_string();
    }
    out
}

/// One list line: 1-based position, checkbox, title, optional due date and
/// description.
#[must_use]
pub fn render_task_line(position: usize, task: &Task, due_format: &str) -> String {
    let mark = if task.completed { 'x' } else { ' ' };
    let mut line = format!("{position:>3}. [{mark}] {}", task.title);
    if let Some(due) = &task.due_date {
        let _ = write!(line, "  (due {})", format_due_date(due, due_format));
    }
    if !task.description.is_empty() {
        let _ = write!(line, "\n       {}", task.description);
    }
    line
}

/// The whole list followed by the counts line.
#[must_use]
pub fn render_list(tasks: &[Task], incomplete: usize, due_format: &str) -> String {
    if tasks.is_empty() {
        return "  (no tasks)\n  0 remaining of 0".to_string();
    }
    let mut out = String::new();
    for (i, task) in tasks.iter().enumerate() {
        out.push_str(&render_task_line(i + 1, task, due_format));
        out.push('\n');
    }
    let _ = write!(out, "  {incomplete} remaining of {}", tasks.len());
    out
}

/// Status line: backend, identity, and the pending auth message.
#[must_use]
pub fn render_status(
    backend: BackendKind,
    identity: Option<&Identity>,
    auth_error: Option<&str>,
) -> String {
    let mut out = match (backend, identity) {
        (BackendKind::Local, _) => "[local]".to_string(),
        (BackendKind::Remote, Some(identity)) => format!("[cloud] signed in as {}", identity.email),
        (BackendKind::Remote, None) => "[cloud] not signed in".to_string(),
    };
    if let Some(message) = auth_error {
        let _ = write!(out, "\n  ! {message}  (dismiss to clear)");
    }
    out
}
