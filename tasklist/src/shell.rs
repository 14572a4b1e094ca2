//! Line commands accepted by the interactive shell.
//!
//! Tasks are addressed by their 1-based position in the rendered list.

use thiserror::Error;

/// Errors produced while parsing a command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// First word is not a known command.
    #[error("unknown command: {0} (try `help`)")]
    UnknownCommand(String),
    /// A required argument is missing.
    #[error("usage: {0}")]
    Usage(&'static str),
    /// A position argument is not a positive number.
    #[error("not a list position: {0}")]
    BadPosition(String),
}

/// A dialog field that `set` can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogField {
    Title(String),
    Description(String),
    DueDate(String),
    Completed(bool),
}

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    New,
    Edit(usize),
    Set(DialogField),
    Save,
    Cancel,
    DeleteFromDialog,
    Toggle(usize),
    Remove(usize),
    List,
    SignIn { email: String, password: String },
    SignUp { email: String, password: String },
    /// Submit the auth form in whichever mode it is in.
    Login { email: String, password: String },
    SignOut,
    ToggleAuthMode,
    Dismiss,
    Help,
    Quit,
}

/// Help text listing every command.
pub const HELP: &str = "\
commands:
  add <title>              quick-add a task
  new                      open the create dialog
  edit <n>                 open the edit dialog for task n
  set title|desc|due <v>   change a dialog field
  set done yes|no          change the dialog completion flag
  save | cancel | drop     submit, close, or delete from the dialog
  toggle <n> | rm <n>      complete/reopen or delete task n
  ls                       show the list
  signin <email> <pw>      sign in
  signup <email> <pw>      create an account
  login <email> <pw>       submit the auth form in its current mode
  mode                     switch sign-in/sign-up form (clears message)
  signout | dismiss | help | quit";

fn position(arg: Option<&str>, usage: &'static str) -> Result<usize, ParseError> {
    let arg = arg.ok_or(ParseError::Usage(usage))?;
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ParseError::BadPosition(arg.to_string())),
    }
}

fn credentials(rest: &str, usage: &'static str) -> Result<(String, String), ParseError> {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(email), Some(password)) => Ok((email.to_string(), password.to_string())),
        _ => Err(ParseError::Usage(usage)),
    }
}

fn parse_set(rest: &str) -> Result<DialogField, ParseError> {
    const USAGE: &str = "set title|desc|due <value> | set done yes|no";
    let (field, value) = rest.split_once(' ').unwrap_or((rest, ""));
    let value = value.trim().to_string();
    match field {
        "title" => Ok(DialogField::Title(value)),
        "desc" | "description" => Ok(DialogField::Description(value)),
        "due" => Ok(DialogField::DueDate(value)),
        "done" => match value.as_str() {
            "yes" | "y" | "true" => Ok(DialogField::Completed(true)),
            "no" | "n" | "false" => Ok(DialogField::Completed(false)),
            _ => Err(ParseError::Usage(USAGE)),
        },
        _ => Err(ParseError::Usage(USAGE)),
    }
}

/// Parses one input line. Blank lines parse to `Ok(None)`.
///
/// # Errors
///
/// Returns [`ParseError`] for unknown commands and malformed arguments.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let command = match word {
        // Blank titles are passed through; the engine rejects them.
        "add" => Command::Add(rest.to_string()),
        "new" => Command::New,
        "edit" => Command::Edit(position(rest.split_whitespace().next(), "edit <n>")?),
        "set" => Command::Set(parse_set(rest)?),
        "save" => Command::Save,
        "cancel" => Command::Cancel,
        "drop" => Command::DeleteFromDialog,
        "toggle" => Command::Toggle(position(rest.split_whitespace().next(), "toggle <n>")?),
        "rm" => Command::Remove(position(rest.split_whitespace().next(), "rm <n>")?),
        "ls" => Command::List,
        "signin" => {
            let (email, password) = credentials(rest, "signin <email> <password>")?;
            Command::SignIn { email, password }
        }
        "signup" => {
            let (email, password) = credentials(rest, "signup <email> <password>")?;
            Command::SignUp { email, password }
        }
        "login" => {
            let (email, password) = credentials(rest, "login <email> <password>")?;
            Command::Login { email, password }
        }
        "signout" => Command::SignOut,
        "mode" => Command::ToggleAuthMode,
        "dismiss" => Command::Dismiss,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}
