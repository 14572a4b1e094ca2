//! `Tasklist`: task list manager.
//!
//! Runs a line-oriented shell over the reconciliation engine. With a
//! complete `[cloud]` configuration the shell runs in cloud mode (sign-in
//! required, tasks scoped to the signed-in owner); otherwise tasks are kept
//! in memory for the session.
//!
//! ```bash
//! # Local mode
//! cargo run --bin tasklist
//!
//! # Cloud mode via environment variables
//! TASKLIST_API_KEY=... TASKLIST_AUTH_DOMAIN=... TASKLIST_PROJECT_ID=... \
//! TASKLIST_STORAGE_BUCKET=... TASKLIST_MESSAGING_SENDER_ID=... \
//! TASKLIST_APP_ID=... cargo run --bin tasklist
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use tasklist::auth::form::{AuthForm, AuthMode};
use tasklist::auth::memory::MemoryAuthService;
use tasklist::auth::{DisabledAuth, IdentityProvider};
use tasklist::cloud::memory::MemoryCollection;
use tasklist::config::{BackendSelection, CliArgs, ClientConfig};
use tasklist::engine::{EngineEvent, TaskEngine};
use tasklist::render::{render_list, render_status};
use tasklist::shell::{self, Command, DialogField, HELP};
use tasklist::store::TaskStore;
use tasklist::store::local::LocalStore;
use tasklist::store::remote::RemoteStore;
use tasklist_proto::task::{TaskDraft, TaskId};

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file; stdout belongs to the shell.
    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref());

    tracing::info!("tasklist starting");

    let result = match config.backend() {
        BackendSelection::Local => {
            let engine = TaskEngine::new(Arc::new(LocalStore::new()), Arc::new(DisabledAuth::new()));
            run_shell(engine, &config).await
        }
        BackendSelection::Cloud(settings) => {
            tracing::info!(
                project_id = %settings.project_id,
                auth_domain = %settings.auth_domain,
                "cloud mode (in-process service)"
            );
            let store = RemoteStore::new(Arc::new(MemoryCollection::new()));
            let engine = TaskEngine::new(Arc::new(store), Arc::new(MemoryAuthService::new()));
            run_shell(engine, &config).await
        }
    };

    tracing::info!("tasklist exiting");
    result
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("tasklist.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Shell-side state that lives outside the engine.
#[derive(Default)]
struct ShellState {
    auth_form: AuthForm,
    /// Values typed into the open dialog.
    dialog_values: TaskDraft,
}

fn draw<S: TaskStore, A: IdentityProvider>(engine: &TaskEngine<S, A>, config: &ClientConfig) {
    println!(
        "{}",
        render_status(engine.backend_kind(), engine.identity(), engine.auth_error())
    );
    let dialog = engine.dialog();
    if dialog.open {
        let label = dialog
            .editing()
            .map_or_else(|| "new task".to_string(), |id| format!("editing {id}"));
        println!("  [{label}] use `set`, then `save`, `cancel` or `drop`");
    }
    println!(
        "{}",
        render_list(engine.tasks(), engine.incomplete_count(), &config.due_date_format)
    );
}

fn task_at<S: TaskStore, A: IdentityProvider>(engine: &TaskEngine<S, A>, position: usize) -> Option<TaskId> {
    let id = engine.tasks().get(position - 1).map(|t| t.id.clone());
    if id.is_none() {
        println!("no task at position {position}");
    }
    id
}

/// Runs one command. Returns `false` when the shell should exit.
async fn execute<S: TaskStore, A: IdentityProvider>(
    engine: &mut TaskEngine<S, A>,
    state: &mut ShellState,
    command: Command,
    config: &ClientConfig,
) -> bool {
    let outcome = match command {
        Command::Quit => return false,
        Command::Help => {
            println!("{HELP}");
            return true;
        }
        Command::List => Ok(()),
        Command::Add(title) => engine.add_task(&title).await.map_err(|e| e.to_string()),
        Command::New => engine
            .open_create_dialog()
            .map(|()| state.dialog_values = engine.dialog().values.clone())
            .map_err(|e| e.to_string()),
        Command::Edit(position) => match task_at(engine, position) {
            Some(id) => engine
                .open_edit_dialog(&id)
                .map(|()| state.dialog_values = engine.dialog().values.clone())
                .map_err(|e| e.to_string()),
            None => return true,
        },
        Command::Set(field) => {
            if !engine.dialog().open {
                println!("no dialog open (use `new` or `edit <n>`)");
                return true;
            }
            let values = &mut state.dialog_values;
            match field {
                DialogField::Title(v) => values.title = v,
                DialogField::Description(v) => values.description = v,
                DialogField::DueDate(v) => values.due_date = Some(v),
                DialogField::Completed(v) => values.completed = v,
            }
            return true;
        }
        Command::Save => {
            if !engine.dialog().open {
                println!("no dialog open");
                return true;
            }
            let mode = engine.dialog().mode.clone();
            engine
                .submit_dialog(state.dialog_values.clone(), mode)
                .await
                .map_err(|e| e.to_string())
        }
        Command::Cancel => {
            engine.close_dialog();
            Ok(())
        }
        Command::DeleteFromDialog => engine.delete_from_dialog().await.map_err(|e| e.to_string()),
        Command::Toggle(position) => match task_at(engine, position) {
            Some(id) => engine.toggle_task(&id).await.map_err(|e| e.to_string()),
            None => return true,
        },
        Command::Remove(position) => match task_at(engine, position) {
            Some(id) => engine.delete_task(&id).await.map_err(|e| e.to_string()),
            None => return true,
        },
        Command::SignIn { email, password } => {
            state.auth_form.mode = AuthMode::SignIn;
            submit_auth(engine, &mut state.auth_form, email, password).await
        }
        Command::SignUp { email, password } => {
            state.auth_form.mode = AuthMode::SignUp;
            submit_auth(engine, &mut state.auth_form, email, password).await
        }
        Command::Login { email, password } => {
            submit_auth(engine, &mut state.auth_form, email, password).await
        }
        Command::ToggleAuthMode => {
            engine.toggle_auth_mode(&mut state.auth_form);
            println!("auth form mode: {:?}", state.auth_form.mode);
            Ok(())
        }
        Command::SignOut => {
            engine.sign_out().await;
            Ok(())
        }
        Command::Dismiss => {
            engine.dismiss_auth_error();
            Ok(())
        }
    };
    if let Err(message) = outcome {
        println!("error: {message}");
    }
    engine.drain_pending();
    if !engine.dialog().open {
        state.dialog_values = TaskDraft::default();
    }
    draw(engine, config);
    true
}

async fn submit_auth<S: TaskStore, A: IdentityProvider>(
    engine: &mut TaskEngine<S, A>,
    form: &mut AuthForm,
    email: String,
    password: String,
) -> Result<(), String> {
    form.fill(email, password);
    engine
        .submit_auth_form(form)
        .await
        .map_err(|e| e.to_string())
}

/// Main loop: reads commands from stdin while applying identity changes and
/// snapshots as they arrive.
async fn run_shell<S: TaskStore, A: IdentityProvider>(
    mut engine: TaskEngine<S, A>,
    config: &ClientConfig,
) -> io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut state = ShellState::default();
    let mut events_open = true;

    println!("tasklist ({} mode). Type `help` for commands.", engine.backend_kind());
    draw(&engine, config);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match shell::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(command)) => {
                        if !execute(&mut engine, &mut state, command, config).await {
                            break;
                        }
                    }
                    Err(e) => println!("{e}"),
                }
            }
            event = engine.next_event(), if events_open => {
                match event {
                    Some(EngineEvent::SnapshotIgnored { revision }) => {
                        tracing::debug!(revision, "ignored snapshot");
                    }
                    Some(event) => {
                        tracing::debug!(?event, "engine event");
                        draw(&engine, config);
                    }
                    None => events_open = false,
                }
            }
        }
    }
    Ok(())
}
