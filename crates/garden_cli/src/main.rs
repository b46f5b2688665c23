use clap::{CommandFactory, Parser};
use garden_cli::cli::{Cli, Command, collect_config_overrides};
use garden_core::config::{Config, load_config_with_fallback, merge_overrides};
use garden_core::error::AppError;
use garden_core::model::{TaskOrigin, TaskRecord};
use garden_core::sync::{
    BackgroundOutcome, Bootstrap, SessionStatus, SkipReason, SyncOutcome, SyncSession,
};
use std::io::{self, BufRead};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tokio::runtime::Runtime;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Task")]
    name: String,
    #[tabled(rename = "Completed")]
    completed_at: String,
}

fn origin_label(origin: TaskOrigin) -> &'static str {
    match origin {
        TaskOrigin::None => "not connected",
        TaskOrigin::Cache => "cached",
        TaskOrigin::Remote => "synced",
        TaskOrigin::Demo => "demo",
        TaskOrigin::Placeholder => "placeholder",
    }
}

fn describe_background(outcome: BackgroundOutcome) -> String {
    match outcome {
        BackgroundOutcome::Skipped(SkipReason::NoCredential) => "skipped, not connected".into(),
        BackgroundOutcome::Skipped(SkipReason::Demo) => "skipped in demo mode".into(),
        BackgroundOutcome::Skipped(SkipReason::NoCursor) => "skipped, no previous sync".into(),
        BackgroundOutcome::Skipped(SkipReason::Busy) => "skipped, sync already running".into(),
        BackgroundOutcome::Unchanged => "no new tasks".into(),
        BackgroundOutcome::Merged(stats) => {
            format!("{} new, {} updated", stats.new, stats.updated)
        }
        BackgroundOutcome::Failed(kind) => format!("failed ({}), kept cached tasks", kind.code()),
    }
}

fn print_tasks_plain(outcome: &SyncOutcome) {
    if outcome.tasks.is_empty() {
        println!("No tasks ({})", origin_label(outcome.origin));
        return;
    }

    println!(
        "{} tasks ({})",
        outcome.tasks.len(),
        origin_label(outcome.origin)
    );
    let rows: Vec<TaskRow> = outcome
        .tasks
        .iter()
        .map(|task: &TaskRecord| TaskRow {
            id: task.gid.clone(),
            name: task.name.clone(),
            completed_at: task.completed_at.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn outcome_json(outcome: &SyncOutcome) -> serde_json::Value {
    serde_json::json!({
        "origin": outcome.origin,
        "count": outcome.tasks.len(),
        "tasks": outcome.tasks,
        "stats": outcome.stats,
        "error": outcome.error.as_ref().map(|err| serde_json::json!({
            "code": err.kind.code(),
            "message": err.user_message(),
            "detail": err.detail,
        })),
    })
}

fn print_status(status: &SessionStatus, json: bool) {
    if json {
        println!("{}", serde_json::json!(status));
        return;
    }

    if !status.connected {
        println!("Not connected");
        return;
    }
    if status.demo {
        println!("Connected in demo mode");
        return;
    }
    println!("Connected");
    println!("Cached tasks: {}", status.cached_tasks);
    println!(
        "Captured at: {}{}",
        status.captured_at.as_deref().unwrap_or("-"),
        if status.stale { " (stale)" } else { "" }
    );
    println!("Sync cursor: {}", status.cursor.as_deref().unwrap_or("-"));
}

/// Prints the task list and turns a failed fetch into the command's error.
fn finish_outcome(outcome: SyncOutcome, json: bool) -> Result<(), AppError> {
    if json {
        println!("{}", outcome_json(&outcome));
    } else {
        print_tasks_plain(&outcome);
    }

    match outcome.error {
        Some(err) => Err(AppError::from(err)),
        None => Ok(()),
    }
}

async fn finish_bootstrap(bootstrap: Bootstrap, json: bool) -> Result<(), AppError> {
    let Bootstrap {
        outcome,
        background,
    } = bootstrap;

    let background = match background {
        Some(handle) => match handle.await {
            Ok(result) => Some(result),
            Err(err) => {
                warn!(error = %err, "background refresh task did not finish");
                None
            }
        },
        None => None,
    };

    if json {
        let mut payload = outcome_json(&outcome);
        payload["background"] = match background {
            Some(result) => serde_json::Value::String(describe_background(result)),
            None => serde_json::Value::Null,
        };
        println!("{payload}");
    } else {
        print_tasks_plain(&outcome);
        if let Some(result) = background {
            println!("Background refresh: {}", describe_background(result));
        }
    }

    match outcome.error {
        Some(err) => Err(AppError::from(err)),
        None => Ok(()),
    }
}

async fn run_command(command: Command, json: bool, session: &SyncSession) -> Result<(), AppError> {
    match command {
        Command::Connect { token } => {
            let bootstrap = session.connect(&token).await?;
            finish_bootstrap(bootstrap, json).await?;
        }
        Command::Disconnect => {
            session.disconnect().await;
            if json {
                println!("{}", serde_json::json!({ "connected": false }));
            } else {
                println!("Disconnected. Cached tasks cleared.");
            }
        }
        Command::Show => {
            let bootstrap = session.bootstrap().await;
            finish_bootstrap(bootstrap, json).await?;
        }
        Command::Refresh => {
            let outcome = session.refresh().await?;
            finish_outcome(outcome, json)?;
        }
        Command::History => {
            let outcome = session.fetch_full_history().await?;
            finish_outcome(outcome, json)?;
        }
        Command::Status => print_status(&session.status(), json),
    }

    Ok(())
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                args.push(current.clone());
                current.clear();
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn load_config(overrides: &[String]) -> Result<Config, AppError> {
    let loaded = load_config_with_fallback();
    if let Some(err) = loaded.error.as_ref() {
        eprintln!("WARNING: using default configuration: {err}");
    }
    let overrides = collect_config_overrides(overrides)?;
    Ok(merge_overrides(&loaded.config, &overrides))
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn build_runtime() -> Result<Runtime, AppError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::io(err.to_string()))
}

/// Line-oriented shell that keeps one session alive, so a demo connection
/// lasts until the shell exits.
fn run_interactive() -> Result<(), AppError> {
    let config = load_config(&[])?;
    init_tracing(&config.log_filter);
    let session = SyncSession::from_config(&config)?;
    let runtime = build_runtime()?;

    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock
            .read_line(&mut input)
            .map_err(|err| AppError::io(err.to_string()))?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("garden".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };
        if !cli.config_override.is_empty() {
            eprintln!("ERROR: invalid_input - config overrides apply only when starting garden");
            continue;
        }

        if let Err(err) = runtime.block_on(run_command(cli.command, cli.json, &session)) {
            eprintln!("ERROR: {}", err);
        }
    }

    Ok(())
}

fn run_once(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli.config_override)?;
    init_tracing(&config.log_filter);
    let session = SyncSession::from_config(&config)?;
    let runtime = build_runtime()?;
    runtime.block_on(run_command(cli.command, cli.json, &session))
}

fn main() {
    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        if let Err(err) = run_interactive() {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) {
                err.exit();
            }
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_once(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
