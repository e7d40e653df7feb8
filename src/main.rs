#![forbid(unsafe_code)]

//! `agent-console` — headless workflow runner.
//!
//! Starts one supervised agent session, prints every notification as a
//! JSON line, and answers pending questions interactively from stdin.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use agent_console::config::GlobalConfig;
use agent_console::models::session::ExecutionState;
use agent_console::notify::Notification;
use agent_console::supervisor::SessionManager;
use agent_console::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-console", about = "Supervised agent workflow runner", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured base directory for agent processes.
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute an existing workflow definition.
    Run {
        /// Workflow name under the configured workflows directory.
        workflow: String,
    },
    /// Create a new workflow interactively from a goal statement.
    Create {
        /// Goal statement handed to the workflow mapper.
        goal: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format);
    info!("agent-console bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(base_dir) = args.base_dir {
        config.base_dir = base_dir;
    }

    let (tx, mut rx) = mpsc::channel(256);
    let manager = SessionManager::new(config, Some(tx));

    let summary = match &args.command {
        Command::Run { workflow } => manager.start_execution(workflow).await?,
        Command::Create { goal } => manager.start_workflow_session(goal).await?,
    };
    let execution_id = summary.id;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    while let Some(notification) = rx.recv().await {
        print_notification(&notification);

        match &notification {
            Notification::ExecutionStateChange { state, execution, .. } => {
                if state.is_terminal() {
                    if *state == ExecutionState::Failed {
                        error!(
                            session_id = execution_id.as_str(),
                            error = execution.error.as_deref().unwrap_or(""),
                            "session failed"
                        );
                        std::process::exit(1);
                    }
                    info!(session_id = execution_id.as_str(), state = %state, "session finished");
                    break;
                }
            }
            Notification::QuestionDetected { .. } | Notification::StructuredQuestionDetected { .. } => {
                answer_from_stdin(&manager, &execution_id, &mut stdin).await;
            }
            Notification::CliEvent { .. } => {}
        }
    }

    Ok(())
}

/// Read one answer line from stdin and resume the session with it.
async fn answer_from_stdin(
    manager: &SessionManager,
    execution_id: &str,
    stdin: &mut Lines<BufReader<Stdin>>,
) {
    eprintln!("answer> ");
    match stdin.next_line().await {
        Ok(Some(answer)) => {
            if let Err(err) = manager.answer_question(execution_id, answer.trim()).await {
                warn!(%err, session_id = execution_id, "failed to answer question");
            }
        }
        Ok(None) => {
            warn!(session_id = execution_id, "stdin closed, question left pending");
        }
        Err(err) => {
            warn!(%err, session_id = execution_id, "failed to read answer from stdin");
        }
    }
}

/// Print one notification as a JSON line on stdout.
fn print_notification(notification: &Notification) {
    match serde_json::to_string(notification) {
        Ok(line) => println!("{line}"),
        Err(err) => warn!(%err, "failed to serialize notification"),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => fmt().with_env_filter(filter).with_writer(std::io::stderr).init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}
