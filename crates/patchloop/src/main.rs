mod config;
mod runner;
mod server;
mod webhook;
mod workspace;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use patchloop_core::RunOutcome;
use patchloop_logging::{LogFormat, Logger};

use config::Settings;
use runner::{FlowRequest, FlowRunner};

/// Events mirrored as JSON lines when `--log-dir` is set
const EVENTS_FILE_NAME: &str = "events.jsonl";

#[derive(Parser, Debug)]
#[command(
    name = "patchloop",
    about = "Turns labelled issues into pull requests and iterates on review feedback",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Config file (default: ./patchloop.toml, then the global config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Diagnostic log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Also write logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Output final result as JSON
    #[arg(long, global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate changes for an issue and open a pull request
    CreateChange {
        /// Issue URL
        #[arg(long)]
        task: String,
    },
    /// Revise a pull request from its review feedback
    ApplyFix {
        /// Pull request URL
        #[arg(long)]
        change: String,
        /// Issue URL the pull request resolves
        #[arg(long)]
        task: String,
    },
    /// Review a pull request against its issue and post the verdict
    Review {
        /// Pull request URL
        #[arg(long)]
        change: String,
        /// Issue URL the pull request resolves
        #[arg(long)]
        task: String,
    },
    /// Serve the GitHub webhook endpoint
    Serve {
        /// Address to listen on (default: server.bind, then 0.0.0.0:8000)
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_format: LogFormat = cli.log_format.into();
    let _guard = patchloop_logging::init_tracing(&cli.log_level, log_format, cli.log_dir.as_deref());

    match run(cli, log_format).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli, log_format: LogFormat) -> Result<i32> {
    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let settings = Settings::load(cli.config.as_deref(), &working_dir)?;
    let logger = Arc::new(create_logger(log_format, cli.log_dir.as_deref())?);

    let request = match cli.command {
        Commands::CreateChange { task } => FlowRequest::CreateChange { task },
        Commands::ApplyFix { change, task } => FlowRequest::ApplyFix { change, task },
        Commands::Review { change, task } => FlowRequest::Review { change, task },
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.bind_addr().to_string());
            let runner = FlowRunner::new(Arc::new(settings), logger);
            server::serve(runner, &bind).await?;
            return Ok(0);
        }
    };

    let runner = FlowRunner::new(Arc::new(settings), logger);
    let outcome = runner.run(&working_dir, &request).await?;

    if cli.json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(outcome.exit_code())
}

fn create_logger(format: LogFormat, log_dir: Option<&Path>) -> Result<Logger> {
    match log_dir {
        Some(dir) => {
            let path = dir.join(EVENTS_FILE_NAME);
            Logger::with_file(format, &path)
                .with_context(|| format!("Failed to open {}", path.display()))
        }
        None => Ok(Logger::new(format)),
    }
}

fn print_outcome(outcome: &RunOutcome) {
    eprintln!();
    match outcome {
        RunOutcome::Published {
            change_url,
            branch,
            files,
        } => {
            eprintln!("{}", "=== PUBLISHED ===".bright_green().bold());
            eprintln!("Pull request: {}", change_url);
            eprintln!("Branch: {}", branch);
            eprintln!("Files: {}", files.join(", "));
        }
        RunOutcome::Rejected { reason } => {
            eprintln!("{}", "=== REJECTED ===".bright_yellow().bold());
            eprintln!("Reason: {}", reason);
        }
        RunOutcome::NoChanges => {
            eprintln!("{}", "=== NO CHANGES ===".bright_yellow().bold());
            eprintln!("The backend produced no edits; nothing was pushed.");
        }
        RunOutcome::PublishFailed { branch, error } => {
            eprintln!("{}", "=== PUBLISH FAILED ===".bright_red().bold());
            eprintln!("Branch: {}", branch);
            eprintln!("Error: {}", error);
        }
        RunOutcome::BudgetExhausted {
            rejections,
            max_iterations,
        } => {
            eprintln!("{}", "=== BUDGET EXHAUSTED ===".bright_red().bold());
            eprintln!("Rejections: {} (limit {})", rejections, max_iterations);
            eprintln!("Human intervention is needed.");
        }
        RunOutcome::Reviewed {
            change_url,
            decision,
        } => {
            eprintln!("{}", "=== REVIEWED ===".bright_cyan().bold());
            eprintln!("Pull request: {}", change_url);
            eprintln!("Decision: {}", decision.tag());
        }
    }
}
