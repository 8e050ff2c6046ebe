//! Command-line client for the collaborative task board.
//!
//! ```bash
//! taskboard login --email ada@example.com --password secret
//! taskboard create "Write release notes" --priority high --due 2024-06-01
//! taskboard move t1 done
//!
//! # Point at another backend and follow changes live
//! TASKBOARD_API_URL=http://10.0.0.5:3001/api \
//!     taskboard --notify-url ws://10.0.0.5:3001/ws watch
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use taskboard::commands::{self, Command, CommandContext};
use taskboard::config::{CliArgs, ClientConfig};
use taskboard::session::Session;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    // Logs go to a file so stdout carries only command output.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let session = match Session::load(&config.session_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(api = %config.api.base_url, "taskboard starting");
    let command = cli.command.unwrap_or(Command::Board);
    let result = match CommandContext::new(config, session) {
        Ok(mut ctx) => commands::execute(command, &mut ctx).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown so buffered
/// log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskboard.log");
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
