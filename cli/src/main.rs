mod logging;
mod progress;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use audioscribe_core::{Config, SourceFile, TranscriptionWorkflow, WorkflowError};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::logging::Console;
use crate::progress::ProgressView;

/// Exit status for a run interrupted with Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Transcribe audio and video files with AssemblyAI")]
#[command(version)]
struct Cli {
    /// Config file to use instead of ~/.config/audioscribe/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file and print its transcript
    Transcribe {
        /// Audio or video file to transcribe
        file: PathBuf,
        /// Delay between status checks, in milliseconds
        #[arg(long, value_name = "N")]
        interval_ms: Option<u64>,
        /// Give up waiting after this many seconds (0 waits forever)
        #[arg(long, value_name = "N")]
        timeout_secs: Option<u64>,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Transcribe {
            file,
            interval_ms,
            timeout_secs,
        } => {
            apply_overrides(&mut config, interval_ms, timeout_secs)?;
            let console = Console::default();
            let _log_guard = logging::init(&config.logging, console.clone())?;
            transcribe(&config, &file, &console).await
        }
        Commands::Config => {
            config.api.api_key = config.api.resolve_api_key();
            print!("{}", config.to_redacted_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Apply command-line polling overrides on top of the loaded config.
fn apply_overrides(
    config: &mut Config,
    interval_ms: Option<u64>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    if let Some(interval) = interval_ms {
        config.polling.interval_ms = interval;
        config.polling.max_interval_ms = config.polling.max_interval_ms.max(interval);
    }
    if let Some(timeout) = timeout_secs {
        config.polling.max_wait_secs = timeout;
    }
    config.validate().context("Invalid command-line options")
}

async fn transcribe(config: &Config, path: &Path, console: &Console) -> Result<ExitCode> {
    let file = SourceFile::load(path).await?;
    let workflow = TranscriptionWorkflow::from_config(config)?;

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let view = ProgressView::spawn(workflow.subscribe(), console);
    let result = workflow.run_with_cancel(Some(file), &cancel).await;
    view.finish();
    interrupt.abort();

    match result {
        Ok(text) => {
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, kind = ?e.kind(), "Transcription failed");
            eprintln!("{}", e.user_message());
            Ok(ExitCode::from(exit_code_for(&e)))
        }
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Interrupt received, cancelling");
            cancel.cancel();
        }
        Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
    }
}

fn exit_code_for(err: &WorkflowError) -> u8 {
    match err {
        WorkflowError::Cancelled => EXIT_INTERRUPTED,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_transcribe_with_overrides() {
        let cli = Cli::parse_from([
            "scribe",
            "--config",
            "/tmp/scribe.toml",
            "transcribe",
            "talk.mp3",
            "--interval-ms",
            "500",
            "--timeout-secs",
            "60",
        ]);

        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/scribe.toml")));
        let Commands::Transcribe {
            file,
            interval_ms,
            timeout_secs,
        } = cli.command
        else {
            panic!("expected transcribe command");
        };
        assert_eq!(file, PathBuf::from("talk.mp3"));
        assert_eq!(interval_ms, Some(500));
        assert_eq!(timeout_secs, Some(60));
    }

    #[test]
    fn test_transcribe_requires_file() {
        assert!(Cli::try_parse_from(["scribe", "transcribe"]).is_err());
    }

    #[test]
    fn test_overrides_raise_backoff_cap() {
        let mut config = Config::default();
        apply_overrides(&mut config, Some(60_000), Some(0)).unwrap();

        assert_eq!(config.polling.interval_ms, 60_000);
        assert_eq!(config.polling.max_interval_ms, 60_000);
        assert_eq!(config.polling.max_wait_secs, 0);
    }

    #[test]
    fn test_zero_interval_override_is_rejected() {
        let mut config = Config::default();
        assert!(apply_overrides(&mut config, Some(0), None).is_err());
    }

    #[test]
    fn test_missing_config_file_gives_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_cancelled_run_exits_with_interrupt_code() {
        assert_eq!(exit_code_for(&WorkflowError::Cancelled), EXIT_INTERRUPTED);
        assert_eq!(exit_code_for(&WorkflowError::WorkflowBusy), 1);
    }
}
