//! chapbook - Entry Point
//!
//! Runs CHAP pipelines built from users' notebook code against registered
//! workflows.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use chapbook::app::options::AppOptions;
use chapbook::app::run::{run, Commands, DEV_USER};
use chapbook::app::state::AppState;
use chapbook::logs::{init_logging, LogOptions};
use chapbook::storage::settings::Settings;
use chapbook::utils::version_info;

#[derive(Parser)]
#[command(name = "chapbook")]
#[command(about = "CHAP workflow pipeline orchestration", long_about = None)]
struct Cli {
    /// JSON settings file
    #[arg(short, long, env = "CHAPBOOK_CONFIG", default_value = "chapbook.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: TopCommand,
}

#[derive(Subcommand)]
enum TopCommand {
    /// Print version information
    Version,

    #[command(flatten)]
    App(Commands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        TopCommand::Version => {
            println!("{}", serde_json::to_string_pretty(&version_info())?);
            return Ok(());
        }
        TopCommand::App(command) => command,
    };

    // Retrieve the settings file
    let settings = Settings::load(&cli.config)
        .await
        .with_context(|| format!("Unable to read settings file {}", cli.config.display()))?;

    // Initialize logging; the guard flushes file logs on exit
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings.log_dir.clone(),
        log_file: (!settings.log_file.is_empty()).then(|| settings.log_file.clone()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = AppOptions::from_settings(&settings);
    info!(
        "Running chapbook {} (users {}, workflows {})",
        version_info().version,
        options.user_root.display(),
        options.registry.workflows_root.display()
    );
    let state = AppState::init(&options)?;

    let default_user = settings.dev_mode.then_some(DEV_USER);
    let result = tokio::select! {
        result = run(&state, command, default_user) => result,
        _ = await_shutdown_signal() => {
            Err(anyhow::anyhow!("interrupted"))
        }
    };

    if let Err(e) = state.shutdown().await {
        error!("Failed to shut down cleanly: {e}");
    }
    result
}

// dropping an in-flight run kills its pipeline process
async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    if tokio::signal::ctrl_c().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, shutting down...");
    }
}
