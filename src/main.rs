//! emuctl - Android emulator version manager
//!
//! Entry point: sets up logging, loads settings and dispatches one command.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use emuctl::commands::{
    BackupCommand, InstallCommand, ListInstalledCommand, RestoreCommand, ShareLogCommand,
    StopCommand, UpgradeCommand,
};
use emuctl::core::{ProcessRunner, Settings, APP_NAME, VERSION};
use emuctl::emulator::DEFAULT_DATA_DIR;
use emuctl::VersionManager;

#[derive(Parser)]
#[command(name = "emuctl", version, about = "Manage Android emulator versions, backups and logs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List installed Android versions
    List {
        #[arg(long)]
        json: bool,
    },
    /// Install an Android version (e.g. 14 or 14.0)
    Install { version: String },
    /// Move the emulator to another installed Android version
    Upgrade { version: String },
    /// Back up a device with adb backup, or pull a directory with --data-dir
    Backup {
        #[arg(long)]
        serial: Option<String>,
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_DATA_DIR)]
        data_dir: Option<String>,
    },
    /// Restore a device from an adb backup, or push a directory with --data-dir
    Restore {
        #[arg(long)]
        serial: Option<String>,
        #[arg(long, short)]
        input: Option<PathBuf>,
        #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_DATA_DIR)]
        data_dir: Option<String>,
    },
    /// Stop a running emulator
    Stop {
        #[arg(long)]
        serial: Option<String>,
    },
    /// Serve the log directory over HTTP when WEB_LOG is enabled
    ShareLog,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<emuctl::core::EmuError>() {
                Some(emu) => error!("{}", emu.user_message()),
                None => error!("{:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("{} v{} starting...", APP_NAME, VERSION);

    let settings = Settings::load().await?;
    let mut manager = VersionManager::new(Arc::new(ProcessRunner::new()), settings);

    match cli.command {
        Command::List { json } => ListInstalledCommand { json }.execute(&mut manager).await?,
        Command::Install { version } => InstallCommand { version }.execute(&mut manager).await?,
        Command::Upgrade { version } => UpgradeCommand { version }.execute(&mut manager).await?,
        Command::Backup { serial, output, data_dir } => {
            BackupCommand { serial, path: output, data_dir }
                .execute(&mut manager)
                .await?
        }
        Command::Restore { serial, input, data_dir } => {
            RestoreCommand { serial, path: input, data_dir }
                .execute(&mut manager)
                .await?
        }
        Command::Stop { serial } => StopCommand { serial }.execute(&mut manager).await?,
        Command::ShareLog => ShareLogCommand.execute(&mut manager).await?,
    }

    Ok(())
}
