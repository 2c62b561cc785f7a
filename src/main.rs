mod api;
mod config;
mod cycle;
mod error;
mod fs;
mod state;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use api::client::ApiClient;
use config::SettingsStore;
use cycle::AnnouncementCycle;
use error::CompanionError;
use state::{PersistedDeviceState, BACKUP_EXCLUDED_FILE};

#[derive(Parser, Debug)]
#[command(name = "octofarm-companion", version, about = "Announces this printer host to OctoFarm")]
struct Cli {
    /// Settings file (host configuration). Defaults to <data-dir>/settings.json
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory holding the persisted device state
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Announce periodically until interrupted (default)
    Run,
    /// Check that a URL points at a reachable OctoFarm server
    TestConnection {
        url: String,
    },
    /// Request an access token with the given credentials and report the result
    TestCredentials {
        url: String,
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        client_secret: Option<String>,
    },
    /// Print the file names that must be left out of host backups
    BackupExcludes,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Optional .env next to the binary's working directory
    let _ = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<(), CompanionError> {
    // Data dir: --data-dir > OCTOFARM_COMPANION_DATA_DIR > platform data dir
    let data_dir = cli
        .data_dir
        .or_else(|| std::env::var_os("OCTOFARM_COMPANION_DATA_DIR").map(PathBuf::from))
        .or_else(|| dirs::data_dir().map(|d| d.join("octofarm-companion")))
        .unwrap_or_else(|| PathBuf::from("data"));
    let settings_path = cli
        .settings
        .unwrap_or_else(|| data_dir.join("settings.json"));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(settings_path, data_dir).await,
        Command::TestConnection { url } => {
            let settings = SettingsStore::open(&settings_path)?;
            let client = ApiClient::new(Duration::from_secs(settings.settings().request_timeout));
            let version = api::version::fetch_version(&client, &url).await?;
            println!("{}", serde_json::to_string_pretty(&version)?);
            Ok(())
        }
        Command::TestCredentials {
            url,
            client_id,
            client_secret,
        } => {
            let settings = SettingsStore::open(&settings_path)?;
            let api = ApiClient::new(Duration::from_secs(settings.settings().request_timeout));
            let mut persisted = PersistedDeviceState::new(&data_dir);
            let state = cycle::test_credentials(
                &api,
                &mut persisted,
                &url,
                client_id.as_deref(),
                client_secret.as_deref(),
            )
            .await?;
            println!("{}", serde_json::json!({ "state": state }));
            Ok(())
        }
        Command::BackupExcludes => {
            println!("{}", BACKUP_EXCLUDED_FILE);
            Ok(())
        }
    }
}

async fn run(settings_path: PathBuf, data_dir: PathBuf) -> Result<(), CompanionError> {
    log::info!("OctoFarm companion starting...");

    let mut settings = SettingsStore::open(&settings_path)?;
    settings.apply_startup_defaults()?;
    let device_uuid = settings.ensure_device_uuid()?;

    let mut persisted = PersistedDeviceState::new(&data_dir);
    persisted.load()?;
    log::info!(
        "Device {} using data file {}",
        device_uuid,
        persisted.path().display()
    );

    let Some(interval) = settings.settings().ping_interval() else {
        log::info!("Periodic announcement disabled ('ping' is unset or 0)");
        return Ok(());
    };

    let api = ApiClient::new(Duration::from_secs(settings.settings().request_timeout));
    let mut cycle = AnnouncementCycle::new(api, settings, persisted);
    cycle
        .run(interval, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal, stopping: {}", e);
            }
        })
        .await;

    log::info!("OctoFarm companion stopped (last state: {})", cycle.state());
    Ok(())
}
