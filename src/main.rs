use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use weather_warning_notifier::config::{self, Config};
use weather_warning_notifier::error::{NotifierError, Result};
use weather_warning_notifier::hass::HassClient;
use weather_warning_notifier::instance_lock::InstanceLock;
use weather_warning_notifier::notifier::WarningNotifier;

#[derive(Parser)]
#[command(name = "weather-warning-notifier")]
#[command(about = "Mirror a weather warning sensor into Home Assistant notifications")]
struct Cli {
    /// App options file (JSON with NotifyId, WeatherWarningEntity, ...)
    #[arg(long, env = "WEATHER_WARNING_CONFIG")]
    config: Option<PathBuf>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Load .env file before anything else
    config::load_dotenv();
    let cli = Cli::parse();
    init_logger();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting Weather Warning Notifier");

    let _lock = InstanceLock::acquire()?;

    let config_path = config::options_path(cli.config);
    let config = Config::load(config_path.as_deref())?;
    info!("Configuration loaded:");
    if let Some(path) = &config_path {
        info!("  Options file: {}", path.display());
    }
    info!("  Home Assistant: {}", config.hass.url);
    info!(
        "  Weather warning entity: {}",
        config.app.weather_warning_entity.as_deref().unwrap_or("-")
    );

    let client = HassClient::connect(&config.hass).await?;
    info!(
        "Connected to Home Assistant {}",
        client.ha_version().unwrap_or("(unknown version)")
    );
    let shutdown = CancellationToken::new();

    let Some(active) = WarningNotifier::start(&config.app, &client, &client, client.clone()).await?
    else {
        warn!("Notifier is inert, waiting for shutdown");
        wait_for_shutdown().await;
        return Ok(());
    };

    info!("Weather Warning Notifier is running");
    info!("  - Press Ctrl+C to exit");

    let mut task = tokio::spawn(active.run(shutdown.clone()));

    let connection_lost = tokio::select! {
        _ = wait_for_shutdown() => false,
        _ = &mut task => true,
    };

    shutdown.cancel();
    if connection_lost {
        return Err(NotifierError::ConnectionClosed);
    }
    if let Err(e) = task.await {
        error!("Notifier task failed: {}", e);
    }

    info!("Weather Warning Notifier stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }
}
