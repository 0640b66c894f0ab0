use std::path::PathBuf;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use padwatch::config::{default_config_path, AppConfig, PollMode};
use padwatch::controller::{ControllerHandle, ControllerSettings};
use padwatch::platform::gilrs_backend::GilrsBackend;
use padwatch::platform::simulated::SimulatedBackend;

#[derive(Parser, Debug)]
#[command(name = "padwatch")]
#[command(version)]
#[command(about = "Watch connected gamepads, report button edges and drive rumble motors")]
struct Cli {
    /// Config file (created with defaults if missing)
    #[arg(long, env = "PADWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the poll mode from the config file
    #[arg(long, value_enum)]
    mode: Option<PollMode>,

    /// Use a simulated gamepad instead of real hardware
    #[arg(long)]
    simulate: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup()?;

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let created = AppConfig::ensure_default_config(&config_path)
        .await
        .map_err(|e| eyre!("Failed to prepare config: {}", e))?;
    let mut config = AppConfig::load(&config_path)
        .await
        .map_err(|e| eyre!("Failed to load config: {}", e))?;
    if let Some(mode) = cli.mode {
        config.poll.mode = mode;
    }

    let level = match cli.verbose {
        0 => config.logging.level()?,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    setup_logging_env(level);

    info!("padwatch {} starting", env!("CARGO_PKG_VERSION"));
    if created {
        info!("Wrote default config to {}", config_path.display());
    } else {
        info!("Using config {}", config_path.display());
    }

    let settings = ControllerSettings::from(&config);

    let (handle, demo) = if cli.simulate {
        warn!("Running with a simulated gamepad");
        let backend = SimulatedBackend::new();
        let factory_backend = backend.clone();
        let handle = ControllerHandle::spawn(Some(settings), move || Ok(factory_backend))
            .await
            .map_err(|e| eyre!("Failed to spawn controller: {}", e))?;
        let demo = backend.spawn_demo(handle.cancellation_token());
        (handle, Some(demo))
    } else {
        let handle = ControllerHandle::spawn(Some(settings), GilrsBackend::new)
            .await
            .map_err(|e| eyre!("Failed to spawn controller: {}", e))?;
        (handle, None)
    };

    info!("Press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for Ctrl-C: {}", e))?;
    info!("Shutdown requested");

    let stats = handle
        .shutdown()
        .await
        .map_err(|e| eyre!("Controller shutdown failed: {}", e))?;
    if let Some(demo) = demo {
        demo.await
            .map_err(|e| eyre!("Simulated gamepad task failed: {}", e))?;
    }

    info!(
        "{} ticks, {} readings, {} edges, {} vibration writes ({} failed), avg tick {:.3} ms",
        stats.ticks,
        stats.readings,
        stats.edges,
        stats.vibration_writes,
        stats.failed_writes,
        stats.average_tick().as_secs_f64() * 1000.0
    );
    info!("Exiting...");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .compact()
        .init();
}
