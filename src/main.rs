//! automute - room mute reconciliation service
//!
//! Keeps exactly one display per shared input carrying audio.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use automute::config::ServiceConfig;
use automute::gate::{HttpConfigGate, StartupGate};
use automute::hub::HubSource;
use automute::service::{self, StopReason};
use automute::state::{DuplicateInputResolver, RoomStateManager, SingletonPolicy, StateMode};
use automute::store::{HttpStateStore, WireMode};

/// Automute - keep one audio carrier per shared input
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to an optional YAML configuration file
    #[arg(short, long, env = "AUTOMUTE_CONFIG")]
    config: Option<String>,

    /// Room id as found in the room database (BUILDING-ROOM)
    #[arg(long, env = "ROOM_ID")]
    room_id: Option<String>,

    /// Id of the device acting as room controller (BUILDING-ROOM-DEVICE)
    #[arg(long, env = "DEVICE_ID")]
    device_id: Option<String>,

    /// Address of the event hub
    #[arg(long, env = "HUB_ADDRESS")]
    hub_address: Option<String>,

    /// Address of the room inventory service
    #[arg(long, alias = "av-api", env = "STORE_ADDRESS")]
    store_address: Option<String>,

    /// Address of the room configuration database
    #[arg(long, alias = "db-address", env = "GATE_ADDRESS")]
    gate_address: Option<String>,

    /// Whether a display alone on its input is forced unmuted
    #[arg(long, value_parser = parse_singleton_policy)]
    singleton_policy: Option<SingletonPolicy>,

    /// Keep room state in memory or refetch it for every event
    #[arg(long, value_parser = parse_state_mode)]
    state_mode: Option<StateMode>,

    /// Send only mute flags or the whole room document on push
    #[arg(long, value_parser = parse_wire_mode)]
    wire_mode: Option<WireMode>,

    /// Seconds between room configuration checks while disabled (0 = park)
    #[arg(long)]
    gate_retry_secs: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'L', long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    /// Apply command-line values over the file configuration
    fn apply(self, mut config: ServiceConfig) -> ServiceConfig {
        if self.room_id.is_some() {
            config.room_id = self.room_id;
        }
        if self.device_id.is_some() {
            config.device_id = self.device_id;
        }
        if self.hub_address.is_some() {
            config.hub_address = self.hub_address;
        }
        if self.store_address.is_some() {
            config.store_address = self.store_address;
        }
        if self.gate_address.is_some() {
            config.gate_address = self.gate_address;
        }
        if let Some(policy) = self.singleton_policy {
            config.resolution.singleton_policy = policy;
        }
        if let Some(mode) = self.state_mode {
            config.resolution.state_mode = mode;
        }
        if let Some(mode) = self.wire_mode {
            config.resolution.wire_mode = mode;
        }
        if let Some(secs) = self.gate_retry_secs {
            config.gate.retry_interval_secs = secs;
        }
        config
    }
}

fn parse_singleton_policy(s: &str) -> Result<SingletonPolicy, String> {
    match s {
        "unmute" => Ok(SingletonPolicy::Unmute),
        "leave" => Ok(SingletonPolicy::Leave),
        _ => Err(format!("unknown singleton policy `{}` (unmute, leave)", s)),
    }
}

fn parse_state_mode(s: &str) -> Result<StateMode, String> {
    match s {
        "retained" => Ok(StateMode::Retained),
        "refetch" => Ok(StateMode::Refetch),
        _ => Err(format!("unknown state mode `{}` (retained, refetch)", s)),
    }
}

fn parse_wire_mode(s: &str) -> Result<WireMode, String> {
    match s {
        "mute-only" => Ok(WireMode::MuteOnly),
        "full" => Ok(WireMode::Full),
        _ => Err(format!("unknown wire mode `{}` (mute-only, full)", s)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level)?;

    let file_config = match &args.config {
        Some(path) => {
            info!("Configuration file: {}", path);
            ServiceConfig::load(path).await?
        }
        None => ServiceConfig::default(),
    };
    let config = args.apply(file_config);
    config.validate()?;

    let room = config.room()?;
    info!("Starting automute for {}", room);

    // Decide whether this instance should manage the room at all
    info!("Checking room configuration");
    let mut gate = StartupGate::new(room.clone()).with_retry_interval(config.gate_retry_interval());
    if let Some(address) = config.gate_address() {
        gate = gate.with_config_gate(HttpConfigGate::new(address));
    }
    if let Some(pattern) = config.controller_hostname()? {
        gate = gate.with_controller_hostname(pattern);
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tokio::select! {
        _ = gate.wait_until_open() => {}
        _ = &mut shutdown => {
            info!("automute shutdown complete");
            return Ok(());
        }
    }

    // Initialize room state on start up
    let store_address = config
        .store_address()
        .context("State store address required")?;
    let store = HttpStateStore::new(store_address, config.resolution.wire_mode);
    let resolver = DuplicateInputResolver::new(config.resolution.singleton_policy);

    info!("Initializing the room on startup");
    let mut manager = RoomStateManager::initialize(
        room.clone(),
        store,
        resolver,
        config.resolution.state_mode,
    )
    .await
    .context("Failed to initialize room")?;

    // Connect to the event hub
    let hub_address = config.hub_address().context("Event hub address required")?;
    let mut source =
        HubSource::new(hub_address, room.clone()).with_reconnect_delay(config.hub_reconnect_delay());

    info!("✅ Ready to process room events");
    let (reason, _) = service::run(&mut manager, &mut source, shutdown).await;
    if reason == StopReason::SourceClosed {
        anyhow::bail!("Event source closed unexpectedly");
    }

    info!("automute shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_file_config() {
        let args = Args::parse_from([
            "automute",
            "--room-id",
            "ITB-1106",
            "--av-api",
            "localhost:8000",
            "--hub-address",
            "hub.local:7100",
            "--singleton-policy",
            "leave",
            "--gate-retry-secs",
            "300",
        ]);

        let file = ServiceConfig {
            store_address: Some("old:8000".to_string()),
            gate_address: Some("couch.local:5984".to_string()),
            ..ServiceConfig::default()
        };
        let config = args.apply(file);

        assert!(config.validate().is_ok());
        assert_eq!(config.store_address(), Some("localhost:8000"));
        assert_eq!(config.gate_address(), Some("couch.local:5984"));
        assert_eq!(config.resolution.singleton_policy, SingletonPolicy::Leave);
        assert_eq!(config.gate.retry_interval_secs, 300);
    }

    #[test]
    fn test_rejects_unknown_modes() {
        assert!(Args::try_parse_from(["automute", "--state-mode", "sometimes"]).is_err());
        assert!(parse_wire_mode("mute-only").is_ok());
    }
}
