//! Portico
//!
//! Discovers the devices behind a door-entry bridge, registers a simulated
//! state machine for each and activates them by name.
//!
//! Device names are read from stdin, one per line. `list` prints a snapshot
//! of every device. Events are written to stdout as JSON lines; logs go to
//! stderr.

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use portico_core::PlatformConfig;
use portico_engine::{AccessoryCache, ChannelSink, DeviceRegistry, EventRecord};
use portico_network::{BridgeActivator, discover};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::logging::LogLevel;

#[derive(Parser, Debug)]
#[command(name = "portico", author, version, about, long_about = None)]
struct Args {
    /// Platform configuration file (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Accessory cache file, created if missing
    #[arg(long, value_name = "FILE")]
    cache: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_level, args.json_logs)?;

    info!("Starting Portico v{}", portico_core::VERSION);

    let config = PlatformConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    let settings = config.bridge_settings();
    info!(bridge = %settings.address(), devices = config.devices.len(), "Configuration loaded");

    let book = discover(&settings)
        .await
        .context("discovering devices through the bridge")?;
    info!(devices = book.len(), "Bridge address book received");

    let (sink, events) = ChannelSink::new();
    let printer = tokio::spawn(print_events(events));

    let activator = Arc::new(BridgeActivator::new(settings, book.apt_address.clone()));
    let registry = Arc::new(DeviceRegistry::from_config(&config, activator, Arc::new(sink)));

    if let Some(path) = &args.cache {
        let cache = AccessoryCache::load(path)
            .with_context(|| format!("loading accessory cache from {}", path.display()))?;
        registry.restore(cache);
    }
    registry.register_address_book(&book);
    if let Some(path) = &args.cache {
        registry
            .snapshot_cache()
            .save(path)
            .with_context(|| format!("saving accessory cache to {}", path.display()))?;
    }

    for machine in registry.machines() {
        info!(
            device = machine.display_name(),
            kind = %machine.kind(),
            identity = %machine.identity(),
            "Device ready"
        );
    }

    let mut requests = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                handle_line(&registry, line.trim(), &mut requests)?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                return Ok(());
            }
        }
    }

    // Input closed: let running activations and cycles finish
    while let Some(joined) = requests.join_next().await {
        if let Err(e) = joined {
            warn!("Activation task failed: {}", e);
        }
    }
    registry.wait_settled().await;

    drop(registry);
    printer.await.context("event printer stopped")?;
    info!("No transitions pending, exiting");
    Ok(())
}

fn handle_line(
    registry: &Arc<DeviceRegistry<BridgeActivator>>,
    line: &str,
    requests: &mut JoinSet<()>,
) -> Result<()> {
    if line.is_empty() {
        return Ok(());
    }
    if line.eq_ignore_ascii_case("list") {
        for machine in registry.machines() {
            println!("{}", serde_json::to_string(&machine.snapshot())?);
        }
        return Ok(());
    }

    let machine = match registry.require_by_name(line) {
        Ok(machine) => machine,
        Err(e) => {
            warn!("{}", e);
            return Ok(());
        }
    };

    requests.spawn(async move {
        let result = machine.request_activation().await;
        debug!(device = machine.display_name(), code = result.code, "Activation finished");
    });
    Ok(())
}

/// Write every event to stdout as one JSON line.
async fn print_events(mut events: UnboundedReceiver<EventRecord>) {
    while let Some(record) = events.recv().await {
        match serde_json::to_string(&record) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("Unable to encode event: {}", e),
        }
    }
}
