// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! ForestWatch - Forest Safety Dashboard engine
//!
//! Subscribes to the device feed, raises fire and heavy-rain alerts,
//! rings the alarm on fire and keeps rolling sensor history.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use forestwatch::streaming::{Control, FeedKind};
use forestwatch::{build_info, Config, Engine, NAME, VERSION};

/// ForestWatch - Forest Safety Dashboard engine
#[derive(Parser, Debug)]
#[command(name = "forestwatch")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Real-time fire and heavy-rain alerting for forest IoT sensor fleets")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Demo mode with a simulated device fleet
    #[arg(long)]
    demo: bool,

    /// MQTT broker address
    #[arg(long)]
    mqtt_broker: Option<String>,

    /// Replay a recorded feed (JSON lines)
    #[arg(long, conflicts_with = "demo")]
    replay: Option<PathBuf>,

    /// Log alarms instead of ringing
    #[arg(long)]
    no_alarm: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Switch a device actuator on or off
    Control {
        /// Device id
        device: String,
        /// `flame` or `servo`
        control: Control,
        state: Switch,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Initialize logging
    let filter = if args.trace {
        EnvFilter::new("trace")
    } else if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🌲 {} v{} - Forest Safety Dashboard engine", NAME, VERSION);
    info!("   Features: {:?}", build_info().features);
    info!("Configuration loaded from {:?}", config_path);

    // Override with command line args
    if args.demo {
        config.feed.source = FeedKind::Simulator;
    }
    if let Some(broker) = args.mqtt_broker {
        config.feed.source = FeedKind::Mqtt;
        config.feed.mqtt_broker = broker;
    }
    if let Some(path) = args.replay {
        config.feed.source = FeedKind::Replay;
        config.feed.replay_path = Some(path);
    }
    if args.no_alarm {
        config.alarm.enabled = false;
    }
    config.validate()?;

    let rt = tokio::runtime::Runtime::new()?;
    match args.command {
        Some(Command::Control { device, control, state }) => {
            rt.block_on(send_control(&config, &device, control, matches!(state, Switch::On)))
        }
        Some(Command::ShowConfig) => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        None => rt.block_on(run_headless(config)),
    }
}

/// Run the engine until the feed ends or Ctrl+C
async fn run_headless(config: Config) -> Result<()> {
    info!("Feed source: {:?}", config.feed.source);

    let alarm = config.alarm.build_sink();
    let mut source = config.feed.build_source()?;
    let mut engine = Engine::new(config, alarm)?;

    let mut alerts = engine.subscribe_alert_events();
    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(event) => {
                    info!("Alert: {:?} on {} at {}", event.kind, event.device_id, event.timestamp)
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Alert log lagged, {} events skipped", n)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, cleaning up...");
            let _ = shutdown_tx.send(());
        }
    });

    info!("🚀 ForestWatch running");
    info!("   Press Ctrl+C to shutdown");

    engine.run(source.as_mut(), shutdown_rx).await?;

    for device in engine.overview() {
        info!(
            "{}: {:?}, alert {:?}",
            device.snapshot.device_id,
            device.status,
            device.alert.level()
        );
    }
    let state = engine.state();
    info!(
        "ForestWatch shutdown complete ({} updates, {} alerts, {} feed errors)",
        state.total_updates, state.total_alerts, state.feed_errors
    );

    Ok(())
}

#[cfg(feature = "mqtt")]
async fn send_control(
    config: &Config,
    device: &str,
    control: Control,
    enabled: bool,
) -> Result<()> {
    use forestwatch::streaming::{DeviceControlWriter, MqttControlWriter};

    let writer = MqttControlWriter::connect(&config.feed);
    writer.set_control(device, control, enabled).await?;
    writer.close().await;
    Ok(())
}

#[cfg(not(feature = "mqtt"))]
async fn send_control(
    _config: &Config,
    _device: &str,
    _control: Control,
    _enabled: bool,
) -> Result<()> {
    anyhow::bail!("Device control needs the mqtt feature. Build with --features mqtt")
}
