//! Streaming module - feed subscriptions (MQTT, replay) and device control

mod feed;
mod replay;
mod control;
#[cfg(feature = "mqtt")]
mod mqtt;

pub use feed::*;
pub use replay::ReplayFeed;
pub use control::*;
#[cfg(feature = "mqtt")]
pub use mqtt::*;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sensors::FleetSimulator;

/// Where device snapshots come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Mqtt,
    Replay,
    Simulator,
}

/// Feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub source: FeedKind,

    /// Capacity of the feed -> engine channel
    pub channel_capacity: usize,

    /// MQTT broker
    pub mqtt_broker: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_keep_alive_secs: u64,
    pub mqtt_reconnect_interval_ms: u64,

    /// Root topic; device nodes live under `<root>/<device-id>`
    pub root_topic: String,

    /// Replay file (JSON lines)
    pub replay_path: Option<PathBuf>,
    pub replay_interval_ms: u64,
    pub replay_repeat: bool,

    /// Simulated fleet
    pub simulator_devices: usize,
    pub simulator_interval_ms: u64,
    pub simulator_seed: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: FeedKind::Simulator,
            channel_capacity: 64,

            mqtt_broker: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_client_id: "forestwatch".to_string(),
            mqtt_username: None,
            mqtt_password: None,
            mqtt_keep_alive_secs: 30,
            mqtt_reconnect_interval_ms: 5000,

            root_topic: "forest_devices".to_string(),

            replay_path: None,
            replay_interval_ms: 1000,
            replay_repeat: false,

            simulator_devices: 4,
            simulator_interval_ms: 2000,
            simulator_seed: None,
        }
    }
}

impl FeedConfig {
    /// Build the feed source this configuration selects.
    pub fn build_source(&self) -> Result<Box<dyn FeedSource>, FeedError> {
        match self.source {
            FeedKind::Simulator => Ok(Box::new(FleetSimulator::new(
                self.simulator_devices,
                Duration::from_millis(self.simulator_interval_ms),
                self.simulator_seed,
            ))),
            FeedKind::Replay => {
                let path = self.replay_path.clone().ok_or_else(|| {
                    FeedError::Unavailable("replay source selected without replay_path".into())
                })?;
                Ok(Box::new(ReplayFeed::new(
                    path,
                    Duration::from_millis(self.replay_interval_ms),
                    self.replay_repeat,
                )))
            }
            #[cfg(feature = "mqtt")]
            FeedKind::Mqtt => Ok(Box::new(MqttFeed::new(self.clone()))),
            #[cfg(not(feature = "mqtt"))]
            FeedKind::Mqtt => Err(FeedError::Unavailable(
                "built without the mqtt feature".into(),
            )),
        }
    }
}
