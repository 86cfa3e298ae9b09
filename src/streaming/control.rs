// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Device actuator control - write contract for the flame sensor and servo switches

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

/// Control write failures
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid device id '{0}'")]
    InvalidDevice(String),
    #[error("unknown control '{0}', expected 'flame' or 'servo'")]
    UnknownControl(String),
    #[error("control write failed: {0}")]
    Transport(String),
    #[error("control payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Switchable actuator on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Flame,
    Servo,
}

impl Control {
    /// Field name on the device node
    pub fn key(self) -> &'static str {
        match self {
            Control::Flame => "flameEnabled",
            Control::Servo => "servoEnabled",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Flame => f.write_str("flame"),
            Control::Servo => f.write_str("servo"),
        }
    }
}

impl FromStr for Control {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flame" | "flameenabled" => Ok(Control::Flame),
            "servo" | "servoenabled" => Ok(Control::Servo),
            _ => Err(ControlError::UnknownControl(s.to_string())),
        }
    }
}

/// Partial update written to the device node
pub fn control_patch(control: Control, enabled: bool) -> Value {
    json!({ control.key(): enabled })
}

/// Topic a device listens on for control patches
pub fn control_topic(root: &str, device_id: &str) -> Result<String, ControlError> {
    validate_device_id(device_id)?;
    Ok(format!("{}/{}/control", root.trim_end_matches('/'), device_id))
}

pub fn validate_device_id(device_id: &str) -> Result<(), ControlError> {
    let bad = device_id.is_empty()
        || device_id.contains(|c: char| c == '/' || c == '+' || c == '#' || c.is_whitespace());
    if bad {
        Err(ControlError::InvalidDevice(device_id.to_string()))
    } else {
        Ok(())
    }
}

/// Writes actuator switches to devices
#[async_trait]
pub trait DeviceControlWriter: Send + Sync {
    async fn set_control(
        &self,
        device_id: &str,
        control: Control,
        enabled: bool,
    ) -> Result<(), ControlError>;
}

#[cfg(feature = "mqtt")]
pub use self::mqtt_writer::MqttControlWriter;

#[cfg(feature = "mqtt")]
mod mqtt_writer {
    use std::time::Duration;

    use rumqttc::{AsyncClient, Event, Packet, QoS};
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use super::*;
    use crate::streaming::{mqtt_options, FeedConfig};

    /// Publishes retained control patches over MQTT
    pub struct MqttControlWriter {
        client: AsyncClient,
        root: String,
        eventloop_task: JoinHandle<()>,
    }

    impl MqttControlWriter {
        pub fn connect(config: &FeedConfig) -> Self {
            let options = mqtt_options(config, "control");
            let (client, mut eventloop) = AsyncClient::new(options, 16);
            let reconnect = Duration::from_millis(config.mqtt_reconnect_interval_ms);

            let eventloop_task = tokio::spawn(async move {
                loop {
                    match eventloop.poll().await {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            info!("MQTT control connection up")
                        }
                        Ok(Event::Incoming(Packet::PubAck(ack))) => {
                            debug!("Control write acknowledged ({})", ack.pkid)
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("MQTT control error: {:?}", e);
                            tokio::time::sleep(reconnect).await;
                        }
                    }
                }
            });

            Self {
                client,
                root: config.root_topic.clone(),
                eventloop_task,
            }
        }

        /// Disconnect after queued writes are handed to the event loop.
        pub async fn close(self) {
            if let Err(e) = self.client.disconnect().await {
                debug!("MQTT control disconnect failed: {}", e);
            }
            // give the event loop a moment to flush
            tokio::time::sleep(Duration::from_millis(250)).await;
            self.eventloop_task.abort();
        }
    }

    #[async_trait]
    impl DeviceControlWriter for MqttControlWriter {
        async fn set_control(
            &self,
            device_id: &str,
            control: Control,
            enabled: bool,
        ) -> Result<(), ControlError> {
            let topic = control_topic(&self.root, device_id)?;
            let payload = serde_json::to_vec(&control_patch(control, enabled))?;

            self.client
                .publish(topic.as_str(), QoS::AtLeastOnce, true, payload)
                .await
                .map_err(|e| ControlError::Transport(e.to_string()))?;

            info!("Set {} {} on {}", control, if enabled { "on" } else { "off" }, device_id);
            Ok(())
        }
    }
}
