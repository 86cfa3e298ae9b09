// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! MQTT feed subscription
//!
//! A payload on the root topic is the full device mapping. A payload on
//! `<root>/<device-id>` replaces that one device node; the feed keeps the
//! merged mapping and republishes it whole, so the engine always sees full
//! snapshots.

use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::feed::{parse_batch, FeedBatch, FeedError, FeedEvent, FeedSource, Subscription};
use super::FeedConfig;

/// Build client options from the feed configuration.
pub fn mqtt_options(config: &FeedConfig, client_suffix: &str) -> MqttOptions {
    let client_id = if client_suffix.is_empty() {
        config.mqtt_client_id.clone()
    } else {
        format!("{}-{}", config.mqtt_client_id, client_suffix)
    };

    let mut options = MqttOptions::new(client_id, &config.mqtt_broker, config.mqtt_port);
    options.set_keep_alive(Duration::from_secs(config.mqtt_keep_alive_secs.max(5)));

    if let (Some(username), Some(password)) = (&config.mqtt_username, &config.mqtt_password) {
        options.set_credentials(username, password);
    }

    options
}

/// Merged view of the fleet as assembled from root and per-device topics
#[derive(Debug, Default)]
pub struct FleetState {
    root: String,
    devices: FeedBatch,
}

impl FleetState {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.trim_end_matches('/').to_string(),
            devices: FeedBatch::new(),
        }
    }

    /// Apply one message; returns the full mapping to publish, if the
    /// topic belongs to the fleet.
    pub fn apply(&mut self, topic: &str, payload: &[u8]) -> Result<Option<FeedBatch>, FeedError> {
        if topic == self.root {
            self.devices = parse_batch(payload)?;
            return Ok(Some(self.devices.clone()));
        }

        let Some(device_id) = topic
            .strip_prefix(self.root.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|id| !id.is_empty() && !id.contains('/'))
        else {
            return Ok(None);
        };

        let node: Value = serde_json::from_slice(payload)?;
        if node.is_null() {
            self.devices.remove(device_id);
        } else {
            self.devices.insert(device_id.to_string(), node);
        }
        Ok(Some(self.devices.clone()))
    }
}

/// Device feed over MQTT
pub struct MqttFeed {
    config: FeedConfig,
}

impl MqttFeed {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FeedSource for MqttFeed {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn subscribe(&mut self, tx: mpsc::Sender<FeedEvent>) -> Result<Subscription, FeedError> {
        let options = mqtt_options(&self.config, "feed");
        let (client, mut eventloop) = AsyncClient::new(options, 100);

        let root = self.config.root_topic.trim_end_matches('/').to_string();
        let device_filter = format!("{}/+", root);
        let reconnect = Duration::from_millis(self.config.mqtt_reconnect_interval_ms);

        let loop_client = client.clone();
        let subscription = Subscription::spawn(self.name(), move |closed| async move {
            let mut fleet = FleetState::new(&root);
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT connected, subscribing to '{}' and '{}'", root, device_filter);
                        for filter in [root.as_str(), device_filter.as_str()] {
                            if let Err(e) = loop_client.try_subscribe(filter, QoS::AtLeastOnce) {
                                warn!("MQTT subscribe to '{}' failed: {}", filter, e);
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(msg))) => {
                        debug!("MQTT received on {}", msg.topic);
                        let event = match fleet.apply(&msg.topic, &msg.payload) {
                            Ok(Some(batch)) => FeedEvent::Update(batch),
                            Ok(None) => continue,
                            Err(e) => {
                                warn!("MQTT payload on {} unreadable: {}", msg.topic, e);
                                continue;
                            }
                        };
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if closed.load(Ordering::SeqCst) {
                            return;
                        }
                        warn!("MQTT error: {:?}", e);
                        let error = FeedError::Transport(e.to_string());
                        if tx.send(FeedEvent::Error(error)).await.is_err() {
                            return;
                        }
                        tokio::time::sleep(reconnect).await;
                    }
                }
            }
        });

        info!(
            "MQTT feed initialized for {}:{} (root topic '{}')",
            self.config.mqtt_broker, self.config.mqtt_port, self.config.root_topic
        );

        Ok(subscription.with_teardown(move || {
            if let Err(e) = client.try_disconnect() {
                debug!("MQTT disconnect failed: {}", e);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_topic_replaces_fleet() {
        let mut fleet = FleetState::new("forest_devices");
        fleet.apply("forest_devices/old", br#"{"temperature": 1}"#).unwrap();

        let batch = fleet
            .apply("forest_devices", br#"{"a": {}, "b": {}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert!(!batch.contains_key("old"));
    }

    #[test]
    fn test_device_topic_merges() {
        let mut fleet = FleetState::new("forest_devices/");
        fleet.apply("forest_devices", br#"{"a": {"temperature": 20}}"#).unwrap();

        let batch = fleet
            .apply("forest_devices/b", br#"{"last": {"gas": 100}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(batch.len(), 2);

        let batch = fleet.apply("forest_devices/a", b"null").unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert!(batch.contains_key("b"));
    }

    #[test]
    fn test_foreign_topics_ignored() {
        let mut fleet = FleetState::new("forest_devices");
        assert!(fleet.apply("other/a", b"{}").unwrap().is_none());
        assert!(fleet.apply("forest_devices/a/control", b"{}").unwrap().is_none());
        assert!(fleet.apply("forest_devicesX", b"{}").unwrap().is_none());
    }

    #[test]
    fn test_options_from_config() {
        let config = FeedConfig {
            mqtt_broker: "broker.local".into(),
            mqtt_port: 1884,
            ..FeedConfig::default()
        };
        let options = mqtt_options(&config, "feed");
        assert_eq!(options.client_id(), "forestwatch-feed");
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
    }
}
