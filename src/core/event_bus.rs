// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Event bus for engine -> UI communication

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::ConnectionStatus;
use crate::detection::{AlertEvent, CardStatus};

/// Event types in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Alert,
    Connectivity,
    DeviceUpdate,
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Alert(AlertEvent),
    Connectivity { status: ConnectionStatus, reason: Option<String> },
    DeviceUpdate { device_id: String, status: CardStatus },
}

/// Broadcast fan-out. Sends never block; lagging receivers drop the oldest.
pub struct EventBus {
    alert_tx: broadcast::Sender<AlertEvent>,
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (alert_tx, _) = broadcast::channel(capacity.max(1));
        let (event_tx, _) = broadcast::channel(capacity.max(1));

        Self {
            alert_tx,
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    pub fn publish_alert(&self, alert: AlertEvent) {
        let _ = self.alert_tx.send(alert.clone());
        self.publish_event(EventType::Alert, EventPayload::Alert(alert));
    }

    pub fn publish_connectivity(&self, status: ConnectionStatus, reason: Option<String>) {
        self.publish_event(EventType::Connectivity, EventPayload::Connectivity { status, reason });
    }

    pub fn publish_device_update(&self, device_id: &str, status: CardStatus) {
        self.publish_event(
            EventType::DeviceUpdate,
            EventPayload::DeviceUpdate {
                device_id: device_id.to_string(),
                status,
            },
        );
    }

    fn publish_event(&self, event_type: EventType, payload: EventPayload) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            event_type,
            timestamp: Utc::now(),
            payload,
        };
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_alert_events(&self) -> broadcast::Receiver<AlertEvent> {
        self.alert_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}
