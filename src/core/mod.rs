//! Core engine module - orchestrates normalization, history and alerting

mod engine;
mod event_bus;

pub use engine::{DeviceOverview, Engine};
pub use event_bus::{Event, EventBus, EventPayload, EventType};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health of the feed subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Connected,
    /// Last delivery failed; state is frozen until the next update
    Degraded,
}

/// System-wide state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemState {
    pub running: bool,
    pub devices_tracked: usize,
    pub devices_burning: usize,
    pub total_updates: u64,
    pub total_alerts: u64,
    pub feed_errors: u64,
    pub uptime_seconds: u64,
    pub connectivity: ConnectionStatus,
    pub last_update: Option<DateTime<Utc>>,
}
