// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! ForestWatch - Forest Safety Dashboard engine
//!
//! Headless core behind a forest-safety dashboard:
//! - tolerant normalization of loosely typed IoT device payloads
//! - edge-triggered fire and heavy-rain alerts per device, no re-alert storms
//! - fixed-window rolling history per device and metric for charting
//! - overview card status, map markers and region fitting
//! - looping audible alarm on fire onset
//! - MQTT, replay and simulated device feeds
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ForestWatch Engine                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐  ┌────────────┐  ┌──────────┐  ┌───────────┐   │
//! │  │   Feed   │→ │ Normalizer │→ │  Hazard  │→ │   Alert   │   │
//! │  │ (mqtt..) │  │            │  │ Evaluator│  │  Tracker  │   │
//! │  └──────────┘  └────────────┘  └──────────┘  └───────────┘   │
//! │                      ↓                          ↓       ↓    │
//! │                ┌───────────┐          ┌───────────┐ ┌──────┐ │
//! │                │  History  │          │ Event Bus │ │Alarm │ │
//! │                └───────────┘          └───────────┘ └──────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod core;
pub mod sensors;
pub mod analysis;
pub mod detection;
pub mod streaming;
pub mod alarm;
pub mod config;

// Re-exports for convenience
pub use config::Config;
pub use core::{ConnectionStatus, Engine, EventBus};
pub use sensors::{normalize, SensorSnapshot};
pub use analysis::{HistoryAggregator, Metric};
pub use detection::{
    evaluate, AlertEvent, AlertKind, AlertTracker, HazardAssessment, HazardThresholds,
};
pub use streaming::{FeedBatch, FeedEvent, FeedSource, Subscription};
pub use alarm::{AlarmController, AlarmSink};

/// ForestWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ForestWatch name
pub const NAME: &str = "ForestWatch";

/// Build info
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION.to_string(),
        target: std::env::consts::ARCH.to_string(),
        os: std::env::consts::OS.to_string(),
        features: enabled_features(),
    }
}

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version string
    pub version: String,
    /// Target architecture
    pub target: String,
    /// Operating system
    pub os: String,
    /// Enabled features
    pub features: Vec<String>,
}

fn enabled_features() -> Vec<String> {
    let mut features = vec![];

    #[cfg(feature = "mqtt")]
    features.push("mqtt".to_string());

    features
}
