// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Per-device alert latches with edge-triggered events
//!
//! Each device owns two independent latches. A latch sets on hazard onset
//! and clears only when the same hazard evaluates false again; while the
//! hazard value matches the latch nothing is emitted. A device stuck at
//! 55 °C for a hundred updates raises one `FireOnset`, not a hundred.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::hazard::HazardAssessment;
use crate::sensors::{HazardCoverage, SensorSnapshot};

/// Kind of alert transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    FireOnset,
    FireClear,
    RainOnset,
    RainClear,
}

impl AlertKind {
    /// Fire transitions drive the audible alarm; rain is visual only.
    pub fn is_actionable(self) -> bool {
        matches!(self, AlertKind::FireOnset | AlertKind::FireClear)
    }
}

/// Edge-triggered alert notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Latch pair for one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeviceAlertState {
    pub fire_latched: bool,
    pub rain_latched: bool,
}

/// Named combinations of the two latches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertLevel {
    Safe,
    FireAlerted,
    RainAlerted,
    FireAndRainAlerted,
}

impl DeviceAlertState {
    pub const SAFE: DeviceAlertState = DeviceAlertState {
        fire_latched: false,
        rain_latched: false,
    };

    pub fn level(&self) -> AlertLevel {
        match (self.fire_latched, self.rain_latched) {
            (false, false) => AlertLevel::Safe,
            (true, false) => AlertLevel::FireAlerted,
            (false, true) => AlertLevel::RainAlerted,
            (true, true) => AlertLevel::FireAndRainAlerted,
        }
    }
}

/// What to do with a device seen for the first time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NewDevicePolicy {
    /// Arm immediately; an unknown device counts as safe
    AssumeSafe,
    /// Stay un-armed until one snapshot carries enough hazard fields
    AwaitTelemetry { min_hazard_fields: usize },
}

impl Default for NewDevicePolicy {
    fn default() -> Self {
        NewDevicePolicy::AssumeSafe
    }
}

impl NewDevicePolicy {
    fn arms(&self, snapshot: &SensorSnapshot) -> bool {
        match *self {
            NewDevicePolicy::AssumeSafe => true,
            NewDevicePolicy::AwaitTelemetry { min_hazard_fields } => {
                match snapshot.hazard_coverage() {
                    HazardCoverage::Known(n) => n >= min_hazard_fields,
                    HazardCoverage::Unknown => min_hazard_fields == 0,
                }
            }
        }
    }
}

/// Alert state machine for one device
#[derive(Debug, Clone)]
pub struct AlertStateMachine {
    device_id: String,
    state: DeviceAlertState,
    armed: bool,
}

impl AlertStateMachine {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            state: DeviceAlertState::SAFE,
            armed: true,
        }
    }

    fn unarmed(device_id: &str) -> Self {
        Self {
            armed: false,
            ..Self::new(device_id)
        }
    }

    pub fn state(&self) -> DeviceAlertState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Apply one assessment, returning the transitions it caused (fire first).
    pub fn advance(&mut self, assessment: HazardAssessment, at: DateTime<Utc>) -> Vec<AlertEvent> {
        let mut events = Vec::with_capacity(2);

        if let Some(kind) = edge(
            &mut self.state.fire_latched,
            assessment.fire_danger,
            AlertKind::FireOnset,
            AlertKind::FireClear,
        ) {
            events.push(self.event(kind, at));
        }

        if let Some(kind) = edge(
            &mut self.state.rain_latched,
            assessment.heavy_rain,
            AlertKind::RainOnset,
            AlertKind::RainClear,
        ) {
            events.push(self.event(kind, at));
        }

        events
    }

    fn event(&self, kind: AlertKind, timestamp: DateTime<Utc>) -> AlertEvent {
        AlertEvent {
            kind,
            device_id: self.device_id.clone(),
            timestamp,
        }
    }
}

fn edge(latch: &mut bool, hazard: bool, onset: AlertKind, clear: AlertKind) -> Option<AlertKind> {
    match (hazard, *latch) {
        (true, false) => {
            *latch = true;
            Some(onset)
        }
        (false, true) => {
            *latch = false;
            Some(clear)
        }
        _ => None,
    }
}

/// Device-keyed collection of alert state machines
pub struct AlertTracker {
    machines: HashMap<String, AlertStateMachine>,
    policy: NewDevicePolicy,
}

impl AlertTracker {
    pub fn new(policy: NewDevicePolicy) -> Self {
        Self {
            machines: HashMap::new(),
            policy,
        }
    }

    /// Advance the device's machine, creating it on first sight.
    pub fn observe(
        &mut self,
        snapshot: &SensorSnapshot,
        assessment: HazardAssessment,
    ) -> Vec<AlertEvent> {
        let policy = self.policy;
        let machine = self
            .machines
            .entry(snapshot.device_id.clone())
            .or_insert_with(|| {
                debug!("Tracking alerts for new device {}", snapshot.device_id);
                match policy {
                    NewDevicePolicy::AssumeSafe => AlertStateMachine::new(&snapshot.device_id),
                    NewDevicePolicy::AwaitTelemetry { .. } => {
                        AlertStateMachine::unarmed(&snapshot.device_id)
                    }
                }
            });

        if !machine.armed {
            if !policy.arms(snapshot) {
                debug!("Device {} not armed yet, telemetry incomplete", snapshot.device_id);
                return Vec::new();
            }
            info!("Device {} armed for alerting", snapshot.device_id);
            machine.armed = true;
        }

        machine.advance(assessment, snapshot.received_at)
    }

    /// Latches for a device; unseen devices are safe.
    pub fn state(&self, device_id: &str) -> DeviceAlertState {
        self.machines
            .get(device_id)
            .map(|m| m.state())
            .unwrap_or(DeviceAlertState::SAFE)
    }

    pub fn is_tracked(&self, device_id: &str) -> bool {
        self.machines.contains_key(device_id)
    }

    pub fn device_count(&self) -> usize {
        self.machines.len()
    }

    /// Devices with the fire latch set
    pub fn burning(&self) -> impl Iterator<Item = &str> {
        self.machines
            .values()
            .filter(|m| m.state.fire_latched)
            .map(|m| m.device_id.as_str())
    }
}

impl Default for AlertTracker {
    fn default() -> Self {
        Self::new(NewDevicePolicy::default())
    }
}
