// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Typed per-device sensor snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exact string the field firmware publishes when its fire detector trips
pub const FIRE_MARKER: &str = "true";

/// Tri-state fire flag as published by the device firmware.
///
/// The feed encodes this flag as a string. Only the exact marker
/// [`FIRE_MARKER`] counts as a detection; any other string is an explicit
/// "no fire" and any non-string value leaves the flag unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FireMarker {
    Detected,
    Clear,
    #[default]
    Unknown,
}

impl FireMarker {
    pub fn is_detected(self) -> bool {
        self == FireMarker::Detected
    }

    pub fn is_known(self) -> bool {
        self != FireMarker::Unknown
    }
}

/// Actuator switches reported on the device node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceControls {
    pub flame_enabled: Option<bool>,
    pub servo_enabled: Option<bool>,
}

impl DeviceControls {
    pub fn is_empty(&self) -> bool {
        self.flame_enabled.is_none() && self.servo_enabled.is_none()
    }
}

/// Whether a snapshot carries anything the hazard rules can look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HazardCoverage {
    /// No hazard-relevant field is known
    Unknown,
    /// Number of hazard-relevant fields that are known
    Known(usize),
}

/// Latest known reading for one device, point in time, no history.
///
/// Every field is optional: `None` means the feed did not deliver a usable
/// value, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub device_id: String,

    // Hazard channels
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub gas: Option<f64>,
    pub flame_analog: Option<f64>,
    pub flame_digital: Option<i64>,
    pub fire_detected: FireMarker,
    pub ldr_analog: Option<f64>,
    pub rain_analog: Option<f64>,
    pub rain_percent: Option<f64>,

    // Location
    pub geofence_radius: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    // Display strings computed by the firmware
    pub light_description: Option<String>,
    pub rain_status: Option<String>,

    pub controls: DeviceControls,

    /// Source timestamp, when the device sent a parseable one
    pub timestamp: Option<DateTime<Utc>>,
    /// Local receive time
    pub received_at: DateTime<Utc>,
}

impl SensorSnapshot {
    /// Snapshot with every field unknown
    pub fn empty(device_id: &str, received_at: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.to_string(),
            temperature: None,
            humidity: None,
            gas: None,
            flame_analog: None,
            flame_digital: None,
            fire_detected: FireMarker::Unknown,
            ldr_analog: None,
            rain_analog: None,
            rain_percent: None,
            geofence_radius: None,
            latitude: None,
            longitude: None,
            light_description: None,
            rain_status: None,
            controls: DeviceControls::default(),
            timestamp: None,
            received_at,
        }
    }

    /// Counts the fields any hazard rule reads.
    pub fn hazard_coverage(&self) -> HazardCoverage {
        let known = [
            self.temperature.is_some(),
            self.gas.is_some(),
            self.flame_digital.is_some(),
            self.fire_detected.is_known(),
            self.rain_analog.is_some(),
            self.rain_percent.is_some(),
        ]
        .iter()
        .filter(|k| **k)
        .count();

        if known == 0 {
            HazardCoverage::Unknown
        } else {
            HazardCoverage::Known(known)
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    /// Time the reading is best attributed to
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or(self.received_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_has_unknown_coverage() {
        let snapshot = SensorSnapshot::empty("device_01", Utc::now());
        assert_eq!(snapshot.hazard_coverage(), HazardCoverage::Unknown);
        assert!(snapshot.position().is_none());
    }

    #[test]
    fn test_coverage_counts_known_hazard_fields() {
        let mut snapshot = SensorSnapshot::empty("device_01", Utc::now());
        snapshot.temperature = Some(21.0);
        snapshot.fire_detected = FireMarker::Clear;
        // humidity is charted but not a hazard input
        snapshot.humidity = Some(60.0);

        assert_eq!(snapshot.hazard_coverage(), HazardCoverage::Known(2));
    }
}
