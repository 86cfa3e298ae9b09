// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Snapshot normalizer - raw device node to typed `SensorSnapshot`
//!
//! The feed is loosely typed. A device node may hold its reading directly,
//! under `last`, or under `last.data`, and firmware revisions disagree on
//! field types. Normalization never fails: a field that is missing or of the
//! wrong type becomes unknown and is logged at debug level.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use super::snapshot::{DeviceControls, FireMarker, SensorSnapshot, FIRE_MARKER};

/// Epoch values above this are milliseconds, below are seconds
const EPOCH_MILLIS_CUTOFF: f64 = 1e11;

/// Normalize a raw device node received now.
pub fn normalize(device_id: &str, raw: &Value) -> SensorSnapshot {
    normalize_at(device_id, raw, Utc::now())
}

/// Normalize a raw device node with an explicit receive time.
pub fn normalize_at(device_id: &str, raw: &Value, received_at: DateTime<Utc>) -> SensorSnapshot {
    let mut snapshot = SensorSnapshot::empty(device_id, received_at);

    let Some(node) = raw.as_object() else {
        debug!("Device {}: payload is not an object, all fields unknown", device_id);
        return snapshot;
    };

    let reading = Reading::new(device_id, node);

    snapshot.temperature = reading.number("temperature");
    snapshot.humidity = reading.number("humidity");
    snapshot.gas = if reading.contains("gas") {
        reading.number("gas")
    } else {
        reading.number("smoke")
    };
    snapshot.flame_analog = reading.number("flameAnalog");
    snapshot.flame_digital = reading.integer("flameDigital");
    snapshot.fire_detected = reading.fire_marker("fireDetected");
    snapshot.ldr_analog = reading.number("ldrAnalog");
    snapshot.rain_analog = reading.number("rainAnalog");
    snapshot.rain_percent = reading.number("rainPercent");

    snapshot.geofence_radius = reading.number("geofenceRadius");
    snapshot.latitude = reading.number("latitude");
    snapshot.longitude = reading.number("longitude");

    snapshot.light_description = reading.text("lightDescription");
    snapshot.rain_status = reading.text("rainStatus");
    snapshot.timestamp = reading.timestamp("timestamp");

    snapshot.controls = DeviceControls {
        flame_enabled: node_flag(device_id, node, "flameEnabled"),
        servo_enabled: node_flag(device_id, node, "servoEnabled"),
    };

    snapshot
}

/// Field lookup over the nesting levels of one device node
struct Reading<'a> {
    device_id: &'a str,
    layers: Vec<&'a Map<String, Value>>,
}

impl<'a> Reading<'a> {
    fn new(device_id: &'a str, node: &'a Map<String, Value>) -> Self {
        let mut layers = Vec::with_capacity(4);

        if let Some(last) = node.get("last").and_then(Value::as_object) {
            layers.push(last);
            if let Some(data) = last.get("data").and_then(Value::as_object) {
                layers.push(data);
            }
        }
        if let Some(data) = node.get("data").and_then(Value::as_object) {
            layers.push(data);
        }
        layers.push(node);

        Self { device_id, layers }
    }

    /// First layer with a non-null value for the key wins, whatever its type.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.layers
            .iter()
            .copied()
            .find_map(|layer| layer.get(key).filter(|v| !v.is_null()))
    }

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn number(&self, key: &str) -> Option<f64> {
        let value = self.get(key)?;
        match value.as_f64() {
            Some(n) if n.is_finite() => Some(n),
            _ => {
                self.reject(key, value);
                None
            }
        }
    }

    fn integer(&self, key: &str) -> Option<i64> {
        let value = self.get(key)?;
        let parsed = value.as_i64();
        if parsed.is_none() {
            self.reject(key, value);
        }
        parsed
    }

    fn fire_marker(&self, key: &str) -> FireMarker {
        match self.get(key) {
            Some(Value::String(s)) if s == FIRE_MARKER => FireMarker::Detected,
            Some(Value::String(_)) => FireMarker::Clear,
            Some(other) => {
                self.reject(key, other);
                FireMarker::Unknown
            }
            None => FireMarker::Unknown,
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        let value = self.get(key)?;
        match value {
            Value::String(s) => Some(s.clone()),
            other => {
                self.reject(key, other);
                None
            }
        }
    }

    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let value = self.get(key)?;
        let parsed = match value {
            Value::Number(n) => n.as_f64().and_then(epoch_to_datetime),
            Value::String(s) => parse_timestamp(s),
            _ => None,
        };
        if parsed.is_none() {
            self.reject(key, value);
        }
        parsed
    }

    fn reject(&self, key: &str, value: &Value) {
        debug!(
            "Device {}: ignoring field '{}' with unusable value {}",
            self.device_id, key, value
        );
    }
}

fn node_flag(device_id: &str, node: &Map<String, Value>, key: &str) -> Option<bool> {
    match node.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Null => None,
        other => {
            debug!("Device {}: ignoring control '{}' with value {}", device_id, key, other);
            None
        }
    }
}

fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }
    let millis = if epoch > EPOCH_MILLIS_CUTOFF {
        epoch
    } else {
        epoch * 1000.0
    };
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
