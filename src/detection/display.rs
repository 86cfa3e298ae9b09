// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Warning-level classification for overview cards and map markers
//!
//! These rules use the display thresholds, which are looser than the
//! alerting ones: a device can be styled as danger without ever raising
//! an alert.

use serde::{Deserialize, Serialize};

use super::hazard::{above, at_least, fire_signal, HazardThresholds};
use crate::sensors::{HazardCoverage, SensorSnapshot};

/// Geofence radius drawn around an alerting marker without its own radius, in meters
pub const DEFAULT_GEOFENCE_RADIUS: f64 = 100.0;

/// Map span used when a single device is shown, in degrees
pub const SINGLE_MARKER_DELTA: f64 = 0.01;

/// Card colouring for a device in the overview
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CardStatus {
    /// No hazard-relevant field is known
    Unknown,
    Normal,
    Warning,
    Danger,
}

/// Classify a device card.
pub fn card_status(snapshot: &SensorSnapshot, thresholds: &HazardThresholds) -> CardStatus {
    if snapshot.hazard_coverage() == HazardCoverage::Unknown {
        return CardStatus::Unknown;
    }

    let danger = fire_signal(snapshot)
        || above(snapshot.temperature, thresholds.fire_temperature)
        || above(snapshot.gas, thresholds.fire_gas_warning);
    if danger {
        return CardStatus::Danger;
    }

    let warning = above(snapshot.temperature, thresholds.warning_temperature)
        || above(snapshot.gas, thresholds.warning_gas)
        || above(snapshot.rain_percent, thresholds.warning_rain_percent);
    if warning {
        CardStatus::Warning
    } else {
        CardStatus::Normal
    }
}

/// Danger highlight shared by the overview border and the map marker.
///
/// Unlike the card colour this includes heavy raw rain but not the
/// digital flame pin.
pub fn is_highlighted(snapshot: &SensorSnapshot, thresholds: &HazardThresholds) -> bool {
    snapshot.fire_detected.is_detected()
        || above(snapshot.temperature, thresholds.fire_temperature)
        || above(snapshot.gas, thresholds.fire_gas_warning)
        || at_least(snapshot.rain_analog, thresholds.heavy_rain_analog)
}

/// A device pinned on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub alert: bool,
    /// Geofence circle radius, only drawn for alerting markers
    pub radius_m: Option<f64>,
    pub description: String,
}

/// Build the marker for a device, if it has a position.
pub fn map_marker(snapshot: &SensorSnapshot, thresholds: &HazardThresholds) -> Option<MapMarker> {
    let (latitude, longitude) = snapshot.position()?;
    let alert = is_highlighted(snapshot, thresholds);

    Some(MapMarker {
        device_id: snapshot.device_id.clone(),
        latitude,
        longitude,
        alert,
        radius_m: alert.then(|| snapshot.geofence_radius.unwrap_or(DEFAULT_GEOFENCE_RADIUS)),
        description: format!(
            "Temp: {} | Gas: {}",
            format_reading(snapshot.temperature),
            format_reading(snapshot.gas)
        ),
    })
}

fn format_reading(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// Visible map area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

/// Region that shows every marker: none for an empty map, a fixed span
/// around a lone marker, the bounding box otherwise.
pub fn fit_region(markers: &[MapMarker]) -> Option<MapRegion> {
    let first = markers.first()?;

    if markers.len() == 1 {
        return Some(MapRegion {
            latitude: first.latitude,
            longitude: first.longitude,
            latitude_delta: SINGLE_MARKER_DELTA,
            longitude_delta: SINGLE_MARKER_DELTA,
        });
    }

    let (mut min_lat, mut max_lat) = (first.latitude, first.latitude);
    let (mut min_lon, mut max_lon) = (first.longitude, first.longitude);
    for m in &markers[1..] {
        min_lat = min_lat.min(m.latitude);
        max_lat = max_lat.max(m.latitude);
        min_lon = min_lon.min(m.longitude);
        max_lon = max_lon.max(m.longitude);
    }

    Some(MapRegion {
        latitude: (min_lat + max_lat) / 2.0,
        longitude: (min_lon + max_lon) / 2.0,
        latitude_delta: (max_lat - min_lat).max(SINGLE_MARKER_DELTA),
        longitude_delta: (max_lon - min_lon).max(SINGLE_MARKER_DELTA),
    })
}
