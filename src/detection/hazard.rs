// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Hazard evaluation - fire and heavy-rain flags from a single snapshot
//!
//! Fire is the OR of several cheap, independent proxies (the firmware's
//! string marker, the digital flame pin, temperature, gas). Each channel can
//! fail on its own, so they are never fused into one score. An unknown
//! channel simply does not contribute.
//!
//! Alert thresholds and warning (display) thresholds are distinct on
//! purpose and must stay distinct.

use serde::{Deserialize, Serialize};

use crate::sensors::SensorSnapshot;

/// Temperature above which a device is on fire, in °C
pub const FIRE_TEMPERATURE_THRESHOLD: f64 = 50.0;
/// Gas level above which an alert fires
pub const FIRE_GAS_ALERT_THRESHOLD: f64 = 900.0;
/// Gas level above which a device card is styled as danger
pub const FIRE_GAS_WARNING_THRESHOLD: f64 = 600.0;
/// Raw rain sensor level at or above which heavy rain is alerted
pub const HEAVY_RAIN_ANALOG_THRESHOLD: f64 = 1500.0;
/// Rain percentage at or above which heavy rain is alerted
pub const HEAVY_RAIN_PERCENT_ALERT_THRESHOLD: f64 = 70.0;
/// Rain percentage above which a device card is styled as warning
pub const WARNING_RAIN_PERCENT_THRESHOLD: f64 = 50.0;
/// Temperature above which a device card is styled as warning, in °C
pub const WARNING_TEMPERATURE_THRESHOLD: f64 = 40.0;
/// Gas level above which a device card is styled as warning
pub const WARNING_GAS_THRESHOLD: f64 = 500.0;

/// Every threshold the alerting and display rules read
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardThresholds {
    pub fire_temperature: f64,
    pub fire_gas_alert: f64,
    pub fire_gas_warning: f64,
    pub heavy_rain_analog: f64,
    pub heavy_rain_percent_alert: f64,
    pub warning_rain_percent: f64,
    pub warning_temperature: f64,
    pub warning_gas: f64,
}

impl Default for HazardThresholds {
    fn default() -> Self {
        Self {
            fire_temperature: FIRE_TEMPERATURE_THRESHOLD,
            fire_gas_alert: FIRE_GAS_ALERT_THRESHOLD,
            fire_gas_warning: FIRE_GAS_WARNING_THRESHOLD,
            heavy_rain_analog: HEAVY_RAIN_ANALOG_THRESHOLD,
            heavy_rain_percent_alert: HEAVY_RAIN_PERCENT_ALERT_THRESHOLD,
            warning_rain_percent: WARNING_RAIN_PERCENT_THRESHOLD,
            warning_temperature: WARNING_TEMPERATURE_THRESHOLD,
            warning_gas: WARNING_GAS_THRESHOLD,
        }
    }
}

/// Hazard flags derived from the latest snapshot only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HazardAssessment {
    pub fire_danger: bool,
    pub heavy_rain: bool,
}

impl HazardAssessment {
    pub fn any(&self) -> bool {
        self.fire_danger || self.heavy_rain
    }
}

/// Evaluate a snapshot against the alert thresholds.
///
/// Pure and total: the same snapshot always yields the same assessment.
pub fn evaluate(snapshot: &SensorSnapshot, thresholds: &HazardThresholds) -> HazardAssessment {
    HazardAssessment {
        fire_danger: fire_signal(snapshot)
            || above(snapshot.temperature, thresholds.fire_temperature)
            || above(snapshot.gas, thresholds.fire_gas_alert),
        heavy_rain: at_least(snapshot.rain_analog, thresholds.heavy_rain_analog)
            || at_least(snapshot.rain_percent, thresholds.heavy_rain_percent_alert),
    }
}

/// String marker or digital flame pin; the two are independent signals.
pub(crate) fn fire_signal(snapshot: &SensorSnapshot) -> bool {
    snapshot.fire_detected.is_detected() || snapshot.flame_digital == Some(1)
}

pub(crate) fn above(value: Option<f64>, threshold: f64) -> bool {
    value.map_or(false, |v| v > threshold)
}

pub(crate) fn at_least(value: Option<f64>, threshold: f64) -> bool {
    value.map_or(false, |v| v >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::FireMarker;
    use chrono::Utc;

    fn snapshot() -> SensorSnapshot {
        SensorSnapshot::empty("device_01", Utc::now())
    }

    fn eval(s: &SensorSnapshot) -> HazardAssessment {
        evaluate(s, &HazardThresholds::default())
    }

    #[test]
    fn test_unknown_snapshot_is_not_hazardous() {
        let a = eval(&snapshot());
        assert!(!a.fire_danger);
        assert!(!a.heavy_rain);
    }

    #[test]
    fn test_temperature_triggers_fire() {
        let mut s = snapshot();
        s.temperature = Some(55.0);
        s.gas = Some(200.0);
        let a = eval(&s);
        assert!(a.fire_danger);
        assert!(!a.heavy_rain);

        s.temperature = Some(50.0);
        assert!(!eval(&s).fire_danger, "threshold is strict");
    }

    #[test]
    fn test_fire_signals_are_independent() {
        let mut marker = snapshot();
        marker.fire_detected = FireMarker::Detected;
        assert!(eval(&marker).fire_danger);

        let mut pin = snapshot();
        pin.flame_digital = Some(1);
        pin.fire_detected = FireMarker::Clear;
        assert!(eval(&pin).fire_danger);

        let mut idle = snapshot();
        idle.flame_digital = Some(0);
        idle.fire_detected = FireMarker::Clear;
        assert!(!eval(&idle).fire_danger);
    }

    #[test]
    fn test_gas_alert_and_warning_thresholds_differ() {
        let mut s = snapshot();
        s.gas = Some(650.0);
        assert!(!eval(&s).fire_danger);

        s.gas = Some(901.0);
        assert!(eval(&s).fire_danger);

        let t = HazardThresholds::default();
        assert_ne!(t.fire_gas_alert, t.fire_gas_warning);
        assert_ne!(t.heavy_rain_percent_alert, t.warning_rain_percent);
    }

    #[test]
    fn test_heavy_rain_thresholds_are_inclusive() {
        let mut s = snapshot();
        s.rain_percent = Some(70.0);
        assert!(eval(&s).heavy_rain);

        let mut s = snapshot();
        s.rain_analog = Some(1500.0);
        assert!(eval(&s).heavy_rain);

        let mut s = snapshot();
        s.rain_percent = Some(69.9);
        s.rain_analog = Some(1499.0);
        assert!(!eval(&s).heavy_rain);
    }

    #[test]
    fn test_rain_without_fire() {
        let mut s = snapshot();
        s.rain_percent = Some(80.0);
        s.temperature = Some(20.0);
        let a = eval(&s);
        assert!(a.heavy_rain);
        assert!(!a.fire_danger);
    }

    #[test]
    fn test_custom_thresholds() {
        let mut s = snapshot();
        s.temperature = Some(45.0);
        let t = HazardThresholds {
            fire_temperature: 42.0,
            ..HazardThresholds::default()
        };
        assert!(evaluate(&s, &t).fire_danger);
        assert!(!eval(&s).fire_danger);
    }
}
