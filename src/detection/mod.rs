//! Detection module - hazard evaluation, display classification and edge-triggered alerts

mod hazard;
mod display;
mod alert;

pub use hazard::{
    evaluate, HazardAssessment, HazardThresholds, FIRE_GAS_ALERT_THRESHOLD,
    FIRE_GAS_WARNING_THRESHOLD, FIRE_TEMPERATURE_THRESHOLD, HEAVY_RAIN_ANALOG_THRESHOLD,
    HEAVY_RAIN_PERCENT_ALERT_THRESHOLD, WARNING_GAS_THRESHOLD, WARNING_RAIN_PERCENT_THRESHOLD,
    WARNING_TEMPERATURE_THRESHOLD,
};
pub use display::*;
pub use alert::*;
