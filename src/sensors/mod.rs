//! Sensor module - device snapshots, payload normalization and the simulated fleet

mod snapshot;
mod normalizer;
mod simulator;

pub use snapshot::*;
pub use normalizer::{normalize, normalize_at};
pub use simulator::{FleetModel, FleetSimulator};
