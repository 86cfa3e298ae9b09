//! Analysis module - rolling per-metric history for charting

mod history;

pub use history::*;
