// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Rolling per-device, per-metric history for charting

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sensors::SensorSnapshot;

/// Default number of values kept per metric
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Charted sensor channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temperature,
    Humidity,
    Gas,
    FlameAnalog,
    LdrAnalog,
    RainAnalog,
    RainPercent,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::Gas,
        Metric::FlameAnalog,
        Metric::LdrAnalog,
        Metric::RainAnalog,
        Metric::RainPercent,
    ];

    /// Value of this metric in a snapshot, if known
    pub fn read(self, snapshot: &SensorSnapshot) -> Option<f64> {
        match self {
            Metric::Temperature => snapshot.temperature,
            Metric::Humidity => snapshot.humidity,
            Metric::Gas => snapshot.gas,
            Metric::FlameAnalog => snapshot.flame_analog,
            Metric::LdrAnalog => snapshot.ldr_analog,
            Metric::RainAnalog => snapshot.rain_analog,
            Metric::RainPercent => snapshot.rain_percent,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Humidity | Metric::RainPercent => "%",
            Metric::Gas | Metric::FlameAnalog | Metric::LdrAnalog | Metric::RainAnalog => "raw",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Gas => "gas",
            Metric::FlameAnalog => "flame_analog",
            Metric::LdrAnalog => "ldr_analog",
            Metric::RainAnalog => "rain_analog",
            Metric::RainPercent => "rain_percent",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Min/max/mean over a buffer, for chart axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub latest: f64,
    pub count: usize,
}

/// Fixed-capacity FIFO of recent values
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    values: VecDeque<f64>,
    capacity: usize,
}

impl HistoryBuffer {
    /// `capacity` is clamped to at least one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest value once full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Values oldest first
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn summary(&self) -> Option<HistorySummary> {
        let latest = self.latest()?;
        let (min, max, sum) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY, 0.0), |(min, max, sum), &v| {
                (min.min(v), max.max(v), sum + v)
            });

        Some(HistorySummary {
            min,
            max,
            mean: sum / self.values.len() as f64,
            latest,
            count: self.values.len(),
        })
    }
}

/// Rolling history for every device and metric.
///
/// Buffers of one device grow independently: a metric missing from an
/// update does not grow that cycle, so buffers are not aligned by index.
pub struct HistoryAggregator {
    window: usize,
    metrics: Vec<Metric>,
    devices: HashMap<String, HashMap<Metric, HistoryBuffer>>,
}

impl HistoryAggregator {
    /// Track every metric with the given window.
    pub fn new(window: usize) -> Self {
        Self::with_metrics(window, Metric::ALL.to_vec())
    }

    /// Track the given metrics. Repeats are dropped, first occurrence keeps its place.
    pub fn with_metrics(window: usize, mut metrics: Vec<Metric>) -> Self {
        let mut seen = HashSet::new();
        metrics.retain(|metric| seen.insert(*metric));
        Self {
            window: window.max(1),
            metrics,
            devices: HashMap::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Append one value. Non-finite values are not recorded.
    pub fn append(&mut self, device_id: &str, metric: Metric, value: f64) {
        if !value.is_finite() {
            return;
        }
        let window = self.window;
        self.devices
            .entry(device_id.to_string())
            .or_default()
            .entry(metric)
            .or_insert_with(|| HistoryBuffer::new(window))
            .push(value);
    }

    /// Append every tracked metric the snapshot knows.
    pub fn record(&mut self, snapshot: &SensorSnapshot) -> usize {
        let mut appended = 0;
        for i in 0..self.metrics.len() {
            let metric = self.metrics[i];
            if let Some(value) = metric.read(snapshot) {
                self.append(&snapshot.device_id, metric, value);
                appended += 1;
            }
        }
        appended
    }

    /// Recent values of one metric, oldest first; empty if never seen.
    pub fn get(&self, device_id: &str, metric: Metric) -> Vec<f64> {
        self.buffer(device_id, metric)
            .map(HistoryBuffer::to_vec)
            .unwrap_or_default()
    }

    pub fn buffer(&self, device_id: &str, metric: Metric) -> Option<&HistoryBuffer> {
        self.devices.get(device_id)?.get(&metric)
    }

    /// Every tracked metric for a device, empty sequences included.
    pub fn snapshot(&self, device_id: &str) -> BTreeMap<Metric, Vec<f64>> {
        self.metrics
            .iter()
            .map(|&metric| (metric, self.get(device_id, metric)))
            .collect()
    }

    pub fn summary(&self, device_id: &str, metric: Metric) -> Option<HistorySummary> {
        self.buffer(device_id, metric)?.summary()
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }
}

impl Default for HistoryAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_buffer_keeps_last_n_in_order() {
        let mut buffer = HistoryBuffer::new(10);
        for i in 0..13 {
            buffer.push(i as f64);
            assert!(buffer.len() <= 10);
        }
        let expected: Vec<f64> = (3..13).map(|i| i as f64).collect();
        assert_eq!(buffer.to_vec(), expected);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = HistoryBuffer::new(0);
        buffer.push(1.0);
        buffer.push(2.0);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.to_vec(), vec![2.0]);
    }

    #[test]
    fn test_summary() {
        let mut buffer = HistoryBuffer::new(4);
        assert!(buffer.summary().is_none());
        for v in [3.0, 1.0, 5.0, 3.0] {
            buffer.push(v);
        }
        let s = buffer.summary().unwrap();
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 5.0);
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.latest, 3.0);
        assert_eq!(s.count, 4);
    }

    #[test]
    fn test_unseen_metric_is_empty() {
        let mut history = HistoryAggregator::new(10);
        history.append("a", Metric::Temperature, 20.0);

        assert!(history.get("a", Metric::Gas).is_empty());
        assert!(history.get("missing", Metric::Temperature).is_empty());

        let all = history.snapshot("a");
        assert_eq!(all.len(), Metric::ALL.len());
        assert_eq!(all[&Metric::Temperature], vec![20.0]);
        assert!(all[&Metric::Humidity].is_empty());
    }

    #[test]
    fn test_record_skips_unknown_fields() {
        let mut history = HistoryAggregator::new(3);
        let mut snapshot = SensorSnapshot::empty("a", Utc::now());
        snapshot.temperature = Some(21.0);
        snapshot.humidity = Some(55.0);
        assert_eq!(history.record(&snapshot), 2);

        snapshot.humidity = None;
        snapshot.temperature = Some(22.0);
        assert_eq!(history.record(&snapshot), 1);

        // buffers drift apart, no zero-filling
        assert_eq!(history.get("a", Metric::Temperature), vec![21.0, 22.0]);
        assert_eq!(history.get("a", Metric::Humidity), vec![55.0]);
    }

    #[test]
    fn test_restricted_metrics() {
        let mut history = HistoryAggregator::with_metrics(5, vec![Metric::Temperature]);
        let mut snapshot = SensorSnapshot::empty("a", Utc::now());
        snapshot.temperature = Some(30.0);
        snapshot.gas = Some(400.0);
        history.record(&snapshot);

        assert!(history.get("a", Metric::Gas).is_empty());
        assert_eq!(history.snapshot("a").len(), 1);
    }

    #[test]
    fn test_repeated_metrics_record_once() {
        let mut history =
            HistoryAggregator::with_metrics(5, vec![Metric::Temperature, Metric::Temperature]);
        assert_eq!(history.metrics(), &[Metric::Temperature]);

        let mut snapshot = SensorSnapshot::empty("a", Utc::now());
        snapshot.temperature = Some(30.0);
        assert_eq!(history.record(&snapshot), 1);
        assert_eq!(history.get("a", Metric::Temperature), vec![30.0]);
    }

    #[test]
    fn test_non_finite_values_ignored() {
        let mut history = HistoryAggregator::default();
        history.append("a", Metric::Gas, f64::NAN);
        assert!(history.get("a", Metric::Gas).is_empty());
    }
}
