// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Alert engine - owns per-device state and processes one feed update at a time

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::{ConnectionStatus, EventBus, SystemState};
use crate::alarm::{AlarmCommand, AlarmController, AlarmSink};
use crate::analysis::{HistoryAggregator, HistorySummary, Metric};
use crate::config::Config;
use crate::detection::{
    card_status, evaluate, fit_region, is_highlighted, map_marker, AlertEvent, AlertKind,
    AlertTracker, CardStatus, DeviceAlertState, HazardThresholds, MapMarker, MapRegion,
};
use crate::sensors::{normalize_at, SensorSnapshot};
use crate::streaming::{FeedBatch, FeedError, FeedEvent, FeedSource};

/// One row of the device overview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceOverview {
    pub snapshot: SensorSnapshot,
    pub status: CardStatus,
    /// Danger border
    pub highlighted: bool,
    pub alert: DeviceAlertState,
}

/// Main ForestWatch engine
pub struct Engine {
    pub config: Arc<Config>,
    thresholds: HazardThresholds,
    history: HistoryAggregator,
    alerts: AlertTracker,
    latest: BTreeMap<String, SensorSnapshot>,
    event_bus: Arc<EventBus>,
    alarm: AlarmController,
    state: SystemState,
    start_time: Option<Instant>,
}

impl Engine {
    pub fn new(config: Config, alarm: Arc<dyn AlarmSink>) -> Result<Self> {
        config.validate()?;

        let history = HistoryAggregator::with_metrics(
            config.history.window_size,
            config.history.metrics.clone(),
        );
        let alerts = AlertTracker::new(config.alerting.new_device_policy);
        let event_bus = Arc::new(EventBus::new(config.alerting.event_capacity));

        Ok(Self {
            thresholds: config.thresholds,
            config: Arc::new(config),
            history,
            alerts,
            latest: BTreeMap::new(),
            event_bus,
            alarm: AlarmController::new(alarm),
            state: SystemState::default(),
            start_time: None,
        })
    }

    /// Process one full device mapping. Returns the alert events it caused.
    pub fn process_batch(&mut self, batch: FeedBatch) -> Vec<AlertEvent> {
        self.process_batch_at(batch, Utc::now())
    }

    pub fn process_batch_at(
        &mut self,
        batch: FeedBatch,
        received_at: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        self.restore_connectivity();

        // devices are independent; sort only to keep logs and events stable
        let mut devices: Vec<_> = batch.into_iter().collect();
        devices.sort_by(|a, b| a.0.cmp(&b.0));

        let mut emitted = Vec::new();
        for (device_id, raw) in devices {
            let snapshot = normalize_at(&device_id, &raw, received_at);
            let recorded = self.history.record(&snapshot);
            let assessment = evaluate(&snapshot, &self.thresholds);
            debug!(
                "Device {}: {} metrics recorded, fire={} rain={}",
                device_id, recorded, assessment.fire_danger, assessment.heavy_rain
            );

            for event in self.alerts.observe(&snapshot, assessment) {
                self.dispatch(&event);
                emitted.push(event);
            }

            let status = card_status(&snapshot, &self.thresholds);
            self.event_bus.publish_device_update(&device_id, status);
            self.latest.insert(device_id, snapshot);
        }

        self.state.total_updates += 1;
        self.state.total_alerts += emitted.len() as u64;
        self.state.last_update = Some(received_at);
        emitted
    }

    fn dispatch(&mut self, event: &AlertEvent) {
        let command = match event.kind {
            AlertKind::FireOnset => {
                warn!("🔥 Fire detected at {}", event.device_id);
                Some(AlarmCommand::Start)
            }
            AlertKind::FireClear => {
                info!("Fire cleared at {}", event.device_id);
                Some(AlarmCommand::Stop)
            }
            AlertKind::RainOnset => {
                warn!("🌧 Heavy rain at {}", event.device_id);
                None
            }
            AlertKind::RainClear => {
                info!("Heavy rain cleared at {}", event.device_id);
                None
            }
        };

        if let Some(command) = command {
            self.request_alarm(command);
        }
        self.event_bus.publish_alert(event.clone());
    }

    fn request_alarm(&mut self, command: AlarmCommand) {
        self.alarm.request(command);
    }

    /// Route one feed event.
    pub fn handle_feed_event(&mut self, event: FeedEvent) -> Vec<AlertEvent> {
        match event {
            FeedEvent::Update(batch) => self.process_batch(batch),
            FeedEvent::Error(error) => {
                self.mark_degraded(&error);
                Vec::new()
            }
        }
    }

    /// Flag the feed as degraded. History and alert state stay as they are.
    pub fn mark_degraded(&mut self, error: &FeedError) {
        self.state.feed_errors += 1;
        warn!("Feed error, keeping last known state: {}", error);
        if self.state.connectivity != ConnectionStatus::Degraded {
            self.state.connectivity = ConnectionStatus::Degraded;
            self.event_bus
                .publish_connectivity(ConnectionStatus::Degraded, Some(error.to_string()));
        }
    }

    fn restore_connectivity(&mut self) {
        if self.state.connectivity == ConnectionStatus::Degraded {
            info!("Feed recovered");
            self.state.connectivity = ConnectionStatus::Connected;
            self.event_bus.publish_connectivity(ConnectionStatus::Connected, None);
        }
    }

    /// Wait for every outstanding alarm request.
    pub async fn settle(&mut self) {
        self.alarm.settle().await;
    }

    /// Subscribe to `source` and process its events until the feed ends or
    /// `shutdown` fires.
    pub async fn run(
        &mut self,
        source: &mut dyn FeedSource,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        info!("Starting ForestWatch engine on '{}' feed...", source.name());

        let (tx, mut rx) = mpsc::channel(self.config.feed.channel_capacity);
        let subscription = source.subscribe(tx).await?;

        self.start_time = Some(Instant::now());
        self.state.running = true;

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => {
                        self.handle_feed_event(event);
                    }
                    None => {
                        info!("Feed '{}' ended", source.name());
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    info!("Engine shutting down...");
                    break;
                }
            }
        }

        subscription.unsubscribe();
        self.stop().await;
        Ok(())
    }

    /// Silence the alarm and wait for outstanding requests.
    pub async fn stop(&mut self) {
        self.request_alarm(AlarmCommand::Stop);
        self.settle().await;
        self.state.running = false;
        info!("ForestWatch engine stopped");
    }

    pub fn history(&self, device_id: &str, metric: Metric) -> Vec<f64> {
        self.history.get(device_id, metric)
    }

    pub fn history_for(&self, device_id: &str) -> BTreeMap<Metric, Vec<f64>> {
        self.history.snapshot(device_id)
    }

    pub fn history_summary(&self, device_id: &str, metric: Metric) -> Option<HistorySummary> {
        self.history.summary(device_id, metric)
    }

    /// Latches for a device; devices never seen are safe.
    pub fn alert_state(&self, device_id: &str) -> DeviceAlertState {
        self.alerts.state(device_id)
    }

    pub fn subscribe_alert_events(&self) -> broadcast::Receiver<AlertEvent> {
        self.event_bus.subscribe_alert_events()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub fn latest(&self, device_id: &str) -> Option<&SensorSnapshot> {
        self.latest.get(device_id)
    }

    /// Every known device, ordered by id
    pub fn overview(&self) -> Vec<DeviceOverview> {
        self.latest
            .values()
            .map(|snapshot| DeviceOverview {
                status: card_status(snapshot, &self.thresholds),
                highlighted: is_highlighted(snapshot, &self.thresholds),
                alert: self.alerts.state(&snapshot.device_id),
                snapshot: snapshot.clone(),
            })
            .collect()
    }

    pub fn map_markers(&self) -> Vec<MapMarker> {
        self.latest
            .values()
            .filter_map(|snapshot| map_marker(snapshot, &self.thresholds))
            .collect()
    }

    pub fn map_region(&self) -> Option<MapRegion> {
        fit_region(&self.map_markers())
    }

    pub fn connectivity(&self) -> ConnectionStatus {
        self.state.connectivity
    }

    pub fn state(&self) -> SystemState {
        SystemState {
            devices_tracked: self.alerts.device_count(),
            devices_burning: self.alerts.burning().count(),
            uptime_seconds: self.uptime(),
            ..self.state.clone()
        }
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::testing::RecordingAlarm;
    use crate::detection::{AlertLevel, NewDevicePolicy};
    use serde_json::{json, Value};

    fn engine_with(config: Config) -> (Engine, Arc<RecordingAlarm>) {
        let alarm = Arc::new(RecordingAlarm::default());
        let engine = Engine::new(config, alarm.clone()).unwrap();
        (engine, alarm)
    }

    fn engine() -> (Engine, Arc<RecordingAlarm>) {
        engine_with(Config::default())
    }

    fn batch(device: &str, node: Value) -> FeedBatch {
        let mut batch = FeedBatch::new();
        batch.insert(device.to_string(), node);
        batch
    }

    fn kinds(events: &[AlertEvent]) -> Vec<AlertKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[tokio::test]
    async fn test_temperature_fire_starts_alarm_once() {
        let (mut engine, alarm) = engine();
        let events = engine.process_batch(batch("d1", json!({ "temperature": 55, "gas": 200 })));
        engine.settle().await;

        assert_eq!(kinds(&events), vec![AlertKind::FireOnset]);
        assert_eq!(alarm.starts(), 1);
        assert_eq!(engine.alert_state("d1").level(), AlertLevel::FireAlerted);
    }

    #[tokio::test]
    async fn test_heavy_rain_is_visual_only() {
        let (mut engine, alarm) = engine();
        let events =
            engine.process_batch(batch("d1", json!({ "rainPercent": 80, "temperature": 20 })));
        engine.settle().await;

        assert_eq!(kinds(&events), vec![AlertKind::RainOnset]);
        assert_eq!(alarm.starts(), 0);
        assert_eq!(alarm.stops(), 0);
    }

    #[tokio::test]
    async fn test_warning_gas_does_not_alert() {
        let (mut engine, alarm) = engine();
        let events = engine.process_batch(batch("d1", json!({ "gas": 650 })));
        engine.settle().await;

        assert!(events.is_empty());
        assert_eq!(alarm.starts(), 0);

        let overview = engine.overview();
        assert_eq!(overview[0].status, CardStatus::Danger);
        assert!(overview[0].highlighted);
        assert_eq!(overview[0].alert, DeviceAlertState::SAFE);
    }

    #[tokio::test]
    async fn test_repeated_fire_emits_one_onset() {
        let (mut engine, alarm) = engine();
        let mut all = Vec::new();
        for _ in 0..25 {
            let node = json!({ "last": { "fireDetected": "true" } });
            all.extend(engine.process_batch(batch("d1", node)));
        }
        engine.settle().await;

        assert_eq!(kinds(&all), vec![AlertKind::FireOnset]);
        assert_eq!(alarm.starts(), 1);
    }

    #[tokio::test]
    async fn test_fire_flap_sequence() {
        let (mut engine, alarm) = engine();
        let mut all = Vec::new();
        for temperature in [60, 20, 60] {
            all.extend(engine.process_batch(batch("d1", json!({ "temperature": temperature }))));
        }
        engine.settle().await;

        assert_eq!(
            kinds(&all),
            vec![AlertKind::FireOnset, AlertKind::FireClear, AlertKind::FireOnset]
        );
        assert_eq!(alarm.starts(), 2);
        assert_eq!(alarm.stops(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fire_then_clear_silences_looping_alarm() {
        use crate::alarm::LoopingAlarm;
        use std::time::Duration;

        for _ in 0..200 {
            let alarm = Arc::new(LoopingAlarm::new(Duration::from_millis(50), false));
            let mut engine = Engine::new(Config::default(), alarm.clone()).unwrap();

            engine.process_batch(batch("d1", json!({ "temperature": 70 })));
            engine.process_batch(batch("d1", json!({ "temperature": 20 })));
            engine.settle().await;

            assert_eq!(engine.alert_state("d1"), DeviceAlertState::SAFE);
            assert!(!alarm.is_active());
        }
    }

    #[tokio::test]
    async fn test_alarm_failure_keeps_latch() {
        let alarm = Arc::new(RecordingAlarm::failing());
        let mut engine = Engine::new(Config::default(), alarm.clone()).unwrap();

        engine.process_batch(batch("d1", json!({ "flameDigital": 1 })));
        engine.process_batch(batch("d1", json!({ "flameDigital": 1 })));
        engine.settle().await;

        assert!(engine.alert_state("d1").fire_latched);
        assert_eq!(alarm.starts(), 1);
    }

    #[tokio::test]
    async fn test_devices_are_independent() {
        let (mut engine, _alarm) = engine();
        let mut fleet = FeedBatch::new();
        fleet.insert("a".into(), json!({ "temperature": 70 }));
        fleet.insert("b".into(), json!({ "rainAnalog": 1500 }));
        fleet.insert("c".into(), json!({ "temperature": 22 }));

        let events = engine.process_batch(fleet);
        engine.settle().await;

        assert_eq!(events.len(), 2);
        assert_eq!(engine.alert_state("a").level(), AlertLevel::FireAlerted);
        assert_eq!(engine.alert_state("b").level(), AlertLevel::RainAlerted);
        assert_eq!(engine.alert_state("c"), DeviceAlertState::SAFE);
        assert_eq!(engine.alert_state("never-seen"), DeviceAlertState::SAFE);
    }

    #[tokio::test]
    async fn test_history_window_and_missing_metric() {
        let mut config = Config::default();
        config.history.window_size = 3;
        let (mut engine, _alarm) = engine_with(config);

        for t in 1..=5 {
            engine.process_batch(batch("d1", json!({ "temperature": t })));
        }

        assert_eq!(engine.history("d1", Metric::Temperature), vec![3.0, 4.0, 5.0]);
        assert!(engine.history("d1", Metric::Humidity).is_empty());
        assert!(engine.history("nobody", Metric::Gas).is_empty());
        assert_eq!(engine.history_for("d1").len(), Metric::ALL.len());
        assert_eq!(engine.history_summary("d1", Metric::Temperature).unwrap().max, 5.0);
    }

    #[tokio::test]
    async fn test_feed_error_degrades_and_freezes_state() {
        let (mut engine, _alarm) = engine();
        let mut events = engine.event_bus().subscribe_events();

        engine.process_batch(batch("d1", json!({ "temperature": 60, "gas": 100 })));
        engine.handle_feed_event(FeedEvent::Error(FeedError::Transport("broker gone".into())));

        assert_eq!(engine.connectivity(), ConnectionStatus::Degraded);
        assert!(engine.alert_state("d1").fire_latched);
        assert_eq!(engine.history("d1", Metric::Temperature), vec![60.0]);
        assert!(engine.latest("d1").is_some());

        engine.process_batch(batch("d1", json!({ "temperature": 61 })));
        assert_eq!(engine.connectivity(), ConnectionStatus::Connected);
        engine.settle().await;

        let mut connectivity = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let crate::core::EventPayload::Connectivity { status, .. } = event.payload {
                connectivity.push(status);
            }
        }
        assert_eq!(connectivity, vec![ConnectionStatus::Degraded, ConnectionStatus::Connected]);
    }

    #[tokio::test]
    async fn test_await_telemetry_policy() {
        let mut config = Config::default();
        config.alerting.new_device_policy =
            NewDevicePolicy::AwaitTelemetry { min_hazard_fields: 2 };
        let (mut engine, alarm) = engine_with(config);

        let events = engine.process_batch(batch("d1", json!({ "temperature": 70 })));
        assert!(events.is_empty());

        let events = engine.process_batch(batch("d1", json!({ "temperature": 70, "gas": 100 })));
        engine.settle().await;
        assert_eq!(kinds(&events), vec![AlertKind::FireOnset]);
        assert_eq!(alarm.starts(), 1);
    }

    #[tokio::test]
    async fn test_alert_events_are_broadcast() {
        let (mut engine, _alarm) = engine();
        let mut rx = engine.subscribe_alert_events();

        engine.process_batch(batch("d1", json!({ "fireDetected": "true" })));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, AlertKind::FireOnset);
        assert_eq!(event.device_id, "d1");
        engine.settle().await;
    }

    #[tokio::test]
    async fn test_map_markers_and_region() {
        let (mut engine, _alarm) = engine();
        let mut fleet = FeedBatch::new();
        fleet.insert(
            "a".into(),
            json!({ "latitude": 6.90, "longitude": 79.80, "temperature": 70 }),
        );
        fleet.insert(
            "b".into(),
            json!({ "latitude": 6.94, "longitude": 79.90, "temperature": 20 }),
        );
        fleet.insert("c".into(), json!({ "temperature": 20 }));
        engine.process_batch(fleet);
        engine.settle().await;

        let markers = engine.map_markers();
        assert_eq!(markers.len(), 2);
        assert!(markers[0].alert);
        assert_eq!(markers[0].radius_m, Some(100.0));
        assert!(!markers[1].alert);

        let region = engine.map_region().unwrap();
        assert!((region.latitude - 6.92).abs() < 1e-9);
        assert!((region.longitude_delta - 0.10).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_run_until_feed_ends() {
        use crate::streaming::ReplayFeed;
        use std::time::Duration;

        let path = std::env::temp_dir()
            .join(format!("forestwatch-engine-{}.jsonl", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "{\"d1\": {\"temperature\": 60}}\n{\"d1\": {\"temperature\": 20}}\n",
        )
        .unwrap();

        let (mut engine, alarm) = engine();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let mut feed = ReplayFeed::new(&path, Duration::from_millis(1), false);

        engine.run(&mut feed, shutdown_rx).await.unwrap();

        assert_eq!(engine.state().total_updates, 2);
        assert_eq!(alarm.starts(), 1);
        // fire clear plus the shutdown stop
        assert_eq!(alarm.stops(), 2);
        assert!(!engine.state().running);

        let _ = std::fs::remove_file(path);
    }
}
