// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Device fleet simulator for demo/testing

use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::streaming::{FeedBatch, FeedError, FeedEvent, FeedSource, Subscription};

/// Fleet centre (Colombo)
const ORIGIN: (f64, f64) = (6.9271, 79.8612);

const AMBIENT_TEMPERATURE: f64 = 28.0;
const AMBIENT_GAS: f64 = 250.0;
const FIRE_TEMPERATURE: f64 = 62.0;
const FIRE_GAS: f64 = 1000.0;

/// `tokio::time::interval` rejects a zero period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Simulation state of one device
#[derive(Debug, Clone)]
struct SimulatedDevice {
    id: String,
    latitude: f64,
    longitude: f64,
    geofence_radius: Option<f64>,
    temperature: f64,
    humidity: f64,
    gas: f64,
    rain_percent: f64,
    light: f64,
    fire_ticks: u32,
    storm_ticks: u32,
    servo_enabled: bool,
    /// Odd devices report under `last.data`
    nested: bool,
}

/// Random-walk model of a small fleet with occasional fires and storms
#[derive(Debug)]
pub struct FleetModel {
    rng: StdRng,
    devices: Vec<SimulatedDevice>,
    fire_probability: f64,
    storm_probability: f64,
    glitch_probability: f64,
}

impl FleetModel {
    pub fn new(device_count: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let devices = (0..device_count)
            .map(|i| SimulatedDevice {
                id: format!("device_{:02}", i + 1),
                latitude: ORIGIN.0 + rng.gen_range(-0.02..0.02),
                longitude: ORIGIN.1 + rng.gen_range(-0.02..0.02),
                geofence_radius: if i % 3 == 2 {
                    None
                } else {
                    Some(rng.gen_range(50.0..250.0_f64).round())
                },
                temperature: AMBIENT_TEMPERATURE + rng.gen_range(-2.0..2.0),
                humidity: rng.gen_range(60.0..80.0),
                gas: AMBIENT_GAS + rng.gen_range(-50.0..50.0),
                rain_percent: rng.gen_range(0.0..10.0),
                light: rng.gen_range(300.0..900.0),
                fire_ticks: 0,
                storm_ticks: 0,
                servo_enabled: false,
                nested: i % 2 == 1,
            })
            .collect();

        Self {
            rng,
            devices,
            fire_probability: 0.01,
            storm_probability: 0.02,
            glitch_probability: 0.02,
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn noise(&mut self, sd: f64) -> f64 {
        self.rng.sample::<f64, _>(StandardNormal) * sd
    }

    fn step(&mut self, index: usize) {
        let fire_start = self.rng.gen::<f64>() < self.fire_probability;
        let storm_start = self.rng.gen::<f64>() < self.storm_probability;
        let fire_len = self.rng.gen_range(4..10);
        let storm_len = self.rng.gen_range(6..15);
        let temp_noise = self.noise(0.4);
        let gas_noise = self.noise(15.0);
        let rain_noise = self.noise(2.0);
        let light_noise = self.noise(25.0);

        let d = &mut self.devices[index];

        if d.fire_ticks == 0 && fire_start {
            info!("Simulated fire starting at {}", d.id);
            d.fire_ticks = fire_len;
        }
        if d.storm_ticks == 0 && storm_start {
            info!("Simulated storm over {}", d.id);
            d.storm_ticks = storm_len;
        }

        let (temp_target, gas_target) = if d.fire_ticks > 0 {
            (FIRE_TEMPERATURE, FIRE_GAS)
        } else {
            (AMBIENT_TEMPERATURE, AMBIENT_GAS)
        };
        let rain_target = if d.storm_ticks > 0 { 85.0 } else { 3.0 };

        // mean-reverting walks
        d.temperature += 0.35 * (temp_target - d.temperature) + temp_noise;
        d.gas = (d.gas + 0.35 * (gas_target - d.gas) + gas_noise).max(0.0);
        d.rain_percent = (d.rain_percent + 0.4 * (rain_target - d.rain_percent) + rain_noise)
            .clamp(0.0, 100.0);
        d.humidity = (55.0 + d.rain_percent * 0.4).clamp(0.0, 100.0);
        d.light = (d.light + light_noise).clamp(0.0, 1023.0);

        d.fire_ticks = d.fire_ticks.saturating_sub(1);
        d.storm_ticks = d.storm_ticks.saturating_sub(1);
    }

    fn reading(&mut self, index: usize, now: DateTime<Utc>) -> Value {
        let glitch = self.rng.gen::<f64>() < self.glitch_probability;
        let d = &self.devices[index];
        let burning = d.fire_ticks > 0 || d.temperature > 55.0;

        let mut reading = Map::new();
        if glitch {
            // firmware occasionally sends text
            reading.insert("temperature".into(), json!(format!("{:.1}", d.temperature)));
        } else {
            reading.insert("temperature".into(), json!(round1(d.temperature)));
        }
        reading.insert("humidity".into(), json!(round1(d.humidity)));
        let gas_key = if d.nested { "smoke" } else { "gas" };
        reading.insert(gas_key.into(), json!(d.gas.round()));
        reading.insert("flameAnalog".into(), json!(if burning { 180.0 } else { 1000.0 }));
        reading.insert("flameDigital".into(), json!(if burning { 1 } else { 0 }));
        reading.insert("fireDetected".into(), json!(if burning { "true" } else { "false" }));
        reading.insert("ldrAnalog".into(), json!(d.light.round()));
        reading.insert("lightDescription".into(), json!(light_description(d.light)));
        reading.insert("rainAnalog".into(), json!((d.rain_percent * 20.0).round()));
        reading.insert("rainPercent".into(), json!(round1(d.rain_percent)));
        reading.insert("rainStatus".into(), json!(rain_status(d.rain_percent)));
        reading.insert("latitude".into(), json!(d.latitude));
        reading.insert("longitude".into(), json!(d.longitude));
        if let Some(radius) = d.geofence_radius {
            reading.insert("geofenceRadius".into(), json!(radius));
        }

        let timestamp = json!(now.timestamp_millis());
        let last = if d.nested {
            json!({ "data": Value::Object(reading), "timestamp": timestamp })
        } else {
            reading.insert("timestamp".into(), timestamp);
            Value::Object(reading)
        };

        json!({
            "last": last,
            "flameEnabled": true,
            "servoEnabled": d.servo_enabled,
        })
    }

    /// Advance every device one step and return the full mapping.
    pub fn tick(&mut self, now: DateTime<Utc>) -> FeedBatch {
        let mut batch = FeedBatch::with_capacity(self.devices.len());
        for index in 0..self.devices.len() {
            self.step(index);
            let node = self.reading(index, now);
            batch.insert(self.devices[index].id.clone(), node);
        }
        batch
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn light_description(ldr: f64) -> &'static str {
    match ldr {
        l if l > 700.0 => "Bright",
        l if l > 300.0 => "Dim",
        _ => "Dark",
    }
}

fn rain_status(percent: f64) -> &'static str {
    match percent {
        p if p >= 70.0 => "Heavy Rain",
        p if p > 20.0 => "Light Rain",
        _ => "Dry",
    }
}

/// In-process feed that publishes a simulated fleet
pub struct FleetSimulator {
    devices: usize,
    interval: Duration,
    seed: Option<u64>,
}

impl FleetSimulator {
    pub fn new(devices: usize, interval: Duration, seed: Option<u64>) -> Self {
        Self {
            devices: devices.max(1),
            interval: interval.max(MIN_INTERVAL),
            seed,
        }
    }
}

#[async_trait]
impl FeedSource for FleetSimulator {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn subscribe(&mut self, tx: mpsc::Sender<FeedEvent>) -> Result<Subscription, FeedError> {
        let mut model = FleetModel::new(self.devices, self.seed);
        let interval = self.interval;

        info!("Simulating {} devices every {:?}", model.device_count(), interval);

        Ok(Subscription::spawn(self.name(), move |closed| async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if closed.load(Ordering::SeqCst) {
                    return;
                }
                let batch = model.tick(Utc::now());
                if tx.send(FeedEvent::Update(batch)).await.is_err() {
                    debug!("Simulator receiver gone, stopping");
                    return;
                }
            }
        }))
    }
}
