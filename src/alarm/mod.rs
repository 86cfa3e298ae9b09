// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Alarm sink - audible alarm loop started on fire onset, stopped on clear
//!
//! Sinks must be idempotent: stopping an idle alarm is a no-op and starting
//! a ringing alarm restarts it from the top. Requests go through one worker
//! task per controller, so the sink sees them in the order they were made.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Alarm side-effect failures. Logged, never fatal.
#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("alarm output unavailable: {0}")]
    Unavailable(String),
    #[error("alarm output failed: {0}")]
    Output(#[from] std::io::Error),
}

/// Audible alarm output
#[async_trait]
pub trait AlarmSink: Send + Sync {
    /// Start ringing; restarts from the beginning if already ringing.
    async fn start(&self) -> Result<(), AlarmError>;

    /// Stop ringing; no-op if idle.
    async fn stop(&self) -> Result<(), AlarmError>;

    /// Whether a session is currently active
    fn is_active(&self) -> bool;
}

/// Alarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Ring on fire onset
    pub enabled: bool,

    /// Time between rings in milliseconds
    pub ring_interval_ms: u64,

    /// Emit the terminal bell on each ring
    pub terminal_bell: bool,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ring_interval_ms: 1200,
            terminal_bell: true,
        }
    }
}

impl AlarmConfig {
    /// Build the sink this configuration describes.
    pub fn build_sink(&self) -> Arc<dyn AlarmSink> {
        if self.enabled {
            Arc::new(LoopingAlarm::new(
                Duration::from_millis(self.ring_interval_ms.max(1)),
                self.terminal_bell,
            ))
        } else {
            Arc::new(SilentAlarm::default())
        }
    }
}

struct AlarmSession {
    id: Uuid,
    task: JoinHandle<()>,
}

/// Rings on a fixed interval until stopped. At most one session at a time.
pub struct LoopingAlarm {
    interval: Duration,
    terminal_bell: bool,
    session: Mutex<Option<AlarmSession>>,
}

impl LoopingAlarm {
    pub fn new(interval: Duration, terminal_bell: bool) -> Self {
        Self {
            interval,
            terminal_bell,
            session: Mutex::new(None),
        }
    }

    /// Id of the active session
    pub fn session_id(&self) -> Option<Uuid> {
        self.session.lock().as_ref().map(|s| s.id)
    }
}

#[async_trait]
impl AlarmSink for LoopingAlarm {
    async fn start(&self) -> Result<(), AlarmError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AlarmError::Unavailable(e.to_string()))?;

        let id = Uuid::new_v4();
        let interval = self.interval;
        let terminal_bell = self.terminal_bell;

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut ring = 0u64;
            loop {
                ticker.tick().await;
                ring += 1;
                warn!("🔔 FIRE ALARM (session {}, ring {})", id, ring);
                if terminal_bell {
                    let mut stderr = std::io::stderr();
                    if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
                        debug!("Terminal bell failed: {}", e);
                    }
                }
            }
        });

        let previous = self.session.lock().replace(AlarmSession { id, task });
        if let Some(previous) = previous {
            previous.task.abort();
            info!("Alarm restarted (session {} replaces {})", id, previous.id);
        } else {
            info!("Alarm started (session {})", id);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), AlarmError> {
        let session = self.session.lock().take();
        match session {
            Some(session) => {
                session.task.abort();
                info!("Alarm stopped (session {})", session.id);
            }
            None => debug!("Alarm stop requested while idle"),
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.session.lock().is_some()
    }
}

impl Drop for LoopingAlarm {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.task.abort();
        }
    }
}

/// Sink used when the audible alarm is disabled; only logs.
#[derive(Default)]
pub struct SilentAlarm {
    active: Mutex<bool>,
}

#[async_trait]
impl AlarmSink for SilentAlarm {
    async fn start(&self) -> Result<(), AlarmError> {
        *self.active.lock() = true;
        info!("Alarm start requested (audible alarm disabled)");
        Ok(())
    }

    async fn stop(&self) -> Result<(), AlarmError> {
        *self.active.lock() = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        *self.active.lock()
    }
}

/// Alarm request issued by the alert engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCommand {
    Start,
    Stop,
}

/// Non-blocking dispatcher in front of an alarm sink.
///
/// Requests are queued to a single worker that calls the sink in arrival
/// order. Failures are logged and never retried.
pub struct AlarmController {
    sink: Arc<dyn AlarmSink>,
    queue: Mutex<Option<AlarmQueue>>,
}

struct AlarmQueue {
    tx: mpsc::UnboundedSender<AlarmCommand>,
    worker: JoinHandle<()>,
}

impl AlarmController {
    pub fn new(sink: Arc<dyn AlarmSink>) -> Self {
        Self {
            sink,
            queue: Mutex::new(None),
        }
    }

    pub fn sink(&self) -> &Arc<dyn AlarmSink> {
        &self.sink
    }

    /// Queue a request without waiting for it. Returns `false` outside a
    /// tokio runtime, in which case the request is dropped with a warning.
    pub fn request(&self, command: AlarmCommand) -> bool {
        let mut queue = self.queue.lock();

        if queue.as_ref().map_or(true, |q| q.tx.is_closed()) {
            let runtime = match tokio::runtime::Handle::try_current() {
                Ok(handle) => handle,
                Err(_) => {
                    warn!("No async runtime, alarm {:?} request dropped", command);
                    return false;
                }
            };
            let (tx, rx) = mpsc::unbounded_channel();
            let worker = runtime.spawn(run_worker(self.sink.clone(), rx));
            *queue = Some(AlarmQueue { tx, worker });
        }

        match queue.as_ref() {
            Some(q) if q.tx.send(command).is_ok() => true,
            _ => {
                warn!("Alarm worker gone, {:?} request dropped", command);
                false
            }
        }
    }

    /// Wait until every queued request has reached the sink.
    pub async fn settle(&self) {
        let queue = self.queue.lock().take();
        if let Some(AlarmQueue { tx, worker }) = queue {
            drop(tx);
            if let Err(e) = worker.await {
                debug!("Alarm worker ended abnormally: {}", e);
            }
        }
    }
}

async fn run_worker(sink: Arc<dyn AlarmSink>, mut rx: mpsc::UnboundedReceiver<AlarmCommand>) {
    while let Some(command) = rx.recv().await {
        let result = match command {
            AlarmCommand::Start => sink.start().await,
            AlarmCommand::Stop => sink.stop().await,
        };
        if let Err(e) = result {
            warn!("Alarm {:?} failed: {}", command, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts requests; optionally fails every call.
    #[derive(Default)]
    pub struct RecordingAlarm {
        pub starts: AtomicUsize,
        pub stops: AtomicUsize,
        pub fail: bool,
        active: Mutex<bool>,
    }

    impl RecordingAlarm {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn starts(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }

        pub fn stops(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AlarmSink for RecordingAlarm {
        async fn start(&self) -> Result<(), AlarmError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AlarmError::Unavailable("speaker busy".into()));
            }
            *self.active.lock() = true;
            Ok(())
        }

        async fn stop(&self) -> Result<(), AlarmError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AlarmError::Unavailable("speaker busy".into()));
            }
            *self.active.lock() = false;
            Ok(())
        }

        fn is_active(&self) -> bool {
            *self.active.lock()
        }
    }
}
