// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Feed subscription boundary
//!
//! A feed pushes the full device-id -> raw node mapping whenever any device
//! changes, never a diff. Events land on one mpsc channel so the engine
//! handles them strictly one after another.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Full mapping of device id to raw device node
pub type FeedBatch = HashMap<String, Value>;

/// Feed transport and decoding failures
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed transport error: {0}")]
    Transport(String),
    #[error("feed payload is not a device mapping: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("feed payload must be a JSON object, got {0}")]
    NotAMapping(&'static str),
    #[error("feed I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("feed source is not available: {0}")]
    Unavailable(String),
}

/// What a feed delivers to the engine
#[derive(Debug)]
pub enum FeedEvent {
    /// Full current mapping
    Update(FeedBatch),
    /// Transport failure; state stays frozen until the next update
    Error(FeedError),
}

/// Decode a full device mapping. `null` is an empty fleet.
pub fn parse_batch(bytes: &[u8]) -> Result<FeedBatch, FeedError> {
    let value: Value = serde_json::from_slice(bytes)?;
    batch_from_value(value)
}

pub fn batch_from_value(value: Value) -> Result<FeedBatch, FeedError> {
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Null => Ok(FeedBatch::new()),
        Value::Array(_) => Err(FeedError::NotAMapping("array")),
        Value::String(_) => Err(FeedError::NotAMapping("string")),
        Value::Number(_) => Err(FeedError::NotAMapping("number")),
        Value::Bool(_) => Err(FeedError::NotAMapping("bool")),
    }
}

/// A source of feed events
#[async_trait]
pub trait FeedSource: Send {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Start delivering events into `tx` until unsubscribed.
    async fn subscribe(&mut self, tx: mpsc::Sender<FeedEvent>) -> Result<Subscription, FeedError>;
}

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle to an active feed delivery.
///
/// `unsubscribe` is synchronous and idempotent; dropping the handle
/// unsubscribes too.
pub struct Subscription {
    name: String,
    closed: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    teardown: Mutex<Option<Teardown>>,
}

impl Subscription {
    pub fn new(name: &str, task: JoinHandle<()>) -> Self {
        Self {
            name: name.to_string(),
            closed: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(Some(task)),
            teardown: Mutex::new(None),
        }
    }

    /// Spawn the delivery task with access to the closed flag, so it can
    /// stop on its own between events.
    pub fn spawn<F, Fut>(name: &str, deliver: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let closed = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(deliver(closed.clone()));
        Self {
            name: name.to_string(),
            closed,
            task: Mutex::new(Some(task)),
            teardown: Mutex::new(None),
        }
    }

    /// Extra cleanup run once on unsubscribe, before the delivery task is aborted.
    pub fn with_teardown<F>(self, teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        *self.teardown.lock() = Some(Box::new(teardown));
        self
    }

    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    pub fn unsubscribe(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Feed '{}' already unsubscribed", self.name);
            return;
        }
        if let Some(teardown) = self.teardown.lock().take() {
            teardown();
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        info!("Unsubscribed from feed '{}'", self.name);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
