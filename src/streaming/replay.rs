// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Replay feed - JSON lines, one full device mapping per line

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::feed::{parse_batch, FeedError, FeedEvent, FeedSource, Subscription};

/// Replays a recorded feed from disk
pub struct ReplayFeed {
    path: PathBuf,
    interval: Duration,
    repeat: bool,
}

impl ReplayFeed {
    pub fn new(path: impl Into<PathBuf>, interval: Duration, repeat: bool) -> Self {
        Self {
            path: path.into(),
            interval,
            repeat,
        }
    }
}

#[async_trait]
impl FeedSource for ReplayFeed {
    fn name(&self) -> &str {
        "replay"
    }

    async fn subscribe(&mut self, tx: mpsc::Sender<FeedEvent>) -> Result<Subscription, FeedError> {
        // Fail fast on a missing file instead of inside the task
        File::open(&self.path).await?;

        let path = self.path.clone();
        let interval = self.interval;
        let repeat = self.repeat;
        let subscription = Subscription::spawn(self.name(), move |closed| async move {
            loop {
                let file = match File::open(&path).await {
                    Ok(f) => f,
                    Err(e) => {
                        let _ = tx.send(FeedEvent::Error(e.into())).await;
                        return;
                    }
                };

                let mut lines = BufReader::new(file).lines();
                let mut line_no = 0usize;
                let mut delivered = 0usize;
                loop {
                    let line = match lines.next_line().await {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e) => {
                            if tx.send(FeedEvent::Error(e.into())).await.is_err() {
                                return;
                            }
                            delivered += 1;
                            tokio::time::sleep(interval).await;
                            break;
                        }
                    };
                    line_no += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    if closed.load(Ordering::SeqCst) {
                        return;
                    }

                    let event = match parse_batch(line.as_bytes()) {
                        Ok(batch) => FeedEvent::Update(batch),
                        Err(e) => {
                            warn!("Replay line {} unreadable: {}", line_no, e);
                            FeedEvent::Error(e)
                        }
                    };
                    if tx.send(event).await.is_err() {
                        debug!("Replay receiver gone, stopping");
                        return;
                    }
                    delivered += 1;
                    tokio::time::sleep(interval).await;
                }

                if !repeat {
                    info!("Replay of {:?} finished", path);
                    return;
                }
                // a pass with no lines would reopen the file forever
                if delivered == 0 {
                    info!("Replay of {:?} has nothing to repeat, stopping", path);
                    return;
                }
            }
        });

        info!("Replaying feed from {:?}", self.path);
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("forestwatch-{}-{}.jsonl", name, uuid::Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_replays_lines_in_order() {
        let path = temp_file(
            "order",
            "{\"a\": {\"temperature\": 20}}\n\nnot json\n{\"a\": {\"temperature\": 21}}\n",
        );
        let (tx, mut rx) = mpsc::channel(8);
        let mut feed = ReplayFeed::new(&path, Duration::from_millis(1), false);
        let _subscription = feed.subscribe(tx).await.unwrap();

        let mut updates = 0;
        let mut errors = 0;
        while let Some(event) = rx.recv().await {
            match event {
                FeedEvent::Update(batch) => {
                    assert!(batch.contains_key("a"));
                    updates += 1;
                }
                FeedEvent::Error(_) => errors += 1,
            }
        }
        assert_eq!(updates, 2);
        assert_eq!(errors, 1);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_repeating_blank_file_ends() {
        let path = temp_file("blank", "\n  \n\n");
        let (tx, mut rx) = mpsc::channel(1);
        let mut feed = ReplayFeed::new(&path, Duration::ZERO, true);
        let subscription = feed.subscribe(tx).await.unwrap();

        let ended = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(ended, Ok(None)));
        subscription.unsubscribe();

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_repeat_restarts_from_first_line() {
        let path = temp_file("repeat", "{\"a\": {\"temperature\": 20}}\n");
        let (tx, mut rx) = mpsc::channel(1);
        let mut feed = ReplayFeed::new(&path, Duration::from_millis(1), true);
        let subscription = feed.subscribe(tx).await.unwrap();

        for _ in 0..3 {
            assert!(matches!(rx.recv().await, Some(FeedEvent::Update(_))));
        }
        subscription.unsubscribe();

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_missing_file_fails_subscribe() {
        let (tx, _rx) = mpsc::channel(1);
        let mut feed = ReplayFeed::new("/nonexistent/forestwatch.jsonl", Duration::ZERO, false);
        assert!(matches!(feed.subscribe(tx).await, Err(FeedError::Io(_))));
    }
}
