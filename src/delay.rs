//! Explicit delay abstraction for backoff sleeps and pacing pauses.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Returns immediately and records every requested delay.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    requested: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested(&self) -> Vec<Duration> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.requested.lock().push(duration);
        tokio::task::yield_now().await;
    }
}
