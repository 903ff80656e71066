//! Poll pacing
//!
//! The first poll runs immediately; every later poll waits the full interval
//! first. The delay runs at the start of each call, so the time between two
//! probes is the interval plus whatever the previous call and the caller took.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{FetcherError, Result};

/// Source of delays, injectable for tests
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Tracks whether a poll has happened yet
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    polled_before: bool,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            polled_before: false,
        }
    }

    pub fn polled_before(&self) -> bool {
        self.polled_before
    }

    /// Wait before a poll, unless it is the first one.
    ///
    /// Returns [`FetcherError::Cancelled`] as soon as `cancel` fires.
    pub async fn wait<S: Sleeper + ?Sized>(
        &mut self,
        sleeper: &S,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let first = !self.polled_before;
        self.polled_before = true;

        if cancel.is_cancelled() {
            return Err(FetcherError::Cancelled);
        }
        if first {
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetcherError::Cancelled),
            _ = sleeper.sleep(self.interval) => Ok(()),
        }
    }
}
