// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spacing between consecutive calls.

use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum interval between calls by sleeping before each one.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl RateLimiter {
    /// Limiter with `interval` between calls; `None` never waits.
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Wait until the next call may be sent.
    pub async fn wait(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        self.last = Some(Instant::now());
    }
}
