//! Global request-rate limiter
//!
//! A token bucket shared by every worker: capacity
//! `max(requests_per_minute, max_workers)`, refilled one token per
//! `60s / requests_per_minute` by a background task until the crawl's
//! cancellation token fires. Tokens beyond capacity are discarded. The
//! bucket starts with `min(max_workers, capacity)` tokens so startup is
//! not stalled. Every outbound HTTP request consumes exactly one token.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
}

impl RateLimiter {
    /// Creates the bucket and spawns its refill task
    ///
    /// The refill task runs until `cancel` fires.
    pub fn start(requests_per_minute: usize, max_workers: usize, cancel: CancellationToken) -> Self {
        let capacity = requests_per_minute.max(max_workers).max(1);
        let initial = max_workers.min(capacity).max(1);
        let permits = Arc::new(Semaphore::new(initial));

        let interval = Duration::from_secs(60)
            .checked_div(requests_per_minute.max(1) as u32)
            .unwrap_or(Duration::from_secs(60))
            .max(Duration::from_micros(1));

        let refill = permits.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; consume it so the initial
            // fill is not exceeded right away.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        if refill.available_permits() < capacity {
                            refill.add_permits(1);
                        }
                    }
                }
            }
        });

        Self { permits }
    }

    /// Blocks until a token is available or the crawl is cancelled
    ///
    /// Returns whether a token was granted.
    pub async fn acquire(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            permit = self.permits.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    true
                }
                Err(_) => false,
            },
        }
    }
}
