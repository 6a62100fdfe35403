//! Frontier admission and backpressure
//!
//! URLs enter the crawl through [`Crawler::enqueue_internal`] and
//! [`Crawler::enqueue_external`]. Admission applies normalization, the
//! extension filter, the cache-skip oracle, the depth cap, the page cap,
//! and per-URL deduplication, in that order. Jobs are sent over bounded
//! channels; a full channel spawns a detached blocking send rather than
//! blocking the producing worker, which avoids self-deadlock when workers
//! feed their own queue.

use crate::crawler::{Crawler, ExternalJob, InternalJob};
use crate::url::{allowed_extension, normalize_url};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Notify;

/// Counts outstanding jobs for one channel and wakes waiters at zero
///
/// The counter is incremented before a job is sent and decremented when
/// its processing finishes (or its send fails), so "zero" means the
/// channel is drained and no worker can produce more work.
#[derive(Debug, Default)]
pub(crate) struct PendingCounter {
    count: AtomicUsize,
    notify: Notify,
}

impl PendingCounter {
    pub(crate) fn add(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn done(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    /// Waits until the count reaches zero
    pub(crate) async fn wait(&self) {
        loop {
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            let notified = self.notify.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Crawler {
    /// Admits an internal URL to the frontier
    pub(crate) fn enqueue_internal(&self, raw: &str, depth: u32) {
        let Some(normalized) = normalize_url(&self.start, raw) else {
            return;
        };
        if !allowed_extension(&self.allowed_ext, &normalized) {
            self.record_skipped_extension();
            return;
        }
        let normalized_str = normalized.to_string();
        if normalized_str != self.start_url
            && self
                .cache
                .should_skip(&normalized_str, self.markdown_dir.as_deref())
        {
            self.record_skipped_cache();
            return;
        }
        if self.max_depth >= 0 && depth as i64 > self.max_depth as i64 {
            self.record_skipped_depth();
            return;
        }

        {
            let mut frontier = self.frontier.lock().unwrap();
            if self.max_pages > 0 && frontier.visited_internal.len() >= self.max_pages {
                frontier.stats.skipped_by_limit += 1;
                return;
            }
            if !frontier.visited_internal.insert(normalized_str.clone()) {
                return;
            }
        }

        self.internal_pending.add();
        let Some(tx) = self.internal_tx.lock().unwrap().clone() else {
            self.internal_pending.done();
            return;
        };
        let job = InternalJob {
            url: normalized_str,
            depth,
        };
        match tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                // Detached send: producer workers must not block on their
                // own queue. The counter is released if the channel closed
                // underneath the task.
                let pending = Arc::clone(&self.internal_pending);
                tokio::spawn(async move {
                    if tx.send(job).await.is_err() {
                        pending.done();
                    }
                });
            }
            Err(TrySendError::Closed(_)) => {
                self.internal_pending.done();
            }
        }
    }

    /// Admits an external URL for a reachability check
    pub(crate) fn enqueue_external(&self, raw: &str, source: &str) {
        let Some(normalized) = normalize_url(&self.start, raw) else {
            return;
        };
        let normalized_str = normalized.to_string();
        {
            let mut frontier = self.frontier.lock().unwrap();
            if !frontier.visited_external.insert(normalized_str.clone()) {
                return;
            }
        }

        self.external_pending.add();
        let Some(tx) = self.external_tx.lock().unwrap().clone() else {
            self.external_pending.done();
            return;
        };
        let job = ExternalJob {
            url: normalized_str,
            source: source.to_string(),
        };
        match tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                let pending = Arc::clone(&self.external_pending);
                tokio::spawn(async move {
                    if tx.send(job).await.is_err() {
                        pending.done();
                    }
                });
            }
            Err(TrySendError::Closed(_)) => {
                self.external_pending.done();
            }
        }
    }

    /// Drops the internal sender so drained workers observe channel close
    pub(crate) fn close_internal(&self) {
        self.internal_tx.lock().unwrap().take();
    }

    pub(crate) fn close_external(&self) {
        self.external_tx.lock().unwrap().take();
    }

    pub(crate) fn record_visit(&self) {
        self.frontier.lock().unwrap().stats.pages_visited += 1;
    }

    pub(crate) fn record_internal_link(&self) {
        self.frontier.lock().unwrap().stats.total_internal_links += 1;
    }

    pub(crate) fn record_external_link(&self) {
        self.frontier.lock().unwrap().stats.total_external_links += 1;
    }

    pub(crate) fn record_external_checked(&self) {
        self.frontier.lock().unwrap().stats.external_links_checked += 1;
    }

    pub(crate) fn record_skipped_cache(&self) {
        self.frontier.lock().unwrap().stats.skipped_by_cache += 1;
    }

    pub(crate) fn record_skipped_robots(&self) {
        self.frontier.lock().unwrap().stats.skipped_by_robots += 1;
    }

    pub(crate) fn record_skipped_extension(&self) {
        self.frontier.lock().unwrap().stats.skipped_by_extension += 1;
    }

    pub(crate) fn record_skipped_depth(&self) {
        self.frontier.lock().unwrap().stats.skipped_by_depth += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pending_counter_wait_returns_when_zero() {
        let counter = PendingCounter::default();
        // Nothing outstanding: wait must not block.
        tokio::time::timeout(Duration::from_millis(100), counter.wait())
            .await
            .expect("wait on zero counter");
    }

    #[tokio::test]
    async fn test_pending_counter_wakes_on_last_done() {
        let counter = Arc::new(PendingCounter::default());
        counter.add();
        counter.add();

        let waiter = {
            let counter = counter.clone();
            tokio::spawn(async move { counter.wait().await })
        };

        counter.done();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        counter.done();
        tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .expect("waiter finished")
            .unwrap();
    }
}
