//! Per-client admission control.
//!
//! Each client key owns one record holding the start of its current window
//! and the number of requests counted since then. Allowance grows with the
//! time elapsed inside the window (`requests_per_minute` per 60s, plus one)
//! and is capped by `burst_limit`. A window older than [`WINDOW`] is reset on
//! the next request, and idle records are evicted by a background sweeper.

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
    time::Duration,
};

use thiserror::Error;
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Length of one accounting window.
pub const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitConfigError {
    #[error("requests_per_minute must be at least 1")]
    ZeroRequestsPerMinute,
    #[error("burst_limit must be at least 1")]
    ZeroBurstLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Reject,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        matches!(self, Admission::Admit)
    }
}

pub struct RateLimiter {
    requests_per_minute: u32,
    burst_limit: u32,
    inner: Mutex<HashMap<String, ClientRecord>>,
}

struct ClientRecord {
    window_start: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, burst_limit: u32) -> Result<Self, RateLimitConfigError> {
        if requests_per_minute == 0 {
            return Err(RateLimitConfigError::ZeroRequestsPerMinute);
        }
        if burst_limit == 0 {
            return Err(RateLimitConfigError::ZeroBurstLimit);
        }

        Ok(Self {
            requests_per_minute,
            burst_limit,
            inner: Mutex::new(HashMap::new()),
        })
    }

    pub async fn check(&self, key: &str) -> Admission {
        self.check_at(key, Instant::now()).await
    }

    /// Accounts one request from `key` observed at `now`.
    ///
    /// A rejected request leaves the record untouched. A `now` earlier than
    /// the window start counts as zero elapsed time.
    pub async fn check_at(&self, key: &str, now: Instant) -> Admission {
        let mut clients = self.inner.lock().await;

        let record = match clients.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(ClientRecord {
                    window_start: now,
                    count: 1,
                });
                return Admission::Admit;
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        let elapsed = now.saturating_duration_since(record.window_start);
        if elapsed >= WINDOW {
            record.window_start = now;
            record.count = 1;
            return Admission::Admit;
        }

        if record.count >= self.allowance(elapsed) {
            return Admission::Reject;
        }

        record.count += 1;
        Admission::Admit
    }

    /// Requests a client may have counted after `elapsed` inside its window.
    fn allowance(&self, elapsed: Duration) -> u32 {
        let earned =
            u128::from(self.requests_per_minute) * elapsed.as_nanos() / WINDOW.as_nanos();
        let allowed = earned
            .saturating_add(1)
            .min(u128::from(self.burst_limit));
        u32::try_from(allowed).unwrap_or(self.burst_limit)
    }

    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    /// Drops every record whose window started at least [`WINDOW`] before
    /// `now`. Returns how many records were evicted.
    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut clients = self.inner.lock().await;
        let before = clients.len();
        clients.retain(|_, record| now.saturating_duration_since(record.window_start) < WINDOW);
        before - clients.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    pub fn burst_limit(&self) -> u32 {
        self.burst_limit
    }

    /// Spawns the periodic sweeper. The first sweep runs immediately.
    pub fn start_sweeper(self: Arc<Self>, period: Duration) -> Sweeper {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        let evicted = self.sweep().await;
                        if evicted > 0 {
                            let remaining = self.tracked_clients().await;
                            debug!(evicted, remaining, "evicted idle rate limit clients");
                        }
                    }
                }
            }
            debug!("rate limit sweeper stopped");
        });

        Sweeper { token, handle }
    }

    #[cfg(test)]
    async fn count_for(&self, key: &str) -> Option<u32> {
        self.inner.lock().await.get(key).map(|record| record.count)
    }
}

/// Handle to the background sweeper task.
pub struct Sweeper {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(err) = self.handle.await {
            error!("rate limit sweeper failed: {err}");
        }
    }
}
