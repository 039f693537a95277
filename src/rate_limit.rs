//! Sliding-window admission limiter keyed by client identity

use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Key used when no client address can be determined
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Outcome of a single admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: usize },
    Denied { reset_in_secs: u64 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }

    /// Slots left in the current window; always 0 for a denial
    pub fn remaining(&self) -> usize {
        match self {
            Admission::Allowed { remaining } => *remaining,
            Admission::Denied { .. } => 0,
        }
    }
}

/// Counters exposed through the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct LimiterStats {
    pub window_ms: u64,
    pub max_requests: usize,
    pub tracked_clients: usize,
    pub admitted: u64,
    pub denied: u64,
}

pub struct RateLimiter {
    /// arrival instants per client, oldest first
    requests: DashMap<String, VecDeque<Instant>>,
    window: Duration,
    max_requests: usize,
    /// run a full sweep every N checks, 0 disables
    sweep_every: u64,
    calls: AtomicU64,
    admitted: AtomicU64,
    denied: AtomicU64,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            requests: DashMap::new(),
            window,
            max_requests,
            sweep_every: 0,
            calls: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
            denied: AtomicU64::new(0),
        }
    }

    pub fn with_sweep_every(mut self, calls: u64) -> Self {
        self.sweep_every = calls;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Same as [`RateLimiter::check_and_record`] using the current instant.
    pub fn check(&self, client_key: &str) -> Admission {
        self.check_and_record(client_key, Instant::now())
    }

    /// Decides whether `client_key` may issue another request at `now`.
    ///
    /// Timestamps at or beyond the window edge are dropped first, so the
    /// window is the half-open interval `(now - window, now]`. A denied call
    /// is not recorded.
    pub fn check_and_record(&self, client_key: &str, now: Instant) -> Admission {
        let key = if client_key.is_empty() {
            UNKNOWN_CLIENT
        } else {
            client_key
        };

        let admission = {
            // The entry guard holds the shard lock for the whole read-prune-append.
            let mut timestamps = self.requests.entry(key.to_string()).or_default();
            prune(&mut timestamps, now, self.window);

            if timestamps.len() >= self.max_requests {
                let reset_in_secs = match timestamps.front() {
                    Some(&oldest) => ceil_secs((oldest + self.window).saturating_duration_since(now)),
                    None => ceil_secs(self.window),
                };
                Admission::Denied { reset_in_secs }
            } else {
                timestamps.push_back(now);
                Admission::Allowed {
                    remaining: self.max_requests - timestamps.len(),
                }
            }
        };

        match admission {
            Admission::Allowed { .. } => self.admitted.fetch_add(1, Ordering::Relaxed),
            Admission::Denied { .. } => self.denied.fetch_add(1, Ordering::Relaxed),
        };

        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if self.sweep_every > 0 && calls % self.sweep_every == 0 {
            self.sweep(now);
        }

        admission
    }

    /// Prunes every client's history against `now` and drops clients left
    /// with no timestamps. Returns the number of clients removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.requests.len();
        self.requests.retain(|_, timestamps| {
            prune(timestamps, now, self.window);
            !timestamps.is_empty()
        });
        let removed = before.saturating_sub(self.requests.len());
        debug!(
            "Rate limiter sweep removed {} idle clients, {} still tracked",
            removed,
            self.requests.len()
        );
        removed
    }

    /// Number of timestamps currently held for a client, without pruning
    pub fn recorded(&self, client_key: &str) -> usize {
        self.requests.get(client_key).map(|t| t.len()).unwrap_or(0)
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }

    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            window_ms: self.window.as_millis() as u64,
            max_requests: self.max_requests,
            tracked_clients: self.tracked_clients(),
            admitted: self.admitted.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
        }
    }
}

/// Periodically sweeps idle clients out of the limiter table.
/// The first sweep runs one full period after the call.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            let tick = ticker.tick().await;
            let removed = limiter.sweep(tick.into_std());
            if removed > 0 {
                info!("Swept {} idle clients from the rate limiter", removed);
            }
        }
    })
}

fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = timestamps.front() {
        if now.saturating_duration_since(front) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_nanos().div_ceil(1_000_000_000) as u64
}
