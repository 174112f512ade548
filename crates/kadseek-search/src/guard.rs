//! Outbound request guard
//!
//! Keeps a search from flooding a peer: the same peer is never sent the same
//! kind of request more often than once per `min_interval`. Denied requests
//! are skipped by the caller, never queued.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// Kind of outbound search request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Ask a peer for contacts closer to a target
    FindCloser,
    /// Ask a peer for files published under a keyword
    SearchKeyword,
}

/// Request guard configuration
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Minimum time between two sends of one kind to one peer
    pub min_interval: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
        }
    }
}

/// Guard counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GuardMetrics {
    /// Requests permitted
    pub allowed: u64,
    /// Requests denied
    pub blocked: u64,
}

/// Per-peer, per-kind send throttle
#[derive(Debug)]
pub struct RequestGuard {
    config: GuardConfig,
    last_sent: HashMap<(Ipv4Addr, RequestKind), Instant>,
    metrics: GuardMetrics,
}

impl RequestGuard {
    /// Create a guard
    #[must_use]
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            last_sent: HashMap::new(),
            metrics: GuardMetrics::default(),
        }
    }

    /// Whether a request of `kind` may be sent to `ip` at `now`
    ///
    /// A permitted request is recorded, so a second call with the same
    /// arguments inside the interval returns `false`.
    pub fn can_pass(&mut self, now: Instant, ip: Ipv4Addr, kind: RequestKind) -> bool {
        let interval = self.config.min_interval;
        let allowed = match self.last_sent.get(&(ip, kind)) {
            Some(last) => now.saturating_duration_since(*last) >= interval,
            None => true,
        };

        if allowed {
            self.last_sent.insert((ip, kind), now);
            self.metrics.allowed += 1;
        } else {
            self.metrics.blocked += 1;
            tracing::trace!(peer = %ip, ?kind, "request denied by guard");
        }
        allowed
    }

    /// Forget sends older than the interval
    pub fn purge(&mut self, now: Instant) {
        let interval = self.config.min_interval;
        self.last_sent
            .retain(|_, last| now.saturating_duration_since(*last) < interval);
    }

    /// Number of tracked (peer, kind) pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_sent.len()
    }

    /// Whether nothing is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_sent.is_empty()
    }

    /// Counters since creation
    #[must_use]
    pub const fn metrics(&self) -> GuardMetrics {
        self.metrics
    }
}

impl Default for RequestGuard {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}
