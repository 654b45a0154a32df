//! Per-source feed quality tracking, generalized from the teacher's
//! per-scraper kill-switch (`DataSourceKillSwitch`) to the one live feed plus
//! the replay engine this pipeline actually runs.

use std::collections::VecDeque;

use parking_lot::RwLock;

const LATENCY_WINDOW: usize = 64;

struct Inner {
    source: &'static str,
    reason: Option<String>,
    consecutive_failures: u32,
    failure_threshold: u32,
    latencies_ms: VecDeque<f64>,
}

/// Tracks which source is currently backing the feed (`live`, `replay`, or
/// `mock`) and why, surfaced through `/api/market/status`.
pub struct FeedHealth {
    inner: RwLock<Inner>,
}

impl FeedHealth {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            inner: RwLock::new(Inner {
                source: "live",
                reason: None,
                consecutive_failures: 0,
                failure_threshold,
                latencies_ms: VecDeque::with_capacity(LATENCY_WINDOW),
            }),
        }
    }

    pub fn record_success(&self, latency_ms: f64) {
        let mut inner = self.inner.write();
        inner.consecutive_failures = 0;
        if inner.latencies_ms.len() == LATENCY_WINDOW {
            inner.latencies_ms.pop_front();
        }
        inner.latencies_ms.push_back(latency_ms);
    }

    pub fn record_failure(&self, reason: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.consecutive_failures += 1;
        inner.reason = Some(reason.into());
        if inner.consecutive_failures >= inner.failure_threshold {
            inner.source = "mock";
        }
    }

    pub fn set_source(&self, source: &'static str) {
        self.inner.write().source = source;
    }

    pub fn current_source(&self) -> &'static str {
        self.inner.read().source
    }

    pub fn reason(&self) -> Option<String> {
        self.inner.read().reason.clone()
    }
}

impl Default for FeedHealth {
    fn default() -> Self {
        Self::new(3)
    }
}
