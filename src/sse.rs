//! Per-connection SSE fan-out: bootstrap/epoch/seed/live/ping events,
//! watermarks, micro-batching, and backpressure drop policy.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::warn;
use uuid::Uuid;

use crate::models::{AnnotatedBar, Bar, MicroBar, Signal};

const PING_PERIOD: Duration = Duration::from_secs(10);
const MICROBATCH_MAX_ENTRIES: usize = 5;
const MICROBATCH_MAX_LATENCY_MS: u64 = 20;

/// Process-lifetime identifier; a new `epochId` tells clients the server
/// restarted and they should re-seed from their own watermark, not zero.
pub fn generate_epoch_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum SseOutEvent {
    Bootstrap { now: i64, warm: bool, symbols: Vec<String>, timeframe: String },
    Epoch { epoch_id: String, epoch_start_ms: i64, symbols: Vec<String>, timeframe: String },
    Bar { bar: AnnotatedBar },
    MicrobarBatch { microbars: Vec<MicroBar> },
    Alert { signal: Signal },
    Tick { symbol: String, ts_ms: i64, price: f64, size: f64 },
    Ping { ts: i64, buffered: usize, dropped: u64 },
}

impl SseOutEvent {
    fn event_name(&self) -> &'static str {
        match self {
            SseOutEvent::Bootstrap { .. } => "bootstrap",
            SseOutEvent::Epoch { .. } => "epoch",
            SseOutEvent::Bar { .. } => "bar",
            SseOutEvent::MicrobarBatch { .. } => "microbar_batch",
            SseOutEvent::Alert { .. } => "alert",
            SseOutEvent::Tick { .. } => "tick",
            SseOutEvent::Ping { .. } => "ping",
        }
    }

    fn seq_id(&self) -> Option<i64> {
        match self {
            SseOutEvent::Bar { bar } => Some(bar.bar.seq),
            _ => None,
        }
    }

    fn is_microbar_batch(&self) -> bool {
        matches!(self, SseOutEvent::MicrobarBatch { .. })
    }
}

/// Per-connection bounded backpressure queue implementing the priority drop
/// policy: drop the oldest microbar batch first; if the incoming event is
/// itself a microbar batch and none is queued, drop the incoming one;
/// otherwise drop the oldest event. `bar`/`alert`/`ping` are never
/// preferentially dropped while microbars exist in the queue.
pub struct BackpressureQueue {
    cap: usize,
    queue: VecDeque<SseOutEvent>,
    dropped: u64,
}

impl BackpressureQueue {
    pub fn new(cap: usize) -> Self {
        Self { cap, queue: VecDeque::with_capacity(cap), dropped: 0 }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn push(&mut self, event: SseOutEvent) {
        if self.queue.len() < self.cap {
            self.queue.push_back(event);
            return;
        }

        if let Some(pos) = self.queue.iter().position(|e| e.is_microbar_batch()) {
            self.queue.remove(pos);
            self.dropped += 1;
            self.queue.push_back(event);
            return;
        }

        if event.is_microbar_batch() {
            self.dropped += 1;
            return;
        }

        self.queue.pop_front();
        self.dropped += 1;
        self.queue.push_back(event);
    }

    pub fn pop(&mut self) -> Option<SseOutEvent> {
        self.queue.pop_front()
    }
}

/// Tracks the last emitted `seq` per symbol for one connection. Live bars
/// with `seq <= lastSentSeq[sym]` must never be emitted.
#[derive(Default)]
pub struct Watermarks {
    last_sent_seq: HashMap<String, i64>,
}

impl Watermarks {
    pub fn new(initial: HashMap<String, i64>) -> Self {
        Self { last_sent_seq: initial }
    }

    pub fn get(&self, symbol: &str) -> i64 {
        *self.last_sent_seq.get(symbol).unwrap_or(&i64::MIN)
    }

    /// Returns `true` and advances the watermark if `seq` is strictly ahead;
    /// `false` (no-op) if `seq` would violate monotonicity.
    pub fn admit(&mut self, symbol: &str, seq: i64) -> bool {
        let current = self.get(symbol);
        if seq <= current {
            return false;
        }
        self.last_sent_seq.insert(symbol.to_string(), seq);
        true
    }
}

struct MicroBatcher {
    pending: Vec<MicroBar>,
    deadline: Option<tokio::time::Instant>,
}

impl MicroBatcher {
    fn new() -> Self {
        Self { pending: Vec::new(), deadline: None }
    }

    fn push(&mut self, mb: MicroBar) -> Option<Vec<MicroBar>> {
        self.pending.push(mb);
        if self.deadline.is_none() {
            self.deadline = Some(tokio::time::Instant::now() + Duration::from_millis(MICROBATCH_MAX_LATENCY_MS));
        }
        if self.pending.len() >= MICROBATCH_MAX_ENTRIES {
            return Some(self.flush());
        }
        None
    }

    fn flush(&mut self) -> Vec<MicroBar> {
        self.deadline = None;
        std::mem::take(&mut self.pending)
    }

    fn is_due(&self) -> bool {
        self.deadline.map(|d| tokio::time::Instant::now() >= d).unwrap_or(false)
    }
}

/// One live SSE connection's event loop. Constructed per accepted request;
/// dropping the returned channel ends the connection's subscriptions with
/// no further bookkeeping (see the event bus design note on cyclic refs).
pub struct Connection {
    pub epoch_id: String,
    pub watermarks: Watermarks,
    pub queue: BackpressureQueue,
    microbatcher: MicroBatcher,
}

impl Connection {
    pub fn new(epoch_id: String, initial_watermarks: HashMap<String, i64>, queue_cap: usize) -> Self {
        Self {
            epoch_id,
            watermarks: Watermarks::new(initial_watermarks),
            queue: BackpressureQueue::new(queue_cap),
            microbatcher: MicroBatcher::new(),
        }
    }

    pub fn offer_bar(&mut self, bar: Bar, snapshot: crate::models::IndicatorSnapshot) {
        if !self.watermarks.admit(&bar.symbol, bar.seq) {
            return;
        }
        self.queue.push(SseOutEvent::Bar { bar: AnnotatedBar { bar, indicators: snapshot } });
    }

    pub fn offer_microbar(&mut self, mb: MicroBar) {
        if let Some(batch) = self.microbatcher.push(mb) {
            self.queue.push(SseOutEvent::MicrobarBatch { microbars: batch });
        }
    }

    pub fn flush_due_microbatch(&mut self) {
        if self.microbatcher.is_due() && !self.microbatcher.pending.is_empty() {
            let batch = self.microbatcher.flush();
            self.queue.push(SseOutEvent::MicrobarBatch { microbars: batch });
        }
    }

    pub fn offer_alert(&mut self, signal: Signal) {
        self.queue.push(SseOutEvent::Alert { signal });
    }

    pub fn ping(&mut self, now_ms: i64) {
        self.queue.push(SseOutEvent::Ping { ts: now_ms, buffered: self.queue.len(), dropped: self.queue.dropped() });
    }
}

/// Formats one outbound event as SSE wire framing: `event: NAME\n[id: SEQ\n]data: JSON\n\n`.
pub fn format_event(event: &SseOutEvent) -> String {
    let name = event.event_name();
    let id_line = event.seq_id().map(|seq| format!("id: {seq}\n")).unwrap_or_default();
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    format!("event: {name}\n{id_line}data: {data}\n\n")
}

/// Drives one connection's heartbeat on a fixed period; callers select! this
/// alongside event-bus receivers in the route handler.
pub async fn heartbeat_ticker() -> tokio::time::Interval {
    interval(PING_PERIOD)
}

#[allow(dead_code)]
fn log_dropped(symbol: &str, dropped: u64) {
    if dropped > 0 {
        warn!(symbol, dropped, "sse connection dropping events under backpressure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timeframe;

    fn bar(seq: i64) -> Bar {
        Bar {
            symbol: "SPY".to_string(),
            timeframe: Timeframe::M1,
            seq,
            bar_start: seq * 60_000,
            bar_end: seq * 60_000 + 60_000,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        }
    }

    #[test]
    fn watermark_blocks_non_increasing_seq() {
        let mut w = Watermarks::default();
        assert!(w.admit("SPY", 5));
        assert!(!w.admit("SPY", 5));
        assert!(!w.admit("SPY", 4));
        assert!(w.admit("SPY", 6));
    }

    #[test]
    fn connection_drops_seq_at_or_below_watermark() {
        let mut conn = Connection::new("epoch-1".to_string(), HashMap::from([("SPY".to_string(), 10)]), 100);
        conn.offer_bar(bar(10), Default::default());
        assert_eq!(conn.queue.len(), 0);
        conn.offer_bar(bar(11), Default::default());
        assert_eq!(conn.queue.len(), 1);
    }

    #[test]
    fn backpressure_drops_oldest_microbatch_first() {
        let mut q = BackpressureQueue::new(2);
        q.push(SseOutEvent::MicrobarBatch { microbars: vec![] });
        q.push(SseOutEvent::Ping { ts: 0, buffered: 0, dropped: 0 });
        q.push(SseOutEvent::Bar { bar: AnnotatedBar { bar: bar(1), indicators: Default::default() } });
        assert_eq!(q.dropped(), 1);
        assert_eq!(q.len(), 2);
        assert!(!matches!(q.pop(), Some(SseOutEvent::MicrobarBatch { .. })));
    }
}
