//! Per-symbol bounded FIFO of recent 1m bars, insertion-ordered by `seq`.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use crate::models::Bar;

struct SymbolRing {
    cap: usize,
    bars: VecDeque<Bar>,
}

impl SymbolRing {
    fn new(cap: usize) -> Self {
        Self { cap, bars: VecDeque::with_capacity(cap.min(1024)) }
    }

    fn push(&mut self, bar: Bar) {
        if let Some(back) = self.bars.back() {
            if bar.seq <= back.seq {
                return; // out-of-order or duplicate, never rewrite history here
            }
        }
        if self.bars.len() >= self.cap {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }
}

/// Bounded per-symbol ring of finalized 1m bars, capped at `RING_BUFFER_CAP`.
pub struct RingBuffer {
    cap: usize,
    symbols: RwLock<HashMap<String, SymbolRing>>,
}

impl RingBuffer {
    pub fn new(cap: usize) -> Self {
        Self { cap, symbols: RwLock::new(HashMap::new()) }
    }

    pub fn push(&self, bar: Bar) {
        let mut map = self.symbols.write();
        map.entry(bar.symbol.clone())
            .or_insert_with(|| SymbolRing::new(self.cap))
            .push(bar);
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.symbols.read().get(symbol).map(|r| r.bars.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, symbol: &str) -> bool {
        self.len(symbol) == 0
    }

    /// Bars with `seq > since_seq`, oldest first. `since_seq = i64::MIN` returns everything held.
    pub fn since(&self, symbol: &str, since_seq: i64) -> Vec<Bar> {
        self.symbols
            .read()
            .get(symbol)
            .map(|r| r.bars.iter().filter(|b| b.seq > since_seq).cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent `limit` bars, oldest first.
    pub fn recent(&self, symbol: &str, limit: usize) -> Vec<Bar> {
        self.symbols
            .read()
            .get(symbol)
            .map(|r| {
                let len = r.bars.len();
                let skip = len.saturating_sub(limit);
                r.bars.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }
}
