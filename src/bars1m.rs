//! Authoritative per-symbol store of the latest 1m bars with attached
//! indicator snapshots. Exactly one writer per symbol (the bar builder's
//! finalize path); many readers (SSE fan-out, history service, HTTP routes).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::models::{AnnotatedBar, Bar, IndicatorSnapshot};

pub struct Bars1m {
    latest: RwLock<HashMap<String, AnnotatedBar>>,
}

impl Bars1m {
    pub fn new() -> Self {
        Self { latest: RwLock::new(HashMap::new()) }
    }

    pub fn record(&self, bar: Bar, indicators: IndicatorSnapshot) {
        let mut map = self.latest.write();
        let entry = map.entry(bar.symbol.clone()).or_insert_with(|| AnnotatedBar {
            bar: bar.clone(),
            indicators: IndicatorSnapshot::default(),
        });
        if bar.seq >= entry.bar.seq {
            entry.bar = bar;
            entry.indicators = indicators;
        }
    }

    pub fn latest(&self, symbol: &str) -> Option<AnnotatedBar> {
        self.latest.read().get(symbol).cloned()
    }
}

impl Default for Bars1m {
    fn default() -> Self {
        Self::new()
    }
}
