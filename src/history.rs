//! Read-through historical backfill: ring buffer -> vendor REST -> mock,
//! with inflight request coalescing so N concurrent identical queries issue
//! exactly one underlying vendor call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::bars1m::Bars1m;
use crate::config::Config;
use crate::models::{Bar, Timeframe};
use crate::ring_buffer::RingBuffer;
use crate::rollup::rollup_from_1m;
use crate::vendor::{generate_mock_1m, VendorClient};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RequestKey {
    symbol: String,
    timeframe: &'static str,
    limit: usize,
    before: Option<i64>,
    since_seq: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub limit: usize,
    pub before: Option<i64>,
    pub since_seq: Option<i64>,
}

type CoalesceMap = Mutex<HashMap<RequestKey, watch::Receiver<Option<Arc<Vec<Bar>>>>>>;

pub struct HistoryService {
    ring: Arc<RingBuffer>,
    bars1m: Arc<Bars1m>,
    vendor: Arc<VendorClient>,
    mock_enabled: bool,
    inflight: CoalesceMap,
}

impl HistoryService {
    pub fn new(ring: Arc<RingBuffer>, bars1m: Arc<Bars1m>, vendor: Arc<VendorClient>, config: &Config) -> Self {
        Self { ring, bars1m, vendor, mock_enabled: config.mock_history_enabled, inflight: Mutex::new(HashMap::new()) }
    }

    pub async fn get_history(&self, query: HistoryQuery) -> Vec<Bar> {
        let key = RequestKey {
            symbol: query.symbol.clone(),
            timeframe: query.timeframe.as_str(),
            limit: query.limit,
            before: query.before,
            since_seq: query.since_seq,
        };

        let existing = {
            let map = self.inflight.lock();
            map.get(&key).cloned()
        };

        if let Some(mut rx) = existing {
            if rx.changed().await.is_ok() {
                if let Some(bars) = rx.borrow().clone() {
                    return (*bars).clone();
                }
            }
            return self.resolve(&query).await;
        }

        let (tx, rx) = watch::channel(None);
        self.inflight.lock().insert(key.clone(), rx);
        let result = self.resolve(&query).await;
        let _ = tx.send(Some(Arc::new(result.clone())));
        self.inflight.lock().remove(&key);
        result
    }

    async fn resolve(&self, query: &HistoryQuery) -> Vec<Bar> {
        let since_seq = query.since_seq.unwrap_or(i64::MIN);

        if query.timeframe == Timeframe::M1 {
            if let Some(s) = query.since_seq {
                return self.ring.since(&query.symbol, s);
            }
            if self.ring.len(&query.symbol) >= query.limit.min(10) {
                return self.ring.recent(&query.symbol, query.limit);
            }
        }

        let multiplier = query.timeframe.minutes();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let to_ms = query.before.unwrap_or(now_ms);
        let from_ms = to_ms - (query.limit as i64) * multiplier * 60_000;

        let mut fetched = self.vendor.fetch_1m(&query.symbol, from_ms, to_ms, query.limit * multiplier as usize).await;

        if fetched.is_empty() && self.mock_enabled {
            fetched = generate_mock_1m(&query.symbol, from_ms, to_ms);
        }

        if fetched.is_empty() {
            return Vec::new();
        }

        // Paginated historical scroll (`before` set) must never pollute the
        // authoritative buffer.
        if query.before.is_none() {
            for bar in &fetched {
                self.ring.push(bar.clone());
            }
            if let Some(last) = fetched.last() {
                self.bars1m.record(last.clone(), Default::default());
            }
        }

        let rolled = rollup_from_1m(&fetched, query.timeframe, false);
        let filtered: Vec<Bar> = rolled.into_iter().filter(|b| b.seq > since_seq).collect();
        let len = filtered.len();
        let skip = len.saturating_sub(query.limit);
        filtered.into_iter().skip(skip).collect()
    }
}
