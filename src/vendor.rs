//! Historical 1m bar fetch from the vendor REST API (spec §6.2). Non-2xx or
//! timeout never throws into the caller - logged and treated as empty so the
//! history service can fall through to its next resolution step.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::warn;

use crate::models::{Bar, Timeframe};

#[derive(Debug, Deserialize)]
struct VendorAggResult {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize)]
struct VendorAggResponse {
    #[serde(default)]
    results: Vec<VendorAggResult>,
}

pub struct VendorClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl VendorClient {
    pub fn new(base_url: String, api_key: String, timeout: std::time::Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url, api_key })
    }

    /// Fetches raw 1m bars for `[from_ms, to_ms)`. Returns an empty vec on
    /// any transport or status failure; never propagates an error upward.
    pub async fn fetch_1m(&self, symbol: &str, from_ms: i64, to_ms: i64, limit: usize) -> Vec<Bar> {
        let url = format!(
            "{base}/aggs/ticker/{symbol}/range/1/minute/{from_ms}/{to_ms}?adjusted=true&sort=asc&limit={limit}&apiKey={key}",
            base = self.base_url,
            symbol = symbol,
            from_ms = from_ms,
            to_ms = to_ms,
            limit = limit,
            key = self.api_key,
        );

        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(symbol, "vendor history request failed: {e}");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!(symbol, status = %response.status(), "vendor history returned non-2xx");
            return Vec::new();
        }

        let parsed: VendorAggResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!(symbol, "vendor history response did not parse: {e}");
                return Vec::new();
            }
        };

        parsed
            .results
            .into_iter()
            .map(|r| Bar {
                symbol: symbol.to_string(),
                timeframe: Timeframe::M1,
                seq: Bar::seq_for_bar_start(r.t),
                bar_start: r.t,
                bar_end: r.t + Timeframe::M1.ms(),
                open: r.o,
                high: r.h,
                low: r.l,
                close: r.c,
                volume: r.v,
            })
            .collect()
    }
}

/// Deterministic mock 1m bar generator used when the vendor returns nothing
/// and `MOCK_HISTORY_ENABLED=1` (spec §9 open question, decided false by default).
pub fn generate_mock_1m(symbol: &str, from_ms: i64, to_ms: i64) -> Vec<Bar> {
    let seed = symbol.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut price = 100.0f64;
    let mut bars = Vec::new();

    let mut bar_start = Timeframe::M1.ms() * from_ms.div_euclid(Timeframe::M1.ms());
    while bar_start < to_ms {
        let open = price;
        let drift: f64 = rng.gen_range(-0.3..0.3);
        let close = (open + drift).max(0.01);
        let high = open.max(close) + rng.gen_range(0.0..0.1);
        let low = open.min(close) - rng.gen_range(0.0..0.1);
        let volume = rng.gen_range(100.0..5000.0);
        bars.push(Bar {
            symbol: symbol.to_string(),
            timeframe: Timeframe::M1,
            seq: Bar::seq_for_bar_start(bar_start),
            bar_start,
            bar_end: bar_start + Timeframe::M1.ms(),
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
        bar_start += Timeframe::M1.ms();
    }

    bars
}
