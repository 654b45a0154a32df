//! Feed abstraction boundary. The core consumes any `TickSource`; this crate
//! ships a deterministic mock generator for tests/demo and leaves the real
//! vendor websocket adapter as an external collaborator (spec §6.1).

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::models::{Side, Tick};

#[async_trait]
pub trait TickSource: Send + Sync {
    /// Spawns the feed, returning a receiver of ticks for the requested
    /// symbols. The returned task runs until the receiver is dropped.
    async fn subscribe(&self, symbols: Vec<String>) -> Result<mpsc::Receiver<Tick>, CoreError>;
}

/// Deterministic synthetic tick generator, seeded per symbol so repeated
/// runs (and tests) reproduce the same path.
pub struct MockTickSource {
    pub interval_ms: u64,
}

impl Default for MockTickSource {
    fn default() -> Self {
        Self { interval_ms: 250 }
    }
}

#[async_trait]
impl TickSource for MockTickSource {
    async fn subscribe(&self, symbols: Vec<String>) -> Result<mpsc::Receiver<Tick>, CoreError> {
        let (tx, rx) = mpsc::channel(1024);
        let interval_ms = self.interval_ms;

        tokio::spawn(async move {
            let mut rngs: Vec<ChaCha8Rng> = symbols
                .iter()
                .map(|s| {
                    let seed = s.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
                    ChaCha8Rng::seed_from_u64(seed)
                })
                .collect();
            let mut prices: Vec<f64> = vec![100.0; symbols.len()];
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(interval_ms));

            loop {
                ticker.tick().await;
                for (i, symbol) in symbols.iter().enumerate() {
                    let rng = &mut rngs[i];
                    let drift: f64 = rng.gen_range(-0.05..0.05);
                    prices[i] = (prices[i] + drift).max(0.01);
                    let size: f64 = rng.gen_range(1.0..50.0);
                    let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
                    let tick = Tick {
                        symbol: symbol.clone(),
                        ts_ms: chrono::Utc::now().timestamp_millis(),
                        price: prices[i],
                        size,
                        side: Some(side),
                    };
                    if tx.send(tick).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}
