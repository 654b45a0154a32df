//! Typed in-process pub/sub keyed by subject: `tick:<SYM>`, `bar:new:<SYM>:<TF>`,
//! `microbar:<SYM>`, `signal:new`.
//!
//! Built on [`tokio::sync::broadcast`] rather than a hand-rolled listener list:
//! a receiver drop is an idempotent unsubscribe with no back-reference from the
//! bus to its subscribers, so connection cleanup on SSE disconnect needs no
//! explicit bookkeeping here (see the design note on cyclic references).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::models::{Bar, MicroBar, Signal, Tick, Timeframe};

const TICK_CHANNEL_CAP: usize = 1024;
const BAR_CHANNEL_CAP: usize = 512;
const MICROBAR_CHANNEL_CAP: usize = 1024;
const SIGNAL_CHANNEL_CAP: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BarKey {
    symbol: String,
    timeframe: Timeframe,
}

/// Registry of broadcast channels, one per subject. Channels are created
/// lazily on first subscribe or publish and live for the process lifetime.
pub struct EventBus {
    ticks: Mutex<HashMap<String, broadcast::Sender<Arc<Tick>>>>,
    bars: Mutex<HashMap<BarKey, broadcast::Sender<Arc<Bar>>>>,
    microbars: Mutex<HashMap<String, broadcast::Sender<Arc<MicroBar>>>>,
    signals: broadcast::Sender<Arc<Signal>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CHANNEL_CAP);
        Self {
            ticks: Mutex::new(HashMap::new()),
            bars: Mutex::new(HashMap::new()),
            microbars: Mutex::new(HashMap::new()),
            signals,
        }
    }

    fn tick_sender(&self, symbol: &str) -> broadcast::Sender<Arc<Tick>> {
        let mut map = self.ticks.lock();
        map.entry(symbol.to_string())
            .or_insert_with(|| broadcast::channel(TICK_CHANNEL_CAP).0)
            .clone()
    }

    fn bar_sender(&self, symbol: &str, timeframe: Timeframe) -> broadcast::Sender<Arc<Bar>> {
        let key = BarKey { symbol: symbol.to_string(), timeframe };
        let mut map = self.bars.lock();
        map.entry(key)
            .or_insert_with(|| broadcast::channel(BAR_CHANNEL_CAP).0)
            .clone()
    }

    fn microbar_sender(&self, symbol: &str) -> broadcast::Sender<Arc<MicroBar>> {
        let mut map = self.microbars.lock();
        map.entry(symbol.to_string())
            .or_insert_with(|| broadcast::channel(MICROBAR_CHANNEL_CAP).0)
            .clone()
    }

    pub fn publish_tick(&self, tick: Tick) {
        let sender = self.tick_sender(&tick.symbol);
        let _ = sender.send(Arc::new(tick));
    }

    pub fn subscribe_ticks(&self, symbol: &str) -> broadcast::Receiver<Arc<Tick>> {
        self.tick_sender(symbol).subscribe()
    }

    pub fn publish_bar(&self, bar: Bar) {
        let sender = self.bar_sender(&bar.symbol, bar.timeframe);
        let _ = sender.send(Arc::new(bar));
    }

    pub fn subscribe_bars(&self, symbol: &str, timeframe: Timeframe) -> broadcast::Receiver<Arc<Bar>> {
        self.bar_sender(symbol, timeframe).subscribe()
    }

    pub fn publish_microbar(&self, microbar: MicroBar) {
        let sender = self.microbar_sender(&microbar.symbol);
        let _ = sender.send(Arc::new(microbar));
    }

    pub fn subscribe_microbars(&self, symbol: &str) -> broadcast::Receiver<Arc<MicroBar>> {
        self.microbar_sender(symbol).subscribe()
    }

    pub fn publish_signal(&self, signal: Signal) {
        let _ = self.signals.send(Arc::new(signal));
    }

    pub fn subscribe_signals(&self) -> broadcast::Receiver<Arc<Signal>> {
        self.signals.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
