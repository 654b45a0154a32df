//! Substitutes recorded 1m bars for the live feed on a per-symbol timer.
//! Output (events published onto the same [`crate::event_bus::EventBus`]
//! topics) is indistinguishable from live to every downstream consumer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::CoreError;
use crate::event_bus::EventBus;
use crate::models::{Bar, MicroBar, Timeframe};

struct ReplayState {
    bars: Vec<Bar>,
    idx: usize,
    speed: f64,
}

struct RunningReplay {
    handle: JoinHandle<()>,
    speed: Arc<Mutex<f64>>,
}

/// Owns all active per-symbol replays. `start`/`stop`/`set_speed` mirror the
/// `/api/replay/*` control surface.
pub struct ReplayEngine {
    bus: Arc<EventBus>,
    running: Mutex<HashMap<String, RunningReplay>>,
}

impl ReplayEngine {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus, running: Mutex::new(HashMap::new()) }
    }

    pub fn start(&self, symbol: String, bars: Vec<Bar>, speed: f64) -> Result<(), CoreError> {
        if bars.is_empty() {
            return Err(CoreError::ReplayNotFound { symbol, from_ms: 0, to_ms: 0 });
        }

        self.stop(&symbol);

        let speed_handle = Arc::new(Mutex::new(speed.max(0.01)));
        let bus = self.bus.clone();
        let task_symbol = symbol.clone();
        let speed_for_task = speed_handle.clone();

        let handle = tokio::spawn(async move {
            let mut state = ReplayState { bars, idx: 0, speed };
            loop {
                if state.idx >= state.bars.len() {
                    return;
                }
                let current_speed = *speed_for_task.lock();
                let period_ms = (60_000.0 / current_speed).max(100.0) as u64;

                let bar = state.bars[state.idx].clone();
                bus.publish_bar(bar.clone());

                let mid_ts = bar.bar_start + Timeframe::M1.ms() / 2;
                bus.publish_microbar(MicroBar {
                    symbol: task_symbol.clone(),
                    ts_ms: mid_ts,
                    open: bar.open,
                    high: bar.open.max(bar.close),
                    low: bar.open.min(bar.close),
                    close: (bar.open + bar.close) / 2.0,
                    volume: bar.volume / 2.0,
                });
                tokio::time::sleep(std::time::Duration::from_millis(120)).await;
                bus.publish_microbar(MicroBar {
                    symbol: task_symbol.clone(),
                    ts_ms: bar.bar_end,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                });

                state.idx += 1;
                let remaining = period_ms.saturating_sub(120);
                tokio::time::sleep(std::time::Duration::from_millis(remaining)).await;
            }
        });

        self.running.lock().insert(symbol, RunningReplay { handle, speed: speed_handle });
        Ok(())
    }

    pub fn stop(&self, symbol: &str) {
        if let Some(running) = self.running.lock().remove(symbol) {
            running.handle.abort();
        }
    }

    pub fn set_speed(&self, symbol: &str, speed: f64) -> bool {
        if let Some(running) = self.running.lock().get(symbol) {
            *running.speed.lock() = speed.max(0.01);
            true
        } else {
            false
        }
    }

    pub fn is_running(&self, symbol: &str) -> bool {
        self.running.lock().contains_key(symbol)
    }
}
