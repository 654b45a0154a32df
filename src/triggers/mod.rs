//! Pattern trigger set: VWAP reclaim, VWAP reject, opening-range breakout,
//! EMA pullback. Each is a predicate over a short sliding window of recent
//! bars, wired into the shared [`state::TriggerStateMachine`] lifecycle.

pub mod state;
mod ema_pullback;
mod orb;
mod vwap_reclaim;
mod vwap_reject;

use std::collections::{HashMap, VecDeque};

use crate::models::{Bar, Direction, IndicatorSnapshot};
use state::TriggerStateMachine;

const WINDOW_LEN: usize = 5;
const DEFAULT_COOLDOWN_MS: i64 = 300_000;
const DEFAULT_CONFIRMATIONS: u32 = 2;

/// One bar plus the indicator snapshot as of that bar's close - the unit a
/// pattern's `evaluate` predicate reads from.
#[derive(Debug, Clone)]
pub struct WindowEntry {
    pub bar: Bar,
    pub indicators: IndicatorSnapshot,
}

/// A fired trigger, ready to be offered to the risk governor.
#[derive(Debug, Clone)]
pub struct TriggerFire {
    pub rule_id: &'static str,
    pub direction: Direction,
    pub confidence: f64,
    pub bar_seq: i64,
    pub ts_ms: i64,
}

trait Pattern {
    fn rule_id(&self) -> &'static str;
    fn direction(&self) -> Direction;
    /// True when this pattern's condition holds given the current window
    /// (oldest first, most recent last).
    fn evaluate(&self, window: &VecDeque<WindowEntry>) -> bool;
}

/// Runs every pattern for one symbol against a shared sliding window of
/// recent 1m bars, advancing each pattern's own state machine.
pub struct TriggerEngine {
    window: VecDeque<WindowEntry>,
    vwap_reclaim: (vwap_reclaim::VwapReclaim, TriggerStateMachine),
    vwap_reject: (vwap_reject::VwapReject, TriggerStateMachine),
    orb: (orb::Orb, TriggerStateMachine),
    ema_pullback: (ema_pullback::EmaPullback, TriggerStateMachine),
}

impl TriggerEngine {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW_LEN),
            vwap_reclaim: (vwap_reclaim::VwapReclaim, TriggerStateMachine::new(DEFAULT_CONFIRMATIONS, DEFAULT_COOLDOWN_MS)),
            vwap_reject: (vwap_reject::VwapReject, TriggerStateMachine::new(DEFAULT_CONFIRMATIONS, DEFAULT_COOLDOWN_MS)),
            orb: (orb::Orb::new(), TriggerStateMachine::new(1, DEFAULT_COOLDOWN_MS)),
            ema_pullback: (ema_pullback::EmaPullback, TriggerStateMachine::new(DEFAULT_CONFIRMATIONS, DEFAULT_COOLDOWN_MS)),
        }
    }

    /// Feed one finalized bar + indicator snapshot; returns every pattern
    /// that fired on this bar.
    pub fn on_bar(&mut self, bar: Bar, indicators: IndicatorSnapshot) -> Vec<TriggerFire> {
        let now_ms = bar.bar_end;
        let seq = bar.seq;
        if self.window.len() == WINDOW_LEN {
            self.window.pop_front();
        }
        self.window.push_back(WindowEntry { bar: bar.clone(), indicators });

        let mut fires = Vec::new();

        if self.vwap_reclaim.1.advance(self.vwap_reclaim.0.evaluate(&self.window), now_ms) {
            fires.push(TriggerFire {
                rule_id: self.vwap_reclaim.0.rule_id(),
                direction: self.vwap_reclaim.0.direction(),
                confidence: 0.6,
                bar_seq: seq,
                ts_ms: now_ms,
            });
        }
        if self.vwap_reject.1.advance(self.vwap_reject.0.evaluate(&self.window), now_ms) {
            fires.push(TriggerFire {
                rule_id: self.vwap_reject.0.rule_id(),
                direction: self.vwap_reject.0.direction(),
                confidence: 0.6,
                bar_seq: seq,
                ts_ms: now_ms,
            });
        }
        self.orb.0.observe(&bar);
        if self.orb.1.advance(self.orb.0.evaluate(&self.window), now_ms) {
            fires.push(TriggerFire {
                rule_id: self.orb.0.rule_id(),
                direction: self.orb.0.direction(),
                confidence: 0.55,
                bar_seq: seq,
                ts_ms: now_ms,
            });
        }
        if self.ema_pullback.1.advance(self.ema_pullback.0.evaluate(&self.window), now_ms) {
            fires.push(TriggerFire {
                rule_id: self.ema_pullback.0.rule_id(),
                direction: self.ema_pullback.0.direction(),
                confidence: 0.65,
                bar_seq: seq,
                ts_ms: now_ms,
            });
        }

        fires
    }
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-symbol registry of trigger engines, owned by the app bootstrap.
pub struct TriggerRegistry {
    by_symbol: HashMap<String, TriggerEngine>,
}

impl TriggerRegistry {
    pub fn new(symbols: &[String]) -> Self {
        Self { by_symbol: symbols.iter().map(|s| (s.clone(), TriggerEngine::new())).collect() }
    }

    pub fn on_bar(&mut self, bar: Bar, indicators: IndicatorSnapshot) -> Vec<TriggerFire> {
        self.by_symbol
            .entry(bar.symbol.clone())
            .or_insert_with(TriggerEngine::new)
            .on_bar(bar, indicators)
    }
}
