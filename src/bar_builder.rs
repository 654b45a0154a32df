//! Tick -> 1m bar aggregation. One `BarBuilder` per symbol; owns the
//! in-progress bar and decides micro-bar vs. finalized-bar emission.

use crate::models::{Bar, MicroBar, Tick, Timeframe};

const LATE_TICK_TOLERANCE_MS: i64 = 60_000;
const FUTURE_TICK_TOLERANCE_MS: i64 = 5_000;

#[derive(Debug, Clone)]
struct InProgress {
    bar_start: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl InProgress {
    fn new(bar_start: i64, price: f64, size: f64) -> Self {
        Self { bar_start, open: price, high: price, low: price, close: price, volume: size }
    }

    fn apply(&mut self, price: f64, size: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += size;
    }

    fn finalize(&self, symbol: &str) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            timeframe: Timeframe::M1,
            seq: Bar::seq_for_bar_start(self.bar_start),
            bar_start: self.bar_start,
            bar_end: self.bar_start + Timeframe::M1.ms(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }

    fn to_microbar(&self, symbol: &str, ts_ms: i64) -> MicroBar {
        MicroBar {
            symbol: symbol.to_string(),
            ts_ms,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// Outcome of feeding one tick into the builder: zero or more finalized
/// bars (normally zero or one; a feed gap can close several at once when a
/// late-arriving tick crosses multiple empty minutes) plus a refreshed
/// micro-bar for the now-current in-progress bar.
pub struct TickOutcome {
    pub finalized: Vec<Bar>,
    pub microbar: Option<MicroBar>,
    pub dropped_late: bool,
}

pub struct BarBuilder {
    symbol: String,
    current: Option<InProgress>,
    dropped_tick_count: u64,
}

impl BarBuilder {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self { symbol: symbol.into(), current: None, dropped_tick_count: 0 }
    }

    pub fn dropped_tick_count(&self) -> u64 {
        self.dropped_tick_count
    }

    /// Feed one tick, already filtered to this builder's symbol. `wall_clock_ms`
    /// clamps obviously-future ticks so a feed clock glitch can't open a bar in
    /// the future.
    pub fn on_tick(&mut self, tick: &Tick, wall_clock_ms: i64) -> TickOutcome {
        let mut ts = tick.ts_ms;
        if ts > wall_clock_ms + FUTURE_TICK_TOLERANCE_MS {
            ts = wall_clock_ms;
        }
        let bar_start = Timeframe::M1.ms() * ts.div_euclid(Timeframe::M1.ms());

        let Some(current) = self.current.as_mut() else {
            self.current = Some(InProgress::new(bar_start, tick.price, tick.size));
            let mb = self.current.as_ref().map(|c| c.to_microbar(&self.symbol, ts));
            return TickOutcome { finalized: Vec::new(), microbar: mb, dropped_late: false };
        };

        if bar_start < current.bar_start {
            if current.bar_start - bar_start <= LATE_TICK_TOLERANCE_MS {
                // Within tolerance but the bar it belongs to already finalized in a
                // prior call; this builder keeps no history of closed bars, so it's
                // counted and dropped rather than silently reopened.
                self.dropped_tick_count += 1;
                return TickOutcome { finalized: Vec::new(), microbar: None, dropped_late: true };
            }
            self.dropped_tick_count += 1;
            return TickOutcome { finalized: Vec::new(), microbar: None, dropped_late: true };
        }

        if bar_start == current.bar_start {
            current.apply(tick.price, tick.size);
            let mb = Some(current.to_microbar(&self.symbol, ts));
            return TickOutcome { finalized: Vec::new(), microbar: mb, dropped_late: false };
        }

        // bar_start advanced: finalize the old bar, open the new one.
        let finalized_bar = current.finalize(&self.symbol);
        *current = InProgress::new(bar_start, tick.price, tick.size);
        let mb = Some(current.to_microbar(&self.symbol, ts));
        TickOutcome { finalized: vec![finalized_bar], microbar: mb, dropped_late: false }
    }

    /// Called by the minute-boundary timer when no tick has arrived to force
    /// the close; returns the finalized bar if one was open for a now-past bucket.
    pub fn on_timer_boundary(&mut self, now_ms: i64) -> Option<Bar> {
        let current = self.current.as_ref()?;
        if now_ms < current.bar_end_ms() {
            return None;
        }
        let bar = current.finalize(&self.symbol);
        self.current = None;
        Some(bar)
    }
}

impl InProgress {
    fn bar_end_ms(&self) -> i64 {
        self.bar_start + Timeframe::M1.ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;

    fn tick(symbol: &str, ts_ms: i64, price: f64, size: f64) -> Tick {
        Tick { symbol: symbol.to_string(), ts_ms, price, size, side: Some(Side::Buy) }
    }

    #[test]
    fn seq_matches_bar_start_law() {
        let mut b = BarBuilder::new("SPY");
        let out = b.on_tick(&tick("SPY", 60_000, 100.0, 10.0), 60_000);
        assert!(out.finalized.is_empty());
        let out2 = b.on_tick(&tick("SPY", 120_001, 101.0, 5.0), 120_001);
        assert_eq!(out2.finalized.len(), 1);
        let bar = &out2.finalized[0];
        assert_eq!(bar.seq, Bar::seq_for_bar_start(bar.bar_start));
        assert_eq!(bar.bar_start, 60_000);
        assert_eq!(bar.bar_end - bar.bar_start, Timeframe::M1.ms());
    }

    #[test]
    fn ohlc_invariants_hold() {
        let mut b = BarBuilder::new("SPY");
        b.on_tick(&tick("SPY", 0, 100.0, 1.0), 0);
        b.on_tick(&tick("SPY", 10_000, 105.0, 1.0), 10_000);
        b.on_tick(&tick("SPY", 20_000, 98.0, 1.0), 20_000);
        let out = b.on_tick(&tick("SPY", 60_000, 102.0, 1.0), 60_000);
        let bar = &out.finalized[0];
        assert!(bar.low <= bar.open.min(bar.close));
        assert!(bar.high >= bar.open.max(bar.close));
    }

    #[test]
    fn stale_late_tick_is_dropped_and_counted() {
        let mut b = BarBuilder::new("SPY");
        b.on_tick(&tick("SPY", 200_000, 100.0, 1.0), 200_000);
        let out = b.on_tick(&tick("SPY", 0, 50.0, 1.0), 200_000);
        assert!(out.dropped_late);
        assert_eq!(b.dropped_tick_count(), 1);
    }
}
