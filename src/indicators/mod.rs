//! Incremental session indicator engines: EMA, session VWAP, Bollinger bands,
//! volume SMA. Each exposes `init`/`init_from_history`/`next`/`reset` as a
//! concrete struct, not a trait object - the teacher's preference for closed,
//! explicit state over dynamic dispatch carries over directly here.

mod bollinger;
mod ema;
mod vwap;
mod volume_sma;

pub use bollinger::Bollinger;
pub use ema::Ema;
pub use vwap::SessionVwap;
pub use volume_sma::VolumeSma;

use crate::models::{Bar, IndicatorSnapshot};

/// Per-symbol bundle of every indicator this pipeline tracks, updated
/// together on each finalized 1m bar.
pub struct IndicatorSet {
    pub ema9: Ema,
    pub ema21: Ema,
    pub ema50: Ema,
    pub ema200: Ema,
    pub vwap: SessionVwap,
    pub bollinger: Bollinger,
    pub volume_sma: VolumeSma,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self {
            ema9: Ema::new(9),
            ema21: Ema::new(21),
            ema50: Ema::new(50),
            ema200: Ema::new(200),
            vwap: SessionVwap::new(),
            bollinger: Bollinger::new(20, 2.0),
            volume_sma: VolumeSma::new(20),
        }
    }

    pub fn init_from_history(bars: &[Bar]) -> Self {
        let mut set = Self::new();
        for bar in bars {
            set.update(bar, false);
        }
        set
    }

    /// Feeds one finalized bar into every indicator. `session_reset` should be
    /// `true` exactly once, on the first bar of a new RTH session.
    pub fn update(&mut self, bar: &Bar, session_reset: bool) {
        if session_reset {
            self.vwap.reset();
        }
        self.ema9.next(bar.close);
        self.ema21.next(bar.close);
        self.ema50.next(bar.close);
        self.ema200.next(bar.close);
        self.vwap.next(bar.high, bar.low, bar.close, bar.volume);
        self.bollinger.next(bar.close);
        self.volume_sma.next(bar.volume);
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        let (mid, upper, lower) = self.bollinger.value();
        IndicatorSnapshot {
            vwap: self.vwap.value(),
            ema9: self.ema9.value(),
            ema21: self.ema21.value(),
            ema50: self.ema50.value(),
            ema200: self.ema200.value(),
            boll_mid: mid,
            boll_upper: upper,
            boll_lower: lower,
            volume_sma: self.volume_sma.value(),
        }
    }
}

impl Default for IndicatorSet {
    fn default() -> Self {
        Self::new()
    }
}
