use std::collections::VecDeque;

use crate::models::Direction;
use crate::session::is_regular_trading_hours;

use super::{Pattern, WindowEntry};

/// Opening-range breakout: the first two finalized RTH bars of a session
/// define `orb_high`; a later bar closing above it with volume
/// confirmation and a low holding above the range fires long.
pub struct Orb {
    session_anchor_day: Option<i64>,
    bars_this_session: u32,
    orb_high: Option<f64>,
    session_volume_sum: f64,
    session_bar_count: u32,
}

impl Orb {
    pub fn new() -> Self {
        Self {
            session_anchor_day: None,
            bars_this_session: 0,
            orb_high: None,
            session_volume_sum: 0.0,
            session_bar_count: 0,
        }
    }

    /// Must be called once per finalized bar, before `evaluate`, to track
    /// session boundaries and accumulate the opening range.
    pub fn observe(&mut self, bar: &crate::models::Bar) {
        if !is_regular_trading_hours(bar.bar_start) {
            return;
        }
        let day = bar.bar_start.div_euclid(86_400_000);
        if self.session_anchor_day != Some(day) {
            self.session_anchor_day = Some(day);
            self.bars_this_session = 0;
            self.orb_high = None;
            self.session_volume_sum = 0.0;
            self.session_bar_count = 0;
        }

        self.bars_this_session += 1;
        self.session_volume_sum += bar.volume;
        self.session_bar_count += 1;

        if self.bars_this_session <= 2 {
            self.orb_high = Some(self.orb_high.map_or(bar.high, |h| h.max(bar.high)));
        }
    }

    fn session_avg_volume(&self) -> f64 {
        if self.session_bar_count == 0 {
            0.0
        } else {
            self.session_volume_sum / self.session_bar_count as f64
        }
    }
}

impl Pattern for Orb {
    fn rule_id(&self) -> &'static str {
        "orb_breakout"
    }

    fn direction(&self) -> Direction {
        Direction::Long
    }

    fn evaluate(&self, window: &VecDeque<WindowEntry>) -> bool {
        let Some(orb_high) = self.orb_high else { return false };
        if self.bars_this_session <= 2 {
            return false;
        }
        let Some(last) = window.back() else { return false };

        let avg_vol = self.session_avg_volume();
        let volume_confirmed = avg_vol > 0.0 && last.bar.volume > 2.0 * avg_vol;
        let closed_above = last.bar.close > orb_high;
        let held_above = last.bar.low > orb_high * 0.999;

        closed_above && volume_confirmed && held_above
    }
}
