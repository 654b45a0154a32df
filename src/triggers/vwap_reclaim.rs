use std::collections::VecDeque;

use crate::models::Direction;

use super::{Pattern, WindowEntry};

/// Two consecutive closes above session VWAP, volume confirmation on the
/// latest bar, and a prior bar that was below VWAP before reclaiming it.
pub struct VwapReclaim;

impl Pattern for VwapReclaim {
    fn rule_id(&self) -> &'static str {
        "vwap_reclaim"
    }

    fn direction(&self) -> Direction {
        Direction::Long
    }

    fn evaluate(&self, window: &VecDeque<WindowEntry>) -> bool {
        if window.len() < 3 {
            return false;
        }
        let n = window.len();
        let last = &window[n - 1];
        let prev = &window[n - 2];
        let prior = &window[n - 3];

        let (Some(last_vwap), Some(prev_vwap), Some(prior_vwap)) =
            (last.indicators.vwap, prev.indicators.vwap, prior.indicators.vwap)
        else {
            return false;
        };

        let last_above = last.bar.close > last_vwap;
        let prev_above = prev.bar.close > prev_vwap;
        let prior_below = prior.bar.low < prior_vwap;
        let reclaimed = last.bar.low > last_vwap || prev.bar.low > prev_vwap;

        let avg_prev_two_vol = (prev.bar.volume + prior.bar.volume) / 2.0;
        let volume_confirmed = avg_prev_two_vol > 0.0 && last.bar.volume > 1.2 * avg_prev_two_vol;

        last_above && prev_above && prior_below && reclaimed && volume_confirmed
    }
}
