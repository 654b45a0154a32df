use std::collections::VecDeque;

use crate::models::Direction;

use super::{Pattern, WindowEntry};

/// Symmetric inversion of [`super::vwap_reclaim::VwapReclaim`]: two
/// consecutive closes below VWAP after a prior bar traded above it.
pub struct VwapReject;

impl Pattern for VwapReject {
    fn rule_id(&self) -> &'static str {
        "vwap_reject"
    }

    fn direction(&self) -> Direction {
        Direction::Short
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

        let last_below = last.bar.close < last_vwap;
        let prev_below = prev.bar.close < prev_vwap;
        let prior_above = prior.bar.high > prior_vwap;
        let rejected = last.bar.high < last_vwap || prev.bar.high < prev_vwap;

        let avg_prev_two_vol = (prev.bar.volume + prior.bar.volume) / 2.0;
        let volume_confirmed = avg_prev_two_vol > 0.0 && last.bar.volume > 1.2 * avg_prev_two_vol;

        last_below && prev_below && prior_above && rejected && volume_confirmed
    }
}
