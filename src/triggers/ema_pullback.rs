use std::collections::VecDeque;

use crate::models::Direction;

use super::{Pattern, WindowEntry};

/// EMA9 trending above EMA20 across the window; a pullback within the last
/// two bars touched EMA9 and closed back above it on contracting volume.
pub struct EmaPullback;

impl Pattern for EmaPullback {
    fn rule_id(&self) -> &'static str {
        "ema_pullback"
    }

    fn direction(&self) -> Direction {
        Direction::Long
    }

    fn evaluate(&self, window: &VecDeque<WindowEntry>) -> bool {
        if window.len() < 5 {
            return false;
        }

        let trending = window.iter().all(|w| {
            matches!((w.indicators.ema9, w.indicators.ema21), (Some(e9), Some(e21)) if e9 > e21)
        });
        if !trending {
            return false;
        }

        let n = window.len();
        let last = &window[n - 1];
        let prev = &window[n - 2];

        let Some(last_ema9) = last.indicators.ema9 else { return false };
        let touched = (prev.bar.low - prev.indicators.ema9.unwrap_or(f64::MAX)).abs() / prev.bar.low < 0.003
            || (last.bar.low - last_ema9).abs() / last.bar.low < 0.003;
        let closed_above = last.bar.close > last_ema9;

        let recent_two_vol = last.bar.volume + prev.bar.volume;
        let earlier_two_vol = window[n - 3].bar.volume + window[n - 4].bar.volume;
        let volume_contracting = earlier_two_vol > 0.0 && recent_two_vol < 0.8 * earlier_two_vol;

        touched && closed_above && volume_contracting
    }
}
