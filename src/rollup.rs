//! Pure grouping of finalized 1m bars into N-minute buckets aligned to the
//! exchange wall clock. No I/O, no state - safe to call from the history
//! service, the live rollup path, and tests with the same function.

use crate::models::{Bar, Timeframe};
use crate::session::floor_to_exchange_bucket;

/// Groups `bars1m` (strictly increasing `bar_start`, gaps allowed) into
/// `timeframe` buckets. Only closed buckets are returned unless
/// `include_partial` is set, matching the "incremental" rollup mode.
pub fn rollup_from_1m(bars1m: &[Bar], timeframe: Timeframe, include_partial: bool) -> Vec<Bar> {
    if timeframe == Timeframe::M1 || bars1m.is_empty() {
        return bars1m.to_vec();
    }

    let bucket_min = timeframe.minutes();
    let mut out: Vec<Bar> = Vec::new();
    let mut current_bucket_start: Option<i64> = None;
    let mut acc: Option<Bar> = None;

    for bar in bars1m {
        let bucket_start = floor_to_exchange_bucket(bar.bar_start, bucket_min);

        match (current_bucket_start, acc.as_mut()) {
            (Some(cur), Some(a)) if cur == bucket_start => {
                a.high = a.high.max(bar.high);
                a.low = a.low.min(bar.low);
                a.close = bar.close;
                a.volume += bar.volume;
                a.bar_end = bucket_start + bucket_min * 60_000;
            }
            _ => {
                if let Some(done) = acc.take() {
                    out.push(done);
                }
                current_bucket_start = Some(bucket_start);
                acc = Some(Bar {
                    symbol: bar.symbol.clone(),
                    timeframe,
                    seq: bar.seq,
                    bar_start: bucket_start,
                    bar_end: bucket_start + bucket_min * 60_000,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                });
            }
        }
    }

    if let Some(last) = acc {
        let now_bucket_end = last.bar_end;
        let last_input_end = bars1m.last().map(|b| b.bar_end).unwrap_or(0);
        let is_closed = last_input_end >= now_bucket_end;
        if is_closed || include_partial {
            out.push(last);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(symbol: &str, bar_start: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            timeframe: Timeframe::M1,
            seq: Bar::seq_for_bar_start(bar_start),
            bar_start,
            bar_end: bar_start + Timeframe::M1.ms(),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
        }
    }

    #[test]
    fn five_one_minute_bars_roll_into_one_five_minute_bucket() {
        // Anchor a known RTH-session minute boundary (13:30 UTC = 09:30 ET EDT).
        let base = 1_717_421_400_000i64; // 2024-06-03T13:30:00Z
        let bars: Vec<Bar> = (0..5)
            .map(|i| bar("SPY", base + i * 60_000, 100.0 + i as f64, 101.0 + i as f64, 99.0, 100.5, 10.0))
            .collect();
        let rolled = rollup_from_1m(&bars, Timeframe::M5, false);
        assert_eq!(rolled.len(), 1);
        let b = &rolled[0];
        assert_eq!(b.open, bars[0].open);
        assert_eq!(b.close, bars[4].close);
        assert_eq!(b.volume, 50.0);
        assert_eq!(b.seq, bars[0].seq);
    }

    #[test]
    fn rollup_is_idempotent_over_clean_5m_groupings() {
        let base = 1_717_421_400_000i64;
        let bars: Vec<Bar> = (0..10)
            .map(|i| bar("SPY", base + i * 60_000, 100.0, 100.0, 100.0, 100.0, 1.0))
            .collect();
        let once = rollup_from_1m(&bars, Timeframe::M5, false);
        assert_eq!(once.len(), 2);
    }
}
