//! End-to-end scenarios from spec §8: cold start, gap fill, multi-timeframe
//! consistency, trigger cooldown spacing, replay/live indicator equivalence,
//! and DST bucket boundaries, exercised against the library crate directly
//! (no network, no running server - the same style as the teacher's own
//! `tests/` integration tests that build up backtest fixtures in-process).

use intraday_pipeline::bar_builder::BarBuilder;
use intraday_pipeline::indicators::IndicatorSet;
use intraday_pipeline::models::{Bar, Side, Tick, Timeframe};
use intraday_pipeline::ring_buffer::RingBuffer;
use intraday_pipeline::rollup::rollup_from_1m;
use intraday_pipeline::session::{floor_to_exchange_bucket, is_regular_trading_hours};
use intraday_pipeline::triggers::TriggerRegistry;

fn tick(symbol: &str, ts_ms: i64, price: f64, size: f64) -> Tick {
    Tick { symbol: symbol.to_string(), ts_ms, price, size, side: Some(Side::Buy) }
}

/// Drives `n` 1m bars of ticks through a `BarBuilder`, one tick per minute,
/// returning the finalized bars in order.
fn build_n_bars(symbol: &str, start_ms: i64, n: i64, price_fn: impl Fn(i64) -> f64) -> Vec<Bar> {
    let mut builder = BarBuilder::new(symbol);
    let mut bars = Vec::new();
    for i in 0..=n {
        let ts = start_ms + i * 60_000;
        let price = price_fn(i);
        let out = builder.on_tick(&tick(symbol, ts, price, 10.0), ts);
        bars.extend(out.finalized);
    }
    bars
}

#[test]
fn cold_start_seeds_ring_buffer_with_finalized_bars_in_seq_order() {
    let base = 1_717_421_400_000i64; // 2024-06-03T13:30:00Z, RTH open
    let bars = build_n_bars("SPY", base, 300, |i| 100.0 + (i % 7) as f64 * 0.1);

    let ring = RingBuffer::new(5000);
    for b in &bars {
        ring.push(b.clone());
    }

    assert_eq!(ring.len("SPY"), bars.len());
    let recent = ring.recent("SPY", 300);
    assert_eq!(recent.len(), 300.min(bars.len()));
    for w in recent.windows(2) {
        assert!(w[1].seq > w[0].seq, "bars must be strictly increasing by seq");
    }
    for b in &recent {
        assert_eq!(b.seq, Bar::seq_for_bar_start(b.bar_start));
    }
}

#[test]
fn gap_fill_on_reconnect_returns_exactly_bars_after_watermark() {
    let base = 1_717_421_400_000i64;
    let bars = build_n_bars("SPY", base, 50, |i| 100.0 + i as f64 * 0.01);

    let ring = RingBuffer::new(5000);
    for b in &bars {
        ring.push(b.clone());
    }

    let watermark = bars[20].seq;
    let gap_filled = ring.since("SPY", watermark);

    assert!(gap_filled.iter().all(|b| b.seq > watermark));
    let expected: Vec<i64> = bars.iter().filter(|b| b.seq > watermark).map(|b| b.seq).collect();
    let got: Vec<i64> = gap_filled.iter().map(|b| b.seq).collect();
    assert_eq!(got, expected, "gap fill must deliver exactly the missing bars, in order, no dup/gap");
}

#[test]
fn multi_timeframe_rollup_is_consistent_for_5m_and_60m() {
    use chrono::{TimeZone, Utc};
    // 2024-06-03T14:00:00Z = 10:00:00 ET (EDT) - an exact hour boundary, so a
    // clean 2-hour run divides evenly into both 5m and 60m buckets with no
    // trailing partial bucket to reason about.
    let base = Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap().timestamp_millis();
    let bars = build_n_bars("SPY", base, 120, |i| 100.0 + (i as f64 * 0.05).sin());

    let rolled_5m = rollup_from_1m(&bars, Timeframe::M5, false);
    let rolled_60m = rollup_from_1m(&bars, Timeframe::H1, false);

    assert_eq!(rolled_5m.len(), 24);
    assert_eq!(rolled_60m.len(), 2);

    // Rolling up the already-rolled 5m output to 1h should agree with a direct 60m rollup.
    let rerolled = rollup_from_1m(&rolled_5m, Timeframe::H1, false);
    assert_eq!(rerolled.len(), rolled_60m.len());
    assert_eq!(rerolled[0].open, rolled_60m[0].open);
    assert_eq!(rerolled[0].close, rolled_60m[0].close);
    assert!((rerolled[0].volume - rolled_60m[0].volume).abs() < 1e-9);

    for b in &rolled_5m {
        assert_eq!(b.bar_end - b.bar_start, Timeframe::M5.ms());
        assert!(b.low <= b.open.min(b.close));
        assert!(b.high >= b.open.max(b.close));
    }
}

#[test]
fn trigger_fires_are_spaced_by_at_least_cooldown() {
    let base = 1_717_421_400_000i64;
    let mut registry = TriggerRegistry::new(&["SPY".to_string()]);
    let mut indicators = IndicatorSet::new();

    let mut last_fire_ts: Option<i64> = None;
    let mut fire_count = 0;

    // Feed a long uptrend so EMA9 stays above EMA21 and the pullback pattern
    // has a realistic chance to prime repeatedly across the run.
    for i in 0..400 {
        let bar_start = base + i * 60_000;
        let close = 100.0 + (i as f64) * 0.05 + if i % 11 == 0 { -0.3 } else { 0.0 };
        let bar = Bar {
            symbol: "SPY".to_string(),
            timeframe: Timeframe::M1,
            seq: Bar::seq_for_bar_start(bar_start),
            bar_start,
            bar_end: bar_start + Timeframe::M1.ms(),
            open: close - 0.02,
            high: close + 0.05,
            low: close - 0.1,
            close,
            volume: if i % 11 == 0 { 50.0 } else { 200.0 },
        };
        indicators.update(&bar, false);
        let snapshot = indicators.snapshot();
        for fire in registry.on_bar(bar.clone(), snapshot) {
            if let Some(last) = last_fire_ts {
                assert!(fire.ts_ms - last >= 300_000, "fires for the same pattern must respect cooldown");
            }
            last_fire_ts = Some(fire.ts_ms);
            fire_count += 1;
        }
    }

    // Not asserting fire_count > 0: the synthetic series may or may not trip a
    // pattern. The property under test is spacing, checked above on every fire.
    let _ = fire_count;
}

#[test]
fn indicators_init_from_history_match_incremental_replay() {
    let base = 1_717_421_400_000i64;
    let bars = build_n_bars("SPY", base, 120, |i| 100.0 + (i as f64 * 0.03).cos() * 2.0);

    let warm = IndicatorSet::init_from_history(&bars);

    let mut incremental = IndicatorSet::new();
    for b in &bars {
        incremental.update(b, false);
    }

    let warm_snap = warm.snapshot();
    let incr_snap = incremental.snapshot();

    assert!((warm_snap.ema9.unwrap() - incr_snap.ema9.unwrap()).abs() < 1e-8);
    assert!((warm_snap.ema21.unwrap() - incr_snap.ema21.unwrap()).abs() < 1e-8);
    assert!((warm_snap.vwap.unwrap() - incr_snap.vwap.unwrap()).abs() < 1e-8);
    assert_eq!(warm_snap.boll_mid, incr_snap.boll_mid);
}

#[test]
fn dst_spring_forward_bucket_boundary_never_spans_skipped_hour() {
    // 2024-03-10 is the US spring-forward date; bars straddling the transition
    // must still land in well-formed, non-overlapping 5m buckets.
    let pre_transition = 1_710_052_200_000i64; // ~06:30 UTC
    let post_transition = 1_710_055_800_000i64; // ~07:30 UTC

    let b1 = floor_to_exchange_bucket(pre_transition, 5);
    let b2 = floor_to_exchange_bucket(post_transition, 5);

    assert_eq!(b1 % (5 * 60_000), 0);
    assert_eq!(b2 % (5 * 60_000), 0);
    assert!(b2 > b1);
}

#[test]
fn regular_trading_hours_boundary_is_exclusive_at_close() {
    use chrono::{TimeZone, Utc};
    let just_before_close = Utc.with_ymd_and_hms(2024, 6, 3, 19, 59, 59).unwrap().timestamp_millis(); // 15:59:59 ET
    let at_close = Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap().timestamp_millis(); // 16:00:00 ET

    assert!(is_regular_trading_hours(just_before_close));
    assert!(!is_regular_trading_hours(at_close));
}
