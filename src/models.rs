//! Core data types shared across the pipeline: ticks, bars, micro-bars, and signals.
//!
//! Kept deliberately plain-old-data: every type here is `Clone + Serialize + Deserialize`
//! so it can cross the event bus, the SSE wire, and the history service without adapters.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// A single print from the upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub ts_ms: i64,
    pub price: f64,
    pub size: f64,
    #[serde(default)]
    pub side: Option<Side>,
}

/// Supported rollup timeframes. `M1` is the only timeframe the bar builder
/// produces directly; everything else comes out of [`crate::rollup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    M1,
    M2,
    M5,
    M10,
    M15,
    M30,
    H1,
}

impl Timeframe {
    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M2 => 2,
            Timeframe::M5 => 5,
            Timeframe::M10 => 10,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
        }
    }

    pub fn ms(self) -> i64 {
        self.minutes() * 60_000
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M2 => "2m",
            Timeframe::M5 => "5m",
            Timeframe::M10 => "10m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "1m" => Timeframe::M1,
            "2m" => Timeframe::M2,
            "5m" => Timeframe::M5,
            "10m" => Timeframe::M10,
            "15m" => Timeframe::M15,
            "30m" => Timeframe::M30,
            "1h" | "60m" => Timeframe::H1,
            _ => return None,
        })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Timeframe {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Timeframe::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timeframe: {raw}")))
    }
}

/// A finalized OHLCV bar for one symbol/timeframe.
///
/// `seq = floor(bar_start / 60_000)` always holds for `M1` bars; rolled-up
/// bars inherit the `seq` of the earliest `M1` bar in their bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub seq: i64,
    pub bar_start: i64,
    pub bar_end: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn seq_for_bar_start(bar_start_ms: i64) -> i64 {
        bar_start_ms.div_euclid(60_000)
    }
}

/// A partial, in-progress bar emitted between minute boundaries for animation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroBar {
    pub symbol: String,
    pub ts_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

/// A trigger-confirmed, risk-governor-admitted trade idea.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: uuid::Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub rule_id: String,
    pub direction: Direction,
    pub confidence: f64,
    pub ts_ms: i64,
    pub bar_seq: i64,
    pub ctx: serde_json::Value,
}

/// Snapshot of session indicator state attached to the latest bar for a symbol,
/// as surfaced to the bars1m readers and the SSE `bar` event payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub vwap: Option<f64>,
    pub ema9: Option<f64>,
    pub ema21: Option<f64>,
    pub ema50: Option<f64>,
    pub ema200: Option<f64>,
    pub boll_mid: Option<f64>,
    pub boll_upper: Option<f64>,
    pub boll_lower: Option<f64>,
    pub volume_sma: Option<f64>,
}

/// A bar plus the indicator state computed as of that bar's close, the unit
/// stored in [`crate::bars1m::Bars1m`] and emitted on the `bar` SSE event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedBar {
    #[serde(flatten)]
    pub bar: Bar,
    pub indicators: IndicatorSnapshot,
}
