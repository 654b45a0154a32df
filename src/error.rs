//! Typed error kinds for the streaming data plane.
//!
//! `anyhow::Result` is reserved for task/binary boundaries (`main`, spawned task
//! closures); anything that a caller might branch on comes back as [`CoreError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("feed transient error on {symbol}: {reason}")]
    FeedTransient { symbol: String, reason: String },

    #[error("feed fatal error: {0}")]
    FeedFatal(String),

    #[error("vendor history request failed: {0}")]
    VendorHistoryError(String),

    #[error("malformed bar: {0}")]
    MalformedBar(String),

    #[error("malformed tick: {0}")]
    MalformedTick(String),

    #[error("no bars available for replay window {symbol} [{from_ms}, {to_ms})")]
    ReplayNotFound {
        symbol: String,
        from_ms: i64,
        to_ms: i64,
    },

    #[error("event dropped under backpressure: {0}")]
    BackpressureDrop(String),

    #[error("sequence violation: attempted seq {attempted} <= watermark {watermark}")]
    SequenceViolation { attempted: i64, watermark: i64 },

    #[error("circuit open for {0}")]
    CircuitOpen(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
