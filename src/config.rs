//! Environment-driven configuration, in the `Config::from_env()` idiom used
//! throughout this codebase: read, parse, fall back to a sane default, never panic.

use std::env;

use crate::models::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    Rth,
    RthExt,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub symbols: Vec<String>,
    pub history_init_limit: usize,
    pub history_init_timeframe: Timeframe,
    pub tool_timeout_ms: u64,
    pub ring_buffer_cap: usize,
    pub microbar_ms: u64,
    pub session: Session,
    pub timeframe_rollups_enabled: bool,
    pub market_audit_enabled: bool,
    pub vendor_base_url: String,
    pub vendor_api_key: String,
    pub mock_history_enabled: bool,
    pub sse_queue_cap: usize,
}

fn env_usize(key: &str, default: usize, min: usize, max: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v >= min && v <= max)
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64, min: u64, max: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&v| v >= min && v <= max)
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let symbols = env::var("SYMBOLS")
            .unwrap_or_else(|_| "SPY,QQQ".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        let history_init_timeframe = env::var("HISTORY_INIT_TIMEFRAME")
            .ok()
            .and_then(|v| Timeframe::parse(&v))
            .unwrap_or(Timeframe::M1);

        let session = match env::var("SESSION").as_deref() {
            Ok("RTH_EXT") => Session::RthExt,
            _ => Session::Rth,
        };

        Self {
            port: env_usize("PORT", 8080, 1, 65535) as u16,
            symbols,
            history_init_limit: env_usize("HISTORY_INIT_LIMIT", 300, 50, 1000),
            history_init_timeframe,
            tool_timeout_ms: env_u64("TOOL_TIMEOUT_MS", 1500, 500, 5000),
            ring_buffer_cap: env_usize("RING_BUFFER_CAP", 5000, 1000, 10_000),
            microbar_ms: env_u64("MICROBAR_MS", 200, 50, 1000),
            session,
            timeframe_rollups_enabled: env_bool("TIMEFRAME_ROLLUPS", true),
            market_audit_enabled: env_bool("MARKET_AUDIT", false),
            vendor_base_url: env::var("VENDOR_BASE_URL")
                .unwrap_or_else(|_| "https://api.vendor.example/v2".to_string()),
            vendor_api_key: env::var("VENDOR_API_KEY").unwrap_or_default(),
            mock_history_enabled: env_bool("MOCK_HISTORY_ENABLED", false),
            sse_queue_cap: env_usize("SSE_QUEUE_CAP", 100, 10, 10_000),
        }
    }
}
