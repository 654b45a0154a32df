//! Intraday market-data pipeline server.
//!
//! Boots the event bus, per-symbol bar builders, indicator/trigger state,
//! risk governor, history service, and SSE fan-out, then serves the HTTP
//! surface over axum.

mod api;
mod middleware;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::middleware as axum_mw;
use axum::Router;
use dotenv::dotenv;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intraday_pipeline::bar_builder::BarBuilder;
use intraday_pipeline::bars1m::Bars1m;
use intraday_pipeline::config::Config;
use intraday_pipeline::event_bus::EventBus;
use intraday_pipeline::feed_health::FeedHealth;
use intraday_pipeline::history::HistoryService;
use intraday_pipeline::indicators::IndicatorSet;
use intraday_pipeline::models::{Direction, Signal, Timeframe};
use intraday_pipeline::replay::ReplayEngine;
use intraday_pipeline::ring_buffer::RingBuffer;
use intraday_pipeline::risk_governor::{RiskGovernor, RiskGovernorConfig};
use intraday_pipeline::session::is_regular_trading_hours;
use intraday_pipeline::sse::generate_epoch_id;
use intraday_pipeline::tick_source::{MockTickSource, TickSource};
use intraday_pipeline::triggers::TriggerRegistry;
use intraday_pipeline::vendor::VendorClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub event_bus: Arc<EventBus>,
    pub ring_buffer: Arc<RingBuffer>,
    pub bars1m: Arc<Bars1m>,
    pub history: Arc<HistoryService>,
    pub risk_governor: Arc<RiskGovernor>,
    pub replay: Arc<ReplayEngine>,
    pub feed_health: Arc<FeedHealth>,
    pub epoch_id: String,
    pub epoch_start_ms: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("intraday pipeline starting");

    let config = Arc::new(Config::from_env());
    info!(symbols = ?config.symbols, "configuration loaded");

    let event_bus = Arc::new(EventBus::new());
    let ring_buffer = Arc::new(RingBuffer::new(config.ring_buffer_cap));
    let bars1m = Arc::new(Bars1m::new());
    let feed_health = Arc::new(FeedHealth::default());

    let vendor = Arc::new(
        VendorClient::new(
            config.vendor_base_url.clone(),
            config.vendor_api_key.clone(),
            Duration::from_secs(10),
        )
        .context("failed to build vendor HTTP client")?,
    );
    let history = Arc::new(HistoryService::new(ring_buffer.clone(), bars1m.clone(), vendor, &config));

    let risk_governor = Arc::new(RiskGovernor::new(RiskGovernorConfig::default()));
    let replay = Arc::new(ReplayEngine::new(event_bus.clone()));

    let epoch_id = generate_epoch_id();
    let epoch_start_ms = chrono::Utc::now().timestamp_millis();
    info!(epoch_id = %epoch_id, "process epoch started");

    let state = AppState {
        config: config.clone(),
        event_bus: event_bus.clone(),
        ring_buffer: ring_buffer.clone(),
        bars1m: bars1m.clone(),
        history,
        risk_governor: risk_governor.clone(),
        replay,
        feed_health: feed_health.clone(),
        epoch_id,
        epoch_start_ms,
    };

    spawn_feed_ingestion(
        config.clone(),
        event_bus.clone(),
        ring_buffer.clone(),
        bars1m.clone(),
        risk_governor.clone(),
        feed_health.clone(),
    )
    .await;

    let app = Router::new()
        .merge(api::router())
        .layer(axum_mw::from_fn(middleware::request_logging_simple))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port = config.port;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!(port, "listening");
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Wires one `TickSource` into: bar builder -> indicators -> triggers ->
/// risk governor -> {bars1m, ring buffer, event bus}. One task per symbol
/// keeps a slow symbol from head-of-line blocking another.
async fn spawn_feed_ingestion(
    config: Arc<Config>,
    event_bus: Arc<EventBus>,
    ring_buffer: Arc<RingBuffer>,
    bars1m: Arc<Bars1m>,
    risk_governor: Arc<RiskGovernor>,
    feed_health: Arc<FeedHealth>,
) {
    let feed = MockTickSource::default();
    let symbols = config.symbols.clone();

    let mut rx = match feed.subscribe(symbols.clone()).await {
        Ok(rx) => rx,
        Err(e) => {
            warn!("failed to start tick feed: {e}");
            feed_health.record_failure(e.to_string());
            return;
        }
    };

    tokio::spawn(async move {
        let mut builders: HashMap<String, BarBuilder> = symbols
            .iter()
            .map(|s| (s.clone(), BarBuilder::new(s.clone())))
            .collect();
        let mut indicators: HashMap<String, IndicatorSet> =
            symbols.iter().map(|s| (s.clone(), IndicatorSet::new())).collect();
        let mut triggers = TriggerRegistry::new(&symbols);
        let mut session_open: HashMap<String, bool> = symbols.iter().map(|s| (s.clone(), false)).collect();

        while let Some(tick) = rx.recv().await {
            feed_health.record_success(0.0);
            event_bus.publish_tick(tick.clone());

            let Some(builder) = builders.get_mut(&tick.symbol) else { continue };
            let now_ms = chrono::Utc::now().timestamp_millis();
            let outcome = builder.on_tick(&tick, now_ms);

            if let Some(mb) = outcome.microbar {
                event_bus.publish_microbar(mb);
            }

            for bar in outcome.finalized {
                let was_open = session_open.get(&bar.symbol).copied().unwrap_or(false);
                let now_open = is_regular_trading_hours(bar.bar_start);
                let session_reset = now_open && !was_open;
                session_open.insert(bar.symbol.clone(), now_open);

                if let Some(set) = indicators.get_mut(&bar.symbol) {
                    set.update(&bar, session_reset);
                    let snapshot = set.snapshot();
                    bars1m.record(bar.clone(), snapshot.clone());
                    ring_buffer.push(bar.clone());
                    event_bus.publish_bar(bar.clone());

                    for fire in triggers.on_bar(bar.clone(), snapshot) {
                        let candidate = Signal {
                            id: uuid::Uuid::new_v4(),
                            symbol: bar.symbol.clone(),
                            timeframe: Timeframe::M1,
                            rule_id: fire.rule_id.to_string(),
                            direction: fire.direction,
                            confidence: fire.confidence,
                            ts_ms: fire.ts_ms,
                            bar_seq: fire.bar_seq,
                            ctx: serde_json::json!({ "direction": matches!(fire.direction, Direction::Long) }),
                        };
                        if risk_governor.admit(candidate.clone(), fire.ts_ms, 0.1).is_ok() {
                            event_bus.publish_signal(candidate);
                        }
                    }
                }
            }
        }
    });
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intraday_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn default_data_path(filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    base.join(filename).to_string_lossy().to_string()
}

#[allow(dead_code)]
fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return default_data_path(default_filename);
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }
    base.join(p).to_string_lossy().to_string()
}

fn load_env() {
    let _ = dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidates = [manifest_dir.join(".env"), manifest_dir.join("../.env")];
    for p in candidates {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }
}
