//! Standalone CLI to drive the replay engine against a running server,
//! independent of the browser UI - useful for scripted demo/backfill checks.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "replay-cli", about = "Control the intraday pipeline replay engine")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    base_url: String,

    #[arg(long)]
    symbol: String,

    #[arg(long)]
    from_ms: i64,

    #[arg(long)]
    to_ms: i64,

    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    #[arg(long, default_value_t = 0)]
    run_for_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = reqwest::Client::new();

    let start_url = format!("{}/api/replay/start", args.base_url);
    let resp = client
        .post(&start_url)
        .json(&serde_json::json!({
            "symbol": args.symbol,
            "from_ms": args.from_ms,
            "to_ms": args.to_ms,
            "speed": args.speed,
        }))
        .send()
        .await
        .context("failed to call replay/start")?;

    println!("replay start status: {}", resp.status());

    if args.run_for_secs > 0 {
        tokio::time::sleep(Duration::from_secs(args.run_for_secs)).await;

        let stop_url = format!("{}/api/replay/stop", args.base_url);
        let resp = client
            .post(&stop_url)
            .json(&serde_json::json!({ "symbol": args.symbol }))
            .send()
            .await
            .context("failed to call replay/stop")?;
        println!("replay stop status: {}", resp.status());
    }

    Ok(())
}
