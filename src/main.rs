//! sourcepulse — Binary Entrypoint
//! Boots the engine (one poll worker per configured source + the compute
//! worker) and the Axum HTTP server exposing /health, /latest and /metrics.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sourcepulse::api::{self, AppState};
use sourcepulse::config::AppConfig;
use sourcepulse::engine::Engine;
use sourcepulse::metrics::Metrics;
use sourcepulse::policy::DigestFold;
use sourcepulse::sources;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sourcepulse=info,engine=info,poll=info,compute=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load().context("loading configuration")?;
    let metrics = Metrics::init(cfg.compute_interval_secs);

    let engine = Arc::new(
        Engine::new(Duration::from_secs(cfg.compute_interval_secs), DigestFold)
            .with_fetch_timeout(cfg.fetch_timeout_secs.map(Duration::from_secs)),
    );

    let client = reqwest::Client::new();
    for sc in &cfg.sources {
        let source = sources::from_config(&client, sc)
            .with_context(|| format!("building source '{}'", sc.key))?;
        engine
            .register(&sc.key, source, Duration::from_secs(sc.interval_secs))
            .with_context(|| format!("registering source '{}'", sc.key))?;
    }
    engine.start();

    let app = api::create_router(AppState {
        engine: Arc::clone(&engine),
    })
    .merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(
        addr = %cfg.bind_addr,
        sources = cfg.sources.len(),
        "sourcepulse listening"
    );
    axum::serve(listener, app).await.context("serving http")?;

    Ok(())
}
