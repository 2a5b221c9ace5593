//! Read-side CLI: fetch /latest from a running instance and pretty-print it.

use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let endpoint = std::env::var("SOURCEPULSE_ENDPOINT")
        .unwrap_or_else(|_| "http://127.0.0.1:8000/latest".to_string());

    let body: serde_json::Value = reqwest::get(&endpoint)
        .await
        .with_context(|| format!("GET {endpoint}"))?
        .error_for_status()
        .context("non-success status from /latest")?
        .json()
        .await
        .context("parse /latest body")?;

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
