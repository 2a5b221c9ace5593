use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::source::Source;
use crate::value::Value;

const ISS_NOW_URL: &str = "http://api.open-notify.org/iss-now.json";

/// Current ISS position from the open-notify API.
pub struct IssPositionSource {
    client: reqwest::Client,
    url: String,
}

impl IssPositionSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_url(client, ISS_NOW_URL)
    }

    pub fn with_url(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Source for IssPositionSource {
    async fn fetch(&self) -> Result<Value> {
        let payload = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("iss position request")?
            .error_for_status()
            .context("iss position status")?
            .json::<serde_json::Value>()
            .await
            .context("iss position body")?;
        Ok(Value::new(payload))
    }

    fn name(&self) -> &str {
        "iss"
    }
}
