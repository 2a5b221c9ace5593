use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::source::Source;
use crate::value::Value;

const IPIFY_URL: &str = "https://api.ipify.org?format=json";

/// The machine's public IP as seen by ipify.
pub struct PublicIpSource {
    client: reqwest::Client,
    url: String,
}

impl PublicIpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_url(client, IPIFY_URL)
    }

    pub fn with_url(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Source for PublicIpSource {
    async fn fetch(&self) -> Result<Value> {
        let payload = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("public ip request")?
            .error_for_status()
            .context("public ip status")?
            .json::<serde_json::Value>()
            .await
            .context("public ip body")?;
        Ok(Value::new(payload))
    }

    fn name(&self) -> &str {
        "ip"
    }
}
