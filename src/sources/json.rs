use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::source::Source;
use crate::value::Value;

/// Generic source for any endpoint that answers with a JSON body.
pub struct JsonSource {
    client: reqwest::Client,
    name: String,
    url: String,
}

impl JsonSource {
    pub fn new(client: reqwest::Client, name: &str, url: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Source for JsonSource {
    async fn fetch(&self) -> Result<Value> {
        let payload = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("{} request", self.name))?
            .error_for_status()
            .with_context(|| format!("{} status", self.name))?
            .json::<serde_json::Value>()
            .await
            .with_context(|| format!("{} body", self.name))?;
        Ok(Value::new(payload))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
