// src/sources/mod.rs
pub mod ip;
pub mod iss;
pub mod json;

use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::config::{SourceCfg, SourceKind};
use crate::source::Source;

pub use ip::PublicIpSource;
pub use iss::IssPositionSource;
pub use json::JsonSource;

/// Build a bundled source from its config entry. The `reqwest` client is
/// shared across sources (it pools connections internally).
pub fn from_config(client: &reqwest::Client, cfg: &SourceCfg) -> Result<Arc<dyn Source>> {
    match cfg.kind {
        SourceKind::Iss => Ok(Arc::new(match &cfg.url {
            Some(url) => IssPositionSource::with_url(client.clone(), url),
            None => IssPositionSource::new(client.clone()),
        })),
        SourceKind::PublicIp => Ok(Arc::new(match &cfg.url {
            Some(url) => PublicIpSource::with_url(client.clone(), url),
            None => PublicIpSource::new(client.clone()),
        })),
        SourceKind::Json => {
            let url = cfg
                .url
                .as_deref()
                .ok_or_else(|| anyhow!("source '{}' with kind 'json' needs a url", cfg.key))?;
            Ok(Arc::new(JsonSource::new(client.clone(), &cfg.key, url)))
        }
    }
}
