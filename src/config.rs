// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "SOURCEPULSE_CONFIG";
const DEFAULT_PATH: &str = "config/sources.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_compute_interval")]
    pub compute_interval_secs: u64,
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
    #[serde(default)]
    pub sources: Vec<SourceCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceCfg {
    pub key: String,
    pub kind: SourceKind,
    /// Endpoint override; required for `kind = "json"`.
    #[serde(default)]
    pub url: Option<String>,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Iss,
    PublicIp,
    /// Any endpoint returning a JSON body.
    Json,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_compute_interval() -> u64 {
    5
}

impl AppConfig {
    /// Load using env var + fallbacks:
    /// 1) $SOURCEPULSE_CONFIG
    /// 2) config/sources.toml
    /// 3) built-in defaults (ISS every 5s, public IP every 15s)
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("SOURCEPULSE_CONFIG points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::builtin_defaults())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg = parse(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// The schedule the original deployment ran with.
    pub fn builtin_defaults() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            compute_interval_secs: default_compute_interval(),
            fetch_timeout_secs: Some(10),
            sources: vec![
                SourceCfg {
                    key: "iss".into(),
                    kind: SourceKind::Iss,
                    url: None,
                    interval_secs: 5,
                },
                SourceCfg {
                    key: "ip".into(),
                    kind: SourceKind::PublicIp,
                    url: None,
                    interval_secs: 15,
                },
            ],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.compute_interval_secs == 0 {
            return Err(anyhow!("compute_interval_secs must be positive"));
        }
        let mut keys = HashSet::new();
        for sc in &self.sources {
            if sc.key.trim().is_empty() {
                return Err(anyhow!("source key must not be empty"));
            }
            if sc.key == "computed" {
                return Err(anyhow!("source key 'computed' is reserved"));
            }
            if sc.interval_secs == 0 {
                return Err(anyhow!("interval_secs for '{}' must be positive", sc.key));
            }
            if sc.kind == SourceKind::Json && sc.url.is_none() {
                return Err(anyhow!("source '{}' with kind 'json' needs a url", sc.key));
            }
            if !keys.insert(sc.key.as_str()) {
                return Err(anyhow!("duplicate source key: {}", sc.key));
            }
        }
        Ok(())
    }
}

fn parse(s: &str) -> Result<AppConfig> {
    toml::from_str(s).context("parsing sourcepulse config toml")
}
