//! The capability a data source has to provide: fetch one fresh value, or
//! fail. The engine assumes nothing about transport; the bundled HTTP sources
//! live in [`crate::sources`].

use anyhow::Result;
use async_trait::async_trait;

use crate::value::Value;

#[async_trait]
pub trait Source: Send + Sync {
    async fn fetch(&self) -> Result<Value>;
    fn name(&self) -> &str;
}
