//! Resource registration — named, URI-addressed readable content.

use async_trait::async_trait;
use serde_json::Value;

/// A resource reader contributed by a module or plugin.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    async fn read(&self, uri: &str) -> anyhow::Result<Value>;
}
