//! Prompt registration — named prompt templates the host can render.

use async_trait::async_trait;
use serde_json::Value;

/// A prompt callback contributed by a module or plugin.
///
/// The two prompt SDKs observed upstream disagree on exact argument shape;
/// this crate specifies only name and arity, matching what the registry and
/// loader actually need to track.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn render(&self, args: Value) -> anyhow::Result<Value>;
}
