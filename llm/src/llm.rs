//! The `Llm` collaborator contract (distilled spec §6): `complete`,
//! `complete_json`, `stream`. The Generator uses `complete` for query
//! generation and explanations; the Response Generator uses it for
//! narration. `stream` exists for a host surface that wants incremental
//! output but is not exercised by the core pipeline itself.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::errors::LlmResult;

#[async_trait]
pub trait Llm: Send + Sync {
    /// Submit a single prompt (with an optional system preamble) and return
    /// the model's text response.
    async fn complete(&self, prompt: &str, system: Option<&str>, temperature: f32) -> LlmResult<String>;

    /// Submit a prompt and coerce the response into the given JSON schema.
    async fn complete_json(&self, prompt: &str, schema: &Value) -> LlmResult<Value>;
}

/// Optional streaming extension — a host surface that wants to forward
/// tokens as they arrive implements against this instead of `complete`.
#[async_trait]
pub trait StreamingLlm: Llm {
    async fn stream(&self, prompt: &str, system: Option<&str>) -> LlmResult<BoxStream<'static, LlmResult<String>>>;
}
