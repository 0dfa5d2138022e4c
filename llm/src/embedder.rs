//! The `Embedder` collaborator contract (distilled spec §6): `embed(text)`,
//! `embed_batch([text])`. Dimension is fixed per embedder; the vector
//! collection's dimension must match it (checked by the Coordinator when it
//! provisions a collection).

use async_trait::async_trait;

use crate::errors::LlmResult;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>>;

    /// The embedder's fixed output dimension, if known ahead of a call.
    fn dimension(&self) -> Option<u32>;
}
