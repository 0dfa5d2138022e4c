//! The `VectorStore` collaborator contract (distilled spec §6): `upsert`,
//! `search`, `delete`, `create_collection`, `exists`. A point id is always a
//! string.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::VectorResult;

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub payload: Map<String, Value>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, name: &str, dimension: u32) -> VectorResult<()>;

    async fn exists(&self, name: &str) -> VectorResult<bool>;

    /// Upsert keyed on `point.id`; replaces any existing point with the same id.
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> VectorResult<usize>;

    /// Returns up to `k` matches scoring at or above an implementation's own
    /// relevance floor; callers apply their own `threshold` on top.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&str>,
    ) -> VectorResult<Vec<VectorMatch>>;

    async fn delete(&self, collection: &str, id: &str) -> VectorResult<()>;
}
