//! In-memory [`VectorStore`] for deterministic tests. Similarity is cosine
//! distance computed directly rather than delegated to a real ANN index —
//! exact for the small fixture sizes scenario tests use.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::VectorResult;
use crate::store::{VectorMatch, VectorPoint, VectorStore};

#[derive(Default)]
struct Inner {
    collections: BTreeSet<String>,
    points: BTreeMap<String, BTreeMap<String, (Vec<f32>, Map<String, Value>)>>,
}

pub struct FakeVectorStore {
    inner: Mutex<Inner>,
}

impl FakeVectorStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }
}

impl Default for FakeVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for FakeVectorStore {
    async fn create_collection(&self, name: &str, _dimension: u32) -> VectorResult<()> {
        let mut inner = self.inner.lock();
        inner.collections.insert(name.to_string());
        inner.points.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn exists(&self, name: &str) -> VectorResult<bool> {
        Ok(self.inner.lock().collections.contains(name))
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> VectorResult<usize> {
        let mut inner = self.inner.lock();
        inner.collections.insert(collection.to_string());
        let bucket = inner.points.entry(collection.to_string()).or_default();
        let count = points.len();
        for point in points {
            bucket.insert(point.id, (point.vector, point.payload));
        }
        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        _filter: Option<&str>,
    ) -> VectorResult<Vec<VectorMatch>> {
        let inner = self.inner.lock();
        let Some(bucket) = inner.points.get(collection) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<VectorMatch> = bucket
            .iter()
            .map(|(id, (v, payload))| VectorMatch {
                id: id.clone(),
                score: cosine(vector, v),
                payload: payload.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete(&self, collection: &str, id: &str) -> VectorResult<()> {
        if let Some(bucket) = self.inner.lock().points.get_mut(collection) {
            bucket.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let store = FakeVectorStore::new();
        store.create_collection("people", 3).await.unwrap();
        store
            .upsert(
                "people",
                vec![
                    VectorPoint { id: "a".into(), vector: vec![1.0, 0.0, 0.0], payload: Map::new() },
                    VectorPoint { id: "b".into(), vector: vec![0.0, 1.0, 0.0], payload: Map::new() },
                ],
            )
            .await
            .unwrap();

        let results = store.search("people", &[1.0, 0.0, 0.0], 1, None).await.unwrap();
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn delete_removes_point() {
        let store = FakeVectorStore::new();
        store.create_collection("people", 3).await.unwrap();
        store
            .upsert("people", vec![VectorPoint { id: "a".into(), vector: vec![1.0], payload: Map::new() }])
            .await
            .unwrap();
        store.delete("people", "a").await.unwrap();
        let results = store.search("people", &[1.0], 5, None).await.unwrap();
        assert!(results.is_empty());
    }
}
