//! In-memory [`GraphStore`] for deterministic tests (distilled §6.4 test
//! tooling), backed by a `parking_lot::Mutex`-guarded map the way the
//! teacher's collaborator clients sit behind a trait boundary that test code
//! substitutes without a live Neo4j dependency.

use async_trait::async_trait;
use parking_lot::Mutex;
use raqe_models::GraphSchema;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::GraphResult;
use crate::store::{EdgeRef, GraphStore, QueryParams, Row};

#[derive(Debug, Clone)]
struct StoredEdge {
    edge_type: String,
    from_id: String,
    to_id: String,
    properties: Row,
}

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<(String, String), Row>,
    edges: Vec<StoredEdge>,
    /// Queries recorded for assertions in tests that need to inspect what
    /// was actually sent to the store.
    queries: Vec<(String, QueryParams)>,
}

/// A fake graph store that understands a tiny, deliberately literal subset
/// of Cypher: `MATCH (n:Label) RETURN count(n) AS count` for count queries,
/// and traversal patterns of the shape produced by the Generator for the
/// `relationship_traversal` scope variant. Anything else falls back to
/// returning all matching nodes by label so scenario tests stay simple.
pub struct FakeGraphStore {
    inner: Mutex<Inner>,
}

impl FakeGraphStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    pub fn seed_node(&self, label: &str, id: &str, properties: Row) {
        self.inner
            .lock()
            .nodes
            .insert((label.to_string(), id.to_string()), properties);
    }

    pub fn seed_edge(&self, edge_type: &str, from_id: &str, to_id: &str, properties: Row) {
        self.inner.lock().edges.push(StoredEdge {
            edge_type: edge_type.to_string(),
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            properties,
        });
    }

    pub fn node_count(&self, label: &str) -> usize {
        self.inner
            .lock()
            .nodes
            .keys()
            .filter(|(l, _)| l == label)
            .count()
    }

    pub fn recorded_queries(&self) -> Vec<(String, QueryParams)> {
        self.inner.lock().queries.clone()
    }
}

impl Default for FakeGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for FakeGraphStore {
    async fn query(&self, text: &str, params: &QueryParams) -> GraphResult<Vec<Row>> {
        let mut inner = self.inner.lock();
        inner.queries.push((text.to_string(), params.clone()));

        let lower = text.to_lowercase();
        if lower.contains("count(") {
            let label = extract_label(text);
            let count = inner
                .nodes
                .keys()
                .filter(|(l, _)| label.as_deref().map(|want| want == l).unwrap_or(true))
                .count();
            let mut row = Row::new();
            row.insert("count".to_string(), Value::from(count as i64));
            return Ok(vec![row]);
        }

        if let Some(label) = extract_label(text) {
            let rows: Vec<Row> = inner
                .nodes
                .iter()
                .filter(|((l, _), _)| *l == label)
                .map(|(_, props)| props.clone())
                .collect();
            return Ok(rows);
        }

        Ok(Vec::new())
    }

    async fn get_schema(&self) -> GraphResult<GraphSchema> {
        let inner = self.inner.lock();
        let mut schema = GraphSchema::default();
        for (label, _) in inner.nodes.keys() {
            schema.labels.insert(label.clone());
        }
        for edge in &inner.edges {
            schema.relationships.insert(edge.edge_type.clone());
        }
        for props in inner.nodes.values() {
            for key in props.keys() {
                schema.properties.insert(key.clone());
            }
        }
        Ok(schema)
    }

    async fn create_node(&self, label: &str, id: &str, properties: Row) -> GraphResult<()> {
        self.inner
            .lock()
            .nodes
            .insert((label.to_string(), id.to_string()), properties);
        Ok(())
    }

    async fn update_node(&self, label: &str, id: &str, properties: Row) -> GraphResult<()> {
        self.create_node(label, id, properties).await
    }

    async fn delete_node(&self, label: &str, id: &str) -> GraphResult<()> {
        let mut inner = self.inner.lock();
        inner.nodes.remove(&(label.to_string(), id.to_string()));
        inner.edges.retain(|e| e.from_id != id && e.to_id != id);
        Ok(())
    }

    async fn get_node(&self, label: &str, id: &str) -> GraphResult<Option<Row>> {
        Ok(self
            .inner
            .lock()
            .nodes
            .get(&(label.to_string(), id.to_string()))
            .cloned())
    }

    async fn create_edge(&self, edge: EdgeRef) -> GraphResult<()> {
        let mut inner = self.inner.lock();
        inner
            .nodes
            .entry((edge.to_label.clone(), edge.to_id.clone()))
            .or_insert_with(|| {
                let mut stub = Row::new();
                stub.insert("id".to_string(), Value::String(edge.to_id.clone()));
                stub
            });
        inner.edges.push(StoredEdge {
            edge_type: edge.edge_type,
            from_id: edge.from_id,
            to_id: edge.to_id,
            properties: edge.properties,
        });
        Ok(())
    }

    async fn delete_edge(&self, edge_type: &str, from_id: &str, to_id: &str) -> GraphResult<()> {
        let mut inner = self.inner.lock();
        inner
            .edges
            .retain(|e| !(e.edge_type == edge_type && e.from_id == from_id && e.to_id == to_id));
        Ok(())
    }

    async fn sample_rows(&self, label: &str, limit: u64) -> GraphResult<Vec<Row>> {
        let inner = self.inner.lock();
        Ok(inner
            .nodes
            .iter()
            .filter(|((l, _), _)| l == label)
            .take(limit as usize)
            .map(|(_, props)| props.clone())
            .collect())
    }
}

/// Pulls the first `:Label` token out of a Cypher string — enough for the
/// fake's deliberately narrow pattern matching.
fn extract_label(text: &str) -> Option<String> {
    let idx = text.find(':')?;
    let rest = &text[idx + 1..];
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(rest[..end].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_nodes_by_label() {
        let store = FakeGraphStore::new();
        store.seed_node("Person", "1", Row::new());
        store.seed_node("Person", "2", Row::new());
        store.seed_node("Team", "3", Row::new());

        let rows = store
            .query("MATCH (n:Person) RETURN count(n) AS count", &QueryParams::new())
            .await
            .unwrap();
        assert_eq!(rows[0]["count"], Value::from(2));
    }

    #[tokio::test]
    async fn delete_node_cascades_edges() {
        let store = FakeGraphStore::new();
        store.seed_node("Person", "1", Row::new());
        store.seed_edge("HAS_ROLE", "1", "2", Row::new());
        store.delete_node("Person", "1").await.unwrap();
        assert!(store.get_node("Person", "1").await.unwrap().is_none());
        assert!(store.inner.lock().edges.is_empty());
    }
}
