//! The `GraphStore` collaborator contract (distilled spec §6): a
//! pattern-matching read/write store the core never talks to except through
//! this trait and only ever with structurally-passed parameters — identifiers
//! are interpolated into Cypher by the caller (label/relationship/property
//! names are validated upstream against [`raqe_models::is_valid_identifier`]),
//! but values are always bound parameters, never interpolated into the query
//! text.

use async_trait::async_trait;
use raqe_models::GraphSchema;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::GraphResult;

pub type Row = BTreeMap<String, Value>;
pub type QueryParams = BTreeMap<String, Value>;

#[derive(Debug, Clone)]
pub struct EdgeRef {
    pub edge_type: String,
    pub from_label: String,
    pub from_id: String,
    pub to_label: String,
    pub to_id: String,
    pub properties: BTreeMap<String, Value>,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run a read (or, if `allow_write` upstream validation permitted it,
    /// write) query with structurally-bound parameters.
    async fn query(&self, text: &str, params: &QueryParams) -> GraphResult<Vec<Row>>;

    /// Introspect the store's current shape: the distinct labels,
    /// relationship types, and property names in use.
    async fn get_schema(&self) -> GraphResult<GraphSchema>;

    /// Upsert a node keyed on `{label, id}` — create if absent, replace
    /// properties if present. The Coordinator relies on this being an upsert
    /// for its idempotency guarantee (§5, "Ordering guarantees").
    async fn create_node(
        &self,
        label: &str,
        id: &str,
        properties: Row,
    ) -> GraphResult<()>;

    /// Replace a node's properties in place; errors if the node is absent.
    async fn update_node(&self, label: &str, id: &str, properties: Row) -> GraphResult<()>;

    /// Delete a node and all its incident relationships. A no-op (not an
    /// error) if the node does not exist.
    async fn delete_node(&self, label: &str, id: &str) -> GraphResult<()>;

    /// Fetch a single node's property map, if it exists.
    async fn get_node(&self, label: &str, id: &str) -> GraphResult<Option<Row>>;

    /// Upsert a directed edge of `edge_type` between two nodes. A missing
    /// target node is permitted (creates a bare stub), per distilled §4.2
    /// step 3.
    async fn create_edge(&self, edge: EdgeRef) -> GraphResult<()>;

    /// Delete a specific edge between two nodes. A no-op if absent.
    async fn delete_edge(&self, edge_type: &str, from_id: &str, to_id: &str) -> GraphResult<()>;

    /// Return up to `limit` rows of a label, for the Retriever's example-row
    /// step and for schema-derived sampling.
    async fn sample_rows(&self, label: &str, limit: u64) -> GraphResult<Vec<Row>>;
}
