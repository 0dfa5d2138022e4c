//! Output of the Context Retriever (§3.3 / §4.3): the `ContextBundle` the
//! Generator consumes.

use crate::discovery::{NodeableConfig, ScopeSpec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContextBundle {
    pub question: String,
    /// Empty if embedding the question failed.
    pub question_embedding: Vec<f32>,
    /// Highest-score first.
    pub similar: Vec<SimilarRecord>,
    pub graph_schema: GraphSchema,
    /// Up to K rows per label.
    pub examples_by_label: BTreeMap<String, Vec<serde_json::Value>>,
    pub entity_metadata: EntityMetadataBundle,
    /// Per-source partial-failure descriptions.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarRecord {
    pub question: String,
    pub query: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphSchema {
    pub labels: BTreeSet<String>,
    pub relationships: BTreeSet<String>,
    pub properties: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntityMetadataBundle {
    pub detected_entities: BTreeSet<String>,
    /// Stripped to metadata: callers never receive the full config's
    /// internal machinery, just what the Generator's prompt needs.
    pub entity_configs: BTreeMap<String, NodeableConfig>,
    pub detected_scopes: BTreeMap<String, DetectedScope>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedScope {
    pub entity: String,
    pub spec: ScopeSpec,
    pub concept: Option<String>,
    pub business_rules: Vec<String>,
    pub examples: Vec<String>,
}
