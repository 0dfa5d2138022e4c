//! The entity configuration produced by Auto-Discovery (§4.1) and consumed by
//! every other subsystem. `NodeableConfig` is immutable once built; it is
//! rebuilt only when its source shape changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative shape of one host domain entity: its graph projection, its
/// vector projection, and the business semantics layered on top of both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeableConfig {
    /// Canonical entity name; a well-formed identifier, <= 255 chars.
    pub label: String,
    /// Ordered, deduplicated attribute names projected into the graph.
    /// Always includes the primary `id` property.
    pub properties: Vec<String>,
    /// Outgoing edges synthesized from the host entity's relations.
    pub relationships: Vec<RelationshipConfig>,
    /// Vector (similarity-search) projection; `None` when the entity has no
    /// vector shape.
    pub vector: Option<VectorConfig>,
    /// Natural-language metadata consumed by the Retriever and Generator.
    pub semantics: SemanticsConfig,
    /// Per-operation auto-sync flags.
    pub auto_sync: AutoSyncFlags,
}

impl NodeableConfig {
    /// A bare, relationship-less reference used when discovery hits its
    /// depth guard or a reflection failure and must short-circuit.
    pub fn stub(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            properties: vec!["id".to_string()],
            relationships: Vec::new(),
            vector: None,
            semantics: SemanticsConfig::default(),
            auto_sync: AutoSyncFlags::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipConfig {
    /// Edge type, e.g. `HAS_ROLE` — uppercase snake case of the relation name.
    pub edge_type: String,
    pub target_label: String,
    /// Local key resolved against the entity's properties; `None` when the
    /// relation could not be synthesized from a foreign key.
    pub foreign_key: Option<String>,
    pub property_map: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorConfig {
    /// Name of the similarity-search collection; plural lowercase of the
    /// label unless explicitly overridden.
    pub collection: String,
    /// Text fields concatenated, trimmed, and normalized to form the
    /// embedding input. Non-empty whenever `vector` is `Some`.
    pub embed_fields: Vec<String>,
    /// Subset of `properties` stored alongside the vector for filtering.
    /// Always contains `id`.
    pub metadata_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SemanticsConfig {
    /// Case-insensitive, deduplicated natural-language synonyms.
    pub aliases: Vec<String>,
    pub description: Option<String>,
    /// Scope name -> declarative specification. Names are unique per entity.
    pub scopes: BTreeMap<String, ScopeMeta>,
    /// Property -> prose description.
    pub property_docs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoSyncFlags {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl Default for AutoSyncFlags {
    fn default() -> Self {
        Self { create: true, update: true, delete: true }
    }
}

/// A named business predicate, carrying its declarative specification plus
/// the prose the Generator folds into its prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScopeMeta {
    pub spec: ScopeSpec,
    pub concept: Option<String>,
    pub business_rules: Vec<String>,
    pub examples: Vec<String>,
}

/// A business term expressed as a declarative predicate over the graph —
/// never as raw query syntax (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScopeSpec {
    PropertyFilter {
        property: String,
        operator: ComparisonOperator,
        value: serde_json::Value,
    },
    PropertyRange {
        property: String,
        low: Option<serde_json::Value>,
        high: Option<serde_json::Value>,
        inclusive: bool,
    },
    RelationshipTraversal {
        start_label: String,
        path: Vec<TraversalStep>,
        filter: Option<Box<TraversalFilter>>,
        distinct: bool,
    },
    EntityWithRelationship {
        relationship: String,
        target_label: String,
        min_count: Option<u64>,
        max_count: Option<u64>,
    },
    EntityWithoutRelationship {
        relationship: String,
        target_label: String,
    },
    TemporalFilter {
        property: String,
        window: TemporalWindow,
    },
    MultiCondition {
        op: BooleanOp,
        children: Vec<ScopeSpec>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    In,
    Contains,
    StartsWith,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraversalStep {
    pub relationship: String,
    pub target_label: String,
    pub direction: TraversalDirection,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    Outgoing,
    Incoming,
    Undirected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraversalFilter {
    pub target_label: String,
    pub property: String,
    pub operator: ComparisonOperator,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TemporalWindow {
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    pub to: Option<chrono::DateTime<chrono::Utc>>,
    /// A relative expression such as `"last_30_days"`; mutually usable
    /// alongside explicit bounds.
    pub relative: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_config_has_bare_label_and_id() {
        let stub = NodeableConfig::stub("PersonTeam");
        assert_eq!(stub.label, "PersonTeam");
        assert_eq!(stub.properties, vec!["id".to_string()]);
        assert!(stub.relationships.is_empty());
    }

    #[test]
    fn scope_spec_round_trips_through_json() {
        let spec = ScopeSpec::RelationshipTraversal {
            start_label: "Person".to_string(),
            path: vec![TraversalStep {
                relationship: "HAS_ROLE".to_string(),
                target_label: "PersonTeam".to_string(),
                direction: TraversalDirection::Outgoing,
            }],
            filter: Some(Box::new(TraversalFilter {
                target_label: "PersonTeam".to_string(),
                property: "role_type".to_string(),
                operator: ComparisonOperator::Equals,
                value: serde_json::json!("volunteer"),
            })),
            distinct: true,
        };
        let encoded = serde_json::to_string(&spec).unwrap();
        let decoded: ScopeSpec = serde_json::from_str(&encoded).unwrap();
        assert_eq!(spec, decoded);
    }
}
