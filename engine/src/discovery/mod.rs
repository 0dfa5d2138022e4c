//! Entity Auto-Discovery & Configuration: derives a [`NodeableConfig`] from a
//! description of a host domain entity, following the three-tier precedence
//! (explicit override, legacy table, derived) and the Scope Adapter.
//!
//! Rust has no runtime reflection over a host application's ORM models, so
//! the "reference to a host-language domain entity" of the original design
//! is represented here as an explicit [`HostEntityDescriptor`] the host
//! registers once at startup — the Rust-native counterpart of what the
//! teacher's services reach via method calls on a live model instance.

pub mod cache;
pub mod naming;
pub mod scope_adapter;

use raqe_models::{is_valid_identifier, AutoSyncFlags, NodeableConfig, RelationshipConfig, ScopeMeta, SemanticsConfig, VectorConfig};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use crate::errors::{DiscoveryError, DiscoveryResult};
use cache::{CacheStats, DiscoveryCache};
use naming::{pluralize, to_snake_case, to_upper_snake};
use scope_adapter::{translate, ScopeRecorder};

/// Storage-level type of one column in the host entity's schema, used to
/// decide whether it belongs in `vector.embed_fields`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStorageType {
    Text,
    LongText,
    Number,
    Boolean,
    Timestamp,
    Other,
}

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub storage_type: ColumnStorageType,
    pub indexed: bool,
}

/// A declared "belongs-to-one" relation on the host entity.
#[derive(Debug, Clone)]
pub struct BelongsTo {
    pub relation_name: String,
    pub target_label: String,
    pub foreign_key: String,
}

/// One named filter method, captured as a closure over a [`ScopeRecorder`]
/// so the Scope Adapter can translate its call trace without ever touching
/// the host's storage.
pub struct ScopeDescriptor {
    pub name: String,
    pub concept: Option<String>,
    pub business_rules: Vec<String>,
    pub examples: Vec<String>,
    pub record: Box<dyn Fn(&mut ScopeRecorder) + Send + Sync>,
}

/// Everything Auto-Discovery needs to know about one host entity type.
pub struct HostEntityDescriptor {
    pub type_name: String,
    pub writable_attributes: Vec<String>,
    pub storage_columns: Vec<ColumnInfo>,
    pub belongs_to: Vec<BelongsTo>,
    pub scopes: Vec<ScopeDescriptor>,
    pub alias_overrides: Vec<String>,
    pub description: Option<String>,
    pub property_docs: BTreeMap<String, String>,
    pub vector_collection_override: Option<String>,
    pub auto_sync: AutoSyncFlags,
    /// Tier 1: an explicit configuration supplied by the entity itself.
    pub explicit_override: Option<NodeableConfig>,
}

impl HostEntityDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            writable_attributes: Vec::new(),
            storage_columns: Vec::new(),
            belongs_to: Vec::new(),
            scopes: Vec::new(),
            alias_overrides: Vec::new(),
            description: None,
            property_docs: BTreeMap::new(),
            vector_collection_override: None,
            auto_sync: AutoSyncFlags::default(),
            explicit_override: None,
        }
    }
}

/// A registry of host entity descriptors, keyed by label, consulted while
/// deriving relationship targets recursively.
#[derive(Default)]
pub struct HostEntityRegistry {
    descriptors: BTreeMap<String, HostEntityDescriptor>,
}

impl HostEntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: HostEntityDescriptor) {
        self.descriptors.insert(descriptor.type_name.clone(), descriptor);
    }

    pub fn get(&self, label: &str) -> Option<&HostEntityDescriptor> {
        self.descriptors.get(label)
    }

    /// All registered labels, for callers that need to resolve every known
    /// entity's config up front (e.g. building the Generator's prompt context).
    pub fn labels(&self) -> impl Iterator<Item = &String> {
        self.descriptors.keys()
    }
}

fn default_exclusions() -> HashSet<String> {
    ["password", "remember_token", "api_token", "secret"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

const TEXT_LIKE_NAMES: &[&str] = &["description", "bio", "notes", "body", "content", "details", "summary"];

pub struct AutoDiscovery {
    legacy_table: BTreeMap<String, NodeableConfig>,
    cache: DiscoveryCache,
    depth_guard: u32,
    exclusions: HashSet<String>,
}

impl AutoDiscovery {
    pub fn new(depth_guard: u32, cache_ttl: Option<Duration>) -> Self {
        Self {
            legacy_table: BTreeMap::new(),
            cache: DiscoveryCache::new(cache_ttl),
            depth_guard,
            exclusions: default_exclusions(),
        }
    }

    /// Registers a legacy configuration-table entry (tier 2), keyed by label.
    pub fn register_legacy(&mut self, label: impl Into<String>, config: NodeableConfig) {
        self.legacy_table.insert(label.into(), config);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn invalidate(&self, label: &str) {
        self.cache.invalidate(label);
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Produces the `NodeableConfig` for `label`, per the three-tier
    /// precedence, warming the cache for any related entities reachable
    /// through `belongs_to` relations (bounded by the depth guard).
    pub fn discover(&self, registry: &HostEntityRegistry, label: &str) -> DiscoveryResult<NodeableConfig> {
        let mut visited = HashSet::new();
        self.discover_inner(registry, label, 0, &mut visited)
    }

    fn discover_inner(
        &self,
        registry: &HostEntityRegistry,
        label: &str,
        depth: u32,
        visited: &mut HashSet<String>,
    ) -> DiscoveryResult<NodeableConfig> {
        if depth > self.depth_guard || visited.contains(label) {
            return Ok(NodeableConfig::stub(label));
        }
        if let Some(cached) = self.cache.get(label) {
            return Ok(cached);
        }
        visited.insert(label.to_string());

        let descriptor = registry
            .get(label)
            .ok_or_else(|| DiscoveryError::Configuration(format!("host entity '{label}' has no storage schema")))?;

        // Tier 1: explicit override.
        if let Some(explicit) = &descriptor.explicit_override {
            validate_config(explicit)?;
            self.cache.insert(label.to_string(), explicit.clone());
            return Ok(explicit.clone());
        }

        // Tier 2: legacy configuration table.
        if let Some(legacy) = self.legacy_table.get(label) {
            validate_config(legacy)?;
            self.cache.insert(label.to_string(), legacy.clone());
            return Ok(legacy.clone());
        }

        // Tier 3: fully derived.
        let config = self.derive(registry, descriptor, depth, visited)?;
        validate_config(&config)?;
        self.cache.insert(label.to_string(), config.clone());
        Ok(config)
    }

    fn derive(
        &self,
        registry: &HostEntityRegistry,
        descriptor: &HostEntityDescriptor,
        depth: u32,
        visited: &mut HashSet<String>,
    ) -> DiscoveryResult<NodeableConfig> {
        let label = descriptor.type_name.clone();

        let writable: HashSet<&str> = descriptor.writable_attributes.iter().map(|s| s.as_str()).collect();
        let mut properties: Vec<String> = descriptor
            .storage_columns
            .iter()
            .filter(|col| writable.contains(col.name.as_str()) && !self.exclusions.contains(&col.name))
            .map(|col| col.name.clone())
            .collect();

        let mut relationships = Vec::with_capacity(descriptor.belongs_to.len());
        for rel in &descriptor.belongs_to {
            // Foreign keys are kept as properties even if the schema scan missed them.
            if !properties.contains(&rel.foreign_key) {
                properties.push(rel.foreign_key.clone());
            }
            relationships.push(RelationshipConfig {
                edge_type: to_upper_snake(&rel.relation_name),
                target_label: rel.target_label.clone(),
                foreign_key: Some(rel.foreign_key.clone()),
                property_map: None,
            });
            // Warm the cache for the related entity, bounded by the depth
            // guard and cycle detection; failures here are not fatal to
            // this entity's own derivation.
            let _ = self.discover_inner(registry, &rel.target_label, depth + 1, visited);
        }
        if !properties.iter().any(|p| p == "id") {
            properties.insert(0, "id".to_string());
        }

        let vector = derive_vector_config(descriptor, &properties);

        let mut aliases: Vec<String> = Vec::new();
        for candidate in [
            label.clone(),
            pluralize(&label),
            to_snake_case(&label),
            pluralize(&to_snake_case(&label)),
        ] {
            push_alias(&mut aliases, candidate);
        }
        for overridden in &descriptor.alias_overrides {
            push_alias(&mut aliases, overridden.clone());
        }

        let mut scopes = BTreeMap::new();
        for scope in &descriptor.scopes {
            let mut recorder = ScopeRecorder::new(self.depth_guard);
            (scope.record)(&mut recorder);
            let aborted = recorder.aborted();
            if let Some(spec) = translate(&label, recorder.into_calls(), aborted) {
                let name = naming::normalize_scope_name(&scope.name);
                scopes.insert(
                    name,
                    ScopeMeta {
                        spec,
                        concept: scope.concept.clone(),
                        business_rules: scope.business_rules.clone(),
                        examples: scope.examples.clone(),
                    },
                );
            }
        }

        Ok(NodeableConfig {
            label,
            properties,
            relationships,
            vector,
            semantics: SemanticsConfig {
                aliases,
                description: descriptor.description.clone(),
                scopes,
                property_docs: descriptor.property_docs.clone(),
            },
            auto_sync: descriptor.auto_sync.clone(),
        })
    }
}

fn push_alias(aliases: &mut Vec<String>, candidate: String) {
    let lower = candidate.to_lowercase();
    if !aliases.iter().any(|a| a.to_lowercase() == lower) {
        aliases.push(candidate);
    }
}

fn derive_vector_config(descriptor: &HostEntityDescriptor, properties: &[String]) -> Option<VectorConfig> {
    let embed_fields: Vec<String> = descriptor
        .storage_columns
        .iter()
        .filter(|col| {
            properties.contains(&col.name)
                && (col.storage_type == ColumnStorageType::LongText
                    || TEXT_LIKE_NAMES.contains(&col.name.as_str()))
        })
        .map(|col| col.name.clone())
        .collect();

    if embed_fields.is_empty() {
        return None;
    }

    let collection = descriptor
        .vector_collection_override
        .clone()
        .unwrap_or_else(|| pluralize(&to_snake_case(&descriptor.type_name)));

    let mut metadata_fields: Vec<String> = vec!["id".to_string()];
    for col in &descriptor.storage_columns {
        if col.indexed && properties.contains(&col.name) && !metadata_fields.contains(&col.name) {
            metadata_fields.push(col.name.clone());
        }
    }

    Some(VectorConfig { collection, embed_fields, metadata_fields })
}

fn validate_config(config: &NodeableConfig) -> DiscoveryResult<()> {
    if !is_valid_identifier(&config.label) {
        return Err(DiscoveryError::InjectionDefense(config.label.clone()));
    }
    for prop in &config.properties {
        if !is_valid_identifier(prop) {
            return Err(DiscoveryError::InjectionDefense(prop.clone()));
        }
    }
    for rel in &config.relationships {
        if !is_valid_identifier(&rel.edge_type) || !is_valid_identifier(&rel.target_label) {
            return Err(DiscoveryError::InjectionDefense(rel.edge_type.clone()));
        }
    }
    Ok(())
}

/// Sets of labels/relationships/properties already known to the discovery
/// layer, used by the Retriever's schema-less entity-detection fallback.
pub fn known_labels(configs: &BTreeMap<String, NodeableConfig>) -> BTreeSet<String> {
    configs.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use raqe_models::ComparisonOperator;
    use serde_json::Value;

    fn person_descriptor() -> HostEntityDescriptor {
        let mut descriptor = HostEntityDescriptor::new("Person");
        descriptor.writable_attributes = vec!["id".into(), "name".into(), "bio".into(), "team_id".into()];
        descriptor.storage_columns = vec![
            ColumnInfo { name: "id".into(), storage_type: ColumnStorageType::Text, indexed: true },
            ColumnInfo { name: "name".into(), storage_type: ColumnStorageType::Text, indexed: true },
            ColumnInfo { name: "bio".into(), storage_type: ColumnStorageType::LongText, indexed: false },
            ColumnInfo { name: "team_id".into(), storage_type: ColumnStorageType::Text, indexed: false },
            ColumnInfo { name: "password".into(), storage_type: ColumnStorageType::Text, indexed: false },
        ];
        descriptor.belongs_to = vec![BelongsTo {
            relation_name: "team".into(),
            target_label: "Team".into(),
            foreign_key: "team_id".into(),
        }];
        descriptor.scopes.push(ScopeDescriptor {
            name: "scopeVolunteers".into(),
            concept: Some("people donating their time".into()),
            business_rules: vec!["role_type must equal volunteer".into()],
            examples: vec!["How many volunteers do we have?".into()],
            record: Box::new(|r| r.where_("role_type", ComparisonOperator::Equals, Value::from("volunteer"))),
        });
        descriptor
    }

    fn team_descriptor() -> HostEntityDescriptor {
        HostEntityDescriptor::new("Team")
    }

    #[test]
    fn derives_properties_relationships_vector_and_scopes() {
        let mut registry = HostEntityRegistry::new();
        registry.register(person_descriptor());
        registry.register(team_descriptor());

        let discovery = AutoDiscovery::new(5, None);
        let config = discovery.discover(&registry, "Person").unwrap();

        assert_eq!(config.label, "Person");
        assert!(config.properties.contains(&"team_id".to_string()));
        assert!(!config.properties.contains(&"password".to_string()));
        assert_eq!(config.relationships.len(), 1);
        assert_eq!(config.relationships[0].edge_type, "TEAM");
        assert_eq!(config.relationships[0].target_label, "Team");

        let vector = config.vector.unwrap();
        assert_eq!(vector.collection, "persons");
        assert!(vector.embed_fields.contains(&"bio".to_string()));

        assert!(config.semantics.scopes.contains_key("volunteers"));
        assert!(config.semantics.aliases.contains(&"Person".to_string()));
    }

    #[test]
    fn explicit_override_wins_over_derivation() {
        let mut descriptor = person_descriptor();
        let explicit = NodeableConfig::stub("Person");
        descriptor.explicit_override = Some(explicit.clone());
        let mut registry = HostEntityRegistry::new();
        registry.register(descriptor);

        let discovery = AutoDiscovery::new(5, None);
        let config = discovery.discover(&registry, "Person").unwrap();
        assert_eq!(config, explicit);
    }

    #[test]
    fn legacy_table_wins_over_derivation_but_not_override() {
        let mut registry = HostEntityRegistry::new();
        registry.register(person_descriptor());
        registry.register(team_descriptor());

        let mut discovery = AutoDiscovery::new(5, None);
        let legacy = NodeableConfig::stub("Person");
        discovery.register_legacy("Person", legacy.clone());
        let config = discovery.discover(&registry, "Person").unwrap();
        assert_eq!(config, legacy);
    }

    #[test]
    fn missing_descriptor_is_a_configuration_error() {
        let registry = HostEntityRegistry::new();
        let discovery = AutoDiscovery::new(5, None);
        let err = discovery.discover(&registry, "Ghost").unwrap_err();
        assert!(matches!(err, DiscoveryError::Configuration(_)));
    }

    #[test]
    fn second_call_is_served_from_cache() {
        let mut registry = HostEntityRegistry::new();
        registry.register(person_descriptor());
        registry.register(team_descriptor());
        let discovery = AutoDiscovery::new(5, None);
        discovery.discover(&registry, "Person").unwrap();
        discovery.discover(&registry, "Person").unwrap();
        assert!(discovery.cache_stats().hits >= 1);
    }
}
