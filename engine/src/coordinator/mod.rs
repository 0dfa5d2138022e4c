//! Dual-Store Coordinator (write path): `ingest`, `sync`, `remove`,
//! `ingest_batch`, implementing plan -> embed -> graph-write -> vector-write
//! -> compensate-on-fail, plus the auto-sync hook.

use std::collections::BTreeMap;
use std::sync::Arc;

use raqe_graph::{EdgeRef, GraphStore};
use raqe_llm::Embedder;
use raqe_models::{AutoSyncFlags, BatchReport, EntityOutcome, IngestReport, NodeableConfig};
use raqe_vector::{VectorPoint, VectorStore};
use serde_json::Value;
use tracing::{error, instrument, warn};

use crate::errors::{CoordinatorError, CoordinatorResult};

/// A host entity's id and attribute map, already in the shape
/// `NodeableConfig.properties` expects — the Rust-native stand-in for "a
/// reference to a host-language domain entity" the write path operates on.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub id: String,
    pub attributes: BTreeMap<String, Value>,
}

/// The operation an auto-sync event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

/// `{operation, entity}` delivered by the host's event source (distilled
/// §6, "Event source (for auto-sync)").
pub struct SyncEvent {
    pub operation: SyncOperation,
    pub entity: EntityRecord,
    pub config: NodeableConfig,
}

pub struct Coordinator {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Coordinator {
    pub fn new(graph: Arc<dyn GraphStore>, vector: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { graph, vector, embedder }
    }

    #[instrument(skip(self, entity, config))]
    pub async fn ingest(&self, entity: &EntityRecord, config: &NodeableConfig) -> CoordinatorResult<IngestReport> {
        let mut warnings = Vec::new();

        // 1. Plan.
        let node_payload = project(&entity.attributes, &config.properties);
        let planned_edges: Vec<(String, String, String)> = config
            .relationships
            .iter()
            .filter_map(|rel| {
                let fk = rel.foreign_key.as_ref()?;
                match entity.attributes.get(fk) {
                    Some(Value::Null) | None => None,
                    Some(value) => Some((rel.edge_type.clone(), rel.target_label.clone(), value_to_id(value))),
                }
            })
            .collect();

        let embed_input = config.vector.as_ref().map(|v| normalize_embed_text(&entity.attributes, &v.embed_fields));

        // 2. Embed.
        let mut embedding: Option<Vec<f32>> = None;
        if let Some(text) = &embed_input {
            match self.embedder.embed(text).await {
                Ok(vector) => embedding = Some(vector),
                Err(err) => warnings.push(format!("embedding failed: {err}")),
            }
        }

        // 3. Write graph.
        self.graph
            .create_node(&config.label, &entity.id, node_payload)
            .await
            .map_err(|e| CoordinatorError::GraphWrite(e.to_string()))?;

        let mut relationships_written = 0u32;
        for (edge_type, target_label, target_id) in &planned_edges {
            if self
                .graph
                .create_edge(EdgeRef {
                    edge_type: edge_type.clone(),
                    from_label: config.label.clone(),
                    from_id: entity.id.clone(),
                    to_label: target_label.clone(),
                    to_id: target_id.clone(),
                    properties: BTreeMap::new(),
                })
                .await
                .is_ok()
            {
                relationships_written += 1;
            } else {
                warnings.push(format!("failed to write relationship to {target_label}"));
            }
        }

        // 4. Write vector.
        let mut vector_stored = false;
        if let (Some(vector_config), Some(embedding)) = (&config.vector, &embedding) {
            let payload = project_json(&entity.attributes, &vector_config.metadata_fields);
            let point = VectorPoint { id: entity.id.clone(), vector: embedding.clone(), payload };
            match self.vector.upsert(&vector_config.collection, vec![point]).await {
                Ok(_) => vector_stored = true,
                Err(vector_err) => {
                    // 5. Compensate: best-effort rollback of the graph-side write.
                    if let Err(compensation_err) = self.graph.delete_node(&config.label, &entity.id).await {
                        error!(
                            target: "coordinator",
                            entity_id = %entity.id,
                            label = %config.label,
                            graph_error = %vector_err,
                            compensation_error = %compensation_err,
                            "compensation failed: data inconsistent across stores"
                        );
                        return Err(CoordinatorError::DataConsistency {
                            graph_error: vector_err.to_string(),
                            compensation_error: compensation_err.to_string(),
                        });
                    }
                    return Err(CoordinatorError::VectorWrite(vector_err.to_string()));
                }
            }
        }

        Ok(IngestReport {
            entity_id: entity.id.clone(),
            label: config.label.clone(),
            graph_stored: true,
            vector_stored,
            relationships_written,
            warnings,
        })
    }

    /// Upsert semantics — identical algorithm to `ingest` (distilled §4.2).
    #[instrument(skip(self, entity, config))]
    pub async fn sync(&self, entity: &EntityRecord, config: &NodeableConfig) -> CoordinatorResult<IngestReport> {
        self.ingest(entity, config).await
    }

    #[instrument(skip(self, config))]
    pub async fn remove(&self, entity_id: &str, config: &NodeableConfig) -> CoordinatorResult<bool> {
        let snapshot = self
            .graph
            .get_node(&config.label, entity_id)
            .await
            .map_err(|e| CoordinatorError::GraphWrite(e.to_string()))?;

        if let Some(vector_config) = &config.vector {
            if let Err(err) = self.vector.delete(&vector_config.collection, entity_id).await {
                return Err(CoordinatorError::VectorWrite(err.to_string()));
            }

            if let Err(graph_err) = self.graph.delete_node(&config.label, entity_id).await {
                // Restore the vector point by re-deriving it from the snapshotted
                // node, since the vector store exposes no get-by-id to recover
                // the literal pre-delete point.
                let restored = match &snapshot {
                    Some(row) => self.restore_vector_point(entity_id, vector_config, row).await,
                    None => Ok(()),
                };
                if let Err(restore_err) = restored {
                    error!(
                        target: "coordinator",
                        entity_id, label = %config.label,
                        graph_error = %graph_err,
                        compensation_error = %restore_err,
                        "compensation failed: data inconsistent across stores"
                    );
                    return Err(CoordinatorError::DataConsistency {
                        graph_error: graph_err.to_string(),
                        compensation_error: restore_err.to_string(),
                    });
                }
                return Err(CoordinatorError::GraphWrite(graph_err.to_string()));
            }
        } else {
            self.graph
                .delete_node(&config.label, entity_id)
                .await
                .map_err(|e| CoordinatorError::GraphWrite(e.to_string()))?;
        }

        Ok(true)
    }

    async fn restore_vector_point(
        &self,
        entity_id: &str,
        vector_config: &raqe_models::VectorConfig,
        snapshot: &BTreeMap<String, Value>,
    ) -> Result<(), String> {
        let text = normalize_embed_text(snapshot, &vector_config.embed_fields);
        let vector = self.embedder.embed(&text).await.map_err(|e| e.to_string())?;
        let payload = project_json(snapshot, &vector_config.metadata_fields);
        self.vector
            .upsert(&vector_config.collection, vec![VectorPoint { id: entity_id.to_string(), vector, payload }])
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Groups by label, embeds each group in one batch call, and issues bulk
    /// upserts; per-entity failures are isolated, no global rollback.
    #[instrument(skip(self, entities))]
    pub async fn ingest_batch(&self, entities: &[(EntityRecord, NodeableConfig)]) -> BatchReport {
        let mut groups: BTreeMap<String, Vec<&(EntityRecord, NodeableConfig)>> = BTreeMap::new();
        for pair in entities {
            groups.entry(pair.1.label.clone()).or_default().push(pair);
        }

        let mut outcomes = Vec::with_capacity(entities.len());
        for (_label, group) in groups {
            let config = &group[0].1;
            let embeddings: BTreeMap<String, Vec<f32>> = if let Some(vector_config) = &config.vector {
                let texts: Vec<String> = group
                    .iter()
                    .map(|(entity, _)| normalize_embed_text(&entity.attributes, &vector_config.embed_fields))
                    .collect();
                match self.embedder.embed_batch(&texts).await {
                    Ok(vectors) => group
                        .iter()
                        .zip(vectors)
                        .map(|((entity, _), v)| (entity.id.clone(), v))
                        .collect(),
                    Err(err) => {
                        warn!(target: "coordinator", error = %err, "batch embedding failed, falling back to per-entity embed");
                        BTreeMap::new()
                    }
                }
            } else {
                BTreeMap::new()
            };

            for (entity, entity_config) in group {
                let result = self.ingest_with_precomputed(entity, entity_config, embeddings.get(&entity.id)).await;
                outcomes.push(match result {
                    Ok(_) => EntityOutcome { entity_id: entity.id.clone(), success: true, error: None },
                    Err(err) => EntityOutcome { entity_id: entity.id.clone(), success: false, error: Some(err.to_string()) },
                });
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        BatchReport { total: outcomes.len(), succeeded, failed: outcomes.len() - succeeded, outcomes }
    }

    async fn ingest_with_precomputed(
        &self,
        entity: &EntityRecord,
        config: &NodeableConfig,
        precomputed: Option<&Vec<f32>>,
    ) -> CoordinatorResult<IngestReport> {
        match precomputed {
            Some(vector) => self.ingest_with_embedding(entity, config, Some(vector.clone())).await,
            None => self.ingest(entity, config).await,
        }
    }

    async fn ingest_with_embedding(
        &self,
        entity: &EntityRecord,
        config: &NodeableConfig,
        embedding: Option<Vec<f32>>,
    ) -> CoordinatorResult<IngestReport> {
        let mut warnings = Vec::new();
        let node_payload = project(&entity.attributes, &config.properties);
        self.graph
            .create_node(&config.label, &entity.id, node_payload)
            .await
            .map_err(|e| CoordinatorError::GraphWrite(e.to_string()))?;

        let mut relationships_written = 0u32;
        for rel in &config.relationships {
            let Some(fk) = &rel.foreign_key else { continue };
            let Some(value) = entity.attributes.get(fk) else { continue };
            if matches!(value, Value::Null) {
                continue;
            }
            if self
                .graph
                .create_edge(EdgeRef {
                    edge_type: rel.edge_type.clone(),
                    from_label: config.label.clone(),
                    from_id: entity.id.clone(),
                    to_label: rel.target_label.clone(),
                    to_id: value_to_id(value),
                    properties: BTreeMap::new(),
                })
                .await
                .is_ok()
            {
                relationships_written += 1;
            } else {
                warnings.push(format!("failed to write relationship to {}", rel.target_label));
            }
        }

        let mut vector_stored = false;
        if let (Some(vector_config), Some(vector)) = (&config.vector, embedding) {
            let payload = project_json(&entity.attributes, &vector_config.metadata_fields);
            match self
                .vector
                .upsert(&vector_config.collection, vec![VectorPoint { id: entity.id.clone(), vector, payload }])
                .await
            {
                Ok(_) => vector_stored = true,
                Err(vector_err) => {
                    // 5. Compensate: best-effort rollback of the graph-side write.
                    if let Err(compensation_err) = self.graph.delete_node(&config.label, &entity.id).await {
                        error!(
                            target: "coordinator",
                            entity_id = %entity.id,
                            label = %config.label,
                            graph_error = %vector_err,
                            compensation_error = %compensation_err,
                            "compensation failed: data inconsistent across stores"
                        );
                        return Err(CoordinatorError::DataConsistency {
                            graph_error: vector_err.to_string(),
                            compensation_error: compensation_err.to_string(),
                        });
                    }
                    return Err(CoordinatorError::VectorWrite(vector_err.to_string()));
                }
            }
        }

        Ok(IngestReport {
            entity_id: entity.id.clone(),
            label: config.label.clone(),
            graph_stored: true,
            vector_stored,
            relationships_written,
            warnings,
        })
    }

    /// The auto-sync hook: honors per-entity, per-operation sync flags and
    /// dispatches into `ingest`/`sync`/`remove`. Runs with at-least-once
    /// semantics when the host's event source redelivers; idempotent by
    /// construction since every write path is an upsert keyed on id.
    #[instrument(skip(self, event))]
    pub async fn handle_sync_event(&self, event: SyncEvent, flags: &AutoSyncFlags) -> CoordinatorResult<Option<IngestReport>> {
        match event.operation {
            SyncOperation::Create if flags.create => Ok(Some(self.ingest(&event.entity, &event.config).await?)),
            SyncOperation::Update if flags.update => Ok(Some(self.sync(&event.entity, &event.config).await?)),
            SyncOperation::Delete if flags.delete => {
                self.remove(&event.entity.id, &event.config).await?;
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

fn project(attributes: &BTreeMap<String, Value>, properties: &[String]) -> BTreeMap<String, Value> {
    properties
        .iter()
        .filter_map(|p| attributes.get(p).map(|v| (p.clone(), v.clone())))
        .collect()
}

fn project_json(attributes: &BTreeMap<String, Value>, fields: &[String]) -> serde_json::Map<String, Value> {
    fields
        .iter()
        .filter_map(|f| attributes.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}

fn normalize_embed_text(attributes: &BTreeMap<String, Value>, fields: &[String]) -> String {
    fields
        .iter()
        .filter_map(|f| attributes.get(f))
        .filter_map(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn value_to_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raqe_graph::fake::FakeGraphStore;
    use raqe_llm::fake::FakeEmbedder;
    use raqe_models::{RelationshipConfig, SemanticsConfig, VectorConfig};
    use raqe_vector::fake::FakeVectorStore;
    use serde_json::json;

    fn person_config() -> NodeableConfig {
        NodeableConfig {
            label: "Person".to_string(),
            properties: vec!["id".to_string(), "name".to_string(), "bio".to_string(), "team_id".to_string()],
            relationships: vec![RelationshipConfig {
                edge_type: "TEAM".to_string(),
                target_label: "Team".to_string(),
                foreign_key: Some("team_id".to_string()),
                property_map: None,
            }],
            vector: Some(VectorConfig {
                collection: "persons".to_string(),
                embed_fields: vec!["bio".to_string()],
                metadata_fields: vec!["id".to_string()],
            }),
            semantics: SemanticsConfig::default(),
            auto_sync: AutoSyncFlags::default(),
        }
    }

    fn coordinator() -> (Coordinator, Arc<FakeGraphStore>, Arc<FakeVectorStore>) {
        let graph = Arc::new(FakeGraphStore::new());
        let vector = Arc::new(FakeVectorStore::new());
        let embedder = Arc::new(FakeEmbedder::new(8));
        (Coordinator::new(graph.clone(), vector.clone(), embedder), graph, vector)
    }

    #[tokio::test]
    async fn ingest_writes_node_edge_and_vector() {
        let (coordinator, graph, vector) = coordinator();
        let entity = EntityRecord {
            id: "1".to_string(),
            attributes: BTreeMap::from([
                ("id".to_string(), json!("1")),
                ("name".to_string(), json!("Alice")),
                ("bio".to_string(), json!("loves hiking")),
                ("team_id".to_string(), json!("42")),
            ]),
        };
        let report = coordinator.ingest(&entity, &person_config()).await.unwrap();
        assert!(report.graph_stored);
        assert!(report.vector_stored);
        assert_eq!(report.relationships_written, 1);
        assert_eq!(graph.node_count("Person"), 1);
        assert!(vector.exists("persons").await.unwrap());
    }

    #[tokio::test]
    async fn ingest_is_idempotent_under_replay() {
        let (coordinator, graph, _vector) = coordinator();
        let entity = EntityRecord {
            id: "1".to_string(),
            attributes: BTreeMap::from([("id".to_string(), json!("1")), ("name".to_string(), json!("Alice"))]),
        };
        let config = NodeableConfig::stub("Person");
        coordinator.ingest(&entity, &config).await.unwrap();
        coordinator.ingest(&entity, &config).await.unwrap();
        assert_eq!(graph.node_count("Person"), 1);
    }

    #[tokio::test]
    async fn remove_deletes_both_stores() {
        let (coordinator, graph, vector) = coordinator();
        let entity = EntityRecord {
            id: "1".to_string(),
            attributes: BTreeMap::from([
                ("id".to_string(), json!("1")),
                ("bio".to_string(), json!("loves hiking")),
            ]),
        };
        let config = person_config();
        coordinator.ingest(&entity, &config).await.unwrap();
        let removed = coordinator.remove("1", &config).await.unwrap();
        assert!(removed);
        assert_eq!(graph.node_count("Person"), 0);
        let results = vector.search("persons", &[0.0; 8], 5, None).await.unwrap();
        assert!(results.iter().all(|m| m.id != "1"));
    }

    #[tokio::test]
    async fn batch_isolates_per_entity_failures() {
        let (coordinator, _graph, _vector) = coordinator();
        let entities = vec![
            (
                EntityRecord { id: "1".to_string(), attributes: BTreeMap::from([("id".to_string(), json!("1"))]) },
                NodeableConfig::stub("Person"),
            ),
            (
                EntityRecord { id: "2".to_string(), attributes: BTreeMap::from([("id".to_string(), json!("2"))]) },
                NodeableConfig::stub("Person"),
            ),
        ];
        let report = coordinator.ingest_batch(&entities).await;
        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 2);
    }
}
