//! Semantic Context Retriever (RAG): assembles a `ContextBundle` for a
//! question from three independent, partial-failure-tolerant sources —
//! grounded on `decision_engine/src/services/memory_search.rs`'s
//! orchestration shape, adapted so the bundle is assembled rather than
//! reranked from two retrieval strategies.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use raqe_graph::GraphStore;
use raqe_llm::Embedder;
use raqe_models::{is_valid_identifier, DetectedScope, EntityMetadataBundle, GraphSchema, NodeableConfig, SimilarRecord};
use raqe_vector::VectorStore;
use regex::Regex;
use serde_json::Value;
use tracing::instrument;

use crate::errors::{RetrievalError, RetrievalResult};

const DEFAULT_HISTORY_COLLECTION: &str = "raqe_query_history";

#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    pub k: usize,
    pub similarity_threshold: f32,
    pub examples_per_label: u64,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self { k: 5, similarity_threshold: 0.75, examples_per_label: 3 }
    }
}

pub struct Retriever {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    history_collection: String,
}

impl Retriever {
    pub fn new(graph: Arc<dyn GraphStore>, vector: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { graph, vector, embedder, history_collection: DEFAULT_HISTORY_COLLECTION.to_string() }
    }

    pub fn with_history_collection(mut self, collection: impl Into<String>) -> Self {
        self.history_collection = collection.into();
        self
    }

    #[instrument(skip(self, configs))]
    pub async fn retrieve_context(
        &self,
        question: &str,
        configs: &BTreeMap<String, NodeableConfig>,
        options: &RetrieveOptions,
    ) -> RetrievalResult<raqe_models::ContextBundle> {
        if question.trim().is_empty() {
            return Err(RetrievalError::InvalidInput("question is empty or whitespace".to_string()));
        }

        let mut errors = Vec::new();

        let question_embedding = match self.embedder.embed(question).await {
            Ok(vector) => vector,
            Err(err) => {
                errors.push(format!("embedding failed: {err}"));
                Vec::new()
            }
        };

        let similar = if question_embedding.is_empty() {
            Vec::new()
        } else {
            match self.search_similar_with_embedding(&question_embedding, options.k, options.similarity_threshold).await {
                Ok(records) => records,
                Err(err) => {
                    errors.push(format!("similarity search failed: {err}"));
                    Vec::new()
                }
            }
        };

        let graph_schema = match self.graph.get_schema().await {
            Ok(schema) => schema,
            Err(err) => {
                errors.push(format!("schema fetch failed: {err}"));
                GraphSchema::default()
            }
        };

        let mut examples_by_label = BTreeMap::new();
        for label in &graph_schema.labels {
            match self.graph.sample_rows(label, options.examples_per_label).await {
                Ok(rows) => {
                    let values: Vec<Value> = rows.into_iter().map(|row| Value::Object(row.into_iter().collect())).collect();
                    examples_by_label.insert(label.clone(), values);
                }
                Err(err) => errors.push(format!("example rows for '{label}' failed: {err}")),
            }
        }

        let entity_metadata = detect_entity_metadata(question, configs);

        let mut graph_schema = graph_schema;
        discard_invalid_identifiers(&mut graph_schema, &mut errors);

        Ok(raqe_models::ContextBundle {
            question: question.to_string(),
            question_embedding,
            similar,
            graph_schema,
            examples_by_label,
            entity_metadata,
            errors,
        })
    }

    /// Standalone similarity search over the fixed past-queries collection
    /// (distilled §6, `search_similar`).
    #[instrument(skip(self))]
    pub async fn search_similar(&self, question: &str, k: usize) -> RetrievalResult<Vec<SimilarRecord>> {
        if question.trim().is_empty() {
            return Err(RetrievalError::InvalidInput("question is empty or whitespace".to_string()));
        }
        let embedding = self
            .embedder
            .embed(question)
            .await
            .map_err(|e| RetrievalError::InvalidInput(format!("embedding failed: {e}")))?;
        self.search_similar_with_embedding(&embedding, k, 0.0)
            .await
            .map_err(|e| RetrievalError::InvalidInput(e.to_string()))
    }

    async fn search_similar_with_embedding(
        &self,
        embedding: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SimilarRecord>, raqe_vector::VectorError> {
        let matches = self.vector.search(&self.history_collection, embedding, k, None).await?;
        let mut records: Vec<SimilarRecord> = matches
            .into_iter()
            .filter(|m| m.score >= threshold)
            .filter_map(|m| {
                let question = m.payload.get("question")?.as_str()?.to_string();
                let query = m.payload.get("query")?.as_str()?.to_string();
                Some(SimilarRecord { question, query, score: m.score, metadata: Value::Object(m.payload) })
            })
            .collect();
        records.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(records)
    }

    #[instrument(skip(self))]
    pub async fn get_schema(&self) -> RetrievalResult<GraphSchema> {
        self.graph.get_schema().await.map_err(|e| RetrievalError::InvalidInput(e.to_string()))
    }

    /// `get_example_entities` (distilled §6): validates every requested
    /// label before issuing a single read to the store, so a malicious
    /// identifier never reaches the graph store (scenario S2).
    #[instrument(skip(self))]
    pub async fn get_example_entities(
        &self,
        labels: &[String],
        per_label: u64,
    ) -> RetrievalResult<BTreeMap<String, Vec<Value>>> {
        for label in labels {
            if !is_valid_identifier(label) {
                return Err(RetrievalError::InjectionDefense(label.clone()));
            }
        }

        let mut out = BTreeMap::new();
        for label in labels {
            let rows = self.graph.sample_rows(label, per_label).await.map_err(|e| RetrievalError::InvalidInput(e.to_string()))?;
            let values: Vec<Value> = rows.into_iter().map(|row| Value::Object(row.into_iter().collect())).collect();
            out.insert(label.clone(), values);
        }
        Ok(out)
    }

    #[instrument(skip(self, configs))]
    pub fn get_entity_metadata(&self, question: &str, configs: &BTreeMap<String, NodeableConfig>) -> EntityMetadataBundle {
        detect_entity_metadata(question, configs)
    }
}

fn discard_invalid_identifiers(schema: &mut GraphSchema, errors: &mut Vec<String>) {
    let invalid_labels: Vec<String> = schema.labels.iter().filter(|l| !is_valid_identifier(l)).cloned().collect();
    for label in invalid_labels {
        schema.labels.remove(&label);
        errors.push(format!("discarded invalid label identifier: {label}"));
    }
    let invalid_rels: Vec<String> = schema.relationships.iter().filter(|r| !is_valid_identifier(r)).cloned().collect();
    for rel in invalid_rels {
        schema.relationships.remove(&rel);
        errors.push(format!("discarded invalid relationship identifier: {rel}"));
    }
    let invalid_props: Vec<String> = schema.properties.iter().filter(|p| !is_valid_identifier(p)).cloned().collect();
    for prop in invalid_props {
        schema.properties.remove(&prop);
        errors.push(format!("discarded invalid property identifier: {prop}"));
    }
}

fn whole_word_match(question_lower: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    let variants = [term.to_lowercase(), term.to_lowercase().replace('_', " ")];
    variants.iter().any(|variant| {
        Regex::new(&format!(r"\b{}\b", regex::escape(variant)))
            .map(|re| re.is_match(question_lower))
            .unwrap_or(false)
    })
}

fn detect_entity_metadata(question: &str, configs: &BTreeMap<String, NodeableConfig>) -> EntityMetadataBundle {
    let question_lower = question.to_lowercase();
    let mut detected_entities = BTreeSet::new();
    let mut entity_configs = BTreeMap::new();
    let mut detected_scopes = BTreeMap::new();

    for (label, config) in configs {
        let label_hit = whole_word_match(&question_lower, label)
            || config.semantics.aliases.iter().any(|alias| whole_word_match(&question_lower, alias));

        if label_hit {
            detected_entities.insert(label.clone());
            entity_configs.insert(label.clone(), config.clone());
        }

        for (scope_name, scope_meta) in &config.semantics.scopes {
            if whole_word_match(&question_lower, scope_name) {
                detected_entities.insert(label.clone());
                entity_configs.insert(label.clone(), config.clone());
                detected_scopes.insert(
                    scope_name.clone(),
                    DetectedScope {
                        entity: label.clone(),
                        spec: scope_meta.spec.clone(),
                        concept: scope_meta.concept.clone(),
                        business_rules: scope_meta.business_rules.clone(),
                        examples: scope_meta.examples.clone(),
                    },
                );
            }
        }
    }

    EntityMetadataBundle { detected_entities, entity_configs, detected_scopes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raqe_graph::fake::FakeGraphStore;
    use raqe_llm::fake::FakeEmbedder;
    use raqe_models::{AutoSyncFlags, ComparisonOperator, ScopeMeta, ScopeSpec, SemanticsConfig};
    use raqe_vector::fake::FakeVectorStore;
    use std::collections::BTreeMap as Map;

    fn retriever() -> Retriever {
        Retriever::new(Arc::new(FakeGraphStore::new()), Arc::new(FakeVectorStore::new()), Arc::new(FakeEmbedder::new(8)))
    }

    fn volunteers_config() -> NodeableConfig {
        let mut scopes = Map::new();
        scopes.insert(
            "volunteers".to_string(),
            ScopeMeta {
                spec: ScopeSpec::PropertyFilter {
                    property: "role_type".to_string(),
                    operator: ComparisonOperator::Equals,
                    value: serde_json::json!("volunteer"),
                },
                concept: Some("people donating their time".to_string()),
                business_rules: vec![],
                examples: vec![],
            },
        );
        NodeableConfig {
            label: "Person".to_string(),
            properties: vec!["id".to_string()],
            relationships: vec![],
            vector: None,
            semantics: SemanticsConfig { aliases: vec!["people".to_string()], description: None, scopes, property_docs: Map::new() },
            auto_sync: AutoSyncFlags::default(),
        }
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let retriever = retriever();
        let err = retriever.retrieve_context("   ", &Map::new(), &RetrieveOptions::default()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn partial_embedder_failure_is_absorbed_into_errors() {
        let graph = Arc::new(FakeGraphStore::new());
        graph.seed_node("Team", "1", raqe_graph::Row::new());
        let vector = Arc::new(FakeVectorStore::new());
        let embedder = Arc::new(FakeEmbedder::new(8));
        *embedder.fail_next.lock() = true;
        let retriever = Retriever::new(graph, vector, embedder);

        let bundle = retriever
            .retrieve_context("show active teams", &Map::new(), &RetrieveOptions::default())
            .await
            .unwrap();

        assert!(bundle.similar.is_empty());
        assert!(bundle.graph_schema.labels.contains("Team"));
        assert!(bundle.errors.iter().any(|e| e.contains("embedding failed")));
    }

    #[tokio::test]
    async fn detects_scope_and_owning_entity() {
        let retriever = retriever();
        let mut configs = Map::new();
        configs.insert("Person".to_string(), volunteers_config());

        let bundle = retriever
            .retrieve_context("How many volunteers do we have?", &configs, &RetrieveOptions::default())
            .await
            .unwrap();

        assert!(bundle.entity_metadata.detected_entities.contains("Person"));
        assert!(bundle.entity_metadata.detected_scopes.contains_key("volunteers"));
    }

    #[tokio::test]
    async fn get_example_entities_rejects_malicious_identifier() {
        let retriever = retriever();
        let err = retriever
            .get_example_entities(&["Team\"; DROP TABLE //".to_string()], 3)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::InjectionDefense(_)));
    }
}
