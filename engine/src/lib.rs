//! The Retrieval-Augmented Query Engine: wires Auto-Discovery, the
//! Dual-Store Coordinator, the Context Retriever, the Query Generator &
//! Validator, the Executor, and the Response Generator behind one
//! dependency-injected [`Engine`].

pub mod coordinator;
pub mod discovery;
pub mod errors;
pub mod executor;
pub mod generator;
pub mod response;
pub mod retriever;

use std::collections::BTreeMap;
use std::sync::Arc;

use raqe_graph::GraphStore;
use raqe_llm::{Embedder, Llm};
use raqe_models::{
    BatchReport, ContextBundle, EntityMetadataBundle, ExecutionResult, GraphSchema, IngestReport, NodeableConfig,
    PaginatedResult, QueryArtifact, ResponseBundle, SimilarRecord, ValidationReport,
};
use raqe_vector::VectorStore;
use tracing::instrument;

use coordinator::{Coordinator, EntityRecord, SyncEvent};
use discovery::{AutoDiscovery, HostEntityRegistry};
use errors::EngineResult;
use executor::{ExecuteOptions, Executor};
use generator::{validator, GenerateOptions, Generator};
use response::{ResponseGenerator, ResponseOptions};
use retriever::{RetrieveOptions, Retriever};

/// A process-lifetime instance, constructed once and shared across
/// concurrent requests. Holds no per-request mutable state; every method
/// below is safe to call concurrently.
pub struct Engine {
    discovery: AutoDiscovery,
    registry: HostEntityRegistry,
    coordinator: Coordinator,
    retriever: Retriever,
    generator: Generator,
    executor: Executor,
    response: ResponseGenerator,
}

impl Engine {
    pub fn new(
        discovery: AutoDiscovery,
        registry: HostEntityRegistry,
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn Llm>,
    ) -> Self {
        Self {
            discovery,
            registry,
            coordinator: Coordinator::new(graph.clone(), vector.clone(), embedder.clone()),
            retriever: Retriever::new(graph.clone(), vector, embedder),
            generator: Generator::new(llm.clone()),
            executor: Executor::new(graph),
            response: ResponseGenerator::new(llm),
        }
    }

    /// Resolves every registered label's `NodeableConfig` through
    /// Auto-Discovery. Cheap after the first call per label: results are
    /// cached internally.
    pub fn entity_configs(&self) -> EngineResult<BTreeMap<String, NodeableConfig>> {
        let mut configs = BTreeMap::new();
        for label in self.registry.labels() {
            let config = self.discovery.discover(&self.registry, label)?;
            configs.insert(label.clone(), config);
        }
        Ok(configs)
    }

    #[instrument(skip(self, entity, config))]
    pub async fn ingest(&self, entity: &EntityRecord, config: &NodeableConfig) -> EngineResult<IngestReport> {
        Ok(self.coordinator.ingest(entity, config).await?)
    }

    #[instrument(skip(self, entities))]
    pub async fn ingest_batch(&self, entities: &[(EntityRecord, NodeableConfig)]) -> BatchReport {
        self.coordinator.ingest_batch(entities).await
    }

    #[instrument(skip(self, entity, config))]
    pub async fn sync(&self, entity: &EntityRecord, config: &NodeableConfig) -> EngineResult<IngestReport> {
        Ok(self.coordinator.sync(entity, config).await?)
    }

    #[instrument(skip(self, config))]
    pub async fn remove(&self, entity_id: &str, config: &NodeableConfig) -> EngineResult<bool> {
        Ok(self.coordinator.remove(entity_id, config).await?)
    }

    #[instrument(skip(self, event, flags))]
    pub async fn handle_sync_event(&self, event: SyncEvent, flags: &raqe_models::AutoSyncFlags) -> EngineResult<Option<IngestReport>> {
        Ok(self.coordinator.handle_sync_event(event, flags).await?)
    }

    #[instrument(skip(self, options))]
    pub async fn retrieve_context(&self, question: &str, options: &RetrieveOptions) -> EngineResult<ContextBundle> {
        let configs = self.entity_configs()?;
        Ok(self.retriever.retrieve_context(question, &configs, options).await?)
    }

    #[instrument(skip(self))]
    pub async fn search_similar(&self, question: &str, k: usize) -> EngineResult<Vec<SimilarRecord>> {
        Ok(self.retriever.search_similar(question, k).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_schema(&self) -> EngineResult<GraphSchema> {
        Ok(self.retriever.get_schema().await?)
    }

    #[instrument(skip(self))]
    pub async fn get_example_entities(&self, labels: &[String], per_label: u64) -> EngineResult<BTreeMap<String, Vec<serde_json::Value>>> {
        Ok(self.retriever.get_example_entities(labels, per_label).await?)
    }

    #[instrument(skip(self))]
    pub fn get_entity_metadata(&self, question: &str) -> EngineResult<EntityMetadataBundle> {
        let configs = self.entity_configs()?;
        Ok(self.retriever.get_entity_metadata(question, &configs))
    }

    #[instrument(skip(self, context, options))]
    pub async fn generate_query(&self, question: &str, context: &ContextBundle, options: &GenerateOptions) -> EngineResult<QueryArtifact> {
        Ok(self.generator.generate_query(question, context, options).await?)
    }

    pub fn validate_query(&self, query_text: &str, schema: &GraphSchema, allow_write: bool, complexity_max: u32) -> ValidationReport {
        validator::validate_query(query_text, schema, allow_write, complexity_max)
    }

    pub fn sanitize_query(&self, query_text: &str, default_limit: u64) -> String {
        validator::sanitize_query(query_text, default_limit)
    }

    #[instrument(skip(self, params, options))]
    pub async fn execute_query(&self, query_text: &str, params: &raqe_graph::QueryParams, options: &ExecuteOptions) -> EngineResult<ExecutionResult> {
        Ok(self.executor.execute(query_text, params, options).await?)
    }

    #[instrument(skip(self, params, options))]
    pub async fn execute_count(&self, query_text: &str, params: &raqe_graph::QueryParams, options: &ExecuteOptions) -> EngineResult<u64> {
        Ok(self.executor.execute_count(query_text, params, options).await?)
    }

    #[instrument(skip(self, params, options))]
    pub async fn execute_paginated(
        &self,
        query_text: &str,
        page: u64,
        per_page: u64,
        params: &raqe_graph::QueryParams,
        options: &ExecuteOptions,
    ) -> EngineResult<PaginatedResult> {
        Ok(self.executor.execute_paginated(query_text, page, per_page, params, options).await?)
    }

    #[instrument(skip(self, params))]
    pub async fn explain_query(&self, query_text: &str, params: &raqe_graph::QueryParams) -> EngineResult<raqe_models::ExplainTree> {
        Ok(self.executor.explain(query_text, params).await?)
    }

    pub async fn test_query(&self, query_text: &str) -> bool {
        self.executor.test(query_text).await
    }

    #[instrument(skip(self, result, options))]
    pub async fn generate_response(
        &self,
        question: &str,
        result: &ExecutionResult,
        query_text: &str,
        options: &ResponseOptions,
    ) -> ResponseBundle {
        self.response.generate_response(question, result, query_text, options).await
    }

    /// End-to-end pipeline: retrieve context, generate a query, execute it,
    /// and narrate the result. Any stage's failure is translated into a
    /// friendly `ResponseBundle` rather than propagated as an error, so a
    /// caller always gets something to show the user.
    #[instrument(skip(self, retrieve_options, generate_options, execute_options, response_options))]
    pub async fn answer_question(
        &self,
        question: &str,
        retrieve_options: &RetrieveOptions,
        generate_options: &GenerateOptions,
        execute_options: &ExecuteOptions,
        response_options: &ResponseOptions,
    ) -> ResponseBundle {
        let context = match self.retrieve_context(question, retrieve_options).await {
            Ok(context) => context,
            Err(err) => return self.response.generate_error_response(&err.to_string(), response_options.include_details),
        };

        let artifact = match self.generate_query(question, &context, generate_options).await {
            Ok(artifact) => artifact,
            Err(err) => return self.response.generate_error_response(&err.to_string(), response_options.include_details),
        };

        let result = match self
            .execute_query(&artifact.query_text, &raqe_graph::QueryParams::new(), execute_options)
            .await
        {
            Ok(result) => result,
            Err(err) => return self.response.generate_error_response(&err.to_string(), response_options.include_details),
        };

        self.generate_response(question, &result, &artifact.query_text, response_options).await
    }
}
