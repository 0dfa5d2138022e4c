//! Query Generator & Validator: template-first query synthesis, falling
//! back to an LLM prompt assembled from the `ContextBundle`, then a
//! validate/sanitize/retry loop before a query artifact is handed to the
//! Executor.

pub mod patterns;
pub mod templates;
pub mod validator;

use std::sync::Arc;

use raqe_llm::Llm;
use raqe_models::{ContextBundle, QueryArtifact, QueryMetadata};
use tracing::instrument;

use crate::errors::{GenerationError, GenerationResult};
use validator::UNSAFE_WRITE_MARKER;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub allow_write: bool,
    pub max_retries: u32,
    pub temperature: f32,
    pub explain: bool,
    pub complexity_max: u32,
    pub row_limit: u64,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            allow_write: false,
            max_retries: 3,
            temperature: 0.1,
            explain: true,
            complexity_max: 100,
            row_limit: 100,
        }
    }
}

pub struct Generator {
    llm: Arc<dyn Llm>,
}

impl Generator {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    #[instrument(skip(self, context, options))]
    pub async fn generate_query(
        &self,
        question: &str,
        context: &ContextBundle,
        options: &GenerateOptions,
    ) -> GenerationResult<QueryArtifact> {
        if let Some(matched) = templates::detect_template(
            question,
            &context.entity_metadata.entity_configs,
            &context.graph_schema.labels,
            options.row_limit,
        ) {
            let sanitized = validator::sanitize_query(&matched.query_text, options.row_limit);
            return Ok(QueryArtifact {
                query_text: sanitized,
                explanation: format!("Matched the '{}' template.", matched.name),
                confidence: 0.9,
                warnings: Vec::new(),
                metadata: QueryMetadata { template_used: Some(matched.name), retry_count: 0, generation_ms: 0 },
            });
        }

        let mut retry_count = 0u32;
        let mut last_query = String::new();
        let mut last_errors: Vec<String> = Vec::new();
        let mut confidence = 0.7f32;

        loop {
            let prompt = build_prompt(question, context, options, &last_query, &last_errors);
            let raw = self
                .llm
                .complete(&prompt, Some(SYSTEM_PROMPT), options.temperature)
                .await
                .map_err(|e| GenerationError::Generation { retries: retry_count, message: e.to_string() })?;
            let candidate = extract_query(&raw);

            let report = validator::validate_query(&candidate, &context.graph_schema, options.allow_write, options.complexity_max);
            let sanitized = validator::sanitize_query(&candidate, options.row_limit);
            let rereport = if sanitized != candidate {
                validator::validate_query(&sanitized, &context.graph_schema, options.allow_write, options.complexity_max)
            } else {
                report
            };

            if rereport.valid {
                confidence -= 0.05 * rereport.warnings.len() as f32;
                let explanation = if options.explain {
                    self.explain(question, &sanitized).await.unwrap_or_default()
                } else {
                    String::new()
                };
                return Ok(QueryArtifact {
                    query_text: sanitized,
                    explanation,
                    confidence: confidence.clamp(0.0, 1.0),
                    warnings: rereport.warnings,
                    metadata: QueryMetadata { template_used: None, retry_count, generation_ms: 0 },
                });
            }

            let unsafe_write = rereport.errors.iter().any(|e| e.starts_with(UNSAFE_WRITE_MARKER));
            last_errors = rereport.errors;
            last_query = sanitized;
            confidence -= 0.1;

            retry_count += 1;
            if retry_count > options.max_retries {
                if unsafe_write {
                    return Err(GenerationError::UnsafeQuery);
                }
                return Err(GenerationError::Generation {
                    retries: retry_count - 1,
                    message: last_errors.join("; "),
                });
            }
        }
    }

    async fn explain(&self, question: &str, query_text: &str) -> Option<String> {
        let prompt = format!(
            "In one short paragraph, explain in plain language what this graph query answers.\n\nQuestion: {question}\nQuery: {query_text}"
        );
        self.llm.complete(&prompt, None, 0.2).await.ok()
    }
}

const SYSTEM_PROMPT: &str =
    "You translate natural-language questions into a single read-only graph query. Respond with the query only.";

fn build_prompt(question: &str, context: &ContextBundle, options: &GenerateOptions, previous_query: &str, previous_errors: &[String]) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Question: {question}\n\n"));

    prompt.push_str("Known labels, relationships, and properties:\n");
    prompt.push_str(&format!("  labels: {}\n", join_set(&context.graph_schema.labels)));
    prompt.push_str(&format!("  relationships: {}\n", join_set(&context.graph_schema.relationships)));
    prompt.push_str(&format!("  properties: {}\n\n", join_set(&context.graph_schema.properties)));

    if !context.entity_metadata.detected_scopes.is_empty() {
        prompt.push_str("Detected business scopes:\n");
        for (name, scope) in &context.entity_metadata.detected_scopes {
            prompt.push_str(&format!("- {name} on {}", scope.entity));
            if let Some(concept) = &scope.concept {
                prompt.push_str(&format!(" ({concept})"));
            }
            prompt.push('\n');
            for rule in &scope.business_rules {
                prompt.push_str(&format!("  rule: {rule}\n"));
            }
            for example in &scope.examples {
                prompt.push_str(&format!("  example: {example}\n"));
            }
            if let Ok(spec_json) = serde_json::to_string(&scope.spec) {
                prompt.push_str(&format!("  spec: {spec_json}\n"));
            }
        }
        prompt.push('\n');
        if scope_requires_distinct(context) {
            prompt.push_str("At least one detected scope requires DISTINCT results.\n\n");
        }
    } else {
        if !context.similar.is_empty() {
            prompt.push_str("Similar past questions and their queries:\n");
            for record in context.similar.iter().take(3) {
                prompt.push_str(&format!("- Q: {} -> {}\n", record.question, record.query));
            }
            prompt.push('\n');
        }
        if !context.examples_by_label.is_empty() {
            prompt.push_str("Example rows per label:\n");
            for (label, rows) in &context.examples_by_label {
                prompt.push_str(&format!("- {label}: {} sample row(s)\n", rows.len()));
            }
            prompt.push('\n');
        }
    }

    prompt.push_str(&patterns::render_for_prompt());
    prompt.push('\n');

    if options.allow_write {
        prompt.push_str("Write operations are permitted for this request.\n");
    } else {
        prompt.push_str("Only read-only queries are permitted. Never emit CREATE, MERGE, SET, DELETE, REMOVE, or DETACH.\n");
    }
    prompt.push_str(&format!("The result set must be capped with a LIMIT of at most {}.\n", options.row_limit));

    if !previous_query.is_empty() {
        prompt.push_str(&format!(
            "\nThe previous attempt was rejected:\nQuery: {previous_query}\nProblems: {}\nProduce a corrected query.\n",
            previous_errors.join("; ")
        ));
    }

    prompt
}

fn scope_requires_distinct(context: &ContextBundle) -> bool {
    context.entity_metadata.detected_scopes.values().any(|scope| {
        matches!(&scope.spec, raqe_models::ScopeSpec::RelationshipTraversal { distinct: true, .. })
    })
}

fn join_set(set: &std::collections::BTreeSet<String>) -> String {
    if set.is_empty() {
        "(unknown)".to_string()
    } else {
        set.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Strips Markdown code fences and leading commentary the LLM may wrap the
/// query in, leaving the bare query text.
fn extract_query(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let after_fence = after_fence.strip_prefix("cypher").unwrap_or(after_fence);
        let after_fence = after_fence.trim_start_matches('\n');
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim().to_string();
        }
        return after_fence.trim().to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use raqe_llm::fake::FakeLlm;
    use raqe_models::GraphSchema;
    use std::collections::BTreeSet;

    fn schema() -> GraphSchema {
        GraphSchema {
            labels: BTreeSet::from(["Person".to_string()]),
            relationships: BTreeSet::new(),
            properties: BTreeSet::from(["id".to_string(), "name".to_string()]),
        }
    }

    #[tokio::test]
    async fn template_match_short_circuits_llm() {
        let llm = Arc::new(FakeLlm::new(vec!["should not be used".to_string()]));
        let generator = Generator::new(llm);
        let mut context = ContextBundle::default();
        context.question = "list all persons".to_string();
        context.graph_schema = schema();
        let mut configs = std::collections::BTreeMap::new();
        configs.insert(
            "Person".to_string(),
            raqe_models::NodeableConfig::stub("Person"),
        );
        context.entity_metadata.entity_configs = configs;

        let artifact = generator
            .generate_query("list all persons", &context, &GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(artifact.metadata.template_used.as_deref(), Some("list_all"));
        assert!(artifact.query_text.contains("LIMIT"));
    }

    #[tokio::test]
    async fn llm_path_validates_and_sanitizes() {
        let llm = Arc::new(FakeLlm::new(vec!["MATCH (n:Person) RETURN n".to_string()]));
        let generator = Generator::new(llm);
        let mut context = ContextBundle::default();
        context.graph_schema = schema();

        let artifact = generator
            .generate_query("who are the people named Alice", &context, &GenerateOptions { explain: false, ..Default::default() })
            .await
            .unwrap();
        assert!(artifact.query_text.contains("LIMIT 100"));
        assert_eq!(artifact.metadata.retry_count, 0);
    }

    #[tokio::test]
    async fn unsafe_write_retries_before_failing() {
        let options = GenerateOptions::default();
        let script = vec!["MATCH (n:Person) DETACH DELETE n".to_string(); options.max_retries as usize + 1];
        let llm = Arc::new(FakeLlm::new(script));
        let generator = Generator::new(llm.clone());
        let mut context = ContextBundle::default();
        context.graph_schema = schema();

        let result = generator.generate_query("remove alice", &context, &options).await;
        assert!(matches!(result, Err(GenerationError::UnsafeQuery)));
        assert!(llm.call_count() > 1, "expected the generator to retry before giving up, got {} call(s)", llm.call_count());
    }

    #[tokio::test]
    async fn retries_exhausted_surfaces_generation_error() {
        let llm = Arc::new(FakeLlm::new(vec![
            "MATCH (n) MATCH (m) MATCH (x) RETURN n".to_string(),
            "MATCH (n) MATCH (m) MATCH (x) RETURN n".to_string(),
            "MATCH (n) MATCH (m) MATCH (x) RETURN n".to_string(),
            "MATCH (n) MATCH (m) MATCH (x) RETURN n".to_string(),
        ]));
        let generator = Generator::new(llm);
        let mut context = ContextBundle::default();
        context.graph_schema = schema();
        let options = GenerateOptions { max_retries: 2, complexity_max: 10, explain: false, ..Default::default() };

        let result = generator.generate_query("complex question", &context, &options).await;
        assert!(matches!(result, Err(GenerationError::Generation { .. })));
    }

    #[test]
    fn extract_query_strips_code_fence() {
        let raw = "```cypher\nMATCH (n) RETURN n\n```";
        assert_eq!(extract_query(raw), "MATCH (n) RETURN n");
    }
}
