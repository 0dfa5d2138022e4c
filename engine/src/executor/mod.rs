//! Executor: runs a validated query against the graph store under a
//! timeout, row cap, and read-only guard, and shapes the response into
//! table/graph/json form.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use raqe_graph::{GraphStore, QueryParams, Row};
use raqe_models::{
    ExecutionMetadata, ExecutionResult, ExecutionStats, ExplainTree, GraphEdge, GraphNode, Pagination, PaginatedResult,
    ResultData, ResultFormat,
};
use regex::Regex;
use tracing::instrument;

use crate::errors::{ExecutionError, ExecResult};
use crate::generator::validator;

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub timeout_secs: u64,
    pub row_limit: u64,
    pub read_only: bool,
    pub format: ResultFormat,
    pub include_stats: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            row_limit: 100,
            read_only: true,
            format: ResultFormat::Table,
            include_stats: true,
        }
    }
}

const MAX_TIMEOUT_SECS: u64 = 120;

static LIMIT_OR_SKIP_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*\b(skip|limit)\s+\d+\b").unwrap());
static RETURN_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\breturn\b").unwrap());
static TRAVERSAL_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\[.*?\]-").unwrap());

pub struct Executor {
    graph: Arc<dyn GraphStore>,
}

impl Executor {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    fn guard(&self, query_text: &str, options: &ExecuteOptions) -> ExecResult<String> {
        if options.read_only && validator::contains_write_keyword(query_text) {
            return Err(ExecutionError::ReadOnlyViolation);
        }
        Ok(validator::sanitize_query(query_text, options.row_limit))
    }

    #[instrument(skip(self, params, options))]
    pub async fn execute(&self, query_text: &str, params: &QueryParams, options: &ExecuteOptions) -> ExecResult<ExecutionResult> {
        let sanitized = self.guard(query_text, options)?;
        let timeout = Duration::from_secs(options.timeout_secs.min(MAX_TIMEOUT_SECS));
        let started = Instant::now();

        let rows = match tokio::time::timeout(timeout, self.graph.query(&sanitized, params)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(err)) => return Err(ExecutionError::Execution(err.to_string())),
            Err(_) => return Err(ExecutionError::Timeout(timeout.as_secs())),
        };
        let execution_ms = started.elapsed().as_millis() as u64;

        let data = shape_result(rows, options.format, &sanitized);
        let stats = ExecutionStats {
            execution_ms,
            rows_returned: data.row_count() as u64,
            rows_scanned: None,
            database_hits: None,
        };
        Ok(ExecutionResult {
            success: true,
            data,
            stats: if options.include_stats { stats } else { ExecutionStats::default() },
            metadata: ExecutionMetadata { format: options.format, read_only: options.read_only },
            errors: Vec::new(),
        })
    }

    #[instrument(skip(self, params, options))]
    pub async fn execute_count(&self, query_text: &str, params: &QueryParams, options: &ExecuteOptions) -> ExecResult<u64> {
        let sanitized = self.guard(query_text, options)?;
        let count_query = to_count_query(&sanitized);
        let timeout = Duration::from_secs(options.timeout_secs.min(MAX_TIMEOUT_SECS));

        let rows = match tokio::time::timeout(timeout, self.graph.query(&count_query, params)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(err)) => return Err(ExecutionError::Execution(err.to_string())),
            Err(_) => return Err(ExecutionError::Timeout(timeout.as_secs())),
        };

        Ok(rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(|v| v.as_u64())
            .unwrap_or(rows.len() as u64))
    }

    #[instrument(skip(self, params, options))]
    pub async fn execute_paginated(
        &self,
        query_text: &str,
        page: u64,
        per_page: u64,
        params: &QueryParams,
        options: &ExecuteOptions,
    ) -> ExecResult<PaginatedResult> {
        let sanitized = self.guard(query_text, options)?;
        let page = page.max(1);
        let per_page = per_page.max(1);
        let skip = (page - 1) * per_page;

        let total = self.execute_count(&sanitized, params, options).await?;

        let paged_query = format!("{} SKIP {skip} LIMIT {per_page}", strip_limit_and_skip(&sanitized));
        let timeout = Duration::from_secs(options.timeout_secs.min(MAX_TIMEOUT_SECS));
        let started = Instant::now();

        let rows = match tokio::time::timeout(timeout, self.graph.query(&paged_query, params)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(err)) => return Err(ExecutionError::Execution(err.to_string())),
            Err(_) => return Err(ExecutionError::Timeout(timeout.as_secs())),
        };
        let execution_ms = started.elapsed().as_millis() as u64;

        // The store may not honor SKIP/LIMIT (e.g. an in-memory fake); slice
        // defensively so pagination is correct regardless of pushdown support.
        let page_rows: Vec<Row> = rows.into_iter().skip(skip as usize).take(per_page as usize).collect();
        let rows_returned = page_rows.len() as u64;
        let data = shape_result(page_rows, options.format, &sanitized);

        Ok(PaginatedResult {
            data,
            pagination: Pagination::new(page, per_page, total),
            stats: ExecutionStats { execution_ms, rows_returned, rows_scanned: None, database_hits: None },
        })
    }

    #[instrument(skip(self, params))]
    pub async fn explain(&self, query_text: &str, params: &QueryParams) -> ExecResult<ExplainTree> {
        let rows = self
            .graph
            .query(&format!("EXPLAIN {query_text}"), params)
            .await
            .map_err(|err| ExecutionError::Execution(err.to_string()))?;
        Ok(ExplainTree {
            operator: "scan".to_string(),
            details: serde_json::json!({ "query": query_text, "estimated_rows": rows.len() }),
            children: Vec::new(),
        })
    }

    /// Validates that `query_text` can be executed at all (read-only guard,
    /// zero-row fetch) without surfacing its results.
    #[instrument(skip(self))]
    pub async fn test(&self, query_text: &str) -> bool {
        if validator::contains_write_keyword(query_text) {
            return false;
        }
        let probe = format!("{} LIMIT 0", strip_limit_and_skip(query_text));
        self.graph.query(&probe, &QueryParams::new()).await.is_ok()
    }
}

fn strip_limit_and_skip(query: &str) -> String {
    LIMIT_OR_SKIP_CLAUSE.replace_all(query.trim_end().trim_end_matches(';'), "").trim().to_string()
}

fn to_count_query(query: &str) -> String {
    let stripped = strip_limit_and_skip(query);
    match RETURN_CLAUSE.find(&stripped) {
        Some(m) => format!("{} RETURN count(*) AS total", &stripped[..m.start()]),
        None => format!("{stripped} RETURN count(*) AS total"),
    }
}

fn shape_result(rows: Vec<Row>, format: ResultFormat, query_text: &str) -> ResultData {
    match format {
        ResultFormat::Table => ResultData::Table { rows },
        ResultFormat::Json => ResultData::Json { value: serde_json::to_value(&rows).unwrap_or(serde_json::Value::Null) },
        ResultFormat::Graph => {
            if TRAVERSAL_HINT.is_match(query_text) {
                shape_as_graph(rows)
            } else {
                ResultData::Table { rows }
            }
        }
    }
}

/// Extracts nodes (and, where present, edges) out of flat rows by
/// convention: a row contributes a node for every column whose value is a
/// JSON object carrying an `id` field, and an edge for every column whose
/// value carries both `edge_type`/`from_id`/`to_id`.
fn shape_as_graph(rows: Vec<Row>) -> ResultData {
    let mut nodes: BTreeMap<String, GraphNode> = BTreeMap::new();
    let mut edges: BTreeMap<String, GraphEdge> = BTreeMap::new();

    for row in rows {
        for value in row.values() {
            let Some(obj) = value.as_object() else { continue };
            if let (Some(edge_type), Some(from_id), Some(to_id)) = (
                obj.get("edge_type").and_then(|v| v.as_str()),
                obj.get("from_id").and_then(|v| v.as_str()),
                obj.get("to_id").and_then(|v| v.as_str()),
            ) {
                let id = obj.get("id").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| format!("{from_id}->{to_id}"));
                edges.entry(id.clone()).or_insert(GraphEdge {
                    id,
                    edge_type: edge_type.to_string(),
                    from_id: from_id.to_string(),
                    to_id: to_id.to_string(),
                    properties: obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                });
            } else if let Some(id) = obj.get("id").and_then(|v| v.as_str()) {
                let label = obj.get("label").and_then(|v| v.as_str()).unwrap_or("").to_string();
                nodes.entry(id.to_string()).or_insert(GraphNode {
                    id: id.to_string(),
                    label,
                    properties: obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                });
            }
        }
    }

    ResultData::Graph { nodes: nodes.into_values().collect(), edges: edges.into_values().collect() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raqe_graph::fake::FakeGraphStore;

    fn seeded_store(count: usize) -> Arc<FakeGraphStore> {
        let store = Arc::new(FakeGraphStore::new());
        for i in 0..count {
            store.seed_node("Person", &i.to_string(), Row::new());
        }
        store
    }

    #[tokio::test]
    async fn read_only_rejects_write_keyword() {
        let store = seeded_store(1);
        let executor = Executor::new(store);
        let result = executor.execute("MATCH (n) DETACH DELETE n", &QueryParams::new(), &ExecuteOptions::default()).await;
        assert!(matches!(result, Err(ExecutionError::ReadOnlyViolation)));
    }

    #[tokio::test]
    async fn execute_injects_row_cap_when_missing() {
        let store = seeded_store(3);
        let executor = Executor::new(store.clone());
        let result = executor.execute("MATCH (n:Person) RETURN n", &QueryParams::new(), &ExecuteOptions::default()).await.unwrap();
        assert_eq!(result.data.row_count(), 3);
        let recorded = store.recorded_queries();
        assert!(recorded.last().unwrap().0.contains("LIMIT"));
    }

    #[tokio::test]
    async fn pagination_returns_correct_page_and_total() {
        let store = seeded_store(57);
        let executor = Executor::new(store);
        let paginated = executor
            .execute_paginated("MATCH (n:Person) RETURN n", 3, 20, &QueryParams::new(), &ExecuteOptions::default())
            .await
            .unwrap();
        assert_eq!(paginated.pagination.total, 57);
        assert_eq!(paginated.pagination.last_page, 3);
        assert_eq!(paginated.data.row_count(), 17);
    }

    #[tokio::test]
    async fn test_rejects_write_query_without_executing() {
        let store = seeded_store(1);
        let executor = Executor::new(store);
        assert!(!executor.test("MATCH (n) DELETE n").await);
    }
}
