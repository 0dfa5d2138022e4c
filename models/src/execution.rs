//! Output of the Executor (§3.5 / §4.5).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub data: ResultData,
    pub stats: ExecutionStats,
    pub metadata: ExecutionMetadata,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ResultData {
    Table { rows: Vec<BTreeMap<String, serde_json::Value>> },
    Graph { nodes: Vec<GraphNode>, edges: Vec<GraphEdge> },
    Json { value: serde_json::Value },
}

impl ResultData {
    pub fn row_count(&self) -> usize {
        match self {
            ResultData::Table { rows } => rows.len(),
            ResultData::Graph { nodes, .. } => nodes.len(),
            ResultData::Json { value } => value.as_array().map(|a| a.len()).unwrap_or(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub properties: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub edge_type: String,
    pub from_id: String,
    pub to_id: String,
    pub properties: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    Table,
    Graph,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionStats {
    pub execution_ms: u64,
    pub rows_returned: u64,
    pub rows_scanned: Option<u64>,
    pub database_hits: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub format: ResultFormat,
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult {
    pub data: ResultData,
    pub pagination: Pagination,
    pub stats: ExecutionStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        let last_page = if total == 0 {
            1
        } else {
            ((total + per_page - 1) / per_page).max(1)
        };
        Self { page, per_page, total, last_page }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainTree {
    pub operator: String,
    pub details: serde_json::Value,
    pub children: Vec<ExplainTree>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_computes_last_page() {
        let p = Pagination::new(3, 20, 57);
        assert_eq!(p.last_page, 3);
        let p0 = Pagination::new(1, 20, 0);
        assert_eq!(p0.last_page, 1);
    }
}
