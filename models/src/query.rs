//! Output of the Query Generator & Validator (§3.4 / §4.4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryArtifact {
    /// Validated, sanitized; read-only unless `allow_write` was set.
    pub query_text: String,
    pub explanation: String,
    pub confidence: f32,
    pub warnings: Vec<String>,
    pub metadata: QueryMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueryMetadata {
    pub template_used: Option<String>,
    pub retry_count: u32,
    pub generation_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub complexity_score: u32,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}
