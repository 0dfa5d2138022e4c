//! Write-path reports emitted by the Dual-Store Coordinator (§4.2).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub entity_id: String,
    pub label: String,
    pub graph_stored: bool,
    pub vector_stored: bool,
    pub relationships_written: u32,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<EntityOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityOutcome {
    pub entity_id: String,
    pub success: bool,
    pub error: Option<String>,
}
