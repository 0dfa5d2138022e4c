//! Output of the Response Generator (§4.6): the bundle aimed at a
//! non-technical reader.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBundle {
    pub answer: String,
    /// Deterministic, not LLM-derived.
    pub insights: Vec<String>,
    pub visualizations: Vec<VisualizationSuggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationSuggestion {
    pub suggestion_type: VisualizationType,
    pub rationale: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationType {
    Number,
    BarChart,
    LineChart,
    Graph,
    Table,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFormat {
    Text,
    Markdown,
    Json,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStyle {
    Concise,
    Detailed,
    Technical,
}
