//! Response Generator: turns `(question, ExecutionResult, query_text)` into
//! an answer/insights/visualizations bundle aimed at a non-technical reader.
//! Insights and visualization suggestions are computed deterministically;
//! only the prose answer goes through the LLM.

use std::sync::Arc;

use raqe_llm::Llm;
use raqe_models::{
    AnswerFormat, AnswerStyle, ExecutionResult, ResponseBundle, ResultData, VisualizationSuggestion, VisualizationType,
};
use serde_json::Value;
use tracing::instrument;

const TEMPORAL_NAME_HINTS: &[&str] = &["date", "time", "_at", "timestamp"];

#[derive(Debug, Clone)]
pub struct ResponseOptions {
    pub format: AnswerFormat,
    pub style: AnswerStyle,
    pub sample_size: usize,
    pub include_details: bool,
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self { format: AnswerFormat::Text, style: AnswerStyle::Concise, sample_size: 10, include_details: false }
    }
}

pub struct ResponseGenerator {
    llm: Arc<dyn Llm>,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    #[instrument(skip(self, result, options))]
    pub async fn generate_response(
        &self,
        question: &str,
        result: &ExecutionResult,
        query_text: &str,
        options: &ResponseOptions,
    ) -> ResponseBundle {
        let rows = table_rows(&result.data);

        if rows.is_empty() && matches!(result.data, ResultData::Table { .. }) {
            let answer = self.empty_result_answer(question).await;
            return ResponseBundle { answer, insights: vec!["no rows were returned".to_string()], visualizations: Vec::new() };
        }

        let answer = self.narrate(question, result, query_text, &rows, options).await;
        let insights = compute_insights(&rows);
        let visualizations = suggest_visualizations(query_text, &result.data, &rows);

        ResponseBundle { answer, insights, visualizations }
    }

    /// Converts an upstream failure into a friendly message, suppressing
    /// technical detail unless `include_details`.
    pub fn generate_error_response(&self, error_message: &str, include_details: bool) -> ResponseBundle {
        let lower = error_message.to_lowercase();
        let friendly = if lower.contains("timeout") {
            "The query took too long to run. Try narrowing your question."
        } else if lower.contains("syntax") {
            "There was an issue with the generated query. Try rephrasing your question."
        } else {
            "An internal issue occurred while answering your question."
        };
        let answer = if include_details {
            format!("{friendly}\n\nDetails: {error_message}")
        } else {
            friendly.to_string()
        };
        ResponseBundle { answer, insights: Vec::new(), visualizations: Vec::new() }
    }

    async fn empty_result_answer(&self, question: &str) -> String {
        let prompt = format!(
            "The question \"{question}\" returned no results. In one short paragraph, explain that no matching data was found and suggest one or two alternative ways to phrase the question."
        );
        self.llm
            .complete(&prompt, None, 0.3)
            .await
            .unwrap_or_else(|_| "No results were found for that question. Try broadening or rephrasing it.".to_string())
    }

    async fn narrate(
        &self,
        question: &str,
        result: &ExecutionResult,
        query_text: &str,
        rows: &[serde_json::Map<String, Value>],
        options: &ResponseOptions,
    ) -> String {
        let sample_size = options.sample_size.max(1);
        let sample: Vec<_> = rows.iter().take(sample_size).collect();
        let remainder = rows.len().saturating_sub(sample.len());

        let mut prompt = String::new();
        prompt.push_str(&format!("Question: {question}\n"));
        prompt.push_str(&format!("Query: {query_text}\n"));
        prompt.push_str(&format!(
            "Execution stats: {} rows returned in {}ms\n",
            result.stats.rows_returned, result.stats.execution_ms
        ));
        prompt.push_str("Sample rows:\n");
        for row in &sample {
            prompt.push_str(&format!("- {}\n", Value::Object((*row).clone())));
        }
        if remainder > 0 {
            prompt.push_str(&format!("...and {remainder} more\n"));
        }
        prompt.push_str(&format!(
            "\nWrite a {} paragraph answer in {} style, in {} format, for a non-technical reader.\n",
            style_name(options.style),
            style_name(options.style),
            format_name(options.format)
        ));

        self.llm
            .complete(&prompt, None, 0.3)
            .await
            .unwrap_or_else(|_| "The query completed but a narrative answer could not be generated.".to_string())
    }
}

fn style_name(style: AnswerStyle) -> &'static str {
    match style {
        AnswerStyle::Concise => "concise",
        AnswerStyle::Detailed => "detailed",
        AnswerStyle::Technical => "technical",
    }
}

fn format_name(format: AnswerFormat) -> &'static str {
    match format {
        AnswerFormat::Text => "plain text",
        AnswerFormat::Markdown => "markdown",
        AnswerFormat::Json => "json",
    }
}

fn table_rows(data: &ResultData) -> Vec<serde_json::Map<String, Value>> {
    match data {
        ResultData::Table { rows } => rows.iter().map(|r| r.iter().map(|(k, v)| (k.clone(), v.clone())).collect()).collect(),
        ResultData::Json { value } => value.as_array().map(|a| a.iter().filter_map(|v| v.as_object().cloned()).collect()).unwrap_or_default(),
        ResultData::Graph { .. } => Vec::new(),
    }
}

fn compute_insights(rows: &[serde_json::Map<String, Value>]) -> Vec<String> {
    let mut insights = vec![format!("{} row(s) returned", rows.len())];
    if rows.is_empty() {
        return insights;
    }

    let columns: Vec<String> = rows[0].keys().cloned().collect();
    insights.push(format!("columns: {}", columns.join(", ")));

    for column in &columns {
        let numeric: Vec<f64> = rows.iter().filter_map(|r| r.get(column)).filter_map(numeric_value).collect();
        if numeric.len() == rows.len() && !numeric.is_empty() {
            let sum: f64 = numeric.iter().sum();
            let mean = sum / numeric.len() as f64;
            let min = numeric.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = numeric.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let outliers = numeric.iter().filter(|v| **v > 2.0 * mean).count();
            insights.push(format!("{column}: mean {mean:.2}, min {min:.2}, max {max:.2}"));
            if outliers > 0 {
                insights.push(format!("{column}: {outliers} outlier(s) above 2x the mean"));
            }
            continue;
        }

        if is_temporal_column(column) {
            let mut timestamps: Vec<String> = rows.iter().filter_map(|r| r.get(column)).filter_map(|v| v.as_str().map(str::to_string)).collect();
            timestamps.sort();
            if let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) {
                insights.push(format!("{column}: ranges from {first} to {last}"));
            }
        }
    }

    insights
}

fn numeric_value(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn is_temporal_column(name: &str) -> bool {
    let lower = name.to_lowercase();
    TEMPORAL_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

fn suggest_visualizations(query_text: &str, data: &ResultData, rows: &[serde_json::Map<String, Value>]) -> Vec<VisualizationSuggestion> {
    let mut suggestions = Vec::new();

    if matches!(data, ResultData::Graph { .. }) || (query_text.contains("-[") && query_text.contains("]-")) {
        suggestions.push(VisualizationSuggestion {
            suggestion_type: VisualizationType::Graph,
            rationale: "the query traverses relationships and the result carries node/edge shapes".to_string(),
            columns: Vec::new(),
        });
    }

    if rows.len() == 1 && rows[0].len() == 1 {
        if let Some(value) = rows[0].values().next() {
            if value.is_number() {
                suggestions.push(VisualizationSuggestion {
                    suggestion_type: VisualizationType::Number,
                    rationale: "a single row with a single numeric value, typical of a count query".to_string(),
                    columns: rows[0].keys().cloned().collect(),
                });
            }
        }
    }

    if !rows.is_empty() {
        let columns: Vec<String> = rows[0].keys().cloned().collect();
        if columns.len() == 2 {
            let numeric_columns: Vec<&String> = columns.iter().filter(|c| rows.iter().all(|r| r.get(*c).map(|v| v.is_number()).unwrap_or(false))).collect();
            let categorical_columns: Vec<&String> = columns.iter().filter(|c| !numeric_columns.contains(c)).collect();
            if numeric_columns.len() == 1 && categorical_columns.len() == 1 && rows.len() <= 50 {
                suggestions.push(VisualizationSuggestion {
                    suggestion_type: VisualizationType::BarChart,
                    rationale: "two columns, one categorical and one numeric, with 50 or fewer rows".to_string(),
                    columns: columns.clone(),
                });
            }
        }

        let temporal_columns: Vec<&String> = columns.iter().filter(|c| is_temporal_column(c)).collect();
        let numeric_columns: Vec<&String> = columns.iter().filter(|c| rows.iter().all(|r| r.get(*c).map(|v| v.is_number()).unwrap_or(false))).collect();
        if !temporal_columns.is_empty() && !numeric_columns.is_empty() {
            suggestions.push(VisualizationSuggestion {
                suggestion_type: VisualizationType::LineChart,
                rationale: "a temporal column alongside a numeric column".to_string(),
                columns: temporal_columns.iter().chain(numeric_columns.iter()).map(|s| s.to_string()).collect(),
            });
        }
    }

    suggestions.push(VisualizationSuggestion {
        suggestion_type: VisualizationType::Table,
        rationale: "default fallback".to_string(),
        columns: Vec::new(),
    });

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use raqe_llm::fake::FakeLlm;
    use raqe_models::{ExecutionMetadata, ExecutionStats, ResultFormat};
    use std::collections::BTreeMap;

    fn row(count: i64) -> BTreeMap<String, Value> {
        let mut r = BTreeMap::new();
        r.insert("count".to_string(), Value::from(count));
        r
    }

    #[tokio::test]
    async fn single_numeric_cell_suggests_number_visualization() {
        let llm = Arc::new(FakeLlm::new(vec!["There are 5 people.".to_string()]));
        let generator = ResponseGenerator::new(llm);
        let result = ExecutionResult {
            success: true,
            data: ResultData::Table { rows: vec![row(5)] },
            stats: ExecutionStats { execution_ms: 2, rows_returned: 1, rows_scanned: None, database_hits: None },
            metadata: ExecutionMetadata { format: ResultFormat::Table, read_only: true },
            errors: Vec::new(),
        };
        let bundle = generator.generate_response("how many people", &result, "MATCH (n) RETURN count(n)", &ResponseOptions::default()).await;
        assert!(bundle.visualizations.iter().any(|v| v.suggestion_type == VisualizationType::Number));
        assert!(bundle.insights.iter().any(|i| i.contains("1 row")));
    }

    #[tokio::test]
    async fn empty_result_skips_narration_and_visualizations() {
        let llm = Arc::new(FakeLlm::new(vec![]));
        let generator = ResponseGenerator::new(llm);
        let result = ExecutionResult {
            success: true,
            data: ResultData::Table { rows: vec![] },
            stats: ExecutionStats::default(),
            metadata: ExecutionMetadata { format: ResultFormat::Table, read_only: true },
            errors: Vec::new(),
        };
        let bundle = generator.generate_response("anything", &result, "MATCH (n:Ghost) RETURN n", &ResponseOptions::default()).await;
        assert!(!bundle.answer.is_empty());
        assert!(bundle.visualizations.is_empty());
    }

    #[test]
    fn error_response_suppresses_details_by_default() {
        let llm = Arc::new(FakeLlm::new(vec![]));
        let generator = ResponseGenerator::new(llm);
        let bundle = generator.generate_error_response("connection timeout after 30s", false);
        assert!(bundle.answer.contains("too long"));
        assert!(!bundle.answer.contains("30s"));
    }
}
