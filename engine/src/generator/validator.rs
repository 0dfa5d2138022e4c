//! Query validation (distilled §4.4 step 4): dangerous-keyword rejection,
//! identifier/schema cross-checking, and a complexity scorer. Shares the
//! sentinel-prefixed error convention with [`super`] so the pipeline can
//! tell an unsafe-write rejection apart from an ordinary validation failure
//! without widening `ValidationReport`'s fixed shape.

use once_cell::sync::Lazy;
use raqe_models::{is_valid_identifier, GraphSchema, ValidationReport};
use regex::Regex;

/// Prefix on a `ValidationReport.errors` entry marking a rejected write
/// operation, so the retry loop in `mod.rs` can distinguish "this query
/// will never be allowed" from "this query needs another LLM pass".
pub const UNSAFE_WRITE_MARKER: &str = "UNSAFE_WRITE:";

const WRITE_KEYWORDS: &[&str] = &["delete", "remove", "drop", "create", "merge", "set", "detach"];

static IDENTIFIER_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static LIMIT_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\blimit\s+\d+").unwrap());
static VARIABLE_LENGTH_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\s*\d*\s*(\.\.\s*\d*)?\s*\]").unwrap());

pub fn contains_write_keyword(query: &str) -> bool {
    let lower = query.to_lowercase();
    WRITE_KEYWORDS.iter().any(|kw| {
        Regex::new(&format!(r"\b{kw}\b")).map(|re| re.is_match(&lower)).unwrap_or(false)
    })
}

pub fn has_row_cap(query: &str) -> bool {
    LIMIT_CLAUSE.is_match(query)
}

/// Appends a row-cap clause at `default_limit` if the query does not
/// already carry one (distilled §4.4 step 4, "sanitize").
pub fn sanitize_query(query: &str, default_limit: u64) -> String {
    if has_row_cap(query) {
        query.to_string()
    } else {
        format!("{} LIMIT {default_limit}", query.trim_end().trim_end_matches(';'))
    }
}

fn complexity_score(query: &str) -> u32 {
    let mut score = 0u32;
    if !has_row_cap(query) {
        score += 40;
    }
    if VARIABLE_LENGTH_PATH.is_match(query) {
        score += 30;
    }
    let match_clauses = Regex::new(r"(?i)\bmatch\b").unwrap().find_iter(query).count();
    if match_clauses > 1 {
        score += 15 * (match_clauses as u32 - 1);
    }
    score
}

/// Validates `query` against the allow-write policy, the identifier/schema
/// cross-check, and the complexity budget.
pub fn validate_query(query: &str, schema: &GraphSchema, allow_write: bool, complexity_max: u32) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !allow_write && contains_write_keyword(query) {
        errors.push(format!("{UNSAFE_WRITE_MARKER} write operation requested without allow_write"));
    }

    for caps in IDENTIFIER_TOKEN.captures_iter(query) {
        let identifier = &caps[1];
        if !is_valid_identifier(identifier) {
            errors.push(format!("identifier '{identifier}' failed validation"));
            continue;
        }
        let known = schema.labels.contains(identifier) || schema.relationships.contains(identifier) || schema.properties.contains(identifier);
        if !known && !schema.labels.is_empty() {
            warnings.push(format!("identifier '{identifier}' not found in known schema"));
        }
    }

    if !has_row_cap(query) {
        warnings.push("query has no row-cap clause".to_string());
    }

    let complexity_score = complexity_score(query);
    if complexity_score > complexity_max {
        errors.push(format!("complexity score {complexity_score} exceeds maximum {complexity_max}"));
    }

    ValidationReport { valid: errors.is_empty(), complexity_score, warnings, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_write_keyword_without_allow_write() {
        let schema = GraphSchema::default();
        let report = validate_query("MATCH (n) DETACH DELETE n", &schema, false, 100);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.starts_with(UNSAFE_WRITE_MARKER)));
    }

    #[test]
    fn allows_write_keyword_when_permitted() {
        let schema = GraphSchema::default();
        let report = validate_query("MATCH (n) SET n.seen = true", &schema, true, 100);
        assert!(!report.errors.iter().any(|e| e.starts_with(UNSAFE_WRITE_MARKER)));
    }

    #[test]
    fn flags_missing_row_cap_as_warning_and_penalizes_complexity() {
        let schema = GraphSchema::default();
        let report = validate_query("MATCH (n:Person) RETURN n", &schema, false, 100);
        assert!(report.warnings.iter().any(|w| w.contains("row-cap")));
        assert!(report.complexity_score >= 40);
    }

    #[test]
    fn sanitize_appends_limit_only_when_missing() {
        assert_eq!(sanitize_query("MATCH (n) RETURN n", 100), "MATCH (n) RETURN n LIMIT 100");
        assert_eq!(sanitize_query("MATCH (n) RETURN n LIMIT 10", 100), "MATCH (n) RETURN n LIMIT 10");
    }
}
