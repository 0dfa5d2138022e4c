//! Template detection (distilled §4.4 step 1): a fixed list of
//! regex-anchored templates ("list all", "count", "find by property",
//! "related to") matched against the question before ever calling the LLM.
//! Generalizes `query_analysis.rs`'s keyword-scored `QueryKind` dispatch from
//! a closed enum into an open list any of these four shapes can extend.

use once_cell::sync::Lazy;
use raqe_models::{is_valid_identifier, NodeableConfig};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

pub struct TemplateMatch {
    pub name: String,
    pub query_text: String,
}

static LIST_ALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:list|show)\s+all\s+([a-z_]+)").unwrap());
static COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhow many\s+([a-z_]+)|\bcount of\s+([a-z_]+)").unwrap());
static FIND_BY_PROPERTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bfind\s+([a-z_]+)\s+where\s+([a-z_]+)\s*(?:is|=|equals)\s*([a-z0-9_' ]+)").unwrap()
});
static RELATED_TO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([a-z_]+)\s+related to\s+([a-z_]+)").unwrap());

/// Resolves a noun captured out of the question (singular, plural, or
/// snake_case) to a known label, by comparing case-insensitively against
/// known labels and their aliases.
fn resolve_label(term: &str, configs: &BTreeMap<String, NodeableConfig>, schema_labels: &BTreeSet<String>) -> Option<String> {
    let lower = term.to_lowercase();
    for label in schema_labels {
        if label.to_lowercase() == lower {
            return Some(label.clone());
        }
    }
    for (label, config) in configs {
        if label.to_lowercase() == lower || label.to_lowercase() == lower.trim_end_matches('s') {
            return Some(label.clone());
        }
        if config.semantics.aliases.iter().any(|a| a.to_lowercase() == lower) {
            return Some(label.clone());
        }
    }
    None
}

pub fn detect_template(
    question: &str,
    configs: &BTreeMap<String, NodeableConfig>,
    schema_labels: &BTreeSet<String>,
    row_cap: u64,
) -> Option<TemplateMatch> {
    if let Some(caps) = RELATED_TO.captures(question) {
        let from = resolve_label(&caps[1], configs, schema_labels)?;
        let to = resolve_label(&caps[2], configs, schema_labels)?;
        if !is_valid_identifier(&from) || !is_valid_identifier(&to) {
            return None;
        }
        return Some(TemplateMatch {
            name: "related_to".to_string(),
            query_text: format!(
                "MATCH (a:{from})-[r]-(b:{to}) RETURN a, r, b LIMIT {row_cap}"
            ),
        });
    }

    if let Some(caps) = FIND_BY_PROPERTY.captures(question) {
        let label = resolve_label(&caps[1], configs, schema_labels)?;
        let property = caps[2].trim().to_lowercase();
        let value = caps[3].trim();
        if !is_valid_identifier(&label) || !is_valid_identifier(&property) {
            return None;
        }
        let literal = render_literal(value);
        return Some(TemplateMatch {
            name: "find_by_property".to_string(),
            query_text: format!("MATCH (n:{label}) WHERE n.{property} = {literal} RETURN n LIMIT {row_cap}"),
        });
    }

    if let Some(caps) = COUNT.captures(question) {
        let term = caps.get(1).or_else(|| caps.get(2))?.as_str();
        let label = resolve_label(term, configs, schema_labels)?;
        if !is_valid_identifier(&label) {
            return None;
        }
        return Some(TemplateMatch {
            name: "count".to_string(),
            query_text: format!("MATCH (n:{label}) RETURN count(n) AS count"),
        });
    }

    if let Some(caps) = LIST_ALL.captures(question) {
        let label = resolve_label(&caps[1], configs, schema_labels)?;
        if !is_valid_identifier(&label) {
            return None;
        }
        return Some(TemplateMatch {
            name: "list_all".to_string(),
            query_text: format!("MATCH (n:{label}) RETURN n LIMIT {row_cap}"),
        });
    }

    None
}

fn render_literal(value: &str) -> String {
    let trimmed = value.trim().trim_matches('\'').trim_matches('"');
    if trimmed.parse::<f64>().is_ok() {
        trimmed.to_string()
    } else {
        format!("'{}'", trimmed.replace('\'', "\\'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raqe_models::{AutoSyncFlags, SemanticsConfig};

    fn configs_with_person() -> BTreeMap<String, NodeableConfig> {
        let mut configs = BTreeMap::new();
        configs.insert(
            "Person".to_string(),
            NodeableConfig {
                label: "Person".to_string(),
                properties: vec!["id".to_string()],
                relationships: vec![],
                vector: None,
                semantics: SemanticsConfig::default(),
                auto_sync: AutoSyncFlags::default(),
            },
        );
        configs
    }

    #[test]
    fn detects_count_template() {
        let configs = configs_with_person();
        let schema = BTreeSet::new();
        let matched = detect_template("How many persons do we have?", &configs, &schema, 100).unwrap();
        assert_eq!(matched.name, "count");
        assert!(matched.query_text.contains("count(n)"));
    }

    #[test]
    fn detects_list_all_template() {
        let configs = configs_with_person();
        let schema = BTreeSet::new();
        let matched = detect_template("list all persons", &configs, &schema, 50).unwrap();
        assert_eq!(matched.name, "list_all");
        assert!(matched.query_text.contains("LIMIT 50"));
    }

    #[test]
    fn unresolvable_label_yields_no_match() {
        let configs = configs_with_person();
        let schema = BTreeSet::new();
        assert!(detect_template("how many widgets are there", &configs, &schema, 100).is_none());
    }
}
