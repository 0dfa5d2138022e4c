//! The pattern library (distilled §4.4): a named, parameterized, read-only
//! collection of abstract query shapes rendered into the LLM prompt so it
//! has concrete reusable building blocks. The library never produces query
//! text itself — instantiation is the LLM's job, constrained by the prompt.

pub struct Pattern {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [&'static str],
}

pub const PATTERN_LIBRARY: &[Pattern] = &[
    Pattern {
        name: "property_filter",
        description: "Match nodes of a label whose property satisfies a comparison against a literal value.",
        parameters: &["label", "property", "operator", "value"],
    },
    Pattern {
        name: "property_range",
        description: "Match nodes of a label whose property falls within a low/high bound.",
        parameters: &["label", "property", "low", "high", "inclusive"],
    },
    Pattern {
        name: "relationship_traversal",
        description: "Traverse one or more relationship steps from a starting label to a target label, optionally filtering the target.",
        parameters: &["start_label", "path", "target_filter", "distinct"],
    },
    Pattern {
        name: "entity_with_aggregated_relationship",
        description: "Count or aggregate over a relationship, e.g. entities that have at least N related nodes of a given label.",
        parameters: &["label", "relationship", "target_label", "aggregate", "min_count", "max_count"],
    },
    Pattern {
        name: "entity_without_relationship",
        description: "Match entities that have no related node of a given label through a relationship.",
        parameters: &["label", "relationship", "target_label"],
    },
    Pattern {
        name: "temporal_filter",
        description: "Match nodes whose timestamp property falls within an explicit or relative time window.",
        parameters: &["label", "property", "from", "to", "relative"],
    },
    Pattern {
        name: "multi_condition",
        description: "Combine two or more of the above patterns with AND/OR.",
        parameters: &["op", "children"],
    },
];

/// Renders the library as prose for inclusion in a Generator prompt.
pub fn render_for_prompt() -> String {
    let mut out = String::from("Available query patterns:\n");
    for pattern in PATTERN_LIBRARY {
        out.push_str(&format!(
            "- {} ({}): {}\n",
            pattern.name,
            pattern.parameters.join(", "),
            pattern.description
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_pattern_name() {
        let rendered = render_for_prompt();
        for pattern in PATTERN_LIBRARY {
            assert!(rendered.contains(pattern.name));
        }
    }
}
