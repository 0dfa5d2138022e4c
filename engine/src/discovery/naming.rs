//! Small string-shape helpers the derivation rules in [`super`] lean on:
//! snake_case/UPPER_SNAKE conversions and a deliberately simple English
//! pluralizer. None of this needs to be exhaustive — it only has to agree
//! with itself across `label`, `vector.collection`, and `semantics.aliases`.

/// `PersonTeam` -> `person_team`. Assumes an ASCII identifier.
pub fn to_snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    for (i, ch) in input.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `has_role` -> `HAS_ROLE`.
pub fn to_upper_snake(input: &str) -> String {
    to_snake_case(input).to_uppercase()
}

/// A deliberately simple English pluralizer: handles the common regular
/// suffixes and leaves anything else with a trailing `s`.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") && !lower.ends_with("oy") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{lower}es")
    } else {
        format!("{lower}s")
    }
}

/// Strips a leading `scope`/`scope_` prefix and normalizes to snake_case, per
/// "scope names are the filter method names normalized to snake_case, with
/// the leading `scope` prefix (if any) stripped".
pub fn normalize_scope_name(raw: &str) -> String {
    let snake = to_snake_case(raw);
    let stripped = snake
        .strip_prefix("scope_")
        .or_else(|| snake.strip_prefix("scope"))
        .unwrap_or(&snake);
    stripped.trim_start_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_cases_camel_input() {
        assert_eq!(to_snake_case("PersonTeam"), "person_team");
        assert_eq!(to_upper_snake("has_role"), "HAS_ROLE");
        assert_eq!(to_upper_snake("hasRole"), "HAS_ROLE");
    }

    #[test]
    fn pluralizes_common_suffixes() {
        assert_eq!(pluralize("Person"), "persons");
        assert_eq!(pluralize("Category"), "categories");
        assert_eq!(pluralize("Box"), "boxes");
    }

    #[test]
    fn strips_scope_prefix() {
        assert_eq!(normalize_scope_name("scopeVolunteers"), "volunteers");
        assert_eq!(normalize_scope_name("scope_pending_orders"), "pending_orders");
        assert_eq!(normalize_scope_name("highValue"), "high_value");
    }
}
