//! Shared data types for the RAQE engine.
//!
//! These are plain, serializable value types with no I/O and no async code —
//! produced and consumed by the engine's subsystems and, where a host
//! application needs to inspect them, by callers outside the workspace too.

pub mod discovery;
pub mod context;
pub mod query;
pub mod execution;
pub mod coordinator;
pub mod response;

pub use discovery::*;
pub use context::*;
pub use query::*;
pub use execution::*;
pub use coordinator::*;
pub use response::*;

use once_cell::sync::Lazy;
use regex::Regex;

/// Every identifier that reaches a generated or validated query — labels,
/// relationship types, property names — must match this pattern.
pub static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Validates a bare identifier against the shape every label, relationship
/// type, and property name must have throughout the engine.
pub fn is_valid_identifier(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= MAX_IDENTIFIER_LEN
        && IDENTIFIER_RE.is_match(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_identifiers() {
        assert!(is_valid_identifier("Person"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("role_type"));
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("123abc"));
        assert!(!is_valid_identifier("Team\"; DROP"));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier(&"a".repeat(256)));
    }
}
