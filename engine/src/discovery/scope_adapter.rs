//! The Scope Adapter (distilled §4.1): each host-level filter method is
//! executed once against a *recording pseudo-builder* that does not touch
//! the database but captures its call sequence. The captured sequence is
//! then translated into a [`ScopeSpec`].
//!
//! Grounded on the teacher's "scope-as-method" pattern distilled into a
//! trace-then-translate shape (distilled §9, "Filter methods → tagged
//! variants"): a host scope method takes a `&mut ScopeRecorder` instead of a
//! live query builder, so translation never touches a database connection.

use raqe_models::{
    BooleanOp, ComparisonOperator, ScopeSpec, TemporalWindow, TraversalDirection, TraversalFilter,
    TraversalStep,
};
use serde_json::Value;

/// One call a host scope method made against the recorder.
#[derive(Debug, Clone)]
pub enum RecordedCall {
    Where { column: String, operator: ComparisonOperator, value: Value },
    WhereIn { column: String, values: Vec<Value> },
    WhereNull { column: String },
    WhereNotNull { column: String },
    WhereBetween { column: String, low: Value, high: Value, inclusive: bool },
    /// `where_has(relation, nested)` — the nested closure's own recorded
    /// calls, filtered against `target_label`.
    WhereHas { relation: String, target_label: String, nested: Vec<RecordedCall> },
    /// A scope method built on top of a temporal window rather than a bare
    /// comparison (e.g. "created in the last 30 days").
    WhereTemporal { column: String, window: TemporalWindow },
}

/// The pseudo-builder a host scope method is run against. Depth is tracked
/// so `where_has` nesting honors the same depth guard as discovery itself
/// (distilled §4.1, "Recursion depth > 5 aborts the scope with a warning").
pub struct ScopeRecorder {
    calls: Vec<RecordedCall>,
    depth: u32,
    max_depth: u32,
    aborted: bool,
}

impl ScopeRecorder {
    pub fn new(max_depth: u32) -> Self {
        Self { calls: Vec::new(), depth: 0, max_depth, aborted: false }
    }

    fn at_depth(max_depth: u32, depth: u32) -> Self {
        Self { calls: Vec::new(), depth, max_depth, aborted: false }
    }

    pub fn where_(&mut self, column: impl Into<String>, operator: ComparisonOperator, value: Value) {
        self.calls.push(RecordedCall::Where { column: column.into(), operator, value });
    }

    pub fn where_in(&mut self, column: impl Into<String>, values: Vec<Value>) {
        self.calls.push(RecordedCall::WhereIn { column: column.into(), values });
    }

    pub fn where_null(&mut self, column: impl Into<String>) {
        self.calls.push(RecordedCall::WhereNull { column: column.into() });
    }

    pub fn where_not_null(&mut self, column: impl Into<String>) {
        self.calls.push(RecordedCall::WhereNotNull { column: column.into() });
    }

    pub fn where_between(&mut self, column: impl Into<String>, low: Value, high: Value, inclusive: bool) {
        self.calls.push(RecordedCall::WhereBetween { column: column.into(), low, high, inclusive });
    }

    pub fn where_temporal(&mut self, column: impl Into<String>, window: TemporalWindow) {
        self.calls.push(RecordedCall::WhereTemporal { column: column.into(), window });
    }

    /// Runs `nested` against a fresh recorder one level deeper; if the depth
    /// guard trips, the `where_has` call is dropped silently (the caller
    /// sees a shorter, not a failed, translation — matching §4.1's "abort
    /// the scope with a warning" being a warning, not a hard error).
    pub fn where_has(
        &mut self,
        relation: impl Into<String>,
        target_label: impl Into<String>,
        nested: impl FnOnce(&mut ScopeRecorder),
    ) {
        if self.depth + 1 > self.max_depth {
            self.aborted = true;
            return;
        }
        let mut sub = ScopeRecorder::at_depth(self.max_depth, self.depth + 1);
        nested(&mut sub);
        self.calls.push(RecordedCall::WhereHas {
            relation: relation.into(),
            target_label: target_label.into(),
            nested: sub.calls,
        });
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn into_calls(self) -> Vec<RecordedCall> {
        self.calls
    }
}

/// Translates a recorded call trace into a declarative [`ScopeSpec`].
/// Returns `None` if the trace is empty or the recorder aborted on depth.
pub fn translate(start_label: &str, calls: Vec<RecordedCall>, aborted: bool) -> Option<ScopeSpec> {
    if aborted || calls.is_empty() {
        return None;
    }

    let specs: Vec<ScopeSpec> = calls.into_iter().map(|c| translate_call(start_label, c)).collect();

    if specs.len() == 1 {
        specs.into_iter().next()
    } else {
        Some(ScopeSpec::MultiCondition { op: BooleanOp::And, children: specs })
    }
}

fn translate_call(start_label: &str, call: RecordedCall) -> ScopeSpec {
    match call {
        RecordedCall::Where { column, operator, value } => {
            ScopeSpec::PropertyFilter { property: column, operator, value }
        }
        RecordedCall::WhereIn { column, values } => ScopeSpec::PropertyFilter {
            property: column,
            operator: ComparisonOperator::In,
            value: Value::Array(values),
        },
        RecordedCall::WhereNull { column } => ScopeSpec::PropertyFilter {
            property: column,
            operator: ComparisonOperator::IsNull,
            value: Value::Null,
        },
        RecordedCall::WhereNotNull { column } => ScopeSpec::PropertyFilter {
            property: column,
            operator: ComparisonOperator::IsNotNull,
            value: Value::Null,
        },
        RecordedCall::WhereBetween { column, low, high, inclusive } => ScopeSpec::PropertyRange {
            property: column,
            low: Some(low),
            high: Some(high),
            inclusive,
        },
        RecordedCall::WhereTemporal { column, window } => {
            ScopeSpec::TemporalFilter { property: column, window }
        }
        RecordedCall::WhereHas { relation, target_label, nested } => {
            let filter = nested.into_iter().find_map(|c| match translate_call(&target_label, c) {
                ScopeSpec::PropertyFilter { property, operator, value } => {
                    Some(TraversalFilter { target_label: target_label.clone(), property, operator, value })
                }
                _ => None,
            });
            ScopeSpec::RelationshipTraversal {
                start_label: start_label.to_string(),
                path: vec![TraversalStep {
                    relationship: relation,
                    target_label,
                    direction: TraversalDirection::Outgoing,
                }],
                filter: filter.map(Box::new),
                distinct: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_where_becomes_property_filter() {
        let mut recorder = ScopeRecorder::new(5);
        recorder.where_("status", ComparisonOperator::Equals, Value::from("active"));
        let spec = translate("Team", recorder.into_calls(), false).unwrap();
        assert!(matches!(spec, ScopeSpec::PropertyFilter { .. }));
    }

    #[test]
    fn multiple_wheres_become_multi_condition_and() {
        let mut recorder = ScopeRecorder::new(5);
        recorder.where_("status", ComparisonOperator::Equals, Value::from("active"));
        recorder.where_not_null("owner_id");
        let spec = translate("Team", recorder.into_calls(), false).unwrap();
        match spec {
            ScopeSpec::MultiCondition { op, children } => {
                assert_eq!(op, BooleanOp::And);
                assert_eq!(children.len(), 2);
            }
            _ => panic!("expected multi_condition"),
        }
    }

    #[test]
    fn where_has_becomes_relationship_traversal() {
        let mut recorder = ScopeRecorder::new(5);
        recorder.where_has("HAS_ROLE", "PersonTeam", |nested| {
            nested.where_("role_type", ComparisonOperator::Equals, Value::from("volunteer"));
        });
        let spec = translate("Person", recorder.into_calls(), false).unwrap();
        match spec {
            ScopeSpec::RelationshipTraversal { start_label, path, filter, distinct } => {
                assert_eq!(start_label, "Person");
                assert_eq!(path[0].relationship, "HAS_ROLE");
                assert_eq!(path[0].target_label, "PersonTeam");
                assert!(distinct);
                let filter = filter.unwrap();
                assert_eq!(filter.property, "role_type");
                assert_eq!(filter.value, Value::from("volunteer"));
            }
            _ => panic!("expected relationship_traversal"),
        }
    }

    #[test]
    fn depth_guard_aborts_deep_nesting() {
        let mut recorder = ScopeRecorder::new(1);
        recorder.where_has("A", "TargetA", |n1| {
            n1.where_has("B", "TargetB", |n2| {
                n2.where_("x", ComparisonOperator::Equals, Value::from(1));
            });
        });
        // the outer where_has recorded itself (depth 1 allowed), but its
        // nested where_has at depth 2 exceeded max_depth=1 and was dropped.
        let calls = recorder.into_calls();
        assert_eq!(calls.len(), 1);
        if let RecordedCall::WhereHas { nested, .. } = &calls[0] {
            assert!(nested.is_empty());
        } else {
            panic!("expected where_has");
        }
    }
}
