// Capture declarations, match rules, and the standard resolver table.
pub mod capture;
pub mod resolver;
pub mod rules;

pub use capture::{Capture, CaptureExpression, CaptureMarker, CapturePath};
pub use resolver::FilterResolver;
pub use rules::{FilterMatchRules, MatchRule, MatchStrategy, ResolveFn};

use crate::filter::LogicalOperator;
use crate::predicate::ColumnPredicate;

/// A comparison expression after rule matching: the field path plus the
/// column predicates its operations resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedComparison {
    pub path: String,
    pub predicates: Vec<ColumnPredicate>,
}

/// Output of rule matching. Mirrors the logical tree shape of the parsed
/// filter, with every comparison replaced by its resolved predicates. The
/// input tree is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedExpression {
    pub operator: LogicalOperator,
    pub expressions: Vec<ResolvedExpression>,
    pub comparisons: Vec<ResolvedComparison>,
}

impl ResolvedExpression {
    /// An empty conjunction, which every document satisfies.
    #[must_use]
    pub fn and() -> Self {
        Self { operator: LogicalOperator::And, expressions: Vec::new(), comparisons: Vec::new() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty() && self.comparisons.is_empty()
    }

    /// All predicates in the tree, depth first. Used for upsert seeding and
    /// for tests.
    #[must_use]
    pub fn all_predicates(&self) -> Vec<&ColumnPredicate> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a ColumnPredicate>) {
        for child in &self.expressions {
            child.collect_predicates(out);
        }
        for comparison in &self.comparisons {
            out.extend(comparison.predicates.iter());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperationsConfig;
    use crate::filter::FilterParser;
    use crate::predicate::{IdOperator, MapOperator};
    use serde_json::json;

    fn resolve(filter: serde_json::Value) -> ResolvedExpression {
        let config = OperationsConfig::default();
        let parser = FilterParser::new(&config);
        let tree = parser.parse(&filter).unwrap();
        FilterResolver::new().resolve(&tree).unwrap()
    }

    #[test]
    fn empty_filter_resolves_to_empty_conjunction() {
        let resolved = resolve(json!({}));
        assert!(resolved.is_empty());
        assert_eq!(resolved.operator, LogicalOperator::And);
    }

    #[test]
    fn lone_id_filter_uses_by_id_rule() {
        let resolved = resolve(json!({"_id": "doc1"}));
        let predicates = resolved.all_predicates();
        assert_eq!(predicates.len(), 1);
        match predicates[0] {
            ColumnPredicate::Id { operator: IdOperator::Eq, values } => {
                assert_eq!(values.len(), 1);
            }
            other => panic!("expected id predicate, got {other:?}"),
        }
    }

    #[test]
    fn strict_rule_rejects_extra_comparisons() {
        // id + name cannot satisfy the single-capture strict rules, so the
        // greedy dynamic rule answers and both comparisons resolve.
        let resolved = resolve(json!({"_id": "doc1", "name": "alice"}));
        let predicates = resolved.all_predicates();
        assert_eq!(predicates.len(), 2);
        assert!(predicates
            .iter()
            .any(|p| matches!(p, ColumnPredicate::Text { operator: MapOperator::Eq, .. })));
    }

    #[test]
    fn greedy_rule_matches_many_fields() {
        let resolved = resolve(json!({
            "name": "alice",
            "age": {"$gte": 21},
            "active": true,
            "tags": {"$size": 2}
        }));
        assert_eq!(resolved.all_predicates().len(), 4);
    }

    #[test]
    fn null_shorthand_resolves_to_null_set_predicate() {
        let resolved = resolve(json!({"deleted_at": null}));
        match resolved.all_predicates()[0] {
            ColumnPredicate::IsNull { path, .. } => assert_eq!(path, "deleted_at"),
            other => panic!("expected null predicate, got {other:?}"),
        }
    }

    #[test]
    fn all_expands_one_predicate_per_element() {
        let resolved = resolve(json!({"tags": {"$all": ["a", "b", "c"]}}));
        let predicates = resolved.all_predicates();
        assert_eq!(predicates.len(), 3);
        assert!(predicates.iter().all(|p| matches!(p, ColumnPredicate::ArrayContains { .. })));
    }

    #[test]
    fn negated_filter_resolves_after_pushdown() {
        let resolved = resolve(json!({"$not": {"age": {"$gt": 5}}}));
        match resolved.all_predicates()[0] {
            ColumnPredicate::Number { operator: MapOperator::Lte, .. } => {}
            other => panic!("expected lte predicate, got {other:?}"),
        }
    }

    #[test]
    fn unknown_shape_is_unresolvable() {
        // $exists on _id matches no capture
        let config = OperationsConfig::default();
        let parser = FilterParser::new(&config);
        let tree = parser.parse(&json!({"_id": {"$exists": true}})).unwrap();
        let err = FilterResolver::new().resolve(&tree).unwrap_err();
        assert!(matches!(err, crate::errors::DbError::UnresolvableFilter(_)));
    }
}
