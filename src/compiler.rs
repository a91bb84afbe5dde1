use crate::errors::DbError;
use crate::filter::{DocumentId, LogicalOperator};
use crate::matcher::ResolvedExpression;
use crate::predicate::{
    BuiltCondition, ColumnLhs, ColumnOperator, ColumnPredicate, ColumnValue, IdOperator, columns,
};
use serde_json::Value;

/// Boolean query expression over column conditions. The store cannot evaluate
/// vacuous truth natively, so the empty-set short circuits are carried as
/// explicit sentinel nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryExpression {
    Condition(BuiltCondition),
    And(Vec<QueryExpression>),
    Or(Vec<QueryExpression>),
    AlwaysTrue,
    AlwaysFalse,
}

impl QueryExpression {
    /// Evaluates the expression with `leaf` deciding each column condition.
    pub fn evaluate<F>(&self, leaf: &F) -> bool
    where
        F: Fn(&BuiltCondition) -> bool,
    {
        match self {
            Self::Condition(condition) => leaf(condition),
            Self::And(parts) => parts.iter().all(|p| p.evaluate(leaf)),
            Self::Or(parts) => parts.iter().any(|p| p.evaluate(leaf)),
            Self::AlwaysTrue => true,
            Self::AlwaysFalse => false,
        }
    }
}

/// Document-id constraint extracted from the resolved tree (or supplied as an
/// override for a targeted re-read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdConstraint {
    pub operator: IdOperator,
    pub values: Vec<DocumentId>,
}

impl IdConstraint {
    #[must_use]
    pub fn eq(id: DocumentId) -> Self {
        Self { operator: IdOperator::Eq, values: vec![id] }
    }
}

/// Compiler output: the alternative query expressions to run, one store query
/// each. `None` means no document can match and no query should be issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionBuiltResult {
    pub expressions: Option<Vec<QueryExpression>>,
    pub allow_filtering: bool,
}

impl ExpressionBuiltResult {
    #[must_use]
    pub const fn select_nothing() -> Self {
        Self { expressions: None, allow_filtering: false }
    }

    #[must_use]
    pub fn is_select_nothing(&self) -> bool {
        self.expressions.is_none()
    }
}

/// Reduces a resolved tree into alternative query expressions. Id predicates
/// are never embedded in the generic expression: `$eq`/`$in` ids fan out to
/// one per-partition query each, `$ne`/`$nin` ids force a single query with
/// the allow-filtering flag. `additional_id` replaces the tree's own id
/// constraint when present.
pub fn build_expressions(
    resolved: &ResolvedExpression,
    additional_id: Option<IdConstraint>,
) -> Result<ExpressionBuiltResult, DbError> {
    let id = additional_id.or_else(|| extract_id(resolved));
    let generic = build_node(resolved)?.unwrap_or(QueryExpression::AlwaysTrue);
    if generic == QueryExpression::AlwaysFalse {
        return Ok(ExpressionBuiltResult::select_nothing());
    }
    match id {
        None => Ok(ExpressionBuiltResult { expressions: Some(vec![generic]), allow_filtering: false }),
        Some(IdConstraint { operator: IdOperator::Eq | IdOperator::In, values }) => {
            if values.is_empty() {
                // empty id $in: nothing can match, no query issued
                return Ok(ExpressionBuiltResult::select_nothing());
            }
            let expressions = values
                .into_iter()
                .map(|value| {
                    conjoin(vec![
                        QueryExpression::Condition(key_condition(ColumnOperator::Eq, value)),
                        generic.clone(),
                    ])
                })
                .collect();
            Ok(ExpressionBuiltResult { expressions: Some(expressions), allow_filtering: false })
        }
        Some(IdConstraint { values, .. }) => {
            if values.is_empty() {
                // empty id $nin matches everything; the generic expression decides
                return Ok(ExpressionBuiltResult {
                    expressions: Some(vec![generic]),
                    allow_filtering: false,
                });
            }
            let mut parts: Vec<QueryExpression> = values
                .into_iter()
                .map(|value| {
                    QueryExpression::Condition(key_condition(ColumnOperator::Ne, value))
                })
                .collect();
            parts.push(generic);
            Ok(ExpressionBuiltResult {
                expressions: Some(vec![conjoin(parts)]),
                allow_filtering: true,
            })
        }
    }
}

/// Equality constraints usable to seed a synthetic document when an upsert
/// matches nothing. Only conjunctive constraints qualify; anything beneath an
/// OR is skipped.
#[must_use]
pub fn upsert_seed(resolved: &ResolvedExpression) -> Vec<(String, Value)> {
    let mut seed = Vec::new();
    collect_seed(resolved, &mut seed);
    seed
}

fn collect_seed(node: &ResolvedExpression, seed: &mut Vec<(String, Value)>) {
    if node.operator == LogicalOperator::Or {
        return;
    }
    for child in &node.expressions {
        collect_seed(child, seed);
    }
    for comparison in &node.comparisons {
        for predicate in &comparison.predicates {
            if let Some(value) = predicate.default_json() {
                seed.push((predicate.path().to_string(), value));
            }
        }
    }
}

fn extract_id(node: &ResolvedExpression) -> Option<IdConstraint> {
    for comparison in &node.comparisons {
        for predicate in &comparison.predicates {
            if let ColumnPredicate::Id { operator, values } = predicate {
                return Some(IdConstraint { operator: *operator, values: values.clone() });
            }
        }
    }
    node.expressions.iter().find_map(extract_id)
}

/// Bottom-up compilation of one tree node. `None` means the node carried no
/// constraint at all and the parent should skip it.
fn build_node(node: &ResolvedExpression) -> Result<Option<QueryExpression>, DbError> {
    let mut parts = Vec::new();
    for child in &node.expressions {
        if let Some(built) = build_node(child)? {
            parts.push(built);
        }
    }
    for comparison in &node.comparisons {
        for predicate in &comparison.predicates {
            match predicate {
                // handled by the fan-out at the top level
                ColumnPredicate::Id { .. } => {}
                ColumnPredicate::In { operator, values, .. } => {
                    parts.push(in_expression(predicate, *operator, values.is_empty()));
                }
                other => {
                    let condition = other.built_condition().ok_or_else(|| {
                        DbError::UnresolvableFilter(other.path().to_string())
                    })?;
                    parts.push(QueryExpression::Condition(condition));
                }
            }
        }
    }
    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(combine(node.operator, parts)))
}

/// `$in` expands to an OR of per-value conditions, `$nin` to an AND. The
/// empty sets degenerate to the boolean identities.
fn in_expression(
    predicate: &ColumnPredicate,
    operator: crate::predicate::InOperator,
    empty: bool,
) -> QueryExpression {
    use crate::predicate::InOperator;
    if empty {
        return match operator {
            InOperator::In => QueryExpression::AlwaysFalse,
            InOperator::Nin => QueryExpression::AlwaysTrue,
        };
    }
    let conditions =
        predicate.conditions().into_iter().map(QueryExpression::Condition).collect();
    match operator {
        InOperator::In => combine(LogicalOperator::Or, conditions),
        InOperator::Nin => combine(LogicalOperator::And, conditions),
    }
}

fn conjoin(parts: Vec<QueryExpression>) -> QueryExpression {
    combine(LogicalOperator::And, parts)
}

/// Combines sub-expressions under one operator, folding the sentinels by the
/// identities `x AND false = false`, `x AND true = x`, `x OR true = true`,
/// `x OR false = x`.
fn combine(operator: LogicalOperator, parts: Vec<QueryExpression>) -> QueryExpression {
    match operator {
        LogicalOperator::Or => {
            if parts.iter().any(|p| *p == QueryExpression::AlwaysTrue) {
                return QueryExpression::AlwaysTrue;
            }
            let mut kept: Vec<_> =
                parts.into_iter().filter(|p| *p != QueryExpression::AlwaysFalse).collect();
            match kept.len() {
                0 => QueryExpression::AlwaysFalse,
                1 => kept.remove(0),
                _ => QueryExpression::Or(kept),
            }
        }
        _ => {
            if parts.iter().any(|p| *p == QueryExpression::AlwaysFalse) {
                return QueryExpression::AlwaysFalse;
            }
            let mut kept: Vec<_> =
                parts.into_iter().filter(|p| *p != QueryExpression::AlwaysTrue).collect();
            match kept.len() {
                0 => QueryExpression::AlwaysTrue,
                1 => kept.remove(0),
                _ => QueryExpression::And(kept),
            }
        }
    }
}

fn key_condition(operator: ColumnOperator, id: DocumentId) -> BuiltCondition {
    BuiltCondition::new(ColumnLhs::Column(columns::KEY), operator, ColumnValue::Id(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperationsConfig;
    use crate::filter::FilterParser;
    use crate::matcher::FilterResolver;
    use serde_json::json;

    fn compile(filter: serde_json::Value) -> ExpressionBuiltResult {
        let parser = FilterParser::new(&OperationsConfig::default());
        let tree = parser.parse(&filter).unwrap();
        let resolved = FilterResolver::new().resolve(&tree).unwrap();
        build_expressions(&resolved, None).unwrap()
    }

    #[test]
    fn empty_filter_compiles_to_single_unconstrained_scan() {
        let result = compile(json!({}));
        assert_eq!(result.expressions, Some(vec![QueryExpression::AlwaysTrue]));
        assert!(!result.allow_filtering);
    }

    #[test]
    fn id_in_fans_out_one_expression_per_value() {
        let result = compile(json!({"_id": {"$in": ["1", "2"]}}));
        let expressions = result.expressions.unwrap();
        assert_eq!(expressions.len(), 2);
        assert!(!result.allow_filtering);
        assert_eq!(
            expressions[0],
            QueryExpression::Condition(key_condition(
                ColumnOperator::Eq,
                DocumentId::String("1".into())
            ))
        );
    }

    #[test]
    fn id_nin_emits_single_allow_filtering_expression() {
        let result = compile(json!({"_id": {"$nin": ["1", "2"]}}));
        let expressions = result.expressions.unwrap();
        assert_eq!(expressions.len(), 1);
        assert!(result.allow_filtering);
        match &expressions[0] {
            QueryExpression::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected conjunction of ne conditions, got {other:?}"),
        }
    }

    #[test]
    fn empty_in_under_and_selects_nothing() {
        let result = compile(json!({"$and": [{"a": {"$in": []}}]}));
        assert!(result.is_select_nothing());
    }

    #[test]
    fn empty_nin_under_or_is_always_true() {
        let result = compile(json!({"$or": [{"a": {"$nin": []}}]}));
        assert_eq!(result.expressions, Some(vec![QueryExpression::AlwaysTrue]));
    }

    #[test]
    fn empty_id_in_selects_nothing() {
        let result = compile(json!({"_id": {"$in": []}}));
        assert!(result.is_select_nothing());
    }

    #[test]
    fn empty_id_nin_defers_to_generic_expression() {
        let result = compile(json!({"$and": [{"_id": {"$nin": []}}, {"a": 1}]}));
        let expressions = result.expressions.unwrap();
        assert_eq!(expressions.len(), 1);
        assert!(!result.allow_filtering);
        assert!(matches!(expressions[0], QueryExpression::Condition(_)));
    }

    #[test]
    fn id_eq_combines_key_with_generic_conditions() {
        let result = compile(json!({"_id": "x", "name": "alice"}));
        let expressions = result.expressions.unwrap();
        assert_eq!(expressions.len(), 1);
        match &expressions[0] {
            QueryExpression::And(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(
                    parts[0],
                    QueryExpression::Condition(key_condition(
                        ColumnOperator::Eq,
                        DocumentId::String("x".into())
                    ))
                );
            }
            other => panic!("expected conjunction, got {other:?}"),
        }
    }

    #[test]
    fn additional_id_overrides_filter_id() {
        let parser = FilterParser::new(&OperationsConfig::default());
        let tree = parser.parse(&json!({"_id": "original", "a": 1})).unwrap();
        let resolved = FilterResolver::new().resolve(&tree).unwrap();
        let override_id = IdConstraint::eq(DocumentId::String("reread".into()));
        let result = build_expressions(&resolved, Some(override_id)).unwrap();
        let expressions = result.expressions.unwrap();
        assert_eq!(expressions.len(), 1);
        match &expressions[0] {
            QueryExpression::And(parts) => assert_eq!(
                parts[0],
                QueryExpression::Condition(key_condition(
                    ColumnOperator::Eq,
                    DocumentId::String("reread".into())
                ))
            ),
            other => panic!("expected conjunction, got {other:?}"),
        }
    }

    #[test]
    fn dynamic_in_expands_to_disjunction() {
        let result = compile(json!({"tags": {"$in": ["a", "b"]}}));
        let expressions = result.expressions.unwrap();
        match &expressions[0] {
            QueryExpression::Or(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected disjunction, got {other:?}"),
        }
    }

    #[test]
    fn upsert_seed_collects_top_level_equalities() {
        let parser = FilterParser::new(&OperationsConfig::default());
        let tree = parser
            .parse(&json!({
                "_id": "new-doc",
                "name": "alice",
                "age": {"$gt": 3},
                "$or": [{"city": "oslo"}]
            }))
            .unwrap();
        let resolved = FilterResolver::new().resolve(&tree).unwrap();
        let seed = upsert_seed(&resolved);
        assert!(seed.contains(&("_id".to_string(), json!("new-doc"))));
        assert!(seed.contains(&("name".to_string(), json!("alice"))));
        // range and or-branch constraints contribute nothing
        assert_eq!(seed.len(), 2);
    }
}
