use proptest::prelude::*;
use stratadb::filter::{
    ComparisonExpression, FilterOperand, FilterOperation, FilterOperator, LogicalExpression,
    LogicalOperator, pushdown_not,
};

fn operand() -> impl Strategy<Value = FilterOperand> {
    prop_oneof![
        any::<bool>().prop_map(FilterOperand::Boolean),
        (-1000.0..1000.0f64).prop_map(|n| FilterOperand::Number(n.into())),
        "[a-z]{1,8}".prop_map(FilterOperand::String),
    ]
}

fn comparison() -> impl Strategy<Value = ComparisonExpression> {
    let operators = prop::sample::select(vec![
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::Lt,
        FilterOperator::Lte,
    ]);
    ("[a-z]{1,6}", operators, operand()).prop_map(|(path, operator, operand)| {
        ComparisonExpression::new(path, vec![FilterOperation::new(operator, operand)])
    })
}

fn tree() -> impl Strategy<Value = LogicalExpression> {
    let leaf = prop::collection::vec(comparison(), 1..4).prop_map(|comparisons| {
        LogicalExpression {
            operator: LogicalOperator::And,
            expressions: Vec::new(),
            comparisons,
        }
    });
    leaf.prop_recursive(4, 24, 3, |inner| {
        (
            prop::sample::select(vec![
                LogicalOperator::And,
                LogicalOperator::Or,
                LogicalOperator::Not,
            ]),
            prop::collection::vec(inner, 1..3),
            prop::collection::vec(comparison(), 0..3),
        )
            .prop_map(|(operator, expressions, comparisons)| LogicalExpression {
                operator,
                expressions,
                comparisons,
            })
    })
}

proptest! {
    #[test]
    fn prop_pushdown_removes_every_not(t in tree()) {
        let out = pushdown_not(t).unwrap();
        prop_assert!(!out.contains_not());
    }

    #[test]
    fn prop_pushdown_is_idempotent(t in tree()) {
        let once = pushdown_not(t).unwrap();
        let twice = pushdown_not(once.clone()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_pushdown_preserves_leaf_count(t in tree()) {
        let before = t.comparison_count();
        let out = pushdown_not(t).unwrap();
        prop_assert_eq!(out.comparison_count(), before);
    }
}
