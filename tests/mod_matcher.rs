use serde_json::json;
use stratadb::DbError;
use stratadb::OperationsConfig;
use stratadb::filter::{FilterOperator, FilterParser, JsonType, LogicalExpression};
use stratadb::matcher::{
    Capture, CaptureExpression, CaptureMarker, CapturePath, FilterMatchRules, MatchStrategy,
};
use stratadb::predicate::ColumnPredicate;

const EQ: &[FilterOperator] = &[FilterOperator::Eq];

fn resolve_nothing(_capture: &CaptureExpression) -> Result<Vec<ColumnPredicate>, DbError> {
    Ok(Vec::new())
}

fn parse(filter: serde_json::Value) -> LogicalExpression {
    FilterParser::new(&OperationsConfig::default()).parse(&filter).unwrap()
}

fn strict_two_capture_rules() -> FilterMatchRules {
    let mut rules = FilterMatchRules::default();
    rules.add_rule(
        MatchStrategy::Strict,
        vec![
            Capture::new(CaptureMarker::Text, CapturePath::Literal("a"), EQ, JsonType::String),
            Capture::new(CaptureMarker::Number, CapturePath::Literal("b"), EQ, JsonType::Number),
        ],
        resolve_nothing,
    );
    rules
}

#[test]
fn strict_rule_matches_exactly_its_captures() {
    let rules = strict_two_capture_rules();
    assert!(rules.apply(&parse(json!({"a": "x", "b": 1}))).is_ok());
}

#[test]
fn strict_rule_fails_when_a_comparison_stays_unmatched() {
    // two captures, three comparisons: "c" is never matched
    let rules = strict_two_capture_rules();
    let err = rules.apply(&parse(json!({"a": "x", "b": 1, "c": true}))).unwrap_err();
    assert!(matches!(err, DbError::UnresolvableFilter(_)));
}

#[test]
fn strict_rule_fails_when_a_capture_stays_unconsumed() {
    let rules = strict_two_capture_rules();
    let err = rules.apply(&parse(json!({"a": "x"}))).unwrap_err();
    assert!(matches!(err, DbError::UnresolvableFilter(_)));
}

#[test]
fn strict_capture_cannot_match_twice() {
    let rules = strict_two_capture_rules();
    let err = rules
        .apply(&parse(json!({"$and": [{"a": "x"}, {"a": "y"}, {"b": 1}]})))
        .unwrap_err();
    assert!(matches!(err, DbError::UnresolvableFilter(_)));
}

#[test]
fn greedy_wildcard_matches_zero_or_more_comparisons() {
    let mut rules = FilterMatchRules::default();
    rules.add_rule(
        MatchStrategy::Greedy,
        vec![Capture::new(CaptureMarker::Text, CapturePath::Wildcard, EQ, JsonType::String)],
        resolve_nothing,
    );
    // zero matches
    assert!(rules.apply(&parse(json!({}))).is_ok());
    // several matches through the same capture
    assert!(rules.apply(&parse(json!({"a": "x", "b": "y", "c": "z"}))).is_ok());
    // an uncovered comparison still fails the rule
    let err = rules.apply(&parse(json!({"a": "x", "n": 5}))).unwrap_err();
    assert!(matches!(err, DbError::UnresolvableFilter(_)));
}

#[test]
fn empty_rule_only_accepts_the_empty_filter() {
    let mut rules = FilterMatchRules::default();
    rules.add_rule(MatchStrategy::Empty, Vec::new(), resolve_nothing);
    assert!(rules.apply(&parse(json!({}))).is_ok());
    assert!(rules.apply(&parse(json!({"a": "x"}))).is_err());
}

#[test]
fn first_satisfied_rule_wins() {
    // a greedy catch-all behind the strict rule answers what strict rejects
    let mut rules = strict_two_capture_rules();
    rules.add_rule(
        MatchStrategy::Greedy,
        vec![
            Capture::new(CaptureMarker::Text, CapturePath::Wildcard, EQ, JsonType::String),
            Capture::new(CaptureMarker::Bool, CapturePath::Wildcard, EQ, JsonType::Boolean),
            Capture::new(CaptureMarker::Number, CapturePath::Wildcard, EQ, JsonType::Number),
        ],
        resolve_nothing,
    );
    assert!(rules.apply(&parse(json!({"a": "x", "b": 1, "c": true}))).is_ok());
}
