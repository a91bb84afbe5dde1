use crate::errors::DbError;
use crate::filter::{
    DOC_ID_FIELD, DocumentId, FilterOperand, FilterOperator, JsonType, LogicalExpression,
};
use crate::matcher::capture::{Capture, CaptureExpression, CaptureMarker, CapturePath};
use crate::matcher::rules::{FilterMatchRules, MatchStrategy};
use crate::matcher::ResolvedExpression;
use crate::predicate::{ColumnPredicate, IdOperator, InOperator, MapOperator, SetOperator};

use CaptureMarker as M;
use CapturePath::{Literal, Wildcard};
use FilterOperator as Op;

const EQ: &[Op] = &[Op::Eq];
const NE: &[Op] = &[Op::Ne];
const IN: &[Op] = &[Op::In];
const NIN: &[Op] = &[Op::Nin];
const RANGE: &[Op] = &[Op::Gt, Op::Gte, Op::Lt, Op::Lte];
const EQ_RANGE: &[Op] = &[Op::Eq, Op::Gt, Op::Gte, Op::Lt, Op::Lte];
const EXISTS: &[Op] = &[Op::Exists];
const ALL: &[Op] = &[Op::All];
const SIZE: &[Op] = &[Op::Size];

/// The standard capture rule table shared by the filterable commands
/// (find/update/delete all accept the same filter shapes):
/// an empty rule, two strict by-id rules, and one greedy dynamic rule with
/// the open field set.
#[derive(Debug, Clone)]
pub struct FilterResolver {
    rules: FilterMatchRules,
}

impl Default for FilterResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterResolver {
    #[must_use]
    pub fn new() -> Self {
        let mut rules = FilterMatchRules::default();
        rules.add_rule(MatchStrategy::Empty, Vec::new(), resolve_no_filter);
        rules.add_rule(
            MatchStrategy::Strict,
            vec![Capture::new(M::Id, Literal(DOC_ID_FIELD), EQ, JsonType::DocumentId)],
            resolve_id,
        );
        rules.add_rule(
            MatchStrategy::Strict,
            vec![Capture::new(M::IdIn, Literal(DOC_ID_FIELD), IN, JsonType::Array)],
            resolve_id,
        );
        rules.add_rule(MatchStrategy::Greedy, dynamic_captures(), resolve_dynamic);
        Self { rules }
    }

    pub fn resolve(&self, tree: &LogicalExpression) -> Result<ResolvedExpression, DbError> {
        self.rules.apply(tree)
    }
}

fn dynamic_captures() -> Vec<Capture> {
    vec![
        Capture::new(M::Id, Literal(DOC_ID_FIELD), EQ, JsonType::DocumentId),
        Capture::new(M::IdNe, Literal(DOC_ID_FIELD), NE, JsonType::DocumentId),
        Capture::new(M::IdIn, Literal(DOC_ID_FIELD), IN, JsonType::Array),
        Capture::new(M::IdNin, Literal(DOC_ID_FIELD), NIN, JsonType::Array),
        Capture::new(M::IdRange, Literal(DOC_ID_FIELD), RANGE, JsonType::DocumentId),
        Capture::new(M::DynamicIn, Wildcard, IN, JsonType::Array),
        Capture::new(M::DynamicNin, Wildcard, NIN, JsonType::Array),
        Capture::new(M::Number, Wildcard, EQ_RANGE, JsonType::Number),
        Capture::new(M::Text, Wildcard, EQ, JsonType::String),
        Capture::new(M::Bool, Wildcard, EQ, JsonType::Boolean),
        Capture::new(M::NullValue, Wildcard, EQ, JsonType::Null),
        Capture::new(M::Date, Wildcard, EQ_RANGE, JsonType::Date),
        Capture::new(M::Exists, Wildcard, EXISTS, JsonType::Boolean),
        Capture::new(M::All, Wildcard, ALL, JsonType::Array),
        Capture::new(M::Size, Wildcard, SIZE, JsonType::Number),
        Capture::new(M::ArrayEquals, Wildcard, EQ, JsonType::Array),
        Capture::new(M::SubDocEquals, Wildcard, EQ, JsonType::SubDoc),
        Capture::new(M::NumberNe, Wildcard, NE, JsonType::Number),
        Capture::new(M::TextNe, Wildcard, NE, JsonType::String),
        Capture::new(M::BoolNe, Wildcard, NE, JsonType::Boolean),
        Capture::new(M::NullNe, Wildcard, NE, JsonType::Null),
        Capture::new(M::DateNe, Wildcard, NE, JsonType::Date),
        Capture::new(M::ArrayEqualsNe, Wildcard, NE, JsonType::Array),
        Capture::new(M::SubDocEqualsNe, Wildcard, NE, JsonType::SubDoc),
    ]
}

fn resolve_no_filter(_capture: &CaptureExpression) -> Result<Vec<ColumnPredicate>, DbError> {
    Ok(Vec::new())
}

fn resolve_id(capture: &CaptureExpression) -> Result<Vec<ColumnPredicate>, DbError> {
    let mut predicates = Vec::new();
    for operation in &capture.operations {
        match capture.marker {
            M::Id => predicates.push(ColumnPredicate::Id {
                operator: IdOperator::Eq,
                values: vec![expect_id(&operation.operand)?],
            }),
            M::IdIn => predicates.push(ColumnPredicate::Id {
                operator: IdOperator::In,
                values: expect_ids(&operation.operand)?,
            }),
            other => {
                return Err(DbError::UnresolvableFilter(format!(
                    "unexpected capture {other:?} in by-id rule"
                )));
            }
        }
    }
    Ok(predicates)
}

fn resolve_dynamic(capture: &CaptureExpression) -> Result<Vec<ColumnPredicate>, DbError> {
    let path = capture.path.clone();
    let mut predicates = Vec::new();
    for operation in &capture.operations {
        let operand = &operation.operand;
        match capture.marker {
            M::Id => predicates.push(ColumnPredicate::Id {
                operator: IdOperator::Eq,
                values: vec![expect_id(operand)?],
            }),
            M::IdNe => predicates.push(ColumnPredicate::Id {
                operator: IdOperator::Ne,
                values: vec![expect_id(operand)?],
            }),
            M::IdIn => predicates.push(ColumnPredicate::Id {
                operator: IdOperator::In,
                values: expect_ids(operand)?,
            }),
            M::IdNin => predicates.push(ColumnPredicate::Id {
                operator: IdOperator::Nin,
                values: expect_ids(operand)?,
            }),
            // numeric id ranges are answered by the shredded number map
            M::IdRange => {
                let id = expect_id(operand)?;
                let Some(number) = id.as_number() else {
                    return Err(DbError::InvalidFilter(format!(
                        "{} on _id requires a numeric id",
                        operation.operator.token()
                    )));
                };
                predicates.push(ColumnPredicate::Number {
                    path: DOC_ID_FIELD.to_string(),
                    operator: map_operator(operation.operator)?,
                    value: number.into(),
                });
            }
            M::DynamicIn => predicates.push(ColumnPredicate::In {
                path: path.clone(),
                operator: InOperator::In,
                values: expect_array(operand)?,
            }),
            M::DynamicNin => predicates.push(ColumnPredicate::In {
                path: path.clone(),
                operator: InOperator::Nin,
                values: expect_array(operand)?,
            }),
            M::Text | M::TextNe => predicates.push(ColumnPredicate::Text {
                path: path.clone(),
                operator: map_operator(operation.operator)?,
                value: expect_string(operand)?,
            }),
            M::Number | M::NumberNe => predicates.push(ColumnPredicate::Number {
                path: path.clone(),
                operator: map_operator(operation.operator)?,
                value: expect_number(operand)?.into(),
            }),
            M::Bool | M::BoolNe => predicates.push(ColumnPredicate::Bool {
                path: path.clone(),
                operator: map_operator(operation.operator)?,
                value: expect_bool(operand)?,
            }),
            M::NullValue => predicates.push(ColumnPredicate::IsNull {
                path: path.clone(),
                operator: SetOperator::Contains,
            }),
            M::NullNe => predicates.push(ColumnPredicate::IsNull {
                path: path.clone(),
                operator: SetOperator::NotContains,
            }),
            M::Date | M::DateNe => predicates.push(ColumnPredicate::Date {
                path: path.clone(),
                operator: map_operator(operation.operator)?,
                value: expect_date(operand)?,
            }),
            M::Exists => predicates.push(ColumnPredicate::Exists {
                path: path.clone(),
                exists: expect_bool(operand)?,
            }),
            M::All => {
                for element in expect_array(operand)? {
                    predicates.push(ColumnPredicate::ArrayContains {
                        path: path.clone(),
                        value: element,
                        operator: SetOperator::Contains,
                    });
                }
            }
            M::Size => {
                let size = expect_number(operand)?;
                predicates.push(ColumnPredicate::Size { path: path.clone(), size: size as u64 });
            }
            M::ArrayEquals | M::ArrayEqualsNe => predicates.push(ColumnPredicate::ArrayEquals {
                path: path.clone(),
                values: expect_array(operand)?,
                negated: capture.marker == M::ArrayEqualsNe,
            }),
            M::SubDocEquals | M::SubDocEqualsNe => {
                predicates.push(ColumnPredicate::SubDocEquals {
                    path: path.clone(),
                    entries: expect_subdoc(operand)?,
                    negated: capture.marker == M::SubDocEqualsNe,
                });
            }
        }
    }
    Ok(predicates)
}

fn map_operator(operator: FilterOperator) -> Result<MapOperator, DbError> {
    Ok(match operator {
        Op::Eq => MapOperator::Eq,
        Op::Ne => MapOperator::Ne,
        Op::Gt => MapOperator::Gt,
        Op::Gte => MapOperator::Gte,
        Op::Lt => MapOperator::Lt,
        Op::Lte => MapOperator::Lte,
        other => return Err(DbError::UnsupportedFilterOperator(other.token().to_string())),
    })
}

fn expect_id(operand: &FilterOperand) -> Result<DocumentId, DbError> {
    match operand {
        FilterOperand::DocumentId(id) => Ok(id.clone()),
        other => Err(type_mismatch("DOCUMENT_ID", other)),
    }
}

fn expect_ids(operand: &FilterOperand) -> Result<Vec<DocumentId>, DbError> {
    match operand {
        FilterOperand::Array(values) => values.iter().map(expect_id).collect(),
        other => Err(type_mismatch("ARRAY of ids", other)),
    }
}

fn expect_array(operand: &FilterOperand) -> Result<Vec<FilterOperand>, DbError> {
    match operand {
        FilterOperand::Array(values) => Ok(values.clone()),
        other => Err(type_mismatch("ARRAY", other)),
    }
}

fn expect_string(operand: &FilterOperand) -> Result<String, DbError> {
    match operand {
        FilterOperand::String(s) => Ok(s.clone()),
        other => Err(type_mismatch("STRING", other)),
    }
}

fn expect_number(operand: &FilterOperand) -> Result<f64, DbError> {
    match operand {
        FilterOperand::Number(n) => Ok(n.0),
        other => Err(type_mismatch("NUMBER", other)),
    }
}

fn expect_bool(operand: &FilterOperand) -> Result<bool, DbError> {
    match operand {
        FilterOperand::Boolean(b) => Ok(*b),
        other => Err(type_mismatch("BOOLEAN", other)),
    }
}

fn expect_date(operand: &FilterOperand) -> Result<chrono::DateTime<chrono::Utc>, DbError> {
    match operand {
        FilterOperand::Date(d) => Ok(*d),
        other => Err(type_mismatch("DATE", other)),
    }
}

fn expect_subdoc(operand: &FilterOperand) -> Result<Vec<(String, FilterOperand)>, DbError> {
    match operand {
        FilterOperand::SubDoc(entries) => Ok(entries.clone()),
        other => Err(type_mismatch("OBJECT", other)),
    }
}

fn type_mismatch(expected: &str, got: &FilterOperand) -> DbError {
    DbError::UnsupportedFilterType(format!("expected {expected}, got {:?}", got.json_type()))
}
