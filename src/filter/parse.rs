use crate::config::OperationsConfig;
use crate::errors::DbError;
use crate::filter::expr::{LogicalExpression, LogicalOperator, pushdown_not};
use crate::filter::types::{
    ComparisonExpression, DATE_EXTENSION, DOC_ID_FIELD, DocumentId, FilterOperand,
    FilterOperation, FilterOperator, json_kind,
};
use serde_json::Value;

/// Builds a validated, NOT-free logical expression tree from a JSON filter
/// clause. Stateless apart from the configured limits; safe to share.
#[derive(Debug, Clone)]
pub struct FilterParser {
    max_in_values: usize,
    max_filter_properties: usize,
}

impl FilterParser {
    #[must_use]
    pub fn new(config: &OperationsConfig) -> Self {
        Self {
            max_in_values: config.max_in_operator_value_size,
            max_filter_properties: config.max_filter_object_properties,
        }
    }

    /// Filter clause can follow the short-cut `{"field": "value"}` instead of
    /// `{"field": {"$eq": "value"}}`.
    pub fn parse(&self, filter: &Value) -> Result<LogicalExpression, DbError> {
        let Value::Object(_) = filter else {
            return Err(DbError::UnsupportedFilterType(format!(
                "filter must be an OBJECT, got {}",
                json_kind(filter)
            )));
        };
        let mut implicit_and = LogicalExpression::and();
        self.populate(&mut implicit_and, filter)?;
        self.validate(&implicit_and)?;
        pushdown_not(implicit_and)
    }

    fn populate(&self, target: &mut LogicalExpression, node: &Value) -> Result<(), DbError> {
        let Value::Object(entries) = node else {
            return Err(DbError::UnsupportedFilterType(format!(
                "unsupported {} in {}",
                json_kind(node),
                target.operator.token()
            )));
        };
        for (key, value) in entries {
            self.populate_entry(target, key, value)?;
        }
        Ok(())
    }

    fn populate_entry(
        &self,
        target: &mut LogicalExpression,
        key: &str,
        value: &Value,
    ) -> Result<(), DbError> {
        match key {
            "$and" | "$or" => {
                let Value::Array(elements) = value else {
                    return Err(DbError::InvalidFilter(format!(
                        "{key} requires an ARRAY of filter objects"
                    )));
                };
                let mut child = if key == "$and" {
                    LogicalExpression::and()
                } else {
                    LogicalExpression::or()
                };
                for element in elements {
                    self.populate(&mut child, element)?;
                }
                target.expressions.push(child);
                Ok(())
            }
            "$not" => {
                let Value::Object(_) = value else {
                    return Err(DbError::InvalidFilter(
                        "$not requires a filter OBJECT".into(),
                    ));
                };
                let mut child = LogicalExpression::not();
                self.populate(&mut child, value)?;
                target.expressions.push(child);
                Ok(())
            }
            _ if key.starts_with('$') => {
                Err(DbError::UnsupportedFilterOperator(key.to_string()))
            }
            path => {
                if !is_valid_path(path) {
                    return Err(DbError::InvalidFilter(format!(
                        "filter clause path ('{path}') contains character(s) not allowed"
                    )));
                }
                match value {
                    Value::Array(_) => Err(DbError::InvalidFilter(format!(
                        "cannot filter on '{path}' by array type"
                    ))),
                    Value::Object(map) if has_operator_keys(map) => {
                        for comparison in self.comparison_list(path, map)? {
                            target.comparisons.push(comparison);
                        }
                        Ok(())
                    }
                    // shorthand: full value (scalar, $date, or sub-document) as $eq
                    _ => {
                        target.comparisons.push(ComparisonExpression::eq(
                            path,
                            operand_for(path, value)?,
                        ));
                        Ok(())
                    }
                }
            }
        }
    }

    /// The entry value can carry multiple operator/operand pairs, e.g.
    /// `{"field": {"$gt": 10, "$lt": 50}}`. Each operator becomes its own
    /// comparison expression, matching the per-operator capture granularity.
    fn comparison_list(
        &self,
        path: &str,
        map: &serde_json::Map<String, Value>,
    ) -> Result<Vec<ComparisonExpression>, DbError> {
        let mut comparisons = Vec::with_capacity(map.len());
        for (token, raw) in map {
            let Some(operator) = FilterOperator::from_token(token) else {
                return Err(DbError::UnsupportedFilterOperator(token.clone()));
            };
            let operand = match operator {
                FilterOperator::In | FilterOperator::Nin => in_operand(path, operator, raw)?,
                _ => operand_for(path, raw)?,
            };
            comparisons
                .push(ComparisonExpression::new(path, vec![FilterOperation::new(operator, operand)]));
        }
        Ok(comparisons)
    }

    fn validate(&self, root: &LogicalExpression) -> Result<(), DbError> {
        if root.id_comparison_count() > 1 {
            return Err(DbError::MultipleIdFilter);
        }
        let total = root.comparison_count();
        if total > self.max_filter_properties {
            return Err(DbError::FilterFieldsLimit {
                actual: total,
                max: self.max_filter_properties,
            });
        }
        self.validate_node(root)
    }

    fn validate_node(&self, node: &LogicalExpression) -> Result<(), DbError> {
        for child in &node.expressions {
            self.validate_node(child)?;
        }
        for comparison in &node.comparisons {
            if node.operator == LogicalOperator::Or && comparison.targets_id() {
                return Err(DbError::IdFilterInsideOr);
            }
            for operation in &comparison.operations {
                self.validate_operation(operation)?;
            }
        }
        Ok(())
    }

    fn validate_operation(&self, operation: &FilterOperation) -> Result<(), DbError> {
        match operation.operator {
            FilterOperator::In | FilterOperator::Nin => match &operation.operand {
                FilterOperand::Array(values) => {
                    if values.len() > self.max_in_values {
                        return Err(DbError::InOperatorTooLarge {
                            operator: if operation.operator == FilterOperator::In {
                                "in"
                            } else {
                                "nin"
                            },
                            max: self.max_in_values,
                        });
                    }
                    Ok(())
                }
                _ => Err(DbError::InvalidFilter(format!(
                    "{} operator must have `ARRAY`",
                    operation.operator.token()
                ))),
            },
            FilterOperator::Exists => match operation.operand {
                FilterOperand::Boolean(_) => Ok(()),
                _ => Err(DbError::InvalidFilter(
                    "$exists operator must have `BOOLEAN`".into(),
                )),
            },
            FilterOperator::All => match &operation.operand {
                FilterOperand::Array(values) if !values.is_empty() => Ok(()),
                FilterOperand::Array(_) => Err(DbError::InvalidFilter(
                    "$all operator must have at least one value".into(),
                )),
                _ => Err(DbError::InvalidFilter(
                    "$all operator must have `ARRAY` value".into(),
                )),
            },
            FilterOperator::Size => match &operation.operand {
                FilterOperand::Number(n) if n.0 >= 0.0 && n.0.fract() == 0.0 => Ok(()),
                FilterOperand::Number(_) => Err(DbError::InvalidFilter(
                    "$size operator must have integer value >= 0".into(),
                )),
                _ => Err(DbError::InvalidFilter(
                    "$size operator must have integer".into(),
                )),
            },
            op if op.is_range() => match &operation.operand {
                FilterOperand::Number(_) | FilterOperand::Date(_) => Ok(()),
                FilterOperand::DocumentId(id) if id.as_number().is_some() => Ok(()),
                _ => Err(DbError::InvalidFilter(format!(
                    "{} operator must have `DATE` or `NUMBER` value",
                    op.token()
                ))),
            },
            _ => Ok(()),
        }
    }
}

/// `_id` operands are resolved as typed document ids; everything else goes
/// through the generic operand conversion.
fn operand_for(path: &str, value: &Value) -> Result<FilterOperand, DbError> {
    if path == DOC_ID_FIELD && !value.is_array() {
        return Ok(FilterOperand::DocumentId(DocumentId::from_json(value)?));
    }
    FilterOperand::from_json(value)
}

fn in_operand(path: &str, operator: FilterOperator, raw: &Value) -> Result<FilterOperand, DbError> {
    let Value::Array(elements) = raw else {
        return Err(DbError::InvalidFilter(format!(
            "{} operator must have `ARRAY`",
            operator.token()
        )));
    };
    let mut values = Vec::with_capacity(elements.len());
    for element in elements {
        values.push(operand_for(path, element)?);
    }
    Ok(FilterOperand::Array(values))
}

fn has_operator_keys(map: &serde_json::Map<String, Value>) -> bool {
    // a $date extension object is a value, not an operator set
    map.keys().any(|k| k.starts_with('$') && k != DATE_EXTENSION)
}

fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('$')
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> FilterParser {
        FilterParser::new(&OperationsConfig::default())
    }

    #[test]
    fn shorthand_becomes_eq() {
        let tree = parser().parse(&json!({"name": "alice"})).unwrap();
        assert_eq!(tree.operator, LogicalOperator::And);
        assert_eq!(tree.comparisons.len(), 1);
        assert_eq!(tree.comparisons[0].operations[0].operator, FilterOperator::Eq);
    }

    #[test]
    fn multiple_operators_split_into_comparisons() {
        let tree = parser().parse(&json!({"age": {"$gt": 10, "$lt": 50}})).unwrap();
        assert_eq!(tree.comparisons.len(), 2);
    }

    #[test]
    fn id_operand_is_typed() {
        let tree = parser().parse(&json!({"_id": "doc1"})).unwrap();
        match &tree.comparisons[0].operations[0].operand {
            FilterOperand::DocumentId(DocumentId::String(s)) => assert_eq!(s, "doc1"),
            other => panic!("expected document id, got {other:?}"),
        }
    }

    #[test]
    fn two_id_comparisons_fail() {
        let err = parser()
            .parse(&json!({"$and": [{"_id": "a"}, {"_id": "b"}]}))
            .unwrap_err();
        assert!(matches!(err, DbError::MultipleIdFilter));
    }

    #[test]
    fn id_under_or_fails() {
        let err = parser()
            .parse(&json!({"$or": [{"_id": "a"}, {"x": 1}]}))
            .unwrap_err();
        assert!(matches!(err, DbError::IdFilterInsideOr));
    }

    #[test]
    fn unknown_operator_fails() {
        let err = parser().parse(&json!({"a": {"$regex": "x"}})).unwrap_err();
        assert!(matches!(err, DbError::UnsupportedFilterOperator(_)));
    }

    #[test]
    fn in_requires_array_and_respects_limit() {
        assert!(parser().parse(&json!({"a": {"$in": 3}})).is_err());
        let mut cfg = OperationsConfig::default();
        cfg.max_in_operator_value_size = 2;
        let small = FilterParser::new(&cfg);
        let err = small.parse(&json!({"a": {"$in": [1, 2, 3]}})).unwrap_err();
        assert!(matches!(err, DbError::InOperatorTooLarge { .. }));
    }

    #[test]
    fn size_must_be_non_negative_integer() {
        assert!(parser().parse(&json!({"a": {"$size": 2}})).is_ok());
        assert!(parser().parse(&json!({"a": {"$size": -1}})).is_err());
        assert!(parser().parse(&json!({"a": {"$size": 1.5}})).is_err());
    }

    #[test]
    fn range_requires_date_or_number() {
        assert!(parser().parse(&json!({"a": {"$gt": "zzz"}})).is_err());
        assert!(parser().parse(&json!({"a": {"$gt": {"$date": 1000}}})).is_ok());
        assert!(parser().parse(&json!({"_id": {"$gte": 5}})).is_ok());
        assert!(parser().parse(&json!({"_id": {"$gte": "abc"}})).is_err());
    }

    #[test]
    fn not_is_pushed_down() {
        let tree = parser()
            .parse(&json!({"$not": {"$or": [{"a": 1}, {"b": 2}]}}))
            .unwrap();
        assert!(!tree.contains_not());
        // NOT(OR(a=1, b=2)) => AND(a!=1, b!=2)
        let inner = &tree.expressions[0].expressions[0];
        assert_eq!(inner.operator, LogicalOperator::And);
        assert!(
            inner
                .comparisons
                .iter()
                .all(|c| c.operations[0].operator == FilterOperator::Ne)
        );
    }

    #[test]
    fn filter_field_limit_enforced() {
        let mut cfg = OperationsConfig::default();
        cfg.max_filter_object_properties = 1;
        let p = FilterParser::new(&cfg);
        let err = p.parse(&json!({"a": 1, "b": 2})).unwrap_err();
        assert!(matches!(err, DbError::FilterFieldsLimit { .. }));
    }
}
