use crate::errors::DbError;
use crate::filter::types::{
    ComparisonExpression, FilterOperand, FilterOperation, FilterOperator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

impl LogicalOperator {
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::And => "$and",
            Self::Or => "$or",
            Self::Not => "$not",
        }
    }
}

/// Recursive AND/OR/NOT node combining comparison expressions and/or further
/// logical expressions. Built once per request from the parsed filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalExpression {
    pub operator: LogicalOperator,
    pub expressions: Vec<LogicalExpression>,
    pub comparisons: Vec<ComparisonExpression>,
}

impl LogicalExpression {
    #[must_use]
    pub const fn and() -> Self {
        Self { operator: LogicalOperator::And, expressions: Vec::new(), comparisons: Vec::new() }
    }

    #[must_use]
    pub const fn or() -> Self {
        Self { operator: LogicalOperator::Or, expressions: Vec::new(), comparisons: Vec::new() }
    }

    #[must_use]
    pub const fn not() -> Self {
        Self { operator: LogicalOperator::Not, expressions: Vec::new(), comparisons: Vec::new() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty() && self.comparisons.is_empty()
    }

    /// Total number of comparison expressions in the whole tree.
    #[must_use]
    pub fn comparison_count(&self) -> usize {
        self.comparisons.len()
            + self.expressions.iter().map(Self::comparison_count).sum::<usize>()
    }

    /// Number of comparison expressions targeting the document id.
    #[must_use]
    pub fn id_comparison_count(&self) -> usize {
        self.comparisons.iter().filter(|c| c.targets_id()).count()
            + self.expressions.iter().map(Self::id_comparison_count).sum::<usize>()
    }

    #[must_use]
    pub fn contains_not(&self) -> bool {
        self.operator == LogicalOperator::Not
            || self.expressions.iter().any(Self::contains_not)
    }

    /// Path of the first comparison expression, depth-first. Used for error
    /// reporting when no match rule applies.
    #[must_use]
    pub fn first_comparison_path(&self) -> Option<&str> {
        if let Some(c) = self.comparisons.first() {
            return Some(&c.path);
        }
        self.expressions.iter().find_map(Self::first_comparison_path)
    }
}

/// Eliminates every NOT node by De Morgan transformation. Pure: the input is
/// consumed and a new tree containing only AND/OR nodes is returned.
///
/// A NOT node's contents are an implicit conjunction, so
/// `NOT(x, y) = NOT(x) OR NOT(y)`. Leaf comparisons are negated to their
/// complementary operator; `$exists` flips its boolean operand; `$all` and
/// `$size` have no complement and fail.
pub fn pushdown_not(expr: LogicalExpression) -> Result<LogicalExpression, DbError> {
    match expr.operator {
        LogicalOperator::Not => {
            let inner = LogicalExpression {
                operator: LogicalOperator::And,
                expressions: expr.expressions,
                comparisons: expr.comparisons,
            };
            pushdown_not(negate(inner)?)
        }
        operator => {
            let expressions = expr
                .expressions
                .into_iter()
                .map(pushdown_not)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LogicalExpression { operator, expressions, comparisons: expr.comparisons })
        }
    }
}

fn negate(expr: LogicalExpression) -> Result<LogicalExpression, DbError> {
    match expr.operator {
        // double negation: contents resume as a conjunction
        LogicalOperator::Not => Ok(LogicalExpression {
            operator: LogicalOperator::And,
            expressions: expr.expressions,
            comparisons: expr.comparisons,
        }),
        LogicalOperator::And | LogicalOperator::Or => {
            let flipped = if expr.operator == LogicalOperator::And {
                LogicalOperator::Or
            } else {
                LogicalOperator::And
            };
            let expressions = expr
                .expressions
                .into_iter()
                .map(negate)
                .collect::<Result<Vec<_>, _>>()?;
            let mut comparisons = Vec::new();
            for comparison in expr.comparisons {
                // a comparison with k operations is a conjunction of k leaves;
                // its negation contributes k single-operation comparisons to
                // the flipped node
                for operation in &comparison.operations {
                    comparisons
                        .push(negate_operation(&comparison.path, operation)?);
                }
            }
            Ok(LogicalExpression { operator: flipped, expressions, comparisons })
        }
    }
}

fn negate_operation(
    path: &str,
    operation: &FilterOperation,
) -> Result<ComparisonExpression, DbError> {
    let negated = match operation.operator {
        FilterOperator::Exists => match &operation.operand {
            FilterOperand::Boolean(b) => FilterOperation::new(
                FilterOperator::Exists,
                FilterOperand::Boolean(!b),
            ),
            _ => {
                return Err(DbError::InvalidFilter(
                    "$exists operator must have `BOOLEAN`".into(),
                ));
            }
        },
        op => match op.negated() {
            Some(flipped) => FilterOperation::new(flipped, operation.operand.clone()),
            None => {
                return Err(DbError::UnsupportedFilterOperator(format!(
                    "{} cannot be negated with $not",
                    op.token()
                )));
            }
        },
    };
    Ok(ComparisonExpression::new(path, vec![negated]))
}
