use crate::errors::DbError;
use crate::filter::{LogicalExpression, LogicalOperator};
use crate::matcher::capture::{Capture, CaptureExpression};
use crate::matcher::{ResolvedComparison, ResolvedExpression};
use crate::predicate::ColumnPredicate;

/// Policy governing whether all captures, all expressions, or neither must be
/// fully consumed for a rule to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Satisfied only by a filter with no children and no comparisons.
    Empty,
    /// Every capture must match exactly once and every comparison expression
    /// must be matched by some capture.
    Strict,
    /// Every comparison expression must be matched; captures may match zero
    /// or more times.
    Greedy,
}

pub type ResolveFn = fn(&CaptureExpression) -> Result<Vec<ColumnPredicate>, DbError>;

/// One ordered entry of a resolver's rule table.
#[derive(Debug, Clone)]
pub struct MatchRule {
    pub strategy: MatchStrategy,
    pub captures: Vec<Capture>,
    pub resolve: ResolveFn,
}

impl MatchRule {
    /// Attempts this rule against the tree. `Ok(None)` means the rule does
    /// not apply and the next rule should be tried; a resolve failure is a
    /// hard error.
    fn try_match(&self, tree: &LogicalExpression) -> Result<Option<ResolvedExpression>, DbError> {
        if self.strategy == MatchStrategy::Empty {
            if tree.is_empty() {
                return Ok(Some(ResolvedExpression::and()));
            }
            return Ok(None);
        }
        let mut consumed = vec![false; self.captures.len()];
        let Some(resolved) = self.capture_node(tree, &mut consumed)? else {
            return Ok(None);
        };
        if self.strategy == MatchStrategy::Strict && !consumed.iter().all(|c| *c) {
            return Ok(None);
        }
        Ok(Some(resolved))
    }

    /// Depth-first traversal. For each comparison the captures are tested in
    /// declaration order; the first capture that matches resolves it
    /// (first-match-wins). An unmatched comparison fails the whole rule.
    fn capture_node(
        &self,
        node: &LogicalExpression,
        consumed: &mut [bool],
    ) -> Result<Option<ResolvedExpression>, DbError> {
        let mut expressions = Vec::with_capacity(node.expressions.len());
        for child in &node.expressions {
            match self.capture_node(child, consumed)? {
                Some(resolved) => expressions.push(resolved),
                None => return Ok(None),
            }
        }
        let mut comparisons = Vec::with_capacity(node.comparisons.len());
        'comparisons: for comparison in &node.comparisons {
            for (index, capture) in self.captures.iter().enumerate() {
                if self.strategy == MatchStrategy::Strict && consumed[index] {
                    continue;
                }
                let operations = capture.matched_operations(comparison);
                if operations.is_empty() {
                    continue;
                }
                let capture_expression = CaptureExpression {
                    marker: capture.marker,
                    operations,
                    path: comparison.path.clone(),
                };
                let predicates = (self.resolve)(&capture_expression)?;
                comparisons
                    .push(ResolvedComparison { path: comparison.path.clone(), predicates });
                if self.strategy == MatchStrategy::Strict {
                    consumed[index] = true;
                }
                continue 'comparisons;
            }
            return Ok(None);
        }
        // NOT nodes are eliminated before matching; anything else is And/Or
        let operator = match node.operator {
            LogicalOperator::Or => LogicalOperator::Or,
            _ => LogicalOperator::And,
        };
        Ok(Some(ResolvedExpression { operator, expressions, comparisons }))
    }
}

/// Ordered rule set; the first rule whose strategy is satisfied wins.
/// Built once at resolver construction and never mutated, so one instance
/// safely serves concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct FilterMatchRules {
    rules: Vec<MatchRule>,
}

impl FilterMatchRules {
    pub fn add_rule(
        &mut self,
        strategy: MatchStrategy,
        captures: Vec<Capture>,
        resolve: ResolveFn,
    ) {
        self.rules.push(MatchRule { strategy, captures, resolve });
    }

    /// Matches the tree against the rules in order and resolves every
    /// comparison expression of the winning rule into column predicates.
    pub fn apply(&self, tree: &LogicalExpression) -> Result<ResolvedExpression, DbError> {
        for rule in &self.rules {
            if let Some(resolved) = rule.try_match(tree)? {
                log::debug!(
                    "filter matched {:?} rule with {} captures",
                    rule.strategy,
                    rule.captures.len()
                );
                return Ok(resolved);
            }
        }
        Err(DbError::UnresolvableFilter(
            tree.first_comparison_path().unwrap_or("<empty>").to_string(),
        ))
    }
}
