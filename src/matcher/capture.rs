use crate::filter::{ComparisonExpression, DOC_ID_FIELD, FilterOperation, FilterOperator, JsonType};

/// Enumerated capture tags. One tag per declared capture; the resolve
/// function switches on the tag to build the matching column predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureMarker {
    Id,
    IdNe,
    IdIn,
    IdNin,
    IdRange,
    DynamicIn,
    DynamicNin,
    Text,
    TextNe,
    Number,
    NumberNe,
    Bool,
    BoolNe,
    NullValue,
    NullNe,
    Date,
    DateNe,
    Exists,
    All,
    Size,
    ArrayEquals,
    ArrayEqualsNe,
    SubDocEquals,
    SubDocEqualsNe,
}

/// Path pattern of a capture: a literal field name, or a wildcard matching
/// any path except the document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturePath {
    Literal(&'static str),
    Wildcard,
}

impl CapturePath {
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Literal(p) => *p == path,
            Self::Wildcard => path != DOC_ID_FIELD,
        }
    }
}

/// A declared placeholder: path pattern + allowed operators + expected
/// operand type. Built once at resolver construction, read-only afterwards.
#[derive(Debug, Clone)]
pub struct Capture {
    pub marker: CaptureMarker,
    pub path: CapturePath,
    pub operators: &'static [FilterOperator],
    pub value_type: JsonType,
}

impl Capture {
    #[must_use]
    pub const fn new(
        marker: CaptureMarker,
        path: CapturePath,
        operators: &'static [FilterOperator],
        value_type: JsonType,
    ) -> Self {
        Self { marker, path, operators, value_type }
    }

    /// Returns the operations of `expression` this capture covers: path must
    /// match and both the operator and operand type must be members of the
    /// allowed sets. Empty result means no match.
    #[must_use]
    pub fn matched_operations(&self, expression: &ComparisonExpression) -> Vec<FilterOperation> {
        if !self.path.matches(&expression.path) {
            return Vec::new();
        }
        expression
            .operations
            .iter()
            .filter(|op| {
                self.operators.contains(&op.operator)
                    && op.operand.json_type() == self.value_type
            })
            .cloned()
            .collect()
    }
}

/// A matched capture handed to a rule's resolve function.
#[derive(Debug, Clone)]
pub struct CaptureExpression {
    pub marker: CaptureMarker,
    pub operations: Vec<FilterOperation>,
    pub path: String,
}
