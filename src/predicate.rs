use crate::filter::{DocumentId, FilterOperand};
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Column names of the pre-shredded wide-column table.
pub mod columns {
    pub const KEY: &str = "key";
    pub const TX_ID: &str = "tx_id";
    pub const EXIST_KEYS: &str = "exist_keys";
    pub const QUERY_TEXT_VALUES: &str = "query_text_values";
    pub const QUERY_DBL_VALUES: &str = "query_dbl_values";
    pub const QUERY_BOOL_VALUES: &str = "query_bool_values";
    pub const QUERY_NULL_VALUES: &str = "query_null_values";
    pub const ARRAY_CONTAINS: &str = "array_contains";
    pub const ARRAY_SIZE: &str = "array_size";
    pub const ARRAY_EQUALS: &str = "array_equals";
    pub const SUB_DOC_EQUALS: &str = "sub_doc_equals";
    pub const DOC_JSON: &str = "doc_json";
}

/// Left-hand side of a column condition: a plain column or one key of a map
/// column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnLhs {
    Column(&'static str),
    MapAccess(&'static str, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnValue {
    Text(String),
    Number(OrderedFloat<f64>),
    Boolean(bool),
    Id(DocumentId),
}

/// One concrete condition against the wide-column schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuiltCondition {
    pub lhs: ColumnLhs,
    pub operator: ColumnOperator,
    pub value: ColumnValue,
}

impl BuiltCondition {
    #[must_use]
    pub const fn new(lhs: ColumnLhs, operator: ColumnOperator, value: ColumnValue) -> Self {
        Self { lhs, operator, value }
    }
}

/// Operators usable against the per-type value-map columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl MapOperator {
    const fn column_operator(self) -> ColumnOperator {
        match self {
            Self::Eq => ColumnOperator::Eq,
            Self::Ne => ColumnOperator::Ne,
            Self::Gt => ColumnOperator::Gt,
            Self::Gte => ColumnOperator::Gte,
            Self::Lt => ColumnOperator::Lt,
            Self::Lte => ColumnOperator::Lte,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOperator {
    Contains,
    NotContains,
}

impl SetOperator {
    const fn column_operator(self) -> ColumnOperator {
        match self {
            Self::Contains => ColumnOperator::Contains,
            Self::NotContains => ColumnOperator::NotContains,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdOperator {
    Eq,
    Ne,
    In,
    Nin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InOperator {
    In,
    Nin,
}

/// A concrete condition against the wide-column schema, produced by resolving
/// a matched comparison expression. Immutable value object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnPredicate {
    /// Predicate on the partition key. `values` holds one entry for Eq/Ne.
    Id { operator: IdOperator, values: Vec<DocumentId> },
    Text { path: String, operator: MapOperator, value: String },
    Number { path: String, operator: MapOperator, value: OrderedFloat<f64> },
    Bool { path: String, operator: MapOperator, value: bool },
    Date { path: String, operator: MapOperator, value: DateTime<Utc> },
    IsNull { path: String, operator: SetOperator },
    Exists { path: String, exists: bool },
    /// One `$all` element (or one atomic containment token).
    ArrayContains { path: String, value: FilterOperand, operator: SetOperator },
    Size { path: String, size: u64 },
    ArrayEquals { path: String, values: Vec<FilterOperand>, negated: bool },
    SubDocEquals { path: String, entries: Vec<(String, FilterOperand)>, negated: bool },
    /// Dynamic-field `$in`/`$nin` containment set; expanded per value by the
    /// expression compiler.
    In { path: String, operator: InOperator, values: Vec<FilterOperand> },
}

impl ColumnPredicate {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Id { .. } => crate::filter::DOC_ID_FIELD,
            Self::Text { path, .. }
            | Self::Number { path, .. }
            | Self::Bool { path, .. }
            | Self::Date { path, .. }
            | Self::IsNull { path, .. }
            | Self::Exists { path, .. }
            | Self::ArrayContains { path, .. }
            | Self::Size { path, .. }
            | Self::ArrayEquals { path, .. }
            | Self::SubDocEquals { path, .. }
            | Self::In { path, .. } => path,
        }
    }

    /// The single column condition for predicate kinds that compile to one.
    /// `Id` and `In` expand per value instead; see [`Self::conditions`].
    #[must_use]
    pub fn built_condition(&self) -> Option<BuiltCondition> {
        match self {
            Self::Text { path, operator, value } => Some(BuiltCondition::new(
                ColumnLhs::MapAccess(columns::QUERY_TEXT_VALUES, path.clone()),
                operator.column_operator(),
                ColumnValue::Text(value.clone()),
            )),
            Self::Number { path, operator, value } => Some(BuiltCondition::new(
                ColumnLhs::MapAccess(columns::QUERY_DBL_VALUES, path.clone()),
                operator.column_operator(),
                ColumnValue::Number(*value),
            )),
            Self::Bool { path, operator, value } => Some(BuiltCondition::new(
                ColumnLhs::MapAccess(columns::QUERY_BOOL_VALUES, path.clone()),
                operator.column_operator(),
                ColumnValue::Boolean(*value),
            )),
            // dates are shredded as epoch millis into the number map
            Self::Date { path, operator, value } => Some(BuiltCondition::new(
                ColumnLhs::MapAccess(columns::QUERY_DBL_VALUES, path.clone()),
                operator.column_operator(),
                ColumnValue::Number(OrderedFloat(value.timestamp_millis() as f64)),
            )),
            Self::IsNull { path, operator } => Some(BuiltCondition::new(
                ColumnLhs::Column(columns::QUERY_NULL_VALUES),
                operator.column_operator(),
                ColumnValue::Text(path.clone()),
            )),
            Self::Exists { path, exists } => Some(BuiltCondition::new(
                ColumnLhs::Column(columns::EXIST_KEYS),
                if *exists { ColumnOperator::Contains } else { ColumnOperator::NotContains },
                ColumnValue::Text(path.clone()),
            )),
            Self::ArrayContains { path, value, operator } => Some(BuiltCondition::new(
                ColumnLhs::Column(columns::ARRAY_CONTAINS),
                operator.column_operator(),
                ColumnValue::Text(containment_token(path, value)),
            )),
            Self::Size { path, size } => Some(BuiltCondition::new(
                ColumnLhs::MapAccess(columns::ARRAY_SIZE, path.clone()),
                ColumnOperator::Eq,
                ColumnValue::Number(OrderedFloat(*size as f64)),
            )),
            Self::ArrayEquals { path, values, negated } => Some(BuiltCondition::new(
                ColumnLhs::MapAccess(columns::ARRAY_EQUALS, path.clone()),
                if *negated { ColumnOperator::Ne } else { ColumnOperator::Eq },
                ColumnValue::Text(DocValueHasher::hash(&FilterOperand::Array(values.clone()))),
            )),
            Self::SubDocEquals { path, entries, negated } => Some(BuiltCondition::new(
                ColumnLhs::MapAccess(columns::SUB_DOC_EQUALS, path.clone()),
                if *negated { ColumnOperator::Ne } else { ColumnOperator::Eq },
                ColumnValue::Text(DocValueHasher::hash(&FilterOperand::SubDoc(entries.clone()))),
            )),
            Self::Id { .. } | Self::In { .. } => None,
        }
    }

    /// Per-value conditions for the set predicates (`Id`, dynamic `In`).
    #[must_use]
    pub fn conditions(&self) -> Vec<BuiltCondition> {
        match self {
            Self::Id { operator, values } => {
                let op = match operator {
                    IdOperator::Eq | IdOperator::In => ColumnOperator::Eq,
                    IdOperator::Ne | IdOperator::Nin => ColumnOperator::Ne,
                };
                values
                    .iter()
                    .map(|id| {
                        BuiltCondition::new(
                            ColumnLhs::Column(columns::KEY),
                            op,
                            ColumnValue::Id(id.clone()),
                        )
                    })
                    .collect()
            }
            Self::In { path, operator, values } => {
                let op = match operator {
                    InOperator::In => ColumnOperator::Contains,
                    InOperator::Nin => ColumnOperator::NotContains,
                };
                values
                    .iter()
                    .map(|value| {
                        BuiltCondition::new(
                            ColumnLhs::Column(columns::ARRAY_CONTAINS),
                            op,
                            ColumnValue::Text(containment_token(path, value)),
                        )
                    })
                    .collect()
            }
            _ => self.built_condition().into_iter().collect(),
        }
    }

    /// Default JSON representation of an equality predicate, used to seed a
    /// synthetic document when an upsert matches nothing.
    #[must_use]
    pub fn default_json(&self) -> Option<Value> {
        match self {
            Self::Id { operator: IdOperator::Eq, values } => {
                values.first().map(DocumentId::to_json)
            }
            Self::Text { operator: MapOperator::Eq, value, .. } => {
                Some(Value::String(value.clone()))
            }
            Self::Number { operator: MapOperator::Eq, value, .. } => {
                Some(FilterOperand::Number(*value).to_json())
            }
            Self::Bool { operator: MapOperator::Eq, value, .. } => Some(Value::Bool(*value)),
            Self::Date { operator: MapOperator::Eq, value, .. } => {
                Some(FilterOperand::Date(*value).to_json())
            }
            Self::IsNull { operator: SetOperator::Contains, .. } => Some(Value::Null),
            Self::ArrayEquals { values, negated: false, .. } => {
                Some(FilterOperand::Array(values.clone()).to_json())
            }
            Self::SubDocEquals { entries, negated: false, .. } => {
                Some(FilterOperand::SubDoc(entries.clone()).to_json())
            }
            _ => None,
        }
    }
}

/// Structural hasher for array/sub-document equality tokens. The hash is over
/// the canonical JSON rendering, so entry order is significant.
pub struct DocValueHasher;

impl DocValueHasher {
    #[must_use]
    pub fn hash(operand: &FilterOperand) -> String {
        let canonical =
            serde_json::to_string(&operand.to_json()).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(digest)
    }
}

/// `array_contains` tokens are the element hash prefixed with the field path.
#[must_use]
pub fn containment_token(path: &str, value: &FilterOperand) -> String {
    format!("{path} {}", DocValueHasher::hash(value))
}
