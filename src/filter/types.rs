use crate::errors::DbError;
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Reserved path of the document id in every filter and document.
pub const DOC_ID_FIELD: &str = "_id";

/// Key of the EJSON date extension: `{"$date": <epoch millis>}`.
pub const DATE_EXTENSION: &str = "$date";

/// Typed document id. The store's partition key accepts a small closed set of
/// scalar JSON types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentId {
    Null,
    Boolean(bool),
    Number(OrderedFloat<f64>),
    String(String),
}

impl DocumentId {
    pub fn from_json(value: &Value) -> Result<Self, DbError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Boolean(*b)),
            Value::Number(n) => Ok(Self::Number(OrderedFloat(n.as_f64().unwrap_or(f64::NAN)))),
            Value::String(s) => Ok(Self::String(s.clone())),
            other => Err(DbError::UnsupportedFilterType(format!(
                "_id cannot be of type {}",
                json_kind(other)
            ))),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(n.0)
                .map_or(Value::Null, Value::Number),
            Self::String(s) => Value::String(s.clone()),
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n.0),
            _ => None,
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean(_) => 1,
            Self::Number(_) => 2,
            Self::String(_) => 3,
        }
    }
}

impl Ord for DocumentId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for DocumentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{}", n.0),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// JSON type of a filter operand, used by captures to constrain matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    String,
    Number,
    Boolean,
    Null,
    Date,
    DocumentId,
    Array,
    SubDoc,
}

/// Typed filter operand. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterOperand {
    String(String),
    Number(OrderedFloat<f64>),
    Boolean(bool),
    Null,
    Date(DateTime<Utc>),
    DocumentId(DocumentId),
    Array(Vec<FilterOperand>),
    /// Ordered sub-document; entry order is significant for equality hashing.
    SubDoc(Vec<(String, FilterOperand)>),
}

impl FilterOperand {
    /// Converts a JSON operand, resolving the `$date` extension. Rejects any
    /// other `$`-keyed single-entry object as a misplaced operator.
    pub fn from_json(value: &Value) -> Result<Self, DbError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Boolean(*b)),
            Value::Number(n) => Ok(Self::Number(OrderedFloat(n.as_f64().unwrap_or(f64::NAN)))),
            Value::String(s) => Ok(Self::String(s.clone())),
            Value::Array(items) => {
                let converted =
                    items.iter().map(Self::from_json).collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Array(converted))
            }
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some((key, inner)) = map.iter().next() {
                        if key == DATE_EXTENSION {
                            let millis = inner.as_i64().ok_or_else(|| {
                                DbError::InvalidFilter(
                                    "$date value has to be sent as epoch time".into(),
                                )
                            })?;
                            let date =
                                DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                                    DbError::InvalidFilter(format!(
                                        "$date value {millis} out of range"
                                    ))
                                })?;
                            return Ok(Self::Date(date));
                        }
                        if key.starts_with('$') {
                            return Err(DbError::InvalidFilter(format!(
                                "invalid use of {key} operator"
                            )));
                        }
                    }
                }
                let mut entries = Vec::with_capacity(map.len());
                for (k, v) in map {
                    entries.push((k.clone(), Self::from_json(v)?));
                }
                Ok(Self::SubDoc(entries))
            }
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => {
                serde_json::Number::from_f64(n.0).map_or(Value::Null, Value::Number)
            }
            Self::Boolean(b) => Value::Bool(*b),
            Self::Null => Value::Null,
            Self::Date(d) => {
                serde_json::json!({ DATE_EXTENSION: d.timestamp_millis() })
            }
            Self::DocumentId(id) => id.to_json(),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::SubDoc(entries) => {
                let mut map = serde_json::Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json());
                }
                Value::Object(map)
            }
        }
    }

    #[must_use]
    pub const fn json_type(&self) -> JsonType {
        match self {
            Self::String(_) => JsonType::String,
            Self::Number(_) => JsonType::Number,
            Self::Boolean(_) => JsonType::Boolean,
            Self::Null => JsonType::Null,
            Self::Date(_) => JsonType::Date,
            Self::DocumentId(_) => JsonType::DocumentId,
            Self::Array(_) => JsonType::Array,
            Self::SubDoc(_) => JsonType::SubDoc,
        }
    }
}

/// Comparison and logical-leaf operators accepted inside a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
    All,
    Size,
}

impl FilterOperator {
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$in" => Self::In,
            "$nin" => Self::Nin,
            "$exists" => Self::Exists,
            "$all" => Self::All,
            "$size" => Self::Size,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::Nin => "$nin",
            Self::Exists => "$exists",
            Self::All => "$all",
            Self::Size => "$size",
        }
    }

    /// Complementary operator under negation, where one exists. `$exists` is
    /// negated through its boolean operand, `$all`/`$size` have no complement.
    #[must_use]
    pub const fn negated(self) -> Option<Self> {
        Some(match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Gt => Self::Lte,
            Self::Gte => Self::Lt,
            Self::Lt => Self::Gte,
            Self::Lte => Self::Gt,
            Self::In => Self::Nin,
            Self::Nin => Self::In,
            Self::Exists | Self::All | Self::Size => return None,
        })
    }

    /// True for the range operators that require a date/number operand.
    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

/// One (operator, operand) pair inside a comparison expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOperation {
    pub operator: FilterOperator,
    pub operand: FilterOperand,
}

impl FilterOperation {
    #[must_use]
    pub const fn new(operator: FilterOperator, operand: FilterOperand) -> Self {
        Self { operator, operand }
    }
}

/// A single field path plus its (operator, operand) pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonExpression {
    pub path: String,
    pub operations: Vec<FilterOperation>,
}

impl ComparisonExpression {
    #[must_use]
    pub fn new(path: impl Into<String>, operations: Vec<FilterOperation>) -> Self {
        Self { path: path.into(), operations }
    }

    /// Shorthand `{"field": value}` form, treated as `$eq`.
    #[must_use]
    pub fn eq(path: impl Into<String>, operand: FilterOperand) -> Self {
        Self::new(path, vec![FilterOperation::new(FilterOperator::Eq, operand)])
    }

    #[must_use]
    pub fn targets_id(&self) -> bool {
        self.path == DOC_ID_FIELD
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Number(_) => "NUMBER",
        Value::String(_) => "STRING",
        Value::Array(_) => "ARRAY",
        Value::Object(_) => "OBJECT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operand_from_json_handles_date_extension() {
        let op = FilterOperand::from_json(&json!({"$date": 1_700_000_000_000_i64})).unwrap();
        assert_eq!(op.json_type(), JsonType::Date);
        assert_eq!(op.to_json(), json!({"$date": 1_700_000_000_000_i64}));
    }

    #[test]
    fn operand_rejects_unknown_dollar_key() {
        let err = FilterOperand::from_json(&json!({"$near": 1})).unwrap_err();
        assert!(err.to_string().contains("$near"));
    }

    #[test]
    fn single_entry_object_without_operator_is_subdoc() {
        let op = FilterOperand::from_json(&json!({"city": "oslo"})).unwrap();
        assert_eq!(op.json_type(), JsonType::SubDoc);
        assert_eq!(op.to_json(), json!({"city": "oslo"}));
    }

    #[test]
    fn subdoc_preserves_entry_order() {
        let op = FilterOperand::from_json(&json!({"b": 1, "a": 2})).unwrap();
        match op {
            FilterOperand::SubDoc(entries) => {
                assert_eq!(entries[0].0, "b");
                assert_eq!(entries[1].0, "a");
            }
            other => panic!("expected sub-doc, got {other:?}"),
        }
    }

    #[test]
    fn negated_operators_round_trip() {
        for op in [
            FilterOperator::Eq,
            FilterOperator::Gt,
            FilterOperator::Gte,
            FilterOperator::In,
        ] {
            assert_eq!(op.negated().unwrap().negated().unwrap(), op);
        }
        assert!(FilterOperator::Size.negated().is_none());
        assert!(FilterOperator::All.negated().is_none());
    }
}
