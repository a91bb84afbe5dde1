use crate::compiler::QueryExpression;
use crate::errors::DbError;
use crate::filter::DocumentId;
use crate::predicate::{BuiltCondition, ColumnLhs, ColumnOperator, ColumnValue, columns};
use ordered_float::OrderedFloat;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// One document as read from the store. A missing transaction token means no
/// row currently exists at this key, which is how upserts are detected.
#[derive(Debug, Clone)]
pub struct ReadDocument {
    pub id: DocumentId,
    pub tx_id: Option<Uuid>,
    pub document: Value,
}

/// One page of a select, with the continuation token for the next page.
#[derive(Debug, Clone, Default)]
pub struct FindResponse {
    pub docs: Vec<ReadDocument>,
    pub paging_state: Option<String>,
}

/// A document encoded into the indexed column values of the wide-column
/// schema. This is what conditional writes persist and what column conditions
/// are evaluated against.
#[derive(Debug, Clone)]
pub struct ShreddedDocument {
    pub key: DocumentId,
    pub tx_id: Uuid,
    pub exist_keys: HashSet<String>,
    pub query_text_values: HashMap<String, String>,
    pub query_dbl_values: HashMap<String, OrderedFloat<f64>>,
    pub query_bool_values: HashMap<String, bool>,
    pub query_null_values: HashSet<String>,
    pub array_contains: HashSet<String>,
    pub array_size: HashMap<String, u64>,
    pub array_equals: HashMap<String, String>,
    pub sub_doc_equals: HashMap<String, String>,
    pub doc_json: Value,
}

impl ShreddedDocument {
    /// Evaluates one column condition against this row's indexed values.
    /// A path absent from the addressed column never matches, for any
    /// operator; that mirrors how the store's index treats missing entries.
    #[must_use]
    pub fn satisfies(&self, condition: &BuiltCondition) -> bool {
        match (&condition.lhs, &condition.value) {
            (ColumnLhs::Column(columns::KEY), ColumnValue::Id(id)) => {
                match condition.operator {
                    ColumnOperator::Eq => self.key == *id,
                    ColumnOperator::Ne => self.key != *id,
                    _ => false,
                }
            }
            (ColumnLhs::Column(columns::EXIST_KEYS), ColumnValue::Text(path)) => {
                set_condition(&self.exist_keys, path, condition.operator)
            }
            (ColumnLhs::Column(columns::QUERY_NULL_VALUES), ColumnValue::Text(path)) => {
                set_condition(&self.query_null_values, path, condition.operator)
            }
            (ColumnLhs::Column(columns::ARRAY_CONTAINS), ColumnValue::Text(token)) => {
                set_condition(&self.array_contains, token, condition.operator)
            }
            (ColumnLhs::MapAccess(column, key), value) => {
                self.map_condition(column, key, condition.operator, value)
            }
            _ => false,
        }
    }

    fn map_condition(
        &self,
        column: &str,
        key: &str,
        operator: ColumnOperator,
        value: &ColumnValue,
    ) -> bool {
        match (column, value) {
            (columns::QUERY_TEXT_VALUES, ColumnValue::Text(expected)) => self
                .query_text_values
                .get(key)
                .is_some_and(|actual| compare(operator, actual.as_str(), expected.as_str())),
            (columns::QUERY_DBL_VALUES, ColumnValue::Number(expected)) => self
                .query_dbl_values
                .get(key)
                .is_some_and(|actual| compare(operator, actual, expected)),
            (columns::QUERY_BOOL_VALUES, ColumnValue::Boolean(expected)) => self
                .query_bool_values
                .get(key)
                .is_some_and(|actual| compare(operator, actual, expected)),
            (columns::ARRAY_SIZE, ColumnValue::Number(expected)) => self
                .array_size
                .get(key)
                .is_some_and(|actual| compare(operator, &OrderedFloat(*actual as f64), expected)),
            (columns::ARRAY_EQUALS, ColumnValue::Text(expected)) => self
                .array_equals
                .get(key)
                .is_some_and(|actual| compare(operator, actual.as_str(), expected.as_str())),
            (columns::SUB_DOC_EQUALS, ColumnValue::Text(expected)) => self
                .sub_doc_equals
                .get(key)
                .is_some_and(|actual| compare(operator, actual.as_str(), expected.as_str())),
            _ => false,
        }
    }

    /// Whether the row satisfies a whole compiled query expression.
    #[must_use]
    pub fn matches(&self, expression: &QueryExpression) -> bool {
        expression.evaluate(&|condition| self.satisfies(condition))
    }
}

fn set_condition(set: &HashSet<String>, member: &str, operator: ColumnOperator) -> bool {
    match operator {
        ColumnOperator::Contains => set.contains(member),
        ColumnOperator::NotContains => !set.contains(member),
        _ => false,
    }
}

fn compare<T: PartialOrd + ?Sized>(operator: ColumnOperator, actual: &T, expected: &T) -> bool {
    match operator {
        ColumnOperator::Eq => actual == expected,
        ColumnOperator::Ne => actual != expected,
        ColumnOperator::Gt => actual > expected,
        ColumnOperator::Gte => actual >= expected,
        ColumnOperator::Lt => actual < expected,
        ColumnOperator::Lte => actual <= expected,
        ColumnOperator::Contains | ColumnOperator::NotContains => false,
    }
}

/// Encodes a JSON document into its indexed column values. Pure; no side
/// effects.
pub trait DocumentShredder {
    fn shred(
        &self,
        id: &DocumentId,
        document: &Value,
        tx_id: Uuid,
    ) -> Result<ShreddedDocument, DbError>;
}

/// Async store access the engines are generic over. Transport failures
/// surface as `StoreError` and are command-fatal; only the compare-and-swap
/// rejection of `write_conditional` is retried, and not here.
#[allow(async_fn_in_trait)]
pub trait StoreSession {
    /// Runs one compiled query expression, returning at most `page_size`
    /// documents and a continuation token when more remain.
    async fn select(
        &self,
        expression: &QueryExpression,
        allow_filtering: bool,
        paging_state: Option<&str>,
        page_size: usize,
    ) -> Result<FindResponse, DbError>;

    /// Conditional write: persists `document` iff the stored transaction
    /// token still equals `expected_tx` (`None` = no row exists). Returns the
    /// applied flag.
    async fn write_conditional(
        &self,
        document: &ShreddedDocument,
        expected_tx: Option<Uuid>,
    ) -> Result<bool, DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ShreddedDocument {
        let mut doc = ShreddedDocument {
            key: DocumentId::String("d1".into()),
            tx_id: Uuid::new_v4(),
            exist_keys: HashSet::new(),
            query_text_values: HashMap::new(),
            query_dbl_values: HashMap::new(),
            query_bool_values: HashMap::new(),
            query_null_values: HashSet::new(),
            array_contains: HashSet::new(),
            array_size: HashMap::new(),
            array_equals: HashMap::new(),
            sub_doc_equals: HashMap::new(),
            doc_json: serde_json::json!({}),
        };
        doc.exist_keys.insert("name".into());
        doc.query_text_values.insert("name".into(), "alice".into());
        doc.query_dbl_values.insert("age".into(), OrderedFloat(30.0));
        doc
    }

    #[test]
    fn map_conditions_compare_values() {
        let doc = row();
        let eq = BuiltCondition::new(
            ColumnLhs::MapAccess(columns::QUERY_TEXT_VALUES, "name".into()),
            ColumnOperator::Eq,
            ColumnValue::Text("alice".into()),
        );
        assert!(doc.satisfies(&eq));

        let gt = BuiltCondition::new(
            ColumnLhs::MapAccess(columns::QUERY_DBL_VALUES, "age".into()),
            ColumnOperator::Gt,
            ColumnValue::Number(OrderedFloat(18.0)),
        );
        assert!(doc.satisfies(&gt));
    }

    #[test]
    fn missing_path_never_matches() {
        let doc = row();
        for op in [ColumnOperator::Eq, ColumnOperator::Ne, ColumnOperator::Gt] {
            let condition = BuiltCondition::new(
                ColumnLhs::MapAccess(columns::QUERY_TEXT_VALUES, "missing".into()),
                op,
                ColumnValue::Text("x".into()),
            );
            assert!(!doc.satisfies(&condition));
        }
    }

    #[test]
    fn key_condition_compares_document_id() {
        let doc = row();
        let eq = BuiltCondition::new(
            ColumnLhs::Column(columns::KEY),
            ColumnOperator::Eq,
            ColumnValue::Id(DocumentId::String("d1".into())),
        );
        let ne = BuiltCondition::new(
            ColumnLhs::Column(columns::KEY),
            ColumnOperator::Ne,
            ColumnValue::Id(DocumentId::String("d1".into())),
        );
        assert!(doc.satisfies(&eq));
        assert!(!doc.satisfies(&ne));
    }
}
