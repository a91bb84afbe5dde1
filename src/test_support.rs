//! In-memory store session and document shredder used by the engine tests.

use crate::compiler::QueryExpression;
use crate::errors::DbError;
use crate::filter::{DATE_EXTENSION, DOC_ID_FIELD, DocumentId, FilterOperand};
use crate::predicate::{DocValueHasher, containment_token};
use crate::store::{
    DocumentShredder, FindResponse, ReadDocument, ShreddedDocument, StoreSession,
};
use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Straightforward shredder covering the column schema: dotted paths into the
/// per-type value maps, containment tokens for atomics and array elements,
/// structural hashes for arrays and sub-documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestShredder;

impl DocumentShredder for TestShredder {
    fn shred(
        &self,
        id: &DocumentId,
        document: &Value,
        tx_id: Uuid,
    ) -> Result<ShreddedDocument, DbError> {
        let Value::Object(map) = document else {
            return Err(DbError::StoreError("document root must be an object".into()));
        };
        let mut out = ShreddedDocument {
            key: id.clone(),
            tx_id,
            exist_keys: Default::default(),
            query_text_values: Default::default(),
            query_dbl_values: Default::default(),
            query_bool_values: Default::default(),
            query_null_values: Default::default(),
            array_contains: Default::default(),
            array_size: Default::default(),
            array_equals: Default::default(),
            sub_doc_equals: Default::default(),
            doc_json: document.clone(),
        };
        // the id is indexed like any other scalar so range predicates on the
        // number map can see it
        for (key, value) in map {
            shred_value(key, value, &mut out)?;
        }
        Ok(out)
    }
}

fn shred_value(path: &str, value: &Value, out: &mut ShreddedDocument) -> Result<(), DbError> {
    out.exist_keys.insert(path.to_string());
    match value {
        Value::Null => {
            out.query_null_values.insert(path.to_string());
        }
        Value::Bool(b) => {
            out.query_bool_values.insert(path.to_string(), *b);
            insert_token(path, value, out)?;
        }
        Value::Number(n) => {
            out.query_dbl_values
                .insert(path.to_string(), OrderedFloat(n.as_f64().unwrap_or(f64::NAN)));
            insert_token(path, value, out)?;
        }
        Value::String(s) => {
            out.query_text_values.insert(path.to_string(), s.clone());
            insert_token(path, value, out)?;
        }
        Value::Array(items) => {
            out.array_size.insert(path.to_string(), items.len() as u64);
            out.array_equals
                .insert(path.to_string(), DocValueHasher::hash(&FilterOperand::from_json(value)?));
            for item in items {
                insert_token(path, item, out)?;
            }
        }
        Value::Object(map) => {
            if map.len() == 1 && map.contains_key(DATE_EXTENSION) {
                if let Some(millis) = map.get(DATE_EXTENSION).and_then(Value::as_i64) {
                    out.query_dbl_values.insert(path.to_string(), OrderedFloat(millis as f64));
                }
                return Ok(());
            }
            out.sub_doc_equals
                .insert(path.to_string(), DocValueHasher::hash(&FilterOperand::from_json(value)?));
            for (key, child) in map {
                shred_value(&format!("{path}.{key}"), child, out)?;
            }
        }
    }
    Ok(())
}

fn insert_token(path: &str, value: &Value, out: &mut ShreddedDocument) -> Result<(), DbError> {
    let operand = FilterOperand::from_json(value)?;
    out.array_contains.insert(containment_token(path, &operand));
    Ok(())
}

/// In-memory `StoreSession`. Rows are kept ordered by key so selection order
/// is deterministic; paging states are plain row offsets. Conditional-write
/// conflicts can be injected per key to exercise the retry path.
#[derive(Debug, Default)]
pub struct MemorySession {
    rows: Mutex<BTreeMap<DocumentId, ShreddedDocument>>,
    forced_conflicts: Mutex<HashMap<DocumentId, usize>>,
    write_attempts: Mutex<usize>,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shreds and stores a document under a fresh transaction token. The
    /// document must carry an `_id` field.
    pub fn load(&self, document: Value) -> Result<DocumentId, DbError> {
        let id_value = document
            .get(DOC_ID_FIELD)
            .ok_or_else(|| DbError::StoreError("seed document without _id".into()))?;
        let id = DocumentId::from_json(id_value)?;
        let shredded = TestShredder.shred(&id, &document, Uuid::new_v4())?;
        self.rows.lock().insert(id.clone(), shredded);
        Ok(id)
    }

    /// Makes the next `count` conditional writes against `id` report a
    /// compare-and-swap miss.
    pub fn fail_next_writes(&self, id: DocumentId, count: usize) {
        self.forced_conflicts.lock().insert(id, count);
    }

    #[must_use]
    pub fn write_attempts(&self) -> usize {
        *self.write_attempts.lock()
    }

    #[must_use]
    pub fn document(&self, id: &DocumentId) -> Option<Value> {
        self.rows.lock().get(id).map(|row| row.doc_json.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

impl StoreSession for MemorySession {
    async fn select(
        &self,
        expression: &QueryExpression,
        _allow_filtering: bool,
        paging_state: Option<&str>,
        page_size: usize,
    ) -> Result<FindResponse, DbError> {
        let offset = match paging_state {
            None => 0,
            Some(state) => state
                .parse::<usize>()
                .map_err(|_| DbError::StoreError(format!("bad paging state '{state}'")))?,
        };
        let rows = self.rows.lock();
        let matching: Vec<ReadDocument> = rows
            .values()
            .filter(|row| row.matches(expression))
            .map(|row| ReadDocument {
                id: row.key.clone(),
                tx_id: Some(row.tx_id),
                document: row.doc_json.clone(),
            })
            .collect();
        let docs: Vec<ReadDocument> =
            matching.iter().skip(offset).take(page_size).cloned().collect();
        let next = offset + docs.len();
        let paging_state = (next < matching.len()).then(|| next.to_string());
        Ok(FindResponse { docs, paging_state })
    }

    async fn write_conditional(
        &self,
        document: &ShreddedDocument,
        expected_tx: Option<Uuid>,
    ) -> Result<bool, DbError> {
        *self.write_attempts.lock() += 1;
        {
            let mut conflicts = self.forced_conflicts.lock();
            if let Some(remaining) = conflicts.get_mut(&document.key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(false);
                }
            }
        }
        let mut rows = self.rows.lock();
        let current_tx = rows.get(&document.key).map(|row| row.tx_id);
        if current_tx != expected_tx {
            return Ok(false);
        }
        rows.insert(document.key.clone(), document.clone());
        Ok(true)
    }
}
