use crate::errors::DbError;
use crate::update::locator::TargetLocator;
use serde_json::Value;

/// One document-mutating operator with validated arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperation {
    Set { target: TargetLocator, value: Value },
    Unset { target: TargetLocator },
    Inc { target: TargetLocator, by: f64 },
    /// `$each` is flattened into `values` at parse time.
    Push { target: TargetLocator, values: Vec<Value> },
    /// Applied only to upsert-created documents.
    SetOnInsert { target: TargetLocator, value: Value },
}

impl UpdateOperation {
    /// Applies this operator to `doc`, returning whether anything changed.
    /// Failures are fatal for the single document being updated.
    fn apply(&self, doc: &mut Value, is_new: bool) -> Result<bool, DbError> {
        match self {
            Self::Set { target, value } => set_value(doc, target, value),
            Self::SetOnInsert { target, value } => {
                if is_new {
                    set_value(doc, target, value)
                } else {
                    Ok(false)
                }
            }
            Self::Unset { target } => {
                match target.locate_parent(doc, false)? {
                    Some((parent, leaf)) => Ok(parent.shift_remove(leaf).is_some()),
                    None => Ok(false),
                }
            }
            Self::Inc { target, by } => {
                let Some((parent, leaf)) = target.locate_parent(doc, true)? else {
                    return Ok(false);
                };
                let current = match parent.get(leaf) {
                    None | Some(Value::Null) => 0.0,
                    Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                    Some(other) => {
                        return Err(DbError::UpdateError(format!(
                            "cannot $inc non-numeric field '{}' of type {}",
                            target.path(),
                            kind(other)
                        )));
                    }
                };
                let next = number(current + by);
                if parent.get(leaf) == Some(&next) {
                    return Ok(false);
                }
                parent.insert(leaf.to_string(), next);
                Ok(true)
            }
            Self::Push { target, values } => {
                let Some((parent, leaf)) = target.locate_parent(doc, true)? else {
                    return Ok(false);
                };
                match parent.get_mut(leaf) {
                    None => {
                        parent.insert(leaf.to_string(), Value::Array(values.clone()));
                        Ok(true)
                    }
                    Some(Value::Array(items)) => {
                        items.extend(values.iter().cloned());
                        Ok(!values.is_empty())
                    }
                    Some(other) => Err(DbError::UpdateError(format!(
                        "cannot $push onto non-array field '{}' of type {}",
                        target.path(),
                        kind(other)
                    ))),
                }
            }
        }
    }
}

fn set_value(doc: &mut Value, target: &TargetLocator, value: &Value) -> Result<bool, DbError> {
    let Some((parent, leaf)) = target.locate_parent(doc, true)? else {
        return Ok(false);
    };
    if parent.get(leaf) == Some(value) {
        return Ok(false);
    }
    parent.insert(leaf.to_string(), value.clone());
    Ok(true)
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Number(_) => "NUMBER",
        Value::String(_) => "STRING",
        Value::Array(_) => "ARRAY",
        Value::Object(_) => "OBJECT",
    }
}

/// The ordered update pipeline for one command, applied to one document at a
/// time.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUpdater {
    operations: Vec<UpdateOperation>,
}

impl DocumentUpdater {
    #[must_use]
    pub fn new(operations: Vec<UpdateOperation>) -> Self {
        Self { operations }
    }

    /// Applies every operator in order to an owned copy of the document.
    /// `modified == false` guarantees the returned tree is deep-equal to the
    /// input.
    pub fn apply_updates(&self, doc: Value, is_new: bool) -> Result<(Value, bool), DbError> {
        if !doc.is_object() {
            return Err(DbError::UpdateError("document root must be an object".into()));
        }
        let mut updated = doc;
        let mut modified = false;
        for operation in &self.operations {
            modified |= operation.apply(&mut updated, is_new)?;
        }
        Ok((updated, modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn locator(path: &str) -> TargetLocator {
        TargetLocator::parse(path).unwrap()
    }

    #[test]
    fn set_reports_unmodified_for_same_value() {
        let updater = DocumentUpdater::new(vec![UpdateOperation::Set {
            target: locator("name"),
            value: json!("alice"),
        }]);
        let doc = json!({"name": "alice"});
        let (out, modified) = updater.apply_updates(doc.clone(), false).unwrap();
        assert!(!modified);
        assert_eq!(out, doc);
    }

    #[test]
    fn set_creates_nested_path() {
        let updater = DocumentUpdater::new(vec![UpdateOperation::Set {
            target: locator("a.b.c"),
            value: json!(7),
        }]);
        let (out, modified) = updater.apply_updates(json!({}), false).unwrap();
        assert!(modified);
        assert_eq!(out, json!({"a": {"b": {"c": 7}}}));
    }

    #[test]
    fn unset_removes_existing_field_only() {
        let updater =
            DocumentUpdater::new(vec![UpdateOperation::Unset { target: locator("gone") }]);
        let (out, modified) = updater.apply_updates(json!({"gone": 1, "kept": 2}), false).unwrap();
        assert!(modified);
        assert_eq!(out, json!({"kept": 2}));

        let (_, modified) = updater.apply_updates(json!({"kept": 2}), false).unwrap();
        assert!(!modified);
    }

    #[test]
    fn inc_adds_and_creates() {
        let updater = DocumentUpdater::new(vec![UpdateOperation::Inc {
            target: locator("count"),
            by: 2.5,
        }]);
        let (out, modified) = updater.apply_updates(json!({"count": 1}), false).unwrap();
        assert!(modified);
        assert_eq!(out, json!({"count": 3.5}));

        let (out, modified) = updater.apply_updates(json!({}), false).unwrap();
        assert!(modified);
        assert_eq!(out, json!({"count": 2.5}));
    }

    #[test]
    fn inc_on_string_fails_for_the_document() {
        let updater = DocumentUpdater::new(vec![UpdateOperation::Inc {
            target: locator("name"),
            by: 1.0,
        }]);
        let err = updater.apply_updates(json!({"name": "alice"}), false).unwrap_err();
        assert!(matches!(err, DbError::UpdateError(_)));
    }

    #[test]
    fn push_appends_or_creates_array() {
        let updater = DocumentUpdater::new(vec![UpdateOperation::Push {
            target: locator("tags"),
            values: vec![json!("x"), json!("y")],
        }]);
        let (out, _) = updater.apply_updates(json!({"tags": ["a"]}), false).unwrap();
        assert_eq!(out, json!({"tags": ["a", "x", "y"]}));

        let (out, _) = updater.apply_updates(json!({}), false).unwrap();
        assert_eq!(out, json!({"tags": ["x", "y"]}));
    }

    #[test]
    fn push_on_scalar_fails() {
        let updater = DocumentUpdater::new(vec![UpdateOperation::Push {
            target: locator("n"),
            values: vec![json!(1)],
        }]);
        assert!(matches!(
            updater.apply_updates(json!({"n": 5}), false),
            Err(DbError::UpdateError(_))
        ));
    }

    #[test]
    fn set_on_insert_applies_only_to_new_documents() {
        let updater = DocumentUpdater::new(vec![UpdateOperation::SetOnInsert {
            target: locator("created"),
            value: json!(true),
        }]);
        let (out, modified) = updater.apply_updates(json!({}), true).unwrap();
        assert!(modified);
        assert_eq!(out, json!({"created": true}));

        let (out, modified) = updater.apply_updates(json!({}), false).unwrap();
        assert!(!modified);
        assert_eq!(out, json!({}));
    }
}
