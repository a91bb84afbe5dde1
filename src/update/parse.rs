use crate::errors::DbError;
use crate::update::locator::TargetLocator;
use crate::update::operations::{DocumentUpdater, UpdateOperation};
use serde_json::{Map, Value};

const EACH_MODIFIER: &str = "$each";

/// Parses `{"$set": {...}, "$unset": {...}, "$inc": {...}, "$push": {...},
/// "$setOnInsert": {...}}` into the ordered operator pipeline.
pub fn parse_update_clause(clause: &Value) -> Result<DocumentUpdater, DbError> {
    let Value::Object(entries) = clause else {
        return Err(DbError::InvalidUpdate("update clause must be an OBJECT".into()));
    };
    if entries.is_empty() {
        return Err(DbError::InvalidUpdate("update clause is empty".into()));
    }
    let mut operations = Vec::new();
    for (operator, arguments) in entries {
        let arguments = operator_arguments(operator, arguments)?;
        match operator.as_str() {
            "$set" => {
                for (path, value) in arguments {
                    operations.push(UpdateOperation::Set {
                        target: TargetLocator::parse(path)?,
                        value: value.clone(),
                    });
                }
            }
            "$setOnInsert" => {
                for (path, value) in arguments {
                    operations.push(UpdateOperation::SetOnInsert {
                        target: TargetLocator::parse(path)?,
                        value: value.clone(),
                    });
                }
            }
            "$unset" => {
                for (path, _) in arguments {
                    operations
                        .push(UpdateOperation::Unset { target: TargetLocator::parse(path)? });
                }
            }
            "$inc" => {
                for (path, value) in arguments {
                    let Value::Number(by) = value else {
                        return Err(DbError::InvalidUpdate(format!(
                            "$inc value for '{path}' must be a NUMBER"
                        )));
                    };
                    operations.push(UpdateOperation::Inc {
                        target: TargetLocator::parse(path)?,
                        by: by.as_f64().unwrap_or(0.0),
                    });
                }
            }
            "$push" => {
                for (path, value) in arguments {
                    operations.push(UpdateOperation::Push {
                        target: TargetLocator::parse(path)?,
                        values: push_values(path, value)?,
                    });
                }
            }
            other => {
                return Err(DbError::InvalidUpdate(format!(
                    "unsupported update operator '{other}'"
                )));
            }
        }
    }
    Ok(DocumentUpdater::new(operations))
}

fn operator_arguments<'a>(
    operator: &str,
    arguments: &'a Value,
) -> Result<&'a Map<String, Value>, DbError> {
    if !operator.starts_with('$') {
        return Err(DbError::InvalidUpdate(format!(
            "invalid update operator expression '{operator}'"
        )));
    }
    match arguments {
        Value::Object(map) if !map.is_empty() => Ok(map),
        Value::Object(_) => {
            Err(DbError::InvalidUpdate(format!("{operator} requires at least one field")))
        }
        _ => Err(DbError::InvalidUpdate(format!("{operator} requires an OBJECT of fields"))),
    }
}

/// A `$push` value is either one element or `{"$each": [elements]}`, which
/// flattens to the element list.
fn push_values(path: &str, value: &Value) -> Result<Vec<Value>, DbError> {
    if let Value::Object(map) = value {
        if let Some(each) = map.get(EACH_MODIFIER) {
            if map.len() > 1 {
                return Err(DbError::InvalidUpdate(format!(
                    "$push for '{path}' cannot combine $each with other modifiers"
                )));
            }
            let Value::Array(items) = each else {
                return Err(DbError::InvalidUpdate(format!(
                    "$each value for '{path}' must be an ARRAY"
                )));
            };
            return Ok(items.clone());
        }
        if map.keys().any(|k| k.starts_with('$')) {
            return Err(DbError::InvalidUpdate(format!(
                "unsupported $push modifier for '{path}'"
            )));
        }
    }
    Ok(vec![value.clone()])
}
