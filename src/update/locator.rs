use crate::errors::DbError;
use serde_json::{Map, Value};

/// Dotted-path navigation over a JSON object tree. Write access creates
/// intermediate objects on demand; array index segments are not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLocator {
    segments: Vec<String>,
}

impl TargetLocator {
    pub fn parse(path: &str) -> Result<Self, DbError> {
        if path.is_empty() || path.starts_with('$') {
            return Err(DbError::InvalidUpdate(format!("invalid update path '{path}'")));
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(DbError::InvalidUpdate(format!(
                "update path '{path}' contains an empty segment"
            )));
        }
        Ok(Self { segments })
    }

    #[must_use]
    pub fn path(&self) -> String {
        self.segments.join(".")
    }

    /// Read-only lookup of the addressed value.
    #[must_use]
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Navigates to the parent object of the addressed leaf, creating missing
    /// intermediate objects when `create` is set. Returns the parent map and
    /// the leaf key, or `None` when an intermediate object is absent and
    /// `create` is off. An intermediate non-object (array or scalar) on the
    /// path is an error.
    pub fn locate_parent<'a>(
        &self,
        root: &'a mut Value,
        create: bool,
    ) -> Result<Option<(&'a mut Map<String, Value>, &str)>, DbError> {
        let (leaf, parents) = match self.segments.split_last() {
            Some(split) => split,
            None => return Ok(None),
        };
        let mut current = root;
        for segment in parents {
            let map = current.as_object_mut().ok_or_else(|| {
                DbError::InvalidUpdate(format!(
                    "cannot traverse '{segment}' in path '{}': not an object",
                    self.path()
                ))
            })?;
            if !map.contains_key(segment) {
                if !create {
                    return Ok(None);
                }
                map.insert(segment.clone(), Value::Object(Map::new()));
            }
            // contains_key checked just above
            match map.get_mut(segment) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        let parent = current.as_object_mut().ok_or_else(|| {
            DbError::InvalidUpdate(format!(
                "cannot set '{leaf}' in path '{}': parent is not an object",
                self.path()
            ))
        })?;
        Ok(Some((parent, leaf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_follows_dotted_path() {
        let doc = json!({"a": {"b": {"c": 5}}});
        let locator = TargetLocator::parse("a.b.c").unwrap();
        assert_eq!(locator.lookup(&doc), Some(&json!(5)));
        assert_eq!(TargetLocator::parse("a.x").unwrap().lookup(&doc), None);
    }

    #[test]
    fn locate_creates_intermediates_on_demand() {
        let mut doc = json!({});
        let locator = TargetLocator::parse("a.b.c").unwrap();
        {
            let (parent, leaf) = locator.locate_parent(&mut doc, true).unwrap().unwrap();
            parent.insert(leaf.to_string(), json!(1));
        }
        assert_eq!(doc, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn locate_without_create_returns_none_for_missing() {
        let mut doc = json!({"a": 1});
        let locator = TargetLocator::parse("b.c").unwrap();
        assert!(locator.locate_parent(&mut doc, false).unwrap().is_none());
    }

    #[test]
    fn array_intermediate_is_an_error() {
        let mut doc = json!({"a": [1, 2]});
        let locator = TargetLocator::parse("a.b").unwrap();
        assert!(matches!(
            locator.locate_parent(&mut doc, true),
            Err(DbError::InvalidUpdate(_))
        ));
    }

    #[test]
    fn invalid_paths_rejected() {
        assert!(TargetLocator::parse("").is_err());
        assert!(TargetLocator::parse("$set").is_err());
        assert!(TargetLocator::parse("a..b").is_err());
    }
}
