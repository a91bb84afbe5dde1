use crate::errors::DbError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Operational limits resolved once per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationsConfig {
    /// Maximum number of values accepted inside a `$in`/`$nin` array.
    pub max_in_operator_value_size: usize,
    /// Maximum number of comparison expressions in one filter object.
    pub max_filter_object_properties: usize,
    /// Default number of documents a single update command may modify.
    pub default_update_limit: usize,
    /// Default number of re-read+reapply attempts on a write conflict.
    pub default_retry_limit: usize,
    /// Documents fetched per page when driving an update.
    pub default_page_size: usize,
    /// Bounded fan-out for per-page concurrent document updates.
    pub max_update_concurrency: usize,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            max_in_operator_value_size: 100,
            max_filter_object_properties: 64,
            default_update_limit: 20,
            default_retry_limit: 3,
            default_page_size: 21,
            max_update_concurrency: 8,
        }
    }
}

impl OperationsConfig {
    /// Loads the config from a TOML file, falling back to defaults for
    /// any field the file does not set.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DbError::StoreError(format!("failed to read config: {e}")))?;
        toml::from_str(&text).map_err(|e| DbError::InvalidFilter(format!("bad config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = OperationsConfig::default();
        assert!(c.max_in_operator_value_size >= 1);
        assert!(c.default_page_size > c.default_update_limit);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let c: OperationsConfig = toml::from_str("max_in_operator_value_size = 5").unwrap();
        assert_eq!(c.max_in_operator_value_size, 5);
        assert_eq!(c.default_retry_limit, OperationsConfig::default().default_retry_limit);
    }
}
