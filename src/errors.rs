use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Invalid filter expression: {0}")]
    InvalidFilter(String),

    #[error("Unsupported filter operator: {0}")]
    UnsupportedFilterOperator(String),

    #[error("Unsupported filter data type: {0}")]
    UnsupportedFilterType(String),

    #[error("Cannot use more than one _id filter in a single command")]
    MultipleIdFilter,

    #[error("Cannot filter on _id within $or")]
    IdFilterInsideOr,

    #[error("Filter has {actual} fields, exceeds maximum allowed {max}")]
    FilterFieldsLimit { actual: usize, max: usize },

    #[error("${operator} operator must have at most {max} values")]
    InOperatorTooLarge { operator: &'static str, max: usize },

    #[error("Command not supported for this filter shape: no rule matched '{0}'")]
    UnresolvableFilter(String),

    #[error("Invalid update clause: {0}")]
    InvalidUpdate(String),

    #[error("Update failed for document: {0}")]
    UpdateError(String),

    #[error("Conditional write rejected: transaction token changed")]
    ConcurrencyFailure,

    #[error("Gave up after {0} retries on concurrent modification")]
    RetryExhausted(usize),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),
}
