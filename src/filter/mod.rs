// Submodules for separation of concerns
mod expr;
mod parse;
mod types;

pub use expr::{LogicalExpression, LogicalOperator, pushdown_not};
pub use parse::FilterParser;
pub use types::{
    ComparisonExpression, DATE_EXTENSION, DOC_ID_FIELD, DocumentId, FilterOperand,
    FilterOperation, FilterOperator, JsonType,
};
