pub mod compiler;
pub mod config;
pub mod errors;
pub mod filter;
pub mod logger;
pub mod matcher;
pub mod operation;
pub mod predicate;
pub mod store;
pub mod test_support;
pub mod update;

pub use crate::compiler::{ExpressionBuiltResult, IdConstraint, QueryExpression, build_expressions, upsert_seed};
pub use crate::config::OperationsConfig;
pub use crate::errors::DbError;
pub use crate::filter::{DocumentId, FilterParser, LogicalExpression};
pub use crate::matcher::{FilterResolver, ResolvedExpression};
pub use crate::operation::{FindReader, ReadAndUpdateOperation, UpdateOperationPage, UpdateSettings, UpdatedDocument};
pub use crate::store::{DocumentShredder, FindResponse, ReadDocument, StoreSession};
pub use crate::update::{DocumentUpdater, parse_update_clause};

use once_cell::sync::Lazy;
use serde_json::Value;

// the rule table is immutable after construction and shared by every pipeline
static STANDARD_RESOLVER: Lazy<FilterResolver> = Lazy::new(FilterResolver::new);

/// Parser, resolver, and compiler wired together from one configuration.
/// This is the entry point a command-processing transport would call; the
/// pipeline itself is synchronous and side-effect free.
pub struct CommandPipeline {
    parser: FilterParser,
    resolver: FilterResolver,
}

impl CommandPipeline {
    #[must_use]
    pub fn new(config: &OperationsConfig) -> Self {
        Self { parser: FilterParser::new(config), resolver: STANDARD_RESOLVER.clone() }
    }

    /// Filter JSON to resolved tree plus compiled query expressions.
    pub fn compile_filter(
        &self,
        filter: &Value,
    ) -> Result<(ResolvedExpression, ExpressionBuiltResult), DbError> {
        let tree = self.parser.parse(filter)?;
        let resolved = self.resolver.resolve(&tree)?;
        let built = build_expressions(&resolved, None)?;
        Ok((resolved, built))
    }

    /// Update clause JSON to the ordered operator pipeline.
    pub fn compile_update(&self, clause: &Value) -> Result<DocumentUpdater, DbError> {
        parse_update_clause(clause)
    }
}
