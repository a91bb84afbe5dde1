// Update operator pipeline: dotted-path targets, operators, clause parsing.
mod locator;
mod operations;
mod parse;

pub use locator::TargetLocator;
pub use operations::{DocumentUpdater, UpdateOperation};
pub use parse::parse_update_clause;
