//! Constraint compilation and execution.
//!
//! [`ConstraintCompiler`] is the entry point. The submodules are its stages:
//! [`encode`] turns trees into predicates, [`select`] assembles statements,
//! [`rows`] decodes results and [`merge`] combines split results.

pub mod compiler;
pub mod context;
pub mod encode;
pub mod hints;
pub mod merge;
pub mod rows;
pub mod select;
pub mod sort;

pub use compiler::ConstraintCompiler;
pub use context::SearchContext;
pub use encode::{CalendarPart, Encoder};
pub use merge::{intersect, merge_union};
pub use rows::RowDecoder;
pub use select::{QueryShape, SearchStatement, StatementBuilder};
pub use sort::{SORT_COLUMN_ALIAS, compare_hits, sort_hits};
