//! Mail Store Search Compiler
//!
//! This crate turns a boolean tree of search constraints (folders, tags,
//! item types, ranges, conversation and item ids) into parameterized SQL,
//! runs it against a relational mail store and returns ordered, paginated
//! hits.
//!
//! # Features
//!
//! - **Typed SQL**: constraints are encoded into a small expression AST and
//!   rendered per dialect, with parameters bound in placeholder order
//! - **Dialects**: SQLite and MySQL rendering driven by injected
//!   [`Capabilities`]
//! - **Split execution**: searches that exceed the backend's parameter
//!   limit, or need OR where the backend cannot evaluate it, are split into
//!   several statements and merged in memory with the same ordering
//! - **Stable paging**: every sort has an id tie-break, so repeated pages
//!   never overlap
//!
//! Enable backends with feature flags in `Cargo.toml`:
//!
//! - `sqlite` (default) - bundled SQLite with in-memory and file modes
//!
//! # Architecture
//!
//! - [`types`] - constraint trees, sort specs, fetch modes and hits
//! - [`sql`] - expression AST and dialect renderer
//! - [`search`] - encoding, statement assembly and the [`ConstraintCompiler`]
//! - [`backend`] - the [`SearchBackend`] seam and its SQLite implementation
//! - [`config`] - compiler configuration
//! - [`error`] - error types
//!
//! # Quick Start
//!
//! ```
//! use mailstore_search::backend::sqlite::{NewItem, SqliteBackend};
//! use mailstore_search::types::{FetchMode, FolderRef, ItemType, Leaf, SortSpec, Window};
//! use mailstore_search::{ConstraintCompiler, SearchConfig, SearchContext};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//! backend.insert_item(1, &NewItem::message(257, 2).with_date(100), false)?;
//! backend.insert_item(1, &NewItem::message(258, 2).with_date(200), false)?;
//!
//! let mut inbox = Leaf::with_types([ItemType::Message]);
//! inbox.add_in_folder(FolderRef::new(2, "Inbox"), true);
//!
//! let config = SearchConfig::default();
//! let context = SearchContext::new(1);
//! let compiler = ConstraintCompiler::new(&backend, &config, &context);
//! let hits = compiler.search(&inbox.into(), &SortSpec::DATE_DESC, Window::page(0, 10), FetchMode::Id)?;
//!
//! let ids: Vec<i32> = hits.iter().map(|hit| hit.id).collect();
//! assert_eq!(ids, vec![258, 257]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod search;
pub mod sql;
pub mod types;

// Re-export commonly used types at crate root
pub use backend::{ExecutionHint, Row, SearchBackend};
pub use config::{SearchConfig, TableNames};
pub use error::{BackendError, BackendResult, SearchError, SearchResult};
pub use search::{ConstraintCompiler, SearchContext};
pub use sql::{CompiledQuery, SqlValue};
pub use types::{
    Capabilities, ConstraintNode, FetchMode, Leaf, SearchHit, SortKey, SortSpec, Window,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
