//! Query execution collaborators.
//!
//! The compiler only needs to run a rendered statement and read the rows
//! back. [`SearchBackend`] is that seam; [`sqlite`] provides the bundled
//! implementation.

use std::fmt::Debug;

use crate::error::BackendResult;
use crate::sql::{CompiledQuery, SqlValue};
use crate::types::Capabilities;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{NewItem, SqliteBackend, SqliteBackendConfig};

/// Hints passed along with a statement.
///
/// Backends may ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionHint {
    /// The result is expected to be large; stream instead of buffering when
    /// the driver allows it.
    pub expect_many_rows: bool,
    /// Stop reading after this many rows.
    pub max_rows: Option<usize>,
}

/// One materialized result row, in SELECT-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

impl From<Vec<SqlValue>> for Row {
    fn from(values: Vec<SqlValue>) -> Self {
        Self::new(values)
    }
}

/// A database the compiler can run statements against.
///
/// Implementations acquire a connection for the duration of one call and
/// must not keep a cursor open after returning.
pub trait SearchBackend: Send + Sync + Debug {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Dialect features of the database.
    fn capabilities(&self) -> &Capabilities;

    /// Runs a statement and returns every row it produced.
    fn execute(&self, query: &CompiledQuery, hint: &ExecutionHint) -> BackendResult<Vec<Row>>;
}

impl<B: SearchBackend + ?Sized> SearchBackend for &B {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn capabilities(&self) -> &Capabilities {
        (**self).capabilities()
    }

    fn execute(&self, query: &CompiledQuery, hint: &ExecutionHint) -> BackendResult<Vec<Row>> {
        (**self).execute(query, hint)
    }
}
