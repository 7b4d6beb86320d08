//! Typed SQL fragments and their dialect renderer.

use std::fmt;

pub mod expr;
pub mod value;
pub mod writer;

pub use expr::{CompareOp, Expr, Operand};
pub use value::{SqlValue, TIMESTAMP_FORMAT};
pub use writer::{SqlWriter, like_pattern};

/// A rendered statement with its parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub text: String,
    pub params: Vec<SqlValue>,
}

impl CompiledQuery {
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
