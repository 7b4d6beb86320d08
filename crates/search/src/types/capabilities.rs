//! Backend dialect capabilities.
//!
//! Capabilities are passed to the compiler explicitly (through the backend)
//! instead of being looked up globally, so every dialect branch can be
//! exercised from a unit test.

use serde::{Deserialize, Serialize};

/// SQL dialect used when rendering statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `?N` placeholders, `LIMIT n OFFSET m`, `||` concatenation.
    Sqlite,
    /// `?` placeholders, `LIMIT m, n`, `CONCAT()`, `FORCE INDEX`.
    MySql,
}

/// Feature flags of the database behind a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub dialect: Dialect,

    /// `OR` is usable in WHERE; when false, unions are split into separate
    /// queries.
    #[serde(default = "default_true")]
    pub supports_or_in_where: bool,

    /// `LIMIT` is available; when false, windows are applied in memory.
    #[serde(default = "default_true")]
    pub supports_limit_clause: bool,

    /// String comparison is case-sensitive, so string columns are folded
    /// with `UPPER()`.
    #[serde(default)]
    pub case_sensitive_comparison: bool,

    /// `a & b` is usable; otherwise `BITAND(a, b)` is emitted.
    #[serde(default = "default_true")]
    pub supports_bitwise_ops: bool,

    /// `FALSE` is a valid predicate; otherwise `0 = 1` is emitted.
    #[serde(default = "default_true")]
    pub supports_boolean_datatype: bool,

    /// Index hints may be emitted.
    #[serde(default)]
    pub supports_index_hints: bool,

    /// Emit index hints even when the search is unsorted.
    #[serde(default)]
    pub force_index_even_if_no_sort: bool,

    /// Maximum number of bound parameters per statement.
    #[serde(default)]
    pub max_params: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Capabilities {
    /// SQLite with the historical 999-variable limit.
    pub fn sqlite() -> Self {
        Self {
            dialect: Dialect::Sqlite,
            supports_or_in_where: true,
            supports_limit_clause: true,
            case_sensitive_comparison: true,
            supports_bitwise_ops: true,
            supports_boolean_datatype: true,
            supports_index_hints: false,
            force_index_even_if_no_sort: false,
            max_params: Some(999),
        }
    }

    /// MySQL / MariaDB.
    pub fn mysql() -> Self {
        Self {
            dialect: Dialect::MySql,
            supports_or_in_where: true,
            supports_limit_clause: true,
            case_sensitive_comparison: false,
            supports_bitwise_ops: true,
            supports_boolean_datatype: true,
            supports_index_hints: true,
            force_index_even_if_no_sort: false,
            max_params: None,
        }
    }

    pub fn with_max_params(mut self, max_params: Option<usize>) -> Self {
        self.max_params = max_params;
        self
    }

    pub fn with_or_in_where(mut self, supported: bool) -> Self {
        self.supports_or_in_where = supported;
        self
    }

    pub fn with_limit_clause(mut self, supported: bool) -> Self {
        self.supports_limit_clause = supported;
        self
    }

    pub fn with_case_sensitive_comparison(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive_comparison = case_sensitive;
        self
    }

    /// Returns true if `count` bound parameters fit in one statement.
    pub fn fits_params(&self, count: usize) -> bool {
        self.max_params.is_none_or(|limit| count <= limit)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::sqlite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let sqlite = Capabilities::sqlite();
        assert_eq!(sqlite.dialect, Dialect::Sqlite);
        assert!(sqlite.case_sensitive_comparison);
        assert!(!sqlite.supports_index_hints);
        assert!(sqlite.fits_params(999));
        assert!(!sqlite.fits_params(1000));

        let mysql = Capabilities::mysql();
        assert!(mysql.supports_index_hints);
        assert!(mysql.fits_params(100_000));
    }

    #[test]
    fn test_builders() {
        let caps = Capabilities::sqlite()
            .with_max_params(Some(20))
            .with_or_in_where(false)
            .with_limit_clause(false);
        assert_eq!(caps.max_params, Some(20));
        assert!(!caps.supports_or_in_where);
        assert!(!caps.supports_limit_clause);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let caps: Capabilities =
            serde_json::from_str(r#"{"dialect": "mysql", "max_params": 65535}"#).unwrap();
        assert_eq!(caps.dialect, Dialect::MySql);
        assert!(caps.supports_or_in_where);
        assert!(!caps.case_sensitive_comparison);
        assert_eq!(caps.max_params, Some(65535));
    }
}
