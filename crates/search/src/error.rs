//! Error types for the search compiler.
//!
//! Errors are split between the compiler itself ([`SearchError`]) and the
//! execution collaborator ([`BackendError`]). Every backend failure reaches the
//! caller as [`SearchError::QueryFailed`].

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for search and count operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The constraint tree violates the caller contract.
    #[error("invalid constraint: {message}")]
    InvalidConstraint { message: String },

    /// The compiled query binds more parameters than the backend accepts.
    ///
    /// `search` recovers from this by splitting the query; only `count`
    /// surfaces it.
    #[error("too many SQL parameters: {count} exceeds the limit of {limit}")]
    ParamLimitExceeded { count: usize, limit: usize },

    /// The backend failed to execute a query.
    #[error("search query failed: {0}")]
    QueryFailed(#[from] BackendError),

    /// Split execution could not partition the query any further.
    #[error("query splitting failed: {message}")]
    SplitExhausted { message: String },

    /// A result row did not match the column layout of the fetch mode.
    #[error("failed to decode column '{column}': {message}")]
    RowDecode {
        column: &'static str,
        message: String,
    },
}

impl SearchError {
    /// Creates an invalid constraint error.
    pub fn invalid(message: impl Into<String>) -> Self {
        SearchError::InvalidConstraint {
            message: message.into(),
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::QueryFailed(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Errors raised by an execution backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },
}

impl BackendError {
    /// Returns true for failures that are not caused by the query itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Unavailable { .. } | BackendError::ConnectionFailed { .. }
        )
    }
}

/// Result type for search operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for BackendError {
    fn from(err: r2d2::Error) -> Self {
        BackendError::ConnectionFailed {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
        }
    }
}
