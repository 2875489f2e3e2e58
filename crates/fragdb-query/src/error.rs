use fragdb_store::{FragmentId, StoreError};
use std::fmt;

/// Which recursion ceiling a query ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthScope {
    /// Nested conditions inside a composite query.
    Conditions,
    /// Output tree reconstruction.
    Tree,
}

impl fmt::Display for DepthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepthScope::Conditions => write!(f, "condition nesting"),
            DepthScope::Tree => write!(f, "result tree"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Unsupported operator: '{name}'. Supported operators are: {supported:?}")]
    UnsupportedOperator {
        name: String,
        supported: Vec<&'static str>,
    },

    #[error("{scope} depth exceeds the configured limit of {limit}")]
    DepthLimitExceeded { scope: DepthScope, limit: usize },

    #[error("Invalid leaves on fragment {fragment_id} ({xpath}): {source}")]
    InvalidLeaves {
        fragment_id: FragmentId,
        xpath: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type QueryResult<T> = Result<T, QueryError>;
