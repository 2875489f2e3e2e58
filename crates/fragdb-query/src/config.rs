use serde::{Deserialize, Serialize};

/// Recursion ceilings for composite query processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Maximum nesting of conditions below the top-level query.
    pub max_condition_depth: usize,
    /// Maximum depth of the reconstructed result tree below a root.
    pub max_tree_depth: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_condition_depth: 64,
            max_tree_depth: 1024,
        }
    }
}
