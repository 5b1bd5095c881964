use serde::{Deserialize, Serialize};

/// Frontend and planner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Maximum nesting depth of bind scopes (subqueries, derived
    /// tables, CTE bodies). Exceeding it is a semantic error rather
    /// than a stack overflow. Default: 64.
    #[serde(default = "default_max_query_depth")]
    pub max_query_depth: usize,
}

fn default_max_query_depth() -> usize {
    64
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_query_depth: default_max_query_depth(),
        }
    }
}
