//! AND/OR composition over condition results.

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::condition::CompositeQuery;
use crate::error::{QueryError, QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeOperator {
    And,
    Or,
}

impl CompositeOperator {
    pub const ALL: [CompositeOperator; 2] = [CompositeOperator::And, CompositeOperator::Or];

    pub fn name(self) -> &'static str {
        match self {
            CompositeOperator::And => "and",
            CompositeOperator::Or => "or",
        }
    }

    /// Whether every condition must match something for the composition to match.
    pub fn requires_all_conditions(self) -> bool {
        matches!(self, CompositeOperator::And)
    }

    /// Resolve an operator name: case-insensitive, trimmed, blank or absent is `And`.
    pub fn resolve(name: Option<&str>) -> QueryResult<Self> {
        let Some(raw) = name else {
            return Ok(CompositeOperator::And);
        };
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Ok(CompositeOperator::And);
        }
        Self::ALL
            .into_iter()
            .find(|op| op.name() == normalized)
            .ok_or_else(|| QueryError::UnsupportedOperator {
                name: raw.to_string(),
                supported: Self::ALL.iter().map(|op| op.name()).collect(),
            })
    }

    /// Combine the results of `conditions`, each evaluated against `scope`.
    ///
    /// Every condition is evaluated before composing, so an error in any of
    /// them is reported. An empty condition list yields the whole scope. `And`
    /// yields nothing when one condition yields nothing, and otherwise the
    /// union of all results (not the intersection). `Or` yields the union.
    pub fn evaluate<F>(
        self,
        conditions: &[CompositeQuery],
        scope: &RoaringBitmap,
        mut evaluate_condition: F,
    ) -> QueryResult<RoaringBitmap>
    where
        F: FnMut(&CompositeQuery, &RoaringBitmap) -> QueryResult<RoaringBitmap>,
    {
        if conditions.is_empty() {
            return Ok(scope.clone());
        }

        let results = conditions
            .iter()
            .map(|condition| evaluate_condition(condition, scope))
            .collect::<QueryResult<Vec<RoaringBitmap>>>()?;

        if self.requires_all_conditions() {
            if let Some(empty) = results.iter().position(RoaringBitmap::is_empty) {
                tracing::debug!(
                    path = %conditions[empty].cps_path,
                    "required condition matched nothing"
                );
                return Ok(RoaringBitmap::new());
            }
        }
        Ok(results
            .into_iter()
            .fold(RoaringBitmap::new(), |combined, matches| combined | matches))
    }
}

impl FromStr for CompositeOperator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(Some(s))
    }
}

impl fmt::Display for CompositeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
