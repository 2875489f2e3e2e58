//! The composite query pipeline: resolve, prefetch, flatten, evaluate,
//! resolve ancestors, reconstruct.

use fragdb_store::{Anchor, FetchDescendants, FragmentGateway};
use roaring::RoaringBitmap;

use crate::ancestors::find_ancestor_ids;
use crate::condition::CompositeQuery;
use crate::config::QueryConfig;
use crate::error::{DepthScope, QueryError, QueryResult};
use crate::flatten::FragmentArena;
use crate::operator::CompositeOperator;
use crate::reconstruct::{DataNode, TreeBuilder};

/// Evaluates composite queries against a fragment gateway.
///
/// Each call is an independent, read-only computation: nothing is cached
/// between calls and the gateway's data is never modified.
pub struct CompositeQueryProcessor<G> {
    gateway: G,
    config: QueryConfig,
}

impl<G: FragmentGateway> CompositeQueryProcessor<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_config(gateway, QueryConfig::default())
    }

    pub fn with_config(gateway: G, config: QueryConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Run `query` against `anchor` and return the pruned result forest.
    ///
    /// The top-level path selects the base fragments; their descendants are
    /// fetched per `fetch`, and the nested conditions decide which of those
    /// fragments match. Without nested conditions every fetched fragment
    /// matches.
    pub fn process_composite_query(
        &self,
        anchor: &Anchor,
        query: &CompositeQuery,
        fetch: FetchDescendants,
    ) -> QueryResult<Vec<DataNode>> {
        let base = self
            .gateway
            .find_by_anchor_and_path(anchor, &query.cps_path, 0)?;
        if base.is_empty() {
            tracing::debug!(
                anchor = %anchor,
                path = %query.cps_path,
                "composite query matched no base fragments"
            );
            return Ok(Vec::new());
        }

        let roots = self.gateway.prefetch_descendants(fetch, base)?;
        let arena = FragmentArena::flatten(&roots);
        if arena.is_empty() {
            return Ok(Vec::new());
        }

        let matching = self.apply_conditions(query, &arena, arena.ids(), anchor, 0)?;
        let ancestors = find_ancestor_ids(&matching, &arena);
        tracing::debug!(
            anchor = %anchor,
            path = %query.cps_path,
            %fetch,
            fetched = arena.len(),
            matches = matching.len(),
            ancestors = ancestors.len(),
            "composite query evaluated"
        );

        TreeBuilder::new(&arena, &matching, &ancestors, self.config.max_tree_depth).build(fetch)
    }

    /// Compose `query`'s nested conditions with its operator over `scope`.
    fn apply_conditions(
        &self,
        query: &CompositeQuery,
        arena: &FragmentArena<'_>,
        scope: &RoaringBitmap,
        anchor: &Anchor,
        depth: usize,
    ) -> QueryResult<RoaringBitmap> {
        if !query.has_conditions() {
            return Ok(scope.clone());
        }
        let operator = CompositeOperator::resolve(query.operator.as_deref())?;
        operator.evaluate(&query.conditions, scope, |condition, scope| {
            self.evaluate_condition(condition, arena, scope, anchor, depth + 1)
        })
    }

    /// Matches of one condition inside `scope`.
    ///
    /// The condition's path is resolved against the whole anchor and then
    /// restricted to `scope`. Nested conditions are evaluated against the
    /// descendants of those own matches; if they match nothing under an
    /// operator that requires all conditions, the condition matches nothing.
    fn evaluate_condition(
        &self,
        condition: &CompositeQuery,
        arena: &FragmentArena<'_>,
        scope: &RoaringBitmap,
        anchor: &Anchor,
        depth: usize,
    ) -> QueryResult<RoaringBitmap> {
        if depth > self.config.max_condition_depth {
            return Err(QueryError::DepthLimitExceeded {
                scope: DepthScope::Conditions,
                limit: self.config.max_condition_depth,
            });
        }

        let own: RoaringBitmap = self
            .gateway
            .find_by_anchor_and_path(anchor, &condition.cps_path, 0)?
            .iter()
            .map(|fragment| fragment.id)
            .filter(|&id| scope.contains(id))
            .collect();

        if !condition.has_conditions() {
            return Ok(own);
        }

        let narrowed = arena.descendants_of(&own) & scope;
        let nested = self.apply_conditions(condition, arena, &narrowed, anchor, depth)?;
        if nested.is_empty() {
            let operator = CompositeOperator::resolve(condition.operator.as_deref())?;
            if operator.requires_all_conditions() {
                tracing::debug!(
                    path = %condition.cps_path,
                    own = own.len(),
                    "nested conditions failed, dropping condition matches"
                );
                return Ok(RoaringBitmap::new());
            }
            return Ok(own);
        }
        Ok(own | nested)
    }
}
