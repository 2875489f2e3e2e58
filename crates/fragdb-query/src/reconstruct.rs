//! Reconstruction of the pruned output forest.
//!
//! Two modes exist per node:
//! - **filtered**: keep only children that are relevant (a match or an
//!   ancestor of one) or have something relevant below them;
//! - **unconditional**: keep every child, bounded only by the depth policy.
//!
//! A match with no match anywhere below it switches its children to the
//! unconditional mode, so a matched fragment brings its whole subtree along.
//! A match with a deeper match only keeps the paths to relevant nodes.

use fragdb_store::{FetchDescendants, Fragment, FragmentId};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DepthScope, QueryError, QueryResult};
use crate::flatten::{ArenaNode, FragmentArena};

/// One node of a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataNode {
    pub xpath: String,
    pub leaves: Map<String, Value>,
    pub dataspace: String,
    pub anchor_name: String,
    #[serde(default)]
    pub child_data_nodes: Vec<DataNode>,
}

impl DataNode {
    /// Number of nodes in this subtree, including itself.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .child_data_nodes
            .iter()
            .map(DataNode::subtree_len)
            .sum::<usize>()
    }

    /// Find a node in this subtree by xpath.
    pub fn find(&self, xpath: &str) -> Option<&DataNode> {
        if self.xpath == xpath {
            return Some(self);
        }
        self.child_data_nodes.iter().find_map(|child| child.find(xpath))
    }
}

/// Parse a fragment's attribute document into leaves.
pub fn leaves_of(fragment: &Fragment) -> QueryResult<Map<String, Value>> {
    match fragment.attributes.as_deref() {
        None => Ok(Map::new()),
        Some(json) => serde_json::from_str(json).map_err(|source| QueryError::InvalidLeaves {
            fragment_id: fragment.id,
            xpath: fragment.xpath.clone(),
            source,
        }),
    }
}

pub struct TreeBuilder<'q, 'a> {
    arena: &'q FragmentArena<'a>,
    matching: &'q RoaringBitmap,
    relevant: RoaringBitmap,
    match_below: RoaringBitmap,
    relevant_below: RoaringBitmap,
    max_depth: usize,
}

impl<'q, 'a> TreeBuilder<'q, 'a> {
    pub fn new(
        arena: &'q FragmentArena<'a>,
        matching: &'q RoaringBitmap,
        ancestors: &RoaringBitmap,
        max_depth: usize,
    ) -> Self {
        let relevant = matching | ancestors;
        let match_below = arena.with_member_below(matching);
        let relevant_below = arena.with_member_below(&relevant);
        Self {
            arena,
            matching,
            relevant,
            match_below,
            relevant_below,
            max_depth,
        }
    }

    /// Build the output forest from the arena roots.
    pub fn build(&self, fetch: FetchDescendants) -> QueryResult<Vec<DataNode>> {
        if self.matching.is_empty() {
            return Ok(Vec::new());
        }
        self.arena
            .roots()
            .iter()
            .filter_map(|&root| self.arena.get(root))
            .filter(|node| self.is_relevant(node.fragment.id))
            .map(|node| self.filtered(node, fetch, 0))
            .collect()
    }

    fn is_relevant(&self, id: FragmentId) -> bool {
        self.relevant.contains(id) || self.relevant_below.contains(id)
    }

    fn filtered(
        &self,
        node: &ArenaNode<'a>,
        fetch: FetchDescendants,
        depth: usize,
    ) -> QueryResult<DataNode> {
        self.check_depth(depth)?;
        let id = node.fragment.id;
        let child_nodes = match fetch.next_level() {
            Some(next) if !node.children.is_empty() => {
                let nothing_matched_below = self.matching.contains(id)
                    && !node
                        .children
                        .iter()
                        .any(|&c| self.matching.contains(c) || self.match_below.contains(c));
                if nothing_matched_below {
                    node.children
                        .iter()
                        .filter_map(|&c| self.arena.get(c))
                        .map(|child| self.unconditional(child, next, depth + 1))
                        .collect::<QueryResult<Vec<_>>>()?
                } else {
                    node.children
                        .iter()
                        .filter_map(|&c| self.arena.get(c))
                        .filter(|child| self.is_relevant(child.fragment.id))
                        .map(|child| self.filtered(child, next, depth + 1))
                        .collect::<QueryResult<Vec<_>>>()?
                }
            }
            _ => Vec::new(),
        };
        data_node(node.fragment, child_nodes)
    }

    fn unconditional(
        &self,
        node: &ArenaNode<'a>,
        fetch: FetchDescendants,
        depth: usize,
    ) -> QueryResult<DataNode> {
        self.check_depth(depth)?;
        let child_nodes = match fetch.next_level() {
            Some(next) => node
                .children
                .iter()
                .filter_map(|&c| self.arena.get(c))
                .map(|child| self.unconditional(child, next, depth + 1))
                .collect::<QueryResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        data_node(node.fragment, child_nodes)
    }

    fn check_depth(&self, depth: usize) -> QueryResult<()> {
        if depth > self.max_depth {
            return Err(QueryError::DepthLimitExceeded {
                scope: DepthScope::Tree,
                limit: self.max_depth,
            });
        }
        Ok(())
    }
}

fn data_node(fragment: &Fragment, child_data_nodes: Vec<DataNode>) -> QueryResult<DataNode> {
    Ok(DataNode {
        xpath: fragment.xpath.clone(),
        leaves: leaves_of(fragment)?,
        dataspace: fragment.anchor.dataspace.clone(),
        anchor_name: fragment.anchor.name.clone(),
        child_data_nodes,
    })
}
