//! Flattening of fetched fragment trees into an id-indexed arena.
//!
//! All traversal after flattening (ancestor walks, descendant collection,
//! relevance marking) goes through id lookups in the arena rather than through
//! the nested `children` vectors.

use ahash::AHashMap;
use fragdb_store::{Fragment, FragmentId};
use roaring::RoaringBitmap;

#[derive(Debug)]
pub struct ArenaNode<'a> {
    pub fragment: &'a Fragment,
    /// Parent id, only when the parent is part of the arena.
    pub parent: Option<FragmentId>,
    pub children: Vec<FragmentId>,
}

/// Flat `id -> fragment` view over a fetched forest.
#[derive(Debug, Default)]
pub struct FragmentArena<'a> {
    nodes: AHashMap<FragmentId, ArenaNode<'a>>,
    roots: Vec<FragmentId>,
    ids: RoaringBitmap,
}

impl<'a> FragmentArena<'a> {
    /// Walk `roots` and every transitive child into a flat arena.
    ///
    /// A fragment id reached a second time is skipped together with its subtree.
    pub fn flatten(roots: &'a [Fragment]) -> Self {
        let mut arena = FragmentArena::default();
        let mut stack: Vec<(&'a Fragment, Option<FragmentId>)> =
            roots.iter().rev().map(|root| (root, None)).collect();

        while let Some((fragment, parent)) = stack.pop() {
            if !arena.ids.insert(fragment.id) {
                tracing::warn!(
                    fragment_id = fragment.id,
                    xpath = %fragment.xpath,
                    "fragment reached twice while flattening, keeping first occurrence"
                );
                continue;
            }
            match parent {
                Some(parent_id) => {
                    if let Some(parent_node) = arena.nodes.get_mut(&parent_id) {
                        parent_node.children.push(fragment.id);
                    }
                }
                None => arena.roots.push(fragment.id),
            }
            arena.nodes.insert(
                fragment.id,
                ArenaNode {
                    fragment,
                    parent: parent.or(fragment.parent_id),
                    children: Vec::with_capacity(fragment.children.len()),
                },
            );
            stack.extend(
                fragment
                    .children
                    .iter()
                    .rev()
                    .map(|child| (child, Some(fragment.id))),
            );
        }

        // Roots may name a parent that was never fetched.
        let ids = &arena.ids;
        for node in arena.nodes.values_mut() {
            if node.parent.is_some_and(|p| !ids.contains(p)) {
                node.parent = None;
            }
        }
        arena
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every id in the arena.
    pub fn ids(&self) -> &RoaringBitmap {
        &self.ids
    }

    /// Root ids in fetch order.
    pub fn roots(&self) -> &[FragmentId] {
        &self.roots
    }

    pub fn get(&self, id: FragmentId) -> Option<&ArenaNode<'a>> {
        self.nodes.get(&id)
    }

    pub fn fragment(&self, id: FragmentId) -> Option<&'a Fragment> {
        self.nodes.get(&id).map(|node| node.fragment)
    }

    pub fn parent(&self, id: FragmentId) -> Option<FragmentId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: FragmentId) -> &[FragmentId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Strict descendants of every id in `ids`.
    pub fn descendants_of(&self, ids: &RoaringBitmap) -> RoaringBitmap {
        let mut out = RoaringBitmap::new();
        let mut stack: Vec<FragmentId> = ids.iter().collect();
        while let Some(id) = stack.pop() {
            for &child in self.children(id) {
                if out.insert(child) {
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Ids whose subtree, excluding the id itself, contains a member of `members`.
    pub fn with_member_below(&self, members: &RoaringBitmap) -> RoaringBitmap {
        let mut out = RoaringBitmap::new();
        // Post-order: a node is marked once all of its children are settled.
        let mut stack: Vec<(FragmentId, bool)> = self.roots.iter().map(|&r| (r, false)).collect();
        while let Some((id, expanded)) = stack.pop() {
            let children = self.children(id);
            if expanded {
                if children
                    .iter()
                    .any(|&c| members.contains(c) || out.contains(c))
                {
                    out.insert(id);
                }
            } else {
                stack.push((id, true));
                stack.extend(children.iter().map(|&c| (c, false)));
            }
        }
        out
    }
}
