//! Ancestor closure of a match set.

use roaring::RoaringBitmap;

use crate::flatten::FragmentArena;

/// Every non-matching ancestor needed to connect each match to its root.
///
/// Walks parent links upward from each match, stopping at a root, at a parent
/// that is itself a match, or at a parent already collected.
pub fn find_ancestor_ids(matching: &RoaringBitmap, arena: &FragmentArena<'_>) -> RoaringBitmap {
    let mut ancestors = RoaringBitmap::new();
    for id in matching {
        let mut current = id;
        while let Some(parent) = arena.parent(current) {
            if matching.contains(parent) || !ancestors.insert(parent) {
                break;
            }
            current = parent;
        }
    }
    ancestors
}
