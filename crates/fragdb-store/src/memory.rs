//! In-memory reference implementation of [`FragmentGateway`].
//!
//! Fragments are stored as flat rows per anchor, like a `fragment` table with
//! a `parent_id` column. Trees are assembled on demand by
//! [`FragmentGateway::prefetch_descendants`].

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use crate::{
    Anchor, FetchDescendants, Fragment, FragmentGateway, FragmentId, PathSelector, StoreError,
};

// ============================================================================
// Snapshot Format
// ============================================================================

/// One fragment row as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentRecord {
    pub id: FragmentId,
    pub xpath: String,
    #[serde(default)]
    pub parent_id: Option<FragmentId>,
    /// Leaf attributes; must be a JSON object when present.
    #[serde(default)]
    pub attributes: Option<Value>,
}

impl FragmentRecord {
    pub fn new(id: FragmentId, xpath: impl Into<String>, parent_id: Option<FragmentId>) -> Self {
        Self {
            id,
            xpath: xpath.into(),
            parent_id,
            attributes: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnchorSnapshot {
    pub dataspace: String,
    pub name: String,
    #[serde(default)]
    pub fragments: Vec<FragmentRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub anchors: Vec<AnchorSnapshot>,
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug)]
struct StoredFragment {
    xpath: String,
    parent_id: Option<FragmentId>,
    attributes: Option<String>,
}

#[derive(Debug)]
struct AnchorData {
    anchor: Arc<Anchor>,
    /// Rows in id order; lookups iterate in this order.
    fragments: BTreeMap<FragmentId, StoredFragment>,
    /// parent id -> child ids in insertion order
    children: AHashMap<FragmentId, Vec<FragmentId>>,
}

impl AnchorData {
    fn to_fragment(&self, id: FragmentId, row: &StoredFragment) -> Fragment {
        Fragment {
            id,
            xpath: row.xpath.clone(),
            parent_id: row.parent_id,
            attributes: row.attributes.clone(),
            anchor: Arc::clone(&self.anchor),
            children: Vec::new(),
        }
    }

    fn child_ids(&self, id: FragmentId) -> &[FragmentId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Breadth-first collection of `base` and its descendants up to `fetch`.
    fn gather(&self, base: FragmentId, fetch: FetchDescendants, into: &mut AHashSet<FragmentId>) {
        let max_depth = fetch.depth();
        let mut visited = AHashSet::new();
        let mut queue = VecDeque::from([(base, 0u32)]);
        while let Some((id, depth)) = queue.pop_front() {
            if !self.fragments.contains_key(&id) || !visited.insert(id) {
                continue;
            }
            into.insert(id);
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for &child in self.child_ids(id) {
                queue.push_back((child, depth + 1));
            }
        }
    }

    fn assemble(&self, id: FragmentId, gathered: &AHashSet<FragmentId>) -> Option<Fragment> {
        let row = self.fragments.get(&id)?;
        let mut fragment = self.to_fragment(id, row);
        fragment.children = self
            .child_ids(id)
            .iter()
            .filter(|&&child| gathered.contains(&child))
            .filter_map(|&child| self.assemble(child, gathered))
            .collect();
        Some(fragment)
    }
}

/// Fragment store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryFragmentStore {
    anchors: AHashMap<Anchor, AnchorData>,
}

impl InMemoryFragmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an anchor, or return the existing one with the same name.
    pub fn create_anchor(
        &mut self,
        dataspace: impl Into<String>,
        name: impl Into<String>,
    ) -> Arc<Anchor> {
        let anchor = Anchor::new(dataspace, name);
        let data = self
            .anchors
            .entry(anchor.clone())
            .or_insert_with(|| AnchorData {
                anchor: Arc::new(anchor),
                fragments: BTreeMap::new(),
                children: AHashMap::new(),
            });
        Arc::clone(&data.anchor)
    }

    /// Insert one fragment row. Parents must be inserted before children.
    pub fn insert_fragment(
        &mut self,
        anchor: &Anchor,
        record: FragmentRecord,
    ) -> Result<(), StoreError> {
        let data = self
            .anchors
            .get_mut(anchor)
            .ok_or_else(|| StoreError::AnchorNotFound(anchor.clone()))?;

        if data.fragments.contains_key(&record.id) {
            return Err(StoreError::DuplicateFragment {
                anchor: anchor.clone(),
                id: record.id,
            });
        }
        if let Some(parent_id) = record.parent_id {
            if !data.fragments.contains_key(&parent_id) {
                return Err(StoreError::UnknownParent {
                    anchor: anchor.clone(),
                    id: record.id,
                    parent_id,
                });
            }
            data.children.entry(parent_id).or_default().push(record.id);
        }

        let attributes = record.attributes.map(|value| value.to_string());
        data.fragments.insert(
            record.id,
            StoredFragment {
                xpath: record.xpath,
                parent_id: record.parent_id,
                attributes,
            },
        );
        Ok(())
    }

    pub fn anchors(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.keys()
    }

    pub fn fragment_count(&self, anchor: &Anchor) -> Option<usize> {
        self.anchors.get(anchor).map(|data| data.fragments.len())
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for anchor_snapshot in snapshot.anchors {
            let anchor = store.create_anchor(anchor_snapshot.dataspace, anchor_snapshot.name);
            for record in anchor_snapshot.fragments {
                store.insert_fragment(&anchor, record)?;
            }
            tracing::debug!(
                anchor = %anchor,
                fragments = store.fragment_count(&anchor).unwrap_or(0),
                "loaded anchor from snapshot"
            );
        }
        Ok(store)
    }

    pub fn load_snapshot(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&text)?;
        Self::from_snapshot(snapshot)
    }

    fn anchor_data(&self, anchor: &Anchor) -> Result<&AnchorData, StoreError> {
        self.anchors
            .get(anchor)
            .ok_or_else(|| StoreError::AnchorNotFound(anchor.clone()))
    }
}

impl FragmentGateway for InMemoryFragmentStore {
    fn find_by_anchor_and_path(
        &self,
        anchor: &Anchor,
        path: &str,
        offset: usize,
    ) -> Result<Vec<Fragment>, StoreError> {
        let data = self.anchor_data(anchor)?;
        let selector = PathSelector::parse(path)?;
        Ok(data
            .fragments
            .iter()
            .filter(|(_, row)| selector.matches(&row.xpath, row.attributes.as_deref()))
            .skip(offset)
            .map(|(&id, row)| data.to_fragment(id, row))
            .collect())
    }

    fn prefetch_descendants(
        &self,
        fetch: FetchDescendants,
        fragments: Vec<Fragment>,
    ) -> Result<Vec<Fragment>, StoreError> {
        if fetch == FetchDescendants::OMIT {
            return Ok(fragments);
        }

        // Group bases per anchor, keeping first-appearance order.
        let mut groups: Vec<(Arc<Anchor>, Vec<FragmentId>)> = Vec::new();
        for fragment in &fragments {
            match groups.iter_mut().find(|(a, _)| **a == *fragment.anchor) {
                Some((_, ids)) => ids.push(fragment.id),
                None => groups.push((Arc::clone(&fragment.anchor), vec![fragment.id])),
            }
        }

        let mut forest = Vec::new();
        for (anchor, bases) in groups {
            let data = self.anchor_data(&anchor)?;
            let mut gathered = AHashSet::new();
            for &base in &bases {
                data.gather(base, fetch, &mut gathered);
            }

            let mut emitted = AHashSet::new();
            for base in bases {
                let Some(row) = data.fragments.get(&base) else {
                    continue;
                };
                let reunited = row.parent_id.is_some_and(|p| gathered.contains(&p));
                if reunited || !emitted.insert(base) {
                    continue;
                }
                if let Some(tree) = data.assemble(base, &gathered) {
                    forest.push(tree);
                }
            }
        }
        Ok(forest)
    }
}
