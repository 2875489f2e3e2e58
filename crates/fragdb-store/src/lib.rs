//! Fragment store: the data model and gateway contract for anchored fragment trees.
//!
//! Configuration and inventory data is stored as trees of **fragments** under
//! named **anchors**. Each fragment has a structural xpath label, an optional
//! parent, and a bag of leaf attributes kept as a JSON object document.
//!
//! This crate provides:
//! - the shared model (`Anchor`, `Fragment`, `FetchDescendants`)
//! - the `FragmentGateway` trait consumed by query engines
//! - `InMemoryFragmentStore`, a reference gateway backed by JSON snapshots

pub mod fetch;
pub mod memory;
pub mod selector;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use fetch::FetchDescendants;
pub use memory::{AnchorSnapshot, FragmentRecord, InMemoryFragmentStore, StoreSnapshot};
pub use selector::PathSelector;

// ============================================================================
// Core Types
// ============================================================================

/// Fragment identifier, unique within an anchor.
pub type FragmentId = u32;

/// Named scope identifying one data tree within a dataspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Anchor {
    pub dataspace: String,
    pub name: String,
}

impl Anchor {
    pub fn new(dataspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dataspace: dataspace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dataspace, self.name)
    }
}

/// One node of a fragment tree as handed out by a gateway.
///
/// `children` is only populated by [`FragmentGateway::prefetch_descendants`];
/// fragments returned from a path lookup carry no children.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: FragmentId,
    pub xpath: String,
    pub parent_id: Option<FragmentId>,
    /// Leaf attributes as a JSON object document.
    pub attributes: Option<String>,
    pub anchor: Arc<Anchor>,
    pub children: Vec<Fragment>,
}

impl Fragment {
    /// Number of fragments in this subtree, including itself.
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(fragment) = stack.pop() {
            count += 1;
            stack.extend(fragment.children.iter());
        }
        count
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Read access to a fragment store.
///
/// Path expressions are opaque to callers; implementations parse and match
/// them, and report malformed expressions as [`StoreError::InvalidPath`].
pub trait FragmentGateway {
    /// Fragments of `anchor` matching `path`, without descendants, skipping
    /// the first `offset` matches.
    fn find_by_anchor_and_path(
        &self,
        anchor: &Anchor,
        path: &str,
        offset: usize,
    ) -> Result<Vec<Fragment>, StoreError>;

    /// Populate descendants of `fragments` up to the depth `fetch` allows.
    ///
    /// Fragments gathered under another gathered fragment are re-attached to
    /// their parent, so the result is a forest without duplicates.
    fn prefetch_descendants(
        &self,
        fetch: FetchDescendants,
        fragments: Vec<Fragment>,
    ) -> Result<Vec<Fragment>, StoreError>;
}

impl<G: FragmentGateway + ?Sized> FragmentGateway for &G {
    fn find_by_anchor_and_path(
        &self,
        anchor: &Anchor,
        path: &str,
        offset: usize,
    ) -> Result<Vec<Fragment>, StoreError> {
        (**self).find_by_anchor_and_path(anchor, path, offset)
    }

    fn prefetch_descendants(
        &self,
        fetch: FetchDescendants,
        fragments: Vec<Fragment>,
    ) -> Result<Vec<Fragment>, StoreError> {
        (**self).prefetch_descendants(fetch, fragments)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Anchor not found: {0}")]
    AnchorNotFound(Anchor),

    #[error("Invalid path expression '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Fragment {id} already exists in anchor {anchor}")]
    DuplicateFragment { anchor: Anchor, id: FragmentId },

    #[error("Fragment {id} refers to unknown parent {parent_id} in anchor {anchor}")]
    UnknownParent {
        anchor: Anchor,
        id: FragmentId,
        parent_id: FragmentId,
    },

    #[error("{0} is not a valid fetch descendants option")]
    InvalidFetchDescendants(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
