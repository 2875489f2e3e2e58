//! Composite path queries over anchored fragment trees.
//!
//! A composite query is a path expression plus an AND/OR composition of
//! nested conditions, each itself a path with further nested conditions.
//! Processing runs one pipeline per call:
//!
//! ```text
//!   gateway lookup ──► prefetch ──► flatten ──► evaluate conditions
//!                                                      │
//!           output forest ◄── reconstruct ◄── ancestors ◄┘
//! ```
//!
//! - `flatten`: fetched forest to an id-indexed arena
//! - `operator`: AND/OR composition semantics
//! - `processor`: condition evaluation and the public entry point
//! - `ancestors`: minimal ancestor closure of the matches
//! - `reconstruct`: output tree with depth and pruning rules
//!
//! Path expressions are opaque here; they are resolved by the
//! [`FragmentGateway`](fragdb_store::FragmentGateway).

pub mod ancestors;
pub mod condition;
pub mod config;
pub mod error;
pub mod flatten;
pub mod operator;
pub mod processor;
pub mod reconstruct;

pub use ancestors::find_ancestor_ids;
pub use condition::CompositeQuery;
pub use config::QueryConfig;
pub use error::{DepthScope, QueryError, QueryResult};
pub use flatten::FragmentArena;
pub use operator::CompositeOperator;
pub use processor::CompositeQueryProcessor;
pub use reconstruct::{DataNode, TreeBuilder};

pub use fragdb_store::{Anchor, FetchDescendants};
