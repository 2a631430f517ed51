//! Lazily expanded trees of items over any provider.
//!
//! Nodes live in an arena owned by [`Tree`] and refer to each other through
//! [`NodeId`] handles. Children are fetched from the provider at most once
//! per node; size aggregation builds on that cache.

mod node;
mod sizes;
#[allow(clippy::module_inception)]
mod tree;

pub use node::{Node, NodeId};
pub use tree::{Traverse, Tree, TreeError};
