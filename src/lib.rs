//! A virtual file-system layer: one provider contract over disks, drive lists,
//! path collections and memory, with lazily cached trees, bottom-up size
//! aggregation and bulk removal that records per-item failures.

#![allow(clippy::enum_variant_names)]

pub mod config;
pub mod executor;
pub mod ext;
pub mod item;
pub mod operation;
pub mod ordering;
pub mod provider;
pub mod tree;

pub use item::{Attributes, Item, ItemKind};
pub use provider::{Capabilities, Provider, ProviderError, ProviderRef};
pub use tree::{NodeId, Tree, TreeError};
