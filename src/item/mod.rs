//! Flat snapshots of file-system entries.
//!
//! An [`Item`] carries the metadata of one entry (name, path, size, timestamp,
//! attributes, type label) together with a non-owning handle to the provider
//! that produced it.

mod attributes;
#[allow(clippy::module_inception)]
mod item;

pub use attributes::Attributes;
pub use item::{Item, ItemKind, type_label};
