//! The uniform backing-store contract and its implementations.
//!
//! Every store (local disk, the drive list, an explicit path list, memory)
//! implements [`Provider`]. Tree and operation logic only ever talk to this
//! trait, so new stores plug in without touching them.

mod disk;
mod drives;
mod error;
mod memory;
mod path_list;
mod pattern;
mod search;
mod stream;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::path::{MAIN_SEPARATOR, Path};
use std::sync::{Arc, Weak};

pub use disk::DiskProvider;
pub use drives::{Capacity, DriveProvider, SystemVolumes, Volume, VolumeSource};
pub use error::ProviderError;
pub(crate) use error::*;
pub use memory::MemoryProvider;
pub use path_list::PathListProvider;
pub use pattern::Pattern;
pub use search::{Search, search};
pub use stream::{InputStream, OutputStream};

use crate::item::{Item, ItemKind};

pub type ProviderRef = Arc<dyn Provider>;

/// Lazily produced children. Each call to `get_child_items` re-queries the store.
pub type ItemIter<'a> = Box<dyn Iterator<Item = Result<Item, ProviderError>> + Send + 'a>;

/// What a backing store allows. Consulted before any mutation is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub read_only: bool,
    pub can_read: bool,
    pub can_write: bool,
    pub can_create: bool,
    pub can_remove: bool,
    pub can_rename: bool,
}

impl Capabilities {
    pub const READ_WRITE: Capabilities = Capabilities {
        read_only: false,
        can_read: true,
        can_write: true,
        can_create: true,
        can_remove: true,
        can_rename: true,
    };

    pub const READ_ONLY: Capabilities = Capabilities {
        read_only: true,
        can_read: true,
        can_write: false,
        can_create: false,
        can_remove: false,
        can_rename: false,
    };

    pub fn allows_removal(&self) -> bool {
        !self.read_only && self.can_remove
    }

    pub fn allows_creation(&self) -> bool {
        !self.read_only && self.can_create
    }

    pub fn allows_write(&self) -> bool {
        !self.read_only && self.can_write
    }

    /// Renaming is gated on its own flag: a read-only store such as the drive
    /// list may still relabel its entries.
    pub fn allows_rename(&self) -> bool {
        self.can_rename
    }
}

/// Uniform capability surface every backing store implements.
///
/// Mutations return `Ok(false)` when the store declines or does not support the
/// request, and reserve `Err` for faults.
pub trait Provider: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Root providers answer the empty path with their top-level collection.
    fn is_root_provider(&self) -> bool {
        false
    }

    fn exists(&self, path: &Path) -> bool;

    /// Resolves `path` to a snapshot, or `None` when nothing is there.
    fn get_item(&self, path: &Path) -> Result<Option<Item>, ProviderError>;

    /// Direct children of `path` whose names match `pattern`. Symlinks and
    /// reparse points are never yielded.
    fn get_child_items<'a>(
        &'a self,
        path: &Path,
        pattern: &Pattern,
    ) -> Result<ItemIter<'a>, ProviderError>;

    fn create_path(&self, path: &Path, kind: ItemKind) -> Result<bool, ProviderError>;

    /// Removes one entry. Directories must already be empty.
    fn remove_item(&self, path: &Path, force: bool) -> Result<bool, ProviderError>;

    /// Renames `item` in place within its parent and updates it on success.
    fn rename_item(&self, item: &mut Item, new_name: &str, force: bool)
    -> Result<bool, ProviderError>;

    fn get_input_stream(&self, path: &Path) -> Result<InputStream, ProviderError>;

    fn get_output_stream(&self, path: &Path) -> Result<OutputStream, ProviderError>;

    /// Store-specific cleanup of a user-supplied path. Idempotent.
    fn normalize_path(&self, path: &str) -> String {
        normalize_separators(path)
    }
}

/// Trims whitespace, collapses repeated separators and strips trailing ones,
/// keeping a bare root (`/`, `C:\`) intact.
pub fn normalize_separators(path: &str) -> String {
    let trimmed = path.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    let mut previous_was_separator = false;

    for ch in trimmed.chars() {
        let is_separator = std::path::is_separator(ch);
        if !(is_separator && previous_was_separator) {
            normalized.push(if is_separator { MAIN_SEPARATOR } else { ch });
        }
        previous_was_separator = is_separator;
    }

    loop {
        let before = normalized.len();
        while normalized.len() > 1
            && normalized.ends_with(MAIN_SEPARATOR)
            && !is_drive_root(&normalized)
        {
            normalized.pop();
        }
        let without_trailing_space = normalized.trim_end().len();
        normalized.truncate(without_trailing_space);
        if normalized.len() == before {
            break;
        }
    }
    normalized
}

fn is_drive_root(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

pub(crate) fn ensure_valid_name(name: &str) -> Result<(), ProviderError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.chars().any(std::path::is_separator);
    if invalid {
        return InvalidNameSnafu { name }.fail();
    }
    Ok(())
}

pub(crate) fn unsupported(provider: &dyn Provider, operation: &'static str) -> ProviderError {
    ProviderError::Unsupported {
        provider: provider.name().to_string(),
        operation,
    }
}

/// Coerces a provider's self handle into the type-erased form items carry.
pub(crate) fn erase<P: Provider + 'static>(this: &Weak<P>) -> Weak<dyn Provider> {
    this.clone()
}
