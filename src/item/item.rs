use std::path::{Path, PathBuf};
use std::sync::Weak;
use std::time::SystemTime;

use crate::item::Attributes;
use crate::provider::{Provider, ProviderRef};

/// The kind of entry `Provider::create_path` should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    File,
    Directory,
}

/// A snapshot of one file-system entry.
///
/// Items are produced by a [`Provider`] query and keep a non-owning handle to it.
/// Only `name` and `path` change after creation, and only through a rename.
#[derive(Debug, Clone)]
pub struct Item {
    name: String,
    path: PathBuf,
    size: u64,
    modified: Option<SystemTime>,
    attributes: Attributes,
    type_label: String,
    provider: Weak<dyn Provider>,
}

impl Item {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        provider: Weak<dyn Provider>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size: 0,
            modified: None,
            attributes: Attributes::NONE,
            type_label: String::new(),
            provider,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_type_label(mut self, type_label: impl Into<String>) -> Self {
        self.type_label = type_label.into();
        self
    }

    /// Re-binds the item to another provider, keeping every other field.
    pub(crate) fn with_provider(mut self, provider: Weak<dyn Provider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    pub fn type_label(&self) -> &str {
        &self.type_label
    }

    /// The provider that produced this item, if it is still alive.
    pub fn provider(&self) -> Option<ProviderRef> {
        self.provider.upgrade()
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    pub fn is_file(&self) -> bool {
        !self.is_directory()
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes.contains(Attributes::READ_ONLY)
    }

    pub fn is_reparse_point(&self) -> bool {
        self.attributes.contains(Attributes::REPARSE_POINT)
    }

    pub fn extension(&self) -> Option<&str> {
        if self.is_directory() {
            return None;
        }
        Path::new(&self.name).extension().and_then(|ext| ext.to_str())
    }

    /// Updates name and path after the backing store renamed the entry.
    pub(crate) fn rename_to(&mut self, new_name: &str) {
        self.path = self.path.with_file_name(new_name);
        self.name = new_name.to_string();
    }

    /// Updates the display name only; used for volume relabels where the path stays.
    pub(crate) fn relabel(&mut self, new_name: &str) {
        self.name = new_name.to_string();
    }
}

/// Free-form type label in the style of a file manager's "Type" column.
pub fn type_label(name: &str, is_directory: bool) -> String {
    if is_directory {
        return "Directory".to_string();
    }
    match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{} File", ext.to_uppercase()),
        _ => "File".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use rstest::rstest;

    #[rstest]
    #[case("notes.txt", false, "TXT File")]
    #[case("archive.tar.gz", false, "GZ File")]
    #[case("Makefile", false, "File")]
    #[case("src", true, "Directory")]
    fn type_label_follows_extension(
        #[case] name: &str,
        #[case] is_directory: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(type_label(name, is_directory), expected);
    }

    #[test]
    fn directory_attribute_is_authoritative() {
        let provider = MemoryProvider::new();
        let item = Item::new("x", "/x", provider.handle())
            .with_attributes(Attributes::DIRECTORY | Attributes::READ_ONLY);

        assert!(item.is_directory());
        assert!(!item.is_file());
        assert!(item.is_read_only());
        assert_eq!(item.extension(), None);
    }

    #[test]
    fn rename_updates_name_and_path() {
        let provider = MemoryProvider::new();
        let mut item = Item::new("old.txt", "/dir/old.txt", provider.handle());

        item.rename_to("new.txt");

        assert_eq!(item.name(), "new.txt");
        assert_eq!(item.path(), Path::new("/dir/new.txt"));
        assert_eq!(item.extension(), Some("txt"));
    }

    #[test]
    fn provider_handle_does_not_keep_provider_alive() {
        let provider = MemoryProvider::new();
        let item = Item::new("a", "/a", provider.handle());
        assert!(item.provider().is_some());

        drop(provider);
        assert!(item.provider().is_none());
    }
}
