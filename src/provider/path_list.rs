use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use tracing::debug;

use crate::item::{Attributes, Item, ItemKind};
use crate::provider::{
    Capabilities, InputStream, ItemIter, OutputStream, Pattern, Provider, ProviderError,
    ProviderRef, erase,
};

/// A flat collection of caller-supplied paths presented as one directory.
///
/// Entries are resolved through `delegate`, but every item handed out refers
/// back to this provider, so mutations on them go through its capabilities.
#[derive(Debug)]
pub struct PathListProvider {
    this: Weak<PathListProvider>,
    paths: Vec<PathBuf>,
    alias: Option<String>,
    delegate: ProviderRef,
}

impl PathListProvider {
    pub fn new(
        paths: impl IntoIterator<Item = PathBuf>,
        alias: Option<String>,
        delegate: ProviderRef,
    ) -> Arc<Self> {
        let paths = paths
            .into_iter()
            .map(|path| PathBuf::from(delegate.normalize_path(&path.to_string_lossy())))
            .collect();
        Arc::new_cyclic(|this| PathListProvider {
            this: this.clone(),
            paths,
            alias,
            delegate,
        })
    }

    pub fn handle(&self) -> Weak<dyn Provider> {
        erase(&self.this)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn is_root(&self, path: &Path) -> bool {
        path.as_os_str().is_empty()
            || self
                .alias
                .as_deref()
                .is_some_and(|alias| path.as_os_str() == alias)
    }

    fn root_item(&self) -> Item {
        let name = self.alias.clone().unwrap_or_else(|| "Paths".to_string());
        let path = self.alias.clone().map(PathBuf::from).unwrap_or_default();
        Item::new(name, path, self.handle())
            .with_attributes(Attributes::DIRECTORY | Attributes::READ_ONLY)
            .with_type_label("Path List")
    }

    fn rebind(&self, item: Item) -> Item {
        item.with_provider(self.handle())
    }
}

impl Provider for PathListProvider {
    fn name(&self) -> &str {
        "path list"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            read_only: false,
            can_read: true,
            can_write: true,
            can_create: false,
            can_remove: false,
            can_rename: false,
        }
    }

    fn is_root_provider(&self) -> bool {
        true
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_root(path) || self.delegate.exists(path)
    }

    fn get_item(&self, path: &Path) -> Result<Option<Item>, ProviderError> {
        if self.is_root(path) {
            return Ok(Some(self.root_item()));
        }
        Ok(self.delegate.get_item(path)?.map(|item| self.rebind(item)))
    }

    fn get_child_items<'a>(
        &'a self,
        path: &Path,
        pattern: &Pattern,
    ) -> Result<ItemIter<'a>, ProviderError> {
        if !self.is_root(path) {
            let children = self.delegate.get_child_items(path, pattern)?;
            return Ok(Box::new(
                children.map(move |child| child.map(|item| self.rebind(item))),
            ));
        }

        let pattern = pattern.clone();
        Ok(Box::new(self.paths.iter().filter_map(move |listed| {
            match self.delegate.get_item(listed) {
                Ok(Some(item)) if pattern.matches(item.name()) => Some(Ok(self.rebind(item))),
                Ok(Some(_)) => None,
                Ok(None) => {
                    debug!("Skipping missing listed path {}", listed.display());
                    None
                }
                Err(err) => Some(Err(err)),
            }
        })))
    }

    fn create_path(&self, _path: &Path, _kind: ItemKind) -> Result<bool, ProviderError> {
        Ok(self.capabilities().allows_creation())
    }

    fn remove_item(&self, _path: &Path, _force: bool) -> Result<bool, ProviderError> {
        Ok(self.capabilities().allows_removal())
    }

    fn rename_item(
        &self,
        _item: &mut Item,
        _new_name: &str,
        _force: bool,
    ) -> Result<bool, ProviderError> {
        Ok(self.capabilities().allows_rename())
    }

    fn get_input_stream(&self, path: &Path) -> Result<InputStream, ProviderError> {
        self.delegate.get_input_stream(path)
    }

    fn get_output_stream(&self, path: &Path) -> Result<OutputStream, ProviderError> {
        self.delegate.get_output_stream(path)
    }

    fn normalize_path(&self, path: &str) -> String {
        if self.is_root(Path::new(path.trim())) {
            return path.trim().to_string();
        }
        self.delegate.normalize_path(path)
    }
}
