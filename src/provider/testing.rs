use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use crate::item::{Item, ItemKind};
use crate::provider::{
    Capabilities, InputStream, ItemIter, MemoryProvider, OutputStream, Pattern, Provider,
    ProviderError, erase,
};

/// A memory store that fails removal of chosen paths and records every
/// removal it is asked to perform.
#[derive(Debug)]
pub(crate) struct FaultyProvider {
    this: Weak<FaultyProvider>,
    inner: Arc<MemoryProvider>,
    capabilities: Capabilities,
    fail_on: HashSet<PathBuf>,
    removals: Mutex<Vec<PathBuf>>,
}

impl FaultyProvider {
    pub(crate) fn new(inner: Arc<MemoryProvider>, fail_on: &[&str]) -> Arc<Self> {
        Self::with_capabilities(inner, fail_on, Capabilities::READ_WRITE)
    }

    pub(crate) fn with_capabilities(
        inner: Arc<MemoryProvider>,
        fail_on: &[&str],
        capabilities: Capabilities,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| FaultyProvider {
            this: this.clone(),
            inner,
            capabilities,
            fail_on: fail_on.iter().map(PathBuf::from).collect(),
            removals: Mutex::new(Vec::new()),
        })
    }

    /// Every path `remove_item` was invoked with, in call order.
    pub(crate) fn removals(&self) -> Vec<PathBuf> {
        self.removals.lock().expect("removal log poisoned").clone()
    }

    fn rebind(&self, item: Item) -> Item {
        item.with_provider(erase(&self.this))
    }
}

impl Provider for FaultyProvider {
    fn name(&self) -> &str {
        "faulty"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn get_item(&self, path: &Path) -> Result<Option<Item>, ProviderError> {
        Ok(self.inner.get_item(path)?.map(|item| self.rebind(item)))
    }

    fn get_child_items<'a>(
        &'a self,
        path: &Path,
        pattern: &Pattern,
    ) -> Result<ItemIter<'a>, ProviderError> {
        let children = self.inner.get_child_items(path, pattern)?;
        Ok(Box::new(
            children.map(move |child| child.map(|item| self.rebind(item))),
        ))
    }

    fn create_path(&self, path: &Path, kind: ItemKind) -> Result<bool, ProviderError> {
        self.inner.create_path(path, kind)
    }

    fn remove_item(&self, path: &Path, force: bool) -> Result<bool, ProviderError> {
        self.removals
            .lock()
            .expect("removal log poisoned")
            .push(path.to_path_buf());
        if self.fail_on.contains(path) {
            return Err(ProviderError::from_io(
                path,
                io::Error::other("injected removal fault"),
            ));
        }
        self.inner.remove_item(path, force)
    }

    fn rename_item(
        &self,
        item: &mut Item,
        new_name: &str,
        force: bool,
    ) -> Result<bool, ProviderError> {
        self.inner.rename_item(item, new_name, force)
    }

    fn get_input_stream(&self, path: &Path) -> Result<InputStream, ProviderError> {
        self.inner.get_input_stream(path)
    }

    fn get_output_stream(&self, path: &Path) -> Result<OutputStream, ProviderError> {
        self.inner.get_output_stream(path)
    }
}
