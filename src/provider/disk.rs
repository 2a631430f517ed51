use std::fs::{self, Metadata, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Arc, LazyLock, Weak};

use tracing::debug;

use crate::item::{Attributes, Item, ItemKind, type_label};
use crate::provider::stream::{open_disk_input, open_disk_output};
use crate::provider::{
    Capabilities, FaultExt, InputStream, ItemIter, OutputStream, Pattern, Provider,
    ProviderError, ensure_valid_name, erase,
};

static GLOBAL: LazyLock<Arc<DiskProvider>> = LazyLock::new(DiskProvider::new_shared);

/// Real files and directories on the local machine.
#[derive(Debug)]
pub struct DiskProvider {
    this: Weak<DiskProvider>,
}

impl DiskProvider {
    /// The process-wide instance. It holds no session state, so one is enough.
    pub fn global() -> Arc<DiskProvider> {
        Arc::clone(&GLOBAL)
    }

    fn new_shared() -> Arc<Self> {
        Arc::new_cyclic(|this| DiskProvider { this: this.clone() })
    }

    pub fn handle(&self) -> Weak<dyn Provider> {
        erase(&self.this)
    }
}

fn item_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn disk_item(provider: &Weak<dyn Provider>, path: &Path, metadata: &Metadata) -> Item {
    let name = item_name(path);
    let is_directory = metadata.is_dir();

    let mut attributes = Attributes::NONE;
    attributes.set(Attributes::DIRECTORY, is_directory);
    attributes.set(Attributes::READ_ONLY, metadata.permissions().readonly());
    attributes.set(Attributes::REPARSE_POINT, metadata.file_type().is_symlink());
    attributes.set(Attributes::HIDDEN, is_hidden(&name, metadata));

    // Directories report no own size so that aggregates are exactly child sums.
    let size = if is_directory { 0 } else { metadata.len() };

    Item::new(name.clone(), path, provider.clone())
        .with_size(size)
        .with_modified(metadata.modified().ok())
        .with_attributes(attributes)
        .with_type_label(type_label(&name, is_directory))
}

#[cfg(windows)]
fn is_hidden(_name: &str, metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
fn is_hidden(name: &str, _metadata: &Metadata) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

fn clear_read_only(path: &Path, metadata: &Metadata) -> io::Result<()> {
    let mut permissions = metadata.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
    }
    fs::set_permissions(path, permissions)
}

fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

impl Provider for DiskProvider {
    fn name(&self) -> &str {
        "disk"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::READ_WRITE
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn get_item(&self, path: &Path) -> Result<Option<Item>, ProviderError> {
        match fs::symlink_metadata(path) {
            Ok(metadata) => Ok(Some(disk_item(&self.handle(), path, &metadata))),
            Err(err) if is_missing(&err) => Ok(None),
            Err(err) => Err(ProviderError::from_io(path, err)),
        }
    }

    fn get_child_items<'a>(
        &'a self,
        path: &Path,
        pattern: &Pattern,
    ) -> Result<ItemIter<'a>, ProviderError> {
        debug!("Listing {} (pattern '{}')", path.display(), pattern);
        let entries = fs::read_dir(path).fault(path)?;
        let directory = path.to_path_buf();
        let pattern = pattern.clone();
        let provider = self.handle();

        Ok(Box::new(entries.filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return Some(Err(ProviderError::from_io(&directory, err))),
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == "." || name == ".." || !pattern.matches(&name) {
                return None;
            }

            let entry_path = entry.path();
            // `DirEntry::metadata` does not traverse symlinks.
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) if is_missing(&err) => return None,
                Err(err) => return Some(Err(ProviderError::from_io(&entry_path, err))),
            };
            if metadata.file_type().is_symlink() {
                debug!("Skipping reparse point {}", entry_path.display());
                return None;
            }

            Some(Ok(disk_item(&provider, &entry_path, &metadata)))
        })))
    }

    fn create_path(&self, path: &Path, kind: ItemKind) -> Result<bool, ProviderError> {
        if !self.capabilities().allows_creation() {
            return Ok(false);
        }

        match kind {
            ItemKind::Directory => {
                if path.is_dir() {
                    return Ok(false);
                }
                fs::create_dir_all(path).fault(path)?;
            }
            ItemKind::File => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).fault(parent)?;
                }
                match OpenOptions::new().write(true).create_new(true).open(path) {
                    Ok(_) => {}
                    Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
                    Err(err) => return Err(ProviderError::from_io(path, err)),
                }
            }
        }

        debug!("Created {:?} {}", kind, path.display());
        Ok(true)
    }

    fn remove_item(&self, path: &Path, force: bool) -> Result<bool, ProviderError> {
        if !self.capabilities().allows_removal() {
            return Ok(false);
        }

        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if is_missing(&err) => return Ok(false),
            Err(err) => return Err(ProviderError::from_io(path, err)),
        };

        if metadata.permissions().readonly() {
            if !force {
                debug!("Declining to remove read-only {}", path.display());
                return Ok(false);
            }
            clear_read_only(path, &metadata).fault(path)?;
        }

        if metadata.is_dir() {
            fs::remove_dir(path).fault(path)?;
        } else {
            fs::remove_file(path).fault(path)?;
        }

        debug!("Removed {}", path.display());
        Ok(true)
    }

    fn rename_item(
        &self,
        item: &mut Item,
        new_name: &str,
        force: bool,
    ) -> Result<bool, ProviderError> {
        if !self.capabilities().allows_rename() {
            return Ok(false);
        }
        ensure_valid_name(new_name)?;

        let source = item.path().to_path_buf();
        if !self.exists(&source) {
            return Ok(false);
        }
        let target = source.with_file_name(new_name);
        if target != source && self.exists(&target) && !force {
            debug!("Declining to overwrite {}", target.display());
            return Ok(false);
        }

        fs::rename(&source, &target).fault(&source)?;
        item.rename_to(new_name);
        Ok(true)
    }

    fn get_input_stream(&self, path: &Path) -> Result<InputStream, ProviderError> {
        open_disk_input(path)
    }

    fn get_output_stream(&self, path: &Path) -> Result<OutputStream, ProviderError> {
        open_disk_output(path)
    }
}
