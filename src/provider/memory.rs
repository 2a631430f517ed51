use std::collections::{BTreeMap, HashMap};
use std::io::{self, Cursor, Read, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::SystemTime;

use tracing::debug;

use crate::item::{Attributes, Item, ItemKind, type_label};
use crate::provider::{
    BusySnafu, Capabilities, InputStream, ItemIter, NotADirectorySnafu, OutputStream, Pattern,
    Provider, ProviderError, ensure_valid_name, erase, unsupported,
};

#[derive(Debug, Clone)]
struct MemoryEntry {
    directory: bool,
    content: Vec<u8>,
    modified: SystemTime,
    read_only: bool,
}

impl MemoryEntry {
    fn directory() -> Self {
        Self {
            directory: true,
            content: Vec::new(),
            modified: SystemTime::now(),
            read_only: false,
        }
    }

    fn file(content: Vec<u8>) -> Self {
        Self {
            directory: false,
            content,
            modified: SystemTime::now(),
            read_only: false,
        }
    }
}

#[derive(Debug, Default)]
struct StreamLock {
    readers: usize,
    writer: bool,
}

#[derive(Debug)]
struct MemoryState {
    entries: BTreeMap<PathBuf, MemoryEntry>,
    locks: HashMap<PathBuf, StreamLock>,
}

type SharedState = Arc<Mutex<MemoryState>>;

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn root_path() -> PathBuf {
    PathBuf::from(std::path::MAIN_SEPARATOR_STR)
}

fn not_found(path: &Path) -> ProviderError {
    ProviderError::from_io(path, io::Error::from(io::ErrorKind::NotFound))
}

fn is_a_directory(path: &Path) -> ProviderError {
    ProviderError::from_io(path, io::Error::from(io::ErrorKind::IsADirectory))
}

/// An in-memory store, seeded through [`MemoryProvider::add_file`] and
/// [`MemoryProvider::add_dir`]. The root directory always exists.
#[derive(Debug)]
pub struct MemoryProvider {
    this: Weak<MemoryProvider>,
    read_only: bool,
    state: SharedState,
}

impl MemoryProvider {
    pub fn new() -> Arc<Self> {
        Self::build(false)
    }

    /// A store that answers queries but declines every mutation.
    pub fn read_only() -> Arc<Self> {
        Self::build(true)
    }

    fn build(read_only: bool) -> Arc<Self> {
        let mut entries = BTreeMap::new();
        entries.insert(root_path(), MemoryEntry::directory());
        Arc::new_cyclic(|this| MemoryProvider {
            this: this.clone(),
            read_only,
            state: Arc::new(Mutex::new(MemoryState {
                entries,
                locks: HashMap::new(),
            })),
        })
    }

    pub fn handle(&self) -> Weak<dyn Provider> {
        erase(&self.this)
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }

    /// Adds a directory and any missing ancestors.
    pub fn add_dir(&self, path: impl AsRef<Path>) -> &Self {
        let mut state = self.state();
        insert_with_parents(&mut state.entries, path.as_ref(), MemoryEntry::directory());
        self
    }

    /// Adds (or replaces) a file and any missing ancestor directories.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> &Self {
        let mut state = self.state();
        insert_with_parents(
            &mut state.entries,
            path.as_ref(),
            MemoryEntry::file(content.into()),
        );
        self
    }

    pub fn set_read_only(&self, path: impl AsRef<Path>, read_only: bool) -> &Self {
        if let Some(entry) = self.state().entries.get_mut(path.as_ref()) {
            entry.read_only = read_only;
        }
        self
    }

    /// Current content of a file, if there is one at `path`.
    pub fn content(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.state()
            .entries
            .get(path.as_ref())
            .filter(|entry| !entry.directory)
            .map(|entry| entry.content.clone())
    }

    fn item(&self, path: &Path, entry: &MemoryEntry) -> Item {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut attributes = Attributes::NONE;
        attributes.set(Attributes::DIRECTORY, entry.directory);
        attributes.set(Attributes::READ_ONLY, entry.read_only || self.read_only);
        attributes.set(Attributes::HIDDEN, name.starts_with('.'));

        let size = if entry.directory {
            0
        } else {
            entry.content.len() as u64
        };

        Item::new(name.clone(), path, self.handle())
            .with_size(size)
            .with_modified(Some(entry.modified))
            .with_attributes(attributes)
            .with_type_label(type_label(&name, entry.directory))
    }
}

fn insert_with_parents(entries: &mut BTreeMap<PathBuf, MemoryEntry>, path: &Path, entry: MemoryEntry) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        entries
            .entry(ancestor.to_path_buf())
            .or_insert_with(MemoryEntry::directory);
    }
    entries.insert(path.to_path_buf(), entry);
}

/// Entries below `path`, in key order. Descendants sort directly after their
/// ancestor, so the scan ends at the first key outside the subtree.
fn descendants<'a>(
    entries: &'a BTreeMap<PathBuf, MemoryEntry>,
    path: &'a Path,
) -> impl Iterator<Item = (&'a PathBuf, &'a MemoryEntry)> + 'a {
    entries
        .range::<Path, _>((Bound::Excluded(path), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(path))
}

/// Ancestors are always present, so any descendant implies a direct child.
fn has_children(entries: &BTreeMap<PathBuf, MemoryEntry>, path: &Path) -> bool {
    descendants(entries, path).next().is_some()
}

impl Provider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        if self.read_only {
            Capabilities::READ_ONLY
        } else {
            Capabilities::READ_WRITE
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.state().entries.contains_key(path)
    }

    fn get_item(&self, path: &Path) -> Result<Option<Item>, ProviderError> {
        Ok(self
            .state()
            .entries
            .get(path)
            .map(|entry| self.item(path, entry)))
    }

    fn get_child_items<'a>(
        &'a self,
        path: &Path,
        pattern: &Pattern,
    ) -> Result<ItemIter<'a>, ProviderError> {
        let state = self.state();
        match state.entries.get(path) {
            None => return Err(not_found(path)),
            Some(entry) if !entry.directory => return NotADirectorySnafu { path }.fail(),
            Some(_) => {}
        }

        let children: Vec<Item> = descendants(&state.entries, path)
            .filter(|(key, _)| key.parent() == Some(path))
            .filter(|(key, _)| {
                key.file_name()
                    .is_some_and(|name| pattern.matches(&name.to_string_lossy()))
            })
            .map(|(key, entry)| self.item(key, entry))
            .collect();
        debug!("Listed {} children of {}", children.len(), path.display());

        Ok(Box::new(children.into_iter().map(Ok)))
    }

    fn create_path(&self, path: &Path, kind: ItemKind) -> Result<bool, ProviderError> {
        if !self.capabilities().allows_creation() {
            return Ok(false);
        }
        let mut state = self.state();
        if state.entries.contains_key(path) {
            return Ok(false);
        }
        let entry = match kind {
            ItemKind::File => MemoryEntry::file(Vec::new()),
            ItemKind::Directory => MemoryEntry::directory(),
        };
        insert_with_parents(&mut state.entries, path, entry);
        Ok(true)
    }

    fn remove_item(&self, path: &Path, force: bool) -> Result<bool, ProviderError> {
        if !self.capabilities().allows_removal() || path == root_path().as_path() {
            return Ok(false);
        }
        let mut state = self.state();
        let Some(entry) = state.entries.get(path) else {
            return Ok(false);
        };
        if entry.read_only && !force {
            debug!("Declining to remove read-only {}", path.display());
            return Ok(false);
        }
        if entry.directory && has_children(&state.entries, path) {
            return Err(ProviderError::from_io(
                path,
                io::Error::from(io::ErrorKind::DirectoryNotEmpty),
            ));
        }
        if state.locks.contains_key(path) {
            return BusySnafu {
                path,
                mode: "reading or writing",
            }
            .fail();
        }

        state.entries.remove(path);
        Ok(true)
    }

    fn rename_item(
        &self,
        item: &mut Item,
        new_name: &str,
        force: bool,
    ) -> Result<bool, ProviderError> {
        ensure_valid_name(new_name)?;
        if !self.capabilities().allows_rename() {
            return Ok(false);
        }

        let source = item.path().to_path_buf();
        let target = source.with_file_name(new_name);
        let mut state = self.state();
        if !state.entries.contains_key(&source) {
            return Ok(false);
        }
        if source == target {
            return Ok(true);
        }
        if state.entries.contains_key(&target) {
            if !force || has_children(&state.entries, &target) {
                return Ok(false);
            }
            state.entries.remove(&target);
        }

        let moved: Vec<PathBuf> = std::iter::once(source.clone())
            .chain(descendants(&state.entries, &source).map(|(key, _)| key.clone()))
            .collect();
        for old in moved {
            let Some(entry) = state.entries.remove(&old) else {
                continue;
            };
            let renamed = match old.strip_prefix(&source) {
                Ok(suffix) if !suffix.as_os_str().is_empty() => target.join(suffix),
                _ => target.clone(),
            };
            state.entries.insert(renamed, entry);
        }
        drop(state);

        item.rename_to(new_name);
        Ok(true)
    }

    fn get_input_stream(&self, path: &Path) -> Result<InputStream, ProviderError> {
        let mut state = self.state();
        let content = match state.entries.get(path) {
            None => return Err(not_found(path)),
            Some(entry) if entry.directory => return Err(is_a_directory(path)),
            Some(entry) => entry.content.clone(),
        };
        let lock = state.locks.entry(path.to_path_buf()).or_default();
        if lock.writer {
            return BusySnafu {
                path,
                mode: "writing",
            }
            .fail();
        }
        lock.readers += 1;

        Ok(InputStream::new(MemoryReader {
            cursor: Cursor::new(content),
            _guard: StreamGuard {
                state: Arc::clone(&self.state),
                path: path.to_path_buf(),
                writer: false,
            },
        }))
    }

    fn get_output_stream(&self, path: &Path) -> Result<OutputStream, ProviderError> {
        if !self.capabilities().allows_write() {
            return Err(unsupported(self, "writing"));
        }
        let mut state = self.state();
        let parent_is_directory = path
            .parent()
            .and_then(|parent| state.entries.get(parent))
            .is_some_and(|parent| parent.directory);
        if !parent_is_directory {
            return Err(not_found(path));
        }
        match state.entries.get(path) {
            Some(entry) if entry.directory => return Err(is_a_directory(path)),
            Some(entry) if entry.read_only => {
                return Err(ProviderError::from_io(
                    path,
                    io::Error::from(io::ErrorKind::PermissionDenied),
                ));
            }
            _ => {}
        }

        let lock = state.locks.entry(path.to_path_buf()).or_default();
        if lock.writer || lock.readers > 0 {
            return BusySnafu {
                path,
                mode: "reading or writing",
            }
            .fail();
        }
        lock.writer = true;
        state
            .entries
            .insert(path.to_path_buf(), MemoryEntry::file(Vec::new()));

        Ok(OutputStream::new(MemoryWriter {
            buffer: Vec::new(),
            guard: StreamGuard {
                state: Arc::clone(&self.state),
                path: path.to_path_buf(),
                writer: true,
            },
        }))
    }
}

/// Releases a stream's hold on its path when dropped.
struct StreamGuard {
    state: SharedState,
    path: PathBuf,
    writer: bool,
}

impl StreamGuard {
    fn commit(&self, content: &[u8]) {
        let mut state = lock(&self.state);
        if let Some(entry) = state.entries.get_mut(&self.path) {
            entry.content = content.to_vec();
            entry.modified = SystemTime::now();
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        let released = match state.locks.get_mut(&self.path) {
            Some(lock) => {
                if self.writer {
                    lock.writer = false;
                } else {
                    lock.readers = lock.readers.saturating_sub(1);
                }
                !lock.writer && lock.readers == 0
            }
            None => false,
        };
        if released {
            state.locks.remove(&self.path);
        }
    }
}

struct MemoryReader {
    cursor: Cursor<Vec<u8>>,
    _guard: StreamGuard,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

struct MemoryWriter {
    buffer: Vec<u8>,
    guard: StreamGuard,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard.commit(&self.buffer);
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.guard.commit(&self.buffer);
    }
}
