use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::item::Item;
use crate::provider::{Pattern, ProviderError, ProviderRef};

/// Every item below `root` whose name matches `pattern`, depth first.
///
/// Nothing is queried until the iterator is advanced. Pending entries sit on an
/// explicit stack: a directory is listed when it is reached, and the unvisited
/// siblings of every ancestor wait below its children. Directories are descended
/// into whether or not their own name matches. A failing directory yields its
/// error and the search moves on to the next one.
pub fn search(provider: ProviderRef, root: impl Into<PathBuf>, pattern: Pattern) -> Search {
    Search {
        provider,
        pattern,
        root: Some(root.into()),
        stack: Vec::new(),
    }
}

pub struct Search {
    provider: ProviderRef,
    pattern: Pattern,
    root: Option<PathBuf>,
    stack: Vec<Result<Item, ProviderError>>,
}

impl Search {
    fn expand(&mut self, directory: &Path) {
        let children = match self.provider.get_child_items(directory, &Pattern::all()) {
            Ok(children) => children.collect::<Vec<_>>(),
            Err(err) => {
                warn!("Search could not list {}: {}", directory.display(), err);
                self.stack.push(Err(err));
                return;
            }
        };
        debug!("Search expanded {} ({} entries)", directory.display(), children.len());
        self.stack.extend(children.into_iter().rev());
    }
}

impl Iterator for Search {
    type Item = Result<Item, ProviderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(root) = self.root.take() {
            self.expand(&root);
        }

        loop {
            let item = match self.stack.pop()? {
                Ok(item) => item,
                Err(err) => return Some(Err(err)),
            };
            if item.is_directory() && !item.is_reparse_point() {
                let directory = item.path().to_path_buf();
                self.expand(&directory);
            }
            if self.pattern.matches(item.name()) {
                return Some(Ok(item));
            }
        }
    }
}

impl std::fmt::Debug for Search {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Search")
            .field("provider", &self.provider.name())
            .field("pattern", &self.pattern)
            .field("pending", &self.stack.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MemoryProvider, ProviderRef};

    fn provider() -> ProviderRef {
        let memory = MemoryProvider::new();
        memory
            .add_file("/root/a.bgl", "a")
            .add_file("/root/one/b.BGL", "b")
            .add_file("/root/one/two/c.bgl", "c")
            .add_file("/root/one/two/notes.txt", "n")
            .add_file("/root/z.bgl", "z");
        memory
    }

    #[test]
    fn finds_matches_depth_first() {
        let pattern = Pattern::new("*.bgl").expect("Failed to build pattern");
        let found: Vec<PathBuf> = search(provider(), "/root", pattern)
            .map(|item| item.expect("Search failed").path().to_path_buf())
            .collect();

        assert_eq!(
            found,
            vec![
                PathBuf::from("/root/a.bgl"),
                PathBuf::from("/root/one/b.BGL"),
                PathBuf::from("/root/one/two/c.bgl"),
                PathBuf::from("/root/z.bgl"),
            ]
        );
    }

    #[test]
    fn directories_match_too() {
        let pattern = Pattern::new("tw?").expect("Failed to build pattern");
        let found: Vec<Item> = search(provider(), "/root", pattern)
            .collect::<Result<_, _>>()
            .expect("Search failed");
        assert_eq!(found.len(), 1);
        assert!(found[0].is_directory());
    }

    #[test]
    fn missing_root_yields_one_error() {
        let mut results = search(provider(), "/nowhere", Pattern::all());
        assert!(matches!(results.next(), Some(Err(_))));
        assert!(results.next().is_none());
    }
}
