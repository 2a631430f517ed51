use std::path::{Path, PathBuf};

use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

use crate::ext::BestEffortPathExt;
use crate::item::Item;
use crate::ordering::{ItemComparer, SortOrder};
use crate::provider::{Pattern, ProviderError, ProviderRef};
use crate::tree::node::{Children, Node, NodeId};

#[derive(Debug, Snafu)]
pub enum TreeError {
    #[snafu(display("Nothing found at {}", path.best_effort_path_display()))]
    NotFound { path: PathBuf },
    #[snafu(display("Failed to resolve tree root"))]
    Provider { source: ProviderError },
}

/// An arena of nodes rooted at one item of one provider.
#[derive(Debug)]
pub struct Tree {
    provider: ProviderRef,
    nodes: Vec<Node>,
}

impl Tree {
    /// Resolves `path` (after the provider's normalization) into the root of a new tree.
    pub fn open(provider: ProviderRef, path: impl AsRef<Path>) -> Result<Tree, TreeError> {
        let normalized = PathBuf::from(provider.normalize_path(&path.as_ref().to_string_lossy()));
        let item = provider
            .get_item(&normalized)
            .context(ProviderSnafu)?
            .context(NotFoundSnafu { path: &normalized })?;
        Ok(Tree::from_item(provider, item))
    }

    pub fn from_item(provider: ProviderRef, item: Item) -> Tree {
        let root = Node {
            item,
            parent: None,
            depth: 0,
            relative_path: PathBuf::new(),
            children: Children::Uncached,
            complete: false,
        };
        Tree {
            provider,
            nodes: vec![root],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn provider(&self) -> &ProviderRef {
        &self.provider
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.node(id).depth
    }

    pub fn relative_path(&self, id: NodeId) -> &Path {
        self.node(id).relative_path()
    }

    pub fn children(&self, id: NodeId) -> Option<&[NodeId]> {
        self.node(id).children()
    }

    /// Number of nodes materialized so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fetches the children of `id` unless they are already cached.
    ///
    /// Files are cached as childless without asking the provider.
    pub fn cache_children(&mut self, id: NodeId) -> Result<&[NodeId], ProviderError> {
        if !self.node(id).is_cached() {
            let children = self.fetch_children(id)?;
            self.node_mut(id).children = Children::Cached(children);
        }
        Ok(self.node(id).children().unwrap_or_default())
    }

    fn fetch_children(&mut self, id: NodeId) -> Result<Vec<NodeId>, ProviderError> {
        let parent = self.node(id);
        if !parent.is_directory() {
            return Ok(Vec::new());
        }

        let parent_path = parent.item.path().to_path_buf();
        let parent_relative = parent.relative_path.clone();
        let depth = parent.depth + 1;
        let root_path = self.node(NodeId::ROOT).item.path().to_path_buf();

        let mut items = self
            .provider
            .get_child_items(&parent_path, &Pattern::all())?
            .collect::<Result<Vec<Item>, ProviderError>>()?;
        ItemComparer::new(SortOrder::NameAsc).sort(&mut items);
        debug!(
            "Cached {} children of {}",
            items.len(),
            parent_path.best_effort_path_display()
        );

        let ids = items
            .into_iter()
            .map(|item| {
                let relative_path = match item.path().strip_prefix(&root_path) {
                    Ok(relative) if !root_path.as_os_str().is_empty() => relative.to_path_buf(),
                    _ => parent_relative.join(item.name()),
                };
                let child = NodeId(self.nodes.len());
                self.nodes.push(Node {
                    item,
                    parent: Some(id),
                    depth,
                    relative_path,
                    children: Children::Uncached,
                    complete: false,
                });
                child
            })
            .collect();
        Ok(ids)
    }

    /// Pre-order walk starting with `id` itself. Children are fetched (and
    /// cached) as the walk reaches them; the walk ends after the first fault.
    pub fn traverse(&mut self, id: NodeId) -> Traverse<'_> {
        Traverse {
            tree: self,
            stack: vec![id],
            expand: None,
            failed: false,
        }
    }

    pub fn descendants(&mut self, id: NodeId) -> Result<Vec<NodeId>, ProviderError> {
        self.traverse(id).skip(1).collect()
    }

    pub fn descendant_files(&mut self, id: NodeId) -> Result<Vec<NodeId>, ProviderError> {
        let descendants = self.descendants(id)?;
        Ok(descendants
            .into_iter()
            .filter(|child| !self.node(*child).is_directory())
            .collect())
    }

    pub fn descendant_directories(&mut self, id: NodeId) -> Result<Vec<NodeId>, ProviderError> {
        let descendants = self.descendants(id)?;
        Ok(descendants
            .into_iter()
            .filter(|child| self.node(*child).is_directory())
            .collect())
    }

    pub fn total_count(&mut self, id: NodeId) -> Result<usize, ProviderError> {
        Ok(self.descendants(id)?.len())
    }

    pub fn total_file_count(&mut self, id: NodeId) -> Result<usize, ProviderError> {
        Ok(self.descendant_files(id)?.len())
    }

    pub fn total_dir_count(&mut self, id: NodeId) -> Result<usize, ProviderError> {
        Ok(self.descendant_directories(id)?.len())
    }

    /// Descendants of `id` with every node listed after all of its children.
    pub fn post_order(&mut self, id: NodeId) -> Result<Vec<NodeId>, ProviderError> {
        let mut ordered = Vec::new();
        let mut stack = vec![(id, false)];

        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                if current != id {
                    ordered.push(current);
                }
                continue;
            }
            stack.push((current, true));
            let children = self.cache_children(current)?;
            stack.extend(children.iter().rev().map(|child| (*child, false)));
        }

        Ok(ordered)
    }

    /// Re-sorts the cached children of `id`. Uncached nodes are left alone.
    pub fn sort_children(&mut self, id: NodeId, comparer: &ItemComparer) {
        let Children::Cached(mut children) = std::mem::take(&mut self.node_mut(id).children)
        else {
            return;
        };
        children.sort_by(|a, b| comparer.compare(&self.node(*a).item, &self.node(*b).item));
        self.node_mut(id).children = Children::Cached(children);
    }
}

/// Iterator returned by [`Tree::traverse`].
#[derive(Debug)]
pub struct Traverse<'a> {
    tree: &'a mut Tree,
    stack: Vec<NodeId>,
    expand: Option<NodeId>,
    failed: bool,
}

impl Traverse<'_> {
    pub fn tree(&self) -> &Tree {
        self.tree
    }
}

impl Iterator for Traverse<'_> {
    type Item = Result<NodeId, ProviderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(previous) = self.expand.take() {
            match self.tree.cache_children(previous) {
                Ok(children) => self.stack.extend(children.iter().rev()),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }

        let current = self.stack.pop()?;
        self.expand = Some(current);
        Some(Ok(current))
    }
}
