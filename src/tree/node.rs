use std::fmt;
use std::path::Path;

use crate::item::Item;

/// Handle to a node inside one [`Tree`](crate::tree::Tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cache state of a node's children. Moves from `Uncached` to `Cached` once.
#[derive(Debug, Clone, Default)]
pub(crate) enum Children {
    #[default]
    Uncached,
    Cached(Vec<NodeId>),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) item: Item,
    pub(crate) parent: Option<NodeId>,
    pub(crate) depth: usize,
    pub(crate) relative_path: std::path::PathBuf,
    pub(crate) children: Children,
    pub(crate) complete: bool,
}

impl Node {
    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Cached children, or `None` if they were never requested.
    pub fn children(&self) -> Option<&[NodeId]> {
        match &self.children {
            Children::Uncached => None,
            Children::Cached(children) => Some(children),
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self.children, Children::Cached(_))
    }

    /// Aggregate size and the whole subtree below are final.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn size(&self) -> u64 {
        self.item.size()
    }

    pub fn name(&self) -> &str {
        self.item.name()
    }

    pub fn is_directory(&self) -> bool {
        self.item.is_directory()
    }
}
