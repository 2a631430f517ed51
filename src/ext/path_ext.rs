use std::path::{Component, Path, PathBuf};

/// Renders a path for messages: canonical when the path resolves on disk,
/// otherwise lexically normalized. Virtual paths (memory, drive list) never
/// resolve, so they come back as written minus `.`/`..` noise.
pub fn best_effort_path_display(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        return "<root>".to_string();
    }
    match path.canonicalize() {
        Ok(canonical_path) => canonical_path.display().to_string(),
        Err(_) => lexical_normalize(path).display().to_string(),
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

/// Number of normal components in `path`, used to order items deepest-first.
pub fn component_depth(path: &Path) -> usize {
    path.components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .count()
}

pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;
    fn component_depth(&self) -> usize;
}

impl BestEffortPathExt for Path {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self)
    }

    fn component_depth(&self) -> usize {
        component_depth(self)
    }
}

impl BestEffortPathExt for PathBuf {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self)
    }

    fn component_depth(&self) -> usize {
        component_depth(self)
    }
}
