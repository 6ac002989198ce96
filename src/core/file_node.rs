use std::path::{Path, PathBuf};

/*
 * Represents a single entry (file or directory) of a workspace tree.
 * A node is identified by its absolute path. It does not own its children or
 * hold a live reference to its parent; both are stored as paths and resolved
 * through the `FileTreeModel` arena. This keeps the tree free of ownership
 * cycles while still allowing cheap upward walks for refresh propagation.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    path: PathBuf,
    name: String,
    is_dir: bool,
    parent: Option<PathBuf>,
    pub(crate) children: Vec<PathBuf>, // Only populated for directories, in listing order.
}

impl FileNode {
    /*
     * Creates a node with no children. Children are attached by the tree model
     * when a directory listing is materialized.
     */
    pub fn new(path: PathBuf, name: String, is_dir: bool, parent: Option<PathBuf>) -> Self {
        FileNode {
            path,
            name,
            is_dir,
            parent,
            children: Vec::new(),
        }
    }

    /*
     * Creates a workspace root node. The display name is the last path
     * component, falling back to the full path for roots like `/`.
     */
    pub fn new_root(path: PathBuf) -> Self {
        let name = display_name_for(&path);
        FileNode::new(path, name, true, None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn parent(&self) -> Option<&Path> {
        self.parent.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn children(&self) -> &[PathBuf] {
        &self.children
    }
}

pub(crate) fn display_name_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::FileNode;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_filenode_new_defaults() {
        let p = PathBuf::from("/tmp/foo");
        let n = FileNode::new(p.clone(), "foo".into(), false, Some(PathBuf::from("/tmp")));
        assert_eq!(n.path(), p.as_path());
        assert_eq!(n.name(), "foo");
        assert!(!n.is_dir());
        assert_eq!(n.parent(), Some(Path::new("/tmp")));
        assert!(!n.is_root());
        assert!(n.children().is_empty());
    }

    #[test]
    fn test_root_node_has_no_parent_and_uses_last_component() {
        let root = FileNode::new_root(PathBuf::from("/work/project"));
        assert!(root.is_root());
        assert!(root.is_dir());
        assert_eq!(root.name(), "project");
    }

    #[test]
    fn test_root_node_name_falls_back_to_full_path() {
        let root = FileNode::new_root(PathBuf::from("/"));
        assert_eq!(root.name(), "/");
    }
}
