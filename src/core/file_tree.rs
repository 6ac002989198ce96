/*
 * The tree model behind the selection view. Nodes live in an arena indexed by
 * path; every node records its parent's path instead of a live reference, so
 * upward walks are plain lookups and the arena owns everything.
 *
 * Listing is on demand: the workspace roots are presented first, and asking
 * for the children of a directory materializes that directory's whole subtree
 * so aggregate selection counts see every descendant. Each listing rebuilds the
 * affected nodes from the filesystem; nothing survives a refresh except paths.
 */
use crate::core::file_node::FileNode;
use crate::core::file_system::{DirIdentity, FileSystemScannerOperations};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct FileTreeModel {
    roots: Vec<PathBuf>,
    nodes: HashMap<PathBuf, FileNode>,
    scanner: Arc<dyn FileSystemScannerOperations>,
}

impl FileTreeModel {
    pub fn new(roots: Vec<PathBuf>, scanner: Arc<dyn FileSystemScannerOperations>) -> Self {
        log::debug!("FileTreeModel: Created with {} workspace root(s).", roots.len());
        FileTreeModel {
            roots,
            nodes: HashMap::new(),
            scanner,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /*
     * The root that relative paths are computed against. When several roots
     * are open, the first one wins; `None` means no workspace is open.
     */
    pub fn primary_root(&self) -> Option<&Path> {
        self.roots.first().map(PathBuf::as_path)
    }

    /*
     * Lists the children of `parent`, or the workspace roots when `parent` is
     * `None`. A directory that cannot be read yields an empty list. For a
     * directory, every descendant is materialized into the arena as part of
     * the call, replacing whatever an earlier listing left there.
     */
    pub fn list_children(&mut self, parent: Option<&Path>) -> Vec<FileNode> {
        match parent {
            None => self.list_roots(),
            Some(dir) => {
                self.forget_descendants(dir);
                let mut active = HashSet::new();
                let child_paths = self.materialize(dir, &mut active);
                if let Some(parent_node) = self.nodes.get_mut(dir) {
                    parent_node.children = child_paths.clone();
                }
                child_paths
                    .iter()
                    .filter_map(|p| self.nodes.get(p).cloned())
                    .collect()
            }
        }
    }

    fn list_roots(&mut self) -> Vec<FileNode> {
        let mut result = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            let mut node = FileNode::new_root(root.clone());
            // Keep an already materialized subtree reachable from the fresh root node.
            if let Some(existing) = self.nodes.get(root) {
                node.children = existing.children.clone();
            }
            self.nodes.insert(root.clone(), node.clone());
            result.push(node);
        }
        result
    }

    /*
     * Builds the subtree below `dir`. `active` holds the identities of the
     * directories currently being descended; meeting one again means a cycle
     * (a bind mount, a junction) and the repeated directory is left unexpanded.
     */
    fn materialize(&mut self, dir: &Path, active: &mut HashSet<DirIdentity>) -> Vec<PathBuf> {
        let identity = self.scanner.directory_identity(dir);
        if let Some(id) = &identity {
            if !active.insert(id.clone()) {
                log::warn!("FileTreeModel: {dir:?} repeats a directory above it, not descending.");
                return Vec::new();
            }
        }

        let entries = match self.scanner.list_directory(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("FileTreeModel: Cannot list {dir:?}: {e}");
                Vec::new()
            }
        };

        let mut child_paths = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut node = FileNode::new(
                entry.path.clone(),
                entry.name,
                entry.is_dir,
                Some(dir.to_path_buf()),
            );
            if entry.is_dir && !entry.is_symlink {
                node.children = self.materialize(&entry.path, active);
            }
            child_paths.push(entry.path.clone());
            self.nodes.insert(entry.path, node);
        }
        if let Some(id) = identity {
            active.remove(&id);
        }
        child_paths
    }

    fn forget_descendants(&mut self, dir: &Path) {
        self.nodes
            .retain(|path, _| path.as_path() == dir || !path.starts_with(dir));
    }

    /*
     * Looks up a materialized node. A node whose filesystem entry has vanished
     * is stale and reported as absent.
     */
    pub fn node(&self, path: &Path) -> Option<&FileNode> {
        let node = self.nodes.get(path)?;
        if fs::symlink_metadata(path).is_err() {
            log::debug!("FileTreeModel: Node {path:?} is stale.");
            return None;
        }
        Some(node)
    }

    /*
     * Resolves a path given by the user. An already listed node is returned as
     * is; otherwise the parent directories down from the matching root are
     * listed until the node appears. Paths outside every root resolve to `None`.
     */
    pub fn resolve(&mut self, path: &Path) -> Option<FileNode> {
        if let Some(node) = self.node(path) {
            return Some(node.clone());
        }
        let root = self
            .roots
            .iter()
            .find(|root| path.starts_with(root))?
            .clone();
        self.list_children(None);
        if path == root {
            return self.node(path).cloned();
        }
        self.list_children(Some(&root));
        self.node(path).cloned()
    }

    pub fn children_of(&self, path: &Path) -> Vec<&FileNode> {
        match self.nodes.get(path) {
            Some(node) => node
                .children
                .iter()
                .filter_map(|child| self.nodes.get(child))
                .collect(),
            None => Vec::new(),
        }
    }

    /*
     * Returns the ancestors of `path`, nearest first, ending at a root. The
     * walk stops at the first node without a parent or at a parent that was
     * never materialized.
     */
    pub fn ancestors(&self, path: &Path) -> Vec<PathBuf> {
        let mut result = Vec::new();
        let mut current = self.nodes.get(path).and_then(|n| n.parent());
        while let Some(parent_path) = current {
            // A malformed chain can never be longer than the arena itself.
            if result.len() > self.nodes.len() {
                log::error!("FileTreeModel: Parent chain of {path:?} does not terminate.");
                break;
            }
            result.push(parent_path.to_path_buf());
            current = self.nodes.get(parent_path).and_then(|n| n.parent());
        }
        result
    }

    /*
     * Drops every materialized node. Used by refresh and collapse-all; the next
     * listing rebuilds from disk.
     */
    pub fn reset(&mut self) {
        log::debug!(
            "FileTreeModel: Dropping {} materialized node(s).",
            self.nodes.len()
        );
        self.nodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::file_system::{
        CoreFileSystemScanner, DirIdentity, FileSystemError, Result as FsResult, ScannedEntry,
    };
    use std::fs::{self, File};
    use std::io;
    use tempfile::tempdir;

    fn model_for(root: &Path) -> FileTreeModel {
        FileTreeModel::new(
            vec![root.to_path_buf()],
            Arc::new(CoreFileSystemScanner::new()),
        )
    }

    fn setup_tree(base: &Path) -> io::Result<()> {
        fs::create_dir_all(base.join("src").join("sub"))?;
        File::create(base.join("README.md"))?.sync_all()?;
        File::create(base.join("src").join("main.rs"))?.sync_all()?;
        File::create(base.join("src").join("sub").join("deep.rs"))?.sync_all()?;
        Ok(())
    }

    fn sorted_names(nodes: &[FileNode]) -> Vec<String> {
        let mut names: Vec<String> = nodes.iter().map(|n| n.name().to_string()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_roots_are_listed_without_parent() -> io::Result<()> {
        let a = tempdir()?;
        let b = tempdir()?;
        let mut model = FileTreeModel::new(
            vec![a.path().to_path_buf(), b.path().to_path_buf()],
            Arc::new(CoreFileSystemScanner::new()),
        );

        let roots = model.list_children(None);
        assert_eq!(roots.len(), 2);
        assert!(roots.iter().all(|r| r.is_root() && r.is_dir()));
        assert_eq!(roots[0].path(), a.path());
        assert_eq!(model.primary_root(), Some(a.path()));
        Ok(())
    }

    #[test]
    fn test_listing_materializes_whole_subtree() -> io::Result<()> {
        let dir = tempdir()?;
        setup_tree(dir.path())?;
        let mut model = model_for(dir.path());
        model.list_children(None);

        let top = model.list_children(Some(dir.path()));
        assert_eq!(sorted_names(&top), vec!["README.md", "src"]);

        let deep = dir.path().join("src").join("sub").join("deep.rs");
        let deep_node = model.node(&deep).expect("grandchildren are materialized eagerly");
        assert!(!deep_node.is_dir());
        assert_eq!(deep_node.parent(), Some(dir.path().join("src").join("sub").as_path()));
        Ok(())
    }

    #[test]
    fn test_ancestors_walk_to_root() -> io::Result<()> {
        let dir = tempdir()?;
        setup_tree(dir.path())?;
        let mut model = model_for(dir.path());
        model.list_children(None);
        model.list_children(Some(dir.path()));

        let deep = dir.path().join("src").join("sub").join("deep.rs");
        let ancestors = model.ancestors(&deep);
        assert_eq!(
            ancestors,
            vec![
                dir.path().join("src").join("sub"),
                dir.path().join("src"),
                dir.path().to_path_buf(),
            ]
        );
        assert!(model.ancestors(dir.path()).is_empty());
        Ok(())
    }

    #[test]
    fn test_unreadable_directory_yields_empty_list() {
        let mut model = model_for(Path::new("/definitely/not/here"));
        let children = model.list_children(Some(Path::new("/definitely/not/here")));
        assert!(children.is_empty());
    }

    #[test]
    fn test_deleted_entry_becomes_stale() -> io::Result<()> {
        let dir = tempdir()?;
        setup_tree(dir.path())?;
        let mut model = model_for(dir.path());
        model.list_children(None);
        model.list_children(Some(dir.path()));

        let readme = dir.path().join("README.md");
        assert!(model.node(&readme).is_some());
        fs::remove_file(&readme)?;
        assert!(model.node(&readme).is_none());
        Ok(())
    }

    #[test]
    fn test_relisting_drops_vanished_descendants() -> io::Result<()> {
        let dir = tempdir()?;
        setup_tree(dir.path())?;
        let mut model = model_for(dir.path());
        model.list_children(None);
        model.list_children(Some(dir.path()));

        fs::remove_dir_all(dir.path().join("src"))?;
        let top = model.list_children(Some(dir.path()));
        assert_eq!(sorted_names(&top), vec!["README.md"]);
        assert!(model.children_of(dir.path()).iter().all(|n| n.name() != "src"));
        Ok(())
    }

    #[test]
    fn test_resolve_lists_on_demand() -> io::Result<()> {
        let dir = tempdir()?;
        setup_tree(dir.path())?;
        let mut model = model_for(dir.path());

        let main_rs = dir.path().join("src").join("main.rs");
        let node = model.resolve(&main_rs).expect("path inside the root resolves");
        assert_eq!(node.name(), "main.rs");
        assert!(model.resolve(Path::new("/outside/of/everything")).is_none());
        Ok(())
    }

    struct FlakyScanner;

    impl FileSystemScannerOperations for FlakyScanner {
        fn list_directory(&self, dir: &Path) -> FsResult<Vec<ScannedEntry>> {
            if dir.ends_with("locked") {
                return Err(FileSystemError::Io(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "mocked permission error",
                )));
            }
            Ok(vec![
                ScannedEntry {
                    path: dir.join("locked"),
                    name: "locked".into(),
                    is_dir: true,
                    is_symlink: false,
                },
                ScannedEntry {
                    path: dir.join("ok.txt"),
                    name: "ok.txt".into(),
                    is_dir: false,
                    is_symlink: false,
                },
            ])
        }
    }

    #[test]
    fn test_unreadable_subdirectory_is_not_fatal() {
        let root = PathBuf::from("/virtual");
        let mut model = FileTreeModel::new(vec![root.clone()], Arc::new(FlakyScanner));
        let children = model.list_children(Some(&root));
        assert_eq!(sorted_names(&children), vec!["locked", "ok.txt"]);
        let locked = children.iter().find(|n| n.name() == "locked").unwrap();
        assert!(locked.children().is_empty());
    }

    /* Every directory reports the same identity, as a bind mount of a parent would. */
    struct CyclicScanner;

    impl FileSystemScannerOperations for CyclicScanner {
        fn list_directory(&self, dir: &Path) -> FsResult<Vec<ScannedEntry>> {
            Ok(vec![ScannedEntry {
                path: dir.join("again"),
                name: "again".into(),
                is_dir: true,
                is_symlink: false,
            }])
        }

        fn directory_identity(&self, _dir: &Path) -> Option<DirIdentity> {
            Some(DirIdentity::Path(PathBuf::from("/same")))
        }
    }

    #[test]
    fn test_directory_cycle_is_not_descended() {
        let root = PathBuf::from("/virtual");
        let mut model = FileTreeModel::new(vec![root.clone()], Arc::new(CyclicScanner));

        let children = model.list_children(Some(&root));

        assert_eq!(sorted_names(&children), vec!["again"]);
        assert!(children[0].children().is_empty());
        assert!(model.children_of(&root.join("again")).is_empty());
    }
}
