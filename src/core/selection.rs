/*
 * The selection store: the set of paths the user has marked for export.
 *
 * The store is constructed with an injected `SelectionPersistenceOperations`
 * and writes the whole set back after every mutation before returning. Every
 * mutation answers with the refresh signals a tree view needs to redraw: the
 * mutated node first, then each ancestor up to its root, so aggregate
 * "(N) selected" labels stay current without rebuilding the tree.
 */
use crate::core::file_node::FileNode;
use crate::core::file_tree::FileTreeModel;
use crate::core::path_utils;
use crate::core::state_manager::{SelectionPersistenceOperations, StateError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub enum SelectionError {
    Persistence(StateError),
}

impl From<StateError> for SelectionError {
    fn from(err: StateError) -> Self {
        SelectionError::Persistence(err)
    }
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionError::Persistence(e) => write!(f, "Failed to persist selection: {e}"),
        }
    }
}

impl std::error::Error for SelectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SelectionError::Persistence(e) => Some(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, SelectionError>;

/*
 * A fire-and-forget notification that a node's presentation may have changed.
 * `All` asks for the entire tree to be redrawn.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshSignal {
    Node(PathBuf),
    All,
}

/*
 * The answer of the caller's yes/no gate before the whole selection is dropped.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearConfirmation {
    Confirmed,
    Declined,
}

pub struct SelectionStore {
    selected: BTreeSet<PathBuf>,
    persistence: Arc<dyn SelectionPersistenceOperations>,
}

impl SelectionStore {
    /*
     * Hydrates the store from persistence. Paths that no longer exist on disk
     * are dropped, and if anything was dropped the pruned set is written back
     * right away.
     */
    pub fn load(persistence: Arc<dyn SelectionPersistenceOperations>) -> Result<Self> {
        let stored = persistence.load()?;
        let stored_count = stored.len();
        let selected: BTreeSet<PathBuf> = stored
            .into_iter()
            .map(PathBuf::from)
            .filter(|p| path_utils::path_exists(p))
            .collect();
        let mut store = SelectionStore {
            selected,
            persistence,
        };
        let pruned = stored_count - store.selected.len();
        if pruned > 0 {
            log::info!("SelectionStore: Dropped {pruned} stale path(s) while loading.");
            store.persist()?;
        }
        log::debug!(
            "SelectionStore: Loaded {} selected path(s).",
            store.selected.len()
        );
        Ok(store)
    }

    fn persist(&self) -> Result<()> {
        let paths: Vec<String> = self
            .selected
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        self.persistence.save(&paths)?;
        Ok(())
    }

    fn refresh_signals_for(path: &Path, tree: &FileTreeModel) -> Vec<RefreshSignal> {
        let mut signals = vec![RefreshSignal::Node(path.to_path_buf())];
        signals.extend(tree.ancestors(path).into_iter().map(RefreshSignal::Node));
        signals
    }

    pub fn select(&mut self, node: &FileNode, tree: &FileTreeModel) -> Result<Vec<RefreshSignal>> {
        let inserted = self.selected.insert(node.path().to_path_buf());
        if let Err(e) = self.persist() {
            if inserted {
                self.selected.remove(node.path());
            }
            return Err(e);
        }
        log::debug!("SelectionStore: Selected {:?}.", node.path());
        Ok(Self::refresh_signals_for(node.path(), tree))
    }

    pub fn deselect(
        &mut self,
        node: &FileNode,
        tree: &FileTreeModel,
    ) -> Result<Vec<RefreshSignal>> {
        let removed = self.selected.remove(node.path());
        if let Err(e) = self.persist() {
            if removed {
                self.selected.insert(node.path().to_path_buf());
            }
            return Err(e);
        }
        log::debug!("SelectionStore: Deselected {:?}.", node.path());
        Ok(Self::refresh_signals_for(node.path(), tree))
    }

    /*
     * Flips the mark of a file node. Directories are not toggled; the call
     * returns no signals for them.
     */
    pub fn toggle_select(
        &mut self,
        node: &FileNode,
        tree: &FileTreeModel,
    ) -> Result<Vec<RefreshSignal>> {
        if node.is_dir() {
            log::trace!("SelectionStore: Ignoring toggle on directory {:?}.", node.path());
            return Ok(Vec::new());
        }
        if self.is_selected(node.path()) {
            self.deselect(node, tree)
        } else {
            self.select(node, tree)
        }
    }

    pub fn is_selected(&self, path: &Path) -> bool {
        self.selected.contains(path)
    }

    /*
     * Number of selected files among the materialized descendants of a
     * directory. Selected directories do not count themselves. Always 0 for
     * files.
     */
    pub fn selected_count(&self, node: &FileNode, tree: &FileTreeModel) -> usize {
        if !node.is_dir() {
            return 0;
        }
        tree.children_of(node.path())
            .into_iter()
            .map(|child| {
                if child.is_dir() {
                    self.selected_count(child, tree)
                } else {
                    usize::from(self.is_selected(child.path()))
                }
            })
            .sum()
    }

    pub fn clear_all(&mut self, confirmation: ClearConfirmation) -> Result<Vec<RefreshSignal>> {
        if confirmation == ClearConfirmation::Declined {
            log::debug!("SelectionStore: Clear declined, keeping selection.");
            return Ok(Vec::new());
        }
        let previous = std::mem::take(&mut self.selected);
        if let Err(e) = self.persist() {
            self.selected = previous;
            return Err(e);
        }
        log::info!("SelectionStore: Cleared {} selected path(s).", previous.len());
        Ok(vec![RefreshSignal::All])
    }

    /*
     * Drops selected paths that no longer exist and persists the result if
     * anything changed. Returns the dropped paths.
     */
    pub fn prune_stale(&mut self) -> Result<Vec<PathBuf>> {
        let stale: Vec<PathBuf> = self
            .selected
            .iter()
            .filter(|p| !path_utils::path_exists(p))
            .cloned()
            .collect();
        if stale.is_empty() {
            return Ok(stale);
        }
        for path in &stale {
            self.selected.remove(path);
        }
        if let Err(e) = self.persist() {
            self.selected.extend(stale);
            return Err(e);
        }
        log::info!("SelectionStore: Pruned {} stale path(s).", stale.len());
        Ok(stale)
    }

    /*
     * Moves the marks of `from` and everything below it to the same relative
     * location under `to`. Used after a rename on disk. Returns whether any
     * mark moved.
     */
    pub fn rename_path(&mut self, from: &Path, to: &Path) -> Result<bool> {
        let moved: Vec<PathBuf> = self
            .selected
            .iter()
            .filter(|p| p.starts_with(from))
            .cloned()
            .collect();
        if moved.is_empty() {
            return Ok(false);
        }
        let previous = self.selected.clone();
        for old in &moved {
            self.selected.remove(old);
            match old.strip_prefix(from) {
                Ok(suffix) if !suffix.as_os_str().is_empty() => {
                    self.selected.insert(to.join(suffix));
                }
                _ => {
                    self.selected.insert(to.to_path_buf());
                }
            }
        }
        if let Err(e) = self.persist() {
            self.selected = previous;
            return Err(e);
        }
        Ok(true)
    }

    /*
     * Removes the marks of `path` and everything below it. Used after a delete
     * on disk.
     */
    pub fn forget_path(&mut self, path: &Path) -> Result<usize> {
        let before = self.selected.len();
        let previous = self.selected.clone();
        self.selected.retain(|p| !p.starts_with(path));
        let removed = before - self.selected.len();
        if removed > 0 {
            if let Err(e) = self.persist() {
                self.selected = previous;
                return Err(e);
            }
        }
        Ok(removed)
    }

    /*
     * All selected paths in ascending order.
     */
    pub fn selected_paths(&self) -> Vec<PathBuf> {
        self.selected.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::file_system::CoreFileSystemScanner;
    use crate::core::state_manager::{InMemorySelectionPersistence, Result as StateResult};
    use std::fs;
    use std::io;
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        dir: TempDir,
        tree: FileTreeModel,
        persistence: Arc<InMemorySelectionPersistence>,
    }

    impl Fixture {
        fn new() -> io::Result<Self> {
            let dir = tempdir()?;
            fs::create_dir_all(dir.path().join("dir").join("nested"))?;
            fs::write(dir.path().join("a.txt"), "alpha")?;
            fs::write(dir.path().join("dir").join("file.txt"), "file")?;
            fs::write(dir.path().join("dir").join("nested").join("deep.txt"), "deep")?;
            let mut tree = FileTreeModel::new(
                vec![dir.path().to_path_buf()],
                Arc::new(CoreFileSystemScanner::new()),
            );
            tree.list_children(None);
            tree.list_children(Some(dir.path()));
            Ok(Fixture {
                dir,
                tree,
                persistence: Arc::new(InMemorySelectionPersistence::new()),
            })
        }

        fn store(&self) -> SelectionStore {
            SelectionStore::load(self.persistence.clone()).unwrap()
        }

        fn node(&self, relative: &str) -> FileNode {
            let path = if relative.is_empty() {
                self.dir.path().to_path_buf()
            } else {
                self.dir.path().join(relative)
            };
            self.tree.node(&path).cloned().expect("node is materialized")
        }

        fn path_string(&self, relative: &str) -> String {
            self.dir.path().join(relative).to_string_lossy().into_owned()
        }
    }

    #[test]
    fn test_select_is_idempotent_in_memory_and_persisted() {
        let fx = Fixture::new().unwrap();
        let mut store = fx.store();
        let node = fx.node("a.txt");

        store.select(&node, &fx.tree).unwrap();
        let after_once = fx.persistence.snapshot();
        store.select(&node, &fx.tree).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(fx.persistence.snapshot(), after_once);
        assert_eq!(after_once, vec![fx.path_string("a.txt")]);
    }

    #[test]
    fn test_deselect_is_idempotent_and_absent_path_is_noop() {
        let fx = Fixture::new().unwrap();
        let mut store = fx.store();
        let node = fx.node("a.txt");

        store.deselect(&node, &fx.tree).unwrap();
        assert!(store.is_empty());

        store.select(&node, &fx.tree).unwrap();
        store.deselect(&node, &fx.tree).unwrap();
        store.deselect(&node, &fx.tree).unwrap();
        assert!(!store.is_selected(node.path()));
        assert!(fx.persistence.snapshot().is_empty());
    }

    #[test]
    fn test_select_signals_node_then_ancestors() {
        let fx = Fixture::new().unwrap();
        let mut store = fx.store();
        let deep = fx.node("dir/nested/deep.txt");

        let signals = store.select(&deep, &fx.tree).unwrap();
        assert_eq!(
            signals,
            vec![
                RefreshSignal::Node(fx.dir.path().join("dir/nested/deep.txt")),
                RefreshSignal::Node(fx.dir.path().join("dir/nested")),
                RefreshSignal::Node(fx.dir.path().join("dir")),
                RefreshSignal::Node(fx.dir.path().to_path_buf()),
            ]
        );
    }

    #[test]
    fn test_selected_count_scenario_directory_and_file() {
        let fx = Fixture::new().unwrap();
        let mut store = fx.store();
        let dir = fx.node("dir");
        let file = fx.node("dir/file.txt");

        store.select(&dir, &fx.tree).unwrap();
        store.select(&file, &fx.tree).unwrap();
        assert_eq!(store.selected_count(&dir, &fx.tree), 1);

        store.deselect(&file, &fx.tree).unwrap();
        assert_eq!(store.selected_count(&dir, &fx.tree), 0);
        assert!(store.is_selected(dir.path()));
    }

    #[test]
    fn test_selected_count_propagates_through_subdirectories() {
        let fx = Fixture::new().unwrap();
        let mut store = fx.store();
        store.select(&fx.node("a.txt"), &fx.tree).unwrap();
        store.select(&fx.node("dir/file.txt"), &fx.tree).unwrap();
        store.select(&fx.node("dir/nested/deep.txt"), &fx.tree).unwrap();

        assert_eq!(store.selected_count(&fx.node(""), &fx.tree), 3);
        assert_eq!(store.selected_count(&fx.node("dir"), &fx.tree), 2);
        assert_eq!(store.selected_count(&fx.node("dir/nested"), &fx.tree), 1);
        assert_eq!(store.selected_count(&fx.node("a.txt"), &fx.tree), 0);
    }

    #[test]
    fn test_toggle_ignores_directories() {
        let fx = Fixture::new().unwrap();
        let mut store = fx.store();

        let signals = store.toggle_select(&fx.node("dir"), &fx.tree).unwrap();
        assert!(signals.is_empty());
        assert!(store.is_empty());

        let file = fx.node("a.txt");
        store.toggle_select(&file, &fx.tree).unwrap();
        assert!(store.is_selected(file.path()));
        store.toggle_select(&file, &fx.tree).unwrap();
        assert!(!store.is_selected(file.path()));
    }

    #[test]
    fn test_clear_all_requires_confirmation() {
        let fx = Fixture::new().unwrap();
        let mut store = fx.store();
        store.select(&fx.node("a.txt"), &fx.tree).unwrap();

        assert!(store.clear_all(ClearConfirmation::Declined).unwrap().is_empty());
        assert_eq!(store.len(), 1);

        let signals = store.clear_all(ClearConfirmation::Confirmed).unwrap();
        assert_eq!(signals, vec![RefreshSignal::All]);
        assert!(store.is_empty());
        assert!(fx.persistence.snapshot().is_empty());
    }

    #[test]
    fn test_load_prunes_stale_paths_and_repersists() {
        let fx = Fixture::new().unwrap();
        let existing = fx.path_string("a.txt");
        let missing = fx.path_string("gone.txt");
        let persistence = Arc::new(InMemorySelectionPersistence::with_paths(vec![
            existing.clone(),
            missing.clone(),
        ]));

        let store = SelectionStore::load(persistence.clone()).unwrap();

        assert!(store.is_selected(Path::new(&existing)));
        assert!(!store.is_selected(Path::new(&missing)));
        assert_eq!(persistence.snapshot(), vec![existing]);
    }

    #[test]
    fn test_prune_stale_before_export() {
        let fx = Fixture::new().unwrap();
        let mut store = fx.store();
        store.select(&fx.node("a.txt"), &fx.tree).unwrap();
        store.select(&fx.node("dir/file.txt"), &fx.tree).unwrap();

        fs::remove_file(fx.dir.path().join("a.txt")).unwrap();
        let pruned = store.prune_stale().unwrap();

        assert_eq!(pruned, vec![fx.dir.path().join("a.txt")]);
        assert_eq!(store.selected_paths(), vec![fx.dir.path().join("dir/file.txt")]);
        assert_eq!(fx.persistence.snapshot(), vec![fx.path_string("dir/file.txt")]);
        assert_eq!(store.selected_count(&fx.node(""), &fx.tree), 1);
    }

    #[test]
    fn test_rename_and_forget_move_marks() {
        let fx = Fixture::new().unwrap();
        let mut store = fx.store();
        store.select(&fx.node("dir/file.txt"), &fx.tree).unwrap();
        store.select(&fx.node("dir/nested/deep.txt"), &fx.tree).unwrap();

        let from = fx.dir.path().join("dir");
        let to = fx.dir.path().join("renamed");
        assert!(store.rename_path(&from, &to).unwrap());
        assert_eq!(
            store.selected_paths(),
            vec![to.join("file.txt"), to.join("nested").join("deep.txt")]
        );

        assert_eq!(store.forget_path(&to.join("nested")).unwrap(), 1);
        assert_eq!(store.selected_paths(), vec![to.join("file.txt")]);
        assert!(!store.rename_path(Path::new("/nowhere"), &to).unwrap());
    }

    struct FailingPersistence {
        fail: Mutex<bool>,
    }

    impl SelectionPersistenceOperations for FailingPersistence {
        fn load(&self) -> StateResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn save(&self, _paths: &[String]) -> StateResult<()> {
            if *self.fail.lock().unwrap() {
                return Err(StateError::Io(io::Error::other("mocked write failure")));
            }
            Ok(())
        }
    }

    #[test]
    fn test_failed_persist_rolls_back_mutation() {
        let fx = Fixture::new().unwrap();
        let persistence = Arc::new(FailingPersistence {
            fail: Mutex::new(true),
        });
        let mut store = SelectionStore::load(persistence.clone()).unwrap();
        let node = fx.node("a.txt");

        let result = store.select(&node, &fx.tree);
        assert!(matches!(result, Err(SelectionError::Persistence(_))));
        assert!(!store.is_selected(node.path()));

        *persistence.fail.lock().unwrap() = false;
        store.select(&node, &fx.tree).unwrap();
        *persistence.fail.lock().unwrap() = true;
        assert!(store.clear_all(ClearConfirmation::Confirmed).is_err());
        assert!(store.is_selected(node.path()));
    }
}
