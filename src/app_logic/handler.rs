use crate::app_logic::tree_view::TreeItemView;
use crate::core::{
    ClearConfirmation, ConfigError, ConfigManagerOperations, ExportPackerOperations,
    ExportSegment, ExportSettings, FileNode, FileSystemScannerOperations, FileTreeModel,
    PackError, PackOptions, RefreshSignal, SelectionError, SelectionPersistenceOperations,
    SelectionStore, TokenCounterOperations, html_export,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const APP_NAME: &str = "CopyTree";

#[derive(Debug)]
pub enum AppError {
    Io(io::Error),
    Selection(SelectionError),
    Pack(PackError),
    Config(ConfigError),
    NotInWorkspace(PathBuf),
    NotFound(PathBuf),
    WorkspaceRoot(PathBuf),
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<SelectionError> for AppError {
    fn from(err: SelectionError) -> Self {
        AppError::Selection(err)
    }
}

impl From<PackError> for AppError {
    fn from(err: PackError) -> Self {
        AppError::Pack(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Io(e) => write!(f, "I/O error: {e}"),
            AppError::Selection(e) => write!(f, "{e}"),
            AppError::Pack(e) => write!(f, "{e}"),
            AppError::Config(e) => write!(f, "{e}"),
            AppError::NotInWorkspace(p) => {
                write!(f, "{} is not inside an open workspace folder", p.display())
            }
            AppError::NotFound(p) => write!(f, "{} does not exist", p.display()),
            AppError::WorkspaceRoot(p) => {
                write!(f, "{} is a workspace root and cannot be modified", p.display())
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Io(e) => Some(e),
            AppError::Selection(e) => Some(e),
            AppError::Pack(e) => Some(e),
            AppError::Config(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/*
 * The application's command layer. It owns the tree model and the selection
 * store, and turns each user command into calls on the core services. Every
 * mutating command returns the refresh signals the tree host should act on;
 * output-producing commands return their text.
 *
 * All collaborators are injected as `XxxOperations` trait objects so the whole
 * command set can run against mocks.
 */
pub struct CopyTreeApp {
    pub(crate) tree: FileTreeModel,
    pub(crate) selection: SelectionStore,
    pub(crate) settings: ExportSettings,
    pub(crate) config_manager: Arc<dyn ConfigManagerOperations>,
    pub(crate) packer: Arc<dyn ExportPackerOperations>,
    pub(crate) token_counter: Arc<dyn TokenCounterOperations>,
}

impl CopyTreeApp {
    /*
     * Starts a session with already loaded settings and hydrates the selection.
     * Stale persisted paths are pruned during hydration. `config_manager` is
     * where settings changes are saved.
     */
    pub fn new(
        settings: ExportSettings,
        roots: Vec<PathBuf>,
        scanner: Arc<dyn FileSystemScannerOperations>,
        persistence: Arc<dyn SelectionPersistenceOperations>,
        config_manager: Arc<dyn ConfigManagerOperations>,
        packer: Arc<dyn ExportPackerOperations>,
        token_counter: Arc<dyn TokenCounterOperations>,
    ) -> Result<Self> {
        let selection = SelectionStore::load(persistence)?;
        log::info!(
            "CopyTreeApp: Started with {} root(s) and {} selected path(s).",
            roots.len(),
            selection.len()
        );
        Ok(CopyTreeApp {
            tree: FileTreeModel::new(roots, scanner),
            selection,
            settings,
            config_manager,
            packer,
            token_counter,
        })
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: ExportSettings) -> Result<()> {
        self.config_manager.save_settings(&settings)?;
        self.settings = settings;
        log::debug!("CopyTreeApp: Settings updated.");
        Ok(())
    }

    pub fn selected_paths(&self) -> Vec<PathBuf> {
        self.selection.selected_paths()
    }

    /*
     * Views of the children of `parent`, or of the workspace roots for `None`.
     */
    pub fn list_children(&mut self, parent: Option<&Path>) -> Vec<TreeItemView> {
        let nodes = self.tree.list_children(parent);
        nodes
            .iter()
            .map(|node| TreeItemView::for_node(node, &self.selection, &self.tree))
            .collect()
    }

    /*
     * Depth-first views of the subtree below `start` (or of every root), each
     * with its depth. The starting node itself is included at depth 0.
     */
    pub fn tree_walk(&mut self, start: Option<&Path>) -> Result<Vec<(usize, TreeItemView)>> {
        let starts: Vec<FileNode> = match start {
            Some(path) => vec![self.resolve_node(path)?],
            None => self.tree.list_children(None),
        };
        let mut result = Vec::new();
        for node in starts {
            if node.is_dir() {
                self.tree.list_children(Some(node.path()));
            }
            self.collect_views(node.path(), 0, &mut result);
        }
        Ok(result)
    }

    fn collect_views(&self, path: &Path, depth: usize, out: &mut Vec<(usize, TreeItemView)>) {
        let Some(node) = self.tree.node(path) else {
            return;
        };
        out.push((depth, TreeItemView::for_node(node, &self.selection, &self.tree)));
        for child in self.tree.children_of(path) {
            self.collect_views(child.path(), depth + 1, out);
        }
    }

    fn resolve_node(&mut self, path: &Path) -> Result<FileNode> {
        if !self.tree.roots().iter().any(|root| path.starts_with(root)) {
            return Err(AppError::NotInWorkspace(path.to_path_buf()));
        }
        self.tree
            .resolve(path)
            .ok_or_else(|| AppError::NotFound(path.to_path_buf()))
    }

    /*
     * What a tree host does when a node is activated: files toggle, directories
     * only expand, which needs no signal.
     */
    pub fn activate(&mut self, path: &Path) -> Result<Vec<RefreshSignal>> {
        self.toggle_select(path)
    }

    pub fn toggle_select(&mut self, path: &Path) -> Result<Vec<RefreshSignal>> {
        let node = self.resolve_node(path)?;
        let signals = self.selection.toggle_select(&node, &self.tree)?;
        log::debug!("CopyTreeApp: Toggle of {path:?} refreshes {signals:?}");
        Ok(signals)
    }

    pub fn select(&mut self, path: &Path) -> Result<Vec<RefreshSignal>> {
        let node = self.resolve_node(path)?;
        let signals = self.selection.select(&node, &self.tree)?;
        log::debug!("CopyTreeApp: Select of {path:?} refreshes {signals:?}");
        Ok(signals)
    }

    pub fn deselect(&mut self, path: &Path) -> Result<Vec<RefreshSignal>> {
        let node = self.resolve_node(path)?;
        let signals = self.selection.deselect(&node, &self.tree)?;
        log::debug!("CopyTreeApp: Deselect of {path:?} refreshes {signals:?}");
        Ok(signals)
    }

    pub fn clear_all(&mut self, confirmation: ClearConfirmation) -> Result<Vec<RefreshSignal>> {
        Ok(self.selection.clear_all(confirmation)?)
    }

    pub fn refresh(&mut self) -> Vec<RefreshSignal> {
        self.tree.reset();
        log::info!("CopyTreeApp: Tree refreshed.");
        vec![RefreshSignal::All]
    }

    /*
     * Collapsing drops every materialized subtree; the host redraws the roots
     * folded.
     */
    pub fn collapse_all(&mut self) -> Vec<RefreshSignal> {
        self.tree.reset();
        log::debug!("CopyTreeApp: Collapsed all nodes.");
        vec![RefreshSignal::All]
    }

    /*
     * Packs the current selection. Stale paths are pruned first, and the
     * character limit must be configured.
     */
    pub fn export_segments(&mut self) -> Result<Vec<ExportSegment>> {
        let root = self
            .tree
            .primary_root()
            .map(Path::to_path_buf)
            .ok_or(PackError::NoWorkspace)?;
        let options = PackOptions::from_settings(&self.settings)?;
        self.selection.prune_stale()?;
        let segments = self
            .packer
            .pack(&self.selection.selected_paths(), Some(&root), &options)?;
        log::info!(
            "CopyTreeApp: Exported {} path(s) into {} segment(s).",
            self.selection.len(),
            segments.len()
        );
        Ok(segments)
    }

    pub fn export_html(&mut self, generated_at: &str) -> Result<String> {
        let segments = self.export_segments()?;
        Ok(html_export::render_html(
            &segments,
            self.token_counter.as_ref(),
            generated_at,
        ))
    }

    /*
     * The plain-text copy of the selection with `copyTemplate` applied. An empty
     * selection copies the empty string, template or not.
     */
    pub fn copy_text(&mut self) -> Result<String> {
        let root = self
            .tree
            .primary_root()
            .map(Path::to_path_buf)
            .ok_or(PackError::NoWorkspace)?;
        self.selection.prune_stale()?;
        let content = self
            .packer
            .build_copy_text(&self.selection.selected_paths(), Some(&root))?;
        if content.is_empty() {
            return Ok(content);
        }
        Ok(self.settings.apply_copy_template(&content))
    }

    fn check_modifiable(&self, path: &Path) -> Result<()> {
        if self.tree.roots().iter().any(|root| root == path) {
            return Err(AppError::WorkspaceRoot(path.to_path_buf()));
        }
        if !self.tree.roots().iter().any(|root| path.starts_with(root)) {
            return Err(AppError::NotInWorkspace(path.to_path_buf()));
        }
        Ok(())
    }

    /*
     * Renames on disk and carries the selection marks of `from` (and anything
     * below it) over to `to`. If the moved marks cannot be persisted, the
     * rename is undone on disk so that disk and selection stay in step.
     */
    pub fn rename(&mut self, from: &Path, to: &Path) -> Result<Vec<RefreshSignal>> {
        self.check_modifiable(from)?;
        self.check_modifiable(to)?;
        if fs::symlink_metadata(from).is_err() {
            return Err(AppError::NotFound(from.to_path_buf()));
        }
        fs::rename(from, to)?;
        let moved = match self.selection.rename_path(from, to) {
            Ok(moved) => moved,
            Err(e) => {
                log::error!("CopyTreeApp: Selection for {from:?} not saved after rename: {e}");
                if let Err(undo) = fs::rename(to, from) {
                    log::error!(
                        "CopyTreeApp: Could not undo rename of {from:?} to {to:?}: {undo}. Stale marks stay until the next prune."
                    );
                }
                self.tree.reset();
                return Err(e.into());
            }
        };
        self.tree.reset();
        log::info!("CopyTreeApp: Renamed {from:?} to {to:?} (selection moved: {moved}).");
        Ok(vec![RefreshSignal::All])
    }

    pub fn delete(&mut self, path: &Path) -> Result<Vec<RefreshSignal>> {
        self.check_modifiable(path)?;
        let metadata =
            fs::symlink_metadata(path).map_err(|_| AppError::NotFound(path.to_path_buf()))?;
        if metadata.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        let forgotten = self.selection.forget_path(path).inspect_err(|e| {
            log::error!(
                "CopyTreeApp: {path:?} was deleted but its marks were not dropped: {e}. They go at the next prune."
            );
        })?;
        self.tree.reset();
        log::info!("CopyTreeApp: Deleted {path:?} ({forgotten} selected path(s) dropped).");
        Ok(vec![RefreshSignal::All])
    }

    pub fn create_file(&mut self, path: &Path) -> Result<Vec<RefreshSignal>> {
        self.check_modifiable(path)?;
        fs::File::create_new(path)?;
        log::info!("CopyTreeApp: Created file {path:?}.");
        Ok(self.refresh_parent_of(path))
    }

    pub fn create_folder(&mut self, path: &Path) -> Result<Vec<RefreshSignal>> {
        self.check_modifiable(path)?;
        fs::create_dir(path)?;
        log::info!("CopyTreeApp: Created folder {path:?}.");
        Ok(self.refresh_parent_of(path))
    }

    /*
     * After a creation only the parent listing changes. If the parent was never
     * listed there is nothing on screen to update in place.
     */
    fn refresh_parent_of(&mut self, path: &Path) -> Vec<RefreshSignal> {
        match path.parent() {
            Some(parent) if self.tree.node(parent).is_some() => {
                self.tree.list_children(Some(parent));
                vec![RefreshSignal::Node(parent.to_path_buf())]
            }
            _ => vec![RefreshSignal::All],
        }
    }
}
