/*
 * Presentation of tree nodes for a tree host: label, collapsible state, icon
 * tag and the selection description. Built from a node plus the current
 * selection; nothing here is cached, so a refresh signal simply means "build
 * the view for this path again".
 */
use crate::app_logic::ui_constants;
use crate::core::{FileNode, FileTreeModel, SelectionStore};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeIcon {
    Folder,
    File,
}

impl TreeIcon {
    pub fn tag(&self) -> &'static str {
        match self {
            TreeIcon::Folder => ui_constants::ICON_TAG_FOLDER,
            TreeIcon::File => ui_constants::ICON_TAG_FILE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItemView {
    pub path: PathBuf,
    pub label: String,
    pub collapsible: bool,
    pub icon: TreeIcon,
    pub description: Option<String>,
}

impl TreeItemView {
    /*
     * Builds the view of `node`. Files always carry a mark; a directory shows
     * "(N) selected" only when N is positive.
     */
    pub fn for_node(node: &FileNode, selection: &SelectionStore, tree: &FileTreeModel) -> Self {
        let description = if node.is_dir() {
            match selection.selected_count(node, tree) {
                0 => None,
                count => Some(format!("({count}) selected")),
            }
        } else if selection.is_selected(node.path()) {
            Some(ui_constants::SELECTED_FILE_MARK.to_string())
        } else {
            Some(ui_constants::UNSELECTED_FILE_MARK.to_string())
        };
        TreeItemView {
            path: node.path().to_path_buf(),
            label: node.name().to_string(),
            collapsible: node.is_dir(),
            icon: if node.is_dir() {
                TreeIcon::Folder
            } else {
                TreeIcon::File
            },
            description,
        }
    }

    /* One line of a text rendering of the tree. */
    pub fn to_text_line(&self, depth: usize) -> String {
        let indent = ui_constants::TREE_INDENT.repeat(depth);
        let marker = if self.collapsible { "/" } else { "" };
        match &self.description {
            Some(description) => format!("{indent}{}{marker} {description}", self.label),
            None => format!("{indent}{}{marker}", self.label),
        }
    }
}
