/*
 * Shared presentation constants for the tree view: the description glyphs
 * shown next to file nodes and the icon tags a tree host maps to its own
 * folder and file images.
 */

// Description of a file node that is part of the selection.
pub const SELECTED_FILE_MARK: &str = "✅";

// Description of a file node that is not selected.
pub const UNSELECTED_FILE_MARK: &str = "☑️";

// Icon tags.
pub const ICON_TAG_FOLDER: &str = "folder";
pub const ICON_TAG_FILE: &str = "file";

// Indentation per depth level when the tree is printed as text.
pub const TREE_INDENT: &str = "  ";
