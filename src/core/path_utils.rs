/*
 * This module provides utility functions for path manipulation: locating the
 * application's local configuration directory, checking whether a path still
 * exists, and rendering paths relative to a workspace root for display and
 * export ordering.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/*
 * Retrieves the application's local (non-roaming) configuration directory,
 * creating it if necessary. Returns `None` when the platform offers no such
 * directory or it cannot be created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app config local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let config_path = proj_dirs.config_local_dir();
        if !config_path.exists() {
            if let Err(e) = fs::create_dir_all(config_path) {
                log::error!(
                    "PathUtils: Failed to create base app config directory {config_path:?}: {e}"
                );
                return None;
            }
            log::debug!("PathUtils: Created base app config directory: {config_path:?}");
        }
        Some(config_path.to_path_buf())
    })
}

/*
 * True if a filesystem entry exists at `path`. Symbolic links count as existing
 * even when dangling, matching how the tree model decides staleness.
 */
pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/*
 * Renders `path` relative to `root`, falling back to the full path when it is
 * not below the root.
 */
pub fn relative_display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
