use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/*
 * This module provides the low-level directory listing used by the tree model.
 * It defines errors specific to these operations, a trait
 * `FileSystemScannerOperations` abstracting a single-level listing, and a
 * concrete implementation `CoreFileSystemScanner` built on the `ignore`
 * crate's walker, which classifies each entry with a stat call and honors
 * optional exclude patterns and ignore files.
 */

#[derive(Debug)]
pub enum FileSystemError {
    Io(io::Error),
    IgnoreError(ignore::Error),
    InvalidPath(PathBuf),
    InvalidPattern(String, ignore::Error),
}

impl From<io::Error> for FileSystemError {
    fn from(err: io::Error) -> Self {
        FileSystemError::Io(err)
    }
}

impl From<ignore::Error> for FileSystemError {
    fn from(err: ignore::Error) -> Self {
        FileSystemError::IgnoreError(err)
    }
}

impl std::fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSystemError::Io(e) => write!(f, "I/O error: {e}"),
            FileSystemError::IgnoreError(e) => write!(f, "Ignore file error: {e}"),
            FileSystemError::InvalidPath(p) => write!(f, "Invalid path: {p:?}"),
            FileSystemError::InvalidPattern(pattern, e) => {
                write!(f, "Invalid exclude pattern '{pattern}': {e}")
            }
        }
    }
}

impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileSystemError::Io(e) => Some(e),
            FileSystemError::IgnoreError(e) => Some(e),
            FileSystemError::InvalidPattern(_, e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FileSystemError>;

/*
 * One classified directory entry. `is_symlink` marks entries reached through a
 * symbolic link; the tree model does not descend into linked directories.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedEntry {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/*
 * What makes two directory paths the same directory on disk. Device and inode
 * on Unix, which also catches bind mounts; the canonical path elsewhere.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirIdentity {
    Inode { device: u64, inode: u64 },
    Path(PathBuf),
}

#[cfg(unix)]
pub fn directory_identity(dir: &Path) -> Option<DirIdentity> {
    use std::os::unix::fs::MetadataExt;
    let metadata = fs::metadata(dir).ok()?;
    Some(DirIdentity::Inode {
        device: metadata.dev(),
        inode: metadata.ino(),
    })
}

#[cfg(not(unix))]
pub fn directory_identity(dir: &Path) -> Option<DirIdentity> {
    fs::canonicalize(dir).ok().map(DirIdentity::Path)
}

/*
 * Defines the operations for listing a directory.
 * Implementations return the entries of exactly one directory level in the order
 * the host filesystem enumerates them. Entries that cannot be classified are
 * skipped; only a directory that is not a directory at all is an error.
 */
pub trait FileSystemScannerOperations: Send + Sync {
    fn list_directory(&self, dir: &Path) -> Result<Vec<ScannedEntry>>;

    fn directory_identity(&self, dir: &Path) -> Option<DirIdentity> {
        directory_identity(dir)
    }
}

/*
 * The core implementation of `FileSystemScannerOperations` on top of
 * `ignore::WalkBuilder` limited to depth one. Exclude patterns are gitignore
 * style globs (e.g. `.git`, `node_modules`, `*.log`) applied as walker
 * overrides. When `respect_gitignore` is on, `.gitignore`, `.ignore` and
 * `.git/info/exclude` files are honored as well.
 */
pub struct CoreFileSystemScanner {
    override_patterns: Vec<String>,
    respect_gitignore: bool,
}

impl CoreFileSystemScanner {
    pub fn new() -> Self {
        CoreFileSystemScanner {
            override_patterns: Vec::new(),
            respect_gitignore: false,
        }
    }

    /*
     * Creates a scanner that hides entries matching any of the given patterns.
     * Blank lines and `#` comments are ignored; an invalid pattern is reported
     * instead of being silently dropped.
     */
    pub fn with_exclude_patterns(patterns: &[String]) -> Result<Self> {
        let mut override_patterns = Vec::new();
        for raw in patterns {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            // Override globs whitelist by default; `!` turns them into excludes.
            let override_pattern = format!("!{trimmed}");
            // Validate once up front so a bad pattern fails at startup, not per listing.
            OverrideBuilder::new("/")
                .add(&override_pattern)
                .map_err(|e| FileSystemError::InvalidPattern(trimmed.to_string(), e))?;
            override_patterns.push(override_pattern);
        }
        Ok(CoreFileSystemScanner {
            override_patterns,
            respect_gitignore: false,
        })
    }

    pub fn respect_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    fn build_overrides(&self, dir: &Path) -> Result<Option<Override>> {
        if self.override_patterns.is_empty() {
            return Ok(None);
        }
        let mut builder = OverrideBuilder::new(dir);
        for pattern in &self.override_patterns {
            builder
                .add(pattern)
                .map_err(|e| FileSystemError::InvalidPattern(pattern.clone(), e))?;
        }
        Ok(Some(builder.build()?))
    }
}

impl Default for CoreFileSystemScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystemScannerOperations for CoreFileSystemScanner {
    fn list_directory(&self, dir: &Path) -> Result<Vec<ScannedEntry>> {
        if !dir.is_dir() {
            return Err(FileSystemError::InvalidPath(dir.to_path_buf()));
        }
        log::trace!("FileSystemScanner: Listing directory {dir:?}");

        let mut walker_builder = WalkBuilder::new(dir);
        walker_builder
            .max_depth(Some(1))
            .follow_links(false)
            .standard_filters(false) // Show hidden entries; ignore files only on request.
            .hidden(false)
            .parents(self.respect_gitignore)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .git_global(false)
            .ignore(self.respect_gitignore)
            .require_git(false);
        if let Some(overrides) = self.build_overrides(dir)? {
            walker_builder.overrides(overrides);
        }

        let mut entries = Vec::new();
        for entry_result in walker_builder.build() {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("FileSystemScanner: Skipping unreadable entry in {dir:?}: {e}");
                    continue;
                }
            };
            // The walker yields the starting directory itself at depth 0.
            if entry.depth() == 0 {
                continue;
            }
            let path = entry.path().to_path_buf();
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_symlink = entry.path_is_symlink();

            // stat follows links; a dangling link or a racing delete lands here.
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    log::warn!("FileSystemScanner: Cannot stat {path:?}, skipping: {e}");
                    continue;
                }
            };

            entries.push(ScannedEntry {
                path,
                name,
                is_dir: metadata.is_dir(),
                is_symlink,
            });
        }
        log::debug!(
            "FileSystemScanner: Listed {} entries in {dir:?}.",
            entries.len()
        );
        Ok(entries)
    }
}
