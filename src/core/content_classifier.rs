/*
 * Decides whether a selected path is exported as text or referenced by path
 * only. Directories, files above the size ceiling, files with a well-known
 * binary extension, files containing NUL bytes near the start, files that are
 * not valid UTF-8, and files that cannot be read are all non-text.
 */
use std::fs;
use std::path::Path;

/* How many leading bytes are inspected for NUL characters. */
const BINARY_SNIFF_LEN: usize = 8000;

const BINARY_EXTENSIONS: &[&str] = &[
    "7z", "a", "avi", "bin", "bmp", "class", "dll", "dylib", "exe", "gif", "gz", "ico", "jar",
    "jpeg", "jpg", "mov", "mp3", "mp4", "o", "obj", "otf", "pdf", "png", "rar", "so", "tar",
    "tiff", "ttf", "wasm", "webp", "woff", "woff2", "xz", "zip",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileClass {
    Directory,
    TooLarge(u64),
    Binary,
    Unreadable(String),
    Text(String),
}

impl FileClass {
    pub fn is_text(&self) -> bool {
        matches!(self, FileClass::Text(_))
    }
}

pub trait ContentClassifierOperations: Send + Sync {
    fn classify(&self, path: &Path) -> FileClass;
}

pub struct CoreContentClassifier {
    max_text_file_size: u64,
}

impl CoreContentClassifier {
    pub fn new(max_text_file_size: u64) -> Self {
        CoreContentClassifier { max_text_file_size }
    }
}

impl ContentClassifierOperations for CoreContentClassifier {
    fn classify(&self, path: &Path) -> FileClass {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("ContentClassifier: Cannot stat {path:?}: {e}");
                return FileClass::Unreadable(e.to_string());
            }
        };
        if metadata.is_dir() {
            return FileClass::Directory;
        }
        if metadata.len() > self.max_text_file_size {
            log::debug!(
                "ContentClassifier: {path:?} is {} bytes, above the text ceiling.",
                metadata.len()
            );
            return FileClass::TooLarge(metadata.len());
        }
        if has_binary_extension(path) {
            return FileClass::Binary;
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("ContentClassifier: Cannot read {path:?}: {e}");
                return FileClass::Unreadable(e.to_string());
            }
        };
        classify_bytes(bytes)
    }
}

fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

/*
 * Classifies raw file content: NUL bytes in the sniffed prefix or invalid
 * UTF-8 anywhere make it binary.
 */
pub fn classify_bytes(bytes: Vec<u8>) -> FileClass {
    let sniff_len = bytes.len().min(BINARY_SNIFF_LEN);
    if bytes[..sniff_len].contains(&0) {
        return FileClass::Binary;
    }
    match String::from_utf8(bytes) {
        Ok(text) => FileClass::Text(text),
        Err(_) => FileClass::Binary,
    }
}
