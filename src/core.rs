/*
 * This module consolidates the core, platform-agnostic logic of the application:
 * the lazily materialized file tree, the persisted selection set, content
 * classification, export packing, and the HTML/plain-text output formats.
 * Services are exposed as `XxxOperations` traits (`FileSystemScannerOperations`,
 * `StateManagerOperations`, `SelectionPersistenceOperations`,
 * `ConfigManagerOperations`, `ContentClassifierOperations`,
 * `ExportPackerOperations`, `TokenCounterOperations`) so that the app layer
 * can be exercised with mocks.
 */
pub mod checksum_utils;
pub mod config;
pub mod content_classifier;
pub mod file_node;
pub mod file_system;
pub mod file_tree;
pub mod html_export;
pub mod packer;
pub mod path_utils;
pub mod selection;
pub mod state_manager;
pub mod tokenizer_utils;

pub use file_node::FileNode;

// Re-export file system related items
pub use file_system::{
    CoreFileSystemScanner, FileSystemError, FileSystemScannerOperations, ScannedEntry,
};
pub use file_tree::FileTreeModel;

// Re-export selection and persistence items
pub use selection::{ClearConfirmation, RefreshSignal, SelectionError, SelectionStore};
pub use state_manager::{
    CoreStateManager, InMemorySelectionPersistence, KeyValueSelectionPersistence,
    SelectionPersistenceOperations, StateError, StateManagerOperations,
};

// Re-export config related items
pub use config::{ConfigError, ConfigManagerOperations, CoreConfigManager, ExportSettings};

// Re-export export related items
pub use content_classifier::{ContentClassifierOperations, CoreContentClassifier, FileClass};
pub use packer::{
    CoreExportPacker, ExportPackerOperations, ExportSegment, ExportTemplates, HeaderPolicy,
    PackError, PackOptions,
};

pub use tokenizer_utils::{
    CoreTikTokenCounter, SimpleWhitespaceTokenCounter, TokenCounterOperations,
};
