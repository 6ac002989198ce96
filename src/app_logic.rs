/*
 * This module provides the application logic layer, centered around
 * `CopyTreeApp`, which turns user commands into calls on the core services and
 * answers with refresh signals or output text. `tree_view` builds what a tree
 * host displays for each node. Unit tests for `CopyTreeApp` are in
 * `handler_tests.rs`.
 */
pub mod handler;
pub mod tree_view;
pub mod ui_constants;


pub use handler::{APP_NAME, AppError, CopyTreeApp};
pub use tree_view::{TreeIcon, TreeItemView};
