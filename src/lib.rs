#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Configuration options
pub mod config;

/// Coalescing debounce scheduler
pub mod debounce;

/// Error (common error types)
pub mod error;

/// Callback registry and event types
pub mod events;

/// Filesystem abstraction
pub mod fs;

/// Pasted-image inlining into media folders
pub mod media;

/// Note and folder commands (create, rename, delete)
pub mod notebook;

/// Panel/document synchronization sessions
pub mod panel;

/// Ordered child listings for the tree view
pub mod provider;

/// New-note templates
pub mod template;

/// The ordered tree cache and its persistence
pub mod tree;

/// File-watcher event routing
pub mod watch;

pub use config::Config;
pub use error::{NotegroveError, Result};
pub use fs::{FileSystem, InMemoryFileSystem, RealFileSystem};
pub use notebook::Notebook;
pub use panel::{SessionRegistry, SyncController};
pub use provider::{NoteListProvider, NoteRef};
