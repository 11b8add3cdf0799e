use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Unified error type for notegrove operations
#[derive(Debug, Error)]
pub enum NotegroveError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // Tree cache errors
    #[error("Tree metadata parse error: {0}")]
    TreeMeta(#[from] serde_json::Error),

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // Note operations
    #[error("Note not found at '{0}'")]
    NoteNotFound(PathBuf),

    #[error("'{0}' already exists")]
    NameCollision(PathBuf),

    #[error("Invalid image data: {0}")]
    InvalidImageData(String),
}

/// Result type alias for notegrove operations
pub type Result<T> = std::result::Result<T, NotegroveError>;

/// A serializable representation of NotegroveError for IPC with the host
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Associated path (if applicable)
    pub path: Option<PathBuf>,
}

impl From<&NotegroveError> for SerializableError {
    fn from(err: &NotegroveError) -> Self {
        let kind = match err {
            NotegroveError::Io(_) => "Io",
            NotegroveError::FileRead { .. } => "FileRead",
            NotegroveError::FileWrite { .. } => "FileWrite",
            NotegroveError::TreeMeta(_) => "TreeMeta",
            NotegroveError::ConfigParse(_) => "ConfigParse",
            NotegroveError::ConfigSerialize(_) => "ConfigSerialize",
            NotegroveError::NoteNotFound(_) => "NoteNotFound",
            NotegroveError::NameCollision(_) => "NameCollision",
            NotegroveError::InvalidImageData(_) => "InvalidImageData",
        }
        .to_string();

        let path = match err {
            NotegroveError::FileRead { path, .. } => Some(path.clone()),
            NotegroveError::FileWrite { path, .. } => Some(path.clone()),
            NotegroveError::NoteNotFound(path) => Some(path.clone()),
            NotegroveError::NameCollision(path) => Some(path.clone()),
            _ => None,
        };

        Self {
            kind,
            message: err.to_string(),
            path,
        }
    }
}

impl From<NotegroveError> for SerializableError {
    fn from(err: NotegroveError) -> Self {
        SerializableError::from(&err)
    }
}

impl NotegroveError {
    /// Convert to a serializable representation for IPC
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }
}
