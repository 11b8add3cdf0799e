//! Configuration types for Notegrove.
//!
//! This module provides the [`Config`] struct which stores workspace
//! settings. Configuration is persisted as TOML inside the hidden metadata
//! folder of a workspace (`<root>/.notegrove/config.toml`).
//!
//! # Key Configuration Fields
//!
//! - `note_extension`: file extension that identifies a note (default `.md`)
//! - `media_folder`: subfolder for converted images (default `.media`)
//! - `meta_folder`: hidden per-workspace metadata folder (default `.notegrove`)
//! - `excluded_folders`: directories never shown in the tree
//! - `*_debounce_ms`: quiet-period windows for the coalescing scheduler

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fs::FileSystem;

/// Name of the persisted tree-ordering document inside the meta folder.
pub const TREE_META_FILE: &str = "tree_meta.json";

/// Subdirectory of the meta folder holding new-note templates.
pub const TEMPLATE_DIR: &str = "templates";

/// `Config` holds the parts of Notegrove the user can configure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// File extension identifying note files, including the leading dot
    #[serde(default = "default_note_extension")]
    pub note_extension: String,

    /// Folder (relative to a note's directory, or absolute) for media files
    #[serde(default = "default_media_folder")]
    pub media_folder: String,

    /// Hidden per-workspace metadata folder name
    #[serde(default = "default_meta_folder")]
    pub meta_folder: String,

    /// Directory names excluded from the tree entirely
    #[serde(default = "default_excluded_folders")]
    pub excluded_folders: Vec<String>,

    /// Template applied when creating a new note (name under templates/)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_note_template: Option<String>,

    /// Quiet period before the tree ordering is persisted (trailing)
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Quiet period for tree refresh coalescing (leading edge)
    #[serde(default = "default_refresh_debounce_ms")]
    pub refresh_debounce_ms: u64,

    /// Quiet period before editor changes are forwarded to the controller
    #[serde(default = "default_edit_debounce_ms")]
    pub edit_debounce_ms: u64,
}

fn default_note_extension() -> String {
    ".md".to_string()
}

fn default_media_folder() -> String {
    ".media".to_string()
}

fn default_meta_folder() -> String {
    ".notegrove".to_string()
}

fn default_excluded_folders() -> Vec<String> {
    vec!["node_modules".to_string()]
}

fn default_save_debounce_ms() -> u64 {
    1000
}

fn default_refresh_debounce_ms() -> u64 {
    200
}

fn default_edit_debounce_ms() -> u64 {
    400
}

impl Default for Config {
    fn default() -> Self {
        Self {
            note_extension: default_note_extension(),
            media_folder: default_media_folder(),
            meta_folder: default_meta_folder(),
            excluded_folders: default_excluded_folders(),
            new_note_template: None,
            save_debounce_ms: default_save_debounce_ms(),
            refresh_debounce_ms: default_refresh_debounce_ms(),
            edit_debounce_ms: default_edit_debounce_ms(),
        }
    }
}

impl Config {
    /// Create a config with defaults, normalizing the given extension
    pub fn with_extension(extension: &str) -> Self {
        let note_extension = if extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{extension}")
        };
        Self {
            note_extension,
            ..Self::default()
        }
    }

    /// The hidden metadata directory for a workspace root
    pub fn meta_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.meta_folder)
    }

    /// Path of the persisted tree-ordering document
    pub fn tree_meta_path(&self, root: &Path) -> PathBuf {
        self.meta_dir(root).join(TREE_META_FILE)
    }

    /// Directory holding new-note templates
    pub fn template_dir(&self, root: &Path) -> PathBuf {
        self.meta_dir(root).join(TEMPLATE_DIR)
    }

    /// Path of the persisted config document
    pub fn config_path(&self, root: &Path) -> PathBuf {
        self.meta_dir(root).join("config.toml")
    }

    /// Resolve the media directory for a note's containing folder.
    ///
    /// An absolute `media_folder` is used as-is; otherwise it is joined to
    /// the note folder.
    pub fn media_dir(&self, note_folder: &Path) -> PathBuf {
        let media = Path::new(&self.media_folder);
        if media.is_absolute() {
            media.to_path_buf()
        } else {
            note_folder.join(media)
        }
    }

    /// Whether a file name is a note file (extension match, case-insensitive)
    pub fn is_note_file(&self, file_name: &str) -> bool {
        file_name
            .to_lowercase()
            .ends_with(&self.note_extension.to_lowercase())
    }

    /// Strip the note extension from a file name, case-insensitively.
    ///
    /// Names without the extension are returned unchanged.
    pub fn strip_note_ext<'a>(&self, file_name: &'a str) -> &'a str {
        let lower = file_name.to_lowercase();
        let ext = self.note_extension.to_lowercase();
        if lower.ends_with(&ext) {
            &file_name[..file_name.len() - ext.len()]
        } else {
            file_name
        }
    }

    /// Whether a directory should be hidden from the tree
    pub fn is_excluded_folder(&self, name: &str) -> bool {
        name.starts_with('.') || self.excluded_folders.iter().any(|f| f == name)
    }

    /// Load config from a workspace root, returning defaults if absent.
    ///
    /// A corrupt config file is treated as absent with a warning; settings
    /// are best-effort, never a hard failure.
    pub fn load_from<FS: FileSystem>(fs: &FS, root: &Path) -> Self {
        let path = Self::default().config_path(root);
        if !fs.exists(&path) {
            return Self::default();
        }
        match fs.read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Failed to parse config at {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read config at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save config into the workspace meta folder
    pub fn save_to<FS: FileSystem>(&self, fs: &FS, root: &Path) -> Result<()> {
        let path = self.config_path(root);
        if let Some(parent) = path.parent() {
            fs.create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs.write_file(&path, &contents)?;
        Ok(())
    }
}
