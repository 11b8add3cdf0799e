//! Persistence for the ordered tree cache.
//!
//! The whole [`PathNode`] tree is stored as one pretty-printed JSON document
//! inside the workspace meta folder. A missing or corrupt document degrades
//! to an empty tree with a warning; ordering then falls back to the dense
//! reconciliation of the next sync, which is never worse than alphabetical.

use std::path::PathBuf;

use crate::error::Result;
use crate::fs::FileSystem;
use crate::tree::PathNode;

/// Loads and saves the ordering tree for one workspace.
#[derive(Debug)]
pub struct TreeStore<FS: FileSystem> {
    fs: FS,
    meta_path: PathBuf,
    root: PathNode,
    /// Serialized form at last load/save, for skipping no-op writes
    last_persisted: Option<String>,
}

impl<FS: FileSystem> TreeStore<FS> {
    /// Load the tree document at `meta_path`, or start empty.
    ///
    /// Corrupt or unreadable documents are logged and treated as absent.
    pub fn load(fs: FS, meta_path: PathBuf) -> Self {
        let (root, last_persisted) = if fs.exists(&meta_path) {
            match fs.read_to_string(&meta_path) {
                Ok(contents) => match serde_json::from_str::<PathNode>(&contents) {
                    Ok(root) => (root, Some(contents)),
                    Err(e) => {
                        log::warn!("Corrupt tree metadata at {:?}: {}", meta_path, e);
                        (PathNode::new(), None)
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read tree metadata at {:?}: {}", meta_path, e);
                    (PathNode::new(), None)
                }
            }
        } else {
            (PathNode::new(), None)
        };

        Self {
            fs,
            meta_path,
            root,
            last_persisted,
        }
    }

    /// The root node of the tree
    pub fn root(&self) -> &PathNode {
        &self.root
    }

    /// Mutable access to the root node
    pub fn root_mut(&mut self) -> &mut PathNode {
        &mut self.root
    }

    /// The node for a folder path, created on demand
    pub fn folder<S: AsRef<str>>(&mut self, segments: &[S]) -> &mut PathNode {
        self.root.get_folder(segments)
    }

    /// Persist the tree, skipping the write when nothing changed since the
    /// last load or save.
    pub fn save(&mut self) -> Result<()> {
        let serialized = serde_json::to_string_pretty(&self.root)?;
        if self.last_persisted.as_deref() == Some(serialized.as_str()) {
            return Ok(());
        }
        if let Some(parent) = self.meta_path.parent() {
            self.fs.create_dir_all(parent)?;
        }
        self.fs.write_file(&self.meta_path, &serialized)?;
        log::debug!("Saved tree metadata to {:?}", self.meta_path);
        self.last_persisted = Some(serialized);
        Ok(())
    }
}
