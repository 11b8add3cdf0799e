//! The ordered tree cache.
//!
//! The filesystem has no notion of user ordering, so each folder's order is
//! kept in a [`PathNode`]: a map from note label to ordinal index plus a map
//! of child nodes. Nodes are reconciled against directory listings with
//! [`PathNode::sync_files`], which preserves the relative order of surviving
//! labels, appends newcomers at the end, and renumbers everything to a dense
//! `0..n-1` sequence. The whole tree serializes as one JSON document,
//! persisted by [`store::TreeStore`].

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub mod store;

pub use store::TreeStore;

fn default_true() -> bool {
    true
}

/// Ordering state for one folder, with its child folders nested inside.
///
/// `files` maps a note label (file name without extension) to its ordinal
/// index. Indices are dense after every [`sync_files`](Self::sync_files)
/// call; between reconciliations a stale or sparse map is tolerated and
/// repaired on the next sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathNode {
    /// Note label to ordinal index
    #[serde(default)]
    pub files: IndexMap<String, u64>,

    /// Child folder name to its node
    #[serde(default)]
    pub folders: IndexMap<String, PathNode>,

    /// Whether manual ordering applies; `false` means alphabetical
    #[serde(default = "default_true")]
    pub is_ordered: bool,
}

impl Default for PathNode {
    fn default() -> Self {
        Self::new()
    }
}

impl PathNode {
    /// An empty, ordered node
    pub fn new() -> Self {
        Self {
            files: IndexMap::new(),
            folders: IndexMap::new(),
            is_ordered: true,
        }
    }

    /// Walk to the node for a folder path, creating nodes along the way
    pub fn get_folder<S: AsRef<str>>(&mut self, segments: &[S]) -> &mut PathNode {
        let mut node = self;
        for segment in segments {
            node = node.folders.entry(segment.as_ref().to_string()).or_default();
        }
        node
    }

    /// Walk to the node for a folder path without creating anything
    pub fn find_folder<S: AsRef<str>>(&self, segments: &[S]) -> Option<&PathNode> {
        let mut node = self;
        for segment in segments {
            node = node.folders.get(segment.as_ref())?;
        }
        Some(node)
    }

    /// Drop child nodes whose folders no longer exist on disk.
    ///
    /// Returns `true` if anything was removed. Nodes for new folders are
    /// created lazily by [`get_folder`](Self::get_folder), so presence here
    /// only prunes.
    pub fn sync_folders<I, S>(&mut self, present: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keep: HashSet<String> = present
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        let before = self.folders.len();
        self.folders.retain(|name, _| keep.contains(name));
        self.folders.len() != before
    }

    /// Reconcile this node's file indices with the labels present on disk.
    ///
    /// Surviving labels keep their relative order, newcomers are appended
    /// in encounter order, vanished labels are dropped, and the result is
    /// renumbered to dense `0..n-1` indices. Duplicate labels in the input
    /// count once (first occurrence wins). Returns `true` if the map
    /// changed.
    pub fn sync_files<I, S>(&mut self, present: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keep = HashSet::new();
        let mut newcomers = Vec::new();
        for label in present {
            let label = label.as_ref();
            if keep.insert(label.to_string()) && !self.files.contains_key(label) {
                newcomers.push(label.to_string());
            }
        }

        let before = self.files.clone();

        // Newcomers go above every existing index so renumbering places
        // them at the end, in encounter order
        let mut next = self.files.values().copied().max().map_or(0, |m| m + 1);
        for label in newcomers {
            self.files.insert(label, next);
            next += 1;
        }

        self.files.retain(|label, _| keep.contains(label));

        let mut entries: Vec<(String, u64)> = self.files.drain(..).collect();
        entries.sort_by_key(|(_, idx)| *idx);
        self.files = entries
            .into_iter()
            .enumerate()
            .map(|(i, (label, _))| (label, i as u64))
            .collect();

        self.files != before
    }

    /// Labels sorted by ordinal index
    pub fn ordered_files(&self) -> Vec<String> {
        let mut entries: Vec<(&String, u64)> =
            self.files.iter().map(|(label, &idx)| (label, idx)).collect();
        entries.sort_by_key(|(_, idx)| *idx);
        entries.into_iter().map(|(label, _)| label.clone()).collect()
    }

    /// Swap a label with the one directly above it.
    ///
    /// Returns `false` (and changes nothing) for an unknown label or one
    /// already at the top.
    pub fn move_up(&mut self, label: &str) -> bool {
        let Some(&idx) = self.files.get(label) else {
            return false;
        };
        if idx == 0 {
            return false;
        }
        self.swap_with(label, idx, idx - 1)
    }

    /// Swap a label with the one directly below it.
    ///
    /// Returns `false` (and changes nothing) for an unknown label or one
    /// already at the bottom.
    pub fn move_down(&mut self, label: &str) -> bool {
        let Some(&idx) = self.files.get(label) else {
            return false;
        };
        if idx + 1 >= self.files.len() as u64 {
            return false;
        }
        self.swap_with(label, idx, idx + 1)
    }

    fn swap_with(&mut self, label: &str, idx: u64, target: u64) -> bool {
        let sibling = self
            .files
            .iter()
            .find(|&(_, &v)| v == target)
            .map(|(k, _)| k.clone());
        if let Some(sibling) = sibling {
            self.files.insert(sibling, idx);
        }
        self.files.insert(label.to_string(), target);
        true
    }

    /// Transfer a label's index to a new label.
    ///
    /// Fails without changes if the old label is unknown or the new one is
    /// already taken.
    pub fn rename_file(&mut self, old: &str, new: &str) -> bool {
        if old == new || self.files.contains_key(new) {
            return false;
        }
        match self.files.shift_remove(old) {
            Some(idx) => {
                self.files.insert(new.to_string(), idx);
                true
            }
            None => false,
        }
    }

    /// Transfer a child node (with its whole subtree) to a new folder name
    pub fn rename_folder(&mut self, old: &str, new: &str) -> bool {
        if old == new || self.folders.contains_key(new) {
            return false;
        }
        match self.folders.shift_remove(old) {
            Some(node) => {
                self.folders.insert(new.to_string(), node);
                true
            }
            None => false,
        }
    }

    /// Drop a label, renumbering the survivors to stay dense
    pub fn remove_file(&mut self, label: &str) -> bool {
        if self.files.shift_remove(label).is_none() {
            return false;
        }
        let mut entries: Vec<(String, u64)> = self.files.drain(..).collect();
        entries.sort_by_key(|(_, idx)| *idx);
        self.files = entries
            .into_iter()
            .enumerate()
            .map(|(i, (label, _))| (label, i as u64))
            .collect();
        true
    }

    /// Drop a child node and its subtree
    pub fn remove_folder(&mut self, name: &str) -> bool {
        self.folders.shift_remove(name).is_some()
    }
}
