//! Ordered child listings for the tree view.
//!
//! [`NoteListProvider`] is the read side of the tree: each
//! [`children`](NoteListProvider::children) call lists a directory, filters
//! it down to notes and visible folders, reconciles the folder's
//! [`PathNode`](crate::tree::PathNode), and returns folders (alphabetical)
//! followed by notes in their persisted order. Reordering commands mutate
//! the node and schedule a debounced save plus a coalesced refresh
//! notification.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::debounce::Scheduler;
use crate::error::Result;
use crate::events::{CallbackRegistry, SubscriptionId, TreeChange};
use crate::fs::FileSystem;
use crate::tree::TreeStore;

const SAVE_KEY: &str = "tree.save";
const REFRESH_KEY: &str = "tree.refresh";

/// A reference to one row of the tree: a note or a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRef {
    /// Display label: file name without the note extension, or folder name
    pub label: String,
    /// Full file name on disk; equals `label` for folders
    pub file_name: String,
    /// Whether this row is a folder
    pub is_folder: bool,
    /// Containing folder, relative to the workspace root
    pub folder_path: PathBuf,
}

impl NoteRef {
    /// A note row
    pub fn note(
        label: impl Into<String>,
        file_name: impl Into<String>,
        folder_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            file_name: file_name.into(),
            is_folder: false,
            folder_path: folder_path.into(),
        }
    }

    /// A folder row
    pub fn folder(name: impl Into<String>, folder_path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            file_name: name,
            is_folder: true,
            folder_path: folder_path.into(),
        }
    }

    /// Absolute path of the note file or folder under `root`
    pub fn full_path(&self, root: &Path) -> PathBuf {
        root.join(&self.folder_path).join(&self.file_name)
    }

    /// Absolute path of the directory containing this row
    pub fn containing_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.folder_path)
    }

    /// The relative folder path this row's subtree lives under.
    ///
    /// For folders this includes the folder itself.
    pub fn subtree_path(&self) -> PathBuf {
        if self.is_folder {
            self.folder_path.join(&self.label)
        } else {
            self.folder_path.clone()
        }
    }
}

/// Split a relative folder path into tree segments
pub(crate) fn tree_segments(rel: &Path) -> Vec<String> {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Supplies ordered tree rows and handles reorder commands.
pub struct NoteListProvider<FS: FileSystem> {
    fs: FS,
    config: Config,
    root: PathBuf,
    store: Arc<Mutex<TreeStore<FS>>>,
    scheduler: Arc<Scheduler>,
    events: Arc<CallbackRegistry<TreeChange>>,
}

impl<FS> NoteListProvider<FS>
where
    FS: FileSystem + Clone + Send + 'static,
{
    /// Create a provider for a workspace root, loading the persisted tree
    pub fn new(fs: FS, config: Config, root: PathBuf) -> Self {
        let meta_path = config.tree_meta_path(&root);
        let store = Arc::new(Mutex::new(TreeStore::load(fs.clone(), meta_path)));
        Self {
            fs,
            config,
            root,
            store,
            scheduler: Arc::new(Scheduler::new()),
            events: Arc::new(CallbackRegistry::new()),
        }
    }

    /// The workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The debounce scheduler, shared so embeddings can reuse it
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Subscribe to tree-change notifications
    pub fn subscribe(&self, callback: impl Fn(&TreeChange) + Send + Sync + 'static) -> SubscriptionId {
        self.events.subscribe(callback)
    }

    /// Remove a tree-change subscription
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Ordered rows of a folder (`None` means the workspace root).
    ///
    /// Folders come first, alphabetically; notes follow in persisted order,
    /// or alphabetically when the folder is unordered. Reconciling the
    /// ordering node against the listing happens here, so a changed node
    /// schedules a debounced save as a side effect.
    pub fn children(&self, folder: Option<&Path>) -> Result<Vec<NoteRef>> {
        let rel = folder.unwrap_or_else(|| Path::new(""));
        let abs = self.root.join(rel);
        let entries = self.fs.list_entries(&abs)?;

        let mut folder_names = Vec::new();
        let mut file_names = Vec::new();
        for entry in entries {
            if entry.is_dir {
                if !self.config.is_excluded_folder(&entry.name) {
                    folder_names.push(entry.name);
                }
            } else if self.config.is_note_file(&entry.name) {
                file_names.push(entry.name);
            }
        }

        // First listing wins when two file names collapse to one label
        let mut by_label: HashMap<String, String> = HashMap::new();
        let mut labels = Vec::new();
        for name in &file_names {
            let label = self.config.strip_note_ext(name).to_string();
            if !by_label.contains_key(&label) {
                by_label.insert(label.clone(), name.clone());
                labels.push(label);
            }
        }

        let segments = tree_segments(rel);
        let (ordered_labels, changed) = {
            let mut store = self.store.lock().unwrap();
            let node = store.folder(&segments);
            let changed = node.sync_folders(folder_names.iter()) | node.sync_files(labels.iter());
            let ordered = if node.is_ordered {
                node.ordered_files()
            } else {
                let mut sorted = labels.clone();
                sorted.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()));
                sorted
            };
            (ordered, changed)
        };
        if changed {
            self.schedule_save();
        }

        folder_names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()));
        let mut rows: Vec<NoteRef> = folder_names
            .into_iter()
            .map(|name| NoteRef::folder(name, rel))
            .collect();
        for label in ordered_labels {
            if let Some(file_name) = by_label.get(&label) {
                rows.push(NoteRef::note(label, file_name.clone(), rel));
            }
        }
        Ok(rows)
    }

    /// Move a note one position up among its siblings.
    ///
    /// Returns `false` for folders, unknown notes, and notes already at the
    /// top.
    pub fn move_up(&self, note: &NoteRef) -> bool {
        self.reorder(note, |node, label| node.move_up(label))
    }

    /// Move a note one position down among its siblings
    pub fn move_down(&self, note: &NoteRef) -> bool {
        self.reorder(note, |node, label| node.move_down(label))
    }

    fn reorder(
        &self,
        note: &NoteRef,
        op: impl FnOnce(&mut crate::tree::PathNode, &str) -> bool,
    ) -> bool {
        if note.is_folder {
            return false;
        }
        let segments = tree_segments(&note.folder_path);
        let moved = {
            let mut store = self.store.lock().unwrap();
            op(store.folder(&segments), &note.label)
        };
        if moved {
            self.schedule_save();
            self.refresh();
        }
        moved
    }

    /// Toggle manual ordering for a folder (`None` means the root)
    pub fn set_ordered(&self, folder: Option<&Path>, ordered: bool) {
        let rel = folder.unwrap_or_else(|| Path::new(""));
        let segments = tree_segments(rel);
        {
            let mut store = self.store.lock().unwrap();
            store.folder(&segments).is_ordered = ordered;
        }
        self.schedule_save();
        self.refresh();
    }

    /// Record a note rename in the ordering tree, keeping its position
    pub fn apply_note_rename(&self, note: &NoteRef, new_label: &str) -> bool {
        let segments = tree_segments(&note.folder_path);
        let renamed = {
            let mut store = self.store.lock().unwrap();
            store.folder(&segments).rename_file(&note.label, new_label)
        };
        if renamed {
            self.schedule_save();
            self.refresh();
        }
        renamed
    }

    /// Record a folder rename in the ordering tree, keeping its subtree
    pub fn apply_folder_rename(&self, folder: &NoteRef, new_name: &str) -> bool {
        let segments = tree_segments(&folder.folder_path);
        let renamed = {
            let mut store = self.store.lock().unwrap();
            store.folder(&segments).rename_folder(&folder.label, new_name)
        };
        if renamed {
            self.schedule_save();
            self.refresh();
        }
        renamed
    }

    /// Drop a note or folder from the ordering tree after a deletion
    pub fn apply_removal(&self, row: &NoteRef) {
        let segments = tree_segments(&row.folder_path);
        let removed = {
            let mut store = self.store.lock().unwrap();
            let node = store.folder(&segments);
            if row.is_folder {
                node.remove_folder(&row.label)
            } else {
                node.remove_file(&row.label)
            }
        };
        if removed {
            self.schedule_save();
        }
        self.refresh();
    }

    /// Request a coalesced tree refresh notification.
    ///
    /// The first request of a burst fires immediately; followers inside the
    /// quiet window are dropped.
    pub fn refresh(&self) {
        let events = Arc::clone(&self.events);
        self.scheduler.schedule_leading(
            REFRESH_KEY,
            Duration::from_millis(self.config.refresh_debounce_ms),
            move || events.emit(&TreeChange::Refreshed),
        );
    }

    /// Persist any pending tree changes now (shutdown path)
    pub fn flush_save(&self) -> Result<()> {
        self.scheduler.flush(SAVE_KEY);
        self.store.lock().unwrap().save()
    }

    fn schedule_save(&self) {
        let store = Arc::clone(&self.store);
        self.scheduler.schedule(
            SAVE_KEY,
            Duration::from_millis(self.config.save_debounce_ms),
            move || {
                if let Err(e) = store.lock().unwrap().save() {
                    log::warn!("Failed to save tree metadata: {}", e);
                }
            },
        );
    }
}
