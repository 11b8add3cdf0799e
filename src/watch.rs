//! Routing of file-watcher notifications.
//!
//! The host adapts its watcher to [`WatchEvent`]s and feeds them to a
//! [`WatchRouter`], which filters out non-note paths and fans the event out
//! to the live sync sessions and the tree provider. Self-echo suppression
//! happens inside the sessions (the write guard); the router only decides
//! who hears about an event.

use std::sync::Arc;

use crate::events::WatchEvent;
use crate::fs::FileSystem;
use crate::panel::SessionRegistry;
use crate::provider::NoteListProvider;

/// Fans watcher events out to sessions and the tree provider.
pub struct WatchRouter<FS: FileSystem + Clone + Send + 'static> {
    provider: Arc<NoteListProvider<FS>>,
    sessions: Arc<SessionRegistry<FS>>,
}

impl<FS: FileSystem + Clone + Send + 'static> WatchRouter<FS> {
    /// Create a router over a provider and its session registry
    pub fn new(provider: Arc<NoteListProvider<FS>>, sessions: Arc<SessionRegistry<FS>>) -> Self {
        Self { provider, sessions }
    }

    /// Route one watcher event.
    ///
    /// Events for paths that are not note files are dropped. A content
    /// change refreshes the tree only when some session acted on it (a
    /// rename-by-rewrite can change labels) or when no sessions exist to
    /// judge; creations always refresh; deletions refresh and close any
    /// session showing the path.
    pub fn handle(&self, event: &WatchEvent) {
        let path = event.path();
        let is_note = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.provider.config().is_note_file(name));
        if !is_note {
            return;
        }

        match event {
            WatchEvent::Changed { path } => {
                if self.sessions.is_empty() {
                    self.provider.refresh();
                } else if self.sessions.update_if_open(path) {
                    self.provider.refresh();
                }
            }
            WatchEvent::Created { .. } => {
                self.provider.refresh();
            }
            WatchEvent::Deleted { path } => {
                self.provider.refresh();
                self.sessions.close_if_open(path);
            }
        }
    }
}
