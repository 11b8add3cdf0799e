//! Panel/document synchronization.
//!
//! A [`SyncController`] owns one editor surface showing one note at a time
//! and keeps three parties consistent: the file on disk, the host's open
//! text document for the same path (authoritative when present), and the
//! editor's content. Outbound traffic goes through [`EditorSurface`] as
//! serialized [`EditorMessage`]s; inbound editor notifications arrive as
//! [`EditorEvent`]s.
//!
//! The controller's own saves come back as file-watcher notifications. A
//! write-guard token (the path of the last written file) marks the next
//! change event for that path as a self-echo to be swallowed instead of
//! triggering a reload loop. Scroll positions are cached per note path and
//! edit mode so switching notes or modes resumes where the user left off.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{NotegroveError, Result};
use crate::fs::FileSystem;
use crate::media;
use crate::provider::NoteRef;

// ==== Host-facing traits ====

/// The host's view of open text documents.
///
/// When the note shown in the panel is also open as a text document, that
/// document's buffer wins over the bytes on disk, and edits are routed
/// into it so the host's undo history stays intact.
pub trait DocumentRegistry: Send + Sync {
    /// Buffer content of the open document for `path`, if any
    fn open_content(&self, path: &Path) -> Option<String>;

    /// Replace the buffer of the open document for `path`.
    ///
    /// Returns `false` when the host has no document for the path; the
    /// caller then writes to disk instead.
    fn update_document(&self, path: &Path, content: &str) -> bool;
}

/// A registry for embeddings without host documents
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDocuments;

impl DocumentRegistry for NoDocuments {
    fn open_content(&self, _path: &Path) -> Option<String> {
        None
    }

    fn update_document(&self, _path: &Path, _content: &str) -> bool {
        false
    }
}

/// Outbound channel to the editor widget
pub trait EditorSurface: Send + Sync {
    /// Deliver a message to the editor
    fn post(&self, message: EditorMessage);
}

// ==== Wire types ====

/// Which editing surface the user is in; scroll positions are cached per
/// mode because the two render the same note at different heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditMode {
    /// Rich-text editing
    Structured,
    /// Raw markdown editing
    Plain,
}

/// Message posted to the editor surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum EditorMessage {
    /// Replace the editor's content
    #[serde(rename_all = "camelCase")]
    SetContent {
        /// Markdown to display
        content: String,
        /// Directory containing the note, for resolving relative media
        folder_path: PathBuf,
        /// Path of the note itself
        content_path: PathBuf,
        /// Scroll offset to resume at, when returning to a note
        scroll_resume_point: Option<f64>,
    },
    /// Forward an opaque editor command (toolbar actions and the like)
    ExecCommand {
        /// Command name plus arguments, uninterpreted
        args: Vec<serde_json::Value>,
    },
    /// Push editor settings
    Settings {
        /// Opaque settings blob for the editor
        settings: serde_json::Value,
    },
}

/// Notification arriving from the editor surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum EditorEvent {
    /// The editor finished initializing and wants content
    EditorReady,
    /// The user edited the note
    #[serde(rename_all = "camelCase")]
    ContentChanged {
        /// Full markdown after the edit
        content: String,
    },
    /// The user pasted an image; the editor holds it as a data URI
    #[serde(rename_all = "camelCase")]
    ImagePasted {
        /// The pasted `data:image/...` URI
        data_uri: String,
    },
    /// The user scrolled
    #[serde(rename_all = "camelCase")]
    ScrollChanged {
        /// New scroll offset
        offset: f64,
    },
    /// The user switched between rich and raw editing
    #[serde(rename_all = "camelCase")]
    ModeChanged {
        /// The mode now active
        mode: EditMode,
    },
}

/// The authority for a note's content at one instant: the host's open
/// document when one exists for the path, otherwise the file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// The host holds the path open as a text document
    HostDocument {
        /// Path of the backing note
        path: PathBuf,
    },
    /// Only the on-disk bytes exist
    File {
        /// Path of the note file
        path: PathBuf,
    },
}

impl ContentSource {
    /// Resolve the authority for `path` right now
    pub fn resolve(documents: &dyn DocumentRegistry, path: PathBuf) -> Self {
        if documents.open_content(&path).is_some() {
            ContentSource::HostDocument { path }
        } else {
            ContentSource::File { path }
        }
    }

    /// The backing path
    pub fn path(&self) -> &Path {
        match self {
            ContentSource::HostDocument { path } => path,
            ContentSource::File { path } => path,
        }
    }

    /// Whether this source backs the given path
    pub fn matches(&self, path: &Path) -> bool {
        self.path() == path
    }

    /// Read the authoritative content
    pub fn read<FS: FileSystem>(
        &self,
        fs: &FS,
        documents: &dyn DocumentRegistry,
    ) -> Result<String> {
        match self {
            ContentSource::HostDocument { path } => documents
                .open_content(path)
                .ok_or_else(|| NotegroveError::NoteNotFound(path.clone())),
            ContentSource::File { path } => fs.read_to_string(path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    NotegroveError::NoteNotFound(path.clone())
                } else {
                    NotegroveError::FileRead {
                        path: path.clone(),
                        source: e,
                    }
                }
            }),
        }
    }

    /// Write content to the authoritative destination
    pub fn write<FS: FileSystem>(
        &self,
        fs: &FS,
        documents: &dyn DocumentRegistry,
        content: &str,
    ) -> Result<()> {
        match self {
            ContentSource::HostDocument { path } => {
                if documents.update_document(path, content) {
                    Ok(())
                } else {
                    // The document closed between resolve and write
                    fs.write_file(path, content)
                        .map_err(|source| NotegroveError::FileWrite {
                            path: path.clone(),
                            source,
                        })
                }
            }
            ContentSource::File { path } => {
                fs.write_file(path, content)
                    .map_err(|source| NotegroveError::FileWrite {
                        path: path.clone(),
                        source,
                    })
            }
        }
    }
}

/// Lifecycle of a controller's session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No note is shown
    Empty,
    /// Content is being resolved for display
    Loading,
    /// The editor shows the resolved content
    Displayed,
    /// An edit has been accepted but not yet confirmed written
    Dirty,
}

// ==== Controller ====

/// Synchronizes one editor surface with a note's disk file and the host's
/// open document for it.
pub struct SyncController<FS: FileSystem> {
    fs: FS,
    config: Config,
    root: PathBuf,
    documents: Arc<dyn DocumentRegistry>,
    surface: Arc<dyn EditorSurface>,

    state: SessionState,
    current_note: Option<NoteRef>,
    /// Content last shown or written, for no-op suppression
    last_content: Option<String>,
    /// Path of our own in-flight write; the next change event for it is an
    /// echo
    writing_file: Option<PathBuf>,
    /// A change arrived while backgrounded; reload on activation
    reload_needed: bool,
    settings: Option<serde_json::Value>,
    settings_push_needed: bool,
    active: bool,
    /// Data URI of a pasted image awaiting the edit that references it
    pending_image: Option<String>,
    edit_mode: EditMode,
    scroll_offsets: HashMap<(PathBuf, EditMode), f64>,
    current_scroll: f64,
}

impl<FS: FileSystem> SyncController<FS> {
    /// Create a controller with an empty session
    pub fn new(
        fs: FS,
        config: Config,
        root: PathBuf,
        documents: Arc<dyn DocumentRegistry>,
        surface: Arc<dyn EditorSurface>,
    ) -> Self {
        Self {
            fs,
            config,
            root,
            documents,
            surface,
            state: SessionState::Empty,
            current_note: None,
            last_content: None,
            writing_file: None,
            reload_needed: false,
            settings: None,
            settings_push_needed: false,
            active: true,
            pending_image: None,
            edit_mode: EditMode::Structured,
            scroll_offsets: HashMap::new(),
            current_scroll: 0.0,
        }
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The note currently shown, if any
    pub fn current_note(&self) -> Option<&NoteRef> {
        self.current_note.as_ref()
    }

    /// Absolute path of the shown note
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current_note.as_ref().map(|n| n.full_path(&self.root))
    }

    /// Whether a self-echo is still expected for a path
    pub fn write_guard(&self) -> Option<&Path> {
        self.writing_file.as_deref()
    }

    /// Whether the panel is foregrounded
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The active edit mode
    pub fn edit_mode(&self) -> EditMode {
        self.edit_mode
    }

    /// Show a note in the editor.
    ///
    /// Showing the note already on screen re-resolves content but skips the
    /// editor update when nothing changed. Switching notes records the
    /// outgoing note's scroll position and resumes the incoming one's.
    pub fn show_note(&mut self, note: &NoteRef) -> Result<()> {
        let new_path = note.full_path(&self.root);
        let path_changed = self.current_path().as_deref() != Some(new_path.as_path());
        if path_changed {
            self.record_scroll();
            self.writing_file = None;
            self.last_content = None;
            self.pending_image = None;
        }
        self.current_note = Some(note.clone());
        self.load_contents(path_changed, false)
    }

    /// Resolve and display content for the current note.
    ///
    /// The host's open document for the path wins over the bytes on disk.
    /// Unless `force` is set, content identical to what the editor already
    /// shows is not re-posted.
    fn load_contents(&mut self, apply_scroll: bool, force: bool) -> Result<()> {
        let Some(note) = self.current_note.clone() else {
            return Ok(());
        };
        self.state = SessionState::Loading;

        let path = note.full_path(&self.root);
        let source = ContentSource::resolve(self.documents.as_ref(), path.clone());
        let content = source.read(&self.fs, self.documents.as_ref())?;

        if !force && self.last_content.as_deref() == Some(content.as_str()) {
            self.state = SessionState::Displayed;
            return Ok(());
        }

        let scroll_resume_point = if apply_scroll {
            let resumed = self
                .scroll_offsets
                .get(&(path.clone(), self.edit_mode))
                .copied();
            self.current_scroll = resumed.unwrap_or(0.0);
            resumed
        } else {
            None
        };

        self.surface.post(EditorMessage::SetContent {
            content: content.clone(),
            folder_path: note.containing_dir(&self.root),
            content_path: path,
            scroll_resume_point,
        });
        self.last_content = Some(content);
        self.state = SessionState::Displayed;
        Ok(())
    }

    /// Accept an edited version of the current note and persist it.
    ///
    /// A pending pasted image is converted into the media folder first and
    /// the content rewritten to reference it. Content identical to the last
    /// shown/written version is dropped without touching disk. The write
    /// goes to the host's open document when one exists, otherwise to the
    /// file, and arms the write guard either way.
    pub fn apply_edit(&mut self, content: &str) -> Result<()> {
        let Some(note) = self.current_note.clone() else {
            return Ok(());
        };
        let path = note.full_path(&self.root);

        let mut content = content.to_string();
        let mut converted = false;
        if self.pending_image.take().is_some() {
            let folder = note.containing_dir(&self.root);
            match media::convert_all(&self.fs, &self.config, &folder, &content) {
                Ok((rewritten, count)) if count > 0 => {
                    content = rewritten;
                    converted = true;
                }
                Ok(_) => {}
                Err(e) => {
                    // Keep the data URI in the content rather than lose the
                    // image
                    log::warn!("Image conversion failed for {:?}: {}", path, e);
                }
            }
        }

        if !converted && self.last_content.as_deref() == Some(content.as_str()) {
            return Ok(());
        }

        self.state = SessionState::Dirty;
        self.writing_file = Some(path.clone());

        let source = ContentSource::resolve(self.documents.as_ref(), path);
        if let Err(e) = source.write(&self.fs, self.documents.as_ref(), &content) {
            self.writing_file = None;
            return Err(e);
        }

        self.last_content = Some(content);
        self.state = SessionState::Displayed;

        if converted {
            // Re-push so the editor swaps data URIs for file references
            self.load_contents(false, true)?;
        }
        Ok(())
    }

    /// Route a file-change notification.
    ///
    /// Returns `true` when the change was for the shown note and was acted
    /// on (reload, or deferred reload for a backgrounded panel). A change
    /// matching the write guard is our own echo: the guard is consumed and
    /// nothing reloads.
    pub fn on_file_changed(&mut self, path: &Path) -> bool {
        if self.current_path().as_deref() != Some(path) {
            return false;
        }
        if self.writing_file.as_deref() == Some(path) {
            self.writing_file = None;
            return false;
        }
        if self.active {
            if let Err(e) = self.load_contents(false, true) {
                log::warn!("Reload after external change failed for {:?}: {}", path, e);
            }
        } else {
            self.reload_needed = true;
        }
        true
    }

    /// Route a file-deletion notification.
    ///
    /// Deleting the shown note empties the session (the scroll cache
    /// survives for a potential re-creation). Returns `true` if the
    /// session was closed.
    pub fn on_file_deleted(&mut self, path: &Path) -> bool {
        if self.current_path().as_deref() != Some(path) {
            return false;
        }
        self.close();
        true
    }

    /// Follow a rename: when showing `old_path`, switch to the renamed
    /// note. Returns `true` if the session switched.
    pub fn switch_if_open(&mut self, old_path: &Path, new_note: &NoteRef) -> Result<bool> {
        if self.current_path().as_deref() != Some(old_path) {
            return Ok(false);
        }
        self.show_note(new_note)?;
        Ok(true)
    }

    /// Empty the session, keeping the scroll cache
    pub fn close(&mut self) {
        self.state = SessionState::Empty;
        self.current_note = None;
        self.last_content = None;
        self.writing_file = None;
        self.reload_needed = false;
        self.pending_image = None;
    }

    /// Foreground or background the panel.
    ///
    /// Activation flushes deferred work: a reload for changes that arrived
    /// while backgrounded, and any settings push that was held back.
    pub fn set_active(&mut self, active: bool) -> Result<()> {
        self.active = active;
        if !active {
            return Ok(());
        }
        if self.settings_push_needed {
            self.settings_push_needed = false;
            if let Some(settings) = self.settings.clone() {
                self.surface.post(EditorMessage::Settings { settings });
            }
        }
        if self.reload_needed {
            self.reload_needed = false;
            self.load_contents(false, true)?;
        }
        Ok(())
    }

    /// Update editor settings, pushing now or on next activation
    pub fn update_settings(&mut self, settings: serde_json::Value) {
        self.settings = Some(settings.clone());
        if self.active {
            self.surface.post(EditorMessage::Settings { settings });
        } else {
            self.settings_push_needed = true;
        }
    }

    /// Switch edit modes, carrying content over and resuming the scroll
    /// position cached for the target mode.
    pub fn set_edit_mode(&mut self, mode: EditMode) -> Result<()> {
        if mode == self.edit_mode {
            return Ok(());
        }
        self.record_scroll();
        self.edit_mode = mode;
        self.load_contents(true, true)
    }

    /// Forward an opaque editor command when the panel is foregrounded
    pub fn exec_command(&self, args: Vec<serde_json::Value>) {
        if self.active {
            self.surface.post(EditorMessage::ExecCommand { args });
        }
    }

    /// Dispatch a notification from the editor surface
    pub fn handle_editor_event(&mut self, event: EditorEvent) -> Result<()> {
        match event {
            EditorEvent::EditorReady => {
                if let Some(settings) = self.settings.clone() {
                    self.surface.post(EditorMessage::Settings { settings });
                }
                self.load_contents(true, false)
            }
            EditorEvent::ContentChanged { content } => self.apply_edit(&content),
            EditorEvent::ImagePasted { data_uri } => {
                self.pending_image = Some(data_uri);
                Ok(())
            }
            EditorEvent::ScrollChanged { offset } => {
                self.current_scroll = offset;
                self.record_scroll();
                Ok(())
            }
            EditorEvent::ModeChanged { mode } => self.set_edit_mode(mode),
        }
    }

    fn record_scroll(&mut self) {
        if let Some(path) = self.current_path() {
            self.scroll_offsets
                .insert((path, self.edit_mode), self.current_scroll);
        }
    }
}

// ==== Session registry ====

/// Identifier for a registered session
pub type SessionId = u64;

/// All live sync sessions, addressable individually or broadcast by path.
///
/// Watcher routing uses the broadcast operations: a change event is offered
/// to every session and consumed by those showing the path.
pub struct SessionRegistry<FS: FileSystem> {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<SyncController<FS>>>>>,
    next_id: AtomicU64,
}

impl<FS: FileSystem> SessionRegistry<FS> {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a controller, returning its id
    pub fn insert(&self, controller: SyncController<FS>) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .write()
            .unwrap()
            .insert(id, Arc::new(Mutex::new(controller)));
        id
    }

    /// Remove a controller
    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions.write().unwrap().remove(&id).is_some()
    }

    /// Look up a controller by id
    pub fn get(&self, id: SessionId) -> Option<Arc<Mutex<SyncController<FS>>>> {
        self.sessions.read().unwrap().get(&id).cloned()
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    /// Whether no sessions are live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offer a change notification to every session.
    ///
    /// Returns `true` if any session acted on it.
    pub fn update_if_open(&self, path: &Path) -> bool {
        let sessions: Vec<_> = self.sessions.read().unwrap().values().cloned().collect();
        let mut handled = false;
        for session in sessions {
            handled |= session.lock().unwrap().on_file_changed(path);
        }
        handled
    }

    /// Point every session showing `old_path` at a renamed note.
    ///
    /// Returns `true` if any session switched.
    pub fn switch_if_open(&self, old_path: &Path, new_note: &NoteRef) -> bool {
        let sessions: Vec<_> = self.sessions.read().unwrap().values().cloned().collect();
        let mut switched = false;
        for session in sessions {
            match session.lock().unwrap().switch_if_open(old_path, new_note) {
                Ok(did) => switched |= did,
                Err(e) => {
                    log::warn!("Session failed to follow rename of {:?}: {}", old_path, e);
                }
            }
        }
        switched
    }

    /// Close every session showing a deleted path.
    ///
    /// Returns `true` if any session was closed.
    pub fn close_if_open(&self, path: &Path) -> bool {
        let sessions: Vec<_> = self.sessions.read().unwrap().values().cloned().collect();
        let mut closed = false;
        for session in sessions {
            closed |= session.lock().unwrap().on_file_deleted(path);
        }
        closed
    }
}

impl<FS: FileSystem> Default for SessionRegistry<FS> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFileSystem;
    use serde_json::json;

    /// Records every message posted to the editor
    #[derive(Default)]
    struct RecordingSurface {
        messages: Mutex<Vec<EditorMessage>>,
    }

    impl EditorSurface for RecordingSurface {
        fn post(&self, message: EditorMessage) {
            self.messages.lock().unwrap().push(message);
        }
    }

    impl RecordingSurface {
        fn messages(&self) -> Vec<EditorMessage> {
            self.messages.lock().unwrap().clone()
        }

        fn set_content_count(&self) -> usize {
            self.messages()
                .iter()
                .filter(|m| matches!(m, EditorMessage::SetContent { .. }))
                .count()
        }

        fn last_set_content(&self) -> Option<EditorMessage> {
            self.messages()
                .into_iter()
                .rev()
                .find(|m| matches!(m, EditorMessage::SetContent { .. }))
        }
    }

    /// In-memory stand-in for the host's open documents
    #[derive(Default)]
    struct FakeDocuments {
        open: Mutex<HashMap<PathBuf, String>>,
    }

    impl FakeDocuments {
        fn open(&self, path: &Path, content: &str) {
            self.open
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), content.to_string());
        }
    }

    impl DocumentRegistry for FakeDocuments {
        fn open_content(&self, path: &Path) -> Option<String> {
            self.open.lock().unwrap().get(path).cloned()
        }

        fn update_document(&self, path: &Path, content: &str) -> bool {
            let mut open = self.open.lock().unwrap();
            match open.get_mut(path) {
                Some(buffer) => {
                    *buffer = content.to_string();
                    true
                }
                None => false,
            }
        }
    }

    struct Harness {
        fs: InMemoryFileSystem,
        surface: Arc<RecordingSurface>,
        documents: Arc<FakeDocuments>,
        controller: SyncController<InMemoryFileSystem>,
        root: PathBuf,
    }

    fn harness() -> Harness {
        let fs = InMemoryFileSystem::new();
        let root = PathBuf::from("/ws");
        fs.write_file(Path::new("/ws/alpha.md"), "# Alpha\n").unwrap();
        fs.write_file(Path::new("/ws/beta.md"), "# Beta\n").unwrap();

        let surface = Arc::new(RecordingSurface::default());
        let documents = Arc::new(FakeDocuments::default());
        let controller = SyncController::new(
            fs.clone(),
            Config::default(),
            root.clone(),
            documents.clone(),
            surface.clone(),
        );
        Harness {
            fs,
            surface,
            documents,
            controller,
            root,
        }
    }

    fn alpha() -> NoteRef {
        NoteRef::note("alpha", "alpha.md", "")
    }

    fn beta() -> NoteRef {
        NoteRef::note("beta", "beta.md", "")
    }

    #[test]
    fn test_show_note_posts_disk_content() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();

        assert_eq!(h.controller.state(), SessionState::Displayed);
        match h.surface.last_set_content().unwrap() {
            EditorMessage::SetContent {
                content,
                folder_path,
                content_path,
                scroll_resume_point,
            } => {
                assert_eq!(content, "# Alpha\n");
                assert_eq!(folder_path, h.root);
                assert_eq!(content_path, PathBuf::from("/ws/alpha.md"));
                assert_eq!(scroll_resume_point, None);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_open_host_document_wins_over_disk() {
        let mut h = harness();
        h.documents
            .open(Path::new("/ws/alpha.md"), "# Alpha (unsaved)\n");

        h.controller.show_note(&alpha()).unwrap();
        match h.surface.last_set_content().unwrap() {
            EditorMessage::SetContent { content, .. } => {
                assert_eq!(content, "# Alpha (unsaved)\n");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_showing_same_note_twice_skips_repost() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();
        h.controller.show_note(&alpha()).unwrap();
        assert_eq!(h.surface.set_content_count(), 1);
        assert_eq!(h.controller.state(), SessionState::Displayed);
    }

    #[test]
    fn test_show_missing_note_reports_not_found() {
        let mut h = harness();
        let ghost = NoteRef::note("ghost", "ghost.md", "");
        match h.controller.show_note(&ghost) {
            Err(NotegroveError::NoteNotFound(path)) => {
                assert_eq!(path, PathBuf::from("/ws/ghost.md"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_apply_edit_writes_file_and_arms_guard() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();
        h.controller.apply_edit("# Alpha\n\nedited\n").unwrap();

        assert_eq!(
            h.fs.read_to_string(Path::new("/ws/alpha.md")).unwrap(),
            "# Alpha\n\nedited\n"
        );
        assert_eq!(h.controller.write_guard(), Some(Path::new("/ws/alpha.md")));
        assert_eq!(h.controller.state(), SessionState::Displayed);
    }

    #[test]
    fn test_apply_edit_routes_to_open_document() {
        let mut h = harness();
        h.documents.open(Path::new("/ws/alpha.md"), "# Alpha\n");
        h.controller.show_note(&alpha()).unwrap();
        h.controller.apply_edit("# Alpha via host\n").unwrap();

        assert_eq!(
            h.documents.open_content(Path::new("/ws/alpha.md")).unwrap(),
            "# Alpha via host\n"
        );
        // Disk untouched; the host saves the document itself
        assert_eq!(
            h.fs.read_to_string(Path::new("/ws/alpha.md")).unwrap(),
            "# Alpha\n"
        );
    }

    #[test]
    fn test_no_op_edit_is_dropped() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();
        h.controller.apply_edit("# Alpha\n").unwrap();

        // Same content as shown: no write, guard stays unarmed
        assert_eq!(h.controller.write_guard(), None);
    }

    #[test]
    fn test_own_echo_consumes_guard_without_reload() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();
        h.controller.apply_edit("# Alpha v2\n").unwrap();
        let posts_before = h.surface.set_content_count();

        // Watcher reports our own write: swallowed
        assert!(!h.controller.on_file_changed(Path::new("/ws/alpha.md")));
        assert_eq!(h.controller.write_guard(), None);
        assert_eq!(h.surface.set_content_count(), posts_before);

        // A later external change reloads
        h.fs.write_file(Path::new("/ws/alpha.md"), "# Alpha v3\n")
            .unwrap();
        assert!(h.controller.on_file_changed(Path::new("/ws/alpha.md")));
        assert_eq!(h.surface.set_content_count(), posts_before + 1);
    }

    #[test]
    fn test_change_for_other_path_is_ignored() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();
        assert!(!h.controller.on_file_changed(Path::new("/ws/beta.md")));
    }

    #[test]
    fn test_backgrounded_panel_defers_reload() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();
        h.controller.set_active(false).unwrap();
        let posts_before = h.surface.set_content_count();

        h.fs.write_file(Path::new("/ws/alpha.md"), "# Changed\n")
            .unwrap();
        assert!(h.controller.on_file_changed(Path::new("/ws/alpha.md")));
        assert_eq!(h.surface.set_content_count(), posts_before);

        h.controller.set_active(true).unwrap();
        assert_eq!(h.surface.set_content_count(), posts_before + 1);
        match h.surface.last_set_content().unwrap() {
            EditorMessage::SetContent { content, .. } => assert_eq!(content, "# Changed\n"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_deleting_shown_note_empties_session() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();
        assert!(h.controller.on_file_deleted(Path::new("/ws/alpha.md")));
        assert_eq!(h.controller.state(), SessionState::Empty);
        assert!(h.controller.current_note().is_none());

        assert!(!h.controller.on_file_deleted(Path::new("/ws/alpha.md")));
    }

    #[test]
    fn test_scroll_resumes_per_note() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();
        h.controller
            .handle_editor_event(EditorEvent::ScrollChanged { offset: 120.5 })
            .unwrap();

        h.controller.show_note(&beta()).unwrap();
        match h.surface.last_set_content().unwrap() {
            EditorMessage::SetContent {
                scroll_resume_point,
                ..
            } => assert_eq!(scroll_resume_point, None),
            other => panic!("unexpected message: {other:?}"),
        }

        h.controller.show_note(&alpha()).unwrap();
        match h.surface.last_set_content().unwrap() {
            EditorMessage::SetContent {
                scroll_resume_point,
                ..
            } => assert_eq!(scroll_resume_point, Some(120.5)),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_scroll_is_cached_per_edit_mode() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();
        h.controller
            .handle_editor_event(EditorEvent::ScrollChanged { offset: 300.0 })
            .unwrap();

        h.controller.set_edit_mode(EditMode::Plain).unwrap();
        match h.surface.last_set_content().unwrap() {
            EditorMessage::SetContent {
                scroll_resume_point,
                ..
            } => assert_eq!(scroll_resume_point, None),
            other => panic!("unexpected message: {other:?}"),
        }

        h.controller.set_edit_mode(EditMode::Structured).unwrap();
        match h.surface.last_set_content().unwrap() {
            EditorMessage::SetContent {
                scroll_resume_point,
                ..
            } => assert_eq!(scroll_resume_point, Some(300.0)),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_pasted_image_is_inlined_on_next_edit() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();

        let uri = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
        h.controller
            .handle_editor_event(EditorEvent::ImagePasted {
                data_uri: uri.to_string(),
            })
            .unwrap();
        h.controller
            .handle_editor_event(EditorEvent::ContentChanged {
                content: format!("# Alpha\n\n![pasted]({uri})\n"),
            })
            .unwrap();

        let saved = h.fs.read_to_string(Path::new("/ws/alpha.md")).unwrap();
        assert_eq!(saved, "# Alpha\n\n![pasted](.media/img_0.png)\n");
        assert!(h.fs.exists(Path::new("/ws/.media/img_0.png")));

        // The forced re-push shows the rewritten content
        match h.surface.last_set_content().unwrap() {
            EditorMessage::SetContent { content, .. } => {
                assert!(content.contains("(.media/img_0.png)"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_settings_push_deferred_until_active() {
        let mut h = harness();
        h.controller.set_active(false).unwrap();
        h.controller.update_settings(json!({"display": "compact"}));
        assert!(h.surface.messages().is_empty());

        h.controller.set_active(true).unwrap();
        assert!(
            h.surface
                .messages()
                .iter()
                .any(|m| matches!(m, EditorMessage::Settings { .. }))
        );
    }

    #[test]
    fn test_exec_command_only_when_active() {
        let mut h = harness();
        h.controller.exec_command(vec![json!("toggleBold")]);
        assert_eq!(h.surface.messages().len(), 1);

        h.controller.set_active(false).unwrap();
        h.controller.exec_command(vec![json!("toggleBold")]);
        assert_eq!(h.surface.messages().len(), 1);
    }

    #[test]
    fn test_registry_broadcasts_to_matching_session() {
        let h1 = harness();
        let fs = h1.fs.clone();
        let registry: SessionRegistry<InMemoryFileSystem> = SessionRegistry::new();

        let mut c1 = h1.controller;
        c1.show_note(&alpha()).unwrap();
        let id1 = registry.insert(c1);

        let surface2 = Arc::new(RecordingSurface::default());
        let mut c2 = SyncController::new(
            fs.clone(),
            Config::default(),
            PathBuf::from("/ws"),
            Arc::new(NoDocuments),
            surface2,
        );
        c2.show_note(&beta()).unwrap();
        registry.insert(c2);

        fs.write_file(Path::new("/ws/alpha.md"), "# New\n").unwrap();
        assert!(registry.update_if_open(Path::new("/ws/alpha.md")));
        assert!(!registry.update_if_open(Path::new("/ws/gamma.md")));

        assert!(registry.close_if_open(Path::new("/ws/beta.md")));
        assert!(!registry.close_if_open(Path::new("/ws/beta.md")));

        assert!(registry.remove(id1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_switch_if_open_follows_rename() {
        let mut h = harness();
        h.controller.show_note(&alpha()).unwrap();

        let renamed = NoteRef::note("renamed", "renamed.md", "");
        assert!(
            !h.controller
                .switch_if_open(Path::new("/ws/beta.md"), &renamed)
                .unwrap()
        );

        h.fs.rename(Path::new("/ws/alpha.md"), Path::new("/ws/renamed.md"))
            .unwrap();
        assert!(
            h.controller
                .switch_if_open(Path::new("/ws/alpha.md"), &renamed)
                .unwrap()
        );
        assert_eq!(
            h.controller.current_path(),
            Some(PathBuf::from("/ws/renamed.md"))
        );
    }

    #[test]
    fn test_content_source_resolution() {
        let documents = FakeDocuments::default();
        let path = PathBuf::from("/ws/alpha.md");

        let source = ContentSource::resolve(&documents, path.clone());
        assert_eq!(source, ContentSource::File { path: path.clone() });

        documents.open(&path, "buffered");
        let source = ContentSource::resolve(&documents, path.clone());
        assert!(matches!(source, ContentSource::HostDocument { .. }));
        assert!(source.matches(&path));
    }

    #[test]
    fn test_editor_message_wire_format() {
        let message = EditorMessage::SetContent {
            content: "# A".to_string(),
            folder_path: PathBuf::from("/ws"),
            content_path: PathBuf::from("/ws/a.md"),
            scroll_resume_point: None,
        };
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"command\":\"setContent\""));
        assert!(json.contains("\"contentPath\""));

        let event: EditorEvent =
            serde_json::from_str(r#"{"command":"scrollChanged","offset":42.0}"#).unwrap();
        assert_eq!(event, EditorEvent::ScrollChanged { offset: 42.0 });
    }
}
