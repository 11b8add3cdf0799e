//! Note and folder operations on the workspace.
//!
//! [`Notebook`] is the command side of the crate: creating, renaming, and
//! deleting notes and folders, bulk image conversion, and one-time
//! workspace setup. It only touches the filesystem; ordering-tree updates
//! and session closing are driven by the watcher events these operations
//! produce (or applied explicitly through the provider by hosts without a
//! watcher).

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{NotegroveError, Result};
use crate::fs::FileSystem;
use crate::media;
use crate::provider::NoteRef;
use crate::template::{self, TemplateContext};

/// Filesystem-level note and folder commands for one workspace.
pub struct Notebook<FS: FileSystem> {
    fs: FS,
    config: Config,
    root: PathBuf,
}

impl<FS: FileSystem> Notebook<FS> {
    /// Create a notebook over a workspace root
    pub fn new(fs: FS, config: Config, root: PathBuf) -> Self {
        Self { fs, config, root }
    }

    /// The workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path a note with `label` would have in `folder`
    pub fn note_path(&self, folder: &Path, label: &str) -> PathBuf {
        self.root
            .join(folder)
            .join(format!("{label}{}", self.config.note_extension))
    }

    /// Create a note from the configured template.
    ///
    /// Fails with [`NotegroveError::NameCollision`] if a note with the
    /// label already exists; an existing file is never overwritten.
    pub fn create_note(&self, folder: &Path, label: &str) -> Result<PathBuf> {
        let path = self.note_path(folder, label);
        if self.fs.exists(&path) {
            return Err(NotegroveError::NameCollision(path));
        }

        let context = TemplateContext::new()
            .with_title(label)
            .with_filename(label);
        let content = template::resolve_new_note_template(&self.fs, &self.config, &self.root)
            .render(&context);

        if let Some(parent) = path.parent() {
            self.fs.create_dir_all(parent)?;
        }
        self.fs.create_new(&path, &content).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                NotegroveError::NameCollision(path.clone())
            } else {
                NotegroveError::FileWrite {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;
        log::debug!("Created note {:?}", path);
        Ok(path)
    }

    /// Create a subfolder
    pub fn create_folder(&self, folder: &Path, name: &str) -> Result<PathBuf> {
        let path = self.root.join(folder).join(name);
        if self.fs.exists(&path) {
            return Err(NotegroveError::NameCollision(path));
        }
        self.fs.create_dir_all(&path)?;
        Ok(path)
    }

    /// Delete a note file
    pub fn delete_note(&self, note: &NoteRef) -> Result<()> {
        let path = note.full_path(&self.root);
        self.fs.delete_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NotegroveError::NoteNotFound(path.clone())
            } else {
                NotegroveError::Io(e)
            }
        })?;
        log::debug!("Deleted note {:?}", path);
        Ok(())
    }

    /// Delete a folder and everything beneath it
    pub fn delete_folder(&self, folder: &NoteRef) -> Result<()> {
        let path = folder.full_path(&self.root);
        self.fs.delete_dir_all(&path)?;
        log::debug!("Deleted folder {:?}", path);
        Ok(())
    }

    /// Rename a note, keeping it in its folder.
    ///
    /// Collisions are checked before anything moves, so a failed rename
    /// leaves the workspace untouched.
    pub fn rename_note(&self, note: &NoteRef, new_label: &str) -> Result<PathBuf> {
        let from = note.full_path(&self.root);
        let to = self.note_path(&note.folder_path, new_label);
        if self.fs.exists(&to) {
            return Err(NotegroveError::NameCollision(to));
        }
        if !self.fs.exists(&from) {
            return Err(NotegroveError::NoteNotFound(from));
        }
        self.fs.rename(&from, &to)?;
        Ok(to)
    }

    /// Rename a folder, keeping its contents
    pub fn rename_folder(&self, folder: &NoteRef, new_name: &str) -> Result<PathBuf> {
        let from = folder.full_path(&self.root);
        let to = self.root.join(&folder.folder_path).join(new_name);
        if self.fs.exists(&to) {
            return Err(NotegroveError::NameCollision(to));
        }
        if !self.fs.is_dir(&from) {
            return Err(NotegroveError::NoteNotFound(from));
        }
        self.fs.rename(&from, &to)?;
        Ok(to)
    }

    /// Convert every embedded data-URI image in a note to a media file.
    ///
    /// Returns the number of images converted; the note is rewritten only
    /// when at least one converts.
    pub fn convert_images(&self, note: &NoteRef) -> Result<usize> {
        let path = note.full_path(&self.root);
        let content = self
            .fs
            .read_to_string(&path)
            .map_err(|e| NotegroveError::FileRead {
                path: path.clone(),
                source: e,
            })?;

        let folder = note.containing_dir(&self.root);
        let (rewritten, count) = media::convert_all(&self.fs, &self.config, &folder, &content)?;
        if count > 0 {
            self.fs
                .write_file(&path, &rewritten)
                .map_err(|source| NotegroveError::FileWrite { path, source })?;
        }
        Ok(count)
    }

    /// Create the workspace meta folder with its template directory and a
    /// starter template. Idempotent.
    pub fn init_meta_folder(&self) -> Result<()> {
        let template_dir = self.config.template_dir(&self.root);
        self.fs.create_dir_all(&template_dir)?;

        let starter = template_dir.join(format!("note{}", self.config.note_extension));
        if !self.fs.exists(&starter) {
            self.fs
                .create_new(&starter, template::DEFAULT_NOTE_TEMPLATE)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFileSystem;

    fn notebook() -> (InMemoryFileSystem, Notebook<InMemoryFileSystem>) {
        let fs = InMemoryFileSystem::new();
        fs.create_dir_all(Path::new("/ws")).unwrap();
        let notebook = Notebook::new(fs.clone(), Config::default(), PathBuf::from("/ws"));
        (fs, notebook)
    }

    #[test]
    fn test_create_note_renders_template() {
        let (fs, notebook) = notebook();
        let path = notebook.create_note(Path::new(""), "ideas").unwrap();

        assert_eq!(path, PathBuf::from("/ws/ideas.md"));
        assert_eq!(fs.read_to_string(&path).unwrap(), "# ideas\n\n");
    }

    #[test]
    fn test_create_note_refuses_collision() {
        let (fs, notebook) = notebook();
        fs.write_file(Path::new("/ws/ideas.md"), "original").unwrap();

        match notebook.create_note(Path::new(""), "ideas") {
            Err(NotegroveError::NameCollision(path)) => {
                assert_eq!(path, PathBuf::from("/ws/ideas.md"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(fs.read_to_string(Path::new("/ws/ideas.md")).unwrap(), "original");
    }

    #[test]
    fn test_create_note_in_subfolder() {
        let (fs, notebook) = notebook();
        let path = notebook.create_note(Path::new("work"), "plan").unwrap();
        assert_eq!(path, PathBuf::from("/ws/work/plan.md"));
        assert!(fs.exists(&path));
    }

    #[test]
    fn test_create_and_delete_folder() {
        let (fs, notebook) = notebook();
        notebook.create_folder(Path::new(""), "work").unwrap();
        assert!(fs.is_dir(Path::new("/ws/work")));
        assert!(notebook.create_folder(Path::new(""), "work").is_err());

        fs.write_file(Path::new("/ws/work/plan.md"), "p").unwrap();
        notebook
            .delete_folder(&NoteRef::folder("work", ""))
            .unwrap();
        assert!(!fs.exists(Path::new("/ws/work/plan.md")));
    }

    #[test]
    fn test_delete_note() {
        let (fs, notebook) = notebook();
        fs.write_file(Path::new("/ws/old.md"), "x").unwrap();

        notebook
            .delete_note(&NoteRef::note("old", "old.md", ""))
            .unwrap();
        assert!(!fs.exists(Path::new("/ws/old.md")));

        match notebook.delete_note(&NoteRef::note("old", "old.md", "")) {
            Err(NotegroveError::NoteNotFound(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_rename_note_checks_collision_first() {
        let (fs, notebook) = notebook();
        fs.write_file(Path::new("/ws/a.md"), "A").unwrap();
        fs.write_file(Path::new("/ws/b.md"), "B").unwrap();

        match notebook.rename_note(&NoteRef::note("a", "a.md", ""), "b") {
            Err(NotegroveError::NameCollision(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        // Nothing moved
        assert_eq!(fs.read_to_string(Path::new("/ws/a.md")).unwrap(), "A");
        assert_eq!(fs.read_to_string(Path::new("/ws/b.md")).unwrap(), "B");

        let to = notebook
            .rename_note(&NoteRef::note("a", "a.md", ""), "c")
            .unwrap();
        assert_eq!(to, PathBuf::from("/ws/c.md"));
        assert_eq!(fs.read_to_string(&to).unwrap(), "A");
    }

    #[test]
    fn test_convert_images_rewrites_note() {
        let (fs, notebook) = notebook();
        let uri = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
        fs.write_file(
            Path::new("/ws/doc.md"),
            &format!("![a]({uri})\n![b]({uri})\n"),
        )
        .unwrap();

        let count = notebook
            .convert_images(&NoteRef::note("doc", "doc.md", ""))
            .unwrap();
        assert_eq!(count, 2);

        let content = fs.read_to_string(Path::new("/ws/doc.md")).unwrap();
        assert_eq!(content, "![a](.media/img_0.png)\n![b](.media/img_1.png)\n");
        assert!(fs.exists(Path::new("/ws/.media/img_1.png")));
    }

    #[test]
    fn test_convert_images_without_images_leaves_file_alone() {
        let (fs, notebook) = notebook();
        fs.write_file(Path::new("/ws/doc.md"), "plain\n").unwrap();

        let count = notebook
            .convert_images(&NoteRef::note("doc", "doc.md", ""))
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(fs.read_to_string(Path::new("/ws/doc.md")).unwrap(), "plain\n");
    }

    #[test]
    fn test_init_meta_folder_is_idempotent() {
        let (fs, notebook) = notebook();
        notebook.init_meta_folder().unwrap();
        assert!(fs.is_dir(Path::new("/ws/.notegrove/templates")));
        assert!(fs.exists(Path::new("/ws/.notegrove/templates/note.md")));

        // Second run leaves an edited starter template alone
        fs.write_file(Path::new("/ws/.notegrove/templates/note.md"), "custom")
            .unwrap();
        notebook.init_meta_folder().unwrap();
        assert_eq!(
            fs.read_to_string(Path::new("/ws/.notegrove/templates/note.md"))
                .unwrap(),
            "custom"
        );
    }
}
