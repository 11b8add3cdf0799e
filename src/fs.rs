use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};

/// A single directory entry with its file/directory discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (no path components)
    pub name: String,
    /// Whether this entry is a directory
    pub is_dir: bool,
}

impl DirEntry {
    /// A file entry
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    /// A directory entry
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// Abstraction over filesystem operations.
/// Allows for different implementations: real filesystem, in-memory (for
/// tests or virtual workspaces), etc.
pub trait FileSystem {
    /// Reads the file content as text
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Overwrites (or creates) a file with the given content
    fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Creates a file ONLY if it doesn't exist (for new notes).
    /// Should return an error if the file exists.
    fn create_new(&self, path: &Path, content: &str) -> Result<()>;

    /// Deletes a file
    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Deletes a directory and everything beneath it
    fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// Lists the immediate entries of a directory with a file/dir
    /// discriminator. Not recursive.
    fn list_entries(&self, dir: &Path) -> Result<Vec<DirEntry>>;

    /// Checks if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Creates a directory and all parent directories
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Checks if a path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Move/rename a file from `from` to `to`.
    ///
    /// Implementations should error if the source does not exist or if the
    /// destination already exists.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Read binary file content (media files)
    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        self.read_to_string(path).map(|s| s.into_bytes())
    }

    /// Write binary content to a file (media files)
    fn write_binary(&self, _path: &Path, _content: &[u8]) -> Result<()> {
        Err(Error::new(
            ErrorKind::Unsupported,
            "Binary write not supported",
        ))
    }
}

// Blanket implementation for references to FileSystem
impl<T: FileSystem> FileSystem for &T {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        (*self).read_to_string(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        (*self).write_file(path, content)
    }

    fn create_new(&self, path: &Path, content: &str) -> Result<()> {
        (*self).create_new(path, content)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        (*self).delete_file(path)
    }

    fn delete_dir_all(&self, path: &Path) -> Result<()> {
        (*self).delete_dir_all(path)
    }

    fn list_entries(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        (*self).list_entries(dir)
    }

    fn exists(&self, path: &Path) -> bool {
        (*self).exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        (*self).create_dir_all(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (*self).is_dir(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        (*self).rename(from, to)
    }

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        (*self).read_binary(path)
    }

    fn write_binary(&self, path: &Path, content: &[u8]) -> Result<()> {
        (*self).write_binary(path, content)
    }
}

// ============================================================================
// RealFileSystem
// ============================================================================

use std::fs::{self, OpenOptions};
use std::io::Write;

/// A simple filesystem implementation that maps to std::fs methods
#[derive(Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content)
    }

    fn create_new(&self, path: &Path, content: &str) -> Result<()> {
        // This atomic check prevents race conditions
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(content.as_bytes())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
    }

    fn delete_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
    }

    fn list_entries(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type()?.is_dir();
            entries.push(DirEntry { name, is_dir });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        if !from.exists() {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("Source not found: {:?}", from),
            ));
        }
        if to.exists() {
            return Err(Error::new(
                ErrorKind::AlreadyExists,
                format!("Destination already exists: {:?}", to),
            ));
        }

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::rename(from, to)
    }

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_binary(&self, path: &Path, content: &[u8]) -> Result<()> {
        fs::write(path, content)
    }
}

// ============================================================================
// InMemoryFileSystem
// ============================================================================

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// An in-memory filesystem implementation.
/// Useful for testing and for virtual workspaces without disk access.
#[derive(Clone, Default)]
pub struct InMemoryFileSystem {
    /// Text files stored as path -> content
    files: Arc<RwLock<HashMap<PathBuf, String>>>,
    /// Binary files stored as path -> bytes (media)
    binary_files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
    /// Directories that exist (implicitly created when files are added)
    directories: Arc<RwLock<HashSet<PathBuf>>>,
}

impl InMemoryFileSystem {
    /// Create a new empty in-memory filesystem
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            binary_files: Arc::new(RwLock::new(HashMap::new())),
            directories: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Create a filesystem pre-populated with text files
    pub fn with_files(entries: Vec<(PathBuf, String)>) -> Self {
        let fs = Self::new();
        {
            let mut files = fs.files.write().unwrap();
            let mut dirs = fs.directories.write().unwrap();

            for (path, content) in entries {
                Self::insert_parents(&mut dirs, &path);
                files.insert(path, content);
            }
        }
        fs
    }

    /// Get a list of all text file paths in the filesystem
    pub fn list_all_files(&self) -> Vec<PathBuf> {
        let files = self.files.read().unwrap();
        files.keys().cloned().collect()
    }

    fn insert_parents(dirs: &mut HashSet<PathBuf>, path: &Path) {
        let mut current = path;
        while let Some(parent) = current.parent() {
            if !parent.as_os_str().is_empty() {
                dirs.insert(parent.to_path_buf());
            }
            current = parent;
        }
    }

    /// Helper to normalize paths (remove . and .. components where possible)
    fn normalize_path(path: &Path) -> PathBuf {
        let mut components = Vec::new();
        for component in path.components() {
            use std::path::Component;
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !components.is_empty() {
                        components.pop();
                    }
                }
                c => components.push(c),
            }
        }
        components.iter().collect()
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let normalized = Self::normalize_path(path);
        let files = self.files.read().unwrap();
        files
            .get(&normalized)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("File not found: {:?}", path)))
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let normalized = Self::normalize_path(path);

        if let Some(parent) = normalized.parent() {
            self.create_dir_all(parent)?;
        }

        let mut files = self.files.write().unwrap();
        files.insert(normalized, content.to_string());
        Ok(())
    }

    fn create_new(&self, path: &Path, content: &str) -> Result<()> {
        let normalized = Self::normalize_path(path);

        {
            let files = self.files.read().unwrap();
            if files.contains_key(&normalized) {
                return Err(Error::new(
                    ErrorKind::AlreadyExists,
                    format!("File already exists: {:?}", path),
                ));
            }
        }

        if let Some(parent) = normalized.parent() {
            self.create_dir_all(parent)?;
        }

        let mut files = self.files.write().unwrap();
        files.insert(normalized, content.to_string());
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        let normalized = Self::normalize_path(path);

        {
            let mut files = self.files.write().unwrap();
            if files.remove(&normalized).is_some() {
                return Ok(());
            }
        }

        {
            let mut binary_files = self.binary_files.write().unwrap();
            if binary_files.remove(&normalized).is_some() {
                return Ok(());
            }
        }

        Err(Error::new(
            ErrorKind::NotFound,
            format!("File not found: {:?}", path),
        ))
    }

    fn delete_dir_all(&self, path: &Path) -> Result<()> {
        let normalized = Self::normalize_path(path);

        if !self.is_dir(&normalized) {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("Directory not found: {:?}", path),
            ));
        }

        self.files
            .write()
            .unwrap()
            .retain(|p, _| !p.starts_with(&normalized));
        self.binary_files
            .write()
            .unwrap()
            .retain(|p, _| !p.starts_with(&normalized));
        self.directories
            .write()
            .unwrap()
            .retain(|d| !d.starts_with(&normalized));

        Ok(())
    }

    fn list_entries(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        let normalized = Self::normalize_path(dir);
        let files = self.files.read().unwrap();
        let binary_files = self.binary_files.read().unwrap();
        let dirs = self.directories.read().unwrap();

        let mut entries = Vec::new();

        for path in files.keys().chain(binary_files.keys()) {
            if path.parent() == Some(normalized.as_path())
                && let Some(name) = path.file_name()
            {
                entries.push(DirEntry::file(name.to_string_lossy().into_owned()));
            }
        }

        for d in dirs.iter() {
            if d.parent() == Some(normalized.as_path())
                && let Some(name) = d.file_name()
            {
                entries.push(DirEntry::dir(name.to_string_lossy().into_owned()));
            }
        }

        // Deterministic order for callers and tests
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> bool {
        let normalized = Self::normalize_path(path);
        let files = self.files.read().unwrap();
        let binary_files = self.binary_files.read().unwrap();
        let dirs = self.directories.read().unwrap();
        files.contains_key(&normalized)
            || binary_files.contains_key(&normalized)
            || dirs.contains(&normalized)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let normalized = Self::normalize_path(path);
        let mut dirs = self.directories.write().unwrap();

        let mut current = normalized.as_path();
        loop {
            if !current.as_os_str().is_empty() {
                dirs.insert(current.to_path_buf());
            }
            match current.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    current = parent;
                }
                _ => break,
            }
        }

        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        let normalized = Self::normalize_path(path);
        let dirs = self.directories.read().unwrap();
        dirs.contains(&normalized)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_norm = Self::normalize_path(from);
        let to_norm = Self::normalize_path(to);

        if from_norm == to_norm {
            return Ok(());
        }

        {
            let files = self.files.read().unwrap();

            if !files.contains_key(&from_norm) {
                return Err(Error::new(
                    ErrorKind::NotFound,
                    format!("Source not found: {:?}", from),
                ));
            }

            if files.contains_key(&to_norm) {
                return Err(Error::new(
                    ErrorKind::AlreadyExists,
                    format!("Destination already exists: {:?}", to),
                ));
            }
        }

        if let Some(parent) = to_norm.parent() {
            self.create_dir_all(parent)?;
        }

        let mut files = self.files.write().unwrap();
        let content = files.remove(&from_norm).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, format!("Source not found: {:?}", from))
        })?;
        files.insert(to_norm, content);

        Ok(())
    }

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        let normalized = Self::normalize_path(path);

        {
            let binary_files = self.binary_files.read().unwrap();
            if let Some(data) = binary_files.get(&normalized) {
                return Ok(data.clone());
            }
        }

        let files = self.files.read().unwrap();
        files
            .get(&normalized)
            .map(|s| s.as_bytes().to_vec())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("File not found: {:?}", path)))
    }

    fn write_binary(&self, path: &Path, content: &[u8]) -> Result<()> {
        let normalized = Self::normalize_path(path);

        if let Some(parent) = normalized.parent() {
            self.create_dir_all(parent)?;
        }

        let mut binary_files = self.binary_files.write().unwrap();
        binary_files.insert(normalized, content.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_fs_basic_operations() {
        let fs = InMemoryFileSystem::new();

        fs.write_file(Path::new("test.md"), "Hello, World!")
            .unwrap();
        assert_eq!(
            fs.read_to_string(Path::new("test.md")).unwrap(),
            "Hello, World!"
        );

        assert!(fs.exists(Path::new("test.md")));
        assert!(!fs.exists(Path::new("nonexistent.md")));

        fs.delete_file(Path::new("test.md")).unwrap();
        assert!(!fs.exists(Path::new("test.md")));
    }

    #[test]
    fn test_in_memory_fs_create_new() {
        let fs = InMemoryFileSystem::new();

        fs.create_new(Path::new("new.md"), "Content").unwrap();
        assert_eq!(fs.read_to_string(Path::new("new.md")).unwrap(), "Content");

        let result = fs.create_new(Path::new("new.md"), "Other content");
        assert!(result.is_err());
    }

    #[test]
    fn test_in_memory_fs_directories() {
        let fs = InMemoryFileSystem::new();

        fs.write_file(Path::new("a/b/c/file.md"), "Content")
            .unwrap();

        assert!(fs.is_dir(Path::new("a")));
        assert!(fs.is_dir(Path::new("a/b")));
        assert!(fs.is_dir(Path::new("a/b/c")));

        assert!(fs.exists(Path::new("a/b/c/file.md")));
    }

    #[test]
    fn test_in_memory_fs_list_entries() {
        let fs = InMemoryFileSystem::new();

        fs.write_file(Path::new("dir/b.md"), "B").unwrap();
        fs.write_file(Path::new("dir/a.md"), "A").unwrap();
        fs.write_file(Path::new("dir/sub/c.md"), "C").unwrap();

        let entries = fs.list_entries(Path::new("dir")).unwrap();

        // Direct children only, sorted, with discriminators
        assert_eq!(
            entries,
            vec![
                DirEntry::file("a.md"),
                DirEntry::file("b.md"),
                DirEntry::dir("sub"),
            ]
        );
    }

    #[test]
    fn test_in_memory_fs_delete_dir_all() {
        let fs = InMemoryFileSystem::new();

        fs.write_file(Path::new("dir/a.md"), "A").unwrap();
        fs.write_file(Path::new("dir/sub/b.md"), "B").unwrap();
        fs.write_file(Path::new("other/c.md"), "C").unwrap();

        fs.delete_dir_all(Path::new("dir")).unwrap();

        assert!(!fs.exists(Path::new("dir/a.md")));
        assert!(!fs.exists(Path::new("dir/sub/b.md")));
        assert!(!fs.is_dir(Path::new("dir")));
        assert!(fs.exists(Path::new("other/c.md")));
    }

    #[test]
    fn test_in_memory_fs_rename() {
        let fs = InMemoryFileSystem::new();

        fs.write_file(Path::new("dir/old.md"), "Content").unwrap();
        fs.rename(Path::new("dir/old.md"), Path::new("dir/new.md"))
            .unwrap();

        assert!(!fs.exists(Path::new("dir/old.md")));
        assert_eq!(
            fs.read_to_string(Path::new("dir/new.md")).unwrap(),
            "Content"
        );

        // Renaming onto an existing file must fail
        fs.write_file(Path::new("dir/other.md"), "Other").unwrap();
        assert!(
            fs.rename(Path::new("dir/new.md"), Path::new("dir/other.md"))
                .is_err()
        );
    }

    #[test]
    fn test_in_memory_fs_binary_roundtrip() {
        let fs = InMemoryFileSystem::new();
        let bytes = vec![0x89u8, 0x50, 0x4e, 0x47];

        fs.write_binary(Path::new("dir/.media/img_0.png"), &bytes)
            .unwrap();
        assert_eq!(
            fs.read_binary(Path::new("dir/.media/img_0.png")).unwrap(),
            bytes
        );
        assert!(fs.is_dir(Path::new("dir/.media")));
    }

    #[test]
    fn test_in_memory_fs_path_normalization() {
        let fs = InMemoryFileSystem::new();

        fs.write_file(Path::new("dir/file.md"), "Content").unwrap();

        assert!(fs.exists(Path::new("dir/file.md")));
        assert!(fs.exists(Path::new("dir/./file.md")));
        assert!(fs.exists(Path::new("dir/subdir/../file.md")));
    }
}
