//! Where block definition files come from.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::io;

/// Trait for abstracting definition file I/O (filesystem vs. in-memory).
pub trait DefinitionSource {
    /// Read a file at the given logical path.
    fn read_to_string(&mut self, path: &Utf8Path) -> io::Result<String>;
    /// List files (not directories) directly inside `path`, as full paths.
    fn list_dir(&mut self, path: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>>;
}

/// Reads definitions from the local filesystem.
pub struct FsSource;

impl DefinitionSource for FsSource {
    fn read_to_string(&mut self, path: &Utf8Path) -> io::Result<String> {
        std::fs::read_to_string(path.as_std_path())
    }

    fn list_dir(&mut self, path: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path.as_std_path())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let p = Utf8PathBuf::from_path_buf(entry.path()).map_err(|p| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("non-UTF-8 path {}", p.display()),
                    )
                })?;
                files.push(p);
            }
        }
        Ok(files)
    }
}

/// Definitions held in memory, keyed by logical path. Handy for bundled
/// definitions and tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: IndexMap<Utf8PathBuf, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<Utf8PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl DefinitionSource for MemorySource {
    fn read_to_string(&mut self, path: &Utf8Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path)))
    }

    fn list_dir(&mut self, path: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
        Ok(self
            .files
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }
}
