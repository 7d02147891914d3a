//! Filesystem seam for moving archive images to and from storage
//!
//! The store, writer, and reader work on in-memory buffers only. Callers
//! that keep archives on disk go through a [`Filesystem`], which tests can
//! replace with an in-memory one.

use crate::error::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whole-file reads and writes
pub trait Filesystem {
    /// Read an entire file
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace a file's contents
    fn write(&mut self, path: &Path, contents: &[u8]) -> Result<()>;
}

/// `std::fs` backed filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFilesystem;

impl Filesystem for DefaultFilesystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let contents = fs::read(path)?;
        debug!("Read {} bytes from {}", contents.len(), path.display());
        Ok(contents)
    }

    fn write(&mut self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents)?;
        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }
}

/// Filesystem held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

impl Filesystem for MemoryFilesystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
            .into()
        })
    }

    fn write(&mut self, path: &Path, contents: &[u8]) -> Result<()> {
        self.files.insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CarError;
    use tempfile::TempDir;

    #[test]
    fn test_default_filesystem_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Assets.car");

        let mut fs = DefaultFilesystem;
        fs.write(&path, b"BOMStore").unwrap();
        assert_eq!(fs.read(&path).unwrap(), b"BOMStore");
    }

    #[test]
    fn test_default_filesystem_missing_file() {
        let dir = TempDir::new().unwrap();
        let fs = DefaultFilesystem;
        let err = fs.read(&dir.path().join("missing.car")).unwrap_err();
        assert!(matches!(err, CarError::Io(_)));
    }

    #[test]
    fn test_memory_filesystem() {
        let mut fs = MemoryFilesystem::new();
        let path = Path::new("/virtual/Assets.car");
        assert!(fs.read(path).is_err());

        fs.write(path, &[1, 2, 3]).unwrap();
        assert!(fs.exists(path));
        assert_eq!(fs.read(path).unwrap(), vec![1, 2, 3]);
    }
}
