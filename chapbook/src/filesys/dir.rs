//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::ChapError;
use crate::filesys::file::File;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), ChapError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// List files in the directory, sorted by name
    pub async fn list_files(&self) -> Result<Vec<PathBuf>, ChapError> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// List subdirectories, sorted by name
    pub async fn list_dirs(&self) -> Result<Vec<PathBuf>, ChapError> {
        let mut dirs = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            // follow symlinks so linked workflow checkouts are picked up
            if fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
                dirs.push(path);
            }
        }

        dirs.sort();
        Ok(dirs)
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }
}
