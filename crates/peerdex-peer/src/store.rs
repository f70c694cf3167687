//! Local file repository.
//!
//! [`LocalStore`] is the seam between the network code and wherever a
//! peer keeps its files. [`FsStore`] keeps them as plain files in one
//! directory; [`MemoryStore`] keeps them in memory.

use crate::{PeerError, Result};
use bytes::Bytes;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Storage for a peer's shareable files, addressed by flat name.
pub trait LocalStore: Send + Sync {
    /// Checks whether a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Reads a whole file.
    fn read_file(&self, name: &str) -> Result<Bytes>;

    /// Creates or replaces a file.
    fn write_file(&self, name: &str, content: &[u8]) -> Result<()>;

    /// Lists file names, sorted.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Returns a file's size in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;
}

impl<T: LocalStore + ?Sized> LocalStore for Arc<T> {
    fn file_exists(&self, name: &str) -> bool {
        (**self).file_exists(name)
    }

    fn read_file(&self, name: &str) -> Result<Bytes> {
        (**self).read_file(name)
    }

    fn write_file(&self, name: &str, content: &[u8]) -> Result<()> {
        (**self).write_file(name, content)
    }

    fn list_files(&self) -> Result<Vec<String>> {
        (**self).list_files()
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        (**self).file_size(name)
    }
}

/// Rejects names that could escape the repository directory.
///
/// # Errors
///
/// Returns [`PeerError::InvalidName`] for empty names, path separators,
/// `..`, and NUL bytes.
pub fn check_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "empty"
    } else if name == "." || name.contains("..") {
        "contains a parent reference"
    } else if name.contains(['/', '\\']) {
        "contains a path separator"
    } else if name.contains('\0') {
        "contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(PeerError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// A repository backed by one directory on disk.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Opens a repository, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            std::fs::create_dir_all(&root)?;
            info!(path = %root.display(), "Created repository directory");
        }
        Ok(Self { root })
    }

    /// Returns the repository directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        Ok(self.root.join(name))
    }

    /// Copies an outside file into the repository under `name`.
    ///
    /// Returns the number of bytes copied.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the copy fails.
    pub fn import(&self, source: &Path, name: &str) -> Result<u64> {
        let target = self.path_of(name)?;
        let copied = std::fs::copy(source, &target)?;
        info!(file = %name, source = %source.display(), bytes = copied, "File imported");
        Ok(copied)
    }

    /// Computes the SHA-256 of a file as lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn checksum(&self, name: &str) -> Result<String> {
        let mut file = std::fs::File::open(self.path_of(name)?)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

impl LocalStore for FsStore {
    fn file_exists(&self, name: &str) -> bool {
        self.path_of(name).is_ok_and(|path| path.is_file())
    }

    fn read_file(&self, name: &str) -> Result<Bytes> {
        Ok(Bytes::from(std::fs::read(self.path_of(name)?)?))
    }

    fn write_file(&self, name: &str, content: &[u8]) -> Result<()> {
        std::fs::write(self.path_of(name)?, content)?;
        debug!(file = %name, bytes = content.len(), "File written");
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        Ok(std::fs::metadata(self.path_of(name)?)?.len())
    }
}

/// An in-memory repository.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes a file, returning true if it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.files.write().remove(name).is_some()
    }
}

impl LocalStore for MemoryStore {
    fn file_exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn read_file(&self, name: &str) -> Result<Bytes> {
        self.files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PeerError::LocalFileMissing(name.to_string()))
    }

    fn write_file(&self, name: &str, content: &[u8]) -> Result<()> {
        check_name(name)?;
        self.files
            .write()
            .insert(name.to_string(), Bytes::copy_from_slice(content));
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.read().keys().cloned().collect())
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        self.files
            .read()
            .get(name)
            .map(|content| content.len() as u64)
            .ok_or_else(|| PeerError::LocalFileMissing(name.to_string()))
    }
}
