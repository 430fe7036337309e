//! The backend contract and its data types.

use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::composite::CompositeFs;
use crate::error::{VfsError, VfsResult};

/// Byte stream returned by `open_read`.
pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;
/// Byte stream returned by `open_write`.
pub type WriteStream = Box<dyn AsyncWrite + Send + Unpin>;

/// Kind of node a directory listing reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Directory,
}

/// Stat snapshot for one node.
///
/// `length` doubles as the existence encoding: `-1` means the node does
/// not exist, `0` is a directory (or empty file), anything larger is a
/// file size. [`Properties::UNAVAILABLE`] is the shared non-existent
/// sentinel so absent lookups never need a fresh allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    pub length: i64,
    pub created: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}

impl Properties {
    /// The "does not exist" snapshot.
    pub const UNAVAILABLE: Self = Self {
        length: -1,
        created: None,
        accessed: None,
        modified: None,
    };

    /// Snapshot for a file of `length` bytes, timestamps unknown.
    pub fn file(length: u64) -> Self {
        Self {
            length: i64::try_from(length).unwrap_or(i64::MAX),
            ..Self::UNAVAILABLE
        }
    }

    /// Snapshot for a directory, timestamps unknown.
    pub fn directory() -> Self {
        Self {
            length: 0,
            ..Self::UNAVAILABLE
        }
    }

    /// Whether the node exists.
    pub fn exists(&self) -> bool {
        self.length >= 0
    }
}

/// One immediate child in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEntry {
    /// Name of the entry (not a full path).
    pub name: String,
    pub kind: NodeKind,
}

impl ChildEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
        }
    }
}

/// One page of a directory listing.
///
/// Backends that page their listings return a `next` cursor; the node
/// layer drains pages transparently, so callers always see one
/// continuous sequence.
#[derive(Debug, Clone, Default)]
pub struct DirPage {
    pub entries: Vec<ChildEntry>,
    /// Cursor for the following page, `None` when this is the last one.
    pub next: Option<String>,
}

impl DirPage {
    /// A final page holding all of `entries`.
    pub fn last(entries: Vec<ChildEntry>) -> Self {
        Self {
            entries,
            next: None,
        }
    }
}

/// The filesystem contract.
///
/// Every path handed to these methods is canonical absolute: leading
/// `/`, `/` separators only, no `.`/`..` segments ([`crate::FileSystemExt`]
/// resolves caller input before anything reaches a backend). Decorators
/// implement this same trait and rewrite paths before delegating, so a
/// whole composition chain is itself a `FileSystem`.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Stat `path`.
    ///
    /// `None` means the backend could not stat at all; a known-absent
    /// node is `Some(Properties::UNAVAILABLE)`.
    async fn properties(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> VfsResult<Option<Properties>>;

    /// Open `path` for reading. Fails with [`VfsError::NotFound`] when absent.
    async fn open_read(&self, path: &str, cancel: &CancellationToken) -> VfsResult<ReadStream>;

    /// Open `path` for writing, creating or truncating it.
    async fn open_write(&self, path: &str, cancel: &CancellationToken) -> VfsResult<WriteStream>;

    /// Write `data` to `path` in one call.
    ///
    /// With `overwrite = false` an existing target is
    /// [`VfsError::AlreadyExists`]; backends use an atomic
    /// if-not-exists primitive where the medium has one rather than
    /// check-then-write.
    async fn write(
        &self,
        path: &str,
        data: &[u8],
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> VfsResult<()>;

    /// Delete `path`. Idempotent: an absent target is not an error.
    /// Directories are removed with all their descendants.
    async fn delete(&self, path: &str, cancel: &CancellationToken) -> VfsResult<()>;

    /// Create the directory at `path`, parents included. Idempotent.
    async fn create_dir(&self, path: &str, cancel: &CancellationToken) -> VfsResult<()>;

    /// List one page of immediate children.
    ///
    /// An absent directory lists as empty; existence questions go
    /// through [`FileSystem::properties`], so enumeration never throws
    /// for paths that merely are not there.
    async fn read_dir(
        &self,
        path: &str,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> VfsResult<DirPage>;

    /// Whether mutations are rejected.
    fn read_only(&self) -> bool {
        false
    }

    /// Whether `path` exists, derived from `properties` by default.
    async fn exists(&self, path: &str, cancel: &CancellationToken) -> VfsResult<bool> {
        Ok(self
            .properties(path, cancel)
            .await?
            .is_some_and(|p| p.exists()))
    }

    /// Copy `from` to `to` within this filesystem.
    ///
    /// The default streams source to destination; backends with a native
    /// server-side copy override this.
    async fn copy(
        &self,
        from: &str,
        to: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> VfsResult<()> {
        if !overwrite && self.exists(to, cancel).await? {
            return Err(VfsError::AlreadyExists {
                path: to.to_owned(),
            });
        }
        let mut reader = self.open_read(from, cancel).await?;
        let mut writer = self.open_write(to, cancel).await?;
        tokio::io::copy(&mut reader, &mut writer).await?;
        writer.shutdown().await?;
        Ok(())
    }

    /// Downcast hook used by composite flattening.
    fn as_composite(&self) -> Option<&CompositeFs> {
        None
    }

    /// Whether this is the null (identity) filesystem.
    fn is_null(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_does_not_exist() {
        assert!(!Properties::UNAVAILABLE.exists());
        assert_eq!(Properties::UNAVAILABLE.length, -1);
    }

    #[test]
    fn files_and_directories_exist() {
        assert!(Properties::file(42).exists());
        assert!(Properties::file(0).exists());
        assert!(Properties::directory().exists());
        assert_eq!(Properties::directory().length, 0);
    }

    #[test]
    fn oversized_lengths_saturate() {
        assert_eq!(Properties::file(u64::MAX).length, i64::MAX);
    }

    #[test]
    fn child_entry_constructors() {
        assert_eq!(ChildEntry::file("a.txt").kind, NodeKind::File);
        assert_eq!(ChildEntry::directory("sub").kind, NodeKind::Directory);
    }
}
