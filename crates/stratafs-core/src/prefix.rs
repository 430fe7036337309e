//! Prefix mounting.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{VfsError, VfsResult};
use crate::traits::{
    ChildEntry, DirPage, FileSystem, Properties, ReadStream, WriteStream,
};

/// Where a caller-visible path lands relative to the mount.
enum Mapped {
    /// At or below the prefix; holds the inner path.
    Inner(String),
    /// A strict ancestor of the prefix; holds the next prefix segment.
    Ancestor { child: String },
    /// Unrelated to the mount.
    Outside,
}

/// Presents the inner filesystem as if mounted at `prefix`.
///
/// `/prefix/a` delegates as inner `/a`. Every ancestor of the prefix is
/// an artificial directory (it exists, enumerates exactly the next
/// prefix segment, and accepts `create_dir` as a no-op) so that a
/// recursive walk from `/` discovers the mounted subtree. Paths
/// unrelated to the mount behave as not-found.
pub struct PrefixFs {
    inner: Arc<dyn FileSystem>,
    prefix: String,
}

impl PrefixFs {
    /// Mount `inner` at `prefix` (resolved to canonical form).
    pub fn new(inner: Arc<dyn FileSystem>, prefix: &str) -> VfsResult<Self> {
        let prefix = stratafs_path::resolve(prefix)?.into_owned();
        Ok(Self { inner, prefix })
    }

    /// The mount point.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn classify(&self, path: &str) -> Mapped {
        if self.prefix == "/" {
            // Degenerate mount at the root: a transparent passthrough.
            return Mapped::Inner(path.to_owned());
        }
        if path == self.prefix {
            return Mapped::Inner("/".to_owned());
        }
        if let Some(rest) = path.strip_prefix(self.prefix.as_str()) {
            if rest.starts_with('/') {
                return Mapped::Inner(rest.to_owned());
            }
        }
        // Ancestors: "/" plus every proper prefix of the mount path.
        let remainder = if path == "/" {
            Some(&self.prefix[1..])
        } else {
            self.prefix
                .strip_prefix(path)
                .and_then(|r| r.strip_prefix('/'))
        };
        if let Some(remainder) = remainder {
            let child = remainder.split('/').next().unwrap_or(remainder);
            return Mapped::Ancestor {
                child: child.to_owned(),
            };
        }
        tracing::trace!(path, prefix = %self.prefix, "path is outside the mount");
        Mapped::Outside
    }
}

#[async_trait]
impl FileSystem for PrefixFs {
    async fn properties(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> VfsResult<Option<Properties>> {
        match self.classify(path) {
            Mapped::Inner(inner) => self.inner.properties(&inner, cancel).await,
            Mapped::Ancestor { .. } => Ok(Some(Properties::directory())),
            Mapped::Outside => Ok(Some(Properties::UNAVAILABLE)),
        }
    }

    async fn open_read(&self, path: &str, cancel: &CancellationToken) -> VfsResult<ReadStream> {
        match self.classify(path) {
            Mapped::Inner(inner) => self.inner.open_read(&inner, cancel).await,
            Mapped::Ancestor { .. } | Mapped::Outside => Err(VfsError::not_found(path)),
        }
    }

    async fn open_write(&self, path: &str, cancel: &CancellationToken) -> VfsResult<WriteStream> {
        match self.classify(path) {
            Mapped::Inner(inner) => self.inner.open_write(&inner, cancel).await,
            Mapped::Ancestor { .. } | Mapped::Outside => Err(VfsError::PathMapping {
                path: path.to_owned(),
            }),
        }
    }

    async fn write(
        &self,
        path: &str,
        data: &[u8],
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> VfsResult<()> {
        match self.classify(path) {
            Mapped::Inner(inner) => self.inner.write(&inner, data, overwrite, cancel).await,
            Mapped::Ancestor { .. } | Mapped::Outside => Err(VfsError::PathMapping {
                path: path.to_owned(),
            }),
        }
    }

    async fn delete(&self, path: &str, cancel: &CancellationToken) -> VfsResult<()> {
        match self.classify(path) {
            Mapped::Inner(inner) => self.inner.delete(&inner, cancel).await,
            // Artificial directories cannot be removed; absent paths
            // make delete a no-op either way.
            Mapped::Ancestor { .. } | Mapped::Outside => Ok(()),
        }
    }

    async fn create_dir(&self, path: &str, cancel: &CancellationToken) -> VfsResult<()> {
        match self.classify(path) {
            Mapped::Inner(inner) => self.inner.create_dir(&inner, cancel).await,
            // Already "exists".
            Mapped::Ancestor { .. } => Ok(()),
            Mapped::Outside => Err(VfsError::PathMapping {
                path: path.to_owned(),
            }),
        }
    }

    async fn read_dir(
        &self,
        path: &str,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> VfsResult<DirPage> {
        match self.classify(path) {
            Mapped::Inner(inner) => self.inner.read_dir(&inner, cursor, cancel).await,
            Mapped::Ancestor { child } => {
                Ok(DirPage::last(vec![ChildEntry::directory(child)]))
            }
            Mapped::Outside => Ok(DirPage::default()),
        }
    }

    fn read_only(&self) -> bool {
        self.inner.read_only()
    }
}
