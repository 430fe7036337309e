//! Sub-root restriction.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{VfsError, VfsResult};
use crate::traits::{DirPage, FileSystem, Properties, ReadStream, WriteStream};

/// Presents a subtree of the inner filesystem as the whole path space:
/// outer `/x` becomes inner `<root>/x`. The inverse of
/// [`crate::PrefixFs`]. Paths that would ascend above the sub-root are
/// refused outright.
pub struct SubRootFs {
    inner: Arc<dyn FileSystem>,
    root: String,
}

impl SubRootFs {
    /// Restrict `inner` to `root` (resolved to canonical form).
    pub fn new(inner: Arc<dyn FileSystem>, root: &str) -> VfsResult<Self> {
        let root = stratafs_path::resolve(root)?.into_owned();
        Ok(Self { inner, root })
    }

    /// The inner path this filesystem is rooted at.
    pub fn root(&self) -> &str {
        &self.root
    }

    fn map(&self, path: &str) -> VfsResult<String> {
        if stratafs_path::navigates_above_root(path) {
            return Err(VfsError::PathOutsideRoot {
                path: path.to_owned(),
            });
        }
        if path == "/" {
            return Ok(self.root.clone());
        }
        if self.root == "/" {
            return Ok(path.to_owned());
        }
        Ok(format!("{}{}", self.root, path))
    }
}

#[async_trait]
impl FileSystem for SubRootFs {
    async fn properties(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> VfsResult<Option<Properties>> {
        self.inner.properties(&self.map(path)?, cancel).await
    }

    async fn open_read(&self, path: &str, cancel: &CancellationToken) -> VfsResult<ReadStream> {
        self.inner.open_read(&self.map(path)?, cancel).await
    }

    async fn open_write(&self, path: &str, cancel: &CancellationToken) -> VfsResult<WriteStream> {
        self.inner.open_write(&self.map(path)?, cancel).await
    }

    async fn write(
        &self,
        path: &str,
        data: &[u8],
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> VfsResult<()> {
        self.inner
            .write(&self.map(path)?, data, overwrite, cancel)
            .await
    }

    async fn delete(&self, path: &str, cancel: &CancellationToken) -> VfsResult<()> {
        self.inner.delete(&self.map(path)?, cancel).await
    }

    async fn create_dir(&self, path: &str, cancel: &CancellationToken) -> VfsResult<()> {
        self.inner.create_dir(&self.map(path)?, cancel).await
    }

    async fn read_dir(
        &self,
        path: &str,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> VfsResult<DirPage> {
        self.inner.read_dir(&self.map(path)?, cursor, cancel).await
    }

    fn read_only(&self) -> bool {
        self.inner.read_only()
    }
}
