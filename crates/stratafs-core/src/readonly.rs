//! Read-only wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{VfsError, VfsResult};
use crate::traits::{DirPage, FileSystem, Properties, ReadStream, WriteStream};

/// Forwards reads to the inner filesystem and fails every mutation with
/// [`VfsError::ReadOnly`] before it can reach the backend.
pub struct ReadOnlyFs {
    inner: Arc<dyn FileSystem>,
}

impl ReadOnlyFs {
    pub fn new(inner: Arc<dyn FileSystem>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FileSystem for ReadOnlyFs {
    async fn properties(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> VfsResult<Option<Properties>> {
        self.inner.properties(path, cancel).await
    }

    async fn open_read(&self, path: &str, cancel: &CancellationToken) -> VfsResult<ReadStream> {
        self.inner.open_read(path, cancel).await
    }

    async fn open_write(&self, _path: &str, _cancel: &CancellationToken) -> VfsResult<WriteStream> {
        Err(VfsError::ReadOnly)
    }

    async fn write(
        &self,
        _path: &str,
        _data: &[u8],
        _overwrite: bool,
        _cancel: &CancellationToken,
    ) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    async fn delete(&self, _path: &str, _cancel: &CancellationToken) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    async fn create_dir(&self, _path: &str, _cancel: &CancellationToken) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    async fn read_dir(
        &self,
        path: &str,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> VfsResult<DirPage> {
        self.inner.read_dir(path, cursor, cancel).await
    }

    async fn copy(
        &self,
        _from: &str,
        _to: &str,
        _overwrite: bool,
        _cancel: &CancellationToken,
    ) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    fn read_only(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFs;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    async fn sample() -> Arc<dyn FileSystem> {
        let mem = MemoryFs::new();
        mem.write("/data.txt", b"payload", true, &token())
            .await
            .unwrap();
        Arc::new(ReadOnlyFs::new(Arc::new(mem)))
    }

    #[tokio::test]
    async fn reads_pass_through() {
        let fs = sample().await;
        assert!(fs.exists("/data.txt", &token()).await.unwrap());
        let page = fs.read_dir("/", None, &token()).await.unwrap();
        assert_eq!(page.entries.len(), 1);
    }

    #[tokio::test]
    async fn every_mutation_is_rejected() {
        let fs = sample().await;
        assert!(matches!(
            fs.open_write("/data.txt", &token()).await,
            Err(VfsError::ReadOnly)
        ));
        assert!(matches!(
            fs.write("/new", b"x", true, &token()).await,
            Err(VfsError::ReadOnly)
        ));
        assert!(matches!(
            fs.delete("/data.txt", &token()).await,
            Err(VfsError::ReadOnly)
        ));
        assert!(matches!(
            fs.create_dir("/d", &token()).await,
            Err(VfsError::ReadOnly)
        ));

        // The inner file is untouched.
        assert!(fs.exists("/data.txt", &token()).await.unwrap());
    }
}
