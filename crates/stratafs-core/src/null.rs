//! The null filesystem.
//!
//! Always empty, always not-found, read-only. The identity element for
//! composition: flattening drops it, and a composite with no real
//! members collapses to it.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{VfsError, VfsResult};
use crate::traits::{DirPage, FileSystem, Properties, ReadStream, WriteStream};

/// A filesystem with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFs;

#[async_trait]
impl FileSystem for NullFs {
    async fn properties(
        &self,
        _path: &str,
        _cancel: &CancellationToken,
    ) -> VfsResult<Option<Properties>> {
        Ok(Some(Properties::UNAVAILABLE))
    }

    async fn open_read(&self, path: &str, _cancel: &CancellationToken) -> VfsResult<ReadStream> {
        Err(VfsError::not_found(path))
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
        _path: &str,
        _cursor: Option<&str>,
        _cancel: &CancellationToken,
    ) -> VfsResult<DirPage> {
        Ok(DirPage::default())
    }

    fn read_only(&self) -> bool {
        true
    }

    fn is_null(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nothing_exists_and_nothing_lists() {
        let fs = NullFs;
        let cancel = CancellationToken::new();
        assert!(!fs.exists("/anything", &cancel).await.unwrap());
        assert!(!fs.exists("/", &cancel).await.unwrap());
        assert!(fs.read_dir("/", None, &cancel).await.unwrap().entries.is_empty());
        assert!(matches!(
            fs.open_read("/x", &cancel).await,
            Err(VfsError::NotFound { .. })
        ));
        assert!(matches!(
            fs.write("/x", b"x", true, &cancel).await,
            Err(VfsError::ReadOnly)
        ));
        assert!(fs.is_null());
        assert!(fs.read_only());
    }
}
