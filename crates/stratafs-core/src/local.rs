//! Local disk filesystem.
//!
//! Maps the virtual path space onto a host directory via `tokio::fs`,
//! with optional read-only mode. All virtual paths resolve inside
//! `root`; anything that would escape it is refused.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::error::{VfsError, VfsResult};
use crate::traits::{
    ChildEntry, DirPage, FileSystem, Properties, ReadStream, WriteStream,
};

/// Filesystem rooted at a host directory.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
    read_only: bool,
}

impl LocalFs {
    /// Create a filesystem rooted at `root`. The directory should exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
        }
    }

    /// Create a read-only filesystem rooted at `root`.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: true,
        }
    }

    /// The host root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a canonical virtual path onto the host filesystem.
    ///
    /// Paths reaching a backend are already fully resolved, but the
    /// ascent check stays as the sandbox guard against a decorator bug
    /// or a caller bypassing the node layer.
    fn host_path(&self, path: &str) -> VfsResult<PathBuf> {
        if stratafs_path::navigates_above_root(path) {
            tracing::warn!(path, root = %self.root.display(), "refusing path escaping the local root");
            return Err(VfsError::PathOutsideRoot {
                path: path.to_owned(),
            });
        }
        Ok(self.root.join(path.trim_start_matches('/')))
    }

    fn ensure_writable(&self) -> VfsResult<()> {
        if self.read_only {
            return Err(VfsError::ReadOnly);
        }
        Ok(())
    }
}

fn properties_from_metadata(meta: &std::fs::Metadata) -> Properties {
    Properties {
        length: if meta.is_dir() {
            0
        } else {
            i64::try_from(meta.len()).unwrap_or(i64::MAX)
        },
        created: meta.created().ok(),
        accessed: meta.accessed().ok(),
        modified: meta.modified().ok(),
    }
}

#[async_trait]
impl FileSystem for LocalFs {
    async fn properties(
        &self,
        path: &str,
        _cancel: &CancellationToken,
    ) -> VfsResult<Option<Properties>> {
        let host = self.host_path(path)?;
        match fs::metadata(&host).await {
            Ok(meta) => Ok(Some(properties_from_metadata(&meta))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Ok(Some(Properties::UNAVAILABLE))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn open_read(&self, path: &str, _cancel: &CancellationToken) -> VfsResult<ReadStream> {
        let host = self.host_path(path)?;
        match fs::File::open(&host).await {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(VfsError::not_found(path)),
            Err(err) => Err(err.into()),
        }
    }

    async fn open_write(&self, path: &str, _cancel: &CancellationToken) -> VfsResult<WriteStream> {
        self.ensure_writable()?;
        let host = self.host_path(path)?;
        if let Some(parent) = host.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&host)
            .await?;
        Ok(Box::new(file))
    }

    async fn write(
        &self,
        path: &str,
        data: &[u8],
        overwrite: bool,
        _cancel: &CancellationToken,
    ) -> VfsResult<()> {
        self.ensure_writable()?;
        let host = self.host_path(path)?;
        if let Some(parent) = host.parent() {
            fs::create_dir_all(parent).await?;
        }
        if overwrite {
            fs::write(&host, data).await?;
            return Ok(());
        }
        // create_new is the kernel's if-not-exists primitive; no
        // check-then-write race.
        let open = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&host)
            .await;
        match open {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                file.write_all(data).await?;
                file.flush().await?;
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(VfsError::AlreadyExists {
                    path: path.to_owned(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, path: &str, _cancel: &CancellationToken) -> VfsResult<()> {
        self.ensure_writable()?;
        let host = self.host_path(path)?;
        let meta = match fs::metadata(&host).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if meta.is_dir() {
            fs::remove_dir_all(&host).await?;
        } else {
            fs::remove_file(&host).await?;
        }
        Ok(())
    }

    async fn create_dir(&self, path: &str, _cancel: &CancellationToken) -> VfsResult<()> {
        self.ensure_writable()?;
        let host = self.host_path(path)?;
        fs::create_dir_all(&host).await?;
        Ok(())
    }

    async fn read_dir(
        &self,
        path: &str,
        _cursor: Option<&str>,
        _cancel: &CancellationToken,
    ) -> VfsResult<DirPage> {
        let host = self.host_path(path)?;
        let mut reader = match fs::read_dir(&host).await {
            Ok(reader) => reader,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(DirPage::default());
            }
            Err(err) => return Err(err.into()),
        };
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                entries.push(ChildEntry::directory(name));
            } else {
                entries.push(ChildEntry::file(name));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(DirPage::last(entries))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}
