//! In-memory filesystem.
//!
//! The terminal backend used by tests and ephemeral mounts. All data is
//! lost on drop. Thread-safe via an internal `RwLock`; the lock is held
//! only for the duration of a map operation, never across an await.

use std::collections::BTreeMap;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::task::{Context, Poll};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::error::{VfsError, VfsResult};
use crate::traits::{ChildEntry, DirPage, FileSystem, Properties, ReadStream, WriteStream};

#[derive(Debug, Clone)]
enum MemEntry {
    File {
        data: Vec<u8>,
        created: SystemTime,
        modified: SystemTime,
    },
    Directory {
        created: SystemTime,
    },
}

type EntryMap = BTreeMap<String, MemEntry>;

/// In-memory filesystem over canonical-path keys.
///
/// Parents are created implicitly on write and mkdir. With
/// [`MemoryFs::with_page_size`] directory listings paginate, which
/// exercises the page-draining path of child enumeration.
#[derive(Debug)]
pub struct MemoryFs {
    entries: Arc<RwLock<EntryMap>>,
    page_size: Option<usize>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty filesystem. The root directory always exists.
    pub fn new() -> Self {
        let mut entries = EntryMap::new();
        entries.insert(
            "/".to_owned(),
            MemEntry::Directory {
                created: SystemTime::now(),
            },
        );
        Self {
            entries: Arc::new(RwLock::new(entries)),
            page_size: None,
        }
    }

    /// Like [`MemoryFs::new`], with listings split into pages of `page_size`.
    pub fn with_page_size(page_size: usize) -> Self {
        let mut fs = Self::new();
        fs.page_size = Some(page_size.max(1));
        fs
    }

    fn read_map(&self) -> RwLockReadGuard<'_, EntryMap> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, EntryMap> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert directory entries for every ancestor of `path`.
    fn ensure_parents(map: &mut EntryMap, path: &str) {
        let mut idx = 0;
        while let Some(next) = path[idx + 1..].find('/') {
            let end = idx + 1 + next;
            map.entry(path[..end].to_owned()).or_insert(MemEntry::Directory {
                created: SystemTime::now(),
            });
            idx = end;
        }
    }

    /// Keys of every entry strictly under `path`.
    fn descendant_keys(map: &EntryMap, path: &str) -> Vec<String> {
        let prefix = if path == "/" {
            "/".to_owned()
        } else {
            format!("{path}/")
        };
        map.range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn properties(
        &self,
        path: &str,
        _cancel: &CancellationToken,
    ) -> VfsResult<Option<Properties>> {
        let map = self.read_map();
        let props = match map.get(path) {
            Some(MemEntry::File {
                data,
                created,
                modified,
            }) => Properties {
                length: i64::try_from(data.len()).unwrap_or(i64::MAX),
                created: Some(*created),
                accessed: Some(*modified),
                modified: Some(*modified),
            },
            Some(MemEntry::Directory { created }) => Properties {
                length: 0,
                created: Some(*created),
                accessed: Some(*created),
                modified: Some(*created),
            },
            None => Properties::UNAVAILABLE,
        };
        Ok(Some(props))
    }

    async fn open_read(&self, path: &str, _cancel: &CancellationToken) -> VfsResult<ReadStream> {
        let map = self.read_map();
        match map.get(path) {
            Some(MemEntry::File { data, .. }) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(MemEntry::Directory { .. }) => Err(VfsError::Io(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {path}"),
            ))),
            None => Err(VfsError::not_found(path)),
        }
    }

    async fn open_write(&self, path: &str, _cancel: &CancellationToken) -> VfsResult<WriteStream> {
        {
            let map = self.read_map();
            if let Some(MemEntry::Directory { .. }) = map.get(path) {
                return Err(VfsError::Io(io::Error::new(
                    io::ErrorKind::IsADirectory,
                    format!("is a directory: {path}"),
                )));
            }
        }
        Ok(Box::new(MemoryWriter {
            entries: Arc::clone(&self.entries),
            path: path.to_owned(),
            buf: Vec::new(),
            committed: false,
        }))
    }

    async fn write(
        &self,
        path: &str,
        data: &[u8],
        overwrite: bool,
        _cancel: &CancellationToken,
    ) -> VfsResult<()> {
        let mut map = self.write_map();
        match map.get(path) {
            Some(MemEntry::Directory { .. }) => {
                return Err(VfsError::Io(io::Error::new(
                    io::ErrorKind::IsADirectory,
                    format!("is a directory: {path}"),
                )));
            }
            // Checked and inserted under one write lock, so the
            // if-not-exists precondition is atomic here.
            Some(MemEntry::File { .. }) if !overwrite => {
                return Err(VfsError::AlreadyExists {
                    path: path.to_owned(),
                });
            }
            _ => {}
        }
        Self::ensure_parents(&mut map, path);
        let created = match map.get(path) {
            Some(MemEntry::File { created, .. }) => *created,
            _ => SystemTime::now(),
        };
        map.insert(
            path.to_owned(),
            MemEntry::File {
                data: data.to_vec(),
                created,
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str, _cancel: &CancellationToken) -> VfsResult<()> {
        if path == "/" {
            return Err(VfsError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "cannot remove the root directory",
            )));
        }
        let mut map = self.write_map();
        for key in Self::descendant_keys(&map, path) {
            map.remove(&key);
        }
        map.remove(path);
        Ok(())
    }

    async fn create_dir(&self, path: &str, _cancel: &CancellationToken) -> VfsResult<()> {
        let mut map = self.write_map();
        match map.get(path) {
            Some(MemEntry::Directory { .. }) => return Ok(()),
            Some(MemEntry::File { .. }) => {
                return Err(VfsError::AlreadyExists {
                    path: path.to_owned(),
                });
            }
            None => {}
        }
        Self::ensure_parents(&mut map, path);
        map.insert(
            path.to_owned(),
            MemEntry::Directory {
                created: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn read_dir(
        &self,
        path: &str,
        cursor: Option<&str>,
        _cancel: &CancellationToken,
    ) -> VfsResult<DirPage> {
        let map = self.read_map();
        let prefix = if path == "/" {
            "/".to_owned()
        } else {
            format!("{path}/")
        };

        let mut children: Vec<ChildEntry> = map
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| {
                let name = &key[prefix.len()..];
                !name.is_empty() && !name.contains('/')
            })
            .map(|(key, entry)| {
                let name = key[prefix.len()..].to_owned();
                match entry {
                    MemEntry::File { .. } => ChildEntry::file(name),
                    MemEntry::Directory { .. } => ChildEntry::directory(name),
                }
            })
            .collect();

        if let Some(after) = cursor {
            children.retain(|c| c.name.as_str() > after);
        }

        match self.page_size {
            Some(size) if children.len() > size => {
                children.truncate(size);
                let next = children.last().map(|c| c.name.clone());
                Ok(DirPage {
                    entries: children,
                    next,
                })
            }
            _ => Ok(DirPage::last(children)),
        }
    }

    fn read_only(&self) -> bool {
        false
    }
}

/// Buffering writer that commits into the map on shutdown.
struct MemoryWriter {
    entries: Arc<RwLock<EntryMap>>,
    path: String,
    buf: Vec<u8>,
    committed: bool,
}

impl MemoryWriter {
    fn commit(&mut self) {
        if self.committed {
            return;
        }
        self.committed = true;
        let mut map = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        MemoryFs::ensure_parents(&mut map, &self.path);
        let created = match map.get(&self.path) {
            Some(MemEntry::File { created, .. }) => *created,
            _ => SystemTime::now(),
        };
        map.insert(
            self.path.clone(),
            MemEntry::File {
                data: std::mem::take(&mut self.buf),
                created,
                modified: SystemTime::now(),
            },
        );
    }
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf.extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.commit();
        Poll::Ready(Ok(()))
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        // A writer dropped without shutdown still lands its bytes.
        self.commit();
    }
}
