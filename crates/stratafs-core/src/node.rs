//! File and directory nodes.
//!
//! Nodes are minted on demand by [`FileSystemExt::get_file`] /
//! [`FileSystemExt::get_directory`] and are never cached by identity:
//! two calls with the same path give independent nodes. What IS cached
//! is the stat snapshot inside each node, lazily on first use.
//!
//! The cache invariant: every mutating entry point calls `refresh()`
//! synchronously BEFORE delegating to the backend, so a reentrant
//! property read during the mutation re-fetches instead of serving the
//! pre-mutation snapshot. Concurrent use of one shared node is not
//! synchronized beyond that; callers needing per-path serialization hold
//! their own.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stratafs_glob::PatternSet;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::{VfsError, VfsResult};
use crate::traits::{ChildEntry, FileSystem, NodeKind, Properties, ReadStream, WriteStream};
use crate::walk::DirWalk;

/// Full path of `name` inside `dir` (both canonical).
pub(crate) fn child_path(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Shared state of a file or directory node.
pub(crate) struct NodeCore {
    fs: Arc<dyn FileSystem>,
    full_name: String,
    cached: Mutex<Option<Properties>>,
}

impl NodeCore {
    fn new(fs: Arc<dyn FileSystem>, full_name: String) -> Self {
        Self {
            fs,
            full_name,
            cached: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Properties>> {
        // A poisoned cache only ever holds a stale snapshot; take it anyway.
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self) {
        *self.lock() = None;
    }

    async fn properties(&self, cancel: &CancellationToken) -> VfsResult<Properties> {
        if let Some(props) = *self.lock() {
            return Ok(props);
        }
        let fetched = self
            .fs
            .properties(&self.full_name, cancel)
            .await?
            .unwrap_or(Properties::UNAVAILABLE);
        *self.lock() = Some(fetched);
        Ok(fetched)
    }

    fn ensure_writable(&self) -> VfsResult<()> {
        if self.fs.read_only() {
            return Err(VfsError::ReadOnly);
        }
        Ok(())
    }
}

/// A file node.
pub struct File {
    core: NodeCore,
}

impl File {
    pub(crate) fn new(fs: Arc<dyn FileSystem>, full_name: String) -> Self {
        Self {
            core: NodeCore::new(fs, full_name),
        }
    }

    /// Canonical absolute path; fixed at construction.
    pub fn full_name(&self) -> &str {
        &self.core.full_name
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        stratafs_path::file_name(&self.core.full_name)
    }

    /// Extension of the name, dot included; empty when there is none.
    pub fn extension(&self) -> &str {
        stratafs_path::extension(&self.core.full_name)
    }

    /// The filesystem this node came from.
    pub fn filesystem(&self) -> &Arc<dyn FileSystem> {
        &self.core.fs
    }

    /// Drop the cached stat snapshot; the next read re-fetches.
    pub fn refresh(&self) {
        self.core.refresh()
    }

    /// Stat this file, serving the cached snapshot when present.
    pub async fn properties(&self, cancel: &CancellationToken) -> VfsResult<Properties> {
        self.core.properties(cancel).await
    }

    /// Whether this file exists.
    pub async fn exists(&self, cancel: &CancellationToken) -> VfsResult<bool> {
        Ok(self.core.properties(cancel).await?.exists())
    }

    /// Open for reading. [`VfsError::NotFound`] when absent.
    pub async fn open_read(&self, cancel: &CancellationToken) -> VfsResult<ReadStream> {
        self.core.fs.open_read(&self.core.full_name, cancel).await
    }

    /// Open for writing, creating or truncating.
    pub async fn open_write(&self, cancel: &CancellationToken) -> VfsResult<WriteStream> {
        self.core.ensure_writable()?;
        self.core.refresh();
        self.core.fs.open_write(&self.core.full_name, cancel).await
    }

    /// Read the whole file into memory.
    pub async fn read_to_vec(&self, cancel: &CancellationToken) -> VfsResult<Vec<u8>> {
        let mut reader = self.open_read(cancel).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Write `data` in one call; see [`FileSystem::write`] for the
    /// `overwrite` contract.
    pub async fn write(
        &self,
        data: &[u8],
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> VfsResult<()> {
        self.core.ensure_writable()?;
        self.core.refresh();
        self.core
            .fs
            .write(&self.core.full_name, data, overwrite, cancel)
            .await
    }

    /// Delete this file. Idempotent.
    pub async fn delete(&self, cancel: &CancellationToken) -> VfsResult<()> {
        self.core.ensure_writable()?;
        self.core.refresh();
        self.core.fs.delete(&self.core.full_name, cancel).await
    }

    /// Copy this file to `dest`.
    ///
    /// A destination whose resolved path equals the source is always
    /// [`VfsError::SelfCopy`], even when the two nodes came from
    /// different filesystem handles. Within one filesystem the backend's
    /// `copy` runs; across filesystems the bytes are streamed.
    pub async fn copy_to(
        &self,
        dest: &File,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> VfsResult<()> {
        if self.full_name() == dest.full_name() {
            return Err(VfsError::SelfCopy {
                path: self.full_name().to_owned(),
            });
        }
        dest.core.ensure_writable()?;
        dest.core.refresh();
        if Arc::ptr_eq(&self.core.fs, &dest.core.fs) {
            return self
                .core
                .fs
                .copy(self.full_name(), dest.full_name(), overwrite, cancel)
                .await;
        }
        if !overwrite && dest.core.fs.exists(dest.full_name(), cancel).await? {
            return Err(VfsError::AlreadyExists {
                path: dest.full_name().to_owned(),
            });
        }
        let mut reader = self.open_read(cancel).await?;
        let mut writer = dest.core.fs.open_write(dest.full_name(), cancel).await?;
        tokio::io::copy(&mut reader, &mut writer).await?;
        writer.shutdown().await?;
        Ok(())
    }
}

/// A directory node.
pub struct Directory {
    core: NodeCore,
}

impl Directory {
    pub(crate) fn new(fs: Arc<dyn FileSystem>, full_name: String) -> Self {
        Self {
            core: NodeCore::new(fs, full_name),
        }
    }

    /// Canonical absolute path; fixed at construction.
    pub fn full_name(&self) -> &str {
        &self.core.full_name
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        stratafs_path::file_name(&self.core.full_name)
    }

    /// The filesystem this node came from.
    pub fn filesystem(&self) -> &Arc<dyn FileSystem> {
        &self.core.fs
    }

    /// Drop the cached stat snapshot; the next read re-fetches.
    pub fn refresh(&self) {
        self.core.refresh()
    }

    /// Stat this directory, serving the cached snapshot when present.
    pub async fn properties(&self, cancel: &CancellationToken) -> VfsResult<Properties> {
        self.core.properties(cancel).await
    }

    /// Whether this directory exists.
    pub async fn exists(&self, cancel: &CancellationToken) -> VfsResult<bool> {
        Ok(self.core.properties(cancel).await?.exists())
    }

    /// Create this directory, parents included. Idempotent.
    pub async fn create(&self, cancel: &CancellationToken) -> VfsResult<()> {
        self.core.ensure_writable()?;
        self.core.refresh();
        self.core.fs.create_dir(&self.core.full_name, cancel).await
    }

    /// Delete this directory and everything under it. Idempotent.
    pub async fn delete(&self, cancel: &CancellationToken) -> VfsResult<()> {
        self.core.ensure_writable()?;
        self.core.refresh();
        self.core.fs.delete(&self.core.full_name, cancel).await
    }

    /// Lazily enumerate immediate children, mixed files and directories.
    pub fn children(&self, cancel: &CancellationToken) -> Children {
        Children {
            fs: Arc::clone(&self.core.fs),
            dir: self.core.full_name.clone(),
            cancel: cancel.clone(),
            queue: VecDeque::new(),
            cursor: None,
            exhausted: false,
        }
    }

    /// Immediate children that are files.
    pub async fn files(&self, cancel: &CancellationToken) -> VfsResult<Vec<File>> {
        let mut out = Vec::new();
        let mut children = self.children(cancel);
        while let Some(node) = children.next().await? {
            if let Node::File(file) = node {
                out.push(file);
            }
        }
        Ok(out)
    }

    /// Immediate children that are directories.
    pub async fn directories(&self, cancel: &CancellationToken) -> VfsResult<Vec<Directory>> {
        let mut out = Vec::new();
        let mut children = self.children(cancel);
        while let Some(node) = children.next().await? {
            if let Node::Directory(dir) = node {
                out.push(dir);
            }
        }
        Ok(out)
    }

    /// Recursively enumerate descendants matching `patterns`, pruning
    /// anything under a path matching `excludes`.
    pub fn walk(
        &self,
        patterns: PatternSet,
        excludes: PatternSet,
        cancel: &CancellationToken,
    ) -> DirWalk {
        DirWalk::new(
            Arc::clone(&self.core.fs),
            self.core.full_name.clone(),
            patterns,
            excludes,
            false,
            cancel.clone(),
        )
    }

    /// Like [`Directory::walk`], yielding files only.
    pub fn walk_files(
        &self,
        patterns: PatternSet,
        excludes: PatternSet,
        cancel: &CancellationToken,
    ) -> DirWalk {
        DirWalk::new(
            Arc::clone(&self.core.fs),
            self.core.full_name.clone(),
            patterns,
            excludes,
            true,
            cancel.clone(),
        )
    }
}

/// Either node kind, as yielded by enumeration.
pub enum Node {
    File(File),
    Directory(Directory),
}

impl Node {
    pub(crate) fn from_entry(fs: Arc<dyn FileSystem>, dir: &str, entry: &ChildEntry) -> Self {
        let path = child_path(dir, &entry.name);
        Self::from_kind(fs, path, entry.kind)
    }

    pub(crate) fn from_kind(fs: Arc<dyn FileSystem>, path: String, kind: NodeKind) -> Self {
        match kind {
            NodeKind::File => Node::File(File::new(fs, path)),
            NodeKind::Directory => Node::Directory(Directory::new(fs, path)),
        }
    }

    pub fn full_name(&self) -> &str {
        match self {
            Node::File(f) => f.full_name(),
            Node::Directory(d) => d.full_name(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::File(f) => f.name(),
            Node::Directory(d) => d.name(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::File(_) => NodeKind::File,
            Node::Directory(_) => NodeKind::Directory,
        }
    }

    pub fn as_file(&self) -> Option<&File> {
        match self {
            Node::File(f) => Some(f),
            Node::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&Directory> {
        match self {
            Node::Directory(d) => Some(d),
            Node::File(_) => None,
        }
    }
}

/// Lazy child enumeration.
///
/// Pulls one backend page at a time and hands out nodes one by one;
/// cancellation is checked before each page fetch, so a long listing can
/// be abandoned between backend round-trips.
pub struct Children {
    fs: Arc<dyn FileSystem>,
    dir: String,
    cancel: CancellationToken,
    queue: VecDeque<ChildEntry>,
    cursor: Option<String>,
    exhausted: bool,
}

impl Children {
    /// The next child, or `None` when the listing is done.
    pub async fn next(&mut self) -> VfsResult<Option<Node>> {
        loop {
            if let Some(entry) = self.queue.pop_front() {
                return Ok(Some(Node::from_entry(
                    Arc::clone(&self.fs),
                    &self.dir,
                    &entry,
                )));
            }
            if self.exhausted {
                return Ok(None);
            }
            if self.cancel.is_cancelled() {
                return Err(VfsError::Cancelled);
            }
            let page = self
                .fs
                .read_dir(&self.dir, self.cursor.as_deref(), &self.cancel)
                .await?;
            self.queue.extend(page.entries);
            self.cursor = page.next;
            if self.cursor.is_none() {
                self.exhausted = true;
            }
        }
    }

    /// Drain the remaining children into a vector.
    pub async fn collect(mut self) -> VfsResult<Vec<Node>> {
        let mut out = Vec::new();
        while let Some(node) = self.next().await? {
            out.push(node);
        }
        Ok(out)
    }
}

/// Node-minting entry points on any shared filesystem handle.
///
/// Caller paths are resolved to canonical absolute form here, once, so
/// every layer below works on the same spelling.
pub trait FileSystemExt {
    /// Mint a file node for `path`.
    fn get_file(&self, path: &str) -> VfsResult<File>;

    /// Mint a directory node for `path`.
    fn get_directory(&self, path: &str) -> VfsResult<Directory>;
}

impl FileSystemExt for Arc<dyn FileSystem> {
    fn get_file(&self, path: &str) -> VfsResult<File> {
        let full = stratafs_path::resolve(path)?.into_owned();
        Ok(File::new(Arc::clone(self), full))
    }

    fn get_directory(&self, path: &str) -> VfsResult<Directory> {
        let full = stratafs_path::resolve(path)?.into_owned();
        Ok(Directory::new(Arc::clone(self), full))
    }
}
