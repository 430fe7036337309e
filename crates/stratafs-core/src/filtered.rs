//! Glob-based inclusion filtering.

use std::sync::Arc;

use async_trait::async_trait;
use stratafs_glob::PatternSet;
use tokio_util::sync::CancellationToken;

use crate::error::{VfsError, VfsResult};
use crate::node::child_path;
use crate::traits::{
    DirPage, FileSystem, NodeKind, Properties, ReadStream, WriteStream,
};

/// Hides files that fall outside an include/exclude pattern pair.
///
/// Inclusion is decided against the full caller-visible path: a file is
/// included when no exclude matches it and (the include set is empty or
/// some include matches). Non-included files behave as not-found for
/// read and write. Directories keep existing either way (they are the
/// road to included content), but an excluded directory disappears from
/// listings along with everything beneath it.
pub struct GlobFilterFs {
    inner: Arc<dyn FileSystem>,
    patterns: PatternSet,
    excludes: PatternSet,
}

impl GlobFilterFs {
    /// Wrap `inner`, compiling both pattern lists.
    pub fn new<I, S>(inner: Arc<dyn FileSystem>, patterns: I, excludes: I) -> VfsResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::from_sets(
            inner,
            PatternSet::new(patterns)?,
            PatternSet::new(excludes)?,
        ))
    }

    /// Wrap `inner` with already compiled sets.
    pub fn from_sets(
        inner: Arc<dyn FileSystem>,
        patterns: PatternSet,
        excludes: PatternSet,
    ) -> Self {
        Self {
            inner,
            patterns,
            excludes,
        }
    }

    /// Whether `path` or any of its ancestors matches an exclude.
    ///
    /// Exclusion prunes whole subtrees: content under an excluded
    /// directory must stay invisible even when addressed directly.
    fn excluded(&self, path: &str) -> bool {
        if self.excludes.matches(path) {
            return true;
        }
        let mut ancestor = stratafs_path::parent(path);
        while !ancestor.is_empty() && ancestor != "/" {
            if self.excludes.matches(ancestor) {
                return true;
            }
            ancestor = stratafs_path::parent(ancestor);
        }
        false
    }

    fn included(&self, path: &str) -> bool {
        !self.excluded(path) && (self.patterns.is_empty() || self.patterns.matches(path))
    }

    /// Look `path` up in its parent's listing to learn its kind.
    ///
    /// Needed only for the `length == 0` stat ambiguity (directory or
    /// empty file) when deciding whether the filter masks it.
    async fn inner_kind(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> VfsResult<Option<NodeKind>> {
        let parent = stratafs_path::parent(path);
        if parent.is_empty() {
            return Ok(Some(NodeKind::Directory));
        }
        let name = stratafs_path::file_name(path);
        let mut cursor: Option<String> = None;
        loop {
            let page = self.inner.read_dir(parent, cursor.as_deref(), cancel).await?;
            if let Some(entry) = page.entries.iter().find(|e| e.name == name) {
                return Ok(Some(entry.kind));
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl FileSystem for GlobFilterFs {
    async fn properties(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> VfsResult<Option<Properties>> {
        let props = self.inner.properties(path, cancel).await?;
        let Some(existing) = props.filter(|p| p.exists()) else {
            return Ok(props);
        };
        if self.included(path) {
            return Ok(Some(existing));
        }
        // length > 0 is definitely a file; at 0 ask the parent listing.
        let is_file = existing.length > 0
            || self.inner_kind(path, cancel).await? == Some(NodeKind::File);
        if is_file {
            Ok(Some(Properties::UNAVAILABLE))
        } else {
            Ok(Some(existing))
        }
    }

    async fn open_read(&self, path: &str, cancel: &CancellationToken) -> VfsResult<ReadStream> {
        if !self.included(path) {
            return Err(VfsError::not_found(path));
        }
        self.inner.open_read(path, cancel).await
    }

    async fn open_write(&self, path: &str, cancel: &CancellationToken) -> VfsResult<WriteStream> {
        if !self.included(path) {
            return Err(VfsError::not_found(path));
        }
        self.inner.open_write(path, cancel).await
    }

    async fn write(
        &self,
        path: &str,
        data: &[u8],
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> VfsResult<()> {
        if !self.included(path) {
            return Err(VfsError::not_found(path));
        }
        self.inner.write(path, data, overwrite, cancel).await
    }

    async fn delete(&self, path: &str, cancel: &CancellationToken) -> VfsResult<()> {
        if self.excluded(path) {
            // Invisible targets make delete a no-op.
            return Ok(());
        }
        self.inner.delete(path, cancel).await
    }

    async fn create_dir(&self, path: &str, cancel: &CancellationToken) -> VfsResult<()> {
        self.inner.create_dir(path, cancel).await
    }

    async fn read_dir(
        &self,
        path: &str,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> VfsResult<DirPage> {
        let mut page = self.inner.read_dir(path, cursor, cancel).await?;
        page.entries.retain(|entry| {
            let child = child_path(path, &entry.name);
            match entry.kind {
                NodeKind::Directory => !self.excluded(&child),
                NodeKind::File => self.included(&child),
            }
        });
        Ok(page)
    }

    fn read_only(&self) -> bool {
        self.inner.read_only()
    }
}
