//! Bridges filesystems into the generic tree walker.

use std::sync::Arc;

use async_trait::async_trait;
use stratafs_glob::{PatternSet, TreeSource, TreeWalk, WalkError, WalkOptions};
use tokio_util::sync::CancellationToken;

use crate::error::VfsResult;
use crate::node::{Node, child_path};
use crate::traits::{FileSystem, NodeKind};

/// One visited entry: resolved path plus kind.
#[derive(Debug, Clone)]
pub(crate) struct WalkEntry {
    path: String,
    kind: NodeKind,
}

/// Adapter feeding `read_dir` pages to the walker.
struct FsTreeSource {
    fs: Arc<dyn FileSystem>,
}

#[async_trait]
impl TreeSource for FsTreeSource {
    type Node = WalkEntry;

    fn path(&self, node: &WalkEntry) -> String {
        node.path.clone()
    }

    fn is_container(&self, node: &WalkEntry) -> bool {
        node.kind == NodeKind::Directory
    }

    async fn children(
        &self,
        node: &WalkEntry,
        cancel: &CancellationToken,
    ) -> Result<Vec<WalkEntry>, WalkError> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            if cancel.is_cancelled() {
                return Err(WalkError::Cancelled);
            }
            let page = self
                .fs
                .read_dir(&node.path, cursor.as_deref(), cancel)
                .await
                .map_err(WalkError::source)?;
            out.extend(page.entries.into_iter().map(|entry| WalkEntry {
                path: child_path(&node.path, &entry.name),
                kind: entry.kind,
            }));
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(out)
    }
}

/// Recursive glob enumeration over one directory subtree.
///
/// Produced by [`crate::Directory::walk`] / [`crate::Directory::walk_files`].
/// Pre-order, lazy, exclusion prunes whole subtrees.
pub struct DirWalk {
    fs: Arc<dyn FileSystem>,
    inner: TreeWalk<FsTreeSource>,
}

impl DirWalk {
    pub(crate) fn new(
        fs: Arc<dyn FileSystem>,
        root: String,
        patterns: PatternSet,
        excludes: PatternSet,
        files_only: bool,
        cancel: CancellationToken,
    ) -> Self {
        let include: Option<Box<dyn Fn(&WalkEntry) -> bool + Send + Sync>> = if files_only {
            Some(Box::new(|entry: &WalkEntry| entry.kind == NodeKind::File))
        } else {
            None
        };
        let options = WalkOptions {
            patterns,
            excludes,
            include,
        };
        let source = FsTreeSource {
            fs: Arc::clone(&fs),
        };
        let root = WalkEntry {
            path: root,
            kind: NodeKind::Directory,
        };
        Self {
            fs,
            inner: TreeWalk::new(source, root, options, cancel),
        }
    }

    /// The next matching node, or `None` when the walk is done.
    pub async fn next(&mut self) -> VfsResult<Option<Node>> {
        match self.inner.next().await {
            Ok(Some(entry)) => Ok(Some(Node::from_kind(
                Arc::clone(&self.fs),
                entry.path,
                entry.kind,
            ))),
            Ok(None) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Drain the remaining results into a vector.
    pub async fn collect(mut self) -> VfsResult<Vec<Node>> {
        let mut out = Vec::new();
        while let Some(node) = self.next().await? {
            out.push(node);
        }
        Ok(out)
    }
}
