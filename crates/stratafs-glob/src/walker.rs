//! Generic lazy tree traversal.
//!
//! [`TreeWalk`] walks any tree a [`TreeSource`] can describe, depth-first
//! and pre-order, applying include/exclude pattern sets. It is pull-based:
//! nothing below a node is fetched until a consumer asks for the next
//! result, and an excluded node prunes its entire subtree: children of
//! an excluded directory are never listed at all.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::pattern::PatternSet;

/// Errors surfaced by a walk.
#[derive(Debug, Error)]
pub enum WalkError {
    /// The walk's cancellation token fired between visits.
    #[error("walk cancelled")]
    Cancelled,
    /// The source failed to list a node's children.
    #[error(transparent)]
    Source(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl WalkError {
    /// Wrap a source-side error.
    pub fn source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source(Box::new(err))
    }
}

/// A tree the walker can traverse.
///
/// Implementations describe nodes, identify which ones have children,
/// and list those children on demand. `children` is only invoked for
/// nodes that pass the recursion test, and only once the walk actually
/// reaches them.
#[async_trait]
pub trait TreeSource: Send + Sync {
    type Node: Send;

    /// Path string used for glob matching; canonical `/`-separated.
    fn path(&self, node: &Self::Node) -> String;

    /// Whether the walk may descend into this node.
    fn is_container(&self, node: &Self::Node) -> bool;

    /// Immediate children of `node`, in the source's own order.
    async fn children(
        &self,
        node: &Self::Node,
        cancel: &CancellationToken,
    ) -> Result<Vec<Self::Node>, WalkError>;
}

/// Filters applied during a walk.
pub struct WalkOptions<N> {
    /// A node is yielded only when some pattern matches its path.
    /// The empty set matches everything.
    pub patterns: PatternSet,
    /// A node matching any exclude is skipped and never descended into.
    pub excludes: PatternSet,
    /// Extra structural filter (e.g. files only), independent of globs.
    pub include: Option<Box<dyn Fn(&N) -> bool + Send + Sync>>,
}

impl<N> Default for WalkOptions<N> {
    fn default() -> Self {
        Self {
            patterns: PatternSet::empty(),
            excludes: PatternSet::empty(),
            include: None,
        }
    }
}

impl<N> std::fmt::Debug for WalkOptions<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalkOptions")
            .field("patterns", &self.patterns)
            .field("excludes", &self.excludes)
            .field("include", &self.include.as_ref().map(|_| "..."))
            .finish()
    }
}

/// A lazy depth-first pre-order walk.
///
/// The walk starts from the root's children; the root itself is never
/// tested or yielded. Results come one at a time from [`TreeWalk::next`];
/// [`TreeWalk::collect`] drains the rest. Cancellation is checked between
/// node visits, so results already yielded stay valid.
pub struct TreeWalk<S: TreeSource> {
    source: S,
    options: WalkOptions<S::Node>,
    cancel: CancellationToken,
    pending_root: Option<S::Node>,
    stack: Vec<S::Node>,
}

impl<S: TreeSource> TreeWalk<S> {
    /// Start a walk below `root`.
    pub fn new(
        source: S,
        root: S::Node,
        options: WalkOptions<S::Node>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            options,
            cancel,
            pending_root: Some(root),
            stack: Vec::new(),
        }
    }

    /// Fetch the next accepted node, or `None` when the walk is done.
    pub async fn next(&mut self) -> Result<Option<S::Node>, WalkError> {
        if let Some(root) = self.pending_root.take() {
            self.push_children(&root).await?;
        }
        loop {
            if self.cancel.is_cancelled() {
                return Err(WalkError::Cancelled);
            }
            let Some(node) = self.stack.pop() else {
                return Ok(None);
            };
            let path = self.source.path(&node);
            if self.options.excludes.matches(&path) {
                // Pruned: neither yielded nor descended into.
                continue;
            }
            if self.source.is_container(&node) {
                self.push_children(&node).await?;
            }
            let structural_ok = self.options.include.as_ref().map_or(true, |f| f(&node));
            let glob_ok =
                self.options.patterns.is_empty() || self.options.patterns.matches(&path);
            if structural_ok && glob_ok {
                return Ok(Some(node));
            }
        }
    }

    /// Drain the remaining results into a vector.
    pub async fn collect(mut self) -> Result<Vec<S::Node>, WalkError> {
        let mut out = Vec::new();
        while let Some(node) = self.next().await? {
            out.push(node);
        }
        Ok(out)
    }

    /// Push `node`'s children so the first child is popped first.
    async fn push_children(&mut self, node: &S::Node) -> Result<(), WalkError> {
        let mut children = self.source.children(node, &self.cancel).await?;
        children.reverse();
        self.stack.append(&mut children);
        Ok(())
    }
}
