//! Glob matching and lazy tree traversal for stratafs.
//!
//! Two pieces live here, both independent of any concrete filesystem:
//!
//! - [`Pattern`] / [`PatternSet`]: compiled shell-style globs (`*`, `?`,
//!   `[...]`, `**`) matched against canonical `/`-separated paths.
//! - [`TreeWalk`]: a pull-based depth-first walker over anything that
//!   implements [`TreeSource`], with include/exclude pattern sets and
//!   subtree-pruning exclusion.
//!
//! The walker is deliberately a pure function of its source, roots and
//! options: stratafs-core plugs real filesystems in, the tests here use
//! an in-memory fake.

mod pattern;
mod walker;

pub use pattern::{Pattern, PatternError, PatternSet};
pub use walker::{TreeSource, TreeWalk, WalkError, WalkOptions};
