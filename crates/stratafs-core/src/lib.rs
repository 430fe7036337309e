//! Core of stratafs: one canonical path space over pluggable backends.
//!
//! A [`FileSystem`] is anything implementing the small async contract in
//! [`traits`]: stat, streams, write, delete, mkdir, paged listings.
//! Callers rarely talk to it directly: [`FileSystemExt::get_file`] and
//! [`FileSystemExt::get_directory`] mint [`File`]/[`Directory`] nodes
//! that carry the canonical path, cache their stat snapshot and enforce
//! the write rules.
//!
//! Everything between a caller and a terminal backend is a decorator
//! that itself implements [`FileSystem`]:
//!
//! ```text
//! caller path space
//! ├── PrefixFs      mounts an inner fs under /some/prefix
//! ├── SubRootFs     restricts an inner fs to a subtree
//! ├── ReadOnlyFs    rejects mutations before they reach the backend
//! ├── GlobFilterFs  hides files outside include/exclude globs
//! ├── CompositeFs   unions members in order, first match wins
//! └── NullFs        empty terminal, the composition identity
//! ```
//!
//! Because every layer speaks the same contract, chains compose freely
//! and a node minted at the top always reports the caller-visible path,
//! no matter how many rewrites happen underneath.

mod composite;
mod error;
mod filtered;
mod local;
mod memory;
mod node;
mod null;
mod prefix;
mod readonly;
mod subroot;
mod traits;
mod walk;

pub use composite::CompositeFs;
pub use error::{VfsError, VfsResult};
pub use filtered::GlobFilterFs;
pub use local::LocalFs;
pub use memory::MemoryFs;
pub use node::{Children, Directory, File, FileSystemExt, Node};
pub use null::NullFs;
pub use prefix::PrefixFs;
pub use readonly::ReadOnlyFs;
pub use subroot::SubRootFs;
pub use traits::{
    ChildEntry, DirPage, FileSystem, NodeKind, Properties, ReadStream, WriteStream,
};
pub use walk::DirWalk;

// Re-exported so downstream callers build pattern sets without naming
// the glob crate.
pub use stratafs_glob::{Pattern, PatternError, PatternSet};
