//! Canonical path algebra for stratafs.
//!
//! Every filesystem in stratafs addresses entries through one path space:
//! absolute, `/`-separated, no empty segments, no trailing slash except
//! the root itself. This crate turns arbitrary (possibly malformed) path
//! strings into that form and provides the derived queries the node layer
//! needs.
//!
//! Two canonical levels exist:
//!
//! - **normalized**: separators unified to `/`, runs collapsed, leading
//!   slash present, no trailing slash; `.`/`..` segments may remain.
//! - **fully normalized**: additionally all `.`/`..` segments have been
//!   resolved away. [`resolve`] produces this form.
//!
//! Node construction normalizes on every call, so the checks here take
//! cheap no-allocation fast paths before falling back to a rebuild.

use std::borrow::Cow;

use thiserror::Error;

mod segments;

pub use segments::{Segments, segments};

/// Errors from path resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A `..` segment unwound past the root while resolving.
    #[error("path `{0}` navigates above the root")]
    AboveRoot(String),
}

/// True when `path` starts with `/` or `\`.
pub fn has_leading_slash(path: &str) -> bool {
    path.starts_with(['/', '\\'])
}

/// True when `path` ends with `/` or `\`.
pub fn has_trailing_slash(path: &str) -> bool {
    path.ends_with(['/', '\\'])
}

/// Extension of the last path segment, including the dot.
///
/// The dot must not be the final character: an extension has at least one
/// character after it. A dot-led name like `.hidden` is all extension.
///
/// ```
/// use stratafs_path::extension;
///
/// assert_eq!(extension("/a/b.txt"), ".txt");
/// assert_eq!(extension("file."), "");
/// assert_eq!(extension(".hidden"), ".hidden");
/// assert_eq!(extension("/a.b/c"), "");
/// ```
pub fn extension(path: &str) -> &str {
    let bytes = path.as_bytes();
    for i in (0..bytes.len()).rev() {
        match bytes[i] {
            b'/' | b'\\' => return "",
            b'.' => {
                if i + 1 == bytes.len() {
                    return "";
                }
                return &path[i..];
            }
            _ => {}
        }
    }
    ""
}

/// Last segment of `path`; the whole input when it has no separator.
pub fn file_name(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Directory portion of `path`: everything before the last run of
/// separators preceding the file name.
///
/// Returns `""` when the path has no separator at all or consists only
/// of separators, and `"/"` when the directory is the root.
///
/// ```
/// use stratafs_path::parent;
///
/// assert_eq!(parent("/a/b"), "/a");
/// assert_eq!(parent("/a"), "/");
/// assert_eq!(parent("a//b"), "a");
/// assert_eq!(parent("///"), "");
/// assert_eq!(parent("file"), "");
/// ```
pub fn parent(path: &str) -> &str {
    let bytes = path.as_bytes();
    let is_sep = |b: u8| b == b'/' || b == b'\\';
    let Some(last) = bytes.iter().rposition(|&b| is_sep(b)) else {
        return "";
    };
    let mut start = last;
    while start > 0 && is_sep(bytes[start - 1]) {
        start -= 1;
    }
    if start == 0 {
        // The run reaches index 0: either the whole path is separators
        // (no directory) or the directory is the root.
        if last + 1 == bytes.len() { "" } else { "/" }
    } else {
        &path[..start]
    }
}

/// Fast check that `path` is already in normalized form.
///
/// Normalized means: non-empty and not whitespace-only, leading `/`, no
/// `\`, no `//`, and no trailing `/` unless the path is the root itself.
/// Runs without allocating.
pub fn is_normalized(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if !path.starts_with('/') {
        return false;
    }
    if path.len() > 1 && path.ends_with('/') {
        return false;
    }
    !path.contains('\\') && !path.contains("//")
}

/// Like [`is_normalized`], additionally rejecting literal `.`/`..` segments.
pub fn is_fully_normalized(path: &str) -> bool {
    is_normalized(path) && !segments(path).any(|s| s == "." || s == "..")
}

/// Rewrite `path` into normalized form.
///
/// Unifies separators to `/`, collapses runs, forces a leading slash and
/// strips the trailing one; `.`/`..` segments are kept literally. Returns
/// the input borrowed when it is already normalized, so
/// `normalize(normalize(p)) == normalize(p)` holds and the second pass is
/// free.
pub fn normalize(path: &str) -> Cow<'_, str> {
    if is_normalized(path) {
        return Cow::Borrowed(path);
    }
    let mut out = String::with_capacity(path.len() + 1);
    for segment in segments(path) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    Cow::Owned(out)
}

/// Resolve `path` into fully normalized form, eliminating `.`/`..`.
///
/// Already fully normalized input is returned borrowed. A `..` that
/// unwinds past the root is [`PathError::AboveRoot`]; a path that
/// resolves to nothing is the root `/`.
///
/// ```
/// use stratafs_path::resolve;
///
/// assert_eq!(resolve("/a/./b/../c").unwrap(), "/a/c");
/// assert!(resolve("/a/../..").is_err());
/// ```
pub fn resolve(path: &str) -> Result<Cow<'_, str>, PathError> {
    if is_fully_normalized(path) {
        return Ok(Cow::Borrowed(path));
    }
    let mut out = String::with_capacity(path.len() + 1);
    for segment in segments(path) {
        match segment {
            "." => {}
            ".." => {
                if out.is_empty() {
                    return Err(PathError::AboveRoot(path.to_owned()));
                }
                let cut = out.rfind('/').unwrap_or(0);
                out.truncate(cut);
            }
            other => {
                out.push('/');
                out.push_str(other);
            }
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(Cow::Owned(out))
}

/// True when walking `path` ever steps above its starting depth.
///
/// `..` decrements a signed depth counter, a real segment increments it,
/// `.` is neutral. Unlike [`resolve`] this never errors: it answers the
/// question without building the resolved path.
pub fn navigates_above_root(path: &str) -> bool {
    let mut depth: i32 = 0;
    for segment in segments(path) {
        match segment {
            "." => {}
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            _ => depth += 1,
        }
    }
    false
}

/// Join two path fragments with exactly one separator between them.
///
/// An empty side returns the other unchanged; a boundary slash supplied
/// by either side is kept as-is rather than doubled.
pub fn join<'a>(left: &'a str, right: &'a str) -> Cow<'a, str> {
    if left.is_empty() {
        return Cow::Borrowed(right);
    }
    if right.is_empty() {
        return Cow::Borrowed(left);
    }
    if has_trailing_slash(left) || has_leading_slash(right) {
        Cow::Owned(format!("{left}{right}"))
    } else {
        Cow::Owned(format!("{left}/{right}"))
    }
}
