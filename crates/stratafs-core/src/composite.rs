//! Ordered multi-filesystem composition.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{VfsError, VfsResult};
use crate::null::NullFs;
use crate::traits::{DirPage, FileSystem, Properties, ReadStream, WriteStream};

/// Unions an ordered list of filesystems under one path space.
///
/// Reads probe members in order and the first filesystem that has the
/// path wins; directory listings union children across all members,
/// deduplicated by name with the earliest member winning. Mutations are
/// directed at the first member, except delete, which fans out so a
/// union delete actually removes visibility everywhere.
pub struct CompositeFs {
    members: Vec<Arc<dyn FileSystem>>,
}

impl CompositeFs {
    /// Compose `members` in precedence order, without flattening.
    pub fn new(members: Vec<Arc<dyn FileSystem>>) -> Self {
        Self { members }
    }

    /// The member list, in precedence order.
    pub fn members(&self) -> &[Arc<dyn FileSystem>] {
        &self.members
    }

    /// Flatten `members` into a single filesystem.
    ///
    /// Nested composites are inlined in place, preserving member order;
    /// null filesystems are dropped. The result is a bare member when
    /// exactly one remains, a [`NullFs`] when none do, and a flat
    /// composite otherwise. A composite encountered twice during
    /// expansion means the tree re-enters itself and is refused; with
    /// immutably built members a genuine cycle cannot even be
    /// constructed, so the reappearance check is the whole guard.
    ///
    /// Uses an explicit work list rather than call recursion, so
    /// adversarially deep nesting cannot overflow the stack.
    pub fn flatten(members: Vec<Arc<dyn FileSystem>>) -> VfsResult<Arc<dyn FileSystem>> {
        let mut flat: Vec<Arc<dyn FileSystem>> = Vec::new();
        let mut expanded: HashSet<usize> = HashSet::new();
        let mut work: Vec<Arc<dyn FileSystem>> = members;
        work.reverse();

        while let Some(fs) = work.pop() {
            if fs.is_null() {
                continue;
            }
            if let Some(composite) = fs.as_composite() {
                let key = Arc::as_ptr(&fs) as *const () as usize;
                if !expanded.insert(key) {
                    return Err(VfsError::CyclicComposite);
                }
                for member in composite.members.iter().rev() {
                    work.push(Arc::clone(member));
                }
                continue;
            }
            flat.push(fs);
        }

        tracing::debug!(members = flat.len(), "flattened composite filesystem");
        match flat.len() {
            0 => Ok(Arc::new(NullFs)),
            1 => Ok(flat.swap_remove(0)),
            _ => Ok(Arc::new(CompositeFs { members: flat })),
        }
    }

    /// The first member that reports `path` existing, if any.
    async fn find(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> VfsResult<Option<&Arc<dyn FileSystem>>> {
        for member in &self.members {
            if member.exists(path, cancel).await? {
                return Ok(Some(member));
            }
        }
        Ok(None)
    }

    fn primary(&self, path: &str) -> VfsResult<&Arc<dyn FileSystem>> {
        self.members.first().ok_or_else(|| VfsError::PathMapping {
            path: path.to_owned(),
        })
    }
}

#[async_trait]
impl FileSystem for CompositeFs {
    async fn properties(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> VfsResult<Option<Properties>> {
        for member in &self.members {
            if let Some(props) = member.properties(path, cancel).await? {
                if props.exists() {
                    return Ok(Some(props));
                }
            }
        }
        Ok(Some(Properties::UNAVAILABLE))
    }

    async fn open_read(&self, path: &str, cancel: &CancellationToken) -> VfsResult<ReadStream> {
        match self.find(path, cancel).await? {
            Some(member) => member.open_read(path, cancel).await,
            None => Err(VfsError::not_found(path)),
        }
    }

    async fn open_write(&self, path: &str, cancel: &CancellationToken) -> VfsResult<WriteStream> {
        self.primary(path)?.open_write(path, cancel).await
    }

    async fn write(
        &self,
        path: &str,
        data: &[u8],
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> VfsResult<()> {
        self.primary(path)?.write(path, data, overwrite, cancel).await
    }

    async fn delete(&self, path: &str, cancel: &CancellationToken) -> VfsResult<()> {
        for member in &self.members {
            member.delete(path, cancel).await?;
        }
        Ok(())
    }

    async fn create_dir(&self, path: &str, cancel: &CancellationToken) -> VfsResult<()> {
        self.primary(path)?.create_dir(path, cancel).await
    }

    async fn read_dir(
        &self,
        path: &str,
        _cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> VfsResult<DirPage> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut entries = Vec::new();
        for member in &self.members {
            let mut cursor: Option<String> = None;
            loop {
                if cancel.is_cancelled() {
                    return Err(VfsError::Cancelled);
                }
                let page = member.read_dir(path, cursor.as_deref(), cancel).await?;
                for entry in page.entries {
                    if seen.insert(entry.name.clone()) {
                        entries.push(entry);
                    }
                }
                match page.next {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }
        Ok(DirPage::last(entries))
    }

    fn read_only(&self) -> bool {
        self.members.iter().all(|m| m.read_only())
    }

    fn as_composite(&self) -> Option<&CompositeFs> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFs;
    use crate::readonly::ReadOnlyFs;
    use tokio::io::AsyncReadExt;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    async fn mem_with(paths: &[(&str, &str)]) -> Arc<dyn FileSystem> {
        let mem = MemoryFs::new();
        for (path, data) in paths {
            mem.write(path, data.as_bytes(), true, &token())
                .await
                .unwrap();
        }
        Arc::new(mem)
    }

    #[tokio::test]
    async fn first_member_wins_for_shared_paths() {
        let first = mem_with(&[("/x", "from first")]).await;
        let second = mem_with(&[("/x", "from second"), ("/only-second", "s")]).await;
        let fs = CompositeFs::new(vec![first, second]);

        let mut reader = fs.open_read("/x", &token()).await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"from first");

        // Paths only in a later member still resolve.
        assert!(fs.exists("/only-second", &token()).await.unwrap());
    }

    #[tokio::test]
    async fn misses_resolve_to_not_found() {
        let fs = CompositeFs::new(vec![
            mem_with(&[("/a", "a")]).await,
            mem_with(&[("/b", "b")]).await,
        ]);
        let props = fs.properties("/y", &token()).await.unwrap().unwrap();
        assert!(!props.exists());
        assert!(matches!(
            fs.open_read("/y", &token()).await,
            Err(VfsError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn listings_union_with_first_member_precedence() {
        let first = mem_with(&[("/shared.txt", "1"), ("/a.txt", "a")]).await;
        let second = mem_with(&[("/shared.txt", "2"), ("/b.txt", "b")]).await;
        let fs = CompositeFs::new(vec![first, second]);

        let page = fs.read_dir("/", None, &token()).await.unwrap();
        let names: Vec<_> = page.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "shared.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn writes_go_to_the_first_member() {
        let first = Arc::new(MemoryFs::new());
        let second = Arc::new(MemoryFs::new());
        let fs = CompositeFs::new(vec![
            Arc::clone(&first) as Arc<dyn FileSystem>,
            Arc::clone(&second) as Arc<dyn FileSystem>,
        ]);

        fs.write("/w", b"data", true, &token()).await.unwrap();
        assert!(first.exists("/w", &token()).await.unwrap());
        assert!(!second.exists("/w", &token()).await.unwrap());
    }

    #[tokio::test]
    async fn delete_fans_out_to_every_member() {
        let first = Arc::new(MemoryFs::new());
        let second = Arc::new(MemoryFs::new());
        first.write("/x", b"1", true, &token()).await.unwrap();
        second.write("/x", b"2", true, &token()).await.unwrap();
        let fs = CompositeFs::new(vec![
            Arc::clone(&first) as Arc<dyn FileSystem>,
            Arc::clone(&second) as Arc<dyn FileSystem>,
        ]);

        fs.delete("/x", &token()).await.unwrap();
        assert!(!fs.exists("/x", &token()).await.unwrap());
        assert!(!first.exists("/x", &token()).await.unwrap());
        assert!(!second.exists("/x", &token()).await.unwrap());
    }

    #[tokio::test]
    async fn flatten_inlines_nested_composites_in_order() {
        let a = mem_with(&[("/a", "a")]).await;
        let b = mem_with(&[("/b", "b")]).await;
        let c = mem_with(&[("/c", "c")]).await;

        let nested: Arc<dyn FileSystem> = Arc::new(CompositeFs::new(vec![
            Arc::new(CompositeFs::new(vec![Arc::clone(&a), Arc::clone(&b)])),
            Arc::new(CompositeFs::new(vec![Arc::clone(&c)])),
        ]));

        let flat = CompositeFs::flatten(vec![nested]).unwrap();
        let composite = flat.as_composite().unwrap();
        assert_eq!(composite.members().len(), 3);
        assert!(Arc::ptr_eq(&composite.members()[0], &a));
        assert!(Arc::ptr_eq(&composite.members()[1], &b));
        assert!(Arc::ptr_eq(&composite.members()[2], &c));
    }

    #[tokio::test]
    async fn flatten_drops_nulls_and_collapses_singletons() {
        let a = mem_with(&[("/a", "a")]).await;

        let flat =
            CompositeFs::flatten(vec![Arc::new(NullFs), Arc::clone(&a), Arc::new(NullFs)])
                .unwrap();
        assert!(flat.as_composite().is_none());
        assert!(Arc::ptr_eq(&flat, &a));

        let empty = CompositeFs::flatten(vec![Arc::new(NullFs)]).unwrap();
        assert!(empty.is_null());
    }

    #[tokio::test]
    async fn flatten_refuses_a_repeated_composite() {
        let a = mem_with(&[("/a", "a")]).await;
        let inner: Arc<dyn FileSystem> = Arc::new(CompositeFs::new(vec![a]));

        let result = CompositeFs::flatten(vec![Arc::clone(&inner), inner]);
        assert!(matches!(result, Err(VfsError::CyclicComposite)));
    }

    #[tokio::test]
    async fn read_only_only_when_all_members_are() {
        let writable = mem_with(&[]).await;
        let frozen: Arc<dyn FileSystem> =
            Arc::new(ReadOnlyFs::new(mem_with(&[("/r", "r")]).await));

        assert!(!CompositeFs::new(vec![Arc::clone(&writable), Arc::clone(&frozen)]).read_only());
        assert!(CompositeFs::new(vec![frozen]).read_only());
    }
}
