//! Decorator composition scenarios, driven through the node API.

use std::sync::Arc;

use async_trait::async_trait;
use stratafs_core::{
    CompositeFs, DirPage, FileSystem, FileSystemExt, GlobFilterFs, MemoryFs, NodeKind, NullFs,
    PatternSet, PrefixFs, Properties, ReadOnlyFs, ReadStream, SubRootFs, VfsError, VfsResult,
    WriteStream,
};
use tokio_util::sync::CancellationToken;

fn token() -> CancellationToken {
    CancellationToken::new()
}

async fn memory_with(paths: &[(&str, &str)]) -> Arc<MemoryFs> {
    let mem = MemoryFs::new();
    for (path, data) in paths {
        mem.write(path, data.as_bytes(), true, &token())
            .await
            .unwrap();
    }
    Arc::new(mem)
}

#[tokio::test]
async fn prefix_mount_scenario() {
    // Mount a backend under /public/assets; the caller-visible path
    // space must show the whole chain of ancestors.
    let assets = memory_with(&[("/hello.txt", "hello")]).await;
    let fs: Arc<dyn FileSystem> =
        Arc::new(PrefixFs::new(assets, "/public/assets").unwrap());

    let file = fs.get_file("/public/assets/hello.txt").unwrap();
    assert!(file.exists(&token()).await.unwrap());
    assert_eq!(file.read_to_vec(&token()).await.unwrap(), b"hello");

    // /public exists artificially and enumerates exactly the mount.
    let public = fs.get_directory("/public").unwrap();
    assert!(public.exists(&token()).await.unwrap());
    let children = public.children(&token()).collect().await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].full_name(), "/public/assets");
    assert_eq!(children[0].kind(), NodeKind::Directory);
}

#[tokio::test]
async fn recursive_walk_discovers_a_mounted_subtree() {
    let assets = memory_with(&[("/hello.txt", "hello"), ("/img/logo.png", "png")]).await;
    let fs: Arc<dyn FileSystem> =
        Arc::new(PrefixFs::new(assets, "/public/assets").unwrap());

    let root = fs.get_directory("/").unwrap();
    let walk = root.walk_files(PatternSet::empty(), PatternSet::empty(), &token());
    let mut paths: Vec<String> = walk
        .collect()
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.full_name().to_owned())
        .collect();
    paths.sort();
    assert_eq!(
        paths,
        ["/public/assets/hello.txt", "/public/assets/img/logo.png"]
    );
}

#[tokio::test]
async fn node_paths_stay_in_the_caller_space_across_layers() {
    // Prefix over sub-root: the node's full name is the outermost
    // spelling regardless of the rewrites underneath.
    let mem = memory_with(&[("/data/project/src/main.rs", "fn main() {}")]).await;
    let subroot: Arc<dyn FileSystem> =
        Arc::new(SubRootFs::new(mem, "/data/project").unwrap());
    let fs: Arc<dyn FileSystem> = Arc::new(PrefixFs::new(subroot, "/mnt").unwrap());

    let dir = fs.get_directory("/mnt/src").unwrap();
    let children = dir.children(&token()).collect().await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].full_name(), "/mnt/src/main.rs");
    assert_eq!(
        children[0].as_file().unwrap().read_to_vec(&token()).await.unwrap(),
        b"fn main() {}"
    );
}

/// Inner filesystem that panics if any mutation reaches it.
struct MutationTrap {
    inner: Arc<MemoryFs>,
}

#[async_trait]
impl FileSystem for MutationTrap {
    async fn properties(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> VfsResult<Option<Properties>> {
        self.inner.properties(path, cancel).await
    }

    async fn open_read(&self, path: &str, cancel: &CancellationToken) -> VfsResult<ReadStream> {
        self.inner.open_read(path, cancel).await
    }

    async fn open_write(&self, _path: &str, _cancel: &CancellationToken) -> VfsResult<WriteStream> {
        panic!("open_write reached the inner filesystem");
    }

    async fn write(
        &self,
        _path: &str,
        _data: &[u8],
        _overwrite: bool,
        _cancel: &CancellationToken,
    ) -> VfsResult<()> {
        panic!("write reached the inner filesystem");
    }

    async fn delete(&self, _path: &str, _cancel: &CancellationToken) -> VfsResult<()> {
        panic!("delete reached the inner filesystem");
    }

    async fn create_dir(&self, _path: &str, _cancel: &CancellationToken) -> VfsResult<()> {
        panic!("create_dir reached the inner filesystem");
    }

    async fn read_dir(
        &self,
        path: &str,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> VfsResult<DirPage> {
        self.inner.read_dir(path, cursor, cancel).await
    }
}

#[tokio::test]
async fn read_only_rejects_before_the_inner_filesystem_sees_anything() {
    let inner = memory_with(&[("/f.txt", "frozen")]).await;
    let fs: Arc<dyn FileSystem> =
        Arc::new(ReadOnlyFs::new(Arc::new(MutationTrap { inner })));

    let file = fs.get_file("/f.txt").unwrap();
    assert!(matches!(
        file.open_write(&token()).await,
        Err(VfsError::ReadOnly)
    ));
    assert!(matches!(
        file.write(b"x", true, &token()).await,
        Err(VfsError::ReadOnly)
    ));
    assert!(matches!(file.delete(&token()).await, Err(VfsError::ReadOnly)));

    let dir = fs.get_directory("/d").unwrap();
    assert!(matches!(dir.create(&token()).await, Err(VfsError::ReadOnly)));
    assert!(matches!(dir.delete(&token()).await, Err(VfsError::ReadOnly)));

    // Reads keep working.
    assert_eq!(file.read_to_vec(&token()).await.unwrap(), b"frozen");
}

#[tokio::test]
async fn composite_first_match_through_nodes() {
    let first = memory_with(&[("/x", "first wins")]).await;
    let second = memory_with(&[("/x", "second loses"), ("/y2", "only here")]).await;
    let fs: Arc<dyn FileSystem> = Arc::new(CompositeFs::new(vec![first, second]));

    let x = fs.get_file("/x").unwrap();
    assert_eq!(x.read_to_vec(&token()).await.unwrap(), b"first wins");

    let y2 = fs.get_file("/y2").unwrap();
    assert_eq!(y2.read_to_vec(&token()).await.unwrap(), b"only here");

    // Missing everywhere: a not-found placeholder, not an error.
    let y = fs.get_file("/y").unwrap();
    assert!(!y.exists(&token()).await.unwrap());
}

#[tokio::test]
async fn flatten_keeps_composition_associative() -> anyhow::Result<()> {
    let a = memory_with(&[("/from-a", "a")]).await;
    let b = memory_with(&[("/from-b", "b")]).await;
    let c = memory_with(&[("/from-c", "c")]).await;

    let nested: Arc<dyn FileSystem> = Arc::new(CompositeFs::new(vec![
        Arc::new(CompositeFs::new(vec![
            a as Arc<dyn FileSystem>,
            Arc::new(NullFs),
            b,
        ])),
        Arc::new(CompositeFs::new(vec![c])),
    ]));
    let flat = CompositeFs::flatten(vec![nested])?;

    let composite = flat.as_composite().ok_or_else(|| anyhow::anyhow!("expected composite"))?;
    assert_eq!(composite.members().len(), 3);

    for path in ["/from-a", "/from-b", "/from-c"] {
        assert!(flat.exists(path, &token()).await?, "{path} should resolve");
    }
    Ok(())
}

#[tokio::test]
async fn glob_filter_over_a_prefix_mount() {
    let mem = memory_with(&[
        ("/src/lib.rs", "lib"),
        ("/src/notes.txt", "notes"),
        ("/target/out.bin", "bin"),
    ])
    .await;
    let mounted: Arc<dyn FileSystem> = Arc::new(PrefixFs::new(mem, "/code").unwrap());
    let fs: Arc<dyn FileSystem> = Arc::new(
        GlobFilterFs::new(mounted, vec!["**/*.rs"], vec!["**/target"]).unwrap(),
    );

    assert!(fs.get_file("/code/src/lib.rs").unwrap().exists(&token()).await.unwrap());
    assert!(!fs
        .get_file("/code/src/notes.txt")
        .unwrap()
        .exists(&token())
        .await
        .unwrap());
    assert!(!fs
        .get_file("/code/target/out.bin")
        .unwrap()
        .exists(&token())
        .await
        .unwrap());

    let src = fs.get_directory("/code/src").unwrap();
    let names: Vec<String> = src
        .children(&token())
        .collect()
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.name().to_owned())
        .collect();
    assert_eq!(names, ["lib.rs"]);
}

#[tokio::test]
async fn caller_paths_are_resolved_before_any_layer_sees_them() {
    let mem = memory_with(&[("/a/b.txt", "payload")]).await;
    let fs: Arc<dyn FileSystem> = Arc::new(PrefixFs::new(mem, "/mnt").unwrap());

    let file = fs.get_file("/mnt/a/../a/./b.txt").unwrap();
    assert_eq!(file.full_name(), "/mnt/a/b.txt");
    assert_eq!(file.read_to_vec(&token()).await.unwrap(), b"payload");

    assert!(matches!(
        fs.get_file("/mnt/../../oops"),
        Err(VfsError::InvalidPath(_))
    ));
}

#[tokio::test]
async fn null_filesystem_is_an_inert_terminal() {
    let fs: Arc<dyn FileSystem> = Arc::new(NullFs);
    let file = fs.get_file("/anything").unwrap();
    assert!(!file.exists(&token()).await.unwrap());

    let root = fs.get_directory("/").unwrap();
    assert!(root.children(&token()).collect().await.unwrap().is_empty());
}
