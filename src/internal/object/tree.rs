//! In Git, a tree object represents one directory snapshot. Its content is a
//! sequence of records, one per entry:
//!
//! ```text
//! <octal mode> SP <name> NUL <20-byte object id>
//! ```
//!
//! Entries point either at blobs (files, symlinks), at other trees
//! (subdirectories) or at commits (submodules, usually absent from the local
//! store). A decoded [`Tree`] keeps its entries in a map keyed by name, so
//! iteration order carries no meaning; it also keeps a handle on the store so
//! that child entries can be resolved lazily, either by path through
//! [`Tree::file`] or all at once through the [`Tree::files`] walk.
use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt::{self, Display},
    io::BufRead,
    sync::{
        Arc,
        mpsc::{self, Receiver, SyncSender},
    },
    thread,
};

use bstr::{BStr, BString, ByteSlice, ByteVec};

use crate::{
    config::TraversalConfig,
    errors::GitError,
    hash::ObjectHash,
    internal::object::{
        RawObject,
        blob::{Blob, File},
        store::ObjectStore,
        types::ObjectType,
    },
};

/// Kind of a tree entry, derived from the type bits of its octal mode.
///
/// Only the modes git itself writes are produced on encode; on decode any
/// regular-file mode is accepted and classified by its execute bits, so
/// legacy modes such as `100664` read as [`TreeItemMode::Blob`].
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum TreeItemMode {
    Blob,
    BlobExecutable,
    Tree,
    Commit,
    Link,
}

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;
const S_IFLNK: u32 = 0o120000;
const S_IFGITLINK: u32 = 0o160000;

impl TreeItemMode {
    /// Parse the ASCII octal mode of a tree record.
    pub fn from_octal(mode: &[u8]) -> Result<TreeItemMode, GitError> {
        let invalid = || GitError::InvalidTreeItem(format!("mode `{}`", mode.as_bstr()));
        let text = std::str::from_utf8(mode).map_err(|_| invalid())?;
        let bits = u32::from_str_radix(text, 8).map_err(|_| invalid())?;

        match bits & S_IFMT {
            S_IFDIR => Ok(TreeItemMode::Tree),
            S_IFLNK => Ok(TreeItemMode::Link),
            S_IFGITLINK => Ok(TreeItemMode::Commit),
            S_IFREG if bits & 0o111 != 0 => Ok(TreeItemMode::BlobExecutable),
            S_IFREG => Ok(TreeItemMode::Blob),
            _ => Err(invalid()),
        }
    }

    /// Canonical octal spelling as written in tree objects.
    pub fn to_bytes(self) -> &'static [u8] {
        match self {
            TreeItemMode::Blob => b"100644",
            TreeItemMode::BlobExecutable => b"100755",
            TreeItemMode::Link => b"120000",
            TreeItemMode::Tree => b"40000",
            TreeItemMode::Commit => b"160000",
        }
    }

    pub fn is_tree(self) -> bool {
        self == TreeItemMode::Tree
    }
}

impl Display for TreeItemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let print = match *self {
            TreeItemMode::Blob => "blob",
            TreeItemMode::BlobExecutable => "blob executable",
            TreeItemMode::Link => "link",
            TreeItemMode::Tree => "tree",
            TreeItemMode::Commit => "commit",
        };
        write!(f, "{print}")
    }
}

/// One entry of a tree: `{name, mode, id}`.
#[derive(PartialEq, Eq, Debug, Clone, Hash)]
pub struct TreeItem {
    pub mode: TreeItemMode,
    pub id: ObjectHash,
    /// Raw name bytes; git does not require them to be UTF-8.
    pub name: BString,
}

impl Display for TreeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.mode, self.name, self.id)
    }
}

impl TreeItem {
    pub fn new(mode: TreeItemMode, id: ObjectHash, name: impl Into<BString>) -> Self {
        TreeItem {
            mode,
            id,
            name: name.into(),
        }
    }

    /// Serialize as a single tree record.
    pub fn to_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.name.len() + 28);
        data.extend_from_slice(self.mode.to_bytes());
        data.push(b' ');
        data.extend_from_slice(&self.name);
        data.push(b'\0');
        data.extend_from_slice(self.id.as_ref());
        data
    }
}

/// Git orders tree records by name, comparing directories as if their name
/// ended with `/`.
fn git_entry_order(a: &TreeItem, b: &TreeItem) -> Ordering {
    let key = |item: &TreeItem| {
        let mut k = item.name.to_vec();
        if item.mode.is_tree() {
            k.push(b'/');
        }
        k
    };
    key(a).cmp(&key(b))
}

/// A decoded directory snapshot.
#[derive(Clone)]
pub struct Tree {
    pub id: ObjectHash,
    /// Entries keyed by name; iteration order is unspecified.
    pub entries: HashMap<BString, TreeItem>,
    store: Arc<dyn ObjectStore>,
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("id", &self.id)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Tree: {}", self.id)?;
        for item in self.entries.values() {
            writeln!(f, "{item}")?;
        }
        Ok(())
    }
}

impl Tree {
    /// Decode a tree object.
    ///
    /// A zero-size object is an empty tree. The stream may only end between
    /// records; a record cut short anywhere is an error.
    pub fn decode(object: &RawObject, store: Arc<dyn ObjectStore>) -> Result<Tree, GitError> {
        if object.object_type() != ObjectType::Tree {
            return Err(GitError::InvalidObjectType(object.object_type().to_string()));
        }

        let mut tree = Tree {
            id: object.hash(),
            entries: HashMap::new(),
            store,
        };
        if object.size() == 0 {
            return Ok(tree);
        }

        let mut reader = object.reader();
        loop {
            let mut mode = Vec::new();
            if reader.read_until(b' ', &mut mode)? == 0 {
                break;
            }
            if mode.last() != Some(&b' ') {
                return Err(GitError::InvalidTreeItem(format!(
                    "record truncated after mode `{}`",
                    mode.as_bstr()
                )));
            }
            mode.pop();
            let mode = TreeItemMode::from_octal(&mode)?;

            let mut name = Vec::new();
            reader.read_until(b'\0', &mut name)?;
            if name.last() != Some(&b'\0') {
                return Err(GitError::InvalidTreeItem(format!(
                    "record truncated in name `{}`",
                    name.as_bstr()
                )));
            }
            name.pop();
            let name = BString::from(name);

            let id = ObjectHash::from_stream(&mut reader).map_err(|_| {
                GitError::InvalidTreeItem(format!("record truncated in id of `{name}`"))
            })?;

            tree.entries.insert(name.clone(), TreeItem::new(mode, id, name));
        }

        Ok(tree)
    }

    /// Load and decode the tree stored under `id`.
    pub fn from_store(store: Arc<dyn ObjectStore>, id: &ObjectHash) -> Result<Tree, GitError> {
        let object = store
            .get(id)
            .ok_or_else(|| GitError::ObjectNotFound(id.to_string()))?;
        Tree::decode(&object, store)
    }

    /// Serialize items as tree content, in git's canonical entry order.
    pub fn encode_items(mut items: Vec<TreeItem>) -> Vec<u8> {
        items.sort_by(git_entry_order);
        items.iter().flat_map(TreeItem::to_data).collect()
    }

    pub fn to_data(&self) -> Vec<u8> {
        Tree::encode_items(self.entries.values().cloned().collect())
    }

    pub fn entry(&self, name: impl AsRef<[u8]>) -> Option<&TreeItem> {
        self.entries.get(BStr::new(name.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a `/`-separated path to the blob it names.
    ///
    /// Every way the path can fail to name a blob reports
    /// [`GitError::FileNotFound`]: a missing entry, an id absent from the
    /// store (submodule), a file used as a directory, or a directory used as
    /// a file. Only a corrupt intermediate tree surfaces its decode error.
    pub fn file(&self, path: impl AsRef<[u8]>) -> Result<File, GitError> {
        let path = path.as_ref();
        let not_found = || GitError::FileNotFound(path.to_str_lossy().into_owned());

        let mut parts: Vec<&[u8]> = path.split_str("/").collect();
        let base_name = parts.pop().ok_or_else(not_found)?;

        let mut current: Option<Tree> = None;
        for part in parts {
            let next = current
                .as_ref()
                .unwrap_or(self)
                .dir(part)?
                .ok_or_else(not_found)?;
            current = Some(next);
        }

        let tree = current.as_ref().unwrap_or(self);
        let item = tree.entry(base_name).ok_or_else(not_found)?;
        let object = tree.store.get(&item.id).ok_or_else(not_found)?;
        if object.object_type() != ObjectType::Blob {
            return Err(not_found());
        }

        let blob = Blob::from_object(&object)?;
        Ok(File::new(BString::from(path), &blob))
    }

    /// Subtree named `name`, or `None` when the entry is missing, has no
    /// object in the store, or is not a tree.
    fn dir(&self, name: &[u8]) -> Result<Option<Tree>, GitError> {
        let Some(item) = self.entry(name) else {
            return Ok(None);
        };
        let Some(object) = self.store.get(&item.id) else {
            return Ok(None);
        };
        if object.object_type() != ObjectType::Tree {
            return Ok(None);
        }
        Tree::decode(&object, self.store.clone()).map(Some)
    }

    /// Walk every blob reachable from this tree.
    ///
    /// See [`Tree::files_with_config`].
    pub fn files(&self) -> Files {
        self.files_with_config(&TraversalConfig::default())
    }

    /// Walk every blob reachable from this tree on a background thread.
    ///
    /// Results are handed over through a channel bounded by
    /// `config.channel_capacity`; the sequence ends when the producer closes
    /// it. Entries whose id is missing from the store are skipped. A subtree
    /// that fails to decode yields one `Err` item and is not descended into.
    /// Dropping the returned [`Files`] stops the producer at its next entry.
    pub fn files_with_config(&self, config: &TraversalConfig) -> Files {
        let (sender, receiver) = mpsc::sync_channel(config.channel_capacity);
        let tree = self.clone();
        thread::spawn(move || {
            if !walk_entries(&tree, BStr::new(""), &sender) {
                tracing::debug!("file walk of tree {} abandoned by consumer", tree.id);
            }
        });
        Files { receiver }
    }
}

/// Returns `false` once the consumer has gone away.
fn walk_entries(tree: &Tree, base: &BStr, sender: &SyncSender<Result<File, GitError>>) -> bool {
    for item in tree.entries.values() {
        let Some(object) = tree.store.get(&item.id) else {
            continue; // submodule
        };

        let mut path = BString::from(base.to_vec());
        if !path.is_empty() {
            path.push_byte(b'/');
        }
        path.push_str(&item.name);

        let message = match object.object_type() {
            ObjectType::Tree => match Tree::decode(&object, tree.store.clone()) {
                Ok(subtree) => {
                    if !walk_entries(&subtree, path.as_bstr(), sender) {
                        return false;
                    }
                    continue;
                }
                Err(e) => {
                    tracing::warn!("failed to decode tree `{path}` ({}): {e}", item.id);
                    Err(e)
                }
            },
            ObjectType::Blob => Blob::from_object(&object).map(|blob| File::new(path, &blob)),
            other => {
                tracing::debug!("skipping {other} entry `{path}`");
                continue;
            }
        };

        if sender.send(message).is_err() {
            return false;
        }
    }
    true
}

/// Forward-only sequence of files produced by [`Tree::files`].
///
/// Ends (returns `None`) when the producer has finished and closed the
/// channel; it cannot be restarted.
pub struct Files {
    receiver: Receiver<Result<File, GitError>>,
}

impl Iterator for Files {
    type Item = Result<File, GitError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

/// Decodes trees on demand from a feed of tree objects.
///
/// `None` marks the end of the feed; a decode failure is `Some(Err(_))`.
pub struct TreeIter<I> {
    feed: I,
    store: Arc<dyn ObjectStore>,
}

impl<I> TreeIter<I>
where
    I: Iterator<Item = RawObject>,
{
    pub fn new(feed: impl IntoIterator<IntoIter = I>, store: Arc<dyn ObjectStore>) -> Self {
        TreeIter {
            feed: feed.into_iter(),
            store,
        }
    }
}

impl<I> Iterator for TreeIter<I>
where
    I: Iterator<Item = RawObject>,
{
    type Item = Result<Tree, GitError>;

    fn next(&mut self) -> Option<Self::Item> {
        let object = self.feed.next()?;
        Some(Tree::decode(&object, self.store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, io::Read};

    use bytes::Bytes;
    use quickcheck::{TestResult, quickcheck};

    use super::*;
    use crate::internal::object::store::MemoryStore;

    /// Store layout used by most tests:
    ///
    /// ```text
    /// README            blob "readme"
    /// run.sh            blob (executable)
    /// src/main.rs       blob "fn main() {}"
    /// src/lib/mod.rs    blob "mod"
    /// vendor            commit id with no object (submodule)
    /// ```
    fn fixture() -> (Arc<MemoryStore>, Tree) {
        let store = Arc::new(MemoryStore::new());
        let readme = store.insert(ObjectType::Blob, "readme");
        let run = store.insert(ObjectType::Blob, "#!/bin/sh\n");
        let main = store.insert(ObjectType::Blob, "fn main() {}");
        let module = store.insert(ObjectType::Blob, "mod");

        let lib = store.insert_tree(vec![TreeItem::new(
            TreeItemMode::Blob,
            module,
            "mod.rs".to_string(),
        )]);
        let src = store.insert_tree(vec![
            TreeItem::new(TreeItemMode::Blob, main, "main.rs".to_string()),
            TreeItem::new(TreeItemMode::Tree, lib, "lib".to_string()),
        ]);
        let root = store.insert_tree(vec![
            TreeItem::new(TreeItemMode::Blob, readme, "README".to_string()),
            TreeItem::new(TreeItemMode::BlobExecutable, run, "run.sh".to_string()),
            TreeItem::new(TreeItemMode::Tree, src, "src".to_string()),
            TreeItem::new(
                TreeItemMode::Commit,
                ObjectHash::new(b"submodule commit"),
                "vendor".to_string(),
            ),
        ]);

        let tree = Tree::from_store(store.clone(), &root).unwrap();
        (store, tree)
    }

    fn decode_bytes(data: &'static [u8]) -> Result<Tree, GitError> {
        let object = RawObject::new(
            ObjectType::Tree,
            ObjectHash::new(data),
            Bytes::from_static(data),
        );
        Tree::decode(&object, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_mode_from_octal() {
        assert_eq!(
            TreeItemMode::from_octal(b"100644").unwrap(),
            TreeItemMode::Blob
        );
        assert_eq!(
            TreeItemMode::from_octal(b"100755").unwrap(),
            TreeItemMode::BlobExecutable
        );
        assert_eq!(
            TreeItemMode::from_octal(b"100664").unwrap(),
            TreeItemMode::Blob
        );
        assert_eq!(
            TreeItemMode::from_octal(b"40000").unwrap(),
            TreeItemMode::Tree
        );
        assert_eq!(
            TreeItemMode::from_octal(b"040000").unwrap(),
            TreeItemMode::Tree
        );
        assert_eq!(
            TreeItemMode::from_octal(b"120000").unwrap(),
            TreeItemMode::Link
        );
        assert_eq!(
            TreeItemMode::from_octal(b"160000").unwrap(),
            TreeItemMode::Commit
        );
        assert!(TreeItemMode::from_octal(b"").is_err());
        assert!(TreeItemMode::from_octal(b"100689").is_err());
        assert!(TreeItemMode::from_octal(b"10").is_err());
    }

    #[test]
    fn test_zero_size_tree_is_empty() {
        let tree = decode_bytes(b"").unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.files().count(), 0);
    }

    #[test]
    fn test_decode_single_record() {
        let id = ObjectHash::new(b"x");
        let data = TreeItem::new(TreeItemMode::Blob, id, "a b.txt".to_string()).to_data();
        let object = RawObject::from_content(ObjectType::Tree, data);
        let tree = Tree::decode(&object, Arc::new(MemoryStore::new())).unwrap();

        assert_eq!(tree.id, object.hash());
        let item = tree.entry("a b.txt").unwrap();
        assert_eq!(item.id, id);
        assert_eq!(item.mode, TreeItemMode::Blob);
    }

    #[test]
    fn test_decode_keeps_non_utf8_names() {
        let id = ObjectHash::new(b"latin-1");
        let mut data = b"100644 caf\xe9.txt\0".to_vec();
        data.extend_from_slice(&id.0);
        let object = RawObject::from_content(ObjectType::Tree, data.clone());
        let tree = Tree::decode(&object, Arc::new(MemoryStore::new())).unwrap();

        let item = tree.entry(b"caf\xe9.txt").unwrap();
        assert_eq!(item.name, BStr::new(b"caf\xe9.txt"));
        assert_eq!(item.id, id);
        assert_eq!(tree.to_data(), data);
    }

    #[test]
    fn test_walk_non_utf8_path() {
        let store = Arc::new(MemoryStore::new());
        let blob = store.insert(ObjectType::Blob, "bonjour");
        let dir = store.insert_tree(vec![TreeItem::new(
            TreeItemMode::Blob,
            blob,
            &b"caf\xe9.txt"[..],
        )]);
        let root = store.insert_tree(vec![TreeItem::new(TreeItemMode::Tree, dir, "fr")]);
        let tree = Tree::from_store(store, &root).unwrap();

        let file = tree.file(b"fr/caf\xe9.txt").unwrap();
        assert_eq!(file.contents(), Bytes::from_static(b"bonjour"));

        let walked: Vec<BString> = tree.files().map(|f| f.unwrap().name).collect();
        assert_eq!(walked, [BString::from(&b"fr/caf\xe9.txt"[..])]);
    }

    #[test]
    fn test_decode_truncated_records() {
        // mode only
        assert!(matches!(
            decode_bytes(b"100644"),
            Err(GitError::InvalidTreeItem(_))
        ));
        // name without terminator
        assert!(matches!(
            decode_bytes(b"100644 file"),
            Err(GitError::InvalidTreeItem(_))
        ));
        // id cut short
        assert!(matches!(
            decode_bytes(b"100644 file\0\x01\x02\x03"),
            Err(GitError::InvalidTreeItem(_))
        ));
    }

    #[test]
    fn test_decode_rejects_non_tree_object() {
        let object = RawObject::from_content(ObjectType::Blob, "data");
        assert!(matches!(
            Tree::decode(&object, Arc::new(MemoryStore::new())),
            Err(GitError::InvalidObjectType(_))
        ));
    }

    #[test]
    fn test_encode_uses_git_order() {
        // "a.txt" < "a/" < "a0" in byte order
        let id = ObjectHash::new(b"x");
        let data = Tree::encode_items(vec![
            TreeItem::new(TreeItemMode::Blob, id, "a0".to_string()),
            TreeItem::new(TreeItemMode::Tree, id, "a".to_string()),
            TreeItem::new(TreeItemMode::Blob, id, "a.txt".to_string()),
        ]);
        let a_txt = data.find(b"a.txt").unwrap();
        let a_dir = data.find(b"40000 a\0").unwrap();
        let a0 = data.find(b"a0").unwrap();
        assert!(a_txt < a_dir && a_dir < a0);
    }

    #[test]
    fn test_encode_matches_git_empty_tree() {
        let store = MemoryStore::new();
        let id = store.insert_tree(vec![]);
        assert_eq!(id.to_string(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn test_encode_decode_preserves_entries() {
        fn prop(input: HashMap<String, (u8, Vec<u8>)>) -> TestResult {
            if input.keys().any(|name| name.is_empty() || name.contains('\0')) {
                return TestResult::discard();
            }
            let modes = [
                TreeItemMode::Blob,
                TreeItemMode::BlobExecutable,
                TreeItemMode::Tree,
                TreeItemMode::Commit,
                TreeItemMode::Link,
            ];
            let items: Vec<TreeItem> = input
                .iter()
                .map(|(name, (mode, seed))| {
                    TreeItem::new(
                        modes[*mode as usize % modes.len()],
                        ObjectHash::new(seed),
                        name.clone(),
                    )
                })
                .collect();

            let data = Tree::encode_items(items.clone());
            let object = RawObject::from_content(ObjectType::Tree, data);
            let tree = match Tree::decode(&object, Arc::new(MemoryStore::new())) {
                Ok(tree) => tree,
                Err(_) => return TestResult::failed(),
            };

            let expected: HashMap<BString, TreeItem> = items
                .into_iter()
                .map(|item| (item.name.clone(), item))
                .collect();
            TestResult::from_bool(tree.entries == expected)
        }
        quickcheck(prop as fn(HashMap<String, (u8, Vec<u8>)>) -> TestResult);
    }

    #[test]
    fn test_file_lookup() {
        let (_store, tree) = fixture();

        let mut file = tree.file("src/lib/mod.rs").unwrap();
        assert_eq!(file.name, "src/lib/mod.rs");
        assert_eq!(file.size, 3);
        assert_eq!(file.id, ObjectHash::from_type_and_data(ObjectType::Blob, b"mod"));
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "mod");

        assert_eq!(tree.file("README").unwrap().size, 6);
    }

    #[test]
    fn test_file_not_found_cases() {
        let (_store, tree) = fixture();
        for path in [
            "missing/x",
            "missing",
            "src",
            "src/lib",
            "README/x",
            "vendor/x",
            "vendor",
            "src/main.rs/x",
            "",
            "src/",
        ] {
            assert!(
                matches!(tree.file(path), Err(GitError::FileNotFound(ref p)) if p == path),
                "expected FileNotFound for `{path}`"
            );
        }
    }

    #[test]
    fn test_file_surfaces_corrupt_subtree() {
        let store = Arc::new(MemoryStore::new());
        let bad = store.insert(ObjectType::Tree, "100644 cut");
        let root = store.insert_tree(vec![TreeItem::new(
            TreeItemMode::Tree,
            bad,
            "bad".to_string(),
        )]);
        let tree = Tree::from_store(store.clone(), &root).unwrap();
        assert!(matches!(
            tree.file("bad/x"),
            Err(GitError::InvalidTreeItem(_))
        ));
    }

    #[test]
    fn test_files_walks_all_blobs() {
        let (_store, tree) = fixture();
        let files: Vec<File> = tree.files().collect::<Result<_, _>>().unwrap();
        let names: HashSet<String> = files.iter().map(|f| f.name.to_string()).collect();

        assert_eq!(files.len(), names.len(), "no duplicates");
        let expected: HashSet<String> = ["README", "run.sh", "src/main.rs", "src/lib/mod.rs"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, expected);

        for file in &files {
            let looked_up = tree.file(&file.name).unwrap();
            assert_eq!(looked_up.id, file.id);
            assert_eq!(looked_up.size, file.size);
        }
    }

    #[test]
    fn test_files_reports_corrupt_subtree() {
        let store = Arc::new(MemoryStore::new());
        let ok = store.insert(ObjectType::Blob, "ok");
        let bad = store.insert(ObjectType::Tree, "40000 dir");
        let root = store.insert_tree(vec![
            TreeItem::new(TreeItemMode::Blob, ok, "ok".to_string()),
            TreeItem::new(TreeItemMode::Tree, bad, "bad".to_string()),
        ]);
        let tree = Tree::from_store(store.clone(), &root).unwrap();

        let results: Vec<_> = tree.files().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }

    #[test]
    fn test_files_consumer_can_stop_early() {
        let (_store, tree) = fixture();
        let mut files = tree.files();
        assert!(files.next().is_some());
        drop(files);

        let larger = tree.files_with_config(&TraversalConfig {
            channel_capacity: 16,
        });
        assert_eq!(larger.count(), 4);
    }

    #[test]
    fn test_tree_iter() {
        let (store, _tree) = fixture();
        let feed = store.objects_of_type(ObjectType::Tree);
        let count = feed.len();

        let mut iter = TreeIter::new(feed, store.clone());
        for _ in 0..count {
            assert!(iter.next().unwrap().is_ok());
        }
        assert!(iter.next().is_none());

        let broken = vec![RawObject::from_content(ObjectType::Tree, "100644 x")];
        let mut iter = TreeIter::new(broken, store);
        assert!(matches!(iter.next(), Some(Err(_))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_tree_iter_over_channel() {
        let (store, _tree) = fixture();
        let (sender, receiver) = mpsc::channel();
        for object in store.objects_of_type(ObjectType::Tree) {
            sender.send(object).unwrap();
        }
        drop(sender);

        let trees: Vec<Tree> = TreeIter::new(receiver, store)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(trees.len(), 3);
    }
}
