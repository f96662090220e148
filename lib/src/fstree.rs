use std::sync::Arc;
use std::path::Path;
use std::{fs, fmt};

use rustc_hash::FxHashMap;

use crate::error::{ErrorKind, Result};

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct EntryId(pub(crate) usize);

/// A snapshot of a directory tree, discovered in parallel with `jwalk`.
#[derive(Debug)]
pub struct FsTree {
    entries: Vec<Entry>,
    map: FxHashMap<Arc<Path>, EntryId>,
}

#[derive(Debug)]
pub struct Entry {
    pub id: EntryId,
    pub path: Arc<Path>,
    pub file_name: String,
    pub file_type: fs::FileType,
    pub parent: Option<EntryId>,
    pub children: Vec<EntryId>,
    pub depth: usize,
}

impl FsTree {
    pub fn build<P: AsRef<Path>>(root: P) -> Result<Self> {
        use jwalk::WalkDir;

        let root = root.as_ref();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort(true);

        let mut tree = FsTree { entries: vec![], map: FxHashMap::default() };
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            tree.insert(entry);
        }

        if tree.entries.is_empty() {
            return Err(error! {
                "file system tree discovery yielded zero entries",
                "search root" => root.display(),
            }.with_kind(ErrorKind::Config));
        }

        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn root(&self) -> &Entry {
        &self[self.root_id()]
    }

    pub fn root_id(&self) -> EntryId {
        EntryId(0)
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<&Entry> {
        let full_path = self.root().path.join(path.as_ref());
        self.map.get(&*full_path).map(|&id| &self[id])
    }

    /// Visits entries depth first, in file name order. Descends into a
    /// directory only if `visit` returns `true` for it.
    pub fn depth_first_search<'a, F>(&'a self, root: EntryId, mut visit: F)
        where F: FnMut(&'a Entry) -> bool
    {
        fn _dfs<'a, F: FnMut(&'a Entry) -> bool>(tree: &'a FsTree, root: EntryId, visit: &mut F) {
            let entry = &tree[root];
            if visit(entry) {
                for &child in &entry.children {
                    _dfs(tree, child, visit)
                }
            }
        }

        _dfs(self, root, &mut visit)
    }

    /// Every file in the tree, depth first, skipping anything (file or
    /// directory) for which `skip` returns `true`.
    pub fn files<'a, F>(&'a self, mut skip: F) -> Vec<&'a Entry>
        where F: FnMut(&'a Entry) -> bool
    {
        let mut files = vec![];
        self.depth_first_search(self.root_id(), |entry| {
            if entry.id != self.root_id() && skip(entry) {
                return false;
            }

            if entry.file_type.is_file() {
                files.push(entry);
            }

            true
        });

        files
    }

    fn insert(&mut self, entry: jwalk::DirEntry<((), ())>) -> EntryId {
        let entry = Entry {
            id: EntryId(self.entries.len()),
            path: Arc::from(entry.path().into_boxed_path()),
            file_type: entry.file_type,
            file_name: entry.file_name.to_string_lossy().into_owned(),
            parent: self.map.get(&*entry.parent_path).cloned(),
            children: vec![],
            depth: entry.depth,
        };

        self.map.insert(entry.path.clone(), entry.id);
        if let Some(parent) = entry.parent {
            self.entries[parent.0].children.push(entry.id);
        }

        let id = entry.id;
        self.entries.push(entry);
        id
    }
}

impl Entry {
    /// File name without the extension.
    pub fn file_stem(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((left, _)) if !left.is_empty() => left,
            _ => &self.file_name,
        }
    }

    /// The final extension, if any.
    pub fn file_ext(&self) -> Option<&str> {
        match self.file_name.rsplit_once('.') {
            Some((left, right)) if !left.is_empty() => Some(right),
            _ => None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.file_name.starts_with('.')
    }

    /// Path relative to the root of the tree that contains `self`.
    pub fn relative_path(&self) -> &Path {
        let mut components = self.path.components();
        for _ in 0..(self.path.components().count() - self.depth) {
            components.next();
        }

        components.as_path()
    }
}

impl std::ops::Index<EntryId> for FsTree {
    type Output = Entry;

    fn index(&self, index: EntryId) -> &Self::Output {
        &self.entries[index.0]
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_in_name_order_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("post")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("post/b.md"), "b").unwrap();
        std::fs::write(dir.path().join("post/a.md"), "a").unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "x").unwrap();
        std::fs::write(dir.path().join("about.md"), "about").unwrap();

        let tree = FsTree::build(dir.path()).unwrap();
        let files: Vec<_> = tree.files(|e| e.is_hidden()).into_iter()
            .map(|e| e.relative_path().to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(files, vec!["about.md", "post/a.md", "post/b.md"]);
        assert_eq!(tree.get("post/a.md").map(|e| e.file_stem()), Some("a"));
        assert_eq!(tree.get("post/a.md").and_then(|e| e.file_ext()), Some("md"));
    }

    #[test]
    fn missing_root_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsTree::build(dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
