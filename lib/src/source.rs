use std::sync::Arc;
use std::path::{Path, PathBuf};

use crate::error::{Chainable, Result};
use crate::fstree::FsTree;
use crate::util::PathExt;

/// A collection of raw content records, in a stable order.
pub trait ContentSource: Send + Sync {
    fn files(&self) -> &[SourceFile];
}

/// One raw content record.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub contents: Arc<[u8]>,
    /// Path relative to the content root, `/`-separated.
    pub logical_name: Arc<str>,
    /// First directory component of `logical_name`, empty for root files.
    pub section: Arc<str>,
    /// Directory of `logical_name`, empty for root files.
    pub dir: Arc<str>,
}

impl SourceFile {
    pub fn new(logical_name: &str, contents: impl Into<Arc<[u8]>>) -> Self {
        let logical_name = logical_name.trim_start_matches('/');
        let (dir, section) = match logical_name.rsplit_once('/') {
            Some((dir, _)) => (dir, dir.split('/').next().unwrap_or(dir)),
            None => ("", ""),
        };

        SourceFile {
            contents: contents.into(),
            logical_name: logical_name.into(),
            section: section.into(),
            dir: dir.into(),
        }
    }
}

/// Content read from a directory tree.
#[derive(Debug)]
pub struct Filesystem {
    root: PathBuf,
    files: Vec<SourceFile>,
}

impl Filesystem {
    /// Reads every file under `root` except hidden ones and anything inside
    /// `skip`, which is typically the static directory.
    pub fn new<P: AsRef<Path>>(root: P, skip: Option<&Path>) -> Result<Self> {
        let root = root.as_ref();
        let tree = FsTree::build(root)?;
        let entries = tree.files(|entry| {
            entry.is_hidden() || skip.map_or(false, |skip| entry.path.starts_with(skip))
        });

        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let contents = std::fs::read(&entry.path).chain_with(|| error! {
                "failed to read content file",
                "path" => entry.path.display(),
            })?;

            let name = entry.relative_path().to_slash_lossy();
            files.push(SourceFile::new(&name, contents));
        }

        tracing::debug!(root = %root.display(), files = files.len(), "read content");
        Ok(Filesystem { root: root.to_path_buf(), files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContentSource for Filesystem {
    fn files(&self) -> &[SourceFile] {
        &self.files
    }
}

/// A fixed set of in-memory records.
#[derive(Debug, Default, Clone)]
pub struct Memory {
    files: Vec<SourceFile>,
}

impl Memory {
    pub fn new() -> Self {
        Memory::default()
    }

    pub fn add(&mut self, logical_name: &str, contents: impl AsRef<[u8]>) -> &mut Self {
        self.files.push(SourceFile::new(logical_name, contents.as_ref()));
        self
    }

    pub fn with(mut self, logical_name: &str, contents: impl AsRef<[u8]>) -> Self {
        self.add(logical_name, contents);
        self
    }
}

impl ContentSource for Memory {
    fn files(&self) -> &[SourceFile] {
        &self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_and_dirs() {
        let file = SourceFile::new("post/2013/first.md", "x".as_bytes());
        assert_eq!(&*file.section, "post");
        assert_eq!(&*file.dir, "post/2013");
        assert_eq!(&*file.logical_name, "post/2013/first.md");

        let file = SourceFile::new("about.md", "x".as_bytes());
        assert_eq!(&*file.section, "");
        assert_eq!(&*file.dir, "");
    }

    #[test]
    fn filesystem_skips_hidden_and_static() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for (path, contents) in [
            ("post/a.md", "a"),
            ("about.md", "about"),
            (".draft.md", "hidden"),
            ("static/logo.svg", "<svg/>"),
        ] {
            let path = root.join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }

        let source = Filesystem::new(root, Some(&root.join("static"))).unwrap();
        let names: Vec<_> = source.files().iter().map(|f| &*f.logical_name).collect();
        assert_eq!(names, vec!["about.md", "post/a.md"]);
        assert_eq!(&*source.files()[1].contents, b"a");
        assert_eq!(&*source.files()[1].section, "post");
    }
}
