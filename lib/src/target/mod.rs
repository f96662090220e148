//! Destination stores for rendered output.

mod alias;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Chainable, Error, ErrorKind, Result};

pub use alias::*;

/// Accepts rendered output under site-relative paths.
///
/// Implementations must tolerate concurrent writes to distinct paths.
pub trait Publisher: Send + Sync {
    /// Maps a site-relative output path to the stored path.
    fn translate(&self, path: &str) -> String;

    /// Stores everything `reader` yields at the already translated `path`.
    fn write(&self, path: &str, reader: &mut dyn Read) -> Result<()>;

    /// Translates `path` and stores `reader` there.
    fn publish(&self, path: &str, reader: &mut dyn Read) -> Result<()> {
        let translated = self.translate(path);
        tracing::debug!(path, translated = %translated, "publish");
        self.write(&translated, reader)
    }
}

/// The output path conventions shared by every store.
///
/// `x/` becomes `x/index.html` and so does an extensionless `x`. With clean
/// URLs `a/b.html` becomes `a/b/index.html`, except for files already named
/// `index.html`. Other extensions are kept.
///
/// ```rust
/// use quire::target::translate;
///
/// assert_eq!(translate("/", false), "index.html");
/// assert_eq!(translate("post", false), "post/index.html");
/// assert_eq!(translate("post/first.html", false), "post/first/index.html");
/// assert_eq!(translate("post/first.html", true), "post/first.html");
/// assert_eq!(translate("post/index.html", false), "post/index.html");
/// assert_eq!(translate("tags/rust.xml", false), "tags/rust.xml");
/// ```
pub fn translate(path: &str, ugly_urls: bool) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() || path.ends_with('/') {
        return format!("{path}index.html");
    }

    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, _)) if stem.is_empty() => format!("{path}/index.html"),
        None => format!("{path}/index.html"),
        Some((_, "html")) if !ugly_urls && file_name != "index.html" => {
            format!("{}/index.html", &path[..path.len() - ".html".len()])
        }
        Some(_) => path.to_owned(),
    }
}

/// `path` as a relative path that can't leave the directory it's joined to.
///
/// A leading `/` is dropped. `..`, or any other component that isn't a
/// plain name, is a `Publish` error.
///
/// ```rust
/// use std::path::Path;
/// use quire::target::contained;
///
/// assert_eq!(contained("/post/a.html").unwrap(), Path::new("post/a.html"));
/// assert_eq!(contained("./a/index.html").unwrap(), Path::new("./a/index.html"));
/// assert!(contained("../../escaped/index.html").is_err());
/// assert!(contained("a/../../b").is_err());
/// ```
pub fn contained(path: &str) -> Result<&Path> {
    use std::path::Component;

    let relative = Path::new(path.trim_start_matches('/'));
    let escapes = relative.components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if escapes {
        return err!("output path leaves the publish directory", "path" => path)
            .kind(ErrorKind::Publish);
    }

    Ok(relative)
}

/// Writes files under a publish directory.
#[derive(Debug, Clone)]
pub struct Filesystem {
    pub publish_dir: PathBuf,
    pub ugly_urls: bool,
}

impl Filesystem {
    pub fn new<P: AsRef<Path>>(publish_dir: P, ugly_urls: bool) -> Self {
        Filesystem { publish_dir: publish_dir.as_ref().to_path_buf(), ugly_urls }
    }
}

impl Publisher for Filesystem {
    fn translate(&self, path: &str) -> String {
        translate(path, self.ugly_urls)
    }

    fn write(&self, path: &str, reader: &mut dyn Read) -> Result<()> {
        let full_path = self.publish_dir.join(contained(path)?);
        let context = || error! {
            "failed to publish",
            "path" => full_path.display(),
        };

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).chain_with(context).kind(ErrorKind::Publish)?;
        }

        let mut file = File::create(&full_path).chain_with(context).kind(ErrorKind::Publish)?;
        let copied = io::copy(reader, &mut file).and_then(|_| file.flush());
        if let Err(e) = copied {
            drop(file);
            let _ = fs::remove_file(&full_path);
            let e = Error::from(e).chain(context());
            return Err(match e.kind() {
                ErrorKind::Disconnected => e,
                _ => e.with_kind(ErrorKind::Publish),
            });
        }

        Ok(())
    }
}

/// Keeps published output in memory.
#[derive(Debug, Default)]
pub struct Memory {
    ugly_urls: bool,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl Memory {
    pub fn new(ugly_urls: bool) -> Self {
        Memory { ugly_urls, files: Mutex::default() }
    }

    /// The contents stored at the translated `path`.
    pub fn get(&self, path: &str) -> Option<String> {
        let files = self.files.lock();
        files.get(path).map(|v| String::from_utf8_lossy(v).into_owned())
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl Publisher for Memory {
    fn translate(&self, path: &str) -> String {
        translate(path, self.ugly_urls)
    }

    fn write(&self, path: &str, reader: &mut dyn Read) -> Result<()> {
        let path = contained(path)?.to_string_lossy().into_owned();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents)?;
        self.files.lock().insert(path, contents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing(usize);

    impl Read for Failing {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "upstream failed"));
            }

            self.0 -= 1;
            buf[0] = b'x';
            Ok(1)
        }
    }

    #[test]
    fn filesystem_publish() {
        let dir = tempfile::tempdir().unwrap();
        let target = Filesystem::new(dir.path(), false);
        target.publish("post/first.html", &mut "hello".as_bytes()).unwrap();

        let written = fs::read_to_string(dir.path().join("post/first/index.html")).unwrap();
        assert_eq!(written, "hello");
    }

    #[test]
    fn failed_copy_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = Filesystem::new(dir.path(), true);
        let err = target.publish("a.html", &mut Failing(3)).unwrap_err();

        assert!(err.is_disconnect());
        assert!(!dir.path().join("a.html").exists());
    }

    #[test]
    fn writes_stay_inside_the_publish_dir() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("site/public");
        let target = Filesystem::new(&public, false);

        for path in ["../../escaped", "post/../../../escaped.html", "../escaped/"] {
            let err = target.publish(path, &mut "x".as_bytes()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Publish, "{path}");
        }

        assert!(!dir.path().join("escaped").exists());
        assert!(!dir.path().join("escaped.html").exists());
        assert!(!dir.path().join("site/escaped").exists());

        target.publish("/post/", &mut "ok".as_bytes()).unwrap();
        assert!(public.join("post/index.html").is_file());
    }

    #[test]
    fn memory_publish() {
        let target = Memory::new(false);
        target.publish("/", &mut "home".as_bytes()).unwrap();
        target.publish("index.xml", &mut "feed".as_bytes()).unwrap();
        assert!(target.publish("broken.html", &mut Failing(1)).is_err());

        assert_eq!(target.paths(), vec!["index.html", "index.xml"]);
        assert_eq!(target.get("index.html").as_deref(), Some("home"));
    }
}
