use std::sync::Arc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Chainable, ErrorKind, Result};
use crate::value::{Dict, Format, Json, Toml};

/// Names probed, in order, by [`Config::discover()`].
pub const CONFIG_FILES: &[&str] = &["config.toml", "config.json"];

/// Site configuration.
///
/// Every field has a default, so an empty file (or no file at all) is a
/// valid configuration. Relative directories are resolved against
/// [`Config::root`] by [`Config::abs_path()`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The site's base URL. Prepended to every permalink.
    pub base_url: String,
    pub title: String,
    pub content_dir: PathBuf,
    pub layout_dir: PathBuf,
    pub publish_dir: PathBuf,
    /// Never read as content.
    pub static_dir: PathBuf,
    /// Classification fields, singular name to plural name.
    pub indexes: BTreeMap<Arc<str>, Arc<str>>,
    pub build_drafts: bool,
    pub verbose: bool,
    pub ugly_urls: bool,
    /// Render independent pages concurrently.
    pub parallel: bool,
    /// Free-form values exposed to templates as `site.params`.
    pub params: Dict,
    #[serde(skip)]
    pub root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let indexes = [("tag", "tags"), ("category", "categories")]
            .into_iter()
            .map(|(s, p)| (Arc::from(s), Arc::from(p)))
            .collect();

        Config {
            base_url: String::new(),
            title: String::new(),
            content_dir: "content".into(),
            layout_dir: "layouts".into(),
            publish_dir: "public".into(),
            static_dir: "static".into(),
            indexes,
            build_drafts: false,
            verbose: false,
            ugly_urls: false,
            parallel: false,
            params: Dict::new(),
            root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Reads the configuration file at `path`, picking the format by
    /// extension. The file's directory becomes the site root.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let mut config: Config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Toml::read(path)?,
            Some("json") => Json::read(path)?,
            _ => return err! {
                "unsupported configuration format",
                "path" => path.display(),
                "expected extension" => "toml, json",
            }.kind(ErrorKind::Config),
        };

        config.root = path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Loads the first of [`CONFIG_FILES`] present in `root`, or the default
    /// configuration rooted at `root` if there is none.
    pub fn discover<P: AsRef<Path>>(root: P) -> Result<Config> {
        let root = root.as_ref();
        for name in CONFIG_FILES {
            let path = root.join(name);
            if path.is_file() {
                let mut config = Config::read(&path)?;
                config.root = root.to_path_buf();
                return Ok(config);
            }
        }

        tracing::debug!(root = %root.display(), "no configuration file, using defaults");
        Ok(Config { root: root.to_path_buf(), ..Config::default() })
    }

    /// `path` resolved against the site root unless already absolute.
    pub fn abs_path<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn content_path(&self) -> PathBuf {
        self.abs_path(&self.content_dir)
    }

    pub fn layout_path(&self) -> PathBuf {
        self.abs_path(&self.layout_dir)
    }

    pub fn publish_path(&self) -> PathBuf {
        self.abs_path(&self.publish_dir)
    }

    /// Fails with a [`ErrorKind::Config`] error naming the first of the
    /// content and layout directories that doesn't exist.
    pub fn check_dirs(&self) -> Result<()> {
        for (what, path) in [("content", self.content_path()), ("layout", self.layout_path())] {
            if !path.is_dir() {
                return err! {
                    format!("{what} directory not found"),
                    "path" => path.display(),
                    "site root" => self.root.display(),
                }.kind(ErrorKind::Config);
            }
        }

        Ok(())
    }

    /// The plural name of every classification field.
    pub fn plurals(&self) -> impl Iterator<Item = &Arc<str>> {
        self.indexes.values()
    }

    /// The singular name of the field whose plural is `plural`.
    pub fn singular(&self, plural: &str) -> Option<&Arc<str>> {
        self.indexes.iter()
            .find(|(_, p)| &***p == plural)
            .map(|(s, _)| s)
    }
}

impl std::str::FromStr for Config {
    type Err = crate::error::Error;

    /// Parses a TOML configuration rooted at the current directory.
    fn from_str(s: &str) -> Result<Self> {
        Toml::from_str(s).chain(error!("invalid configuration"))
    }
}
