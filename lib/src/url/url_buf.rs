use std::fmt;
use std::ops::Deref;
use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

/// An owned URL string that knows how to join path segments onto itself.
///
/// The contents are not validated: permalinks built from user supplied slugs
/// and `url` front matter must never cause a failure here.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct UrlBuf(String);

impl UrlBuf {
    pub fn new() -> UrlBuf {
        UrlBuf(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scheme(&self) -> Option<&str> {
        super::scheme(&self.0)
    }

    /// ```rust
    /// use quire::url::UrlBuf;
    ///
    /// let mut url = UrlBuf::from("foo/bar");
    /// assert_eq!(url.as_str(), "foo/bar");
    ///
    /// url.prepend("/");
    /// assert_eq!(url.as_str(), "/foo/bar");
    ///
    /// url.prepend("bar/baz/");
    /// assert_eq!(url.as_str(), "bar/baz/foo/bar");
    ///
    /// url.prepend("https://example.com");
    /// assert_eq!(url.as_str(), "https://example.com/bar/baz/foo/bar");
    ///
    /// url.prepend("/bar/baz");
    /// assert_eq!(url.as_str(), "https://example.com/bar/baz/foo/bar");
    /// ```
    pub fn prepend(&mut self, url: &str) -> &mut Self {
        if self.scheme().is_some() {
            return self;
        }

        let mut prefix = UrlBuf::from(url);
        let suffix = std::mem::take(self);
        prefix.append(&suffix.0);
        *self = prefix;
        self
    }

    /// ```rust
    /// use quire::url::UrlBuf;
    ///
    /// let mut url = UrlBuf::from("https://example.com");
    /// url.append("bar/baz");
    /// assert_eq!(url.as_str(), "https://example.com/bar/baz");
    ///
    /// url.append("/foo/bar/");
    /// assert_eq!(url.as_str(), "https://example.com/bar/baz/foo/bar/");
    ///
    /// url.append("https://example.org/foo");
    /// assert_eq!(url.as_str(), "https://example.org/foo");
    ///
    /// let mut url = UrlBuf::from("/foo/bar");
    /// url.append("baz");
    /// assert_eq!(url.as_str(), "/foo/bar/baz");
    ///
    /// url.append("/");
    /// assert_eq!(url.as_str(), "/foo/bar/baz/");
    /// ```
    pub fn append(&mut self, url: &str) -> &mut Self {
        if super::scheme(url).is_some() {
            self.0 = url.to_owned();
        } else if self.0.is_empty() {
            self.0.push_str(url);
        } else {
            match (self.0.ends_with('/'), url.starts_with('/')) {
                (true, true) => self.0.push_str(&url[1..]),
                (true, false) | (false, true) => self.0.push_str(url),
                (false, false) => {
                    self.0.push('/');
                    self.0.push_str(url);
                }
            }
        }

        self
    }

    pub fn make_absolute(&mut self) -> &mut Self {
        self.prepend("/");
        self
    }

    /// `base` joined with `path`.
    ///
    /// ```rust
    /// use quire::url::UrlBuf;
    ///
    /// assert_eq!(UrlBuf::join("http://base", "foobar.js").as_str(), "http://base/foobar.js");
    /// assert_eq!(UrlBuf::join("http://base/", "/foobar").as_str(), "http://base/foobar");
    /// assert_eq!(UrlBuf::join("http://base", "").as_str(), "http://base/");
    /// ```
    pub fn join(base: &str, path: &str) -> UrlBuf {
        let mut url = UrlBuf::from(base);
        if path.is_empty() {
            url.append("/");
        } else {
            url.append(path);
        }

        url
    }
}

impl From<String> for UrlBuf {
    fn from(value: String) -> Self {
        UrlBuf(value)
    }
}

impl From<&str> for UrlBuf {
    fn from(value: &str) -> Self {
        UrlBuf(value.to_owned())
    }
}

impl Deref for UrlBuf {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for UrlBuf {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for UrlBuf {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UrlBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<UrlBuf> for String {
    fn from(value: UrlBuf) -> Self {
        value.0
    }
}
