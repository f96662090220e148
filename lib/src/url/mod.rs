//! URL helpers for permalinks and attribute rewriting.
//!
//! Everything here works on plain strings. Nothing validates URL syntax:
//! values come from user content and must pass through unchanged when they
//! aren't understood.

mod url_buf;

pub use url_buf::*;

/// The scheme of `url`, if it has one.
///
/// ```rust
/// use quire::url::scheme;
///
/// assert_eq!(scheme("http://example.com"), Some("http"));
/// assert_eq!(scheme("mailto:foo@bar.com"), Some("mailto"));
/// assert_eq!(scheme("foo#bar:baz"), None);
/// assert_eq!(scheme("foo?bar:baz"), None);
/// assert_eq!(scheme("/a:b"), None);
/// ```
pub fn scheme(url: &str) -> Option<&str> {
    let bytes = url.as_bytes();
    match memchr::memchr3(b':', b'?', b'/', bytes) {
        Some(i) if bytes[i] == b':' => match memchr::memrchr(b'#', &bytes[..i]) {
            Some(_) => None,
            None => Some(&url[..i]),
        }
        _ => None,
    }
}

/// `true` if `url` names a host, either as `scheme://host` or as a
/// protocol-relative `//host`.
///
/// ```rust
/// use quire::url::has_authority;
///
/// assert!(has_authority("http://user@host:10234/foobar.js"));
/// assert!(has_authority("//host/foobar.js"));
/// assert!(!has_authority("/foobar"));
/// assert!(!has_authority("mailto:a@b.c"));
/// ```
pub fn has_authority(url: &str) -> bool {
    let rest = match scheme(url) {
        Some(scheme) => &url[scheme.len() + 1..],
        None => url,
    };

    rest.starts_with("//")
}

/// `true` if `url` is a bare path: no scheme, no authority, and not a
/// fragment-only reference.
///
/// ```rust
/// use quire::url::is_bare_path;
///
/// assert!(is_bare_path("foobar.js"));
/// assert!(is_bare_path("/foobar"));
/// assert!(!is_bare_path("https://host/foobar"));
/// assert!(!is_bare_path("//host/foobar"));
/// assert!(!is_bare_path("#top"));
/// assert!(!is_bare_path(""));
/// ```
pub fn is_bare_path(url: &str) -> bool {
    !url.is_empty()
        && !url.starts_with('#')
        && scheme(url).is_none()
        && !has_authority(url)
}
