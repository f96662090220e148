mod parser;
mod markdown;

use std::sync::{Arc, Weak};

use chrono::NaiveDateTime;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::site::SiteInfo;
use crate::url::UrlBuf;
use crate::util::{urlize, PathExt};
use crate::value::{Dict, Value};

pub use parser::*;
pub use markdown::*;

/// How a page's body reaches the output.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PageKind {
    /// The body is rendered content placed inside a layout.
    Templated,
    /// The body is itself the presentation. It's registered as a single-use
    /// template and rendered without a layout.
    Verbatim,
}

/// One content unit.
///
/// Pages are created by a [`PageParser`], placed by the site (section,
/// output location), then frozen behind an `Arc`. Afterwards only the body
/// and summary change (shortcode expansion) and the neighbour and site links
/// are set exactly once.
#[derive(Debug)]
pub struct Page {
    /// Logical name of the source record.
    pub source: Arc<str>,
    pub title: Arc<str>,
    pub description: Option<Arc<str>>,
    pub date: Option<NaiveDateTime>,
    pub draft: bool,
    pub aliases: Vec<Arc<str>>,
    pub slug: Option<Arc<str>>,
    pub url: Option<Arc<str>>,
    pub layout: Option<Arc<str>>,
    pub page_type: Option<Arc<str>>,
    /// Front matter not captured by a field above.
    pub params: Dict,
    pub kind: PageKind,
    pub section: Arc<str>,
    pub dir: Arc<str>,
    target: UrlBuf,
    rel_permalink: UrlBuf,
    permalink: UrlBuf,
    raw: Arc<str>,
    content: RwLock<Arc<str>>,
    summary: RwLock<Arc<str>>,
    prev: OnceCell<Weak<Page>>,
    next: OnceCell<Weak<Page>>,
    site: OnceCell<Weak<SiteInfo>>,
}

impl Page {
    /// A page with no front matter whose body is `raw` and whose rendered
    /// content is `content`.
    pub fn new(source: &str, kind: PageKind, raw: &str, content: &str) -> Self {
        Page {
            source: source.into(),
            title: "".into(),
            description: None,
            date: None,
            draft: false,
            aliases: vec![],
            slug: None,
            url: None,
            layout: None,
            page_type: None,
            params: Dict::new(),
            kind,
            section: "".into(),
            dir: "".into(),
            target: UrlBuf::new(),
            rel_permalink: UrlBuf::new(),
            permalink: UrlBuf::new(),
            raw: raw.into(),
            content: RwLock::new(content.into()),
            summary: RwLock::new("".into()),
            prev: OnceCell::new(),
            next: OnceCell::new(),
            site: OnceCell::new(),
        }
    }

    /// Computes the output path and permalinks.
    ///
    /// A `url` in the front matter wins. Otherwise the page lands at
    /// `{section}/{slug or file stem}.html`. With clean URLs the relative
    /// permalink drops the `.html` (and a final `index`) in favor of a
    /// trailing `/`.
    pub fn locate(&mut self, base_url: &str, ugly_urls: bool) {
        let (target, rel_permalink) = match &self.url {
            Some(url) => {
                let url = url.trim_start_matches('/');
                (UrlBuf::from(url), UrlBuf::from(format!("/{url}")))
            }
            None => {
                let stem = match &self.slug {
                    Some(slug) => slug.to_string(),
                    None => std::path::Path::new(&*self.source)
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                };

                let mut target = UrlBuf::from(urlize(&self.section));
                target.append(&format!("{}.html", urlize(&stem)));
                let rel = match ugly_urls {
                    true => target.clone(),
                    false => {
                        let path = std::path::Path::new(target.as_str()).without_extension();
                        let path = path.to_slash_lossy();
                        let path = match path.rsplit_once('/') {
                            Some((dir, "index")) => dir,
                            None if path == "index" => "",
                            _ => &path,
                        };

                        let mut rel = UrlBuf::from(path);
                        rel.append("/");
                        rel
                    }
                };

                let mut rel = rel;
                rel.make_absolute();
                (target, rel)
            }
        };

        self.permalink = UrlBuf::join(base_url, &rel_permalink);
        self.target = target;
        self.rel_permalink = rel_permalink;
    }

    /// Destination path handed to the publisher.
    pub fn target_path(&self) -> &str {
        &self.target
    }

    pub fn rel_permalink(&self) -> &str {
        &self.rel_permalink
    }

    pub fn permalink(&self) -> &str {
        &self.permalink
    }

    /// The body as read from the source, without front matter.
    pub fn raw(&self) -> &Arc<str> {
        &self.raw
    }

    pub fn content(&self) -> Arc<str> {
        self.content.read().clone()
    }

    pub fn summary(&self) -> Arc<str> {
        self.summary.read().clone()
    }

    pub fn set_content(&self, content: impl Into<Arc<str>>) {
        *self.content.write() = content.into();
    }

    pub fn set_summary(&self, summary: impl Into<Arc<str>>) {
        *self.summary.write() = summary.into();
    }

    /// The layout names this page asks for, most specific first. Doesn't
    /// include the site-wide default.
    pub fn layouts(&self) -> Vec<String> {
        if self.kind == PageKind::Verbatim {
            return vec![];
        }

        let page_type = self.page_type.as_deref().unwrap_or(&self.section);
        let page_type = match page_type.is_empty() {
            true => "_default",
            false => page_type,
        };

        match &self.layout {
            Some(layout) => vec![format!("{page_type}/{layout}.html")],
            None => vec![format!("{page_type}/single.html")],
        }
    }

    /// Name of the single-use template of a verbatim page.
    pub fn self_template(&self) -> String {
        format!("__{}", self.target)
    }

    /// A front-matter value by key, checking typed fields first.
    pub fn param(&self, key: &str) -> Option<Value> {
        match key {
            "title" => Some(self.title.clone().into()),
            "description" => self.description.clone().map(Value::from),
            "slug" => self.slug.clone().map(Value::from),
            "draft" => Some(self.draft.into()),
            _ => self.params.get(key).cloned(),
        }
    }

    pub fn prev(&self) -> Option<Arc<Page>> {
        self.prev.get().and_then(Weak::upgrade)
    }

    pub fn next(&self) -> Option<Arc<Page>> {
        self.next.get().and_then(Weak::upgrade)
    }

    pub fn site(&self) -> Option<Arc<SiteInfo>> {
        self.site.get().and_then(Weak::upgrade)
    }

    pub(crate) fn link(&self, prev: Option<&Arc<Page>>, next: Option<&Arc<Page>>) {
        if let Some(prev) = prev {
            let _ = self.prev.set(Arc::downgrade(prev));
        }

        if let Some(next) = next {
            let _ = self.next.set(Arc::downgrade(next));
        }
    }

    pub(crate) fn attach(&self, site: &Arc<SiteInfo>) {
        let _ = self.site.set(Arc::downgrade(site));
    }
}

/// An ordered collection of pages.
#[derive(Debug, Default, Clone, derive_more::Deref, derive_more::From)]
pub struct Pages(Vec<Arc<Page>>);

impl Pages {
    pub fn new() -> Self {
        Pages(vec![])
    }

    pub fn push(&mut self, page: Arc<Page>) {
        self.0.push(page);
    }

    /// Newest first. Undated pages go last. Stable.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| b.date.cmp(&a.date));
    }

    /// Sets every page's neighbours to its neighbours in `self`.
    pub fn link(&self) {
        for (i, page) in self.0.iter().enumerate() {
            let prev = i.checked_sub(1).and_then(|i| self.0.get(i));
            page.link(prev, self.0.get(i + 1));
        }
    }

    /// The first `n` pages.
    pub fn recent(&self, n: usize) -> Pages {
        Pages(self.0.iter().take(n).cloned().collect())
    }

    pub fn into_inner(self) -> Vec<Arc<Page>> {
        self.0
    }
}

impl FromIterator<Arc<Page>> for Pages {
    fn from_iter<T: IntoIterator<Item = Arc<Page>>>(iter: T) -> Self {
        Pages(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Pages {
    type Item = &'a Arc<Page>;
    type IntoIter = std::slice::Iter<'a, Arc<Page>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dated(name: &str, day: Option<u32>) -> Arc<Page> {
        let mut page = Page::new(name, PageKind::Templated, "", "");
        page.date = day.and_then(|d| NaiveDate::from_ymd_opt(2013, 7, d)?.and_hms_opt(0, 0, 0));
        Arc::new(page)
    }

    #[test]
    fn sort_newest_first_undated_last() {
        let mut pages: Pages = vec![
            dated("a", Some(1)),
            dated("b", None),
            dated("c", Some(3)),
            dated("d", Some(2)),
            dated("e", Some(3)),
        ].into();

        pages.sort();
        let names: Vec<_> = pages.iter().map(|p| &*p.source).collect();
        assert_eq!(names, vec!["c", "e", "d", "a", "b"]);
        for pair in pages.windows(2) {
            assert!(pair[0].date >= pair[1].date);
        }
    }

    #[test]
    fn sort_compares_instants_across_offsets() {
        let at = |name: &str, date: &str| {
            let mut page = Page::new(name, PageKind::Templated, "", "");
            page.date = Some(parse_date(date).unwrap());
            Arc::new(page)
        };

        let mut pages: Pages = vec![
            at("east", "2013-07-01T10:00:00+05:00"),
            at("utc", "2013-07-01T06:00:00Z"),
            at("west", "2013-07-01T00:30:00-05:00"),
        ].into();

        pages.sort();
        let names: Vec<_> = pages.iter().map(|p| &*p.source).collect();
        assert_eq!(names, vec!["utc", "west", "east"]);
    }

    #[test]
    fn link_is_inverse_of_adjacency() {
        let pages: Pages = vec![dated("a", Some(3)), dated("b", Some(2)), dated("c", Some(1))].into();
        pages.link();

        assert!(pages[0].prev().is_none());
        assert!(pages[2].next().is_none());
        for i in 0..2 {
            assert!(Arc::ptr_eq(&pages[i].next().unwrap(), &pages[i + 1]));
            assert!(Arc::ptr_eq(&pages[i + 1].prev().unwrap(), &pages[i]));
        }
    }

    #[test]
    fn locate_clean_and_ugly() {
        let mut page = Page::new("post/Hello World.md", PageKind::Templated, "", "");
        page.section = "post".into();

        page.locate("http://example.com", false);
        assert_eq!(page.target_path(), "post/hello-world.html");
        assert_eq!(page.rel_permalink(), "/post/hello-world/");
        assert_eq!(page.permalink(), "http://example.com/post/hello-world/");

        page.locate("http://example.com/", true);
        assert_eq!(page.rel_permalink(), "/post/hello-world.html");
        assert_eq!(page.permalink(), "http://example.com/post/hello-world.html");

        page.slug = Some("first".into());
        page.locate("", false);
        assert_eq!(page.target_path(), "post/first.html");
        assert_eq!(page.permalink(), "/post/first/");

        page.url = Some("/about/".into());
        page.locate("http://example.com", false);
        assert_eq!(page.target_path(), "about/");
        assert_eq!(page.permalink(), "http://example.com/about/");
    }

    #[test]
    fn root_index_is_the_root() {
        let mut page = Page::new("index.md", PageKind::Templated, "", "");
        page.locate("http://example.com", false);
        assert_eq!(page.target_path(), "index.html");
        assert_eq!(page.rel_permalink(), "/");
    }

    #[test]
    fn layouts() {
        let mut page = Page::new("post/a.md", PageKind::Templated, "", "");
        page.section = "post".into();
        assert_eq!(page.layouts(), vec!["post/single.html"]);

        page.layout = Some("wide".into());
        page.page_type = Some("essay".into());
        assert_eq!(page.layouts(), vec!["essay/wide.html"]);

        let page = Page::new("a.html", PageKind::Verbatim, "", "");
        assert!(page.layouts().is_empty());
    }
}
