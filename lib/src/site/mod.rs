//! The build orchestrator.

mod render;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::config::Config;
use crate::error::{Chainable, ErrorKind, Result};
use crate::page::{FrontMatterParser, PageParser, Pages};
use crate::shortcode::{ShortcodeExpander, TemplateShortcodes};
use crate::source::{self, ContentSource};
use crate::target::{self, AliasPublisher, Publisher};
use crate::taxonomy::{Index, OrderedIndex, OrderedTaxonomies, Taxonomies};
use crate::templating::Engine;
use crate::templating::minijinja::MiniJinjaEngine;
use crate::timer::Timer;
use crate::url::UrlBuf;
use crate::value::{Dict, Value};

/// How many pages the home page and `site.recent` carry.
pub const RECENT_PAGES: usize = 9;

/// Read-only site state shared with every page and node.
#[derive(Debug)]
pub struct SiteInfo {
    pub base_url: String,
    pub title: String,
    /// Date of the most recent page.
    pub last_change: Option<NaiveDateTime>,
    pub indexes: OrderedTaxonomies,
    pub pages: Pages,
    pub params: Arc<Dict>,
}

/// A value handed to templates through a node's `data`.
#[derive(Debug, Clone)]
pub enum Data {
    Pages(Pages),
    Index(Index),
    OrderedIndex(OrderedIndex),
    Value(Value),
}

/// A renderable that isn't a single page: a taxonomy term, an index of
/// indexes, a section list, the home page, or a feed.
#[derive(Debug, Clone)]
pub struct Node {
    pub title: String,
    pub url: String,
    pub permalink: String,
    pub rss_link: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub data: BTreeMap<String, Data>,
    pub site: Arc<SiteInfo>,
}

impl Node {
    /// A node at the site-relative `url`.
    pub fn new(site: &Arc<SiteInfo>, title: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Node {
            title: title.into(),
            permalink: UrlBuf::join(&site.base_url, &url).into(),
            url,
            rss_link: None,
            date: None,
            data: BTreeMap::new(),
            site: site.clone(),
        }
    }

    pub fn with(mut self, key: &str, data: Data) -> Self {
        self.data.insert(key.to_owned(), data);
        self
    }
}

/// Counts reported after a build.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub pages: usize,
    /// Number of keys per classification field.
    pub indexes: Vec<(Arc<str>, usize)>,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pages created", self.pages)?;
        for (plural, count) in &self.indexes {
            write!(f, "\n{count} {plural} created")?;
        }

        Ok(())
    }
}

/// A site and the collaborators that build it.
///
/// [`Site::new()`] reads content and layouts from the directories `config`
/// names and publishes to its publish directory. Each collaborator can be
/// replaced before processing, which is how sites are built in memory.
pub struct Site {
    pub config: Config,
    source: Option<Box<dyn ContentSource>>,
    engine: Option<Arc<dyn Engine>>,
    parser: Box<dyn PageParser>,
    publisher: Arc<dyn Publisher>,
    aliases: Option<Arc<dyn AliasPublisher>>,
    shortcodes: Box<dyn ShortcodeExpander>,
    pages: Pages,
    taxonomies: Taxonomies,
    sections: Index,
    info: Option<Arc<SiteInfo>>,
}

impl Site {
    pub fn new(config: Config) -> Site {
        let publisher = target::Filesystem::new(config.publish_path(), config.ugly_urls);
        Site {
            source: None,
            engine: None,
            parser: Box::new(FrontMatterParser),
            publisher: Arc::new(publisher),
            aliases: None,
            shortcodes: Box::new(TemplateShortcodes),
            pages: Pages::new(),
            taxonomies: Taxonomies::default(),
            sections: Index::new(),
            info: None,
            config,
        }
    }

    pub fn with_source<S: ContentSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_parser<P: PageParser + 'static>(mut self, parser: P) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Replaces the destination store. Unless replaced too, aliases are
    /// published to it as HTML redirects.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_aliases(mut self, aliases: Arc<dyn AliasPublisher>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub fn with_shortcodes<S: ShortcodeExpander + 'static>(mut self, shortcodes: S) -> Self {
        self.shortcodes = Box::new(shortcodes);
        self
    }

    /// Every page, newest first. Empty until processed.
    pub fn pages(&self) -> &Pages {
        &self.pages
    }

    pub fn taxonomies(&self) -> &Taxonomies {
        &self.taxonomies
    }

    pub fn sections(&self) -> &Index {
        &self.sections
    }

    pub fn info(&self) -> Option<&Arc<SiteInfo>> {
        self.info.as_ref()
    }

    /// Processes then renders the site.
    pub fn build(&mut self, timer: &mut Timer) -> Result<()> {
        self.process()?;
        timer.step("process");
        self.render_timed(timer)
    }

    /// Materializes, orders, links and indexes every page.
    pub fn process(&mut self) -> Result<()> {
        self.prepare()?;
        let source = match &self.source {
            Some(source) => source,
            None => return err!("site has no content source").kind(ErrorKind::Config),
        };

        let files = source.files();
        if files.is_empty() {
            return err! {
                "no source files found",
                "content directory" => self.config.content_path().display(),
            }.kind(ErrorKind::Config);
        }

        let mut pages = Pages::new();
        for file in files {
            if !self.parser.accepts(&file.logical_name) {
                tracing::debug!(source = %file.logical_name, "not content, skipping");
                continue;
            }

            let mut page = self.parser.parse(&file.contents, &file.logical_name)?;
            page.section = file.section.clone();
            page.dir = file.dir.clone();
            page.locate(&self.config.base_url, self.config.ugly_urls);
            if page.draft && !self.config.build_drafts {
                tracing::debug!(source = %file.logical_name, "draft, skipping");
                continue;
            }

            pages.push(Arc::new(page));
        }

        pages.sort();
        pages.link();

        let taxonomies = Taxonomies::build(&pages, self.config.plurals(), self.config.verbose);
        let sections = Index::sections(&pages);
        let info = Arc::new(SiteInfo {
            base_url: self.config.base_url.clone(),
            title: self.config.title.clone(),
            last_change: pages.first().and_then(|page| page.date),
            indexes: taxonomies.ordered(),
            pages: pages.clone(),
            params: Arc::new(self.config.params.clone()),
        });

        for page in &pages {
            page.attach(&info);
        }

        tracing::debug!(pages = pages.len(), sections = sections.len(), "processed site");
        self.pages = pages;
        self.taxonomies = taxonomies;
        self.sections = sections;
        self.info = Some(info);
        Ok(())
    }

    /// Fills in the filesystem collaborators that weren't replaced, after
    /// checking that the directories they read exist.
    fn prepare(&mut self) -> Result<()> {
        if self.source.is_some() && self.engine.is_some() {
            return Ok(());
        }

        self.config.check_dirs()?;
        if self.source.is_none() {
            let skip = self.config.abs_path(&self.config.static_dir);
            let source = source::Filesystem::new(self.config.content_path(), Some(skip.as_path()))?;
            self.source = Some(Box::new(source));
        }

        if self.engine.is_none() {
            let engine = MiniJinjaEngine::from_dir(self.config.layout_path())?;
            self.engine = Some(Arc::new(engine));
        }

        Ok(())
    }

    /// Page and per-index key counts.
    pub fn stats(&self) -> Stats {
        Stats {
            pages: self.pages.len(),
            indexes: self.taxonomies.iter()
                .map(|(plural, index)| (plural.clone(), index.len()))
                .collect(),
        }
    }

    /// Writes every page's source name, followed by where it and its
    /// aliases will be published.
    pub fn show_plan(&self, out: &mut dyn Write) -> Result<()> {
        if self.pages.is_empty() {
            writeln!(out, "no pages")?;
        }

        for page in &self.pages {
            writeln!(out, "{}", page.source)?;
            writeln!(out, " canonical => {}", self.publisher.translate(page.target_path()))?;
            for alias in &page.aliases {
                writeln!(out, " alias => {}", self.alias_publisher().translate(alias))?;
            }
        }

        Ok(())
    }

    /// Every front matter param name used by some page. Any of them could
    /// be configured as a classification field.
    pub fn possible_indexes(&self) -> Vec<Arc<str>> {
        let names: BTreeSet<_> = self.pages.iter()
            .flat_map(|page| page.params.keys().cloned())
            .collect();

        names.into_iter().collect()
    }

    fn alias_publisher(&self) -> Arc<dyn AliasPublisher> {
        match &self.aliases {
            Some(aliases) => aliases.clone(),
            None => Arc::new(target::HtmlRedirect::new(self.publisher.clone())),
        }
    }
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .field("pages", &self.pages.len())
            .field("sections", &self.sections.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Memory;

    const POST: &str = "+++\ntitle = \"First\"\ndate = \"2013-07-01\"\ntags = [\"Rust\", \"web\"]\naliases = [\"old/first/\"]\n+++\nHello *there*.\n";
    const LATER: &str = "+++\ntitle = \"Second\"\ndate = \"2013-07-02\"\ntags = \"rust\"\nseries = [\"intro\"]\n+++\nAgain.\n";
    const DRAFT: &str = "+++\ntitle = \"Draft\"\ndraft = true\n+++\nSoon.\n";

    fn site(config: Config, source: Memory) -> Site {
        Site::new(config)
            .with_source(source)
            .with_engine(Arc::new(MiniJinjaEngine::new()))
            .with_publisher(Arc::new(target::Memory::new(false)))
    }

    fn memory() -> Memory {
        Memory::new()
            .with("post/first.md", POST)
            .with("post/second.md", LATER)
            .with("post/draft.md", DRAFT)
            .with("post/image.png", [0u8, 1, 2])
            .with("about.md", "+++\ntitle = \"About\"\n+++\nMe.\n")
    }

    #[test]
    fn process_orders_links_and_indexes() {
        let mut site = site(Config::default(), memory());
        site.process().unwrap();

        let titles: Vec<_> = site.pages().iter().map(|p| p.title.to_string()).collect();
        assert_eq!(titles, vec!["Second", "First", "About"]);

        let pages = site.pages();
        assert!(pages[0].prev().is_none());
        assert!(Arc::ptr_eq(&pages[0].next().unwrap(), &pages[1]));
        assert!(Arc::ptr_eq(&pages[1].prev().unwrap(), &pages[0]));
        assert!(pages[2].next().is_none());

        let tags = &site.taxonomies()["tags"];
        assert_eq!(tags.keys().map(|k| &**k).collect::<Vec<_>>(), vec!["rust", "web"]);
        assert_eq!(tags["rust"].len(), 1);

        assert_eq!(site.sections()["post"].len(), 2);
        assert_eq!(site.sections()[""].len(), 1);

        let info = site.info().unwrap();
        assert_eq!(info.last_change, pages[0].date);
        assert!(Arc::ptr_eq(&pages[2].site().unwrap(), info));
    }

    #[test]
    fn drafts_are_opt_in() {
        let config = Config { build_drafts: true, ..Config::default() };
        let mut site = site(config, memory());
        site.process().unwrap();
        assert_eq!(site.pages().len(), 4);
    }

    #[test]
    fn parse_errors_abort() {
        let source = memory().with("post/broken.md", "+++\ntitle = \n+++\n");
        let mut site = site(Config::default(), source);
        assert_eq!(site.process().unwrap_err().kind(), ErrorKind::Parse);
    }

    #[test]
    fn stats_plan_and_possible_indexes() {
        let mut site = site(Config::default(), memory());
        site.process().unwrap();

        let stats = site.stats();
        assert_eq!(stats.pages, 3);
        assert_eq!(stats.indexes, vec![(Arc::<str>::from("categories"), 0), (Arc::<str>::from("tags"), 2)]);

        let mut plan = Vec::new();
        site.show_plan(&mut plan).unwrap();
        let plan = String::from_utf8(plan).unwrap();
        assert!(plan.contains("post/first.md\n canonical => post/first/index.html\n alias => old/first/index.html\n"));
        assert!(plan.contains("about.md\n canonical => about/index.html\n"));

        let names: Vec<_> = site.possible_indexes().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["series", "tags"]);
    }

    #[test]
    fn missing_directories_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config { root: dir.path().to_path_buf(), ..Config::default() };
        let err = Site::new(config).process().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("content directory not found"));
    }
}
