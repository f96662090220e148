use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{Chainable, ErrorKind, Result};
use crate::page::{Page, PageKind, Pages};
use crate::site::{Data, Node, Site, SiteInfo, RECENT_PAGES};
use crate::templating::{find_first_layout, Context, Engine};
use crate::timer::Timer;
use crate::transform::{AbsUrl, Chain, NavActive, PipeReader};
use crate::url::UrlBuf;
use crate::util::{title_case, urlize};
use crate::value::Value;

const FEED: &str = "rss.xml";
const HOME: &str = "index.html";
const NOT_FOUND: &str = "404.html";
const INDEX_OF_INDEXES: &str = "indexes/indexes.html";
const DEFAULT_SINGLE: &str = "_default/single.html";
const DEFAULT_LIST: &str = "_default/indexes.html";

/// Everything one render pass needs.
struct Pass<'a> {
    site: &'a Site,
    info: &'a Arc<SiteInfo>,
    engine: &'a dyn Engine,
}

impl Site {
    /// Renders every artifact of a processed site.
    pub fn render(&self) -> Result<()> {
        self.render_timed(&mut Timer::new())
    }

    pub(crate) fn render_timed(&self, timer: &mut Timer) -> Result<()> {
        let (Some(info), Some(engine)) = (&self.info, &self.engine) else {
            return err!("site must be processed before it's rendered").kind(ErrorKind::Config);
        };

        let pass = Pass { site: self, info, engine: &**engine };
        pass.run(timer).map_err(|e| {
            let templates = engine.template_names();
            tracing::error!(?templates, "render failed: {e}");
            e.chain(error! {
                "failed to render site",
                "known templates" => templates.join(", "),
            })
        })
    }

    fn for_each<T, F>(&self, items: Vec<T>, f: F) -> Result<()>
        where T: Send, F: Fn(T) -> Result<()> + Send + Sync
    {
        match self.config.parallel {
            true => items.into_par_iter().map(f).collect(),
            false => items.into_iter().try_for_each(f),
        }
    }

    /// The site-relative URL of a node published at the directory `path`.
    fn node_url(&self, path: &str) -> String {
        format!("/{}/", path.trim_matches('/'))
    }
}

impl Pass<'_> {
    fn run(&self, timer: &mut Timer) -> Result<()> {
        self.aliases()?;
        timer.step("aliases");
        self.shortcodes();
        timer.step("shortcodes");
        self.taxonomy_terms()?;
        timer.step("taxonomies");
        self.index_of_indexes()?;
        timer.step("indexes");
        self.sections()?;
        timer.step("sections");
        self.pages()?;
        timer.step("pages");
        self.home()?;
        timer.step("home");
        Ok(())
    }

    /// Executes `layout` against `context` and streams the output through
    /// the transform chain into `consume`.
    fn stream<C>(&self, context: &Context, layout: &str, nav: &str, consume: C) -> Result<()>
        where C: FnOnce(&mut PipeReader) -> Result<()>
    {
        let chain = Chain::new()
            .stage(AbsUrl::new(self.site.config.base_url.as_str()))
            .stage(NavActive::new(nav));

        let engine = self.engine;
        chain.stream(|head| engine.execute(layout, context, head), consume)
    }

    fn publish(&self, context: &Context, layout: &str, path: &str, nav: &str) -> Result<()> {
        let publisher = &self.site.publisher;
        self.stream(context, layout, nav, |tail| publisher.publish(path, tail))
            .chain_with(|| error! {
                "failed to render",
                "layout" => layout,
                "path" => path,
            })
    }

    fn feed_link(&self, path: &str) -> Option<String> {
        self.engine.lookup(FEED).then(|| UrlBuf::join(&self.info.base_url, path).into())
    }

    /// Publishes the feed of `node` at `path`. The feed node's own URL is
    /// the feed's.
    fn publish_feed(&self, node: &Node, path: &str) -> Result<()> {
        let url = format!("/{}", path.trim_start_matches('/'));
        let feed = Node {
            permalink: UrlBuf::join(&self.info.base_url, &url).into(),
            url,
            ..node.clone()
        };

        self.publish(&Context::Node(Arc::new(feed)), FEED, path, "")
    }

    fn aliases(&self) -> Result<()> {
        let aliases = self.site.alias_publisher();
        for page in &self.site.pages {
            for alias in &page.aliases {
                aliases.publish_alias(alias, page.permalink())?;
            }
        }

        Ok(())
    }

    fn shortcodes(&self) {
        let expander = &self.site.shortcodes;
        for page in &self.site.pages {
            let content = expander.expand(&page.content(), page, self.engine);
            page.set_content(content);

            let summary = expander.expand(&page.summary(), page, self.engine);
            page.set_summary(summary);
        }
    }

    /// One page per key of every classification field, plus its feed.
    fn taxonomy_terms(&self) -> Result<()> {
        for (plural, index) in self.site.taxonomies.iter() {
            if index.is_empty() {
                continue;
            }

            let singular = self.site.config.singular(plural).cloned().unwrap_or_else(|| plural.clone());
            let layout = format!("indexes/{singular}.html");
            if !self.engine.lookup(&layout) {
                return err! {
                    "no layout for taxonomy",
                    "taxonomy" => plural,
                    "expected layout" => layout,
                }.kind(ErrorKind::Layout);
            }

            let terms: Vec<(&Arc<str>, &Pages)> = index.iter().collect();
            self.site.for_each(terms, |(key, pages)| {
                let base = format!("{plural}/{}", urlize(key));
                let url = match self.site.config.ugly_urls {
                    true => format!("/{base}.html"),
                    false => self.site.node_url(&base),
                };

                let mut node = Node::new(self.info, title_case(key), url)
                    .with(&singular, Data::Pages(pages.clone()))
                    .with("Pages", Data::Pages(pages.clone()));

                node.date = pages.first().and_then(|page| page.date);
                node.rss_link = self.feed_link(&format!("/{base}.xml"));

                let node = Arc::new(node);
                let context = Context::Node(node.clone());
                self.publish(&context, &layout, &format!("{base}.html"), &node.url)?;
                if node.rss_link.is_some() {
                    self.publish_feed(&node, &format!("{base}.xml"))?;
                }

                Ok(())
            })?;
        }

        Ok(())
    }

    /// One listing per classification field, only if the site has a layout
    /// for it.
    fn index_of_indexes(&self) -> Result<()> {
        if !self.engine.lookup(INDEX_OF_INDEXES) {
            tracing::debug!("no {INDEX_OF_INDEXES}, skipping index of indexes");
            return Ok(());
        }

        for (plural, index) in self.site.taxonomies.iter() {
            let singular = self.site.config.singular(plural).cloned().unwrap_or_else(|| plural.clone());
            let node = Node::new(self.info, title_case(plural), self.site.node_url(plural))
                .with("Singular", Data::Value(Value::from(singular)))
                .with("Plural", Data::Value(Value::from(plural.clone())))
                .with("Index", Data::Index(index.clone()))
                .with("OrderedIndex", Data::OrderedIndex(index.ordered()));

            let context = Context::Node(Arc::new(node));
            self.publish(&context, INDEX_OF_INDEXES, &format!("{plural}/index.html"), "")?;
        }

        Ok(())
    }

    /// One list per non-empty section, plus its feed.
    fn sections(&self) -> Result<()> {
        for (section, pages) in self.site.sections.iter() {
            if section.is_empty() {
                continue;
            }

            let layouts = [format!("indexes/{section}.html"), DEFAULT_LIST.to_owned()];
            let Some(layout) = find_first_layout(self.engine, &layouts) else {
                return err! {
                    "no layout for section",
                    "section" => section,
                    "tried" => layouts.join(", "),
                }.kind(ErrorKind::Layout);
            };

            let path = urlize(section);
            let mut node = Node::new(self.info, title_case(section), self.site.node_url(&path))
                .with("Pages", Data::Pages(pages.clone()));

            node.date = pages.first().and_then(|page| page.date);
            node.rss_link = self.feed_link(&format!("/{path}.xml"));

            let node = Arc::new(node);
            let context = Context::Node(node.clone());
            self.publish(&context, layout, &path, &node.url)?;
            if node.rss_link.is_some() {
                self.publish_feed(&node, &format!("{path}.xml"))?;
            }
        }

        Ok(())
    }

    fn pages(&self) -> Result<()> {
        let pages: Vec<&Arc<Page>> = self.site.pages.iter().collect();
        self.site.for_each(pages, |page| self.page(page))
    }

    fn page(&self, page: &Arc<Page>) -> Result<()> {
        let layout = match page.kind {
            PageKind::Verbatim => {
                let name = page.self_template();
                self.engine.add_template(&name, &page.content())
                    .chain_with(|| error!("invalid page body", "source" => page.source))?;

                name
            }
            PageKind::Templated => {
                let mut layouts = page.layouts();
                layouts.push(DEFAULT_SINGLE.to_owned());
                match find_first_layout(self.engine, &layouts) {
                    Some(layout) => layout.to_owned(),
                    None => {
                        if self.site.config.verbose {
                            tracing::warn!(source = %page.source, ?layouts, "no layout for page");
                        }

                        return err! {
                            "no layout for page",
                            "source" => page.source,
                            "tried" => layouts.join(", "),
                        }.kind(ErrorKind::Layout);
                    }
                }
            }
        };

        let context = Context::Page(page.clone());
        self.publish(&context, &layout, page.target_path(), page.rel_permalink())
    }

    /// The home page, and the site feed and 404 page if there are layouts
    /// for them.
    fn home(&self) -> Result<()> {
        let recent = self.site.pages.recent(RECENT_PAGES);
        if !self.engine.lookup(HOME) {
            return err!("no layout for home page", "expected layout" => HOME).kind(ErrorKind::Layout);
        }

        let mut home = Node::new(self.info, self.info.title.clone(), "/")
            .with("Pages", Data::Pages(recent));

        home.date = self.info.last_change;
        home.rss_link = self.feed_link("/index.xml");
        let home = Arc::new(home);
        self.publish(&Context::Node(home.clone()), HOME, "/", "")?;

        if home.rss_link.is_some() {
            let feed = Node { title: "Recent Content".into(), ..(*home).clone() };
            self.publish_feed(&feed, "index.xml")?;
        }

        if self.engine.lookup(NOT_FOUND) {
            let node = Node::new(self.info, "404 Page not found", format!("/{NOT_FOUND}"));
            let publisher = &self.site.publisher;
            self.stream(&Context::Node(Arc::new(node)), NOT_FOUND, "", |tail| publisher.write(NOT_FOUND, tail))
                .chain_with(|| error!("failed to render", "layout" => NOT_FOUND))?;
        }

        Ok(())
    }
}
