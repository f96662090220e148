use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::collections::BTreeSet;

use minijinja::Environment;
use minijinja::value::Value;
use parking_lot::RwLock;

use crate::error::{Chainable, Result};
use crate::fstree::FsTree;
use crate::templating::{Context, Engine};
use crate::util::PathExt;

/// An [`Engine`] backed by a `minijinja` environment.
///
/// Every template is parsed when it's added. Registration takes the write
/// lock and execution takes a read lock, so renders may run concurrently
/// with each other but not with a registration.
#[derive(Debug)]
pub struct MiniJinjaEngine {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    env: Environment<'static>,
    names: BTreeSet<String>,
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_filter("urlize", ext::urlize);
    env.add_filter("date", ext::date);
    env.add_filter("title", ext::title);
    env
}

impl MiniJinjaEngine {
    pub fn new() -> Self {
        let inner = Inner { env: environment(), names: BTreeSet::new() };
        MiniJinjaEngine { inner: RwLock::new(inner) }
    }

    /// Loads every non-hidden file under `root`, named by its path relative
    /// to `root`.
    pub fn from_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let engine = MiniJinjaEngine::new();
        let tree = FsTree::build(root)?;
        for entry in tree.files(|e| e.is_hidden()) {
            let name = entry.relative_path().to_slash_lossy();
            let source = std::fs::read_to_string(&entry.path).chain_with(|| error! {
                "failed to read layout",
                "path" => entry.path.display(),
            })?;

            engine.add_template(&name, &source)?;
        }

        tracing::debug!(root = %root.display(), templates = engine.inner.read().names.len(), "loaded layouts");
        Ok(engine)
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        MiniJinjaEngine::new()
    }
}

impl Engine for MiniJinjaEngine {
    fn add_template(&self, name: &str, source: &str) -> Result<()> {
        let mut inner = self.inner.write();
        inner.env.add_template_owned(name.to_owned(), source.to_owned())
            .chain_with(|| error!("invalid template", "name" => name))?;

        inner.names.insert(name.to_owned());
        Ok(())
    }

    fn lookup(&self, name: &str) -> bool {
        self.inner.read().names.contains(name)
    }

    fn execute(&self, name: &str, context: &Context, output: &mut dyn Write) -> Result<()> {
        let inner = self.inner.read();
        let template = inner.env.get_template(name)?;
        let context = Value::from_object(objects::Root::from(context.clone()));
        template.render_to_write(context, output)
            .chain_with(|| error!("template execution failed", "template" => name))?;

        Ok(())
    }

    fn template_names(&self) -> Vec<String> {
        self.inner.read().names.iter().cloned().collect()
    }
}

mod ext {
    use chrono::DateTime;
    use minijinja::{Error, ErrorKind};
    use minijinja::value::Value;

    use crate::page::parse_date;

    pub fn urlize(value: &str) -> Value {
        Value::from_safe_string(crate::util::urlize(value))
    }

    pub fn title(value: &str) -> String {
        crate::util::title_case(value)
    }

    pub fn date(value: &str, fmt: Option<&str>) -> Result<String, Error> {
        let fmt = fmt.unwrap_or("%Y-%m-%d");
        if let Ok(date) = DateTime::parse_from_rfc3339(value) {
            return Ok(date.format(fmt).to_string());
        }

        let datetime = parse_date(value).map_err(|_| Error::new(
            ErrorKind::InvalidOperation,
            format!("`date` expects a date, found `{value}`")
        ))?;

        Ok(datetime.format(fmt).to_string())
    }
}

/// Template-facing views of the typed site structures.
mod objects {
    use std::sync::Arc;

    use chrono::NaiveDateTime;
    use minijinja::value::{Enumerator, Object, ObjectRepr, Value};

    use crate::page::{Page, Pages};
    use crate::site::{Data, Node, SiteInfo};
    use crate::shortcode::ShortcodeCall;
    use crate::taxonomy::{Index, IndexEntry, OrderedIndex, OrderedTaxonomies};
    use crate::templating::Context;
    use crate::value::{self, Dict, TOML_DATETIME_KEY};

    /// Format used for every date handed to templates.
    const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    fn date(date: Option<NaiveDateTime>) -> Value {
        date.map_or(Value::UNDEFINED, |d| Value::from(d.format(DATE_FORMAT).to_string()))
    }

    fn safe(string: &str) -> Value {
        Value::from_safe_string(string.to_owned())
    }

    macro_rules! str_fields {
        ($($name:literal),* $(,)?) => (
            Enumerator::Str(&[$($name),*])
        )
    }

    /// The root of every template context. `page`, `node` and `site` name
    /// the parts; any other key is looked up on the renderable itself.
    #[derive(Debug)]
    pub struct Root(Context);

    impl From<Context> for Root {
        fn from(value: Context) -> Self {
            Root(value)
        }
    }

    impl Object for Root {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            let inner = match &self.0 {
                Context::Page(page) => Value::from_object(PageView(page.clone())),
                Context::Node(node) => Value::from_object(NodeView(node.clone())),
                Context::Shortcode(call) => Value::from_object(ShortcodeView(call.clone())),
            };

            let site = match &self.0 {
                Context::Page(page) => page.site(),
                Context::Node(node) => Some(node.site.clone()),
                Context::Shortcode(call) => call.page.site(),
            };

            match (key.as_str()?, &self.0) {
                ("page", Context::Page(_)) => Some(inner),
                ("page", Context::Shortcode(call)) => Some(Value::from_object(PageView(call.page.clone()))),
                ("node", Context::Node(_)) => Some(inner),
                ("site", _) => site.map(|s| Value::from_object(SiteView(s))),
                _ => inner.get_attr(key.as_str()?).ok().filter(|v| !v.is_undefined()),
            }
        }
    }

    #[derive(Debug)]
    pub struct PageView(pub Arc<Page>);

    impl Object for PageView {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            let page = &self.0;
            let value = match key.as_str()? {
                "title" => Value::from(page.title.clone()),
                "content" => safe(&page.content()),
                "summary" => safe(&page.summary()),
                "description" => Value::from(page.description.clone()?),
                "date" => date(page.date),
                "draft" => Value::from(page.draft),
                "section" => Value::from(page.section.clone()),
                "source" => Value::from(page.source.clone()),
                "permalink" => safe(page.permalink()),
                "rel_permalink" | "url" => safe(page.rel_permalink()),
                "aliases" => page.aliases.iter().cloned().map(Value::from).collect(),
                "prev" => Value::from_object(PageView(page.prev()?)),
                "next" => Value::from_object(PageView(page.next()?)),
                "params" => Value::from_object(DictView(Arc::new(page.params.clone()))),
                "site" => Value::from_object(SiteView(page.site()?)),
                other => from_value(page.params.get(other)?.clone()),
            };

            Some(value)
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            str_fields![
                "title", "content", "summary", "description", "date", "draft",
                "section", "source", "permalink", "rel_permalink", "url",
                "aliases", "prev", "next", "params", "site",
            ]
        }
    }

    #[derive(Debug)]
    pub struct NodeView(pub Arc<Node>);

    impl Object for NodeView {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            let node = &self.0;
            let value = match key.as_str()? {
                "title" => Value::from(node.title.clone()),
                "url" => safe(&node.url),
                "permalink" => safe(&node.permalink),
                "rss_link" => safe(node.rss_link.as_ref()?),
                "date" => date(node.date),
                "data" => Value::from_object(DataView(node.clone())),
                "site" => Value::from_object(SiteView(node.site.clone())),
                _ => return None,
            };

            Some(value)
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            str_fields!["title", "url", "permalink", "rss_link", "date", "data", "site"]
        }
    }

    /// A node's free-form data.
    #[derive(Debug)]
    pub struct DataView(Arc<Node>);

    fn from_data(data: &Data) -> Value {
        match data {
            Data::Pages(pages) => Value::from_object(PagesView(pages.clone())),
            Data::Index(index) => Value::from_object(IndexView(index.clone())),
            Data::OrderedIndex(index) => Value::from_object(OrderedIndexView(index.clone())),
            Data::Value(value) => from_value(value.clone()),
        }
    }

    impl Object for DataView {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            self.0.data.get(key.as_str()?).map(from_data)
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            Enumerator::Values(self.0.data.keys().cloned().map(Value::from).collect())
        }
    }

    #[derive(Debug)]
    pub struct SiteView(pub Arc<SiteInfo>);

    impl Object for SiteView {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            let site = &self.0;
            let value = match key.as_str()? {
                "base_url" => safe(&site.base_url),
                "title" => Value::from(site.title.clone()),
                "last_change" => date(site.last_change),
                "indexes" => Value::from_object(TaxonomiesView(site.indexes.clone())),
                "pages" => Value::from_object(PagesView(site.pages.clone())),
                "recent" => Value::from_object(PagesView(site.pages.recent(crate::site::RECENT_PAGES))),
                "params" => Value::from_object(DictView(site.params.clone())),
                _ => return None,
            };

            Some(value)
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            str_fields!["base_url", "title", "last_change", "indexes", "pages", "recent", "params"]
        }
    }

    #[derive(Debug)]
    pub struct PagesView(pub Pages);

    impl Object for PagesView {
        fn repr(self: &Arc<Self>) -> ObjectRepr {
            ObjectRepr::Seq
        }

        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            let page = self.0.get(key.as_usize()?)?;
            Some(Value::from_object(PageView(page.clone())))
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            Enumerator::Seq(self.0.len())
        }
    }

    #[derive(Debug)]
    pub struct IndexView(pub Index);

    impl Object for IndexView {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            let pages = self.0.get(key.as_str()?)?;
            Some(Value::from_object(PagesView(pages.clone())))
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            Enumerator::Values(self.0.keys().cloned().map(Value::from).collect())
        }
    }

    #[derive(Debug)]
    pub struct OrderedIndexView(pub OrderedIndex);

    impl Object for OrderedIndexView {
        fn repr(self: &Arc<Self>) -> ObjectRepr {
            ObjectRepr::Seq
        }

        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            let entry = self.0.get(key.as_usize()?)?;
            Some(Value::from_object(EntryView(entry.clone())))
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            Enumerator::Seq(self.0.len())
        }
    }

    #[derive(Debug)]
    pub struct EntryView(pub IndexEntry);

    impl Object for EntryView {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            let value = match key.as_str()? {
                "key" => Value::from(self.0.key.clone()),
                "count" => Value::from(self.0.pages.len()),
                "pages" => Value::from_object(PagesView(self.0.pages.clone())),
                _ => return None,
            };

            Some(value)
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            str_fields!["key", "count", "pages"]
        }
    }

    #[derive(Debug)]
    pub struct TaxonomiesView(pub OrderedTaxonomies);

    impl Object for TaxonomiesView {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            let index = self.0.get(key.as_str()?)?;
            Some(Value::from_object(OrderedIndexView(index.clone())))
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            Enumerator::Values(self.0.keys().cloned().map(Value::from).collect())
        }
    }

    #[derive(Debug)]
    pub struct ShortcodeView(pub Arc<ShortcodeCall>);

    impl Object for ShortcodeView {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            let call = &self.0;
            let value = match key.as_str()? {
                "name" => Value::from(call.name.clone()),
                "args" => call.args.iter().cloned().map(Value::from).collect(),
                "params" => Value::from_object(DictView(Arc::new(call.params.clone()))),
                _ => return None,
            };

            Some(value)
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            str_fields!["name", "args", "params"]
        }
    }

    #[derive(Debug)]
    pub struct DictView(pub Arc<Dict>);

    impl Object for DictView {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            self.0.get(key.as_str()?).cloned().map(from_value)
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            Enumerator::Values(self.0.keys().cloned().map(Value::from).collect())
        }
    }

    pub fn from_value(value: value::Value) -> Value {
        use crate::value::Value as V;

        match value {
            V::Null => Value::from(()),
            V::Bool(b) => Value::from(b),
            V::Num(n) => match n.to_u128_lossy() {
                Ok(v) => Value::from(v),
                Err(v) => Value::from(v),
            },
            V::Float(f) => Value::from(f),
            V::String(s) => Value::from(s),
            V::Array(a) => a.iter().cloned().map(from_value).collect(),
            V::Dict(d) => match d.get(TOML_DATETIME_KEY).and_then(|v| v.as_str()) {
                Some(datetime) if d.len() == 1 => Value::from(datetime),
                _ => Value::from_object(DictView(d)),
            },
        }
    }
}
