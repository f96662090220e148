//! Groupings of pages by classification field and by section.

use std::sync::Arc;
use std::collections::BTreeMap;

use crate::page::{Page, Pages};

/// Pages grouped by key. Keys are lowercased.
#[derive(Debug, Default, Clone, derive_more::Deref)]
pub struct Index(BTreeMap<Arc<str>, Pages>);

/// One [`Index`] per classification field, keyed by the field's plural name.
#[derive(Debug, Default, Clone, derive_more::Deref)]
pub struct Taxonomies(BTreeMap<Arc<str>, Index>);

/// An index flattened into `(key, pages)` entries, most populated first.
#[derive(Debug, Default, Clone, derive_more::Deref)]
pub struct OrderedIndex(Vec<IndexEntry>);

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub key: Arc<str>,
    pub pages: Pages,
}

/// The [`OrderedIndex`] of every classification field.
#[derive(Debug, Default, Clone, derive_more::Deref)]
pub struct OrderedTaxonomies(BTreeMap<Arc<str>, OrderedIndex>);

impl Index {
    pub fn new() -> Self {
        Index::default()
    }

    /// Adds `page` under `key`. Adding twice adds twice.
    pub fn add(&mut self, key: &str, page: Arc<Page>) {
        let key = key.to_lowercase();
        match self.0.get_mut(key.as_str()) {
            Some(pages) => pages.push(page),
            None => { self.0.insert(key.into(), Pages::from(vec![page])); }
        }
    }

    /// Sorts every key's pages, newest first.
    pub fn sort(&mut self) {
        self.0.values_mut().for_each(Pages::sort);
    }

    /// Entries ordered by page count, descending, then by key.
    pub fn ordered(&self) -> OrderedIndex {
        let mut entries: Vec<_> = self.0.iter()
            .map(|(key, pages)| IndexEntry { key: key.clone(), pages: pages.clone() })
            .collect();

        entries.sort_by(|a, b| b.pages.len().cmp(&a.pages.len()).then_with(|| a.key.cmp(&b.key)));
        OrderedIndex(entries)
    }

    /// Groups `pages` by section.
    pub fn sections(pages: &Pages) -> Index {
        let mut index = Index::new();
        for page in pages {
            index.add(&page.section, page.clone());
        }

        index.sort();
        index
    }
}

impl Taxonomies {
    /// Indexes `pages` by every field in `plurals`.
    ///
    /// A page is added once per string in its field value. A value that
    /// isn't a list of strings is skipped, with a warning if `verbose`.
    pub fn build<'a, I>(pages: &Pages, plurals: I, verbose: bool) -> Taxonomies
        where I: IntoIterator<Item = &'a Arc<str>>
    {
        let mut taxonomies = BTreeMap::new();
        for plural in plurals {
            let mut index = Index::new();
            for page in pages {
                let Some(value) = page.params.get(&**plural) else {
                    continue;
                };

                match value.as_str_list() {
                    Some(keys) => keys.into_iter().for_each(|key| index.add(key, page.clone())),
                    None if verbose => tracing::warn!(
                        field = %plural,
                        source = %page.source,
                        found = value.kind(),
                        "invalid classification value, expected a list of strings"
                    ),
                    None => tracing::debug!(field = %plural, source = %page.source, "invalid classification value"),
                }
            }

            index.sort();
            taxonomies.insert(plural.clone(), index);
        }

        Taxonomies(taxonomies)
    }

    pub fn ordered(&self) -> OrderedTaxonomies {
        OrderedTaxonomies(self.0.iter().map(|(k, v)| (k.clone(), v.ordered())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageKind;
    use crate::value::Value;
    use chrono::NaiveDate;

    fn page(name: &str, day: u32, section: &str, params: &[(&str, Value)]) -> Arc<Page> {
        let mut page = Page::new(name, PageKind::Templated, "", "");
        page.date = NaiveDate::from_ymd_opt(2013, 7, day).and_then(|d| d.and_hms_opt(0, 0, 0));
        page.section = section.into();
        page.params = params.iter().map(|(k, v)| (Arc::from(*k), v.clone())).collect();
        Arc::new(page)
    }

    fn names(pages: &Pages) -> Vec<&str> {
        pages.iter().map(|p| &*p.source).collect()
    }

    #[test]
    fn groups_by_each_tag() {
        let first = page("first", 2, "post", &[("tags", vec!["x", "y"].into())]);
        let second = page("second", 1, "post", &[("tags", vec!["X"].into())]);
        let pages = Pages::from(vec![first, second]);

        let plurals = [Arc::<str>::from("tags")];
        let taxonomies = Taxonomies::build(&pages, &plurals, false);
        let tags = &taxonomies["tags"];
        assert_eq!(tags.len(), 2);
        assert_eq!(names(&tags["x"]), vec!["first", "second"]);
        assert_eq!(names(&tags["y"]), vec!["first"]);
    }

    #[test]
    fn groups_are_sorted_newest_first() {
        let old = page("old", 1, "", &[("tags", vec!["x"].into())]);
        let new = page("new", 9, "", &[("tags", vec!["x"].into())]);
        let pages = Pages::from(vec![old, new]);

        let plurals = [Arc::<str>::from("tags")];
        let taxonomies = Taxonomies::build(&pages, &plurals, true);
        assert_eq!(names(&taxonomies["tags"]["x"]), vec!["new", "old"]);
    }

    #[test]
    fn non_list_values_are_skipped() {
        let good = page("good", 2, "post", &[("tags", vec!["x"].into())]);
        let single = page("single", 3, "post", &[("tags", "x".into())]);
        let mixed = page("mixed", 4, "note", &[("tags", vec![Value::from("x"), Value::from(1u8)].into())]);
        let pages = Pages::from(vec![good, single, mixed]);

        let plurals = [Arc::<str>::from("tags")];
        let taxonomies = Taxonomies::build(&pages, &plurals, true);
        assert_eq!(names(&taxonomies["tags"]["x"]), vec!["good"]);

        let sections = Index::sections(&pages);
        assert_eq!(names(&sections["post"]), vec!["single", "good"]);
        assert_eq!(names(&sections["note"]), vec!["mixed"]);
    }

    #[test]
    fn ordered_by_count_then_key() {
        let a = page("a", 1, "", &[("tags", vec!["rust", "go", "c"].into())]);
        let b = page("b", 2, "", &[("tags", vec!["rust", "c"].into())]);
        let c = page("c", 3, "", &[("tags", vec!["zig", "c"].into())]);
        let pages = Pages::from(vec![a, b, c]);

        let plurals = [Arc::<str>::from("tags")];
        let ordered = Taxonomies::build(&pages, &plurals, false).ordered();
        let keys: Vec<_> = ordered["tags"].iter().map(|e| (&*e.key, e.pages.len())).collect();
        assert_eq!(keys, vec![("c", 3), ("rust", 2), ("go", 1), ("zig", 1)]);
    }

    #[test]
    fn missing_field_yields_empty_index() {
        let pages = Pages::from(vec![page("a", 1, "", &[])]);
        let plurals = [Arc::<str>::from("categories")];
        let taxonomies = Taxonomies::build(&pages, &plurals, false);
        assert!(taxonomies["categories"].is_empty());
    }
}
