use std::io::Read;
use std::sync::Arc;

use quire::{Config, Site, Timer};
use quire::error::{ErrorKind, Result};
use quire::source::Memory;
use quire::target::{self, Publisher};
use quire::templating::Engine;
use quire::templating::minijinja::MiniJinjaEngine;

const FIRST: &str = r#"+++
title = "First"
date = "2013-07-01"
tags = ["Rust", "Web"]
aliases = ["old/first.html"]
+++
Hello {{< shout hi >}}

<!--more-->

Read [about me](/about/).
"#;

const SECOND: &str = r#"+++
title = "Second"
date = 2013-07-02T10:00:00Z
tags = ["rust"]
+++
Again.
"#;

const ABOUT: &str = r#"+++
title = "About"
+++
<h1>{{ page.title }}</h1><a href="/post/first/">first</a>"#;

const LAYOUTS: &[(&str, &str)] = &[
    ("_default/single.html", concat!(
        r#"<nav><ul><li data-nav="post/first"><a href="/post/first/">First</a></li></ul></nav>"#,
        "<h1>{{ title }}</h1>{{ content }}",
    )),
    ("_default/indexes.html", "<h1>{{ title }}</h1>{% for p in data.Pages %}{{ p.title }};{% endfor %}"),
    ("indexes/tag.html", r#"<h1>{{ title }}</h1>{% for p in data.tag %}<a href="{{ p.url }}">{{ p.title }}</a>{% endfor %}"#),
    ("index.html", "{{ site.title }}:{% for p in data.Pages %}{{ p.title }},{% endfor %}"),
    ("rss.xml", "<rss><title>{{ title }}</title><self>{{ permalink }}</self>{% for p in data.Pages %}<link>{{ p.permalink }}</link>{% endfor %}</rss>"),
    ("404.html", "not found"),
    ("shortcodes/shout.html", "<strong>{{ args[0] | upper }}</strong>"),
];

fn config() -> Config {
    Config {
        base_url: "http://example.com".into(),
        title: "Example".into(),
        ..Config::default()
    }
}

fn content() -> Memory {
    Memory::new()
        .with("post/first.md", FIRST)
        .with("post/second.md", SECOND)
        .with("about.html", ABOUT)
}

fn engine(skip: &[&str]) -> Arc<MiniJinjaEngine> {
    let engine = MiniJinjaEngine::new();
    for (name, source) in LAYOUTS.iter().filter(|(name, _)| !skip.contains(name)) {
        engine.add_template(name, source).unwrap();
    }

    Arc::new(engine)
}

fn build(config: Config, content: Memory, engine: Arc<MiniJinjaEngine>) -> (Result<()>, Arc<target::Memory>) {
    let publisher = Arc::new(target::Memory::new(config.ugly_urls));
    let mut site = Site::new(config)
        .with_source(content)
        .with_engine(engine)
        .with_publisher(publisher.clone());

    (site.build(&mut Timer::new()), publisher)
}

#[test]
fn builds_every_artifact() {
    let (result, output) = build(config(), content(), engine(&[]));
    result.unwrap();

    assert_eq!(output.paths(), vec![
        "404.html",
        "about/index.html",
        "index.html",
        "index.xml",
        "old/first.html",
        "post.xml",
        "post/first/index.html",
        "post/index.html",
        "post/second/index.html",
        "tags/rust.xml",
        "tags/rust/index.html",
        "tags/web.xml",
        "tags/web/index.html",
    ]);

    let first = output.get("post/first/index.html").unwrap();
    assert!(first.contains(r#"<li class="active" data-nav="post/first">"#));
    assert!(first.contains(r#"<a href="http://example.com/post/first/">First</a>"#));
    assert!(first.contains("<h1>First</h1>"));
    assert!(first.contains("Hello <strong>HI</strong>"));
    assert!(first.contains(r#"<a href="http://example.com/about/">about me</a>"#));

    let second = output.get("post/second/index.html").unwrap();
    assert!(second.contains(r#"<li data-nav="post/first">"#));

    let about = output.get("about/index.html").unwrap();
    assert_eq!(about, r#"<h1>About</h1><a href="http://example.com/post/first/">first</a>"#);

    let rust = output.get("tags/rust/index.html").unwrap();
    assert_eq!(rust, concat!(
        "<h1>Rust</h1>",
        r#"<a href="http://example.com/post/second/">Second</a>"#,
        r#"<a href="http://example.com/post/first/">First</a>"#,
    ));

    let feed = output.get("tags/web.xml").unwrap();
    assert_eq!(feed, concat!(
        "<rss><title>Web</title><self>http://example.com/tags/web.xml</self>",
        "<link>http://example.com/post/first/</link></rss>",
    ));

    let feed = output.get("post.xml").unwrap();
    assert!(feed.starts_with("<rss><title>Post</title><self>http://example.com/post.xml</self>"));

    assert_eq!(output.get("post/index.html").unwrap(), "<h1>Post</h1>Second;First;");
    assert_eq!(output.get("index.html").unwrap(), "Example:Second,First,About,");
    assert!(output.get("index.xml").unwrap()
        .starts_with("<rss><title>Recent Content</title><self>http://example.com/index.xml</self>"));
    assert_eq!(output.get("404.html").unwrap(), "not found");

    let redirect = output.get("old/first.html").unwrap();
    assert!(redirect.contains(r#"<meta http-equiv="refresh" content="0;url=http://example.com/post/first/"/>"#));

    // Root-level pages get no section list or feed of their own.
    assert!(output.get(".xml").is_none());
    assert!(output.paths().iter().all(|p| !p.starts_with('.')));
}

#[test]
fn index_of_indexes() {
    let engine = engine(&[]);
    engine.add_template("indexes/indexes.html", concat!(
        "{{ title }} {{ data.Singular }}/{{ data.Plural }}:",
        "{% for e in data.OrderedIndex %}{{ e.key }}={{ e.count }},{% endfor %}|",
        "{% for k in data.Index %}{{ k }}={{ data.Index[k] | length }};{% endfor %}",
    )).unwrap();

    let third = "+++\ntitle = \"Third\"\ndate = \"2013-06-01\"\ntags = [\"Go\"]\n+++\nThree.\n";
    let (result, output) = build(config(), content().with("post/third.md", third), engine);
    result.unwrap();

    assert_eq!(output.get("tags/index.html").unwrap(), "Tags tag/tags:rust=2,go=1,web=1,|go=1;rust=2;web=1;");
    assert_eq!(output.get("categories/index.html").unwrap(), "Categories category/categories:|");
}

#[test]
fn escaping_alias_fails_the_build() {
    let root = tempfile::tempdir().unwrap();
    let page = "+++\ntitle = \"A\"\naliases = [\"../../escaped\"]\n+++\nbody";
    let config = Config { root: root.path().join("site"), ..config() };
    let mut site = Site::new(config)
        .with_source(Memory::new().with("a.md", page))
        .with_engine(engine(&[]));

    let err = site.build(&mut Timer::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Publish);
    assert!(!root.path().join("escaped").exists());
}

#[test]
fn parallel_build_publishes_the_same_paths() {
    let (result, sequential) = build(config(), content(), engine(&[]));
    result.unwrap();

    let config = Config { parallel: true, ..config() };
    let (result, parallel) = build(config, content(), engine(&[]));
    result.unwrap();

    assert_eq!(sequential.paths(), parallel.paths());
    for path in sequential.paths() {
        assert_eq!(sequential.get(&path), parallel.get(&path), "{path}");
    }
}

#[test]
fn ugly_urls() {
    let config = Config { ugly_urls: true, ..config() };
    let (result, output) = build(config, content(), engine(&[]));
    result.unwrap();

    let paths = output.paths();
    assert!(paths.contains(&"post/first.html".to_string()));
    assert!(paths.contains(&"tags/rust.html".to_string()));

    let rust = output.get("tags/rust.html").unwrap();
    assert!(rust.contains(r#"href="http://example.com/post/first.html""#));
}

#[test]
fn optional_layouts_are_skipped() {
    let (result, output) = build(config(), content(), engine(&["rss.xml", "404.html"]));
    result.unwrap();

    let paths = output.paths();
    assert!(paths.iter().all(|p| !p.ends_with(".xml")));
    assert!(!paths.contains(&"404.html".to_string()));
    assert!(paths.contains(&"index.html".to_string()));
}

#[test]
fn zero_sources_fail_before_publishing() {
    let (result, output) = build(config(), Memory::new(), engine(&[]));

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("no source files found"));
    assert!(output.is_empty());
}

#[test]
fn missing_page_layout_is_fatal() {
    let (result, output) = build(config(), content(), engine(&["_default/single.html"]));

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Layout);

    let message = err.to_string();
    assert!(message.contains("no layout for page"));
    assert!(message.contains("known templates"));
    assert!(message.contains("indexes/tag.html"));

    // Everything rendered before the pages stays published.
    assert!(output.get("old/first.html").is_some());
    assert!(output.get("tags/rust/index.html").is_some());
    assert!(output.get("index.html").is_none());
}

#[test]
fn missing_taxonomy_layout_is_fatal() {
    let (result, _) = build(config(), content(), engine(&["indexes/tag.html"]));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Layout);
}

struct Refusing;

impl Publisher for Refusing {
    fn translate(&self, path: &str) -> String {
        target::translate(path, false)
    }

    fn write(&self, path: &str, reader: &mut dyn Read) -> Result<()> {
        let mut buf = [0; 8];
        reader.read(&mut buf)?;
        quire::err!("disk full", "path" => path).map_err(|e| e.with_kind(ErrorKind::Publish))
    }
}

#[test]
fn publish_failure_aborts_the_build() {
    let mut site = Site::new(config())
        .with_source(content())
        .with_engine(engine(&[]))
        .with_publisher(Arc::new(Refusing));

    let err = site.build(&mut Timer::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Publish);
    assert!(err.to_string().contains("disk full"));
}

#[test]
fn filesystem_build() {
    let root = tempfile::tempdir().unwrap();
    let path = |p: &str| root.path().join(p);

    std::fs::create_dir_all(path("content/post")).unwrap();
    std::fs::create_dir_all(path("layouts/_default")).unwrap();
    std::fs::write(path("config.toml"), "base_url = \"http://example.com\"\ntitle = \"On Disk\"\n").unwrap();
    std::fs::write(path("content/post/first.md"), FIRST).unwrap();
    std::fs::write(path("content/post/.hidden.md"), "+++\n+++\nnope").unwrap();
    std::fs::write(path("layouts/_default/single.html"), "<h1>{{ title }}</h1>").unwrap();
    std::fs::write(path("layouts/_default/indexes.html"), "{{ title }}").unwrap();
    std::fs::create_dir_all(path("layouts/indexes")).unwrap();
    std::fs::write(path("layouts/indexes/tag.html"), "{{ title }}").unwrap();
    std::fs::write(path("layouts/index.html"), "{{ site.title }}").unwrap();

    let config = Config::discover(root.path()).unwrap();
    let mut site = Site::new(config);
    let mut timer = Timer::new();
    site.build(&mut timer).unwrap();

    let read = |p: &str| std::fs::read_to_string(path(p)).unwrap();
    assert_eq!(read("public/post/first/index.html"), "<h1>First</h1>");
    assert_eq!(read("public/index.html"), "On Disk");
    assert_eq!(read("public/tags/rust/index.html"), "Rust");
    assert!(path("public/old/first.html").is_file());
    assert!(timer.steps().iter().any(|step| step.name == "pages"));
    assert_eq!(site.stats().pages, 1);
}
