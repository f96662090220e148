use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{Chainable, Error, ErrorKind, Result};
use crate::page::{Page, PageKind, markdown_summary, html_summary, render_markdown};
use crate::value::{Dict, Format, Toml, Value};

/// Turns raw source bytes into a [`Page`].
pub trait PageParser: Send + Sync {
    /// Whether records named `name` are content at all.
    fn accepts(&self, _name: &str) -> bool {
        true
    }

    fn parse(&self, contents: &[u8], name: &str) -> Result<Page>;
}

/// Parses an optional front matter block followed by a markdown or HTML
/// body.
///
/// Front matter is either TOML between two `+++` lines or a JSON object
/// starting at the first byte of the file.
#[derive(Debug, Default, Copy, Clone)]
pub struct FrontMatterParser;

const MARKDOWN_EXTS: &[&str] = &["md", "markdown"];
const HTML_EXTS: &[&str] = &["html", "htm"];

fn extension(name: &str) -> Option<String> {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

impl FrontMatterParser {
    /// Splits `input` into its front matter and its body.
    pub fn split<'a>(&self, input: &'a str) -> Result<(Dict, &'a str)> {
        if let Some(rest) = strip_line(input, "+++") {
            let (front, body) = match find_line(rest, "+++") {
                Some((start, end)) => (&rest[..start], &rest[end..]),
                None => return err!("unterminated `+++` front matter").kind(ErrorKind::Parse),
            };

            let dict = Toml::from_str(front).chain(error!("invalid TOML front matter"))?;
            return Ok((dict, body));
        }

        if input.starts_with('{') {
            let mut stream = serde_json::Deserializer::from_str(input).into_iter::<Dict>();
            let dict = match stream.next() {
                Some(result) => result.chain(error!("invalid JSON front matter"))?,
                None => Dict::new(),
            };

            let body = &input[stream.byte_offset()..];
            return Ok((dict, body.trim_start_matches(['\r', '\n'])));
        }

        Ok((Dict::new(), input))
    }
}

/// `input` after `line` if `input` begins with `line` as a full line.
fn strip_line<'a>(input: &'a str, line: &str) -> Option<&'a str> {
    let rest = input.strip_prefix(line)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

/// The byte range of the first full line in `input` equal to `line`,
/// including its line ending.
fn find_line(input: &str, line: &str) -> Option<(usize, usize)> {
    let mut start = 0;
    for l in input.split_inclusive('\n') {
        let end = start + l.len();
        if l.trim_end_matches(['\r', '\n']) == line {
            return Some((start, end));
        }

        start = end;
    }

    None
}

/// Parses a front-matter date. Dates with an offset are normalized to UTC
/// so that pages compare by instant.
///
/// ```rust
/// use quire::page::parse_date;
///
/// let expected = "2013-07-01T10:20:30";
/// for date in ["2013-07-01T10:20:30Z", "2013-07-01 10:20:30", "2013-07-01T10:20:30"] {
///     assert_eq!(parse_date(date).unwrap().format("%FT%T").to_string(), expected);
/// }
///
/// assert_eq!(parse_date("2013-07-01").unwrap().format("%FT%T").to_string(), "2013-07-01T00:00:00");
/// assert_eq!(parse_date("2013-07-01T10:00:00+05:00").unwrap().format("%FT%T").to_string(), "2013-07-01T05:00:00");
/// assert!(parse_date("July 1st").is_err());
/// ```
pub fn parse_date(string: &str) -> Result<NaiveDateTime> {
    let string = string.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(string) {
        return Ok(date.naive_utc());
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(string, format) {
            return Ok(date);
        }
    }

    NaiveDate::parse_from_str(string, "%Y-%m-%d")?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| error!("date out of range", "date" => string))
}

fn take_str(dict: &mut Dict, key: &str) -> Result<Option<Arc<str>>> {
    match dict.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_str() {
            Some(s) => Ok(Some(s.into())),
            None => err! {
                "front matter value must be a string",
                "key" => key,
                "found" => v.kind(),
            }.kind(ErrorKind::Parse),
        },
    }
}

impl PageParser for FrontMatterParser {
    fn accepts(&self, name: &str) -> bool {
        extension(name).map_or(false, |ext| {
            MARKDOWN_EXTS.contains(&&*ext) || HTML_EXTS.contains(&&*ext)
        })
    }

    fn parse(&self, contents: &[u8], name: &str) -> Result<Page> {
        let _parse = || -> Result<Page> {
            let input = std::str::from_utf8(contents)
                .map_err(|e| Error::from_std(e).with_kind(ErrorKind::Parse))?;

            let (mut front, body) = self.split(input)?;
            let ext = extension(name).unwrap_or_default();
            let mut page = if HTML_EXTS.contains(&&*ext) {
                let page = Page::new(name, PageKind::Verbatim, body, body);
                page.set_summary(html_summary(body));
                page
            } else {
                let page = Page::new(name, PageKind::Templated, body, &render_markdown(body));
                page.set_summary(markdown_summary(body));
                page
            };

            page.title = take_str(&mut front, "title")?.unwrap_or_else(|| "".into());
            page.description = take_str(&mut front, "description")?;
            page.slug = take_str(&mut front, "slug")?;
            page.url = take_str(&mut front, "url")?;
            page.layout = take_str(&mut front, "layout")?;
            page.page_type = take_str(&mut front, "type")?;
            if let Some(date) = take_str(&mut front, "date")? {
                page.date = Some(parse_date(&date)?);
            }

            page.draft = match front.remove("draft") {
                None => false,
                Some(v) => v.to_bool().ok_or_else(|| error! {
                    "`draft` must be a boolean",
                    "found" => v.kind(),
                }.with_kind(ErrorKind::Parse))?,
            };

            page.aliases = match front.remove("aliases") {
                None => vec![],
                Some(v) => v.try_into().map_err(|v: Value| error! {
                    "`aliases` must be a list of strings",
                    "found" => v.kind(),
                }.with_kind(ErrorKind::Parse))?,
            };

            page.params = front;
            Ok(page)
        };

        _parse().chain_with(|| error!("failed to parse page", "source" => name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_front_matter() {
        let input = "+++\ntitle = \"Hello\"\ndate = \"2013-07-01\"\ntags = [\"a\", \"b\"]\n\
            aliases = [\"/old/\"]\ndraft = true\n+++\nSome *text*.\n";

        let page = FrontMatterParser.parse(input.as_bytes(), "post/hello.md").unwrap();
        assert_eq!(&*page.title, "Hello");
        assert_eq!(page.kind, PageKind::Templated);
        assert_eq!(page.date.unwrap().format("%F").to_string(), "2013-07-01");
        assert!(page.draft);
        assert_eq!(page.aliases, vec![Arc::<str>::from("/old/")]);
        assert_eq!(page.params["tags"].as_str_list(), Some(vec!["a", "b"]));
        assert!(!page.params.contains_key("title"));
        assert_eq!(&*page.content(), "<p>Some <em>text</em>.</p>\n");
        assert_eq!(&*page.summary(), "<p>Some <em>text</em>.</p>\n");
        assert_eq!(&**page.raw(), "Some *text*.\n");
    }

    #[test]
    fn toml_datetime_front_matter() {
        let input = "+++\r\ndate = 2013-07-01T10:00:00Z\r\n+++\r\nbody";
        let page = FrontMatterParser.parse(input.as_bytes(), "a.md").unwrap();
        assert_eq!(page.date.unwrap().format("%FT%T").to_string(), "2013-07-01T10:00:00");
    }

    #[test]
    fn json_front_matter() {
        let input = "{ \"title\": \"J\", \"categories\": [\"x\"] }\n<p>{{ page.title }}</p>";
        let page = FrontMatterParser.parse(input.as_bytes(), "about.html").unwrap();
        assert_eq!(&*page.title, "J");
        assert_eq!(page.kind, PageKind::Verbatim);
        assert_eq!(&*page.content(), "<p>{{ page.title }}</p>");
        assert_eq!(page.params["categories"].as_str_list(), Some(vec!["x"]));
    }

    #[test]
    fn no_front_matter() {
        let page = FrontMatterParser.parse(b"just text", "a.md").unwrap();
        assert_eq!(&*page.title, "");
        assert!(page.params.is_empty());
    }

    #[test]
    fn parse_errors() {
        let cases: &[&[u8]] = &[
            b"+++\ntitle = \"x\"\n",
            b"+++\ntitle = \n+++\n",
            b"+++\ndate = \"someday\"\n+++\n",
            b"+++\ndraft = \"yes\"\n+++\n",
            b"+++\naliases = \"/one\"\n+++\n",
            b"+++\ntitle = 3\n+++\n",
            b"{ \"title\": ",
            b"\xff\xfe",
        ];

        for case in cases {
            let err = FrontMatterParser.parse(case, "bad.md").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse, "{}", err);
            assert!(err.to_string().contains("bad.md"));
        }
    }

    #[test]
    fn accepts_content_extensions() {
        assert!(FrontMatterParser.accepts("post/a.md"));
        assert!(FrontMatterParser.accepts("post/a.Markdown"));
        assert!(FrontMatterParser.accepts("a.html"));
        assert!(!FrontMatterParser.accepts("images/a.png"));
        assert!(!FrontMatterParser.accepts("README"));
    }
}
