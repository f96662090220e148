//! Inline template calls embedded in page bodies.
//!
//! A shortcode marker looks like `{{< name arg key="value" >}}` or
//! `{{% name arg %}}`. Markers are expanded after the body has been rendered
//! to HTML, so the entity-escaped form `{{&lt; name &gt;}}` that markdown
//! produces is recognized too.

use std::sync::Arc;

use crate::error::{Chainable, ErrorKind, Result};
use crate::page::Page;
use crate::templating::{Context, Engine};
use crate::value::Dict;

/// One parsed marker, handed to the shortcode's template.
#[derive(Debug)]
pub struct ShortcodeCall {
    pub name: Arc<str>,
    /// Positional arguments, unquoted.
    pub args: Vec<Arc<str>>,
    /// `key="value"` arguments, unquoted.
    pub params: Dict,
    pub page: Arc<Page>,
}

/// Replaces shortcode markers in a body. Expansion is best-effort and never
/// fails the build.
pub trait ShortcodeExpander: Send + Sync {
    fn expand(&self, body: &str, page: &Arc<Page>, engine: &dyn Engine) -> String;
}

/// Expands each marker by executing the template `shortcodes/{name}.html`.
///
/// A marker whose template is missing or fails is left in place.
#[derive(Debug, Default, Copy, Clone)]
pub struct TemplateShortcodes;

const DELIMITERS: &[(&str, &[&str])] = &[
    ("{{<", &[">}}", "&gt;}}"]),
    ("{{&lt;", &["&gt;}}", ">}}"]),
    ("{{%", &["%}}"]),
];

struct Marker<'a> {
    start: usize,
    end: usize,
    inner: &'a str,
}

fn next_marker(body: &str, mut from: usize) -> Option<Marker<'_>> {
    while let Some(i) = body.get(from..)?.find("{{") {
        let start = from + i;
        from = start + 2;

        let rest = &body[start..];
        let Some((open, closers)) = DELIMITERS.iter().find(|(open, _)| rest.starts_with(open)) else {
            continue;
        };

        let inner_start = start + open.len();
        let close = closers.iter()
            .filter_map(|close| Some((body[inner_start..].find(close)?, close.len())))
            .min();

        if let Some((len, close_len)) = close {
            let inner = &body[inner_start..inner_start + len];
            return Some(Marker { start, end: inner_start + len + close_len, inner });
        }
    }

    None
}

fn unescape(string: &str) -> String {
    string.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn unquote(string: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = string.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }

    string
}

/// Splits on whitespace outside of quotes.
fn tokenize(string: &str) -> Vec<&str> {
    let mut tokens = vec![];
    let mut quote = None;
    let mut start = None;
    for (i, c) in string.char_indices() {
        match (c, quote) {
            (c, None) if c.is_whitespace() => {
                if let Some(s) = start.take() {
                    tokens.push(&string[s..i]);
                }
            }
            ('"' | '\'', None) => {
                quote = Some(c);
                start.get_or_insert(i);
            }
            (c, Some(q)) if c == q => quote = None,
            _ => { start.get_or_insert(i); }
        }
    }

    if let Some(s) = start {
        tokens.push(&string[s..]);
    }

    tokens
}

/// Parses the inside of a marker into its name, positional arguments, and
/// named parameters.
pub fn parse_call(inner: &str) -> Option<(Arc<str>, Vec<Arc<str>>, Dict)> {
    let inner = unescape(inner);
    let mut tokens = tokenize(&inner).into_iter();
    let name = tokens.next()?;

    let mut args = vec![];
    let mut params = Dict::new();
    for token in tokens {
        let named = token.split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .filter(|(key, _)| key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-'));

        match named {
            Some((key, value)) => { params.insert(key.into(), unquote(value).into()); }
            None => args.push(unquote(token).into()),
        }
    }

    Some((name.into(), args, params))
}

impl TemplateShortcodes {
    fn render(&self, inner: &str, page: &Arc<Page>, engine: &dyn Engine) -> Result<String> {
        let Some((name, args, params)) = parse_call(inner) else {
            return err!("empty shortcode").kind(ErrorKind::Template);
        };

        let template = format!("shortcodes/{name}.html");
        if !engine.lookup(&template) {
            return err!("unknown shortcode", "template" => template).kind(ErrorKind::Template);
        }

        let call = ShortcodeCall { name, args, params, page: page.clone() };
        engine.execute_to_string(&template, &Context::Shortcode(Arc::new(call)))
    }
}

impl ShortcodeExpander for TemplateShortcodes {
    fn expand(&self, body: &str, page: &Arc<Page>, engine: &dyn Engine) -> String {
        let mut expanded = String::with_capacity(body.len());
        let mut copied = 0;
        let mut from = 0;
        while let Some(marker) = next_marker(body, from) {
            from = marker.end;
            match self.render(marker.inner, page, engine) {
                Ok(output) => {
                    expanded.push_str(&body[copied..marker.start]);
                    expanded.push_str(&output);
                    copied = marker.end;
                }
                Err(e) => tracing::warn!(
                    source = %page.source,
                    marker = &body[marker.start..marker.end],
                    "shortcode not expanded: {e}"
                ),
            }
        }

        expanded.push_str(&body[copied..]);
        expanded
    }
}
