use std::sync::Arc;

use pulldown_cmark_escape::escape_html;

use crate::error::{Chainable, Result};
use crate::target::Publisher;

/// Publishes redirects from a page's old paths to its permalink.
pub trait AliasPublisher: Send + Sync {
    /// The stored path for `alias`.
    fn translate(&self, alias: &str) -> String;

    fn publish_alias(&self, alias: &str, permalink: &str) -> Result<()>;
}

/// Writes a small HTML document per alias that refreshes to the permalink.
pub struct HtmlRedirect {
    target: Arc<dyn Publisher>,
}

impl HtmlRedirect {
    pub fn new(target: Arc<dyn Publisher>) -> Self {
        HtmlRedirect { target }
    }

    /// The redirect document for `permalink`.
    ///
    /// ```rust
    /// use quire::target::HtmlRedirect;
    ///
    /// let html = HtmlRedirect::document("http://site/a?x=1&y=\"2\"").unwrap();
    /// assert!(html.contains(r#"<link rel="canonical" href="http://site/a?x=1&amp;y=&quot;2&quot;"/>"#));
    /// assert!(html.contains(r#"content="0;url=http://site/a?x=1&amp;y=&quot;2&quot;""#));
    /// ```
    pub fn document(permalink: &str) -> Result<String> {
        let mut url = String::with_capacity(permalink.len());
        escape_html(&mut url, permalink)?;
        Ok(format!(concat!(
            "<!DOCTYPE html>\n",
            "<html>\n",
            "  <head>\n",
            "    <link rel=\"canonical\" href=\"{url}\"/>\n",
            "    <meta http-equiv=\"content-type\" content=\"text/html; charset=utf-8\"/>\n",
            "    <meta http-equiv=\"refresh\" content=\"0;url={url}\"/>\n",
            "  </head>\n",
            "</html>\n",
        ), url = url))
    }
}

impl AliasPublisher for HtmlRedirect {
    fn translate(&self, alias: &str) -> String {
        let alias = alias.trim_start_matches('/');
        let file_name = alias.rsplit('/').next().unwrap_or(alias);
        if alias.is_empty() || alias.ends_with('/') {
            format!("{alias}index.html")
        } else if !file_name.contains('.') {
            format!("{alias}/index.html")
        } else {
            alias.to_owned()
        }
    }

    fn publish_alias(&self, alias: &str, permalink: &str) -> Result<()> {
        let path = self.translate(alias);
        tracing::debug!(alias, path = %path, permalink, "alias");

        let document = Self::document(permalink)?;
        self.target.write(&path, &mut document.as_bytes())
            .chain_with(|| error! {
                "failed to publish alias",
                "alias" => alias,
                "permalink" => permalink,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Memory;

    #[test]
    fn aliases_are_published_verbatim() {
        let memory = Arc::new(Memory::new(false));
        let redirect = HtmlRedirect::new(memory.clone());

        redirect.publish_alias("/old/path/", "http://site/new/").unwrap();
        redirect.publish_alias("legacy", "http://site/new/").unwrap();
        redirect.publish_alias("feed.html", "http://site/new/").unwrap();

        assert_eq!(memory.paths(), vec!["feed.html", "legacy/index.html", "old/path/index.html"]);
        let html = memory.get("feed.html").unwrap();
        assert!(html.contains(r#"content="0;url=http://site/new/""#));
    }

    #[test]
    fn permalink_is_attribute_escaped() {
        let html = HtmlRedirect::document("http://site/it's/<b>").unwrap();
        assert!(html.contains(r#"href="http://site/it&#39;s/&lt;b&gt;""#));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn aliases_cannot_leave_the_output() {
        let memory = Arc::new(Memory::new(false));
        let redirect = HtmlRedirect::new(memory.clone());

        let err = redirect.publish_alias("../../escaped", "http://site/new/").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Publish);
        assert!(err.to_string().contains("../../escaped"));
        assert!(memory.is_empty());
    }
}
