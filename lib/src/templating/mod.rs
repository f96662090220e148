pub mod minijinja;

use std::fmt::Debug;
use std::io::Write;
use std::sync::Arc;

use crate::error::Result;
use crate::page::Page;
use crate::shortcode::ShortcodeCall;
use crate::site::Node;

/// What a template is executed against.
#[derive(Debug, Clone)]
pub enum Context {
    Page(Arc<Page>),
    Node(Arc<Node>),
    Shortcode(Arc<ShortcodeCall>),
}

/// A named set of templates.
pub trait Engine: Send + Sync + Debug {
    /// Registers (or replaces) the template `name`.
    fn add_template(&self, name: &str, source: &str) -> Result<()>;

    /// `true` if a template named `name` exists.
    fn lookup(&self, name: &str) -> bool;

    /// Executes the template `name` against `context`, writing to `output`.
    fn execute(&self, name: &str, context: &Context, output: &mut dyn Write) -> Result<()>;

    /// Executes the template `name` against `context` into a string.
    fn execute_to_string(&self, name: &str, context: &Context) -> Result<String> {
        let mut output = Vec::new();
        self.execute(name, context, &mut output)?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    /// The names of every registered template, sorted.
    fn template_names(&self) -> Vec<String>;
}

/// The first of `candidates` that names a template in `engine`, if any.
pub fn find_first_layout<'a, S: AsRef<str>>(engine: &dyn Engine, candidates: &'a [S]) -> Option<&'a str> {
    candidates.iter()
        .map(|s| s.as_ref())
        .find(|name| engine.lookup(name))
}
