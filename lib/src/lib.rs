#![doc = svgbobdoc::transform!(
//! A build pipeline for static sites.
//!
//! # Overview
//!
//! Quire turns a tree of content files into a published web site. Content is
//! read into [`Page`]s, pages are grouped into indexes (taxonomies such as
//! tags and categories, plus one index per section), every renderable is
//! matched against an ordered list of candidate layouts, and the rendered
//! output is streamed through a chain of rewriters into a destination store.
//!
//! ```svgbob
//!  +--------+   +-------+   +------+   +---------+   +--------+   +---------+
//!  | source |-->| pages |-->| sort |-->| indexes |-->| render |-->| publish |
//!  +--------+   +-------+   +------+   +---------+   +---+----+   +---------+
//!                                                        |
//!                       +--------------------------------+
//!                       |
//!     +----------+   +--+-----+   +-----+   +---------+
//!     | template |==>| absurl |==>| nav |==>| publish |
//!     +----------+   +--------+   +-----+   +---------+
//! ```
//!
//! The top row runs sequentially: each stage consumes the complete output of
//! the previous one. The bottom row is a single render call. Each box runs on
//! its own scoped thread and the `==>` edges are rendezvous pipes, so a
//! document is never held whole by the chain itself.
//!
//! ## Rendering
//!
//! [`Site::build`] runs [`Site::process`] and then [`Site::render`]:
//!
//! 1. Aliases are published as redirects.
//! 2. Shortcodes are expanded in every page body and summary.
//! 3. One page per taxonomy term, the optional index-of-indexes pages, one
//!    list per section, every content page, and finally the home page are
//!    rendered, each with an optional feed.
//!
//! The first failure aborts the build. Already published output stays.
)]

#[macro_use]
pub mod error;
pub mod util;
pub mod value;
pub mod url;
pub mod fstree;
pub mod config;
pub mod timer;
pub mod source;
pub mod page;
pub mod taxonomy;
pub mod templating;
pub mod transform;
pub mod target;
pub mod shortcode;
pub mod site;

pub use config::Config;
pub use page::{Page, PageKind, Pages};
pub use site::{Site, SiteInfo, Node, Stats};
pub use taxonomy::{Index, Taxonomies, OrderedIndex, OrderedTaxonomies};
pub use timer::Timer;

pub use rayon;
