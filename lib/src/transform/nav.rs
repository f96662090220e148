use std::io::{Read, Write};

use crate::error::Result;
use crate::transform::Transformer;
use crate::transform::markup::{for_each_chunk, next_attr};

/// Marks the navigation entry of the current page as active.
///
/// Every `<li>` whose `data-nav` attribute names the current page's
/// relative permalink (leading and trailing slashes ignored) gets the
/// `active` class, appended to an existing `class` attribute if there is
/// one. With an empty section, the document passes through unchanged.
#[derive(Debug, Clone)]
pub struct NavActive {
    section: String,
}

pub const NAV_ATTR: &[u8] = b"data-nav";
const CLASS_ATTR: &[u8] = b"class";

impl NavActive {
    pub fn new(section: &str) -> Self {
        NavActive { section: section.trim_matches('/').to_owned() }
    }

    fn matches(&self, tag: &[u8]) -> bool {
        next_attr(tag, 0, &[NAV_ATTR]).map_or(false, |attr| {
            let value = &tag[attr.value_start..attr.value_end];
            trim_slashes(value) == self.section.as_bytes()
        })
    }

    fn annotate(&self, tag: &[u8], output: &mut (dyn Write + Send)) -> Result<()> {
        match next_attr(tag, 0, &[CLASS_ATTR]) {
            Some(class) => {
                output.write_all(&tag[..class.value_end])?;
                match class.value_start == class.value_end {
                    true => output.write_all(b"active")?,
                    false => output.write_all(b" active")?,
                }

                output.write_all(&tag[class.value_end..])?;
            }
            None => {
                output.write_all(b"<li class=\"active\"")?;
                output.write_all(&tag[3..])?;
            }
        }

        Ok(())
    }

    fn rewrite(&self, chunk: &[u8], output: &mut (dyn Write + Send)) -> Result<()> {
        let finder = memchr::memmem::Finder::new(b"<li");
        let mut copied = 0;
        for start in finder.find_iter(chunk) {
            if start < copied {
                continue;
            }

            match chunk.get(start + 3) {
                Some(b) if b.is_ascii_whitespace() || *b == b'>' => {}
                _ => continue,
            }

            let Some(len) = memchr::memchr(b'>', &chunk[start..]) else {
                break;
            };

            let tag = &chunk[start..start + len + 1];
            if self.matches(tag) {
                output.write_all(&chunk[copied..start])?;
                self.annotate(tag, output)?;
                copied = start + tag.len();
            }
        }

        output.write_all(&chunk[copied..])?;
        Ok(())
    }
}

fn trim_slashes(mut value: &[u8]) -> &[u8] {
    while let [b'/', rest @ ..] = value {
        value = rest;
    }

    while let [rest @ .., b'/'] = value {
        value = rest;
    }

    value
}

impl Transformer for NavActive {
    fn apply(&self, input: &mut (dyn Read + Send), output: &mut (dyn Write + Send)) -> Result<()> {
        if self.section.is_empty() {
            return super::copy(input, output);
        }

        for_each_chunk(input, output, |chunk, output| self.rewrite(chunk, output))
    }
}
