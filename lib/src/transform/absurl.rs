use std::io::{Read, Write};

use crate::error::Result;
use crate::transform::Transformer;
use crate::transform::markup::{for_each_chunk, next_attr};
use crate::url::{has_authority, is_bare_path, UrlBuf};

/// Rewrites bare-path `src` and `href` attribute values into absolute URLs
/// under a base URL.
///
/// Rewritten values are always double quoted. Values with a scheme or an
/// authority, fragment-only values, and unquoted values pass through
/// byte-for-byte. If the base URL itself has no authority the document
/// passes through untouched, which keeps the rewrite idempotent.
#[derive(Debug, Clone)]
pub struct AbsUrl {
    base_url: String,
}

const ATTRS: &[&[u8]] = &[b"src", b"href"];

impl AbsUrl {
    pub fn new(base_url: impl Into<String>) -> Self {
        AbsUrl { base_url: base_url.into() }
    }

    fn rewrite(&self, chunk: &[u8], output: &mut (dyn Write + Send)) -> Result<()> {
        let mut copied = 0;
        let mut from = 0;
        while let Some(attr) = next_attr(chunk, from, ATTRS) {
            from = attr.value_end + 1;
            let value = match std::str::from_utf8(&chunk[attr.value_start..attr.value_end]) {
                Ok(value) if is_bare_path(value) => value,
                _ => continue,
            };

            output.write_all(&chunk[copied..attr.eq_end])?;
            write!(output, "\"{}\"", UrlBuf::join(&self.base_url, value))?;
            copied = attr.value_end + 1;
        }

        output.write_all(&chunk[copied..])?;
        Ok(())
    }
}

impl Transformer for AbsUrl {
    fn apply(&self, input: &mut (dyn Read + Send), output: &mut (dyn Write + Send)) -> Result<()> {
        if !has_authority(&self.base_url) {
            return super::copy(input, output);
        }

        for_each_chunk(input, output, |chunk, output| self.rewrite(chunk, output))
    }
}
