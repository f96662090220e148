use std::io::{Read, Write};

use crate::error::Result;

const BLOCK: usize = 8 * 1024;

/// Feeds `input` to `f` in chunks that never end inside a tag.
///
/// A chunk ends just before the last `<` read so far unless that tag has
/// already been closed by a `>`. The remainder is carried into the next
/// chunk. Whatever is left at end-of-file is passed as the final chunk.
pub fn for_each_chunk<F>(input: &mut (dyn Read + Send), output: &mut (dyn Write + Send), mut f: F) -> Result<()>
    where F: FnMut(&[u8], &mut (dyn Write + Send)) -> Result<()>
{
    let mut buf = Vec::with_capacity(BLOCK * 2);
    let mut block = vec![0; BLOCK];
    loop {
        let n = input.read(&mut block)?;
        if n == 0 {
            break;
        }

        buf.extend_from_slice(&block[..n]);
        let split = match memchr::memrchr(b'<', &buf) {
            Some(i) if memchr::memchr(b'>', &buf[i..]).is_none() => i,
            _ => buf.len(),
        };

        if split > 0 {
            f(&buf[..split], output)?;
            buf.drain(..split);
        }
    }

    if !buf.is_empty() {
        f(&buf, output)?;
    }

    output.flush()?;
    Ok(())
}

/// A quoted attribute found by [`next_attr()`].
pub struct Attr {
    /// Index of the first byte of the attribute name.
    pub name_start: usize,
    /// Index just past the `=`.
    pub eq_end: usize,
    pub quote: u8,
    pub value_start: usize,
    pub value_end: usize,
}

/// Finds the next quoted attribute named one of `names` in `chunk` at or
/// after `from`. Names match ASCII case-insensitively and may be separated
/// from the `=` and the value by whitespace. The name must be preceded by
/// whitespace, so `data-href` doesn't match `href`.
pub fn next_attr(chunk: &[u8], mut from: usize, names: &[&[u8]]) -> Option<Attr> {
    while let Some(i) = memchr::memchr(b'=', chunk.get(from..)?) {
        let eq = from + i;
        from = eq + 1;

        let name_end = chunk[..eq].iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map_or(0, |i| i + 1);

        let before = &chunk[..name_end];
        let Some(name) = names.iter().find(|name| {
            before.len() >= name.len() && before[name_end - name.len()..].eq_ignore_ascii_case(name)
        }) else {
            continue;
        };

        let name_start = name_end - name.len();
        if name_start == 0 || !chunk[name_start - 1].is_ascii_whitespace() {
            continue;
        }

        let Some(quote_at) = chunk[eq + 1..].iter().position(|b| !b.is_ascii_whitespace()) else {
            continue;
        };

        let quote_at = eq + 1 + quote_at;
        let quote = match chunk[quote_at] {
            q @ (b'"' | b'\'') => q,
            _ => continue,
        };

        let value_start = quote_at + 1;
        let Some(len) = memchr::memchr(quote, &chunk[value_start..]) else {
            continue;
        };

        return Some(Attr { name_start, eq_end: eq + 1, quote, value_start, value_end: value_start + len });
    }

    None
}
