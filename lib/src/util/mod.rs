mod path_ext;

pub use path_ext::*;

/// Convert spaces to hyphens. Remove characters that aren't alphanumerics,
/// underscores, or hyphens. Convert to lowercase. Also strip leading and
/// trailing whitespace.
pub fn slugify(string: &str) -> String {
    let mut output = String::with_capacity(string.len());

    let mut need_dash = false;
    for ch in string.chars() {
        for b in deunicode::deunicode_char(ch).unwrap_or("-").bytes() {
            match b {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' => {
                    if need_dash {
                        output.push('-');
                        need_dash = false;
                    }

                    output.push(b.to_ascii_lowercase() as char);
                }
                _ => {
                    // All sequences of characters that aren't alphanumeric or
                    // `_` are converted into one `-`.
                    need_dash = !output.is_empty();
                }
            }
        }
    }

    output
}

/// Slugifies every `/`-separated segment of `path`, dropping empty segments
/// while keeping any extension of the final segment.
///
/// ```
/// use quire::util::urlize;
///
/// assert_eq!(urlize("tags/Rust Lang"), "tags/rust-lang");
/// assert_eq!(urlize("/Posts/Hello World.html"), "posts/hello-world.html");
/// assert_eq!(urlize("index.xml"), "index.xml");
/// ```
pub fn urlize(path: &str) -> String {
    let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
    let mut output = String::with_capacity(path.len());
    while let Some(segment) = segments.next() {
        let (stem, ext) = match segment.rsplit_once('.') {
            Some((stem, ext)) if segments.peek().is_none() && !stem.is_empty() => (stem, Some(ext)),
            _ => (segment, None),
        };

        if !output.is_empty() {
            output.push('/');
        }

        output.push_str(&slugify(stem));
        if let Some(ext) = ext {
            output.push('.');
            output.push_str(ext);
        }
    }

    output
}

/// Uppercases the first letter of every whitespace or `-`/`_` separated word.
///
/// ```
/// use quire::util::title_case;
///
/// assert_eq!(title_case("post"), "Post");
/// assert_eq!(title_case("rust lang"), "Rust Lang");
/// ```
pub fn title_case(string: &str) -> String {
    let mut output = String::with_capacity(string.len());
    let mut word_start = true;
    for ch in string.chars() {
        if word_start {
            output.extend(ch.to_uppercase());
        } else {
            output.push(ch);
        }

        word_start = ch.is_whitespace() || ch == '-' || ch == '_';
    }

    output
}
