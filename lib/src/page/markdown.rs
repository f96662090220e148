use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};

/// Marks the end of a manual summary.
pub const SUMMARY_DIVIDER: &str = "<!--more-->";

fn options() -> Options {
    Options::all().difference(Options::ENABLE_SMART_PUNCTUATION)
}

/// Renders `input` as HTML.
pub fn render_markdown(input: &str) -> String {
    let mut output = String::with_capacity(input.len() + input.len() / 2);
    html::push_html(&mut output, Parser::new_ext(input, options()));
    output
}

/// The summary of a markdown body: everything before [`SUMMARY_DIVIDER`] if
/// it's present, otherwise the first top-level paragraph.
///
/// ```rust
/// use quire::page::markdown_summary;
///
/// let body = "# Title\n\nFirst *one*.\n\nSecond.";
/// assert_eq!(markdown_summary(body), "<p>First <em>one</em>.</p>\n");
///
/// let body = "Intro.\n\nMore intro.\n\n<!--more-->\n\nRest.";
/// assert_eq!(markdown_summary(body), "<p>Intro.</p>\n<p>More intro.</p>\n");
/// ```
pub fn markdown_summary(input: &str) -> String {
    if let Some((summary, _)) = input.split_once(SUMMARY_DIVIDER) {
        return render_markdown(summary);
    }

    let mut depth = 0usize;
    let mut capturing = false;
    let mut events = vec![];
    for event in Parser::new_ext(input, options()) {
        match &event {
            Event::Start(Tag::Paragraph) if depth == 0 => capturing = true,
            Event::End(TagEnd::Paragraph) if depth == 1 && capturing => {
                events.push(event);
                break;
            }
            _ => {}
        }

        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }

        if capturing {
            events.push(event);
        }
    }

    let mut output = String::new();
    html::push_html(&mut output, events.into_iter());
    output
}

/// The summary of an HTML body: everything before [`SUMMARY_DIVIDER`], or
/// nothing.
pub fn html_summary(input: &str) -> &str {
    input.split_once(SUMMARY_DIVIDER).map_or("", |(summary, _)| summary.trim_end())
}
