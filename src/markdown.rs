//! Converts answer markdown into plain display text for the transcript.
//!
//! The backend is not trusted to return terminal-safe markup, so answers are
//! run through pulldown-cmark and flattened to text before they reach the
//! store.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

/// Render markdown to display text. Block boundaries become blank lines,
/// list items get a bullet, inline code keeps its text.
pub fn render(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH);
    let mut out = String::new();

    for event in parser {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Start(Tag::Item) => out.push_str("• "),
            Event::End(TagEnd::Item) => out.push('\n'),
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Heading(_)) => {
                out.push_str("\n\n");
            }
            Event::End(TagEnd::List(_)) => out.push('\n'),
            Event::End(TagEnd::CodeBlock) => out.push('\n'),
            Event::Rule => out.push_str("────\n"),
            _ => {}
        }
    }

    out.trim_end().to_string()
}
