//! Markdown to plain text

use pulldown_cmark::{Event, Options, Parser, TagEnd};

/// Strip Markdown formatting, keeping text content and line structure
pub fn strip_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut out = String::with_capacity(text.len());
    for event in Parser::new_ext(text, options) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak | Event::Rule => out.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock) => out.push_str("\n\n"),
            Event::End(TagEnd::Item | TagEnd::TableHead | TagEnd::TableRow) => out.push('\n'),
            Event::End(TagEnd::TableCell) => out.push(' '),
            _ => {}
        }
    }

    collapse_blank_lines(out.trim())
}

fn collapse_blank_lines(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut newlines = 0;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_formatting_removed() {
        assert_eq!(
            strip_markdown("**Bold** and _italic_ with `code` and [a link](https://example.com)"),
            "Bold and italic with code and a link"
        );
    }

    #[test]
    fn test_headings_and_lists() {
        let text = "# Title\n\nIntro text.\n\n- first\n- second\n";
        assert_eq!(strip_markdown(text), "Title\n\nIntro text.\n\nfirst\nsecond");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(strip_markdown("Just a sentence."), "Just a sentence.");
    }
}
