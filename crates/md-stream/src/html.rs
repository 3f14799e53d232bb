//! HTML emission for parsed elements.
//!
//! Everything taken from the source buffer is escaped; the only tags in the
//! output are the ones produced here.

use std::fmt::Write;

use crate::element::{InlineElement, InlineStyle, ListMarker, MdElement, Span};
use crate::inline::{parse_inline_with, InlineKinds};

/// Escape text for use in HTML element content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text);
    out
}

/// Escape text for use inside a double-quoted attribute.
pub fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

/// Render one completed element.
pub fn render_element(element: &MdElement, buffer: &str) -> String {
    let mut out = String::new();

    match element {
        MdElement::Heading { level, content } => {
            let inlines = parse_inline_with(buffer, *content, InlineKinds::all());
            let _ = write!(out, "<h{level} class=\"md-header md-h{level}\">");
            render_inlines_into(&mut out, &inlines, buffer);
            let _ = write!(out, "</h{level}>");
        }

        MdElement::Paragraph(inlines) => {
            out.push_str("<p class=\"md-paragraph\">");
            render_inlines_into(&mut out, inlines, buffer);
            out.push_str("</p>");
        }

        MdElement::CodeBlock(block) => {
            out.push_str("<pre class=\"md-code\"><code");
            if let Some(language) = block.language {
                let _ = write!(
                    out,
                    " class=\"language-{}\"",
                    escape_attr(language.resolve(buffer))
                );
            }
            out.push('>');
            escape_into(&mut out, block.content.resolve(buffer));
            out.push_str("</code></pre>");
        }

        MdElement::BlockQuote { depth, content } => {
            let _ = write!(out, "<blockquote class=\"md-blockquote\" data-depth=\"{depth}\">");
            render_inlines_into(&mut out, content, buffer);
            out.push_str("</blockquote>");
        }

        MdElement::ListItem(item) => {
            match item.marker {
                ListMarker::Bullet(_) => out.push_str("<li class=\"md-list-item\""),
                ListMarker::Ordered(n) => {
                    let _ = write!(out, "<li class=\"md-list-item md-ordered\" value=\"{n}\"");
                }
            }
            if item.indent > 0 {
                let _ = write!(out, " data-indent=\"{}\"", item.indent);
            }
            out.push('>');
            render_inlines_into(&mut out, &item.content, buffer);
            out.push_str("</li>");
        }

        MdElement::Table { headers, rows } => {
            out.push_str("<table class=\"md-table\"><thead><tr>");
            for cell in headers {
                render_cell(&mut out, "th", *cell, buffer);
            }
            out.push_str("</tr></thead><tbody>");
            for row in rows {
                out.push_str("<tr>");
                for cell in row {
                    render_cell(&mut out, "td", *cell, buffer);
                }
                out.push_str("</tr>");
            }
            out.push_str("</tbody></table>");
        }

        MdElement::ThematicBreak => out.push_str("<hr class=\"md-rule\">"),
    }

    out
}

fn render_cell(out: &mut String, tag: &str, cell: Span, buffer: &str) {
    let inlines = parse_inline_with(buffer, cell, InlineKinds::all());
    let _ = write!(out, "<{tag}>");
    render_inlines_into(out, &inlines, buffer);
    let _ = write!(out, "</{tag}>");
}

/// Render inline elements to HTML.
pub fn render_inlines(inlines: &[InlineElement], buffer: &str) -> String {
    let mut out = String::new();
    render_inlines_into(&mut out, inlines, buffer);
    out
}

fn render_inlines_into(out: &mut String, inlines: &[InlineElement], buffer: &str) {
    for inline in inlines {
        match inline {
            InlineElement::Text(span) => escape_into(out, span.resolve(buffer)),

            InlineElement::Styled { style, content } => {
                let (open, close) = match style {
                    InlineStyle::Bold => ("<strong class=\"md-bold\">", "</strong>"),
                    InlineStyle::Italic => ("<em class=\"md-italic\">", "</em>"),
                    InlineStyle::BoldItalic => (
                        "<strong class=\"md-bold\"><em class=\"md-italic\">",
                        "</em></strong>",
                    ),
                    InlineStyle::Strikethrough => ("<del class=\"md-strikethrough\">", "</del>"),
                };
                out.push_str(open);
                escape_into(out, content.resolve(buffer));
                out.push_str(close);
            }

            InlineElement::Code(span) => {
                out.push_str("<code class=\"md-inline-code\">");
                escape_into(out, span.resolve(buffer));
                out.push_str("</code>");
            }

            InlineElement::Link { text, url } => {
                let _ = write!(
                    out,
                    "<a href=\"{}\" class=\"md-link\" target=\"_blank\">",
                    safe_url(url.resolve(buffer))
                );
                escape_into(out, text.resolve(buffer));
                out.push_str("</a>");
            }

            InlineElement::Image { alt, url } => {
                let _ = write!(
                    out,
                    "<img class=\"md-image\" src=\"{}\" alt=\"{}\">",
                    safe_url(url.resolve(buffer)),
                    escape_attr(alt.resolve(buffer))
                );
            }

            InlineElement::LineBreak => out.push_str("<br>"),
        }
    }
}

/// Script URLs never make it into an attribute.
fn safe_url(url: &str) -> String {
    let lowered = url.trim().to_ascii_lowercase();
    if lowered.starts_with("javascript:") || lowered.starts_with("vbscript:") {
        return "#".to_string();
    }
    escape_attr(url.trim())
}

/// Render a span of inline text restricted to `kinds`.
pub fn render_inline_text(buffer: &str, span: Span, kinds: InlineKinds) -> String {
    let inlines = parse_inline_with(buffer, span, kinds);
    render_inlines(&inlines, buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamParser;
    use pretty_assertions::assert_eq;

    fn render_all(text: &str) -> Vec<String> {
        let mut parser = StreamParser::new();
        parser.push(text);
        parser.finalize();
        parser
            .parsed()
            .iter()
            .map(|e| render_element(e, parser.buffer()))
            .collect()
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape_attr("\"x\""), "&quot;x&quot;");
    }

    #[test]
    fn test_heading_html() {
        assert_eq!(
            render_all("## Hello **there**\n"),
            vec!["<h2 class=\"md-header md-h2\">Hello <strong class=\"md-bold\">there</strong></h2>"]
        );
    }

    #[test]
    fn test_code_block_is_escaped() {
        assert_eq!(
            render_all("```html\n<b>hi</b>\n```\n"),
            vec!["<pre class=\"md-code\"><code class=\"language-html\">&lt;b&gt;hi&lt;/b&gt;\n</code></pre>"]
        );
    }

    #[test]
    fn test_script_links_are_neutralized() {
        let html = render_all("[click](javascript:alert(1))\n\n");
        assert_eq!(html.len(), 1);
        assert!(html[0].contains("href=\"#\""));
    }

    #[test]
    fn test_table_html() {
        let html = render_all("| a | b |\n|---|---|\n| 1 | 2 |\n\n");
        assert_eq!(
            html,
            vec!["<table class=\"md-table\"><thead><tr><th>a</th><th>b</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>"]
        );
    }

    #[test]
    fn test_list_items() {
        let html = render_all("- one\n3. three\n");
        assert_eq!(
            html,
            vec![
                "<li class=\"md-list-item\">one</li>",
                "<li class=\"md-list-item md-ordered\" value=\"3\">three</li>",
            ]
        );
    }
}
