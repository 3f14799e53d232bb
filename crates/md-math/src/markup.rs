//! HTML for rendered math blocks and spans.

use std::fmt::Write;

/// Attribute carried by every block and span this crate emits.
pub const PROCESSED_ATTR: &str = "data-md-math=\"rendered\"";

/// Markers meaning "math already rendered here". Besides our own attribute
/// this covers the class names an equation engine leaves behind.
const PROCESSED_MARKERS: [&str; 5] = [
    PROCESSED_ATTR,
    "md-math-block",
    "md-math-inline",
    "class=\"katex\"",
    "katex-display",
];

/// True when `content` already carries rendered math.
pub fn is_processed(content: &str) -> bool {
    PROCESSED_MARKERS
        .iter()
        .any(|marker| content.contains(marker))
}

pub fn escape(text: &str) -> String {
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

/// Reverse of the entity escaping done by HTML emitters, for math sources
/// found in already-escaped text.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Display state of a block or span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Rendered,
    Error,
    Loading,
}

impl BlockState {
    fn class(&self) -> &'static str {
        match self {
            BlockState::Rendered => "success",
            BlockState::Error => "error",
            BlockState::Loading => "loading",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            BlockState::Rendered => "✅",
            BlockState::Error => "❌",
            BlockState::Loading => "⏳",
        }
    }
}

/// A self-contained block: header with status and actions, the rendered
/// body when there is one, and the raw source.
pub fn block(id: &str, title: &str, source: &str, state: BlockState, rendered: Option<&str>) -> String {
    let mut out = String::new();
    let label = match state {
        BlockState::Rendered => title.to_string(),
        BlockState::Error => format!("{title} (Error)"),
        BlockState::Loading => format!("{title} (Loading...)"),
    };

    let _ = write!(
        out,
        "<div class=\"md-math-block {}\" {PROCESSED_ATTR} data-math-id=\"{id}\">",
        state.class()
    );
    let _ = write!(
        out,
        "<div class=\"md-math-header\"><span class=\"md-math-icon\">{}</span>\
         <span class=\"md-math-label\">{}</span><div class=\"md-math-actions\">\
         <button class=\"md-math-copy\" data-copy=\"{id}\" title=\"Copy LaTeX\">Copy</button>",
        state.icon(),
        escape(&label)
    );

    let rendered = rendered.filter(|_| state == BlockState::Rendered);
    if rendered.is_some() {
        let _ = write!(
            out,
            "<button class=\"md-math-toggle\" data-toggle=\"{id}\" title=\"Toggle source\">Source</button>"
        );
    }
    out.push_str("</div></div><div class=\"md-math-body\">");

    if let Some(markup) = rendered {
        let _ = write!(
            out,
            "<div class=\"md-math-rendered\" id=\"{id}-rendered\">{markup}</div>"
        );
    }

    let hidden = if rendered.is_some() { " hidden" } else { "" };
    let _ = write!(
        out,
        "<div class=\"md-math-source\" id=\"{id}-source\"{hidden}><pre><code>{}</code></pre></div>",
        escape(source)
    );
    out.push_str("</div></div>");

    out
}

/// An inline span. Loading and error spans hold the escaped source.
pub fn inline(id: &str, source: &str, state: BlockState, rendered: Option<&str>) -> String {
    let body = match (state, rendered) {
        (BlockState::Rendered, Some(markup)) => markup.to_string(),
        _ => escape(source),
    };
    let title = match state {
        BlockState::Error => " title=\"Math error\"",
        _ => "",
    };

    format!(
        "<span class=\"md-math-inline {}\" {PROCESSED_ATTR} data-math-id=\"{id}\"{title}>{body}</span>",
        state.class()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_states() {
        let ok = block("m1", "Display Math", "x<1", BlockState::Rendered, Some("<b>x</b>"));
        assert!(ok.contains(PROCESSED_ATTR));
        assert!(ok.contains("md-math-toggle"));
        assert!(ok.contains("<div class=\"md-math-rendered\" id=\"m1-rendered\"><b>x</b></div>"));
        assert!(ok.contains("<code>x&lt;1</code>"));

        let err = block("m2", "Display Math", "x", BlockState::Error, Some("ignored"));
        assert!(err.contains("Display Math (Error)"));
        assert!(!err.contains("md-math-rendered"));
        assert!(!err.contains("md-math-toggle"));

        let loading = block("m3", "Math Block", "x", BlockState::Loading, None);
        assert!(loading.contains("md-math-block loading"));
        assert!(loading.contains("<code>x</code>"));
    }

    #[test]
    fn test_processed_detection() {
        assert!(is_processed(&inline("i1", "x", BlockState::Loading, None)));
        assert!(is_processed("<span class=\"katex\">x</span>"));
        assert!(!is_processed("plain $x$ text"));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a &lt; b &amp;&amp; c"), "a < b && c");
        assert_eq!(unescape("&amp;lt;"), "&lt;");
    }
}
