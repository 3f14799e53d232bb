//! Markup for fenced code chunks.

use md_stream::html::{escape, escape_attr};

/// Guess a language from the body when the fence names none.
pub fn detect_language(code: &str) -> &'static str {
    if code.contains("fn ") && (code.contains("let ") || code.contains("->")) {
        "rust"
    } else if code.contains("function") || code.contains("const ") || code.contains("let ") {
        "javascript"
    } else if code.contains("def ") || code.contains("import ") {
        "python"
    } else if code.contains('<') && code.contains('>') {
        "html"
    } else {
        "text"
    }
}

/// Info string and body of a fenced block. An unclosed fence runs to the end.
pub fn split_fence(content: &str) -> (Option<&str>, &str) {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return (None, content);
    };

    let (info, body) = match rest.split_once('\n') {
        Some((info, body)) => (info.trim(), body),
        None => match rest.strip_suffix("```") {
            Some(inline) => return (None, inline.trim()),
            None => (rest.trim(), ""),
        },
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    let body = body.strip_suffix('\n').unwrap_or(body);
    let language = info.split_whitespace().next();

    (language, body)
}

/// A code block with a header carrying the language and a copy action.
pub fn render_code_block(content: &str, language: Option<&str>) -> String {
    let (info, body) = split_fence(content);
    let language = language
        .or(info)
        .filter(|lang| !lang.is_empty())
        .unwrap_or_else(|| detect_language(body));
    let language = escape_attr(language);

    format!(
        "<div class=\"md-code-block\" data-language=\"{language}\">\
         <div class=\"md-code-header\"><span class=\"md-code-language\">{language}</span>\
         <button class=\"md-code-copy\" title=\"Copy code\">Copy</button></div>\
         <pre><code class=\"language-{language}\">{}</code></pre></div>",
        escape(body)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_fence() {
        assert_eq!(split_fence("```rust\nfn a() {}\n```"), (Some("rust"), "fn a() {}"));
        assert_eq!(split_fence("```\nx\n```"), (None, "x"));
        assert_eq!(split_fence("```python\nopen"), (Some("python"), "open"));
        assert_eq!(split_fence("```tex y```"), (None, "tex y"));
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("fn main() -> () {}"), "rust");
        assert_eq!(detect_language("const x = 1;"), "javascript");
        assert_eq!(detect_language("def f():\n  pass"), "python");
        assert_eq!(detect_language("<div></div>"), "html");
        assert_eq!(detect_language("plain"), "text");
    }

    #[test]
    fn test_render_escapes_body() {
        let html = render_code_block("```\nif a < b {}\n```", None);
        assert!(html.contains("data-language=\"text\""));
        assert!(html.contains("<code class=\"language-text\">if a &lt; b {}</code>"));
        assert!(html.contains("md-code-copy"));
    }
}
