//! Splitting free text into frame-sized work units.

use once_cell::sync::Lazy;
use regex::Regex;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| compile(r"<[^>]+>"));
static UNIT_BREAKS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        compile(r"\.\s+"),
        compile(r"\n\s*\n"),
        compile(r"[,;:]\s+"),
        compile(r"\s+"),
    ]
});

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => panic!("invalid built-in pattern {pattern:?}: {err}"),
    }
}

pub const MIN_UNIT: f64 = 10.0;
pub const MAX_UNIT: f64 = 200.0;

/// How hard a piece of text is to materialize, from 0.0 to 1.0: tags,
/// markup-special characters and length all add to it.
pub fn complexity(text: &str) -> f64 {
    let tags = HTML_TAG.find_iter(text).count() as f64;
    let specials = text
        .chars()
        .filter(|c| matches!(c, '<' | '>' | '&' | '"' | '\''))
        .count() as f64;
    (tags * 0.1 + specials * 0.02 + text.len() as f64 / 1000.0).min(1.0)
}

/// Rough shape of a unit, which decides how it is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Html,
    Markdown,
    Text,
}

impl UnitKind {
    pub fn detect(text: &str) -> Self {
        if HTML_TAG.is_match(text) {
            UnitKind::Html
        } else if text.contains(['*', '_', '`', '#']) {
            UnitKind::Markdown
        } else {
            UnitKind::Text
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UnitKind::Html => "html",
            UnitKind::Markdown => "markdown",
            UnitKind::Text => "text",
        }
    }
}

/// Unit size for the text at `rest`: `base` shrinks when recent frames run
/// over `budget_ms` and grows when they are well under it, then complex text
/// gets smaller units and simple text larger ones.
pub fn unit_size(base: usize, recent_frame_ms: f64, budget_ms: f64, rest: &str) -> usize {
    let mut size = base as f64;
    if recent_frame_ms > budget_ms {
        size *= 0.8;
    } else if recent_frame_ms < budget_ms * 0.5 {
        size *= 1.2;
    }
    size = size.clamp(MIN_UNIT, MAX_UNIT);

    let lookahead = floor_char_boundary(rest, size as usize * 2);
    let complexity = complexity(&rest[..lookahead]);
    if complexity > 0.7 {
        size *= 0.6;
    } else if complexity < 0.3 {
        size *= 1.4;
    }

    (size.round() as usize).max(1)
}

/// Byte length of the next unit of `rest`, at most `size` bytes (or one
/// char). Prefers a sentence, paragraph, punctuation or word break past
/// half the unit.
pub fn next_unit(rest: &str, size: usize) -> usize {
    if rest.len() <= size {
        return rest.len();
    }

    let mut end = floor_char_boundary(rest, size);
    if end == 0 {
        end = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
        return end;
    }

    let window = &rest[..end];
    for pattern in UNIT_BREAKS.iter() {
        if let Some(last) = pattern.find_iter(window).last() {
            if last.end() * 2 > size {
                return last.end();
            }
        }
    }

    end
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity() {
        assert_eq!(complexity(""), 0.0);
        assert!((complexity("<b>x</b>") - (0.2 + 4.0 * 0.02 + 0.008)).abs() < 1e-9);
        assert_eq!(complexity(&"<i>".repeat(20)), 1.0);
    }

    #[test]
    fn test_unit_size_follows_frame_times() {
        let plain = "plain words ".repeat(20);
        // fast frames grow the unit, simple text grows it again
        assert_eq!(unit_size(50, 2.0, 16.0, &plain), 84);
        // slow frames shrink it
        assert_eq!(unit_size(50, 20.0, 16.0, &plain), 56);
        // in between only the content counts
        assert_eq!(unit_size(50, 10.0, 16.0, &plain), 70);
    }

    #[test]
    fn test_complex_text_gets_small_units() {
        let tags = "<a>".repeat(40);
        assert_eq!(unit_size(50, 10.0, 16.0, &tags), 30);
    }

    #[test]
    fn test_unit_breaks_past_half() {
        let text = "One two three. Four five six seven eight nine ten";
        assert_eq!(next_unit(text, 20), "One two three. ".len());
        // a break before the halfway point is ignored
        assert_eq!(next_unit("Hi. abcdefghijklmnopqrstuvwxyz", 20), 20);
    }

    #[test]
    fn test_units_never_split_chars() {
        let text = "ééééééééé";
        let end = next_unit(text, 5);
        assert!(text.is_char_boundary(end));
        assert!(end > 0);
        assert_eq!(next_unit("é", 1), 2);
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(UnitKind::detect("<b>x</b>"), UnitKind::Html);
        assert_eq!(UnitKind::detect("**x**"), UnitKind::Markdown);
        assert_eq!(UnitKind::detect("x"), UnitKind::Text);
    }
}
