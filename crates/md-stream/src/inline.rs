//! Inline element parsing for bold, italic, code, links, etc.

use bitflags::bitflags;

use crate::element::{InlineElement, InlineStyle, Span};

bitflags! {
    /// Inline constructs the parser is allowed to recognize.
    ///
    /// A construct missing from the mask is left as literal text, delimiters
    /// included. The progressive tracker clears the bit of every construct
    /// whose closing delimiter hasn't arrived yet.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct InlineKinds: u8 {
        const BOLD          = 1 << 0;
        const ITALIC        = 1 << 1;
        const CODE          = 1 << 2;
        const LINK          = 1 << 3;
        const IMAGE         = 1 << 4;
        const STRIKETHROUGH = 1 << 5;
    }
}

impl InlineKinds {
    fn allows(&self, style: InlineStyle) -> bool {
        match style {
            InlineStyle::Bold => self.contains(InlineKinds::BOLD),
            InlineStyle::Italic => self.contains(InlineKinds::ITALIC),
            InlineStyle::BoldItalic => self.contains(InlineKinds::BOLD | InlineKinds::ITALIC),
            InlineStyle::Strikethrough => self.contains(InlineKinds::STRIKETHROUGH),
        }
    }
}

/// Parses inline elements from `span` within `buffer`.
///
/// Returned spans are absolute offsets into `buffer`.
pub fn parse_inline(buffer: &str, span: Span) -> Vec<InlineElement> {
    parse_inline_with(buffer, span, InlineKinds::all())
}

/// Like [`parse_inline`], but only recognizes the constructs in `kinds`.
pub fn parse_inline_with(buffer: &str, span: Span, kinds: InlineKinds) -> Vec<InlineElement> {
    let text = span.resolve(buffer);
    let base = span.start;
    let at = |start: usize, end: usize| Span::new(base + start, base + end);

    let mut result = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut plain_start = 0;

    while let Some((i, c)) = chars.next() {
        match c {
            // Backtick - inline code
            '`' if kinds.contains(InlineKinds::CODE) => {
                let mut backtick_count = 1;
                while chars.peek().map(|(_, c)| *c == '`').unwrap_or(false) {
                    chars.next();
                    backtick_count += 1;
                }

                let start_pos = i + backtick_count;

                if let Some(end_pos) = find_closing_backticks(&text[start_pos..], backtick_count) {
                    if i > plain_start {
                        result.push(InlineElement::Text(at(plain_start, i)));
                    }

                    let mut code_start = start_pos;
                    let mut code_end = start_pos + end_pos;
                    // Strip single leading/trailing space if present (CommonMark rule)
                    let code = &text[code_start..code_end];
                    if code.len() > 1 && code.starts_with(' ') && code.ends_with(' ') {
                        code_start += 1;
                        code_end -= 1;
                    }
                    result.push(InlineElement::Code(at(code_start, code_end)));

                    let skip_to = start_pos + end_pos + backtick_count;
                    skip_until(&mut chars, skip_to);
                    plain_start = skip_to;
                }
                // No closing - the backticks stay in the plain text run
            }

            // Asterisk or underscore - potential bold/italic
            '*' | '_' if kinds.intersects(InlineKinds::BOLD | InlineKinds::ITALIC) => {
                let marker = c;
                let marker_start = i;

                let mut count = 1;
                while chars.peek().map(|(_, ch)| *ch == marker).unwrap_or(false) {
                    chars.next();
                    count += 1;
                }

                // Limit to 3 for bold+italic
                let effective_count = count.min(3);

                let can_open = if marker == '_' {
                    is_flanking_boundary(text[..i].chars().last())
                } else {
                    true
                };
                if !can_open {
                    continue;
                }

                let content_start = marker_start + count;
                let Some((close_len, end_pos)) =
                    find_closing_emphasis(&text[content_start..], marker, effective_count)
                else {
                    continue;
                };

                let style = match close_len {
                    1 => InlineStyle::Italic,
                    2 => InlineStyle::Bold,
                    _ => InlineStyle::BoldItalic,
                };
                if !kinds.allows(style) || end_pos == 0 {
                    continue;
                }

                if marker_start > plain_start {
                    result.push(InlineElement::Text(at(plain_start, marker_start)));
                }
                result.push(InlineElement::Styled {
                    style,
                    content: at(content_start, content_start + end_pos),
                });

                let skip_to = content_start + end_pos + close_len;
                skip_until(&mut chars, skip_to);
                plain_start = skip_to;
            }

            // Tilde - potential strikethrough
            '~' if kinds.contains(InlineKinds::STRIKETHROUGH) => {
                if !chars.peek().map(|(_, c)| *c == '~').unwrap_or(false) {
                    continue;
                }
                chars.next();

                let content_start = i + 2;
                if let Some(end_pos) = text[content_start..].find("~~") {
                    if i > plain_start {
                        result.push(InlineElement::Text(at(plain_start, i)));
                    }
                    result.push(InlineElement::Styled {
                        style: InlineStyle::Strikethrough,
                        content: at(content_start, content_start + end_pos),
                    });

                    let skip_to = content_start + end_pos + 2;
                    skip_until(&mut chars, skip_to);
                    plain_start = skip_to;
                }
            }

            // Square bracket - potential link
            '[' if kinds.contains(InlineKinds::LINK) => {
                if let Some(link) = parse_link(&text[i..]) {
                    if i > plain_start {
                        result.push(InlineElement::Text(at(plain_start, i)));
                    }
                    result.push(InlineElement::Link {
                        text: link.text.shift(base + i),
                        url: link.url.shift(base + i),
                    });

                    let skip_to = i + link.total_len;
                    skip_until(&mut chars, skip_to);
                    plain_start = skip_to;
                }
            }

            // Exclamation - potential image
            '!' if kinds.contains(InlineKinds::IMAGE) => {
                if !chars.peek().map(|(_, c)| *c == '[').unwrap_or(false) {
                    continue;
                }

                if let Some(link) = parse_link(&text[i + 1..]) {
                    if i > plain_start {
                        result.push(InlineElement::Text(at(plain_start, i)));
                    }
                    result.push(InlineElement::Image {
                        alt: link.text.shift(base + i + 1),
                        url: link.url.shift(base + i + 1),
                    });

                    let skip_to = i + 1 + link.total_len;
                    skip_until(&mut chars, skip_to);
                    plain_start = skip_to;
                }
            }

            // Dollar - math span, left for the math renderer untouched
            '$' if !text[..i].ends_with('$') => {
                if let Some(len) = math_span_len(&text[i..]) {
                    skip_until(&mut chars, i + len);
                }
            }

            // Backslash - a LaTeX environment is opaque as well
            '\\' => {
                if let Some(len) = environment_span_len(&text[i..]) {
                    skip_until(&mut chars, i + len);
                }
            }

            // Newline - could be hard break
            '\n' => {
                // Two spaces before newline
                if i >= 2 && text[..i].ends_with("  ") {
                    let text_end = i - 2;
                    if text_end > plain_start {
                        result.push(InlineElement::Text(at(plain_start, text_end)));
                    }
                    result.push(InlineElement::LineBreak);
                    plain_start = i + 1;
                }
            }

            _ => {}
        }
    }

    if plain_start < text.len() {
        result.push(InlineElement::Text(at(plain_start, text.len())));
    }

    collapse_text_elements(&mut result);

    result
}

fn skip_until<I>(chars: &mut std::iter::Peekable<I>, skip_to: usize)
where
    I: Iterator<Item = (usize, char)>,
{
    while chars.peek().map(|(idx, _)| *idx < skip_to).unwrap_or(false) {
        chars.next();
    }
}

/// Underscores only open/close emphasis next to whitespace, punctuation or
/// the edge of the text.
pub(crate) fn is_flanking_boundary(neighbor: Option<char>) -> bool {
    neighbor
        .map(|c| c.is_whitespace() || c.is_ascii_punctuation())
        .unwrap_or(true)
}

/// Find closing backticks matching the opening count.
pub(crate) fn find_closing_backticks(text: &str, count: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'`' {
            let run_start = i;
            while i < bytes.len() && bytes[i] == b'`' {
                i += 1;
            }
            if i - run_start == count {
                return Some(run_start);
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Length of the math span `text` starts with: `$$..$$` or a single-line
/// `$..$`. A `$` touching another `$` never closes inline math.
pub(crate) fn math_span_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'$') {
        return None;
    }

    if bytes.get(1) == Some(&b'$') {
        let close = 2 + text[2..].find('$')?;
        return (close > 2 && bytes.get(close + 1) == Some(&b'$')).then_some(close + 2);
    }

    let close = 1 + bytes[1..].iter().position(|&b| b == b'$' || b == b'\n')?;
    let closed = bytes[close] == b'$' && close > 1 && bytes.get(close + 1) != Some(&b'$');
    closed.then_some(close + 1)
}

/// Length of the `\begin{name}..\end{name}` environment `text` starts with.
pub(crate) fn environment_span_len(text: &str) -> Option<usize> {
    let rest = text.strip_prefix("\\begin{")?;
    let name_end = rest.find('}')?;
    let name = rest[..name_end].trim_end_matches('*');
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let needle = format!("\\end{{{name}");
    let mut pos = 0;
    while let Some(hit) = text[pos..].find(&needle) {
        let after = pos + hit + needle.len();
        if text[after..].starts_with('}') {
            return Some(after + 1);
        }
        if text[after..].starts_with("*}") {
            return Some(after + 2);
        }
        pos = after;
    }
    None
}

/// Find closing emphasis marker, skipping over math spans.
/// Returns (actual_close_len, end_position) if found.
fn find_closing_emphasis(text: &str, marker: char, open_count: usize) -> Option<(usize, usize)> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c == '$' && !text[..pos].ends_with('$') {
            if let Some(len) = math_span_len(&text[pos..]) {
                while i < chars.len() && chars[i].0 < pos + len {
                    i += 1;
                }
                continue;
            }
        }

        if c == marker {
            let mut count = 1;
            while i + count < chars.len() && chars[i + count].1 == marker {
                count += 1;
            }

            let can_close = if marker == '_' {
                is_flanking_boundary(chars.get(i + count).map(|(_, c)| *c))
            } else {
                true
            };

            if can_close && count >= open_count.min(3) {
                let close_len = count.min(open_count).min(3);
                return Some((close_len, pos));
            }

            i += count;
        } else {
            i += 1;
        }
    }
    None
}

/// A link parsed relative to the `[` it starts with.
pub(crate) struct ParsedLink {
    pub text: Span,
    pub url: Span,
    pub total_len: usize,
}

/// Parse a link starting with [
pub(crate) fn parse_link(text: &str) -> Option<ParsedLink> {
    if !text.starts_with('[') {
        return None;
    }

    let mut bracket_depth = 0;
    let mut bracket_end = None;

    for (i, c) in text.char_indices() {
        match c {
            '[' => bracket_depth += 1,
            ']' => {
                bracket_depth -= 1;
                if bracket_depth == 0 {
                    bracket_end = Some(i);
                    break;
                }
            }
            '\n' => return None,
            _ => {}
        }
    }

    let bracket_end = bracket_end?;

    // Check for ( immediately after ]
    let rest = &text[bracket_end + 1..];
    if !rest.starts_with('(') {
        return None;
    }

    let mut paren_depth = 0;
    let mut paren_end = None;

    for (i, c) in rest.char_indices() {
        match c {
            '(' => paren_depth += 1,
            ')' => {
                paren_depth -= 1;
                if paren_depth == 0 {
                    paren_end = Some(i);
                    break;
                }
            }
            '\n' => return None,
            _ => {}
        }
    }

    let paren_end = paren_end?;
    let url_start = bracket_end + 2;

    Some(ParsedLink {
        text: Span::new(1, bracket_end),
        url: Span::new(url_start, bracket_end + 1 + paren_end),
        // [ + text + ] + ( + url + )
        total_len: bracket_end + 1 + paren_end + 1,
    })
}

/// Collapse adjacent Text elements into one.
fn collapse_text_elements(elements: &mut Vec<InlineElement>) {
    if elements.len() < 2 {
        return;
    }

    let mut write = 0;
    for read in 1..elements.len() {
        if let (InlineElement::Text(a), InlineElement::Text(b)) = (&elements[write], &elements[read])
        {
            if a.end == b.start {
                elements[write] = InlineElement::Text(Span::new(a.start, b.end));
                continue;
            }
        }
        write += 1;
        if write != read {
            elements.swap(write, read);
        }
    }
    elements.truncate(write + 1);
}
