//! Detection of constructs whose closing delimiter hasn't arrived yet.
//!
//! Each construct type is checked on its own, so several can be forming at
//! once. A construct type with an odd delimiter count is reported as forming
//! and masked out of the inline parser entirely.

use crate::inline::{
    environment_span_len, find_closing_backticks, is_flanking_boundary, math_span_len, parse_link,
    InlineKinds,
};
use crate::partial::{Partial, PartialKind};

/// What kind of construct is still waiting for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormingKind {
    Bold,
    Italic,
    InlineCode,
    Strikethrough,
    Link,
    Image,
    CodeFence,
    Heading,
    ListItem,
    BlockQuote,
    Table,
    Paragraph,
}

impl FormingKind {
    pub fn name(&self) -> &'static str {
        match self {
            FormingKind::Bold => "bold",
            FormingKind::Italic => "italic",
            FormingKind::InlineCode => "inline-code",
            FormingKind::Strikethrough => "strikethrough",
            FormingKind::Link => "link",
            FormingKind::Image => "image",
            FormingKind::CodeFence => "code-fence",
            FormingKind::Heading => "heading",
            FormingKind::ListItem => "list-item",
            FormingKind::BlockQuote => "blockquote",
            FormingKind::Table => "table",
            FormingKind::Paragraph => "paragraph",
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            FormingKind::Bold
                | FormingKind::Italic
                | FormingKind::InlineCode
                | FormingKind::Strikethrough
                | FormingKind::Link
                | FormingKind::Image
        )
    }

    fn mask(&self) -> InlineKinds {
        match self {
            FormingKind::Bold => InlineKinds::BOLD,
            FormingKind::Italic => InlineKinds::ITALIC,
            FormingKind::InlineCode => InlineKinds::CODE,
            FormingKind::Strikethrough => InlineKinds::STRIKETHROUGH,
            FormingKind::Link => InlineKinds::LINK,
            FormingKind::Image => InlineKinds::IMAGE,
            _ => InlineKinds::empty(),
        }
    }
}

/// A construct that is still incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormingElement {
    pub kind: FormingKind,
    /// Absolute byte offset of the unmatched opening delimiter
    pub start: usize,
}

/// Result of scanning the pending buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineForming {
    pub elements: Vec<FormingElement>,
    /// Inline constructs that must stay literal
    pub disallowed: InlineKinds,
}

impl InlineForming {
    /// Inline constructs that may be tagged.
    pub fn allowed(&self) -> InlineKinds {
        InlineKinds::all().difference(self.disallowed)
    }
}

/// Tracks the parity of one delimiter type and where the last unmatched
/// opener sits.
#[derive(Default)]
struct Parity {
    open_at: Option<usize>,
}

impl Parity {
    fn toggle(&mut self, times: usize, at: usize) {
        if times % 2 == 1 {
            self.open_at = match self.open_at {
                Some(_) => None,
                None => Some(at),
            };
        }
    }
}

/// Scan `pending` (which starts at absolute offset `base`) for forming
/// inline constructs.
pub fn detect_inline(pending: &str, base: usize) -> InlineForming {
    let bytes = pending.as_bytes();
    let mut bold = Parity::default();
    let mut italic = Parity::default();
    let mut strike = Parity::default();
    let mut code_at: Option<usize> = None;
    let mut link_at: Option<(FormingKind, usize)> = None;

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'`' => {
                let run = run_len(bytes, i, b'`');
                let after = i + run;
                match find_closing_backticks(&pending[after..], run) {
                    // Closed code span: nothing inside counts
                    Some(close) => i = after + close + run,
                    None => {
                        // Unmatched run: later delimiters still count
                        code_at.get_or_insert(i);
                        i = after;
                    }
                }
            }

            // Closed math spans are opaque; an unclosed `$` is plain text
            b'$' if i == 0 || bytes[i - 1] != b'$' => {
                i += math_span_len(&pending[i..]).unwrap_or(1);
            }

            b'\\' => {
                i += environment_span_len(&pending[i..]).unwrap_or(1);
            }

            b'*' => {
                let run = run_len(bytes, i, b'*');
                bold.toggle(run / 2, i);
                italic.toggle(run % 2, i);
                i += run;
            }

            b'_' => {
                let run = run_len(bytes, i, b'_');
                let before = pending[..i].chars().next_back();
                let after = pending[i + run..].chars().next();
                if is_flanking_boundary(before) || is_flanking_boundary(after) {
                    bold.toggle(run / 2, i);
                    italic.toggle(run % 2, i);
                }
                i += run;
            }

            b'~' => {
                let run = run_len(bytes, i, b'~');
                strike.toggle(run / 2, i);
                i += run;
            }

            b'[' => {
                let is_image = i > 0 && bytes[i - 1] == b'!';
                let rest = &pending[i..];
                match parse_link(rest) {
                    Some(link) => i += link.total_len,
                    None => {
                        if link_at.is_none() && could_become_link(rest) {
                            let (kind, at) = if is_image {
                                (FormingKind::Image, i - 1)
                            } else {
                                (FormingKind::Link, i)
                            };
                            link_at = Some((kind, at));
                        }
                        i += 1;
                    }
                }
            }

            _ => i += 1,
        }
    }

    let mut elements = Vec::new();
    let candidates = [
        (FormingKind::Bold, bold.open_at),
        (FormingKind::Italic, italic.open_at),
        (FormingKind::InlineCode, code_at),
        (FormingKind::Strikethrough, strike.open_at),
    ];
    for (kind, at) in candidates {
        if let Some(at) = at {
            elements.push(FormingElement {
                kind,
                start: base + at,
            });
        }
    }
    if let Some((kind, at)) = link_at {
        elements.push(FormingElement {
            kind,
            start: base + at,
        });
    }

    elements.sort_by_key(|e| e.start);
    let disallowed = elements
        .iter()
        .fold(InlineKinds::empty(), |mask, e| mask | e.kind.mask());

    InlineForming {
        elements,
        disallowed,
    }
}

/// Map the parser's speculative block to a forming element.
pub fn block_forming(partial: &Partial) -> FormingElement {
    let kind = match partial.kind {
        PartialKind::CodeFence { .. } => FormingKind::CodeFence,
        PartialKind::Heading { .. } => FormingKind::Heading,
        PartialKind::ListItem { .. } => FormingKind::ListItem,
        PartialKind::BlockQuote { .. } => FormingKind::BlockQuote,
        PartialKind::Table => FormingKind::Table,
        PartialKind::Paragraph => FormingKind::Paragraph,
    };
    FormingElement {
        kind,
        start: partial.start_pos,
    }
}

fn run_len(bytes: &[u8], start: usize, byte: u8) -> usize {
    bytes[start..].iter().take_while(|&&b| b == byte).count()
}

/// True while more input could still turn `[...` into a link.
fn could_become_link(rest: &str) -> bool {
    if rest.contains('\n') {
        return false;
    }

    let mut depth = 0usize;
    for (i, c) in rest.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    // The text part closed; only `(` or end of input keeps it alive
                    let after = &rest[i + 1..];
                    return after.is_empty() || after.starts_with('(');
                }
            }
            _ => {}
        }
    }

    true
}
