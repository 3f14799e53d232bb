//! Finding math in raw text, one pass per syntax.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::segment::MathKind;

static MATH_CODE_BLOCK: Lazy<Regex> = Lazy::new(|| compile(r"(?s)```(?:math|latex|tex)\n?(.*?)```"));
static ENV_BEGIN: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"\\begin\{(equation|align|gather|multline|split|cases|matrix|pmatrix|bmatrix|vmatrix|Vmatrix)\*?\}",
    )
});
static DISPLAY_MATH: Lazy<Regex> = Lazy::new(|| compile(r"\$\$([^$]+?)\$\$"));

/// Compiles a built-in pattern. These are constants, so a bad one is a bug.
pub(crate) fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => panic!("invalid built-in pattern {pattern:?}: {err}"),
    }
}

/// One match: the byte range it replaces and the source handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Found<'a> {
    pub start: usize,
    pub end: usize,
    pub source: &'a str,
    pub kind: MathKind,
}

/// The passes, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pass {
    CodeBlock,
    Environment,
    Display,
    Inline,
}

impl Pass {
    pub const ORDER: [Pass; 4] = [Pass::CodeBlock, Pass::Environment, Pass::Display, Pass::Inline];

    pub fn find<'a>(&self, text: &'a str) -> Vec<Found<'a>> {
        match self {
            Pass::CodeBlock => math_code_blocks(text),
            Pass::Environment => environments(text),
            Pass::Display => display_math(text),
            Pass::Inline => inline_math(text),
        }
    }
}

fn math_code_blocks(text: &str) -> Vec<Found<'_>> {
    MATH_CODE_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Found {
                start: whole.start(),
                end: whole.end(),
                source: caps.get(1)?.as_str().trim(),
                kind: MathKind::CodeBlock,
            })
        })
        .collect()
}

/// `\begin{name}` up to the matching `\end{name}`, either with or without
/// the star. The whole environment is the source.
fn environments(text: &str) -> Vec<Found<'_>> {
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(caps) = ENV_BEGIN.captures_at(text, pos) {
        let (Some(begin), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };

        match find_env_end(text, begin.end(), name.as_str()) {
            Some(end) => {
                found.push(Found {
                    start: begin.start(),
                    end,
                    source: &text[begin.start()..end],
                    kind: MathKind::Environment(name.as_str().to_string()),
                });
                pos = end;
            }
            None => pos = begin.end(),
        }
    }

    found
}

fn find_env_end(text: &str, from: usize, name: &str) -> Option<usize> {
    let needle = format!("\\end{{{name}");
    let mut pos = from;

    while let Some(hit) = text[pos..].find(&needle) {
        let after = pos + hit + needle.len();
        let rest = &text[after..];
        if rest.starts_with('}') {
            return Some(after + 1);
        }
        if rest.starts_with("*}") {
            return Some(after + 2);
        }
        pos = after;
    }

    None
}

fn display_math(text: &str) -> Vec<Found<'_>> {
    DISPLAY_MATH
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Found {
                start: whole.start(),
                end: whole.end(),
                source: caps.get(1)?.as_str().trim(),
                kind: MathKind::Display,
            })
        })
        .collect()
}

/// `$..$` on a single line. A `$` touching another `$` never opens or
/// closes inline math.
fn inline_math(text: &str) -> Vec<Found<'_>> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' || (i > 0 && bytes[i - 1] == b'$') {
            i += 1;
            continue;
        }

        let content_start = i + 1;
        let close = bytes[content_start..]
            .iter()
            .position(|&b| b == b'$' || b == b'\n')
            .map(|offset| content_start + offset);

        let matched = match close {
            Some(close) if bytes[close] == b'$' && close > content_start => {
                let doubled = bytes.get(close + 1) == Some(&b'$');
                (!doubled).then_some(close)
            }
            _ => None,
        };

        match matched {
            Some(close) => {
                found.push(Found {
                    start: i,
                    end: close + 1,
                    source: text[content_start..close].trim(),
                    kind: MathKind::Inline,
                });
                i = close + 1;
            }
            None => i += 1,
        }
    }

    found
}
