use once_cell::sync::Lazy;
use regex::Regex;

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => panic!("invalid built-in pattern {pattern:?}: {err}"),
    }
}

pub(crate) static SENTENCE_END: Lazy<Regex> = Lazy::new(|| compile(r"[.!?]+\s+"));
pub(crate) static PARAGRAPH_END: Lazy<Regex> = Lazy::new(|| compile(r"\n\s*\n"));
pub(crate) static CLAUSE_BREAK: Lazy<Regex> = Lazy::new(|| compile(r"[,;:\-—]\s+"));
pub(crate) static WHITESPACE: Lazy<Regex> = Lazy::new(|| compile(r"\s+"));

pub(crate) static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| compile(r"(?s)```.*?```"));
pub(crate) static MATH_BLOCK: Lazy<Regex> = Lazy::new(|| compile(r"(?s)\$\$.*?\$\$"));
pub(crate) static HEADER: Lazy<Regex> = Lazy::new(|| compile(r"(?m)^(#{1,6})[ \t]+.*$"));
pub(crate) static LIST_ITEM: Lazy<Regex> = Lazy::new(|| compile(r"(?m)^[ \t]*[-*+][ \t]+.*$"));
pub(crate) static LIST_MARKER: Lazy<Regex> = Lazy::new(|| compile(r"^(?:[-*+]|\d{1,9}[.)])[ \t]"));
