//! Plain-language equations rewritten to canonical LaTeX.
//!
//! Every rewrite produces text its own pattern either reproduces verbatim or
//! no longer matches, so applying the table twice equals applying it once.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

struct Shorthand {
    pattern: Regex,
    latex: &'static str,
}

const TABLE: [(&str, &str); 15] = [
    // Physics
    (r"\bE\s*=\s*mc\^?2\b", "E = mc^2"),
    (r"\bF\s*=\s*ma\b", "F = ma"),
    (r"\bp\s*=\s*mv\b", "p = mv"),
    (r"\bE\s*=\s*h\*?f\b", "E = hf"),
    (r"\bv\s*=\s*f\*?\s*λ", r"v = f\lambda"),
    // Geometry
    (r"\ba\^?2\s*\+\s*b\^?2\s*=\s*c\^?2\b", "a^2 + b^2 = c^2"),
    (r"\barea\s*=\s*π\s*\*?\s*r\^?2\b", r"A = \pi r^2"),
    (r"\barea\s*=\s*pi\s*\*?\s*r\^?2\b", r"A = \pi r^2"),
    (r"\bcircumference\s*=\s*2\s*\*?\s*π\s*\*?\s*r\b", r"C = 2\pi r"),
    (r"\bcircumference\s*=\s*2\s*\*?\s*pi\s*\*?\s*r\b", r"C = 2\pi r"),
    // Algebra
    (
        r"\bx\s*=\s*\(\s*-\s*b\s*\+/?-\s*sqrt\(b\^?2\s*-\s*4\s*a\s*c\)\s*\)\s*/\s*2\s*a\b",
        r"x = \frac{-b \pm \sqrt{b^2 - 4ac}}{2a}",
    ),
    // Calculus
    (
        r"\bd/dx\s*\(\s*sin\s*x\s*\)\s*=\s*cos\s*x\b",
        r"\frac{d}{dx}(\sin x) = \cos x",
    ),
    (
        r"\bd/dx\s*\(\s*cos\s*x\s*\)\s*=\s*-\s*sin\s*x\b",
        r"\frac{d}{dx}(\cos x) = -\sin x",
    ),
    // Statistics
    (
        r"\bmean\s*=\s*sum\s*x\s*/\s*n\b",
        r"\bar{x} = \frac{\sum x}{n}",
    ),
    (
        r"\bvariance\s*=\s*sum\s*\(\s*x\s*-\s*mean\s*\)\^?2\s*/\s*n\b",
        r"\sigma^2 = \frac{\sum(x - \bar{x})^2}{n}",
    ),
];

static SHORTHANDS: Lazy<Vec<Shorthand>> = Lazy::new(|| {
    TABLE
        .iter()
        .filter_map(|(pattern, latex)| {
            // Case-insensitive, like the prose it rewrites
            let pattern = Regex::new(&format!("(?i){pattern}")).ok()?;
            Some(Shorthand { pattern, latex })
        })
        .collect()
});

/// Rewrite every known shorthand in `text`.
pub fn rewrite(text: &str) -> Cow<'_, str> {
    let mut out = Cow::Borrowed(text);

    for shorthand in SHORTHANDS.iter() {
        if !shorthand.pattern.is_match(&out) {
            continue;
        }
        let replaced = shorthand
            .pattern
            .replace_all(&out, regex::NoExpand(shorthand.latex))
            .into_owned();
        out = Cow::Owned(replaced);
    }

    out
}
