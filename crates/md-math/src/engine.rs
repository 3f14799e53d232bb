//! The equation engine seam.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::markup::escape;
use crate::scan::compile;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EquationError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Renders TeX source to markup. Implementations must not panic on bad
/// input; failures come back as [`EquationError`].
pub trait EquationEngine {
    fn render_equation(&self, source: &str, display_mode: bool) -> Result<String, EquationError>;
}

impl<F> EquationEngine for F
where
    F: Fn(&str, bool) -> Result<String, EquationError>,
{
    fn render_equation(&self, source: &str, display_mode: bool) -> Result<String, EquationError> {
        self(source, display_mode)
    }
}

/// What an engine leaves in its output when it rendered an error instead of
/// throwing: a `katex-error` class or a `ParseError` title. Only attribute
/// values count, so equation text that mentions either is not an error.
static ERROR_MARKUP: Lazy<Regex> = Lazy::new(|| {
    compile(r#"\bclass\s*=\s*"[^"]*\bkatex-error\b[^"]*"|\btitle\s*=\s*"ParseError\b"#)
});

pub fn has_engine_error(markup: &str) -> bool {
    ERROR_MARKUP.is_match(markup)
}

/// Built-in stand-in engine. It does no typesetting: the (macro-expanded)
/// TeX is escaped into `katex`-classed spans so the surrounding pipeline
/// can run without a real engine.
#[derive(Debug, Clone, Default)]
pub struct TexSourceEngine {
    macros: IndexMap<String, String>,
}

impl TexSourceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The engine with the common number-set and statistics macros.
    pub fn with_default_macros() -> Self {
        let mut engine = Self::new();
        for (name, expansion) in DEFAULT_MACROS {
            engine.add_macro(name, expansion);
        }
        engine
    }

    pub fn add_macro(&mut self, name: &str, expansion: &str) {
        self.macros.insert(name.to_string(), expansion.to_string());
    }

    fn expand(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut rest = source;

        while let Some(slash) = rest.find('\\') {
            out.push_str(&rest[..slash]);
            let after = &rest[slash + 1..];
            let name_len = after
                .char_indices()
                .find(|(_, c)| !c.is_ascii_alphabetic())
                .map(|(i, _)| i)
                .unwrap_or(after.len());

            if name_len == 0 {
                // `\\`, `\{` and friends pass through untouched
                let escaped_len = after.chars().next().map(char::len_utf8).unwrap_or(0);
                out.push_str(&rest[slash..slash + 1 + escaped_len]);
                rest = &after[escaped_len..];
                continue;
            }

            let command = &rest[slash..slash + 1 + name_len];
            match self.macros.get(command) {
                Some(expansion) => out.push_str(expansion),
                None => out.push_str(command),
            }
            rest = &after[name_len..];
        }
        out.push_str(rest);

        out
    }
}

const DEFAULT_MACROS: [(&str, &str); 11] = [
    ("\\RR", "\\mathbb{R}"),
    ("\\NN", "\\mathbb{N}"),
    ("\\ZZ", "\\mathbb{Z}"),
    ("\\QQ", "\\mathbb{Q}"),
    ("\\CC", "\\mathbb{C}"),
    ("\\PP", "\\mathbb{P}"),
    ("\\EE", "\\mathbb{E}"),
    ("\\Var", "\\text{Var}"),
    ("\\Cov", "\\text{Cov}"),
    ("\\e", "\\mathrm{e}"),
    ("\\i", "\\mathrm{i}"),
];

impl EquationEngine for TexSourceEngine {
    fn render_equation(&self, source: &str, display_mode: bool) -> Result<String, EquationError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(EquationError::Parse("empty expression".to_string()));
        }
        if !braces_balanced(source) {
            return Err(EquationError::Parse(format!(
                "unbalanced braces in {source:?}"
            )));
        }

        let tex = escape(&self.expand(source));
        let inner = format!("<span class=\"katex\"><span class=\"katex-tex\">{tex}</span></span>");
        if display_mode {
            Ok(format!("<span class=\"katex-display\">{inner}</span>"))
        } else {
            Ok(inner)
        }
    }
}

fn braces_balanced(source: &str) -> bool {
    let mut depth: i32 = 0;
    let mut escaped = false;
    for c in source.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_closure_engine() {
        let engine = |source: &str, display: bool| -> Result<String, EquationError> {
            Ok(format!("{source}:{display}"))
        };
        assert_eq!(engine.render_equation("x", true), Ok("x:true".to_string()));
    }

    #[test]
    fn test_tex_source_engine_escapes() {
        let engine = TexSourceEngine::new();
        assert_eq!(
            engine.render_equation("a < b", false),
            Ok("<span class=\"katex\"><span class=\"katex-tex\">a &lt; b</span></span>".to_string())
        );
        let display = engine.render_equation("x", true).unwrap_or_default();
        assert!(display.starts_with("<span class=\"katex-display\">"));
    }

    #[test]
    fn test_tex_source_engine_rejects_bad_input() {
        let engine = TexSourceEngine::new();
        assert!(matches!(
            engine.render_equation("\\frac{a}{b", true),
            Err(EquationError::Parse(_))
        ));
        assert!(engine.render_equation("  ", false).is_err());
    }

    #[test]
    fn test_macro_expansion() {
        let engine = TexSourceEngine::with_default_macros();
        assert_eq!(engine.expand("x \\in \\RR"), "x \\in \\mathbb{R}");
        // Longer commands sharing a prefix are left alone
        assert_eq!(engine.expand("\\exp + \\e"), "\\exp + \\mathrm{e}");
        assert_eq!(engine.expand("a \\\\ b \\{"), "a \\\\ b \\{");
    }

    #[test]
    fn test_error_markers() {
        assert!(has_engine_error("<span class=\"katex-error\">x</span>"));
        assert!(has_engine_error("<span class=\"x katex-error\" title=\"ParseError: y\">y</span>"));
        assert!(has_engine_error("<span title=\"ParseError: KaTeX parse error\">z</span>"));
        assert!(!has_engine_error("<span class=\"katex\">x</span>"));
    }

    #[test]
    fn test_error_words_in_equation_text_are_not_errors() {
        let engine = TexSourceEngine::new();
        for source in [r"\text{ParseError}", r"\text{katex-error}", r#"\text{class="katex-error"}"#] {
            let markup = engine.render_equation(source, false).unwrap();
            assert!(!has_engine_error(&markup), "{source} flagged as an error");
        }
    }
}
