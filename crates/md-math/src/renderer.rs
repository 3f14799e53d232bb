use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{content_key, equation_key, FifoCache};
use crate::engine::{has_engine_error, EquationEngine};
use crate::gate::{EngineGate, EngineStatus};
use crate::markup::{self, BlockState};
use crate::scan::{compile, Pass};
use crate::segment::{join, MathKind, MathStatus, RenderedMath, Segment};
use crate::shorthand;

pub const DEFAULT_CACHE_CAPACITY: usize = 200;

/// `<pre>` and `<code>` elements, whose contents are never treated as math.
static CODE_REGION: Lazy<Regex> =
    Lazy::new(|| compile(r"(?is)<pre\b[^>]*>.*?</pre>|<code\b[^>]*>.*?</code>"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MathStats {
    pub equations_cached: usize,
    pub equation_capacity: usize,
    pub equation_hits: u64,
    pub equation_misses: u64,
    pub contents_cached: usize,
    pub content_hits: u64,
    pub rendered: u64,
    pub errors: u64,
    pub loading: u64,
}

/// Finds math in text and replaces it with rendered blocks and spans.
///
/// Holds its own caches; two renderers never share state.
pub struct MathRenderer {
    engine: Box<dyn EquationEngine>,
    gate: EngineGate,
    equations: FifoCache<Result<String, String>>,
    contents: FifoCache<String>,
    next_id: u64,
    rendered: u64,
    errors: u64,
    loading: u64,
}

impl MathRenderer {
    /// A renderer whose engine is ready right away.
    pub fn new(engine: impl EquationEngine + 'static) -> Self {
        Self::with_gate(engine, EngineGate::ready())
    }

    pub fn with_gate(engine: impl EquationEngine + 'static, gate: EngineGate) -> Self {
        Self {
            engine: Box::new(engine),
            gate,
            equations: FifoCache::new(DEFAULT_CACHE_CAPACITY),
            contents: FifoCache::new(DEFAULT_CACHE_CAPACITY),
            next_id: 0,
            rendered: 0,
            errors: 0,
            loading: 0,
        }
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.equations = FifoCache::new(capacity);
        self.contents = FifoCache::new(capacity);
        self
    }

    pub fn gate(&self) -> &EngineGate {
        &self.gate
    }

    /// Render one equation into a block (display mode) or an inline span.
    pub fn render(&mut self, source: &str, display_mode: bool) -> RenderedMath {
        let kind = if display_mode {
            MathKind::Display
        } else {
            MathKind::Inline
        };
        self.render_kind(source, kind)
    }

    /// Render all math in `content`. Content that already carries rendered
    /// math comes back unchanged, so running this twice is the same as once.
    pub fn process_content(&mut self, content: &str) -> String {
        join(&self.process_content_segments(content))
    }

    /// [`Self::process_content`] keeping the segments, so callers can tell
    /// loading placeholders apart. Cached output comes back as one raw
    /// segment.
    pub fn process_content_segments(&mut self, content: &str) -> Vec<Segment> {
        if content.is_empty() || markup::is_processed(content) {
            return vec![Segment::Raw(content.to_string())];
        }

        let key = content_key(content);
        if let Some(cached) = self.contents.get(&key) {
            debug!("math content cache hit ({} bytes)", content.len());
            return vec![Segment::Raw(cached)];
        }

        let segments = self.process(Segment::Raw(content.to_string()));
        // Placeholders must be rendered again once the engine is up
        if !segments.iter().any(Segment::is_loading) {
            self.contents.insert(key, join(&segments));
        }

        segments
    }

    /// Run the passes over a segment. Rendered segments pass through.
    pub fn process(&mut self, segment: Segment) -> Vec<Segment> {
        let text = match segment {
            Segment::Raw(text) if !markup::is_processed(&text) => text,
            other => return vec![other],
        };

        let text = shorthand::rewrite(&text).into_owned();
        self.run_passes(vec![Segment::Raw(text)], false)
    }

    pub fn process_segments(&mut self, segments: Vec<Segment>) -> Vec<Segment> {
        segments
            .into_iter()
            .flat_map(|segment| self.process(segment))
            .collect()
    }

    /// Like [`Self::process_content`] for HTML: `<pre>` and `<code>` regions
    /// are left alone and entity-escaped sources are unescaped before they
    /// reach the engine.
    pub fn process_html(&mut self, html: &str) -> String {
        join(&self.process_html_segments(html))
    }

    pub fn process_html_segments(&mut self, html: &str) -> Vec<Segment> {
        if markup::is_processed(html) {
            return vec![Segment::Raw(html.to_string())];
        }

        let mut out = Vec::new();
        let mut last = 0;
        let regions: Vec<(usize, usize)> = CODE_REGION
            .find_iter(html)
            .map(|m| (m.start(), m.end()))
            .collect();

        for (start, end) in regions {
            if start > last {
                out.extend(self.process_html_text(&html[last..start]));
            }
            out.push(Segment::Raw(html[start..end].to_string()));
            last = end;
        }
        if last < html.len() {
            out.extend(self.process_html_text(&html[last..]));
        }

        out
    }

    pub fn clear_cache(&mut self) {
        self.equations.clear();
        self.contents.clear();
    }

    pub fn stats(&self) -> MathStats {
        MathStats {
            equations_cached: self.equations.len(),
            equation_capacity: self.equations.capacity(),
            equation_hits: self.equations.hits(),
            equation_misses: self.equations.misses(),
            contents_cached: self.contents.len(),
            content_hits: self.contents.hits(),
            rendered: self.rendered,
            errors: self.errors,
            loading: self.loading,
        }
    }

    fn process_html_text(&mut self, text: &str) -> Vec<Segment> {
        let text = shorthand::rewrite(text).into_owned();
        self.run_passes(vec![Segment::Raw(text)], true)
    }

    fn run_passes(&mut self, mut segments: Vec<Segment>, unescape: bool) -> Vec<Segment> {
        for pass in Pass::ORDER {
            segments = self.run_pass(pass, segments, unescape);
        }
        segments
    }

    fn run_pass(&mut self, pass: Pass, segments: Vec<Segment>, unescape: bool) -> Vec<Segment> {
        let mut out = Vec::with_capacity(segments.len());

        for segment in segments {
            let text = match segment {
                Segment::Raw(text) => text,
                rendered => {
                    out.push(rendered);
                    continue;
                }
            };

            let found = pass.find(&text);
            if found.is_empty() {
                out.push(Segment::Raw(text));
                continue;
            }

            let mut last = 0;
            for hit in found {
                if hit.start > last {
                    out.push(Segment::Raw(text[last..hit.start].to_string()));
                }
                let source = if unescape {
                    markup::unescape(hit.source)
                } else {
                    hit.source.to_string()
                };
                out.push(Segment::Rendered(self.render_kind(&source, hit.kind)));
                last = hit.end;
            }
            if last < text.len() {
                out.push(Segment::Raw(text[last..].to_string()));
            }
        }

        out
    }

    fn render_kind(&mut self, source: &str, kind: MathKind) -> RenderedMath {
        let display_mode = kind.display_mode();
        let id = self.next_id(display_mode);

        let (status, markup) = match self.gate.status() {
            EngineStatus::Loading => (MathStatus::Loading, None),
            EngineStatus::Failed(reason) => (MathStatus::Error(reason), None),
            EngineStatus::Ready => match self.equation(source, display_mode) {
                Ok(markup) => (MathStatus::Rendered, Some(markup)),
                Err(reason) => (MathStatus::Error(reason), None),
            },
        };

        let state = match status {
            MathStatus::Rendered => {
                self.rendered += 1;
                BlockState::Rendered
            }
            MathStatus::Error(_) => {
                self.errors += 1;
                BlockState::Error
            }
            MathStatus::Loading => {
                self.loading += 1;
                BlockState::Loading
            }
        };

        let html = if display_mode {
            markup::block(&id, &kind.title(), source, state, markup.as_deref())
        } else {
            markup::inline(&id, source, state, markup.as_deref())
        };

        RenderedMath {
            id,
            kind,
            source: source.to_string(),
            status,
            html,
        }
    }

    fn equation(&mut self, source: &str, display_mode: bool) -> Result<String, String> {
        let key = equation_key(source, display_mode);
        if let Some(cached) = self.equations.get(&key) {
            debug!("equation cache hit: {source:?}");
            return cached;
        }

        let result = match self.engine.render_equation(source, display_mode) {
            Ok(markup) if has_engine_error(&markup) => {
                warn!("equation engine reported an error for {source:?}");
                Err("equation engine reported an error".to_string())
            }
            Ok(markup) => Ok(markup),
            Err(err) => {
                warn!("failed to render {source:?}: {err}");
                Err(err.to_string())
            }
        };

        self.equations.insert(key, result.clone());
        result
    }

    fn next_id(&mut self, display_mode: bool) -> String {
        self.next_id += 1;
        let kind = if display_mode { "block" } else { "inline" };
        format!("md-math-{kind}-{}", self.next_id)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::engine::{EquationError, TexSourceEngine};
    use pretty_assertions::assert_eq;

    fn renderer() -> MathRenderer {
        MathRenderer::new(TexSourceEngine::new())
    }

    fn rendered(segments: &[Segment]) -> Vec<&RenderedMath> {
        segments.iter().filter_map(Segment::rendered).collect()
    }

    #[test]
    fn test_single_display_block() {
        let mut math = renderer();
        let out = math.process_content("Use $$E=mc^2$$ now");

        assert!(out.starts_with("Use <div"));
        assert!(out.ends_with("</div> now"));
        assert_eq!(out.matches("class=\"md-math-block success\"").count(), 1);
        assert_eq!(math.process_content(&out), out);
    }

    #[test]
    fn test_shorthand_runs_before_passes() {
        let mut math = renderer();
        let segments = math.process(Segment::Raw("Use $$E=mc^2$$ now".to_string()));
        let found = rendered(&segments);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, MathKind::Display);
        assert_eq!(found[0].source, "E = mc^2");
    }

    #[test]
    fn test_pass_order() {
        let mut math = renderer();
        let text = "```math\na\n``` \\begin{align}b\\end{align} $$c$$ $d$";
        let segments = math.process(Segment::Raw(text.to_string()));
        let kinds: Vec<_> = rendered(&segments).iter().map(|m| m.kind.title()).collect();

        assert_eq!(
            kinds,
            vec!["Math Block", "ALIGN Environment", "Display Math", "Inline Math"]
        );
    }

    #[test]
    fn test_processing_twice_equals_once() {
        let (_loader, loading) = EngineGate::loading();
        let failing = || -> MathRenderer {
            MathRenderer::new(|_: &str, _: bool| -> Result<String, EquationError> {
                Err(EquationError::Parse("bad".to_string()))
            })
        };
        let waiting = || MathRenderer::with_gate(TexSourceEngine::new(), loading.clone());

        let cases: [(&str, &dyn Fn() -> MathRenderer); 9] = [
            ("E=mc^2 is famous", &renderer),
            ("inline $x+1$ here", &renderer),
            (r"\begin{align} a &= b \end{align}", &renderer),
            ("a lone $$ sign", &renderer),
            ("$a$$b$", &renderer),
            ("nothing to see", &renderer),
            ("```math\nx^2\n``` and $y$", &renderer),
            ("wait for $x$", &waiting),
            ("$$x < 1$$", &failing),
        ];

        for (input, make) in cases {
            let once = make().process_content(input);
            let twice = make().process_content(&once);
            assert_eq!(twice, once, "input: {input:?}");
        }
    }

    #[test]
    fn test_rendered_segments_pass_through() {
        let mut math = renderer();
        let done = Segment::Rendered(math.render("x", false));
        assert_eq!(math.process(done.clone()), vec![done]);
    }

    #[test]
    fn test_engine_error_becomes_error_block() {
        let mut math = MathRenderer::new(|_: &str, _: bool| -> Result<String, EquationError> {
            Err(EquationError::Parse("bad".to_string()))
        });
        let out = math.process_content("$$x < 1$$");

        assert!(out.contains("md-math-block error"));
        assert!(out.contains("Display Math (Error)"));
        assert!(out.contains("<code>x &lt; 1</code>"));
        assert_eq!(math.stats().errors, 1);
    }

    #[test]
    fn test_error_markers_in_markup() {
        let mut math = MathRenderer::new(|source: &str, _: bool| -> Result<String, EquationError> {
            Ok(format!("<span class=\"katex-error\">{source}</span>"))
        });
        assert!(math.render("x", true).is_error());
    }

    #[test]
    fn test_loading_output_is_not_cached() {
        let (loader, gate) = EngineGate::loading();
        let mut math = MathRenderer::with_gate(TexSourceEngine::new(), gate);

        let first = math.process_content("see $x$");
        assert!(first.contains("md-math-inline loading"));
        assert_eq!(math.stats().contents_cached, 0);

        loader.ready();
        let second = math.process_content("see $x$");
        assert!(second.contains("md-math-inline success"));
        assert_eq!(math.stats().contents_cached, 1);
    }

    #[test]
    fn test_failed_engine() {
        let (loader, gate) = EngineGate::loading();
        let mut math = MathRenderer::with_gate(TexSourceEngine::new(), gate);
        loader.fail("missing fonts");

        let block = math.render("x", true);
        assert_eq!(block.status, MathStatus::Error("missing fonts".to_string()));
        assert!(block.html.contains("<code>x</code>"));
    }

    #[test]
    fn test_equation_cache() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut math = MathRenderer::new(move |source: &str, _: bool| -> Result<String, EquationError> {
            counter.set(counter.get() + 1);
            Ok(format!("<span class=\"katex\">{source}</span>"))
        });

        math.process_content("$x$ and $x$ and $y$");
        assert_eq!(calls.get(), 2);

        let stats = math.stats();
        assert_eq!(stats.equation_hits, 1);
        assert_eq!(stats.rendered, 3);
    }

    #[test]
    fn test_content_cache_and_eviction() {
        let mut math = renderer().with_cache_capacity(2);
        for text in ["$a$", "$b$", "$c$"] {
            math.process_content(text);
        }
        math.process_content("$c$");

        let stats = math.stats();
        assert_eq!(stats.equations_cached, 2);
        assert_eq!(stats.contents_cached, 2);
        assert_eq!(stats.content_hits, 1);

        math.clear_cache();
        assert_eq!(math.stats().contents_cached, 0);
    }

    #[test]
    fn test_html_skips_code_and_unescapes() {
        let mut math = renderer();
        let html = "<p>$a$</p><pre><code>$b$</code></pre><CODE>$c$</CODE><p>$$ x &lt; y $$</p>";
        let segments = math.process_html_segments(html);
        let sources: Vec<_> = rendered(&segments).iter().map(|m| m.source.as_str()).collect();

        assert_eq!(sources, vec!["a", "x < y"]);

        let out = math.process_html(html);
        assert!(out.contains("<pre><code>$b$</code></pre><CODE>$c$</CODE>"));
        assert_eq!(math.process_html(&out), out);
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut math = renderer();
        assert_eq!(math.render("a", true).id, "md-math-block-1");
        assert_eq!(math.render("b", false).id, "md-math-inline-2");
    }
}
