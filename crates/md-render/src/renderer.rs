//! Frame-budgeted materialization of chunks into a surface.
//!
//! The loop is single-threaded and cooperative. Before each chunk the
//! renderer checks the frame: when it has run past the budget or already
//! materialized `max_chunks_per_frame` chunks, it closes the frame and
//! yields through [`FrameYield`]. Chunks are mounted in source order; those
//! outside the viewport are mounted dormant and settled on [`ChunkedRenderer::reveal`].

use std::time::Duration;

use md_chunk::Chunk;
use md_stream::html::{escape, render_inline_text};
use md_stream::{InlineKinds, Span};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::control::{RenderControl, RenderProgress};
use crate::error::{RenderError, SurfaceError};
use crate::perf::PerformanceMonitor;
use crate::scheduler::{FrameClock, FrameYield, TokioYield};
use crate::surface::{NodeId, NodeState, RenderSurface};
use crate::units::{self, UnitKind};
use crate::visibility::{Viewport, VisibilityObserver};

#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub frame_budget: Duration,
    pub max_chunks_per_frame: usize,
    /// Starting unit size for [`ChunkedRenderer::render_text`], in bytes
    pub unit_size: usize,
    pub adaptive_units: bool,
    /// Mount chunks outside the viewport dormant
    pub lazy_rendering: bool,
    pub viewport: Viewport,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frame_budget: Duration::from_millis(16),
            max_chunks_per_frame: 3,
            unit_size: 50,
            adaptive_units: true,
            lazy_rendering: true,
            viewport: Viewport::default(),
        }
    }
}

/// State of the render call in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSession {
    pub total_chunks: usize,
    pub current_chunk_index: usize,
    pub is_rendering: bool,
    pub performance_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    pub total_chunks: usize,
    pub rendered: usize,
    pub dormant: usize,
    pub fallbacks: usize,
    pub frames: u64,
    pub total_time_ms: f64,
    pub average_chunk_ms: f64,
    pub average_frame_ms: f64,
    pub performance_score: u32,
    pub stopped: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    rendered: usize,
    dormant: usize,
    fallbacks: usize,
}

pub struct ChunkedRenderer<Y = TokioYield> {
    config: RendererConfig,
    yielder: Y,
    control: RenderControl,
    clock: FrameClock,
    monitor: PerformanceMonitor,
    visibility: VisibilityObserver,
    /// Nodes fading in, settled at the next frame boundary
    entering: Vec<NodeId>,
    session: Option<RenderSession>,
    started: Option<Instant>,
    counts: Counts,
}

impl ChunkedRenderer<TokioYield> {
    pub fn new(config: RendererConfig) -> Self {
        Self::with_yield(config, TokioYield)
    }
}

impl Default for ChunkedRenderer<TokioYield> {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl<Y: FrameYield> ChunkedRenderer<Y> {
    pub fn with_yield(config: RendererConfig, yielder: Y) -> Self {
        let clock = FrameClock::new(config.frame_budget, config.max_chunks_per_frame);
        Self {
            config,
            yielder,
            control: RenderControl::new(),
            clock,
            monitor: PerformanceMonitor::new(),
            visibility: VisibilityObserver::new(),
            entering: Vec::new(),
            session: None,
            started: None,
            counts: Counts::default(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.config.viewport = viewport;
    }

    /// Handle for pausing, resuming and stopping from elsewhere.
    pub fn control(&self) -> RenderControl {
        self.control.clone()
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn stop(&mut self) {
        self.control.stop();
        self.session = None;
    }

    pub fn progress(&self) -> RenderProgress {
        self.control.progress()
    }

    pub fn session(&self) -> Option<&RenderSession> {
        self.session.as_ref()
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn visibility(&self) -> &VisibilityObserver {
        &self.visibility
    }

    /// Render pre-chunked content, materializing each chunk with
    /// `materialize`. A chunk that fails to materialize or mount is shown as
    /// plain text and the session carries on.
    pub async fn render_chunks<S, F>(
        &mut self,
        chunks: &[Chunk],
        surface: &mut S,
        mut materialize: F,
    ) -> RenderReport
    where
        S: RenderSurface,
        F: FnMut(&Chunk) -> Result<String, RenderError>,
    {
        info!("rendering {} chunks", chunks.len());
        self.begin_session(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            if !self.frame_point(surface).await {
                break;
            }

            let started = Instant::now();
            let result = materialize(chunk);
            self.mount(
                surface,
                chunk.id,
                (chunk.start_offset, chunk.end_offset),
                result,
                &chunk.content,
            );
            self.record_chunk(chunk.id, started.elapsed(), units::complexity(&chunk.content));
            self.advance(index + 1);
        }

        self.finish_session(surface)
    }

    /// Render free text in adaptive units. Unit size follows recent frame
    /// times and the complexity of the text ahead.
    pub async fn render_text<S: RenderSurface>(&mut self, text: &str, surface: &mut S) -> RenderReport {
        info!("rendering {} bytes of text", text.len());
        self.begin_session(self.estimate_units(text.len(), self.config.unit_size));

        let mut pos = 0;
        let mut index = 0;
        while pos < text.len() {
            if !self.frame_point(surface).await {
                break;
            }

            let rest = &text[pos..];
            let size = if self.config.adaptive_units {
                units::unit_size(
                    self.config.unit_size,
                    self.monitor.recent_frame_ms(),
                    millis(self.config.frame_budget),
                    rest,
                )
            } else {
                self.config.unit_size.max(1)
            };
            let len = units::next_unit(rest, size);
            let unit = &rest[..len];

            let started = Instant::now();
            let html = materialize_unit(unit);
            self.mount(surface, index, (pos, pos + len), Ok(html), unit);
            self.record_chunk(index, started.elapsed(), units::complexity(unit));

            pos += len;
            index += 1;
            let total = index + self.estimate_units(text.len() - pos, size);
            self.set_total(total);
            self.advance(index);
        }

        self.finish_session(surface)
    }

    /// Settle a dormant node once the host reports it visible. Returns
    /// false when the node wasn't waiting.
    pub fn reveal<S: RenderSurface>(&mut self, surface: &mut S, node: NodeId) -> Result<bool, SurfaceError> {
        if self.visibility.take(node).is_none() {
            return Ok(false);
        }
        surface.set_state(node, NodeState::Settled)?;
        debug!("revealed node {node}");
        Ok(true)
    }

    /// Settle every dormant node.
    pub fn reveal_all<S: RenderSurface>(&mut self, surface: &mut S) -> usize {
        let waiting: Vec<NodeId> = self.visibility.waiting().collect();
        waiting
            .into_iter()
            .filter(|node| match self.reveal(surface, *node) {
                Ok(revealed) => revealed,
                Err(err) => {
                    error!("failed to reveal node {node}: {err}");
                    false
                }
            })
            .count()
    }

    pub(crate) fn begin_session(&mut self, total: usize) {
        self.control.begin(total);
        self.clock.restart();
        self.monitor.reset();
        self.entering.clear();
        self.counts = Counts::default();
        self.started = Some(Instant::now());
        self.session = Some(RenderSession {
            total_chunks: total,
            current_chunk_index: 0,
            is_rendering: true,
            performance_samples: 0,
        });
    }

    /// The scheduling point before each chunk: yields when the frame is
    /// spent and waits while paused. Returns false once the session is
    /// stopped.
    pub(crate) async fn frame_point<S: RenderSurface>(&mut self, surface: &mut S) -> bool {
        if self.control.is_stopped() {
            return false;
        }

        if self.clock.should_yield() {
            self.yield_frame(surface).await;
        }

        if self.control.is_paused() {
            debug!("render paused");
            self.control.wait_while_paused().await;
            self.clock.restart_frame();
        }

        !self.control.is_stopped()
    }

    async fn yield_frame<S: RenderSurface>(&mut self, surface: &mut S) {
        let frame = self.clock.end_frame();
        self.monitor.record_frame(frame);
        self.settle_entering(surface);
        self.yielder.yield_frame().await;
        self.clock.restart_frame();
    }

    /// Mount the markup for one chunk, or a plain-text fallback when it
    /// couldn't be produced or mounted.
    pub(crate) fn mount<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        chunk_id: usize,
        (start, end): (usize, usize),
        result: Result<String, RenderError>,
        text: &str,
    ) -> Option<NodeId> {
        self.clock.materialized();

        let html = match result {
            Ok(html) => html,
            Err(err) => {
                warn!("chunk {chunk_id} failed to render, showing plain text: {err}");
                return self.mount_fallback(surface, text);
            }
        };

        let visible = self.is_visible(start, end);
        let state = if visible {
            NodeState::Entering
        } else {
            NodeState::Dormant
        };

        match surface.mount(&html, state) {
            Ok(node) => {
                self.counts.rendered += 1;
                if visible {
                    self.entering.push(node);
                } else {
                    self.counts.dormant += 1;
                    self.visibility.observe(node, chunk_id);
                }
                Some(node)
            }
            Err(err) => {
                warn!("chunk {chunk_id} failed to mount, showing plain text: {err}");
                self.mount_fallback(surface, text)
            }
        }
    }

    /// Take over a node the caller mounted and filled itself: it fades in
    /// when visible and goes dormant otherwise.
    pub(crate) fn adopt<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        node: NodeId,
        chunk_id: usize,
        (start, end): (usize, usize),
    ) -> Result<(), SurfaceError> {
        self.counts.rendered += 1;
        if self.is_visible(start, end) {
            self.entering.push(node);
            return Ok(());
        }

        surface.set_state(node, NodeState::Dormant)?;
        self.counts.dormant += 1;
        self.visibility.observe(node, chunk_id);
        Ok(())
    }

    pub(crate) fn note_materialized(&mut self) {
        self.clock.materialized();
    }

    fn is_visible(&self, start: usize, end: usize) -> bool {
        !self.config.lazy_rendering || self.config.viewport.contains(start, end)
    }

    pub(crate) fn mount_fallback<S: RenderSurface>(&mut self, surface: &mut S, text: &str) -> Option<NodeId> {
        self.counts.fallbacks += 1;
        let html = format!("<div class=\"md-fallback\">{}</div>", escape(text));
        match surface.mount(&html, NodeState::Fallback) {
            Ok(node) => Some(node),
            Err(err) => {
                error!("surface rejected fallback node: {err}");
                None
            }
        }
    }

    /// Start the frame over after a deliberate pacing wait.
    pub(crate) fn restart_frame(&mut self) {
        self.clock.restart_frame();
    }

    pub(crate) fn record_chunk(&mut self, chunk_id: usize, latency: Duration, complexity: f64) {
        self.monitor.record_chunk(chunk_id, latency, complexity);
        if let Some(session) = &mut self.session {
            session.performance_samples += 1;
        }
    }

    pub(crate) fn advance(&mut self, current: usize) {
        self.control.advance(current);
        if let Some(session) = &mut self.session {
            session.current_chunk_index = current;
        }
    }

    pub(crate) fn settle_entering<S: RenderSurface>(&mut self, surface: &mut S) {
        for node in self.entering.drain(..) {
            if let Err(err) = surface.set_state(node, NodeState::Settled) {
                // Replaced or removed by its owner since mounting
                debug!("could not settle node {node}: {err}");
            }
        }
    }

    pub(crate) fn finish_session<S: RenderSurface>(&mut self, surface: &mut S) -> RenderReport {
        self.settle_entering(surface);
        let stopped = self.control.is_stopped();
        self.control.end();

        let total_time_ms = self.started.take().map(|s| millis(s.elapsed())).unwrap_or(0.0);
        let total_chunks = self.session.take().map(|s| s.total_chunks).unwrap_or(0);
        let metrics = self.monitor.metrics();

        let report = RenderReport {
            total_chunks,
            rendered: self.counts.rendered,
            dormant: self.counts.dormant,
            fallbacks: self.counts.fallbacks,
            frames: self.clock.frames(),
            total_time_ms,
            average_chunk_ms: metrics.average_chunk_ms,
            average_frame_ms: metrics.average_frame_ms,
            performance_score: metrics.score,
            stopped,
        };
        info!(
            "render finished: {} rendered, {} dormant, {} fallbacks in {} frames (score {})",
            report.rendered, report.dormant, report.fallbacks, report.frames, report.performance_score
        );

        report
    }

    fn set_total(&mut self, total: usize) {
        self.control.set_total(total);
        if let Some(session) = &mut self.session {
            session.total_chunks = total;
        }
    }

    fn estimate_units(&self, len: usize, size: usize) -> usize {
        len.div_ceil(size.max(1))
    }
}

/// Markup for one unit of free text. Raw tags are never passed through.
fn materialize_unit(unit: &str) -> String {
    let kind = UnitKind::detect(unit);
    let body = match kind {
        UnitKind::Markdown => {
            render_inline_text(unit, Span::new(0, unit.len()), InlineKinds::all())
        }
        UnitKind::Html | UnitKind::Text => escape(unit),
    };
    format!("<span class=\"md-unit md-unit-{}\">{body}</span>", kind.name())
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HtmlSurface;

    #[test]
    fn test_materialize_unit() {
        assert_eq!(
            materialize_unit("a <b>"),
            "<span class=\"md-unit md-unit-html\">a &lt;b&gt;</span>"
        );
        assert_eq!(
            materialize_unit("**x**"),
            "<span class=\"md-unit md-unit-markdown\"><strong class=\"md-bold\">x</strong></span>"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_entering_nodes_settle_at_frame_end() {
        let mut renderer = ChunkedRenderer::default();
        let mut surface = HtmlSurface::new();

        renderer.begin_session(1);
        let node = renderer.mount(&mut surface, 0, (0, 1), Ok("<p>x</p>".to_string()), "x");
        assert_eq!(surface.count(NodeState::Entering), 1);

        let report = renderer.finish_session(&mut surface);
        assert!(node.is_some());
        assert_eq!(surface.count(NodeState::Settled), 1);
        assert_eq!(report.rendered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_session() {
        let mut renderer = ChunkedRenderer::default();
        renderer.begin_session(4);
        renderer.stop();
        assert!(renderer.session().is_none());
        assert_eq!(renderer.progress().total, 0);
    }
}
