//! Streams a markdown document into a surface chunk by chunk.
//!
//! Text goes through the progressive tracker so settled elements are mounted
//! once and the forming tail lives in one replaceable node. Code and math
//! chunks are mounted whole, after flushing the tracker so document order
//! holds. Pacing and visibility come from the [`ChunkedRenderer`].

use std::time::Duration;

use md_chunk::{analyze, chunk, Chunk, ChunkKind, ContentAnalysis};
use md_math::{join, MathRenderer, Segment};
use md_stream::html::escape;
use md_stream::{ProgressiveTracker, SettledElement};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::code::render_code_block;
use crate::control::RenderControl;
use crate::error::{RenderError, StreamError};
use crate::events::{EventReceiver, EventSender, StreamEvent};
use crate::options::StreamOptions;
use crate::renderer::{ChunkedRenderer, RenderReport, RendererConfig};
use crate::scheduler::{FrameYield, TokioYield};
use crate::surface::{NodeId, NodeState, RenderSurface};
use crate::units;
use crate::visibility::Viewport;

/// How long an atomic chunk fades in before it counts as settled.
const FADE_IN: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamReport {
    pub chunks: Vec<Chunk>,
    pub analysis: ContentAnalysis,
    pub total_time_ms: f64,
    pub render: RenderReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub is_streaming: bool,
    pub current_chunk_index: usize,
    /// Percent of chunks completed
    pub progress: f64,
}

/// Math rendered while the engine was still loading.
#[derive(Debug)]
struct PendingMath {
    node: NodeId,
    source: MathSource,
}

#[derive(Debug)]
enum MathSource {
    Content(String),
    Html(String),
}

pub struct StreamingOrchestrator<Y = TokioYield> {
    renderer: ChunkedRenderer<Y>,
    tracker: ProgressiveTracker,
    math: MathRenderer,
    events: EventSender,
    /// Everything fed to the tracker this session
    fed: String,
    /// Node holding the forming tail of the tracker
    tail: Option<NodeId>,
    loading: Vec<PendingMath>,
    /// Time spent in pacing waits during the current chunk
    paced: Duration,
    total_chunks: usize,
    completed_chunks: usize,
    current_chunk_index: usize,
    is_streaming: bool,
}

impl StreamingOrchestrator<TokioYield> {
    pub fn new(math: MathRenderer) -> Self {
        Self::with_renderer(ChunkedRenderer::new(RendererConfig::default()), math)
    }
}

impl<Y: FrameYield> StreamingOrchestrator<Y> {
    pub fn with_renderer(renderer: ChunkedRenderer<Y>, math: MathRenderer) -> Self {
        Self {
            renderer,
            tracker: ProgressiveTracker::new(),
            math,
            events: EventSender::default(),
            fed: String::new(),
            tail: None,
            loading: Vec::new(),
            paced: Duration::ZERO,
            total_chunks: 0,
            completed_chunks: 0,
            current_chunk_index: 0,
            is_streaming: false,
        }
    }

    /// Receive progress events. Replaces any earlier subscription.
    pub fn subscribe(&mut self) -> EventReceiver {
        let (tx, rx) = EventSender::channel();
        self.events = tx;
        rx
    }

    pub fn control(&self) -> RenderControl {
        self.renderer.control()
    }

    /// Stop before the next chunk. The chunk in flight finishes.
    pub fn stop(&self) {
        self.renderer.control().stop();
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            total_chunks: self.total_chunks,
            completed_chunks: self.completed_chunks,
            is_streaming: self.is_streaming,
            current_chunk_index: self.current_chunk_index,
            progress: if self.total_chunks > 0 {
                self.completed_chunks as f64 / self.total_chunks as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    pub fn math(&self) -> &MathRenderer {
        &self.math
    }

    pub fn math_mut(&mut self) -> &mut MathRenderer {
        &mut self.math
    }

    pub fn renderer(&self) -> &ChunkedRenderer<Y> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut ChunkedRenderer<Y> {
        &mut self.renderer
    }

    /// Stream `content` into `surface`. Only invalid options fail; chunks
    /// that can't be rendered show up as plain text.
    pub async fn stream_content<S: RenderSurface>(
        &mut self,
        content: &str,
        surface: &mut S,
        options: &StreamOptions,
    ) -> Result<StreamReport, StreamError> {
        options.validate()?;
        let started = Instant::now();
        info!(
            "streaming {} bytes (progressive: {}, smart chunking: {})",
            content.len(),
            options.enable_progressive_rendering,
            options.enable_smart_chunking
        );

        let analysis = analyze(content);
        let chunks = if options.enable_smart_chunking {
            chunk(content, &options.chunk_options())
        } else {
            whole_document(content)
        };
        debug!("{} chunks, suggested strategy {:?}", chunks.len(), analysis.suggested_strategy);

        if matches!(self.renderer.config().viewport, Viewport::Fold(_)) {
            self.renderer.set_viewport(Viewport::Fold(options.fold_threshold));
        }
        self.begin(chunks.len());

        if options.show_typing_indicators {
            surface.set_indicator(Some("Processing markdown..."));
        }

        let total = chunks.len();
        for (index, chunk) in chunks.iter().enumerate() {
            if !self.renderer.frame_point(surface).await {
                info!("streaming stopped before chunk {}/{}", index + 1, total);
                break;
            }
            self.refresh_math(surface);

            self.current_chunk_index = index;
            if options.show_typing_indicators {
                let text = format!("Processing {} ({}/{})...", chunk.kind.name(), index + 1, total);
                surface.set_indicator(Some(&text));
            }

            self.paced = Duration::ZERO;
            let chunk_started = Instant::now();
            if let Err(err) = self.stream_chunk(chunk, surface, options).await {
                warn!("chunk {} failed, showing plain text: {err}", chunk.id);
                self.drop_tail(surface);
                self.renderer.mount_fallback(surface, &chunk.content);
            }
            // Latency is the work of materializing the chunk, not its reveal
            let latency = chunk_started.elapsed().saturating_sub(self.paced);
            self.renderer
                .record_chunk(chunk.id, latency, units::complexity(&chunk.content));
            self.renderer.advance(index + 1);
            self.completed_chunks += 1;

            self.events.send(StreamEvent::ChunkProgress {
                current: index + 1,
                total,
                percentage: (index + 1) as f64 / total as f64 * 100.0,
                chunk_id: chunk.id,
                kind: chunk.kind.name(),
            });

            if index + 1 < total {
                self.pace(options.chunk_pause()).await;
            }
        }

        self.finish_text(surface, options);
        self.refresh_math(surface);
        if options.show_typing_indicators {
            surface.set_indicator(None);
        }

        let render = self.renderer.finish_session(surface);
        self.is_streaming = false;
        let total_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.events.send(StreamEvent::Complete {
            total_chunks: total,
            completed_chunks: self.completed_chunks,
            fallback_count: render.fallbacks,
            total_time_ms,
            stopped: render.stopped,
        });
        info!(
            "streamed {}/{} chunks in {:.1}ms",
            self.completed_chunks, total, total_time_ms
        );

        Ok(StreamReport {
            chunks,
            analysis,
            total_time_ms,
            render,
        })
    }

    /// Re-render math that was mounted while the engine was loading. Does
    /// nothing until the engine is ready or has failed.
    pub fn refresh_math<S: RenderSurface>(&mut self, surface: &mut S) -> usize {
        if self.loading.is_empty() || self.math.gate().is_loading() {
            return 0;
        }

        let mut refreshed = 0;
        for pending in std::mem::take(&mut self.loading) {
            let html = match &pending.source {
                MathSource::Content(content) => self.math.process_content(content),
                MathSource::Html(html) => self.math.process_html(html),
            };
            match surface.replace(pending.node, &html) {
                Ok(()) => refreshed += 1,
                Err(err) => warn!("could not refresh math in node {}: {err}", pending.node),
            }
        }

        if refreshed > 0 {
            info!("re-rendered {refreshed} math nodes");
            self.events.send(StreamEvent::MathReady { refreshed });
        }
        refreshed
    }

    /// Wait for the equation engine to finish loading, then re-render any
    /// placeholders.
    pub async fn wait_for_math<S: RenderSurface>(&mut self, surface: &mut S) -> usize {
        let gate = self.math.gate().clone();
        gate.settled().await;
        self.refresh_math(surface)
    }

    /// Wait out a reveal or pause delay. The wait counts toward neither the
    /// frame nor the chunk latency.
    async fn pace(&mut self, delay: Duration) {
        let started = Instant::now();
        tokio::time::sleep(delay).await;
        self.paced += started.elapsed();
        self.renderer.restart_frame();
    }

    fn begin(&mut self, total: usize) {
        self.tracker.reset();
        self.fed.clear();
        self.tail = None;
        self.loading.clear();
        self.total_chunks = total;
        self.completed_chunks = 0;
        self.current_chunk_index = 0;
        self.is_streaming = true;
        self.renderer.begin_session(total);
    }

    async fn stream_chunk<S: RenderSurface>(
        &mut self,
        chunk: &Chunk,
        surface: &mut S,
        options: &StreamOptions,
    ) -> Result<(), RenderError> {
        let math_on = options.enable_math_rendering;

        match &chunk.kind {
            ChunkKind::CodeBlock { language } if math_on && is_math_language(language.as_deref()) => {
                self.stream_math(chunk, surface).await
            }
            ChunkKind::MathBlock if math_on => self.stream_math(chunk, surface).await,
            ChunkKind::CodeBlock { language } => {
                let html = render_code_block(&chunk.content, language.as_deref());
                self.stream_atomic(chunk, surface, html).await
            }
            ChunkKind::MathBlock => {
                let html = format!("<div class=\"md-math-raw\">{}</div>", escape(&chunk.content));
                self.stream_atomic(chunk, surface, html).await
            }
            ChunkKind::Text | ChunkKind::ListItem | ChunkKind::Header { .. } => {
                if options.enable_progressive_rendering {
                    self.stream_text(chunk, surface, options).await
                } else {
                    self.stream_typewriter(chunk, surface, options).await
                }
            }
        }
    }

    async fn stream_math<S: RenderSurface>(
        &mut self,
        chunk: &Chunk,
        surface: &mut S,
    ) -> Result<(), RenderError> {
        let segments = self.math.process_content_segments(&chunk.content);
        let loading = segments.iter().any(Segment::is_loading);
        let node = self.mount_atomic(chunk, surface, join(&segments)).await?;

        if let (true, Some(node)) = (loading, node) {
            self.loading.push(PendingMath {
                node,
                source: MathSource::Content(chunk.content.clone()),
            });
        }
        Ok(())
    }

    async fn stream_atomic<S: RenderSurface>(
        &mut self,
        chunk: &Chunk,
        surface: &mut S,
        html: String,
    ) -> Result<(), RenderError> {
        self.mount_atomic(chunk, surface, html).await.map(|_| ())
    }

    /// Mount an atomic chunk whole and let it fade in.
    async fn mount_atomic<S: RenderSurface>(
        &mut self,
        chunk: &Chunk,
        surface: &mut S,
        html: String,
    ) -> Result<Option<NodeId>, RenderError> {
        let flushed = self.tracker.flush();
        self.place_settled(surface, chunk, flushed, true)?;
        self.drop_tail(surface);

        let node = self.renderer.mount(
            surface,
            chunk.id,
            (chunk.start_offset, chunk.end_offset),
            Ok(html),
            &chunk.content,
        );
        self.pace(FADE_IN).await;
        self.renderer.settle_entering(surface);

        Ok(node)
    }

    /// Reveal a text chunk step by step through the tracker.
    async fn stream_text<S: RenderSurface>(
        &mut self,
        chunk: &Chunk,
        surface: &mut S,
        options: &StreamOptions,
    ) -> Result<(), RenderError> {
        self.renderer.note_materialized();
        let content = chunk.content.as_str();
        let step = options.reveal_step();
        let delay = options.step_delay();
        let math_on = options.enable_math_rendering;

        let mut pos = 0;
        while pos < content.len() {
            let end = ceil_char_boundary(content, pos + step);
            let piece = &content[pos..end];

            let fed_before = self.fed.len();
            self.fed.push_str(piece);
            let output = match self.tracker.process_incremental(piece, &self.fed) {
                Ok(output) => output,
                Err(err) => {
                    self.fed.truncate(fed_before);
                    return Err(err.into());
                }
            };

            self.place_settled(surface, chunk, output.settled, math_on)?;
            self.show_tail(surface, &output.processed_text)?;

            pos = end;
            if pos < content.len() {
                self.pace(delay).await;
            }
        }

        Ok(())
    }

    /// Plain escaped text revealed step by step, with no markdown.
    async fn stream_typewriter<S: RenderSurface>(
        &mut self,
        chunk: &Chunk,
        surface: &mut S,
        options: &StreamOptions,
    ) -> Result<(), RenderError> {
        self.renderer.note_materialized();
        let content = chunk.content.as_str();
        let node = surface.mount("", NodeState::Entering)?;

        let mut pos = 0;
        while pos < content.len() {
            pos = ceil_char_boundary(content, pos + options.reveal_step());
            let html = format!("<div class=\"md-typewriter\">{}</div>", escape(&content[..pos]));
            surface.replace(node, &html)?;
            if pos < content.len() {
                self.pace(options.step_delay()).await;
            }
        }

        self.renderer
            .adopt(surface, node, chunk.id, (chunk.start_offset, chunk.end_offset))?;
        Ok(())
    }

    /// Mount settled elements in order. The first one takes over the tail
    /// node so it lands where the forming text was shown.
    fn place_settled<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        chunk: &Chunk,
        settled: Vec<SettledElement>,
        math_on: bool,
    ) -> Result<(), RenderError> {
        for element in settled {
            let (html, loading) = if math_on {
                let segments = self.math.process_html_segments(&element.html);
                (join(&segments), segments.iter().any(Segment::is_loading))
            } else {
                (element.html.clone(), false)
            };

            let node = match self.tail.take() {
                Some(node) => {
                    surface.replace(node, &html)?;
                    node
                }
                None => surface.mount(&html, NodeState::Entering)?,
            };
            self.renderer
                .adopt(surface, node, chunk.id, (chunk.start_offset, chunk.end_offset))?;

            if loading {
                self.loading.push(PendingMath {
                    node,
                    source: MathSource::Html(element.html),
                });
            }
        }
        Ok(())
    }

    fn show_tail<S: RenderSurface>(&mut self, surface: &mut S, processed: &str) -> Result<(), RenderError> {
        if processed.trim().is_empty() {
            self.drop_tail(surface);
            return Ok(());
        }

        let html = format!("<div class=\"md-forming\">{processed}</div>");
        match self.tail {
            Some(node) => surface.replace(node, &html)?,
            None => self.tail = Some(surface.mount(&html, NodeState::Entering)?),
        }
        Ok(())
    }

    fn drop_tail<S: RenderSurface>(&mut self, surface: &mut S) {
        if let Some(node) = self.tail.take() {
            if let Err(err) = surface.remove(node) {
                debug!("could not remove forming node {node}: {err}");
            }
        }
    }

    /// Run the tracker's final pass and mount what it settles.
    fn finish_text<S: RenderSurface>(&mut self, surface: &mut S, options: &StreamOptions) {
        let settled = self.tracker.finish().settled.clone();
        let anchor = Chunk {
            id: self.total_chunks,
            content: String::new(),
            kind: ChunkKind::Text,
            start_offset: 0,
            end_offset: 0,
            is_atomic: false,
            priority: 1,
            is_above_fold: true,
        };

        if let Err(err) = self.place_settled(surface, &anchor, settled, options.enable_math_rendering) {
            warn!("final pass could not be mounted: {err}");
        }
        self.drop_tail(surface);
    }
}

fn is_math_language(language: Option<&str>) -> bool {
    matches!(
        language.map(str::to_ascii_lowercase).as_deref(),
        Some("math" | "latex" | "tex")
    )
}

/// The document as a single text chunk, for when smart chunking is off.
fn whole_document(content: &str) -> Vec<Chunk> {
    if content.is_empty() {
        return Vec::new();
    }

    vec![Chunk {
        id: 0,
        content: content.to_string(),
        kind: ChunkKind::Text,
        start_offset: 0,
        end_offset: content.len(),
        is_atomic: false,
        priority: 3,
        is_above_fold: true,
    }]
}

fn ceil_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_languages() {
        assert!(is_math_language(Some("LaTeX")));
        assert!(is_math_language(Some("tex")));
        assert!(!is_math_language(Some("rust")));
        assert!(!is_math_language(None));
    }

    #[test]
    fn test_whole_document() {
        assert!(whole_document("").is_empty());
        let chunks = whole_document("a\n\nb");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end_offset, 4);
    }

    #[test]
    fn test_ceil_char_boundary() {
        assert_eq!(ceil_char_boundary("é", 1), 2);
        assert_eq!(ceil_char_boundary("ab", 5), 2);
    }
}
