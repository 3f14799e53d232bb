//! End-to-end streaming of whole documents through `StreamingOrchestrator`.

use std::sync::Once;
use std::time::Duration;

use md_math::{EngineGate, MathRenderer, TexSourceEngine};
use md_render::{
    HtmlSurface, NodeState, StreamError, StreamEvent, StreamOptions, StreamingOrchestrator,
};
use pretty_assertions::assert_eq;

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("md_render=debug".parse().unwrap()),
            )
            .with_test_writer()
            .init();
    });
}

const DOCUMENT: &str = "# Release notes\n\n\
Streaming now keeps **bold** and *italic* text intact while it forms.\n\n\
```rust\nfn main() {\n    println!(\"<hi>\");\n}\n```\n\n\
The area of a circle:\n\n\
$$A = \\pi r^2$$\n\n\
- first item\n- second item\n";

fn fast() -> StreamOptions {
    StreamOptions {
        streaming_speed: 100,
        ..StreamOptions::default()
    }
}

fn orchestrator() -> StreamingOrchestrator {
    StreamingOrchestrator::new(MathRenderer::new(TexSourceEngine::with_default_macros()))
}

#[tokio::test(start_paused = true)]
async fn streams_mixed_document() {
    init_tracing();
    let mut orchestrator = orchestrator();
    let mut surface = HtmlSurface::new();

    let report = orchestrator
        .stream_content(DOCUMENT, &mut surface, &fast())
        .await
        .unwrap();
    let html = surface.html();

    assert!(html.contains("<h1 class=\"md-header md-h1\">Release notes</h1>"));
    assert!(html.contains("<strong class=\"md-bold\">bold</strong>"));
    assert!(html.contains("<em class=\"md-italic\">italic</em>"));
    assert!(html.contains("class=\"language-rust\""));
    assert!(html.contains("&lt;hi&gt;"));
    assert!(html.contains("md-math-block"));
    assert!(html.contains("<li class=\"md-list-item\">second item</li>"));

    // code comes before the math, which comes before the list
    let code = html.find("language-rust").unwrap();
    let math = html.find("md-math-block").unwrap();
    let list = html.find("md-list-item").unwrap();
    assert!(code < math && math < list);

    assert!(!html.contains("md-forming"));
    assert_eq!(surface.count(NodeState::Entering), 0);
    assert_eq!(report.render.fallbacks, 0);
    assert!(!report.render.stopped);
    assert!(report.chunks.len() > 3);
}

#[tokio::test(start_paused = true)]
async fn indicator_follows_chunks_and_clears() {
    init_tracing();
    let mut orchestrator = orchestrator();
    let mut surface = HtmlSurface::new();

    let report = orchestrator
        .stream_content(DOCUMENT, &mut surface, &fast())
        .await
        .unwrap();

    // initial message, one per chunk, then cleared
    assert_eq!(surface.indicator_updates(), report.chunks.len() + 2);
    assert_eq!(surface.indicator(), None);

    let mut quiet = orchestrator;
    let mut surface = HtmlSurface::new();
    let options = StreamOptions {
        show_typing_indicators: false,
        ..fast()
    };
    quiet.stream_content(DOCUMENT, &mut surface, &options).await.unwrap();
    assert_eq!(surface.indicator_updates(), 0);
}

#[tokio::test(start_paused = true)]
async fn reports_progress_events() {
    init_tracing();
    let mut orchestrator = orchestrator();
    let events = orchestrator.subscribe();
    let mut surface = HtmlSurface::new();

    let report = orchestrator
        .stream_content(DOCUMENT, &mut surface, &fast())
        .await
        .unwrap();
    let events = events.drain();
    let total = report.chunks.len();

    let progress: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::ChunkProgress { current, .. } => Some(*current),
            _ => None,
        })
        .collect();
    assert_eq!(progress, (1..=total).collect::<Vec<_>>());

    match events.last() {
        Some(StreamEvent::Complete {
            total_chunks,
            completed_chunks,
            stopped,
            ..
        }) => {
            assert_eq!(*total_chunks, total);
            assert_eq!(*completed_chunks, total);
            assert!(!stopped);
        }
        other => panic!("expected completion, got {other:?}"),
    }

    let stats = orchestrator.stats();
    assert!(!stats.is_streaming);
    assert_eq!(stats.completed_chunks, total);
    assert!((stats.progress - 100.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn emphasis_markers_inside_inline_math_stay_in_the_equation() {
    init_tracing();
    let mut orchestrator = orchestrator();
    let mut surface = HtmlSurface::new();

    orchestrator
        .stream_content("Products $a*b$ and $b*a$ commute here.\n\n", &mut surface, &fast())
        .await
        .unwrap();
    let html = surface.html();

    assert!(html.contains("<span class=\"katex-tex\">a*b</span>"));
    assert!(html.contains("<span class=\"katex-tex\">b*a</span>"));
    assert!(!html.contains("md-italic"));
    assert!(html.contains("commute here."));
}

#[tokio::test(start_paused = true)]
async fn pacing_waits_do_not_count_as_render_time() {
    init_tracing();
    let mut orchestrator = orchestrator();
    let mut surface = HtmlSurface::new();
    let document = format!(
        "{}\n\n$$x$$\n\n{}\n",
        "Words revealed a few at a time. ".repeat(20),
        "More words after the equation. ".repeat(10)
    );

    let report = orchestrator
        .stream_content(&document, &mut surface, &fast())
        .await
        .unwrap();

    // The clock only moves during reveal delays, fades and pauses
    assert!(report.total_time_ms > 300.0);
    assert!(report.render.average_chunk_ms < 1.0);
    assert!(report.render.average_frame_ms < 1.0);
    assert!(report.render.performance_score >= 90);
}

#[tokio::test(start_paused = true)]
async fn math_renders_again_once_engine_loads() {
    init_tracing();
    let (loader, gate) = EngineGate::loading();
    let math = MathRenderer::with_gate(TexSourceEngine::with_default_macros(), gate);
    let mut orchestrator = StreamingOrchestrator::new(math);
    let events = orchestrator.subscribe();
    let mut surface = HtmlSurface::new();

    orchestrator
        .stream_content("Circle:\n\n$$x^2 + y^2 = 1$$\n\nDone.\n", &mut surface, &fast())
        .await
        .unwrap();
    assert!(surface.html().contains("(Loading...)"));

    loader.ready();
    let refreshed = orchestrator.wait_for_math(&mut surface).await;

    assert_eq!(refreshed, 1);
    let html = surface.html();
    assert!(!html.contains("(Loading...)"));
    assert!(html.contains("md-math-rendered"));
    assert!(events
        .drain()
        .iter()
        .any(|event| *event == StreamEvent::MathReady { refreshed: 1 }));
}

#[tokio::test(start_paused = true)]
async fn math_off_shows_source() {
    init_tracing();
    let mut orchestrator = orchestrator();
    let mut surface = HtmlSurface::new();
    let options = StreamOptions {
        enable_math_rendering: false,
        ..fast()
    };

    orchestrator
        .stream_content("$$a < b$$", &mut surface, &options)
        .await
        .unwrap();

    assert_eq!(
        surface.html(),
        "<div class=\"md-math-raw\">$$a &lt; b$$</div>"
    );
}

#[tokio::test(start_paused = true)]
async fn typewriter_mode_shows_literal_text() {
    init_tracing();
    let mut orchestrator = orchestrator();
    let mut surface = HtmlSurface::new();
    let options = StreamOptions {
        enable_progressive_rendering: false,
        ..fast()
    };

    orchestrator
        .stream_content("Plain **not bold** <tag>", &mut surface, &options)
        .await
        .unwrap();

    assert_eq!(
        surface.html(),
        "<div class=\"md-typewriter\">Plain **not bold** &lt;tag&gt;</div>"
    );
    assert_eq!(surface.count(NodeState::Settled), 1);
}

#[tokio::test(start_paused = true)]
async fn whole_document_without_smart_chunking() {
    init_tracing();
    let mut orchestrator = orchestrator();
    let mut surface = HtmlSurface::new();
    let options = StreamOptions {
        enable_smart_chunking: false,
        ..fast()
    };

    let report = orchestrator
        .stream_content("One paragraph.\n\nAnother one.\n", &mut surface, &options)
        .await
        .unwrap();

    assert_eq!(report.chunks.len(), 1);
    assert_eq!(surface.count(NodeState::Settled), 2);
}

#[tokio::test(start_paused = true)]
async fn invalid_options_are_rejected() {
    init_tracing();
    let mut orchestrator = orchestrator();
    let mut surface = HtmlSurface::new();
    let options = StreamOptions {
        streaming_speed: 0,
        ..StreamOptions::default()
    };

    let result = orchestrator.stream_content(DOCUMENT, &mut surface, &options).await;

    assert!(matches!(result, Err(StreamError::InvalidOptions(_))));
    assert!(surface.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_halts_before_next_chunk() {
    init_tracing();
    let mut orchestrator = orchestrator();
    let control = orchestrator.control();
    let events = orchestrator.subscribe();
    let mut surface = HtmlSurface::new();
    let document = "A sentence that goes on for a while. ".repeat(40);

    let options = StreamOptions::default();
    let (report, ()) = tokio::join!(
        orchestrator.stream_content(&document, &mut surface, &options),
        async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            control.stop();
        }
    );
    let report = report.unwrap();

    assert!(report.render.stopped);
    match events.drain().last() {
        Some(StreamEvent::Complete {
            total_chunks,
            completed_chunks,
            stopped,
            ..
        }) => {
            assert!(stopped);
            assert!(completed_chunks < total_chunks);
        }
        other => panic!("expected completion, got {other:?}"),
    }
}
