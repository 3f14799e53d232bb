//! Tests for streaming parser and tracker behavior.

use pretty_assertions::assert_eq;

use crate::partial::PartialKind;
use crate::{
    ElementKind, FormingKind, InlineElement, InlineStyle, MdElement, ProgressiveTracker,
    StreamParser, TrackerError, TrackerState,
};

fn heading_text(parser: &StreamParser, index: usize) -> Option<(u8, &str)> {
    match &parser.parsed()[index] {
        MdElement::Heading { level, content } => Some((*level, content.resolve(parser.buffer()))),
        _ => None,
    }
}

fn paragraph_has(parser: &StreamParser, index: usize, want: InlineStyle, text: &str) -> bool {
    match &parser.parsed()[index] {
        MdElement::Paragraph(inlines) => inlines.iter().any(|e| {
            matches!(
                e,
                InlineElement::Styled { style, content }
                    if *style == want && content.resolve(parser.buffer()) == text
            )
        }),
        _ => false,
    }
}

/// Feed `chunks` one at a time, the way the orchestrator does.
fn feed(tracker: &mut ProgressiveTracker, chunks: &[&str]) -> Vec<String> {
    let mut full = String::new();
    chunks
        .iter()
        .map(|chunk| {
            full.push_str(chunk);
            tracker
                .process_incremental(chunk, &full)
                .expect("in sync")
                .processed_text
        })
        .collect()
}

#[test]
fn test_heading_complete() {
    let mut parser = StreamParser::new();
    parser.push("# Hello World\n");

    assert_eq!(parser.parsed().len(), 1);
    assert_eq!(heading_text(&parser, 0), Some((1, "Hello World")));
}

#[test]
fn test_heading_streaming() {
    let mut parser = StreamParser::new();

    parser.push("# Hel");
    assert_eq!(parser.parsed().len(), 0);
    assert!(matches!(
        parser.partial().map(|p| &p.kind),
        Some(PartialKind::Heading { level: 1 })
    ));

    parser.push("lo Wor");
    assert_eq!(parser.parsed().len(), 0);

    parser.push("ld\n");
    assert_eq!(parser.parsed().len(), 1);
    assert_eq!(heading_text(&parser, 0), Some((1, "Hello World")));
}

#[test]
fn test_code_block_complete() {
    let mut parser = StreamParser::new();
    parser.push("```rust\nfn main() {}\n```\n");

    assert_eq!(parser.parsed().len(), 1);
    match &parser.parsed()[0] {
        MdElement::CodeBlock(cb) => {
            assert_eq!(cb.language.map(|l| l.resolve(parser.buffer())), Some("rust"));
            assert_eq!(cb.content.resolve(parser.buffer()), "fn main() {}\n");
            assert!(cb.closed);
        }
        other => panic!("Expected code block, got {other:?}"),
    }
}

#[test]
fn test_code_block_streaming() {
    let mut parser = StreamParser::new();

    parser.push("```py");
    assert!(parser.in_code_block());

    parser.push("thon\n");
    assert!(parser.in_code_block());

    parser.push("print('hello')\n");
    assert!(parser.in_code_block());
    assert_eq!(parser.parsed().len(), 0);

    parser.push("```\n");
    assert!(!parser.in_code_block());
    assert_eq!(parser.parsed().len(), 1);
}

#[test]
fn test_heading_inside_code_is_code() {
    let mut parser = StreamParser::new();
    parser.push("```sh\n# not a heading\n```\n");

    assert_eq!(parser.parsed().len(), 1);
    assert_eq!(parser.parsed()[0].kind(), ElementKind::CodeBlock);
}

#[test]
fn test_multiple_elements() {
    let mut parser = StreamParser::new();
    parser.push("# Title\n\nSome paragraph text.\n\n## Subtitle\n");

    let kinds: Vec<_> = parser.parsed().iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![ElementKind::Heading, ElementKind::Paragraph, ElementKind::Heading]
    );
    assert_eq!(parser.settled_upto(), parser.buffer().len());
}

#[test]
fn test_sources_cover_elements() {
    let mut parser = StreamParser::new();
    let text = "# Title\nbody text\n\n- item\n";
    parser.push(text);

    let sources: Vec<&str> = parser.sources().iter().map(|s| s.resolve(text)).collect();
    assert_eq!(sources, vec!["# Title\n", "body text\n\n", "- item\n"]);
}

#[test]
fn test_thematic_break() {
    let mut parser = StreamParser::new();
    parser.push("---\n");

    assert_eq!(parser.parsed(), &[MdElement::ThematicBreak]);
}

#[test]
fn test_finalize_incomplete_code() {
    let mut parser = StreamParser::new();
    parser.push("```\nunclosed code");

    assert_eq!(parser.parsed().len(), 0);

    parser.finalize();

    assert_eq!(parser.parsed().len(), 1);
    match &parser.parsed()[0] {
        MdElement::CodeBlock(cb) => {
            assert!(cb.content.resolve(parser.buffer()).contains("unclosed code"));
            assert!(!cb.closed);
        }
        other => panic!("Expected code block, got {other:?}"),
    }
}

#[test]
fn test_realistic_llm_stream() {
    let mut parser = StreamParser::new();

    let chunks = [
        "Here's",
        " a ",
        "simple",
        " example:\n\n",
        "```",
        "rust",
        "\n",
        "fn ",
        "main() {\n",
        "    println!(\"Hello\");\n",
        "}",
        "\n```",
        "\n\nThat's",
        " it!",
    ];

    for chunk in chunks {
        parser.push(chunk);
    }

    parser.finalize();

    let kinds: Vec<_> = parser.parsed().iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            ElementKind::Paragraph,
            ElementKind::CodeBlock,
            ElementKind::Paragraph
        ]
    );
}

#[test]
fn test_empty_push() {
    let mut parser = StreamParser::new();
    parser.push("");
    parser.push("");
    parser.push("# Test\n");

    assert_eq!(parser.parsed().len(), 1);
}

#[test]
fn test_partial_content_visible() {
    let mut parser = StreamParser::new();
    parser.push("```\nsome code");

    let partial = parser.partial_content();
    assert!(partial.is_some_and(|p| p.contains("some code")));
}

#[test]
fn test_inline_formatting_in_paragraph() {
    let mut parser = StreamParser::new();
    parser.push("Some **bold**, *italic* and ~~gone~~ here.\n\n");

    assert_eq!(parser.parsed().len(), 1);
    assert!(paragraph_has(&parser, 0, InlineStyle::Bold, "bold"));
    assert!(paragraph_has(&parser, 0, InlineStyle::Italic, "italic"));
    assert!(paragraph_has(&parser, 0, InlineStyle::Strikethrough, "gone"));
}

#[test]
fn test_inline_finalize() {
    let mut parser = StreamParser::new();
    parser.push("Text with **bold** formatting");
    assert_eq!(parser.parsed().len(), 0);

    parser.finalize();

    assert_eq!(parser.parsed().len(), 1);
    assert!(paragraph_has(&parser, 0, InlineStyle::Bold, "bold"));
}

#[test]
fn test_paragraph_partial_kind() {
    let mut parser = StreamParser::new();
    parser.push("Some text without");

    let partial = parser.partial().expect("Should have partial");
    assert_eq!(partial.kind, PartialKind::Paragraph);
}

#[test]
fn test_paragraph_streaming_with_newlines() {
    let mut parser = StreamParser::new();

    parser.push("First line\n");
    assert!(matches!(
        parser.partial().map(|p| &p.kind),
        Some(PartialKind::Paragraph)
    ));

    parser.push("Second line");
    assert_eq!(parser.parsed().len(), 0);

    parser.finalize();
    assert_eq!(parser.parsed().len(), 1);
    assert!(matches!(parser.parsed()[0], MdElement::Paragraph(_)));
}

#[test]
fn test_paragraph_interrupted_by_heading() {
    let mut parser = StreamParser::new();
    parser.push("intro text\n## Next\n");

    let kinds: Vec<_> = parser.parsed().iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec![ElementKind::Paragraph, ElementKind::Heading]);
}

#[test]
fn test_table_streaming() {
    let mut parser = StreamParser::new();
    parser.push("| a | b |\n|---|");
    assert_eq!(parser.parsed().len(), 0);

    parser.push("---|\n| 1 | 2 |\n\n");
    assert_eq!(parser.parsed().len(), 1);
    match &parser.parsed()[0] {
        MdElement::Table { headers, rows } => {
            assert_eq!(headers.len(), 2);
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0][1].resolve(parser.buffer()), "2");
        }
        other => panic!("Expected table, got {other:?}"),
    }
}

#[test]
fn test_pipes_without_separator_are_text() {
    let mut parser = StreamParser::new();
    parser.push("| just | pipes |\n\n");

    assert_eq!(parser.parsed().len(), 1);
    assert_eq!(parser.parsed()[0].kind(), ElementKind::Paragraph);
}

// Tracker

#[test]
fn test_tracker_bold_closes_exactly_once() {
    let mut tracker = ProgressiveTracker::new();
    let outputs = feed(&mut tracker, &["**bold", "**"]);

    assert_eq!(outputs[0], "**bold");
    assert_eq!(outputs[1], "<strong class=\"md-bold\">bold</strong>");

    let done = tracker.finish();
    assert_eq!(done.document_html.matches("<strong").count(), 1);
    assert_eq!(
        done.document_html,
        "<p class=\"md-paragraph\"><strong class=\"md-bold\">bold</strong></p>"
    );
}

#[test]
fn test_tracker_odd_delimiters_are_literal() {
    let cases = [
        ("a **b", "<strong"),
        ("a *b", "<em"),
        ("a `b", "<code"),
        ("a ~~b", "<del"),
        ("a [b](c", "<a "),
    ];

    for (input, tag) in cases {
        let mut tracker = ProgressiveTracker::new();
        let output = tracker.process_incremental(input, input).expect("in sync");
        assert!(
            !output.processed_text.contains(tag),
            "{input:?} produced {:?}",
            output.processed_text
        );
        assert!(!output.streaming_elements.is_empty());
        assert_eq!(tracker.state(), TrackerState::ElementForming);
    }
}

#[test]
fn test_tracker_closed_emphasis_next_to_forming_code() {
    let mut tracker = ProgressiveTracker::new();
    let text = "**done** and `open";
    let output = tracker.process_incremental(text, text).expect("in sync");

    assert_eq!(
        output.processed_text,
        "<strong class=\"md-bold\">done</strong> and `open"
    );
    let kinds: Vec<_> = output.streaming_elements.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![FormingKind::Paragraph, FormingKind::InlineCode]);
}

#[test]
fn test_tracker_escapes_pending_text() {
    let mut tracker = ProgressiveTracker::new();
    let output = tracker.push("<script>").expect("not finished");
    assert_eq!(output.processed_text, "&lt;script&gt;");
}

#[test]
fn test_tracker_blocks_need_a_newline() {
    let mut tracker = ProgressiveTracker::new();
    let first = tracker.push("## Head").expect("not finished");
    assert!(first.settled.is_empty());
    assert!(!first.has_complete_elements);
    assert_eq!(first.processed_text, "## Head");

    let second = tracker.push("ing\n").expect("not finished");
    assert_eq!(second.settled.len(), 1);
    assert_eq!(second.settled[0].kind, ElementKind::Heading);
    assert_eq!(
        second.settled[0].html,
        "<h2 class=\"md-header md-h2\">Heading</h2>"
    );
    assert!(second.has_complete_elements);
    assert_eq!(second.processed_text, "");
    assert_eq!(tracker.pending(), "");
}

#[test]
fn test_tracker_pending_is_suffix() {
    let mut tracker = ProgressiveTracker::new();
    let chunks = ["# T", "itle\nsome ", "text\n\nmore"];
    let mut fed = String::new();

    for chunk in chunks {
        fed.push_str(chunk);
        tracker.push(chunk).expect("not finished");
        assert!(fed.ends_with(tracker.pending()));
    }
    assert_eq!(tracker.pending(), "more");
    assert_eq!(tracker.completed_spans().len(), 2);
}

#[test]
fn test_tracker_code_fence_is_not_tagged() {
    let mut tracker = ProgressiveTracker::new();
    let output = tracker.push("```\nlet x = **y**;").expect("not finished");

    assert_eq!(output.processed_text, "```\nlet x = **y**;");
    assert_eq!(output.streaming_elements[0].kind, FormingKind::CodeFence);
}

#[test]
fn test_tracker_settles_each_element_once() {
    let mut tracker = ProgressiveTracker::new();
    let text = "# A\n\npara one\n\n- item\n";
    let mut settled = 0;

    for c in text.chars() {
        let mut buf = [0u8; 4];
        settled += tracker.push(c.encode_utf8(&mut buf)).expect("open").settled.len();
    }
    settled += tracker.finish().settled.len();

    assert_eq!(settled, 3);
}

#[test]
fn test_tracker_out_of_sync() {
    let mut tracker = ProgressiveTracker::new();
    tracker.process_incremental("abc", "abc").expect("in sync");

    let err = tracker.process_incremental("def", "abXdef").unwrap_err();
    assert_eq!(
        err,
        TrackerError::OutOfSync {
            expected: 6,
            actual: 6
        }
    );
    let err = tracker.process_incremental("def", "abc").unwrap_err();
    assert!(matches!(err, TrackerError::OutOfSync { .. }));

    // Nothing was mutated
    assert_eq!(tracker.buffer(), "abc");
}

#[test]
fn test_tracker_finish_runs_once() {
    let mut tracker = ProgressiveTracker::new();
    tracker.push("tail *text*").expect("open");

    let first = tracker.finish().clone();
    assert_eq!(first.settled.len(), 1);

    let second = tracker.finish().clone();
    assert_eq!(first, second);

    assert_eq!(
        tracker.process_incremental("x", "tail *text*x").unwrap_err(),
        TrackerError::Finished
    );
}

#[test]
fn test_tracker_flush_keeps_order() {
    let mut tracker = ProgressiveTracker::new();
    tracker.push("before the code").expect("open");

    let flushed = tracker.flush();
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].kind, ElementKind::Paragraph);
    assert_eq!(tracker.pending(), "");

    tracker.push("after").expect("open");
    let done = tracker.finish();
    assert_eq!(
        done.document_html,
        "<p class=\"md-paragraph\">before the code</p><p class=\"md-paragraph\">after</p>"
    );
}

#[test]
fn test_tracker_reset() {
    let mut tracker = ProgressiveTracker::new();
    tracker.push("# one\n").expect("open");
    tracker.finish();

    tracker.reset();
    assert_eq!(tracker.state(), TrackerState::Idle);
    assert!(!tracker.is_finished());
    assert!(tracker.completed_spans().is_empty());

    let output = tracker.process_incremental("new", "new").expect("fresh session");
    assert!(!output.has_complete_elements);
}
