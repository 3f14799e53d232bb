//! Progressive markdown tracking for one streaming session.
//!
//! The tracker sits on top of [`StreamParser`]. Elements the parser completes
//! are rendered once and handed back as [`SettledElement`]s; whatever is left
//! over is the pending buffer, rendered as safe HTML with every forming
//! construct left literal.

use tracing::debug;

use crate::element::{ElementKind, Span};
use crate::error::TrackerError;
use crate::forming::{block_forming, detect_inline, FormingElement};
use crate::html::{escape, render_element, render_inline_text};
use crate::parser::StreamParser;

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// Nothing fed since the last reset
    Idle,
    /// Text is pending but no construct is waiting on a delimiter
    Accumulating,
    /// At least one construct is still open
    ElementForming,
    /// The last call settled elements and left nothing forming
    ElementComplete,
}

/// Source range and kind of a completed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpan {
    pub kind: ElementKind,
    pub span: Span,
}

/// A completed element, rendered exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledElement {
    pub kind: ElementKind,
    pub span: Span,
    pub html: String,
}

/// Result of one incremental call.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerOutput {
    /// Safe HTML for the pending buffer
    pub processed_text: String,
    /// True once any element has completed this session
    pub has_complete_elements: bool,
    pub streaming_elements: Vec<FormingElement>,
    /// Elements completed by this call
    pub settled: Vec<SettledElement>,
}

/// Result of the final pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalOutput {
    /// Elements completed by the final pass
    pub settled: Vec<SettledElement>,
    /// HTML of the whole document
    pub document_html: String,
}

pub struct ProgressiveTracker {
    parser: StreamParser,
    /// Parser elements already handed out
    emitted: usize,
    completed: Vec<ElementSpan>,
    forming: Vec<FormingElement>,
    document_html: String,
    state: TrackerState,
    finished: Option<FinalOutput>,
}

impl ProgressiveTracker {
    pub fn new() -> Self {
        Self {
            parser: StreamParser::new(),
            emitted: 0,
            completed: Vec::new(),
            forming: Vec::new(),
            document_html: String::new(),
            state: TrackerState::Idle,
            finished: None,
        }
    }

    /// Feed `new_text`. `full_text` is the caller's view of everything
    /// streamed so far, `new_text` included.
    pub fn process_incremental(
        &mut self,
        new_text: &str,
        full_text: &str,
    ) -> Result<TrackerOutput, TrackerError> {
        if self.finished.is_some() {
            return Err(TrackerError::Finished);
        }

        let fed = self.parser.buffer();
        let expected = fed.len() + new_text.len();
        let in_sync = full_text.len() == expected
            && full_text.starts_with(fed)
            && full_text.ends_with(new_text);
        if !in_sync {
            return Err(TrackerError::OutOfSync {
                expected,
                actual: full_text.len(),
            });
        }

        self.push(new_text)
    }

    /// Feed `new_text` without a consistency check.
    pub fn push(&mut self, new_text: &str) -> Result<TrackerOutput, TrackerError> {
        if self.finished.is_some() {
            return Err(TrackerError::Finished);
        }

        self.parser.push(new_text);
        let settled = self.collect_settled();
        let processed_text = self.render_pending();
        self.update_state(!settled.is_empty());

        Ok(TrackerOutput {
            processed_text,
            has_complete_elements: !self.completed.is_empty(),
            streaming_elements: self.forming.clone(),
            settled,
        })
    }

    /// Settle the forming block now, as if the stream paused at a block
    /// boundary. The session keeps going afterwards.
    pub fn flush(&mut self) -> Vec<SettledElement> {
        if self.finished.is_some() {
            return Vec::new();
        }

        self.parser.flush();
        let settled = self.collect_settled();
        self.forming.clear();
        self.update_state(!settled.is_empty());
        settled
    }

    /// Run the final pass. Only the first call does any work; later calls
    /// return the same output.
    pub fn finish(&mut self) -> &FinalOutput {
        let output = match self.finished.take() {
            Some(output) => output,
            None => {
                self.parser.finalize();
                let settled = self.collect_settled();
                self.forming.clear();
                self.state = TrackerState::ElementComplete;
                debug!(
                    "tracker finished with {} elements ({} in final pass)",
                    self.completed.len(),
                    settled.len()
                );
                FinalOutput {
                    settled,
                    document_html: self.document_html.clone(),
                }
            }
        };

        self.finished.insert(output)
    }

    /// Drop all session state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Text fed since the last settled element.
    pub fn pending(&self) -> &str {
        &self.parser.buffer()[self.parser.settled_upto()..]
    }

    pub fn completed_spans(&self) -> &[ElementSpan] {
        &self.completed
    }

    pub fn forming(&self) -> &[FormingElement] {
        &self.forming
    }

    /// Everything fed this session.
    pub fn buffer(&self) -> &str {
        self.parser.buffer()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    fn collect_settled(&mut self) -> Vec<SettledElement> {
        let buffer = self.parser.buffer();
        let parsed = self.parser.parsed();
        let sources = self.parser.sources();

        let mut settled = Vec::with_capacity(parsed.len() - self.emitted);
        for (element, span) in parsed[self.emitted..].iter().zip(&sources[self.emitted..]) {
            let html = render_element(element, buffer);
            let kind = element.kind();
            debug!("settled {} at {}..{}", kind.name(), span.start, span.end);

            self.document_html.push_str(&html);
            self.completed.push(ElementSpan { kind, span: *span });
            settled.push(SettledElement {
                kind,
                span: *span,
                html,
            });
        }
        self.emitted = parsed.len();

        settled
    }

    fn render_pending(&mut self) -> String {
        let buffer = self.parser.buffer();
        let start = self.parser.settled_upto();
        let pending = &buffer[start..];

        self.forming.clear();
        if let Some(partial) = self.parser.partial() {
            self.forming.push(block_forming(partial));
        }

        if self.parser.in_code_block() {
            return escape(pending);
        }

        let inline = detect_inline(pending, start);
        let html = render_inline_text(buffer, Span::new(start, buffer.len()), inline.allowed());
        self.forming.extend(inline.elements);

        html
    }

    fn update_state(&mut self, settled_any: bool) {
        self.state = if self.forming.iter().any(|e| e.kind.is_inline())
            || self.parser.in_code_block()
        {
            TrackerState::ElementForming
        } else if settled_any {
            TrackerState::ElementComplete
        } else if self.parser.buffer().is_empty() {
            TrackerState::Idle
        } else {
            TrackerState::Accumulating
        };
    }
}

impl Default for ProgressiveTracker {
    fn default() -> Self {
        Self::new()
    }
}
