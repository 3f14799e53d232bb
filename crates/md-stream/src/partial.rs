//! Partial state tracking for incomplete markdown blocks.

use crate::element::{ListMarker, Span};

/// Tracks an in-progress markdown block that might be completed
/// when more tokens arrive.
#[derive(Debug, Clone, PartialEq)]
pub struct Partial {
    /// What kind of block we're building
    pub kind: PartialKind,

    /// Byte offset into the buffer where this block starts
    pub start_pos: usize,

    /// Content accumulated so far
    pub content: Span,
}

impl Partial {
    pub fn new(kind: PartialKind, start_pos: usize, content: Span) -> Self {
        Self {
            kind,
            start_pos,
            content,
        }
    }
}

/// The kind of partial block being tracked.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialKind {
    /// Fenced code block waiting for the closing fence
    CodeFence {
        fence_char: char, // ` or ~
        fence_len: usize, // typically 3
        language: Option<Span>,
    },

    /// Heading started with # at line start, waiting for the newline
    Heading { level: u8 },

    /// List item started, waiting for the newline
    ListItem { marker: ListMarker, indent: usize },

    /// Blockquote started with >, waiting for the newline
    BlockQuote { depth: usize },

    /// Table rows being collected until a non-table line
    Table,

    /// Paragraph being accumulated (waiting for a blank line)
    Paragraph,
}
