//! Core streaming parser implementation.

use crate::element::{CodeBlock, ListItem, ListMarker, MdElement, Span};
use crate::inline::parse_inline;
use crate::partial::{Partial, PartialKind};

/// Incremental markdown parser for streaming input.
///
/// Maintains a buffer of incoming tokens and tracks parsing state
/// to allow progressive rendering as content streams in. Block decisions
/// are only made on newline-terminated lines; the unterminated tail is
/// exposed through [`StreamParser::partial`] for speculative rendering.
pub struct StreamParser {
    /// Everything pushed so far
    buffer: String,

    /// Completed markdown elements
    parsed: Vec<MdElement>,

    /// Source range of each completed element, parallel to `parsed`
    sources: Vec<Span>,

    /// Multi-line block still collecting lines (paragraph, fence, table)
    open: Option<Partial>,

    /// Rows collected for an open table
    table_rows: Vec<Span>,

    /// Speculative view of whatever isn't complete yet
    partial: Option<Partial>,

    /// Offset of the first byte not yet consumed as a complete line
    process_pos: usize,

    /// Everything before this offset belongs to a completed element
    settled_pos: usize,
}

/// What a single line looks like at block level.
#[derive(Debug, Clone, Copy, PartialEq)]
enum LineKind {
    Blank,
    Heading { level: u8, content: Span },
    Fence { fence_char: char, fence_len: usize, language: Option<Span> },
    ThematicBreak,
    ListItem { marker: ListMarker, indent: usize, content: Span },
    BlockQuote { depth: usize, content: Span },
    TableRow,
    Text,
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            parsed: Vec::new(),
            sources: Vec::new(),
            open: None,
            table_rows: Vec::new(),
            partial: None,
            process_pos: 0,
            settled_pos: 0,
        }
    }

    /// Push a new token chunk and process it.
    pub fn push(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }

        self.buffer.push_str(token);
        self.process_new_content();
    }

    /// Get completed elements for rendering.
    pub fn parsed(&self) -> &[MdElement] {
        &self.parsed
    }

    /// Source ranges of the completed elements, parallel to [`Self::parsed`].
    pub fn sources(&self) -> &[Span] {
        &self.sources
    }

    /// Consume the parser and return the completed elements.
    pub fn into_parsed(self) -> Vec<MdElement> {
        self.parsed
    }

    /// Everything pushed so far. Element spans resolve against this.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Offset up to which the buffer is covered by completed elements.
    pub fn settled_upto(&self) -> usize {
        self.settled_pos
    }

    /// Get the current partial state (for speculative rendering).
    pub fn partial(&self) -> Option<&Partial> {
        self.partial.as_ref()
    }

    /// Get the speculative content that would render from partial state.
    /// Returns the raw accumulated text that isn't yet a complete element.
    pub fn partial_content(&self) -> Option<&str> {
        self.partial.as_ref().map(|p| p.content.resolve(&self.buffer))
    }

    /// Check if we're currently inside a code block.
    pub fn in_code_block(&self) -> bool {
        matches!(
            self.partial.as_ref().map(|p| &p.kind),
            Some(PartialKind::CodeFence { .. })
        )
    }

    /// Process every newly completed line.
    fn process_new_content(&mut self) {
        while let Some(nl) = self.buffer[self.process_pos..].find('\n') {
            let line = Span::new(self.process_pos, self.process_pos + nl + 1);
            self.process_line(line);
            self.process_pos = line.end;
        }
        self.refresh_partial();
    }

    fn process_line(&mut self, line: Span) {
        let kind = classify_line(&self.buffer, line);

        if let Some(open) = self.open.take() {
            match open.kind {
                PartialKind::CodeFence {
                    fence_char,
                    fence_len,
                    language,
                } => {
                    if is_closing_fence(line.resolve(&self.buffer), fence_char, fence_len) {
                        let block = CodeBlock {
                            language,
                            content: Span::new(open.content.start, line.start),
                            closed: true,
                        };
                        self.emit(
                            MdElement::CodeBlock(block),
                            Span::new(open.start_pos, line.end),
                        );
                    } else {
                        self.open = Some(open);
                    }
                    return;
                }

                PartialKind::Paragraph => match kind {
                    LineKind::Blank => {
                        self.emit_paragraph(&open, line.start, line.end);
                        return;
                    }
                    LineKind::Text | LineKind::TableRow => {
                        self.open = Some(open);
                        return;
                    }
                    _ => {
                        // A block start interrupts the paragraph
                        self.emit_paragraph(&open, line.start, line.start);
                    }
                },

                PartialKind::Table => {
                    if kind == LineKind::TableRow {
                        self.table_rows.push(line);
                        self.open = Some(open);
                        return;
                    }
                    self.emit_table(&open, line.start);
                }

                // Single-line kinds are never left open
                _ => {}
            }
        }

        match kind {
            LineKind::Blank => {
                self.settled_pos = line.end;
            }

            LineKind::Heading { level, content } => {
                self.emit(MdElement::Heading { level, content }, line);
            }

            LineKind::Fence {
                fence_char,
                fence_len,
                language,
            } => {
                self.open = Some(Partial::new(
                    PartialKind::CodeFence {
                        fence_char,
                        fence_len,
                        language,
                    },
                    line.start,
                    Span::new(line.end, line.end),
                ));
            }

            LineKind::ThematicBreak => {
                self.emit(MdElement::ThematicBreak, line);
            }

            LineKind::ListItem {
                marker,
                indent,
                content,
            } => {
                let content = parse_inline(&self.buffer, content);
                self.emit(
                    MdElement::ListItem(ListItem {
                        marker,
                        indent,
                        content,
                    }),
                    line,
                );
            }

            LineKind::BlockQuote { depth, content } => {
                let content = parse_inline(&self.buffer, content);
                self.emit(MdElement::BlockQuote { depth, content }, line);
            }

            LineKind::TableRow => {
                self.table_rows.clear();
                self.table_rows.push(line);
                self.open = Some(Partial::new(PartialKind::Table, line.start, line));
            }

            LineKind::Text => {
                self.open = Some(Partial::new(PartialKind::Paragraph, line.start, line));
            }
        }
    }

    fn emit(&mut self, element: MdElement, source: Span) {
        self.parsed.push(element);
        self.sources.push(source);
        self.settled_pos = self.settled_pos.max(source.end);
    }

    fn emit_paragraph(&mut self, open: &Partial, content_end: usize, source_end: usize) {
        let content = Span::new(open.content.start, content_end).trim(&self.buffer);
        if content.is_empty() {
            self.settled_pos = self.settled_pos.max(source_end);
            return;
        }

        let inlines = parse_inline(&self.buffer, content);
        self.emit(
            MdElement::Paragraph(inlines),
            Span::new(open.start_pos, source_end),
        );
    }

    fn emit_table(&mut self, open: &Partial, end: usize) {
        let rows = std::mem::take(&mut self.table_rows);
        let source = Span::new(open.start_pos, end);

        let is_table = rows.len() >= 2 && is_separator_row(rows[1].resolve(&self.buffer));
        if !is_table {
            // Pipes without a separator row are just text
            let paragraph = Partial::new(PartialKind::Paragraph, open.start_pos, source);
            self.emit_paragraph(&paragraph, end, end);
            return;
        }

        let headers = split_cells(&self.buffer, rows[0]);
        let body = rows[2..]
            .iter()
            .map(|row| split_cells(&self.buffer, *row))
            .collect();

        self.emit(
            MdElement::Table {
                headers,
                rows: body,
            },
            source,
        );
    }

    fn refresh_partial(&mut self) {
        let end = self.buffer.len();

        if let Some(open) = &self.open {
            let mut partial = open.clone();
            partial.content.end = end;
            self.partial = Some(partial);
            return;
        }

        let tail = Span::new(self.process_pos, end);
        if tail.is_empty() {
            self.partial = None;
            return;
        }

        let kind = match classify_line(&self.buffer, tail) {
            LineKind::Heading { level, content } => {
                Some((PartialKind::Heading { level }, content))
            }
            LineKind::Fence {
                fence_char,
                fence_len,
                language,
            } => Some((
                PartialKind::CodeFence {
                    fence_char,
                    fence_len,
                    language,
                },
                Span::new(end, end),
            )),
            LineKind::ListItem {
                marker,
                indent,
                content,
            } => Some((PartialKind::ListItem { marker, indent }, content)),
            LineKind::BlockQuote { depth, content } => {
                Some((PartialKind::BlockQuote { depth }, content))
            }
            LineKind::TableRow => Some((PartialKind::Table, tail)),
            LineKind::Blank => None,
            LineKind::ThematicBreak | LineKind::Text => Some((PartialKind::Paragraph, tail)),
        };

        self.partial = kind.map(|(kind, content)| Partial::new(kind, tail.start, content));
    }

    /// Settle whatever is still open, as if the stream paused at a block
    /// boundary. An unterminated last line is treated as a complete line.
    pub fn flush(&mut self) {
        let end = self.buffer.len();
        let tail = Span::new(self.process_pos, end);
        if !tail.is_empty() {
            self.process_line(tail);
            self.process_pos = end;
        }

        if let Some(open) = self.open.take() {
            match open.kind {
                PartialKind::CodeFence { language, .. } => {
                    // Unclosed code block - emit what we have
                    let block = CodeBlock {
                        language,
                        content: Span::new(open.content.start, end),
                        closed: false,
                    };
                    self.emit(MdElement::CodeBlock(block), Span::new(open.start_pos, end));
                }
                PartialKind::Table => self.emit_table(&open, end),
                _ => self.emit_paragraph(&open, end, end),
            }
        }

        self.settled_pos = end;
        self.partial = None;
    }

    /// Finalize parsing (call when stream ends).
    /// Converts any remaining partial state to complete elements.
    pub fn finalize(&mut self) {
        self.flush();
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_line(buffer: &str, line: Span) -> LineKind {
    let raw = line.resolve(buffer);
    let text = raw.trim_end_matches(['\n', '\r']);
    let trimmed = text.trim_start();
    let indent = text.len() - trimmed.len();
    let base = line.start + indent;

    if trimmed.is_empty() {
        return LineKind::Blank;
    }

    // Heading: # ## ### etc
    if trimmed.starts_with('#') {
        let level = trimmed.chars().take_while(|&c| c == '#').count();
        let rest = &trimmed[level..];
        if level <= 6 && (rest.is_empty() || rest.starts_with([' ', '\t'])) {
            let content = Span::new(base + level, base + trimmed.len()).trim(buffer);
            return LineKind::Heading {
                level: level as u8,
                content,
            };
        }
    }

    // Code fence: ``` or ~~~
    if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
        let fence_char = if trimmed.starts_with('`') { '`' } else { '~' };
        let fence_len = trimmed.chars().take_while(|&c| c == fence_char).count();
        let info = &trimmed[fence_len..];

        if fence_char == '~' || !info.contains('`') {
            let info_span = Span::new(base + fence_len, base + trimmed.len()).trim(buffer);
            // The info string is trimmed, so its first word starts the span
            let language = info_span
                .resolve(buffer)
                .split_whitespace()
                .next()
                .map(|word| Span::new(info_span.start, info_span.start + word.len()));
            return LineKind::Fence {
                fence_char,
                fence_len,
                language,
            };
        }
    }

    // Thematic break: --- *** ___
    if let Some(first) = trimmed.chars().next() {
        if matches!(first, '-' | '*' | '_') {
            let marks = trimmed.chars().filter(|&c| c == first).count();
            if marks >= 3 && trimmed.chars().all(|c| c == first || c == ' ' || c == '\t') {
                return LineKind::ThematicBreak;
            }
        }
    }

    if let Some((marker, marker_len)) = list_marker(trimmed) {
        let content = Span::new(base + marker_len, base + trimmed.len()).trim(buffer);
        return LineKind::ListItem {
            marker,
            indent,
            content,
        };
    }

    if trimmed.starts_with('>') {
        let mut depth = 0;
        let mut consumed = 0;
        for (i, c) in trimmed.char_indices() {
            match c {
                '>' => {
                    depth += 1;
                    consumed = i + 1;
                }
                ' ' | '\t' => {}
                _ => break,
            }
        }
        let content = Span::new(base + consumed, base + trimmed.len()).trim(buffer);
        return LineKind::BlockQuote { depth, content };
    }

    if trimmed.starts_with('|') {
        return LineKind::TableRow;
    }

    LineKind::Text
}

/// Returns the list marker and the number of bytes it occupies, including
/// the whitespace after it.
fn list_marker(trimmed: &str) -> Option<(ListMarker, usize)> {
    let mut chars = trimmed.chars();
    let first = chars.next()?;

    if matches!(first, '-' | '*' | '+') {
        return match chars.next() {
            Some(' ') | Some('\t') => Some((ListMarker::Bullet(first), 2)),
            _ => None,
        };
    }

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    let rest = &trimmed[digits..];
    if (rest.starts_with(". ") || rest.starts_with(") "))
        || (rest.starts_with(".\t") || rest.starts_with(")\t"))
    {
        let number = trimmed[..digits].parse().ok()?;
        return Some((ListMarker::Ordered(number), digits + 2));
    }

    None
}

fn is_closing_fence(line: &str, fence_char: char, fence_len: usize) -> bool {
    let trimmed = line.trim_start();
    let run = trimmed.chars().take_while(|&c| c == fence_char).count();
    run >= fence_len && trimmed[run..].trim().is_empty()
}

fn is_separator_row(row: &str) -> bool {
    let cells: Vec<&str> = row
        .trim()
        .trim_matches('|')
        .split('|')
        .map(str::trim)
        .collect();

    !cells.is_empty()
        && cells.iter().all(|cell| {
            !cell.is_empty() && cell.contains('-') && cell.chars().all(|c| matches!(c, '-' | ':'))
        })
}

fn split_cells(buffer: &str, row: Span) -> Vec<Span> {
    let row = row.trim(buffer);
    let text = row.resolve(buffer);
    let mut cells = Vec::new();
    let mut cell_start = 0;

    for (i, c) in text.char_indices() {
        if c == '|' {
            if i > 0 {
                cells.push(Span::new(row.start + cell_start, row.start + i).trim(buffer));
            }
            cell_start = i + 1;
        }
    }
    if cell_start < text.len() {
        cells.push(Span::new(row.start + cell_start, row.end).trim(buffer));
    }

    cells
}
