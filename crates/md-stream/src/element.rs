//! Markdown elements - the stable output of parsing.

/// A byte range into the parser's source buffer. Zero-copy reference to content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn resolve<'a>(&self, buffer: &'a str) -> &'a str {
        &buffer[self.start..self.end]
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Shrink the span so it excludes leading and trailing whitespace.
    pub fn trim(&self, buffer: &str) -> Span {
        let text = self.resolve(buffer);
        let leading = text.len() - text.trim_start().len();
        let trailing = text.len() - text.trim_end().len();
        if leading == text.len() {
            return Span::new(self.start, self.start);
        }
        Span::new(self.start + leading, self.end - trailing)
    }

    /// Offset this span by `base` bytes.
    pub fn shift(&self, base: usize) -> Span {
        Span::new(self.start + base, self.end + base)
    }
}

/// A complete, stable markdown element ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum MdElement {
    /// Heading with level (1-6) and content
    Heading { level: u8, content: Span },

    /// Paragraph of text (may contain inline elements)
    Paragraph(Vec<InlineElement>),

    /// Fenced code block
    CodeBlock(CodeBlock),

    /// A single blockquote line with its nesting depth
    BlockQuote {
        depth: usize,
        content: Vec<InlineElement>,
    },

    /// A single list item line
    ListItem(ListItem),

    /// Markdown table with headers and data rows
    Table {
        headers: Vec<Span>,
        rows: Vec<Vec<Span>>,
    },

    /// Thematic break (---, ***, ___)
    ThematicBreak,
}

impl MdElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            MdElement::Heading { .. } => ElementKind::Heading,
            MdElement::Paragraph(_) => ElementKind::Paragraph,
            MdElement::CodeBlock(_) => ElementKind::CodeBlock,
            MdElement::BlockQuote { .. } => ElementKind::BlockQuote,
            MdElement::ListItem(_) => ElementKind::ListItem,
            MdElement::Table { .. } => ElementKind::Table,
            MdElement::ThematicBreak => ElementKind::ThematicBreak,
        }
    }
}

/// Discriminant of [`MdElement`], handy for reporting spans without content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Heading,
    Paragraph,
    CodeBlock,
    BlockQuote,
    ListItem,
    Table,
    ThematicBreak,
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Heading => "heading",
            ElementKind::Paragraph => "paragraph",
            ElementKind::CodeBlock => "code-block",
            ElementKind::BlockQuote => "blockquote",
            ElementKind::ListItem => "list-item",
            ElementKind::Table => "table",
            ElementKind::ThematicBreak => "thematic-break",
        }
    }
}

/// A fenced code block with optional language.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub language: Option<Span>,
    pub content: Span,
    /// False when the stream ended before the closing fence arrived
    pub closed: bool,
}

/// The marker that introduced a list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMarker {
    /// `-`, `*` or `+`
    Bullet(char),
    /// `1.` or `1)`
    Ordered(u32),
}

/// A list item line.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub marker: ListMarker,
    pub indent: usize,
    pub content: Vec<InlineElement>,
}

/// Inline elements within a paragraph or list item.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineElement {
    /// Plain text
    Text(Span),

    /// Styled text (bold, italic, etc.)
    Styled { style: InlineStyle, content: Span },

    /// Inline code (`code`)
    Code(Span),

    /// Link [text](url)
    Link { text: Span, url: Span },

    /// Image ![alt](url)
    Image { alt: Span, url: Span },

    /// Hard line break
    LineBreak,
}

/// Inline text styles (can be combined).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineStyle {
    Bold,
    Italic,
    BoldItalic,
    Strikethrough,
}
