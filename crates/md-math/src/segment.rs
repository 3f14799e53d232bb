/// Where a piece of math came from, which decides its block title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MathKind {
    /// ```` ```math ```` / `latex` / `tex` fenced block
    CodeBlock,
    /// `\begin{name}..\end{name}`
    Environment(String),
    /// `$$..$$`
    Display,
    /// `$..$`
    Inline,
}

impl MathKind {
    pub fn title(&self) -> String {
        match self {
            MathKind::CodeBlock => "Math Block".to_string(),
            MathKind::Environment(name) => format!("{} Environment", name.to_uppercase()),
            MathKind::Display => "Display Math".to_string(),
            MathKind::Inline => "Inline Math".to_string(),
        }
    }

    pub fn display_mode(&self) -> bool {
        !matches!(self, MathKind::Inline)
    }
}

/// Outcome of rendering one piece of math.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MathStatus {
    Rendered,
    /// The engine rejected the source
    Error(String),
    /// The engine wasn't ready yet; render again once it is
    Loading,
}

/// Math that went through the engine, with its markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMath {
    pub id: String,
    pub kind: MathKind,
    pub source: String,
    pub status: MathStatus,
    pub html: String,
}

impl RenderedMath {
    pub fn is_loading(&self) -> bool {
        self.status == MathStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, MathStatus::Error(_))
    }
}

/// A piece of content that is either untouched text or finished math.
///
/// The passes only look inside `Raw` segments, so rendered output is never
/// scanned again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Raw(String),
    Rendered(RenderedMath),
}

impl Segment {
    pub fn as_html(&self) -> &str {
        match self {
            Segment::Raw(text) => text,
            Segment::Rendered(math) => &math.html,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Segment::Rendered(math) if math.is_loading())
    }

    pub fn rendered(&self) -> Option<&RenderedMath> {
        match self {
            Segment::Rendered(math) => Some(math),
            Segment::Raw(_) => None,
        }
    }
}

/// Concatenate segments back into a string.
pub fn join(segments: &[Segment]) -> String {
    segments.iter().map(Segment::as_html).collect()
}
