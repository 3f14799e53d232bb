use serde::Serialize;

/// What a chunk holds. Matched exhaustively by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChunkKind {
    Text,
    ListItem,
    CodeBlock { language: Option<String> },
    MathBlock,
    Header { level: u8 },
}

impl ChunkKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChunkKind::Text => "text",
            ChunkKind::ListItem => "list-item",
            ChunkKind::CodeBlock { .. } => "code-block",
            ChunkKind::MathBlock => "math-block",
            ChunkKind::Header { .. } => "header",
        }
    }

    /// Code, math and header chunks are never subdivided.
    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            ChunkKind::CodeBlock { .. } | ChunkKind::MathBlock | ChunkKind::Header { .. }
        )
    }
}

/// An ordered segment of the source text.
///
/// Offsets are byte offsets into the source and always sit on `char`
/// boundaries, so `&source[start_offset..end_offset] == content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: usize,
    pub content: String,
    pub kind: ChunkKind,
    pub start_offset: usize,
    pub end_offset: usize,
    pub is_atomic: bool,
    pub priority: u8,
    pub is_above_fold: bool,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
