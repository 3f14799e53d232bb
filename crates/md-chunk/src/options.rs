use serde::{Deserialize, Serialize};

/// Which break-point detector gets first say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    Adaptive,
    Sentence,
    Paragraph,
    Word,
}

impl ChunkingStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ChunkingStrategy::Adaptive => "adaptive",
            ChunkingStrategy::Sentence => "sentence",
            ChunkingStrategy::Paragraph => "paragraph",
            ChunkingStrategy::Word => "word",
        }
    }
}

impl std::str::FromStr for ChunkingStrategy {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adaptive" => Ok(ChunkingStrategy::Adaptive),
            "sentence" => Ok(ChunkingStrategy::Sentence),
            "paragraph" => Ok(ChunkingStrategy::Paragraph),
            "word" => Ok(ChunkingStrategy::Word),
            _ => Err(ChunkError::UnknownStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("max chunk size must be positive")]
    ZeroMaxSize,

    #[error("min chunk size {min} exceeds max chunk size {max}")]
    MinAboveMax { min: usize, max: usize },

    #[error("unknown chunking strategy: {0}")]
    UnknownStrategy(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOptions {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    /// `None` lets the content analysis pick
    pub strategy: Option<ChunkingStrategy>,
    /// Chunks starting before this byte offset are above the fold
    pub fold_threshold: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 150,
            min_chunk_size: 30,
            strategy: None,
            fold_threshold: 2000,
        }
    }
}

impl ChunkOptions {
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.max_chunk_size == 0 {
            return Err(ChunkError::ZeroMaxSize);
        }
        if self.min_chunk_size > self.max_chunk_size {
            return Err(ChunkError::MinAboveMax {
                min: self.min_chunk_size,
                max: self.max_chunk_size,
            });
        }
        Ok(())
    }

    /// The minimum a soft break must leave behind. Never more than half a
    /// window, so a small max still breaks on sentences.
    pub fn effective_min(&self) -> usize {
        self.min_chunk_size.min(self.max_chunk_size / 2)
    }

    /// Non-atomic chunks shorter than this are merged into a neighbour.
    pub fn merge_threshold(&self) -> usize {
        20.min(self.effective_min())
    }
}
