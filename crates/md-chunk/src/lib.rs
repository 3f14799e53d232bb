//! Boundary-aware chunking of markdown text for progressive rendering.
//!
//! Fenced code, display math and headers are atomic: they always land in a
//! single chunk. Everything between them is cut into windows that prefer
//! sentence, paragraph, clause or word breaks depending on the strategy.

mod analysis;
mod chunk;
mod chunker;
mod options;
mod patterns;

pub use analysis::{analyze, ContentAnalysis};
pub use chunk::{Chunk, ChunkKind};
pub use chunker::chunk;
pub use options::{ChunkError, ChunkOptions, ChunkingStrategy};
