use std::io;

use md_chunk::ChunkError;
use md_stream::TrackerError;

use crate::surface::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("surface rejected the update: {0}")]
    Rejected(String),
}

/// Failure to turn one chunk into mounted markup. Never ends a session;
/// the chunk is shown as plain text instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("materialize error: {0}")]
    Materialize(String),
}

/// Errors that end a streaming session before it starts.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("chunk options: {0}")]
    Chunk(#[from] ChunkError),

    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<String> for RenderError {
    fn from(s: String) -> Self {
        RenderError::Materialize(s)
    }
}
