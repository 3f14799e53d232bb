//! Progressive rendering of streamed markdown.
//!
//! [`ChunkedRenderer`] mounts chunks into a [`RenderSurface`] a few at a time,
//! yielding between frames so the host stays responsive. [`StreamingOrchestrator`]
//! drives a whole document through the chunker, the progressive tracker and
//! the math renderer on top of it.

pub mod code;
mod control;
mod error;
mod events;
mod options;
mod orchestrator;
mod perf;
mod renderer;
mod scheduler;
mod surface;
pub mod units;
mod visibility;

pub use control::{RenderControl, RenderProgress};
pub use error::{RenderError, StreamError, SurfaceError};
pub use events::{EventReceiver, EventSender, StreamEvent};
pub use options::StreamOptions;
pub use orchestrator::{StreamReport, StreamStats, StreamingOrchestrator};
pub use perf::{ChunkSample, PerformanceMetrics, PerformanceMonitor};
pub use renderer::{ChunkedRenderer, RenderReport, RenderSession, RendererConfig};
pub use scheduler::{FrameClock, FrameYield, IntervalYield, TokioYield};
pub use surface::{HtmlSurface, NodeId, NodeState, RenderNode, RenderSurface};
pub use visibility::{Viewport, VisibilityObserver};
