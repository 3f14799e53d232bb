//! Math rendering for streamed markdown: shorthand rewrites, pattern passes,
//! a pluggable equation engine behind a readiness gate, and FIFO caches.

mod cache;
mod engine;
mod gate;
pub mod markup;
mod renderer;
mod scan;
mod segment;
pub mod shorthand;

pub use cache::{content_key, equation_key, CacheKey, FifoCache};
pub use engine::{has_engine_error, EquationEngine, EquationError, TexSourceEngine};
pub use gate::{EngineGate, EngineLoader, EngineStatus};
pub use markup::{is_processed, BlockState, PROCESSED_ATTR};
pub use renderer::{MathRenderer, MathStats, DEFAULT_CACHE_CAPACITY};
pub use segment::{join, MathKind, MathStatus, RenderedMath, Segment};
