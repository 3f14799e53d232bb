//! Incremental markdown parsing and progressive tracking for streaming LLM output.
//!
//! Designed for chat interfaces where markdown arrives token-by-token
//! and needs to be rendered progressively. [`StreamParser`] settles complete
//! block elements as lines arrive; [`ProgressiveTracker`] wraps it, renders
//! settled elements once and keeps forming constructs literal.

mod element;
mod error;
mod forming;
pub mod html;
mod inline;
mod parser;
mod partial;
mod tracker;

pub use element::{
    CodeBlock, ElementKind, InlineElement, InlineStyle, ListItem, ListMarker, MdElement, Span,
};
pub use error::TrackerError;
pub use forming::{detect_inline, FormingElement, FormingKind, InlineForming};
pub use inline::{parse_inline, parse_inline_with, InlineKinds};
pub use parser::StreamParser;
pub use partial::{Partial, PartialKind};
pub use tracker::{
    ElementSpan, FinalOutput, ProgressiveTracker, SettledElement, TrackerOutput, TrackerState,
};

#[cfg(test)]
mod tests;
