use std::collections::BTreeMap;
use std::ops::Range;

use crate::surface::NodeId;

/// Which byte range of the source the host is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewport {
    /// Everything before the fold is visible
    Fold(usize),
    Range(Range<usize>),
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport::Fold(2000)
    }
}

impl Viewport {
    pub fn contains(&self, start: usize, end: usize) -> bool {
        match self {
            Viewport::Fold(fold) => start < *fold,
            Viewport::Range(range) => start < range.end && (end > range.start || start == range.start),
        }
    }
}

/// Dormant nodes waiting for the host to report them visible.
#[derive(Debug, Default)]
pub struct VisibilityObserver {
    waiting: BTreeMap<NodeId, usize>,
}

impl VisibilityObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, node: NodeId, chunk_id: usize) {
        self.waiting.insert(node, chunk_id);
    }

    /// Stop watching `node`, returning the chunk it holds.
    pub fn take(&mut self, node: NodeId) -> Option<usize> {
        self.waiting.remove(&node)
    }

    pub fn is_observed(&self, node: NodeId) -> bool {
        self.waiting.contains_key(&node)
    }

    /// Waiting nodes in mount order.
    pub fn waiting(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.waiting.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn clear(&mut self) {
        self.waiting.clear();
    }
}
