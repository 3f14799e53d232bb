//! The host display surface and an in-memory implementation of it.

use std::fmt;

use serde::Serialize;

use crate::error::SurfaceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Mounted and fading in
    Entering,
    /// Mounted but not yet shown; waiting to become visible
    Dormant,
    Settled,
    /// Plain-text stand-in for a chunk that failed to render
    Fallback,
}

impl NodeState {
    pub fn name(&self) -> &'static str {
        match self {
            NodeState::Entering => "entering",
            NodeState::Dormant => "dormant",
            NodeState::Settled => "settled",
            NodeState::Fallback => "fallback",
        }
    }
}

/// Append/replace node API the pipeline renders into. Nodes keep the order
/// they were mounted in.
pub trait RenderSurface {
    fn mount(&mut self, html: &str, state: NodeState) -> Result<NodeId, SurfaceError>;

    fn replace(&mut self, node: NodeId, html: &str) -> Result<(), SurfaceError>;

    fn set_state(&mut self, node: NodeId, state: NodeState) -> Result<(), SurfaceError>;

    fn remove(&mut self, node: NodeId) -> Result<(), SurfaceError>;

    /// Status line shown while streaming. `None` clears it.
    fn set_indicator(&mut self, _text: Option<&str>) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderNode {
    pub id: NodeId,
    pub html: String,
    pub state: NodeState,
}

#[derive(Debug, Default)]
pub struct HtmlSurface {
    nodes: Vec<RenderNode>,
    next_id: u64,
    indicator: Option<String>,
    indicator_updates: usize,
}

impl HtmlSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[RenderNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&RenderNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Concatenated markup of every node, in mount order.
    pub fn html(&self) -> String {
        self.nodes.iter().map(|node| node.html.as_str()).collect()
    }

    pub fn indicator(&self) -> Option<&str> {
        self.indicator.as_deref()
    }

    pub fn indicator_updates(&self) -> usize {
        self.indicator_updates
    }

    pub fn count(&self, state: NodeState) -> usize {
        self.nodes.iter().filter(|node| node.state == state).count()
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut RenderNode, SurfaceError> {
        self.nodes
            .iter_mut()
            .find(|node| node.id == id)
            .ok_or(SurfaceError::UnknownNode(id))
    }
}

impl RenderSurface for HtmlSurface {
    fn mount(&mut self, html: &str, state: NodeState) -> Result<NodeId, SurfaceError> {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.push(RenderNode {
            id,
            html: html.to_string(),
            state,
        });
        Ok(id)
    }

    fn replace(&mut self, node: NodeId, html: &str) -> Result<(), SurfaceError> {
        let node = self.node_mut(node)?;
        node.html.clear();
        node.html.push_str(html);
        Ok(())
    }

    fn set_state(&mut self, node: NodeId, state: NodeState) -> Result<(), SurfaceError> {
        self.node_mut(node)?.state = state;
        Ok(())
    }

    fn remove(&mut self, node: NodeId) -> Result<(), SurfaceError> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == node)
            .ok_or(SurfaceError::UnknownNode(node))?;
        self.nodes.remove(index);
        Ok(())
    }

    fn set_indicator(&mut self, text: Option<&str>) {
        self.indicator_updates += 1;
        self.indicator = text.map(str::to_string);
    }
}
