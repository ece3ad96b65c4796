//! Editor Session
//!
//! Client-side state behind the canvas: the mind map and the current
//! selection. Nothing here is persisted.

use mindprompt_core::{MindMap, MindMapNode, NodeStyle};

use crate::error::{ClientError, Result};

/// Label of the node every session starts with
pub const ROOT_TEXT: &str = "Root Idea";

/// Default root position, centred on a 1200x650 canvas
pub const ROOT_POSITION: (f64, f64) = (520.0, 300.0);

#[derive(Clone, Debug)]
pub struct EditorSession {
    map: MindMap,
    selected: Option<String>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    /// Fresh session with the root selected
    pub fn new() -> Self {
        Self::with_root_at(ROOT_POSITION.0, ROOT_POSITION.1)
    }

    pub fn with_root_at(x: f64, y: f64) -> Self {
        let map = MindMap::with_root(ROOT_TEXT, x, y);
        let selected = map.nodes().first().map(|n| n.id.clone());
        Self { map, selected }
    }

    pub const fn map(&self) -> &MindMap {
        &self.map
    }

    pub fn selected(&self) -> Option<&MindMapNode> {
        self.selected.as_deref().and_then(|id| self.map.get(id))
    }

    pub fn select(&mut self, id: &str) -> Result<()> {
        if self.map.get(id).is_none() {
            return Err(mindprompt_core::CoreError::NodeNotFound(id.to_string()).into());
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    fn selected_id(&self) -> Result<String> {
        self.selected
            .clone()
            .ok_or(ClientError::NothingSelected)
    }

    /// Add a node beside the selection. The selection does not move.
    pub fn add_sibling(&mut self) -> Result<String> {
        let anchor = self.selected_id()?;
        Ok(self.map.add_sibling(&anchor)?)
    }

    /// Add a node under the selection. The selection does not move.
    pub fn add_child(&mut self) -> Result<String> {
        let parent = self.selected_id()?;
        Ok(self.map.add_child(&parent)?)
    }

    pub fn rename(&mut self, id: &str, text: impl Into<String>) -> Result<()> {
        Ok(self.map.set_text(id, text)?)
    }

    /// Restyle the selected node
    pub fn restyle(&mut self, style: NodeStyle) -> Result<()> {
        let id = self.selected_id()?;
        Ok(self.map.set_style(&id, style)?)
    }

    /// Drag a node to a new canvas position
    pub fn move_node(&mut self, id: &str, x: f64, y: f64) -> Result<()> {
        Ok(self.map.move_to(id, x, y)?)
    }

    /// Delete the selected node and its direct children
    pub fn delete_selected(&mut self) -> Result<Vec<MindMapNode>> {
        let id = self.selected_id()?;
        let removed = self.map.remove(&id)?;
        self.selected = None;
        tracing::debug!(node_id = %id, removed = removed.len(), "Deleted node");
        Ok(removed)
    }

    /// The map ready for prompt generation
    pub fn snapshot(&self) -> MindMap {
        self.map.clone()
    }
}
