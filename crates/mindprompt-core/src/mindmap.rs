//! Mind Map Graph
//!
//! The editable node graph held by the editor. Nodes point at their parent;
//! a node without a parent is a root. The graph is never persisted, it only
//! travels to the server as part of a prompt-generation request.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Horizontal offset of a new sibling relative to the selected node
pub const SIBLING_OFFSET_X: f64 = 200.0;

/// Vertical offset of a new child relative to its parent
pub const CHILD_OFFSET_Y: f64 = 100.0;

/// Cosmetic colours of a node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStyle {
    #[serde(alias = "bg")]
    pub background: String,
    #[serde(alias = "text")]
    pub foreground: String,
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self {
            background: "bg-blue-500".into(),
            foreground: "text-white".into(),
        }
    }
}

/// A single node of the mind map
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapNode {
    /// Unique within one editing session
    pub id: String,

    /// Free-form label
    pub text: String,

    /// Canvas position
    pub x: f64,
    pub y: f64,

    /// Depth recorded at creation time. Not recomputed when the graph changes.
    #[serde(default)]
    pub level: u32,

    /// `None` marks a root
    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub style: NodeStyle,
}

impl MindMapNode {
    /// Create a root node
    pub fn root(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: new_node_id(),
            text: text.into(),
            x,
            y,
            level: 0,
            parent_id: None,
            style: NodeStyle::default(),
        }
    }

    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

fn new_node_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Mind map graph
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MindMap {
    nodes: Vec<MindMapNode>,
}

impl MindMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map holding a single root node
    pub fn with_root(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            nodes: vec![MindMapNode::root(text, x, y)],
        }
    }

    /// Wrap nodes received from a client
    pub const fn from_nodes(nodes: Vec<MindMapNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[MindMapNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MindMapNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut MindMapNode> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| CoreError::NodeNotFound(id.to_string()))
    }

    /// Nodes without a parent, in insertion order
    pub fn roots(&self) -> impl Iterator<Item = &MindMapNode> {
        self.nodes.iter().filter(|n| n.is_root())
    }

    /// Direct children of `id`, in insertion order
    pub fn children<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a MindMapNode> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.parent_id.as_deref() == Some(id))
    }

    /// Nodes whose parent reference points at a node that no longer exists
    pub fn orphans(&self) -> Vec<&MindMapNode> {
        self.nodes
            .iter()
            .filter(|n| {
                n.parent_id
                    .as_deref()
                    .is_some_and(|parent| self.get(parent).is_none())
            })
            .collect()
    }

    /// Add a node next to `of`, sharing its parent and level. Returns the new id.
    pub fn add_sibling(&mut self, of: &str) -> Result<String> {
        let anchor = self
            .get(of)
            .ok_or_else(|| CoreError::NodeNotFound(of.to_string()))?;

        let node = MindMapNode {
            id: new_node_id(),
            text: "Sibling Node".into(),
            x: anchor.x + SIBLING_OFFSET_X,
            y: anchor.y,
            level: anchor.level,
            parent_id: anchor.parent_id.clone(),
            style: NodeStyle::default(),
        };
        let id = node.id.clone();
        self.nodes.push(node);
        Ok(id)
    }

    /// Add a node under `of`, one level deeper. Returns the new id.
    pub fn add_child(&mut self, of: &str) -> Result<String> {
        let parent = self
            .get(of)
            .ok_or_else(|| CoreError::NodeNotFound(of.to_string()))?;

        let node = MindMapNode {
            id: new_node_id(),
            text: "Child Node".into(),
            x: parent.x,
            y: parent.y + CHILD_OFFSET_Y,
            level: parent.level + 1,
            parent_id: Some(parent.id.clone()),
            style: NodeStyle::default(),
        };
        let id = node.id.clone();
        self.nodes.push(node);
        Ok(id)
    }

    /// Remove a node together with its direct children.
    ///
    /// Grandchildren are kept and keep pointing at the removed child, which
    /// leaves them out of the outline. Removing the last node is refused.
    pub fn remove(&mut self, id: &str) -> Result<Vec<MindMapNode>> {
        if self.get(id).is_none() {
            return Err(CoreError::NodeNotFound(id.to_string()));
        }
        if self.nodes.len() == 1 {
            return Err(CoreError::InvalidOperation(
                "Cannot delete the last node".into(),
            ));
        }

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.nodes)
            .into_iter()
            .partition(|n| n.id == id || n.parent_id.as_deref() == Some(id));
        self.nodes = kept;
        Ok(removed)
    }

    pub fn set_text(&mut self, id: &str, text: impl Into<String>) -> Result<()> {
        self.get_mut(id)?.text = text.into();
        Ok(())
    }

    pub fn set_style(&mut self, id: &str, style: NodeStyle) -> Result<()> {
        self.get_mut(id)?.style = style;
        Ok(())
    }

    pub fn move_to(&mut self, id: &str, x: f64, y: f64) -> Result<()> {
        let node = self.get_mut(id)?;
        node.x = x;
        node.y = y;
        Ok(())
    }

    /// Render the graph as an indented outline.
    ///
    /// Each root starts a block with its bare text; descendants follow as
    /// `- text` lines indented two spaces per depth. Blocks are separated by
    /// a blank line. Nodes not reachable from a root are left out.
    pub fn outline(&self) -> String {
        let mut visited = HashSet::new();
        let blocks: Vec<String> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_root())
            .map(|(idx, root)| {
                visited.insert(idx);
                let mut block = format!("{}\n", root.text);
                self.write_children(&root.id, 1, &mut visited, &mut block);
                block
            })
            .collect();
        blocks.join("\n")
    }

    fn write_children(
        &self,
        parent: &str,
        depth: usize,
        visited: &mut HashSet<usize>,
        out: &mut String,
    ) {
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.parent_id.as_deref() != Some(parent) || !visited.insert(idx) {
                continue;
            }
            out.push_str(&"  ".repeat(depth));
            out.push_str("- ");
            out.push_str(&node.text);
            out.push('\n');
            self.write_children(&node.id, depth + 1, visited, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, text: &str, parent: Option<&str>) -> MindMapNode {
        MindMapNode {
            id: id.into(),
            text: text.into(),
            x: 0.0,
            y: 0.0,
            level: 0,
            parent_id: parent.map(Into::into),
            style: NodeStyle::default(),
        }
    }

    #[test]
    fn test_outline_three_levels() {
        let map = MindMap::from_nodes(vec![
            node("1", "Launch plan", None),
            node("2", "Marketing", Some("1")),
            node("3", "Social posts", Some("2")),
        ]);

        assert_eq!(map.outline(), "Launch plan\n  - Marketing\n    - Social posts\n");
    }

    #[test]
    fn test_outline_multiple_roots() {
        let map = MindMap::from_nodes(vec![
            node("a", "First", None),
            node("b", "Second", None),
            node("c", "Under first", Some("a")),
        ]);

        assert_eq!(map.outline(), "First\n  - Under first\n\nSecond\n");
    }

    #[test]
    fn test_outline_skips_dangling_parent() {
        let map = MindMap::from_nodes(vec![
            node("1", "Root", None),
            node("2", "Lost", Some("missing")),
        ]);

        assert_eq!(map.outline(), "Root\n");
        assert_eq!(map.orphans().len(), 1);
    }

    #[test]
    fn test_outline_survives_duplicate_ids() {
        let map = MindMap::from_nodes(vec![node("x", "Root", None), node("x", "Echo", Some("x"))]);

        assert_eq!(map.outline(), "Root\n  - Echo\n");
    }

    #[test]
    fn test_add_child_and_sibling() {
        let mut map = MindMap::with_root("Root Idea", 100.0, 50.0);
        let root = map.nodes()[0].id.clone();

        let child = map.add_child(&root).unwrap();
        let sibling = map.add_sibling(&child).unwrap();

        let child = map.get(&child).unwrap();
        assert_eq!(child.level, 1);
        assert_eq!(child.parent_id.as_deref(), Some(root.as_str()));
        assert!((child.y - 150.0).abs() < f64::EPSILON);

        let sibling = map.get(&sibling).unwrap();
        assert_eq!(sibling.level, 1);
        assert_eq!(sibling.parent_id.as_deref(), Some(root.as_str()));
        assert!((sibling.x - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sibling_of_root_is_root() {
        let mut map = MindMap::with_root("Root Idea", 0.0, 0.0);
        let root = map.nodes()[0].id.clone();

        map.add_sibling(&root).unwrap();
        assert_eq!(map.roots().count(), 2);
    }

    #[test]
    fn test_remove_is_one_level_deep() {
        let mut map = MindMap::from_nodes(vec![
            node("1", "Root", None),
            node("2", "Child", Some("1")),
            node("3", "Grandchild", Some("2")),
            node("4", "Other", Some("1")),
        ]);

        let removed = map.remove("2").unwrap();

        assert_eq!(removed.len(), 1);
        let ids: Vec<_> = map.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
        assert_eq!(map.get("3").unwrap().parent_id.as_deref(), Some("2"));
        assert_eq!(map.outline(), "Root\n  - Other\n");
    }

    #[test]
    fn test_remove_takes_direct_children() {
        let mut map = MindMap::from_nodes(vec![
            node("1", "Root", None),
            node("2", "Child", Some("1")),
            node("3", "Grandchild", Some("2")),
            node("5", "Second root", None),
        ]);

        let removed = map.remove("1").unwrap();

        assert_eq!(removed.len(), 2);
        assert_eq!(map.len(), 2);
        assert!(map.get("3").is_some());
    }

    #[test]
    fn test_remove_last_node_refused() {
        let mut map = MindMap::with_root("Only", 0.0, 0.0);
        let id = map.nodes()[0].id.clone();

        assert!(matches!(map.remove(&id), Err(CoreError::InvalidOperation(_))));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_edit_operations() {
        let mut map = MindMap::with_root("Root", 0.0, 0.0);
        let id = map.nodes()[0].id.clone();

        map.set_text(&id, "Renamed").unwrap();
        map.move_to(&id, 12.5, 40.0).unwrap();
        map.set_style(
            &id,
            NodeStyle {
                background: "bg-green-500".into(),
                foreground: "text-black".into(),
            },
        )
        .unwrap();

        let node = map.get(&id).unwrap();
        assert_eq!(node.text, "Renamed");
        assert!((node.x - 12.5).abs() < f64::EPSILON);
        assert_eq!(node.style.background, "bg-green-500");
        assert!(matches!(
            map.set_text("nope", "x"),
            Err(CoreError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_deserialize_client_nodes() {
        let map: MindMap = serde_json::from_str(
            r#"[{"id":"1","text":"Root Idea","x":420,"y":300,"level":0,"parentId":null,
                 "style":{"bg":"bg-blue-500","text":"text-white"}}]"#,
        )
        .unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map.nodes()[0].style, NodeStyle::default());
    }
}
