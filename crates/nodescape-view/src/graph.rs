use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use nodescape_base::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    #[default]
    Ellipse,
    Rectangle,
    Triangle,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Default for Rgba {
    fn default() -> Self {
        Self([200, 200, 200, 255])
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeLabel {
    pub text: String,
    pub color: Rgba,
    pub font: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeView {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub shape: NodeShape,
    pub color: Rgba,
    pub selected: bool,
    pub visible: bool,
    pub label: Option<NodeLabel>,
}

impl Default for NodeView {
    fn default() -> Self {
        Self {
            id: 0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            width: 30.0,
            height: 30.0,
            depth: 30.0,
            shape: NodeShape::Ellipse,
            color: Rgba::default(),
            selected: false,
            visible: true,
            label: None,
        }
    }
}

impl NodeView {
    pub fn at(id: i64, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            x,
            y,
            z,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeView {
    pub id: i64,
    pub source: i64,
    pub target: i64,
    pub style: LineStyle,
    pub selected: bool,
    pub visible: bool,
}

impl Default for EdgeView {
    fn default() -> Self {
        Self {
            id: 0,
            source: 0,
            target: 0,
            style: LineStyle::Solid,
            selected: false,
            visible: true,
        }
    }
}

impl EdgeView {
    pub fn between(id: i64, source: i64, target: i64) -> Self {
        Self {
            id,
            source,
            target,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GraphSnapshot {
    revision: u64,
    nodes: Vec<NodeView>,
    edges: Vec<EdgeView>,
    node_index: HashMap<i64, usize>,
}

impl GraphSnapshot {
    pub fn new(revision: u64, nodes: Vec<NodeView>, edges: Vec<EdgeView>) -> Self {
        let node_index = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id, idx))
            .collect();
        Self {
            revision,
            nodes,
            edges,
            node_index,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn nodes(&self) -> &[NodeView] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeView] {
        &self.edges
    }

    pub fn node_index(&self, id: i64) -> Option<usize> {
        self.node_index.get(&id).copied()
    }

    pub fn node(&self, id: i64) -> Option<&NodeView> {
        self.node_index(id).map(|idx| &self.nodes[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub trait GraphViewProvider: Send + Sync {
    fn snapshot(&self) -> Arc<GraphSnapshot>;

    /// Bumped on every host mutation; polled to decide when to repaint.
    fn revision(&self) -> u64;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDocument {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

impl GraphDocument {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

pub struct StaticGraph {
    current: RwLock<Arc<GraphSnapshot>>,
    revision: AtomicU64,
}

impl StaticGraph {
    pub fn new(document: GraphDocument) -> Self {
        Self {
            current: RwLock::new(Arc::new(GraphSnapshot::new(1, document.nodes, document.edges))),
            revision: AtomicU64::new(1),
        }
    }

    pub fn replace(&self, document: GraphDocument) {
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(GraphSnapshot::new(revision, document.nodes, document.edges));
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

impl GraphViewProvider for StaticGraph {
    fn snapshot(&self) -> Arc<GraphSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }
}
