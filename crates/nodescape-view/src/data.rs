use std::sync::{Arc, Mutex, MutexGuard};

use nodescape_base::{Guid, RenderConfig};
use nodescape_geometry::{HostUnits, Vec3, ViewingVolume};
use serde::Serialize;

use crate::birds_eye::{BirdsEyeFrame, BirdsEyeSync};
use crate::camera::{CameraPose, OrbitCamera};
use crate::coordinator::{CoordinatorRegistry, ViewingCoordinator};
use crate::edges::EdgeAnalyzer;
use crate::graph::{GraphSnapshot, GraphViewProvider, LineStyle, Rgba};
use crate::input::{InputEvent, InputHandler};
use crate::picking::{PickRequest, PickingState, ShapePickingProcessor};
use crate::shapes::{DetailLevel, ShapeCache, ShapeKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RendererKind {
    Main,
    BirdsEye,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DrawCommand {
    Node {
        id: i64,
        kind: ShapeKind,
        detail: DetailLevel,
        position: Vec3,
        size: Vec3,
        color: Rgba,
        selected: bool,
        label: Option<String>,
    },
    Edge {
        id: i64,
        points: Vec<Vec3>,
        style: LineStyle,
        selected: bool,
    },
    Bounds {
        outline: [Vec3; 4],
        far: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameOutput {
    pub frame: u64,
    pub kind: RendererKind,
    pub revision: u64,
    pub pose: CameraPose,
    pub commands: Vec<DrawCommand>,
    pub pick: Option<PickingState>,
    pub birds_eye: Option<BirdsEyeFrame>,
}

impl FrameOutput {
    pub fn empty(kind: RendererKind, pose: CameraPose) -> Self {
        Self {
            frame: 0,
            kind,
            revision: 0,
            pose,
            commands: Vec::new(),
            pick: None,
            birds_eye: None,
        }
    }

    pub fn node_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Node { .. }))
            .count()
    }

    pub fn edge_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Edge { .. }))
            .count()
    }

    pub fn bounds_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Bounds { .. }))
            .count()
    }
}

pub trait DrawSink: Send {
    fn present(&mut self, frame: &FrameOutput);
}

/// Sink that keeps every presented frame. Clones share the same storage, so
/// one copy can move to the render thread while another is inspected.
#[derive(Clone, Debug, Default)]
pub struct FrameCollector {
    frames: Arc<Mutex<Vec<FrameOutput>>>,
}

impl FrameCollector {
    fn frames(&self) -> MutexGuard<'_, Vec<FrameOutput>> {
        match self.frames.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames().is_empty()
    }

    pub fn latest(&self) -> Option<FrameOutput> {
        self.frames().last().cloned()
    }

    pub fn all(&self) -> Vec<FrameOutput> {
        self.frames().clone()
    }
}

impl DrawSink for FrameCollector {
    fn present(&mut self, frame: &FrameOutput) {
        self.frames().push(frame.clone());
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DrawSink for NullSink {
    fn present(&mut self, _frame: &FrameOutput) {}
}

pub struct GraphicsData {
    pub kind: RendererKind,
    pub view: Guid,
    pub config: RenderConfig,
    pub units: HostUnits,
    pub viewport: Viewport,
    pub camera: OrbitCamera,
    pub provider: Arc<dyn GraphViewProvider>,
    pub snapshot: Arc<GraphSnapshot>,
    pub repaint_requested: bool,
    pub registry: Arc<CoordinatorRegistry>,
    pub coordinator: Option<Arc<ViewingCoordinator>>,
    pub volume: ViewingVolume,
    /// Snapshot indices of nodes that passed culling this frame.
    pub visible_nodes: Vec<usize>,
    pub edges: EdgeAnalyzer,
    pub shapes: ShapeCache,
    pub input: InputHandler,
    pub pending_input: Vec<InputEvent>,
    pub pending_pick: Option<PickRequest>,
    pub picking: ShapePickingProcessor,
    pub last_pick: Option<PickingState>,
    pub birds_eye: BirdsEyeSync,
    pub birds_eye_frame: Option<BirdsEyeFrame>,
    pub output: FrameOutput,
    pub frame: u64,
}

impl GraphicsData {
    pub fn new(
        kind: RendererKind,
        view: Guid,
        config: RenderConfig,
        provider: Arc<dyn GraphViewProvider>,
        registry: Arc<CoordinatorRegistry>,
    ) -> Self {
        let camera = OrbitCamera::new(&config.camera);
        let units = HostUnits::new(config.distance_scale);
        let snapshot = provider.snapshot();
        let picking = ShapePickingProcessor::new(
            config.picking.single_pick_buffer_words,
            config.picking.edge_pick_width,
        );
        let birds_eye = BirdsEyeSync::new(config.camera.vertical_fov_deg, config.birds_eye_fit);
        let edges = EdgeAnalyzer::new(config.edges.clone());
        let output = FrameOutput::empty(kind, camera.pose());
        Self {
            kind,
            view,
            units,
            viewport: Viewport::default(),
            camera,
            provider,
            snapshot,
            repaint_requested: true,
            registry,
            coordinator: None,
            volume: ViewingVolume::default(),
            visible_nodes: Vec::new(),
            edges,
            shapes: ShapeCache::default(),
            input: InputHandler::default(),
            pending_input: Vec::new(),
            pending_pick: None,
            picking,
            last_pick: None,
            birds_eye,
            birds_eye_frame: None,
            output,
            frame: 0,
            config,
        }
    }

    pub fn node_position(&self, index: usize) -> Option<Vec3> {
        let node = self.snapshot.nodes().get(index)?;
        Some(self.units.to_internal(node.x, node.y, node.z))
    }

    pub fn node_size(&self, index: usize) -> Option<Vec3> {
        let node = self.snapshot.nodes().get(index)?;
        Some(Vec3::new(
            self.units.length_to_internal(node.width),
            self.units.length_to_internal(node.height),
            self.units.length_to_internal(node.depth),
        ))
    }

    pub fn shown_node_positions(&self) -> Vec<Vec3> {
        self.snapshot
            .nodes()
            .iter()
            .filter(|node| node.visible)
            .map(|node| self.units.to_internal(node.x, node.y, node.z))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphDocument, NodeView, StaticGraph};

    #[test]
    fn collector_clones_share_frames() {
        let collector = FrameCollector::default();
        let mut sink = collector.clone();
        let frame = FrameOutput::empty(RendererKind::Main, OrbitCamera::default().pose());
        sink.present(&frame);
        sink.present(&frame);
        assert_eq!(collector.len(), 2);
        assert_eq!(collector.latest(), Some(frame));
    }

    #[test]
    fn node_geometry_is_converted_to_internal_units() {
        let mut hidden = NodeView::at(2, 0.0, 0.0, 0.0);
        hidden.visible = false;
        let provider = Arc::new(StaticGraph::new(GraphDocument {
            nodes: vec![NodeView::at(1, 180.0, 360.0, 0.0), hidden],
            edges: Vec::new(),
        }));
        let data = GraphicsData::new(
            RendererKind::Main,
            Guid::new(),
            RenderConfig::default(),
            provider,
            Arc::new(CoordinatorRegistry::new()),
        );
        assert_eq!(data.node_position(0), Some(Vec3::new(1.0, -2.0, 0.0)));
        let size = data.node_size(0).expect("size");
        assert!((size.x - 30.0 / 180.0).abs() < 1.0e-12);
        assert_eq!(data.shown_node_positions().len(), 1);
        assert!(data.node_position(5).is_none());
    }

    #[test]
    fn viewport_guards_degenerate_sizes() {
        let viewport = Viewport::new(0.0, 0.0);
        assert_eq!(viewport.aspect(), 1.0);
    }
}
