use std::sync::Arc;

use nodescape_geometry::{Vec3, horizontal_fov_deg};
use tracing::{debug, warn};

use crate::coordinator::MainProjection;
use crate::data::{DrawCommand, FrameOutput, GraphicsData, RendererKind, Viewport};
use crate::fit::fit_nodes;
use crate::input::InputEvent;
use crate::picking::{PickScene, PickableEdge, PickableNode};
use crate::selection::SoftwareSelectionPass;
use crate::shapes::{DetailLevel, ShapeKind, ShapeMesh};

pub trait RenderProcedure: Send {
    fn name(&self) -> &'static str;

    fn initialize(&mut self, _data: &mut GraphicsData) {}

    fn execute(&mut self, data: &mut GraphicsData);

    fn dispose(&mut self, _data: &mut GraphicsData) {}
}

pub struct GraphicsConfiguration {
    kind: RendererKind,
    procedures: Vec<Box<dyn RenderProcedure>>,
}

impl GraphicsConfiguration {
    pub fn builder(kind: RendererKind) -> GraphicsConfigurationBuilder {
        GraphicsConfigurationBuilder {
            kind,
            procedures: Vec::new(),
        }
    }

    pub fn main() -> Self {
        Self::builder(RendererKind::Main)
            .with(InputProcedure)
            .with(SnapshotProcedure)
            .with(MainCoordinationProcedure)
            .with(FrustumProcedure)
            .with(EdgeAnalysisProcedure)
            .with(PickingProcedure)
            .with(SceneOutputProcedure { bounds: false })
            .build()
    }

    pub fn birds_eye() -> Self {
        Self::builder(RendererKind::BirdsEye)
            .with(SnapshotProcedure)
            .with(BirdsEyeCoordinationProcedure)
            .with(FrustumProcedure)
            .with(EdgeAnalysisProcedure)
            .with(SceneOutputProcedure { bounds: true })
            .build()
    }

    pub fn for_kind(kind: RendererKind) -> Self {
        match kind {
            RendererKind::Main => Self::main(),
            RendererKind::BirdsEye => Self::birds_eye(),
        }
    }

    pub fn kind(&self) -> RendererKind {
        self.kind
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.procedures.iter().map(|p| p.name()).collect()
    }

    pub fn initialize(&mut self, data: &mut GraphicsData) {
        for procedure in &mut self.procedures {
            procedure.initialize(data);
        }
        debug!(kind = ?self.kind, procedures = ?self.names(), "graphics configuration initialized");
    }

    pub fn execute(&mut self, data: &mut GraphicsData) {
        for procedure in &mut self.procedures {
            procedure.execute(data);
        }
    }

    pub fn dispose(&mut self, data: &mut GraphicsData) {
        for procedure in self.procedures.iter_mut().rev() {
            procedure.dispose(data);
        }
    }
}

pub struct GraphicsConfigurationBuilder {
    kind: RendererKind,
    procedures: Vec<Box<dyn RenderProcedure>>,
}

impl GraphicsConfigurationBuilder {
    pub fn with(mut self, procedure: impl RenderProcedure + 'static) -> Self {
        self.procedures.push(Box::new(procedure));
        self
    }

    pub fn build(self) -> GraphicsConfiguration {
        GraphicsConfiguration {
            kind: self.kind,
            procedures: self.procedures,
        }
    }
}

pub struct InputProcedure;

impl RenderProcedure for InputProcedure {
    fn name(&self) -> &'static str {
        "input"
    }

    fn initialize(&mut self, data: &mut GraphicsData) {
        fit_main_view(data);
    }

    fn execute(&mut self, data: &mut GraphicsData) {
        for event in std::mem::take(&mut data.pending_input) {
            match event {
                InputEvent::Resize { width, height } => {
                    data.viewport = Viewport::new(width, height);
                    continue;
                }
                InputEvent::FitView => {
                    fit_main_view(data);
                    continue;
                }
                _ => {}
            }
            if let Some(request) =
                data.input
                    .handle(&event, &mut data.camera, &data.config.camera, &data.config.picking)
            {
                data.pending_pick = Some(request);
            }
        }
    }
}

fn fit_main_view(data: &mut GraphicsData) {
    let nodes = data.shown_node_positions();
    fit_nodes(
        &mut data.camera,
        &nodes,
        data.config.camera.vertical_fov_deg,
        data.config.main_fit,
    );
}

pub struct SnapshotProcedure;

impl RenderProcedure for SnapshotProcedure {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn initialize(&mut self, data: &mut GraphicsData) {
        data.shapes.initialize();
    }

    fn execute(&mut self, data: &mut GraphicsData) {
        if data.repaint_requested || data.provider.revision() != data.snapshot.revision() {
            data.snapshot = data.provider.snapshot();
            data.repaint_requested = false;
            debug!(revision = data.snapshot.revision(), "snapshot refreshed");
        }
    }

    fn dispose(&mut self, data: &mut GraphicsData) {
        data.shapes.invalidate();
    }
}

pub struct MainCoordinationProcedure;

impl RenderProcedure for MainCoordinationProcedure {
    fn name(&self) -> &'static str {
        "main-coordination"
    }

    fn initialize(&mut self, data: &mut GraphicsData) {
        data.coordinator = Some(data.registry.claim_main(data.view));
    }

    fn execute(&mut self, data: &mut GraphicsData) {
        let Some(coordinator) = data.coordinator.as_ref() else {
            return;
        };
        let projection = MainProjection {
            vertical_fov_deg: data.config.camera.vertical_fov_deg,
            aspect: data.viewport.aspect(),
        };
        if let Some(pose) = coordinator.sync_main(data.camera.pose(), projection) {
            debug!(view = %data.view, "adopting main pose from bird's-eye bounds");
            data.camera.set_pose(pose);
        }
    }

    fn dispose(&mut self, data: &mut GraphicsData) {
        if data.coordinator.take().is_some() {
            data.registry.unlink_main(data.view);
        }
    }
}

pub struct BirdsEyeCoordinationProcedure;

impl RenderProcedure for BirdsEyeCoordinationProcedure {
    fn name(&self) -> &'static str {
        "birds-eye-coordination"
    }

    fn initialize(&mut self, data: &mut GraphicsData) {
        data.coordinator = Some(data.registry.claim_birds_eye(data.view));
    }

    fn execute(&mut self, data: &mut GraphicsData) {
        let nodes = data.shown_node_positions();
        let frame = data
            .birds_eye
            .step(data.coordinator.as_deref(), &mut data.camera, &nodes);
        data.birds_eye_frame = Some(frame);
    }

    fn dispose(&mut self, data: &mut GraphicsData) {
        if data.coordinator.take().is_some() {
            data.registry.unlink_birds_eye(data.view);
        }
    }
}

pub struct FrustumProcedure;

impl RenderProcedure for FrustumProcedure {
    fn name(&self) -> &'static str {
        "frustum"
    }

    fn execute(&mut self, data: &mut GraphicsData) {
        let camera = &data.config.camera;
        let hfov = horizontal_fov_deg(camera.vertical_fov_deg, data.viewport.aspect());
        data.volume.calculate(
            data.camera.position(),
            data.camera.direction(),
            data.camera.up(),
            camera.z_near,
            camera.z_far,
            camera.vertical_fov_deg,
            hfov,
        );
        let tolerance = data.config.visibility_tolerance;
        let volume = data.volume;
        let units = data.units;
        data.visible_nodes = data
            .snapshot
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, node)| node.visible)
            .filter(|(_, node)| {
                volume.inside_with_tolerance(units.to_internal(node.x, node.y, node.z), tolerance)
            })
            .map(|(index, _)| index)
            .collect();
    }
}

pub struct EdgeAnalysisProcedure;

impl RenderProcedure for EdgeAnalysisProcedure {
    fn name(&self) -> &'static str {
        "edge-analysis"
    }

    fn execute(&mut self, data: &mut GraphicsData) {
        let snapshot = Arc::clone(&data.snapshot);
        data.edges.analyze(&snapshot, data.units);
    }
}

pub struct PickingProcedure;

impl RenderProcedure for PickingProcedure {
    fn name(&self) -> &'static str {
        "picking"
    }

    fn execute(&mut self, data: &mut GraphicsData) {
        let Some(request) = data.pending_pick.take() else {
            return;
        };

        let mut meshes: Vec<(i64, Vec3, Vec3, Arc<ShapeMesh>)> = Vec::new();
        for &index in &data.visible_nodes {
            let (Some(node), Some(position), Some(size)) = (
                data.snapshot.nodes().get(index),
                data.node_position(index),
                data.node_size(index),
            ) else {
                warn!(
                    index,
                    revision = data.snapshot.revision(),
                    "visible node missing from snapshot, skipping pick"
                );
                continue;
            };
            let Some(mesh) = data.shapes.get(ShapeKind::from(node.shape), DetailLevel::Low) else {
                warn!(node = node.id, "shape cache not initialized, node not pickable");
                continue;
            };
            meshes.push((node.id, position, size, mesh));
        }
        let scene = PickScene {
            nodes: meshes
                .iter()
                .map(|(id, position, size, mesh)| PickableNode {
                    id: *id,
                    position: *position,
                    size: *size,
                    mesh: mesh.as_ref(),
                })
                .collect(),
            edges: data
                .edges
                .records()
                .iter()
                .filter(|record| record.visible && record.points.len() >= 2)
                .map(|record| PickableEdge {
                    id: record.edge_id,
                    points: &record.points,
                })
                .collect(),
        };

        let camera = &data.config.camera;
        let mut pass = SoftwareSelectionPass::new(
            &data.camera.pose(),
            camera.vertical_fov_deg,
            camera.z_near,
            camera.z_far,
            data.viewport.width,
            data.viewport.height,
        );
        let state = data.picking.pick(&mut pass, &scene, request).clone();
        data.last_pick = Some(state);
    }
}

pub struct SceneOutputProcedure {
    pub bounds: bool,
}

impl RenderProcedure for SceneOutputProcedure {
    fn name(&self) -> &'static str {
        "scene-output"
    }

    fn execute(&mut self, data: &mut GraphicsData) {
        let mut commands = Vec::new();
        let eye = data.camera.position();
        let focus = data.camera.distance();
        for &index in &data.visible_nodes {
            let (Some(node), Some(position), Some(size)) = (
                data.snapshot.nodes().get(index),
                data.node_position(index),
                data.node_size(index),
            ) else {
                warn!(
                    index,
                    revision = data.snapshot.revision(),
                    "visible node missing from snapshot, not drawn"
                );
                continue;
            };
            let detail = if position.distance(eye) <= focus {
                DetailLevel::High
            } else {
                DetailLevel::Low
            };
            commands.push(DrawCommand::Node {
                id: node.id,
                kind: ShapeKind::from(node.shape),
                detail,
                position,
                size,
                color: node.color,
                selected: node.selected,
                label: node.label.as_ref().map(|label| label.text.clone()),
            });
        }
        for record in data.edges.records() {
            if !record.visible || record.points.is_empty() {
                continue;
            }
            commands.push(DrawCommand::Edge {
                id: record.edge_id,
                points: record.points.clone(),
                style: record.style,
                selected: record.selected,
            });
        }
        if let (true, Some(frame)) = (self.bounds, data.birds_eye_frame) {
            if let Some(near) = frame.near_bounds {
                commands.push(DrawCommand::Bounds {
                    outline: near.outline(),
                    far: false,
                });
            }
            if let Some(far) = frame.far_bounds {
                commands.push(DrawCommand::Bounds {
                    outline: far.outline(),
                    far: true,
                });
            }
        }

        data.output = FrameOutput {
            frame: data.frame,
            kind: data.kind,
            revision: data.snapshot.revision(),
            pose: data.camera.pose(),
            commands,
            pick: data.last_pick.take(),
            birds_eye: data.birds_eye_frame,
        };
    }
}
