use nodescape_base::FitConfig;
use nodescape_geometry::{Quadrilateral, Vec3};
use serde::Serialize;
use tracing::debug;

use crate::camera::{CameraPose, OrbitCamera};
use crate::coordinator::{CoordinatorState, MainProjection, ViewingCoordinator};
use crate::fit::fit_nodes;

/// Depth of the far slice as a multiple of the main camera's distance.
pub const FAR_SLICE_FACTOR: f64 = 2.0;

const FALLBACK_PROJECTION: MainProjection = MainProjection {
    vertical_fov_deg: 45.0,
    aspect: 1.0,
};

pub fn frustum_slice(pose: &CameraPose, depth: f64, projection: MainProjection) -> Quadrilateral {
    let half_height = depth * (projection.vertical_fov_deg * 0.5).to_radians().tan();
    let half_width = half_height * projection.aspect;
    let center = pose.position + pose.direction() * depth;
    Quadrilateral::from_basis(center, pose.right(), pose.true_up(), half_width, half_height)
}

pub fn near_bounds(pose: &CameraPose, projection: MainProjection) -> Quadrilateral {
    frustum_slice(pose, pose.distance(), projection)
}

pub fn far_bounds(pose: &CameraPose, projection: MainProjection) -> Quadrilateral {
    frustum_slice(pose, pose.distance() * FAR_SLICE_FACTOR, projection)
}

/// Main pose implied by dragging its near slice from `previous` to `dragged`.
///
/// Only the part of the drag orthogonal to the view direction is applied, to
/// position and target alike, so the distance and orientation are kept.
pub fn reconcile_main_pose(pose: &CameraPose, previous: &Quadrilateral, dragged: &Quadrilateral) -> CameraPose {
    let delta = dragged.center() - previous.center();
    let direction = pose.direction();
    let perpendicular = delta - direction * delta.dot(direction);
    CameraPose {
        position: pose.position + perpendicular,
        target: pose.target + perpendicular,
        up: pose.up,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CoordinationStep {
    FreeRun,
    Seeded,
    Reconciled,
    Recomputed,
    Unchanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BirdsEyeFrame {
    pub step: CoordinationStep,
    pub near_bounds: Option<Quadrilateral>,
    pub far_bounds: Option<Quadrilateral>,
}

#[derive(Clone, Debug)]
pub struct BirdsEyeSync {
    dragged_bounds: Option<Quadrilateral>,
    vertical_fov_deg: f64,
    fit: FitConfig,
}

impl BirdsEyeSync {
    pub fn new(vertical_fov_deg: f64, fit: FitConfig) -> Self {
        Self {
            dragged_bounds: None,
            vertical_fov_deg,
            fit,
        }
    }

    /// Reports a manual drag of the near bounds box. The latest drag wins.
    pub fn drag_bounds(&mut self, bounds: Quadrilateral) {
        self.dragged_bounds = Some(bounds);
    }

    pub fn has_pending_drag(&self) -> bool {
        self.dragged_bounds.is_some()
    }

    pub fn step(
        &mut self,
        coordinator: Option<&ViewingCoordinator>,
        camera: &mut OrbitCamera,
        nodes: &[Vec3],
    ) -> BirdsEyeFrame {
        let (frame, main_pose) = match coordinator {
            Some(coordinator) => coordinator.update(|state| self.coordinate(state)),
            None => (free_run(), None),
        };

        if let Some(main) = main_pose {
            camera.look_from(camera.target(), main.direction(), camera.distance(), main.up);
        }
        fit_nodes(camera, nodes, self.vertical_fov_deg, self.fit);
        debug!(step = ?frame.step, distance = camera.distance(), "bird's-eye step");
        frame
    }

    fn coordinate(&mut self, state: &mut CoordinatorState) -> (BirdsEyeFrame, Option<CameraPose>) {
        if !state.main_claimed || !state.initial_main_camera_initialized {
            return (free_run(), None);
        }
        let Some(pose) = state.main_pose else {
            return (free_run(), None);
        };
        let projection = state.projection.unwrap_or(FALLBACK_PROJECTION);

        let step = if !state.initial_bounds_matched {
            state.set_near_bounds(near_bounds(&pose, projection));
            state.set_far_bounds(far_bounds(&pose, projection));
            state.initial_bounds_matched = true;
            state.main_camera_moved = false;
            state.suggest_recalculate_bounds = false;
            CoordinationStep::Seeded
        } else if let Some(dragged) = self.dragged_bounds.take() {
            let previous = state
                .near_bounds
                .unwrap_or_else(|| near_bounds(&pose, projection));
            let reconciled = reconcile_main_pose(&pose, &previous, &dragged);
            state.set_near_bounds(dragged);
            state.set_far_bounds(far_bounds(&reconciled, projection));
            state.request_main_pose(reconciled);
            state.main_camera_moved = false;
            state.suggest_recalculate_bounds = false;
            CoordinationStep::Reconciled
        } else if state.main_camera_moved || state.suggest_recalculate_bounds {
            state.set_near_bounds(near_bounds(&pose, projection));
            state.set_far_bounds(far_bounds(&pose, projection));
            state.main_camera_moved = false;
            state.suggest_recalculate_bounds = false;
            CoordinationStep::Recomputed
        } else {
            CoordinationStep::Unchanged
        };

        let frame = BirdsEyeFrame {
            step,
            near_bounds: state.near_bounds,
            far_bounds: state.far_bounds,
        };
        (frame, state.main_pose)
    }
}

fn free_run() -> BirdsEyeFrame {
    BirdsEyeFrame {
        step: CoordinationStep::FreeRun,
        near_bounds: None,
        far_bounds: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorRegistry;
    use nodescape_base::{CameraConfig, Guid};

    fn main_pose() -> CameraPose {
        CameraPose {
            position: Vec3::new(0.0, 0.0, 4.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }

    fn projection() -> MainProjection {
        MainProjection {
            vertical_fov_deg: 90.0,
            aspect: 2.0,
        }
    }

    fn sync() -> BirdsEyeSync {
        BirdsEyeSync::new(45.0, FitConfig::default())
    }

    fn nodes() -> Vec<Vec3> {
        vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)]
    }

    #[test]
    fn slice_matches_field_of_view() {
        let quad = near_bounds(&main_pose(), projection());
        assert!(quad.center().distance(Vec3::ZERO) < 1.0e-12);
        assert!((quad.height() - 8.0).abs() < 1.0e-9);
        assert!((quad.width() - 16.0).abs() < 1.0e-9);
        let far = far_bounds(&main_pose(), projection());
        assert!(far.center().distance(Vec3::new(0.0, 0.0, -4.0)) < 1.0e-12);
        assert!((far.height() - 16.0).abs() < 1.0e-9);
    }

    #[test]
    fn reconciliation_drops_the_depth_component() {
        let pose = main_pose();
        let previous = near_bounds(&pose, projection());
        let dragged = previous.translated(Vec3::new(1.0, 2.0, -3.0));
        let moved = reconcile_main_pose(&pose, &previous, &dragged);
        assert!(moved.position.distance(Vec3::new(1.0, 2.0, 4.0)) < 1.0e-12);
        assert!(moved.target.distance(Vec3::new(1.0, 2.0, 0.0)) < 1.0e-12);
        assert!((moved.distance() - pose.distance()).abs() < 1.0e-12);
    }

    #[test]
    fn free_runs_without_a_main_side() {
        let registry = CoordinatorRegistry::new();
        let view = Guid::new();
        let coordinator = registry.claim_birds_eye(view);
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        let frame = sync().step(Some(&coordinator), &mut camera, &nodes());
        assert_eq!(frame.step, CoordinationStep::FreeRun);
        assert!(coordinator.snapshot().near_bounds.is_none());
        assert_eq!(camera.target(), Vec3::ZERO);

        let frame = sync().step(None, &mut camera, &nodes());
        assert_eq!(frame.step, CoordinationStep::FreeRun);
    }

    #[test]
    fn protocol_seeds_once_then_follows() {
        let registry = CoordinatorRegistry::new();
        let view = Guid::new();
        let main = registry.claim_main(view);
        let coordinator = registry.claim_birds_eye(view);
        main.publish_main_projection(projection());
        main.publish_main_camera(main_pose());

        let mut birds_eye = sync();
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        let seeded = birds_eye.step(Some(&coordinator), &mut camera, &nodes());
        assert_eq!(seeded.step, CoordinationStep::Seeded);
        assert!(seeded.near_bounds.is_some() && seeded.far_bounds.is_some());
        let state = coordinator.snapshot();
        assert!(state.initial_bounds_matched);
        assert!(!state.main_camera_moved);

        let idle = birds_eye.step(Some(&coordinator), &mut camera, &nodes());
        assert_eq!(idle.step, CoordinationStep::Unchanged);

        let mut turned = main_pose();
        turned.position = Vec3::new(4.0, 0.0, 0.0);
        main.publish_main_camera(turned);
        let follow = birds_eye.step(Some(&coordinator), &mut camera, &nodes());
        assert_eq!(follow.step, CoordinationStep::Recomputed);
        assert!(coordinator.snapshot().initial_bounds_matched);
        assert!(camera.direction().distance(turned.direction()) < 1.0e-9);
    }

    #[test]
    fn manual_drag_wins_over_main_motion() {
        let registry = CoordinatorRegistry::new();
        let view = Guid::new();
        let main = registry.claim_main(view);
        let coordinator = registry.claim_birds_eye(view);
        main.publish_main_projection(projection());
        main.publish_main_camera(main_pose());

        let mut birds_eye = sync();
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        birds_eye.step(Some(&coordinator), &mut camera, &nodes());

        let previous = coordinator.snapshot().near_bounds.expect("seeded bounds");
        birds_eye.drag_bounds(previous.translated(Vec3::new(0.5, 0.0, 0.0)));
        let mut nudged = main_pose();
        nudged.position.z = 5.0;
        main.publish_main_camera(nudged);

        let frame = birds_eye.step(Some(&coordinator), &mut camera, &nodes());
        assert_eq!(frame.step, CoordinationStep::Reconciled);
        assert!(!birds_eye.has_pending_drag());

        let adopted = main.take_main_override().expect("override queued");
        assert!(adopted.target.distance(Vec3::new(0.5, 0.0, 0.0)) < 1.0e-12);
        assert!(!main.publish_main_camera(adopted));
        let after = birds_eye.step(Some(&coordinator), &mut camera, &nodes());
        assert_eq!(after.step, CoordinationStep::Unchanged);
    }
}
