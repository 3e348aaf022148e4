use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use nodescape_base::Guid;
use nodescape_geometry::Quadrilateral;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::camera::CameraPose;

/// Squared change below which a main camera pose counts as unmoved.
pub const CAMERA_EPSILON: f64 = 5.0e-25;
/// Squared corner change below which bounds count as unchanged.
pub const BOUNDS_EPSILON: f64 = 5.0e-16;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MainProjection {
    pub vertical_fov_deg: f64,
    pub aspect: f64,
}

/// Everything the two sides of one view exchange. Poses and bounds are
/// copies; neither side ever sees the other's live camera.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CoordinatorState {
    pub main_claimed: bool,
    pub birds_eye_claimed: bool,
    pub initial_main_camera_initialized: bool,
    pub initial_bounds_matched: bool,
    pub main_camera_moved: bool,
    pub suggest_recalculate_bounds: bool,
    pub main_pose: Option<CameraPose>,
    pub projection: Option<MainProjection>,
    pub near_bounds: Option<Quadrilateral>,
    pub far_bounds: Option<Quadrilateral>,
    /// Main pose derived on the bird's-eye side, waiting for the main
    /// renderer to adopt it.
    pub pending_main_pose: Option<CameraPose>,
}

impl CoordinatorState {
    /// Records the main pose. Returns whether it moved past `CAMERA_EPSILON`.
    pub fn publish_main_camera(&mut self, pose: CameraPose) -> bool {
        let moved = self
            .main_pose
            .is_none_or(|old| pose.moved_from(&old, CAMERA_EPSILON));
        if moved {
            self.main_pose = Some(pose);
            self.main_camera_moved = true;
        }
        self.initial_main_camera_initialized = true;
        moved
    }

    pub fn publish_main_projection(&mut self, projection: MainProjection) {
        if self.projection != Some(projection) {
            self.projection = Some(projection);
            self.suggest_recalculate_bounds = true;
        }
    }

    /// Stores new near bounds if they differ past `BOUNDS_EPSILON`.
    pub fn set_near_bounds(&mut self, bounds: Quadrilateral) -> bool {
        replace_bounds(&mut self.near_bounds, bounds)
    }

    pub fn set_far_bounds(&mut self, bounds: Quadrilateral) -> bool {
        replace_bounds(&mut self.far_bounds, bounds)
    }

    /// Queues a main pose for the main renderer. The stored copy is updated
    /// too, so adopting it does not count as a fresh move.
    pub fn request_main_pose(&mut self, pose: CameraPose) {
        self.main_pose = Some(pose);
        self.pending_main_pose = Some(pose);
    }

    pub fn take_main_override(&mut self) -> Option<CameraPose> {
        self.pending_main_pose.take()
    }

    /// Adopts a pending override, if any, and publishes it in place of `pose`
    /// under the same lock.
    pub fn sync_main(&mut self, pose: CameraPose, projection: MainProjection) -> Option<CameraPose> {
        let adopted = self.take_main_override();
        self.publish_main_projection(projection);
        self.publish_main_camera(adopted.unwrap_or(pose));
        adopted
    }

    pub fn synchronized(&self) -> bool {
        self.main_claimed && self.birds_eye_claimed && self.initial_main_camera_initialized
    }
}

fn replace_bounds(slot: &mut Option<Quadrilateral>, bounds: Quadrilateral) -> bool {
    let changed = slot
        .as_ref()
        .is_none_or(|old| !old.approx_eq(&bounds, BOUNDS_EPSILON));
    if changed {
        *slot = Some(bounds);
    }
    changed
}

#[derive(Debug)]
pub struct ViewingCoordinator {
    view: Guid,
    state: Mutex<CoordinatorState>,
}

impl ViewingCoordinator {
    fn new(view: Guid) -> Self {
        Self {
            view,
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    pub fn view(&self) -> Guid {
        self.view
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut CoordinatorState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> CoordinatorState {
        self.lock().clone()
    }

    pub fn publish_main_camera(&self, pose: CameraPose) -> bool {
        self.update(|state| state.publish_main_camera(pose))
    }

    pub fn publish_main_projection(&self, projection: MainProjection) {
        self.update(|state| state.publish_main_projection(projection));
    }

    pub fn take_main_override(&self) -> Option<CameraPose> {
        self.update(CoordinatorState::take_main_override)
    }

    pub fn sync_main(&self, pose: CameraPose, projection: MainProjection) -> Option<CameraPose> {
        self.update(|state| state.sync_main(pose, projection))
    }

    pub fn suggest_recalculate(&self) {
        self.update(|state| state.suggest_recalculate_bounds = true);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Main,
    BirdsEye,
}

#[derive(Debug, Default)]
pub struct CoordinatorRegistry {
    entries: Mutex<HashMap<Guid, Arc<ViewingCoordinator>>>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Guid, Arc<ViewingCoordinator>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn claim_main(&self, view: Guid) -> Arc<ViewingCoordinator> {
        self.claim(view, Side::Main)
    }

    pub fn claim_birds_eye(&self, view: Guid) -> Arc<ViewingCoordinator> {
        self.claim(view, Side::BirdsEye)
    }

    pub fn unlink_main(&self, view: Guid) {
        self.unlink(view, Side::Main);
    }

    pub fn unlink_birds_eye(&self, view: Guid) {
        self.unlink(view, Side::BirdsEye);
    }

    pub fn get(&self, view: Guid) -> Option<Arc<ViewingCoordinator>> {
        self.entries().get(&view).cloned()
    }

    pub fn contains(&self, view: Guid) -> bool {
        self.entries().contains_key(&view)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn claim(&self, view: Guid, side: Side) -> Arc<ViewingCoordinator> {
        let mut entries = self.entries();
        let entry = entries
            .entry(view)
            .or_insert_with(|| {
                debug!(%view, "coordinator entry created");
                Arc::new(ViewingCoordinator::new(view))
            })
            .clone();
        entry.update(|state| {
            let claimed = match side {
                Side::Main => &mut state.main_claimed,
                Side::BirdsEye => &mut state.birds_eye_claimed,
            };
            if *claimed {
                warn!(%view, ?side, "view side claimed twice");
            }
            *claimed = true;
        });
        info!(%view, ?side, "coordinator claimed");
        entry
    }

    fn unlink(&self, view: Guid, side: Side) {
        let mut entries = self.entries();
        let Some(entry) = entries.get(&view) else {
            warn!(%view, ?side, "unlink of unknown coordinator entry");
            return;
        };
        let released = entry.update(|state| {
            match side {
                Side::Main => state.main_claimed = false,
                Side::BirdsEye => state.birds_eye_claimed = false,
            }
            !state.main_claimed && !state.birds_eye_claimed
        });
        if released {
            entries.remove(&view);
            info!(%view, ?side, "coordinator entry removed");
        } else {
            info!(%view, ?side, "coordinator unlinked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodescape_geometry::Vec3;

    fn pose(z: f64) -> CameraPose {
        CameraPose {
            position: Vec3::new(0.0, 0.0, z),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }

    #[test]
    fn claim_without_unlink_keeps_entry() {
        let registry = CoordinatorRegistry::new();
        let view = Guid::new();
        registry.claim_main(view);
        assert!(registry.contains(view));
    }

    #[test]
    fn both_sides_share_one_entry() {
        let registry = CoordinatorRegistry::new();
        let view = Guid::new();
        let main = registry.claim_main(view);
        let birds_eye = registry.claim_birds_eye(view);
        assert!(Arc::ptr_eq(&main, &birds_eye));
        let state = main.snapshot();
        assert!(state.main_claimed && state.birds_eye_claimed);
    }

    #[test]
    fn unlink_unknown_is_tolerated() {
        let registry = CoordinatorRegistry::new();
        registry.unlink_birds_eye(Guid::new());
        assert!(registry.is_empty());
    }

    #[test]
    fn first_publish_initializes_and_moves() {
        let mut state = CoordinatorState::default();
        assert!(state.publish_main_camera(pose(3.0)));
        assert!(state.initial_main_camera_initialized);
        assert!(state.main_camera_moved);
        state.main_camera_moved = false;
        assert!(!state.publish_main_camera(pose(3.0)));
        assert!(!state.main_camera_moved);
    }

    #[test]
    fn sub_threshold_motion_is_ignored() {
        let mut state = CoordinatorState::default();
        state.publish_main_camera(pose(3.0));
        state.main_camera_moved = false;
        assert!(!state.publish_main_camera(pose(3.0 + 1.0e-13)));
        assert!(state.publish_main_camera(pose(3.0 + 1.0e-11)));
    }

    #[test]
    fn projection_change_suggests_recalculation() {
        let mut state = CoordinatorState::default();
        let projection = MainProjection {
            vertical_fov_deg: 45.0,
            aspect: 1.5,
        };
        state.publish_main_projection(projection);
        assert!(state.suggest_recalculate_bounds);
        state.suggest_recalculate_bounds = false;
        state.publish_main_projection(projection);
        assert!(!state.suggest_recalculate_bounds);
    }

    #[test]
    fn bounds_use_their_own_threshold() {
        let mut state = CoordinatorState::default();
        let quad = Quadrilateral::from_basis(Vec3::ZERO, Vec3::X, Vec3::Y, 1.0, 1.0);
        assert!(state.set_near_bounds(quad));
        assert!(!state.set_near_bounds(quad.translated(Vec3::new(1.0e-9, 0.0, 0.0))));
        assert!(state.set_near_bounds(quad.translated(Vec3::new(1.0e-6, 0.0, 0.0))));
    }

    #[test]
    fn adopted_override_is_not_a_move() {
        let mut state = CoordinatorState::default();
        state.publish_main_camera(pose(3.0));
        state.main_camera_moved = false;
        state.request_main_pose(pose(5.0));
        let adopted = state.take_main_override();
        assert_eq!(adopted, Some(pose(5.0)));
        assert!(state.take_main_override().is_none());
        assert!(!state.publish_main_camera(pose(5.0)));
    }

    #[test]
    fn sync_main_prefers_queued_pose_over_stale_camera() {
        let projection = MainProjection {
            vertical_fov_deg: 45.0,
            aspect: 1.0,
        };
        let mut state = CoordinatorState::default();
        state.sync_main(pose(3.0), projection);
        state.main_camera_moved = false;

        state.request_main_pose(pose(5.0));
        assert_eq!(state.sync_main(pose(3.0), projection), Some(pose(5.0)));
        assert_eq!(state.main_pose, Some(pose(5.0)));
        assert!(!state.main_camera_moved);
        assert!(state.pending_main_pose.is_none());
    }
}
