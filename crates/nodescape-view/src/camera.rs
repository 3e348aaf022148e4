use nodescape_base::CameraConfig;
use nodescape_geometry::{Vec3, rotate_around_axis};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl CameraPose {
    pub fn direction(&self) -> Vec3 {
        forward(self.position, self.target)
    }

    pub fn distance(&self) -> f64 {
        (self.target - self.position).length()
    }

    pub fn right(&self) -> Vec3 {
        basis(self.direction(), self.up).0
    }

    pub fn true_up(&self) -> Vec3 {
        basis(self.direction(), self.up).1
    }

    /// True when position, direction and up differ from `other` by more than
    /// `threshold` in squared length.
    pub fn moved_from(&self, other: &CameraPose, threshold: f64) -> bool {
        self.position.distance_squared(other.position) > threshold
            || self.direction().distance_squared(other.direction()) > threshold
            || self.up.distance_squared(other.up) > threshold
    }
}

#[derive(Clone, Copy, Debug)]
struct CameraLimits {
    orbit_speed: f64,
    near_limit: f64,
    far_limit: f64,
    default_distance: f64,
}

#[derive(Clone, Debug)]
pub struct OrbitCamera {
    position: Vec3,
    target: Vec3,
    up: Vec3,
    limits: CameraLimits,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(&CameraConfig::default())
    }
}

impl OrbitCamera {
    pub fn new(config: &CameraConfig) -> Self {
        let limits = CameraLimits {
            orbit_speed: config.orbit_speed,
            near_limit: config.near_limit.min(config.far_limit),
            far_limit: config.far_limit.max(config.near_limit),
            default_distance: config.default_distance.clamp(
                config.near_limit.min(config.far_limit),
                config.far_limit.max(config.near_limit),
            ),
        };
        let mut camera = Self {
            position: Vec3::ZERO,
            target: Vec3::ZERO,
            up: Vec3::Y,
            limits,
        };
        camera.reset();
        camera
    }

    pub fn with_pose(config: &CameraConfig, pose: CameraPose) -> Self {
        let mut camera = Self::new(config);
        camera.set_pose(pose);
        camera
    }

    pub fn reset(&mut self) {
        self.target = Vec3::ZERO;
        self.position = Vec3::new(0.0, 0.0, self.limits.default_distance);
        self.up = Vec3::Y;
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            target: self.target,
            up: self.up,
        }
    }

    pub fn set_pose(&mut self, pose: CameraPose) {
        self.position = pose.position;
        self.target = pose.target;
        self.up = pose.up;
        self.orthogonalize_up();
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn direction(&self) -> Vec3 {
        forward(self.position, self.target)
    }

    pub fn distance(&self) -> f64 {
        (self.target - self.position).length()
    }

    pub fn left(&self) -> Vec3 {
        -basis(self.direction(), self.up).0
    }

    pub fn near_limit(&self) -> f64 {
        self.limits.near_limit
    }

    pub fn far_limit(&self) -> f64 {
        self.limits.far_limit
    }

    pub fn orbit_up(&mut self, angle: f64) {
        let angle = angle * self.limits.orbit_speed;
        if angle == 0.0 {
            return;
        }
        let axis = self.left();
        self.position = rotate_around_axis(self.position, self.target, axis, angle);
        self.up = self.up.rotated(axis, angle);
        self.orthogonalize_up();
    }

    pub fn orbit_right(&mut self, angle: f64) {
        let angle = angle * self.limits.orbit_speed;
        if angle == 0.0 {
            return;
        }
        let axis = basis(self.direction(), self.up).1;
        self.position = rotate_around_axis(self.position, self.target, axis, angle);
        self.orthogonalize_up();
    }

    pub fn roll(&mut self, angle: f64) {
        if angle == 0.0 {
            return;
        }
        self.up = self.up.rotated(self.direction(), angle);
        self.orthogonalize_up();
    }

    /// Dollies towards the target by `amount`, keeping the distance within
    /// the configured near and far limits.
    pub fn move_forward(&mut self, amount: f64) {
        let offset = self.position - self.target;
        let current = offset.length();
        if current <= f64::EPSILON {
            self.position = self.target - self.direction() * self.limits.near_limit;
            return;
        }
        let desired = (current - amount).clamp(self.limits.near_limit, self.limits.far_limit);
        if !desired.is_finite() {
            return;
        }
        self.position = self.target + offset * (desired / current);
    }

    pub fn move_to(&mut self, position: Vec3, up: Option<Vec3>) {
        self.position = position;
        if let Some(up) = up {
            self.up = up;
        }
        self.orthogonalize_up();
    }

    pub fn look_from(&mut self, target: Vec3, direction: Vec3, distance: f64, up: Vec3) {
        let direction = direction.try_normalized().unwrap_or(-Vec3::Z);
        self.target = target;
        self.position = target - direction * distance;
        self.up = up;
        self.orthogonalize_up();
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.orthogonalize_up();
    }

    fn orthogonalize_up(&mut self) {
        self.up = basis(self.direction(), self.up).1;
    }
}

fn forward(position: Vec3, target: Vec3) -> Vec3 {
    let dir = target - position;
    if dir.length() <= f64::EPSILON {
        Vec3::new(0.0, 0.0, -1.0)
    } else {
        dir.normalized()
    }
}

/// Right and orthogonal up for a view direction, falling back to a world
/// axis when `up` is parallel to `forward`.
fn basis(forward: Vec3, up: Vec3) -> (Vec3, Vec3) {
    let mut right = forward.cross(up);
    if right.length() <= 1.0e-6 {
        let fallback = if forward.y.abs() < 0.9 { Vec3::Y } else { Vec3::Z };
        right = forward.cross(fallback);
    }
    let right = right.normalized();
    let up = right.cross(forward).normalized();
    (right, up)
}
