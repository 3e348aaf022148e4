use serde::{Deserialize, Serialize};

use crate::Vec3;

/// Implicit plane `normal·p + offset = 0` with an outward facing normal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f64,
}

impl Plane {
    pub fn through_point(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            offset: -normal.dot(point),
        }
    }

    /// Positive on the outward side.
    pub fn signed_distance(&self, point: Vec3) -> f64 {
        self.normal.dot(point) + self.offset
    }
}

const NEAR: usize = 0;
const FAR: usize = 1;
const LEFT: usize = 2;
const RIGHT: usize = 3;
const TOP: usize = 4;
const BOTTOM: usize = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewingVolume {
    planes: [Plane; 6],
}

impl ViewingVolume {
    pub fn new(
        position: Vec3,
        direction: Vec3,
        up: Vec3,
        z_near: f64,
        z_far: f64,
        vertical_fov_deg: f64,
        horizontal_fov_deg: f64,
    ) -> Self {
        let mut volume = Self::default();
        volume.calculate(
            position,
            direction,
            up,
            z_near,
            z_far,
            vertical_fov_deg,
            horizontal_fov_deg,
        );
        volume
    }

    pub fn calculate(
        &mut self,
        position: Vec3,
        direction: Vec3,
        up: Vec3,
        z_near: f64,
        z_far: f64,
        vertical_fov_deg: f64,
        horizontal_fov_deg: f64,
    ) {
        let direction = direction.normalized();
        let mut right = direction.cross(up);
        if right.length() <= 1.0e-9 {
            right = direction.cross(if direction.y.abs() < 0.9 { Vec3::Y } else { Vec3::X });
        }
        let right = right.normalized();
        let up = right.cross(direction).normalized();
        let left = -right;

        let half_v = (vertical_fov_deg * 0.5).to_radians();
        let half_h = (horizontal_fov_deg * 0.5).to_radians();
        let near_center = position + direction * z_near;
        let far_center = position + direction * z_far;
        let quarter = std::f64::consts::FRAC_PI_2;

        self.planes[NEAR] = Plane::through_point(-direction, near_center);
        self.planes[FAR] = Plane::through_point(direction, far_center);

        let left_point = near_center + left * (half_h.tan() * z_near);
        let left_normal = direction.rotated(up, half_h + quarter);
        self.planes[LEFT] = Plane::through_point(left_normal, left_point);

        let right_point = near_center + right * (half_h.tan() * z_near);
        let right_normal = direction.rotated(up, -(half_h + quarter));
        self.planes[RIGHT] = Plane::through_point(right_normal, right_point);

        let top_point = near_center + up * (half_v.tan() * z_near);
        let top_normal = direction.rotated(right, half_v + quarter);
        self.planes[TOP] = Plane::through_point(top_normal, top_point);

        let bottom_point = near_center - up * (half_v.tan() * z_near);
        let bottom_normal = direction.rotated(right, -(half_v + quarter));
        self.planes[BOTTOM] = Plane::through_point(bottom_normal, bottom_point);
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// Strictly on the inner side of every plane.
    pub fn inside(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(point) < 0.0)
    }

    /// Like [`inside`](Self::inside) but lets the point sit up to `tolerance`
    /// beyond each plane.
    pub fn inside_with_tolerance(&self, point: Vec3, tolerance: f64) -> bool {
        let tolerance = tolerance.max(0.0);
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(point) < tolerance)
    }
}

pub fn horizontal_fov_deg(vertical_fov_deg: f64, aspect: f64) -> f64 {
    let half_v = (vertical_fov_deg * 0.5).to_radians();
    ((half_v.tan() * aspect).atan() * 2.0).to_degrees()
}
