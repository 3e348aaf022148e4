use serde::{Deserialize, Serialize};

use crate::Vec3;

/// Camera-facing four corner frame, stored as a center plus per-corner
/// offsets so it can be moved rigidly.
///
/// Coplanarity and rectangularity are expected but not enforced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    center: Vec3,
    top_left: Vec3,
    top_right: Vec3,
    bottom_left: Vec3,
    bottom_right: Vec3,
}

impl Quadrilateral {
    /// Rectangle centered at `center` spanning `half_width` along `right` and
    /// `half_height` along `up`.
    pub fn from_basis(center: Vec3, right: Vec3, up: Vec3, half_width: f64, half_height: f64) -> Self {
        let r = right.normalized() * half_width;
        let u = up.normalized() * half_height;
        Self {
            center,
            top_left: u - r,
            top_right: u + r,
            bottom_left: -u - r,
            bottom_right: -u + r,
        }
    }

    pub fn from_corners(top_left: Vec3, top_right: Vec3, bottom_left: Vec3, bottom_right: Vec3) -> Self {
        let center = (top_left + top_right + bottom_left + bottom_right) * 0.25;
        Self {
            center,
            top_left: top_left - center,
            top_right: top_right - center,
            bottom_left: bottom_left - center,
            bottom_right: bottom_right - center,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn top_left(&self) -> Vec3 {
        self.center + self.top_left
    }

    pub fn top_right(&self) -> Vec3 {
        self.center + self.top_right
    }

    pub fn bottom_left(&self) -> Vec3 {
        self.center + self.bottom_left
    }

    pub fn bottom_right(&self) -> Vec3 {
        self.center + self.bottom_right
    }

    /// Corners in drawing order: top-left, top-right, bottom-right, bottom-left.
    pub fn outline(&self) -> [Vec3; 4] {
        [
            self.top_left(),
            self.top_right(),
            self.bottom_right(),
            self.bottom_left(),
        ]
    }

    pub fn width(&self) -> f64 {
        self.top_left.distance(self.top_right)
    }

    pub fn height(&self) -> f64 {
        self.top_left.distance(self.bottom_left)
    }

    pub fn move_to(&mut self, center: Vec3) {
        self.center = center;
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.center.add_in_place(delta);
    }

    pub fn translated(mut self, delta: Vec3) -> Self {
        self.translate(delta);
        self
    }

    /// True when every corner is within `threshold` squared distance of the
    /// matching corner of `other`.
    pub fn approx_eq(&self, other: &Self, threshold: f64) -> bool {
        self.outline()
            .iter()
            .zip(other.outline().iter())
            .all(|(a, b)| a.distance_squared(*b) <= threshold)
    }
}
