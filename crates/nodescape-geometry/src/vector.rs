use serde::{Deserialize, Serialize};

/// Three component `f64` vector.
///
/// Plain methods return new values; the `*_in_place` variants mutate `self`
/// and are meant for hot loops that reuse a scratch vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    pub fn distance_squared(self, other: Self) -> f64 {
        (self - other).length_squared()
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Unit vector in the same direction, or `ZERO` for a degenerate input.
    pub fn normalized(self) -> Self {
        self.try_normalized().unwrap_or(Self::ZERO)
    }

    pub fn try_normalized(self) -> Option<Self> {
        let len = self.length();
        if len <= f64::EPSILON || !len.is_finite() {
            None
        } else {
            Some(self / len)
        }
    }

    /// Angle to `other` in radians, in `[0, π]`. Zero when either is degenerate.
    pub fn angle_to(self, other: Self) -> f64 {
        let denom = self.length() * other.length();
        if denom <= f64::EPSILON {
            return 0.0;
        }
        (self.dot(other) / denom).clamp(-1.0, 1.0).acos()
    }

    /// Rotates about `axis` through the origin by `angle` radians (right hand rule).
    pub fn rotated(self, axis: Self, angle: f64) -> Self {
        rotate_around_axis(self, Self::ZERO, axis, angle)
    }

    /// Component of `self` along `onto`.
    pub fn projected_onto(self, onto: Self) -> Self {
        let denom = onto.length_squared();
        if denom <= f64::EPSILON {
            return Self::ZERO;
        }
        onto * (self.dot(onto) / denom)
    }

    /// Component of `self` orthogonal to `normal`.
    pub fn rejected_from(self, normal: Self) -> Self {
        self - self.projected_onto(normal)
    }

    pub fn mul_components(self, other: Self) -> Self {
        Self::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    pub fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }

    pub fn max_component(self) -> f64 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }

    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn normalize_in_place(&mut self) {
        *self = self.normalized();
    }

    pub fn rotate_in_place(&mut self, axis: Self, angle: f64) {
        *self = self.rotated(axis, angle);
    }

    pub fn add_in_place(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }

    pub fn scale_in_place(&mut self, factor: f64) {
        self.x *= factor;
        self.y *= factor;
        self.z *= factor;
    }
}

impl From<cgmath::Point3<f64>> for Vec3 {
    fn from(point: cgmath::Point3<f64>) -> Self {
        Self::new(point.x, point.y, point.z)
    }
}

impl From<Vec3> for cgmath::Point3<f64> {
    fn from(v: Vec3) -> Self {
        cgmath::Point3::new(v.x, v.y, v.z)
    }
}

impl From<Vec3> for cgmath::Vector3<f64> {
    fn from(v: Vec3) -> Self {
        cgmath::Vector3::new(v.x, v.y, v.z)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Div<f64> for Vec3 {
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Rodrigues rotation of `point` about the line through `origin` along `axis`.
pub fn rotate_around_axis(point: Vec3, origin: Vec3, axis: Vec3, angle: f64) -> Vec3 {
    let Some(axis) = axis.try_normalized() else {
        return point;
    };
    let v = point - origin;
    let cos = angle.cos();
    let sin = angle.sin();
    let rotated = v * cos + axis.cross(v) * sin + axis * (axis.dot(v)) * (1.0 - cos);
    origin + rotated
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1.0e-12
    }

    #[test]
    fn rotation_follows_right_hand_rule() {
        let rotated = Vec3::X.rotated(Vec3::Z, FRAC_PI_2);
        assert!(close(rotated, Vec3::Y));
    }

    #[test]
    fn rotation_about_offset_origin() {
        let origin = Vec3::new(1.0, 1.0, 0.0);
        let rotated = rotate_around_axis(Vec3::new(2.0, 1.0, 0.0), origin, Vec3::Z, PI);
        assert!(close(rotated, Vec3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn zero_axis_leaves_point_unchanged() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(p.rotated(Vec3::ZERO, 1.0), p);
    }

    #[test]
    fn degenerate_normalize_is_guarded() {
        assert_eq!(Vec3::ZERO.normalized(), Vec3::ZERO);
        assert!(Vec3::ZERO.try_normalized().is_none());
        let mut v = Vec3::new(0.0, 3.0, 4.0);
        v.normalize_in_place();
        assert!((v.length() - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn angle_to_is_clamped() {
        let a = Vec3::new(1.0, 1.0e-17, 0.0);
        assert_eq!(a.angle_to(a * 3.0), 0.0);
        assert!((Vec3::X.angle_to(-Vec3::X) - PI).abs() < 1.0e-12);
    }

    #[test]
    fn projection_and_rejection_sum_to_input() {
        let v = Vec3::new(3.0, -2.0, 5.0);
        let n = Vec3::new(0.0, 1.0, 1.0);
        let sum = v.projected_onto(n) + v.rejected_from(n);
        assert!(close(sum, v));
        assert!(v.rejected_from(n).dot(n).abs() < 1.0e-12);
    }

    #[test]
    fn in_place_mutators_match_value_ops() {
        let mut v = Vec3::new(1.0, 2.0, 3.0);
        v.add_in_place(Vec3::new(1.0, 1.0, 1.0));
        v.scale_in_place(2.0);
        assert_eq!(v, (Vec3::new(1.0, 2.0, 3.0) + Vec3::new(1.0, 1.0, 1.0)) * 2.0);
    }
}
