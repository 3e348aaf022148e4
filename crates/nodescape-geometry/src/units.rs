use crate::Vec3;

/// Host positions are divided by `distance_scale` and have Y negated, since
/// host Y grows downward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HostUnits {
    distance_scale: f64,
}

impl Default for HostUnits {
    fn default() -> Self {
        Self {
            distance_scale: 180.0,
        }
    }
}

impl HostUnits {
    /// Non-positive or non-finite scales fall back to the default 180.
    pub fn new(distance_scale: f64) -> Self {
        if distance_scale > 0.0 && distance_scale.is_finite() {
            Self { distance_scale }
        } else {
            Self::default()
        }
    }

    pub fn distance_scale(&self) -> f64 {
        self.distance_scale
    }

    pub fn to_internal(&self, x: f64, y: f64, z: f64) -> Vec3 {
        Vec3::new(x, -y, z) / self.distance_scale
    }

    pub fn length_to_internal(&self, length: f64) -> f64 {
        length / self.distance_scale
    }
}
