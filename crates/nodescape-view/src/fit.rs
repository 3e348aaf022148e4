use nodescape_base::FitConfig;
use nodescape_geometry::Vec3;

use crate::camera::OrbitCamera;

pub fn bounding_sphere(points: &[Vec3]) -> Option<(Vec3, f64)> {
    let first = *points.first()?;
    let (min, max) = points
        .iter()
        .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
    let center = (min + max) * 0.5;
    let radius = points
        .iter()
        .map(|p| p.distance(center))
        .fold(0.0, f64::max);
    Some((center, radius))
}

/// Distance from which a sphere of `radius` fills the vertical field of view,
/// scaled by `multiplier` and floored at `min_distance`.
pub fn fit_distance(radius: f64, vertical_fov_deg: f64, fit: FitConfig) -> f64 {
    let half = (vertical_fov_deg * 0.5).to_radians().max(1.0e-3);
    let distance = radius / half.sin() * fit.multiplier;
    if distance.is_finite() {
        distance.max(fit.min_distance)
    } else {
        fit.min_distance
    }
}

pub fn fit_nodes(camera: &mut OrbitCamera, points: &[Vec3], vertical_fov_deg: f64, fit: FitConfig) {
    let (center, radius) = bounding_sphere(points).unwrap_or((Vec3::ZERO, 0.0));
    let distance = fit_distance(radius, vertical_fov_deg, fit);
    let direction = camera.direction();
    let up = camera.up();
    camera.look_from(center, direction, distance, up);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodescape_base::CameraConfig;

    #[test]
    fn sphere_of_box_corners() {
        let points = [Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)];
        let (center, radius) = bounding_sphere(&points).unwrap();
        assert_eq!(center, Vec3::ZERO);
        assert!((radius - 3.0f64.sqrt()).abs() < 1.0e-12);
        assert!(bounding_sphere(&[]).is_none());
    }

    #[test]
    fn distance_is_floored() {
        let fit = FitConfig {
            multiplier: 2.0,
            min_distance: 5.0,
        };
        assert_eq!(fit_distance(0.0, 45.0, fit), 5.0);
        assert!(fit_distance(100.0, 45.0, fit) > 200.0);
    }

    #[test]
    fn fit_keeps_direction() {
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        camera.orbit_right(0.5);
        let direction = camera.direction();
        let points = [Vec3::new(10.0, 0.0, 0.0), Vec3::new(12.0, 2.0, 0.0)];
        fit_nodes(&mut camera, &points, 45.0, FitConfig::default());
        assert_eq!(camera.target(), Vec3::new(11.0, 1.0, 0.0));
        assert!(camera.direction().distance(direction) < 1.0e-12);
        assert!(camera.distance() >= FitConfig::default().min_distance);
    }
}
