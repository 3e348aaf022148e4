use std::mem;

use cgmath::{Deg, Matrix4, Point3, Vector3, Vector4, perspective};
use nodescape_geometry::Vec3;

use crate::camera::CameraPose;
use crate::picking::{HitRecord, PickRegion, SelectionPass, SelectionResult};

const MIN_CLIP_W: f64 = 1.0e-9;

/// CPU selection pass with GL selection-mode semantics.
///
/// Geometry is transformed by projection, view and a pick matrix that maps
/// the pick box onto the whole clip volume; anything overlapping it counts as
/// a hit under the current name stack. A hit record is written when the name
/// stack next changes or the pass ends. Records that do not fit the declared
/// capacity flip the result to an overflow (`hit_count == -1`).
#[derive(Clone, Debug)]
pub struct SoftwareSelectionPass {
    view_projection: Matrix4<f64>,
    viewport_width: f64,
    viewport_height: f64,
    clip: Matrix4<f64>,
    region: PickRegion,
    capacity_words: usize,
    words_used: usize,
    names: Vec<u32>,
    pending: Option<(u32, u32)>,
    hits: Vec<HitRecord>,
    overflowed: bool,
}

impl SoftwareSelectionPass {
    pub fn new(
        pose: &CameraPose,
        vertical_fov_deg: f64,
        z_near: f64,
        z_far: f64,
        viewport_width: f64,
        viewport_height: f64,
    ) -> Self {
        let viewport_width = viewport_width.max(1.0);
        let viewport_height = viewport_height.max(1.0);
        let projection = perspective(
            Deg(vertical_fov_deg),
            viewport_width / viewport_height,
            z_near,
            z_far,
        );
        let view = Matrix4::look_at_rh(
            Point3::from(pose.position),
            Point3::from(pose.target),
            Vector3::from(pose.up),
        );
        let view_projection = projection * view;
        Self {
            view_projection,
            viewport_width,
            viewport_height,
            clip: view_projection,
            region: PickRegion {
                center_x: viewport_width * 0.5,
                center_y: viewport_height * 0.5,
                width: viewport_width,
                height: viewport_height,
            },
            capacity_words: 0,
            words_used: 0,
            names: Vec::new(),
            pending: None,
            hits: Vec::new(),
            overflowed: false,
        }
    }

    fn to_clip(&self, p: Vec3) -> Vector4<f64> {
        self.clip * Vector4::new(p.x, p.y, p.z, 1.0)
    }

    fn test_primitive(&mut self, clipped: &[Vector4<f64>], pad_x: f64, pad_y: f64) {
        if clipped.is_empty() {
            return;
        }
        let ndc: Vec<(f64, f64, f64)> = clipped
            .iter()
            .map(|c| (c.x / c.w, c.y / c.w, c.z / c.w))
            .collect();
        let (z_min, z_max) = ndc
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.2), hi.max(p.2))
            });
        if z_max < -1.0 || z_min > 1.0 {
            return;
        }
        let flat: Vec<(f64, f64)> = ndc.iter().map(|p| (p.0, p.1)).collect();
        if !overlaps_box(&flat, 1.0 + pad_x, 1.0 + pad_y) {
            return;
        }
        let lo = depth_word(z_min);
        let hi = depth_word(z_max);
        self.pending = Some(match self.pending {
            Some((a, b)) => (a.min(lo), b.max(hi)),
            None => (lo, hi),
        });
    }

    fn flush(&mut self) {
        let Some((min_depth, max_depth)) = self.pending.take() else {
            return;
        };
        let words = 3 + self.names.len();
        if self.overflowed || self.words_used + words > self.capacity_words {
            self.overflowed = true;
            return;
        }
        self.words_used += words;
        self.hits.push(HitRecord {
            names: self.names.clone(),
            min_depth,
            max_depth,
        });
    }
}

impl SelectionPass for SoftwareSelectionPass {
    fn begin(&mut self, region: PickRegion, capacity_words: usize) {
        let width = region.width.max(1.0);
        let height = region.height.max(1.0);
        let gl_y = self.viewport_height - region.center_y;
        self.clip = pick_matrix(
            region.center_x,
            gl_y,
            width,
            height,
            self.viewport_width,
            self.viewport_height,
        ) * self.view_projection;
        self.region = PickRegion {
            width,
            height,
            ..region
        };
        self.capacity_words = capacity_words;
        self.words_used = 0;
        self.names.clear();
        self.pending = None;
        self.hits.clear();
        self.overflowed = false;
    }

    fn push_name(&mut self, name: u32) {
        self.flush();
        self.names.push(name);
    }

    fn pop_name(&mut self) {
        self.flush();
        self.names.pop();
    }

    fn draw_triangles(&mut self, triangles: &[[Vec3; 3]]) {
        for tri in triangles {
            let corners = tri.map(|p| self.to_clip(p));
            let clipped = clip_polygon_near(&corners);
            self.test_primitive(&clipped, 0.0, 0.0);
        }
    }

    fn draw_polyline(&mut self, points: &[Vec3], width_px: f64) {
        let pad_x = width_px.max(0.0) / self.region.width;
        let pad_y = width_px.max(0.0) / self.region.height;
        for pair in points.windows(2) {
            let a = self.to_clip(pair[0]);
            let b = self.to_clip(pair[1]);
            if let Some(segment) = clip_segment_near(a, b) {
                self.test_primitive(&segment, pad_x, pad_y);
            }
        }
    }

    fn end(&mut self) -> SelectionResult {
        self.flush();
        let hits = mem::take(&mut self.hits);
        if self.overflowed {
            return SelectionResult {
                hit_count: -1,
                hits,
            };
        }
        SelectionResult {
            hit_count: i32::try_from(hits.len()).unwrap_or(i32::MAX),
            hits,
        }
    }
}

/// Maps the `width` x `height` box centered on window point (`x`, `y`),
/// origin bottom left, onto the full `[-1, 1]` clip square.
pub fn pick_matrix(x: f64, y: f64, width: f64, height: f64, viewport_width: f64, viewport_height: f64) -> Matrix4<f64> {
    let translate = Matrix4::from_translation(Vector3::new(
        (viewport_width - 2.0 * x) / width,
        (viewport_height - 2.0 * y) / height,
        0.0,
    ));
    translate * Matrix4::from_nonuniform_scale(viewport_width / width, viewport_height / height, 1.0)
}

fn depth_word(z_ndc: f64) -> u32 {
    let depth = ((z_ndc.clamp(-1.0, 1.0) + 1.0) * 0.5).clamp(0.0, 1.0);
    (depth * f64::from(u32::MAX)) as u32
}

fn lerp4(a: Vector4<f64>, b: Vector4<f64>, t: f64) -> Vector4<f64> {
    a + (b - a) * t
}

/// Sutherland-Hodgman against `w >= MIN_CLIP_W`.
fn clip_polygon_near(points: &[Vector4<f64>]) -> Vec<Vector4<f64>> {
    let mut out = Vec::with_capacity(points.len() + 1);
    for (i, &current) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        let current_in = current.w >= MIN_CLIP_W;
        let next_in = next.w >= MIN_CLIP_W;
        if current_in {
            out.push(current);
        }
        if current_in != next_in {
            let t = (MIN_CLIP_W - current.w) / (next.w - current.w);
            out.push(lerp4(current, next, t));
        }
    }
    out
}

fn clip_segment_near(a: Vector4<f64>, b: Vector4<f64>) -> Option<Vec<Vector4<f64>>> {
    match (a.w >= MIN_CLIP_W, b.w >= MIN_CLIP_W) {
        (true, true) => Some(vec![a, b]),
        (false, false) => None,
        (true, false) => Some(vec![a, lerp4(a, b, (MIN_CLIP_W - a.w) / (b.w - a.w))]),
        (false, true) => Some(vec![lerp4(a, b, (MIN_CLIP_W - a.w) / (b.w - a.w)), b]),
    }
}

/// Separating-axis test of a convex 2D polygon against the origin-centered
/// box with half extents `hx`, `hy`.
fn overlaps_box(points: &[(f64, f64)], hx: f64, hy: f64) -> bool {
    let (min_x, max_x, min_y, max_y) = points.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
        |(x0, x1, y0, y1), p| (x0.min(p.0), x1.max(p.0), y0.min(p.1), y1.max(p.1)),
    );
    if min_x > hx || max_x < -hx || min_y > hy || max_y < -hy {
        return false;
    }
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        let normal = (a.1 - b.1, b.0 - a.0);
        if normal.0.abs() + normal.1.abs() <= f64::EPSILON {
            continue;
        }
        let reach = hx * normal.0.abs() + hy * normal.1.abs();
        let (lo, hi) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            let d = p.0 * normal.0 + p.1 * normal.1;
            (lo.min(d), hi.max(d))
        });
        if lo > reach || hi < -reach {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picking::{PickKind, split_id};
    use crate::shapes::{DetailLevel, ShapeCache, ShapeKind};

    fn front_pose() -> CameraPose {
        CameraPose {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }

    fn pass() -> SoftwareSelectionPass {
        SoftwareSelectionPass::new(&front_pose(), 45.0, 0.2, 100.0, 100.0, 100.0)
    }

    fn cube_at(center: Vec3) -> Vec<[Vec3; 3]> {
        let mut cache = ShapeCache::default();
        cache.initialize();
        let mesh = cache
            .get(ShapeKind::Cube, DetailLevel::Low)
            .expect("cube mesh");
        mesh.triangles
            .iter()
            .map(|tri| tri.map(|v| v + center))
            .collect()
    }

    fn region(x: f64, y: f64, size: f64) -> PickRegion {
        PickRegion {
            center_x: x,
            center_y: y,
            width: size,
            height: size,
        }
    }

    fn named(pass: &mut SoftwareSelectionPass, kind: PickKind, id: i64, draw: impl FnOnce(&mut SoftwareSelectionPass)) {
        let (upper, lower) = split_id(id);
        pass.push_name(kind.ordinal());
        pass.push_name(upper);
        pass.push_name(lower);
        draw(pass);
        pass.pop_name();
        pass.pop_name();
        pass.pop_name();
    }

    #[test]
    fn pick_matrix_centers_the_box() {
        let m = pick_matrix(30.0, 70.0, 4.0, 4.0, 100.0, 100.0);
        let ndc_x = 2.0 * 30.0 / 100.0 - 1.0;
        let ndc_y = 2.0 * 70.0 / 100.0 - 1.0;
        let mapped = m * Vector4::new(ndc_x, ndc_y, 0.0, 1.0);
        assert!(mapped.x.abs() < 1.0e-12);
        assert!(mapped.y.abs() < 1.0e-12);
    }

    #[test]
    fn center_pick_hits_cube_and_corner_misses() {
        let cube = cube_at(Vec3::ZERO);
        let mut p = pass();
        p.begin(region(50.0, 50.0, 2.0), 64);
        named(&mut p, PickKind::Node, 7, |p| p.draw_triangles(&cube));
        let result = p.end();
        assert_eq!(result.hit_count, 1);
        assert_eq!(result.hits[0].names, vec![0, 0, 7]);

        p.begin(region(5.0, 5.0, 2.0), 64);
        named(&mut p, PickKind::Node, 7, |p| p.draw_triangles(&cube));
        assert_eq!(p.end().hit_count, 0);
    }

    #[test]
    fn nearer_geometry_has_smaller_depth() {
        let near = cube_at(Vec3::new(0.0, 0.0, 1.0));
        let far = cube_at(Vec3::new(0.0, 0.0, -2.0));
        let mut p = pass();
        p.begin(region(50.0, 50.0, 2.0), 64);
        named(&mut p, PickKind::Node, 1, |p| p.draw_triangles(&far));
        named(&mut p, PickKind::Node, 2, |p| p.draw_triangles(&near));
        let result = p.end();
        assert_eq!(result.hit_count, 2);
        assert!(result.hits[1].min_depth < result.hits[0].min_depth);
    }

    #[test]
    fn y_is_flipped_from_window_coordinates() {
        let high = cube_at(Vec3::new(0.0, 0.8, 0.0));
        let mut p = pass();
        p.begin(region(50.0, 25.0, 2.0), 64);
        named(&mut p, PickKind::Node, 3, |p| p.draw_triangles(&high));
        assert_eq!(p.end().hit_count, 1);
        p.begin(region(50.0, 75.0, 2.0), 64);
        named(&mut p, PickKind::Node, 3, |p| p.draw_triangles(&high));
        assert_eq!(p.end().hit_count, 0);
    }

    #[test]
    fn polyline_hits_across_the_box() {
        let line = [Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)];
        let mut p = pass();
        p.begin(region(50.0, 50.0, 2.0), 64);
        named(&mut p, PickKind::Edge, 4, |p| p.draw_polyline(&line, 4.0));
        let result = p.end();
        assert_eq!(result.hit_count, 1);
        assert_eq!(result.hits[0].names[0], 1);

        p.begin(region(50.0, 10.0, 2.0), 64);
        named(&mut p, PickKind::Edge, 4, |p| p.draw_polyline(&line, 4.0));
        assert_eq!(p.end().hit_count, 0);
    }

    #[test]
    fn geometry_behind_the_camera_is_ignored() {
        let behind = cube_at(Vec3::new(0.0, 0.0, 6.0));
        let mut p = pass();
        p.begin(region(50.0, 50.0, 2.0), 64);
        named(&mut p, PickKind::Node, 5, |p| p.draw_triangles(&behind));
        assert_eq!(p.end().hit_count, 0);
    }

    #[test]
    fn overflow_reports_negative_count() {
        let cube = cube_at(Vec3::ZERO);
        let mut p = pass();
        p.begin(region(50.0, 50.0, 2.0), 6);
        named(&mut p, PickKind::Node, 1, |p| p.draw_triangles(&cube));
        named(&mut p, PickKind::Node, 2, |p| p.draw_triangles(&cube));
        assert_eq!(p.end().hit_count, -1);

        p.begin(region(50.0, 50.0, 2.0), 12);
        named(&mut p, PickKind::Node, 1, |p| p.draw_triangles(&cube));
        named(&mut p, PickKind::Node, 2, |p| p.draw_triangles(&cube));
        assert_eq!(p.end().hit_count, 2);
    }
}
