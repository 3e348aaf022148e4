use std::collections::HashMap;
use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use nodescape_geometry::Vec3;
use serde::Serialize;
use tracing::debug;

use crate::graph::NodeShape;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ShapeKind {
    Sphere,
    Cube,
    Tetrahedron,
}

impl From<NodeShape> for ShapeKind {
    fn from(shape: NodeShape) -> Self {
        match shape {
            NodeShape::Ellipse => Self::Sphere,
            NodeShape::Rectangle => Self::Cube,
            NodeShape::Triangle => Self::Tetrahedron,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DetailLevel {
    Low,
    High,
}

pub type ShapeKey = (ShapeKind, DetailLevel);

#[derive(Clone, Debug, PartialEq)]
pub struct ShapeMesh {
    pub triangles: Vec<[Vec3; 3]>,
}

#[derive(Debug, Default)]
pub struct ShapeCache {
    meshes: HashMap<ShapeKey, Arc<ShapeMesh>>,
}

impl ShapeCache {
    pub fn initialize(&mut self) {
        if !self.meshes.is_empty() {
            return;
        }
        for kind in [ShapeKind::Sphere, ShapeKind::Cube, ShapeKind::Tetrahedron] {
            for detail in [DetailLevel::Low, DetailLevel::High] {
                self.meshes.insert((kind, detail), Arc::new(build_mesh(kind, detail)));
            }
        }
        debug!(entries = self.meshes.len(), "shape cache built");
    }

    /// Drops every handle. Call when the owning context is lost and
    /// `initialize` again once it is back.
    pub fn invalidate(&mut self) {
        self.meshes.clear();
        debug!("shape cache invalidated");
    }

    pub fn is_initialized(&self) -> bool {
        !self.meshes.is_empty()
    }

    pub fn get(&self, kind: ShapeKind, detail: DetailLevel) -> Option<Arc<ShapeMesh>> {
        self.meshes.get(&(kind, detail)).cloned()
    }
}

fn build_mesh(kind: ShapeKind, detail: DetailLevel) -> ShapeMesh {
    let triangles = match kind {
        ShapeKind::Sphere => {
            let (stacks, slices) = match detail {
                DetailLevel::Low => (6, 8),
                DetailLevel::High => (12, 16),
            };
            sphere(stacks, slices)
        }
        ShapeKind::Cube => cube(),
        ShapeKind::Tetrahedron => tetrahedron(),
    };
    ShapeMesh { triangles }
}

fn sphere(stacks: usize, slices: usize) -> Vec<[Vec3; 3]> {
    let point = |stack: usize, slice: usize| {
        let polar = PI * stack as f64 / stacks as f64;
        let azimuth = TAU * slice as f64 / slices as f64;
        Vec3::new(
            polar.sin() * azimuth.cos(),
            polar.cos(),
            polar.sin() * azimuth.sin(),
        ) * 0.5
    };
    let mut triangles = Vec::with_capacity(stacks * slices * 2);
    for stack in 0..stacks {
        for slice in 0..slices {
            let a = point(stack, slice);
            let b = point(stack + 1, slice);
            let c = point(stack + 1, slice + 1);
            let d = point(stack, slice + 1);
            if stack != 0 {
                triangles.push([a, c, d]);
            }
            if stack + 1 != stacks {
                triangles.push([a, b, c]);
            }
        }
    }
    triangles
}

fn cube() -> Vec<[Vec3; 3]> {
    let h = 0.5;
    let corners = [
        Vec3::new(-h, -h, -h),
        Vec3::new(h, -h, -h),
        Vec3::new(h, h, -h),
        Vec3::new(-h, h, -h),
        Vec3::new(-h, -h, h),
        Vec3::new(h, -h, h),
        Vec3::new(h, h, h),
        Vec3::new(-h, h, h),
    ];
    let faces = [
        [0, 3, 2, 1],
        [4, 5, 6, 7],
        [0, 1, 5, 4],
        [2, 3, 7, 6],
        [1, 2, 6, 5],
        [0, 4, 7, 3],
    ];
    faces
        .iter()
        .flat_map(|f| {
            [
                [corners[f[0]], corners[f[1]], corners[f[2]]],
                [corners[f[0]], corners[f[2]], corners[f[3]]],
            ]
        })
        .collect()
}

fn tetrahedron() -> Vec<[Vec3; 3]> {
    let h = 0.5;
    let v = [
        Vec3::new(h, h, h),
        Vec3::new(-h, -h, h),
        Vec3::new(-h, h, -h),
        Vec3::new(h, -h, -h),
    ];
    vec![
        [v[0], v[1], v[2]],
        [v[0], v[3], v[1]],
        [v[0], v[2], v[3]],
        [v[1], v[3], v[2]],
    ]
}
