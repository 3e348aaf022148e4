use std::collections::BTreeSet;

use nodescape_geometry::Vec3;
use serde::Serialize;
use tracing::{debug, warn};

use crate::shapes::ShapeMesh;

/// Words one hit record takes in the hit buffer: name count, min depth, max
/// depth, then the type/upper/lower names.
pub const WORDS_PER_HIT: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PickKind {
    Node = 0,
    Edge = 1,
}

impl PickKind {
    pub fn ordinal(self) -> u32 {
        self as u32
    }

    pub fn from_ordinal(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Node),
            1 => Some(Self::Edge),
            _ => None,
        }
    }
}

pub fn split_id(id: i64) -> (u32, u32) {
    let bits = id as u64;
    ((bits >> 32) as u32, (bits & 0xFFFF_FFFF) as u32)
}

pub fn combine_id(upper: u32, lower: u32) -> i64 {
    ((u64::from(upper) << 32) | u64::from(lower)) as i64
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PickRegion {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PickRequest {
    pub region: PickRegion,
    pub select_all: bool,
}

impl PickRequest {
    pub fn point(x: f64, y: f64, box_size: f64) -> Self {
        let size = box_size.max(1.0);
        Self {
            region: PickRegion {
                center_x: x,
                center_y: y,
                width: size,
                height: size,
            },
            select_all: false,
        }
    }

    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            region: PickRegion {
                center_x: (x0 + x1) * 0.5,
                center_y: (y0 + y1) * 0.5,
                width: (x1 - x0).abs().max(1.0),
                height: (y1 - y0).abs().max(1.0),
            },
            select_all: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HitRecord {
    pub names: Vec<u32>,
    pub min_depth: u32,
    pub max_depth: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionResult {
    /// Number of valid records, negative when the buffer overflowed.
    pub hit_count: i32,
    pub hits: Vec<HitRecord>,
}

/// Selection-mode rendering: primitives drawn between `begin` and `end`
/// are reported with the name stack that was active while they hit the pick
/// region.
pub trait SelectionPass {
    fn begin(&mut self, region: PickRegion, capacity_words: usize);
    fn push_name(&mut self, name: u32);
    fn pop_name(&mut self);
    fn draw_triangles(&mut self, triangles: &[[Vec3; 3]]);
    fn draw_polyline(&mut self, points: &[Vec3], width_px: f64);
    fn end(&mut self) -> SelectionResult;
}

#[derive(Clone, Debug)]
pub struct PickableNode<'a> {
    pub id: i64,
    pub position: Vec3,
    pub size: Vec3,
    pub mesh: &'a ShapeMesh,
}

#[derive(Clone, Copy, Debug)]
pub struct PickableEdge<'a> {
    pub id: i64,
    pub points: &'a [Vec3],
}

#[derive(Clone, Debug, Default)]
pub struct PickScene<'a> {
    pub nodes: Vec<PickableNode<'a>>,
    pub edges: Vec<PickableEdge<'a>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PickingState {
    pub closest_node: Option<i64>,
    pub closest_edge: Option<i64>,
    pub nodes: BTreeSet<i64>,
    pub edges: BTreeSet<i64>,
    /// Set when the hit buffer overflowed and the result was discarded.
    pub degraded: bool,
}

impl PickingState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.closest_node.is_none()
            && self.closest_edge.is_none()
            && self.nodes.is_empty()
            && self.edges.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ShapePickingProcessor {
    state: PickingState,
    single_buffer_words: usize,
    edge_width_px: f64,
}

impl Default for ShapePickingProcessor {
    fn default() -> Self {
        Self::new(256, 4.0)
    }
}

impl ShapePickingProcessor {
    pub fn new(single_buffer_words: usize, edge_width_px: f64) -> Self {
        Self {
            state: PickingState::default(),
            single_buffer_words: single_buffer_words.max(WORDS_PER_HIT),
            edge_width_px,
        }
    }

    pub fn state(&self) -> &PickingState {
        &self.state
    }

    pub fn pick(
        &mut self,
        pass: &mut dyn SelectionPass,
        scene: &PickScene<'_>,
        request: PickRequest,
    ) -> &PickingState {
        self.state.clear();

        let capacity = if request.select_all {
            (scene.nodes.len() + scene.edges.len()).max(1) * WORDS_PER_HIT
        } else {
            self.single_buffer_words
        };

        pass.begin(request.region, capacity);
        let mut scratch = Vec::new();
        for node in &scene.nodes {
            scratch.clear();
            scratch.extend(node.mesh.triangles.iter().map(|tri| {
                tri.map(|v| node.position + v.mul_components(node.size))
            }));
            with_names(pass, PickKind::Node, node.id, |pass| pass.draw_triangles(&scratch));
        }
        for edge in &scene.edges {
            if edge.points.len() < 2 {
                continue;
            }
            let width = self.edge_width_px;
            with_names(pass, PickKind::Edge, edge.id, |pass| {
                pass.draw_polyline(edge.points, width)
            });
        }
        let result = pass.end();

        if result.hit_count < 0 {
            warn!(
                capacity,
                select_all = request.select_all,
                "pick hit buffer overflowed, discarding hits"
            );
            self.state.degraded = true;
            return &self.state;
        }

        let count = usize::try_from(result.hit_count).unwrap_or(0);
        let hits = result.hits.iter().take(count).filter_map(decode_hit);
        if request.select_all {
            for (kind, id, _) in hits {
                match kind {
                    PickKind::Node => self.state.nodes.insert(id),
                    PickKind::Edge => self.state.edges.insert(id),
                };
            }
        } else if let Some((kind, id, _)) = closest_hit(hits) {
            match kind {
                PickKind::Node => self.state.closest_node = Some(id),
                PickKind::Edge => self.state.closest_edge = Some(id),
            }
        }
        debug!(hits = count, state = ?self.state, "pick resolved");
        &self.state
    }
}

fn with_names(
    pass: &mut dyn SelectionPass,
    kind: PickKind,
    id: i64,
    draw: impl FnOnce(&mut dyn SelectionPass),
) {
    let (upper, lower) = split_id(id);
    pass.push_name(kind.ordinal());
    pass.push_name(upper);
    pass.push_name(lower);
    draw(pass);
    pass.pop_name();
    pass.pop_name();
    pass.pop_name();
}

fn decode_hit(record: &HitRecord) -> Option<(PickKind, i64, u32)> {
    let [kind, upper, lower] = record.names.get(..3)? else {
        return None;
    };
    let kind = PickKind::from_ordinal(*kind)?;
    Some((kind, combine_id(*upper, *lower), record.min_depth))
}

/// Nearest hit by min depth; at equal depth the lower type ordinal wins.
pub fn closest_hit(
    hits: impl IntoIterator<Item = (PickKind, i64, u32)>,
) -> Option<(PickKind, i64, u32)> {
    hits.into_iter()
        .min_by_key(|(kind, _, depth)| (*depth, kind.ordinal()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays canned hits regardless of geometry.
    #[derive(Default)]
    struct ScriptedPass {
        hit_count: i32,
        hits: Vec<HitRecord>,
        capacity: usize,
        names_pushed: usize,
    }

    impl SelectionPass for ScriptedPass {
        fn begin(&mut self, _region: PickRegion, capacity_words: usize) {
            self.capacity = capacity_words;
        }
        fn push_name(&mut self, _name: u32) {
            self.names_pushed += 1;
        }
        fn pop_name(&mut self) {}
        fn draw_triangles(&mut self, _triangles: &[[Vec3; 3]]) {}
        fn draw_polyline(&mut self, _points: &[Vec3], _width_px: f64) {}
        fn end(&mut self) -> SelectionResult {
            SelectionResult {
                hit_count: self.hit_count,
                hits: self.hits.clone(),
            }
        }
    }

    fn hit(kind: PickKind, id: i64, depth: u32) -> HitRecord {
        let (upper, lower) = split_id(id);
        HitRecord {
            names: vec![kind.ordinal(), upper, lower],
            min_depth: depth,
            max_depth: depth,
        }
    }

    fn scripted(hits: Vec<HitRecord>) -> ScriptedPass {
        ScriptedPass {
            hit_count: hits.len() as i32,
            hits,
            ..ScriptedPass::default()
        }
    }

    #[test]
    fn id_split_round_trips_extremes() {
        for id in [0, 1, -1, i64::MAX, i64::MIN, 0x1234_5678_9ABC_DEF0, -4_294_967_296] {
            let (upper, lower) = split_id(id);
            assert_eq!(combine_id(upper, lower), id);
        }
        assert_eq!(split_id(-1), (u32::MAX, u32::MAX));
        assert_eq!(split_id(1 << 32), (1, 0));
    }

    #[test]
    fn single_pick_keeps_the_nearest() {
        let mut pass = scripted(vec![
            hit(PickKind::Edge, 4, 900),
            hit(PickKind::Node, 7, 500),
            hit(PickKind::Node, 8, 700),
        ]);
        let mut processor = ShapePickingProcessor::default();
        let state = processor.pick(&mut pass, &PickScene::default(), PickRequest::point(1.0, 1.0, 2.0));
        assert_eq!(state.closest_node, Some(7));
        assert_eq!(state.closest_edge, None);
    }

    #[test]
    fn node_wins_a_depth_tie() {
        let mut pass = scripted(vec![hit(PickKind::Edge, 3, 100), hit(PickKind::Node, 9, 100)]);
        let mut processor = ShapePickingProcessor::default();
        let state = processor.pick(&mut pass, &PickScene::default(), PickRequest::point(0.0, 0.0, 2.0));
        assert_eq!(state.closest_node, Some(9));
        assert_eq!(state.closest_edge, None);
    }

    #[test]
    fn nearer_edge_beats_farther_node() {
        let mut pass = scripted(vec![hit(PickKind::Node, 9, 200), hit(PickKind::Edge, 3, 100)]);
        let mut processor = ShapePickingProcessor::default();
        let state = processor.pick(&mut pass, &PickScene::default(), PickRequest::point(0.0, 0.0, 2.0));
        assert_eq!(state.closest_edge, Some(3));
        assert_eq!(state.closest_node, None);
    }

    #[test]
    fn multi_pick_takes_the_union() {
        let mut pass = scripted(vec![
            hit(PickKind::Node, 1, 10),
            hit(PickKind::Node, 2, 20),
            hit(PickKind::Edge, -5, 30),
            hit(PickKind::Node, 1, 40),
        ]);
        let mut processor = ShapePickingProcessor::default();
        let state = processor.pick(&mut pass, &PickScene::default(), PickRequest::rect(0.0, 0.0, 50.0, 40.0));
        assert_eq!(state.nodes.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(state.edges.iter().copied().collect::<Vec<_>>(), vec![-5]);
        assert!(state.closest_node.is_none());
    }

    #[test]
    fn overflow_degrades_to_empty() {
        let mut pass = scripted(vec![hit(PickKind::Node, 1, 10)]);
        pass.hit_count = -1;
        let mut processor = ShapePickingProcessor::default();
        let state = processor.pick(&mut pass, &PickScene::default(), PickRequest::point(0.0, 0.0, 2.0));
        assert!(state.degraded);
        assert!(state.is_empty());

        let mut pass = scripted(vec![hit(PickKind::Node, 1, 10)]);
        let state = processor.pick(&mut pass, &PickScene::default(), PickRequest::point(0.0, 0.0, 2.0));
        assert!(!state.degraded);
        assert_eq!(state.closest_node, Some(1));
    }

    #[test]
    fn malformed_records_are_ignored() {
        let mut pass = scripted(vec![
            HitRecord {
                names: vec![0, 1],
                min_depth: 0,
                max_depth: 0,
            },
            HitRecord {
                names: vec![7, 0, 3],
                min_depth: 0,
                max_depth: 0,
            },
            hit(PickKind::Edge, 12, 50),
        ]);
        let mut processor = ShapePickingProcessor::default();
        let state = processor.pick(&mut pass, &PickScene::default(), PickRequest::point(0.0, 0.0, 2.0));
        assert_eq!(state.closest_edge, Some(12));
    }

    #[test]
    fn multi_pick_capacity_scales_with_scene() {
        let mesh = ShapeMesh { triangles: Vec::new() };
        let points = [Vec3::ZERO, Vec3::X];
        let scene = PickScene {
            nodes: (0..5)
                .map(|id| PickableNode {
                    id,
                    position: Vec3::ZERO,
                    size: Vec3::new(1.0, 1.0, 1.0),
                    mesh: &mesh,
                })
                .collect(),
            edges: vec![PickableEdge { id: 9, points: &points }],
        };
        let mut pass = scripted(Vec::new());
        let mut processor = ShapePickingProcessor::new(64, 4.0);
        processor.pick(&mut pass, &scene, PickRequest::rect(0.0, 0.0, 10.0, 10.0));
        assert_eq!(pass.capacity, 6 * WORDS_PER_HIT);
        assert_eq!(pass.names_pushed, 6 * 3);
        processor.pick(&mut pass, &scene, PickRequest::point(0.0, 0.0, 2.0));
        assert_eq!(pass.capacity, 64);
    }
}
