use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use nodescape_base::EdgeConfig;
use nodescape_geometry::{HostUnits, Vec3};
use serde::Serialize;
use tracing::{debug, warn};

use crate::graph::{GraphSnapshot, LineStyle};

const MAX_DASH_SAMPLES: usize = 4096;

/// Unordered node pair, `pair_key(a, b) == pair_key(b, a)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey {
    low: usize,
    high: usize,
}

impl PairKey {
    pub fn low(&self) -> usize {
        self.low
    }

    pub fn high(&self) -> usize {
        self.high
    }
}

pub fn pair_key(a: usize, b: usize) -> PairKey {
    PairKey {
        low: a.min(b),
        high: a.max(b),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Curvature {
    pub level: u32,
    pub edges_in_level: u32,
    pub radius: f64,
    pub angle: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EdgeRenderRecord {
    pub edge_id: i64,
    pub source: i64,
    pub target: i64,
    pub pair: PairKey,
    /// 1-based position among the edges sharing `pair`, in encounter order.
    pub rank: u32,
    pub total: u32,
    pub self_loop: bool,
    pub straight: bool,
    pub start: Vec3,
    pub end: Vec3,
    pub sufficient_length: bool,
    pub style: LineStyle,
    pub selected: bool,
    pub visible: bool,
    pub curvature: Option<Curvature>,
    pub points: Vec<Vec3>,
}

#[derive(Clone, Debug, Default)]
pub struct EdgeAnalyzer {
    config: EdgeConfig,
    records: Vec<EdgeRenderRecord>,
}

impl EdgeAnalyzer {
    pub fn new(config: EdgeConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[EdgeRenderRecord] {
        &self.records
    }

    pub fn analyze(&mut self, snapshot: &GraphSnapshot, units: HostUnits) -> &[EdgeRenderRecord] {
        self.records.clear();
        let mut counts: HashMap<PairKey, u32> = HashMap::new();

        for edge in snapshot.edges() {
            let (Some(source_idx), Some(target_idx)) =
                (snapshot.node_index(edge.source), snapshot.node_index(edge.target))
            else {
                warn!(
                    edge = edge.id,
                    source = edge.source,
                    target = edge.target,
                    "edge endpoint missing from snapshot, skipping"
                );
                continue;
            };
            let source = &snapshot.nodes()[source_idx];
            let target = &snapshot.nodes()[target_idx];

            let pair = pair_key(source_idx, target_idx);
            let count = counts.entry(pair).or_insert(0);
            *count += 1;
            let rank = *count;

            let self_loop = source_idx == target_idx;
            let start = units.to_internal(source.x, source.y, source.z);
            let end = units.to_internal(target.x, target.y, target.z);
            let sufficient_length = self_loop || start.distance(end) >= f64::EPSILON;

            self.records.push(EdgeRenderRecord {
                edge_id: edge.id,
                source: edge.source,
                target: edge.target,
                pair,
                rank,
                total: 0,
                self_loop,
                straight: false,
                start,
                end,
                sufficient_length,
                style: edge.style,
                selected: edge.selected,
                visible: edge.visible && source.visible && target.visible,
                curvature: None,
                points: Vec::new(),
            });
        }

        for record in &mut self.records {
            record.total = counts.get(&record.pair).copied().unwrap_or(1);
            record.straight = record.total == 1 && !record.self_loop;

            if !record.sufficient_length {
                debug!(edge = record.edge_id, "edge endpoints coincide, no geometry");
                continue;
            }

            if record.straight {
                record.points = straight_points(record.start, record.end, record.style, &self.config);
                continue;
            }

            let separation = record.start.distance(record.end);
            let curvature = curvature(record.rank, record.total, record.self_loop, separation, &self.config);
            let (center, normal_hint) =
                circle_center(record.start, record.end, &curvature, record.self_loop);
            let segments = if record.self_loop {
                self.config.self_loop_segments
            } else {
                self.config.arc_segments
            };
            record.points = arc_points(
                record.start,
                record.end,
                center,
                normal_hint,
                segments,
                record.self_loop,
            );
            record.curvature = Some(curvature);
        }

        debug!(edges = self.records.len(), pairs = counts.len(), "edge analysis complete");
        &self.records
    }
}

/// Level of `rank` and how many edges share that level given `total`
/// parallel edges. Level `L` holds ranks `L²..=L²+2L`; the outermost level
/// only holds what is left.
pub fn curvature_level(rank: u32, total: u32) -> (u32, u32) {
    let rank = rank.max(1);
    let total = total.max(rank);
    let level = rank.isqrt();
    let max_level = total.isqrt();
    let edges_in_level = if level == max_level {
        total - max_level * max_level + 1
    } else {
        level * 2 + 1
    };
    (level, edges_in_level)
}

pub fn curvature(rank: u32, total: u32, self_loop: bool, separation: f64, config: &EdgeConfig) -> Curvature {
    let (level, edges_in_level) = curvature_level(rank, total);
    let level_f = f64::from(level);
    let radius = if self_loop {
        config.self_loop_min_radius + config.self_loop_radius_factor * level_f.powf(1.25)
    } else {
        separation * (0.5 + 3.5 / (level_f * level_f))
    };
    let mut angle = f64::from(rank.max(1) - level * level) / f64::from(edges_in_level) * TAU;
    if level % 2 == 0 {
        angle += PI;
    }
    Curvature {
        level,
        edges_in_level,
        radius,
        angle,
    }
}

pub fn circle_center(start: Vec3, end: Vec3, curvature: &Curvature, self_loop: bool) -> (Vec3, Vec3) {
    let chord = end - start;
    let radius = curvature.radius;

    let Some(chord_dir) = chord.try_normalized().filter(|_| !self_loop) else {
        let offset = Vec3::Y.rotated(Vec3::Z, curvature.angle);
        return (start + offset * radius, Vec3::Z);
    };

    let mut reference = chord_dir.cross(Vec3::Z);
    if reference.length() <= 1.0e-9 {
        reference = chord_dir.cross(Vec3::Y);
    }
    let side = reference.normalized().rotated(chord_dir, curvature.angle);
    let axis = chord_dir.cross(side).normalized();

    let length = chord.length();
    let cos_double = (1.0 - (length * length) / (2.0 * radius * radius)).clamp(-1.0, 1.0);
    let half_angle = cos_double.acos() * 0.5;
    let to_center = chord_dir.rotated(axis, FRAC_PI_2 - half_angle);
    (start + to_center * radius, axis)
}

/// Samples the circular arc around `center` from `start` to `end`. With
/// `invert` the long way round is taken, which turns coincident endpoints
/// into a full loop.
pub fn arc_points(start: Vec3, end: Vec3, center: Vec3, normal_hint: Vec3, segments: usize, invert: bool) -> Vec<Vec3> {
    let segments = segments.max(1);
    let start_offset = start - center;
    let end_offset = end - center;

    let mut angle = start_offset.angle_to(end_offset);
    let mut normal = start_offset.cross(end_offset);
    let scale = start_offset.length_squared().max(f64::MIN_POSITIVE);
    if normal.length_squared() <= 1.0e-24 * scale * scale {
        normal = normal_hint;
    }
    if invert {
        angle = TAU - angle;
        normal = -normal;
    }

    let mut points = Vec::with_capacity(segments + 1);
    points.push(start);
    for i in 1..segments {
        let t = i as f64 / segments as f64;
        points.push(center + start_offset.rotated(normal, angle * t));
    }
    points.push(end);
    points
}

/// Straight polyline. Dashed and dotted lines are sampled outward from the
/// midpoint.
pub fn straight_points(start: Vec3, end: Vec3, style: LineStyle, config: &EdgeConfig) -> Vec<Vec3> {
    let spacing = match style {
        LineStyle::Solid => {
            let segments = config.straight_segments.max(1);
            return (0..=segments)
                .map(|i| {
                    if i == segments {
                        end
                    } else {
                        start.lerp(end, i as f64 / segments as f64)
                    }
                })
                .collect();
        }
        LineStyle::Dashed => config.dash_spacing,
        LineStyle::Dotted => config.dot_spacing,
    };

    let length = start.distance(end);
    let dir = (end - start).normalized();
    let mid = start.lerp(end, 0.5);
    let half = length * 0.5;
    let steps = ((half / spacing).floor() as usize).min(MAX_DASH_SAMPLES);

    let mut points = Vec::with_capacity(steps * 2 + 3);
    points.push(start);
    for k in -(steps as i64)..=(steps as i64) {
        let offset = k as f64 * spacing;
        if half - offset.abs() <= 1.0e-12 {
            continue;
        }
        points.push(mid + dir * offset);
    }
    points.push(end);
    points
}
