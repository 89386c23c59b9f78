// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Splitting a face along a cut line.
//!
//! The cut is given as points on the face's boundary half-edges. The face
//! polygon is split with a polygon boolean, the two pieces are matched back
//! to node identities, and the result is submitted as one edit that removes
//! the original face and adds the two halves.
//!
//! Boundary half-edges crossed by the cut are subdivided; each piece inherits
//! the parent half-edge's attributes. When a subdivided half-edge is one side
//! of a portal, the neighbouring face is rebuilt with the same subdivision so
//! the portal stays paired.

use std::collections::BTreeMap;

use nalgebra::Point2;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{abort, Abort, Outcome};
use crate::attributes::Attributes;
use crate::boolean::{split_polygon, Polygon};
use crate::config::EditorConfig;
use crate::error::{Error, Result};
use crate::geometry::distance_to_segment;
use crate::keys::*;
use crate::map::PlanarMap;
use crate::matching::CoordinateMatcher;
use crate::tweak::{DeltaSink, Edit, Tweak};

const OP: &str = "split_face";

/// A point on a boundary half-edge: `head + t * (tail - head)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutPoint {
    pub half_edge: HalfEdgeKey,
    pub t: f64,
}

impl CutPoint {
    pub fn new(half_edge: HalfEdgeKey, t: f64) -> Self {
        Self { half_edge, t }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitResult {
    /// The two new faces, left of the cut first.
    pub faces: [FaceKey; 2],
    /// The new half-edges shared by both faces (each listed once per direction).
    pub cut_edges: Vec<HalfEdgeKey>,
}

/// Outer ring and holes of one piece.
struct NewFace {
    ring: NodeRing,
    holes: Vec<NodeRing>,
}

/// Splits the face bounded by the cut half-edges.
pub fn split_face(
    map: &mut PlanarMap,
    sink: &mut dyn DeltaSink,
    cut: &[CutPoint],
    config: &EditorConfig,
) -> Result<Outcome<SplitResult>> {
    map.ensure_derived();

    if cut.len() < 2 {
        return abort(OP, Abort::InvalidCut("a cut needs at least two points".into()));
    }

    let mut face: Option<FaceKey> = None;
    let mut points = Vec::with_capacity(cut.len());
    for c in cut {
        if map.half_edge(c.half_edge).is_none() {
            return Err(Error::HalfEdgeNotFound(c.half_edge));
        }
        if !(0.0..=1.0).contains(&c.t) {
            return abort(OP, Abort::InvalidCut(format!("t = {} is outside [0, 1]", c.t)));
        }
        let Some(owner) = map.half_edge_face(c.half_edge) else {
            return abort(OP, Abort::NoSharedFace);
        };
        match &face {
            None => face = Some(owner.clone()),
            Some(f) if f != owner => return abort(OP, Abort::NoSharedFace),
            Some(_) => {}
        }
        let p = map
            .half_edge_point(c.half_edge, c.t)
            .ok_or(Error::NodeNotFound(c.half_edge.head))?;
        points.push(p);
    }
    let Some(face) = face else {
        return abort(OP, Abort::EmptySelection);
    };
    let data = map
        .face(&face)
        .cloned()
        .ok_or_else(|| Error::FaceNotFound(face.clone()))?;
    let original_rings: Vec<NodeRing> = std::iter::once(face.clone())
        .chain(data.holes.iter().cloned())
        .collect();

    let polygon = Polygon {
        outer: ring_points(map, &face)?,
        holes: data
            .holes
            .iter()
            .map(|h| ring_points(map, h))
            .collect::<Result<_>>()?,
    };
    let pieces = split_polygon(&polygon, &points, config.split_extent_factor);
    if pieces.len() != 2 {
        return abort(OP, Abort::UnexpectedPolygonCount(pieces.len()));
    }

    // Cut nodes first, so they keep their exact computed coordinates.
    let mut matcher = CoordinateMatcher::for_face(map, &face, config.match_precision)?;
    let mut crossings: BTreeMap<HalfEdgeKey, Vec<(f64, NodeKey)>> = BTreeMap::new();
    for (c, p) in cut.iter().zip(&points) {
        let node = matcher.resolve(map, *p);
        if node != c.half_edge.head && node != c.half_edge.tail {
            crossings.entry(c.half_edge).or_default().push((c.t, node));
        }
    }

    // Parent half-edge → node chain head .. tail through its cut nodes.
    let mut chains: BTreeMap<HalfEdgeKey, Vec<NodeKey>> = BTreeMap::new();
    let mut parent_of: FxHashMap<HalfEdgeKey, HalfEdgeKey> = FxHashMap::default();
    for (h, mut nodes) in crossings {
        nodes.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut chain = vec![h.head];
        for (_, n) in nodes {
            if chain.last() != Some(&n) {
                chain.push(n);
            }
        }
        chain.push(h.tail);
        for w in chain.windows(2) {
            parent_of.insert(HalfEdgeKey::new(w[0], w[1]), h);
        }
        chains.insert(h, chain);
    }

    let matched: Vec<_> = pieces
        .iter()
        .map(|piece| matcher.match_polygon(map, piece))
        .collect();

    let mut positions: FxHashMap<NodeKey, Point2<f64>> =
        matcher.fresh_nodes().iter().copied().collect();
    for ring in &original_rings {
        for &n in ring.corners() {
            if let Some(p) = map.node_position(n) {
                positions.insert(n, p);
            }
        }
    }
    let tolerance = 10f64.powi(-(config.match_precision as i32));
    let restore = |corners: Vec<NodeKey>| {
        restore_dropped_nodes(corners, &original_rings, &positions, tolerance)
    };

    let mut new_faces = Vec::with_capacity(2);
    for m in matched {
        let ring = match NodeRing::from_corners(&restore(m.outer)) {
            Ok(r) => r,
            Err(e) => return abort(OP, Abort::CollapsedTopology(e.to_string())),
        };
        let mut holes = Vec::with_capacity(m.holes.len());
        for h in m.holes {
            match NodeRing::from_corners(&restore(h)) {
                Ok(r) => holes.push(r),
                Err(e) => return abort(OP, Abort::CollapsedTopology(e.to_string())),
            }
        }
        new_faces.push(NewFace { ring, holes });
    }

    let piece_half_edges: Vec<FxHashSet<HalfEdgeKey>> = new_faces
        .iter()
        .map(|f| {
            std::iter::once(&f.ring)
                .chain(f.holes.iter())
                .flat_map(|r| r.half_edges())
                .collect()
        })
        .collect();
    let original_half_edges: FxHashSet<HalfEdgeKey> =
        original_rings.iter().flat_map(|r| r.half_edges()).collect();

    let mut removal = Tweak::remove();
    let mut addition = Tweak::add();
    removal.capture_face(map, &face)?;
    for &h in &original_half_edges {
        removal.capture_half_edge(map, h)?;
    }

    let mut cut_edges = Vec::new();
    for (i, set) in piece_half_edges.iter().enumerate() {
        let other = &piece_half_edges[1 - i];
        for &h in set {
            let attributes = if original_half_edges.contains(&h) {
                explicit_half_edge_attributes(map, h)?
            } else if let Some(parent) = parent_of.get(&h) {
                explicit_half_edge_attributes(map, *parent)?
            } else {
                if other.contains(&h.reversed()) {
                    cut_edges.push(h);
                }
                Attributes::default()
            };
            if !original_half_edges.contains(&h) && map.half_edge(h).is_some() {
                return abort(
                    OP,
                    Abort::CollapsedTopology(format!("half-edge {} already exists", h)),
                );
            }
            addition.insert_half_edge(h, attributes);
        }
    }
    if cut_edges.is_empty() {
        return abort(OP, Abort::InvalidCut("the pieces share no edge".into()));
    }
    cut_edges.sort_unstable();

    for (i, f) in new_faces.iter().enumerate() {
        if f.ring != face && map.face(&f.ring).is_some() {
            return abort(
                OP,
                Abort::CollapsedTopology(format!("face {} already exists", f.ring)),
            );
        }
        if i == 0 {
            addition.insert_face_in_place_of(
                f.ring.clone(),
                f.holes.clone(),
                data.attributes.clone(),
                data.serial,
            );
        } else {
            addition.insert_face(f.ring.clone(), f.holes.clone(), data.attributes.clone());
        }
    }

    let mut used: FxHashSet<NodeKey> = new_faces
        .iter()
        .flat_map(|f| std::iter::once(&f.ring).chain(f.holes.iter()))
        .flat_map(|r| r.corners().iter().copied())
        .collect();

    // Neighbours across subdivided portals get the same subdivision.
    let mut neighbours: BTreeMap<FaceKey, Vec<(HalfEdgeKey, Vec<NodeKey>)>> = BTreeMap::new();
    for (h, chain) in &chains {
        let r = h.reversed();
        let Some(owner) = map.claiming_face(r) else {
            continue;
        };
        if *owner == face {
            continue;
        }
        let reversed_chain: Vec<NodeKey> = chain.iter().rev().copied().collect();
        neighbours
            .entry(owner.clone())
            .or_default()
            .push((r, reversed_chain));
    }
    for (neighbour, splices) in neighbours {
        let Some(nd) = map.face(&neighbour).cloned() else {
            continue;
        };
        let splice_map: FxHashMap<HalfEdgeKey, &[NodeKey]> = splices
            .iter()
            .map(|(r, chain)| (*r, &chain[1..chain.len() - 1]))
            .collect();

        let mut rebuilt = Vec::with_capacity(1 + nd.holes.len());
        for ring in std::iter::once(&neighbour).chain(nd.holes.iter()) {
            let mut corners = Vec::with_capacity(ring.len() + 2);
            for h in ring.half_edges() {
                corners.push(h.head);
                if let Some(inner) = splice_map.get(&h) {
                    corners.extend_from_slice(inner);
                }
            }
            match NodeRing::from_corners(&corners) {
                Ok(r) => rebuilt.push(r),
                Err(e) => return abort(OP, Abort::CollapsedTopology(e.to_string())),
            }
        }
        let new_ring = rebuilt.remove(0);

        removal.capture_face(map, &neighbour)?;
        for (r, chain) in &splices {
            removal.capture_half_edge(map, *r)?;
            let attributes = explicit_half_edge_attributes(map, *r)?;
            for w in chain.windows(2) {
                let sub = HalfEdgeKey::new(w[0], w[1]);
                if map.half_edge(sub).is_some() {
                    return abort(
                        OP,
                        Abort::CollapsedTopology(format!("half-edge {} already exists", sub)),
                    );
                }
                addition.insert_half_edge(sub, attributes.clone());
            }
            used.extend(chain.iter().copied());
        }
        addition.insert_face_in_place_of(new_ring, rebuilt, nd.attributes.clone(), nd.serial);
    }

    for (key, p) in matcher.fresh_nodes() {
        if used.contains(key) {
            addition.insert_node(*key, *p, Attributes::default());
        }
    }

    // Original nodes the boolean dropped and nothing else references.
    for ring in &original_rings {
        for &n in ring.corners() {
            if used.contains(&n) || removal.nodes.contains_key(&n) {
                continue;
            }
            let orphaned = map.incident_half_edges(n).all(|h| {
                removal.half_edges.contains_key(&h) && !addition.half_edges.contains_key(&h)
            });
            if orphaned {
                removal.capture_node(map, n)?;
            }
        }
    }

    let faces = [new_faces[0].ring.clone(), new_faces[1].ring.clone()];
    sink.submit(map, Edit::new("Split face").with(removal).with(addition))?;
    Ok(Outcome::Applied(SplitResult { faces, cut_edges }))
}

fn ring_points(map: &PlanarMap, ring: &NodeRing) -> Result<Vec<Point2<f64>>> {
    ring.corners()
        .iter()
        .map(|&n| map.node_position(n).ok_or(Error::NodeNotFound(n)))
        .collect()
}

fn explicit_half_edge_attributes(map: &PlanarMap, h: HalfEdgeKey) -> Result<Attributes> {
    map.half_edge(h)
        .map(|d| d.attributes.clone())
        .ok_or(Error::HalfEdgeNotFound(h))
}

/// Boolean output drops collinear vertices. Puts back original ring nodes
/// that lie on a piece's edge between two of its consecutive corners.
fn restore_dropped_nodes(
    corners: Vec<NodeKey>,
    originals: &[NodeRing],
    positions: &FxHashMap<NodeKey, Point2<f64>>,
    tolerance: f64,
) -> Vec<NodeKey> {
    let n = corners.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let (u, v) = (corners[i], corners[(i + 1) % n]);
        out.push(u);
        if let Some(between) = original_path(u, v, originals, positions, tolerance) {
            out.extend(between);
        }
    }
    out
}

fn original_path(
    u: NodeKey,
    v: NodeKey,
    originals: &[NodeRing],
    positions: &FxHashMap<NodeKey, Point2<f64>>,
    tolerance: f64,
) -> Option<Vec<NodeKey>> {
    let pu = *positions.get(&u)?;
    let pv = *positions.get(&v)?;
    for ring in originals {
        let corners = ring.corners();
        let m = corners.len();
        let Some(start) = corners.iter().position(|&k| k == u) else {
            continue;
        };
        let mut between = Vec::new();
        for step in 1..m {
            let k = corners[(start + step) % m];
            if k == v {
                return (!between.is_empty()).then_some(between);
            }
            let p = positions.get(&k)?;
            if distance_to_segment(*p, pu, pv) > tolerance {
                break;
            }
            between.push(k);
        }
    }
    None
}
