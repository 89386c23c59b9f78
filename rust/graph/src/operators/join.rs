// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Welding open boundary half-edges into portals.
//!
//! Two open half-edges of different faces that run in roughly opposite
//! directions and lie close together are paired. Their endpoints are welded
//! (head of one with tail of the other) into new nodes at the mean position,
//! and every half-edge and face that touched a welded node is rewritten to use
//! the new nodes. The pair then shares a node pair in opposite directions,
//! which is a portal.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::Point2;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::{abort, Abort, Outcome};
use crate::config::EditorConfig;
use crate::disjoint::DisjointSet;
use crate::error::{Error, Result};
use crate::keys::*;
use crate::map::PlanarMap;
use crate::tweak::{DeltaSink, Edit, Tweak};

const OP: &str = "join_edges";

#[derive(Debug, Clone, PartialEq)]
pub struct JoinResult {
    /// The new portals, one `(a, b)` pair per joined pair.
    pub portals: Vec<(HalfEdgeKey, HalfEdgeKey)>,
    /// Nodes created by welding.
    pub new_nodes: Vec<NodeKey>,
}

/// Joins pairs among `half_edges`.
///
/// Half-edges that are not face-owned or already have a reverse are ignored.
/// Pairing is greedy by midpoint distance.
pub fn join_edges(
    map: &mut PlanarMap,
    sink: &mut dyn DeltaSink,
    half_edges: &[HalfEdgeKey],
    config: &EditorConfig,
) -> Result<Outcome<JoinResult>> {
    map.ensure_derived();

    let mut candidates: Vec<HalfEdgeKey> = Vec::with_capacity(half_edges.len());
    for &h in half_edges {
        if map.half_edge(h).is_none() {
            return Err(Error::HalfEdgeNotFound(h));
        }
        if map.half_edge_face(h).is_none() || map.reversed(h).is_some() {
            debug!(half_edge = %h, "skipping half-edge that is not an open face boundary");
            continue;
        }
        if !candidates.contains(&h) {
            candidates.push(h);
        }
    }

    let pairs = pick_pairs(map, &candidates, config);
    if pairs.is_empty() {
        return abort(OP, Abort::NoCandidates);
    }

    let mut welds = DisjointSet::new();
    for (a, b) in &pairs {
        welds.union(a.head, b.tail);
        welds.union(a.tail, b.head);
    }

    let mut removal = Tweak::remove();
    let mut addition = Tweak::add();
    let mut mapping: FxHashMap<NodeKey, NodeKey> = FxHashMap::default();
    let mut new_nodes = Vec::new();
    for class in welds.classes() {
        let mut sum = Point2::origin().coords;
        for &member in &class {
            let p = map.node_position(member).ok_or(Error::NodeNotFound(member))?;
            sum += p.coords;
            removal.capture_node(map, member)?;
        }
        let position = Point2::from(sum / class.len() as f64);
        let attributes = map
            .node(class[0])
            .map(|n| n.attributes.clone())
            .unwrap_or_default();

        let key = map.allocate_node_key();
        addition.insert_node(key, position, attributes);
        for member in class {
            mapping.insert(member, key);
        }
        new_nodes.push(key);
    }
    let remap = |n: NodeKey| mapping.get(&n).copied().unwrap_or(n);

    let affected: BTreeSet<HalfEdgeKey> = mapping
        .keys()
        .flat_map(|&n| map.incident_half_edges(n))
        .collect();
    let affected_faces: BTreeSet<FaceKey> = affected
        .iter()
        .filter_map(|h| map.claiming_face(*h).cloned())
        .collect();

    for &h in &affected {
        removal.capture_half_edge(map, h)?;
        let rewritten = HalfEdgeKey::new(remap(h.head), remap(h.tail));
        if rewritten.head == rewritten.tail {
            continue;
        }
        if addition.half_edges.contains_key(&rewritten) {
            return abort(
                OP,
                Abort::CollapsedTopology(format!("two half-edges merge into {}", rewritten)),
            );
        }
        let attributes = map
            .half_edge(h)
            .map(|d| d.attributes.clone())
            .unwrap_or_default();
        addition.insert_half_edge(rewritten, attributes);
    }

    let portals: Vec<(HalfEdgeKey, HalfEdgeKey)> = pairs
        .iter()
        .map(|(a, b)| {
            (
                HalfEdgeKey::new(remap(a.head), remap(a.tail)),
                HalfEdgeKey::new(remap(b.head), remap(b.tail)),
            )
        })
        .collect();
    let bridges: BTreeSet<HalfEdgeKey> = portals.iter().flat_map(|(a, b)| [*a, *b]).collect();

    let mut rewritten_faces: BTreeMap<FaceKey, ()> = BTreeMap::new();
    for face in &affected_faces {
        let data = map
            .face(face)
            .cloned()
            .ok_or_else(|| Error::FaceNotFound(face.clone()))?;
        removal.capture_face(map, face)?;

        let mut outer = match remap_ring(face, &remap) {
            Ok(r) => r,
            Err(why) => return abort(OP, Abort::CollapsedTopology(why)),
        };
        if let Some(bridge) = bridges.iter().find(|b| outer.half_edges().any(|h| h == **b)) {
            if let Some(rotated) = outer.rotated_to_half_edge(*bridge) {
                outer = rotated;
            }
        }
        let mut holes = Vec::with_capacity(data.holes.len());
        for hole in &data.holes {
            match remap_ring(hole, &remap) {
                Ok(r) => holes.push(r),
                Err(why) => return abort(OP, Abort::CollapsedTopology(why)),
            }
        }

        let collides = map.face(&outer).is_some() && !affected_faces.contains(&outer);
        if collides || rewritten_faces.insert(outer.clone(), ()).is_some() {
            return abort(
                OP,
                Abort::CollapsedTopology(format!("face {} would exist twice", outer)),
            );
        }
        addition.insert_face_in_place_of(outer, holes, data.attributes, data.serial);
    }

    debug!(
        pairs = portals.len(),
        welded = mapping.len(),
        faces = affected_faces.len(),
        "joining half-edges"
    );
    sink.submit(map, Edit::new("Join edges").with(removal).with(addition))?;
    Ok(Outcome::Applied(JoinResult { portals, new_nodes }))
}

/// Greedy nearest-first pairing of opposed half-edges of different faces.
fn pick_pairs(
    map: &PlanarMap,
    candidates: &[HalfEdgeKey],
    config: &EditorConfig,
) -> Vec<(HalfEdgeKey, HalfEdgeKey)> {
    let mut scored = Vec::new();
    for (i, &a) in candidates.iter().enumerate() {
        for &b in &candidates[i + 1..] {
            if map.half_edge_face(a) == map.half_edge_face(b) {
                continue;
            }
            let (Some(va), Some(vb)) = (map.half_edge_vector(a), map.half_edge_vector(b)) else {
                continue;
            };
            if va.norm() == 0.0 || vb.norm() == 0.0 {
                continue;
            }
            if va.normalize().dot(&vb.normalize()) > config.join_min_opposition {
                continue;
            }
            let (Some(ma), Some(mb)) = (map.half_edge_midpoint(a), map.half_edge_midpoint(b))
            else {
                continue;
            };
            let distance = (ma - mb).norm();
            if distance <= config.join_distance_threshold {
                scored.push((distance, a, b));
            }
        }
    }
    scored.sort_by(|x, y| {
        x.0.total_cmp(&y.0)
            .then(x.1.cmp(&y.1))
            .then(x.2.cmp(&y.2))
    });

    let mut taken = BTreeSet::new();
    let mut pairs = Vec::new();
    for (_, a, b) in scored {
        if taken.contains(&a) || taken.contains(&b) {
            continue;
        }
        taken.insert(a);
        taken.insert(b);
        pairs.push((a, b));
    }
    pairs
}

/// Maps a ring's nodes and drops the zero-length steps that welding creates.
fn remap_ring(
    ring: &NodeRing,
    remap: &impl Fn(NodeKey) -> NodeKey,
) -> std::result::Result<NodeRing, String> {
    let mut corners: Vec<NodeKey> = Vec::with_capacity(ring.len());
    for &n in ring.corners() {
        let m = remap(n);
        if corners.last() != Some(&m) {
            corners.push(m);
        }
    }
    while corners.len() > 1 && corners.first() == corners.last() {
        corners.pop();
    }
    NodeRing::from_corners(&corners).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attributes;
    use crate::operators::create_face;
    use crate::tweak::{History, Immediate};
    use approx::assert_relative_eq;

    fn square(map: &mut PlanarMap, x0: f64) -> FaceKey {
        let pts = [
            Point2::new(x0, 0.0),
            Point2::new(x0 + 1.0, 0.0),
            Point2::new(x0 + 1.0, 1.0),
            Point2::new(x0, 1.0),
        ];
        create_face(map, &mut Immediate::new(), &pts, Attributes::default())
            .unwrap()
            .applied()
            .unwrap()
    }

    #[test]
    fn close_squares_share_a_portal() {
        let mut map = PlanarMap::new();
        let left = square(&mut map, 0.0);
        let right = square(&mut map, 1.1);
        let east = left.half_edges().nth(1).unwrap();
        let west = right.half_edges().nth(3).unwrap();

        let mut sink = Immediate::new();
        let result = join_edges(&mut map, &mut sink, &[east, west], &EditorConfig::default())
            .unwrap()
            .applied()
            .unwrap();

        assert_eq!(result.new_nodes.len(), 2);
        assert_eq!(map.node_count(), 6);
        assert_eq!(map.face_count(), 2);
        assert_eq!(map.half_edge_count(), 8);
        assert_eq!(map.edge_count(), 7);
        assert_eq!(map.portals().len(), 1);

        let (a, b) = result.portals[0];
        assert_eq!(a.reversed(), b);
        assert_ne!(map.half_edge_face(a), map.half_edge_face(b));
        assert_eq!(map.face_half_edges(map.half_edge_face(a).unwrap())[0], a);

        let p = map.node_position(a.head).unwrap();
        assert_relative_eq!(p.x, 1.05, epsilon = 1e-12);
        map.validate().unwrap();
    }

    #[test]
    fn far_edges_are_not_joined() {
        let mut map = PlanarMap::new();
        let left = square(&mut map, 0.0);
        let right = square(&mut map, 100.0);
        let east = left.half_edges().nth(1).unwrap();
        let west = right.half_edges().nth(3).unwrap();
        let before = map.clone();

        let outcome =
            join_edges(&mut map, &mut Immediate::new(), &[east, west], &EditorConfig::default())
                .unwrap();
        assert_eq!(outcome, Outcome::Aborted(Abort::NoCandidates));
        assert!(map.same_elements(&before));
    }

    #[test]
    fn edges_of_one_face_are_not_joined() {
        let mut map = PlanarMap::new();
        let face = square(&mut map, 0.0);
        let hedges: Vec<_> = face.half_edges().collect();
        let outcome = join_edges(
            &mut map,
            &mut Immediate::new(),
            &[hedges[1], hedges[3]],
            &EditorConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome, Outcome::Aborted(Abort::NoCandidates));
    }

    #[test]
    fn join_is_undoable() {
        let mut map = PlanarMap::new();
        let left = square(&mut map, 0.0);
        let right = square(&mut map, 1.1);
        let before = map.clone();

        let config = EditorConfig {
            join_distance_threshold: 0.5,
            ..EditorConfig::default()
        };
        let mut history = History::new();
        let candidates: Vec<_> = left.half_edges().chain(right.half_edges()).collect();
        let outcome = join_edges(&mut map, &mut history, &candidates, &config).unwrap();
        assert!(outcome.is_applied());

        history.undo(&mut map).unwrap();
        assert!(map.same_elements(&before));
        map.validate().unwrap();
    }
}
