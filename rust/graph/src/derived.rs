// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Derived adjacency views.
//!
//! After a batch of raw mutations, [`PlanarMap::update`] recomputes from
//! scratch:
//!
//! * the ring decomposition of every face (outer ring first, then holes),
//! * which ring and face own each half-edge,
//! * `reversed` pairing between opposing half-edges, and
//! * per-node predecessor (incoming) and successor (outgoing) half-edge lists,
//!   sorted counter-clockwise by the direction of the far endpoint.
//!
//! Any mutation drops the views. Until the next `update()` every derived
//! accessor returns empty results rather than failing.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::error::{Error, Result};
use crate::keys::*;
use crate::map::PlanarMap;

/// One closed loop of half-edges belonging to a face.
#[derive(Debug, Clone)]
pub struct Ring {
    pub face: FaceKey,
    pub half_edges: Vec<HalfEdgeKey>,
    pub is_hole: bool,
}

type HalfEdgeList = SmallVec<[HalfEdgeKey; 4]>;

/// Views rebuilt by `update()`.
#[derive(Debug, Clone, Default)]
pub struct DerivedViews {
    fresh: bool,
    rings: SlotMap<RingKey, Ring>,
    face_rings: FxHashMap<FaceKey, SmallVec<[RingKey; 1]>>,
    owner: FxHashMap<HalfEdgeKey, (RingKey, usize)>,
    reversed: FxHashMap<HalfEdgeKey, HalfEdgeKey>,
    predecessors: FxHashMap<NodeKey, HalfEdgeList>,
    successors: FxHashMap<NodeKey, HalfEdgeList>,
}

impl DerivedViews {
    /// Drops all views. Cheap when they are already dropped.
    pub(crate) fn invalidate(&mut self) {
        if self.fresh {
            *self = Self::default();
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }
}

impl PlanarMap {
    /// Recomputes every derived view from the raw element storage.
    pub fn update(&mut self) {
        let mut views = DerivedViews {
            fresh: true,
            ..Default::default()
        };

        for (face, data) in &self.faces {
            let rings = std::iter::once((face, false))
                .chain(data.holes.iter().map(|h| (h, true)));
            let mut keys = SmallVec::new();
            for (ring, is_hole) in rings {
                let half_edges: Vec<_> = ring.half_edges().collect();
                let rk = views.rings.insert(Ring {
                    face: face.clone(),
                    half_edges: half_edges.clone(),
                    is_hole,
                });
                for (i, h) in half_edges.into_iter().enumerate() {
                    views.owner.insert(h, (rk, i));
                }
                keys.push(rk);
            }
            views.face_rings.insert(face.clone(), keys);
        }

        for &h in self.half_edges.keys() {
            let r = h.reversed();
            if self.half_edges.contains_key(&r) {
                views.reversed.insert(h, r);
            }
            views.predecessors.entry(h.tail).or_default().push(h);
            views.successors.entry(h.head).or_default().push(h);
        }

        for (node, list) in views.predecessors.iter_mut() {
            self.sort_around(*node, list, |h| h.head);
        }
        for (node, list) in views.successors.iter_mut() {
            self.sort_around(*node, list, |h| h.tail);
        }

        debug!(
            rings = views.rings.len(),
            portals = views.reversed.len() / 2,
            "derived views rebuilt"
        );
        self.derived = views;
    }

    /// Runs [`update`](Self::update) only when the views are stale.
    pub fn ensure_derived(&mut self) {
        if !self.derived.fresh {
            self.update();
        }
    }

    /// `true` when derived views reflect the current raw state.
    pub fn is_derived(&self) -> bool {
        self.derived.fresh
    }

    fn sort_around(
        &self,
        node: NodeKey,
        list: &mut HalfEdgeList,
        far: impl Fn(HalfEdgeKey) -> NodeKey,
    ) {
        let Some(origin) = self.node_position(node) else {
            return;
        };
        let angle = |h: HalfEdgeKey| {
            self.node_position(far(h))
                .map(|p| (p.y - origin.y).atan2(p.x - origin.x))
                .unwrap_or(0.0)
        };
        list.sort_by(|a, b| angle(*a).total_cmp(&angle(*b)).then(a.cmp(b)));
    }

    // --- Accessors ---

    /// The face owning a half-edge, if any.
    pub fn half_edge_face(&self, h: HalfEdgeKey) -> Option<&FaceKey> {
        let (rk, _) = self.derived.owner.get(&h)?;
        self.derived.rings.get(*rk).map(|r| &r.face)
    }

    /// The ring owning a half-edge, if any.
    pub fn half_edge_ring(&self, h: HalfEdgeKey) -> Option<RingKey> {
        self.derived.owner.get(&h).map(|(rk, _)| *rk)
    }

    /// The opposing half-edge, if it exists.
    pub fn reversed(&self, h: HalfEdgeKey) -> Option<HalfEdgeKey> {
        self.derived.reversed.get(&h).copied()
    }

    /// Incoming half-edges of a node, ordered by angle.
    pub fn predecessors(&self, node: NodeKey) -> &[HalfEdgeKey] {
        self.derived
            .predecessors
            .get(&node)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }

    /// Outgoing half-edges of a node, ordered by angle.
    pub fn successors(&self, node: NodeKey) -> &[HalfEdgeKey] {
        self.derived
            .successors
            .get(&node)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }

    /// Incident half-edges of a node: predecessors, then successors.
    pub fn node_half_edges(&self, node: NodeKey) -> Vec<HalfEdgeKey> {
        self.predecessors(node)
            .iter()
            .chain(self.successors(node))
            .copied()
            .collect()
    }

    pub fn ring(&self, key: RingKey) -> Option<&Ring> {
        self.derived.rings.get(key)
    }

    pub fn rings(&self) -> impl Iterator<Item = (RingKey, &Ring)> + '_ {
        self.derived.rings.iter()
    }

    /// A face's rings: outer first, then holes.
    pub fn face_rings(&self, face: &FaceKey) -> &[RingKey] {
        self.derived
            .face_rings
            .get(face)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// The half-edges of a face's outer ring, in order.
    pub fn face_half_edges(&self, face: &FaceKey) -> &[HalfEdgeKey] {
        self.face_rings(face)
            .first()
            .and_then(|rk| self.derived.rings.get(*rk))
            .map(|r| r.half_edges.as_slice())
            .unwrap_or(&[])
    }

    /// The half-edge following `h` in its ring.
    pub fn next_in_ring(&self, h: HalfEdgeKey) -> Option<HalfEdgeKey> {
        let (rk, i) = self.derived.owner.get(&h)?;
        let ring = self.derived.rings.get(*rk)?;
        ring.half_edges.get((i + 1) % ring.half_edges.len()).copied()
    }

    /// The half-edge preceding `h` in its ring.
    pub fn prev_in_ring(&self, h: HalfEdgeKey) -> Option<HalfEdgeKey> {
        let (rk, i) = self.derived.owner.get(&h)?;
        let ring = self.derived.rings.get(*rk)?;
        let n = ring.half_edges.len();
        ring.half_edges.get((i + n - 1) % n).copied()
    }

    /// Face-owned half-edges without an opposing half-edge, sorted.
    pub fn open_half_edges(&self) -> Vec<HalfEdgeKey> {
        let mut open: Vec<_> = self
            .derived
            .owner
            .keys()
            .filter(|h| !self.derived.reversed.contains_key(h))
            .copied()
            .collect();
        open.sort_unstable();
        open
    }

    /// Portal pairs `(a, b)` with `a < b` where both sides bound a face.
    pub fn portals(&self) -> Vec<(HalfEdgeKey, HalfEdgeKey)> {
        let mut portals: Vec<_> = self
            .derived
            .reversed
            .iter()
            .filter(|(a, b)| {
                a < b && self.derived.owner.contains_key(*a) && self.derived.owner.contains_key(*b)
            })
            .map(|(a, b)| (*a, *b))
            .collect();
        portals.sort_unstable();
        portals
    }

    /// Checks the structural invariants of the map. Derived-view invariants
    /// (portal symmetry, ring closure) are only checked when the views are
    /// fresh.
    pub fn validate(&self) -> Result<()> {
        for h in self.half_edges.keys() {
            for node in [h.head, h.tail] {
                if !self.nodes.contains_key(&node) {
                    return Err(Error::Inconsistent(format!(
                        "half-edge {} references missing node {}",
                        h, node
                    )));
                }
            }
        }

        let mut claimed = FxHashSet::default();
        for (face, data) in &self.faces {
            for ring in std::iter::once(face).chain(data.holes.iter()) {
                for h in ring.half_edges() {
                    if !self.half_edges.contains_key(&h) {
                        return Err(Error::Inconsistent(format!(
                            "face {} references missing half-edge {}",
                            face, h
                        )));
                    }
                    if !claimed.insert(h) || self.claims.get(&h) != Some(face) {
                        return Err(Error::Inconsistent(format!(
                            "half-edge {} is not claimed exactly once by face {}",
                            h, face
                        )));
                    }
                }
            }
        }
        if claimed.len() != self.claims.len() {
            return Err(Error::Inconsistent(format!(
                "{} stale half-edge claims",
                self.claims.len() - claimed.len()
            )));
        }

        if !self.derived.fresh {
            return Ok(());
        }

        for (a, b) in &self.derived.reversed {
            if self.derived.reversed.get(b) != Some(a) {
                return Err(Error::Inconsistent(format!(
                    "reversed pairing of {} and {} is not symmetric",
                    a, b
                )));
            }
        }

        for (_, ring) in self.derived.rings.iter() {
            let Some(&start) = ring.half_edges.first() else {
                continue;
            };
            let mut current = start;
            for _ in 0..ring.half_edges.len() {
                let next = self.next_in_ring(current).ok_or_else(|| {
                    Error::Inconsistent(format!("half-edge {} has no ring successor", current))
                })?;
                if next.head != current.tail {
                    return Err(Error::Inconsistent(format!(
                        "ring of face {} breaks between {} and {}",
                        ring.face, current, next
                    )));
                }
                current = next;
            }
            if current != start {
                return Err(Error::Inconsistent(format!(
                    "ring of face {} does not close",
                    ring.face
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attributes;
    use nalgebra::Point2;

    /// Two unit squares sharing the edge n2-n3.
    fn two_squares() -> PlanarMap {
        let mut map = PlanarMap::new();
        let pts = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (2.0, 0.0), (2.0, 1.0)];
        for (i, (x, y)) in pts.iter().enumerate() {
            map.add_node(NodeKey(i as u64 + 1), Point2::new(*x, *y), Attributes::default())
                .unwrap();
        }
        let left = NodeRing::from_corners(&[NodeKey(1), NodeKey(2), NodeKey(3), NodeKey(4)]).unwrap();
        let right = NodeRing::from_corners(&[NodeKey(2), NodeKey(5), NodeKey(6), NodeKey(3)]).unwrap();
        map.add_face(left, Vec::new(), Attributes::default()).unwrap();
        map.add_face(right, Vec::new(), Attributes::default()).unwrap();
        map
    }

    #[test]
    fn views_are_empty_before_update() {
        let map = two_squares();
        let h = HalfEdgeKey::new(NodeKey(1), NodeKey(2));
        assert!(!map.is_derived());
        assert!(map.half_edge_face(h).is_none());
        assert!(map.successors(NodeKey(1)).is_empty());
        assert!(map.open_half_edges().is_empty());
    }

    #[test]
    fn update_pairs_portals() {
        let mut map = two_squares();
        map.update();
        let a = HalfEdgeKey::new(NodeKey(2), NodeKey(3));
        let b = HalfEdgeKey::new(NodeKey(3), NodeKey(2));
        assert_eq!(map.reversed(a), Some(b));
        assert_eq!(map.reversed(b), Some(a));
        assert_ne!(map.half_edge_face(a), map.half_edge_face(b));
        assert_eq!(map.portals(), vec![(a, b)]);
        assert_eq!(map.open_half_edges().len(), 6);
        map.validate().unwrap();
    }

    #[test]
    fn mutation_drops_views() {
        let mut map = two_squares();
        map.update();
        assert!(map.is_derived());
        map.add_half_edge(NodeKey(1), NodeKey(5), Attributes::default())
            .unwrap();
        assert!(!map.is_derived());
        assert!(map.reversed(HalfEdgeKey::new(NodeKey(2), NodeKey(3))).is_none());
        map.ensure_derived();
        assert!(map.is_derived());
    }

    #[test]
    fn ring_navigation() {
        let mut map = two_squares();
        map.update();
        let face = NodeRing::from_corners(&[NodeKey(1), NodeKey(2), NodeKey(3), NodeKey(4)]).unwrap();
        let hedges = map.face_half_edges(&face).to_vec();
        assert_eq!(hedges.len(), 4);
        assert_eq!(map.next_in_ring(hedges[3]), Some(hedges[0]));
        assert_eq!(map.prev_in_ring(hedges[0]), Some(hedges[3]));
        assert_eq!(map.face_rings(&face).len(), 1);
    }

    #[test]
    fn node_lists_are_sorted_by_angle() {
        let mut map = two_squares();
        map.update();
        // Outgoing from n2: (2->5) east, (2->3) north.
        let out = map.successors(NodeKey(2));
        assert_eq!(
            out,
            &[
                HalfEdgeKey::new(NodeKey(2), NodeKey(5)),
                HalfEdgeKey::new(NodeKey(2), NodeKey(3)),
            ]
        );
        assert_eq!(map.node_half_edges(NodeKey(2)).len(), 4);
    }
}
