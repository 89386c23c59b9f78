// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Storage for the half-edge planar map.
//!
//! The [`PlanarMap`] owns every node, half-edge and face together with two
//! raw indices that are maintained on every mutation:
//!
//! * node → incident half-edges (both directions), and
//! * half-edge → the face whose ring claims it.
//!
//! Everything else (ring decomposition, `reversed` pairing, per-node
//! predecessor/successor lists) is a derived view rebuilt by
//! [`PlanarMap::update`](crate::derived).
//!
//! ## Portals
//!
//! A half-edge `(a, b)` and its reverse `(b, a)` are independent elements.
//! When both exist and each bounds a different face they form a portal: the
//! shared wall between two sectors.

use nalgebra::Point2;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::attributes::{AttributeSchema, Attributes};
use crate::derived::DerivedViews;
use crate::keys::*;

/// Data stored for a node: its position plus explicit attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub position: Point2<f64>,
    pub attributes: Attributes,
}

/// Data stored for a half-edge (a wall in Build terms).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HalfEdgeData {
    pub attributes: Attributes,
}

/// Data stored for a face. The outer ring is the face's key; holes are
/// additional closed rings.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceData {
    pub holes: Vec<NodeRing>,
    pub attributes: Attributes,
    /// Insertion order, used to export sectors in a stable order.
    pub(crate) serial: u64,
}

/// The half-edge planar map.
///
/// # Example
///
/// ```
/// use nalgebra::Point2;
/// use retromap_graph::{Attributes, NodeKey, NodeRing, PlanarMap};
///
/// let mut map = PlanarMap::new();
/// let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
/// let mut keys = Vec::new();
/// for (x, y) in corners {
///     let key = map.allocate_node_key();
///     map.add_node(key, Point2::new(x, y), Attributes::default()).unwrap();
///     keys.push(key);
/// }
/// let ring = NodeRing::from_corners(&keys).unwrap();
/// map.add_face(ring, Vec::new(), Attributes::default()).unwrap();
/// map.update();
///
/// assert_eq!(map.node_count(), 4);
/// assert_eq!(map.half_edge_count(), 4);
/// assert_eq!(map.face_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct PlanarMap {
    pub(crate) schema: AttributeSchema,
    pub(crate) graph_attributes: Attributes,

    // Element storage
    pub(crate) nodes: FxHashMap<NodeKey, NodeData>,
    pub(crate) half_edges: FxHashMap<HalfEdgeKey, HalfEdgeData>,
    pub(crate) faces: FxHashMap<FaceKey, FaceData>,

    // Raw incidence, kept current by every mutation
    pub(crate) node_to_half_edges: FxHashMap<NodeKey, FxHashSet<HalfEdgeKey>>,
    pub(crate) claims: FxHashMap<HalfEdgeKey, FaceKey>,

    next_node_id: u64,
    pub(crate) next_face_serial: u64,

    pub(crate) derived: DerivedViews,
}

impl PlanarMap {
    /// Creates a new, empty map.
    pub fn new() -> Self {
        Self {
            schema: AttributeSchema::default(),
            graph_attributes: Attributes::default(),

            nodes: FxHashMap::default(),
            half_edges: FxHashMap::default(),
            faces: FxHashMap::default(),

            node_to_half_edges: FxHashMap::default(),
            claims: FxHashMap::default(),

            next_node_id: 1,
            next_face_serial: 0,

            derived: DerivedViews::default(),
        }
    }

    /// Hands out a node key that has never been used in this map.
    pub fn allocate_node_key(&mut self) -> NodeKey {
        let key = NodeKey(self.next_node_id);
        self.next_node_id += 1;
        key
    }

    /// Makes sure future allocations never return `key`.
    pub(crate) fn reserve_node_key(&mut self, key: NodeKey) {
        if key.0 >= self.next_node_id {
            self.next_node_id = key.0 + 1;
        }
    }

    // --- Nodes ---

    pub fn node(&self, key: NodeKey) -> Option<&NodeData> {
        self.nodes.get(&key)
    }

    pub fn node_position(&self, key: NodeKey) -> Option<Point2<f64>> {
        self.nodes.get(&key).map(|n| n.position)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All node keys (unordered).
    pub fn nodes(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.keys().copied()
    }

    /// Half-edges that start or end at `node`. Maintained eagerly, so this is
    /// valid without `update()`.
    pub fn incident_half_edges(&self, node: NodeKey) -> impl Iterator<Item = HalfEdgeKey> + '_ {
        self.node_to_half_edges
            .get(&node)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    // --- Half-edges ---

    pub fn half_edge(&self, key: HalfEdgeKey) -> Option<&HalfEdgeData> {
        self.half_edges.get(&key)
    }

    pub fn half_edge_count(&self) -> usize {
        self.half_edges.len()
    }

    /// All half-edge keys (unordered).
    pub fn half_edges(&self) -> impl Iterator<Item = HalfEdgeKey> + '_ {
        self.half_edges.keys().copied()
    }

    /// The face whose ring uses this half-edge. Maintained eagerly.
    pub fn claiming_face(&self, key: HalfEdgeKey) -> Option<&FaceKey> {
        self.claims.get(&key)
    }

    // --- Edges ---

    /// Undirected edges implied by the half-edge set.
    pub fn edges(&self) -> FxHashSet<EdgeKey> {
        self.half_edges.keys().map(|h| h.edge()).collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges().len()
    }

    /// The existing half-edges of an undirected edge.
    pub fn edge_half_edges(&self, edge: EdgeKey) -> Vec<HalfEdgeKey> {
        edge.half_edges()
            .into_iter()
            .filter(|h| self.half_edges.contains_key(h))
            .collect()
    }

    // --- Faces ---

    pub fn face(&self, key: &FaceKey) -> Option<&FaceData> {
        self.faces.get(key)
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// All face keys (unordered).
    pub fn faces(&self) -> impl Iterator<Item = &FaceKey> + '_ {
        self.faces.keys()
    }

    /// Face keys in insertion order.
    pub fn faces_in_order(&self) -> Vec<&FaceKey> {
        let mut faces: Vec<_> = self.faces.iter().map(|(k, f)| (f.serial, k)).collect();
        faces.sort_unstable_by_key(|(serial, _)| *serial);
        faces.into_iter().map(|(_, k)| k).collect()
    }

    /// Outer ring followed by holes.
    pub fn face_ring_keys(&self, key: &FaceKey) -> Option<Vec<&NodeRing>> {
        let (outer, face) = self.faces.get_key_value(key)?;
        let mut rings = Vec::with_capacity(1 + face.holes.len());
        rings.push(outer);
        rings.extend(face.holes.iter());
        Some(rings)
    }

    /// Distinct nodes of the face's outer ring, in ring order.
    pub fn face_nodes(&self, key: &FaceKey) -> Option<&[NodeKey]> {
        self.faces.get_key_value(key).map(|(k, _)| k.corners())
    }

    // --- Existence checks ---

    /// Returns `true` if the given element key references an existing element.
    pub fn contains(&self, key: &ElementKey) -> bool {
        match key {
            ElementKey::Node(k) => self.nodes.contains_key(k),
            ElementKey::HalfEdge(k) => self.half_edges.contains_key(k),
            ElementKey::Face(k) => self.faces.contains_key(k),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.half_edges.is_empty() && self.faces.is_empty()
    }

    /// Content equality: same keys, positions, holes and explicit attributes.
    /// Derived views, allocators and insertion order are ignored.
    pub fn same_elements(&self, other: &PlanarMap) -> bool {
        self.graph_attributes == other.graph_attributes
            && self.nodes == other.nodes
            && self.half_edges == other.half_edges
            && self.faces.len() == other.faces.len()
            && self.faces.iter().all(|(k, f)| {
                other
                    .faces
                    .get(k)
                    .is_some_and(|g| g.holes == f.holes && g.attributes == f.attributes)
            })
    }

    // --- Index helpers ---

    pub(crate) fn link_node_half_edge(&mut self, key: HalfEdgeKey) {
        self.node_to_half_edges.entry(key.head).or_default().insert(key);
        self.node_to_half_edges.entry(key.tail).or_default().insert(key);
    }

    pub(crate) fn unlink_node_half_edge(&mut self, key: HalfEdgeKey) {
        for node in [key.head, key.tail] {
            if let Some(set) = self.node_to_half_edges.get_mut(&node) {
                set.remove(&key);
                if set.is_empty() {
                    self.node_to_half_edges.remove(&node);
                }
            }
        }
    }

    pub(crate) fn incident_count(&self, node: NodeKey) -> usize {
        self.node_to_half_edges.get(&node).map_or(0, |s| s.len())
    }
}

impl Default for PlanarMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_map_is_empty() {
        let map = PlanarMap::new();
        assert!(map.is_empty());
        assert_eq!(map.node_count(), 0);
        assert_eq!(map.half_edge_count(), 0);
        assert_eq!(map.edge_count(), 0);
        assert_eq!(map.face_count(), 0);
    }

    #[test]
    fn allocator_is_monotonic() {
        let mut map = PlanarMap::new();
        let a = map.allocate_node_key();
        let b = map.allocate_node_key();
        assert!(b > a);

        map.reserve_node_key(NodeKey(100));
        assert_eq!(map.allocate_node_key(), NodeKey(101));
        map.reserve_node_key(NodeKey(5));
        assert_eq!(map.allocate_node_key(), NodeKey(102));
    }

    #[test]
    fn edges_merge_opposing_half_edges() {
        let mut map = PlanarMap::new();
        map.add_half_edge(NodeKey(1), NodeKey(2), Attributes::default())
            .unwrap();
        map.add_half_edge(NodeKey(2), NodeKey(1), Attributes::default())
            .unwrap();
        map.add_half_edge(NodeKey(2), NodeKey(3), Attributes::default())
            .unwrap();

        assert_eq!(map.half_edge_count(), 3);
        assert_eq!(map.edge_count(), 2);
        let e = EdgeKey::new(NodeKey(2), NodeKey(1));
        assert_eq!(map.edge_half_edges(e).len(), 2);
        assert_eq!(map.incident_half_edges(NodeKey(2)).count(), 3);
    }

    #[test]
    fn contains_check() {
        let mut map = PlanarMap::new();
        map.add_half_edge(NodeKey(1), NodeKey(2), Attributes::default())
            .unwrap();
        assert!(map.contains(&ElementKey::Node(NodeKey(1))));
        assert!(map.contains(&ElementKey::HalfEdge(HalfEdgeKey::new(
            NodeKey(1),
            NodeKey(2)
        ))));
        assert!(!map.contains(&ElementKey::HalfEdge(HalfEdgeKey::new(
            NodeKey(2),
            NodeKey(1)
        ))));
    }

    #[test]
    fn ring_queries_borrow_from_the_map() {
        let mut map = PlanarMap::new();
        let keys: Vec<NodeKey> = [(0.0, 0.0), (8.0, 0.0), (8.0, 8.0), (0.0, 8.0)]
            .iter()
            .map(|&(x, y)| {
                let key = map.allocate_node_key();
                map.add_node(key, Point2::new(x, y), Attributes::default())
                    .unwrap();
                key
            })
            .collect();
        let ring = NodeRing::from_corners(&keys).unwrap();
        map.add_face(ring.clone(), Vec::new(), Attributes::default())
            .unwrap();

        // The lookup key is a temporary; the results outlive it.
        let (rings, corners) = {
            let lookup = ring.clone();
            (
                map.face_ring_keys(&lookup).unwrap(),
                map.face_nodes(&lookup).unwrap(),
            )
        };
        assert_eq!(rings, vec![&ring]);
        assert_eq!(corners, keys.as_slice());
        assert!(map.face_nodes(&NodeRing::from_corners(&keys[1..]).unwrap()).is_none());
    }
}
