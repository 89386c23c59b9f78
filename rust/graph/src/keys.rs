// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key types for planar map elements.
//!
//! Nodes are addressed by opaque [`NodeKey`]s handed out by the map's
//! allocator. Everything else is addressed structurally: a half-edge by its
//! `(head, tail)` pair, an undirected edge by its normalized node pair and a
//! face by the closed node tuple of its outer ring. Only derived rings live in
//! a slot map, because they are rebuilt from scratch on every `update()`.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::error::{Error, Result};

/// Opaque, stable identity of a node. Not derived from its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(pub u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A directed half-edge running from `head` to `tail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HalfEdgeKey {
    pub head: NodeKey,
    pub tail: NodeKey,
}

impl HalfEdgeKey {
    pub fn new(head: NodeKey, tail: NodeKey) -> Self {
        Self { head, tail }
    }

    /// The opposing half-edge `(tail, head)`.
    pub fn reversed(self) -> Self {
        Self {
            head: self.tail,
            tail: self.head,
        }
    }

    /// The undirected edge this half-edge belongs to.
    pub fn edge(self) -> EdgeKey {
        EdgeKey::new(self.head, self.tail)
    }

    /// Returns `true` if the half-edge touches `node` at either end.
    pub fn touches(self, node: NodeKey) -> bool {
        self.head == node || self.tail == node
    }
}

impl fmt::Display for HalfEdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -> {})", self.head, self.tail)
    }
}

/// An undirected edge: the normalized node pair `a <= b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    a: NodeKey,
    b: NodeKey,
}

impl EdgeKey {
    pub fn new(a: NodeKey, b: NodeKey) -> Self {
        if a <= b {
            Self { a, b }
        } else {
            Self { a: b, b: a }
        }
    }

    pub fn nodes(self) -> (NodeKey, NodeKey) {
        (self.a, self.b)
    }

    /// Both directions of this edge, `(a -> b)` first.
    pub fn half_edges(self) -> [HalfEdgeKey; 2] {
        [
            HalfEdgeKey::new(self.a, self.b),
            HalfEdgeKey::new(self.b, self.a),
        ]
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.a, self.b)
    }
}

/// A closed ring of node keys: the first node is repeated at the end.
///
/// A valid ring has at least three corners, never steps from a node to
/// itself and never traverses the same half-edge twice. Corners may repeat
/// (a ring can pinch at a vertex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<NodeKey>", into = "Vec<NodeKey>")]
pub struct NodeRing(Vec<NodeKey>);

/// A face is identified by the closed node tuple of its outer ring.
pub type FaceKey = NodeRing;

impl NodeRing {
    /// Validates a closed node tuple.
    pub fn new(nodes: Vec<NodeKey>) -> Result<Self> {
        if nodes.len() < 4 {
            return Err(Error::MalformedRing(format!(
                "a ring needs at least 3 corners plus the closing node, got {} nodes",
                nodes.len()
            )));
        }
        if nodes.first() != nodes.last() {
            return Err(Error::MalformedRing(
                "first and last node differ (ring is not closed)".to_string(),
            ));
        }

        let mut seen = FxHashSet::default();
        for pair in nodes.windows(2) {
            if pair[0] == pair[1] {
                return Err(Error::MalformedRing(format!(
                    "zero-length step at node {}",
                    pair[0]
                )));
            }
            if !seen.insert((pair[0], pair[1])) {
                return Err(Error::MalformedRing(format!(
                    "half-edge {} appears twice",
                    HalfEdgeKey::new(pair[0], pair[1])
                )));
            }
        }

        Ok(Self(nodes))
    }

    /// Builds a ring from its corners, appending the closing node.
    pub fn from_corners(corners: &[NodeKey]) -> Result<Self> {
        let mut nodes = corners.to_vec();
        if let Some(&first) = corners.first() {
            nodes.push(first);
        }
        Self::new(nodes)
    }

    /// The closed node tuple (first node repeated at the end).
    pub fn nodes(&self) -> &[NodeKey] {
        &self.0
    }

    /// The ring's corners without the closing node.
    pub fn corners(&self) -> &[NodeKey] {
        &self.0[..self.0.len() - 1]
    }

    /// Number of corners (equal to the number of half-edges).
    pub fn len(&self) -> usize {
        self.0.len() - 1
    }

    /// Always `false`: a ring has at least three corners.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> NodeKey {
        self.0[0]
    }

    /// The ring's half-edges in traversal order.
    pub fn half_edges(&self) -> impl Iterator<Item = HalfEdgeKey> + '_ {
        self.0.windows(2).map(|w| HalfEdgeKey::new(w[0], w[1]))
    }

    pub fn contains_node(&self, node: NodeKey) -> bool {
        self.corners().contains(&node)
    }

    /// The same cycle started at `start`, or `None` if `start` is not a corner.
    pub fn rotated_to(&self, start: NodeKey) -> Option<Self> {
        let offset = self.corners().iter().position(|&n| n == start)?;
        Some(self.rotated_by(offset))
    }

    /// The same cycle started with half-edge `first`, or `None` if the ring
    /// does not traverse it.
    pub fn rotated_to_half_edge(&self, first: HalfEdgeKey) -> Option<Self> {
        let offset = self.half_edges().position(|h| h == first)?;
        Some(self.rotated_by(offset))
    }

    fn rotated_by(&self, offset: usize) -> Self {
        let corners = self.corners();
        let mut nodes = Vec::with_capacity(self.0.len());
        nodes.extend_from_slice(&corners[offset..]);
        nodes.extend_from_slice(&corners[..offset]);
        nodes.push(corners[offset]);
        Self(nodes)
    }

    /// The same cycle traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        let mut nodes = self.0.clone();
        nodes.reverse();
        Self(nodes)
    }
}

impl TryFrom<Vec<NodeKey>> for NodeRing {
    type Error = Error;

    fn try_from(nodes: Vec<NodeKey>) -> Result<Self> {
        Self::new(nodes)
    }
}

impl From<NodeRing> for Vec<NodeKey> {
    fn from(ring: NodeRing) -> Self {
        ring.0
    }
}

impl fmt::Display for NodeRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", node)?;
        }
        f.write_str("]")
    }
}

new_key_type! {
    /// Key for a derived ring (outer boundary or hole of a face).
    pub struct RingKey;
}

/// A key that can reference any planar map element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKey {
    Node(NodeKey),
    HalfEdge(HalfEdgeKey),
    Face(FaceKey),
}

impl ElementKey {
    /// Returns the element category of this key.
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementKey::Node(_) => ElementKind::Node,
            ElementKey::HalfEdge(_) => ElementKind::HalfEdge,
            ElementKey::Face(_) => ElementKind::Face,
        }
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKey::Node(k) => write!(f, "node {}", k),
            ElementKey::HalfEdge(k) => write!(f, "half-edge {}", k),
            ElementKey::Face(k) => write!(f, "face {}", k),
        }
    }
}

/// Element categories. `Graph` is the map itself, which only matters for
/// attribute schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Graph = 0,
    Node = 1,
    HalfEdge = 2,
    Face = 3,
}

impl ElementKind {
    /// Returns the category name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Graph => "graph",
            ElementKind::Node => "node",
            ElementKind::HalfEdge => "half-edge",
            ElementKind::Face => "face",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<NodeKey> for ElementKey {
    fn from(k: NodeKey) -> Self {
        ElementKey::Node(k)
    }
}

impl From<HalfEdgeKey> for ElementKey {
    fn from(k: HalfEdgeKey) -> Self {
        ElementKey::HalfEdge(k)
    }
}

impl From<NodeRing> for ElementKey {
    fn from(k: NodeRing) -> Self {
        ElementKey::Face(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(ids: &[u64]) -> Result<NodeRing> {
        NodeRing::new(ids.iter().map(|&i| NodeKey(i)).collect())
    }

    #[test]
    fn edge_key_is_unordered() {
        let e1 = EdgeKey::new(NodeKey(3), NodeKey(1));
        let e2 = EdgeKey::new(NodeKey(1), NodeKey(3));
        assert_eq!(e1, e2);
        assert_eq!(e1.nodes(), (NodeKey(1), NodeKey(3)));
    }

    #[test]
    fn half_edge_reversal() {
        let h = HalfEdgeKey::new(NodeKey(1), NodeKey(2));
        assert_eq!(h.reversed(), HalfEdgeKey::new(NodeKey(2), NodeKey(1)));
        assert_eq!(h.reversed().reversed(), h);
        assert_eq!(h.edge(), h.reversed().edge());
    }

    #[test]
    fn ring_requires_closure() {
        assert!(ring(&[1, 2, 3, 1]).is_ok());
        assert!(ring(&[1, 2, 3]).is_err());
        assert!(ring(&[1, 2, 3, 4]).is_err());
        assert!(ring(&[1, 2, 1]).is_err());
    }

    #[test]
    fn ring_rejects_zero_length_steps() {
        assert!(ring(&[1, 2, 2, 3, 1]).is_err());
    }

    #[test]
    fn ring_allows_pinch_but_not_repeated_half_edges() {
        // Two triangles touching at node 1.
        assert!(ring(&[1, 2, 3, 1, 4, 5, 1]).is_ok());
        assert!(ring(&[1, 2, 3, 1, 2, 4, 1]).is_err());
    }

    #[test]
    fn ring_half_edges_and_rotation() {
        let r = ring(&[1, 2, 3, 1]).unwrap();
        let hedges: Vec<_> = r.half_edges().collect();
        assert_eq!(hedges.len(), 3);
        assert_eq!(hedges[2], HalfEdgeKey::new(NodeKey(3), NodeKey(1)));

        let rotated = r.rotated_to(NodeKey(3)).unwrap();
        assert_eq!(rotated.nodes(), &[NodeKey(3), NodeKey(1), NodeKey(2), NodeKey(3)]);
        assert!(r.rotated_to(NodeKey(9)).is_none());

        let pinched = ring(&[1, 2, 3, 1, 4, 5, 1]).unwrap();
        let rotated = pinched
            .rotated_to_half_edge(HalfEdgeKey::new(NodeKey(1), NodeKey(4)))
            .unwrap();
        assert_eq!(rotated.first(), NodeKey(1));
        assert_eq!(rotated.half_edges().next(), Some(HalfEdgeKey::new(NodeKey(1), NodeKey(4))));
    }

    #[test]
    fn ring_serializes_as_plain_array() {
        let r = ring(&[1, 2, 3, 1]).unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "[1,2,3,1]");
        assert!(serde_json::from_str::<NodeRing>("[1,2,3]").is_err());
    }

    #[test]
    fn element_kind_names() {
        assert_eq!(ElementKind::Graph.as_str(), "graph");
        assert_eq!(ElementKind::HalfEdge.to_string(), "half-edge");
        assert_eq!(ElementKey::Node(NodeKey(4)).kind(), ElementKind::Node);
    }
}
