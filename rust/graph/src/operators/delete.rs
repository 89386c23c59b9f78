// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cascading deletion.

use std::collections::BTreeSet;

use tracing::debug;

use super::{abort, Abort, Outcome};
use crate::error::{Error, Result};
use crate::keys::*;
use crate::map::PlanarMap;
use crate::tweak::{DeltaSink, Edit, Tweak};

const OP: &str = "delete_elements";

/// Deletes `elements` and everything that depends on them.
///
/// * a node takes its incident half-edges with it;
/// * a half-edge takes the face that claims it;
/// * a face takes every half-edge of its rings.
///
/// Nodes left without any half-edge by the deletion are removed as well.
/// On success the submitted removal tweak is returned.
pub fn delete_elements(
    map: &mut PlanarMap,
    sink: &mut dyn DeltaSink,
    elements: &[ElementKey],
) -> Result<Outcome<Tweak>> {
    if elements.is_empty() {
        return abort(OP, Abort::EmptySelection);
    }

    let mut nodes = BTreeSet::new();
    let mut half_edges = BTreeSet::new();
    let mut faces = BTreeSet::new();
    for element in elements {
        match element {
            ElementKey::Node(k) => {
                map.node(*k).ok_or(Error::NodeNotFound(*k))?;
                nodes.insert(*k);
                half_edges.extend(map.incident_half_edges(*k));
            }
            ElementKey::HalfEdge(h) => {
                map.half_edge(*h).ok_or(Error::HalfEdgeNotFound(*h))?;
                half_edges.insert(*h);
            }
            ElementKey::Face(f) => {
                map.face(f).ok_or_else(|| Error::FaceNotFound(f.clone()))?;
                faces.insert(f.clone());
            }
        }
    }

    faces.extend(
        half_edges
            .iter()
            .filter_map(|h| map.claiming_face(*h).cloned()),
    );
    for face in &faces {
        for ring in map.face_ring_keys(face).unwrap_or_default() {
            half_edges.extend(ring.half_edges());
        }
    }

    let touched: BTreeSet<NodeKey> = half_edges.iter().flat_map(|h| [h.head, h.tail]).collect();
    for node in touched {
        if map.incident_half_edges(node).all(|h| half_edges.contains(&h)) {
            nodes.insert(node);
        }
    }

    let mut removal = Tweak::remove();
    for face in &faces {
        removal.capture_face(map, face)?;
    }
    for h in &half_edges {
        removal.capture_half_edge(map, *h)?;
    }
    for n in &nodes {
        removal.capture_node(map, *n)?;
    }

    debug!(
        nodes = nodes.len(),
        half_edges = half_edges.len(),
        faces = faces.len(),
        "deleting elements"
    );
    sink.submit(map, Edit::new("Delete").with(removal.clone()))?;
    Ok(Outcome::Applied(removal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attributes;
    use crate::tweak::{History, Immediate};
    use nalgebra::Point2;

    /// Two unit squares sharing the edge 2-5.
    ///
    /// ```text
    /// 4---5---6
    /// |   |   |
    /// 1---2---3
    /// ```
    fn two_squares() -> (PlanarMap, FaceKey, FaceKey) {
        let mut map = PlanarMap::new();
        let coords = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 1.0), (1.0, 1.0), (2.0, 1.0)];
        for (i, (x, y)) in coords.iter().enumerate() {
            map.add_node(NodeKey(i as u64 + 1), Point2::new(*x, *y), Attributes::default())
                .unwrap();
        }
        let left = NodeRing::from_corners(&[NodeKey(1), NodeKey(2), NodeKey(5), NodeKey(4)]).unwrap();
        let right =
            NodeRing::from_corners(&[NodeKey(2), NodeKey(3), NodeKey(6), NodeKey(5)]).unwrap();
        map.add_face(left.clone(), Vec::new(), Attributes::default())
            .unwrap();
        map.add_face(right.clone(), Vec::new(), Attributes::default())
            .unwrap();
        map.update();
        (map, left, right)
    }

    #[test]
    fn deleting_a_corner_removes_the_whole_square() {
        let (mut map, left, right) = two_squares();
        delete_elements(&mut map, &mut Immediate::new(), &[ElementKey::Node(NodeKey(1))])
            .unwrap()
            .applied()
            .unwrap();

        assert!(map.face(&left).is_none());
        assert!(map.face(&right).is_some());
        // 2 and 5 still bound the right square.
        assert_eq!(map.node_count(), 4);
        assert_eq!(map.half_edge_count(), 4);
        map.validate().unwrap();
    }

    #[test]
    fn deleting_a_shared_node_removes_both_faces() {
        let (mut map, _, _) = two_squares();
        delete_elements(&mut map, &mut Immediate::new(), &[ElementKey::Node(NodeKey(2))])
            .unwrap()
            .applied()
            .unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn deleting_a_half_edge_removes_its_face() {
        let (mut map, left, right) = two_squares();
        let h = HalfEdgeKey::new(NodeKey(2), NodeKey(5));
        delete_elements(&mut map, &mut Immediate::new(), &[ElementKey::HalfEdge(h)])
            .unwrap()
            .applied()
            .unwrap();
        assert!(map.face(&left).is_none());
        assert!(map.face(&right).is_some());
        assert!(map.half_edge(h.reversed()).is_some());
    }

    #[test]
    fn unclaimed_half_edges_keep_their_nodes() {
        let (mut map, left, _) = two_squares();
        map.add_half_edge(NodeKey(4), NodeKey(7), Attributes::default())
            .unwrap();
        delete_elements(&mut map, &mut Immediate::new(), &[ElementKey::Face(left)])
            .unwrap()
            .applied()
            .unwrap();
        assert!(map.node(NodeKey(4)).is_some());
        assert!(map.node(NodeKey(1)).is_none());
        assert!(map
            .half_edge(HalfEdgeKey::new(NodeKey(4), NodeKey(7)))
            .is_some());
    }

    #[test]
    fn delete_is_undoable() {
        let (mut map, left, _) = two_squares();
        let before = map.clone();
        let mut history = History::new();
        let removed = delete_elements(&mut map, &mut history, &[ElementKey::Face(left)])
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(removed.faces.len(), 1);
        assert_eq!(removed.half_edges.len(), 4);
        assert_eq!(removed.nodes.len(), 2);

        history.undo(&mut map).unwrap();
        assert!(map.same_elements(&before));
    }

    #[test]
    fn empty_selection_aborts() {
        let (mut map, _, _) = two_squares();
        let outcome = delete_elements(&mut map, &mut Immediate::new(), &[]).unwrap();
        assert_eq!(outcome, Outcome::Aborted(Abort::EmptySelection));
    }

    #[test]
    fn unknown_elements_are_errors() {
        let (mut map, _, _) = two_squares();
        let result = delete_elements(&mut map, &mut Immediate::new(), &[ElementKey::Node(NodeKey(99))]);
        assert!(matches!(result, Err(Error::NodeNotFound(_))));
    }
}
