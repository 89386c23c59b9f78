// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end editing scenarios on small maps.

use approx::assert_relative_eq;
use nalgebra::{Point2, Vector2};
use retromap_graph::operators::{
    create_face, delete_elements, join_edges, split_face, Clipboard, CutPoint,
};
use retromap_graph::{
    Attributes, EditorConfig, ElementKey, FaceKey, HalfEdgeKey, History, Immediate, NodeKey,
    NodeRing, PlanarMap,
};

/// Node key of grid point `(i, j)` in a 3×3 lattice.
fn grid_node(i: u64, j: u64) -> NodeKey {
    NodeKey(j * 3 + i + 1)
}

/// 2×2 unit squares sharing their inner edges.
fn grid() -> PlanarMap {
    let mut map = PlanarMap::new();
    for j in 0..3 {
        for i in 0..3 {
            map.add_node(
                grid_node(i, j),
                Point2::new(i as f64, j as f64),
                Attributes::default(),
            )
            .unwrap();
        }
    }
    for j in 0..2 {
        for i in 0..2 {
            let ring = NodeRing::from_corners(&[
                grid_node(i, j),
                grid_node(i + 1, j),
                grid_node(i + 1, j + 1),
                grid_node(i, j + 1),
            ])
            .unwrap();
            map.add_face(ring, Vec::new(), Attributes::default())
                .unwrap();
        }
    }
    map.update();
    map
}

fn cell(i: u64, j: u64) -> FaceKey {
    NodeRing::from_corners(&[
        grid_node(i, j),
        grid_node(i + 1, j),
        grid_node(i + 1, j + 1),
        grid_node(i, j + 1),
    ])
    .unwrap()
}

fn assert_portal_symmetry(map: &PlanarMap) {
    for h in map.half_edges() {
        if let Some(g) = map.reversed(h) {
            assert_eq!(map.reversed(g), Some(h));
            assert_ne!(map.half_edge_face(h), map.half_edge_face(g));
        }
    }
}

fn assert_rings_close(map: &PlanarMap) {
    for (_, ring) in map.rings() {
        let first = ring.half_edges[0];
        let mut node = first.head;
        for h in &ring.half_edges {
            assert_eq!(h.head, node);
            node = h.tail;
        }
        assert_eq!(node, first.head);
    }
}

#[test]
fn grid_counts() {
    let map = grid();
    assert_eq!(map.node_count(), 9);
    assert_eq!(map.edge_count(), 12);
    assert_eq!(map.half_edge_count(), 16);
    assert_eq!(map.face_count(), 4);
    assert_eq!(map.portals().len(), 4);
    assert_eq!(map.open_half_edges().len(), 8);
    assert_rings_close(&map);
    assert_portal_symmetry(&map);
    map.validate().unwrap();
}

#[test]
fn derived_views_are_empty_until_update() {
    let mut map = grid();
    map.add_node(NodeKey(100), Point2::new(5.0, 5.0), Attributes::default())
        .unwrap();
    assert!(!map.is_derived());
    assert!(map.face_half_edges(&cell(0, 0)).is_empty());
    assert_eq!(map.reversed(HalfEdgeKey::new(grid_node(1, 0), grid_node(1, 1))), None);

    map.update();
    assert_eq!(map.face_half_edges(&cell(0, 0)).len(), 4);
}

#[test]
fn deleting_a_lone_face_node_removes_everything() {
    let mut map = PlanarMap::new();
    let pts = [
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 0.0),
        Point2::new(1.0, 1.0),
        Point2::new(0.0, 1.0),
    ];
    let face = create_face(&mut map, &mut Immediate::new(), &pts, Attributes::default())
        .unwrap()
        .applied()
        .unwrap();

    delete_elements(
        &mut map,
        &mut Immediate::new(),
        &[ElementKey::Node(face.first())],
    )
    .unwrap()
    .applied()
    .unwrap();
    assert!(map.is_empty());
}

#[test]
fn deleting_a_grid_corner_keeps_unrelated_faces() {
    let mut map = grid();
    delete_elements(
        &mut map,
        &mut Immediate::new(),
        &[ElementKey::Node(grid_node(1, 0))],
    )
    .unwrap()
    .applied()
    .unwrap();

    assert_eq!(map.face_count(), 2);
    assert!(map.face(&cell(0, 1)).is_some());
    assert!(map.face(&cell(1, 1)).is_some());
    assert_eq!(map.node_count(), 6);
    assert_eq!(map.half_edge_count(), 8);
    assert_eq!(map.portals().len(), 1);
    map.validate().unwrap();
}

#[test]
fn join_two_squares_into_a_portal() {
    let mut map = PlanarMap::new();
    let mut history = History::new();
    let square = |x0: f64| {
        [
            Point2::new(x0, 0.0),
            Point2::new(x0 + 64.0, 0.0),
            Point2::new(x0 + 64.0, 64.0),
            Point2::new(x0, 64.0),
        ]
    };
    let left = create_face(&mut map, &mut history, &square(0.0), Attributes::default())
        .unwrap()
        .applied()
        .unwrap();
    let right = create_face(&mut map, &mut history, &square(72.0), Attributes::default())
        .unwrap()
        .applied()
        .unwrap();
    let before = map.clone();

    let east = left.half_edges().nth(1).unwrap();
    let west = right.half_edges().nth(3).unwrap();
    let joined = join_edges(&mut map, &mut history, &[east, west], &EditorConfig::default())
        .unwrap()
        .applied()
        .unwrap();

    assert_eq!(joined.new_nodes.len(), 2);
    assert_eq!(map.node_count(), 6);
    assert_eq!(map.face_count(), 2);
    assert_eq!(map.portals().len(), 1);
    // The four welded nodes are gone.
    for old in [east.head, east.tail, west.head, west.tail] {
        assert!(map.node(old).is_none());
    }
    for node in &joined.new_nodes {
        assert_relative_eq!(map.node_position(*node).unwrap().x, 68.0);
    }
    assert_portal_symmetry(&map);
    map.validate().unwrap();

    history.undo(&mut map).unwrap();
    assert!(map.same_elements(&before));
    history.redo(&mut map).unwrap();
    assert_eq!(map.portals().len(), 1);
}

#[test]
fn split_grid_cell_keeps_portals() {
    let mut map = grid();
    let before = map.clone();
    let face = cell(0, 0);
    let east = HalfEdgeKey::new(grid_node(1, 0), grid_node(1, 1));
    let west = HalfEdgeKey::new(grid_node(0, 1), grid_node(0, 0));

    let mut history = History::new();
    let cut = [CutPoint::new(east, 0.5), CutPoint::new(west, 0.5)];
    let split = split_face(&mut map, &mut history, &cut, &EditorConfig::default())
        .unwrap()
        .applied()
        .unwrap();

    assert!(map.face(&face).is_none());
    assert_eq!(map.face_count(), 5);
    assert_eq!(map.node_count(), 11);
    for f in &split.faces {
        assert_relative_eq!(map.face_area(f).unwrap(), 0.5, epsilon = 1e-9);
    }
    assert_eq!(map.portals().len(), 6);
    assert_rings_close(&map);
    assert_portal_symmetry(&map);
    map.validate().unwrap();

    history.undo(&mut map).unwrap();
    assert!(map.same_elements(&before));
    assert_eq!(map.portals().len(), 4);
}

#[test]
fn copy_face_versus_copy_node() {
    let mut map = grid();
    let face_clip = Clipboard::copy(&map, &[ElementKey::Face(cell(1, 1))]).unwrap();
    assert_eq!(face_clip.snapshot().nodes.len(), 4);
    assert_eq!(face_clip.snapshot().half_edges.len(), 4);
    assert_eq!(face_clip.snapshot().faces.len(), 1);

    let node_clip = Clipboard::copy(&map, &[ElementKey::Node(grid_node(1, 1))]).unwrap();
    assert_eq!(node_clip.snapshot().nodes.len(), 1);
    assert!(node_clip.snapshot().half_edges.is_empty());

    let pasted = face_clip
        .paste(&mut map, &mut Immediate::new(), Vector2::new(10.0, 0.0))
        .unwrap()
        .applied()
        .unwrap();
    assert_eq!(map.face_count(), 5);
    assert_eq!(map.node_count(), 13);
    // The copy is not connected to the original grid.
    assert_eq!(map.portals().len(), 4);
    assert_relative_eq!(map.face_area(&pasted.faces[0]).unwrap(), 1.0);
}

#[test]
fn json_roundtrip_of_an_edited_map() {
    let mut map = grid();
    let cut = [
        CutPoint::new(HalfEdgeKey::new(grid_node(1, 0), grid_node(1, 1)), 0.5),
        CutPoint::new(HalfEdgeKey::new(grid_node(0, 1), grid_node(0, 0)), 0.5),
    ];
    assert!(split_face(&mut map, &mut Immediate::new(), &cut, &EditorConfig::default())
        .unwrap()
        .is_applied());

    let json = map.to_json().unwrap();
    let restored = PlanarMap::from_json(&json).unwrap();
    assert!(restored.same_elements(&map));
    assert_eq!(restored.faces_in_order(), map.faces_in_order());
    restored.validate().unwrap();
}
