// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reversible change sets.
//!
//! A [`Tweak`] adds or removes a set of nodes, half-edges and faces together
//! with their data. Its [`inverse`](Tweak::inverse) flips the direction, so a
//! tweak captured before a removal restores the removed elements exactly
//! (same keys, positions and attributes).
//!
//! Operators group tweaks into an [`Edit`] and hand it to a [`DeltaSink`],
//! the explicit handle to whatever undo manager the host application uses.

use std::collections::BTreeMap;

use nalgebra::{Point2, Vector2};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::attributes::Attributes;
use crate::error::{Error, Result};
use crate::keys::*;
use crate::map::PlanarMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweakKind {
    Add,
    Remove,
}

impl TweakKind {
    pub fn inverse(self) -> Self {
        match self {
            TweakKind::Add => TweakKind::Remove,
            TweakKind::Remove => TweakKind::Add,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry {
    pub position: Point2<f64>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceEntry {
    pub holes: Vec<NodeRing>,
    pub attributes: Attributes,
    /// Insertion serial captured on removal, restored on re-add.
    pub(crate) serial: Option<u64>,
}

impl FaceEntry {
    pub fn new(holes: Vec<NodeRing>, attributes: Attributes) -> Self {
        Self {
            holes,
            attributes,
            serial: None,
        }
    }
}

/// A set of elements to add or remove, with their data.
#[derive(Debug, Clone, PartialEq)]
pub struct Tweak {
    pub kind: TweakKind,
    pub nodes: BTreeMap<NodeKey, NodeEntry>,
    pub half_edges: BTreeMap<HalfEdgeKey, Attributes>,
    pub faces: BTreeMap<FaceKey, FaceEntry>,
}

enum Applied {
    Node(NodeKey),
    HalfEdge(HalfEdgeKey),
    Face(FaceKey),
    RemovedNode(NodeKey, NodeEntry),
    RemovedHalfEdge(HalfEdgeKey, Attributes),
    RemovedFace(FaceKey, FaceEntry),
}

impl Tweak {
    pub fn new(kind: TweakKind) -> Self {
        Self {
            kind,
            nodes: BTreeMap::new(),
            half_edges: BTreeMap::new(),
            faces: BTreeMap::new(),
        }
    }

    pub fn add() -> Self {
        Self::new(TweakKind::Add)
    }

    pub fn remove() -> Self {
        Self::new(TweakKind::Remove)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.half_edges.is_empty() && self.faces.is_empty()
    }

    pub fn insert_node(&mut self, key: NodeKey, position: Point2<f64>, attributes: Attributes) {
        self.nodes.insert(key, NodeEntry { position, attributes });
    }

    pub fn insert_half_edge(&mut self, key: HalfEdgeKey, attributes: Attributes) {
        self.half_edges.insert(key, attributes);
    }

    pub fn insert_face(&mut self, key: FaceKey, holes: Vec<NodeRing>, attributes: Attributes) {
        self.faces.insert(key, FaceEntry::new(holes, attributes));
    }

    /// Like [`insert_face`](Self::insert_face), but the face takes over an
    /// existing insertion serial when added.
    pub(crate) fn insert_face_in_place_of(
        &mut self,
        key: FaceKey,
        holes: Vec<NodeRing>,
        attributes: Attributes,
        serial: u64,
    ) {
        self.faces.insert(
            key,
            FaceEntry {
                holes,
                attributes,
                serial: Some(serial),
            },
        );
    }

    /// Records a node's current data.
    pub fn capture_node(&mut self, map: &PlanarMap, key: NodeKey) -> Result<()> {
        let node = map.node(key).ok_or(Error::NodeNotFound(key))?;
        self.insert_node(key, node.position, node.attributes.clone());
        Ok(())
    }

    /// Records a half-edge's current data.
    pub fn capture_half_edge(&mut self, map: &PlanarMap, key: HalfEdgeKey) -> Result<()> {
        let data = map.half_edge(key).ok_or(Error::HalfEdgeNotFound(key))?;
        self.insert_half_edge(key, data.attributes.clone());
        Ok(())
    }

    /// Records a face's current data, including its insertion serial.
    pub fn capture_face(&mut self, map: &PlanarMap, key: &FaceKey) -> Result<()> {
        let data = map
            .face(key)
            .ok_or_else(|| Error::FaceNotFound(key.clone()))?;
        self.faces.insert(
            key.clone(),
            FaceEntry {
                holes: data.holes.clone(),
                attributes: data.attributes.clone(),
                serial: Some(data.serial),
            },
        );
        Ok(())
    }

    /// The same elements with the opposite direction.
    pub fn inverse(&self) -> Self {
        Self {
            kind: self.kind.inverse(),
            ..self.clone()
        }
    }

    /// A copy with every node key mapped through `mapping` (keys missing from
    /// the mapping are kept) and every position translated by `offset`.
    pub fn remapped(
        &self,
        mapping: &FxHashMap<NodeKey, NodeKey>,
        offset: Vector2<f64>,
    ) -> Result<Self> {
        let map_node = |k: NodeKey| mapping.get(&k).copied().unwrap_or(k);
        let map_ring =
            |r: &NodeRing| NodeRing::new(r.nodes().iter().map(|&k| map_node(k)).collect());

        let mut out = Tweak::new(self.kind);
        for (k, entry) in &self.nodes {
            out.insert_node(
                map_node(*k),
                entry.position + offset,
                entry.attributes.clone(),
            );
        }
        for (h, attributes) in &self.half_edges {
            let key = HalfEdgeKey::new(map_node(h.head), map_node(h.tail));
            out.insert_half_edge(key, attributes.clone());
        }
        for (f, entry) in &self.faces {
            let holes = entry
                .holes
                .iter()
                .map(map_ring)
                .collect::<Result<Vec<_>>>()?;
            out.insert_face(map_ring(f)?, holes, entry.attributes.clone());
        }
        Ok(out)
    }

    /// Applies the tweak. All-or-nothing: on failure everything this call
    /// changed is rolled back and the error is returned.
    ///
    /// Derived views are left stale; [`Edit::apply`] refreshes them.
    pub fn apply(&self, map: &mut PlanarMap) -> Result<()> {
        let mut log = Vec::new();
        let result = match self.kind {
            TweakKind::Add => self.apply_add(map, &mut log),
            TweakKind::Remove => self.apply_remove(map, &mut log),
        };
        if let Err(e) = result {
            warn!(error = %e, steps = log.len(), "tweak failed, rolling back");
            rollback(map, log);
            return Err(e);
        }
        Ok(())
    }

    fn apply_add(&self, map: &mut PlanarMap, log: &mut Vec<Applied>) -> Result<()> {
        for (k, entry) in &self.nodes {
            if map.add_node(*k, entry.position, entry.attributes.clone())? {
                log.push(Applied::Node(*k));
            }
        }
        for (h, attributes) in &self.half_edges {
            map.add_half_edge(h.head, h.tail, attributes.clone())?;
            log.push(Applied::HalfEdge(*h));
        }
        for (f, entry) in &self.faces {
            map.add_face(f.clone(), entry.holes.clone(), entry.attributes.clone())?;
            if let Some(serial) = entry.serial {
                if let Some(face) = map.faces.get_mut(f) {
                    face.serial = serial;
                }
            }
            log.push(Applied::Face(f.clone()));
        }
        Ok(())
    }

    fn apply_remove(&self, map: &mut PlanarMap, log: &mut Vec<Applied>) -> Result<()> {
        for f in self.faces.keys() {
            let data = map.remove_face(f)?;
            log.push(Applied::RemovedFace(
                f.clone(),
                FaceEntry {
                    holes: data.holes,
                    attributes: data.attributes,
                    serial: Some(data.serial),
                },
            ));
        }
        for h in self.half_edges.keys() {
            let data = map.remove_half_edge(*h)?;
            log.push(Applied::RemovedHalfEdge(*h, data.attributes));
        }
        for k in self.nodes.keys() {
            let data = map.remove_node(*k)?;
            log.push(Applied::RemovedNode(
                *k,
                NodeEntry {
                    position: data.position,
                    attributes: data.attributes,
                },
            ));
        }
        Ok(())
    }
}

/// Undoes logged steps in reverse order. Every step undoes a change that
/// just succeeded, so the inverse operations cannot conflict.
fn rollback(map: &mut PlanarMap, log: Vec<Applied>) {
    for step in log.into_iter().rev() {
        let result = match step {
            Applied::Face(f) => map.remove_face(&f).map(drop),
            Applied::HalfEdge(h) => map.remove_half_edge(h).map(drop),
            Applied::Node(k) => map.remove_node(k).map(drop),
            Applied::RemovedFace(f, entry) => {
                let restored = map.add_face(f.clone(), entry.holes, entry.attributes);
                if let (Ok(()), Some(serial), Some(face)) =
                    (&restored, entry.serial, map.faces.get_mut(&f))
                {
                    face.serial = serial;
                }
                restored
            }
            Applied::RemovedHalfEdge(h, attributes) => {
                map.add_half_edge(h.head, h.tail, attributes)
            }
            Applied::RemovedNode(k, entry) => {
                map.add_node(k, entry.position, entry.attributes).map(drop)
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "rollback step failed");
        }
    }
}

/// A labelled sequence of tweaks: the unit submitted to a [`DeltaSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub label: String,
    pub tweaks: Vec<Tweak>,
}

impl Edit {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tweaks: Vec::new(),
        }
    }

    /// Appends a tweak, skipping empty ones.
    pub fn with(mut self, tweak: Tweak) -> Self {
        self.push(tweak);
        self
    }

    pub fn push(&mut self, tweak: Tweak) {
        if !tweak.is_empty() {
            self.tweaks.push(tweak);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tweaks.is_empty()
    }

    /// Applies every tweak in order, then refreshes derived views. If a
    /// tweak fails, the earlier ones are reverted.
    pub fn apply(&self, map: &mut PlanarMap) -> Result<()> {
        for (i, tweak) in self.tweaks.iter().enumerate() {
            if let Err(e) = tweak.apply(map) {
                for done in self.tweaks[..i].iter().rev() {
                    if let Err(undo) = done.inverse().apply(map) {
                        warn!(label = %self.label, error = %undo, "failed to revert partial edit");
                    }
                }
                map.update();
                return Err(e);
            }
        }
        map.update();
        debug!(label = %self.label, tweaks = self.tweaks.len(), "edit applied");
        Ok(())
    }

    /// The edit that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            label: self.label.clone(),
            tweaks: self.tweaks.iter().rev().map(Tweak::inverse).collect(),
        }
    }

    pub fn revert(&self, map: &mut PlanarMap) -> Result<()> {
        self.inverse().apply(map)
    }
}

/// Where operators send their edits.
pub trait DeltaSink {
    /// Applies `edit` to `map` and takes ownership of it.
    fn submit(&mut self, map: &mut PlanarMap, edit: Edit) -> Result<()>;
}

/// Applies edits without keeping them.
#[derive(Debug, Default)]
pub struct Immediate {
    labels: Vec<String>,
}

impl Immediate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels of the edits applied so far.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl DeltaSink for Immediate {
    fn submit(&mut self, map: &mut PlanarMap, edit: Edit) -> Result<()> {
        edit.apply(map)?;
        self.labels.push(edit.label);
        Ok(())
    }
}

/// Linear undo/redo stacks.
#[derive(Debug, Default)]
pub struct History {
    undo: Vec<Edit>,
    redo: Vec<Edit>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo.last().map(|e| e.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo.last().map(|e| e.label.as_str())
    }

    /// Reverts the latest edit. Returns `false` if there is nothing to undo.
    pub fn undo(&mut self, map: &mut PlanarMap) -> Result<bool> {
        let Some(edit) = self.undo.pop() else {
            return Ok(false);
        };
        if let Err(e) = edit.revert(map) {
            self.undo.push(edit);
            return Err(e);
        }
        self.redo.push(edit);
        Ok(true)
    }

    /// Re-applies the latest undone edit.
    pub fn redo(&mut self, map: &mut PlanarMap) -> Result<bool> {
        let Some(edit) = self.redo.pop() else {
            return Ok(false);
        };
        if let Err(e) = edit.apply(map) {
            self.redo.push(edit);
            return Err(e);
        }
        self.undo.push(edit);
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl DeltaSink for History {
    fn submit(&mut self, map: &mut PlanarMap, edit: Edit) -> Result<()> {
        edit.apply(map)?;
        self.undo.push(edit);
        self.redo.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttrValue;

    fn triangle_tweak() -> Tweak {
        let mut t = Tweak::add();
        let pts = [(0.0, 0.0), (4.0, 0.0), (0.0, 4.0)];
        for (i, (x, y)) in pts.iter().enumerate() {
            t.insert_node(NodeKey(i as u64 + 1), Point2::new(*x, *y), Attributes::default());
        }
        let ring = NodeRing::from_corners(&[NodeKey(1), NodeKey(2), NodeKey(3)]).unwrap();
        for h in ring.half_edges() {
            t.insert_half_edge(h, Attributes::default());
        }
        let mut attrs = Attributes::default();
        attrs.insert("floorz".into(), AttrValue::Int(512));
        t.insert_face(ring, Vec::new(), attrs);
        t
    }

    #[test]
    fn add_then_inverse_restores_empty_map() {
        let mut map = PlanarMap::new();
        let t = triangle_tweak();
        t.apply(&mut map).unwrap();
        assert_eq!(map.face_count(), 1);
        assert_eq!(map.half_edge_count(), 3);

        t.inverse().apply(&mut map).unwrap();
        assert!(map.same_elements(&PlanarMap::new()));
    }

    #[test]
    fn failed_add_rolls_back() {
        let mut map = PlanarMap::new();
        map.add_node(NodeKey(3), Point2::new(0.0, 4.0), Attributes::default())
            .unwrap();
        map.add_half_edge(NodeKey(3), NodeKey(1), Attributes::default())
            .unwrap();
        let before = map.clone();

        // (3 -> 1) already exists, so the tweak fails after adding node 2 and
        // two half-edges.
        let err = triangle_tweak().apply(&mut map).unwrap_err();
        assert!(matches!(err, Error::DuplicateHalfEdge(_)));
        assert!(map.same_elements(&before));
    }

    #[test]
    fn history_undo_redo() {
        let mut map = PlanarMap::new();
        let mut history = History::new();
        history
            .submit(&mut map, Edit::new("draw").with(triangle_tweak()))
            .unwrap();
        assert_eq!(history.undo_label(), Some("draw"));
        let drawn = map.clone();

        assert!(history.undo(&mut map).unwrap());
        assert!(map.is_empty());
        assert!(history.can_redo());

        assert!(history.redo(&mut map).unwrap());
        assert!(map.same_elements(&drawn));
        assert!(!history.redo(&mut map).unwrap());
    }

    #[test]
    fn removal_restores_face_order() {
        let mut map = PlanarMap::new();
        triangle_tweak().apply(&mut map).unwrap();
        let face = map.faces_in_order()[0].clone();

        let mut removal = Tweak::remove();
        removal.capture_face(&map, &face).unwrap();
        let edit = Edit::new("delete").with(removal);
        edit.apply(&mut map).unwrap();
        assert_eq!(map.face_count(), 0);

        edit.revert(&mut map).unwrap();
        assert_eq!(map.face(&face).unwrap().serial, 0);
        assert_eq!(map.face(&face).unwrap().attributes["floorz"], AttrValue::Int(512));
    }

    #[test]
    fn remapping_translates_and_renames() {
        let t = triangle_tweak();
        let mut mapping = FxHashMap::default();
        for i in 1..=3 {
            mapping.insert(NodeKey(i), NodeKey(i + 10));
        }
        let moved = t.remapped(&mapping, Vector2::new(1.0, 1.0)).unwrap();
        assert_eq!(moved.nodes[&NodeKey(11)].position, Point2::new(1.0, 1.0));
        assert!(moved
            .half_edges
            .contains_key(&HalfEdgeKey::new(NodeKey(11), NodeKey(12))));
        let ring = moved.faces.keys().next().unwrap();
        assert_eq!(ring.first(), NodeKey(11));
    }
}
