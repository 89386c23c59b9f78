// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw insertion and removal of planar map elements.
//!
//! Every call validates before it mutates, so a call that returns an error
//! leaves the map untouched. Removals never cascade: a node can only be
//! removed once no half-edge references it, and a half-edge only once no face
//! ring claims it. Cascading deletion is the job of
//! [`delete_elements`](crate::operators::delete_elements).
//!
//! Mutations mark the derived views stale; call
//! [`update`](PlanarMap::update) before relying on them.

use nalgebra::Point2;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::attributes::Attributes;
use crate::error::{Error, Result};
use crate::keys::*;
use crate::map::*;

impl PlanarMap {
    /// Inserts a node.
    ///
    /// Re-adding an existing key with the same position and attributes is a
    /// no-op that returns `Ok(false)`; different data is a
    /// [`Error::DuplicateNode`].
    pub fn add_node(
        &mut self,
        key: NodeKey,
        position: Point2<f64>,
        attributes: Attributes,
    ) -> Result<bool> {
        let attributes = self.schema.strip_defaults(ElementKind::Node, attributes);
        if let Some(existing) = self.nodes.get(&key) {
            if existing.position == position && existing.attributes == attributes {
                return Ok(false);
            }
            return Err(Error::DuplicateNode(key));
        }

        self.reserve_node_key(key);
        self.nodes.insert(key, NodeData { position, attributes });
        self.derived.invalidate();
        Ok(true)
    }

    /// Inserts a directed half-edge from `head` to `tail`.
    ///
    /// Missing endpoint nodes are created at the origin.
    pub fn add_half_edge(
        &mut self,
        head: NodeKey,
        tail: NodeKey,
        attributes: Attributes,
    ) -> Result<()> {
        let key = HalfEdgeKey::new(head, tail);
        if head == tail {
            return Err(Error::DegenerateHalfEdge(key));
        }
        if self.half_edges.contains_key(&key) {
            return Err(Error::DuplicateHalfEdge(key));
        }

        for node in [head, tail] {
            if !self.nodes.contains_key(&node) {
                debug!(node = %node, half_edge = %key, "auto-creating endpoint node");
                self.reserve_node_key(node);
                self.nodes.insert(
                    node,
                    NodeData {
                        position: Point2::origin(),
                        attributes: Attributes::default(),
                    },
                );
            }
        }

        let attributes = self.schema.strip_defaults(ElementKind::HalfEdge, attributes);
        self.half_edges.insert(key, HalfEdgeData { attributes });
        self.link_node_half_edge(key);
        self.derived.invalidate();
        Ok(())
    }

    /// Inserts a face bounded by `ring` with optional hole rings.
    ///
    /// Ring half-edges that do not exist yet are created without attributes;
    /// existing ones are reused as they are. No ring half-edge may already
    /// bound another face, and no half-edge may appear in two of the face's
    /// own rings.
    pub fn add_face(
        &mut self,
        ring: NodeRing,
        holes: Vec<NodeRing>,
        attributes: Attributes,
    ) -> Result<()> {
        if self.faces.contains_key(&ring) {
            return Err(Error::DuplicateFace(ring));
        }

        let mut seen = FxHashSet::default();
        for r in std::iter::once(&ring).chain(holes.iter()) {
            for h in r.half_edges() {
                if !seen.insert(h) {
                    return Err(Error::MalformedRing(format!(
                        "half-edge {} is used by two rings of face {}",
                        h, ring
                    )));
                }
                if let Some(owner) = self.claims.get(&h) {
                    return Err(Error::HalfEdgeClaimed {
                        half_edge: h,
                        face: owner.clone(),
                    });
                }
            }
        }

        for h in &seen {
            if !self.half_edges.contains_key(h) {
                self.add_half_edge(h.head, h.tail, Attributes::default())?;
            }
        }
        for h in seen {
            self.claims.insert(h, ring.clone());
        }

        let attributes = self.schema.strip_defaults(ElementKind::Face, attributes);
        let serial = self.next_face_serial;
        self.next_face_serial += 1;
        self.faces.insert(
            ring,
            FaceData {
                holes,
                attributes,
                serial,
            },
        );
        self.derived.invalidate();
        Ok(())
    }

    /// Removes a face, releasing its ring half-edges (which stay in the map).
    pub fn remove_face(&mut self, key: &FaceKey) -> Result<FaceData> {
        let face = self
            .faces
            .remove(key)
            .ok_or_else(|| Error::FaceNotFound(key.clone()))?;

        for h in key.half_edges().chain(face.holes.iter().flat_map(|r| r.half_edges())) {
            self.claims.remove(&h);
        }
        self.derived.invalidate();
        Ok(face)
    }

    /// Removes a half-edge that no face claims. Its endpoints stay in the map.
    pub fn remove_half_edge(&mut self, key: HalfEdgeKey) -> Result<HalfEdgeData> {
        if !self.half_edges.contains_key(&key) {
            return Err(Error::HalfEdgeNotFound(key));
        }
        if let Some(face) = self.claims.get(&key) {
            return Err(Error::HalfEdgeClaimed {
                half_edge: key,
                face: face.clone(),
            });
        }

        let data = self
            .half_edges
            .remove(&key)
            .ok_or(Error::HalfEdgeNotFound(key))?;
        self.unlink_node_half_edge(key);
        self.derived.invalidate();
        Ok(data)
    }

    /// Removes a node that no half-edge references.
    pub fn remove_node(&mut self, key: NodeKey) -> Result<NodeData> {
        let in_use = self.incident_count(key);
        if in_use > 0 {
            return Err(Error::NodeInUse(key, in_use));
        }
        let data = self.nodes.remove(&key).ok_or(Error::NodeNotFound(key))?;
        self.derived.invalidate();
        Ok(data)
    }

    /// Moves a node. Positions are not part of any key, so topology is
    /// unaffected; derived angle ordering is invalidated.
    pub fn set_node_position(&mut self, key: NodeKey, position: Point2<f64>) -> Result<()> {
        let node = self.nodes.get_mut(&key).ok_or(Error::NodeNotFound(key))?;
        node.position = position;
        self.derived.invalidate();
        Ok(())
    }
}
