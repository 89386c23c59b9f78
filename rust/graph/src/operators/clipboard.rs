// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Copy and paste of map elements.

use std::collections::BTreeMap;

use nalgebra::Vector2;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::{abort, Abort, Outcome};
use crate::error::{Error, Result};
use crate::keys::*;
use crate::map::PlanarMap;
use crate::tweak::{DeltaSink, Edit, Tweak};

/// A snapshot of copied elements, closed under dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct Clipboard {
    snapshot: Tweak,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PasteResult {
    /// Copied node key → pasted node key.
    pub key_map: BTreeMap<NodeKey, NodeKey>,
    /// Keys of the pasted faces.
    pub faces: Vec<FaceKey>,
}

impl Clipboard {
    /// Copies `elements`. A face brings its ring half-edges and their nodes,
    /// a half-edge brings its two nodes, a node comes alone.
    pub fn copy(map: &PlanarMap, elements: &[ElementKey]) -> Result<Self> {
        let mut snapshot = Tweak::add();
        for element in elements {
            match element {
                ElementKey::Node(k) => snapshot.capture_node(map, *k)?,
                ElementKey::HalfEdge(h) => {
                    snapshot.capture_half_edge(map, *h)?;
                    snapshot.capture_node(map, h.head)?;
                    snapshot.capture_node(map, h.tail)?;
                }
                ElementKey::Face(f) => {
                    let data = map.face(f).ok_or_else(|| Error::FaceNotFound(f.clone()))?;
                    snapshot.insert_face(f.clone(), data.holes.clone(), data.attributes.clone());
                    for ring in std::iter::once(f).chain(data.holes.iter()) {
                        for h in ring.half_edges() {
                            snapshot.capture_half_edge(map, h)?;
                        }
                        for &n in ring.corners() {
                            snapshot.capture_node(map, n)?;
                        }
                    }
                }
            }
        }
        debug!(
            nodes = snapshot.nodes.len(),
            half_edges = snapshot.half_edges.len(),
            faces = snapshot.faces.len(),
            "copied elements"
        );
        Ok(Self { snapshot })
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// The copied elements as an additive tweak.
    pub fn snapshot(&self) -> &Tweak {
        &self.snapshot
    }

    /// Pastes a copy with fresh node keys, translated by `offset`.
    pub fn paste(
        &self,
        map: &mut PlanarMap,
        sink: &mut dyn DeltaSink,
        offset: Vector2<f64>,
    ) -> Result<Outcome<PasteResult>> {
        if self.snapshot.is_empty() {
            return abort("paste", Abort::EmptySelection);
        }

        let mut mapping = FxHashMap::default();
        let mut key_map = BTreeMap::new();
        for &old in self.snapshot.nodes.keys() {
            let new = map.allocate_node_key();
            mapping.insert(old, new);
            key_map.insert(old, new);
        }
        let pasted = self.snapshot.remapped(&mapping, offset)?;
        let faces = pasted.faces.keys().cloned().collect();

        sink.submit(map, Edit::new("Paste").with(pasted))?;
        Ok(Outcome::Applied(PasteResult { key_map, faces }))
    }
}
