// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Native JSON document for planar maps.
//!
//! The document carries the attribute schema, graph attributes, nodes,
//! half-edges and faces (in insertion order) with their explicit attribute
//! values. Attribute values are checked against their declared types when a
//! document is read, never when it is written.

use std::collections::BTreeMap;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::attributes::{AttrValue, AttributeDefinition, AttributeSchema, Attributes};
use crate::error::{Error, Result};
use crate::keys::*;
use crate::map::PlanarMap;

/// Serializable representation of a whole map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    #[serde(default)]
    pub attribute_definitions: DefinitionsSnapshot,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttrValue>,
    pub nodes: Vec<NodeSnapshot>,
    pub half_edges: Vec<HalfEdgeSnapshot>,
    pub faces: Vec<FaceSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionsSnapshot {
    #[serde(default)]
    pub graph: Vec<AttributeDefinition>,
    #[serde(default)]
    pub node: Vec<AttributeDefinition>,
    #[serde(default)]
    pub half_edge: Vec<AttributeDefinition>,
    #[serde(default)]
    pub face: Vec<AttributeDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub key: NodeKey,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttrValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalfEdgeSnapshot {
    pub head: NodeKey,
    pub tail: NodeKey,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttrValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSnapshot {
    pub ring: NodeRing,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<NodeRing>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttrValue>,
}

fn sorted(attributes: &Attributes) -> BTreeMap<String, AttrValue> {
    attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Checks every value against its declared type, widening ints to floats.
/// Attributes without a definition are kept as they are.
fn typed(
    schema: &AttributeSchema,
    kind: ElementKind,
    attributes: BTreeMap<String, AttrValue>,
) -> Result<Attributes> {
    attributes
        .into_iter()
        .map(|(name, value)| match schema.definition(kind, &name) {
            None => Ok((name, value)),
            Some(def) => match def.ty.coerce(value) {
                Some(v) => Ok((name, v)),
                None => Err(Error::Serialization(format!(
                    "{} attribute `{}` is not of declared type {}",
                    kind, name, def.ty
                ))),
            },
        })
        .collect()
}

impl PlanarMap {
    /// Serializes the map to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String> {
        let snapshot = self.to_snapshot();
        serde_json::to_string_pretty(&snapshot).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Creates a serializable snapshot. Nodes and half-edges are sorted by
    /// key so the output is stable.
    pub fn to_snapshot(&self) -> MapSnapshot {
        let mut nodes: Vec<NodeSnapshot> = self
            .nodes
            .iter()
            .map(|(k, n)| NodeSnapshot {
                key: *k,
                x: n.position.x,
                y: n.position.y,
                attributes: sorted(&n.attributes),
            })
            .collect();
        nodes.sort_unstable_by_key(|n| n.key);

        let mut half_edges: Vec<HalfEdgeSnapshot> = self
            .half_edges
            .iter()
            .map(|(k, h)| HalfEdgeSnapshot {
                head: k.head,
                tail: k.tail,
                attributes: sorted(&h.attributes),
            })
            .collect();
        half_edges.sort_unstable_by_key(|h| (h.head, h.tail));

        let faces = self
            .faces_in_order()
            .into_iter()
            .filter_map(|k| {
                let f = self.face(k)?;
                Some(FaceSnapshot {
                    ring: k.clone(),
                    holes: f.holes.clone(),
                    attributes: sorted(&f.attributes),
                })
            })
            .collect();

        MapSnapshot {
            attribute_definitions: DefinitionsSnapshot {
                graph: self.schema.definitions(ElementKind::Graph).to_vec(),
                node: self.schema.definitions(ElementKind::Node).to_vec(),
                half_edge: self.schema.definitions(ElementKind::HalfEdge).to_vec(),
                face: self.schema.definitions(ElementKind::Face).to_vec(),
            },
            attributes: sorted(&self.graph_attributes),
            nodes,
            half_edges,
            faces,
        }
    }

    /// Deserializes a map from a JSON string. Derived views are up to date on
    /// return.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: MapSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }

    /// Rebuilds a map from a snapshot.
    pub fn from_snapshot(snap: MapSnapshot) -> Result<Self> {
        let mut map = PlanarMap::new();

        let defs = snap.attribute_definitions;
        for (kind, list) in [
            (ElementKind::Graph, defs.graph),
            (ElementKind::Node, defs.node),
            (ElementKind::HalfEdge, defs.half_edge),
            (ElementKind::Face, defs.face),
        ] {
            for def in list {
                map.add_attribute_definition(kind, def.name, def.ty, def.default);
            }
        }

        for (name, value) in typed(&map.schema, ElementKind::Graph, snap.attributes)? {
            map.set_graph_attribute(name, value);
        }

        for ns in snap.nodes {
            let attributes = typed(&map.schema, ElementKind::Node, ns.attributes)?;
            map.add_node(ns.key, Point2::new(ns.x, ns.y), attributes)?;
        }

        for hs in snap.half_edges {
            let attributes = typed(&map.schema, ElementKind::HalfEdge, hs.attributes)?;
            map.add_half_edge(hs.head, hs.tail, attributes)?;
        }

        for fs in snap.faces {
            let attributes = typed(&map.schema, ElementKind::Face, fs.attributes)?;
            map.add_face(fs.ring, fs.holes, attributes)?;
        }

        map.update();
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttrType;

    fn two_squares() -> PlanarMap {
        let mut map = PlanarMap::new();
        map.add_face_attribute_definition("floorz", AttrType::Int, 0);
        map.add_half_edge_attribute_definition("shade", AttrType::Float, 0.0);
        map.set_graph_attribute("title", "E1M1");

        let coords = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 1.0), (1.0, 1.0), (2.0, 1.0)];
        for (i, (x, y)) in coords.iter().enumerate() {
            map.add_node(NodeKey(i as u64 + 1), Point2::new(*x, *y), Attributes::default())
                .unwrap();
        }
        // Added right-then-left so insertion order differs from key order.
        for corners in [[2, 3, 6, 5], [1, 2, 5, 4]] {
            let keys: Vec<_> = corners.iter().map(|&k| NodeKey(k)).collect();
            let mut attrs = Attributes::default();
            attrs.insert("floorz".into(), AttrValue::Int(corners[0] as i64 * 8));
            map.add_face(NodeRing::from_corners(&keys).unwrap(), Vec::new(), attrs)
                .unwrap();
        }
        map.set_attribute(
            &ElementKey::HalfEdge(HalfEdgeKey::new(NodeKey(2), NodeKey(5))),
            "shade",
            0.5,
        )
        .unwrap();
        map.update();
        map
    }

    #[test]
    fn roundtrip_empty_map() {
        let map = PlanarMap::new();
        let json = map.to_json().unwrap();
        let restored = PlanarMap::from_json(&json).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn roundtrip_preserves_content_and_order() {
        let map = two_squares();
        let json = map.to_json().unwrap();
        let restored = PlanarMap::from_json(&json).unwrap();

        assert!(restored.same_elements(&map));
        assert_eq!(restored.faces_in_order(), map.faces_in_order());
        assert_eq!(restored.schema(), map.schema());
        assert_eq!(restored.portals().len(), 1);
        restored.validate().unwrap();
    }

    #[test]
    fn default_values_are_not_written() {
        let mut map = two_squares();
        let face = map.faces_in_order()[0].clone();
        map.set_attribute(&ElementKey::Face(face), "floorz", 0).unwrap();

        let snap = map.to_snapshot();
        assert!(snap.faces[0].attributes.is_empty());
        assert_eq!(snap.faces[1].attributes.len(), 1);
    }

    #[test]
    fn ints_widen_to_declared_floats() {
        let json = r#"{
            "attribute_definitions": {
                "node": [{ "name": "light", "type": "float", "default": 0.0 }]
            },
            "nodes": [{ "key": 1, "x": 0.0, "y": 0.0, "attributes": { "light": 3 } }],
            "half_edges": [],
            "faces": []
        }"#;
        let map = PlanarMap::from_json(json).unwrap();
        assert_eq!(
            map.get_attribute(&ElementKey::Node(NodeKey(1)), "light")
                .unwrap(),
            AttrValue::Float(3.0)
        );
    }

    #[test]
    fn mistyped_values_are_rejected() {
        let json = r#"{
            "attribute_definitions": {
                "face": [{ "name": "floorz", "type": "int", "default": 0 }]
            },
            "nodes": [],
            "half_edges": [],
            "faces": [{ "ring": [1, 2, 3, 1], "attributes": { "floorz": "high" } }]
        }"#;
        let result = PlanarMap::from_json(json);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn malformed_rings_are_rejected() {
        let json = r#"{ "nodes": [], "half_edges": [], "faces": [{ "ring": [1, 2, 1] }] }"#;
        assert!(PlanarMap::from_json(json).is_err());
    }
}
