// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed key-value attributes attached to the map and its elements.
//!
//! The schema (name, semantic type, default) lives per element category and
//! is kept separate from the instances. Instances only store values that
//! differ from the schema default; lookups fall back to the default.
//!
//! The declared type is a tag for serialization. Values are not checked
//! against it when they are set.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys::{ElementKey, ElementKind};
use crate::map::PlanarMap;

/// A loosely typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Integer view. Floats with no fractional part are accepted.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            AttrValue::Int(v) => Some(v),
            AttrValue::Float(v) if v.fract() == 0.0 => Some(v as i64),
            AttrValue::Bool(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match *self {
            AttrValue::Float(v) => Some(v),
            AttrValue::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            AttrValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// The semantic type this value carries.
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::Bool(_) => AttrType::Bool,
            AttrValue::Int(_) => AttrType::Int,
            AttrValue::Float(_) => AttrType::Float,
            AttrValue::Str(_) => AttrType::Str,
            AttrValue::List(_) => AttrType::List,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(v: Vec<AttrValue>) -> Self {
        AttrValue::List(v)
    }
}

/// Semantic type tag of an attribute definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    Bool,
    Int,
    Float,
    Str,
    List,
}

impl AttrType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrType::Bool => "bool",
            AttrType::Int => "int",
            AttrType::Float => "float",
            AttrType::Str => "str",
            AttrType::List => "list",
        }
    }

    /// Converts `value` to this type if it fits. Integers widen to floats;
    /// everything else must already carry the right tag.
    pub fn coerce(self, value: AttrValue) -> Option<AttrValue> {
        match (self, value) {
            (AttrType::Float, AttrValue::Int(v)) => Some(AttrValue::Float(v as f64)),
            (ty, v) if v.attr_type() == ty => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema entry for one attribute of one element category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: AttrType,
    pub default: AttrValue,
}

/// Explicit attribute values stored on an element.
pub type Attributes = FxHashMap<String, AttrValue>;

/// Attribute definitions for every element category, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSchema {
    categories: [Vec<AttributeDefinition>; 4],
}

impl AttributeSchema {
    /// Registers a definition. Re-registering a name replaces its type and
    /// default in place.
    pub fn define(
        &mut self,
        kind: ElementKind,
        name: impl Into<String>,
        ty: AttrType,
        default: AttrValue,
    ) {
        let name = name.into();
        let defs = &mut self.categories[kind as usize];
        match defs.iter_mut().find(|d| d.name == name) {
            Some(def) => {
                def.ty = ty;
                def.default = default;
            }
            None => defs.push(AttributeDefinition { name, ty, default }),
        }
    }

    pub fn definition(&self, kind: ElementKind, name: &str) -> Option<&AttributeDefinition> {
        self.categories[kind as usize].iter().find(|d| d.name == name)
    }

    pub fn definitions(&self, kind: ElementKind) -> &[AttributeDefinition] {
        &self.categories[kind as usize]
    }

    pub fn default_value(&self, kind: ElementKind, name: &str) -> Option<&AttrValue> {
        self.definition(kind, name).map(|d| &d.default)
    }

    /// Schema defaults merged with `explicit` (explicit values win).
    pub fn merged(&self, kind: ElementKind, explicit: &Attributes) -> Attributes {
        let mut merged: Attributes = self
            .definitions(kind)
            .iter()
            .map(|d| (d.name.clone(), d.default.clone()))
            .collect();
        merged.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Drops values equal to their schema default.
    pub fn strip_defaults(&self, kind: ElementKind, mut attributes: Attributes) -> Attributes {
        attributes.retain(|name, value| self.default_value(kind, name) != Some(value));
        attributes
    }
}

impl PlanarMap {
    /// Returns the attribute schema.
    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Registers an attribute definition for an element category.
    pub fn add_attribute_definition(
        &mut self,
        kind: ElementKind,
        name: impl Into<String>,
        ty: AttrType,
        default: impl Into<AttrValue>,
    ) {
        self.schema.define(kind, name, ty, default.into());
    }

    pub fn add_graph_attribute_definition(
        &mut self,
        name: impl Into<String>,
        ty: AttrType,
        default: impl Into<AttrValue>,
    ) {
        self.add_attribute_definition(ElementKind::Graph, name, ty, default);
    }

    pub fn add_node_attribute_definition(
        &mut self,
        name: impl Into<String>,
        ty: AttrType,
        default: impl Into<AttrValue>,
    ) {
        self.add_attribute_definition(ElementKind::Node, name, ty, default);
    }

    pub fn add_half_edge_attribute_definition(
        &mut self,
        name: impl Into<String>,
        ty: AttrType,
        default: impl Into<AttrValue>,
    ) {
        self.add_attribute_definition(ElementKind::HalfEdge, name, ty, default);
    }

    pub fn add_face_attribute_definition(
        &mut self,
        name: impl Into<String>,
        ty: AttrType,
        default: impl Into<AttrValue>,
    ) {
        self.add_attribute_definition(ElementKind::Face, name, ty, default);
    }

    /// Explicit (non-default) values stored on an element.
    pub fn explicit_attributes(&self, element: &ElementKey) -> Result<&Attributes> {
        match element {
            ElementKey::Node(k) => self
                .nodes
                .get(k)
                .map(|n| &n.attributes)
                .ok_or(Error::NodeNotFound(*k)),
            ElementKey::HalfEdge(k) => self
                .half_edges
                .get(k)
                .map(|h| &h.attributes)
                .ok_or(Error::HalfEdgeNotFound(*k)),
            ElementKey::Face(k) => self
                .faces
                .get(k)
                .map(|f| &f.attributes)
                .ok_or_else(|| Error::FaceNotFound(k.clone())),
        }
    }

    fn explicit_attributes_mut(&mut self, element: &ElementKey) -> Result<&mut Attributes> {
        match element {
            ElementKey::Node(k) => self
                .nodes
                .get_mut(k)
                .map(|n| &mut n.attributes)
                .ok_or(Error::NodeNotFound(*k)),
            ElementKey::HalfEdge(k) => self
                .half_edges
                .get_mut(k)
                .map(|h| &mut h.attributes)
                .ok_or(Error::HalfEdgeNotFound(*k)),
            ElementKey::Face(k) => self
                .faces
                .get_mut(k)
                .map(|f| &mut f.attributes)
                .ok_or_else(|| Error::FaceNotFound(k.clone())),
        }
    }

    /// Returns an attribute value, falling back to the schema default.
    pub fn get_attribute(&self, element: &ElementKey, name: &str) -> Result<AttrValue> {
        let kind = element.kind();
        let explicit = self.explicit_attributes(element)?;
        lookup(&self.schema, kind, explicit, name)
    }

    /// Sets an attribute. A value equal to the schema default clears the
    /// explicit entry instead of storing it.
    pub fn set_attribute(
        &mut self,
        element: &ElementKey,
        name: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Result<()> {
        let name = name.into();
        let value = value.into();
        let is_default = self.schema.default_value(element.kind(), &name) == Some(&value);
        let attributes = self.explicit_attributes_mut(element)?;
        if is_default {
            attributes.remove(&name);
        } else {
            attributes.insert(name, value);
        }
        Ok(())
    }

    /// All attributes of an element: schema defaults merged with explicit values.
    pub fn get_attributes(&self, element: &ElementKey) -> Result<Attributes> {
        let explicit = self.explicit_attributes(element)?;
        Ok(self.schema.merged(element.kind(), explicit))
    }

    pub fn graph_attribute(&self, name: &str) -> Result<AttrValue> {
        lookup(&self.schema, ElementKind::Graph, &self.graph_attributes, name)
    }

    pub fn set_graph_attribute(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let name = name.into();
        let value = value.into();
        if self.schema.default_value(ElementKind::Graph, &name) == Some(&value) {
            self.graph_attributes.remove(&name);
        } else {
            self.graph_attributes.insert(name, value);
        }
    }

    pub fn graph_attributes(&self) -> Attributes {
        self.schema.merged(ElementKind::Graph, &self.graph_attributes)
    }

    /// Explicit graph-level values (defaults omitted).
    pub fn explicit_graph_attributes(&self) -> &Attributes {
        &self.graph_attributes
    }
}

fn lookup(
    schema: &AttributeSchema,
    kind: ElementKind,
    explicit: &Attributes,
    name: &str,
) -> Result<AttrValue> {
    explicit
        .get(name)
        .or_else(|| schema.default_value(kind, name))
        .cloned()
        .ok_or_else(|| Error::UnknownAttribute {
            kind,
            name: name.to_string(),
        })
}
