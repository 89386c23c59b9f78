// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GEXF 1.2 export (write-only interchange for graph tools).
//!
//! Nodes become GEXF nodes with `x`/`y` attributes, half-edges become
//! directed edges carrying their owning face. Schema attributes are written
//! with their merged values; undeclared explicit attributes are declared on
//! the fly as strings.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::attributes::{AttrType, AttrValue, Attributes};
use crate::error::{Error, Result};
use crate::keys::*;
use crate::map::PlanarMap;

struct Column {
    name: String,
    ty: &'static str,
}

fn gexf_type(ty: AttrType) -> &'static str {
    match ty {
        AttrType::Bool => "boolean",
        AttrType::Int => "long",
        AttrType::Float => "double",
        AttrType::Str | AttrType::List => "string",
    }
}

fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn format_value(value: &AttrValue) -> String {
    match value {
        AttrValue::Bool(v) => v.to_string(),
        AttrValue::Int(v) => v.to_string(),
        AttrValue::Float(v) => v.to_string(),
        AttrValue::Str(v) => escape_xml(v),
        AttrValue::List(_) => escape_xml(&serde_json::to_string(value).unwrap_or_default()),
    }
}

/// Schema columns for `kind`, then any explicit names the schema lacks.
fn columns<'a>(
    map: &PlanarMap,
    kind: ElementKind,
    explicit: impl Iterator<Item = &'a Attributes>,
) -> Vec<Column> {
    let mut cols: Vec<Column> = map
        .schema()
        .definitions(kind)
        .iter()
        .map(|d| Column {
            name: d.name.clone(),
            ty: gexf_type(d.ty),
        })
        .collect();
    let extra: BTreeSet<&String> = explicit
        .flat_map(|a| a.keys())
        .filter(|name| map.schema().definition(kind, name).is_none())
        .collect();
    cols.extend(extra.into_iter().map(|name| Column {
        name: name.clone(),
        ty: "string",
    }));
    cols
}

fn write_columns(
    out: &mut String,
    class: &str,
    fixed: &[(&str, &str)],
    cols: &[Column],
) -> std::fmt::Result {
    writeln!(out, "    <attributes class=\"{}\">", class)?;
    for (i, (name, ty)) in fixed.iter().enumerate() {
        writeln!(out, "      <attribute id=\"{}\" title=\"{}\" type=\"{}\"/>", i, name, ty)?;
    }
    for (i, col) in cols.iter().enumerate() {
        writeln!(
            out,
            "      <attribute id=\"{}\" title=\"{}\" type=\"{}\"/>",
            i + fixed.len(),
            escape_xml(&col.name),
            col.ty
        )?;
    }
    writeln!(out, "    </attributes>")
}

fn write_values(
    out: &mut String,
    values: &[String],
    cols: &[Column],
    merged: &Attributes,
) -> std::fmt::Result {
    writeln!(out, "        <attvalues>")?;
    for (i, v) in values.iter().enumerate() {
        writeln!(out, "          <attvalue for=\"{}\" value=\"{}\"/>", i, v)?;
    }
    for (i, col) in cols.iter().enumerate() {
        if let Some(v) = merged.get(&col.name) {
            writeln!(
                out,
                "          <attvalue for=\"{}\" value=\"{}\"/>",
                i + values.len(),
                format_value(v)
            )?;
        }
    }
    writeln!(out, "        </attvalues>")
}

fn write_gexf(map: &PlanarMap, out: &mut String) -> std::fmt::Result {
    let mut nodes: Vec<NodeKey> = map.nodes().collect();
    nodes.sort_unstable();
    let mut half_edges: Vec<HalfEdgeKey> = map.half_edges().collect();
    half_edges.sort_unstable();

    let node_cols = columns(
        map,
        ElementKind::Node,
        nodes.iter().filter_map(|k| map.node(*k)).map(|n| &n.attributes),
    );
    let edge_cols = columns(
        map,
        ElementKind::HalfEdge,
        half_edges
            .iter()
            .filter_map(|h| map.half_edge(*h))
            .map(|h| &h.attributes),
    );

    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, r#"<gexf xmlns="http://www.gexf.net/1.2draft" version="1.2">"#)?;
    writeln!(out, r#"  <graph defaultedgetype="directed" mode="static">"#)?;
    write_columns(out, "node", &[("x", "double"), ("y", "double")], &node_cols)?;
    write_columns(out, "edge", &[("face", "string")], &edge_cols)?;

    writeln!(out, "    <nodes>")?;
    for key in &nodes {
        let Some(node) = map.node(*key) else { continue };
        writeln!(out, "      <node id=\"{}\" label=\"{}\">", key.0, key)?;
        let fixed = [node.position.x.to_string(), node.position.y.to_string()];
        let merged = map.schema().merged(ElementKind::Node, &node.attributes);
        write_values(out, &fixed, &node_cols, &merged)?;
        writeln!(out, "      </node>")?;
    }
    writeln!(out, "    </nodes>")?;

    writeln!(out, "    <edges>")?;
    for (i, h) in half_edges.iter().enumerate() {
        let Some(data) = map.half_edge(*h) else { continue };
        writeln!(
            out,
            "      <edge id=\"{}\" source=\"{}\" target=\"{}\">",
            i, h.head.0, h.tail.0
        )?;
        let face = map
            .claiming_face(*h)
            .map(|f| escape_xml(&f.to_string()))
            .unwrap_or_default();
        let merged = map.schema().merged(ElementKind::HalfEdge, &data.attributes);
        write_values(out, &[face], &edge_cols, &merged)?;
        writeln!(out, "      </edge>")?;
    }
    writeln!(out, "    </edges>")?;
    writeln!(out, "  </graph>")?;
    writeln!(out, "</gexf>")
}

impl PlanarMap {
    /// Renders the map as a GEXF document. There is no reader.
    pub fn to_gexf(&self) -> Result<String> {
        let mut out = String::new();
        write_gexf(self, &mut out).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn exports_nodes_and_half_edges() {
        let mut map = PlanarMap::new();
        map.add_half_edge_attribute_definition("picnum", AttrType::Int, 0);
        for (k, x, y) in [(1, 0.0, 0.0), (2, 1.0, 0.0), (3, 0.0, 1.0)] {
            map.add_node(NodeKey(k), Point2::new(x, y), Attributes::default())
                .unwrap();
        }
        let ring = NodeRing::from_corners(&[NodeKey(1), NodeKey(2), NodeKey(3)]).unwrap();
        map.add_face(ring, Vec::new(), Attributes::default())
            .unwrap();
        map.set_attribute(&ElementKey::Node(NodeKey(1)), "name", "spawn <1>")
            .unwrap();

        let gexf = map.to_gexf().unwrap();
        assert!(gexf.starts_with("<?xml"));
        assert_eq!(gexf.matches("<node id=").count(), 3);
        assert_eq!(gexf.matches("<edge id=").count(), 3);
        assert!(gexf.contains(r#"title="picnum" type="long""#));
        assert!(gexf.contains("spawn &lt;1&gt;"));
        assert!(gexf.contains(r#"source="1" target="2""#));
    }
}
