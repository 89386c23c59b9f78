// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion between Doom map lumps and a [`PlanarMap`].
//!
//! Vertices map to nodes one to one. Every sidedef becomes a half-edge with
//! its sector on the left: the front side of a linedef runs `v2 -> v1`, the
//! back side `v1 -> v2`. Sector outlines are then traced from their
//! half-edges.

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::TAU;

use nalgebra::Point2;
use retromap_graph::geometry::{point_in_contour, signed_area};
use retromap_graph::{
    AttrType, AttrValue, Attributes, EdgeKey, ElementKind, FaceKey, HalfEdgeKey, NodeKey,
    NodeRing, PlanarMap,
};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use super::records::{
    DoomMap, Linedef, Sector, Sidedef, Thing, Vertex, LINE_TWO_SIDED, NO_SIDE,
};
use super::wad::{Wad, WadKind};
use crate::config::CodecOptions;
use crate::error::{Error, Result};
use crate::fields::{coordinate, field, narrow, str_value};

pub const ATTR_THINGS: &str = "doom.things";
pub const ATTR_MAP_NAME: &str = "doom.map";
pub const DEFAULT_MAP_NAME: &str = "MAP01";

/// Texture name meaning "no texture".
const NO_TEXTURE: &str = "-";

/// Registers the Doom attribute schema on `map`.
pub fn register_definitions(map: &mut PlanarMap) {
    map.add_half_edge_attribute_definition("x_offset", AttrType::Int, 0);
    map.add_half_edge_attribute_definition("y_offset", AttrType::Int, 0);
    map.add_half_edge_attribute_definition("upper_texture", AttrType::Str, NO_TEXTURE);
    map.add_half_edge_attribute_definition("lower_texture", AttrType::Str, NO_TEXTURE);
    map.add_half_edge_attribute_definition("middle_texture", AttrType::Str, NO_TEXTURE);
    map.add_half_edge_attribute_definition("flags", AttrType::Int, 0);
    map.add_half_edge_attribute_definition("special", AttrType::Int, 0);
    map.add_half_edge_attribute_definition("tag", AttrType::Int, 0);

    map.add_face_attribute_definition("floor_height", AttrType::Int, 0);
    map.add_face_attribute_definition("ceiling_height", AttrType::Int, 128);
    map.add_face_attribute_definition("floor_texture", AttrType::Str, "FLOOR4_8");
    map.add_face_attribute_definition("ceiling_texture", AttrType::Str, "CEIL3_5");
    map.add_face_attribute_definition("light", AttrType::Int, 160);
    map.add_face_attribute_definition("special", AttrType::Int, 0);
    map.add_face_attribute_definition("tag", AttrType::Int, 0);

    map.add_graph_attribute_definition(ATTR_THINGS, AttrType::List, Vec::new());
    map.add_graph_attribute_definition(ATTR_MAP_NAME, AttrType::Str, DEFAULT_MAP_NAME);
}

fn side_attributes(side: &Sidedef, line: &Linedef) -> Attributes {
    let mut attrs = Attributes::default();
    attrs.insert("x_offset".into(), AttrValue::Int(side.x_offset as i64));
    attrs.insert("y_offset".into(), AttrValue::Int(side.y_offset as i64));
    attrs.insert("upper_texture".into(), side.upper_texture.clone().into());
    attrs.insert("lower_texture".into(), side.lower_texture.clone().into());
    attrs.insert("middle_texture".into(), side.middle_texture.clone().into());
    attrs.insert("flags".into(), AttrValue::Int(line.flags as i64));
    attrs.insert("special".into(), AttrValue::Int(line.special as i64));
    attrs.insert("tag".into(), AttrValue::Int(line.tag as i64));
    attrs
}

fn sector_attributes(sector: &Sector) -> Attributes {
    let mut attrs = Attributes::default();
    attrs.insert("floor_height".into(), AttrValue::Int(sector.floor_height as i64));
    attrs.insert("ceiling_height".into(), AttrValue::Int(sector.ceiling_height as i64));
    attrs.insert("floor_texture".into(), sector.floor_texture.clone().into());
    attrs.insert("ceiling_texture".into(), sector.ceiling_texture.clone().into());
    attrs.insert("light".into(), AttrValue::Int(sector.light as i64));
    attrs.insert("special".into(), AttrValue::Int(sector.special as i64));
    attrs.insert("tag".into(), AttrValue::Int(sector.tag as i64));
    attrs
}

/// Of the candidates leaving `incoming`'s tail, the one making the sharpest
/// left turn. Turning back along the same line is the last resort.
fn leftmost_turn(
    map: &PlanarMap,
    incoming: HalfEdgeKey,
    candidates: impl Iterator<Item = HalfEdgeKey>,
) -> Option<HalfEdgeKey> {
    let back = -map.half_edge_vector(incoming)?;
    candidates
        .filter_map(|h| {
            let e = map.half_edge_vector(h)?;
            let mut angle = (e.x * back.y - e.y * back.x).atan2(back.dot(&e));
            if angle <= 0.0 {
                angle += TAU;
            }
            Some((angle, h))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, h)| h)
}

/// Splits a sector's half-edges into closed corner loops.
fn trace_rings(map: &PlanarMap, sector: usize, half_edges: &[HalfEdgeKey]) -> Vec<Vec<NodeKey>> {
    let mut outgoing: FxHashMap<NodeKey, Vec<HalfEdgeKey>> = FxHashMap::default();
    for h in half_edges {
        outgoing.entry(h.head).or_default().push(*h);
    }
    let mut ordered = half_edges.to_vec();
    ordered.sort_unstable();

    let mut used = FxHashSet::default();
    let mut rings = Vec::new();
    for &start in &ordered {
        if !used.insert(start) {
            continue;
        }
        let mut corners = vec![start.head];
        let mut current = start;
        let closed = loop {
            let candidates = outgoing
                .get(&current.tail)
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .copied()
                .filter(|h| *h == start || !used.contains(h));
            let Some(next) = leftmost_turn(map, current, candidates) else {
                break false;
            };
            if next == start {
                break true;
            }
            used.insert(next);
            corners.push(next.head);
            current = next;
        };

        if closed {
            rings.push(corners);
        } else {
            warn!(sector, from = %start, "sector boundary is not closed, dropping lines");
        }
    }
    rings
}

/// Vertex average, used to place a hole inside its outer ring.
fn interior_probe(points: &[Point2<f64>]) -> Point2<f64> {
    let sum = points
        .iter()
        .fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
    Point2::from(sum / points.len().max(1) as f64)
}

struct Outline {
    ring: NodeRing,
    points: Vec<Point2<f64>>,
    area: f64,
    holes: Vec<NodeRing>,
}

/// Adds the faces of one sector. Returns how many were created.
fn add_sector_faces(
    map: &mut PlanarMap,
    sector: usize,
    half_edges: &[HalfEdgeKey],
    attributes: &Attributes,
) -> usize {
    let mut outers: Vec<Outline> = Vec::new();
    let mut holes: Vec<(NodeRing, Vec<Point2<f64>>)> = Vec::new();
    for corners in trace_rings(map, sector, half_edges) {
        let ring = match NodeRing::from_corners(&corners) {
            Ok(r) => r,
            Err(e) => {
                warn!(sector, error = %e, "skipping degenerate sector outline");
                continue;
            }
        };
        let Some(points) = map.ring_points(&ring) else { continue };
        let area = signed_area(&points);
        if area > 0.0 {
            outers.push(Outline {
                ring,
                points,
                area,
                holes: Vec::new(),
            });
        } else if area < 0.0 {
            holes.push((ring, points));
        } else {
            warn!(sector, "skipping sector outline with no area");
        }
    }

    for (ring, points) in holes {
        let probe = interior_probe(&points);
        let owner = outers
            .iter_mut()
            .filter(|o| point_in_contour(&probe, &o.points) || point_in_contour(&points[0], &o.points))
            .min_by(|a, b| a.area.total_cmp(&b.area));
        match owner {
            Some(outline) => outline.holes.push(ring),
            None => warn!(sector, hole = %ring, "hole outside every sector outline, dropping it"),
        }
    }

    if outers.len() > 1 {
        info!(sector, faces = outers.len(), "sector has several outlines, splitting it");
    }
    let mut created = 0;
    for outline in outers {
        match map.add_face(outline.ring, outline.holes, attributes.clone()) {
            Ok(()) => created += 1,
            Err(e) => warn!(sector, error = %e, "cannot add sector face"),
        }
    }
    created
}

/// Builds a planar map from parsed lumps.
pub fn records_to_map(records: &DoomMap, name: &str) -> Result<PlanarMap> {
    let mut map = PlanarMap::new();
    register_definitions(&mut map);

    let mut nodes = Vec::with_capacity(records.vertexes.len());
    for (i, v) in records.vertexes.iter().enumerate() {
        let key = NodeKey(i as u64 + 1);
        map.add_node(key, Point2::new(v.x as f64, v.y as f64), Attributes::default())?;
        nodes.push(key);
    }

    let mut sector_sides: Vec<Vec<HalfEdgeKey>> = vec![Vec::new(); records.sectors.len()];
    for (index, line) in records.linedefs.iter().enumerate() {
        let (Some(&v1), Some(&v2)) = (
            usize::try_from(line.v1).ok().and_then(|i| nodes.get(i)),
            usize::try_from(line.v2).ok().and_then(|i| nodes.get(i)),
        ) else {
            warn!(line = index, v1 = line.v1, v2 = line.v2, "linedef references a missing vertex");
            continue;
        };
        if v1 == v2 {
            warn!(line = index, "skipping zero-length linedef");
            continue;
        }

        for (side_index, head, tail) in [(line.front, v2, v1), (line.back, v1, v2)] {
            if side_index == NO_SIDE {
                continue;
            }
            let Some(side) = usize::try_from(side_index)
                .ok()
                .and_then(|i| records.sidedefs.get(i))
            else {
                warn!(line = index, side = side_index, "linedef references a missing sidedef");
                continue;
            };
            match map.add_half_edge(head, tail, side_attributes(side, line)) {
                Ok(()) => {}
                Err(retromap_graph::Error::DuplicateHalfEdge(h)) => {
                    warn!(line = index, half_edge = %h, "overlapping linedef side, keeping the first");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            match usize::try_from(side.sector)
                .ok()
                .and_then(|s| sector_sides.get_mut(s))
            {
                Some(sides) => sides.push(HalfEdgeKey::new(head, tail)),
                None => warn!(line = index, sector = side.sector, "sidedef references a missing sector"),
            }
        }
    }

    for (index, sector) in records.sectors.iter().enumerate() {
        let attributes = sector_attributes(sector);
        if add_sector_faces(&mut map, index, &sector_sides[index], &attributes) == 0 {
            warn!(sector = index, "sector has no closed outline");
        }
    }

    let things: Vec<AttrValue> = records
        .things
        .iter()
        .map(|t| {
            AttrValue::List(vec![
                AttrValue::Int(t.x as i64),
                AttrValue::Int(t.y as i64),
                AttrValue::Int(t.angle as i64),
                AttrValue::Int(t.doomednum as i64),
                AttrValue::Int(t.flags as i64),
            ])
        })
        .collect();
    map.set_graph_attribute(ATTR_THINGS, things);
    map.set_graph_attribute(ATTR_MAP_NAME, name);

    map.update();
    info!(
        map = name,
        sectors = map.face_count(),
        sides = map.half_edge_count(),
        vertices = map.node_count(),
        "imported Doom map"
    );
    Ok(map)
}

/// Reads one map from a WAD. `options.doom_map` selects the map; the first
/// one is used otherwise.
pub fn import(bytes: &[u8], options: &CodecOptions) -> Result<PlanarMap> {
    let wad = Wad::parse(bytes)?;
    let (name, lumps) = wad.map_lumps(options.doom_map.as_deref())?;
    debug!(map = %name, lumps = lumps.len(), "found map lumps");
    let records = DoomMap::from_lumps(&lumps)?;
    records_to_map(&records, &name)
}

fn things_from(value: &AttrValue) -> Result<Vec<Thing>> {
    let Some(list) = value.as_list() else {
        return Err(Error::malformed("Doom things", "graph attribute is not a list"));
    };
    list.iter()
        .enumerate()
        .map(|(i, entry)| {
            let items: Vec<i64> = entry
                .as_list()
                .unwrap_or(&[])
                .iter()
                .filter_map(AttrValue::as_int)
                .collect();
            let &[x, y, angle, doomednum, flags] = items.as_slice() else {
                return Err(Error::malformed(
                    "Doom things",
                    format!("thing {} needs 5 integer fields", i),
                ));
            };
            Ok(Thing {
                x: narrow(x, "thing x")?,
                y: narrow(y, "thing y")?,
                angle: narrow(angle, "thing angle")?,
                doomednum: narrow(doomednum, "thing type")?,
                flags: narrow(flags, "thing flags")?,
            })
        })
        .collect()
}

fn sidedef_from(attributes: &Attributes, sector: usize) -> Result<Sidedef> {
    Ok(Sidedef {
        x_offset: field(attributes, "x_offset")?,
        y_offset: field(attributes, "y_offset")?,
        upper_texture: str_value(attributes, "upper_texture", NO_TEXTURE)?,
        lower_texture: str_value(attributes, "lower_texture", NO_TEXTURE)?,
        middle_texture: str_value(attributes, "middle_texture", NO_TEXTURE)?,
        sector: narrow(sector as i64, "sector index")?,
    })
}

fn sector_from(attributes: &Attributes) -> Result<Sector> {
    Ok(Sector {
        floor_height: field(attributes, "floor_height")?,
        ceiling_height: field(attributes, "ceiling_height")?,
        floor_texture: str_value(attributes, "floor_texture", NO_TEXTURE)?,
        ceiling_texture: str_value(attributes, "ceiling_texture", NO_TEXTURE)?,
        light: field(attributes, "light")?,
        special: field(attributes, "special")?,
        tag: field(attributes, "tag")?,
    })
}

/// Lays the map out as Doom lumps. Only edges with at least one side owned
/// by a face become linedefs.
pub fn map_to_records(map: &PlanarMap) -> Result<DoomMap> {
    let faces = map.faces_in_order();
    let sector_index: FxHashMap<&FaceKey, usize> =
        faces.iter().enumerate().map(|(i, f)| (*f, i)).collect();

    let edges: BTreeSet<EdgeKey> = map
        .half_edges()
        .filter(|h| map.claiming_face(*h).is_some())
        .map(HalfEdgeKey::edge)
        .collect();

    let mut vertex_index: BTreeMap<NodeKey, usize> = BTreeMap::new();
    for edge in &edges {
        let (a, b) = edge.nodes();
        vertex_index.insert(a, 0);
        vertex_index.insert(b, 0);
    }
    let mut vertexes = Vec::with_capacity(vertex_index.len());
    for (i, (node, slot)) in vertex_index.iter_mut().enumerate() {
        *slot = i;
        let p = map
            .node_position(*node)
            .ok_or(retromap_graph::Error::NodeNotFound(*node))?;
        vertexes.push(Vertex {
            x: coordinate(p.x, "vertex x")?,
            y: coordinate(p.y, "vertex y")?,
        });
    }

    let owned = |h: HalfEdgeKey| map.claiming_face(h).and_then(|f| sector_index.get(f)).copied();
    let merged = |h: HalfEdgeKey| {
        map.half_edge(h)
            .map(|d| map.schema().merged(ElementKind::HalfEdge, &d.attributes))
            .ok_or(retromap_graph::Error::HalfEdgeNotFound(h))
    };

    let mut linedefs = Vec::with_capacity(edges.len());
    let mut sidedefs = Vec::new();
    for edge in &edges {
        let [a, b] = edge.half_edges();
        let (front, back) = if owned(a).is_some() { (a, b) } else { (b, a) };
        let Some(front_sector) = owned(front) else { continue };
        let back_sector = owned(back);

        let attrs = merged(front)?;
        let mut flags: i16 = field(&attrs, "flags")?;
        if back_sector.is_some() {
            flags |= LINE_TWO_SIDED;
        } else {
            flags &= !LINE_TWO_SIDED;
        }

        let front_side = sidedefs.len();
        sidedefs.push(sidedef_from(&attrs, front_sector)?);
        let back_side = match back_sector {
            Some(s) => {
                sidedefs.push(sidedef_from(&merged(back)?, s)?);
                narrow(sidedefs.len() as i64 - 1, "sidedef index")?
            }
            None => NO_SIDE,
        };

        linedefs.push(Linedef {
            v1: narrow(vertex_index[&front.tail] as i64, "vertex index")?,
            v2: narrow(vertex_index[&front.head] as i64, "vertex index")?,
            flags,
            special: field(&attrs, "special")?,
            tag: field(&attrs, "tag")?,
            front: narrow(front_side as i64, "sidedef index")?,
            back: back_side,
        });
    }

    let mut sectors = Vec::with_capacity(faces.len());
    for face in &faces {
        let attributes = map
            .face(face)
            .map(|d| map.schema().merged(ElementKind::Face, &d.attributes))
            .unwrap_or_default();
        sectors.push(sector_from(&attributes)?);
    }
    if sectors.len() > i16::MAX as usize {
        return Err(Error::Overflow {
            what: "sector count",
            value: sectors.len() as i64,
        });
    }

    let things = match map.graph_attributes().get(ATTR_THINGS) {
        Some(v) => things_from(v)?,
        None => Vec::new(),
    };

    Ok(DoomMap {
        things,
        linedefs,
        sidedefs,
        vertexes,
        sectors,
    })
}

/// Writes the map into a single-map PWAD. The marker name comes from
/// `options.doom_map`, then the map's `doom.map` attribute, then `MAP01`.
pub fn export(map: &PlanarMap, options: &CodecOptions) -> Result<Vec<u8>> {
    let records = map_to_records(map)?;
    let stored = map
        .graph_attributes()
        .get(ATTR_MAP_NAME)
        .and_then(|v| v.as_str().map(str::to_string));
    let name = options
        .doom_map
        .clone()
        .or(stored)
        .unwrap_or_else(|| DEFAULT_MAP_NAME.to_string());

    let mut wad = Wad::new(WadKind::Pwad);
    wad.lumps = records.to_lumps(&name)?;
    info!(
        map = %name,
        linedefs = records.linedefs.len(),
        sidedefs = records.sidedefs.len(),
        sectors = records.sectors.len(),
        "exported Doom map"
    );
    wad.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn side(sector: i16, middle: &str) -> Sidedef {
        Sidedef {
            x_offset: 0,
            y_offset: 0,
            upper_texture: NO_TEXTURE.into(),
            lower_texture: NO_TEXTURE.into(),
            middle_texture: middle.into(),
            sector,
        }
    }

    fn line(v1: i16, v2: i16, front: i16, back: i16) -> Linedef {
        Linedef {
            v1,
            v2,
            flags: if back == NO_SIDE { 1 } else { LINE_TWO_SIDED },
            special: 0,
            tag: 0,
            front,
            back,
        }
    }

    fn sector(floor: i16) -> Sector {
        Sector {
            floor_height: floor,
            ceiling_height: 128,
            floor_texture: "FLOOR4_8".into(),
            ceiling_texture: "CEIL3_5".into(),
            light: 160,
            special: 0,
            tag: 0,
        }
    }

    /// A square room with a square pillar sector in the middle. Lines run
    /// clockwise so the room is on their right.
    fn room_with_pillar() -> DoomMap {
        let vertexes = vec![
            Vertex { x: 0, y: 0 },
            Vertex { x: 0, y: 256 },
            Vertex { x: 256, y: 256 },
            Vertex { x: 256, y: 0 },
            Vertex { x: 96, y: 96 },
            Vertex { x: 96, y: 160 },
            Vertex { x: 160, y: 160 },
            Vertex { x: 160, y: 96 },
        ];
        let mut sidedefs = Vec::new();
        let mut linedefs = Vec::new();
        for i in 0..4i16 {
            sidedefs.push(side(0, "STARTAN3"));
            linedefs.push(line(i, (i + 1) % 4, i, NO_SIDE));
        }
        // Pillar lines run clockwise around the pillar: front = pillar,
        // back = room.
        for i in 0..4i16 {
            let front = sidedefs.len() as i16;
            sidedefs.push(side(1, "-"));
            sidedefs.push(side(0, "-"));
            linedefs.push(line(4 + i, 4 + (i + 1) % 4, front, front + 1));
        }
        DoomMap {
            things: vec![Thing {
                x: 32,
                y: 32,
                angle: 90,
                doomednum: 1,
                flags: 7,
            }],
            linedefs,
            sidedefs,
            vertexes,
            sectors: vec![sector(0), sector(24)],
        }
    }

    #[test]
    fn room_with_pillar_becomes_face_with_hole() {
        let map = records_to_map(&room_with_pillar(), "E1M1").unwrap();
        assert_eq!(map.node_count(), 8);
        assert_eq!(map.half_edge_count(), 12);
        assert_eq!(map.face_count(), 2);
        assert_eq!(map.portals().len(), 4);

        let faces = map.faces_in_order();
        let room = map.face(faces[0]).unwrap();
        assert_eq!(room.holes.len(), 1);
        assert!(map.face(faces[1]).unwrap().holes.is_empty());
        assert_relative_eq!(map.face_area(faces[0]).unwrap(), 256.0 * 256.0 - 64.0 * 64.0);
        assert!(map.face_signed_area(faces[1]).unwrap() > 0.0);
        map.validate().unwrap();
    }

    #[test]
    fn export_keeps_sides_and_things() {
        let records = room_with_pillar();
        let map = records_to_map(&records, "E1M1").unwrap();
        let out = map_to_records(&map).unwrap();

        assert_eq!(out.vertexes.len(), 8);
        assert_eq!(out.linedefs.len(), 8);
        assert_eq!(out.sidedefs.len(), 12);
        assert_eq!(out.things, records.things);
        assert_eq!(out.sectors, records.sectors);
        let two_sided = out
            .linedefs
            .iter()
            .filter(|l| l.flags & LINE_TWO_SIDED != 0)
            .count();
        assert_eq!(two_sided, 4);
        assert!(out
            .linedefs
            .iter()
            .all(|l| (l.back == NO_SIDE) == (l.flags & LINE_TWO_SIDED == 0)));

        let again = records_to_map(&out, "E1M1").unwrap();
        assert!(again.same_elements(&map));
    }

    #[test]
    fn wad_roundtrip_uses_stored_map_name() {
        let map = records_to_map(&room_with_pillar(), "E1M1").unwrap();
        let bytes = export(&map, &CodecOptions::default()).unwrap();
        let wad = Wad::parse(&bytes).unwrap();
        assert_eq!(wad.map_names(), vec!["E1M1"]);

        let back = import(&bytes, &CodecOptions::default()).unwrap();
        assert_eq!(back.face_count(), 2);
        assert_eq!(
            back.graph_attribute(ATTR_MAP_NAME).unwrap(),
            AttrValue::Str("E1M1".into())
        );

        let options = CodecOptions {
            doom_map: Some("MAP02".into()),
            ..CodecOptions::default()
        };
        assert!(import(&bytes, &options).is_err());
    }

    #[test]
    fn unclosed_sector_is_dropped() {
        let mut records = room_with_pillar();
        // Remove one room wall so the outline no longer closes.
        records.linedefs.remove(0);
        let map = records_to_map(&records, "MAP01").unwrap();
        assert_eq!(map.face_count(), 1);
        // The room's remaining walls stay as unowned half-edges.
        assert_eq!(map.half_edge_count(), 11);
    }
}
