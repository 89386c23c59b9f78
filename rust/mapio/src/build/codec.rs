// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion between Build MAP records and a [`PlanarMap`].
//!
//! Walls become half-edges and sectors become faces. Build stores one wall
//! record per sector side, so the two sides of a shared wall are unified
//! into the same pair of nodes before the map is built.

use nalgebra::Point2;
use retromap_graph::{
    AttrType, AttrValue, Attributes, DisjointSet, ElementKind, FaceKey, HalfEdgeKey, NodeKey,
    NodeRing, PlanarMap,
};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use super::records::{parse_map, BuildMap, Header, Sector, Sprite, Wall, MAP_VERSION};
use crate::config::CodecOptions;
use crate::error::{Error, Result};
use crate::fields::{coordinate, field, int_value};

pub const WALL_ATTRIBUTES: [&str; 12] = [
    "cstat",
    "picnum",
    "overpicnum",
    "shade",
    "pal",
    "xrepeat",
    "yrepeat",
    "xpanning",
    "ypanning",
    "lotag",
    "hitag",
    "extra",
];

pub const SECTOR_ATTRIBUTES: [&str; 21] = [
    "ceilingz",
    "floorz",
    "ceilingstat",
    "floorstat",
    "ceilingpicnum",
    "ceilingheinum",
    "ceilingshade",
    "ceilingpal",
    "ceilingxpanning",
    "ceilingypanning",
    "floorpicnum",
    "floorheinum",
    "floorshade",
    "floorpal",
    "floorxpanning",
    "floorypanning",
    "visibility",
    "filler",
    "lotag",
    "hitag",
    "extra",
];

pub const ATTR_VERSION: &str = "build.version";
pub const ATTR_START_X: &str = "build.start_x";
pub const ATTR_START_Y: &str = "build.start_y";
pub const ATTR_START_Z: &str = "build.start_z";
pub const ATTR_START_ANGLE: &str = "build.start_angle";
pub const ATTR_START_SECTOR: &str = "build.start_sector";
pub const ATTR_SPRITES: &str = "build.sprites";

fn wall_values(w: &Wall) -> [i64; 12] {
    [
        w.cstat as i64,
        w.picnum as i64,
        w.overpicnum as i64,
        w.shade as i64,
        w.pal as i64,
        w.xrepeat as i64,
        w.yrepeat as i64,
        w.xpanning as i64,
        w.ypanning as i64,
        w.lotag as i64,
        w.hitag as i64,
        w.extra as i64,
    ]
}

fn sector_values(s: &Sector) -> [i64; 21] {
    [
        s.ceilingz as i64,
        s.floorz as i64,
        s.ceilingstat as i64,
        s.floorstat as i64,
        s.ceilingpicnum as i64,
        s.ceilingheinum as i64,
        s.ceilingshade as i64,
        s.ceilingpal as i64,
        s.ceilingxpanning as i64,
        s.ceilingypanning as i64,
        s.floorpicnum as i64,
        s.floorheinum as i64,
        s.floorshade as i64,
        s.floorpal as i64,
        s.floorxpanning as i64,
        s.floorypanning as i64,
        s.visibility as i64,
        s.filler as i64,
        s.lotag as i64,
        s.hitag as i64,
        s.extra as i64,
    ]
}

fn int_attributes(names: &[&str], values: &[i64]) -> Attributes {
    names
        .iter()
        .zip(values)
        .map(|(name, v)| (name.to_string(), AttrValue::Int(*v)))
        .collect()
}

/// Registers the Build attribute schema on `map`.
pub fn register_definitions(map: &mut PlanarMap) {
    for name in WALL_ATTRIBUTES {
        map.add_half_edge_attribute_definition(name, AttrType::Int, 0);
    }
    for name in SECTOR_ATTRIBUTES {
        map.add_face_attribute_definition(name, AttrType::Int, 0);
    }
    for name in [
        ATTR_VERSION,
        ATTR_START_X,
        ATTR_START_Y,
        ATTR_START_Z,
        ATTR_START_ANGLE,
        ATTR_START_SECTOR,
    ] {
        map.add_graph_attribute_definition(name, AttrType::Int, 0);
    }
    map.add_graph_attribute_definition(ATTR_SPRITES, AttrType::List, Vec::new());
}

/// Walks one wall loop starting at `start`, following `point2`.
///
/// Stops when the loop closes, or truncates at the first pointer that leaves
/// `range` or revisits a wall.
fn walk_loop(
    walls: &[Wall],
    start: usize,
    range: std::ops::Range<usize>,
    sector: usize,
    visited: &mut FxHashSet<usize>,
) -> Vec<usize> {
    let mut chain = vec![start];
    visited.insert(start);
    let mut current = start;
    loop {
        let next = walls[current].point2;
        if next < 0 || !range.contains(&(next as usize)) {
            warn!(sector, wall = current, point2 = next, "wall chain leaves the sector, truncating");
            break;
        }
        let next = next as usize;
        if next == start {
            break;
        }
        if !visited.insert(next) {
            warn!(sector, wall = current, point2 = next, "wall chain revisits a wall, truncating");
            break;
        }
        chain.push(next);
        current = next;
    }
    chain
}

/// Node identity of every wall's first point. Walls that meet across a
/// portal share a root; nodes are only created for walls that end up in a
/// ring.
struct WallNodes {
    roots: Vec<usize>,
    nodes: FxHashMap<usize, NodeKey>,
}

impl WallNodes {
    fn unify(walls: &[Wall]) -> Self {
        let n = walls.len();
        let mut sets = DisjointSet::new();
        let point2 = |w: usize| {
            let p = walls[w].point2;
            (p >= 0 && (p as usize) < n).then_some(p as usize)
        };
        for w in 0..n {
            sets.insert(w);
            let nw = walls[w].nextwall;
            if nw < 0 || nw as usize >= n {
                continue;
            }
            let nw = nw as usize;
            if let Some(after_nw) = point2(nw) {
                sets.union(w, after_nw);
            }
            if let Some(after_w) = point2(w) {
                sets.union(after_w, nw);
            }
        }
        Self {
            roots: (0..n).map(|w| sets.find(w)).collect(),
            nodes: FxHashMap::default(),
        }
    }

    fn same(&self, a: usize, b: usize) -> bool {
        self.roots[a] == self.roots[b]
    }

    /// The node at wall `w`'s first point, created on first use.
    fn node(&mut self, map: &mut PlanarMap, walls: &[Wall], w: usize) -> Result<NodeKey> {
        let root = self.roots[w];
        if let Some(key) = self.nodes.get(&root) {
            return Ok(*key);
        }
        let key = map.allocate_node_key();
        map.add_node(
            key,
            Point2::new(walls[w].x as f64, walls[w].y as f64),
            Attributes::default(),
        )?;
        self.nodes.insert(root, key);
        Ok(key)
    }
}

/// Turns a wall loop into a ring, adding one half-edge per wall. Walls that
/// collapse to a single node are skipped.
fn loop_to_ring(
    map: &mut PlanarMap,
    chain: &[usize],
    walls: &[Wall],
    wall_nodes: &mut WallNodes,
    sector: usize,
) -> Result<Option<NodeRing>> {
    let mut corners: Vec<NodeKey> = Vec::with_capacity(chain.len());
    for (i, &w) in chain.iter().enumerate() {
        let next = chain[(i + 1) % chain.len()];
        if wall_nodes.same(w, next) {
            debug!(sector, wall = w, "skipping zero-length wall");
            continue;
        }
        let head = wall_nodes.node(map, walls, w)?;
        let tail = wall_nodes.node(map, walls, next)?;
        let attributes = int_attributes(&WALL_ATTRIBUTES, &wall_values(&walls[w]));
        match map.add_half_edge(head, tail, attributes) {
            Ok(()) => {}
            Err(retromap_graph::Error::DuplicateHalfEdge(h)) => {
                warn!(sector, wall = w, half_edge = %h, "duplicate wall, keeping the first");
            }
            Err(e) => {
                warn!(sector, wall = w, error = %e, "cannot add wall");
            }
        }
        corners.push(head);
    }
    corners.dedup();
    while corners.len() > 1 && corners.first() == corners.last() {
        corners.pop();
    }

    match NodeRing::from_corners(&corners) {
        Ok(ring) => Ok(Some(ring)),
        Err(e) => {
            warn!(sector, error = %e, "skipping degenerate wall loop");
            Ok(None)
        }
    }
}

/// Builds a planar map from parsed records.
pub fn records_to_map(records: &BuildMap, options: &CodecOptions) -> Result<PlanarMap> {
    let walls = &records.walls;
    let mut map = PlanarMap::new();
    register_definitions(&mut map);

    let mut wall_nodes = WallNodes::unify(walls);

    for (index, sector) in records.sectors.iter().enumerate() {
        let start = sector.wallptr.max(0) as usize;
        let end = (start + sector.wallnum.max(0) as usize).min(walls.len());
        if start >= end {
            warn!(sector = index, "sector has no walls, skipping");
            continue;
        }

        let mut visited = FxHashSet::default();
        let outer = walk_loop(walls, start, start..end, index, &mut visited);
        let mut loops = Vec::new();
        if visited.len() < end - start {
            if options.import_sector_holes {
                for w in start..end {
                    if !visited.contains(&w) {
                        loops.push(walk_loop(walls, w, start..end, index, &mut visited));
                    }
                }
                debug!(sector = index, holes = loops.len(), "importing sector holes");
            } else {
                warn!(
                    sector = index,
                    dropped = end - start - visited.len(),
                    "sector has more than one wall loop, dropping the extra walls"
                );
            }
        }

        let Some(ring) = loop_to_ring(&mut map, &outer, walls, &mut wall_nodes, index)? else {
            continue;
        };
        let mut holes = Vec::with_capacity(loops.len());
        for chain in &loops {
            holes.extend(loop_to_ring(&mut map, chain, walls, &mut wall_nodes, index)?);
        }

        let attributes = int_attributes(&SECTOR_ATTRIBUTES, &sector_values(sector));
        if let Err(e) = map.add_face(ring, holes, attributes) {
            warn!(sector = index, error = %e, "cannot add sector");
        }
    }

    let header = &records.header;
    map.set_graph_attribute(ATTR_VERSION, header.version);
    map.set_graph_attribute(ATTR_START_X, header.pos_x);
    map.set_graph_attribute(ATTR_START_Y, header.pos_y);
    map.set_graph_attribute(ATTR_START_Z, header.pos_z);
    map.set_graph_attribute(ATTR_START_ANGLE, header.angle as i64);
    map.set_graph_attribute(ATTR_START_SECTOR, header.sector as i64);
    let sprites: Vec<AttrValue> = records
        .sprites
        .iter()
        .map(|s| AttrValue::List(s.fields().iter().map(|v| AttrValue::Int(*v)).collect()))
        .collect();
    map.set_graph_attribute(ATTR_SPRITES, sprites);

    map.update();
    info!(
        sectors = map.face_count(),
        walls = map.half_edge_count(),
        nodes = map.node_count(),
        "imported Build map"
    );
    Ok(map)
}

/// Reads a version 7 MAP file.
pub fn import(bytes: &[u8], options: &CodecOptions) -> Result<PlanarMap> {
    let records = parse_map(bytes)?;
    records_to_map(&records, options)
}

fn wall_from(attributes: &Attributes, x: i32, y: i32) -> Result<Wall> {
    Ok(Wall {
        x,
        y,
        point2: -1,
        nextwall: -1,
        nextsector: -1,
        cstat: field(attributes, "cstat")?,
        picnum: field(attributes, "picnum")?,
        overpicnum: field(attributes, "overpicnum")?,
        shade: field(attributes, "shade")?,
        pal: field(attributes, "pal")?,
        xrepeat: field(attributes, "xrepeat")?,
        yrepeat: field(attributes, "yrepeat")?,
        xpanning: field(attributes, "xpanning")?,
        ypanning: field(attributes, "ypanning")?,
        lotag: field(attributes, "lotag")?,
        hitag: field(attributes, "hitag")?,
        extra: field(attributes, "extra")?,
    })
}

fn sector_from(attributes: &Attributes, wallptr: i16, wallnum: i16) -> Result<Sector> {
    Ok(Sector {
        wallptr,
        wallnum,
        ceilingz: field(attributes, "ceilingz")?,
        floorz: field(attributes, "floorz")?,
        ceilingstat: field(attributes, "ceilingstat")?,
        floorstat: field(attributes, "floorstat")?,
        ceilingpicnum: field(attributes, "ceilingpicnum")?,
        ceilingheinum: field(attributes, "ceilingheinum")?,
        ceilingshade: field(attributes, "ceilingshade")?,
        ceilingpal: field(attributes, "ceilingpal")?,
        ceilingxpanning: field(attributes, "ceilingxpanning")?,
        ceilingypanning: field(attributes, "ceilingypanning")?,
        floorpicnum: field(attributes, "floorpicnum")?,
        floorheinum: field(attributes, "floorheinum")?,
        floorshade: field(attributes, "floorshade")?,
        floorpal: field(attributes, "floorpal")?,
        floorxpanning: field(attributes, "floorxpanning")?,
        floorypanning: field(attributes, "floorypanning")?,
        visibility: field(attributes, "visibility")?,
        filler: field(attributes, "filler")?,
        lotag: field(attributes, "lotag")?,
        hitag: field(attributes, "hitag")?,
        extra: field(attributes, "extra")?,
    })
}

fn sprites_from(value: &AttrValue) -> Result<Vec<Sprite>> {
    let Some(list) = value.as_list() else {
        return Err(Error::malformed("Build sprites", "graph attribute is not a list"));
    };
    list.iter()
        .enumerate()
        .map(|(i, entry)| {
            let items = entry.as_list().unwrap_or(&[]);
            if items.len() != 23 {
                return Err(Error::malformed(
                    "Build sprites",
                    format!("sprite {} has {} fields, expected 23", i, items.len()),
                ));
            }
            let mut fields = [0i64; 23];
            for (slot, item) in fields.iter_mut().zip(items) {
                *slot = item.as_int().ok_or_else(|| {
                    Error::malformed("Build sprites", format!("sprite {} has a non-integer field", i))
                })?;
            }
            Sprite::from_fields(&fields)
        })
        .collect()
}

/// Lays the map out as Build records.
pub fn map_to_records(map: &PlanarMap) -> Result<BuildMap> {
    let faces = map.faces_in_order();
    let sector_index: FxHashMap<&FaceKey, usize> =
        faces.iter().enumerate().map(|(i, f)| (*f, i)).collect();

    // Linearize rings: outer ring first, then holes, each a closed loop.
    let mut loops: Vec<(usize, Vec<HalfEdgeKey>)> = Vec::new();
    for (s, face) in faces.iter().enumerate() {
        let Some(data) = map.face(face) else { continue };
        loops.push((s, face.half_edges().collect()));
        for hole in &data.holes {
            loops.push((s, hole.half_edges().collect()));
        }
    }
    let wall_count: usize = loops.iter().map(|(_, l)| l.len()).sum();
    if wall_count > i16::MAX as usize {
        return Err(Error::Overflow {
            what: "wall count",
            value: wall_count as i64,
        });
    }
    if faces.len() > i16::MAX as usize {
        return Err(Error::Overflow {
            what: "sector count",
            value: faces.len() as i64,
        });
    }

    let mut wall_index: FxHashMap<HalfEdgeKey, usize> = FxHashMap::default();
    let mut next = 0usize;
    for (_, l) in &loops {
        for h in l {
            wall_index.insert(*h, next);
            next += 1;
        }
    }

    let mut walls = Vec::with_capacity(wall_count);
    let mut sector_ranges = vec![(0usize, 0usize); faces.len()];
    for (s, l) in &loops {
        let first = walls.len();
        if sector_ranges[*s].1 == 0 {
            sector_ranges[*s].0 = first;
        }
        sector_ranges[*s].1 += l.len();

        for (i, h) in l.iter().enumerate() {
            let position = map
                .node_position(h.head)
                .ok_or(retromap_graph::Error::NodeNotFound(h.head))?;
            let attributes = map
                .half_edge(*h)
                .map(|d| map.schema().merged(ElementKind::HalfEdge, &d.attributes))
                .ok_or(retromap_graph::Error::HalfEdgeNotFound(*h))?;
            let mut wall = wall_from(
                &attributes,
                coordinate(position.x, "wall x")?,
                coordinate(position.y, "wall y")?,
            )?;
            wall.point2 = (first + (i + 1) % l.len()) as i16;

            let opposite = h.reversed();
            if let Some(owner) = map.claiming_face(opposite) {
                if let (Some(&w), Some(&o)) = (wall_index.get(&opposite), sector_index.get(owner)) {
                    wall.nextwall = w as i16;
                    wall.nextsector = o as i16;
                }
            }
            walls.push(wall);
        }
    }

    let mut sectors = Vec::with_capacity(faces.len());
    for (s, face) in faces.iter().enumerate() {
        let attributes = map
            .face(face)
            .map(|d| map.schema().merged(ElementKind::Face, &d.attributes))
            .unwrap_or_default();
        let (ptr, num) = sector_ranges[s];
        sectors.push(sector_from(&attributes, ptr as i16, num as i16)?);
    }

    let graph = map.graph_attributes();
    let version = int_value(&graph, ATTR_VERSION)?;
    if version != 0 && version != MAP_VERSION as i64 {
        debug!(version, "writing Build map as version 7");
    }
    let header = Header {
        version: MAP_VERSION,
        pos_x: field(&graph, ATTR_START_X)?,
        pos_y: field(&graph, ATTR_START_Y)?,
        pos_z: field(&graph, ATTR_START_Z)?,
        angle: field(&graph, ATTR_START_ANGLE)?,
        sector: field(&graph, ATTR_START_SECTOR)?,
    };
    let sprites = match graph.get(ATTR_SPRITES) {
        Some(v) => sprites_from(v)?,
        None => Vec::new(),
    };
    if sprites.len() > u16::MAX as usize {
        return Err(Error::Overflow {
            what: "sprite count",
            value: sprites.len() as i64,
        });
    }

    Ok(BuildMap {
        header,
        sectors,
        walls,
        sprites,
    })
}

/// Writes the map as a version 7 MAP file.
pub fn export(map: &PlanarMap) -> Result<Vec<u8>> {
    let records = map_to_records(map)?;
    info!(
        sectors = records.sectors.len(),
        walls = records.walls.len(),
        sprites = records.sprites.len(),
        "exported Build map"
    );
    Ok(records.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_loop(first: i16, x0: i32, size: i32) -> Vec<Wall> {
        let corners = [(x0, 0), (x0 + size, 0), (x0 + size, size), (x0, size)];
        corners
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Wall {
                x,
                y,
                point2: first + ((i as i16 + 1) % 4),
                nextwall: -1,
                nextsector: -1,
                ..Wall::default()
            })
            .collect()
    }

    #[test]
    fn single_sector() {
        let records = BuildMap {
            header: Header {
                version: MAP_VERSION,
                ..Header::default()
            },
            sectors: vec![Sector {
                wallptr: 0,
                wallnum: 4,
                floorz: 1024,
                ..Sector::default()
            }],
            walls: square_loop(0, 0, 1024),
            sprites: Vec::new(),
        };
        let map = records_to_map(&records, &CodecOptions::default()).unwrap();
        assert_eq!(map.node_count(), 4);
        assert_eq!(map.half_edge_count(), 4);
        assert_eq!(map.face_count(), 1);
        let face = map.faces_in_order()[0].clone();
        assert!(map.face_signed_area(&face).unwrap() > 0.0);
        assert_eq!(
            map.get_attribute(&retromap_graph::ElementKey::Face(face), "floorz")
                .unwrap(),
            AttrValue::Int(1024)
        );
        assert_eq!(map_to_records(&map).unwrap(), records);
    }

    #[test]
    fn extra_loops_are_dropped_or_kept_as_holes() {
        let mut walls = square_loop(0, 0, 1024);
        // Inner loop wound the other way.
        let mut hole = square_loop(4, 256, 256);
        hole.reverse();
        for (i, w) in hole.iter_mut().enumerate() {
            w.y += 256;
            w.point2 = 4 + ((i as i16 + 1) % 4);
        }
        walls.extend(hole);
        let records = BuildMap {
            header: Header {
                version: MAP_VERSION,
                ..Header::default()
            },
            sectors: vec![Sector {
                wallptr: 0,
                wallnum: 8,
                ..Sector::default()
            }],
            walls,
            sprites: Vec::new(),
        };

        let dropped = records_to_map(&records, &CodecOptions::default()).unwrap();
        let face = dropped.faces_in_order()[0].clone();
        assert!(dropped.face(&face).unwrap().holes.is_empty());
        // Walls of the dropped loop leave no stray nodes behind.
        assert_eq!(dropped.node_count(), 4);
        assert_eq!(dropped.half_edge_count(), 4);

        let options = CodecOptions {
            import_sector_holes: true,
            ..CodecOptions::default()
        };
        let kept = records_to_map(&records, &options).unwrap();
        let face = kept.faces_in_order()[0].clone();
        assert_eq!(kept.face(&face).unwrap().holes.len(), 1);
        assert_eq!(kept.face_rings(&face).len(), 2);
        assert_eq!(kept.node_count(), 8);
        assert_eq!(map_to_records(&kept).unwrap().walls, records.walls);
    }

    #[test]
    fn truncates_broken_wall_chain() {
        let mut walls = square_loop(0, 0, 64);
        walls[3].point2 = 17;
        let records = BuildMap {
            header: Header {
                version: MAP_VERSION,
                ..Header::default()
            },
            sectors: vec![Sector {
                wallptr: 0,
                wallnum: 4,
                ..Sector::default()
            }],
            walls,
            sprites: Vec::new(),
        };
        let map = records_to_map(&records, &CodecOptions::default()).unwrap();
        // The chain is still closed implicitly back to its first wall.
        assert_eq!(map.face_count(), 1);
    }

    #[test]
    fn walls_cut_off_a_chain_get_no_nodes() {
        let mut walls = square_loop(0, 0, 64);
        walls[2].point2 = 1;
        let records = BuildMap {
            header: Header {
                version: MAP_VERSION,
                ..Header::default()
            },
            sectors: vec![Sector {
                wallptr: 0,
                wallnum: 4,
                ..Sector::default()
            }],
            walls,
            sprites: Vec::new(),
        };
        let map = records_to_map(&records, &CodecOptions::default()).unwrap();
        assert_eq!(map.face_count(), 1);
        assert_eq!(map.node_count(), 3);
        assert!(map.nodes().all(|n| map.incident_half_edges(n).count() == 2));
    }

    #[test]
    fn out_of_range_attribute_is_an_overflow() {
        let mut map = PlanarMap::new();
        register_definitions(&mut map);
        let corners: Vec<NodeKey> = (0..3)
            .map(|i| {
                let k = map.allocate_node_key();
                map.add_node(k, Point2::new(i as f64, (i * i) as f64), Attributes::default())
                    .unwrap();
                k
            })
            .collect();
        let ring = NodeRing::from_corners(&corners).unwrap();
        map.add_face(ring.clone(), Vec::new(), Attributes::default())
            .unwrap();
        let h = ring.half_edges().next().unwrap();
        map.set_attribute(&retromap_graph::ElementKey::HalfEdge(h), "picnum", 40_000)
            .unwrap();

        assert!(matches!(
            map_to_records(&map),
            Err(Error::Overflow { what: "picnum", value: 40_000 })
        ));
    }

    #[test]
    fn oversized_sprite_field_is_an_overflow() {
        let mut map = PlanarMap::new();
        register_definitions(&mut map);
        let mut sprite = Sprite::default().fields();
        sprite[4] = 70_000;
        map.set_graph_attribute(
            ATTR_SPRITES,
            vec![AttrValue::List(sprite.iter().map(|v| AttrValue::Int(*v)).collect())],
        );

        assert!(matches!(
            map_to_records(&map),
            Err(Error::Overflow { what: "sprite picnum", value: 70_000 })
        ));
    }
}
