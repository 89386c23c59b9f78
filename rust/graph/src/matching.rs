// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reattaching node identity to raw boolean-operation output.
//!
//! Polygon booleans return bare coordinates. The matcher snaps every
//! coordinate to a grid of `10^-precision` and looks it up in a table seeded
//! with known nodes; coordinates that miss get a freshly allocated key. The
//! table is shared across all candidate polygons, so a new point that shows
//! up in two pieces gets the same key in both.

use nalgebra::Point2;
use rustc_hash::FxHashMap;

use crate::boolean::Polygon;
use crate::error::{Error, Result};
use crate::keys::*;
use crate::map::PlanarMap;

/// Grid-snapped coordinate → node key table.
#[derive(Debug, Clone)]
pub struct CoordinateMatcher {
    scale: f64,
    table: FxHashMap<(i64, i64), NodeKey>,
    fresh: Vec<(NodeKey, Point2<f64>)>,
}

/// A candidate polygon expressed as node keys (corners, no closing node).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPolygon {
    pub outer: Vec<NodeKey>,
    pub holes: Vec<Vec<NodeKey>>,
}

impl CoordinateMatcher {
    pub fn new(precision: u32) -> Self {
        Self {
            scale: 10f64.powi(precision as i32),
            table: FxHashMap::default(),
            fresh: Vec::new(),
        }
    }

    /// A matcher seeded with every node of `face` (outer ring and holes).
    pub fn for_face(map: &PlanarMap, face: &FaceKey, precision: u32) -> Result<Self> {
        let data = map
            .face(face)
            .ok_or_else(|| Error::FaceNotFound(face.clone()))?;
        let mut matcher = Self::new(precision);
        for ring in std::iter::once(face).chain(data.holes.iter()) {
            for &node in ring.corners() {
                let p = map.node_position(node).ok_or(Error::NodeNotFound(node))?;
                matcher.seed(node, p);
            }
        }
        Ok(matcher)
    }

    pub fn snap(&self, p: Point2<f64>) -> (i64, i64) {
        ((p.x * self.scale).round() as i64, (p.y * self.scale).round() as i64)
    }

    /// Registers a known node. The first key seeded at a grid cell wins.
    pub fn seed(&mut self, key: NodeKey, p: Point2<f64>) {
        let cell = self.snap(p);
        self.table.entry(cell).or_insert(key);
    }

    pub fn lookup(&self, p: Point2<f64>) -> Option<NodeKey> {
        self.table.get(&self.snap(p)).copied()
    }

    /// The key at `p`, allocating a fresh one from `map` on a miss.
    pub fn resolve(&mut self, map: &mut PlanarMap, p: Point2<f64>) -> NodeKey {
        if let Some(key) = self.lookup(p) {
            return key;
        }
        let key = map.allocate_node_key();
        self.table.insert(self.snap(p), key);
        self.fresh.push((key, p));
        key
    }

    /// Matches a contour, dropping consecutive repeats created by snapping.
    pub fn match_contour(&mut self, map: &mut PlanarMap, contour: &[Point2<f64>]) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = Vec::with_capacity(contour.len());
        for &p in contour {
            let key = self.resolve(map, p);
            if keys.last() != Some(&key) {
                keys.push(key);
            }
        }
        while keys.len() > 1 && keys.first() == keys.last() {
            keys.pop();
        }
        keys
    }

    pub fn match_polygon(&mut self, map: &mut PlanarMap, polygon: &Polygon) -> MatchedPolygon {
        MatchedPolygon {
            outer: self.match_contour(map, &polygon.outer),
            holes: polygon
                .holes
                .iter()
                .map(|h| self.match_contour(map, h))
                .collect(),
        }
    }

    /// Keys allocated for unmatched coordinates, with their positions.
    pub fn fresh_nodes(&self) -> &[(NodeKey, Point2<f64>)] {
        &self.fresh
    }
}

/// Maps each candidate polygon onto `face`'s node identities.
///
/// Returns the matched polygons and the fresh nodes they introduce. Nothing
/// is inserted into the map; only keys are allocated.
pub fn match_polygons(
    map: &mut PlanarMap,
    face: &FaceKey,
    candidates: &[Polygon],
    precision: u32,
) -> Result<(Vec<MatchedPolygon>, Vec<(NodeKey, Point2<f64>)>)> {
    let mut matcher = CoordinateMatcher::for_face(map, face, precision)?;
    let matched = candidates
        .iter()
        .map(|c| matcher.match_polygon(map, c))
        .collect();
    Ok((matched, matcher.fresh.clone()))
}
