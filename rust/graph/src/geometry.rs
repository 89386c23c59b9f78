// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar geometry helpers and geometric queries on map elements.
//!
//! Contours are open point lists (the closing point is implied). Map
//! coordinates have y pointing up, so a positive signed area means
//! counter-clockwise winding.

use nalgebra::{Point2, Vector2};

use crate::keys::*;
use crate::map::PlanarMap;

/// Polygons with less area than this are treated as degenerate.
pub const MIN_AREA: f64 = 1e-10;

/// Signed shoelace area. Positive = counter-clockwise.
pub fn signed_area(contour: &[Point2<f64>]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }

    let n = contour.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += contour[i].x * contour[j].y;
        area -= contour[j].x * contour[i].y;
    }
    area * 0.5
}

/// Returns the contour with counter-clockwise winding.
pub fn ensure_ccw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if signed_area(contour) < 0.0 {
        contour.iter().rev().copied().collect()
    } else {
        contour.to_vec()
    }
}

/// Returns the contour with clockwise winding.
pub fn ensure_cw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if signed_area(contour) > 0.0 {
        contour.iter().rev().copied().collect()
    } else {
        contour.to_vec()
    }
}

/// Axis-aligned bounds `(min, max)` of a point set.
pub fn bounds(points: &[Point2<f64>]) -> Option<(Point2<f64>, Point2<f64>)> {
    let (first, rest) = points.split_first()?;
    let mut min = *first;
    let mut max = *first;
    for p in rest {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some((min, max))
}

/// Point at fraction `t` along `a -> b`.
pub fn lerp(a: Point2<f64>, b: Point2<f64>, t: f64) -> Point2<f64> {
    a + (b - a) * t
}

/// Distance from `p` to the segment `a-b`.
pub fn distance_to_segment(p: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - lerp(a, b, t)).norm()
}

/// Ray-casting containment test (boundary points are unspecified).
pub fn point_in_contour(point: &Point2<f64>, contour: &[Point2<f64>]) -> bool {
    if contour.len() < 3 {
        return false;
    }

    let mut inside = false;
    let n = contour.len();
    let mut j = n - 1;
    for i in 0..n {
        let pi = &contour[i];
        let pj = &contour[j];
        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Drops consecutive duplicates, including a closing point equal to the first.
pub fn dedup_contour(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut out: Vec<Point2<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if out.last() != Some(p) {
            out.push(*p);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

impl PlanarMap {
    /// Positions of a ring's corners (closing node omitted).
    pub fn ring_points(&self, ring: &NodeRing) -> Option<Vec<Point2<f64>>> {
        ring.corners()
            .iter()
            .map(|&n| self.node_position(n))
            .collect()
    }

    /// Signed area of a face's outer ring.
    pub fn face_signed_area(&self, face: &FaceKey) -> Option<f64> {
        self.face(face)?;
        self.ring_points(face).map(|pts| signed_area(&pts))
    }

    /// Area enclosed by a face: outer ring minus holes.
    pub fn face_area(&self, face: &FaceKey) -> Option<f64> {
        let data = self.face(face)?;
        let mut area = signed_area(&self.ring_points(face)?).abs();
        for hole in &data.holes {
            area -= signed_area(&self.ring_points(hole)?).abs();
        }
        Some(area)
    }

    pub fn half_edge_vector(&self, h: HalfEdgeKey) -> Option<Vector2<f64>> {
        Some(self.node_position(h.tail)? - self.node_position(h.head)?)
    }

    pub fn half_edge_length(&self, h: HalfEdgeKey) -> Option<f64> {
        self.half_edge_vector(h).map(|v| v.norm())
    }

    pub fn half_edge_midpoint(&self, h: HalfEdgeKey) -> Option<Point2<f64>> {
        let a = self.node_position(h.head)?;
        let b = self.node_position(h.tail)?;
        Some(lerp(a, b, 0.5))
    }

    /// Point at fraction `t` along a half-edge.
    pub fn half_edge_point(&self, h: HalfEdgeKey, t: f64) -> Option<Point2<f64>> {
        let a = self.node_position(h.head)?;
        let b = self.node_position(h.tail)?;
        Some(lerp(a, b, t))
    }

    /// Bounds of all node positions.
    pub fn bounds(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        let points: Vec<_> = self.nodes.values().map(|n| n.position).collect();
        bounds(&points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attributes;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    #[test]
    fn signed_area_follows_winding() {
        let ccw = [p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)];
        assert_relative_eq!(signed_area(&ccw), 4.0);
        let cw: Vec<_> = ccw.iter().rev().copied().collect();
        assert_relative_eq!(signed_area(&cw), -4.0);
        assert_relative_eq!(signed_area(&ensure_ccw(&cw)), 4.0);
        assert_relative_eq!(signed_area(&ensure_cw(&ccw)), -4.0);
    }

    #[test]
    fn dedup_drops_repeats_and_closure() {
        let pts = [p(0.0, 0.0), p(1.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 0.0)];
        assert_eq!(dedup_contour(&pts), vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)]);
    }

    #[test]
    fn segment_distance() {
        let (a, b) = (p(0.0, 0.0), p(4.0, 0.0));
        assert_relative_eq!(distance_to_segment(p(2.0, 3.0), a, b), 3.0);
        assert_relative_eq!(distance_to_segment(p(7.0, 4.0), a, b), 5.0);
    }

    #[test]
    fn containment() {
        let square = [p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(0.0, 4.0)];
        assert!(point_in_contour(&p(1.0, 1.0), &square));
        assert!(!point_in_contour(&p(5.0, 1.0), &square));
    }

    #[test]
    fn face_area_subtracts_holes() {
        let mut map = PlanarMap::new();
        let coords = [
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 4.0),
            (0.0, 4.0),
            (1.0, 1.0),
            (1.0, 2.0),
            (2.0, 2.0),
            (2.0, 1.0),
        ];
        for (i, (x, y)) in coords.iter().enumerate() {
            map.add_node(NodeKey(i as u64 + 1), p(*x, *y), Attributes::default())
                .unwrap();
        }
        let keys: Vec<_> = (1..=8).map(NodeKey).collect();
        let outer = NodeRing::from_corners(&keys[..4]).unwrap();
        let hole = NodeRing::from_corners(&keys[4..]).unwrap();
        map.add_face(outer.clone(), vec![hole], Attributes::default())
            .unwrap();

        assert_relative_eq!(map.face_signed_area(&outer).unwrap(), 16.0);
        assert_relative_eq!(map.face_area(&outer).unwrap(), 15.0);

        let h = HalfEdgeKey::new(NodeKey(1), NodeKey(2));
        assert_relative_eq!(map.half_edge_length(h).unwrap(), 4.0);
        assert_eq!(map.half_edge_midpoint(h), Some(p(2.0, 0.0)));
    }
}
