// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D polygon booleans used to cut faces.
//!
//! Splitting a polygon along a polyline is done with two overlays against a
//! "knife" polygon: the cut polyline, extended far past the polygon on both
//! ends and closed on its left side. The intersection is the part left of the
//! cut, the difference the part right of it.

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::{Point2, Vector2};

use crate::geometry::{bounds, ensure_ccw, ensure_cw, signed_area, MIN_AREA};

/// A polygon with an outer contour (counter-clockwise) and holes (clockwise).
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub outer: Vec<Point2<f64>>,
    pub holes: Vec<Vec<Point2<f64>>>,
}

impl Polygon {
    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(|h| signed_area(h).abs()).sum();
        signed_area(&self.outer).abs() - holes
    }
}

/// Splits `polygon` along the polyline `cut`.
///
/// The knife extends `extent_factor` times the bounding diagonal past each
/// end of the cut. Returns every non-degenerate piece: left pieces first,
/// then right pieces. A cut that crosses the polygon cleanly yields exactly
/// two. Returns an empty list for a cut with fewer than two distinct points.
pub fn split_polygon(
    polygon: &Polygon,
    cut: &[Point2<f64>],
    extent_factor: f64,
) -> Vec<Polygon> {
    let Some(knife) = knife_polygon(polygon, cut, extent_factor) else {
        return Vec::new();
    };

    let subject = polygon_to_paths(polygon);
    let clip = vec![contour_to_path(&knife)];

    let left = subject.overlay(&clip, OverlayRule::Intersect, FillRule::EvenOdd);
    let right = subject.overlay(&clip, OverlayRule::Difference, FillRule::EvenOdd);

    left.iter()
        .chain(right.iter())
        .filter_map(|shape| shape_to_polygon(shape))
        .collect()
}

/// The cut polyline extended at both ends and closed on its left side.
fn knife_polygon(
    polygon: &Polygon,
    cut: &[Point2<f64>],
    extent_factor: f64,
) -> Option<Vec<Point2<f64>>> {
    let first = *cut.first()?;
    let last = *cut.last()?;
    let start_dir = cut
        .iter()
        .skip(1)
        .find(|p| **p != first)
        .map(|p| (p - first).normalize())?;
    let end_dir = cut
        .iter()
        .rev()
        .skip(1)
        .find(|p| **p != last)
        .map(|p| (last - p).normalize())?;
    let overall = last - first;
    let overall = if overall.norm() > 0.0 { overall.normalize() } else { start_dir };

    let mut all = polygon.outer.clone();
    all.extend_from_slice(cut);
    let (min, max) = bounds(&all)?;
    let extent = (max - min).norm().max(1.0) * extent_factor;

    let left = Vector2::new(-overall.y, overall.x) * extent;
    let start = first - start_dir * extent;
    let end = last + end_dir * extent;

    let mut knife = Vec::with_capacity(cut.len() + 4);
    knife.push(start);
    knife.extend_from_slice(cut);
    knife.push(end);
    knife.push(end + left);
    knife.push(start + left);
    Some(knife)
}

fn polygon_to_paths(polygon: &Polygon) -> Vec<Vec<[f64; 2]>> {
    let mut paths = Vec::with_capacity(1 + polygon.holes.len());
    paths.push(contour_to_path(&ensure_ccw(&polygon.outer)));
    for hole in &polygon.holes {
        paths.push(contour_to_path(&ensure_cw(hole)));
    }
    paths
}

fn contour_to_path(contour: &[Point2<f64>]) -> Vec<[f64; 2]> {
    contour.iter().map(|p| [p.x, p.y]).collect()
}

fn path_to_contour(path: &[[f64; 2]]) -> Vec<Point2<f64>> {
    path.iter().map(|p| Point2::new(p[0], p[1])).collect()
}

/// First contour of a shape is its outer boundary, the rest are holes.
fn shape_to_polygon(shape: &[Vec<[f64; 2]>]) -> Option<Polygon> {
    let (outer, holes) = shape.split_first()?;
    let outer = path_to_contour(outer);
    if signed_area(&outer).abs() < MIN_AREA {
        return None;
    }
    let holes = holes
        .iter()
        .map(|h| path_to_contour(h))
        .filter(|h| signed_area(h).abs() >= MIN_AREA)
        .map(|h| ensure_cw(&h))
        .collect();
    Some(Polygon {
        outer: ensure_ccw(&outer),
        holes,
    })
}
