// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use nalgebra::Point2;
use tracing::debug;

use super::{abort, Abort, Outcome};
use crate::attributes::Attributes;
use crate::error::Result;
use crate::geometry::{dedup_contour, ensure_ccw, signed_area, MIN_AREA};
use crate::keys::*;
use crate::map::PlanarMap;
use crate::tweak::{DeltaSink, Edit, Tweak};

/// Creates a face from a point ring with fresh nodes and half-edges.
///
/// The ring is normalized to counter-clockwise winding. A closing point
/// equal to the first one is optional.
pub fn create_face(
    map: &mut PlanarMap,
    sink: &mut dyn DeltaSink,
    points: &[Point2<f64>],
    attributes: Attributes,
) -> Result<Outcome<FaceKey>> {
    let points = dedup_contour(points);
    if points.len() < 3 || signed_area(&points).abs() < MIN_AREA {
        return abort("create_face", Abort::DegeneratePolygon);
    }
    let points = ensure_ccw(&points);

    let mut tweak = Tweak::add();
    let keys: Vec<NodeKey> = points
        .iter()
        .map(|p| {
            let key = map.allocate_node_key();
            tweak.insert_node(key, *p, Attributes::default());
            key
        })
        .collect();

    let ring = NodeRing::from_corners(&keys)?;
    for h in ring.half_edges() {
        tweak.insert_half_edge(h, Attributes::default());
    }
    tweak.insert_face(ring.clone(), Vec::new(), attributes);

    debug!(face = %ring, "creating face");
    sink.submit(map, Edit::new("Create face").with(tweak))?;
    Ok(Outcome::Applied(ring))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tweak::Immediate;
    use approx::assert_relative_eq;

    #[test]
    fn clockwise_input_is_normalized() {
        let mut map = PlanarMap::new();
        let mut sink = Immediate::new();
        let cw = [
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 2.0),
            Point2::new(2.0, 2.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 0.0),
        ];
        let face = create_face(&mut map, &mut sink, &cw, Attributes::default())
            .unwrap()
            .applied()
            .unwrap();

        assert_eq!(face.len(), 4);
        assert_relative_eq!(map.face_signed_area(&face).unwrap(), 4.0);
        assert_eq!(map.face_half_edges(&face).len(), 4);
        assert_eq!(sink.labels(), &["Create face".to_string()]);
    }

    #[test]
    fn collinear_points_abort() {
        let mut map = PlanarMap::new();
        let mut sink = Immediate::new();
        let line = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(2.0, 0.0)];
        let outcome = create_face(&mut map, &mut sink, &line, Attributes::default()).unwrap();
        assert_eq!(outcome, Outcome::Aborted(Abort::DegeneratePolygon));
        assert!(map.is_empty());
        assert!(sink.labels().is_empty());
    }
}
