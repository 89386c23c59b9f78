// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # RetroMap Graph
//!
//! Half-edge planar map for sector-based level editors (Build engine, Doom).
//!
//! Nodes are points, half-edges are directed node pairs with their own
//! attributes (a wall side), and faces are closed half-edge rings with
//! optional holes (a sector). Two opposing half-edges owned by different
//! faces form a portal.
//!
//! The map keeps raw storage and a few eager indices; everything else
//! (ring decomposition, `reversed` pairing, angular neighbour order) is a
//! derived view rebuilt by [`PlanarMap::update`].
//!
//! Editing goes through [`operators`], which describe every change as an
//! [`Edit`] made of [`Tweak`]s and hand it to a [`DeltaSink`] such as
//! [`History`], so every operation can be undone.
//!
//! ```
//! use nalgebra::Point2;
//! use retromap_graph::operators::create_face;
//! use retromap_graph::{Attributes, History, PlanarMap};
//!
//! let mut map = PlanarMap::new();
//! let mut history = History::new();
//! let square = [
//!     Point2::new(0.0, 0.0),
//!     Point2::new(64.0, 0.0),
//!     Point2::new(64.0, 64.0),
//!     Point2::new(0.0, 64.0),
//! ];
//! let face = create_face(&mut map, &mut history, &square, Attributes::default())
//!     .unwrap()
//!     .applied()
//!     .unwrap();
//! assert_eq!(map.face_half_edges(&face).len(), 4);
//!
//! history.undo(&mut map).unwrap();
//! assert!(map.is_empty());
//! ```

pub mod attributes;
pub mod boolean;
pub mod config;
pub mod construction;
pub mod derived;
pub mod disjoint;
pub mod error;
pub mod geometry;
pub mod gexf;
pub mod keys;
pub mod map;
pub mod matching;
pub mod operators;
pub mod serialization;
pub mod tweak;

pub use attributes::{AttrType, AttrValue, AttributeDefinition, AttributeSchema, Attributes};
pub use boolean::Polygon;
pub use config::EditorConfig;
pub use derived::Ring;
pub use disjoint::DisjointSet;
pub use error::{Error, Result};
pub use keys::{
    EdgeKey, ElementKey, ElementKind, FaceKey, HalfEdgeKey, NodeKey, NodeRing, RingKey,
};
pub use map::{FaceData, HalfEdgeData, NodeData, PlanarMap};
pub use matching::{match_polygons, CoordinateMatcher, MatchedPolygon};
pub use operators::{Abort, Outcome};
pub use serialization::MapSnapshot;
pub use tweak::{DeltaSink, Edit, History, Immediate, Tweak, TweakKind};
