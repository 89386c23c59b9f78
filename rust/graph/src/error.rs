// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for planar map operations.

use crate::keys::{ElementKind, FaceKey, HalfEdgeKey, NodeKey};

/// Result type alias for planar map operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural errors. A call that returns one of these left the map unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A node with this key exists with a different position or attributes.
    #[error("node {0} already exists with different data")]
    DuplicateNode(NodeKey),

    /// A half-edge with the same `(head, tail)` pair already exists.
    #[error("half-edge {0} already exists")]
    DuplicateHalfEdge(HalfEdgeKey),

    /// A face with the same outer ring already exists.
    #[error("face {0} already exists")]
    DuplicateFace(FaceKey),

    /// A half-edge would start and end at the same node.
    #[error("half-edge {0} starts and ends at the same node")]
    DegenerateHalfEdge(HalfEdgeKey),

    /// A node tuple does not describe a valid closed ring.
    #[error("malformed ring: {0}")]
    MalformedRing(String),

    #[error("node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("half-edge not found: {0}")]
    HalfEdgeNotFound(HalfEdgeKey),

    #[error("face not found: {0}")]
    FaceNotFound(FaceKey),

    /// The half-edge is part of a face ring and cannot be reused or removed.
    #[error("half-edge {half_edge} already bounds face {face}")]
    HalfEdgeClaimed { half_edge: HalfEdgeKey, face: FaceKey },

    /// The node is still an endpoint of half-edges.
    #[error("node {0} is still referenced by {1} half-edge(s)")]
    NodeInUse(NodeKey, usize),

    /// No explicit value and no schema entry for the attribute.
    #[error("unknown {kind} attribute `{name}`")]
    UnknownAttribute { kind: ElementKind, name: String },

    /// A derived or raw index disagrees with the element storage.
    #[error("inconsistent map: {0}")]
    Inconsistent(String),

    /// Geometry that cannot be processed (zero area, zero length, ...).
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
