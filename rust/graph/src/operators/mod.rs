// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topology operators.
//!
//! Every operator reads the map, builds an [`Edit`](crate::tweak::Edit) and
//! submits it through the [`DeltaSink`](crate::tweak::DeltaSink) it is given.
//! Structural problems (unknown keys, inconsistent input) are returned as
//! errors. Geometric dead ends are not errors: the operator returns
//! [`Outcome::Aborted`] and submits nothing, so the map is untouched.

mod clipboard;
mod create;
mod delete;
mod join;
mod split;

pub use clipboard::{Clipboard, PasteResult};
pub use create::create_face;
pub use delete::delete_elements;
pub use join::{join_edges, JoinResult};
pub use split::{split_face, CutPoint, SplitResult};

use std::fmt;

use tracing::debug;

use crate::error::Result;

/// Why an operator gave up without changing anything.
#[derive(Debug, Clone, PartialEq)]
pub enum Abort {
    /// Fewer than three distinct points, or no area.
    DegeneratePolygon,
    /// The cut description does not describe a usable cut.
    InvalidCut(String),
    /// The boolean split produced this many pieces instead of two.
    UnexpectedPolygonCount(usize),
    /// The given half-edges do not all bound one face.
    NoSharedFace,
    /// No pair of candidate half-edges satisfied the join criteria.
    NoCandidates,
    /// Rewriting rings would collapse or collide topology.
    CollapsedTopology(String),
    /// Nothing to do.
    EmptySelection,
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abort::DegeneratePolygon => f.write_str("degenerate polygon"),
            Abort::InvalidCut(why) => write!(f, "invalid cut: {}", why),
            Abort::UnexpectedPolygonCount(n) => {
                write!(f, "split produced {} polygons instead of 2", n)
            }
            Abort::NoSharedFace => f.write_str("half-edges do not share a face"),
            Abort::NoCandidates => f.write_str("no joinable half-edge pairs"),
            Abort::CollapsedTopology(why) => write!(f, "topology would collapse: {}", why),
            Abort::EmptySelection => f.write_str("empty selection"),
        }
    }
}

/// Result of an operator that may abort without error.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Outcome<T> {
    Applied(T),
    Aborted(Abort),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(v) => Some(v),
            Outcome::Aborted(_) => None,
        }
    }

    pub fn abort_reason(&self) -> Option<&Abort> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Aborted(a) => Some(a),
        }
    }
}

/// Logs the reason and returns it as an aborted outcome.
pub(crate) fn abort<T>(operator: &str, reason: Abort) -> Result<Outcome<T>> {
    debug!(operator, reason = %reason, "operator aborted");
    Ok(Outcome::Aborted(reason))
}
