// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Editor tuning knobs, optionally loaded from environment variables.

use nalgebra::Vector2;

/// Tolerances and offsets used by the topology operators.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Decimal places used when matching boolean output back to nodes.
    pub match_precision: u32,
    /// Maximum midpoint distance between two half-edges that may be joined.
    pub join_distance_threshold: f64,
    /// Maximum dot product of the unit directions of a joinable pair
    /// (-1 means exactly opposed).
    pub join_min_opposition: f64,
    /// Translation applied to pasted elements.
    pub paste_offset: Vector2<f64>,
    /// How far the split knife reaches past the cut, in bounding diagonals.
    pub split_extent_factor: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            match_precision: 2,
            join_distance_threshold: 64.0,
            join_min_opposition: -0.9,
            paste_offset: Vector2::new(64.0, 64.0),
            split_extent_factor: 4.0,
        }
    }
}

impl EditorConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            match_precision: std::env::var("RETROMAP_MATCH_PRECISION")
                .unwrap_or_else(|_| defaults.match_precision.to_string())
                .parse()
                .unwrap_or(defaults.match_precision),
            join_distance_threshold: std::env::var("RETROMAP_JOIN_DISTANCE")
                .unwrap_or_else(|_| defaults.join_distance_threshold.to_string())
                .parse()
                .unwrap_or(defaults.join_distance_threshold),
            join_min_opposition: std::env::var("RETROMAP_JOIN_OPPOSITION")
                .unwrap_or_else(|_| defaults.join_min_opposition.to_string())
                .parse()
                .unwrap_or(defaults.join_min_opposition),
            paste_offset: std::env::var("RETROMAP_PASTE_OFFSET")
                .ok()
                .and_then(|v| parse_offset(&v))
                .unwrap_or(defaults.paste_offset),
            split_extent_factor: std::env::var("RETROMAP_SPLIT_EXTENT")
                .unwrap_or_else(|_| defaults.split_extent_factor.to_string())
                .parse()
                .unwrap_or(defaults.split_extent_factor),
        }
    }
}

/// Parses `"dx,dy"`.
fn parse_offset(value: &str) -> Option<Vector2<f64>> {
    let (dx, dy) = value.split_once(',')?;
    Some(Vector2::new(dx.trim().parse().ok()?, dy.trim().parse().ok()?))
}
