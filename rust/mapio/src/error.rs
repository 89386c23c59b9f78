// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for map codecs.

use thiserror::Error;

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing map files.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input ended inside a record or header.
    #[error("truncated {0}")]
    Truncated(&'static str),

    /// The input is structurally invalid.
    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },

    #[error("unsupported Build map version {0} (only 7 is supported)")]
    UnsupportedVersion(i32),

    /// A value does not fit the target format's field.
    #[error("{what} value {value} does not fit the target format")]
    Overflow { what: &'static str, value: i64 },

    #[error("unknown map format: {0}")]
    UnknownFormat(String),

    /// The format exists but cannot be read (or written).
    #[error("format `{format}` cannot be {direction}")]
    Unsupported {
        format: &'static str,
        direction: &'static str,
    },

    #[error("map error: {0}")]
    Graph(#[from] retromap_graph::Error),
}

impl Error {
    pub(crate) fn malformed(what: &'static str, detail: impl Into<String>) -> Self {
        Error::Malformed {
            what,
            detail: detail.into(),
        }
    }
}
