// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # RetroMap Map I/O
//!
//! Readers and writers that move [`PlanarMap`](retromap_graph::PlanarMap)s
//! in and out of game map files:
//!
//! - Build engine MAP, version 7 ([`build`])
//! - Doom WAD, vanilla binary map lumps ([`doom`])
//! - the native JSON document and a write-only GEXF export, both provided
//!   by `retromap-graph`
//!
//! [`registry`] ties them together behind format tags and file extensions.
//!
//! ```no_run
//! use std::path::Path;
//!
//! let map = retromap_mapio::load(Path::new("E1L1.MAP"))?;
//! retromap_mapio::save(&map, Path::new("E1L1.json"))?;
//! # Ok::<(), retromap_mapio::Error>(())
//! ```

pub mod build;
pub mod config;
pub mod doom;
pub mod error;
mod fields;
pub mod registry;

pub use config::CodecOptions;
pub use error::{Error, Result};
pub use registry::{load, load_with, save, save_with, FormatEntry, FORMATS};
