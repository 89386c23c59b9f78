// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Codec options loaded from environment variables.

/// Options shared by all codecs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecOptions {
    /// Import extra wall loops of a Build sector as holes instead of
    /// dropping them.
    pub import_sector_holes: bool,
    /// Doom map marker to read or write (`E1M1`, `MAP01`, ...). Reading
    /// defaults to the first map in the WAD, writing to `MAP01`.
    pub doom_map: Option<String>,
}

impl CodecOptions {
    /// Load options from environment variables.
    pub fn from_env() -> Self {
        Self {
            import_sector_holes: std::env::var("RETROMAP_IMPORT_SECTOR_HOLES")
                .unwrap_or_else(|_| "false".into())
                .parse()
                .unwrap_or(false),
            doom_map: std::env::var("RETROMAP_DOOM_MAP")
                .ok()
                .filter(|name| !name.is_empty()),
        }
    }
}
