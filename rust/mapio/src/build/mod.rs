// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build engine MAP files (Duke Nukem 3D, Shadow Warrior, Blood editors).

pub mod codec;
pub mod records;

pub use codec::{export, import, map_to_records, records_to_map};
pub use records::{parse_map, BuildMap, Header, Sector, Sprite, Wall};
