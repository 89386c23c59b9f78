// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WAD archive container: a 12-byte header, lump data, and a directory of
//! 16-byte entries (`filepos`, `size`, 8-byte name).

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use nom::branch::alt;
use nom::bytes::complete::{tag, take};
use nom::combinator::value;
use nom::number::complete::le_u32;
use nom::IResult;

use crate::error::{Error, Result};

pub const HEADER_SIZE: usize = 12;
pub const DIRECTORY_ENTRY_SIZE: usize = 16;

/// Lumps that make up a vanilla binary map, in the order they follow the
/// marker. Only the first five are required.
pub const MAP_LUMPS: [&str; 10] = [
    "THINGS", "LINEDEFS", "SIDEDEFS", "VERTEXES", "SEGS", "SSECTORS", "NODES", "SECTORS",
    "REJECT", "BLOCKMAP",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WadKind {
    /// Full standalone game data.
    Iwad,
    /// Patch WAD, usually a mod or a set of maps.
    Pwad,
}

impl WadKind {
    fn magic(self) -> &'static [u8; 4] {
        match self {
            WadKind::Iwad => b"IWAD",
            WadKind::Pwad => b"PWAD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lump {
    pub name: String,
    pub data: Vec<u8>,
}

impl Lump {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn marker(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }
}

/// A parsed WAD with owned lump data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wad {
    pub kind: WadKind,
    pub lumps: Vec<Lump>,
}

struct DirectoryEntry {
    filepos: u32,
    size: u32,
    name: String,
}

/// Reads a NUL-padded name of exactly `len` bytes. Only printable ASCII is
/// accepted before the first NUL.
pub(crate) fn fixed_length_ascii(input: &[u8], len: usize) -> IResult<&[u8], String> {
    let (rest, raw) = take(len)(input)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
    if raw[..end].iter().any(|&b| !(32..128).contains(&b)) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )));
    }
    Ok((rest, raw[..end].iter().map(|&b| b as char).collect()))
}

/// Writes `name` NUL-padded to 8 bytes.
pub(crate) fn write_name(w: &mut impl Write, name: &str, what: &'static str) -> Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() > 8 || !name.is_ascii() {
        return Err(Error::malformed(what, format!("`{}` is not an 8-byte ASCII name", name)));
    }
    w.write_all(bytes)?;
    for _ in bytes.len()..8 {
        w.write_u8(0)?;
    }
    Ok(())
}

fn header(input: &[u8]) -> IResult<&[u8], (WadKind, u32, u32)> {
    let (input, kind) = alt((
        value(WadKind::Iwad, tag(&b"IWAD"[..])),
        value(WadKind::Pwad, tag(&b"PWAD"[..])),
    ))(input)?;
    let (input, numlumps) = le_u32(input)?;
    let (input, infotableofs) = le_u32(input)?;
    Ok((input, (kind, numlumps, infotableofs)))
}

fn directory_entry(input: &[u8]) -> IResult<&[u8], DirectoryEntry> {
    let (input, filepos) = le_u32(input)?;
    let (input, size) = le_u32(input)?;
    let (input, name) = fixed_length_ascii(input, 8)?;
    Ok((input, DirectoryEntry { filepos, size, name }))
}

/// `ExMy` or `MAPxx`.
pub fn is_map_marker(name: &str) -> bool {
    let b = name.as_bytes();
    match b.len() {
        4 => b[0] == b'E' && b[1].is_ascii_digit() && b[2] == b'M' && b[3].is_ascii_digit(),
        5 => name.starts_with("MAP") && b[3].is_ascii_digit() && b[4].is_ascii_digit(),
        _ => false,
    }
}

impl Wad {
    pub fn new(kind: WadKind) -> Self {
        Self {
            kind,
            lumps: Vec::new(),
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::Truncated("WAD header"));
        }
        let (_, (kind, numlumps, infotableofs)) = header(buf)
            .map_err(|_| Error::malformed("WAD header", "missing IWAD/PWAD magic"))?;

        let offset = infotableofs as usize;
        let table_len = (numlumps as usize)
            .checked_mul(DIRECTORY_ENTRY_SIZE)
            .ok_or(Error::Truncated("WAD directory"))?;
        if buf.len() < offset.saturating_add(table_len) {
            return Err(Error::Truncated("WAD directory"));
        }

        let mut input = &buf[offset..];
        let mut lumps = Vec::with_capacity(numlumps as usize);
        for _ in 0..numlumps {
            let (rest, entry) = directory_entry(input)
                .map_err(|_| Error::malformed("WAD directory", "invalid lump name"))?;
            input = rest;

            let start = entry.filepos as usize;
            let end = start.saturating_add(entry.size as usize);
            if entry.size > 0 && end > buf.len() {
                return Err(Error::malformed(
                    "WAD directory",
                    format!("lump {} points past the end of the file", entry.name),
                ));
            }
            let data = if entry.size == 0 {
                Vec::new()
            } else {
                buf[start..end].to_vec()
            };
            lumps.push(Lump::new(entry.name, data));
        }

        Ok(Self { kind, lumps })
    }

    /// Marker names of every map, in directory order.
    pub fn map_names(&self) -> Vec<&str> {
        self.lumps
            .iter()
            .filter(|l| is_map_marker(&l.name))
            .map(|l| l.name.as_str())
            .collect()
    }

    /// Lumps of the map called `name`, or of the first map when `None`.
    /// Returns the marker name and the lumps following it up to the next
    /// non-map lump.
    pub fn map_lumps(&self, name: Option<&str>) -> Result<(String, Vec<&Lump>)> {
        let marker = match name {
            Some(n) => self.lumps.iter().position(|l| l.name == n),
            None => self.lumps.iter().position(|l| is_map_marker(&l.name)),
        }
        .ok_or_else(|| {
            Error::malformed(
                "WAD",
                format!("map {} not found", name.unwrap_or("(any)")),
            )
        })?;

        let lumps = self.lumps[marker + 1..]
            .iter()
            .take_while(|l| MAP_LUMPS.contains(&l.name.as_str()))
            .collect();
        Ok((self.lumps[marker].name.clone(), lumps))
    }

    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        let data_len: usize = self.lumps.iter().map(|l| l.data.len()).sum();
        let table_offset = HEADER_SIZE + data_len;
        if table_offset > u32::MAX as usize {
            return Err(Error::Overflow {
                what: "WAD size",
                value: table_offset as i64,
            });
        }

        w.write_all(self.kind.magic())?;
        w.write_u32::<LittleEndian>(self.lumps.len() as u32)?;
        w.write_u32::<LittleEndian>(table_offset as u32)?;
        for lump in &self.lumps {
            w.write_all(&lump.data)?;
        }

        let mut filepos = HEADER_SIZE;
        for lump in &self.lumps {
            w.write_u32::<LittleEndian>(filepos as u32)?;
            w.write_u32::<LittleEndian>(lump.data.len() as u32)?;
            write_name(w, &lump.name, "lump name")?;
            filepos += lump.data.len();
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_marker_names() {
        assert!(is_map_marker("E1M1"));
        assert!(is_map_marker("MAP07"));
        assert!(!is_map_marker("THINGS"));
        assert!(!is_map_marker("MAP7"));
    }

    #[test]
    fn write_then_parse() {
        let mut wad = Wad::new(WadKind::Pwad);
        wad.lumps.push(Lump::marker("MAP01"));
        wad.lumps.push(Lump::new("THINGS", vec![1, 2, 3, 4]));
        wad.lumps.push(Lump::new("DEHACKED", b"Patch".to_vec()));

        let bytes = wad.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"PWAD");
        assert_eq!(bytes.len(), HEADER_SIZE + 9 + 3 * DIRECTORY_ENTRY_SIZE);
        assert_eq!(Wad::parse(&bytes).unwrap(), wad);

        let (name, lumps) = wad.map_lumps(None).unwrap();
        assert_eq!(name, "MAP01");
        assert_eq!(lumps.len(), 1);
        assert_eq!(wad.map_names(), vec!["MAP01"]);
    }

    #[test]
    fn bad_magic_and_truncation() {
        assert!(matches!(
            Wad::parse(b"ZWAD\0\0\0\0\0\0\0\0"),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(Wad::parse(b"PW"), Err(Error::Truncated(_))));

        let mut wad = Wad::new(WadKind::Iwad);
        wad.lumps.push(Lump::new("PLAYPAL", vec![0; 32]));
        let bytes = wad.to_bytes().unwrap();
        assert!(matches!(
            Wad::parse(&bytes[..bytes.len() - 4]),
            Err(Error::Truncated(_))
        ));
    }

    #[test]
    fn long_lump_names_are_rejected() {
        let mut wad = Wad::new(WadKind::Pwad);
        wad.lumps.push(Lump::marker("TOOLONGNAME"));
        assert!(wad.to_bytes().is_err());
    }
}
