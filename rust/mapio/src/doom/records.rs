// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vanilla Doom binary map lumps.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use nom::combinator::all_consuming;
use nom::multi::many0;
use nom::number::complete::{le_i16, le_u16};
use nom::IResult;

use super::wad::{fixed_length_ascii, write_name, Lump};
use crate::error::{Error, Result};

/// Sidedef index meaning "no side".
pub const NO_SIDE: i16 = -1;

/// Linedef flag: the line has a back side.
pub const LINE_TWO_SIDED: i16 = 0x0004;
/// Linedef flag: blocks players and monsters.
pub const LINE_IMPASSABLE: i16 = 0x0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Thing {
    pub x: i16,
    pub y: i16,
    pub angle: i16,
    pub doomednum: i16,
    pub flags: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linedef {
    pub v1: i16,
    pub v2: i16,
    pub flags: i16,
    pub special: i16,
    pub tag: i16,
    pub front: i16,
    pub back: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidedef {
    pub x_offset: i16,
    pub y_offset: i16,
    pub upper_texture: String,
    pub lower_texture: String,
    pub middle_texture: String,
    pub sector: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vertex {
    pub x: i16,
    pub y: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    pub floor_height: i16,
    pub ceiling_height: i16,
    pub floor_texture: String,
    pub ceiling_texture: String,
    pub light: i16,
    pub special: i16,
    pub tag: i16,
}

/// The five lumps needed to describe map geometry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DoomMap {
    pub things: Vec<Thing>,
    pub linedefs: Vec<Linedef>,
    pub sidedefs: Vec<Sidedef>,
    pub vertexes: Vec<Vertex>,
    pub sectors: Vec<Sector>,
}

fn thing(input: &[u8]) -> IResult<&[u8], Thing> {
    let (input, x) = le_i16(input)?;
    let (input, y) = le_i16(input)?;
    let (input, angle) = le_i16(input)?;
    let (input, doomednum) = le_i16(input)?;
    let (input, flags) = le_u16(input)?;
    Ok((
        input,
        Thing {
            x,
            y,
            angle,
            doomednum,
            flags,
        },
    ))
}

fn linedef(input: &[u8]) -> IResult<&[u8], Linedef> {
    let (input, v1) = le_i16(input)?;
    let (input, v2) = le_i16(input)?;
    let (input, flags) = le_i16(input)?;
    let (input, special) = le_i16(input)?;
    let (input, tag) = le_i16(input)?;
    let (input, front) = le_i16(input)?;
    let (input, back) = le_i16(input)?;
    Ok((
        input,
        Linedef {
            v1,
            v2,
            flags,
            special,
            tag,
            front,
            back,
        },
    ))
}

fn sidedef(input: &[u8]) -> IResult<&[u8], Sidedef> {
    let (input, x_offset) = le_i16(input)?;
    let (input, y_offset) = le_i16(input)?;
    let (input, upper_texture) = fixed_length_ascii(input, 8)?;
    let (input, lower_texture) = fixed_length_ascii(input, 8)?;
    let (input, middle_texture) = fixed_length_ascii(input, 8)?;
    let (input, sector) = le_i16(input)?;
    Ok((
        input,
        Sidedef {
            x_offset,
            y_offset,
            upper_texture,
            lower_texture,
            middle_texture,
            sector,
        },
    ))
}

fn vertex(input: &[u8]) -> IResult<&[u8], Vertex> {
    let (input, x) = le_i16(input)?;
    let (input, y) = le_i16(input)?;
    Ok((input, Vertex { x, y }))
}

fn sector(input: &[u8]) -> IResult<&[u8], Sector> {
    let (input, floor_height) = le_i16(input)?;
    let (input, ceiling_height) = le_i16(input)?;
    let (input, floor_texture) = fixed_length_ascii(input, 8)?;
    let (input, ceiling_texture) = fixed_length_ascii(input, 8)?;
    let (input, light) = le_i16(input)?;
    let (input, special) = le_i16(input)?;
    let (input, tag) = le_i16(input)?;
    Ok((
        input,
        Sector {
            floor_height,
            ceiling_height,
            floor_texture,
            ceiling_texture,
            light,
            special,
            tag,
        },
    ))
}

fn lump_records<'a, T>(
    lumps: &[&'a Lump],
    name: &'static str,
    record: fn(&'a [u8]) -> IResult<&'a [u8], T>,
) -> Result<Vec<T>> {
    let lump = lumps
        .iter()
        .copied()
        .find(|l| l.name == name)
        .ok_or_else(|| Error::malformed("Doom map", format!("missing {} lump", name)))?;
    let (_, records) = all_consuming(many0(record))(&lump.data[..])
        .map_err(|_| Error::Truncated(name))?;
    Ok(records)
}

impl DoomMap {
    /// Parses the lumps following a map marker.
    pub fn from_lumps(lumps: &[&Lump]) -> Result<Self> {
        Ok(Self {
            things: lump_records(lumps, "THINGS", thing)?,
            linedefs: lump_records(lumps, "LINEDEFS", linedef)?,
            sidedefs: lump_records(lumps, "SIDEDEFS", sidedef)?,
            vertexes: lump_records(lumps, "VERTEXES", vertex)?,
            sectors: lump_records(lumps, "SECTORS", sector)?,
        })
    }

    /// Encodes the five lumps, in map order, after a `marker` lump.
    pub fn to_lumps(&self, marker: &str) -> Result<Vec<Lump>> {
        let mut things = Vec::with_capacity(self.things.len() * 10);
        for t in &self.things {
            t.write_to(&mut things)?;
        }
        let mut linedefs = Vec::with_capacity(self.linedefs.len() * 14);
        for l in &self.linedefs {
            l.write_to(&mut linedefs)?;
        }
        let mut sidedefs = Vec::with_capacity(self.sidedefs.len() * 30);
        for s in &self.sidedefs {
            s.write_to(&mut sidedefs)?;
        }
        let mut vertexes = Vec::with_capacity(self.vertexes.len() * 4);
        for v in &self.vertexes {
            v.write_to(&mut vertexes)?;
        }
        let mut sectors = Vec::with_capacity(self.sectors.len() * 26);
        for s in &self.sectors {
            s.write_to(&mut sectors)?;
        }

        Ok(vec![
            Lump::marker(marker),
            Lump::new("THINGS", things),
            Lump::new("LINEDEFS", linedefs),
            Lump::new("SIDEDEFS", sidedefs),
            Lump::new("VERTEXES", vertexes),
            Lump::new("SECTORS", sectors),
        ])
    }
}

impl Thing {
    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_i16::<LittleEndian>(self.x)?;
        w.write_i16::<LittleEndian>(self.y)?;
        w.write_i16::<LittleEndian>(self.angle)?;
        w.write_i16::<LittleEndian>(self.doomednum)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        Ok(())
    }
}

impl Linedef {
    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_i16::<LittleEndian>(self.v1)?;
        w.write_i16::<LittleEndian>(self.v2)?;
        w.write_i16::<LittleEndian>(self.flags)?;
        w.write_i16::<LittleEndian>(self.special)?;
        w.write_i16::<LittleEndian>(self.tag)?;
        w.write_i16::<LittleEndian>(self.front)?;
        w.write_i16::<LittleEndian>(self.back)?;
        Ok(())
    }
}

impl Sidedef {
    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_i16::<LittleEndian>(self.x_offset)?;
        w.write_i16::<LittleEndian>(self.y_offset)?;
        write_name(w, &self.upper_texture, "sidedef texture")?;
        write_name(w, &self.lower_texture, "sidedef texture")?;
        write_name(w, &self.middle_texture, "sidedef texture")?;
        w.write_i16::<LittleEndian>(self.sector)?;
        Ok(())
    }
}

impl Vertex {
    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_i16::<LittleEndian>(self.x)?;
        w.write_i16::<LittleEndian>(self.y)?;
        Ok(())
    }
}

impl Sector {
    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_i16::<LittleEndian>(self.floor_height)?;
        w.write_i16::<LittleEndian>(self.ceiling_height)?;
        write_name(w, &self.floor_texture, "sector flat")?;
        write_name(w, &self.ceiling_texture, "sector flat")?;
        w.write_i16::<LittleEndian>(self.light)?;
        w.write_i16::<LittleEndian>(self.special)?;
        w.write_i16::<LittleEndian>(self.tag)?;
        Ok(())
    }
}
