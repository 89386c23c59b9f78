// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build engine MAP (version 7) records.
//!
//! All numbers are little-endian. The file is a header followed by three
//! `u16`-counted arrays: sectors (40 bytes each), walls (32 bytes each) and
//! sprites (44 bytes each).

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use nom::multi::count;
use nom::number::complete::{le_i16, le_i32, le_i8, le_u16, le_u8};
use nom::IResult;

use crate::error::{Error, Result};
use crate::fields::narrow;

pub const MAP_VERSION: i32 = 7;
pub const HEADER_SIZE: usize = 20;
pub const SECTOR_SIZE: usize = 40;
pub const WALL_SIZE: usize = 32;
pub const SPRITE_SIZE: usize = 44;

/// Player start and file version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub version: i32,
    pub pos_x: i32,
    pub pos_y: i32,
    pub pos_z: i32,
    pub angle: i16,
    pub sector: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sector {
    pub wallptr: i16,
    pub wallnum: i16,
    pub ceilingz: i32,
    pub floorz: i32,
    pub ceilingstat: i16,
    pub floorstat: i16,
    pub ceilingpicnum: i16,
    pub ceilingheinum: i16,
    pub ceilingshade: i8,
    pub ceilingpal: u8,
    pub ceilingxpanning: u8,
    pub ceilingypanning: u8,
    pub floorpicnum: i16,
    pub floorheinum: i16,
    pub floorshade: i8,
    pub floorpal: u8,
    pub floorxpanning: u8,
    pub floorypanning: u8,
    pub visibility: u8,
    pub filler: u8,
    pub lotag: i16,
    pub hitag: i16,
    pub extra: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Wall {
    pub x: i32,
    pub y: i32,
    /// Index of the next wall in the same loop.
    pub point2: i16,
    /// Index of the opposing wall in the neighbouring sector, or -1.
    pub nextwall: i16,
    pub nextsector: i16,
    pub cstat: i16,
    pub picnum: i16,
    pub overpicnum: i16,
    pub shade: i8,
    pub pal: u8,
    pub xrepeat: u8,
    pub yrepeat: u8,
    pub xpanning: u8,
    pub ypanning: u8,
    pub lotag: i16,
    pub hitag: i16,
    pub extra: i16,
}

/// Sprites are carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sprite {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub cstat: i16,
    pub picnum: i16,
    pub shade: i8,
    pub pal: u8,
    pub clipdist: u8,
    pub filler: u8,
    pub xrepeat: u8,
    pub yrepeat: u8,
    pub xoffset: i8,
    pub yoffset: i8,
    pub sectnum: i16,
    pub statnum: i16,
    pub ang: i16,
    pub owner: i16,
    pub xvel: i16,
    pub yvel: i16,
    pub zvel: i16,
    pub lotag: i16,
    pub hitag: i16,
    pub extra: i16,
}

/// A whole MAP file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildMap {
    pub header: Header,
    pub sectors: Vec<Sector>,
    pub walls: Vec<Wall>,
    pub sprites: Vec<Sprite>,
}

fn header(input: &[u8]) -> IResult<&[u8], Header> {
    let (input, version) = le_i32(input)?;
    let (input, pos_x) = le_i32(input)?;
    let (input, pos_y) = le_i32(input)?;
    let (input, pos_z) = le_i32(input)?;
    let (input, angle) = le_i16(input)?;
    let (input, sector) = le_i16(input)?;
    Ok((
        input,
        Header {
            version,
            pos_x,
            pos_y,
            pos_z,
            angle,
            sector,
        },
    ))
}

fn sector(input: &[u8]) -> IResult<&[u8], Sector> {
    let (input, wallptr) = le_i16(input)?;
    let (input, wallnum) = le_i16(input)?;
    let (input, ceilingz) = le_i32(input)?;
    let (input, floorz) = le_i32(input)?;
    let (input, ceilingstat) = le_i16(input)?;
    let (input, floorstat) = le_i16(input)?;
    let (input, ceilingpicnum) = le_i16(input)?;
    let (input, ceilingheinum) = le_i16(input)?;
    let (input, ceilingshade) = le_i8(input)?;
    let (input, ceilingpal) = le_u8(input)?;
    let (input, ceilingxpanning) = le_u8(input)?;
    let (input, ceilingypanning) = le_u8(input)?;
    let (input, floorpicnum) = le_i16(input)?;
    let (input, floorheinum) = le_i16(input)?;
    let (input, floorshade) = le_i8(input)?;
    let (input, floorpal) = le_u8(input)?;
    let (input, floorxpanning) = le_u8(input)?;
    let (input, floorypanning) = le_u8(input)?;
    let (input, visibility) = le_u8(input)?;
    let (input, filler) = le_u8(input)?;
    let (input, lotag) = le_i16(input)?;
    let (input, hitag) = le_i16(input)?;
    let (input, extra) = le_i16(input)?;
    Ok((
        input,
        Sector {
            wallptr,
            wallnum,
            ceilingz,
            floorz,
            ceilingstat,
            floorstat,
            ceilingpicnum,
            ceilingheinum,
            ceilingshade,
            ceilingpal,
            ceilingxpanning,
            ceilingypanning,
            floorpicnum,
            floorheinum,
            floorshade,
            floorpal,
            floorxpanning,
            floorypanning,
            visibility,
            filler,
            lotag,
            hitag,
            extra,
        },
    ))
}

fn wall(input: &[u8]) -> IResult<&[u8], Wall> {
    let (input, x) = le_i32(input)?;
    let (input, y) = le_i32(input)?;
    let (input, point2) = le_i16(input)?;
    let (input, nextwall) = le_i16(input)?;
    let (input, nextsector) = le_i16(input)?;
    let (input, cstat) = le_i16(input)?;
    let (input, picnum) = le_i16(input)?;
    let (input, overpicnum) = le_i16(input)?;
    let (input, shade) = le_i8(input)?;
    let (input, pal) = le_u8(input)?;
    let (input, xrepeat) = le_u8(input)?;
    let (input, yrepeat) = le_u8(input)?;
    let (input, xpanning) = le_u8(input)?;
    let (input, ypanning) = le_u8(input)?;
    let (input, lotag) = le_i16(input)?;
    let (input, hitag) = le_i16(input)?;
    let (input, extra) = le_i16(input)?;
    Ok((
        input,
        Wall {
            x,
            y,
            point2,
            nextwall,
            nextsector,
            cstat,
            picnum,
            overpicnum,
            shade,
            pal,
            xrepeat,
            yrepeat,
            xpanning,
            ypanning,
            lotag,
            hitag,
            extra,
        },
    ))
}

fn sprite(input: &[u8]) -> IResult<&[u8], Sprite> {
    let (input, x) = le_i32(input)?;
    let (input, y) = le_i32(input)?;
    let (input, z) = le_i32(input)?;
    let (input, cstat) = le_i16(input)?;
    let (input, picnum) = le_i16(input)?;
    let (input, shade) = le_i8(input)?;
    let (input, pal) = le_u8(input)?;
    let (input, clipdist) = le_u8(input)?;
    let (input, filler) = le_u8(input)?;
    let (input, xrepeat) = le_u8(input)?;
    let (input, yrepeat) = le_u8(input)?;
    let (input, xoffset) = le_i8(input)?;
    let (input, yoffset) = le_i8(input)?;
    let (input, sectnum) = le_i16(input)?;
    let (input, statnum) = le_i16(input)?;
    let (input, ang) = le_i16(input)?;
    let (input, owner) = le_i16(input)?;
    let (input, xvel) = le_i16(input)?;
    let (input, yvel) = le_i16(input)?;
    let (input, zvel) = le_i16(input)?;
    let (input, lotag) = le_i16(input)?;
    let (input, hitag) = le_i16(input)?;
    let (input, extra) = le_i16(input)?;
    Ok((
        input,
        Sprite {
            x,
            y,
            z,
            cstat,
            picnum,
            shade,
            pal,
            clipdist,
            filler,
            xrepeat,
            yrepeat,
            xoffset,
            yoffset,
            sectnum,
            statnum,
            ang,
            owner,
            xvel,
            yvel,
            zvel,
            lotag,
            hitag,
            extra,
        },
    ))
}

fn counted<'a, T>(
    input: &'a [u8],
    record: fn(&'a [u8]) -> IResult<&'a [u8], T>,
) -> IResult<&'a [u8], Vec<T>> {
    let (input, n) = le_u16(input)?;
    count(record, n as usize)(input)
}

fn build_map(input: &[u8]) -> IResult<&[u8], BuildMap> {
    let (input, header) = header(input)?;
    let (input, sectors) = counted(input, sector)?;
    let (input, walls) = counted(input, wall)?;
    let (input, sprites) = counted(input, sprite)?;
    Ok((
        input,
        BuildMap {
            header,
            sectors,
            walls,
            sprites,
        },
    ))
}

/// Parses a MAP file. Only version 7 is accepted.
pub fn parse_map(buf: &[u8]) -> Result<BuildMap> {
    let (_, version) = le_i32::<_, nom::error::Error<&[u8]>>(buf)
        .map_err(|_| Error::Truncated("Build map header"))?;
    if version != MAP_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let (rest, map) = build_map(buf).map_err(|_| Error::Truncated("Build map records"))?;
    if !rest.is_empty() {
        tracing::warn!(bytes = rest.len(), "ignoring trailing data after Build map");
    }
    Ok(map)
}

impl Header {
    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_i32::<LittleEndian>(self.version)?;
        w.write_i32::<LittleEndian>(self.pos_x)?;
        w.write_i32::<LittleEndian>(self.pos_y)?;
        w.write_i32::<LittleEndian>(self.pos_z)?;
        w.write_i16::<LittleEndian>(self.angle)?;
        w.write_i16::<LittleEndian>(self.sector)?;
        Ok(())
    }
}

impl Sector {
    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_i16::<LittleEndian>(self.wallptr)?;
        w.write_i16::<LittleEndian>(self.wallnum)?;
        w.write_i32::<LittleEndian>(self.ceilingz)?;
        w.write_i32::<LittleEndian>(self.floorz)?;
        w.write_i16::<LittleEndian>(self.ceilingstat)?;
        w.write_i16::<LittleEndian>(self.floorstat)?;
        w.write_i16::<LittleEndian>(self.ceilingpicnum)?;
        w.write_i16::<LittleEndian>(self.ceilingheinum)?;
        w.write_i8(self.ceilingshade)?;
        w.write_u8(self.ceilingpal)?;
        w.write_u8(self.ceilingxpanning)?;
        w.write_u8(self.ceilingypanning)?;
        w.write_i16::<LittleEndian>(self.floorpicnum)?;
        w.write_i16::<LittleEndian>(self.floorheinum)?;
        w.write_i8(self.floorshade)?;
        w.write_u8(self.floorpal)?;
        w.write_u8(self.floorxpanning)?;
        w.write_u8(self.floorypanning)?;
        w.write_u8(self.visibility)?;
        w.write_u8(self.filler)?;
        w.write_i16::<LittleEndian>(self.lotag)?;
        w.write_i16::<LittleEndian>(self.hitag)?;
        w.write_i16::<LittleEndian>(self.extra)?;
        Ok(())
    }
}

impl Wall {
    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_i32::<LittleEndian>(self.x)?;
        w.write_i32::<LittleEndian>(self.y)?;
        w.write_i16::<LittleEndian>(self.point2)?;
        w.write_i16::<LittleEndian>(self.nextwall)?;
        w.write_i16::<LittleEndian>(self.nextsector)?;
        w.write_i16::<LittleEndian>(self.cstat)?;
        w.write_i16::<LittleEndian>(self.picnum)?;
        w.write_i16::<LittleEndian>(self.overpicnum)?;
        w.write_i8(self.shade)?;
        w.write_u8(self.pal)?;
        w.write_u8(self.xrepeat)?;
        w.write_u8(self.yrepeat)?;
        w.write_u8(self.xpanning)?;
        w.write_u8(self.ypanning)?;
        w.write_i16::<LittleEndian>(self.lotag)?;
        w.write_i16::<LittleEndian>(self.hitag)?;
        w.write_i16::<LittleEndian>(self.extra)?;
        Ok(())
    }
}

impl Sprite {
    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_i32::<LittleEndian>(self.x)?;
        w.write_i32::<LittleEndian>(self.y)?;
        w.write_i32::<LittleEndian>(self.z)?;
        w.write_i16::<LittleEndian>(self.cstat)?;
        w.write_i16::<LittleEndian>(self.picnum)?;
        w.write_i8(self.shade)?;
        w.write_u8(self.pal)?;
        w.write_u8(self.clipdist)?;
        w.write_u8(self.filler)?;
        w.write_u8(self.xrepeat)?;
        w.write_u8(self.yrepeat)?;
        w.write_i8(self.xoffset)?;
        w.write_i8(self.yoffset)?;
        w.write_i16::<LittleEndian>(self.sectnum)?;
        w.write_i16::<LittleEndian>(self.statnum)?;
        w.write_i16::<LittleEndian>(self.ang)?;
        w.write_i16::<LittleEndian>(self.owner)?;
        w.write_i16::<LittleEndian>(self.xvel)?;
        w.write_i16::<LittleEndian>(self.yvel)?;
        w.write_i16::<LittleEndian>(self.zvel)?;
        w.write_i16::<LittleEndian>(self.lotag)?;
        w.write_i16::<LittleEndian>(self.hitag)?;
        w.write_i16::<LittleEndian>(self.extra)?;
        Ok(())
    }

    /// Field values in file order.
    pub fn fields(&self) -> [i64; 23] {
        [
            self.x as i64,
            self.y as i64,
            self.z as i64,
            self.cstat as i64,
            self.picnum as i64,
            self.shade as i64,
            self.pal as i64,
            self.clipdist as i64,
            self.filler as i64,
            self.xrepeat as i64,
            self.yrepeat as i64,
            self.xoffset as i64,
            self.yoffset as i64,
            self.sectnum as i64,
            self.statnum as i64,
            self.ang as i64,
            self.owner as i64,
            self.xvel as i64,
            self.yvel as i64,
            self.zvel as i64,
            self.lotag as i64,
            self.hitag as i64,
            self.extra as i64,
        ]
    }

    /// Inverse of [`fields`](Self::fields). Fails with
    /// [`Error::Overflow`] when a value does not fit its field.
    pub fn from_fields(f: &[i64; 23]) -> Result<Self> {
        Ok(Self {
            x: narrow(f[0], "sprite x")?,
            y: narrow(f[1], "sprite y")?,
            z: narrow(f[2], "sprite z")?,
            cstat: narrow(f[3], "sprite cstat")?,
            picnum: narrow(f[4], "sprite picnum")?,
            shade: narrow(f[5], "sprite shade")?,
            pal: narrow(f[6], "sprite pal")?,
            clipdist: narrow(f[7], "sprite clipdist")?,
            filler: narrow(f[8], "sprite filler")?,
            xrepeat: narrow(f[9], "sprite xrepeat")?,
            yrepeat: narrow(f[10], "sprite yrepeat")?,
            xoffset: narrow(f[11], "sprite xoffset")?,
            yoffset: narrow(f[12], "sprite yoffset")?,
            sectnum: narrow(f[13], "sprite sectnum")?,
            statnum: narrow(f[14], "sprite statnum")?,
            ang: narrow(f[15], "sprite ang")?,
            owner: narrow(f[16], "sprite owner")?,
            xvel: narrow(f[17], "sprite xvel")?,
            yvel: narrow(f[18], "sprite yvel")?,
            zvel: narrow(f[19], "sprite zvel")?,
            lotag: narrow(f[20], "sprite lotag")?,
            hitag: narrow(f[21], "sprite hitag")?,
            extra: narrow(f[22], "sprite extra")?,
        })
    }
}

impl BuildMap {
    /// Serializes the whole file.
    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        self.header.write_to(w)?;
        w.write_u16::<LittleEndian>(self.sectors.len() as u16)?;
        for s in &self.sectors {
            s.write_to(w)?;
        }
        w.write_u16::<LittleEndian>(self.walls.len() as u16)?;
        for wall in &self.walls {
            wall.write_to(w)?;
        }
        w.write_u16::<LittleEndian>(self.sprites.len() as u16)?;
        for s in &self.sprites {
            s.write_to(w)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            HEADER_SIZE
                + 6
                + self.sectors.len() * SECTOR_SIZE
                + self.walls.len() * WALL_SIZE
                + self.sprites.len() * SPRITE_SIZE,
        );
        self.write_to(&mut out)
            .expect("writing into a Vec cannot fail");
        out
    }
}
