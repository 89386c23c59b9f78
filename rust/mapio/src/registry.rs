// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static table of map formats, and whole-file load/save on top of it.

use std::fs;
use std::path::{Path, PathBuf};

use retromap_graph::PlanarMap;
use tracing::{debug, info};

use crate::config::CodecOptions;
use crate::error::{Error, Result};
use crate::{build, doom};

pub type Reader = fn(&[u8], &CodecOptions) -> Result<PlanarMap>;
pub type Writer = fn(&PlanarMap, &CodecOptions) -> Result<Vec<u8>>;

/// One registered format. A missing reader or writer means the format is
/// write-only or read-only.
pub struct FormatEntry {
    pub tag: &'static str,
    pub extensions: &'static [&'static str],
    pub description: &'static str,
    pub reader: Option<Reader>,
    pub writer: Option<Writer>,
}

impl std::fmt::Debug for FormatEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatEntry")
            .field("tag", &self.tag)
            .field("extensions", &self.extensions)
            .field("readable", &self.reader.is_some())
            .field("writable", &self.writer.is_some())
            .finish()
    }
}

fn read_json(bytes: &[u8], _: &CodecOptions) -> Result<PlanarMap> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::malformed("JSON map", e.to_string()))?;
    Ok(PlanarMap::from_json(text)?)
}

fn write_json(map: &PlanarMap, _: &CodecOptions) -> Result<Vec<u8>> {
    Ok(map.to_json()?.into_bytes())
}

fn write_gexf(map: &PlanarMap, _: &CodecOptions) -> Result<Vec<u8>> {
    Ok(map.to_gexf()?.into_bytes())
}

fn write_build(map: &PlanarMap, _: &CodecOptions) -> Result<Vec<u8>> {
    build::export(map)
}

pub static FORMATS: &[FormatEntry] = &[
    FormatEntry {
        tag: "json",
        extensions: &["json"],
        description: "native JSON document",
        reader: Some(read_json),
        writer: Some(write_json),
    },
    FormatEntry {
        tag: "build",
        extensions: &["map"],
        description: "Build engine MAP, version 7",
        reader: Some(build::import),
        writer: Some(write_build),
    },
    FormatEntry {
        tag: "doom",
        extensions: &["wad"],
        description: "Doom WAD, vanilla binary map lumps",
        reader: Some(doom::import),
        writer: Some(doom::export),
    },
    FormatEntry {
        tag: "gexf",
        extensions: &["gexf"],
        description: "GEXF 1.2 graph (export only)",
        reader: None,
        writer: Some(write_gexf),
    },
];

/// Looks a format up by tag.
pub fn by_tag(tag: &str) -> Result<&'static FormatEntry> {
    let tag = tag.to_ascii_lowercase();
    FORMATS
        .iter()
        .find(|f| f.tag == tag)
        .ok_or(Error::UnknownFormat(tag))
}

/// Looks a format up by the file extension of `path`.
pub fn by_path(path: &Path) -> Result<&'static FormatEntry> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| Error::UnknownFormat(path.display().to_string()))?;
    FORMATS
        .iter()
        .find(|f| f.extensions.contains(&ext.as_str()))
        .ok_or(Error::UnknownFormat(ext))
}

fn resolve(path: &Path, tag: Option<&str>) -> Result<&'static FormatEntry> {
    match tag {
        Some(t) => by_tag(t),
        None => by_path(path),
    }
}

/// Decodes `bytes` with the format named `tag`.
pub fn decode(bytes: &[u8], tag: &str, options: &CodecOptions) -> Result<PlanarMap> {
    let format = by_tag(tag)?;
    let reader = format.reader.ok_or(Error::Unsupported {
        format: format.tag,
        direction: "read",
    })?;
    reader(bytes, options)
}

/// Encodes `map` with the format named `tag`.
pub fn encode(map: &PlanarMap, tag: &str, options: &CodecOptions) -> Result<Vec<u8>> {
    let format = by_tag(tag)?;
    let writer = format.writer.ok_or(Error::Unsupported {
        format: format.tag,
        direction: "written",
    })?;
    writer(map, options)
}

/// Reads a map file. The format is `tag` if given, otherwise guessed from
/// the file extension.
pub fn load_with(path: &Path, tag: Option<&str>, options: &CodecOptions) -> Result<PlanarMap> {
    let format = resolve(path, tag)?;
    let bytes = fs::read(path)?;
    debug!(path = %path.display(), format = format.tag, bytes = bytes.len(), "loading map");
    decode(&bytes, format.tag, options)
}

/// Writes a map file. The map is encoded fully in memory, written to a
/// sibling temporary file and renamed over `path`, so a failed save never
/// leaves a partial file behind.
pub fn save_with(
    map: &PlanarMap,
    path: &Path,
    tag: Option<&str>,
    options: &CodecOptions,
) -> Result<()> {
    let format = resolve(path, tag)?;
    let bytes = encode(map, format.tag, options)?;

    let temp = temp_path(path);
    if let Err(e) = fs::write(&temp, &bytes) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    info!(path = %path.display(), format = format.tag, bytes = bytes.len(), "saved map");
    Ok(())
}

pub fn load(path: &Path) -> Result<PlanarMap> {
    load_with(path, None, &CodecOptions::from_env())
}

pub fn save(map: &PlanarMap, path: &Path) -> Result<()> {
    save_with(map, path, None, &CodecOptions::from_env())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_tag_and_extension() {
        assert_eq!(by_tag("BUILD").unwrap().tag, "build");
        assert_eq!(by_path(Path::new("maps/E1L1.MAP")).unwrap().tag, "build");
        assert_eq!(by_path(Path::new("doom2.wad")).unwrap().tag, "doom");
        assert!(matches!(by_tag("marathon"), Err(Error::UnknownFormat(_))));
        assert!(matches!(
            by_path(Path::new("level.sceA")),
            Err(Error::UnknownFormat(_))
        ));
        assert!(by_path(Path::new("noextension")).is_err());
    }

    #[test]
    fn gexf_is_write_only() {
        let map = PlanarMap::new();
        assert!(encode(&map, "gexf", &CodecOptions::default()).is_ok());
        assert!(matches!(
            decode(b"<gexf/>", "gexf", &CodecOptions::default()),
            Err(Error::Unsupported { format: "gexf", .. })
        ));
    }

    #[test]
    fn temp_file_is_a_sibling() {
        let temp = temp_path(Path::new("/maps/out.map"));
        assert_eq!(temp.parent(), Some(Path::new("/maps")));
        assert!(temp
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(".out.map."));
    }
}
