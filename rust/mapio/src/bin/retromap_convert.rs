// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: convert a level between map formats.
//!
//! Usage:
//!   retromap-convert <input> <output> [options]

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use retromap_graph::PlanarMap;
use retromap_mapio::{load_with, save_with, CodecOptions, FORMATS};

struct Args {
    input: PathBuf,
    output: PathBuf,
    from: Option<String>,
    to: Option<String>,
    options: CodecOptions,
    stats: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<Args>> {
    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(None);
    }

    let mut positional = Vec::new();
    let mut from = None;
    let mut to = None;
    let mut options = CodecOptions::from_env();
    let mut stats = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--from" => {
                i += 1;
                from = Some(args.get(i).context("--from needs a format tag")?.clone());
            }
            "--to" => {
                i += 1;
                to = Some(args.get(i).context("--to needs a format tag")?.clone());
            }
            "--doom-map" => {
                i += 1;
                options.doom_map = Some(args.get(i).context("--doom-map needs a map name")?.clone());
            }
            "--holes" => {
                options.import_sector_holes = true;
            }
            "--stats" => {
                stats = true;
            }
            other if other.starts_with("--") => bail!("unknown option: {}", other),
            other => positional.push(PathBuf::from(other)),
        }
        i += 1;
    }

    let [input, output] = <[PathBuf; 2]>::try_from(positional)
        .map_err(|p| anyhow::anyhow!("expected <input> <output>, got {} path(s)", p.len()))?;
    Ok(Some(Args {
        input,
        output,
        from,
        to,
        options,
        stats,
    }))
}

fn print_stats(map: &PlanarMap) {
    println!("  nodes:      {}", map.node_count());
    println!("  half-edges: {}", map.half_edge_count());
    println!("  edges:      {}", map.edge_count());
    println!("  faces:      {}", map.face_count());
    println!("  portals:    {}", map.portals().len());
    println!("  open sides: {}", map.open_half_edges().len());
}

fn print_usage() {
    println!(
        r#"RetroMap converter

Converts a level between map formats.

USAGE:
  retromap-convert <input> <output> [OPTIONS]

OPTIONS:
  --from <tag>        Input format (default: from the input extension)
  --to <tag>          Output format (default: from the output extension)
  --holes             Import extra Build wall loops as sector holes
  --doom-map <name>   Doom map to read or write (E1M1, MAP01, ...)
  --stats             Print element counts of the loaded map
  -h, --help          Show this help message

FORMATS:"#
    );
    for format in FORMATS {
        let mode = match (format.reader.is_some(), format.writer.is_some()) {
            (true, true) => "read/write",
            (true, false) => "read only",
            _ => "write only",
        };
        println!(
            "  {:<8} .{:<6} {} ({})",
            format.tag,
            format.extensions.join(", ."),
            format.description,
            mode
        );
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let argv: Vec<String> = env::args().skip(1).collect();
    let Some(args) = parse_args(&argv)? else {
        print_usage();
        return Ok(());
    };

    let map = load_with(&args.input, args.from.as_deref(), &args.options)
        .with_context(|| format!("cannot read {}", args.input.display()))?;
    if args.stats {
        println!("{}:", args.input.display());
        print_stats(&map);
    }

    save_with(&map, &args.output, args.to.as_deref(), &args.options)
        .with_context(|| format!("cannot write {}", args.output.display()))?;
    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        "conversion finished"
    );
    Ok(())
}
