//! WIFF CLI

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use wiff::{AnnotationQuery, Recording};

fn usage() -> ! {
    eprintln!("WIFF v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: wiff <command> <file>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  info        Print recording, channel, file, segment and annotation reports");
    eprintln!("  dumpdata    Print every frame as CSV");
    eprintln!();
    eprintln!("Set RUST_LOG=debug for chunk-level logging.");
    process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let path = PathBuf::from(&args[2]);
    let result = match args[1].as_str() {
        "info" => show_info(&path),
        "dumpdata" => dump_data(&path),
        command => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'wiff' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn open(path: &Path) -> Result<Recording> {
    Recording::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn show_info(path: &Path) -> Result<()> {
    let rec = open(path)?;

    println!("Recording: {}", path.display());
    println!("  Start:       {}", rec.start()?);
    println!("  End:         {}", rec.end()?);
    println!("  Description: {}", rec.description()?);
    println!("  Sampling:    {} Hz", rec.fs()?);
    println!("  Frames:      {}", rec.num_frames()?);
    println!("  Annotations: {}", rec.num_annotations()?);
    println!("  Metas:       {}", rec.num_metas()?);
    println!();

    println!("Channels ({}):", rec.num_channels()?);
    for c in rec.channels()? {
        println!(
            "  {:>3}  {:<12} {:>2} bits  {:<8} {}",
            c.index, c.name, c.bits, c.unit, c.comment
        );
    }
    println!();

    println!("Files ({}):", rec.num_files()?);
    for (entry, backing) in rec.files()?.iter().zip(rec.backing_files()) {
        println!(
            "  {:>3}  {:<24} frames [{}, {})  annotations [{}, {})",
            entry.index,
            entry.name,
            entry.fidx_start,
            entry.fidx_end,
            entry.aidx_start,
            entry.aidx_end
        );
        for chunk in backing.chunks().chunks() {
            println!(
                "         {} @ {:#010x}  {:>8} bytes  attrs {}",
                chunk.tag,
                chunk.offset,
                chunk.size,
                hex::encode(chunk.attributes)
            );
        }
    }
    println!();

    let segments = rec.segments()?;
    println!("Segments ({}):", segments.len());
    for s in &segments {
        let channels: Vec<String> = s.channels.iter().map(|c| c.to_string()).collect();
        println!(
            "  id {:>4}  file {}  frames [{}, {})  compression {:?}  channels {}",
            s.segment_id,
            s.file,
            s.fidx_start,
            s.fidx_end,
            s.compression,
            channels.join(",")
        );
    }
    println!();

    let blocks = rec.annotation_blocks()?;
    println!("Annotation blocks ({}):", blocks.len());
    for b in &blocks {
        let bounds = b
            .bounds
            .as_ref()
            .map_or_else(|| "-".to_string(), |r| format!("[{}, {}]", r.start(), r.end()));
        println!(
            "  file {}  annotations [{}, {})  frames {}",
            b.file, b.aidx_start, b.aidx_end, bounds
        );
    }
    for (aidx, a) in rec.annotations(&AnnotationQuery::all())? {
        let frames = a.frames();
        let detail = match &a {
            wiff::Annotation::Comment { text, .. } => text.clone(),
            wiff::Annotation::Marker { code, .. } => code.to_string(),
            wiff::Annotation::MarkerWithValue { code, value, .. } => format!("{code} = {value}"),
        };
        println!(
            "  {:>6}  {}  [{}, {}]  {}",
            aidx,
            a.kind(),
            frames.start(),
            frames.end(),
            detail
        );
    }

    let metas = rec.metas()?;
    if !metas.is_empty() {
        println!();
        println!("Metadata ({}):", metas.len());
        for m in metas {
            println!("  {} {}  {} = {}", m.level, m.level_index, m.key, m.value);
        }
    }

    Ok(())
}

fn dump_data(path: &Path) -> Result<()> {
    let rec = open(path)?;
    let channels = rec.channels()?;

    let header: Vec<&str> = channels.iter().map(|c| c.name.as_str()).collect();
    println!("frame,{}", header.join(","));

    for frame in rec.frames(0..rec.num_frames()?)? {
        let frame = frame?;
        let cells: Vec<String> = channels
            .iter()
            .map(|c| frame.sample(c.index).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        println!("{},{}", frame.index, cells.join(","));
    }

    Ok(())
}
