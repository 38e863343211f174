//! regions - inspect and author region-of-interest files.
//!
//! `draw` reads editor commands from stdin, one per line:
//!
//! ```text
//! add 120 340     # append a vertex
//! undo            # drop the last pending vertex
//! close           # close the pending polygon (kept with >= 3 vertices)
//! save            # close any pending polygon, write the file, exit
//! cancel          # exit without writing
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;

use roi_congestion::regions::{authoring_scale, DrawingEvent, SessionState, DEFAULT_REGIONS_PATH};
use roi_congestion::{DrawingSession, Point, RegionStore};

#[derive(Parser, Debug)]
#[command(name = "regions", about = "Inspect and author region-of-interest files")]
struct Args {
    /// Region file
    #[arg(long, global = true, default_value = DEFAULT_REGIONS_PATH, value_name = "PATH")]
    regions: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the regions stored in the file
    Show,
    /// Append polygons given as "x,y x,y x,y ..."
    Add {
        #[arg(long = "polygon", value_name = "POINTS", required = true)]
        polygons: Vec<String>,
        /// Native frame size (WxH) the points refer to; sets the authoring scale
        #[arg(long, value_name = "WxH")]
        frame_size: Option<String>,
        /// Start from an empty set instead of the existing file
        #[arg(long)]
        replace: bool,
    },
    /// Author regions from editor commands on stdin
    Draw {
        #[arg(long, value_name = "WxH")]
        frame_size: Option<String>,
        #[arg(long)]
        replace: bool,
    },
    /// Print the authoring scale for a native frame size
    Scale {
        #[arg(value_name = "WxH")]
        frame_size: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let store = RegionStore::new(&args.regions);

    match args.command {
        Command::Show => show(&store),
        Command::Add {
            polygons,
            frame_size,
            replace,
        } => {
            let mut session = open_session(&store, frame_size.as_deref(), replace)?;
            for raw in &polygons {
                for point in parse_points(raw)? {
                    session.add_point(point)?;
                }
                if session.close_polygon()?.is_none() {
                    return Err(anyhow!("polygon '{}' needs at least 3 points", raw));
                }
            }
            let set = session.save(&store)?;
            println!("{}: {} region(s)", store.path().display(), set.len());
            Ok(())
        }
        Command::Draw {
            frame_size,
            replace,
        } => {
            let mut session = open_session(&store, frame_size.as_deref(), replace)?;
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = line.context("reading editor commands")?;
                let Some(event) = parse_event(&line)? else {
                    continue;
                };
                match session.handle(event, &store)? {
                    SessionState::Drawing => {}
                    SessionState::Saved => {
                        println!(
                            "{}: {} region(s)",
                            store.path().display(),
                            session.polygons().len()
                        );
                        return Ok(());
                    }
                    SessionState::Cancelled => {
                        println!("cancelled; {} unchanged", store.path().display());
                        return Ok(());
                    }
                }
            }
            Err(anyhow!("input ended before save or cancel"))
        }
        Command::Scale { frame_size } => {
            let (width, height) = parse_size(&frame_size)?;
            println!("{}", authoring_scale(width, height));
            Ok(())
        }
    }
}

fn show(store: &RegionStore) -> Result<()> {
    let set = store.load()?;
    println!(
        "{}: {} region(s), scale={}",
        store.path().display(),
        set.len(),
        set.scale()
    );
    for (id, polygon) in set.iter() {
        let points: Vec<String> = polygon
            .vertices()
            .iter()
            .map(|p| format!("{},{}", p.x, p.y))
            .collect();
        println!("  #{} ({} points): {}", id, polygon.len(), points.join(" "));
    }
    Ok(())
}

fn open_session(store: &RegionStore, frame_size: Option<&str>, replace: bool) -> Result<DrawingSession> {
    let scale = match frame_size {
        Some(size) => {
            let (width, height) = parse_size(size)?;
            Some(authoring_scale(width, height))
        }
        None => None,
    };

    if !replace && store.exists() {
        let existing = store.load()?;
        if let Some(scale) = scale {
            if (existing.scale() - scale).abs() > f64::EPSILON {
                return Err(anyhow!(
                    "{} was authored at scale {}, frame size gives {}; use --replace",
                    store.path().display(),
                    existing.scale(),
                    scale
                ));
            }
        }
        return Ok(DrawingSession::from_region_set(existing));
    }
    DrawingSession::new(scale.unwrap_or(1.0))
}

fn parse_points(raw: &str) -> Result<Vec<Point>> {
    raw.split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| anyhow!("point '{}' must be x,y", pair))?;
            Ok(Point::new(parse_coord(x)?, parse_coord(y)?))
        })
        .collect()
}

fn parse_event(line: &str) -> Result<Option<DrawingEvent>> {
    let line = line.split('#').next().unwrap_or("").trim();
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };
    let event = match command {
        "add" => {
            let x = parts.next().ok_or_else(|| anyhow!("add needs x and y"))?;
            let y = parts.next().ok_or_else(|| anyhow!("add needs x and y"))?;
            DrawingEvent::AddPoint(Point::new(parse_coord(x)?, parse_coord(y)?))
        }
        "undo" => DrawingEvent::Undo,
        "close" => DrawingEvent::ClosePolygon,
        "save" => DrawingEvent::Save,
        "cancel" => DrawingEvent::Cancel,
        other => return Err(anyhow!("unknown command '{}'", other)),
    };
    Ok(Some(event))
}

fn parse_coord(raw: &str) -> Result<i32> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("'{}' is not an integer coordinate", raw))
}

fn parse_size(raw: &str) -> Result<(u32, u32)> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("frame size '{}' must be WxH", raw))?;
    let width: u32 = w.parse().map_err(|_| anyhow!("invalid width '{}'", w))?;
    let height: u32 = h.parse().map_err(|_| anyhow!("invalid height '{}'", h))?;
    if width == 0 || height == 0 {
        return Err(anyhow!("frame size must be non-zero"));
    }
    Ok((width, height))
}
