//! slot_tool - inspect and edit persisted slot layouts offline

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use parking_monitor::config::{StoreBackend, StoreSettings};
use parking_monitor::{open_store, Point, Slot, SlotLayout};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Slot store directory.
    #[arg(long, env = "PARKING_STORE_ROOT", default_value = "object")]
    store_root: PathBuf,
    /// Store backend (file|sqlite).
    #[arg(long, env = "PARKING_STORE_BACKEND", default_value = "file")]
    backend: String,
    /// Video source id.
    #[arg(long, default_value = "1")]
    source: String,
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand, Debug)]
enum ToolCommand {
    /// Print every slot with its centroid.
    List,
    /// Add a slot from "x,y" points (at least 3).
    Add {
        #[arg(required = true)]
        points: Vec<String>,
    },
    /// Remove the first slot containing a point.
    Remove { x: i32, y: i32 },
    /// Remove every slot of the source.
    Clear,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let store = open_store(&StoreSettings {
        root: args.store_root,
        backend: args.backend.parse::<StoreBackend>()?,
    })?;
    let mut layout = SlotLayout::open(store, &args.source)?;

    match args.command {
        ToolCommand::List => {
            for (index, slot) in layout.slots().iter().enumerate() {
                let c = slot.centroid();
                println!(
                    "{}\tcentroid=({}, {})\tpoints={}",
                    Slot::label(index),
                    c.x,
                    c.y,
                    serde_json::to_string(slot)?
                );
            }
            println!("{} slot(s) for source {}", layout.slots().len(), args.source);
        }
        ToolCommand::Add { points } => {
            let points = points
                .iter()
                .map(|raw| parse_point(raw))
                .collect::<Result<Vec<_>>>()?;
            match layout.add_slot(&points)? {
                Some(index) => println!("{} added to source {}", Slot::label(index), args.source),
                None => return Err(anyhow!("a slot needs at least 3 points, got {}", points.len())),
            }
        }
        ToolCommand::Remove { x, y } => match layout.remove_slot_at(Point::new(x, y))? {
            Some(slot) => println!(
                "removed slot centred at ({}, {})",
                slot.centroid().x,
                slot.centroid().y
            ),
            None => println!("no slot contains ({}, {})", x, y),
        },
        ToolCommand::Clear => {
            let removed = layout.clear()?;
            println!("removed {} slot(s) from source {}", removed, args.source);
        }
    }
    Ok(())
}

fn parse_point(raw: &str) -> Result<Point> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("point '{}' must be formatted as x,y", raw))?;
    let x = x
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid x coordinate in '{}'", raw))?;
    let y = y
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid y coordinate in '{}'", raw))?;
    Ok(Point::new(x, y))
}
