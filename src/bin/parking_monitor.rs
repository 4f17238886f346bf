//! parking_monitor - slot occupancy daemon
//!
//! This daemon:
//! 1. Loads the slot layout of the initial video source
//! 2. Runs the frame-processing loop (frames -> detections -> occupancy)
//! 3. Prints the total/free summary whenever it changes
//! 4. Reads operator commands from stdin (unless --headless)
//! 5. Stops the loop and releases the video source on quit or Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};

use parking_monitor::{
    build_session, ClickOutcome, Command, Frame, MonitorConfig, OccupancySink, OccupancySnapshot,
    OccupancyUpdate, Operator, Slot,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "PARKING_CONFIG")]
    config: Option<PathBuf>,
    /// Initial video source id (overrides config).
    #[arg(long)]
    source: Option<String>,
    /// Media directory or stub:// root (overrides config).
    #[arg(long)]
    media_root: Option<String>,
    /// Slot store directory (overrides config).
    #[arg(long)]
    store_root: Option<PathBuf>,
    /// Do not read operator commands from stdin; run until Ctrl-C.
    #[arg(long)]
    headless: bool,
}

enum Event {
    Update(OccupancyUpdate),
    Line(String),
    InputClosed,
    Interrupt,
}

struct ConsoleSink {
    tx: Sender<Event>,
}

impl OccupancySink for ConsoleSink {
    fn publish(&mut self, source_id: &str, frame: &Frame, snapshot: &OccupancySnapshot) {
        let _ = self.tx.send(Event::Update(OccupancyUpdate {
            source_id: source_id.to_string(),
            frame_sequence: frame.sequence,
            snapshot: snapshot.clone(),
        }));
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Some(path) = &args.config {
        std::env::set_var("PARKING_CONFIG", path);
    }
    let mut cfg = MonitorConfig::load()?;
    if let Some(source) = args.source {
        parking_monitor::validate_source_id(&source)?;
        if !cfg.media.sources.contains(&source) {
            cfg.media.sources.push(source.clone());
        }
        cfg.media.initial_source = source;
    }
    if let Some(root) = args.media_root {
        cfg.media.root = root;
    }
    if let Some(root) = args.store_root {
        cfg.store.root = root;
    }

    let (tx, rx) = mpsc::channel();
    let sink = Arc::new(Mutex::new(ConsoleSink { tx: tx.clone() }));
    let session = build_session(&cfg, sink)?;
    let mut operator = Operator::new(session);

    let interrupt_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(Event::Interrupt);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    if !args.headless {
        let input_tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if input_tx.send(Event::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = input_tx.send(Event::InputClosed);
        });
    }
    drop(tx);

    if let Err(e) = operator.session_mut().start() {
        log::error!("{:#}", e);
    }
    log::info!(
        "parking_monitor running. sources={:?} store={}",
        cfg.media.sources,
        cfg.store.root.display()
    );

    let mut last_counts: Option<(String, usize, usize)> = None;
    while let Ok(event) = rx.recv() {
        match event {
            Event::Update(update) => {
                let counts = (
                    update.source_id.clone(),
                    update.snapshot.total,
                    update.snapshot.free,
                );
                if last_counts.as_ref() != Some(&counts) {
                    println!("[{}] {}", update.source_id, update.snapshot.summary());
                    last_counts = Some(counts);
                }
            }
            Event::Line(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = handle_command(&mut operator, &cfg, command) {
                            log::error!("{:#}", e);
                        }
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            Event::InputClosed => {
                log::info!("stdin closed; running until Ctrl-C");
            }
            Event::Interrupt => {
                log::info!("shutdown signal received");
                break;
            }
        }
    }

    operator.shutdown()?;
    log::info!("parking_monitor stopped");
    Ok(())
}

fn handle_command(operator: &mut Operator, cfg: &MonitorConfig, command: Command) -> Result<()> {
    match command {
        Command::Click(point, button) => match operator.click(point, button)? {
            ClickOutcome::PointAdded { pending } => {
                println!("point ({}, {}) added, {} pending", point.x, point.y, pending)
            }
            ClickOutcome::SlotRemoved { slot } => {
                println!("removed slot centred at ({}, {})", slot.centroid().x, slot.centroid().y)
            }
            ClickOutcome::NothingRemoved => println!("no slot at ({}, {})", point.x, point.y),
        },
        Command::Commit => match operator.commit_slot()? {
            Some(index) => println!("{} added", Slot::label(index)),
            None => println!(
                "need at least 3 points to add a slot ({} pending)",
                operator.pending_points().len()
            ),
        },
        Command::Undo => match operator.undo_last_point() {
            Some(p) => println!("removed pending point ({}, {})", p.x, p.y),
            None => println!("no pending points"),
        },
        Command::Source(id) => {
            operator.change_source(&id)?;
            println!("switched to source {}", id);
        }
        Command::NextSource => {
            let current = operator.session().source_id()?;
            let next = cfg.next_source(&current).to_string();
            operator.change_source(&next)?;
            println!("switched to source {}", next);
        }
        Command::Status => {
            let session = operator.session();
            let layout = session.layout()?;
            println!(
                "source={} slots={} running={} pending={}",
                layout.source_id(),
                layout.slots().len(),
                session.is_running(),
                operator.pending_points().len()
            );
        }
        Command::List => {
            let layout = operator.session().layout()?;
            for (index, slot) in layout.slots().iter().enumerate() {
                let c = slot.centroid();
                println!("{} centroid=({}, {}) points={:?}", Slot::label(index), c.x, c.y, slot.points());
            }
        }
        Command::Quit => {}
    }
    Ok(())
}
