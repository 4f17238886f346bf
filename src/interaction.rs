//! Operator interaction surface.
//!
//! Primary clicks accumulate pending polygon points; secondary clicks remove the
//! first slot under the cursor. Pending points are not persisted and only `undo`
//! edits them. Committing needs at least three pending points.

use anyhow::{anyhow, Result};
use std::str::FromStr;

use crate::geometry::Point;
use crate::monitor::MonitorSession;
use crate::slots::Slot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
}

/// What a click did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    PointAdded { pending: usize },
    SlotRemoved { slot: Slot },
    NothingRemoved,
}

pub struct Operator {
    session: MonitorSession,
    pending: Vec<Point>,
}

impl Operator {
    pub fn new(session: MonitorSession) -> Self {
        Self {
            session,
            pending: Vec::new(),
        }
    }

    pub fn session(&self) -> &MonitorSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut MonitorSession {
        &mut self.session
    }

    pub fn pending_points(&self) -> &[Point] {
        &self.pending
    }

    pub fn click(&mut self, point: Point, button: MouseButton) -> Result<ClickOutcome> {
        match button {
            MouseButton::Primary => {
                self.pending.push(point);
                Ok(ClickOutcome::PointAdded {
                    pending: self.pending.len(),
                })
            }
            MouseButton::Secondary => match self.session.layout()?.remove_slot_at(point)? {
                Some(slot) => Ok(ClickOutcome::SlotRemoved { slot }),
                None => Ok(ClickOutcome::NothingRemoved),
            },
        }
    }

    /// Commits pending points as a new slot of the active source.
    ///
    /// With fewer than three points nothing happens and the points stay pending.
    pub fn commit_slot(&mut self) -> Result<Option<usize>> {
        let added = self.session.layout()?.add_slot(&self.pending)?;
        if added.is_some() {
            self.pending.clear();
        }
        Ok(added)
    }

    pub fn undo_last_point(&mut self) -> Option<Point> {
        self.pending.pop()
    }

    /// Runs the stop / swap / restart sequence for `source_id`.
    pub fn change_source(&mut self, source_id: &str) -> Result<()> {
        self.session.change_source(source_id)
    }

    /// Stops the frame loop.
    pub fn shutdown(mut self) -> Result<()> {
        self.session.stop()?;
        Ok(())
    }
}

/// Line-oriented operator commands, as read by the daemon's console.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Click(Point, MouseButton),
    Commit,
    Undo,
    Source(String),
    NextSource,
    Status,
    List,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| anyhow!("empty command"))?
            .to_lowercase();
        let args: Vec<&str> = parts.collect();
        let point = |args: &[&str]| -> Result<Point> {
            match args {
                [x, y] => Ok(Point::new(
                    x.parse().map_err(|_| anyhow!("invalid x coordinate '{}'", x))?,
                    y.parse().map_err(|_| anyhow!("invalid y coordinate '{}'", y))?,
                )),
                _ => Err(anyhow!("expected two coordinates: {} X Y", verb)),
            }
        };
        let no_args = |cmd: Command| -> Result<Command> {
            if args.is_empty() {
                Ok(cmd)
            } else {
                Err(anyhow!("'{}' takes no arguments", verb))
            }
        };

        match verb.as_str() {
            "point" | "click" => Ok(Command::Click(
                point(args.as_slice())?,
                MouseButton::Primary,
            )),
            "remove" | "rclick" => Ok(Command::Click(
                point(args.as_slice())?,
                MouseButton::Secondary,
            )),
            "commit" | "add" => no_args(Command::Commit),
            "undo" => no_args(Command::Undo),
            "source" => match args.as_slice() {
                [id] => Ok(Command::Source(id.to_string())),
                _ => Err(anyhow!("expected: source ID")),
            },
            "next" => no_args(Command::NextSource),
            "status" => no_args(Command::Status),
            "list" => no_args(Command::List),
            "quit" | "exit" => no_args(Command::Quit),
            other => Err(anyhow!("unknown command '{}'", other)),
        }
    }
}
