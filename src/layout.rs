//! The active slot layout: one source id, its live slot collection, and the store.
//!
//! Mutations persist eagerly, so switching sources never needs an implicit save.
//! If a save fails, the in-memory change is rolled back.

use anyhow::Result;

use crate::geometry::Point;
use crate::slots::{Slot, SlotCollection};
use crate::storage::SlotStore;

pub struct SlotLayout {
    store: Box<dyn SlotStore>,
    source_id: String,
    slots: SlotCollection,
}

impl SlotLayout {
    /// Loads (or initialises) the layout for `source_id`.
    pub fn open(mut store: Box<dyn SlotStore>, source_id: &str) -> Result<Self> {
        let slots = store.load(source_id)?;
        log::info!(
            "loaded {} slot(s) for source {} from {}",
            slots.len(),
            source_id,
            store.location(source_id)
        );
        Ok(Self {
            store,
            source_id: source_id.to_string(),
            slots,
        })
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn slots(&self) -> &SlotCollection {
        &self.slots
    }

    /// Copy of the live collection for one classification pass.
    pub fn snapshot(&self) -> SlotCollection {
        self.slots.snapshot()
    }

    /// Reads the persisted layout of any source without activating it.
    pub fn load(&mut self, source_id: &str) -> Result<SlotCollection> {
        self.store.load(source_id)
    }

    /// Persists the live collection under the active source id.
    pub fn save(&mut self) -> Result<()> {
        self.store.save(&self.slots, &self.source_id)
    }

    /// Appends a slot built from `points` and persists.
    ///
    /// Returns the new slot's index, or `None` when fewer than three points were
    /// given (nothing changes in that case).
    pub fn add_slot(&mut self, points: &[Point]) -> Result<Option<usize>> {
        let slot = match Slot::new(points.to_vec()) {
            Ok(slot) => slot,
            Err(e) => {
                log::debug!("ignoring slot commit on {}: {}", self.source_id, e);
                return Ok(None);
            }
        };
        self.slots.push(slot);
        if let Err(e) = self.save() {
            self.slots.pop();
            return Err(e);
        }
        let index = self.slots.len() - 1;
        log::info!("{} added to source {}", Slot::label(index), self.source_id);
        Ok(Some(index))
    }

    /// Removes the first slot (collection order) containing `point` and persists.
    pub fn remove_slot_at(&mut self, point: Point) -> Result<Option<Slot>> {
        let before = self.slots.clone();
        let Some((index, removed)) = self.slots.remove_first_containing(point) else {
            return Ok(None);
        };
        if let Err(e) = self.save() {
            self.slots = before;
            return Err(e);
        }
        log::info!(
            "{} removed from source {} at ({}, {})",
            Slot::label(index),
            self.source_id,
            point.x,
            point.y
        );
        Ok(Some(removed))
    }

    /// Removes every slot of the active source and persists. Returns how many were removed.
    pub fn clear(&mut self) -> Result<usize> {
        let before = std::mem::take(&mut self.slots);
        if let Err(e) = self.save() {
            self.slots = before;
            return Err(e);
        }
        Ok(before.len())
    }

    /// Drops the live collection and activates `source_id`.
    ///
    /// On load failure the previous source stays active.
    pub fn switch_source(&mut self, source_id: &str) -> Result<()> {
        let slots = self.store.load(source_id)?;
        self.activate(source_id, slots);
        Ok(())
    }

    /// Activates an already loaded layout for `source_id`.
    pub fn activate(&mut self, source_id: &str, slots: SlotCollection) {
        log::info!(
            "switched slot layout {} -> {} ({} slot(s))",
            self.source_id,
            source_id,
            slots.len()
        );
        self.source_id = source_id.to_string();
        self.slots = slots;
    }
}
