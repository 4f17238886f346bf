//! Per-frame slot occupancy classification.
//!
//! A slot is occupied when its centroid lies inside the bounding box of a vehicle
//! detection. Pairing is greedy: detections are taken in the order supplied, and
//! each claims the first still-free slot (collection order) whose centroid it
//! contains. A detection claims at most one slot and a slot is claimed at most once.

use crate::detect::{Detection, ObjectLabel};
use crate::geometry::{GeometryError, Point, Polygon};
use crate::slots::{Slot, SlotCollection};

/// Occupancy of one slot in a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotStatus {
    /// Position of the slot in the collection it was classified from.
    pub index: usize,
    pub centroid: Point,
    pub occupied: bool,
    /// Index of the claiming detection in the frame's detection list.
    pub claimed_by: Option<usize>,
}

impl SlotStatus {
    pub fn label(&self) -> String {
        Slot::label(self.index)
    }
}

/// Result of classifying one frame. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OccupancySnapshot {
    pub slots: Vec<SlotStatus>,
    pub total: usize,
    pub free: usize,
}

impl OccupancySnapshot {
    pub fn occupied(&self) -> usize {
        self.total - self.free
    }

    pub fn is_occupied(&self, index: usize) -> Option<bool> {
        self.slots.get(index).map(|s| s.occupied)
    }

    pub fn free_slots(&self) -> impl Iterator<Item = &SlotStatus> {
        self.slots.iter().filter(|s| !s.occupied)
    }

    pub fn occupied_slots(&self) -> impl Iterator<Item = &SlotStatus> {
        self.slots.iter().filter(|s| s.occupied)
    }

    /// Two-line operator summary.
    pub fn summary(&self) -> String {
        format!("Total space: {}\nFree space: {}", self.total, self.free)
    }
}

pub struct OccupancyClassifier {
    vehicle_labels: Vec<ObjectLabel>,
}

impl Default for OccupancyClassifier {
    fn default() -> Self {
        Self::new(ObjectLabel::DEFAULT_VEHICLES.to_vec())
    }
}

impl OccupancyClassifier {
    pub fn new(vehicle_labels: Vec<ObjectLabel>) -> Self {
        Self { vehicle_labels }
    }

    pub fn vehicle_labels(&self) -> &[ObjectLabel] {
        &self.vehicle_labels
    }

    /// Classify a slot snapshot using the slots' cached centroids.
    pub fn classify(&self, slots: &SlotCollection, detections: &[Detection]) -> OccupancySnapshot {
        let centroids: Vec<Point> = slots.iter().map(Slot::centroid).collect();
        self.assign(&centroids, detections)
    }

    /// Classify raw polygons, computing each centroid.
    ///
    /// Fails on the first polygon without vertices; no partial result is produced.
    pub fn classify_polygons(
        &self,
        polygons: &[Polygon],
        detections: &[Detection],
    ) -> Result<OccupancySnapshot, GeometryError> {
        let centroids = polygons
            .iter()
            .map(Polygon::centroid)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.assign(&centroids, detections))
    }

    /// Splits detections into vehicles (with their input index) and unknown class ids.
    fn vehicles<'a>(
        &self,
        detections: &'a [Detection],
    ) -> (Vec<(usize, &'a Detection)>, Vec<u32>) {
        let mut vehicles = Vec::new();
        let mut unknown = Vec::new();
        for (index, detection) in detections.iter().enumerate() {
            match detection.label() {
                Ok(label) if self.vehicle_labels.contains(&label) => {
                    vehicles.push((index, detection))
                }
                Ok(_) => {}
                Err(e) => unknown.push(e.0),
            }
        }
        (vehicles, unknown)
    }

    fn assign(&self, centroids: &[Point], detections: &[Detection]) -> OccupancySnapshot {
        let mut statuses: Vec<SlotStatus> = centroids
            .iter()
            .enumerate()
            .map(|(index, &centroid)| SlotStatus {
                index,
                centroid,
                occupied: false,
                claimed_by: None,
            })
            .collect();
        // Working copy of still-free slot indices, in collection order.
        let mut remaining: Vec<usize> = (0..centroids.len()).collect();

        let (vehicles, unknown) = self.vehicles(detections);
        if !unknown.is_empty() {
            log::warn!(
                "dropped {} detection(s) with unknown class ids {:?}",
                unknown.len(),
                unknown
            );
        }

        for (det_index, detection) in vehicles {
            if remaining.is_empty() {
                break;
            }
            let vehicle = detection.bounding_polygon();
            let hit = remaining
                .iter()
                .position(|&slot| vehicle.contains(centroids[slot]));
            if let Some(pos) = hit {
                let slot = remaining.remove(pos);
                statuses[slot].occupied = true;
                statuses[slot].claimed_by = Some(det_index);
            }
        }

        OccupancySnapshot {
            total: centroids.len(),
            free: remaining.len(),
            slots: statuses,
        }
    }
}
