//! Parking slots and the ordered per-source slot collection.
//!
//! A `Slot` is an operator-drawn polygon with its centroid computed once at
//! construction. Slots are only ever appended or removed whole; the collection
//! order gives each slot its display index.

use serde::{Deserialize, Serialize};

use crate::geometry::{validate_slot_polygon, GeometryError, Point, Polygon};

/// One parking space.
///
/// Serialized as its bare vertex list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Polygon", into = "Polygon")]
pub struct Slot {
    polygon: Polygon,
    centroid: Point,
}

impl Slot {
    /// Builds a slot from committed points. Requires at least three vertices.
    pub fn new(points: Vec<Point>) -> Result<Self, GeometryError> {
        Self::try_from(Polygon::new(points))
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn points(&self) -> &[Point] {
        self.polygon.points()
    }

    pub fn centroid(&self) -> Point {
        self.centroid
    }

    pub fn contains(&self, point: Point) -> bool {
        self.polygon.contains(point)
    }

    /// Display label for the slot at `index` (0-based) in its collection.
    pub fn label(index: usize) -> String {
        format!("Slot {}", index + 1)
    }

    /// Where overlays print the label: left of and below the centroid.
    pub fn label_anchor(&self) -> Point {
        self.centroid.offset(-30, 20)
    }
}

impl TryFrom<Polygon> for Slot {
    type Error = GeometryError;

    fn try_from(polygon: Polygon) -> Result<Self, Self::Error> {
        validate_slot_polygon(polygon.points())?;
        let centroid = polygon.centroid()?;
        Ok(Self { polygon, centroid })
    }
}

impl From<Slot> for Polygon {
    fn from(slot: Slot) -> Self {
        slot.polygon
    }
}

/// Ordered slots for one video source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotCollection {
    slots: Vec<Slot>,
}

impl SlotCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Slot> {
        self.slots.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn push(&mut self, slot: Slot) {
        self.slots.push(slot);
    }

    pub fn pop(&mut self) -> Option<Slot> {
        self.slots.pop()
    }

    /// Index of the first slot (collection order) whose polygon contains `point`.
    pub fn position_containing(&self, point: Point) -> Option<usize> {
        self.slots.iter().position(|slot| slot.contains(point))
    }

    /// Removes the first slot containing `point`. Overlapping later slots stay.
    pub fn remove_first_containing(&mut self, point: Point) -> Option<(usize, Slot)> {
        let index = self.position_containing(point)?;
        Some((index, self.slots.remove(index)))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Shallow per-frame copy handed to the classifier.
    pub fn snapshot(&self) -> SlotCollection {
        self.clone()
    }
}

impl FromIterator<Slot> for SlotCollection {
    fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SlotCollection {
    type Item = &'a Slot;
    type IntoIter = std::slice::Iter<'a, Slot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Slot {
        Slot::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
        .unwrap()
    }

    #[test]
    fn slot_caches_centroid_and_label_anchor() {
        let slot = rect(0, 0, 20, 40);
        assert_eq!(slot.centroid(), Point::new(10, 20));
        assert_eq!(slot.label_anchor(), Point::new(-20, 40));
        assert_eq!(Slot::label(0), "Slot 1");
        assert_eq!(Slot::label(4), "Slot 5");
    }

    #[test]
    fn slot_rejects_fewer_than_three_points() {
        let err = Slot::new(vec![Point::new(0, 0), Point::new(5, 5)]).unwrap_err();
        assert_eq!(err, GeometryError::TooFewPoints { found: 2 });
        assert!(Slot::new(vec![]).is_err());
    }

    #[test]
    fn remove_first_containing_takes_only_the_first_overlap() {
        let mut slots: SlotCollection =
            vec![rect(0, 0, 10, 10), rect(0, 0, 30, 30), rect(5, 5, 30, 30)]
                .into_iter()
                .collect();
        let (index, removed) = slots.remove_first_containing(Point::new(7, 7)).unwrap();
        assert_eq!(index, 0);
        assert_eq!(removed, rect(0, 0, 10, 10));
        assert_eq!(slots.len(), 2);

        let (index, _) = slots.remove_first_containing(Point::new(7, 7)).unwrap();
        assert_eq!(index, 0);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots.get(0), Some(&rect(5, 5, 30, 30)));
    }

    #[test]
    fn remove_with_no_match_is_noop() {
        let mut slots: SlotCollection = vec![rect(0, 0, 10, 10)].into_iter().collect();
        assert!(slots.remove_first_containing(Point::new(50, 50)).is_none());
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn deserializing_short_slot_fails() {
        let err = serde_json::from_str::<SlotCollection>("[[[0,0],[1,1]]]").unwrap_err();
        assert!(err.to_string().contains("at least 3"));
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let mut slots: SlotCollection = vec![rect(0, 0, 10, 10)].into_iter().collect();
        let snap = slots.snapshot();
        slots.push(rect(20, 20, 30, 30));
        slots.remove_first_containing(Point::new(5, 5));
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get(0), Some(&rect(0, 0, 10, 10)));
    }
}
