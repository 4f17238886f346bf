use std::str::FromStr;

use anyhow::anyhow;

use crate::geometry::Polygon;

/// Detections produced by a backend for one frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Boxes in frame pixel coordinates, in backend output order.
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

/// One detected object: an axis-aligned box, a score and a raw class id.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: u32,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32, class_id: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            score,
            class_id,
        }
    }

    /// Resolves the class id through the fixed label table.
    pub fn label(&self) -> Result<ObjectLabel, UnknownClassId> {
        ObjectLabel::try_from(self.class_id)
    }

    /// The box as a four-corner polygon.
    pub fn bounding_polygon(&self) -> Polygon {
        Polygon::from_box(self.x1, self.y1, self.x2, self.y2)
    }
}

/// Class labels of the detection model, indexed by class id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectLabel {
    Pedestrian,
    People,
    Bicycle,
    Car,
    Van,
    Truck,
    Tricycle,
    AwningTricycle,
    Bus,
    Motor,
}

impl ObjectLabel {
    /// All labels in class-id order.
    pub const ALL: [ObjectLabel; 10] = [
        ObjectLabel::Pedestrian,
        ObjectLabel::People,
        ObjectLabel::Bicycle,
        ObjectLabel::Car,
        ObjectLabel::Van,
        ObjectLabel::Truck,
        ObjectLabel::Tricycle,
        ObjectLabel::AwningTricycle,
        ObjectLabel::Bus,
        ObjectLabel::Motor,
    ];

    /// Labels that can occupy a parking slot by default.
    pub const DEFAULT_VEHICLES: [ObjectLabel; 3] =
        [ObjectLabel::Car, ObjectLabel::Van, ObjectLabel::Truck];

    pub fn class_id(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectLabel::Pedestrian => "pedestrian",
            ObjectLabel::People => "people",
            ObjectLabel::Bicycle => "bicycle",
            ObjectLabel::Car => "car",
            ObjectLabel::Van => "van",
            ObjectLabel::Truck => "truck",
            ObjectLabel::Tricycle => "tricycle",
            ObjectLabel::AwningTricycle => "awning-tricycle",
            ObjectLabel::Bus => "bus",
            ObjectLabel::Motor => "motor",
        }
    }
}

impl TryFrom<u32> for ObjectLabel {
    type Error = UnknownClassId;

    fn try_from(class_id: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(class_id as usize)
            .copied()
            .ok_or(UnknownClassId(class_id))
    }
}

impl FromStr for ObjectLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == name)
            .ok_or_else(|| anyhow!("unknown object label '{}'", s.trim()))
    }
}

impl std::fmt::Display for ObjectLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class id outside the label table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownClassId(pub u32);

impl std::fmt::Display for UnknownClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown detection class id {}", self.0)
    }
}

impl std::error::Error for UnknownClassId {}
