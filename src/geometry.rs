//! Planar geometry in frame pixel space.
//!
//! Slots and vehicle boxes are both plain vertex lists. Two operations matter:
//! - `centroid`: integer-truncated vertex mean, the single test point of a slot
//! - `contains`: even-odd ray casting with the half-open `min < y <= max` edge rule

use serde::{Deserialize, Serialize};

/// Minimum vertex count for a polygon that can be committed as a slot.
pub const MIN_SLOT_POINTS: usize = 3;

/// A point in frame pixel coordinates.
///
/// Serialized as an `[x, y]` pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this point shifted by `(dx, dy)`.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl From<Point> for (i32, i32) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Ordered vertex list. Edges join consecutive vertices and wrap last -> first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Four corners of an axis-aligned box, in the order
    /// `(x1,y1) (x1,y2) (x2,y2) (x2,y1)`.
    ///
    /// Coordinates are truncated toward zero.
    pub fn from_box(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let (x1, y1, x2, y2) = (x1 as i32, y1 as i32, x2 as i32, y2 as i32);
        Self::new(vec![
            Point::new(x1, y1),
            Point::new(x1, y2),
            Point::new(x2, y2),
            Point::new(x2, y1),
        ])
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates edges `(p1, p2)` including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    pub fn centroid(&self) -> Result<Point, GeometryError> {
        centroid(&self.points)
    }

    pub fn contains(&self, point: Point) -> bool {
        contains(point, &self.points)
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

impl From<Vec<(i32, i32)>> for Polygon {
    fn from(points: Vec<(i32, i32)>) -> Self {
        Self::new(points.into_iter().map(Point::from).collect())
    }
}

/// Geometry failures that callers need to tell apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeometryError {
    /// Centroid of a polygon with no vertices.
    EmptyPolygon,
    /// Polygon has fewer vertices than a slot requires.
    TooFewPoints { found: usize },
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::EmptyPolygon => write!(f, "invalid polygon: no vertices"),
            GeometryError::TooFewPoints { found } => write!(
                f,
                "invalid polygon: {} vertices, at least {} required",
                found, MIN_SLOT_POINTS
            ),
        }
    }
}

impl std::error::Error for GeometryError {}

/// Integer-truncated arithmetic mean of the vertices.
///
/// The result may lie outside degenerate or strongly concave polygons.
pub fn centroid(points: &[Point]) -> Result<Point, GeometryError> {
    if points.is_empty() {
        return Err(GeometryError::EmptyPolygon);
    }
    let n = points.len() as i64;
    let (sum_x, sum_y) = points.iter().fold((0i64, 0i64), |(sx, sy), p| {
        (sx + p.x as i64, sy + p.y as i64)
    });
    // i64 division truncates toward zero.
    Ok(Point::new((sum_x / n) as i32, (sum_y / n) as i32))
}

/// Even-odd containment test.
///
/// An edge is crossed when `min(p1.y, p2.y) < y <= max(p1.y, p2.y)` and the point
/// lies on or left of the edge at that height. Horizontal edges never satisfy the
/// band test, so the interpolation never divides by zero.
pub fn contains(point: Point, polygon: &[Point]) -> bool {
    let n = polygon.len();
    let mut inside = false;
    for i in 0..n {
        let p1 = polygon[i];
        let p2 = polygon[(i + 1) % n];
        let (lo, hi) = if p1.y < p2.y { (p1.y, p2.y) } else { (p2.y, p1.y) };
        if lo < point.y && point.y <= hi {
            // Widen before subtracting; box edges may sit at the i32 limits.
            let (x1, y1) = (p1.x as f64, p1.y as f64);
            let (x2, y2) = (p2.x as f64, p2.y as f64);
            let edge_x = (x2 - x1) * (point.y as f64 - y1) / (y2 - y1) + x1;
            if point.x as f64 <= edge_x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Checks the vertex count required of a committed slot.
pub fn validate_slot_polygon(points: &[Point]) -> Result<(), GeometryError> {
    if points.len() < MIN_SLOT_POINTS {
        return Err(GeometryError::TooFewPoints {
            found: points.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: i32, y0: i32, side: i32) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x0 + side, y0),
            Point::new(x0 + side, y0 + side),
            Point::new(x0, y0 + side),
        ]
    }

    #[test]
    fn centroid_is_truncated_mean() {
        let tri = vec![Point::new(0, 0), Point::new(10, 0), Point::new(0, 5)];
        // (10/3, 5/3) truncated
        assert_eq!(centroid(&tri).unwrap(), Point::new(3, 1));
    }

    #[test]
    fn centroid_truncates_toward_zero_for_negative_means() {
        let pts = vec![Point::new(-1, -1), Point::new(-2, -2), Point::new(0, 0)];
        assert_eq!(centroid(&pts).unwrap(), Point::new(-1, -1));
    }

    #[test]
    fn centroid_of_empty_polygon_fails() {
        assert_eq!(centroid(&[]), Err(GeometryError::EmptyPolygon));
    }

    #[test]
    fn centroid_ignores_rotation_and_reversal() {
        let pts = vec![
            Point::new(3, 7),
            Point::new(40, 2),
            Point::new(55, 31),
            Point::new(12, 44),
            Point::new(-5, 20),
        ];
        let expected = centroid(&pts).unwrap();
        for shift in 0..pts.len() {
            let mut rotated = pts.clone();
            rotated.rotate_left(shift);
            assert_eq!(centroid(&rotated).unwrap(), expected);
            rotated.reverse();
            assert_eq!(centroid(&rotated).unwrap(), expected);
        }
    }

    #[test]
    fn contains_interior_and_exterior_points() {
        let sq = square(0, 0, 20);
        assert!(contains(Point::new(10, 10), &sq));
        assert!(contains(Point::new(1, 19), &sq));
        assert!(!contains(Point::new(25, 10), &sq));
        assert!(!contains(Point::new(-1, 10), &sq));
        assert!(!contains(Point::new(10, 21), &sq));
    }

    #[test]
    fn contains_uses_half_open_vertical_band() {
        let sq = square(0, 0, 20);
        // Bottom edge row (max y) is inside, top edge row (min y) is not.
        assert!(contains(Point::new(10, 20), &sq));
        assert!(!contains(Point::new(10, 0), &sq));
        // Points on an edge also satisfy `x <= edge_x` for that edge, so the
        // left edge is crossed twice (outside) and the right edge once (inside).
        assert!(!contains(Point::new(0, 10), &sq));
        assert!(contains(Point::new(20, 10), &sq));
    }

    #[test]
    fn contains_handles_coordinates_at_i32_limits() {
        let tall = Polygon::from_box(0.0, -3.0e9, 40.0, 40.0);
        assert_eq!(tall.points()[0], Point::new(0, i32::MIN));
        assert!(tall.contains(Point::new(10, 10)));
        assert!(!tall.contains(Point::new(50, 10)));

        let wide = vec![
            Point::new(-2_000_000_000, 0),
            Point::new(2_000_000_000, 10),
            Point::new(-2_000_000_000, 20),
        ];
        assert!(contains(Point::new(0, 10), &wide));
        assert!(!contains(Point::new(0, 30), &wide));
    }

    #[test]
    fn contains_handles_concave_polygon() {
        // U shape opening upward
        let u = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 20),
            Point::new(20, 20),
            Point::new(20, 0),
            Point::new(30, 0),
            Point::new(30, 30),
            Point::new(0, 30),
        ];
        assert!(contains(Point::new(5, 10), &u));
        assert!(!contains(Point::new(15, 10), &u));
        assert!(contains(Point::new(15, 25), &u));
    }

    #[test]
    fn degenerate_polygons_contain_nothing() {
        let line = vec![Point::new(0, 0), Point::new(10, 10), Point::new(20, 20)];
        let c = centroid(&line).unwrap();
        assert_eq!(c, Point::new(10, 10));
        // Zero-area: crossings always cancel.
        assert!(!contains(c, &line));
        assert!(!contains(Point::new(5, 5), &[]));
    }

    #[test]
    fn box_polygon_corner_order() {
        let poly = Polygon::from_box(1.9, 2.2, 10.7, 20.1);
        assert_eq!(
            poly.points(),
            &[
                Point::new(1, 2),
                Point::new(1, 20),
                Point::new(10, 20),
                Point::new(10, 2)
            ]
        );
        assert_eq!(poly.edges().count(), 4);
    }

    #[test]
    fn slot_polygon_requires_three_points() {
        let two = vec![Point::new(0, 0), Point::new(1, 1)];
        assert_eq!(
            validate_slot_polygon(&two),
            Err(GeometryError::TooFewPoints { found: 2 })
        );
        assert!(validate_slot_polygon(&square(0, 0, 1)).is_ok());
    }

    #[test]
    fn points_serialize_as_pairs() {
        let poly = Polygon::from(vec![(1, 2), (3, 4), (5, 6)]);
        let json = serde_json::to_string(&poly).unwrap();
        assert_eq!(json, "[[1,2],[3,4],[5,6]]");
        let back: Polygon = serde_json::from_str(&json).unwrap();
        assert_eq!(back, poly);
    }
}
