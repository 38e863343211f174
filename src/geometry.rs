//! Integer polygon geometry for region containment.
//!
//! Containment is boundary-exclusive: a point lying exactly on an edge or a vertex
//! of a polygon is reported as outside. Polygons must be simple (non
//! self-intersecting); the result for self-intersecting polygons is unspecified.

use geo::{Contains, LineString};
use serde::{Deserialize, Serialize};

/// Integer pixel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Closed polygon, vertices in authoring order. The closing edge is implicit.
#[derive(Clone, Debug)]
pub struct Polygon {
    vertices: Vec<Point>,
    shape: geo::Polygon<f64>,
}

impl Polygon {
    /// Minimum number of vertices for a region polygon.
    pub const MIN_VERTICES: usize = 3;

    /// Build a polygon. Returns `None` when fewer than three vertices are given.
    pub fn new(vertices: Vec<Point>) -> Option<Self> {
        if vertices.len() < Self::MIN_VERTICES {
            return None;
        }
        let ring: Vec<(f64, f64)> = vertices
            .iter()
            .map(|v| (v.x as f64, v.y as f64))
            .collect();
        let shape = geo::Polygon::new(LineString::from(ring), vec![]);
        Some(Self { vertices, shape })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Iterate edges as (start, end), including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Strict interior test; points on an edge or vertex are outside.
    pub fn contains(&self, p: Point) -> bool {
        self.shape
            .contains(&geo::Point::new(p.x as f64, p.y as f64))
    }
}

impl PartialEq for Polygon {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices
    }
}

impl Eq for Polygon {}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        Polygon::new(vec![
            Point::new(0, 0),
            Point::new(100, 0),
            Point::new(100, 100),
            Point::new(0, 100),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_degenerate_polygons() {
        assert!(Polygon::new(vec![]).is_none());
        assert!(Polygon::new(vec![Point::new(0, 0), Point::new(1, 1)]).is_none());
    }

    #[test]
    fn square_interior_and_exterior() {
        let poly = square();
        assert!(poly.contains(Point::new(50, 50)));
        assert!(poly.contains(Point::new(1, 99)));
        assert!(!poly.contains(Point::new(150, 50)));
        assert!(!poly.contains(Point::new(-1, 50)));
        assert!(!poly.contains(Point::new(50, 101)));
    }

    #[test]
    fn boundary_is_outside() {
        let poly = square();
        assert!(!poly.contains(Point::new(0, 50)));
        assert!(!poly.contains(Point::new(100, 50)));
        assert!(!poly.contains(Point::new(50, 0)));
        assert!(!poly.contains(Point::new(0, 0)));
        assert!(!poly.contains(Point::new(100, 100)));
    }

    #[test]
    fn concave_polygon_notch_is_outside() {
        // U shape with the notch open at the top between x=40..60.
        let poly = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(40, 0),
            Point::new(40, 60),
            Point::new(60, 60),
            Point::new(60, 0),
            Point::new(100, 0),
            Point::new(100, 100),
            Point::new(0, 100),
        ])
        .unwrap();
        assert!(!poly.contains(Point::new(50, 30)));
        assert!(poly.contains(Point::new(20, 30)));
        assert!(poly.contains(Point::new(80, 30)));
        assert!(poly.contains(Point::new(50, 80)));
    }

    #[test]
    fn diamond_contains_points_level_with_its_vertices() {
        let diamond = Polygon::new(vec![
            Point::new(50, 0),
            Point::new(100, 50),
            Point::new(50, 100),
            Point::new(0, 50),
        ])
        .unwrap();
        assert!(diamond.contains(Point::new(20, 50)));
        assert!(diamond.contains(Point::new(50, 50)));
        assert!(!diamond.contains(Point::new(-10, 50)));
        assert!(!diamond.contains(Point::new(50, 120)));
    }
}
