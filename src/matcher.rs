//! Detection-to-region association.

use std::collections::BTreeSet;

use crate::detect::Detection;
use crate::regions::RegionSet;

/// Ids of every region whose interior contains the detection's reference point.
///
/// The reference point is the integer centre of the bounding box, not the box
/// itself. Detection coordinates must already be in the region set's coordinate
/// space; no scaling happens here. Overlapping regions all match.
pub fn assign(detection: &Detection, regions: &RegionSet) -> BTreeSet<usize> {
    let point = detection.bbox.reference_point();
    regions
        .iter()
        .filter(|(_, polygon)| polygon.contains(point))
        .map(|(id, _)| id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::geometry::{Point, Polygon};

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Polygon {
        Polygon::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
        .unwrap()
    }

    fn car_centered(cx: f32, cy: f32) -> Detection {
        Detection::new(BoundingBox::centered(cx, cy, 20.0, 20.0), 2, 0.9)
    }

    #[test]
    fn single_region_match() {
        let set = RegionSet::new(1.0, vec![rect(0, 0, 100, 100), rect(200, 0, 300, 100)]).unwrap();
        assert_eq!(assign(&car_centered(50.0, 50.0), &set), BTreeSet::from([0]));
        assert_eq!(assign(&car_centered(250.0, 50.0), &set), BTreeSet::from([1]));
    }

    #[test]
    fn outside_all_regions_is_empty() {
        let set = RegionSet::new(1.0, vec![rect(0, 0, 100, 100)]).unwrap();
        assert!(assign(&car_centered(150.0, 150.0), &set).is_empty());
        assert!(assign(&car_centered(50.0, 50.0), &RegionSet::empty()).is_empty());
    }

    #[test]
    fn overlapping_regions_report_every_match() {
        let set = RegionSet::new(1.0, vec![rect(0, 0, 100, 100), rect(50, 50, 150, 150)]).unwrap();
        assert_eq!(assign(&car_centered(75.0, 75.0), &set), BTreeSet::from([0, 1]));
    }

    #[test]
    fn only_the_reference_point_matters() {
        let set = RegionSet::new(1.0, vec![rect(0, 0, 100, 100)]).unwrap();
        // Box mostly inside the region but centred outside it.
        let det = Detection::new(BoundingBox::new(40.0, 40.0, 180.0, 90.0), 2, 0.9);
        assert!(assign(&det, &set).is_empty());
    }
}
