use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Axis-aligned box in pixel coordinates of the frame handed to the detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box of the given size centred on `(cx, cy)`.
    pub fn centered(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Integer reference point used for region matching.
    ///
    /// Coordinates are truncated to integers first, then the midpoint is taken
    /// with floor division.
    pub fn reference_point(&self) -> Point {
        Point::new(
            truncated_midpoint(self.x1, self.x2),
            truncated_midpoint(self.y1, self.y2),
        )
    }
}

/// `floor((trunc(a) + trunc(b)) / 2)`, saturated to the `i32` range; NaN maps to 0.
fn truncated_midpoint(a: f32, b: f32) -> i32 {
    let mid = ((a as f64).trunc() + (b as f64).trunc()) / 2.0;
    if mid.is_nan() {
        return 0;
    }
    mid.floor().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

/// One detector output. Produced and discarded per frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: u32, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }

    /// Vehicle class for this detection, if its id is in the vehicle table.
    pub fn vehicle_class(&self) -> Option<VehicleClass> {
        VehicleClass::from_class_id(self.class_id)
    }
}

/// Vehicle classes known to the pipeline.
///
/// Class ids follow the COCO label table the bundled detectors are trained on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Truck,
    Bus,
    Motorcycle,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] = [
        VehicleClass::Car,
        VehicleClass::Truck,
        VehicleClass::Bus,
        VehicleClass::Motorcycle,
    ];

    pub fn from_class_id(id: u32) -> Option<Self> {
        match id {
            2 => Some(VehicleClass::Car),
            3 => Some(VehicleClass::Motorcycle),
            5 => Some(VehicleClass::Bus),
            7 => Some(VehicleClass::Truck),
            _ => None,
        }
    }

    pub fn class_id(self) -> u32 {
        match self {
            VehicleClass::Car => 2,
            VehicleClass::Motorcycle => 3,
            VehicleClass::Bus => 5,
            VehicleClass::Truck => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Truck => "truck",
            VehicleClass::Bus => "bus",
            VehicleClass::Motorcycle => "motorcycle",
        }
    }

    /// Plural label used on the statistics panel.
    pub fn plural_label(self) -> &'static str {
        match self {
            VehicleClass::Car => "Cars",
            VehicleClass::Truck => "Trucks",
            VehicleClass::Bus => "Buses",
            VehicleClass::Motorcycle => "Motorcycles",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|class| class.name().eq_ignore_ascii_case(name.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_point_truncates_then_floors() {
        let bbox = BoundingBox::new(10.9, 20.2, 31.7, 41.9);
        // int(10.9)=10, int(31.7)=31 -> 41 // 2 = 20
        assert_eq!(bbox.reference_point(), Point::new(20, 30));

        let negative = BoundingBox::new(-3.5, -1.0, 0.0, 2.0);
        // int(-3.5)=-3 -> (-3 + 0) // 2 = -2
        assert_eq!(negative.reference_point(), Point::new(-2, 0));
    }

    #[test]
    fn reference_point_saturates_on_huge_or_invalid_boxes() {
        let huge = BoundingBox::new(f32::MAX, f32::MIN, f32::MAX, f32::MIN);
        assert_eq!(huge.reference_point(), Point::new(i32::MAX, i32::MIN));

        let far = BoundingBox::new(3.0e9, 10.0, 3.0e9, 10.0);
        assert_eq!(far.reference_point(), Point::new(i32::MAX, 10));

        let infinite = BoundingBox::new(f32::NEG_INFINITY, 0.0, 0.0, f32::INFINITY);
        assert_eq!(infinite.reference_point(), Point::new(i32::MIN, i32::MAX));

        let nan = BoundingBox::new(f32::NAN, 4.0, 8.0, f32::NAN);
        assert_eq!(nan.reference_point(), Point::new(0, 0));
    }

    #[test]
    fn class_table_maps_only_vehicle_ids() {
        assert_eq!(VehicleClass::from_class_id(2), Some(VehicleClass::Car));
        assert_eq!(VehicleClass::from_class_id(3), Some(VehicleClass::Motorcycle));
        assert_eq!(VehicleClass::from_class_id(5), Some(VehicleClass::Bus));
        assert_eq!(VehicleClass::from_class_id(7), Some(VehicleClass::Truck));
        assert_eq!(VehicleClass::from_class_id(0), None);
        assert_eq!(VehicleClass::from_class_id(6), None);
        for class in VehicleClass::ALL {
            assert_eq!(VehicleClass::from_class_id(class.class_id()), Some(class));
            assert_eq!(VehicleClass::parse(class.name()), Some(class));
        }
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&b), 0.0);
    }
}
