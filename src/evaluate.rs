//! Per-frame counting and congestion classification.
//!
//! `evaluate` is a pure function of its inputs: no state carries over between
//! frames.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detect::{Detection, VehicleClass};
use crate::matcher;
use crate::regions::RegionSet;

pub const DEFAULT_CAR_THRESHOLD: u32 = 5;
pub const DEFAULT_TRUCK_THRESHOLD: u32 = 3;
pub const DEFAULT_BUS_THRESHOLD: u32 = 2;
pub const DEFAULT_OVERALL_THRESHOLD: u32 = 10;

/// Per-class thresholds plus one overall threshold.
///
/// The classes present in `per_class` are the counted subset; detections of other
/// classes never contribute to counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    per_class: BTreeMap<VehicleClass, u32>,
    overall: u32,
}

impl ThresholdConfig {
    /// Car / truck / bus thresholds with the overall threshold.
    pub fn new(car: u32, truck: u32, bus: u32, overall: u32) -> Self {
        let per_class = BTreeMap::from([
            (VehicleClass::Car, car),
            (VehicleClass::Truck, truck),
            (VehicleClass::Bus, bus),
        ]);
        Self { per_class, overall }
    }

    /// Add or replace a counted class.
    pub fn with_class(mut self, class: VehicleClass, threshold: u32) -> Self {
        self.per_class.insert(class, threshold);
        self
    }

    pub fn with_overall(mut self, overall: u32) -> Self {
        self.overall = overall;
        self
    }

    pub fn threshold(&self, class: VehicleClass) -> Option<u32> {
        self.per_class.get(&class).copied()
    }

    pub fn overall(&self) -> u32 {
        self.overall
    }

    pub fn is_counted(&self, class: VehicleClass) -> bool {
        self.per_class.contains_key(&class)
    }

    /// Counted classes in display order.
    pub fn counted_classes(&self) -> impl Iterator<Item = (VehicleClass, u32)> + '_ {
        self.per_class.iter().map(|(class, t)| (*class, *t))
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_CAR_THRESHOLD,
            DEFAULT_TRUCK_THRESHOLD,
            DEFAULT_BUS_THRESHOLD,
            DEFAULT_OVERALL_THRESHOLD,
        )
    }
}

/// Frame-level tally, aggregated across all regions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameCounts {
    per_class: BTreeMap<VehicleClass, u32>,
    per_region: Vec<u32>,
    overall: u32,
}

impl FrameCounts {
    /// Count for a class; zero for classes that were not seen or not counted.
    pub fn get(&self, class: VehicleClass) -> u32 {
        self.per_class.get(&class).copied().unwrap_or(0)
    }

    /// Sum of all counted-class totals.
    pub fn overall(&self) -> u32 {
        self.overall
    }

    /// Counted detections per region id (diagnostic breakdown).
    pub fn per_region(&self) -> &[u32] {
        &self.per_region
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CongestionStatus {
    Smooth,
    Congested,
}

impl CongestionStatus {
    pub fn label(self) -> &'static str {
        match self {
            CongestionStatus::Smooth => "Smooth",
            CongestionStatus::Congested => "Congested",
        }
    }
}

impl std::fmt::Display for CongestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Count counted-class detections inside the regions and classify the frame.
///
/// A detection adds one to its class for every region it matches. Status is
/// `Congested` iff some class count or the overall count strictly exceeds its
/// threshold.
pub fn evaluate(
    detections: &[Detection],
    regions: &RegionSet,
    thresholds: &ThresholdConfig,
) -> (FrameCounts, CongestionStatus) {
    let mut counts = FrameCounts {
        per_class: thresholds.counted_classes().map(|(c, _)| (c, 0)).collect(),
        per_region: vec![0; regions.len()],
        overall: 0,
    };

    for det in detections {
        let Some(class) = det.vehicle_class() else {
            continue;
        };
        if !thresholds.is_counted(class) {
            continue;
        }
        for region_id in matcher::assign(det, regions) {
            *counts.per_class.entry(class).or_insert(0) += 1;
            counts.per_region[region_id] += 1;
            counts.overall += 1;
        }
    }

    let status = classify(&counts, thresholds);
    (counts, status)
}

fn classify(counts: &FrameCounts, thresholds: &ThresholdConfig) -> CongestionStatus {
    let class_exceeded = thresholds
        .counted_classes()
        .any(|(class, threshold)| counts.get(class) > threshold);
    if class_exceeded || counts.overall > thresholds.overall {
        CongestionStatus::Congested
    } else {
        CongestionStatus::Smooth
    }
}
