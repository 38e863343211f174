//! Detector seam.
//!
//! The object detector is an external collaborator. The pipeline only depends on
//! `DetectorBackend`; concrete backends live under `backends`.

mod backend;
pub mod backends;
mod result;

pub use backend::DetectorBackend;
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection, VehicleClass};
