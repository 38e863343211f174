//! ROI Congestion Analyzer
//!
//! Counts vehicles inside user-drawn regions of interest on every Nth frame of a
//! video, classifies each analysed frame as Smooth or Congested against per-class
//! and overall thresholds, and writes annotated frames to an output sink.
//!
//! # Module Structure
//!
//! - `geometry`: integer points and simple polygons, strict point-in-polygon
//! - `regions`: region sets, the region file store, interactive drawing sessions
//! - `detect`: vehicle detections and detector backends
//! - `matcher`: detection-to-region assignment
//! - `evaluate`: per-frame counting and Smooth/Congested classification
//! - `frame`: decoded RGB frames
//! - `ingest`: frame sources (synthetic, image directory, FFmpeg files)
//! - `output`: frame sinks (image sequence)
//! - `annotate`: overlay rendering
//! - `pipeline`: the run driver, progress and cancellation
//! - `config`: file + environment configuration

use std::path::PathBuf;

pub mod annotate;
pub mod config;
pub mod detect;
pub mod evaluate;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod matcher;
pub mod output;
pub mod pipeline;
pub mod regions;

pub use annotate::{AnnotationStyle, FrameAnnotator};
pub use config::CongestionConfig;
pub use detect::{BoundingBox, Detection, DetectorBackend, ScriptedBackend, VehicleClass};
pub use evaluate::{evaluate, CongestionStatus, FrameCounts, ThresholdConfig};
pub use frame::{Frame, SourceInfo};
pub use geometry::{Point, Polygon};
pub use ingest::{FileConfig, FileSource, FrameSource, ImageSequenceSource};
pub use output::{FrameSink, ImageSequenceSink, SequenceManifest};
pub use pipeline::{
    CancelToken, NoProgress, PipelineDriver, PipelineSettings, Progress, ProgressReporter,
    RunState, RunSummary, SharedProgress,
};
pub use regions::{DrawingSession, RegionSet, RegionStore};

/// Why a run (or a region operation) failed.
///
/// Every variant maps to a stable `code()` and the pipeline `stage()` it came from.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineError {
    RegionsNotFound { path: PathBuf },
    MalformedRegions { path: PathBuf, reason: String },
    /// The region file is valid but defines no polygons.
    NoRegions { path: PathBuf },
    InvalidConfig(String),
    SourceUnavailable(String),
    /// A frame could not be brought to the region authoring scale.
    FramePreparation { frame: u64, message: String },
    DetectorFailure { frame: u64, message: String },
    /// `frame` is `None` when opening or finalising the sink failed.
    SinkWriteFailure { frame: Option<u64>, message: String },
    Cancelled { frame: u64 },
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::RegionsNotFound { .. } => "REGIONS_NOT_FOUND",
            PipelineError::MalformedRegions { .. } => "MALFORMED_REGIONS",
            PipelineError::NoRegions { .. } => "NO_REGIONS",
            PipelineError::InvalidConfig(_) => "INVALID_CONFIG",
            PipelineError::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            PipelineError::FramePreparation { .. } => "FRAME_PREPARATION",
            PipelineError::DetectorFailure { .. } => "DETECTOR_FAILURE",
            PipelineError::SinkWriteFailure { .. } => "SINK_WRITE_FAILURE",
            PipelineError::Cancelled { .. } => "CANCELLED",
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::RegionsNotFound { .. }
            | PipelineError::MalformedRegions { .. }
            | PipelineError::NoRegions { .. } => "region loading",
            PipelineError::InvalidConfig(_) => "configuration",
            PipelineError::SourceUnavailable(_) => "source open",
            PipelineError::FramePreparation { .. } => "frame preparation",
            PipelineError::DetectorFailure { .. } => "detection",
            PipelineError::SinkWriteFailure { .. } => "writing",
            PipelineError::Cancelled { .. } => "run",
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: ", self.stage(), self.code())?;
        match self {
            PipelineError::RegionsNotFound { path } => {
                write!(f, "region file {} not found", path.display())
            }
            PipelineError::MalformedRegions { path, reason } => {
                write!(f, "region file {} is malformed: {}", path.display(), reason)
            }
            PipelineError::NoRegions { path } => {
                write!(f, "region file {} defines no regions", path.display())
            }
            PipelineError::InvalidConfig(message) => f.write_str(message),
            PipelineError::SourceUnavailable(message) => {
                write!(f, "cannot read video source: {}", message)
            }
            PipelineError::FramePreparation { frame, message }
            | PipelineError::DetectorFailure { frame, message } => {
                write!(f, "frame {}: {}", frame, message)
            }
            PipelineError::SinkWriteFailure {
                frame: Some(frame),
                message,
            } => write!(f, "frame {}: {}", frame, message),
            PipelineError::SinkWriteFailure {
                frame: None,
                message,
            } => f.write_str(message),
            PipelineError::Cancelled { frame } => write!(f, "cancelled at frame {}", frame),
        }
    }
}

impl std::error::Error for PipelineError {}
