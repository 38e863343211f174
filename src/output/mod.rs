//! Frame sinks for annotated output.

pub mod image_dir;

use anyhow::Result;

use crate::frame::{Frame, SourceInfo};

pub use image_dir::{ImageSequenceSink, SequenceManifest};

/// Destination for annotated frames.
///
/// `begin` is called once before the first frame with the source properties and
/// the size frames will be written at. `finish` is called exactly once on every
/// exit path of a run, including failures; it must flush and release resources.
pub trait FrameSink {
    fn begin(&mut self, source: &SourceInfo, width: u32, height: u32) -> Result<()>;

    fn write(&mut self, frame: &Frame) -> Result<()>;

    fn finish(&mut self) -> Result<()>;

    /// Human-readable destination for logs.
    fn describe(&self) -> String;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn begin(&mut self, source: &SourceInfo, width: u32, height: u32) -> Result<()> {
        (**self).begin(source, width, height)
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        (**self).write(frame)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
