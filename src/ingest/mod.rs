//! Frame sources.
//!
//! - Local video files: synthetic `stub://` streams, or FFmpeg decoding
//!   (feature: ingest-file-ffmpeg)
//! - Image sequences: a directory of numbered still images
//!
//! Every source yields RGB8 `Frame`s in stream order with 1-based indices.
//! `next_frame` returns `Ok(None)` at end of stream.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod image_dir;

use anyhow::Result;

use crate::frame::{Frame, SourceInfo};

pub use file::{FileConfig, FileSource};
pub use image_dir::ImageSequenceSource;

/// A stream of decoded frames.
pub trait FrameSource {
    /// Open the stream and report its properties.
    fn open(&mut self) -> Result<SourceInfo>;

    /// Read the next frame, `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Human-readable source location for logs.
    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<SourceInfo> {
        (**self).open()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
