//! Local file frame source.
//!
//! `FileSource` reads frames from a local video file. Paths starting with
//! `stub://` produce a synthetic stream for tests and demos; their query string
//! controls the stream:
//!
//! `stub://name?frames=100&width=320&height=240&fps=25&fail_after=40`
//!
//! `fail_after=N` makes every read after frame N fail.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::FrameSource;
use crate::frame::{Frame, SourceInfo};

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (e.g., "/data/junction.mp4") or a `stub://` stream.
    pub path: String,
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::parse(config)?),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "file ingestion requires the ingest-file-ffmpeg feature"
                ))
            }
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

impl FrameSource for FileSource {
    fn open(&mut self) -> Result<SourceInfo> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.open(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.open(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn describe(&self) -> String {
        self.stats().path
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_captured: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

const SYNTHETIC_DEFAULT_FRAMES: u64 = 100;
const SYNTHETIC_DEFAULT_WIDTH: u32 = 320;
const SYNTHETIC_DEFAULT_HEIGHT: u32 = 240;
const SYNTHETIC_DEFAULT_FPS: f64 = 25.0;

struct SyntheticFileSource {
    config: FileConfig,
    total_frames: u64,
    width: u32,
    height: u32,
    fps: f64,
    fail_after: Option<u64>,
    frame_count: u64,
    opened: bool,
}

impl SyntheticFileSource {
    fn parse(config: FileConfig) -> Result<Self> {
        let mut source = Self {
            config,
            total_frames: SYNTHETIC_DEFAULT_FRAMES,
            width: SYNTHETIC_DEFAULT_WIDTH,
            height: SYNTHETIC_DEFAULT_HEIGHT,
            fps: SYNTHETIC_DEFAULT_FPS,
            fail_after: None,
            frame_count: 0,
            opened: false,
        };

        let query = source
            .config
            .path
            .split_once('?')
            .map(|(_, q)| q.to_string())
            .unwrap_or_default();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("stub source parameter '{}' must be key=value", pair))?;
            let invalid = |e: &dyn std::fmt::Display| {
                anyhow!("stub source parameter {}={} is invalid: {}", key, value, e)
            };
            match key {
                "frames" => source.total_frames = value.parse().map_err(|e| invalid(&e))?,
                "width" => source.width = value.parse().map_err(|e| invalid(&e))?,
                "height" => source.height = value.parse().map_err(|e| invalid(&e))?,
                "fps" => source.fps = value.parse().map_err(|e| invalid(&e))?,
                "fail_after" => source.fail_after = Some(value.parse().map_err(|e| invalid(&e))?),
                other => return Err(anyhow!("unknown stub source parameter '{}'", other)),
            }
        }
        if source.width == 0 || source.height == 0 {
            return Err(anyhow!("stub source dimensions must be non-zero"));
        }
        Ok(source)
    }

    fn open(&mut self) -> Result<SourceInfo> {
        self.opened = true;
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(SourceInfo {
            width: self.width,
            height: self.height,
            fps: self.fps,
            frame_count: Some(self.total_frames),
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.opened {
            return Err(anyhow!("synthetic source read before open"));
        }
        if self.fail_after.is_some_and(|n| self.frame_count >= n) {
            return Err(anyhow!(
                "synthetic read failure after frame {}",
                self.frame_count
            ));
        }
        if self.frame_count >= self.total_frames {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        Frame::new(self.frame_count, self.width, self.height, pixels).map(Some)
    }

    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let pixel_count = (self.width as usize) * (self.height as usize) * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub(path: &str) -> FileSource {
        FileSource::new(FileConfig {
            path: path.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn rejects_remote_urls() {
        let err = FileSource::new(FileConfig {
            path: "rtsp://camera/stream".to_string(),
        });
        assert!(err.is_err());
        assert!(FileSource::new(FileConfig::default()).is_err());
    }

    #[test]
    fn synthetic_stream_yields_requested_frames() {
        let mut source = stub("stub://test?frames=3&width=8&height=4&fps=30");
        let info = source.open().unwrap();
        assert_eq!(info.width, 8);
        assert_eq!(info.height, 4);
        assert_eq!(info.fps, 30.0);
        assert_eq!(info.frame_count, Some(3));

        let indices: Vec<u64> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|f| f.index)
            .collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_captured, 3);
    }

    #[test]
    fn synthetic_failure_after_n_frames() {
        let mut source = stub("stub://test?frames=10&width=2&height=2&fail_after=2");
        source.open().unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let err = FileSource::new(FileConfig {
            path: "stub://test?colour=blue".to_string(),
        });
        assert!(err.is_err());
    }
}
