//! Image-sequence frame source.
//!
//! Reads every `.png`, `.jpg` or `.jpeg` file in a directory, in file-name order,
//! as one frame each. All frames must share the first frame's size.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::FrameSource;
use crate::frame::{Frame, SourceInfo};

pub const DEFAULT_SEQUENCE_FPS: f64 = 25.0;

pub struct ImageSequenceSource {
    dir: PathBuf,
    fps: f64,
    files: Vec<PathBuf>,
    next: usize,
    size: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fps: DEFAULT_SEQUENCE_FPS,
            files: Vec::new(),
            next: 0,
            size: None,
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<SourceInfo> {
        self.files = list_images(&self.dir)?;
        self.next = 0;
        let first = self
            .files
            .first()
            .ok_or_else(|| anyhow!("no images found in {}", self.dir.display()))?;
        let (width, height) = image::image_dimensions(first)
            .with_context(|| format!("failed to read {}", first.display()))?;
        self.size = Some((width, height));
        log::info!(
            "ImageSequenceSource: {} frame(s) in {}",
            self.files.len(),
            self.dir.display()
        );
        Ok(SourceInfo {
            width,
            height,
            fps: self.fps,
            frame_count: Some(self.files.len() as u64),
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some((width, height)) = self.size else {
            return Err(anyhow!("image sequence read before open"));
        };
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let image = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        if image.dimensions() != (width, height) {
            return Err(anyhow!(
                "{} is {}x{}, sequence is {}x{}",
                path.display(),
                image.width(),
                image.height(),
                width,
                height
            ));
        }
        self.next += 1;
        Ok(Some(Frame::from_image(self.next as u64, image)))
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list image directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
            .unwrap_or(false);
        if is_image && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
