//! Decoded video frames.
//!
//! - `Frame`: one RGB8 frame plus its 1-based position in the source stream.
//! - `SourceInfo`: stream properties a source reports when it is opened.

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::RgbImage;

/// One decoded frame, tightly packed RGB8.
#[derive(Clone, Debug)]
pub struct Frame {
    /// 1-based position of the frame in the source stream.
    pub index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame {} expected {} RGB bytes for {}x{}, received {}",
                index,
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", width, height))?;
        Ok(Self { index, image })
    }

    pub fn from_image(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw RGB8 bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Resize by a uniform factor. A factor of 1.0 returns the frame unchanged.
    pub fn scaled(self, scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(anyhow!("scale must be a positive number, got {}", scale));
        }
        if scale == 1.0 {
            return Ok(self);
        }
        let (width, height) = scaled_dimensions(self.width(), self.height(), scale);
        let image = image::imageops::resize(&self.image, width, height, FilterType::Triangle);
        Ok(Self {
            index: self.index,
            image,
        })
    }
}

/// Frame size after scaling; each side truncated and kept at least one pixel.
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = ((width as f64) * scale) as u32;
    let h = ((height as f64) * scale) as u32;
    (w.max(1), h.max(1))
}

/// Stream properties reported by a frame source once opened.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Total frames when the container reports it.
    pub frame_count: Option<u64>,
}
