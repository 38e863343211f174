//! Overlay rendering for analysed frames.
//!
//! Draw order: translucent region fill, region outlines, statistics panel. All
//! colours follow the frame's RGB channel order.

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut, draw_text_mut};
use imageproc::point::Point as PixelPoint;
use std::path::Path;

use crate::evaluate::{CongestionStatus, FrameCounts, ThresholdConfig};
use crate::geometry::Polygon;
use crate::regions::RegionSet;

pub const DEFAULT_REGION_ALPHA: f32 = 0.2;
pub const DEFAULT_PANEL_ALPHA: f32 = 0.4;

const SMOOTH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CONGESTED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const PANEL_COLOR: Rgb<u8> = Rgb([50, 50, 50]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

const PANEL_X: i32 = 10;
const PANEL_Y: i32 = 10;
const PANEL_WIDTH: u32 = 340;
const LINE_FIRST_BASELINE: i32 = 30;
const LINE_SPACING: i32 = 25;
const STATUS_GAP: i32 = 10;
const PANEL_BOTTOM_PADDING: i32 = 20;
const TEXT_SCALE: f32 = 20.0;
const STATUS_TEXT_SCALE: f32 = 26.0;
const OUTLINE_THICKNESS: i32 = 2;

/// DejaVu Sans Mono, compiled in so the panel text never depends on host fonts.
static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

pub fn status_color(status: CongestionStatus) -> Rgb<u8> {
    match status {
        CongestionStatus::Smooth => SMOOTH_COLOR,
        CongestionStatus::Congested => CONGESTED_COLOR,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnnotationStyle {
    pub region_alpha: f32,
    pub panel_alpha: f32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            region_alpha: DEFAULT_REGION_ALPHA,
            panel_alpha: DEFAULT_PANEL_ALPHA,
        }
    }
}

/// Draws regions and the statistics panel onto frames.
///
/// Panel text uses the bundled font unless another one is supplied through
/// [`FrameAnnotator::with_font`].
pub struct FrameAnnotator {
    style: AnnotationStyle,
    font: Option<FontArc>,
}

impl FrameAnnotator {
    pub fn new(style: AnnotationStyle) -> Self {
        Self {
            style,
            font: bundled_font(),
        }
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render the overlay for one analysed frame in place.
    pub fn annotate(
        &self,
        image: &mut RgbImage,
        regions: &RegionSet,
        status: CongestionStatus,
        counts: &FrameCounts,
        thresholds: &ThresholdConfig,
    ) {
        let color = status_color(status);
        self.fill_regions(image, regions, color);
        for (_, polygon) in regions.iter() {
            draw_outline(image, polygon, color);
        }
        self.draw_stats_panel(image, status, counts, thresholds);
    }

    fn fill_regions(&self, image: &mut RgbImage, regions: &RegionSet, color: Rgb<u8>) {
        if regions.is_empty() {
            return;
        }
        let mut overlay = image.clone();
        for (_, polygon) in regions.iter() {
            let points = pixel_points(polygon);
            if points.len() >= 2 {
                draw_polygon_mut(&mut overlay, &points, color);
            }
        }
        blend(image, &overlay, self.style.region_alpha);
    }

    fn draw_stats_panel(
        &self,
        image: &mut RgbImage,
        status: CongestionStatus,
        counts: &FrameCounts,
        thresholds: &ThresholdConfig,
    ) {
        let mut lines: Vec<String> = thresholds
            .counted_classes()
            .map(|(class, threshold)| {
                format!(
                    "{}: {} / {}",
                    class.plural_label(),
                    counts.get(class),
                    threshold
                )
            })
            .collect();
        lines.push(format!(
            "Total: {} / {}",
            counts.overall(),
            thresholds.overall()
        ));

        let status_baseline =
            LINE_FIRST_BASELINE + LINE_SPACING * lines.len() as i32 + STATUS_GAP;
        let panel_height = (status_baseline + PANEL_BOTTOM_PADDING) as u32;
        shade_rect(
            image,
            PANEL_X,
            PANEL_Y,
            PANEL_WIDTH,
            panel_height,
            PANEL_COLOR,
            self.style.panel_alpha,
        );

        let Some(font) = &self.font else {
            return;
        };
        let text_x = PANEL_X + 10;
        for (i, line) in lines.iter().enumerate() {
            let baseline = PANEL_Y + LINE_FIRST_BASELINE + LINE_SPACING * i as i32;
            let top = baseline - (TEXT_SCALE * 0.8) as i32;
            draw_text_mut(image, TEXT_COLOR, text_x, top, PxScale::from(TEXT_SCALE), font, line);
        }
        let top = PANEL_Y + status_baseline - (STATUS_TEXT_SCALE * 0.8) as i32;
        draw_text_mut(
            image,
            status_color(status),
            text_x,
            top,
            PxScale::from(STATUS_TEXT_SCALE),
            font,
            &format!("Status: {}", status.label()),
        );
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new(AnnotationStyle::default())
    }
}

/// Load a TrueType/OpenType font from disk.
pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
    FontArc::try_from_vec(bytes).map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))
}

fn bundled_font() -> Option<FontArc> {
    match FontArc::try_from_slice(BUNDLED_FONT) {
        Ok(font) => Some(font),
        Err(e) => {
            log::error!("bundled font is unreadable: {}", e);
            None
        }
    }
}

fn pixel_points(polygon: &Polygon) -> Vec<PixelPoint<i32>> {
    let mut points: Vec<PixelPoint<i32>> = polygon
        .vertices()
        .iter()
        .map(|v| PixelPoint::new(v.x, v.y))
        .collect();
    // The rasteriser closes the polygon itself and rejects an explicit closing vertex.
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn draw_outline(image: &mut RgbImage, polygon: &Polygon, color: Rgb<u8>) {
    for (a, b) in polygon.edges() {
        for offset in 0..OUTLINE_THICKNESS {
            let o = offset as f32;
            draw_line_segment_mut(
                image,
                (a.x as f32 + o, a.y as f32),
                (b.x as f32 + o, b.y as f32),
                color,
            );
            draw_line_segment_mut(
                image,
                (a.x as f32, a.y as f32 + o),
                (b.x as f32, b.y as f32 + o),
                color,
            );
        }
    }
}

/// `image = overlay * alpha + image * (1 - alpha)`, per channel.
fn blend(image: &mut RgbImage, overlay: &RgbImage, alpha: f32) {
    for (dst, src) in image.iter_mut().zip(overlay.iter()) {
        *dst = mix(*src, *dst, alpha);
    }
}

/// Blend a solid rectangle into the image, clipped to the image bounds.
fn shade_rect(
    image: &mut RgbImage,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    color: Rgb<u8>,
    alpha: f32,
) {
    let x0 = x.max(0) as u32;
    let y0 = y.max(0) as u32;
    let x1 = ((x as i64 + width as i64).max(0) as u32).min(image.width());
    let y1 = ((y as i64 + height as i64).max(0) as u32).min(image.height());
    for py in y0..y1 {
        for px in x0..x1 {
            let pixel = image.get_pixel_mut(px, py);
            for c in 0..3 {
                pixel[c] = mix(color[c], pixel[c], alpha);
            }
        }
    }
}

fn mix(top: u8, bottom: u8, alpha: f32) -> u8 {
    let value = top as f32 * alpha + bottom as f32 * (1.0 - alpha);
    value.round().clamp(0.0, 255.0) as u8
}
