//! Vision Layer
//!
//! Geometry shared by detection regions and OCR fragments, plus the pieces of the
//! pipeline that turn detector boxes into field text:
//! - region collection from raw detector output
//! - proximity analysis (isolated vs. global recognition)
//! - OCR engine abstraction and the recognition strategy router

pub mod detection;
pub mod ocr;
pub mod proximity;
pub mod router;

pub use detection::{collect_regions, select_label_frame, RawDetection, Region};
pub use ocr::{FragmentReplay, OcrEngine, RecognitionError, TextFragment};
pub use proximity::mark_adjacent_regions;
pub use router::{assign_text, DetectedField};

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in source-image pixel space, corners (x1, y1) - (x2, y2)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
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

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Center point of the box
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Inclusive containment test
    pub fn contains(&self, point: (f32, f32)) -> bool {
        let (px, py) = point;
        self.x1 <= px && px <= self.x2 && self.y1 <= py && py <= self.y2
    }

    /// Snap to integer pixels and clamp to an image of the given size.
    ///
    /// Returns `(x, y, width, height)`, or `None` when nothing of the box is left.
    pub fn to_pixel_rect(&self, img_width: u32, img_height: u32) -> Option<(u32, u32, u32, u32)> {
        let clamp = |v: f32, max: u32| -> u32 { (v.max(0.0) as u32).min(max) };

        let x1 = clamp(self.x1, img_width);
        let y1 = clamp(self.y1, img_height);
        let x2 = clamp(self.x2, img_width);
        let y2 = clamp(self.y2, img_height);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Convert polygon points to their axis-aligned bounding box
pub fn polygon_to_bounds(polygon: &[(f32, f32)]) -> BoundingBox {
    if polygon.is_empty() {
        return BoundingBox::new(0.0, 0.0, 0.0, 0.0);
    }

    let min_x = polygon.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
    let min_y = polygon.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
    let max_x = polygon.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
    let max_y = polygon.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);

    BoundingBox::new(min_x, min_y, max_x, max_y)
}

/// A sub-image cut out of the source frame, remembering where it came from
#[derive(Debug, Clone)]
pub struct Crop {
    /// Cropped pixels
    pub image: RgbImage,
    /// Box of the crop in source-image coordinates
    pub origin: BoundingBox,
}

/// Extract a region from the source image.
///
/// Returns `None` for a degenerate (zero-area) region.
pub fn extract_region(image: &RgbImage, bounds: &BoundingBox) -> Option<Crop> {
    let (x, y, width, height) = bounds.to_pixel_rect(image.width(), image.height())?;
    let cropped = image::imageops::crop_imm(image, x, y, width, height).to_image();

    Some(Crop {
        image: cropped,
        origin: BoundingBox::new(x as f32, y as f32, (x + width) as f32, (y + height) as f32),
    })
}
