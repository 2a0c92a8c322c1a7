//! Result annotation
//!
//! Draws the inspected regions, their recognized text and the verdict onto a copy
//! of the source image. Text needs a system font; without one the verdict is shown
//! as a coloured bar.

use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::debug;

use super::verify::Status;
use super::InspectionReport;
use crate::vision::BoundingBox;

const REGION_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const FRAME_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const OK_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
const FAIL_COLOR: Rgb<u8> = Rgb([220, 20, 60]);

/// Banner height in pixels
const BANNER_HEIGHT: u32 = 24;
const LABEL_SCALE: f32 = 16.0;
const STATUS_SCALE: f32 = 24.0;

const FONT_PATHS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Color of the verdict banner
pub fn status_color(status: Status) -> Rgb<u8> {
    match status {
        Status::Ok => OK_COLOR,
        Status::Defect | Status::Error => FAIL_COLOR,
    }
}

/// First usable system font, if any
pub fn load_font() -> Option<FontVec> {
    for path in &FONT_PATHS {
        if let Ok(font_data) = std::fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec(font_data) {
                debug!("Annotation font: {}", path);
                return Some(font);
            }
        }
    }
    debug!("No annotation font found, falling back to a status bar");
    None
}

fn draw_box(canvas: &mut RgbImage, bounds: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    let Some((x, y, w, h)) = bounds.to_pixel_rect(canvas.width(), canvas.height()) else {
        return;
    };

    for t in 0..thickness {
        if w <= 2 * t || h <= 2 * t {
            break;
        }
        let rect = Rect::at((x + t) as i32, (y + t) as i32).of_size(w - 2 * t, h - 2 * t);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// Copy of `image` with region boxes, the label frame and the verdict drawn on it
pub fn annotate(image: &RgbImage, report: &InspectionReport) -> RgbImage {
    annotate_with_font(image, report, load_font().as_ref())
}

/// Like [`annotate`] with an explicit font; `None` draws the status bar instead of text
pub fn annotate_with_font(image: &RgbImage, report: &InspectionReport, font: Option<&FontVec>) -> RgbImage {
    let mut canvas = image.clone();
    if canvas.width() == 0 || canvas.height() == 0 {
        return canvas;
    }

    if let Some(frame) = &report.frame {
        draw_box(&mut canvas, frame, FRAME_COLOR, 1);
    }

    let status = report.outcome.status;
    for region in &report.regions {
        draw_box(&mut canvas, &region.bounds, REGION_COLOR, 2);

        if let Some(font) = font {
            let text = report
                .fields
                .iter()
                .find(|f| f.field_id == region.class_label)
                .map(|f| f.text.as_str())
                .unwrap_or_default();
            let label = format!("{}: {}", region.class_label, text);
            let x = region.bounds.x1.max(0.0) as i32;
            let y = (region.bounds.y1 - LABEL_SCALE - 2.0).max(0.0) as i32;
            draw_text_mut(&mut canvas, REGION_COLOR, x, y, LABEL_SCALE, font, &label);
        }
    }

    match font {
        Some(font) => {
            let caption = format!("Status: {}", status);
            draw_text_mut(&mut canvas, status_color(status), 10, 10, STATUS_SCALE, font, &caption);
        }
        None => {
            let banner = Rect::at(0, 0).of_size(canvas.width(), BANNER_HEIGHT.min(canvas.height()));
            draw_filled_rect_mut(&mut canvas, banner, status_color(status));
        }
    }

    canvas
}
