//! Recognition strategy router
//!
//! Decides per region how its text is obtained: presence marker for logo classes,
//! isolated OCR on the region crop for flagged regions, or attribution by
//! containment from the whole-image OCR pass for everything else.

use image::RgbImage;
use serde::Serialize;
use tracing::debug;

use super::{extract_region, OcrEngine, RecognitionError, Region, TextFragment};
use crate::inspection::fields::FieldTable;

/// Text assigned to logo-class regions: the mark is present
pub const PRESENCE_SENTINEL: &str = "TERDETEKSI";

/// Resolved text for one detected region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedField {
    /// Detector class label
    pub field_id: String,
    /// Recognized text, possibly empty
    pub text: String,
}

impl DetectedField {
    pub fn new(field_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            text: text.into(),
        }
    }
}

fn join_texts<'a>(texts: impl Iterator<Item = &'a str>) -> String {
    texts.collect::<Vec<_>>().join(" ")
}

/// Text of every global fragment whose center lies inside the region box
fn contained_text(region: &Region, global: &[TextFragment]) -> String {
    join_texts(
        global
            .iter()
            .filter(|f| region.bounds.contains(f.bounds.center()))
            .map(|f| f.text.as_str()),
    )
}

/// Run OCR on the region crop alone
fn isolated_text(
    region: &Region,
    image: &RgbImage,
    engine: &dyn OcrEngine,
) -> Result<String, RecognitionError> {
    let Some(crop) = extract_region(image, &region.bounds) else {
        debug!("Degenerate crop for '{}', leaving text empty", region.class_label);
        return Ok(String::new());
    };

    debug!(
        "'{}' ({:.2}): {}x{} crop via {}",
        region.class_label,
        region.confidence,
        crop.image.width(),
        crop.image.height(),
        engine.name()
    );
    let fragments = engine.recognize_crop(&crop)?;
    Ok(join_texts(fragments.iter().map(|f| f.text.as_str())))
}

/// Produce one [`DetectedField`] per region.
///
/// Output is ordered top-to-bottom, then left-to-right, by region box.
/// `global` holds the fragments of the single whole-image OCR pass.
pub fn assign_text(
    regions: &[Region],
    image: &RgbImage,
    engine: &dyn OcrEngine,
    global: &[TextFragment],
    fields: &FieldTable,
) -> Result<Vec<DetectedField>, RecognitionError> {
    let mut ordered: Vec<&Region> = regions.iter().collect();
    ordered.sort_by(|a, b| {
        (a.bounds.y1, a.bounds.x1)
            .partial_cmp(&(b.bounds.y1, b.bounds.x1))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut detected = Vec::with_capacity(ordered.len());
    for region in ordered {
        let text = if fields.is_logo_class(&region.class_label) {
            debug!("'{}': logo class, presence only", region.class_label);
            PRESENCE_SENTINEL.to_string()
        } else if region.requires_isolated_recognition {
            isolated_text(region, image, engine)?
        } else {
            contained_text(region, global)
        };

        detected.push(DetectedField::new(region.class_label.clone(), text));
    }

    Ok(detected)
}
