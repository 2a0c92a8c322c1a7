//! OCR (Optical Character Recognition) module
//!
//! The recognition engine itself is an injected service: anything that can read
//! text fragments out of a whole image and out of a crop implements [`OcrEngine`].
//! [`FragmentReplay`] serves previously recorded whole-image results.

use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use super::{polygon_to_bounds, BoundingBox, Crop};

/// Errors raised by a recognition engine
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The engine failed while reading the image
    #[error("recognition failed in engine '{engine}': {reason}")]
    Engine { engine: String, reason: String },
}

/// A piece of recognized text with its box
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    /// Bounding box (whole-image pass: source coordinates, crop pass: crop coordinates)
    pub bounds: BoundingBox,
    /// Recognized text
    pub text: String,
}

/// Single OCR detection result as engines commonly report it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    /// Recognized text
    pub text: String,
    /// Where the text was found
    #[serde(flatten)]
    pub shape: FragmentShape,
}

/// Location of a recognized fragment, either as a polygon or an axis-aligned box
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentShape {
    Polygon(Vec<(f32, f32)>),
    #[serde(rename = "box")]
    Bounds(BoundingBox),
}

impl From<OcrResult> for TextFragment {
    fn from(r: OcrResult) -> Self {
        let bounds = match r.shape {
            FragmentShape::Polygon(points) => polygon_to_bounds(&points),
            FragmentShape::Bounds(b) => b,
        };
        TextFragment { bounds, text: r.text }
    }
}

/// A text-recognition engine.
///
/// Implementations may be expensive to construct but must be callable repeatedly;
/// the pipeline holds no per-call state in them.
pub trait OcrEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &str;

    /// Recognize every text fragment in a whole image, in reading order of the engine
    fn recognize(&self, image: &RgbImage) -> Result<Vec<TextFragment>, RecognitionError>;

    /// Recognize the text in one cropped region
    fn recognize_crop(&self, crop: &Crop) -> Result<Vec<TextFragment>, RecognitionError>;
}

/// Engine that replays recorded whole-image fragments.
///
/// A crop is answered with the recorded fragments whose center lies inside the
/// crop's origin box, translated into crop coordinates.
#[derive(Debug, Clone, Default)]
pub struct FragmentReplay {
    fragments: Vec<TextFragment>,
}

impl FragmentReplay {
    pub fn new(fragments: Vec<TextFragment>) -> Self {
        Self { fragments }
    }

    /// Load recorded results from a JSON array of `{text, polygon | box}`; other keys are ignored
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read OCR results: {:?}", path))?;
        let results: Vec<OcrResult> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse OCR results: {:?}", path))?;

        debug!("Loaded {} recorded OCR fragments from {:?}", results.len(), path);
        Ok(Self::new(results.into_iter().map(TextFragment::from).collect()))
    }
}

impl OcrEngine for FragmentReplay {
    fn name(&self) -> &str {
        "replay"
    }

    fn recognize(&self, _image: &RgbImage) -> Result<Vec<TextFragment>, RecognitionError> {
        Ok(self.fragments.clone())
    }

    fn recognize_crop(&self, crop: &Crop) -> Result<Vec<TextFragment>, RecognitionError> {
        let origin = crop.origin;
        Ok(self
            .fragments
            .iter()
            .filter(|f| origin.contains(f.bounds.center()))
            .map(|f| TextFragment {
                bounds: BoundingBox::new(
                    f.bounds.x1 - origin.x1,
                    f.bounds.y1 - origin.y1,
                    f.bounds.x2 - origin.x1,
                    f.bounds.y2 - origin.y1,
                ),
                text: f.text.clone(),
            })
            .collect())
    }
}
