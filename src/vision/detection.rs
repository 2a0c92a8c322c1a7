//! Detection regions
//!
//! Normalizes raw object-detector output for one image into [`Region`] records and
//! picks the label frame (`inside` / `outside` marker) that decides the label type.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::BoundingBox;
use crate::reference::LabelType;

/// One detector hit as produced by the object-detection engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    /// Detector class label
    #[serde(rename = "class")]
    pub class_label: String,
    /// Box in source-image pixel space
    #[serde(rename = "box")]
    pub bounds: BoundingBox,
    /// Detection confidence (0.0 - 1.0)
    pub confidence: f32,
}

/// A detected candidate label field
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Detector class label, used as the field id downstream
    pub class_label: String,
    /// Box in source-image pixel space
    pub bounds: BoundingBox,
    /// Detection confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Set by the proximity analysis when this region must be recognized on its own crop
    pub requires_isolated_recognition: bool,
}

impl Region {
    pub fn new(class_label: impl Into<String>, bounds: BoundingBox, confidence: f32) -> Self {
        Self {
            class_label: class_label.into(),
            bounds,
            confidence,
            requires_isolated_recognition: false,
        }
    }
}

fn is_frame_marker(class_label: &str, frame_markers: &[String]) -> bool {
    frame_markers
        .iter()
        .any(|m| m.eq_ignore_ascii_case(class_label))
}

/// Turn raw detections into field regions.
///
/// Frame markers are dropped (compared case-insensitively) and confidences are
/// clamped into `[0, 1]`. Boxes with inverted corners are reordered.
pub fn collect_regions(detections: &[RawDetection], frame_markers: &[String]) -> Vec<Region> {
    let regions: Vec<Region> = detections
        .iter()
        .filter(|d| !is_frame_marker(&d.class_label, frame_markers))
        .map(|d| {
            let b = d.bounds;
            let bounds = BoundingBox::new(b.x1.min(b.x2), b.y1.min(b.y2), b.x1.max(b.x2), b.y1.max(b.y2));
            Region::new(d.class_label.clone(), bounds, d.confidence.clamp(0.0, 1.0))
        })
        .collect();

    debug!(
        "Collected {} field regions from {} detections",
        regions.len(),
        detections.len()
    );

    regions
}

/// The label frame chosen for an image
#[derive(Debug, Clone, PartialEq)]
pub struct LabelFrame {
    /// Label type implied by the frame marker
    pub label_type: LabelType,
    /// Box of the winning frame marker, if one was detected
    pub bounds: Option<BoundingBox>,
}

/// Pick the label frame from raw detections.
///
/// The best `inside` marker wins over any `outside` marker; with no marker at all
/// the whole image is treated as an inside label.
pub fn select_label_frame(detections: &[RawDetection]) -> LabelFrame {
    let best = |marker: &str| {
        detections
            .iter()
            .filter(|d| d.class_label.eq_ignore_ascii_case(marker))
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    };

    if let Some(d) = best("inside") {
        return LabelFrame {
            label_type: LabelType::Inside,
            bounds: Some(d.bounds),
        };
    }
    if let Some(d) = best("outside") {
        return LabelFrame {
            label_type: LabelType::Outside,
            bounds: Some(d.bounds),
        };
    }

    info!("No inside/outside frame detected, treating the whole image as an inside label");
    LabelFrame {
        label_type: LabelType::Inside,
        bounds: None,
    }
}
