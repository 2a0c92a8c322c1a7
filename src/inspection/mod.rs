//! Label Inspection
//!
//! End-to-end pipeline for one label image: detections are turned into regions,
//! text is attributed to each region, normalized, and verified against the
//! reference record of the part.

pub mod annotate;
pub mod fields;
pub mod normalize;
pub mod verify;

pub use annotate::annotate;
pub use fields::FieldTable;
pub use verify::{verify_label, ComparisonOutcome, Status};

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::reference::{LabelType, ReferenceStore};
use crate::vision::{
    assign_text, collect_regions, mark_adjacent_regions, select_label_frame, BoundingBox, DetectedField,
    OcrEngine, RawDetection, Region,
};

/// How the label type of an image is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LabelSelection {
    Inside,
    Outside,
    /// Decided by the detected label frame marker
    #[default]
    Auto,
}

/// Everything produced by one inspection
#[derive(Debug, Clone, Serialize)]
pub struct InspectionReport {
    pub request_id: String,
    pub label_type: LabelType,
    /// Label frame box, when one was detected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<BoundingBox>,
    #[serde(skip)]
    pub regions: Vec<Region>,
    /// Normalized text per detected region
    pub fields: Vec<DetectedField>,
    #[serde(flatten)]
    pub outcome: ComparisonOutcome,
}

/// Runs the inspection pipeline against one recognition engine and reference store
pub struct Inspector {
    engine: Box<dyn OcrEngine>,
    store: Box<dyn ReferenceStore>,
    fields: FieldTable,
    frame_markers: Vec<String>,
}

impl Inspector {
    pub fn new(
        engine: Box<dyn OcrEngine>,
        store: Box<dyn ReferenceStore>,
        fields: FieldTable,
        frame_markers: Vec<String>,
    ) -> Self {
        Self {
            engine,
            store,
            fields,
            frame_markers,
        }
    }

    /// Inspect one label image.
    ///
    /// Never fails: recognition faults and reference lookup faults are reported
    /// as an `ERROR` outcome.
    pub fn inspect(&self, image: &RgbImage, detections: &[RawDetection], selection: LabelSelection) -> InspectionReport {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("inspect", request_id = %request_id);
        let _enter = span.enter();

        let frame = select_label_frame(detections);
        let label_type = match selection {
            LabelSelection::Inside => LabelType::Inside,
            LabelSelection::Outside => LabelType::Outside,
            LabelSelection::Auto => frame.label_type,
        };

        let mut regions = collect_regions(detections, &self.frame_markers);
        let pairs = mark_adjacent_regions(&mut regions);
        info!(
            "Inspecting {} label: {} regions, {} adjacent pairs",
            label_type,
            regions.len(),
            pairs
        );

        let recognized = self
            .engine
            .recognize(image)
            .and_then(|global| assign_text(&regions, image, self.engine.as_ref(), &global, &self.fields));

        let (fields, outcome) = match recognized {
            Ok(detected) => {
                let fields = normalize::normalize_fields(detected);
                let outcome = verify_label(&fields, self.store.as_ref(), label_type, &self.fields);
                (fields, outcome)
            }
            Err(err) => {
                warn!("Text recognition failed: {}", err);
                (vec![], ComparisonOutcome::processing_error(err.to_string()))
            }
        };

        info!(
            "Verdict {}: {} matched, {} defects",
            outcome.status,
            outcome.matched.len(),
            outcome.defects.len()
        );

        InspectionReport {
            request_id,
            label_type,
            frame: frame.bounds,
            regions,
            fields,
            outcome,
        }
    }
}
