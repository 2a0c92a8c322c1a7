//! Text normalization
//!
//! Field-specific clean-up of recognized text, plus the cleaning rule both sides
//! go through before reference and recognized values are compared.

use crate::vision::DetectedField;

/// Type field; the printed "CU" marker is not part of the type
const TYPE_FIELD: &str = "PartBOM_ULType";
const TYPE_MARKER: &str = "CU";

/// Current rating field; the value is kept from the colon onward
const CURRENT_RATING_FIELD: &str = "PartBOM_Current";

/// Fields printed as "Caption: value"; only the value is kept
const CAPTIONED_FIELDS: [&str; 4] = [
    "PartBOM_Voltage",
    "PartBOM_Applicable",
    "PartBOM_StripLength",
    "PartBOM_WireStripLen",
];

/// Characters dropped by [`clean_for_comparison`] besides whitespace
const IGNORED_CHARS: [char; 9] = ['-', '.', ',', '(', ')', '（', '）', ':', '/'];

/// Apply the rule for `field_id` to raw recognized text
pub fn normalize_text(field_id: &str, raw: &str) -> String {
    if field_id == TYPE_FIELD {
        return raw.replace(TYPE_MARKER, "").trim().to_string();
    }

    if field_id == CURRENT_RATING_FIELD {
        return match raw.find(':') {
            Some(idx) => raw[idx..].trim().to_string(),
            None => raw.to_string(),
        };
    }

    if CAPTIONED_FIELDS.contains(&field_id) {
        return match raw.split_once(':') {
            Some((_, value)) => value.trim().to_string(),
            None => raw.to_string(),
        };
    }

    raw.to_string()
}

/// Normalize every detected field once, keeping order
pub fn normalize_fields(fields: Vec<DetectedField>) -> Vec<DetectedField> {
    fields
        .into_iter()
        .map(|f| DetectedField {
            text: normalize_text(&f.field_id, &f.text),
            field_id: f.field_id,
        })
        .collect()
}

/// Lower-case and drop whitespace and punctuation that OCR reads unreliably
pub fn clean_for_comparison(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !IGNORED_CHARS.contains(c))
        .collect()
}
