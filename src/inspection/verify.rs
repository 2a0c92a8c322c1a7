//! Verification engine
//!
//! Compares normalized label fields against the reference record for the part and
//! classifies every required field as matched, missing or mismatched. Failures of
//! the reference lookup are folded into the outcome; nothing here returns `Err`.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

use super::fields::FieldTable;
use super::normalize::clean_for_comparison;
use crate::reference::{
    normalize_identifier, resolve_reference, LabelType, ReferenceColumn, ReferenceRecord, ReferenceStore,
    ResolveError, StoreError,
};
use crate::vision::DetectedField;

/// Recognized value reported for a field the label does not show
pub const NOT_DETECTED: &str = "Not Detected";
/// Placeholder for a value that does not exist
pub const NOT_AVAILABLE: &str = "N/A";

/// Overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Every required field matched
    Ok,
    /// The label is missing or misprints at least one field
    Defect,
    /// Verification could not be completed; not a judgement on the label
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::Defect => f.write_str("DEFECT"),
            Status::Error => f.write_str("ERROR"),
        }
    }
}

/// Why a field was reported as a defect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefectReason {
    Missing,
    Mismatch,
    NotFoundInReference,
    InvalidIdentifier,
    ConnectionError,
    ProcessingException,
}

impl fmt::Display for DefectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DefectReason::Missing => "Missing",
            DefectReason::Mismatch => "Mismatch",
            DefectReason::NotFoundInReference => "Not Found in Reference",
            DefectReason::InvalidIdentifier => "Invalid Identifier",
            DefectReason::ConnectionError => "Connection Error",
            DefectReason::ProcessingException => "Processing Exception",
        };
        f.write_str(label)
    }
}

/// A field whose printed value agrees with the reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedItem {
    pub field: String,
    pub reference_value: String,
    pub recognized_value: String,
}

/// A field that failed verification, or a synthetic entry describing a failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefectItem {
    pub field: String,
    pub reason: DefectReason,
    pub reference_value: String,
    pub recognized_value: String,
}

impl DefectItem {
    fn new(
        field: impl Into<String>,
        reason: DefectReason,
        reference_value: impl Into<String>,
        recognized_value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            reason,
            reference_value: reference_value.into(),
            recognized_value: recognized_value.into(),
        }
    }
}

/// Verdict of one verification call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonOutcome {
    pub status: Status,
    pub matched: Vec<MatchedItem>,
    pub defects: Vec<DefectItem>,
}

impl ComparisonOutcome {
    /// Outcome of a full comparison; `OK` exactly when there are no defects
    pub fn from_items(matched: Vec<MatchedItem>, defects: Vec<DefectItem>) -> Self {
        let status = if defects.is_empty() { Status::Ok } else { Status::Defect };
        Self {
            status,
            matched,
            defects,
        }
    }

    /// Label judged defective before any field could be compared
    pub fn rejected(defect: DefectItem) -> Self {
        Self {
            status: Status::Defect,
            matched: vec![],
            defects: vec![defect],
        }
    }

    /// Store could not be reached
    pub fn connection_error(description: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            matched: vec![],
            defects: vec![DefectItem::new(
                "Database",
                DefectReason::ConnectionError,
                description,
                NOT_AVAILABLE,
            )],
        }
    }

    /// Any other failure; the description travels in the reference value slot
    pub fn processing_error(description: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            matched: vec![],
            defects: vec![DefectItem::new(
                "Processing",
                DefectReason::ProcessingException,
                description,
                NOT_AVAILABLE,
            )],
        }
    }
}

/// Clean a value for comparison; the part code additionally loses leading zeros
fn comparable(text: &str, is_identifier: bool) -> String {
    let cleaned = clean_for_comparison(text);
    if is_identifier {
        cleaned.trim_start_matches('0').to_string()
    } else {
        cleaned
    }
}

/// Compare detected fields against a reference record.
///
/// Walks the mapping table in order. Columns the record's schema lacks, or whose
/// reference value is not required, are never evaluated. Logo classes match on
/// presence alone.
pub fn compare(fields: &[DetectedField], record: &ReferenceRecord, table: &FieldTable) -> ComparisonOutcome {
    let label_type = record.label_type();

    // Later duplicates of a class win.
    let detected: HashMap<String, &str> = fields
        .iter()
        .map(|f| (f.field_id.to_lowercase(), f.text.as_str()))
        .collect();

    let mut matched = Vec::new();
    let mut defects = Vec::new();

    for entry in table.entries() {
        if !entry.applies_to.covers(label_type) {
            continue;
        }
        let Some(reference) = record.get(entry.column) else {
            continue;
        };
        if !reference.is_required() {
            continue;
        }

        let reference_value = reference.to_string();
        let class = entry.detector_class.as_str();

        let Some(recognized) = detected.get(&class.to_lowercase()) else {
            debug!("{}: required but not detected", class);
            defects.push(DefectItem::new(class, DefectReason::Missing, reference_value, NOT_DETECTED));
            continue;
        };

        let is_identifier = entry.column == ReferenceColumn::Partcode;
        let is_match = table.is_logo_class(class)
            || comparable(&reference_value, is_identifier) == comparable(recognized, is_identifier);

        if is_match {
            matched.push(MatchedItem {
                field: class.to_string(),
                reference_value,
                recognized_value: recognized.to_string(),
            });
        } else {
            debug!("{}: expected {:?}, read {:?}", class, reference_value, recognized);
            defects.push(DefectItem::new(
                class,
                DefectReason::Mismatch,
                reference_value,
                recognized.to_string(),
            ));
        }
    }

    ComparisonOutcome::from_items(matched, defects)
}

/// Verify a label: validate the part code, fetch its reference record and compare.
///
/// The part code is checked locally first; an absent or unreadable code never
/// reaches the store.
pub fn verify_label(
    fields: &[DetectedField],
    store: &dyn ReferenceStore,
    label_type: LabelType,
    table: &FieldTable,
) -> ComparisonOutcome {
    let identifier_field = ReferenceColumn::Partcode.as_str();
    let identifier_class = table.identifier_class();

    let raw_code = fields
        .iter()
        .find(|f| f.field_id.eq_ignore_ascii_case(identifier_class))
        .map(|f| f.text.as_str())
        .filter(|text| !text.is_empty());

    let Some(raw_code) = raw_code else {
        info!("Part code not detected on label");
        return ComparisonOutcome::rejected(DefectItem::new(
            identifier_field,
            DefectReason::Missing,
            NOT_AVAILABLE,
            NOT_DETECTED,
        ));
    };

    if normalize_identifier(raw_code).is_none() {
        info!("Part code {:?} is unreadable", raw_code);
        return ComparisonOutcome::rejected(DefectItem::new(
            identifier_field,
            DefectReason::InvalidIdentifier,
            NOT_AVAILABLE,
            raw_code,
        ));
    }

    let record = match resolve_reference(store, raw_code, label_type) {
        Ok(record) => record,
        Err(ResolveError::InvalidIdentifier { raw }) => {
            return ComparisonOutcome::rejected(DefectItem::new(
                identifier_field,
                DefectReason::InvalidIdentifier,
                NOT_AVAILABLE,
                raw,
            ));
        }
        Err(ResolveError::NotFound { part_code, label_type }) => {
            info!("Part code {} has no {} reference", part_code, label_type);
            return ComparisonOutcome::rejected(DefectItem::new(
                identifier_field,
                DefectReason::NotFoundInReference,
                NOT_AVAILABLE,
                raw_code,
            ));
        }
        Err(ResolveError::Store(err @ StoreError::Connection { .. })) => {
            warn!("Reference lookup failed: {}", err);
            return ComparisonOutcome::connection_error(err.to_string());
        }
        Err(ResolveError::Store(err)) => {
            warn!("Reference lookup failed: {}", err);
            return ComparisonOutcome::processing_error(err.to_string());
        }
    };

    if record.label_type() != label_type {
        warn!("Store returned a {} record for a {} label", record.label_type(), label_type);
        return ComparisonOutcome::processing_error(format!(
            "reference store returned a {} record for a {} label",
            record.label_type(),
            label_type
        ));
    }

    compare(fields, &record, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspection::normalize::normalize_fields;
    use crate::reference::FieldValue;
    use crate::vision::router::PRESENCE_SENTINEL;
    use std::cell::Cell;

    /// Store serving one fixed answer and counting lookups
    struct FixedStore {
        answer: Result<Option<ReferenceRecord>, fn() -> StoreError>,
        calls: Cell<usize>,
    }

    impl FixedStore {
        fn with(record: ReferenceRecord) -> Self {
            Self {
                answer: Ok(Some(record)),
                calls: Cell::new(0),
            }
        }

        fn empty() -> Self {
            Self {
                answer: Ok(None),
                calls: Cell::new(0),
            }
        }

        fn failing(err: fn() -> StoreError) -> Self {
            Self {
                answer: Err(err),
                calls: Cell::new(0),
            }
        }
    }

    impl ReferenceStore for FixedStore {
        fn fetch(&self, _: &str, _: LabelType) -> Result<Option<ReferenceRecord>, StoreError> {
            self.calls.set(self.calls.get() + 1);
            match &self.answer {
                Ok(record) => Ok(record.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn field(id: &str, text: &str) -> DetectedField {
        DetectedField::new(id, text)
    }

    fn inside() -> ReferenceRecord {
        ReferenceRecord::empty(LabelType::Inside)
    }

    #[test]
    fn test_part_code_zeros_and_type_marker_match() {
        let record = inside()
            .with(ReferenceColumn::Partcode, "00123")
            .with(ReferenceColumn::UlMark, "1")
            .with(ReferenceColumn::UlType, "ABC");
        let fields = normalize_fields(vec![
            field("Partbom_Partcode", "123"),
            field("PML_ULMark", PRESENCE_SENTINEL),
            field("PartBOM_ULType", "CU ABC"),
        ]);
        let store = FixedStore::with(record);

        let outcome = verify_label(&fields, &store, LabelType::Inside, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Ok);
        assert_eq!(outcome.matched.len(), 3);
        assert!(outcome.defects.is_empty());
        assert_eq!(outcome.matched[2].recognized_value, "ABC");
    }

    #[test]
    fn test_required_field_not_detected_is_missing() {
        let record = inside()
            .with(ReferenceColumn::Partcode, "123")
            .with(ReferenceColumn::CompanyName, "ACME");
        let fields = vec![field("Partbom_Partcode", "123")];

        let outcome = compare(&fields, &record, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Defect);
        assert_eq!(
            outcome.defects,
            vec![DefectItem::new("PartBOM_CompanyName", DefectReason::Missing, "ACME", NOT_DETECTED)]
        );
        assert_eq!(outcome.matched.len(), 1);
    }

    #[test]
    fn test_current_rating_mismatch() {
        let record = inside()
            .with(ReferenceColumn::Partcode, "123")
            .with(ReferenceColumn::CurrentRating, "RATED: 5A");
        let fields = normalize_fields(vec![
            field("Partbom_Partcode", "123"),
            field("PartBOM_Current", "junk:5A"),
        ]);

        let outcome = compare(&fields, &record, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Defect);
        assert_eq!(outcome.defects.len(), 1);
        let defect = &outcome.defects[0];
        assert_eq!(defect.field, "PartBOM_Current");
        assert_eq!(defect.reason, DefectReason::Mismatch);
        assert_eq!(defect.reference_value, "RATED: 5A");
        assert_eq!(defect.recognized_value, ":5A");
    }

    #[test]
    fn test_unreadable_part_code_skips_store() {
        let store = FixedStore::empty();
        let fields = vec![field("Partbom_Partcode", "000")];

        let outcome = verify_label(&fields, &store, LabelType::Inside, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Defect);
        assert_eq!(outcome.defects.len(), 1);
        assert_eq!(outcome.defects[0].reason, DefectReason::InvalidIdentifier);
        assert_eq!(outcome.defects[0].recognized_value, "000");
        assert!(outcome.matched.is_empty());
        assert_eq!(store.calls.get(), 0);
    }

    #[test]
    fn test_absent_part_code_is_missing() {
        let store = FixedStore::empty();

        for fields in [vec![field("CatNo", "X")], vec![field("partbom_partcode", "")]] {
            let outcome = verify_label(&fields, &store, LabelType::Inside, &FieldTable::builtin());
            assert_eq!(outcome.status, Status::Defect);
            assert_eq!(outcome.defects[0].reason, DefectReason::Missing);
            assert_eq!(outcome.defects[0].field, "Partcode");
        }
        assert_eq!(store.calls.get(), 0);
    }

    #[test]
    fn test_part_code_lookup_is_case_insensitive() {
        let store = FixedStore::with(inside().with(ReferenceColumn::Partcode, "55"));
        let fields = vec![field("PARTBOM_PARTCODE", "055")];

        let outcome = verify_label(&fields, &store, LabelType::Inside, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Ok);
        assert_eq!(outcome.matched[0].field, "Partbom_Partcode");
        assert_eq!(store.calls.get(), 1);
    }

    #[test]
    fn test_not_found_in_reference() {
        let store = FixedStore::empty();
        let fields = vec![field("Partbom_Partcode", "42")];

        let outcome = verify_label(&fields, &store, LabelType::Outside, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Defect);
        assert_eq!(outcome.defects[0].reason, DefectReason::NotFoundInReference);
        assert_eq!(outcome.defects[0].recognized_value, "42");
        assert!(outcome.matched.is_empty());
    }

    #[test]
    fn test_connection_fault_is_error() {
        let store = FixedStore::failing(|| StoreError::connection("network unreachable"));
        let fields = vec![field("Partbom_Partcode", "42")];

        let outcome = verify_label(&fields, &store, LabelType::Inside, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.defects.len(), 1);
        assert_eq!(outcome.defects[0].reason, DefectReason::ConnectionError);
        assert!(outcome.defects[0].reference_value.contains("network unreachable"));
        assert!(outcome.matched.is_empty());
    }

    #[test]
    fn test_decode_fault_is_processing_error() {
        let store = FixedStore::failing(|| StoreError::Decode {
            column: "CatNo".to_string(),
            reason: "binary value".to_string(),
        });
        let fields = vec![field("Partbom_Partcode", "42")];

        let outcome = verify_label(&fields, &store, LabelType::Inside, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.defects[0].reason, DefectReason::ProcessingException);
        assert!(outcome.defects[0].reference_value.contains("CatNo"));
    }

    #[test]
    fn test_wrong_schema_from_store_is_processing_error() {
        let store = FixedStore::with(ReferenceRecord::empty(LabelType::Outside).with(ReferenceColumn::Partcode, "42"));
        let fields = vec![field("Partbom_Partcode", "42")];

        let outcome = verify_label(&fields, &store, LabelType::Inside, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.defects[0].reason, DefectReason::ProcessingException);
    }

    #[test]
    fn test_logo_class_matches_on_presence() {
        let record = inside()
            .with(ReferenceColumn::Partcode, "1")
            .with(ReferenceColumn::CsaMark, "CSA certified, see remark")
            .with(ReferenceColumn::FactoryCode, "F7");
        let fields = vec![
            field("Partbom_Partcode", "1"),
            field("PartBOM_LogoSA", PRESENCE_SENTINEL),
            field("PartBOM_FactoryCode", PRESENCE_SENTINEL),
        ];

        let outcome = compare(&fields, &record, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Ok);
        assert_eq!(outcome.matched.len(), 3);
    }

    #[test]
    fn test_not_required_fields_are_ignored() {
        let record = inside()
            .with(ReferenceColumn::Partcode, "1")
            .with(ReferenceColumn::UlMark, 0)
            .with(ReferenceColumn::Voltage, "")
            .with(ReferenceColumn::Color, "0");
        let fields = vec![
            field("Partbom_Partcode", "1"),
            field("PartBOM_Voltage", "999V"),
        ];

        let outcome = compare(&fields, &record, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Ok);
        assert_eq!(outcome.matched.len(), 1);
    }

    #[test]
    fn test_unmapped_detections_are_ignored() {
        let record = inside().with(ReferenceColumn::Partcode, "1");
        let fields = vec![field("Partbom_Partcode", "1"), field("Barcode", "anything")];

        let outcome = compare(&fields, &record, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Ok);
        assert_eq!(outcome.matched.len(), 1);
    }

    #[test]
    fn test_outside_record_skips_inside_only_columns() {
        let record = ReferenceRecord::empty(LabelType::Outside)
            .with(ReferenceColumn::Partcode, "1")
            .with(ReferenceColumn::BoxQty, 500);
        let fields = vec![field("Partbom_Partcode", "1"), field("PartBOM_BoxQty", "500")];

        let outcome = compare(&fields, &record, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Ok);
        assert_eq!(outcome.matched[1].reference_value, "500");
    }

    #[test]
    fn test_detected_but_empty_text_is_mismatch() {
        let record = inside()
            .with(ReferenceColumn::Partcode, "1")
            .with(ReferenceColumn::CatNo, "SVH-21T");
        let fields = vec![field("Partbom_Partcode", "1"), field("CatNo", "")];

        let outcome = compare(&fields, &record, &FieldTable::builtin());
        assert_eq!(outcome.defects[0].reason, DefectReason::Mismatch);
    }

    #[test]
    fn test_cleaning_tolerates_punctuation_and_case() {
        let record = inside()
            .with(ReferenceColumn::Partcode, "1")
            .with(ReferenceColumn::CatNo, "SVH-21T-P1.1")
            .with(ReferenceColumn::WireSize, "AWG 22 (0.33)");
        let fields = vec![
            field("Partbom_Partcode", "1"),
            field("CatNo", "svh 21t p11"),
            field("PartBOM_WireSize", "AWG22（0,33）"),
        ];

        let outcome = compare(&fields, &record, &FieldTable::builtin());
        assert_eq!(outcome.status, Status::Ok);
    }

    #[test]
    fn test_leading_zeros_only_stripped_for_part_code() {
        let record = inside()
            .with(ReferenceColumn::Partcode, "1")
            .with(ReferenceColumn::ToolDies1, "0045");
        let fields = vec![field("Partbom_Partcode", "1"), field("PartBOM_ToolDies1", "45")];

        let outcome = compare(&fields, &record, &FieldTable::builtin());
        assert_eq!(outcome.defects[0].field, "PartBOM_ToolDies1");
        assert_eq!(outcome.defects[0].reason, DefectReason::Mismatch);
    }

    #[test]
    fn test_status_tracks_defects_and_is_idempotent() {
        let record = inside()
            .with(ReferenceColumn::Partcode, "1")
            .with(ReferenceColumn::CatNo, "A")
            .with(ReferenceColumn::Color, "RED")
            .with(ReferenceColumn::BoxQty, FieldValue::Integer(10));
        let cases = vec![
            vec![field("Partbom_Partcode", "1"), field("CatNo", "A"), field("PartBOM_Color", "red"), field("PartBOM_BoxQty", "10")],
            vec![field("Partbom_Partcode", "1"), field("CatNo", "B"), field("PartBOM_Color", "red")],
            vec![field("Partbom_Partcode", "1")],
        ];

        for fields in cases {
            let first = compare(&fields, &record, &FieldTable::builtin());
            let second = compare(&fields, &record, &FieldTable::builtin());
            assert_eq!(first, second);
            assert_eq!(first.status == Status::Ok, first.defects.is_empty());
            assert_eq!(first.matched.len() + first.defects.len(), 4);
        }
    }

    #[test]
    fn test_results_follow_table_order() {
        let record = inside()
            .with(ReferenceColumn::Partcode, "1")
            .with(ReferenceColumn::CatNo, "A")
            .with(ReferenceColumn::WireStripLength, "3mm");
        let fields = vec![
            field("PartBOM_WireStripLen", "3mm"),
            field("CatNo", "A"),
            field("Partbom_Partcode", "1"),
        ];

        let outcome = compare(&fields, &record, &FieldTable::builtin());
        let order: Vec<&str> = outcome.matched.iter().map(|m| m.field.as_str()).collect();
        assert_eq!(order, vec!["Partbom_Partcode", "CatNo", "PartBOM_WireStripLen"]);
    }
}
