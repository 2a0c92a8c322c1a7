//! Field mapping table
//!
//! Joins reference columns to detector classes. The table is closed and strictly
//! one-to-one: it is validated when loaded and a bad table is rejected outright.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::reference::{LabelType, ReferenceColumn};

/// Why a field mapping table was rejected
#[derive(Debug, Error, PartialEq)]
pub enum MappingError {
    #[error("field mapping table is empty")]
    Empty,
    #[error("reference column {0} is mapped more than once")]
    DuplicateColumn(ReferenceColumn),
    #[error("detector class '{0}' is mapped to more than one reference column")]
    DuplicateDetectorClass(String),
    #[error("detector class for column {0} is blank")]
    BlankDetectorClass(ReferenceColumn),
    #[error("column {column} is not part of the {label_type} schema")]
    SchemaMismatch {
        column: ReferenceColumn,
        label_type: LabelType,
    },
    #[error("no detector class is mapped to the Partcode column")]
    MissingIdentifier,
    #[error("the Partcode column must apply to both label types, not only {0:?}")]
    IdentifierScope(AppliesTo),
}

/// Label types a mapping entry applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliesTo {
    Inside,
    Outside,
    Both,
}

impl AppliesTo {
    pub fn covers(&self, label_type: LabelType) -> bool {
        match self {
            AppliesTo::Both => true,
            AppliesTo::Inside => label_type == LabelType::Inside,
            AppliesTo::Outside => label_type == LabelType::Outside,
        }
    }
}

/// One row of the mapping table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Reference column holding the expected value
    pub column: ReferenceColumn,
    /// Detector class whose text shows the value on the label
    pub detector_class: String,
    /// Label types this field is checked on
    pub applies_to: AppliesTo,
}

impl FieldMapping {
    fn new(column: ReferenceColumn, detector_class: &str, applies_to: AppliesTo) -> Self {
        Self {
            column,
            detector_class: detector_class.to_string(),
            applies_to,
        }
    }
}

/// On-disk form of a mapping table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FieldTableFile {
    logo_classes: Vec<String>,
    #[serde(rename = "field")]
    fields: Vec<FieldMapping>,
}

/// Validated field mapping plus the logo classes verified by presence only
#[derive(Debug, Clone)]
pub struct FieldTable {
    entries: Vec<FieldMapping>,
    logo_classes: Vec<String>,
    identifier_class: String,
}

/// Detector classes of printed marks, checked by presence rather than content
const LOGO_CLASSES: [&str; 6] = [
    "PML_JISFlag",
    "PML_ULMark",
    "PML_CU",
    "PartBOM_URMark",
    "PartBOM_LogoSA",
    "PartBOM_FactoryCode",
];

impl FieldTable {
    /// Build a table, rejecting anything that is not a one-to-one mapping
    pub fn new(entries: Vec<FieldMapping>, logo_classes: Vec<String>) -> Result<Self, MappingError> {
        if entries.is_empty() {
            return Err(MappingError::Empty);
        }

        let mut columns = HashSet::new();
        let mut classes = HashSet::new();
        for entry in &entries {
            if entry.detector_class.trim().is_empty() {
                return Err(MappingError::BlankDetectorClass(entry.column));
            }
            if !columns.insert(entry.column) {
                return Err(MappingError::DuplicateColumn(entry.column));
            }
            // Detected fields are looked up case-insensitively.
            if !classes.insert(entry.detector_class.to_lowercase()) {
                return Err(MappingError::DuplicateDetectorClass(entry.detector_class.clone()));
            }
            for label_type in [LabelType::Inside, LabelType::Outside] {
                if entry.applies_to.covers(label_type) && !entry.column.in_schema(label_type) {
                    return Err(MappingError::SchemaMismatch {
                        column: entry.column,
                        label_type,
                    });
                }
            }
        }

        let identifier = entries
            .iter()
            .find(|e| e.column == ReferenceColumn::Partcode)
            .ok_or(MappingError::MissingIdentifier)?;
        if identifier.applies_to != AppliesTo::Both {
            return Err(MappingError::IdentifierScope(identifier.applies_to));
        }
        let identifier_class = identifier.detector_class.clone();

        Ok(Self {
            entries,
            logo_classes,
            identifier_class,
        })
    }

    /// The built-in table for the current label layout
    pub fn builtin() -> Self {
        use AppliesTo::{Both, Inside};
        use ReferenceColumn as C;

        let entries = vec![
            FieldMapping::new(C::Partcode, "Partbom_Partcode", Both),
            FieldMapping::new(C::PartName, "PML_CustomerSubPartName", Both),
            FieldMapping::new(C::CatNo, "CatNo", Both),
            FieldMapping::new(C::BoxQty, "PartBOM_BoxQty", Both),
            FieldMapping::new(C::RType, "R_Type", Both),
            FieldMapping::new(C::CompanyName, "PartBOM_CompanyName", Both),
            FieldMapping::new(C::CountryMfg, "PartBOM_RemarkOnProduct", Both),
            FieldMapping::new(C::FactoryCode, "PartBOM_FactoryCode", Both),
            FieldMapping::new(C::Voltage, "PartBOM_Voltage", Inside),
            FieldMapping::new(C::CurrentRating, "PartBOM_Current", Inside),
            FieldMapping::new(C::Applicable, "PartBOM_Applicable", Inside),
            FieldMapping::new(C::UseInCrimp, "PartBOM_UseInCrimp", Inside),
            FieldMapping::new(C::StripLength, "PartBOM_StripLength", Inside),
            FieldMapping::new(C::JisFlag, "PML_JISFlag", Both),
            FieldMapping::new(C::CompanyPlant, "CompanyPlant", Both),
            FieldMapping::new(C::WireSize, "PartBOM_WireSize", Inside),
            FieldMapping::new(C::ToolDies1, "PartBOM_ToolDies1", Inside),
            FieldMapping::new(C::ToolDies2, "PartBOM_ToolDies2", Inside),
            FieldMapping::new(C::ToolDies3, "PartBOM_ToolDies3", Inside),
            FieldMapping::new(C::ToolDies4, "PartBOM_ToolDies4", Inside),
            FieldMapping::new(C::TrayRemark, "PartBOM_TrayRemark", Inside),
            FieldMapping::new(C::UlMark, "PML_ULMark", Inside),
            FieldMapping::new(C::UlType, "PartBOM_ULType", Inside),
            FieldMapping::new(C::PrintingWith, "MUL_PrintingWith", Inside),
            FieldMapping::new(C::CuMark, "PML_CU", Inside),
            FieldMapping::new(C::UrMark, "PartBOM_URMark", Inside),
            FieldMapping::new(C::RemarkType, "PartBOM_RemarkType", Inside),
            FieldMapping::new(C::Remark, "partBOM_Remark", Inside),
            FieldMapping::new(C::CsaMark, "PartBOM_LogoSA", Inside),
            FieldMapping::new(C::CsaRemark, "PartBOM_CSARemark", Inside),
            FieldMapping::new(C::Color, "PartBOM_Color", Inside),
            FieldMapping::new(C::WireStripLength, "PartBOM_WireStripLen", Inside),
        ];

        Self {
            entries,
            logo_classes: LOGO_CLASSES.iter().map(|s| s.to_string()).collect(),
            identifier_class: "Partbom_Partcode".to_string(),
        }
    }

    /// Load and validate a table from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read field mapping: {:?}", path))?;
        let file: FieldTableFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse field mapping: {:?}", path))?;

        let table = Self::new(file.fields, file.logo_classes)
            .with_context(|| format!("Invalid field mapping: {:?}", path))?;
        info!("Loaded {} field mappings from {:?}", table.entries.len(), path);
        Ok(table)
    }

    /// Serialize the table in the format [`FieldTable::from_file`] reads
    pub fn to_toml(&self) -> Result<String> {
        let file = FieldTableFile {
            logo_classes: self.logo_classes.clone(),
            fields: self.entries.clone(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }

    /// Mapping rows in table order
    pub fn entries(&self) -> &[FieldMapping] {
        &self.entries
    }

    /// Detector class carrying the part code
    pub fn identifier_class(&self) -> &str {
        &self.identifier_class
    }

    pub fn is_logo_class(&self, class_label: &str) -> bool {
        self.logo_classes.iter().any(|c| c == class_label)
    }

    pub fn logo_classes(&self) -> &[String] {
        &self.logo_classes
    }
}

impl Default for FieldTable {
    fn default() -> Self {
        Self::builtin()
    }
}
