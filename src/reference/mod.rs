//! Reference Data
//!
//! Reference records describe what a part's label must show. There is one schema
//! per label type: inside labels carry the full set of columns, outside labels a
//! strict subset of them.

pub mod resolver;

pub use resolver::{normalize_identifier, resolve_reference, ResolveError};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which label of the part is being inspected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelType {
    /// Label inside the packaging (full schema)
    #[default]
    Inside,
    /// Label on the outer packaging (reduced schema)
    Outside,
}

impl LabelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelType::Inside => "inside",
            LabelType::Outside => "outside",
        }
    }
}

impl fmt::Display for LabelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a reference store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the query failed
    #[error("reference store unavailable: {reason}")]
    Connection { reason: String },
    /// A returned cell could not be represented as a reference value
    #[error("cannot read column '{column}': {reason}")]
    Decode { column: String, reason: String },
}

impl StoreError {
    pub fn connection(err: impl fmt::Display) -> Self {
        StoreError::Connection {
            reason: err.to_string(),
        }
    }
}

/// Source of reference records, one row per part code and label type
pub trait ReferenceStore {
    /// Look up the record for an already normalized part code
    fn fetch(&self, part_code: &str, label_type: LabelType) -> Result<Option<ReferenceRecord>, StoreError>;
}

/// Scalar value of a reference column
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Integer(i64),
    Text(String),
}

impl FieldValue {
    /// Text form of the value, `None` for null
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Integer(v) => Some(v.to_string()),
            FieldValue::Text(s) => Some(s.clone()),
        }
    }

    /// Whether the label must show this value: non-null, and neither blank nor "0"
    pub fn is_required(&self) -> bool {
        match self.as_text() {
            Some(text) => {
                let text = text.trim();
                !text.is_empty() && text != "0"
            }
            None => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("None"),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v.into())
    }
}

/// Columns a reference record may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceColumn {
    Partcode,
    PartName,
    CatNo,
    BoxQty,
    RType,
    CompanyName,
    CountryMfg,
    FactoryCode,
    Voltage,
    CurrentRating,
    Applicable,
    UseInCrimp,
    StripLength,
    #[serde(rename = "JISFlag")]
    JisFlag,
    CompanyPlant,
    WireSize,
    ToolDies1,
    ToolDies2,
    ToolDies3,
    ToolDies4,
    TrayRemark,
    #[serde(rename = "ULMark")]
    UlMark,
    #[serde(rename = "ULType")]
    UlType,
    PrintingWith,
    #[serde(rename = "CUMark")]
    CuMark,
    #[serde(rename = "URMark")]
    UrMark,
    RemarkType,
    Remark,
    #[serde(rename = "CSAMark")]
    CsaMark,
    #[serde(rename = "CSARemark")]
    CsaRemark,
    Color,
    WireStripLength,
}

impl ReferenceColumn {
    /// Columns of the inside schema, in storage order
    pub const INSIDE: [ReferenceColumn; 32] = [
        ReferenceColumn::Partcode,
        ReferenceColumn::PartName,
        ReferenceColumn::CatNo,
        ReferenceColumn::BoxQty,
        ReferenceColumn::RType,
        ReferenceColumn::CompanyName,
        ReferenceColumn::CountryMfg,
        ReferenceColumn::FactoryCode,
        ReferenceColumn::Voltage,
        ReferenceColumn::CurrentRating,
        ReferenceColumn::Applicable,
        ReferenceColumn::UseInCrimp,
        ReferenceColumn::StripLength,
        ReferenceColumn::JisFlag,
        ReferenceColumn::CompanyPlant,
        ReferenceColumn::WireSize,
        ReferenceColumn::ToolDies1,
        ReferenceColumn::ToolDies2,
        ReferenceColumn::ToolDies3,
        ReferenceColumn::ToolDies4,
        ReferenceColumn::TrayRemark,
        ReferenceColumn::UlMark,
        ReferenceColumn::UlType,
        ReferenceColumn::PrintingWith,
        ReferenceColumn::CuMark,
        ReferenceColumn::UrMark,
        ReferenceColumn::RemarkType,
        ReferenceColumn::Remark,
        ReferenceColumn::CsaMark,
        ReferenceColumn::CsaRemark,
        ReferenceColumn::Color,
        ReferenceColumn::WireStripLength,
    ];

    /// Columns of the outside schema, in storage order
    pub const OUTSIDE: [ReferenceColumn; 10] = [
        ReferenceColumn::Partcode,
        ReferenceColumn::PartName,
        ReferenceColumn::CatNo,
        ReferenceColumn::BoxQty,
        ReferenceColumn::RType,
        ReferenceColumn::CompanyName,
        ReferenceColumn::CountryMfg,
        ReferenceColumn::FactoryCode,
        ReferenceColumn::JisFlag,
        ReferenceColumn::CompanyPlant,
    ];

    /// Columns of the schema used for a label type
    pub fn for_label(label_type: LabelType) -> &'static [ReferenceColumn] {
        match label_type {
            LabelType::Inside => &Self::INSIDE,
            LabelType::Outside => &Self::OUTSIDE,
        }
    }

    /// Whether the schema of `label_type` has this column
    pub fn in_schema(&self, label_type: LabelType) -> bool {
        Self::for_label(label_type).contains(self)
    }

    /// Column name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceColumn::Partcode => "Partcode",
            ReferenceColumn::PartName => "PartName",
            ReferenceColumn::CatNo => "CatNo",
            ReferenceColumn::BoxQty => "BoxQty",
            ReferenceColumn::RType => "RType",
            ReferenceColumn::CompanyName => "CompanyName",
            ReferenceColumn::CountryMfg => "CountryMfg",
            ReferenceColumn::FactoryCode => "FactoryCode",
            ReferenceColumn::Voltage => "Voltage",
            ReferenceColumn::CurrentRating => "CurrentRating",
            ReferenceColumn::Applicable => "Applicable",
            ReferenceColumn::UseInCrimp => "UseInCrimp",
            ReferenceColumn::StripLength => "StripLength",
            ReferenceColumn::JisFlag => "JISFlag",
            ReferenceColumn::CompanyPlant => "CompanyPlant",
            ReferenceColumn::WireSize => "WireSize",
            ReferenceColumn::ToolDies1 => "ToolDies1",
            ReferenceColumn::ToolDies2 => "ToolDies2",
            ReferenceColumn::ToolDies3 => "ToolDies3",
            ReferenceColumn::ToolDies4 => "ToolDies4",
            ReferenceColumn::TrayRemark => "TrayRemark",
            ReferenceColumn::UlMark => "ULMark",
            ReferenceColumn::UlType => "ULType",
            ReferenceColumn::PrintingWith => "PrintingWith",
            ReferenceColumn::CuMark => "CUMark",
            ReferenceColumn::UrMark => "URMark",
            ReferenceColumn::RemarkType => "RemarkType",
            ReferenceColumn::Remark => "Remark",
            ReferenceColumn::CsaMark => "CSAMark",
            ReferenceColumn::CsaRemark => "CSARemark",
            ReferenceColumn::Color => "Color",
            ReferenceColumn::WireStripLength => "WireStripLength",
        }
    }
}

impl fmt::Display for ReferenceColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference row for an inside label
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsideRecord {
    pub partcode: FieldValue,
    pub part_name: FieldValue,
    pub cat_no: FieldValue,
    pub box_qty: FieldValue,
    pub r_type: FieldValue,
    pub company_name: FieldValue,
    pub country_mfg: FieldValue,
    pub factory_code: FieldValue,
    pub voltage: FieldValue,
    pub current_rating: FieldValue,
    pub applicable: FieldValue,
    pub use_in_crimp: FieldValue,
    pub strip_length: FieldValue,
    pub jis_flag: FieldValue,
    pub company_plant: FieldValue,
    pub wire_size: FieldValue,
    pub tool_dies_1: FieldValue,
    pub tool_dies_2: FieldValue,
    pub tool_dies_3: FieldValue,
    pub tool_dies_4: FieldValue,
    pub tray_remark: FieldValue,
    pub ul_mark: FieldValue,
    pub ul_type: FieldValue,
    pub printing_with: FieldValue,
    pub cu_mark: FieldValue,
    pub ur_mark: FieldValue,
    pub remark_type: FieldValue,
    pub remark: FieldValue,
    pub csa_mark: FieldValue,
    pub csa_remark: FieldValue,
    pub color: FieldValue,
    pub wire_strip_length: FieldValue,
}

impl InsideRecord {
    pub fn get(&self, column: ReferenceColumn) -> &FieldValue {
        use ReferenceColumn as C;
        match column {
            C::Partcode => &self.partcode,
            C::PartName => &self.part_name,
            C::CatNo => &self.cat_no,
            C::BoxQty => &self.box_qty,
            C::RType => &self.r_type,
            C::CompanyName => &self.company_name,
            C::CountryMfg => &self.country_mfg,
            C::FactoryCode => &self.factory_code,
            C::Voltage => &self.voltage,
            C::CurrentRating => &self.current_rating,
            C::Applicable => &self.applicable,
            C::UseInCrimp => &self.use_in_crimp,
            C::StripLength => &self.strip_length,
            C::JisFlag => &self.jis_flag,
            C::CompanyPlant => &self.company_plant,
            C::WireSize => &self.wire_size,
            C::ToolDies1 => &self.tool_dies_1,
            C::ToolDies2 => &self.tool_dies_2,
            C::ToolDies3 => &self.tool_dies_3,
            C::ToolDies4 => &self.tool_dies_4,
            C::TrayRemark => &self.tray_remark,
            C::UlMark => &self.ul_mark,
            C::UlType => &self.ul_type,
            C::PrintingWith => &self.printing_with,
            C::CuMark => &self.cu_mark,
            C::UrMark => &self.ur_mark,
            C::RemarkType => &self.remark_type,
            C::Remark => &self.remark,
            C::CsaMark => &self.csa_mark,
            C::CsaRemark => &self.csa_remark,
            C::Color => &self.color,
            C::WireStripLength => &self.wire_strip_length,
        }
    }

    pub fn set(&mut self, column: ReferenceColumn, value: FieldValue) {
        use ReferenceColumn as C;
        let slot = match column {
            C::Partcode => &mut self.partcode,
            C::PartName => &mut self.part_name,
            C::CatNo => &mut self.cat_no,
            C::BoxQty => &mut self.box_qty,
            C::RType => &mut self.r_type,
            C::CompanyName => &mut self.company_name,
            C::CountryMfg => &mut self.country_mfg,
            C::FactoryCode => &mut self.factory_code,
            C::Voltage => &mut self.voltage,
            C::CurrentRating => &mut self.current_rating,
            C::Applicable => &mut self.applicable,
            C::UseInCrimp => &mut self.use_in_crimp,
            C::StripLength => &mut self.strip_length,
            C::JisFlag => &mut self.jis_flag,
            C::CompanyPlant => &mut self.company_plant,
            C::WireSize => &mut self.wire_size,
            C::ToolDies1 => &mut self.tool_dies_1,
            C::ToolDies2 => &mut self.tool_dies_2,
            C::ToolDies3 => &mut self.tool_dies_3,
            C::ToolDies4 => &mut self.tool_dies_4,
            C::TrayRemark => &mut self.tray_remark,
            C::UlMark => &mut self.ul_mark,
            C::UlType => &mut self.ul_type,
            C::PrintingWith => &mut self.printing_with,
            C::CuMark => &mut self.cu_mark,
            C::UrMark => &mut self.ur_mark,
            C::RemarkType => &mut self.remark_type,
            C::Remark => &mut self.remark,
            C::CsaMark => &mut self.csa_mark,
            C::CsaRemark => &mut self.csa_remark,
            C::Color => &mut self.color,
            C::WireStripLength => &mut self.wire_strip_length,
        };
        *slot = value;
    }
}

/// Reference row for an outside label
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutsideRecord {
    pub partcode: FieldValue,
    pub part_name: FieldValue,
    pub cat_no: FieldValue,
    pub box_qty: FieldValue,
    pub r_type: FieldValue,
    pub company_name: FieldValue,
    pub country_mfg: FieldValue,
    pub factory_code: FieldValue,
    pub jis_flag: FieldValue,
    pub company_plant: FieldValue,
}

impl OutsideRecord {
    /// `None` for columns outside labels do not carry
    pub fn get(&self, column: ReferenceColumn) -> Option<&FieldValue> {
        use ReferenceColumn as C;
        match column {
            C::Partcode => Some(&self.partcode),
            C::PartName => Some(&self.part_name),
            C::CatNo => Some(&self.cat_no),
            C::BoxQty => Some(&self.box_qty),
            C::RType => Some(&self.r_type),
            C::CompanyName => Some(&self.company_name),
            C::CountryMfg => Some(&self.country_mfg),
            C::FactoryCode => Some(&self.factory_code),
            C::JisFlag => Some(&self.jis_flag),
            C::CompanyPlant => Some(&self.company_plant),
            _ => None,
        }
    }

    /// Returns `false` when the column is not part of the outside schema
    pub fn set(&mut self, column: ReferenceColumn, value: FieldValue) -> bool {
        use ReferenceColumn as C;
        let slot = match column {
            C::Partcode => &mut self.partcode,
            C::PartName => &mut self.part_name,
            C::CatNo => &mut self.cat_no,
            C::BoxQty => &mut self.box_qty,
            C::RType => &mut self.r_type,
            C::CompanyName => &mut self.company_name,
            C::CountryMfg => &mut self.country_mfg,
            C::FactoryCode => &mut self.factory_code,
            C::JisFlag => &mut self.jis_flag,
            C::CompanyPlant => &mut self.company_plant,
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// A reference row of either schema
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceRecord {
    Inside(InsideRecord),
    Outside(OutsideRecord),
}

impl ReferenceRecord {
    /// Empty record of the schema for `label_type`
    pub fn empty(label_type: LabelType) -> Self {
        match label_type {
            LabelType::Inside => ReferenceRecord::Inside(InsideRecord::default()),
            LabelType::Outside => ReferenceRecord::Outside(OutsideRecord::default()),
        }
    }

    pub fn label_type(&self) -> LabelType {
        match self {
            ReferenceRecord::Inside(_) => LabelType::Inside,
            ReferenceRecord::Outside(_) => LabelType::Outside,
        }
    }

    /// Value of a column, `None` when the record's schema lacks it
    pub fn get(&self, column: ReferenceColumn) -> Option<&FieldValue> {
        match self {
            ReferenceRecord::Inside(r) => Some(r.get(column)),
            ReferenceRecord::Outside(r) => r.get(column),
        }
    }

    /// Set a column value; ignored when the record's schema lacks it
    pub fn set(&mut self, column: ReferenceColumn, value: FieldValue) {
        match self {
            ReferenceRecord::Inside(r) => r.set(column, value),
            ReferenceRecord::Outside(r) => {
                r.set(column, value);
            }
        }
    }

    /// Builder-style [`ReferenceRecord::set`]
    pub fn with(mut self, column: ReferenceColumn, value: impl Into<FieldValue>) -> Self {
        self.set(column, value.into());
        self
    }
}
