//! SQLite reference database
//!
//! One table per label type, keyed by the normalized part code. A connection is
//! opened for each lookup and closed when the lookup returns.

use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::reference::{FieldValue, LabelType, ReferenceColumn, ReferenceRecord, ReferenceStore, StoreError};

/// Table holding the reference rows of a label type
pub fn table_name(label_type: LabelType) -> &'static str {
    match label_type {
        LabelType::Inside => "inside_label_reference",
        LabelType::Outside => "outside_label_reference",
    }
}

fn column_list(label_type: LabelType) -> String {
    ReferenceColumn::for_label(label_type)
        .iter()
        .map(|c| format!("\"{}\"", c.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reference store backed by a SQLite file
#[derive(Debug, Clone)]
pub struct SqliteReferenceStore {
    path: PathBuf,
}

impl SqliteReferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (or create) the database and make sure both reference tables exist
    pub fn init_schema(&self) -> Result<()> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("Failed to open database: {:?}", self.path))?;

        for label_type in [LabelType::Inside, LabelType::Outside] {
            let columns = ReferenceColumn::for_label(label_type)
                .iter()
                .map(|c| match c {
                    ReferenceColumn::Partcode => "\"Partcode\" TEXT PRIMARY KEY".to_string(),
                    other => format!("\"{}\"", other.as_str()),
                })
                .collect::<Vec<_>>()
                .join(", ");

            conn.execute(
                &format!("CREATE TABLE IF NOT EXISTS {} ({})", table_name(label_type), columns),
                [],
            )
            .with_context(|| format!("Failed to create table {}", table_name(label_type)))?;
        }

        info!("Reference schema ready in {:?}", self.path);
        Ok(())
    }

    /// Insert or replace one reference row
    pub fn insert_record(&self, record: &ReferenceRecord) -> Result<()> {
        let label_type = record.label_type();
        let columns = ReferenceColumn::for_label(label_type);

        let conn = Connection::open(&self.path)
            .with_context(|| format!("Failed to open database: {:?}", self.path))?;

        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            table_name(label_type),
            column_list(label_type),
            placeholders
        );

        let values = columns.iter().map(|c| match record.get(*c) {
            Some(FieldValue::Integer(v)) => rusqlite::types::Value::Integer(*v),
            Some(FieldValue::Text(s)) => rusqlite::types::Value::Text(s.clone()),
            Some(FieldValue::Null) | None => rusqlite::types::Value::Null,
        });

        conn.execute(&sql, params_from_iter(values))
            .with_context(|| format!("Failed to insert into {}", table_name(label_type)))?;
        Ok(())
    }

    /// Load reference rows from a JSON seed file and insert them.
    ///
    /// The file holds `{"inside": [...], "outside": [...]}`, each row an object of
    /// column name to string, number or null. Non-integral numbers are stored as
    /// text. Returns the number of rows written.
    pub fn import_seed(&self, seed_path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(seed_path)
            .with_context(|| format!("Failed to read seed file: {:?}", seed_path))?;
        let seed: SeedFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse seed file: {:?}", seed_path))?;

        let mut written = 0;
        for (label_type, rows) in [(LabelType::Inside, seed.inside), (LabelType::Outside, seed.outside)] {
            for row in rows {
                let mut record = ReferenceRecord::empty(label_type);
                for (column, value) in row {
                    if !column.in_schema(label_type) {
                        anyhow::bail!("Column {} is not part of the {} schema", column, label_type);
                    }
                    record.set(column, value.into());
                }
                self.insert_record(&record)?;
                written += 1;
            }
        }

        info!("Imported {} reference rows from {:?}", written, seed_path);
        Ok(written)
    }

    fn open_read_only(&self) -> Result<Connection, StoreError> {
        Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(StoreError::connection)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SeedFile {
    #[serde(default)]
    inside: Vec<HashMap<ReferenceColumn, SeedValue>>,
    #[serde(default)]
    outside: Vec<HashMap<ReferenceColumn, SeedValue>>,
}

/// Cell value as written in a seed file
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<SeedValue> for FieldValue {
    /// Reals become text, the same way stored reals are read back
    fn from(value: SeedValue) -> Self {
        match value {
            SeedValue::Null => FieldValue::Null,
            SeedValue::Integer(v) => FieldValue::Integer(v),
            SeedValue::Real(v) => FieldValue::Text(v.to_string()),
            SeedValue::Text(s) => FieldValue::Text(s),
        }
    }
}

fn read_cell(value: ValueRef<'_>, column: ReferenceColumn) -> Result<FieldValue, StoreError> {
    match value {
        ValueRef::Null => Ok(FieldValue::Null),
        ValueRef::Integer(v) => Ok(FieldValue::Integer(v)),
        ValueRef::Real(v) => Ok(FieldValue::Text(v.to_string())),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| FieldValue::Text(s.to_string()))
            .map_err(|e| StoreError::Decode {
                column: column.to_string(),
                reason: e.to_string(),
            }),
        ValueRef::Blob(_) => Err(StoreError::Decode {
            column: column.to_string(),
            reason: "binary value".to_string(),
        }),
    }
}

impl ReferenceStore for SqliteReferenceStore {
    fn fetch(&self, part_code: &str, label_type: LabelType) -> Result<Option<ReferenceRecord>, StoreError> {
        let conn = self.open_read_only()?;
        let columns = ReferenceColumn::for_label(label_type);

        // Stored keys may carry leading zeros; compare in normalized form.
        let sql = format!(
            "SELECT {} FROM {} WHERE ltrim(trim(\"Partcode\"), '0') = ?1",
            column_list(label_type),
            table_name(label_type)
        );
        let mut stmt = conn.prepare(&sql).map_err(StoreError::connection)?;
        let mut rows = stmt.query(params![part_code]).map_err(StoreError::connection)?;

        let Some(row) = rows.next().map_err(StoreError::connection)? else {
            debug!("No {} reference row for part code {}", label_type, part_code);
            return Ok(None);
        };

        let mut record = ReferenceRecord::empty(label_type);
        for (idx, column) in columns.iter().enumerate() {
            let value = row.get_ref(idx).map_err(StoreError::connection)?;
            record.set(*column, read_cell(value, *column)?);
        }

        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspection::{verify_label, FieldTable, Status};
    use crate::vision::DetectedField;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn temp_store() -> (TempDir, SqliteReferenceStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteReferenceStore::new(dir.path().join("reference.db"));
        store.init_schema().unwrap();
        (dir, store)
    }

    #[test]
    fn test_fetch_roundtrip_inside() {
        let (_dir, store) = temp_store();
        let record = ReferenceRecord::empty(LabelType::Inside)
            .with(ReferenceColumn::Partcode, "123")
            .with(ReferenceColumn::BoxQty, 500)
            .with(ReferenceColumn::UlType, "ABC");
        store.insert_record(&record).unwrap();

        let fetched = store.fetch("123", LabelType::Inside).unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(fetched.get(ReferenceColumn::Voltage), Some(&FieldValue::Null));
    }

    #[test]
    fn test_fetch_matches_zero_padded_part_code() {
        let (_dir, store) = temp_store();
        let record = ReferenceRecord::empty(LabelType::Inside)
            .with(ReferenceColumn::Partcode, "00123")
            .with(ReferenceColumn::UlType, "ABC");
        store.insert_record(&record).unwrap();

        let fetched = store.fetch("123", LabelType::Inside).unwrap().unwrap();
        assert_eq!(fetched.get(ReferenceColumn::Partcode), Some(&FieldValue::from("00123")));
        assert!(store.fetch("1230", LabelType::Inside).unwrap().is_none());
    }

    #[test]
    fn test_verify_label_against_zero_padded_row() {
        let (_dir, store) = temp_store();
        store
            .insert_record(
                &ReferenceRecord::empty(LabelType::Inside)
                    .with(ReferenceColumn::Partcode, "00123")
                    .with(ReferenceColumn::UlType, "ABC"),
            )
            .unwrap();

        let fields = vec![
            DetectedField::new("Partbom_Partcode", "123"),
            DetectedField::new("PartBOM_ULType", "ABC"),
        ];
        let outcome = verify_label(&fields, &store, LabelType::Inside, &FieldTable::builtin());

        assert_eq!(outcome.status, Status::Ok, "{:?}", outcome.defects);
        assert_eq!(outcome.matched.len(), 2);
        assert_eq!(outcome.matched[0].reference_value, "00123");
    }

    #[test]
    fn test_fetch_is_per_label_type() {
        let (_dir, store) = temp_store();
        store
            .insert_record(&ReferenceRecord::empty(LabelType::Outside).with(ReferenceColumn::Partcode, "77"))
            .unwrap();

        assert!(store.fetch("77", LabelType::Outside).unwrap().is_some());
        assert!(store.fetch("77", LabelType::Inside).unwrap().is_none());
    }

    #[test]
    fn test_fetch_missing_database_is_connection_error() {
        let dir = TempDir::new().unwrap();
        let store = SqliteReferenceStore::new(dir.path().join("absent.db"));

        let err = store.fetch("1", LabelType::Inside).unwrap_err();
        assert!(matches!(err, StoreError::Connection { .. }));
        assert!(!dir.path().join("absent.db").exists());
    }

    #[test]
    fn test_fetch_without_schema_is_connection_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path).unwrap();

        let err = SqliteReferenceStore::new(&path).fetch("1", LabelType::Inside).unwrap_err();
        assert!(matches!(err, StoreError::Connection { .. }));
    }

    #[test]
    fn test_blob_cell_is_decode_error() {
        let (_dir, store) = temp_store();
        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            "INSERT INTO outside_label_reference (\"Partcode\", \"CatNo\") VALUES ('9', x'00ff')",
            [],
        )
        .unwrap();

        let err = store.fetch("9", LabelType::Outside).unwrap_err();
        assert!(matches!(err, StoreError::Decode { ref column, .. } if column == "CatNo"));
    }

    #[test]
    fn test_real_cell_reads_as_text() {
        let (_dir, store) = temp_store();
        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            "INSERT INTO inside_label_reference (\"Partcode\", \"StripLength\") VALUES ('5', 2.5)",
            [],
        )
        .unwrap();

        let record = store.fetch("5", LabelType::Inside).unwrap().unwrap();
        assert_eq!(record.get(ReferenceColumn::StripLength), Some(&FieldValue::from("2.5")));
    }

    #[test]
    fn test_import_seed() {
        let (_dir, store) = temp_store();
        let mut seed = NamedTempFile::new().unwrap();
        writeln!(
            seed,
            r#"{{"inside": [{{"Partcode": "123", "ULMark": 1, "ULType": "ABC", "Voltage": null}}],
                "outside": [{{"Partcode": "123", "CompanyName": "ACME"}}]}}"#
        )
        .unwrap();

        assert_eq!(store.import_seed(seed.path()).unwrap(), 2);

        let inside = store.fetch("123", LabelType::Inside).unwrap().unwrap();
        assert_eq!(inside.get(ReferenceColumn::UlMark), Some(&FieldValue::Integer(1)));
        let outside = store.fetch("123", LabelType::Outside).unwrap().unwrap();
        assert_eq!(outside.get(ReferenceColumn::CompanyName), Some(&FieldValue::from("ACME")));
    }

    #[test]
    fn test_import_seed_accepts_real_numbers() {
        let (_dir, store) = temp_store();
        let mut seed = NamedTempFile::new().unwrap();
        writeln!(
            seed,
            r#"{{"inside": [{{"Partcode": "8", "StripLength": 2.5, "BoxQty": 100}}]}}"#
        )
        .unwrap();

        assert_eq!(store.import_seed(seed.path()).unwrap(), 1);

        let record = store.fetch("8", LabelType::Inside).unwrap().unwrap();
        assert_eq!(record.get(ReferenceColumn::StripLength), Some(&FieldValue::from("2.5")));
        assert_eq!(record.get(ReferenceColumn::BoxQty), Some(&FieldValue::Integer(100)));
    }

    #[test]
    fn test_import_seed_rejects_foreign_column() {
        let (_dir, store) = temp_store();
        let mut seed = NamedTempFile::new().unwrap();
        writeln!(seed, r#"{{"outside": [{{"Partcode": "1", "Voltage": "300V"}}]}}"#).unwrap();

        assert!(store.import_seed(seed.path()).is_err());
    }
}
