//! Part code normalization and reference lookup

use thiserror::Error;
use tracing::debug;

use super::{LabelType, ReferenceRecord, ReferenceStore, StoreError};

/// Why a reference record could not be resolved
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The part code is empty once whitespace and leading zeros are removed
    #[error("invalid part code '{raw}'")]
    InvalidIdentifier { raw: String },
    /// The store has no row for this part code and label type
    #[error("part code '{part_code}' not found for {label_type} label")]
    NotFound { part_code: String, label_type: LabelType },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Trim whitespace and strip leading zeros; `None` when nothing is left
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let normalized = raw.trim().trim_start_matches('0');
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}

/// Fetch the reference record for a raw part code.
///
/// Issues exactly one store lookup, and none at all for an invalid part code.
pub fn resolve_reference(
    store: &dyn ReferenceStore,
    raw_part_code: &str,
    label_type: LabelType,
) -> Result<ReferenceRecord, ResolveError> {
    let part_code = normalize_identifier(raw_part_code).ok_or_else(|| ResolveError::InvalidIdentifier {
        raw: raw_part_code.to_string(),
    })?;

    debug!("Looking up {} reference for part code {}", label_type, part_code);

    store
        .fetch(&part_code, label_type)?
        .ok_or(ResolveError::NotFound { part_code, label_type })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{FieldValue, ReferenceColumn};
    use std::cell::RefCell;

    /// Store that records every lookup it receives
    struct RecordingStore {
        calls: RefCell<Vec<(String, LabelType)>>,
        row: Option<ReferenceRecord>,
    }

    impl ReferenceStore for RecordingStore {
        fn fetch(&self, part_code: &str, label_type: LabelType) -> Result<Option<ReferenceRecord>, StoreError> {
            self.calls.borrow_mut().push((part_code.to_string(), label_type));
            Ok(self.row.clone())
        }
    }

    struct DownStore;

    impl ReferenceStore for DownStore {
        fn fetch(&self, _: &str, _: LabelType) -> Result<Option<ReferenceRecord>, StoreError> {
            Err(StoreError::connection("timeout"))
        }
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier(" 00123 ").as_deref(), Some("123"));
        assert_eq!(normalize_identifier("1200").as_deref(), Some("1200"));
        assert_eq!(normalize_identifier("000"), None);
        assert_eq!(normalize_identifier("   "), None);
        assert_eq!(normalize_identifier(""), None);
    }

    #[test]
    fn test_resolve_uses_normalized_code_and_variant() {
        let store = RecordingStore {
            calls: RefCell::new(vec![]),
            row: Some(ReferenceRecord::empty(LabelType::Outside).with(ReferenceColumn::Partcode, "123")),
        };

        let record = resolve_reference(&store, "00123", LabelType::Outside).unwrap();
        assert_eq!(record.get(ReferenceColumn::Partcode), Some(&FieldValue::from("123")));
        assert_eq!(*store.calls.borrow(), vec![("123".to_string(), LabelType::Outside)]);
    }

    #[test]
    fn test_resolve_invalid_identifier_skips_store() {
        let store = RecordingStore {
            calls: RefCell::new(vec![]),
            row: None,
        };

        let err = resolve_reference(&store, "000", LabelType::Inside).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidIdentifier { .. }));
        assert!(store.calls.borrow().is_empty());
    }

    #[test]
    fn test_resolve_not_found() {
        let store = RecordingStore {
            calls: RefCell::new(vec![]),
            row: None,
        };

        let err = resolve_reference(&store, "42", LabelType::Inside).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { ref part_code, .. } if part_code == "42"));
    }

    #[test]
    fn test_resolve_store_failure() {
        let err = resolve_reference(&DownStore, "42", LabelType::Inside).unwrap_err();
        assert!(matches!(err, ResolveError::Store(StoreError::Connection { .. })));
    }
}
