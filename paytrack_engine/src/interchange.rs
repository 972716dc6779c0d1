//! Bulk import and export.
//!
//! The interchange document is a single JSON object with exactly the
//! fields `employers`, `workEntries` and `payments`, each an array of
//! records.  Referential integrity is not checked on import.

use crate::error::{LedgerError, Result};
use crate::models::LedgerData;
use crate::store::Slot;
use serde_json::Value;

/// Renders the three collections as a pretty-printed document.
pub fn export_document(data: &LedgerData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Parses a document produced by [`export_document`] (or by hand).
///
/// Every top-level field must be present and non-null; otherwise the
/// whole document is rejected and nothing is returned.
pub fn import_document(text: &str) -> Result<LedgerData> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| LedgerError::Format(err.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| LedgerError::Format("document is not a JSON object".to_string()))?;
    for slot in Slot::ALL {
        if object.get(slot.key()).map_or(true, Value::is_null) {
            return Err(LedgerError::Format(format!("missing field `{}`", slot.key())));
        }
    }
    serde_json::from_value(value).map_err(|err| LedgerError::Format(err.to_string()))
}
