//! Data models for the Paytrack Engine.
//!
//! The `models` module defines the three record types the ledger
//! tracks (employers, work entries and payments) together with the
//! draft types used to create or edit them.  Field names serialise in
//! camelCase so the records match the bulk interchange document and
//! the persisted slots byte for byte.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A counterparty who owes money for logged work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employer {
    /// Opaque identifier.  Records created by the engine use a UUID,
    /// imported records may carry any string.
    pub id: String,
    /// Display name, never blank.
    pub name: String,
    /// Free-form contact details such as an email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// How a work entry is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateType {
    /// `rate` is charged per hour; the entry carries `hours`.
    Hourly,
    /// `rate` is the whole amount for the entry.
    Fixed,
}

/// Payment status of a work entry.
///
/// The status is a cached projection of the payments recorded against
/// the entry.  It is only ever written by the reconcile step in
/// [`crate::engine`]; see [`crate::amounts::derive_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Pending,
    PartiallyPaid,
    Paid,
}

/// A unit of billable work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkEntry {
    /// Opaque identifier, unique among work entries.
    pub id: String,
    /// The [`Employer`] this work is billed to.
    pub employer_id: String,
    /// What was done.
    pub description: String,
    /// The day the work was done.  This is not a due date.
    pub date: NaiveDate,
    /// Hourly rate or whole price, depending on `rate_type`.
    pub rate: f64,
    /// Whether `rate` is charged per hour or once.
    pub rate_type: RateType,
    /// Present for hourly entries, absent for fixed ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    /// Cached payment status; see [`WorkStatus`].
    pub status: WorkStatus,
}

/// A monetary record applied against exactly one work entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Opaque identifier, unique among payments.
    pub id: String,
    /// The [`WorkEntry`] this payment settles, in whole or in part.
    pub work_entry_id: String,
    /// Amount received, always positive.
    pub amount: f64,
    /// The day the money was received.
    pub date: NaiveDate,
}

/// User supplied fields for creating or editing an [`Employer`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmployerDraft {
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
}

/// User supplied fields for creating or editing a [`WorkEntry`].
///
/// Identity and status are never part of a draft: the ledger assigns
/// the former and derives the latter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkEntryDraft {
    pub employer_id: String,
    pub description: String,
    pub date: NaiveDate,
    pub rate: f64,
    pub rate_type: RateType,
    #[serde(default)]
    pub hours: Option<f64>,
}

/// The three record collections, in the order they are persisted and
/// exchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerData {
    pub employers: Vec<Employer>,
    pub work_entries: Vec<WorkEntry>,
    pub payments: Vec<Payment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn work_entry_uses_camel_case_and_snake_case_status() {
        let entry = WorkEntry {
            id: "w1".into(),
            employer_id: "e1".into(),
            description: "Logo".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            rate: 150.0,
            rate_type: RateType::Fixed,
            hours: None,
            status: WorkStatus::PartiallyPaid,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "w1",
                "employerId": "e1",
                "description": "Logo",
                "date": "2024-01-15",
                "rate": 150.0,
                "rateType": "fixed",
                "status": "partially_paid"
            })
        );
    }

    #[test]
    fn employer_without_contact_deserialises() {
        let employer: Employer = serde_json::from_value(json!({"id": "1", "name": "Acme"})).unwrap();
        assert_eq!(employer.contact, None);
    }
}
