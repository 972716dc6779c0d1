//! Amount calculation and status derivation.
//!
//! Everything here is a pure function of its arguments.  Amounts are
//! plain `f64` values; no rounding is applied beyond what floating
//! point arithmetic does on its own.

use crate::models::{Payment, RateType, WorkEntry, WorkStatus};

/// The amount billed for an entry: `hours * rate` for hourly work,
/// `rate` for fixed work.  An hourly entry without hours (possible
/// only through imported data) is due nothing.
pub fn amount_due(entry: &WorkEntry) -> f64 {
    match entry.rate_type {
        RateType::Hourly => entry.hours.unwrap_or(0.0) * entry.rate,
        RateType::Fixed => entry.rate,
    }
}

/// Sum of every payment recorded against `entry`.
pub fn amount_paid(entry: &WorkEntry, payments: &[Payment]) -> f64 {
    payments
        .iter()
        .filter(|p| p.work_entry_id == entry.id)
        .map(|p| p.amount)
        .sum()
}

/// Amount due minus amount paid.  Negative only if the payments were
/// produced outside the engine.
pub fn outstanding(entry: &WorkEntry, payments: &[Payment]) -> f64 {
    amount_due(entry) - amount_paid(entry, payments)
}

pub fn derive_status(amount_due: f64, amount_paid: f64) -> WorkStatus {
    if amount_paid >= amount_due {
        WorkStatus::Paid
    } else if amount_paid > 0.0 {
        WorkStatus::PartiallyPaid
    } else {
        WorkStatus::Pending
    }
}
