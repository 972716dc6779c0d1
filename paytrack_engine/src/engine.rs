//! Ledger reconciliation engine.
//!
//! The `engine` module turns a payment request into an [`Allocation`]:
//! the payment records to append and the work entry statuses those
//! payments change.  Two paths produce allocations:
//!
//! * [`record_payment`] applies an amount to a single work entry and
//!   refuses anything above that entry's outstanding balance.
//! * [`allocate_fifo`] spreads a lump payment across an employer's
//!   unpaid work, oldest entry first.
//!
//! Neither path touches the record collections.  The caller commits
//! an allocation with [`reconcile`], which is the only place a stored
//! status is ever rewritten.

use crate::amounts::{amount_due, amount_paid, derive_status, outstanding};
use crate::error::{LedgerError, Result};
use crate::ids::new_id;
use crate::models::{Payment, WorkEntry, WorkStatus};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Payments created by one reconciliation operation together with the
/// statuses they imply.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// The amount the caller asked to apply.
    pub requested: f64,
    /// New payments, in the order they were allocated.
    pub created_payments: Vec<Payment>,
    /// New status for every work entry that received a payment.
    pub status_updates: HashMap<String, WorkStatus>,
}

impl Allocation {
    /// Sum of the created payments.
    pub fn applied(&self) -> f64 {
        self.created_payments.iter().map(|p| p.amount).sum()
    }

    /// Part of the request that found no outstanding balance.  This is
    /// informational: the remainder is not stored anywhere.
    pub fn unapplied(&self) -> f64 {
        self.requested - self.applied()
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(LedgerError::NonPositiveAmount(amount))
    }
}

/// Records a manual payment against a single work entry.
///
/// `payments` is the current payment collection.  The amount must be
/// positive and no larger than the entry's outstanding balance; on
/// success the allocation holds exactly one payment and the entry's
/// re-derived status.
pub fn record_payment(
    entry: &WorkEntry,
    amount: f64,
    date: NaiveDate,
    payments: &[Payment],
) -> Result<Allocation> {
    validate_amount(amount)?;
    let balance = outstanding(entry, payments);
    if amount > balance {
        return Err(LedgerError::ExceedsOutstanding {
            amount,
            outstanding: balance,
        });
    }

    let payment = Payment {
        id: new_id(),
        work_entry_id: entry.id.clone(),
        amount,
        date,
    };
    let status = derive_status(amount_due(entry), amount_paid(entry, payments) + amount);

    Ok(Allocation {
        requested: amount,
        created_payments: vec![payment],
        status_updates: HashMap::from([(entry.id.clone(), status)]),
    })
}

/// Splits `amount` across the unpaid work of `employer_id`, oldest
/// first.
///
/// Entries are ordered by work date; entries sharing a date keep their
/// position in `work_entries`.  Each entry absorbs at most its
/// outstanding balance as of `payments`, so no created payment can
/// overpay.  Whatever is left once every balance is covered is dropped
/// and shows up only as [`Allocation::unapplied`].
///
/// Returns [`LedgerError::NoOutstandingWork`] when no payment could be
/// created at all.
pub fn allocate_fifo(
    employer_id: &str,
    amount: f64,
    date: NaiveDate,
    work_entries: &[WorkEntry],
    payments: &[Payment],
) -> Result<Allocation> {
    validate_amount(amount)?;

    let mut unpaid: Vec<&WorkEntry> = work_entries
        .iter()
        .filter(|w| w.employer_id == employer_id && w.status != WorkStatus::Paid)
        .collect();
    // `sort_by_key` is stable, which gives the insertion-order tie break.
    unpaid.sort_by_key(|w| w.date);

    let mut remaining = amount;
    let mut created_payments = Vec::new();
    let mut status_updates = HashMap::new();

    for entry in unpaid {
        if remaining <= 0.0 {
            break;
        }
        let due = amount_due(entry);
        let paid = amount_paid(entry, payments);
        let balance = due - paid;
        if balance <= 0.0 {
            continue;
        }

        let applied = remaining.min(balance);
        created_payments.push(Payment {
            id: new_id(),
            work_entry_id: entry.id.clone(),
            amount: applied,
            date,
        });
        status_updates.insert(entry.id.clone(), derive_status(due, paid + applied));
        remaining -= applied;
    }

    if created_payments.is_empty() {
        return Err(LedgerError::NoOutstandingWork {
            employer_id: employer_id.to_string(),
        });
    }

    Ok(Allocation {
        requested: amount,
        created_payments,
        status_updates,
    })
}

/// Status updates that bring every entry in `ids` in line with
/// `payments`.
pub fn rederive_statuses<'a>(
    work_entries: &[WorkEntry],
    payments: &[Payment],
    ids: impl IntoIterator<Item = &'a str>,
) -> HashMap<String, WorkStatus> {
    ids.into_iter()
        .filter_map(|id| work_entries.iter().find(|w| w.id == id))
        .map(|w| {
            let status = derive_status(amount_due(w), amount_paid(w, payments));
            (w.id.clone(), status)
        })
        .collect()
}

/// Returns a copy of `work_entries` with `status_updates` applied.
/// Updates naming an unknown entry are ignored.
pub fn reconcile(
    work_entries: &[WorkEntry],
    status_updates: &HashMap<String, WorkStatus>,
) -> Vec<WorkEntry> {
    work_entries
        .iter()
        .map(|w| match status_updates.get(&w.id) {
            Some(status) => WorkEntry {
                status: *status,
                ..w.clone()
            },
            None => w.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixed(id: &str, employer_id: &str, on: NaiveDate, rate: f64) -> WorkEntry {
        WorkEntry {
            id: id.into(),
            employer_id: employer_id.into(),
            description: format!("job {id}"),
            date: on,
            rate,
            rate_type: RateType::Fixed,
            hours: None,
            status: WorkStatus::Pending,
        }
    }

    fn paid(work_entry_id: &str, amount: f64) -> Payment {
        Payment {
            id: new_id(),
            work_entry_id: work_entry_id.into(),
            amount,
            date: date(2024, 1, 20),
        }
    }

    #[test]
    fn manual_payment_rejects_overpayment() {
        let entry = fixed("a", "e", date(2024, 1, 1), 100.0);
        let err = record_payment(&entry, 100.5, date(2024, 2, 1), &[]).unwrap_err();
        assert!(matches!(err, LedgerError::ExceedsOutstanding { .. }));
    }

    #[test]
    fn manual_payment_rejects_non_positive_and_nan() {
        let entry = fixed("a", "e", date(2024, 1, 1), 100.0);
        for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = record_payment(&entry, amount, date(2024, 2, 1), &[]).unwrap_err();
            assert!(matches!(err, LedgerError::NonPositiveAmount(_)));
        }
    }

    #[test]
    fn manual_payment_derives_status_from_prior_payments() {
        let entry = fixed("a", "e", date(2024, 1, 1), 100.0);
        let prior = vec![paid("a", 60.0)];
        let allocation = record_payment(&entry, 40.0, date(2024, 2, 1), &prior).unwrap();
        assert_eq!(allocation.created_payments.len(), 1);
        assert_eq!(allocation.status_updates["a"], WorkStatus::Paid);
        assert_eq!(allocation.applied(), 40.0);
    }

    #[test]
    fn fifo_ties_go_to_the_earlier_inserted_entry() {
        let entries = vec![
            fixed("late", "e", date(2024, 3, 1), 100.0),
            fixed("first", "e", date(2024, 1, 1), 100.0),
            fixed("second", "e", date(2024, 1, 1), 100.0),
        ];
        let allocation = allocate_fifo("e", 150.0, date(2024, 4, 1), &entries, &[]).unwrap();
        let targets: Vec<&str> = allocation
            .created_payments
            .iter()
            .map(|p| p.work_entry_id.as_str())
            .collect();
        assert_eq!(targets, vec!["first", "second"]);
        assert_eq!(allocation.status_updates["first"], WorkStatus::Paid);
        assert_eq!(allocation.status_updates["second"], WorkStatus::PartiallyPaid);
        assert!(!allocation.status_updates.contains_key("late"));
    }

    #[test]
    fn fifo_uses_existing_payments_for_balances() {
        let mut a = fixed("a", "e", date(2024, 1, 1), 100.0);
        a.status = WorkStatus::PartiallyPaid;
        let b = fixed("b", "e", date(2024, 1, 2), 100.0);
        let payments = vec![paid("a", 70.0)];
        let allocation = allocate_fifo("e", 50.0, date(2024, 2, 1), &[a, b], &payments).unwrap();
        assert_eq!(allocation.created_payments[0].amount, 30.0);
        assert_eq!(allocation.created_payments[1].amount, 20.0);
        assert_eq!(allocation.unapplied(), 0.0);
    }

    #[test]
    fn fifo_skips_stale_entries_that_are_already_covered() {
        // Status says pending but the payments already cover it.
        let stale = fixed("stale", "e", date(2024, 1, 1), 100.0);
        let open = fixed("open", "e", date(2024, 1, 5), 100.0);
        let payments = vec![paid("stale", 100.0)];
        let allocation =
            allocate_fifo("e", 40.0, date(2024, 2, 1), &[stale, open], &payments).unwrap();
        assert_eq!(allocation.created_payments.len(), 1);
        assert_eq!(allocation.created_payments[0].work_entry_id, "open");
    }

    #[test]
    fn fifo_ignores_other_employers() {
        let entries = vec![fixed("x", "other", date(2024, 1, 1), 100.0)];
        let err = allocate_fifo("e", 10.0, date(2024, 2, 1), &entries, &[]).unwrap_err();
        assert!(matches!(err, LedgerError::NoOutstandingWork { .. }));
    }

    #[test]
    fn fifo_payment_ids_are_distinct() {
        let entries: Vec<WorkEntry> = (0..5)
            .map(|i| fixed(&format!("w{i}"), "e", date(2024, 1, 1), 10.0))
            .collect();
        let allocation = allocate_fifo("e", 50.0, date(2024, 2, 1), &entries, &[]).unwrap();
        let mut ids: Vec<&str> = allocation.created_payments.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn reconcile_only_touches_named_entries() {
        let entries = vec![
            fixed("a", "e", date(2024, 1, 1), 100.0),
            fixed("b", "e", date(2024, 1, 2), 100.0),
        ];
        let updates = HashMap::from([("b".to_string(), WorkStatus::Paid)]);
        let next = reconcile(&entries, &updates);
        assert_eq!(next[0].status, WorkStatus::Pending);
        assert_eq!(next[1].status, WorkStatus::Paid);
    }

    #[test]
    fn rederive_statuses_follows_payments() {
        let entries = vec![fixed("a", "e", date(2024, 1, 1), 100.0)];
        let payments = vec![paid("a", 10.0)];
        let updates = rederive_statuses(&entries, &payments, ["a", "missing"]);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates["a"], WorkStatus::PartiallyPaid);
    }
}
