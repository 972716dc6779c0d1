//! The record store.
//!
//! A [`Ledger`] owns the three record collections.  Nothing outside
//! this module mutates a record in place: every command computes the
//! next version of the collections from the current snapshot and
//! swaps them in only if the whole command succeeded (see
//! [`Ledger::apply`]).  Commands that create payments commit through
//! [`engine::reconcile`], so a stored status always matches the
//! payments recorded against its entry.

use crate::engine::{self, Allocation};
use crate::error::{LedgerError, Result};
use crate::ids::new_id;
use crate::interchange;
use crate::models::{
    Employer, EmployerDraft, LedgerData, Payment, RateType, WorkEntry, WorkEntryDraft, WorkStatus,
};
use crate::reports::{
    self, EmployerBalance, EmployerFilter, PaymentLine, PortfolioStats, Report, ReportMode,
    WorkLogLine,
};
use crate::store::{Slot, SlotStore};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

/// What a delete removed along with the record itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeSummary {
    pub work_entries_removed: usize,
    pub payments_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    data: LedgerData,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: LedgerData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &LedgerData {
        &self.data
    }

    pub fn employers(&self) -> &[Employer] {
        &self.data.employers
    }

    pub fn work_entries(&self) -> &[WorkEntry] {
        &self.data.work_entries
    }

    pub fn payments(&self) -> &[Payment] {
        &self.data.payments
    }

    pub fn replace_employers(&mut self, employers: Vec<Employer>) {
        self.data.employers = employers;
    }

    pub fn replace_work_entries(&mut self, work_entries: Vec<WorkEntry>) {
        self.data.work_entries = work_entries;
    }

    pub fn replace_payments(&mut self, payments: Vec<Payment>) {
        self.data.payments = payments;
    }

    /// Runs `mutation` against the current snapshot and installs the
    /// collections it returns.  On error the ledger is left untouched.
    pub fn apply<T, F>(&mut self, mutation: F) -> Result<T>
    where
        F: FnOnce(&LedgerData) -> Result<(LedgerData, T)>,
    {
        let (next, out) = mutation(&self.data)?;
        self.data = next;
        Ok(out)
    }

    /// Reads all three slots.  A slot that is empty or does not decode
    /// into its collection yields an empty collection.
    pub fn load(store: &dyn SlotStore) -> Result<Self> {
        let data = LedgerData {
            employers: read_slot(store, Slot::Employers)?,
            work_entries: read_slot(store, Slot::WorkEntries)?,
            payments: read_slot(store, Slot::Payments)?,
        };
        info!(
            employers = data.employers.len(),
            work_entries = data.work_entries.len(),
            payments = data.payments.len(),
            "ledger loaded"
        );
        Ok(Self { data })
    }

    /// Writes all three slots.  If any write fails, the slots already
    /// written are put back to what the store held before, so the store
    /// never mixes statuses from one snapshot with payments from another.
    pub fn persist(&self, store: &dyn SlotStore) -> Result<()> {
        let values = [
            (Slot::Employers, serde_json::to_value(&self.data.employers)?),
            (Slot::WorkEntries, serde_json::to_value(&self.data.work_entries)?),
            (Slot::Payments, serde_json::to_value(&self.data.payments)?),
        ];
        let mut previous = Vec::with_capacity(values.len());
        for (slot, _) in &values {
            let before = store.get(*slot)?.unwrap_or_else(|| Value::Array(Vec::new()));
            previous.push((*slot, before));
        }

        for (written, (slot, value)) in values.into_iter().enumerate() {
            if let Err(err) = store.set(slot, value) {
                warn!("writing slot {} failed, restoring earlier slots: {}", slot.key(), err);
                for (slot, before) in previous.into_iter().take(written) {
                    if let Err(restore) = store.set(slot, before) {
                        error!("could not restore slot {}: {}", slot.key(), restore);
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn add_employer(&mut self, draft: EmployerDraft) -> Result<Employer> {
        let (name, contact) = validate_employer(draft)?;
        let employer = Employer {
            id: new_id(),
            name,
            contact,
        };
        let created = employer.clone();
        self.apply(|data| {
            let mut next = data.clone();
            next.employers.push(employer);
            Ok((next, ()))
        })?;
        info!(employer_id = %created.id, "employer added");
        Ok(created)
    }

    pub fn update_employer(&mut self, id: &str, draft: EmployerDraft) -> Result<Employer> {
        let (name, contact) = validate_employer(draft)?;
        let updated = self.apply(|data| {
            let mut next = data.clone();
            let employer = next
                .employers
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| LedgerError::UnknownEmployer(id.to_string()))?;
            employer.name = name;
            employer.contact = contact;
            let updated = employer.clone();
            Ok((next, updated))
        })?;
        info!(employer_id = %id, "employer updated");
        Ok(updated)
    }

    /// Removes the employer, its work entries and every payment made
    /// against those entries.
    pub fn delete_employer(&mut self, id: &str) -> Result<CascadeSummary> {
        let summary = self.apply(|data| {
            if !data.employers.iter().any(|e| e.id == id) {
                return Err(LedgerError::UnknownEmployer(id.to_string()));
            }
            let removed: Vec<&str> = data
                .work_entries
                .iter()
                .filter(|w| w.employer_id == id)
                .map(|w| w.id.as_str())
                .collect();
            let payments: Vec<Payment> = data
                .payments
                .iter()
                .filter(|p| !removed.contains(&p.work_entry_id.as_str()))
                .cloned()
                .collect();
            let summary = CascadeSummary {
                work_entries_removed: removed.len(),
                payments_removed: data.payments.len() - payments.len(),
            };
            let next = LedgerData {
                employers: data.employers.iter().filter(|e| e.id != id).cloned().collect(),
                work_entries: data
                    .work_entries
                    .iter()
                    .filter(|w| w.employer_id != id)
                    .cloned()
                    .collect(),
                payments,
            };
            Ok((next, summary))
        })?;
        info!(
            employer_id = %id,
            work_entries_removed = summary.work_entries_removed,
            payments_removed = summary.payments_removed,
            "employer deleted"
        );
        Ok(summary)
    }

    /// Creates a work entry.  New entries always start out pending.
    pub fn add_work_entry(&mut self, draft: WorkEntryDraft) -> Result<WorkEntry> {
        let created = self.apply(|data| {
            let draft = validate_work(draft, &data.employers)?;
            let entry = WorkEntry {
                id: new_id(),
                employer_id: draft.employer_id,
                description: draft.description,
                date: draft.date,
                rate: draft.rate,
                rate_type: draft.rate_type,
                hours: draft.hours,
                status: WorkStatus::Pending,
            };
            let mut next = data.clone();
            next.work_entries.push(entry.clone());
            Ok((next, entry))
        })?;
        info!(work_entry_id = %created.id, employer_id = %created.employer_id, "work entry added");
        Ok(created)
    }

    /// Replaces the editable fields of a work entry.  The status is
    /// re-derived from the entry's payments, since a new rate or hour
    /// count changes the amount due.
    pub fn update_work_entry(&mut self, id: &str, draft: WorkEntryDraft) -> Result<WorkEntry> {
        let updated = self.apply(|data| {
            let draft = validate_work(draft, &data.employers)?;
            let mut work_entries = data.work_entries.clone();
            let entry = work_entries
                .iter_mut()
                .find(|w| w.id == id)
                .ok_or_else(|| LedgerError::UnknownWorkEntry(id.to_string()))?;
            entry.employer_id = draft.employer_id;
            entry.description = draft.description;
            entry.date = draft.date;
            entry.rate = draft.rate;
            entry.rate_type = draft.rate_type;
            entry.hours = draft.hours;

            let updates = engine::rederive_statuses(&work_entries, &data.payments, [id]);
            let work_entries = engine::reconcile(&work_entries, &updates);
            let updated = work_entries
                .iter()
                .find(|w| w.id == id)
                .cloned()
                .ok_or_else(|| LedgerError::UnknownWorkEntry(id.to_string()))?;
            let next = LedgerData {
                work_entries,
                ..data.clone()
            };
            Ok((next, updated))
        })?;
        info!(work_entry_id = %id, status = ?updated.status, "work entry updated");
        Ok(updated)
    }

    /// Removes a work entry and the payments made against it.
    pub fn delete_work_entry(&mut self, id: &str) -> Result<CascadeSummary> {
        let summary = self.apply(|data| {
            if !data.work_entries.iter().any(|w| w.id == id) {
                return Err(LedgerError::UnknownWorkEntry(id.to_string()));
            }
            let payments: Vec<Payment> = data
                .payments
                .iter()
                .filter(|p| p.work_entry_id != id)
                .cloned()
                .collect();
            let summary = CascadeSummary {
                work_entries_removed: 1,
                payments_removed: data.payments.len() - payments.len(),
            };
            let next = LedgerData {
                employers: data.employers.clone(),
                work_entries: data.work_entries.iter().filter(|w| w.id != id).cloned().collect(),
                payments,
            };
            Ok((next, summary))
        })?;
        info!(work_entry_id = %id, payments_removed = summary.payments_removed, "work entry deleted");
        Ok(summary)
    }

    /// Records a manual payment against one work entry.
    pub fn record_payment(
        &mut self,
        work_entry_id: &str,
        amount: f64,
        date: NaiveDate,
    ) -> Result<Payment> {
        let allocation = self.apply(|data| {
            let entry = data
                .work_entries
                .iter()
                .find(|w| w.id == work_entry_id)
                .ok_or_else(|| LedgerError::UnknownWorkEntry(work_entry_id.to_string()))?;
            let allocation = engine::record_payment(entry, amount, date, &data.payments)?;
            Ok((commit(data, &allocation), allocation))
        })?;
        let payment = allocation
            .created_payments
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::UnknownWorkEntry(work_entry_id.to_string()))?;
        info!(work_entry_id = %work_entry_id, amount, "payment recorded");
        Ok(payment)
    }

    /// Spreads a lump payment over the employer's unpaid work, oldest
    /// first.  The returned allocation reports how much was applied;
    /// any excess is not kept.
    pub fn allocate_fifo(
        &mut self,
        employer_id: &str,
        amount: f64,
        date: NaiveDate,
    ) -> Result<Allocation> {
        let allocation = self.apply(|data| {
            let allocation = engine::allocate_fifo(
                employer_id,
                amount,
                date,
                &data.work_entries,
                &data.payments,
            )?;
            Ok((commit(data, &allocation), allocation))
        })?;
        let unapplied = allocation.unapplied();
        if unapplied > 0.0 {
            warn!(employer_id = %employer_id, unapplied, "payment exceeds outstanding balance, remainder dropped");
        }
        info!(
            employer_id = %employer_id,
            requested = amount,
            applied = allocation.applied(),
            payments = allocation.created_payments.len(),
            "payment allocated"
        );
        Ok(allocation)
    }

    /// Replaces all three collections with the contents of an
    /// interchange document.  Nothing changes if the document is
    /// rejected.
    pub fn import_json(&mut self, text: &str) -> Result<()> {
        let data = interchange::import_document(text)?;
        info!(
            employers = data.employers.len(),
            work_entries = data.work_entries.len(),
            payments = data.payments.len(),
            "ledger imported"
        );
        self.apply(|_| Ok((data, ())))
    }

    pub fn export_json(&self) -> Result<String> {
        interchange::export_document(&self.data)
    }

    pub fn stats(&self, today: NaiveDate) -> PortfolioStats {
        reports::portfolio_stats(&self.data.work_entries, &self.data.payments, today)
    }

    pub fn ranked_employers(&self) -> Vec<EmployerBalance> {
        reports::ranked_employers(&self.data.employers, &self.data.work_entries, &self.data.payments)
    }

    pub fn report(&self, mode: ReportMode, filter: &EmployerFilter, today: NaiveDate) -> Result<Report> {
        reports::build_report(mode, filter, &self.data.work_entries, &self.data.payments, today)
    }

    pub fn work_log(&self) -> Vec<WorkLogLine> {
        reports::work_log(&self.data.employers, &self.data.work_entries, &self.data.payments)
    }

    pub fn payment_history(&self) -> Vec<PaymentLine> {
        reports::payment_history(&self.data.employers, &self.data.work_entries, &self.data.payments)
    }
}

/// Appends the allocation's payments and applies its status updates in
/// one step.
fn commit(data: &LedgerData, allocation: &Allocation) -> LedgerData {
    let mut payments = data.payments.clone();
    payments.extend(allocation.created_payments.iter().cloned());
    LedgerData {
        employers: data.employers.clone(),
        work_entries: engine::reconcile(&data.work_entries, &allocation.status_updates),
        payments,
    }
}

fn read_slot<T: DeserializeOwned>(store: &dyn SlotStore, slot: Slot) -> Result<Vec<T>> {
    let Some(value) = store.get(slot)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_value(value) {
        Ok(records) => Ok(records),
        Err(err) => {
            warn!("slot {} does not hold a valid collection: {}", slot.key(), err);
            Ok(Vec::new())
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn validate_employer(draft: EmployerDraft) -> Result<(String, Option<String>)> {
    let name = non_blank(&draft.name).ok_or(LedgerError::MissingField("name"))?;
    let contact = draft.contact.as_deref().and_then(non_blank);
    Ok((name, contact))
}

/// Checks a work entry draft against the current employers and
/// normalises it: text is trimmed and fixed-rate work drops `hours`.
fn validate_work(draft: WorkEntryDraft, employers: &[Employer]) -> Result<WorkEntryDraft> {
    if draft.employer_id.is_empty() {
        return Err(LedgerError::MissingField("employerId"));
    }
    if !employers.iter().any(|e| e.id == draft.employer_id) {
        return Err(LedgerError::UnknownEmployer(draft.employer_id));
    }
    let description = non_blank(&draft.description).ok_or(LedgerError::MissingField("description"))?;
    if !(draft.rate.is_finite() && draft.rate > 0.0) {
        return Err(LedgerError::MissingField("rate"));
    }
    let hours = match draft.rate_type {
        RateType::Hourly => match draft.hours {
            Some(h) if h.is_finite() && h > 0.0 => Some(h),
            _ => return Err(LedgerError::MissingField("hours")),
        },
        RateType::Fixed => None,
    };
    Ok(WorkEntryDraft {
        description,
        hours,
        ..draft
    })
}
