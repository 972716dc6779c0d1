//! Portfolio aggregates and time-bucketed reports.
//!
//! All functions here are pure.  The current date is always passed in
//! as `today`; nothing reads the clock.  Dangling references are
//! tolerated: a payment whose work entry is gone still counts towards
//! portfolio totals, and listing views show a placeholder name.

use crate::amounts::{amount_due, amount_paid, outstanding};
use crate::error::{LedgerError, Result};
use crate::models::{Employer, Payment, WorkEntry, WorkStatus};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

/// Unpaid work older than this many days counts as overdue.
///
/// Compared in whole calendar days with a strict bound: work dated
/// exactly `today - OVERDUE_AFTER_DAYS` is not yet overdue.  A
/// time-of-day comparison against "now minus 30 days" would count that
/// boundary day; this one does not.
pub const OVERDUE_AFTER_DAYS: i64 = 30;

const UNKNOWN_EMPLOYER: &str = "Unknown Employer";
const UNKNOWN_WORK: &str = "N/A";

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    /// Outstanding balance summed over every entry that is not paid.
    pub total_pending: f64,
    /// Every recorded payment, including ones whose work entry is gone.
    pub total_received: f64,
    /// Unpaid entries dated more than [`OVERDUE_AFTER_DAYS`] ago.
    pub overdue_count: usize,
}

pub fn portfolio_stats(
    work_entries: &[WorkEntry],
    payments: &[Payment],
    today: NaiveDate,
) -> PortfolioStats {
    let total_received: f64 = payments.iter().map(|p| p.amount).sum();
    let total_pending: f64 = work_entries
        .iter()
        .filter(|w| w.status != WorkStatus::Paid)
        .map(|w| outstanding(w, payments))
        .sum();
    let cutoff = today.checked_sub_signed(Duration::days(OVERDUE_AFTER_DAYS));
    let overdue_count = work_entries
        .iter()
        .filter(|w| w.status != WorkStatus::Paid)
        .filter(|w| cutoff.is_some_and(|c| w.date < c))
        .count();

    PortfolioStats {
        total_pending,
        total_received,
        overdue_count,
    }
}

/// Outstanding balance per employer id, `0.0` for employers with no
/// unpaid work.
pub fn employer_pending(
    employers: &[Employer],
    work_entries: &[WorkEntry],
    payments: &[Payment],
) -> HashMap<String, f64> {
    employers
        .iter()
        .map(|e| {
            let pending: f64 = work_entries
                .iter()
                .filter(|w| w.employer_id == e.id && w.status != WorkStatus::Paid)
                .map(|w| outstanding(w, payments))
                .sum();
            (e.id.clone(), pending)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployerBalance {
    #[serde(flatten)]
    pub employer: Employer,
    pub pending: f64,
}

/// Employers ordered by pending balance, largest first.  Employers
/// with equal balances keep their stored order.
pub fn ranked_employers(
    employers: &[Employer],
    work_entries: &[WorkEntry],
    payments: &[Payment],
) -> Vec<EmployerBalance> {
    let pending = employer_pending(employers, work_entries, payments);
    let mut ranked: Vec<EmployerBalance> = employers
        .iter()
        .map(|e| EmployerBalance {
            employer: e.clone(),
            pending: pending.get(&e.id).copied().unwrap_or(0.0),
        })
        .collect();
    ranked.sort_by(|a, b| b.pending.total_cmp(&a.pending));
    ranked
}

/// Restricts a report to one employer's work and the payments made
/// against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmployerFilter {
    All,
    Employer(String),
}

impl EmployerFilter {
    /// `"all"` (or nothing) selects every employer, anything else is
    /// taken as an employer id.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("all") | Some("") => EmployerFilter::All,
            Some(id) => EmployerFilter::Employer(id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Two buckets: last calendar month and the current one.
    ThisVsLastMonth,
    /// One bucket per month of `year`.
    Yearly { year: i32 },
    /// One bucket per day of `month` in `year`.
    Monthly { year: i32, month: u32 },
}

impl ReportMode {
    /// Picks a mode by name and takes its period from `selected`.
    /// Names are `this_vs_last_month`, `month` and `year`.
    pub fn from_selection(name: &str, selected: NaiveDate) -> Result<Self> {
        match name {
            "this_vs_last_month" => Ok(ReportMode::ThisVsLastMonth),
            "year" => Ok(ReportMode::Yearly {
                year: selected.year(),
            }),
            "month" => Ok(ReportMode::Monthly {
                year: selected.year(),
                month: selected.month(),
            }),
            other => Err(LedgerError::InvalidPeriod(format!("unknown report mode `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub label: String,
    /// Amount due of the work dated inside the bucket, paid or not.
    pub earned: f64,
    /// Payments dated inside the bucket, whatever work they target.
    pub received: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub buckets: Vec<Bucket>,
    pub total_earned: f64,
    pub total_received: f64,
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// Places a date in a bucket, or nowhere.
type Slotter = Box<dyn Fn(NaiveDate) -> Option<usize>>;

/// Bucket labels plus the function placing dates among them.
fn layout(mode: ReportMode, today: NaiveDate) -> Result<(Vec<String>, Slotter)> {
    match mode {
        ReportMode::ThisVsLastMonth => {
            let this = (today.year(), today.month());
            let last = previous_month(this.0, this.1);
            let labels = vec!["Last Month".to_string(), "This Month".to_string()];
            let slot: Slotter = Box::new(move |d: NaiveDate| {
                let key = (d.year(), d.month());
                if key == this {
                    Some(1)
                } else if key == last {
                    Some(0)
                } else {
                    None
                }
            });
            Ok((labels, slot))
        }
        ReportMode::Yearly { year } => {
            let labels = MONTH_LABELS.iter().map(|m| m.to_string()).collect();
            let slot: Slotter =
                Box::new(move |d: NaiveDate| (d.year() == year).then(|| d.month0() as usize));
            Ok((labels, slot))
        }
        ReportMode::Monthly { year, month } => {
            let days = days_in_month(year, month)
                .ok_or_else(|| LedgerError::InvalidPeriod(format!("{year}-{month:02}")))?;
            let labels = (1..=days).map(|d| d.to_string()).collect();
            let slot: Slotter = Box::new(move |d: NaiveDate| {
                (d.year() == year && d.month() == month).then(|| d.day0() as usize)
            });
            Ok((labels, slot))
        }
    }
}

/// Builds an earned/received series for `mode`.
///
/// Earned and received are booked on different events (the work date
/// and the payment date) so a bucket's two figures need not agree.
pub fn build_report(
    mode: ReportMode,
    filter: &EmployerFilter,
    work_entries: &[WorkEntry],
    payments: &[Payment],
    today: NaiveDate,
) -> Result<Report> {
    let (labels, slot) = layout(mode, today)?;
    let mut buckets: Vec<Bucket> = labels
        .into_iter()
        .map(|label| Bucket {
            label,
            earned: 0.0,
            received: 0.0,
        })
        .collect();

    let in_scope = |employer_id: &str| match filter {
        EmployerFilter::All => true,
        EmployerFilter::Employer(id) => employer_id == id.as_str(),
    };

    for entry in work_entries.iter().filter(|w| in_scope(&w.employer_id)) {
        if let Some(i) = slot(entry.date) {
            buckets[i].earned += amount_due(entry);
        }
    }

    for payment in payments {
        let counted = match filter {
            EmployerFilter::All => true,
            EmployerFilter::Employer(_) => work_entries
                .iter()
                .find(|w| w.id == payment.work_entry_id)
                .is_some_and(|w| in_scope(&w.employer_id)),
        };
        if !counted {
            continue;
        }
        if let Some(i) = slot(payment.date) {
            buckets[i].received += payment.amount;
        }
    }

    let total_earned: f64 = buckets.iter().map(|b| b.earned).sum();
    let total_received: f64 = buckets.iter().map(|b| b.received).sum();
    Ok(Report {
        buckets,
        total_earned,
        total_received,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkLogLine {
    #[serde(flatten)]
    pub entry: WorkEntry,
    pub employer_name: String,
    pub amount_due: f64,
    pub amount_paid: f64,
}

/// Every work entry, newest first.
pub fn work_log(
    employers: &[Employer],
    work_entries: &[WorkEntry],
    payments: &[Payment],
) -> Vec<WorkLogLine> {
    let mut lines: Vec<WorkLogLine> = work_entries
        .iter()
        .map(|w| WorkLogLine {
            entry: w.clone(),
            employer_name: employer_name(employers, &w.employer_id),
            amount_due: amount_due(w),
            amount_paid: amount_paid(w, payments),
        })
        .collect();
    lines.sort_by(|a, b| b.entry.date.cmp(&a.entry.date));
    lines
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLine {
    #[serde(flatten)]
    pub payment: Payment,
    pub employer_name: String,
    pub work_description: String,
}

/// Every payment, newest first, with the employer and work it went to.
pub fn payment_history(
    employers: &[Employer],
    work_entries: &[WorkEntry],
    payments: &[Payment],
) -> Vec<PaymentLine> {
    let mut lines: Vec<PaymentLine> = payments
        .iter()
        .map(|p| {
            let work = work_entries.iter().find(|w| w.id == p.work_entry_id);
            PaymentLine {
                payment: p.clone(),
                employer_name: work
                    .map(|w| employer_name(employers, &w.employer_id))
                    .unwrap_or_else(|| UNKNOWN_EMPLOYER.to_string()),
                work_description: work
                    .map(|w| w.description.clone())
                    .unwrap_or_else(|| UNKNOWN_WORK.to_string()),
            }
        })
        .collect();
    lines.sort_by(|a, b| b.payment.date.cmp(&a.payment.date));
    lines
}

fn employer_name(employers: &[Employer], id: &str) -> String {
    employers
        .iter()
        .find(|e| e.id == id)
        .map(|e| e.name.clone())
        .unwrap_or_else(|| UNKNOWN_EMPLOYER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn work(id: &str, employer_id: &str, on: NaiveDate, rate: f64, status: WorkStatus) -> WorkEntry {
        WorkEntry {
            id: id.into(),
            employer_id: employer_id.into(),
            description: format!("work {id}"),
            date: on,
            rate,
            rate_type: RateType::Fixed,
            hours: None,
            status,
        }
    }

    fn pay(id: &str, work_entry_id: &str, on: NaiveDate, amount: f64) -> Payment {
        Payment {
            id: id.into(),
            work_entry_id: work_entry_id.into(),
            amount,
            date: on,
        }
    }

    fn employer(id: &str, name: &str) -> Employer {
        Employer {
            id: id.into(),
            name: name.into(),
            contact: None,
        }
    }

    #[test]
    fn stats_sum_pending_and_received() {
        let today = date(2024, 6, 1);
        let entries = vec![
            work("a", "e", date(2024, 5, 30), 100.0, WorkStatus::PartiallyPaid),
            work("b", "e", date(2024, 5, 30), 50.0, WorkStatus::Paid),
        ];
        let payments = vec![pay("p1", "a", today, 40.0), pay("p2", "b", today, 50.0)];
        let stats = portfolio_stats(&entries, &payments, today);
        assert_eq!(stats.total_pending, 60.0);
        assert_eq!(stats.total_received, 90.0);
        assert_eq!(stats.overdue_count, 0);
    }

    #[test]
    fn overdue_boundary_is_strict() {
        let today = date(2024, 6, 30);
        let entries = vec![
            work("edge", "e", date(2024, 5, 31), 10.0, WorkStatus::Pending),
            work("old", "e", date(2024, 5, 30), 10.0, WorkStatus::Pending),
        ];
        assert_eq!(portfolio_stats(&entries, &[], today).overdue_count, 1);
    }

    #[test]
    fn pending_map_has_every_employer() {
        let employers = vec![employer("e1", "One"), employer("e2", "Two")];
        let entries = vec![work("a", "e1", date(2024, 1, 1), 80.0, WorkStatus::Pending)];
        let pending = employer_pending(&employers, &entries, &[]);
        assert_eq!(pending["e1"], 80.0);
        assert_eq!(pending["e2"], 0.0);
    }

    #[test]
    fn ranking_puts_largest_balance_first_and_keeps_ties_stable() {
        let employers = vec![employer("e1", "One"), employer("e2", "Two"), employer("e3", "Three")];
        let entries = vec![work("a", "e2", date(2024, 1, 1), 80.0, WorkStatus::Pending)];
        let ranked = ranked_employers(&employers, &entries, &[]);
        let order: Vec<&str> = ranked.iter().map(|b| b.employer.id.as_str()).collect();
        assert_eq!(order, vec!["e2", "e1", "e3"]);
    }

    #[test]
    fn this_vs_last_month_wraps_the_year() {
        let today = date(2024, 1, 10);
        let entries = vec![
            work("dec", "e", date(2023, 12, 31), 100.0, WorkStatus::Pending),
            work("jan", "e", date(2024, 1, 2), 30.0, WorkStatus::Pending),
            work("nov", "e", date(2023, 11, 30), 999.0, WorkStatus::Pending),
        ];
        let payments = vec![pay("p", "nov", date(2024, 1, 5), 20.0)];
        let report = build_report(
            ReportMode::ThisVsLastMonth,
            &EmployerFilter::All,
            &entries,
            &payments,
            today,
        )
        .unwrap();
        assert_eq!(report.buckets[0].label, "Last Month");
        assert_eq!(report.buckets[0].earned, 100.0);
        assert_eq!(report.buckets[1].earned, 30.0);
        assert_eq!(report.buckets[1].received, 20.0);
        assert_eq!(report.total_earned, 130.0);
    }

    #[test]
    fn monthly_report_has_one_bucket_per_day() {
        let entries = vec![work("a", "e", date(2024, 2, 29), 70.0, WorkStatus::Pending)];
        let report = build_report(
            ReportMode::Monthly { year: 2024, month: 2 },
            &EmployerFilter::All,
            &entries,
            &[],
            date(2024, 6, 1),
        )
        .unwrap();
        assert_eq!(report.buckets.len(), 29);
        assert_eq!(report.buckets[28].label, "29");
        assert_eq!(report.buckets[28].earned, 70.0);
    }

    #[test]
    fn monthly_report_rejects_bad_month() {
        let err = build_report(
            ReportMode::Monthly { year: 2024, month: 13 },
            &EmployerFilter::All,
            &[],
            &[],
            date(2024, 6, 1),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPeriod(_)));
    }

    #[test]
    fn employer_filter_drops_other_and_orphan_payments() {
        let entries = vec![
            work("a", "e1", date(2024, 3, 1), 100.0, WorkStatus::Pending),
            work("b", "e2", date(2024, 3, 1), 200.0, WorkStatus::Pending),
        ];
        let payments = vec![
            pay("p1", "a", date(2024, 3, 2), 10.0),
            pay("p2", "b", date(2024, 3, 2), 20.0),
            pay("p3", "gone", date(2024, 3, 2), 40.0),
        ];
        let mode = ReportMode::Yearly { year: 2024 };
        let only_e1 = EmployerFilter::Employer("e1".into());
        let report = build_report(mode, &only_e1, &entries, &payments, date(2024, 6, 1)).unwrap();
        assert_eq!(report.buckets[2].earned, 100.0);
        assert_eq!(report.buckets[2].received, 10.0);

        let all = build_report(mode, &EmployerFilter::All, &entries, &payments, date(2024, 6, 1)).unwrap();
        assert_eq!(all.buckets[2].received, 70.0);
    }

    #[test]
    fn mode_from_selection() {
        let selected = date(2023, 7, 14);
        assert_eq!(
            ReportMode::from_selection("month", selected).unwrap(),
            ReportMode::Monthly { year: 2023, month: 7 }
        );
        assert_eq!(
            ReportMode::from_selection("year", selected).unwrap(),
            ReportMode::Yearly { year: 2023 }
        );
        assert!(ReportMode::from_selection("decade", selected).is_err());
        assert_eq!(EmployerFilter::parse(Some("all")), EmployerFilter::All);
        assert_eq!(EmployerFilter::parse(Some("e1")), EmployerFilter::Employer("e1".into()));
    }

    #[test]
    fn listings_are_newest_first_with_placeholders() {
        let employers = vec![employer("e1", "Acme")];
        let entries = vec![
            work("old", "e1", date(2024, 1, 1), 10.0, WorkStatus::Pending),
            work("new", "ghost", date(2024, 2, 1), 10.0, WorkStatus::Pending),
        ];
        let log = work_log(&employers, &entries, &[]);
        assert_eq!(log[0].entry.id, "new");
        assert_eq!(log[0].employer_name, "Unknown Employer");
        assert_eq!(log[1].employer_name, "Acme");

        let payments = vec![
            pay("p1", "old", date(2024, 1, 5), 5.0),
            pay("p2", "gone", date(2024, 3, 1), 5.0),
        ];
        let history = payment_history(&employers, &entries, &payments);
        assert_eq!(history[0].payment.id, "p2");
        assert_eq!(history[0].employer_name, "Unknown Employer");
        assert_eq!(history[0].work_description, "N/A");
        assert_eq!(history[1].employer_name, "Acme");
        assert_eq!(history[1].work_description, "work old");
    }
}
