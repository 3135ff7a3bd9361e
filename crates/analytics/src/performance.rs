use chrono::{DateTime, Datelike, Utc};
use common::types::LedgerEntry;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::LedgerView;

/// Length of the performance window, ending at the current month.
pub const PERFORMANCE_MONTHS: usize = 12;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerformancePoint {
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub balance: Decimal,
}

/// Months since year 0, so consecutive months differ by one.
fn month_index(ts: DateTime<Utc>) -> i64 {
    i64::from(ts.year()) * 12 + i64::from(ts.month0())
}

fn point_for(index: i64) -> PerformancePoint {
    let year = index.div_euclid(12);
    let month0 = index.rem_euclid(12);
    let month0 = usize::try_from(month0).unwrap_or(0);
    PerformancePoint {
        label: MONTH_LABELS[month0].to_string(),
        year: i32::try_from(year).unwrap_or(i32::MAX),
        month: u32::try_from(month0 + 1).unwrap_or(1),
        balance: Decimal::ZERO,
    }
}

/// Running cash balance at the end of each of the last twelve months.
///
/// Entries are folded oldest first. Entries before the window are ignored,
/// so the series starts from 0 rather than from the true opening balance.
pub fn compute_monthly_performance(
    view: &LedgerView,
    now: DateTime<Utc>,
) -> Vec<PerformancePoint> {
    let last = month_index(now);
    let first = last - (PERFORMANCE_MONTHS as i64 - 1);

    let mut points: Vec<PerformancePoint> = (first..=last).map(point_for).collect();

    let mut in_window: Vec<&LedgerEntry> = view
        .entries
        .iter()
        .filter(|e| (first..=last).contains(&month_index(e.created_at)))
        .collect();
    in_window.sort_by_key(|e| e.created_at);

    let mut running = Decimal::ZERO;
    for entry in in_window {
        running = running.saturating_add(entry.signed_amount());
        let offset = usize::try_from(month_index(entry.created_at) - first).unwrap_or(0);
        for point in &mut points[offset..] {
            point.balance = running;
        }
    }

    points
}
