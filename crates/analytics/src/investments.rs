use chrono::{DateTime, Utc};
use common::types::LedgerEntry;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::LedgerView;

/// Lowest ROI any project can be assigned.
const ROI_BASE: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInvestment {
    pub id: String,
    pub project: String,
    pub invested: Decimal,
    pub current_value: Decimal,
    pub roi_percent: u32,
    pub roi_label: String,
    pub latest_entry_at: DateTime<Utc>,
}

/// Invested total per project, in first-seen ledger order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProjectTotal<'a> {
    pub name: &'a str,
    pub invested: Decimal,
    pub latest: DateTime<Utc>,
}

pub(crate) fn group_by_project(entries: &[LedgerEntry]) -> Vec<ProjectTotal<'_>> {
    let mut totals: Vec<ProjectTotal<'_>> = Vec::new();
    for entry in entries {
        let Some(name) = entry.investment_project() else {
            continue;
        };
        match totals.iter_mut().find(|t| t.name == name) {
            Some(total) => {
                total.invested = total.invested.saturating_add(entry.amount);
                total.latest = total.latest.max(entry.created_at);
            }
            None => totals.push(ProjectTotal {
                name,
                invested: entry.amount,
                latest: entry.created_at,
            }),
        }
    }
    totals
}

/// ROI assigned to a project: 5 plus the sum of the name's UTF-16 code
/// units modulo 10, so always in `5..=14` and stable for a given name.
pub fn roi_percent(project: &str) -> u32 {
    ROI_BASE
        + project
            .encode_utf16()
            .fold(0u32, |acc, unit| (acc + u32::from(unit)) % 10)
}

pub fn roi_label(roi: u32) -> String {
    format!("{roi}.0%")
}

/// `invested × (1 + roi / 100)`, saturating at the `Decimal` range.
pub fn current_value(invested: Decimal, roi: u32) -> Decimal {
    invested.saturating_mul(Decimal::ONE + Decimal::from(roi) / Decimal::ONE_HUNDRED)
}

pub fn compute_project_investments(view: &LedgerView) -> Vec<ProjectInvestment> {
    group_by_project(&view.entries)
        .into_iter()
        .enumerate()
        .map(|(i, total)| {
            let roi = roi_percent(total.name);
            ProjectInvestment {
                id: format!("inv-{}", i + 1),
                project: total.name.to_string(),
                invested: total.invested,
                current_value: current_value(total.invested, roi),
                roi_percent: roi,
                roi_label: roi_label(roi),
                latest_entry_at: total.latest,
            }
        })
        .collect()
}
