use chrono::{DateTime, TimeZone, Utc};
use common::types::{EntryType, LedgerEntry};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::investments::group_by_project;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("quarter must be 1-4, got {0}")]
    InvalidQuarter(u8),
    #[error("year {0} is out of range")]
    InvalidYear(i32),
}

/// A calendar year, or one quarter of it, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub year: i32,
    pub quarter: Option<u8>,
}

impl Period {
    pub fn annual(year: i32) -> Self {
        Self {
            year,
            quarter: None,
        }
    }

    pub fn quarterly(year: i32, quarter: u8) -> Result<Self, ReportError> {
        if !(1..=4).contains(&quarter) {
            return Err(ReportError::InvalidQuarter(quarter));
        }
        Ok(Self {
            year,
            quarter: Some(quarter),
        })
    }

    /// Half-open `[start, end)` bounds.
    pub fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ReportError> {
        let (first_month, months) = match self.quarter {
            None => (1, 12),
            Some(q) if (1..=4).contains(&q) => (u32::from(q - 1) * 3 + 1, 3),
            Some(q) => return Err(ReportError::InvalidQuarter(q)),
        };
        let start = month_start(self.year, first_month)?;
        let end_month = first_month + months;
        let end = if end_month > 12 {
            let next = self.year.checked_add(1).ok_or(ReportError::InvalidYear(self.year))?;
            month_start(next, end_month - 12)?
        } else {
            month_start(self.year, end_month)?
        };
        Ok((start, end))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quarter {
            Some(q) => write!(f, "{}-Q{q}", self.year),
            None => write!(f, "{}", self.year),
        }
    }
}

fn month_start(year: i32, month: u32) -> Result<DateTime<Utc>, ReportError> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or(ReportError::InvalidYear(year))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectFlow {
    pub project: String,
    pub invested: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodReport {
    pub period: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub total_invested: Decimal,
    /// Deposits minus withdrawals minus investments.
    pub net_flow: Decimal,
    pub entry_count: usize,
    pub by_project: Vec<ProjectFlow>,
    /// Oldest first.
    pub entries: Vec<LedgerEntry>,
}

/// Cash-flow statement for one period, built from the full ledger.
pub fn generate_period_report(
    entries: &[LedgerEntry],
    period: Period,
) -> Result<PeriodReport, ReportError> {
    let (start, end) = period.bounds()?;

    let mut in_period: Vec<LedgerEntry> = entries
        .iter()
        .filter(|e| e.created_at >= start && e.created_at < end)
        .cloned()
        .collect();
    in_period.sort_by_key(|e| e.created_at);

    let mut total_deposits = Decimal::ZERO;
    let mut total_withdrawals = Decimal::ZERO;
    let mut total_invested = Decimal::ZERO;
    for entry in &in_period {
        match entry.entry_type {
            EntryType::Deposit => total_deposits = total_deposits.saturating_add(entry.amount),
            EntryType::Withdraw if entry.is_investment() => {
                total_invested = total_invested.saturating_add(entry.amount);
            }
            EntryType::Withdraw => {
                total_withdrawals = total_withdrawals.saturating_add(entry.amount);
            }
        }
    }

    let by_project = group_by_project(&in_period)
        .into_iter()
        .map(|p| ProjectFlow {
            project: p.name.to_string(),
            invested: p.invested,
        })
        .collect();

    Ok(PeriodReport {
        period: period.to_string(),
        start,
        end,
        total_deposits,
        total_withdrawals,
        total_invested,
        net_flow: total_deposits
            .saturating_sub(total_withdrawals)
            .saturating_sub(total_invested),
        entry_count: in_period.len(),
        by_project,
        entries: in_period,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{at, deposit, invest, withdraw};
    use rust_decimal_macros::dec;

    fn ledger() -> Vec<LedgerEntry> {
        vec![
            invest(dec!(50), "USDQ Farming", 2024, 11, 3),
            withdraw(dec!(20), 2024, 5, 9),
            invest(dec!(100), "Lending Pool", 2024, 4, 1),
            deposit(dec!(500), 2024, 2, 14),
            deposit(dec!(300), 2023, 12, 31),
        ]
    }

    #[test]
    fn test_annual_report_totals() {
        let report = generate_period_report(&ledger(), Period::annual(2024)).unwrap();
        assert_eq!(report.period, "2024");
        assert_eq!(report.entry_count, 4);
        assert_eq!(report.total_deposits, dec!(500));
        assert_eq!(report.total_withdrawals, dec!(20));
        assert_eq!(report.total_invested, dec!(150));
        assert_eq!(report.net_flow, dec!(330));
        assert_eq!(report.entries[0].created_at, at(2024, 2, 14));
        assert_eq!(
            report.by_project,
            vec![
                ProjectFlow {
                    project: "Lending Pool".to_string(),
                    invested: dec!(100)
                },
                ProjectFlow {
                    project: "USDQ Farming".to_string(),
                    invested: dec!(50)
                },
            ]
        );
    }

    #[test]
    fn test_quarter_bounds() {
        let (start, end) = Period::quarterly(2024, 4).unwrap().bounds().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_quarterly_report_filters_entries() {
        let period = Period::quarterly(2024, 2).unwrap();
        let report = generate_period_report(&ledger(), period).unwrap();
        assert_eq!(report.period, "2024-Q2");
        assert_eq!(report.entry_count, 2);
        assert_eq!(report.total_invested, dec!(100));
        assert_eq!(report.total_withdrawals, dec!(20));
        assert_eq!(report.net_flow, dec!(-120));
    }

    #[test]
    fn test_invalid_quarter_rejected() {
        assert_eq!(
            Period::quarterly(2024, 5).unwrap_err(),
            ReportError::InvalidQuarter(5)
        );
    }

    #[test]
    fn test_empty_period() {
        let report = generate_period_report(&ledger(), Period::annual(2020)).unwrap();
        assert_eq!(report.entry_count, 0);
        assert_eq!(report.net_flow, Decimal::ZERO);
        assert!(report.by_project.is_empty());
    }
}
