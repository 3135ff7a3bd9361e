//! Derived wallet metrics.
//!
//! Everything here is recomputed on read from the wallet row and its full
//! ledger. Nothing is persisted.

pub mod allocation;
pub mod dashboard;
pub mod earnings;
pub mod investments;
pub mod performance;
pub mod report;

use common::types::{LedgerEntry, WalletAccount};
use serde::Serialize;

pub use allocation::{compute_asset_allocation, AllocationSlice};
pub use dashboard::{fetch_view, load_dashboard, Dashboard, MetricsError};
pub use earnings::{compute_earnings_summary, EarningsSummary};
pub use investments::{compute_project_investments, roi_percent, ProjectInvestment};
pub use performance::{compute_monthly_performance, PerformancePoint, PERFORMANCE_MONTHS};
pub use report::{generate_period_report, Period, PeriodReport, ReportError};

/// A wallet together with its ledger, as fetched in one read.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerView {
    pub wallet: WalletAccount,
    /// Newest first, as returned by the store.
    pub entries: Vec<LedgerEntry>,
}

#[cfg(test)]
pub(crate) mod tests_support;
