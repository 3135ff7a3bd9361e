use chrono::{DateTime, Utc};
use common::error::StoreError;
use common::store::LedgerStore;
use common::types::Session;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::allocation::{compute_asset_allocation, AllocationSlice};
use crate::earnings::{compute_earnings_summary, EarningsSummary};
use crate::investments::{compute_project_investments, ProjectInvestment};
use crate::performance::{compute_monthly_performance, PerformancePoint};
use crate::LedgerView;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to fetch wallet: {0}")]
    WalletFetch(#[source] StoreError),
    #[error("no wallet for user {0}")]
    NoWallet(String),
    #[error("failed to fetch ledger: {0}")]
    LedgerFetch(#[source] StoreError),
}

impl MetricsError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WalletFetch(_) => "wallet_fetch",
            Self::NoWallet(_) => "no_wallet",
            Self::LedgerFetch(_) => "ledger_fetch",
        }
    }
}

/// Read the session user's wallet and its full ledger.
pub async fn fetch_view<S: LedgerStore>(
    store: &S,
    session: &Session,
) -> Result<LedgerView, MetricsError> {
    let wallet = store
        .fetch_wallet(session)
        .await
        .map_err(MetricsError::WalletFetch)?
        .ok_or_else(|| MetricsError::NoWallet(session.user_id.clone()))?;

    let entries = store
        .fetch_entries(session, &wallet.id)
        .await
        .map_err(MetricsError::LedgerFetch)?;

    debug!(wallet_id = %wallet.id, entries = entries.len(), "fetched ledger view");
    Ok(LedgerView { wallet, entries })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub performance: Vec<PerformancePoint>,
    pub allocation: Vec<AllocationSlice>,
    pub investments: Vec<ProjectInvestment>,
    pub earnings: EarningsSummary,
    pub generated_at: DateTime<Utc>,
}

impl Dashboard {
    pub fn compute(view: &LedgerView, now: DateTime<Utc>) -> Self {
        Self {
            performance: compute_monthly_performance(view, now),
            allocation: compute_asset_allocation(view),
            investments: compute_project_investments(view),
            earnings: compute_earnings_summary(view),
            generated_at: now,
        }
    }
}

pub async fn load_dashboard<S: LedgerStore>(
    store: &S,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<Dashboard, MetricsError> {
    let view = fetch_view(store, session).await.inspect_err(|e| {
        warn!(error = %e, kind = e.kind(), "dashboard load failed");
    })?;
    Ok(Dashboard::compute(&view, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::at;
    use common::db::SqliteStore;
    use common::types::NewLedgerEntry;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_missing_wallet_is_tagged() {
        let store = SqliteStore::open_memory().await.unwrap();
        let err = load_dashboard(&store, &Session::local("nobody"), at(2024, 6, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, MetricsError::NoWallet(ref u) if u == "nobody"));
        assert_eq!(err.kind(), "no_wallet");
    }

    #[tokio::test]
    async fn test_dashboard_from_store() {
        let store = SqliteStore::open_memory().await.unwrap();
        let session = Session::local("u1");
        let wallet = store.create_wallet(&session).await.unwrap();
        store
            .import_entry(&NewLedgerEntry::deposit("u1", &wallet.id, dec!(1000)), at(2024, 1, 10))
            .await
            .unwrap();
        store
            .import_entry(
                &NewLedgerEntry::investment("u1", &wallet.id, dec!(300), "Alpha"),
                at(2024, 2, 10),
            )
            .await
            .unwrap();
        store
            .update_balance(&session, &wallet.id, dec!(700))
            .await
            .unwrap();

        let dash = load_dashboard(&store, &session, at(2024, 6, 1)).await.unwrap();

        assert_eq!(dash.performance.len(), 12);
        assert_eq!(dash.performance[11].balance, dec!(700));
        assert_eq!(dash.allocation.len(), 2);
        assert_eq!(dash.allocation[0].percent, 70);
        assert_eq!(dash.investments.len(), 1);
        assert_eq!(dash.investments[0].project, "Alpha");
        assert_eq!(dash.earnings.total_earnings, dec!(33));
        assert_eq!(dash.generated_at, at(2024, 6, 1));
    }
}
