use rust_decimal::Decimal;
use std::future::Future;

use crate::backend::BackendClient;
use crate::db::SqliteStore;
use crate::error::StoreError;
use crate::types::{LedgerEntry, NewLedgerEntry, Session, WalletAccount};

/// Reads and writes against the `wallets` and `transactions` tables.
///
/// Every call is a single round trip. Nothing here wraps an entry append and
/// the following balance write in one transaction.
pub trait LedgerStore {
    /// The session user's wallet, if one exists.
    fn fetch_wallet(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<Option<WalletAccount>, StoreError>> + Send;

    /// Create a zero-balance wallet for the session user.
    fn create_wallet(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<WalletAccount, StoreError>> + Send;

    fn update_balance(
        &self,
        session: &Session,
        wallet_id: &str,
        balance: Decimal,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn append_entry(
        &self,
        session: &Session,
        entry: &NewLedgerEntry,
    ) -> impl Future<Output = Result<LedgerEntry, StoreError>> + Send;

    /// All entries of a wallet, newest first.
    fn fetch_entries(
        &self,
        session: &Session,
        wallet_id: &str,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, StoreError>> + Send;
}

/// Store selected by `[ledger] store` at startup.
pub enum AnyStore {
    Rest(BackendClient),
    Sqlite(SqliteStore),
}

impl AnyStore {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rest(_) => "rest",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

impl LedgerStore for AnyStore {
    async fn fetch_wallet(&self, session: &Session) -> Result<Option<WalletAccount>, StoreError> {
        match self {
            Self::Rest(s) => s.fetch_wallet(session).await,
            Self::Sqlite(s) => s.fetch_wallet(session).await,
        }
    }

    async fn create_wallet(&self, session: &Session) -> Result<WalletAccount, StoreError> {
        match self {
            Self::Rest(s) => s.create_wallet(session).await,
            Self::Sqlite(s) => s.create_wallet(session).await,
        }
    }

    async fn update_balance(
        &self,
        session: &Session,
        wallet_id: &str,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        match self {
            Self::Rest(s) => s.update_balance(session, wallet_id, balance).await,
            Self::Sqlite(s) => s.update_balance(session, wallet_id, balance).await,
        }
    }

    async fn append_entry(
        &self,
        session: &Session,
        entry: &NewLedgerEntry,
    ) -> Result<LedgerEntry, StoreError> {
        match self {
            Self::Rest(s) => s.append_entry(session, entry).await,
            Self::Sqlite(s) => s.append_entry(session, entry).await,
        }
    }

    async fn fetch_entries(
        &self,
        session: &Session,
        wallet_id: &str,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        match self {
            Self::Rest(s) => s.fetch_entries(session, wallet_id).await,
            Self::Sqlite(s) => s.fetch_entries(session, wallet_id).await,
        }
    }
}
