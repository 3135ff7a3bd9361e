use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::str::FromStr;
use tokio_rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;
use crate::store::LedgerStore;
use crate::types::{EntryType, LedgerEntry, NewLedgerEntry, Session, WalletAccount};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS wallets (
    id          TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
    user_id     TEXT NOT NULL UNIQUE,
    balance     TEXT NOT NULL DEFAULT '0',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id          TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
    user_id     TEXT NOT NULL,
    wallet_id   TEXT NOT NULL REFERENCES wallets(id),
    type        TEXT NOT NULL CHECK (type IN ('deposit', 'withdraw')),
    amount      TEXT NOT NULL,
    status      TEXT NOT NULL,
    details     TEXT,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_wallet_created
    ON transactions (wallet_id, created_at);
";

/// Local ledger store on SQLite, used offline and in tests.
///
/// All statements run on the `tokio_rusqlite` background thread. Decimals and
/// timestamps are stored as TEXT (RFC 3339, UTC, microseconds) so ordering by
/// `created_at` is lexicographic.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!(
                        "failed to create DB directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| StoreError::Database(format!("failed to open {path}: {e}")))?;
        let store = Self { conn };
        store.migrate().await?;
        info!(path, "opened sqlite ledger store");
        Ok(store)
    }

    /// In-memory store, empty on every open.
    pub async fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::Database(format!("failed to open in-memory DB: {e}")))?;
        let store = Self { conn };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        self.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;
            conn.execute_batch(SCHEMA)
        })
        .await
    }

    /// Run a closure on the SQLite thread.
    pub async fn call<F, R>(&self, function: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, rusqlite::Error> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(function)
            .await
            .map_err(|e: tokio_rusqlite::Error<rusqlite::Error>| match e {
                tokio_rusqlite::Error::Error(err) => StoreError::from(err),
                other => StoreError::Database(other.to_string()),
            })
    }

    /// Append an entry with an explicit timestamp (ledger imports, fixtures).
    pub async fn import_entry(
        &self,
        entry: &NewLedgerEntry,
        created_at: DateTime<Utc>,
    ) -> Result<LedgerEntry, StoreError> {
        let entry = entry.clone();
        let created = format_ts(created_at);
        self.call(move |conn| {
            let id: String = conn.query_row(
                "INSERT INTO transactions (user_id, wallet_id, type, amount, status, details, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 RETURNING id",
                params![
                    entry.user_id,
                    entry.wallet_id,
                    entry.entry_type.as_str(),
                    entry.amount.to_string(),
                    entry.status,
                    entry.details,
                    created,
                ],
                |row| row.get(0),
            )?;
            Ok(LedgerEntry {
                id,
                user_id: entry.user_id,
                wallet_id: entry.wallet_id,
                entry_type: entry.entry_type,
                amount: entry.amount,
                status: entry.status,
                created_at,
                details: entry.details,
            })
        })
        .await
    }
}

impl LedgerStore for SqliteStore {
    async fn fetch_wallet(&self, session: &Session) -> Result<Option<WalletAccount>, StoreError> {
        let user_id = session.user_id.clone();
        self.call(move |conn| {
            conn.query_row(
                "SELECT id, user_id, balance, created_at, updated_at
                 FROM wallets WHERE user_id = ?1",
                params![user_id],
                wallet_from_row,
            )
            .optional()
        })
        .await
    }

    async fn create_wallet(&self, session: &Session) -> Result<WalletAccount, StoreError> {
        let user_id = session.user_id.clone();
        let now = format_ts(Utc::now());
        self.call(move |conn| {
            conn.query_row(
                "INSERT INTO wallets (user_id, balance, created_at, updated_at)
                 VALUES (?1, '0', ?2, ?2)
                 RETURNING id, user_id, balance, created_at, updated_at",
                params![user_id, now],
                wallet_from_row,
            )
        })
        .await
    }

    async fn update_balance(
        &self,
        session: &Session,
        wallet_id: &str,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        let user_id = session.user_id.clone();
        let wallet = wallet_id.to_string();
        let now = format_ts(Utc::now());
        let changed = self
            .call(move |conn| {
                conn.execute(
                    "UPDATE wallets SET balance = ?1, updated_at = ?2
                     WHERE id = ?3 AND user_id = ?4",
                    params![balance.to_string(), now, wallet, user_id],
                )
            })
            .await?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("wallet {wallet_id}")));
        }
        Ok(())
    }

    async fn append_entry(
        &self,
        session: &Session,
        entry: &NewLedgerEntry,
    ) -> Result<LedgerEntry, StoreError> {
        if entry.user_id != session.user_id {
            return Err(StoreError::Unauthenticated(format!(
                "entry for {} written by {}",
                entry.user_id, session.user_id
            )));
        }
        self.import_entry(entry, Utc::now()).await
    }

    async fn fetch_entries(
        &self,
        session: &Session,
        wallet_id: &str,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let user_id = session.user_id.clone();
        let wallet = wallet_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, wallet_id, type, amount, status, created_at, details
                 FROM transactions
                 WHERE wallet_id = ?1 AND user_id = ?2
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map(params![wallet, user_id], entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_err(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn wallet_from_row(row: &Row<'_>) -> rusqlite::Result<WalletAccount> {
    Ok(WalletAccount {
        id: row.get(0)?,
        user_id: row.get(1)?,
        balance: decimal_col(row, 2)?,
        created_at: Some(ts_col(row, 3)?),
        updated_at: Some(ts_col(row, 4)?),
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let raw_type: String = row.get(3)?;
    let entry_type = EntryType::from_str_loose(&raw_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown transaction type: {raw_type}").into(),
        )
    })?;
    Ok(LedgerEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        wallet_id: row.get(2)?,
        entry_type,
        amount: decimal_col(row, 4)?,
        status: row.get(5)?,
        created_at: ts_col(row, 6)?,
        details: row.get(7)?,
    })
}
