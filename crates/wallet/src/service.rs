use common::error::StoreError;
use common::store::LedgerStore;
use common::types::{LedgerEntry, NewLedgerEntry, Session, WalletAccount};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::catalog;
use crate::metrics::{LEDGER_OPS, STORE_ERRORS, VALIDATION_REJECTIONS};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// The entry was appended but the wallet balance was not written.
    #[error("entry {entry_id} recorded but balance update failed: {source}")]
    BalanceUpdate {
        entry_id: String,
        #[source]
        source: StoreError,
    },
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::Store(_) => "store",
            Self::BalanceUpdate { .. } => "balance_update",
        }
    }
}

/// Outcome of a ledger mutation: the appended entry and the balance written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub entry: LedgerEntry,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Deposit,
    Withdraw,
    Invest,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Invest => "invest",
        }
    }
}

/// Parse a user-entered amount. Sign and size are checked by the operation.
pub fn parse_amount(text: &str) -> Result<Decimal, ServiceError> {
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_parse_err| ServiceError::Validation(format!("not a number: {trimmed:?}")))
}

fn reject(op: Op, err: ServiceError) -> ServiceError {
    metrics::counter!(VALIDATION_REJECTIONS, "op" => op.as_str()).increment(1);
    warn!(op = op.as_str(), error = %err, "rejected before store call");
    err
}

fn store_failed(err: StoreError) -> ServiceError {
    metrics::counter!(STORE_ERRORS, "kind" => err.kind()).increment(1);
    ServiceError::Store(err)
}

/// Wallet operations over a [`LedgerStore`].
///
/// Mutations take the caller's last known wallet row. Validation runs against
/// that balance before any store call, and the new balance written is that
/// balance plus or minus the amount.
pub struct WalletService<S> {
    store: S,
}

impl<S: LedgerStore> WalletService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The session user's wallet, created with a zero balance if missing.
    pub async fn load_wallet(&self, session: &Session) -> Result<WalletAccount, ServiceError> {
        if let Some(wallet) = self.store.fetch_wallet(session).await.map_err(store_failed)? {
            return Ok(wallet);
        }
        let wallet = self
            .store
            .create_wallet(session)
            .await
            .map_err(store_failed)?;
        info!(user_id = %session.user_id, wallet_id = %wallet.id, "created wallet");
        Ok(wallet)
    }

    pub async fn ledger(
        &self,
        session: &Session,
        wallet_id: &str,
    ) -> Result<Vec<LedgerEntry>, ServiceError> {
        self.store
            .fetch_entries(session, wallet_id)
            .await
            .map_err(store_failed)
    }

    pub async fn deposit(
        &self,
        session: &Session,
        wallet: &WalletAccount,
        amount: Decimal,
    ) -> Result<Receipt, ServiceError> {
        check_amount(Op::Deposit, amount)?;
        let new_balance = settle(Op::Deposit, wallet.balance.checked_add(amount))?;
        let entry = NewLedgerEntry::deposit(&session.user_id, &wallet.id, amount);
        self.apply(Op::Deposit, session, wallet, &entry, new_balance)
            .await
    }

    pub async fn withdraw(
        &self,
        session: &Session,
        wallet: &WalletAccount,
        amount: Decimal,
    ) -> Result<Receipt, ServiceError> {
        check_amount(Op::Withdraw, amount)?;
        check_funds(Op::Withdraw, wallet, amount)?;
        let new_balance = settle(Op::Withdraw, wallet.balance.checked_sub(amount))?;
        let entry = NewLedgerEntry::withdraw(&session.user_id, &wallet.id, amount);
        self.apply(Op::Withdraw, session, wallet, &entry, new_balance)
            .await
    }

    /// Move `amount` out of cash into `project`, recorded as a marked withdraw.
    pub async fn invest(
        &self,
        session: &Session,
        wallet: &WalletAccount,
        amount: Decimal,
        project: &str,
    ) -> Result<Receipt, ServiceError> {
        check_amount(Op::Invest, amount)?;
        if project.trim().is_empty() {
            return Err(reject(
                Op::Invest,
                ServiceError::Validation("project name is required".to_string()),
            ));
        }
        check_funds(Op::Invest, wallet, amount)?;
        let new_balance = settle(Op::Invest, wallet.balance.checked_sub(amount))?;
        let entry = NewLedgerEntry::investment(&session.user_id, &wallet.id, amount, project);
        self.apply(Op::Invest, session, wallet, &entry, new_balance)
            .await
    }

    /// Invest in a catalog project, enforcing its minimum investment.
    pub async fn invest_in_catalog(
        &self,
        session: &Session,
        wallet: &WalletAccount,
        amount: Decimal,
        project_id: u32,
    ) -> Result<Receipt, ServiceError> {
        let Some(project) = catalog::find_project(project_id) else {
            return Err(reject(
                Op::Invest,
                ServiceError::Validation(format!("unknown project id {project_id}")),
            ));
        };
        if amount < project.min_investment() {
            return Err(reject(
                Op::Invest,
                ServiceError::Validation(format!(
                    "minimum investment for {} is {}",
                    project.name, project.min_investment
                )),
            ));
        }
        self.invest(session, wallet, amount, project.name).await
    }

    async fn apply(
        &self,
        op: Op,
        session: &Session,
        wallet: &WalletAccount,
        entry: &NewLedgerEntry,
        new_balance: Decimal,
    ) -> Result<Receipt, ServiceError> {
        let appended = self
            .store
            .append_entry(session, entry)
            .await
            .map_err(store_failed)?;

        if let Err(source) = self
            .store
            .update_balance(session, &wallet.id, new_balance)
            .await
        {
            metrics::counter!(STORE_ERRORS, "kind" => source.kind()).increment(1);
            error!(
                op = op.as_str(),
                entry_id = %appended.id,
                wallet_id = %wallet.id,
                error = %source,
                "ledger entry written but balance update failed"
            );
            return Err(ServiceError::BalanceUpdate {
                entry_id: appended.id,
                source,
            });
        }

        metrics::counter!(LEDGER_OPS, "op" => op.as_str()).increment(1);
        info!(
            op = op.as_str(),
            amount = %entry.amount,
            balance = %new_balance,
            wallet_id = %wallet.id,
            "ledger operation recorded"
        );
        Ok(Receipt {
            entry: appended,
            balance: new_balance,
        })
    }
}

fn check_amount(op: Op, amount: Decimal) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(reject(
            op,
            ServiceError::Validation(format!("amount must be greater than 0, got {amount}")),
        ));
    }
    Ok(())
}

/// The balance a mutation would write, rejected if it is not representable.
fn settle(op: Op, new_balance: Option<Decimal>) -> Result<Decimal, ServiceError> {
    new_balance.ok_or_else(|| {
        reject(
            op,
            ServiceError::Validation("resulting balance is out of range".to_string()),
        )
    })
}

fn check_funds(op: Op, wallet: &WalletAccount, amount: Decimal) -> Result<(), ServiceError> {
    if amount > wallet.balance {
        return Err(reject(
            op,
            ServiceError::InsufficientFunds {
                requested: amount,
                available: wallet.balance,
            },
        ));
    }
    Ok(())
}
