use chrono::{DateTime, TimeZone, Utc};
use common::types::{investment_details, EntryType, LedgerEntry, WalletAccount, STATUS_COMPLETED};
use rust_decimal::Decimal;

use crate::LedgerView;

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

fn entry(
    entry_type: EntryType,
    amount: Decimal,
    details: Option<String>,
    created_at: DateTime<Utc>,
) -> LedgerEntry {
    LedgerEntry {
        id: format!("t-{}", created_at.timestamp()),
        user_id: "u1".to_string(),
        wallet_id: "w1".to_string(),
        entry_type,
        amount,
        status: STATUS_COMPLETED.to_string(),
        created_at,
        details,
    }
}

pub fn deposit(amount: Decimal, year: i32, month: u32, day: u32) -> LedgerEntry {
    entry(EntryType::Deposit, amount, None, at(year, month, day))
}

pub fn withdraw(amount: Decimal, year: i32, month: u32, day: u32) -> LedgerEntry {
    entry(EntryType::Withdraw, amount, None, at(year, month, day))
}

pub fn invest(amount: Decimal, project: &str, year: i32, month: u32, day: u32) -> LedgerEntry {
    entry(
        EntryType::Withdraw,
        amount,
        Some(investment_details(project)),
        at(year, month, day),
    )
}

pub fn view(balance: Decimal, entries: Vec<LedgerEntry>) -> LedgerView {
    LedgerView {
        wallet: WalletAccount {
            id: "w1".to_string(),
            user_id: "u1".to_string(),
            balance,
            created_at: None,
            updated_at: None,
        },
        entries,
    }
}
