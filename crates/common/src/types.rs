use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix written into `details` when a withdraw entry funds a project.
pub const INVESTMENT_MARKER: &str = "Investment:";

/// Marker written by earlier clients. Still recognised when reading.
///
/// Those clients only recognise this prefix, so entries written with
/// [`INVESTMENT_MARKER`] show up there as plain withdrawals when both share
/// a backend.
pub const LEGACY_INVESTMENT_MARKER: &str = "Inversión:";

/// Label of the cash bucket in allocation views.
pub const CASH_LABEL: &str = "USDQ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Deposit,
    Withdraw,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(Self::Deposit),
            "withdraw" => Some(Self::Withdraw),
            _ => None,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status the app writes for every entry it appends.
pub const STATUS_COMPLETED: &str = "completed";

/// One row of the `transactions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub wallet_id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub details: Option<String>,
}

impl LedgerEntry {
    /// Project name if this is an investment-marked withdraw.
    pub fn investment_project(&self) -> Option<&str> {
        if self.entry_type != EntryType::Withdraw {
            return None;
        }
        self.details.as_deref().and_then(parse_investment_details)
    }

    pub fn is_investment(&self) -> bool {
        self.investment_project().is_some()
    }

    /// Signed effect on the cash balance.
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Deposit => self.amount,
            EntryType::Withdraw => -self.amount,
        }
    }
}

/// Extract the trimmed project name from an investment `details` tag.
pub fn parse_investment_details(details: &str) -> Option<&str> {
    details
        .strip_prefix(INVESTMENT_MARKER)
        .or_else(|| details.strip_prefix(LEGACY_INVESTMENT_MARKER))
        .map(str::trim)
}

pub fn investment_details(project: &str) -> String {
    format!("{INVESTMENT_MARKER} {}", project.trim())
}

/// Entry to be appended. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLedgerEntry {
    pub user_id: String,
    pub wallet_id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl NewLedgerEntry {
    pub fn deposit(user_id: &str, wallet_id: &str, amount: Decimal) -> Self {
        Self::completed(user_id, wallet_id, EntryType::Deposit, amount, None)
    }

    pub fn withdraw(user_id: &str, wallet_id: &str, amount: Decimal) -> Self {
        Self::completed(user_id, wallet_id, EntryType::Withdraw, amount, None)
    }

    /// Investments are stored as withdraws tagged with the investment marker.
    pub fn investment(user_id: &str, wallet_id: &str, amount: Decimal, project: &str) -> Self {
        Self::completed(
            user_id,
            wallet_id,
            EntryType::Withdraw,
            amount,
            Some(investment_details(project)),
        )
    }

    fn completed(
        user_id: &str,
        wallet_id: &str,
        entry_type: EntryType,
        amount: Decimal,
        details: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            wallet_id: wallet_id.to_string(),
            entry_type,
            amount,
            status: STATUS_COMPLETED.to_string(),
            details,
        }
    }
}

/// One row of the `wallets` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub id: String,
    pub user_id: String,
    pub balance: Decimal,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Authenticated user context passed to every store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub access_token: Option<String>,
}

impl Session {
    /// Session for the local store, which has no auth.
    pub fn local(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            access_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(entry_type: EntryType, details: Option<&str>) -> LedgerEntry {
        LedgerEntry {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            wallet_id: "w1".to_string(),
            entry_type,
            amount: dec!(10),
            status: STATUS_COMPLETED.to_string(),
            created_at: Utc::now(),
            details: details.map(str::to_string),
        }
    }

    #[test]
    fn test_entry_type_roundtrip_strings() {
        assert_eq!(EntryType::Deposit.as_str(), "deposit");
        assert_eq!(EntryType::from_str_loose("WITHDRAW"), Some(EntryType::Withdraw));
        assert_eq!(EntryType::from_str_loose("investment"), None);
    }

    #[test]
    fn test_investment_project_recognises_both_markers() {
        let e = entry(EntryType::Withdraw, Some("Investment:  Lending Pool "));
        assert_eq!(e.investment_project(), Some("Lending Pool"));

        let legacy = entry(EntryType::Withdraw, Some("Inversión: Qubic Staking"));
        assert_eq!(legacy.investment_project(), Some("Qubic Staking"));
    }

    #[test]
    fn test_deposit_with_marker_is_not_investment() {
        let e = entry(EntryType::Deposit, Some("Investment: Alpha"));
        assert!(!e.is_investment());
        assert_eq!(e.signed_amount(), dec!(10));
    }

    #[test]
    fn test_plain_withdraw_is_not_investment() {
        let e = entry(EntryType::Withdraw, Some("rent"));
        assert!(!e.is_investment());
        assert_eq!(e.signed_amount(), dec!(-10));
    }

    #[test]
    fn test_new_investment_entry_details() {
        let e = NewLedgerEntry::investment("u1", "w1", dec!(250), "USDQ Farming");
        assert_eq!(e.entry_type, EntryType::Withdraw);
        assert_eq!(e.details.as_deref(), Some("Investment: USDQ Farming"));
        assert_eq!(e.status, "completed");
    }

    #[test]
    fn test_parse_ledger_entry_row() {
        let json = r#"{"id":"a","user_id":"u","wallet_id":"w","type":"deposit","amount":"12.50","status":"completed","created_at":"2024-03-01T10:00:00+00:00","details":null}"#;
        let e: LedgerEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.entry_type, EntryType::Deposit);
        assert_eq!(e.amount, dec!(12.50));
        assert!(e.details.is_none());
    }

    #[test]
    fn test_parse_wallet_row_with_numeric_balance() {
        let json = r#"{"id":"w","user_id":"u","balance":700,"created_at":null,"updated_at":null}"#;
        let w: WalletAccount = serde_json::from_str(json).unwrap();
        assert_eq!(w.balance, dec!(700));
    }
}
