use common::types::EntryType;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::investments::compute_project_investments;
use crate::LedgerView;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EarningsSummary {
    /// Cash balance plus the current value of every investment.
    pub current_balance: Decimal,
    /// Deposits minus cash withdrawals. Investments are not subtracted.
    pub initial_investment: Decimal,
    pub total_earnings: Decimal,
    pub earnings_percent: Decimal,
}

/// `part / whole × 100`. Results beyond the `Decimal` range saturate to
/// `Decimal::MAX` or `Decimal::MIN` by the sign of `part`.
fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(if part.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        })
}

pub fn compute_earnings_summary(view: &LedgerView) -> EarningsSummary {
    let balance = view.wallet.balance;
    if view.entries.is_empty() {
        return EarningsSummary {
            current_balance: balance,
            initial_investment: balance,
            total_earnings: Decimal::ZERO,
            earnings_percent: Decimal::ZERO,
        };
    }

    let deposits = view
        .entries
        .iter()
        .filter(|e| e.entry_type == EntryType::Deposit)
        .map(|e| e.amount)
        .fold(Decimal::ZERO, Decimal::saturating_add);
    let cash_withdrawals = view
        .entries
        .iter()
        .filter(|e| e.entry_type == EntryType::Withdraw && !e.is_investment())
        .map(|e| e.amount)
        .fold(Decimal::ZERO, Decimal::saturating_add);
    let investments_value = compute_project_investments(view)
        .iter()
        .map(|p| p.current_value)
        .fold(Decimal::ZERO, Decimal::saturating_add);

    let initial_investment = deposits.saturating_sub(cash_withdrawals);
    let current_balance = balance.saturating_add(investments_value);
    let total_earnings = current_balance.saturating_sub(initial_investment);
    let earnings_percent = if initial_investment > Decimal::ZERO {
        percent_of(total_earnings, initial_investment)
    } else {
        Decimal::ZERO
    };

    EarningsSummary {
        current_balance,
        initial_investment,
        total_earnings,
        earnings_percent,
    }
}
