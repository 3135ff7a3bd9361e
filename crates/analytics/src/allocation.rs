use common::types::CASH_LABEL;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::warn;

use crate::investments::{group_by_project, ProjectTotal};
use crate::LedgerView;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationSlice {
    pub label: String,
    pub percent: i64,
}

impl AllocationSlice {
    fn new(label: &str, percent: i64) -> Self {
        Self {
            label: label.to_string(),
            percent,
        }
    }
}

/// `part / total × 100` rounded to a whole percent, halves away from zero.
/// `None` when the result does not fit.
fn whole_percent(part: Decimal, total: Decimal) -> Option<i64> {
    part.checked_div(total)?
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Split of total assets between cash and each funded project.
///
/// Cash is always the first slice. Projects follow in first-seen ledger
/// order and are dropped when they round to 0%. After rounding, whatever is
/// needed to reach exactly 100 is added to the largest slice (the earliest
/// one wins a tie). When total assets are not positive, or the split cannot
/// be represented, everything is reported as cash.
pub fn compute_asset_allocation(view: &LedgerView) -> Vec<AllocationSlice> {
    let cash = view.wallet.balance;
    let projects = group_by_project(&view.entries);
    let invested = projects
        .iter()
        .map(|p| p.invested)
        .fold(Decimal::ZERO, Decimal::saturating_add);
    let total = cash.saturating_add(invested);

    if total <= Decimal::ZERO {
        return vec![AllocationSlice::new(CASH_LABEL, 100)];
    }

    split(cash, &projects, total).unwrap_or_else(|| {
        warn!(%cash, %invested, "allocation out of range, reporting all cash");
        vec![AllocationSlice::new(CASH_LABEL, 100)]
    })
}

fn split(
    cash: Decimal,
    projects: &[ProjectTotal<'_>],
    total: Decimal,
) -> Option<Vec<AllocationSlice>> {
    let mut slices = vec![AllocationSlice::new(CASH_LABEL, whole_percent(cash, total)?)];
    for p in projects {
        let percent = whole_percent(p.invested, total)?;
        if percent > 0 {
            slices.push(AllocationSlice::new(p.name, percent));
        }
    }

    let sum = slices
        .iter()
        .try_fold(0i64, |acc, s| acc.checked_add(s.percent))?;
    if sum != 100 {
        let mut largest = 0;
        for (i, slice) in slices.iter().enumerate() {
            if slice.percent > slices[largest].percent {
                largest = i;
            }
        }
        let correction = 100i64.checked_sub(sum)?;
        slices[largest].percent = slices[largest].percent.checked_add(correction)?;
    }

    Some(slices)
}
