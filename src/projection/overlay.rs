//! Manual per-year overrides with cascading recomputation
//!
//! Overrides replace engine-computed flows for a fiscal year. Every later
//! year opens at the prior year's (possibly overridden) close, so the
//! opening/closing chain holds end to end. Safety net and interest are
//! re-derived unless the safety net itself is overridden.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ledger::YearProjection;

/// Caller-supplied replacement values for one year. `None` keeps the
/// engine's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YearOverride {
    #[serde(default)]
    pub opening_balance: Option<f64>,
    #[serde(default)]
    pub collections: Option<f64>,
    #[serde(default)]
    pub expenses: Option<f64>,
    #[serde(default)]
    pub safety_net: Option<f64>,
    #[serde(default)]
    pub loans_taken: Option<f64>,
    #[serde(default)]
    pub loan_payments: Option<f64>,
}

impl YearOverride {
    /// Override only the year's collections
    pub fn collections(amount: f64) -> Self {
        Self {
            collections: Some(amount),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Replace flow fields on a row (opening balance is handled by the fold)
    fn apply_flows(&self, row: &mut YearProjection) {
        if let Some(collections) = self.collections {
            row.collections = collections;
        }
        if let Some(expenses) = self.expenses {
            row.total_expenses = expenses;
        }
        if let Some(safety_net) = self.safety_net {
            row.safety_net_top_up = safety_net;
        }
        if let Some(loans) = self.loans_taken {
            row.loans_taken = loans;
        }
        if let Some(payments) = self.loan_payments {
            row.total_loan_payments = payments;
        }
        if self.expenses.is_some() || self.loans_taken.is_some() {
            row.out_of_pocket_expenses = (row.total_expenses - row.loans_taken).max(0.0);
        }
    }
}

/// Apply overrides keyed by fiscal year and cascade balances forward.
///
/// Years before the earliest overridden year are returned unchanged. An
/// opening-balance override only takes effect on the first projected year;
/// elsewhere the opening balance is the prior year's close.
pub fn apply_overrides(base: &[YearProjection], overrides: &BTreeMap<i32, YearOverride>) -> Vec<YearProjection> {
    let Some(start) = base.iter().position(|r| overrides.contains_key(&r.fiscal_year)) else {
        return base.to_vec();
    };

    let unchanged = base[..start].to_vec();
    let carried = start.checked_sub(1).map(|prev| base[prev].closing_balance);

    let (years, _) = base[start..].iter().fold((unchanged, carried), |(mut years, carried), row| {
        let next = rederive_year(row, overrides.get(&row.fiscal_year), carried);
        let closing = next.closing_balance;
        years.push(next);
        (years, Some(closing))
    });

    years
}

/// Re-derive one row from its engine values, an optional override and the
/// balance carried in from the prior year
fn rederive_year(row: &YearProjection, year_override: Option<&YearOverride>, carried: Option<f64>) -> YearProjection {
    let mut next = row.clone();
    let opening_override = year_override.and_then(|o| o.opening_balance);

    match (carried, opening_override) {
        (Some(opening), Some(ignored)) => {
            log::warn!(
                "year={} opening balance override {:.2} ignored; carrying prior close {:.2}",
                row.fiscal_year,
                ignored,
                opening,
            );
            next.opening_balance = opening;
        }
        (Some(opening), None) => next.opening_balance = opening,
        (None, Some(opening)) => next.opening_balance = opening,
        (None, None) => {}
    }

    if let Some(year_override) = year_override {
        year_override.apply_flows(&mut next);
        next.adjusted = true;
    }
    if year_override.and_then(|o| o.safety_net).is_none() {
        next.size_safety_net();
    }

    next.interest_income = next.opening_balance.max(0.0) * next.credited_interest_rate / 100.0;
    next.closing_balance = next.implied_closing_balance();
    next
}
