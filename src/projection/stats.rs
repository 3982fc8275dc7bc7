//! Summary statistics over a finished projection

use serde::{Deserialize, Serialize};

use super::ledger::YearProjection;

/// Aggregates for a projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionStats {
    pub total_years: u32,
    pub final_balance: f64,
    pub min_balance: f64,
    pub min_balance_year: i32,
    pub deficit_years: u32,
    pub first_deficit_year: Option<i32>,
    /// Sum of shortfalls below zero across deficit years
    pub total_deficit: f64,
    pub total_collections: f64,
    pub total_reserve_contribution: f64,
    pub total_expenses: f64,
    pub total_safety_net: f64,
    pub total_loans_taken: f64,
    pub total_loan_payments: f64,
    pub total_interest_income: f64,
    pub max_active_loans: usize,
    /// Years closing below the cash reserve target
    pub years_below_cash_reserve: u32,
}

impl ProjectionStats {
    /// Aggregate a projection; `None` when there are no rows
    pub fn from_years(years: &[YearProjection]) -> Option<Self> {
        let last = years.last()?;

        let mut min_row = &years[0];
        for row in years {
            if row.closing_balance < min_row.closing_balance {
                min_row = row;
            }
        }

        Some(Self {
            total_years: years.len() as u32,
            final_balance: last.closing_balance,
            min_balance: min_row.closing_balance,
            min_balance_year: min_row.fiscal_year,
            deficit_years: years.iter().filter(|r| r.is_deficit()).count() as u32,
            first_deficit_year: years.iter().find(|r| r.is_deficit()).map(|r| r.fiscal_year),
            total_deficit: Self::total_deficit_below(years, 0.0),
            total_collections: years.iter().map(|r| r.collections).sum(),
            total_reserve_contribution: years.iter().map(|r| r.reserve_contribution).sum(),
            total_expenses: years.iter().map(|r| r.total_expenses).sum(),
            total_safety_net: years.iter().map(|r| r.safety_net_top_up).sum(),
            total_loans_taken: years.iter().map(|r| r.loans_taken).sum(),
            total_loan_payments: years.iter().map(|r| r.total_loan_payments).sum(),
            total_interest_income: years.iter().map(|r| r.interest_income).sum(),
            max_active_loans: years.iter().map(|r| r.active_loans).max().unwrap_or(0),
            years_below_cash_reserve: years
                .iter()
                .filter(|r| r.closing_balance < r.cash_reserve_target)
                .count() as u32,
        })
    }

    /// Sum of `floor - closing` over years closing below `floor`
    pub fn total_deficit_below(years: &[YearProjection], floor: f64) -> f64 {
        years
            .iter()
            .filter(|r| r.closing_balance < floor)
            .map(|r| floor - r.closing_balance)
            .sum()
    }
}
