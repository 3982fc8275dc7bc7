//! Carry-forward state between projection years

use super::ledger::YearProjection;
use super::loan::LoanLedger;
use crate::model::SimulationParameters;

/// State of the fund at the start of a projection year
#[derive(Debug, Clone)]
pub struct ProjectionState {
    /// Current projection year (0-indexed)
    pub year_index: u32,

    /// Calendar fiscal year
    pub fiscal_year: i32,

    /// Balance carried in from the prior year's close
    pub opening_balance: f64,

    /// Prior year's effective monthly fee (None in year 0)
    pub previous_fee: Option<f64>,

    /// Loans outstanding at the start of the year
    pub loans: LoanLedger,
}

impl ProjectionState {
    /// Initialize state at projection start
    pub fn from_parameters(params: &SimulationParameters) -> Self {
        Self {
            year_index: 0,
            fiscal_year: params.starting_fiscal_year,
            opening_balance: params.starting_balance,
            previous_fee: None,
            loans: LoanLedger::new(),
        }
    }

    /// Roll forward to the next year using the row just calculated
    pub fn advance_year(&mut self, row: &YearProjection) {
        self.year_index += 1;
        self.fiscal_year += 1;
        self.opening_balance = row.closing_balance;
        self.previous_fee = Some(row.monthly_fee);
    }
}
