//! Year-by-year ledger rows produced by the projection engine

use serde::{Deserialize, Serialize};

use super::engine::SafetyNetMode;
use super::loan::{LoanPayment, LoanRecord};
use super::stats::ProjectionStats;
use crate::model::ExpenseSize;

/// One expense occurrence resolved in a projection year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDetail {
    pub name: String,
    pub size: ExpenseSize,
    pub is_sirs: bool,
    /// 0 for the first replacement within the horizon
    pub occurrence: u32,
    pub base_cost: f64,
    pub inflated_cost: f64,
    pub loan_financed: f64,
    pub out_of_pocket: f64,
}

/// A single row of projection output for one fiscal year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearProjection {
    // Timing
    pub year_index: u32,
    pub fiscal_year: i32,

    pub opening_balance: f64,

    // Fees
    pub target_monthly_fee: f64,
    pub monthly_fee: f64,
    pub fee_increase_capped: bool,
    pub base_obligation: f64,
    pub collections: f64,
    /// Advance billing toward upcoming large expenses
    pub reserve_contribution: f64,

    // Expenses
    pub expenses: Vec<ExpenseDetail>,
    pub total_expenses: f64,
    pub out_of_pocket_expenses: f64,

    // Safety net
    pub safety_net_target: f64,
    pub safety_net_top_up: f64,
    pub safety_net_mode: SafetyNetMode,
    /// Safety net percentage the row was sized with
    pub safety_net_rate: f64,

    // Loans
    pub loans_issued: Vec<LoanRecord>,
    pub loans_taken: f64,
    pub loan_payments: Vec<LoanPayment>,
    pub total_loan_payments: f64,
    pub active_loans: usize,

    // Insights
    pub interest_income: f64,
    /// Rate (%) at which interest was folded into the balance, 0 if not
    pub credited_interest_rate: f64,
    pub purchasing_power_loss: f64,
    pub cash_reserve_target: f64,

    /// Set when a manual override touched this row
    pub adjusted: bool,

    pub closing_balance: f64,
}

impl YearProjection {
    /// Create an empty row for a year
    pub fn new(year_index: u32, fiscal_year: i32, opening_balance: f64) -> Self {
        Self {
            year_index,
            fiscal_year,
            opening_balance,
            target_monthly_fee: 0.0,
            monthly_fee: 0.0,
            fee_increase_capped: false,
            base_obligation: 0.0,
            collections: 0.0,
            reserve_contribution: 0.0,
            expenses: Vec::new(),
            total_expenses: 0.0,
            out_of_pocket_expenses: 0.0,
            safety_net_target: 0.0,
            safety_net_top_up: 0.0,
            safety_net_mode: SafetyNetMode::default(),
            safety_net_rate: 0.0,
            loans_issued: Vec::new(),
            loans_taken: 0.0,
            loan_payments: Vec::new(),
            total_loan_payments: 0.0,
            active_loans: 0,
            interest_income: 0.0,
            credited_interest_rate: 0.0,
            purchasing_power_loss: 0.0,
            cash_reserve_target: 0.0,
            adjusted: false,
            closing_balance: opening_balance,
        }
    }

    /// Closing balance implied by this row's flows.
    ///
    /// Loan proceeds flow in and the full expense flows out, so only the
    /// out-of-pocket share of a financed expense reduces the balance.
    pub fn implied_closing_balance(&self) -> f64 {
        self.opening_balance
            + self.collections
            + self.reserve_contribution
            + self.safety_net_top_up
            + self.loans_taken
            + self.interest_income
            - self.total_expenses
            - self.total_loan_payments
    }

    /// Total amount billed to residents this year
    pub fn total_billed(&self) -> f64 {
        self.collections + self.reserve_contribution + self.safety_net_top_up
    }

    /// Balance after this year's flows, before the safety net and interest
    pub fn provisional_balance(&self) -> f64 {
        self.opening_balance + self.collections + self.reserve_contribution + self.loans_taken
            - self.total_expenses
            - self.total_loan_payments
    }

    /// Size the safety net target and top-up from the row's current flows
    pub(crate) fn size_safety_net(&mut self) {
        let share = self.safety_net_rate / 100.0;

        match self.safety_net_mode {
            SafetyNetMode::ExpenseShare => {
                self.safety_net_target = self.total_expenses * share;
                self.safety_net_top_up = self.safety_net_target;
            }
            SafetyNetMode::TopUpToTarget => {
                self.safety_net_target = (self.base_obligation + self.total_expenses + self.total_loan_payments) * share;
                self.safety_net_top_up = (self.safety_net_target - self.provisional_balance()).max(0.0);
            }
        }
    }

    /// Extra collections needed to lift the closing balance by `deficit`.
    /// Under a top-up safety net, added collections first displace the top-up.
    pub fn collections_to_clear(&self, deficit: f64) -> f64 {
        match self.safety_net_mode {
            SafetyNetMode::ExpenseShare => deficit,
            SafetyNetMode::TopUpToTarget => deficit + self.safety_net_top_up,
        }
    }

    pub fn is_deficit(&self) -> bool {
        self.closing_balance < 0.0
    }

    /// Effective monthly fee per unit implied by collections.
    /// Zero units give `None` rather than dividing by zero.
    pub fn monthly_fee_per_unit(&self, housing_units: u32) -> Option<f64> {
        if housing_units == 0 {
            None
        } else {
            Some(self.collections / (12.0 * housing_units as f64))
        }
    }
}

/// Complete projection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub model_name: String,

    /// One row per projected year
    pub years: Vec<YearProjection>,

    /// Final state of every loan originated during the run
    pub loans: Vec<LoanRecord>,
}

impl ProjectionResult {
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            years: Vec::new(),
            loans: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: YearProjection) {
        self.years.push(row);
    }

    /// Row for a fiscal year
    pub fn year(&self, fiscal_year: i32) -> Option<&YearProjection> {
        self.years.iter().find(|r| r.fiscal_year == fiscal_year)
    }

    /// Summary statistics (`None` for an empty projection)
    pub fn stats(&self) -> Option<ProjectionStats> {
        ProjectionStats::from_years(&self.years)
    }

    /// True when no year closes below `minimum_balance`
    pub fn is_solvent(&self, minimum_balance: f64) -> bool {
        self.years.iter().all(|r| r.closing_balance >= minimum_balance)
    }

    pub fn into_years(self) -> Vec<YearProjection> {
        self.years
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_implied_closing_balance() {
        let mut row = YearProjection::new(0, 2024, 10_000.0);
        row.collections = 5_000.0;
        row.safety_net_top_up = 500.0;
        row.loans_taken = 8_000.0;
        row.total_expenses = 10_000.0;
        row.total_loan_payments = 1_200.0;
        row.interest_income = 100.0;

        assert_relative_eq!(row.implied_closing_balance(), 12_400.0);
        assert_relative_eq!(row.total_billed(), 5_500.0);

        row.reserve_contribution = 600.0;
        assert_relative_eq!(row.implied_closing_balance(), 13_000.0);
        assert_relative_eq!(row.total_billed(), 6_100.0);
    }

    #[test]
    fn test_top_up_sized_from_provisional_balance() {
        let mut row = YearProjection::new(1, 2025, 20_000.0);
        row.safety_net_mode = SafetyNetMode::TopUpToTarget;
        row.safety_net_rate = 50.0;
        row.base_obligation = 10_000.0;
        row.collections = 10_000.0;
        row.total_expenses = 100_000.0;

        // Target 55k against a provisional balance of -70k
        row.size_safety_net();
        assert_relative_eq!(row.safety_net_target, 55_000.0);
        assert_relative_eq!(row.safety_net_top_up, 125_000.0);
        assert_relative_eq!(row.collections_to_clear(1_000.0), 126_000.0);

        row.opening_balance = 1_000_000.0;
        row.size_safety_net();
        assert_eq!(row.safety_net_top_up, 0.0);
    }

    #[test]
    fn test_monthly_fee_guard() {
        let mut row = YearProjection::new(0, 2024, 0.0);
        row.collections = 24_000.0;
        assert_eq!(row.monthly_fee_per_unit(0), None);
        assert_relative_eq!(row.monthly_fee_per_unit(10).unwrap(), 200.0);
    }
}
