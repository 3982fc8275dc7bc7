//! Simulation parameters for a reserve fund model

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Complete, fully-typed parameter set for one projection run.
///
/// All rate fields are percentages (`3.5` means 3.5%). All monetary
/// fields are plain dollars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationParameters {
    /// Display name of the model
    pub model_name: String,

    /// Fiscal year of projection year 0
    pub starting_fiscal_year: i32,

    /// Number of projected years
    pub horizon_years: u32,

    /// Number of housing units billed
    pub housing_units: u32,

    /// Fund balance at the start of year 0
    pub starting_balance: f64,

    /// Monthly fee per unit in starting-year dollars
    pub base_monthly_fee: f64,

    /// Floor for the effective monthly fee
    pub minimum_collection_fee: f64,

    /// Annual inflation rate (%)
    pub inflation_rate: f64,

    /// Maximum year-over-year fee increase (%)
    pub maximum_fee_increase: f64,

    /// Bank savings interest rate (%)
    pub bank_interest_rate: f64,

    /// Safety net as a share of annual expenses (%)
    pub safety_net_percentage: f64,

    /// Cash reserve target as a share of annual obligations (%)
    pub cash_reserve_threshold: f64,

    /// Large expenses above this inflated cost are loan-financed
    pub large_expense_baseline: f64,

    /// Share of a financed expense covered by the loan (%)
    pub loan_threshold_percentage: f64,

    /// Loan amortization period in years
    pub loan_tenure_years: u32,

    /// Annual loan interest rate (%)
    pub loan_interest_rate: f64,
}

impl SimulationParameters {
    /// Society maintenance model used as the reference case:
    /// $120,000 of annual maintenance billed as a single unit over 30 years.
    pub fn society_maintenance() -> Self {
        Self {
            model_name: "Society Maintenance Model".to_string(),
            starting_fiscal_year: 2022,
            horizon_years: 30,
            housing_units: 1,
            starting_balance: 0.0,
            base_monthly_fee: 120_000.0 / 12.0,
            minimum_collection_fee: 0.0,
            inflation_rate: 5.0,
            maximum_fee_increase: 13.0,
            bank_interest_rate: 2.0,
            safety_net_percentage: 10.0,
            cash_reserve_threshold: 10.0,
            large_expense_baseline: 0.0,
            loan_threshold_percentage: 70.0,
            loan_tenure_years: 5,
            loan_interest_rate: 10.0,
        }
    }

    /// Reject parameter sets the engine cannot project
    pub fn validate(&self) -> Result<()> {
        if self.horizon_years == 0 {
            return Err(ModelError::InvalidParameter {
                field: "horizon_years",
                reason: "must be at least 1".to_string(),
            });
        }

        let rates = [
            ("inflation_rate", self.inflation_rate),
            ("maximum_fee_increase", self.maximum_fee_increase),
            ("bank_interest_rate", self.bank_interest_rate),
            ("safety_net_percentage", self.safety_net_percentage),
            ("cash_reserve_threshold", self.cash_reserve_threshold),
            ("loan_threshold_percentage", self.loan_threshold_percentage),
            ("loan_interest_rate", self.loan_interest_rate),
        ];
        let amounts = [
            ("starting_balance", self.starting_balance),
            ("base_monthly_fee", self.base_monthly_fee),
            ("minimum_collection_fee", self.minimum_collection_fee),
            ("large_expense_baseline", self.large_expense_baseline),
        ];

        for (field, value) in rates.into_iter().chain(amounts) {
            check_non_negative(field, value)?;
        }

        if self.loan_threshold_percentage > 100.0 {
            return Err(ModelError::InvalidParameter {
                field: "loan_threshold_percentage",
                reason: format!("{} exceeds 100%", self.loan_threshold_percentage),
            });
        }

        Ok(())
    }

    /// Copy of these parameters with a different year-0 monthly fee
    pub fn with_base_monthly_fee(&self, fee: f64) -> Self {
        Self {
            base_monthly_fee: fee,
            ..self.clone()
        }
    }

    /// Fiscal year of a projection year index
    pub fn fiscal_year(&self, year_index: u32) -> i32 {
        self.starting_fiscal_year + year_index as i32
    }

    /// Annual billing multiplier: 12 months × housing units
    pub fn annual_billing_factor(&self) -> f64 {
        12.0 * self.housing_units as f64
    }

    /// Compounded inflation factor for a year index
    pub fn inflation_factor(&self, year_index: u32) -> f64 {
        (1.0 + self.inflation_rate / 100.0).powi(year_index as i32)
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(ModelError::InvalidParameter {
            field,
            reason: format!("{} is not a finite number", value),
        });
    }
    if value < 0.0 {
        return Err(ModelError::InvalidParameter {
            field,
            reason: format!("{} is negative", value),
        });
    }
    Ok(())
}
