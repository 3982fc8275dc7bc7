//! Fee optimization outcome types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::SimulationParameters;
use crate::projection::YearOverride;

/// One doubling or bisection step of the flat-fee search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_fee: f64,
    pub min_balance: f64,
    pub total_deficit: f64,
    pub feasible: bool,
}

/// Optimized monthly fee for a single year of a per-year schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearlyFee {
    pub year_index: u32,
    pub fiscal_year: i32,
    pub fee: f64,
}

/// A year whose deficit the fee cap prevented from clearing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnclearedYear {
    pub fiscal_year: i32,
    /// Fee that would have cleared the year (None with zero housing units)
    pub required_fee: Option<f64>,
    /// Cap bound from the prior year's effective fee (None in year 0)
    pub max_allowed_fee: Option<f64>,
    pub residual_deficit: f64,
}

/// Why no compliant fee schedule was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Infeasibility {
    /// Bisection hit its iteration cap before reaching tolerance
    NonConvergence { best_feasible_fee: f64, iterations: u32 },
    /// Some years cannot be cleared under the fee cap
    Structural { uncleared: Vec<UnclearedYear> },
}

/// Result of a fee optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub feasible: bool,
    pub flat_fee: Option<f64>,
    pub has_yearly_adjustments: bool,
    pub yearly_fees: Vec<YearlyFee>,
    pub infeasibility: Option<Infeasibility>,
    pub iterations: Vec<SearchIteration>,
    pub message: String,
}

impl OptimizationResult {
    pub(crate) fn flat(fee: f64, iterations: Vec<SearchIteration>, message: String) -> Self {
        Self {
            feasible: true,
            flat_fee: Some(fee),
            has_yearly_adjustments: false,
            yearly_fees: Vec::new(),
            infeasibility: None,
            iterations,
            message,
        }
    }

    /// Parameters with the optimized flat fee as the year-0 fee
    pub fn apply_flat_fee(&self, params: &SimulationParameters) -> Option<SimulationParameters> {
        self.flat_fee.map(|fee| params.with_base_monthly_fee(fee))
    }

    /// Per-year fees as overlay overrides: `fee × 12 × housing units` collections
    pub fn yearly_overrides(&self, params: &SimulationParameters) -> BTreeMap<i32, YearOverride> {
        let billing = params.annual_billing_factor();
        self.yearly_fees
            .iter()
            .map(|y| (y.fiscal_year, YearOverride::collections(y.fee * billing)))
            .collect()
    }

    /// Fiscal years that could not be cleared
    pub fn offending_years(&self) -> Vec<i32> {
        match &self.infeasibility {
            Some(Infeasibility::Structural { uncleared }) => uncleared.iter().map(|u| u.fiscal_year).collect(),
            _ => Vec::new(),
        }
    }
}
