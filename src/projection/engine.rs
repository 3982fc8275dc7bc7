//! Core projection engine for year-by-year reserve fund ledgers

use serde::{Deserialize, Serialize};

use super::ledger::{ExpenseDetail, ProjectionResult, YearProjection};
use super::state::ProjectionState;
use crate::error::Result;
use crate::model::{ExpenseSchedule, Occurrence, RecurrencePolicy, SimulationParameters};

/// Relative slack before a cap bound counts as binding
const CAP_EPSILON: f64 = 1e-9;

/// Configuration for a projection run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Fold bank interest on the opening balance into the closing balance
    pub include_interest: bool,

    /// Whether expenses repeat every expected life
    pub recurrence: RecurrencePolicy,

    /// When a large expense is loan-financed
    pub loan_trigger: LoanTrigger,

    /// Year of a loan's first payment
    pub loan_timing: LoanTiming,

    /// How the safety net is sized
    pub safety_net: SafetyNetMode,

    /// Bill ahead for upcoming large expenses: each year collects
    /// `loan% × cost / years_until` for every later large occurrence
    pub reserve_contribution: bool,
}

/// Rule deciding whether a large expense is loan-financed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoanTrigger {
    /// Finance when the inflated cost exceeds the large-expense baseline
    #[default]
    AboveBaseline,
    /// Finance every large expense
    AllLarge,
}

impl LoanTrigger {
    fn fires(&self, inflated_cost: f64, baseline: f64) -> bool {
        match self {
            LoanTrigger::AboveBaseline => inflated_cost > baseline,
            LoanTrigger::AllLarge => inflated_cost > 0.0,
        }
    }
}

/// When debt service on a new loan begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoanTiming {
    /// Drawn at the start of the expense year; first payment that same year
    #[default]
    OriginationYear,
    /// First payment the year after the expense
    FollowingYear,
}

/// Safety net sizing rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SafetyNetMode {
    /// Bill safety_net% of the year's total expenses
    #[default]
    ExpenseShare,
    /// Target safety_net% of (base obligation + expenses + loan payments)
    /// and bill only the shortfall of the provisional closing balance
    TopUpToTarget,
}

/// Main projection engine
#[derive(Debug, Clone, Default)]
pub struct ProjectionEngine {
    config: ProjectionConfig,
}

impl ProjectionEngine {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Run the forward recurrence over the whole horizon
    pub fn project(&self, params: &SimulationParameters, expenses: &ExpenseSchedule) -> Result<ProjectionResult> {
        params.validate()?;
        expenses.validate()?;

        let schedule = expenses.occurrences_by_year(params.horizon_years, self.config.recurrence);
        let large_by_year = Self::large_costs_by_year(params, expenses, &schedule);
        let mut state = ProjectionState::from_parameters(params);
        let mut result = ProjectionResult::new(&params.model_name);

        for occurrences in &schedule {
            let mut row = self.calculate_year(params, expenses, occurrences, &mut state)?;
            if self.config.reserve_contribution {
                row.reserve_contribution = Self::reserve_contribution(params, &large_by_year, row.year_index);
            }
            self.finish_year(params, &mut row);
            state.advance_year(&row);
            result.add_row(row);
        }

        result.loans = state.loans.into_records();
        Ok(result)
    }

    /// Calculate one ledger row
    fn calculate_year(
        &self,
        params: &SimulationParameters,
        expenses: &ExpenseSchedule,
        occurrences: &[Occurrence],
        state: &mut ProjectionState,
    ) -> Result<YearProjection> {
        let mut row = YearProjection::new(state.year_index, state.fiscal_year, state.opening_balance);
        let inflation = params.inflation_factor(state.year_index);

        self.calculate_fee(params, state, inflation, &mut row);

        match self.config.loan_timing {
            LoanTiming::OriginationYear => {
                self.resolve_expenses(params, expenses, occurrences, inflation, state, &mut row)?;
                Self::collect_loan_payments(state, &mut row);
            }
            LoanTiming::FollowingYear => {
                Self::collect_loan_payments(state, &mut row);
                self.resolve_expenses(params, expenses, occurrences, inflation, state, &mut row)?;
            }
        }
        row.active_loans = state.loans.active_count();

        Ok(row)
    }

    /// Safety net, insights and the closing balance once every flow is known
    fn finish_year(&self, params: &SimulationParameters, row: &mut YearProjection) {
        row.safety_net_mode = self.config.safety_net;
        row.safety_net_rate = params.safety_net_percentage;
        row.size_safety_net();
        self.calculate_insights(params, row);

        row.closing_balance = row.implied_closing_balance();

        log::debug!(
            "year={} fee={:.2} capped={} collections={:.2} reserve={:.2} expenses={:.2} loans={:.2} debt_service={:.2} closing={:.2}",
            row.fiscal_year,
            row.monthly_fee,
            row.fee_increase_capped,
            row.collections,
            row.reserve_contribution,
            row.total_expenses,
            row.loans_taken,
            row.total_loan_payments,
            row.closing_balance,
        );
    }

    /// Inflated cost of large occurrences per year index
    fn large_costs_by_year(
        params: &SimulationParameters,
        expenses: &ExpenseSchedule,
        schedule: &[Vec<Occurrence>],
    ) -> Vec<f64> {
        schedule
            .iter()
            .enumerate()
            .map(|(year, occurrences)| {
                let inflation = params.inflation_factor(year as u32);
                occurrences
                    .iter()
                    .filter_map(|o| expenses.entry(o.entry))
                    .filter(|entry| entry.size.is_large())
                    .map(|entry| entry.base_cost * inflation)
                    .sum()
            })
            .collect()
    }

    /// Advance billing for large expenses falling after `year_index`
    fn reserve_contribution(params: &SimulationParameters, large_by_year: &[f64], year_index: u32) -> f64 {
        let share = params.loan_threshold_percentage / 100.0;
        let current = year_index as usize;

        large_by_year
            .iter()
            .enumerate()
            .skip(current + 1)
            .filter(|(_, cost)| **cost > 0.0)
            .map(|(year, cost)| cost * share / (year - current) as f64)
            .sum()
    }

    /// Inflation-driven target fee, limited by the year-over-year cap and
    /// floored at the minimum collection fee
    fn calculate_fee(&self, params: &SimulationParameters, state: &ProjectionState, inflation: f64, row: &mut YearProjection) {
        let target = params.base_monthly_fee * inflation;

        let (fee, capped) = match state.previous_fee {
            None => (target, false),
            Some(previous) => {
                let bound = previous * (1.0 + params.maximum_fee_increase / 100.0);
                if bound < target * (1.0 - CAP_EPSILON) {
                    (bound, true)
                } else {
                    (target, false)
                }
            }
        };

        let billing = params.annual_billing_factor();
        row.target_monthly_fee = target;
        row.monthly_fee = fee.max(params.minimum_collection_fee);
        row.fee_increase_capped = capped;
        row.base_obligation = target * billing;
        row.collections = row.monthly_fee * billing;
    }

    /// Inflate every expense due this year and split large ones into loan
    /// and out-of-pocket portions
    fn resolve_expenses(
        &self,
        params: &SimulationParameters,
        expenses: &ExpenseSchedule,
        occurrences: &[Occurrence],
        inflation: f64,
        state: &mut ProjectionState,
        row: &mut YearProjection,
    ) -> Result<()> {
        for occurrence in occurrences {
            let Some(entry) = expenses.entry(occurrence.entry) else {
                continue;
            };

            let inflated_cost = entry.base_cost * inflation;
            let financed = entry.size.is_large()
                && self.config.loan_trigger.fires(inflated_cost, params.large_expense_baseline);

            let loan_financed = if financed {
                inflated_cost * params.loan_threshold_percentage / 100.0
            } else {
                0.0
            };

            if loan_financed > 0.0 {
                let record = state.loans.originate(
                    &entry.name,
                    state.year_index,
                    state.fiscal_year,
                    loan_financed,
                    params.loan_interest_rate,
                    params.loan_tenure_years,
                )?;
                row.loans_taken += record.principal;
                row.loans_issued.push(record);
            }

            let out_of_pocket = inflated_cost - loan_financed;
            row.total_expenses += inflated_cost;
            row.out_of_pocket_expenses += out_of_pocket;
            row.expenses.push(ExpenseDetail {
                name: entry.name.clone(),
                size: entry.size,
                is_sirs: entry.is_sirs,
                occurrence: occurrence.occurrence,
                base_cost: entry.base_cost,
                inflated_cost,
                loan_financed,
                out_of_pocket,
            });
        }

        Ok(())
    }

    fn collect_loan_payments(state: &mut ProjectionState, row: &mut YearProjection) {
        let payments = state.loans.collect_payments();
        row.total_loan_payments += payments.iter().map(|p| p.payment).sum::<f64>();
        row.loan_payments.extend(payments);
    }

    /// Interest income, purchasing-power loss and the cash reserve target
    fn calculate_insights(&self, params: &SimulationParameters, row: &mut YearProjection) {
        let invested = row.opening_balance.max(0.0);

        if self.config.include_interest {
            row.credited_interest_rate = params.bank_interest_rate;
            row.interest_income = invested * params.bank_interest_rate / 100.0;
        }

        row.purchasing_power_loss = invested * params.inflation_rate / 100.0;
        row.cash_reserve_target =
            (row.base_obligation + row.total_expenses) * params.cash_reserve_threshold / 100.0;
    }
}

/// Project with the default configuration and return the year rows
pub fn project(params: &SimulationParameters, expenses: &ExpenseSchedule) -> Result<Vec<YearProjection>> {
    Ok(ProjectionEngine::default().project(params, expenses)?.into_years())
}
