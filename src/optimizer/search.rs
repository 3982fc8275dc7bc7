//! Minimum-fee search: flat-fee doubling and bisection with a per-year fallback

use std::collections::BTreeMap;

use super::result::{Infeasibility, OptimizationResult, SearchIteration, UnclearedYear, YearlyFee};
use crate::error::Result;
use crate::model::{ExpenseSchedule, SimulationParameters};
use crate::projection::{
    apply_overrides, ProjectionConfig, ProjectionEngine, ProjectionStats, YearOverride, YearProjection,
};

/// Relative slack when comparing a required fee to its cap bound
const BOUND_EPSILON: f64 = 1e-9;

/// Configuration for a fee optimization
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Flat-fee search stops once the bracket is this narrow (per month)
    pub tolerance: f64,

    /// Hard cap on bracket-doubling plus bisection steps
    pub max_iterations: u32,

    /// Initial upper bracket, as a multiple of max(base fee, minimum fee)
    pub max_fee_multiplier: f64,

    /// Closing balances must stay at or above this amount
    pub minimum_reserve_balance: f64,

    /// Total shortfall below the floor, summed over years, that a flat fee
    /// may leave. The per-year schedule always clears every year.
    pub deficit_tolerance: f64,

    /// Engine configuration used for every candidate projection
    pub projection: ProjectionConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            max_iterations: 60,
            max_fee_multiplier: 3.0,
            minimum_reserve_balance: 0.0,
            deficit_tolerance: 0.0,
            projection: ProjectionConfig::default(),
        }
    }
}

/// Outcome of projecting one candidate fee
#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    min_balance: f64,
    total_deficit: f64,
    feasible: bool,
}

/// Fee optimizer
#[derive(Debug, Clone, Default)]
pub struct FeeOptimizer {
    config: OptimizerConfig,
}

impl FeeOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Find the smallest compliant flat fee, falling back to a per-year
    /// schedule when the search budget runs out before any flat fee is
    /// solvent or raising the fee stops improving the balance.
    ///
    /// Errors only come from invalid parameters or loan terms; an
    /// unsolvable model is reported through the result.
    pub fn optimize(&self, params: &SimulationParameters, expenses: &ExpenseSchedule) -> Result<OptimizationResult> {
        let engine = ProjectionEngine::new(self.config.projection.clone());

        let lower = params.minimum_collection_fee;
        let low_eval = self.evaluate(&engine, params, expenses, lower)?;
        if low_eval.feasible {
            let message = format!("Minimum fee {:.2} already keeps the fund solvent.", lower);
            log::info!("{}: {}", params.model_name, message);
            return Ok(OptimizationResult::flat(lower, Vec::new(), message));
        }

        let mut iterations = Vec::new();
        let mut it = 0;
        let mut lo = lower;
        let mut hi = params.base_monthly_fee.max(lower) * self.config.max_fee_multiplier;
        if hi <= lower {
            hi = lower + 1.0;
        }

        // Double the upper bound until it is solvent
        let mut hi_eval = self.evaluate(&engine, params, expenses, hi)?;
        while !hi_eval.feasible {
            if it >= self.config.max_iterations {
                log::info!(
                    "{}: no flat fee up to {:.2} within {} iterations; searching per-year schedule",
                    params.model_name,
                    hi,
                    it,
                );
                return self.optimize_yearly(&engine, params, expenses);
            }

            it += 1;
            let candidate = hi * 2.0;
            let eval = self.evaluate(&engine, params, expenses, candidate)?;
            iterations.push(SearchIteration {
                iteration: it,
                lower_bound: hi,
                upper_bound: candidate,
                candidate_fee: candidate,
                min_balance: eval.min_balance,
                total_deficit: eval.total_deficit,
                feasible: eval.feasible,
            });
            log::debug!("iteration={} bracket fee={:.4} min_balance={:.2}", it, candidate, eval.min_balance);

            if eval.min_balance <= hi_eval.min_balance {
                log::info!(
                    "{}: raising the flat fee past {:.2} does not improve the balance; searching per-year schedule",
                    params.model_name,
                    hi,
                );
                return self.optimize_yearly(&engine, params, expenses);
            }

            lo = hi;
            hi = candidate;
            hi_eval = eval;
        }

        while hi - lo > self.config.tolerance && it < self.config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let eval = self.evaluate(&engine, params, expenses, mid)?;
            iterations.push(SearchIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_fee: mid,
                min_balance: eval.min_balance,
                total_deficit: eval.total_deficit,
                feasible: eval.feasible,
            });
            log::debug!("iteration={} fee={:.4} min_balance={:.2} feasible={}", it, mid, eval.min_balance, eval.feasible);

            if eval.feasible {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        if hi - lo > self.config.tolerance {
            let message = format!(
                "Reached {} iterations before tolerance {}; best solvent fee {:.2}.",
                it, self.config.tolerance, hi
            );
            log::warn!("{}: {}", params.model_name, message);
            return Ok(OptimizationResult {
                feasible: false,
                flat_fee: None,
                has_yearly_adjustments: false,
                yearly_fees: Vec::new(),
                infeasibility: Some(Infeasibility::NonConvergence {
                    best_feasible_fee: hi,
                    iterations: it,
                }),
                iterations,
                message,
            });
        }

        let message = format!("Solved flat monthly fee {:.2} in {} iterations.", hi, it);
        log::info!("{}: {}", params.model_name, message);
        Ok(OptimizationResult::flat(hi, iterations, message))
    }

    /// Project with `fee` as the year-0 fee and measure shortfalls below
    /// the reserve floor
    fn evaluate(
        &self,
        engine: &ProjectionEngine,
        params: &SimulationParameters,
        expenses: &ExpenseSchedule,
        fee: f64,
    ) -> Result<CandidateEval> {
        let result = engine.project(&params.with_base_monthly_fee(fee), expenses)?;
        let min_balance = result
            .years
            .iter()
            .map(|r| r.closing_balance)
            .fold(f64::INFINITY, f64::min);
        let total_deficit = ProjectionStats::total_deficit_below(&result.years, self.config.minimum_reserve_balance);

        Ok(CandidateEval {
            min_balance,
            total_deficit,
            feasible: total_deficit <= self.config.deficit_tolerance,
        })
    }

    /// Walk the horizon raising each deficit year's fee just enough to
    /// clear it, within the cap on the prior year's effective fee
    fn optimize_yearly(
        &self,
        engine: &ProjectionEngine,
        params: &SimulationParameters,
        expenses: &ExpenseSchedule,
    ) -> Result<OptimizationResult> {
        let base = engine.project(params, expenses)?.years;
        let billing = params.annual_billing_factor();
        let growth = 1.0 + params.maximum_fee_increase / 100.0;

        let mut overrides: BTreeMap<i32, YearOverride> = BTreeMap::new();
        let mut yearly_fees = Vec::new();
        let mut uncleared = Vec::new();
        let mut previous_fee: Option<f64> = None;

        for idx in 0..base.len() {
            let current = apply_overrides(&base, &overrides);
            let row: &YearProjection = &current[idx];
            let deficit = self.config.minimum_reserve_balance - row.closing_balance;
            let max_allowed_fee = previous_fee.map(|fee| fee * growth);

            if deficit <= 0.0 {
                previous_fee = Some(row.monthly_fee);
                continue;
            }

            if billing <= 0.0 {
                log::warn!("year={} deficit {:.2} cannot be billed: no housing units", row.fiscal_year, deficit);
                uncleared.push(UnclearedYear {
                    fiscal_year: row.fiscal_year,
                    required_fee: None,
                    max_allowed_fee,
                    residual_deficit: deficit,
                });
                previous_fee = Some(row.monthly_fee);
                continue;
            }

            let required =
                (row.monthly_fee + row.collections_to_clear(deficit) / billing).max(params.minimum_collection_fee);
            let fee = match max_allowed_fee {
                Some(bound) if required > bound * (1.0 + BOUND_EPSILON) => {
                    let fee = bound.max(row.monthly_fee);
                    let residual = (required - fee) * billing;
                    log::warn!(
                        "year={} needs fee {:.2} but cap allows {:.2}; {:.2} uncleared",
                        row.fiscal_year,
                        required,
                        bound,
                        residual,
                    );
                    uncleared.push(UnclearedYear {
                        fiscal_year: row.fiscal_year,
                        required_fee: Some(required),
                        max_allowed_fee: Some(bound),
                        residual_deficit: residual,
                    });
                    fee
                }
                Some(bound) => round_up_cents(required).min(bound.max(required)),
                None => round_up_cents(required),
            };

            if fee > row.monthly_fee {
                overrides.insert(row.fiscal_year, YearOverride::collections(fee * billing));
                yearly_fees.push(YearlyFee {
                    year_index: row.year_index,
                    fiscal_year: row.fiscal_year,
                    fee,
                });
            }
            previous_fee = Some(fee);
        }

        let feasible = uncleared.is_empty();
        let message = if feasible {
            format!("Solved per-year schedule adjusting {} years.", yearly_fees.len())
        } else {
            format!(
                "Fee cap leaves {} years in deficit starting {}.",
                uncleared.len(),
                uncleared[0].fiscal_year
            )
        };
        log::info!("{}: {}", params.model_name, message);

        Ok(OptimizationResult {
            feasible,
            flat_fee: None,
            has_yearly_adjustments: !yearly_fees.is_empty(),
            yearly_fees,
            infeasibility: (!feasible).then_some(Infeasibility::Structural { uncleared }),
            iterations: Vec::new(),
            message,
        })
    }
}

/// Optimize with the default configuration
pub fn optimize(params: &SimulationParameters, expenses: &ExpenseSchedule) -> Result<OptimizationResult> {
    FeeOptimizer::default().optimize(params, expenses)
}

fn round_up_cents(fee: f64) -> f64 {
    (fee * 100.0).ceil() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExpenseEntry, ExpenseSize};
    use crate::projection::{project, SafetyNetMode};
    use approx::assert_relative_eq;

    fn small_params() -> SimulationParameters {
        SimulationParameters {
            model_name: "Harbor View".to_string(),
            starting_fiscal_year: 2024,
            horizon_years: 6,
            housing_units: 10,
            starting_balance: 0.0,
            base_monthly_fee: 100.0,
            minimum_collection_fee: 0.0,
            inflation_rate: 0.0,
            maximum_fee_increase: 100.0,
            bank_interest_rate: 0.0,
            safety_net_percentage: 0.0,
            cash_reserve_threshold: 0.0,
            large_expense_baseline: 0.0,
            loan_threshold_percentage: 0.0,
            loan_tenure_years: 5,
            loan_interest_rate: 0.0,
        }
    }

    fn negative_years(years: &[YearProjection]) -> usize {
        years.iter().filter(|r| r.closing_balance < 0.0).count()
    }

    #[test]
    fn test_flat_fee_reference_model() {
        let params = SimulationParameters::society_maintenance();
        let expenses = ExpenseSchedule::society_maintenance();

        let result = optimize(&params, &expenses).unwrap();
        assert!(result.feasible);
        assert!(!result.has_yearly_adjustments);
        let fee = result.flat_fee.unwrap();

        let solved = project(&result.apply_flat_fee(&params).unwrap(), &expenses).unwrap();
        assert_eq!(negative_years(&solved), 0);

        // One tolerance lower is no longer solvent
        let below = project(&params.with_base_monthly_fee(fee - 0.01), &expenses).unwrap();
        assert!(negative_years(&below) > 0);
        assert!(!result.iterations.is_empty());
        assert!(result.iterations.len() <= 60);
    }

    #[test]
    fn test_already_solvent_at_minimum() {
        let params = SimulationParameters {
            starting_balance: 50_000.0,
            minimum_collection_fee: 25.0,
            ..small_params()
        };
        let result = optimize(&params, &ExpenseSchedule::default()).unwrap();
        assert!(result.feasible);
        assert_eq!(result.flat_fee, Some(25.0));
        assert!(result.iterations.is_empty());
    }

    #[test]
    fn test_flat_fee_with_loans_and_interest() {
        let params = SimulationParameters {
            horizon_years: 15,
            inflation_rate: 3.0,
            maximum_fee_increase: 5.0,
            bank_interest_rate: 1.5,
            safety_net_percentage: 10.0,
            loan_threshold_percentage: 60.0,
            loan_interest_rate: 6.0,
            ..small_params()
        };
        let expenses = ExpenseSchedule::new(vec![
            ExpenseEntry::new("Roof", 40_000.0, 12, 4, ExpenseSize::Large),
            ExpenseEntry::new("Paint", 6_000.0, 5, 2, ExpenseSize::Small),
        ]);
        let optimizer = FeeOptimizer::new(OptimizerConfig {
            projection: ProjectionConfig {
                include_interest: true,
                ..Default::default()
            },
            ..Default::default()
        });

        let result = optimizer.optimize(&params, &expenses).unwrap();
        let fee = result.flat_fee.expect("flat fee within three times the base fee");

        let engine = ProjectionEngine::new(optimizer.config().projection.clone());
        let solved = engine.project(&params.with_base_monthly_fee(fee), &expenses).unwrap();
        assert!(solved.is_solvent(0.0));
    }

    #[test]
    fn test_flat_fee_above_initial_bracket() {
        // 50k due in year 0 needs 416.67/month, above three times the base fee
        let params = small_params();
        let expenses = ExpenseSchedule::new(vec![ExpenseEntry::new("Pool", 50_000.0, 0, 0, ExpenseSize::Small)]);

        let result = optimize(&params, &expenses).unwrap();
        assert!(result.feasible);
        assert!(!result.has_yearly_adjustments);
        let fee = result.flat_fee.expect("flat fee beyond the initial bracket");
        assert!(fee >= 50_000.0 / 120.0);
        assert!(fee <= 50_000.0 / 120.0 + 0.01);

        // The bracket grew once before bisecting
        assert_relative_eq!(result.iterations[0].candidate_fee, 600.0);
        assert!(result.iterations[0].feasible);

        let solved = project(&result.apply_flat_fee(&params).unwrap(), &expenses).unwrap();
        assert_eq!(negative_years(&solved), 0);
    }

    #[test]
    fn test_deficit_tolerance_relaxes_flat_fee() {
        let params = small_params();
        let expenses = ExpenseSchedule::new(vec![ExpenseEntry::new("Pool", 50_000.0, 0, 0, ExpenseSize::Small)]);
        let optimizer = FeeOptimizer::new(OptimizerConfig {
            deficit_tolerance: 1_000.0,
            ..Default::default()
        });

        let result = optimizer.optimize(&params, &expenses).unwrap();
        let fee = result.flat_fee.unwrap();
        assert!(fee >= 49_000.0 / 120.0);
        assert!(fee <= 49_000.0 / 120.0 + 0.01);

        let solved = project(&params.with_base_monthly_fee(fee), &expenses).unwrap();
        assert!(ProjectionStats::total_deficit_below(&solved, 0.0) <= 1_000.0);
        assert!(result.iterations.iter().all(|i| !i.feasible || i.total_deficit <= 1_000.0));
    }

    #[test]
    fn test_yearly_fallback() {
        // No search budget past the base fee; year 3 needs one doubled fee
        let params = small_params();
        let expenses = ExpenseSchedule::new(vec![ExpenseEntry::new("Pool", 60_000.0, 0, 3, ExpenseSize::Small)]);
        let optimizer = FeeOptimizer::new(OptimizerConfig {
            max_fee_multiplier: 1.0,
            max_iterations: 0,
            ..Default::default()
        });

        let result = optimizer.optimize(&params, &expenses).unwrap();
        assert!(result.feasible);
        assert!(result.has_yearly_adjustments);
        assert_eq!(result.flat_fee, None);
        assert_eq!(
            result.yearly_fees,
            vec![YearlyFee { year_index: 3, fiscal_year: 2027, fee: 200.0 }]
        );

        let overrides = result.yearly_overrides(&params);
        assert_relative_eq!(overrides[&2027].collections.unwrap(), 24_000.0);

        let base = project(&params, &expenses).unwrap();
        let adjusted = apply_overrides(&base, &overrides);
        assert_eq!(negative_years(&adjusted), 0);
        assert_relative_eq!(adjusted[3].closing_balance, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_yearly_fallback_with_top_up_safety_net() {
        let params = SimulationParameters {
            horizon_years: 2,
            safety_net_percentage: 50.0,
            maximum_fee_increase: 1_000.0,
            ..small_params()
        };
        let expenses = ExpenseSchedule::new(vec![ExpenseEntry::new("Pool", 60_000.0, 0, 1, ExpenseSize::Small)]);
        let optimizer = FeeOptimizer::new(OptimizerConfig {
            max_fee_multiplier: 1.0,
            max_iterations: 0,
            minimum_reserve_balance: 50_000.0,
            projection: ProjectionConfig {
                safety_net: SafetyNetMode::TopUpToTarget,
                ..Default::default()
            },
            ..Default::default()
        });

        let result = optimizer.optimize(&params, &expenses).unwrap();
        assert!(result.feasible);
        assert_eq!(result.yearly_fees.len(), 2);
        assert_relative_eq!(result.yearly_fees[0].fee, 416.67);
        // Extra collections in year 1 first replace the 34k top-up
        assert_relative_eq!(result.yearly_fees[1].fee, 500.0);

        let engine = ProjectionEngine::new(optimizer.config().projection.clone());
        let base = engine.project(&params, &expenses).unwrap().years;
        let adjusted = apply_overrides(&base, &result.yearly_overrides(&params));
        assert!(adjusted.iter().all(|r| r.closing_balance >= 50_000.0));
        assert_eq!(adjusted[1].safety_net_top_up, 0.0);
    }

    #[test]
    fn test_structural_infeasibility() {
        // Search budget runs out before the flat bracket reaches a solvent fee
        let params = SimulationParameters {
            horizon_years: 5,
            maximum_fee_increase: 5.0,
            ..small_params()
        };
        let expenses = ExpenseSchedule::new(vec![ExpenseEntry::new("Seawall", 1_000_000.0, 0, 1, ExpenseSize::Small)]);
        let optimizer = FeeOptimizer::new(OptimizerConfig {
            max_iterations: 3,
            ..Default::default()
        });

        let result = optimizer.optimize(&params, &expenses).unwrap();
        assert!(!result.feasible);
        assert_eq!(result.flat_fee, None);
        assert_eq!(result.offending_years()[0], 2025);

        match &result.infeasibility {
            Some(Infeasibility::Structural { uncleared }) => {
                assert_relative_eq!(uncleared[0].max_allowed_fee.unwrap(), 105.0);
                assert!(uncleared[0].required_fee.unwrap() > 105.0);
                assert!(uncleared[0].residual_deficit > 0.0);
            }
            other => panic!("expected structural infeasibility, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_units_infeasible() {
        let params = SimulationParameters {
            housing_units: 0,
            ..small_params()
        };
        let expenses = ExpenseSchedule::new(vec![ExpenseEntry::new("Gate", 1_000.0, 0, 0, ExpenseSize::Small)]);

        let result = optimize(&params, &expenses).unwrap();
        assert!(!result.feasible);
        assert_eq!(result.offending_years(), (2024..2030).collect::<Vec<i32>>());
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let params = SimulationParameters::society_maintenance();
        let optimizer = FeeOptimizer::new(OptimizerConfig {
            max_iterations: 2,
            tolerance: 1e-9,
            ..Default::default()
        });

        let result = optimizer.optimize(&params, &ExpenseSchedule::society_maintenance()).unwrap();
        assert!(!result.feasible);
        assert_eq!(result.iterations.len(), 2);

        match result.infeasibility {
            Some(Infeasibility::NonConvergence { best_feasible_fee, iterations }) => {
                assert_eq!(iterations, 2);
                let years = project(&params.with_base_monthly_fee(best_feasible_fee), &ExpenseSchedule::society_maintenance()).unwrap();
                assert_eq!(negative_years(&years), 0);
            }
            other => panic!("expected non-convergence, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_parameters_error() {
        let params = SimulationParameters {
            horizon_years: 0,
            ..small_params()
        };
        assert!(optimize(&params, &ExpenseSchedule::default()).is_err());
    }
}
