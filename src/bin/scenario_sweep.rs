//! Sweep inflation and fee-cap scenarios over one reserve model
//!
//! Projects every combination in parallel and solves each for its minimum fee.
//! Supports JSON output via --json flag
//! Accepts config via environment variables:
//!   PARAMS_PATH, EXPENSES_PATH, SWEEP_INFLATION_RATES, SWEEP_FEE_CAPS,
//!   INCLUDE_INTEREST, MIN_RESERVE_BALANCE

use std::env;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use reserve_fund::model::load_parameters;
use reserve_fund::optimizer::{Infeasibility, OptimizerConfig};
use reserve_fund::projection::ProjectionConfig;
use reserve_fund::{ScenarioRunner, SimulationParameters};

#[derive(Serialize)]
struct SweepResponse {
    generated_at: String,
    model_name: String,
    scenario_count: usize,
    scenarios: Vec<ScenarioRow>,
    execution_time_ms: u64,
}

#[derive(Serialize)]
struct ScenarioRow {
    inflation_rate: f64,
    maximum_fee_increase: f64,
    final_balance: f64,
    min_balance: f64,
    deficit_years: u32,
    first_deficit_year: Option<i32>,
    feasible: bool,
    flat_fee: Option<f64>,
    yearly_adjustments: usize,
    offending_years: Vec<i32>,
    best_feasible_fee: Option<f64>,
}

fn parse_list(var: &str, default: &[f64]) -> Vec<f64> {
    env::var(var)
        .ok()
        .map(|s| s.split(',').filter_map(|v| v.trim().parse().ok()).collect::<Vec<f64>>())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_vec())
}

fn main() -> Result<()> {
    env_logger::init();

    let json_output = env::args().any(|arg| arg == "--json");
    let start = Instant::now();

    let params_path = env::var("PARAMS_PATH").unwrap_or_else(|_| "data/society_params.json".to_string());
    let expenses_path = env::var("EXPENSES_PATH").unwrap_or_else(|_| "data/society_expenses.csv".to_string());
    let inflation_rates = parse_list("SWEEP_INFLATION_RATES", &[3.0, 5.0, 7.0]);
    let fee_caps = parse_list("SWEEP_FEE_CAPS", &[5.0, 10.0, 13.0]);
    let include_interest = env::var("INCLUDE_INTEREST").is_ok();
    let minimum_reserve_balance: f64 = env::var("MIN_RESERVE_BALANCE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);

    let base = load_parameters(&params_path).with_context(|| format!("loading parameters from {}", params_path))?;
    let runner = ScenarioRunner::from_csv_path(&expenses_path)
        .with_context(|| format!("loading expenses from {}", expenses_path))?
        .with_config(ProjectionConfig {
            include_interest,
            ..Default::default()
        });

    let scenarios: Vec<SimulationParameters> = inflation_rates
        .iter()
        .flat_map(|&inflation_rate| {
            let base = &base;
            fee_caps.iter().map(move |&maximum_fee_increase| SimulationParameters {
                inflation_rate,
                maximum_fee_increase,
                ..base.clone()
            })
        })
        .collect();

    if !json_output {
        println!("Running {} scenarios for {}...", scenarios.len(), base.model_name);
    }

    let projections = runner.run_batch(&scenarios);
    let optimizations = runner.optimize_batch(
        &scenarios,
        &OptimizerConfig {
            minimum_reserve_balance,
            ..Default::default()
        },
    );

    let mut rows = Vec::with_capacity(scenarios.len());
    for ((params, projection), optimization) in scenarios.iter().zip(projections).zip(optimizations) {
        let projection = projection.context("projecting scenario")?;
        let optimization = optimization.context("optimizing scenario")?;
        let stats = projection.stats().context("empty projection")?;

        let best_feasible_fee = match &optimization.infeasibility {
            Some(Infeasibility::NonConvergence { best_feasible_fee, .. }) => Some(*best_feasible_fee),
            _ => None,
        };

        rows.push(ScenarioRow {
            inflation_rate: params.inflation_rate,
            maximum_fee_increase: params.maximum_fee_increase,
            final_balance: stats.final_balance,
            min_balance: stats.min_balance,
            deficit_years: stats.deficit_years,
            first_deficit_year: stats.first_deficit_year,
            feasible: optimization.feasible,
            flat_fee: optimization.flat_fee,
            yearly_adjustments: optimization.yearly_fees.len(),
            offending_years: optimization.offending_years(),
            best_feasible_fee,
        });
    }

    let execution_time_ms = start.elapsed().as_millis() as u64;

    if json_output {
        let response = SweepResponse {
            generated_at: Utc::now().to_rfc3339(),
            model_name: base.model_name.clone(),
            scenario_count: rows.len(),
            scenarios: rows,
            execution_time_ms,
        };
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    println!(
        "\n{:>9} {:>7} {:>14} {:>14} {:>8} {:>10} {:>12}",
        "Inflation", "Cap", "Final", "Min", "Deficit", "Feasible", "FlatFee"
    );
    println!("{}", "-".repeat(80));
    for row in &rows {
        let fee = match row.flat_fee {
            Some(fee) => format!("{:.2}", fee),
            None if row.yearly_adjustments > 0 => format!("{} yrs", row.yearly_adjustments),
            None => "-".to_string(),
        };
        println!(
            "{:>8.1}% {:>6.1}% {:>14.2} {:>14.2} {:>8} {:>10} {:>12}",
            row.inflation_rate,
            row.maximum_fee_increase,
            row.final_balance,
            row.min_balance,
            row.deficit_years,
            row.feasible,
            fee,
        );
    }

    println!("\nCompleted in {} ms", execution_time_ms);
    Ok(())
}
