//! Reserve Fund CLI
//!
//! Runs a reserve projection, optionally applies year overrides and the fee
//! optimizer, and writes the ledger to CSV

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;

use reserve_fund::model::loader::load_overrides;
use reserve_fund::model::{load_expenses, load_parameters, RecurrencePolicy};
use reserve_fund::optimizer::{FeeOptimizer, OptimizationResult, OptimizerConfig};
use reserve_fund::projection::{
    apply_overrides, ProjectionConfig, ProjectionEngine, ProjectionStats, SafetyNetMode, YearOverride, YearProjection,
};

#[derive(Parser, Debug)]
#[command(name = "reserve_fund", version, about = "Project a reserve fund and solve for its minimum fee")]
struct Args {
    /// Simulation parameters (JSON)
    #[arg(long, default_value = "data/society_params.json")]
    params: PathBuf,

    /// Expense schedule (CSV)
    #[arg(long, default_value = "data/society_expenses.csv")]
    expenses: PathBuf,

    /// Per-year overrides keyed by fiscal year (JSON)
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Solve for the minimum fee and project with it
    #[arg(long)]
    optimize: bool,

    /// Credit bank interest on positive opening balances
    #[arg(long)]
    include_interest: bool,

    /// Size the safety net as a top-up to target instead of an expense share
    #[arg(long)]
    top_up_safety_net: bool,

    /// Treat every expense as a single replacement
    #[arg(long)]
    single_occurrence: bool,

    /// Bill ahead for upcoming large expenses
    #[arg(long)]
    reserve_contribution: bool,

    /// Ledger output path
    #[arg(long, default_value = "reserve_projection.csv")]
    output: PathBuf,

    /// Print a JSON report instead of the console table
    #[arg(long)]
    json: bool,
}

/// Flat CSV row for one projected year
#[derive(Serialize)]
struct LedgerRow {
    #[serde(rename = "FiscalYear")]
    fiscal_year: i32,
    #[serde(rename = "Opening")]
    opening_balance: f64,
    #[serde(rename = "MonthlyFee")]
    monthly_fee: f64,
    #[serde(rename = "FeeCapped")]
    fee_increase_capped: bool,
    #[serde(rename = "Collections")]
    collections: f64,
    #[serde(rename = "ReserveContribution")]
    reserve_contribution: f64,
    #[serde(rename = "Expenses")]
    total_expenses: f64,
    #[serde(rename = "OutOfPocket")]
    out_of_pocket_expenses: f64,
    #[serde(rename = "SafetyNet")]
    safety_net_top_up: f64,
    #[serde(rename = "LoansTaken")]
    loans_taken: f64,
    #[serde(rename = "LoanPayments")]
    total_loan_payments: f64,
    #[serde(rename = "ActiveLoans")]
    active_loans: usize,
    #[serde(rename = "Interest")]
    interest_income: f64,
    #[serde(rename = "PurchasingPowerLoss")]
    purchasing_power_loss: f64,
    #[serde(rename = "CashReserveTarget")]
    cash_reserve_target: f64,
    #[serde(rename = "Closing")]
    closing_balance: f64,
    #[serde(rename = "Adjusted")]
    adjusted: bool,
}

impl From<&YearProjection> for LedgerRow {
    fn from(row: &YearProjection) -> Self {
        Self {
            fiscal_year: row.fiscal_year,
            opening_balance: row.opening_balance,
            monthly_fee: row.monthly_fee,
            fee_increase_capped: row.fee_increase_capped,
            collections: row.collections,
            reserve_contribution: row.reserve_contribution,
            total_expenses: row.total_expenses,
            out_of_pocket_expenses: row.out_of_pocket_expenses,
            safety_net_top_up: row.safety_net_top_up,
            loans_taken: row.loans_taken,
            total_loan_payments: row.total_loan_payments,
            active_loans: row.active_loans,
            interest_income: row.interest_income,
            purchasing_power_loss: row.purchasing_power_loss,
            cash_reserve_target: row.cash_reserve_target,
            closing_balance: row.closing_balance,
            adjusted: row.adjusted,
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    generated_at: String,
    model_name: &'a str,
    optimization: Option<&'a OptimizationResult>,
    summary: Option<ProjectionStats>,
    years: &'a [YearProjection],
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut params = load_parameters(&args.params)
        .with_context(|| format!("loading parameters from {}", args.params.display()))?;
    let expenses = load_expenses(&args.expenses)
        .with_context(|| format!("loading expenses from {}", args.expenses.display()))?;
    let mut overrides: BTreeMap<i32, YearOverride> = match &args.overrides {
        Some(path) => load_overrides(path).with_context(|| format!("loading overrides from {}", path.display()))?,
        None => BTreeMap::new(),
    };

    let config = ProjectionConfig {
        include_interest: args.include_interest,
        recurrence: if args.single_occurrence {
            RecurrencePolicy::SingleOccurrence
        } else {
            RecurrencePolicy::Recurring
        },
        safety_net: if args.top_up_safety_net {
            SafetyNetMode::TopUpToTarget
        } else {
            SafetyNetMode::ExpenseShare
        },
        reserve_contribution: args.reserve_contribution,
        ..Default::default()
    };

    let optimization = if args.optimize {
        let optimizer = FeeOptimizer::new(OptimizerConfig {
            projection: config.clone(),
            ..Default::default()
        });
        let result = optimizer.optimize(&params, &expenses).context("optimizing monthly fee")?;

        if let Some(solved) = result.apply_flat_fee(&params) {
            params = solved;
        }
        for (year, year_override) in result.yearly_overrides(&params) {
            overrides.entry(year).or_insert(year_override);
        }
        Some(result)
    } else {
        None
    };

    let engine = ProjectionEngine::new(config);
    let result = engine.project(&params, &expenses).context("running projection")?;
    let years = apply_overrides(&result.years, &overrides);
    let summary = ProjectionStats::from_years(&years);

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    for row in &years {
        writer.serialize(LedgerRow::from(row))?;
    }
    writer.flush()?;

    if args.json {
        let report = Report {
            generated_at: Utc::now().to_rfc3339(),
            model_name: &params.model_name,
            optimization: optimization.as_ref(),
            summary,
            years: &years,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Reserve Fund Projection");
    println!("=======================\n");
    println!("Model: {}", params.model_name);
    println!("  Housing Units: {}", params.housing_units);
    println!("  Starting Balance: ${:.2}", params.starting_balance);
    println!("  Monthly Fee: ${:.2}", params.base_monthly_fee);
    println!("  Overridden Years: {}", overrides.len());
    println!();

    if let Some(opt) = &optimization {
        println!("Optimization: {}", opt.message);
        for fee in &opt.yearly_fees {
            println!("  {} fee ${:.2}", fee.fiscal_year, fee.fee);
        }
        for year in opt.offending_years() {
            println!("  {} remains in deficit", year);
        }
        println!();
    }

    println!(
        "{:>6} {:>14} {:>10} {:>14} {:>14} {:>12} {:>12} {:>12} {:>14}",
        "Year", "Opening", "Fee", "Collections", "Expenses", "SafetyNet", "Loans", "DebtSvc", "Closing"
    );
    println!("{}", "-".repeat(116));

    for row in &years {
        println!(
            "{:>6} {:>14.2} {:>10.2} {:>14.2} {:>14.2} {:>12.2} {:>12.2} {:>12.2} {:>14.2}{}",
            row.fiscal_year,
            row.opening_balance,
            row.monthly_fee,
            row.collections + row.reserve_contribution,
            row.total_expenses,
            row.safety_net_top_up,
            row.loans_taken,
            row.total_loan_payments,
            row.closing_balance,
            if row.adjusted { " *" } else { "" },
        );
    }

    println!("\nFull results written to: {}", args.output.display());

    if let Some(stats) = summary {
        println!("\nSummary:");
        println!("  Final Balance: ${:.2}", stats.final_balance);
        println!("  Minimum Balance: ${:.2} ({})", stats.min_balance, stats.min_balance_year);
        println!("  Deficit Years: {} (${:.2} total shortfall)", stats.deficit_years, stats.total_deficit);
        println!("  Total Collections: ${:.2}", stats.total_collections);
        println!("  Total Reserve Contribution: ${:.2}", stats.total_reserve_contribution);
        println!("  Total Expenses: ${:.2}", stats.total_expenses);
        println!("  Total Loans: ${:.2}", stats.total_loans_taken);
        println!("  Total Debt Service: ${:.2}", stats.total_loan_payments);
        println!("  Total Interest: ${:.2}", stats.total_interest_income);
    }

    Ok(())
}
