//! Scenario runner for batch projections and fee searches
//!
//! Holds one expense schedule and engine configuration, then runs many
//! parameter sets against it in parallel without re-reading input files.

use std::path::Path;

use rayon::prelude::*;

use crate::error::Result;
use crate::model::{load_expenses, ExpenseSchedule, SimulationParameters};
use crate::optimizer::{FeeOptimizer, OptimizationResult, OptimizerConfig};
use crate::projection::{ProjectionConfig, ProjectionEngine, ProjectionResult};

/// Pre-loaded scenario runner
///
/// # Example
/// ```ignore
/// let runner = ScenarioRunner::from_csv_path("data/society_expenses.csv")?;
///
/// let scenarios: Vec<_> = [3.0, 5.0, 7.0]
///     .iter()
///     .map(|&rate| SimulationParameters { inflation_rate: rate, ..base.clone() })
///     .collect();
/// let results = runner.run_batch(&scenarios);
/// ```
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    expenses: ExpenseSchedule,
    config: ProjectionConfig,
}

impl ScenarioRunner {
    /// Runner over the bundled reference expense schedule
    pub fn new() -> Self {
        Self::with_expenses(ExpenseSchedule::society_maintenance())
    }

    pub fn with_expenses(expenses: ExpenseSchedule) -> Self {
        Self {
            expenses,
            config: ProjectionConfig::default(),
        }
    }

    /// Create runner by loading the expense schedule from CSV
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::with_expenses(load_expenses(path)?))
    }

    /// Replace the engine configuration used by every run
    pub fn with_config(mut self, config: ProjectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Run a single projection
    pub fn run(&self, params: &SimulationParameters) -> Result<ProjectionResult> {
        ProjectionEngine::new(self.config.clone()).project(params, &self.expenses)
    }

    /// Project many parameter sets in parallel; results keep input order
    pub fn run_batch(&self, scenarios: &[SimulationParameters]) -> Vec<Result<ProjectionResult>> {
        let engine = ProjectionEngine::new(self.config.clone());
        scenarios
            .par_iter()
            .map(|params| engine.project(params, &self.expenses))
            .collect()
    }

    /// Run the fee optimizer over many parameter sets in parallel.
    /// The runner's engine configuration overrides `config.projection`.
    pub fn optimize_batch(
        &self,
        scenarios: &[SimulationParameters],
        config: &OptimizerConfig,
    ) -> Vec<Result<OptimizationResult>> {
        let optimizer = FeeOptimizer::new(OptimizerConfig {
            projection: self.config.clone(),
            ..config.clone()
        });
        scenarios
            .par_iter()
            .map(|params| optimizer.optimize(params, &self.expenses))
            .collect()
    }

    pub fn expenses(&self) -> &ExpenseSchedule {
        &self.expenses
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}
