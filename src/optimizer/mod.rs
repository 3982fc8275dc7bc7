//! Minimum monthly fee search

mod result;
mod search;

pub use result::{Infeasibility, OptimizationResult, SearchIteration, UnclearedYear, YearlyFee};
pub use search::{optimize, FeeOptimizer, OptimizerConfig};
