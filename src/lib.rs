//! Reserve Fund - multi-year reserve projection for housing associations
//!
//! This library provides:
//! - Year-by-year reserve projections with inflation and capped fee growth
//! - Loan financing of large expenses with amortized debt service
//! - Manual per-year overrides that cascade through later balances
//! - A minimum monthly fee search with per-year fallback
//! - Batch scenario runs

pub mod error;
pub mod model;
pub mod optimizer;
pub mod projection;
pub mod scenario;

// Re-export commonly used types
pub use error::{ModelError, Result};
pub use model::{ExpenseEntry, ExpenseSchedule, ExpenseSize, SimulationParameters};
pub use optimizer::{FeeOptimizer, OptimizationResult, OptimizerConfig};
pub use projection::{apply_overrides, ProjectionConfig, ProjectionEngine, ProjectionResult, YearOverride, YearProjection};
pub use scenario::ScenarioRunner;
