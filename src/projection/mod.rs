//! Reserve fund projection: engine, loan ledger, manual overrides and stats

mod state;
mod engine;
mod ledger;
mod loan;
mod overlay;
mod stats;

pub use state::ProjectionState;
pub use engine::{project, LoanTiming, LoanTrigger, ProjectionConfig, ProjectionEngine, SafetyNetMode};
pub use ledger::{ExpenseDetail, ProjectionResult, YearProjection};
pub use loan::{amortization_schedule, amortize, AmortizationRow, LoanLedger, LoanPayment, LoanRecord};
pub use overlay::{apply_overrides, YearOverride};
pub use stats::ProjectionStats;
