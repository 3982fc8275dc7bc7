//! Model inputs: simulation parameters and the expense schedule

mod params;
mod expense;
pub mod loader;

pub use params::SimulationParameters;
pub use expense::{ExpenseEntry, ExpenseSchedule, ExpenseSize, Occurrence, RecurrencePolicy};
pub use loader::{load_default_model, load_expenses, load_expenses_from_reader, load_parameters};
