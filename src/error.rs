//! Error types for model validation, amortization and loading

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter {
        field: &'static str,
        reason: String,
    },

    #[error("invalid expense `{name}`: {reason}")]
    InvalidExpense {
        name: String,
        reason: String,
    },

    #[error("invalid loan term: tenure of {tenure_years} years")]
    InvalidLoanTerm {
        tenure_years: u32,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
