//! Load model parameters (JSON) and expense schedules (CSV)

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::Reader;

use super::{ExpenseEntry, ExpenseSchedule, ExpenseSize, SimulationParameters};
use crate::error::{ModelError, Result};
use crate::projection::YearOverride;

/// Default location of the bundled reference model
pub const DEFAULT_DATA_PATH: &str = "data";

/// Raw CSV row matching the expense schedule columns
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Cost")]
    cost: f64,
    #[serde(rename = "ExpectedLife")]
    expected_life: u32,
    #[serde(rename = "RemainingLife")]
    remaining_life: u32,
    #[serde(rename = "Type")]
    size: String,
    #[serde(rename = "IsSIRS", default)]
    is_sirs: Option<String>,
}

impl CsvRow {
    fn to_entry(self) -> Result<ExpenseEntry> {
        let size = match self.size.trim().to_ascii_lowercase().as_str() {
            "large" => ExpenseSize::Large,
            "small" => ExpenseSize::Small,
            other => {
                return Err(ModelError::InvalidExpense {
                    name: self.name,
                    reason: format!("unknown Type: {}", other),
                })
            }
        };

        let is_sirs = match self.is_sirs.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(flag) => matches!(flag.to_ascii_lowercase().as_str(), "true" | "yes" | "1" | "y"),
        };

        Ok(ExpenseEntry {
            name: self.name,
            base_cost: self.cost,
            expected_life: self.expected_life,
            remaining_life: self.remaining_life,
            size,
            is_sirs,
        })
    }
}

/// Load an expense schedule from a CSV file
pub fn load_expenses<P: AsRef<Path>>(path: P) -> Result<ExpenseSchedule> {
    load_expenses_from_reader(File::open(path)?)
}

/// Load an expense schedule from any reader (e.g., string buffer)
pub fn load_expenses_from_reader<R: Read>(reader: R) -> Result<ExpenseSchedule> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut entries = Vec::new();

    for result in csv_reader.deserialize() {
        let row: CsvRow = result?;
        entries.push(row.to_entry()?);
    }

    let schedule = ExpenseSchedule::new(entries);
    schedule.validate()?;
    Ok(schedule)
}

/// Load simulation parameters from a JSON file.
/// Every field must be present; unknown fields are rejected.
pub fn load_parameters<P: AsRef<Path>>(path: P) -> Result<SimulationParameters> {
    load_parameters_from_reader(File::open(path)?)
}

pub fn load_parameters_from_reader<R: Read>(reader: R) -> Result<SimulationParameters> {
    let params: SimulationParameters = serde_json::from_reader(reader)?;
    params.validate()?;
    Ok(params)
}

/// Load a year-override map (fiscal year -> partial row) from a JSON file
pub fn load_overrides<P: AsRef<Path>>(path: P) -> Result<BTreeMap<i32, YearOverride>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

/// Load the bundled reference model from `data/`
pub fn load_default_model() -> Result<(SimulationParameters, ExpenseSchedule)> {
    let dir = Path::new(DEFAULT_DATA_PATH);
    let params = load_parameters(dir.join("society_params.json"))?;
    let expenses = load_expenses(dir.join("society_expenses.csv"))?;
    Ok((params, expenses))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_model() {
        let (params, expenses) = load_default_model().expect("Failed to load reference model");

        assert_eq!(params, SimulationParameters::society_maintenance());
        assert_eq!(expenses.len(), 4);
        assert_eq!(expenses.entries()[0].name, "Roof Replacement");
        assert!(expenses.entries()[0].size.is_large());
        assert!(!expenses.entries()[1].size.is_large());
        assert_eq!(expenses.entries()[3].expected_life, 1);
    }

    #[test]
    fn test_load_bundled_overrides() {
        let overrides = load_overrides(Path::new(DEFAULT_DATA_PATH).join("society_overrides.json")).unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[&2027], YearOverride::collections(150_000.0));
        assert_eq!(overrides[&2030].safety_net, Some(4_000.0));
    }

    #[test]
    fn test_expenses_from_reader() {
        let data = "Name,Cost,ExpectedLife,RemainingLife,Type,IsSIRS\n\
                    Pool Resurfacing,12000,10,2,small,\n\
                    Seawall,400000,40,6,LARGE,yes\n";

        let schedule = load_expenses_from_reader(data.as_bytes()).unwrap();
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule.entries()[0].size, ExpenseSize::Small);
        assert!(!schedule.entries()[0].is_sirs);
        assert_eq!(schedule.entries()[1].size, ExpenseSize::Large);
        assert!(schedule.entries()[1].is_sirs);
    }

    #[test]
    fn test_unknown_expense_type_rejected() {
        let data = "Name,Cost,ExpectedLife,RemainingLife,Type\nGate,100,5,1,Medium\n";
        assert!(matches!(
            load_expenses_from_reader(data.as_bytes()),
            Err(ModelError::InvalidExpense { .. })
        ));
    }

    #[test]
    fn test_partial_parameters_rejected() {
        let json = r#"{ "model_name": "Partial", "horizon_years": 10 }"#;
        assert!(matches!(load_parameters_from_reader(json.as_bytes()), Err(ModelError::Json(_))));
    }

    #[test]
    fn test_invalid_parameters_rejected_after_parse() {
        let mut value = serde_json::to_value(SimulationParameters::society_maintenance()).unwrap();
        value["horizon_years"] = serde_json::json!(0);
        let json = value.to_string();

        assert!(matches!(
            load_parameters_from_reader(json.as_bytes()),
            Err(ModelError::InvalidParameter { field: "horizon_years", .. })
        ));
    }
}
