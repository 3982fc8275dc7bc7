//! Scheduled expense entries and occurrence placement

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Size class of an expense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseSize {
    /// Capital item eligible for partial loan financing
    Large,
    /// Paid entirely from current funds
    Small,
}

impl ExpenseSize {
    pub fn is_large(&self) -> bool {
        matches!(self, ExpenseSize::Large)
    }
}

/// How an entry repeats across the horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecurrencePolicy {
    /// Replace every `expected_life` years after the first occurrence
    #[default]
    Recurring,
    /// Every entry occurs once, at `remaining_life`
    SingleOccurrence,
}

/// A single scheduled expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub name: String,

    /// Cost in starting-year dollars
    pub base_cost: f64,

    /// Years between replacements (0 or 1 = never repeats)
    pub expected_life: u32,

    /// Years until the first replacement
    pub remaining_life: u32,

    pub size: ExpenseSize,

    /// SIRS structural/safety tag, informational only
    #[serde(default)]
    pub is_sirs: bool,
}

impl ExpenseEntry {
    pub fn new(name: &str, base_cost: f64, expected_life: u32, remaining_life: u32, size: ExpenseSize) -> Self {
        Self {
            name: name.to_string(),
            base_cost,
            expected_life,
            remaining_life,
            size,
            is_sirs: false,
        }
    }

    /// Year indices (relative to year 0) at which this entry is incurred
    pub fn occurrence_years(&self, horizon_years: u32, policy: RecurrencePolicy) -> Vec<u32> {
        if self.remaining_life >= horizon_years {
            return Vec::new();
        }

        match policy {
            RecurrencePolicy::SingleOccurrence => vec![self.remaining_life],
            RecurrencePolicy::Recurring if self.expected_life <= 1 => vec![self.remaining_life],
            RecurrencePolicy::Recurring => (self.remaining_life..horizon_years)
                .step_by(self.expected_life as usize)
                .collect(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::InvalidExpense {
                name: self.name.clone(),
                reason: "name is empty".to_string(),
            });
        }
        if !self.base_cost.is_finite() || self.base_cost < 0.0 {
            return Err(ModelError::InvalidExpense {
                name: self.name.clone(),
                reason: format!("base cost {} must be a non-negative number", self.base_cost),
            });
        }
        Ok(())
    }
}

/// One occurrence of an entry placed on the horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    /// Index into the schedule's entries
    pub entry: usize,
    /// 0 for the first replacement, 1 for the next, ...
    pub occurrence: u32,
}

/// Ordered collection of expense entries supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseSchedule {
    entries: Vec<ExpenseEntry>,
}

impl ExpenseSchedule {
    pub fn new(entries: Vec<ExpenseEntry>) -> Self {
        Self { entries }
    }

    /// Reference schedule with one-time and recurring items
    pub fn society_maintenance() -> Self {
        Self::new(vec![
            ExpenseEntry::new("Roof Replacement", 50_000.0, 20, 5, ExpenseSize::Large),
            ExpenseEntry::new("HVAC Maintenance", 5_000.0, 3, 1, ExpenseSize::Small),
            ExpenseEntry::new("Elevator Modernization", 75_000.0, 25, 15, ExpenseSize::Large),
            ExpenseEntry::new("Plumbing Riser Replacement", 80_000.0, 1, 22, ExpenseSize::Large),
        ])
    }

    pub fn entries(&self) -> &[ExpenseEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&ExpenseEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        self.entries.iter().try_for_each(ExpenseEntry::validate)
    }

    /// Place every occurrence on the horizon, grouped by year index.
    /// Within a year, occurrences keep schedule order.
    pub fn occurrences_by_year(&self, horizon_years: u32, policy: RecurrencePolicy) -> Vec<Vec<Occurrence>> {
        let mut by_year = vec![Vec::new(); horizon_years as usize];

        for (entry_idx, entry) in self.entries.iter().enumerate() {
            for (n, year) in entry.occurrence_years(horizon_years, policy).into_iter().enumerate() {
                by_year[year as usize].push(Occurrence {
                    entry: entry_idx,
                    occurrence: n as u32,
                });
            }
        }

        by_year
    }
}

impl From<Vec<ExpenseEntry>> for ExpenseSchedule {
    fn from(entries: Vec<ExpenseEntry>) -> Self {
        Self::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recurring_occurrences() {
        let hvac = ExpenseEntry::new("HVAC", 5_000.0, 3, 1, ExpenseSize::Small);
        assert_eq!(hvac.occurrence_years(10, RecurrencePolicy::Recurring), vec![1, 4, 7]);
        assert_eq!(hvac.occurrence_years(10, RecurrencePolicy::SingleOccurrence), vec![1]);
    }

    #[test]
    fn test_zero_life_occurs_once() {
        let riser = ExpenseEntry::new("Riser", 80_000.0, 0, 22, ExpenseSize::Large);
        assert_eq!(riser.occurrence_years(30, RecurrencePolicy::Recurring), vec![22]);
    }

    #[test]
    fn test_one_year_life_occurs_once() {
        let riser = ExpenseEntry::new("Riser", 80_000.0, 1, 22, ExpenseSize::Large);
        assert_eq!(riser.occurrence_years(30, RecurrencePolicy::Recurring), vec![22]);

        let reseal = ExpenseEntry::new("Reseal", 2_000.0, 2, 26, ExpenseSize::Small);
        assert_eq!(reseal.occurrence_years(30, RecurrencePolicy::Recurring), vec![26, 28]);
    }

    #[test]
    fn test_beyond_horizon_dropped() {
        let roof = ExpenseEntry::new("Roof", 50_000.0, 20, 5, ExpenseSize::Large);
        assert!(roof.occurrence_years(5, RecurrencePolicy::Recurring).is_empty());
        assert_eq!(roof.occurrence_years(6, RecurrencePolicy::Recurring), vec![5]);
        assert_eq!(roof.occurrence_years(30, RecurrencePolicy::Recurring), vec![5, 25]);
    }

    #[test]
    fn test_occurrences_by_year() {
        let schedule = ExpenseSchedule::society_maintenance();
        let by_year = schedule.occurrences_by_year(30, RecurrencePolicy::Recurring);

        assert_eq!(by_year.len(), 30);
        assert!(by_year[0].is_empty());
        assert_eq!(by_year[1], vec![Occurrence { entry: 1, occurrence: 0 }]);
        // Second roof replacement shares year 25 with an HVAC cycle
        assert_eq!(by_year[25].len(), 2);
        assert_eq!(by_year[25][0], Occurrence { entry: 0, occurrence: 1 });
        assert_eq!(by_year[22].iter().filter(|o| o.entry == 3).count(), 1);
    }

    #[test]
    fn test_invalid_expense_rejected() {
        let schedule = ExpenseSchedule::new(vec![ExpenseEntry::new("Bad", -1.0, 5, 1, ExpenseSize::Small)]);
        assert!(matches!(schedule.validate(), Err(ModelError::InvalidExpense { .. })));

        let unnamed = ExpenseSchedule::new(vec![ExpenseEntry::new("  ", 1.0, 5, 1, ExpenseSize::Small)]);
        assert!(unnamed.validate().is_err());
    }
}
