//! Loan ledger for debt-financed portions of large expenses
//!
//! Loans are fixed-payment ordinary annuities with one payment per year.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Annual payment that retires `principal` over `tenure_years` at
/// `annual_rate_pct` percent per year.
///
/// `payment = P * r / (1 - (1 + r)^-n)` when `r > 0`, `P / n` otherwise.
pub fn amortize(principal: f64, annual_rate_pct: f64, tenure_years: u32) -> Result<f64> {
    if tenure_years == 0 {
        return Err(ModelError::InvalidLoanTerm { tenure_years });
    }

    let rate = annual_rate_pct / 100.0;
    let n = tenure_years as f64;

    if rate <= 0.0 {
        return Ok(principal / n);
    }

    Ok(principal * rate / (1.0 - (1.0 + rate).powf(-n)))
}

/// One year of a loan amortization schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    /// 1-indexed payment number
    pub payment_number: u32,
    pub beginning_balance: f64,
    pub payment: f64,
    pub interest: f64,
    pub principal: f64,
    pub ending_balance: f64,
}

/// Full payment schedule for a loan
pub fn amortization_schedule(principal: f64, annual_rate_pct: f64, tenure_years: u32) -> Result<Vec<AmortizationRow>> {
    let mut record = LoanRecord::originate(0, "", 0, 0, principal, annual_rate_pct, tenure_years)?;
    let mut rows = Vec::with_capacity(tenure_years as usize);

    while record.is_active() {
        let beginning_balance = record.outstanding_balance;
        let payment = record.make_payment();
        rows.push(AmortizationRow {
            payment_number: tenure_years - record.remaining_payments,
            beginning_balance,
            payment: payment.payment,
            interest: payment.interest,
            principal: payment.principal,
            ending_balance: record.outstanding_balance,
        });
    }

    Ok(rows)
}

/// A loan drawn to finance part of one expense occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub loan_id: u32,
    pub expense_name: String,
    pub origination_year_index: u32,
    pub origination_fiscal_year: i32,
    pub principal: f64,
    /// Annual interest rate (%)
    pub annual_rate: f64,
    pub annual_payment: f64,
    pub tenure_years: u32,
    pub remaining_payments: u32,
    pub outstanding_balance: f64,
}

impl LoanRecord {
    pub fn originate(
        loan_id: u32,
        expense_name: &str,
        year_index: u32,
        fiscal_year: i32,
        principal: f64,
        annual_rate: f64,
        tenure_years: u32,
    ) -> Result<Self> {
        let annual_payment = amortize(principal, annual_rate, tenure_years)?;

        Ok(Self {
            loan_id,
            expense_name: expense_name.to_string(),
            origination_year_index: year_index,
            origination_fiscal_year: fiscal_year,
            principal,
            annual_rate,
            annual_payment,
            tenure_years,
            remaining_payments: tenure_years,
            outstanding_balance: principal,
        })
    }

    pub fn is_active(&self) -> bool {
        self.remaining_payments > 0
    }

    /// Pay one annual installment. The final installment clears whatever
    /// balance is left so the principal retires exactly.
    pub fn make_payment(&mut self) -> LoanPayment {
        if !self.is_active() {
            return LoanPayment::none(self);
        }

        let interest = self.outstanding_balance * self.annual_rate / 100.0;
        let (payment, principal) = if self.remaining_payments == 1 {
            (self.outstanding_balance + interest, self.outstanding_balance)
        } else {
            (self.annual_payment, self.annual_payment - interest)
        };

        self.outstanding_balance -= principal;
        self.remaining_payments -= 1;
        if self.remaining_payments == 0 {
            self.outstanding_balance = 0.0;
        }

        LoanPayment {
            loan_id: self.loan_id,
            expense_name: self.expense_name.clone(),
            origination_fiscal_year: self.origination_fiscal_year,
            payment,
            interest,
            principal,
        }
    }
}

/// Debt service paid on one loan in one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPayment {
    pub loan_id: u32,
    pub expense_name: String,
    pub origination_fiscal_year: i32,
    pub payment: f64,
    pub interest: f64,
    pub principal: f64,
}

impl LoanPayment {
    fn none(record: &LoanRecord) -> Self {
        Self {
            loan_id: record.loan_id,
            expense_name: record.expense_name.clone(),
            origination_fiscal_year: record.origination_fiscal_year,
            payment: 0.0,
            interest: 0.0,
            principal: 0.0,
        }
    }
}

/// Outstanding loans within one projection run
#[derive(Debug, Clone, Default)]
pub struct LoanLedger {
    active: Vec<LoanRecord>,
    retired: Vec<LoanRecord>,
    next_id: u32,
}

impl LoanLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a new loan and add it to the outstanding set
    pub fn originate(
        &mut self,
        expense_name: &str,
        year_index: u32,
        fiscal_year: i32,
        principal: f64,
        annual_rate: f64,
        tenure_years: u32,
    ) -> Result<LoanRecord> {
        let record = LoanRecord::originate(
            self.next_id,
            expense_name,
            year_index,
            fiscal_year,
            principal,
            annual_rate,
            tenure_years,
        )?;
        self.next_id += 1;
        self.active.push(record.clone());
        Ok(record)
    }

    /// Collect one year of payments from every active loan and retire
    /// loans whose last payment was made
    pub fn collect_payments(&mut self) -> Vec<LoanPayment> {
        let payments: Vec<LoanPayment> = self.active.iter_mut().map(LoanRecord::make_payment).collect();

        let (still_active, finished): (Vec<_>, Vec<_>) =
            self.active.drain(..).partition(LoanRecord::is_active);
        self.active = still_active;
        self.retired.extend(finished);

        payments
    }

    pub fn active(&self) -> &[LoanRecord] {
        &self.active
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Every loan ever originated, in origination order
    pub fn into_records(self) -> Vec<LoanRecord> {
        let mut records = self.retired;
        records.extend(self.active);
        records.sort_by_key(|r| r.loan_id);
        records
    }
}
