//! Loan ("comodato") models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::lifecycle::{compute_status, normalize_text, LoanPeriod, LoanStatus};
use crate::models::Branch;

/// A pump on loan to a client location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoanRecord {
    /// Store-assigned ID
    pub id: String,
    /// Pump serial; unique among active loans
    pub serial: String,
    pub hospital: Option<String>,
    pub patient: Option<String>,
    pub physician: Option<String>,
    /// Health insurer ("convênio")
    pub insurer: Option<String>,
    /// Sales order reference
    pub order_ref: Option<String>,
    /// Outbound invoice (NF) number
    pub invoice_ref: Option<String>,
    pub registration_date: Option<NaiveDate>,
    pub departure_date: Option<NaiveDate>,
    /// Loan period in days
    pub period: Option<LoanPeriod>,
    /// Status as last written to the store
    pub status: Option<LoanStatus>,
    /// False once the pump has been returned
    pub active: bool,
    /// Branch that registered the loan
    pub branch: String,
    pub return_date: Option<NaiveDate>,
    /// Return invoice (NF de devolução)
    pub return_invoice: Option<String>,
}

impl LoanRecord {
    /// Join key.
    pub fn normalized_serial(&self) -> String {
        normalize_text(&self.serial)
    }

    pub fn in_branch(&self, branch: Branch) -> bool {
        branch.matches(&self.branch)
    }

    /// Status as of `today`.
    ///
    /// Returned loans keep their terminal status; everything else is derived
    /// again instead of trusting the stored label, which goes stale as days
    /// pass.
    pub fn current_status(&self, today: NaiveDate) -> LoanStatus {
        if !self.active || self.status.is_some_and(|s| s.is_terminal()) {
            return LoanStatus::Returned;
        }
        compute_status(self.departure_date, self.period.as_ref(), today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan() -> LoanRecord {
        LoanRecord {
            id: "1".into(),
            serial: "sn-1 ".into(),
            hospital: None,
            patient: None,
            physician: None,
            insurer: None,
            order_ref: None,
            invoice_ref: None,
            registration_date: None,
            departure_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            period: Some(LoanPeriod::Days(30)),
            status: Some(LoanStatus::OnTime),
            active: true,
            branch: "Goiânia".into(),
            return_date: None,
            return_invoice: None,
        }
    }

    #[test]
    fn test_current_status_recomputed() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        // Stored label is stale; derived one wins
        assert_eq!(loan().current_status(today), LoanStatus::Overdue);
    }

    #[test]
    fn test_returned_is_terminal() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut l = loan();
        l.active = false;
        assert_eq!(l.current_status(today), LoanStatus::Returned);
    }

    #[test]
    fn test_branch_and_serial_keys() {
        let l = loan();
        assert!(l.in_branch(Branch::Goiania));
        assert!(!l.in_branch(Branch::Cuiaba));
        assert_eq!(l.normalized_serial(), "SN-1");
    }
}
