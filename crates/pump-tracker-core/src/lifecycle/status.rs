//! Loan status derivation.
//!
//! ```text
//! OnTime / DueSoon / Overdue / Undefined / InvalidDate   (computed, transient)
//!                         │
//!                   return recorded
//!                         ▼
//!                      Returned                           (terminal)
//! ```

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Loans due within this many days (inclusive) are `DueSoon`.
pub const DUE_SOON_WINDOW_DAYS: i64 = 7;

/// Lifecycle status of a loan record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// More than a week before the due date
    OnTime,
    /// Due today or within the next seven days
    DueSoon,
    /// Past the due date
    Overdue,
    /// Departure date or period missing
    Undefined,
    /// Period or date could not be converted
    InvalidDate,
    /// Pump came back; set once, never recomputed
    Returned,
}

impl LoanStatus {
    /// Every label `compute_status` can produce.
    pub const COMPUTED: [LoanStatus; 5] = [
        LoanStatus::OnTime,
        LoanStatus::DueSoon,
        LoanStatus::Overdue,
        LoanStatus::Undefined,
        LoanStatus::InvalidDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::OnTime => "on_time",
            LoanStatus::DueSoon => "due_soon",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Undefined => "undefined",
            LoanStatus::InvalidDate => "invalid_date",
            LoanStatus::Returned => "returned",
        }
    }

    /// Parse a stored label. Accepts the labels written by the legacy
    /// deployment as well.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "on_time" | "No Prazo" => Some(LoanStatus::OnTime),
            "due_soon" | "Menos de 7 dias" => Some(LoanStatus::DueSoon),
            "overdue" | "Fora Prazo" => Some(LoanStatus::Overdue),
            "undefined" | "Indefinido" => Some(LoanStatus::Undefined),
            "invalid_date" | "Data Inválida" => Some(LoanStatus::InvalidDate),
            "returned" | "✅ DEVOLVIDA" | "DEVOLVIDA" => Some(LoanStatus::Returned),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Returned)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loan period as it arrives from a form or the store: a number of days, or
/// text that should hold one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoanPeriod {
    Days(i64),
    Text(String),
}

impl LoanPeriod {
    /// Non-negative whole number of days, if the value is one.
    pub fn days(&self) -> Option<u32> {
        match self {
            LoanPeriod::Days(n) => u32::try_from(*n).ok(),
            LoanPeriod::Text(s) => {
                let s = s.trim();
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                s.parse().ok()
            }
        }
    }

    /// Empty text counts as no period at all.
    pub fn is_blank(&self) -> bool {
        matches!(self, LoanPeriod::Text(s) if s.trim().is_empty())
    }
}

impl From<u32> for LoanPeriod {
    fn from(days: u32) -> Self {
        LoanPeriod::Days(days.into())
    }
}

impl From<&str> for LoanPeriod {
    fn from(s: &str) -> Self {
        LoanPeriod::Text(s.to_string())
    }
}

/// Date the pump is due back.
pub fn due_date(departure: NaiveDate, period_days: u32) -> Option<NaiveDate> {
    departure.checked_add_days(Days::new(period_days.into()))
}

/// Classify the calendar-day distance between the due date and today.
pub fn classify_remaining(remaining_days: i64) -> LoanStatus {
    if remaining_days < 0 {
        LoanStatus::Overdue
    } else if remaining_days <= DUE_SOON_WINDOW_DAYS {
        LoanStatus::DueSoon
    } else {
        LoanStatus::OnTime
    }
}

/// Derive a loan's status from its departure date and period.
///
/// Both operands are calendar dates, so the result does not depend on the
/// time of day.
pub fn compute_status(
    departure: Option<NaiveDate>,
    period: Option<&LoanPeriod>,
    today: NaiveDate,
) -> LoanStatus {
    let (Some(departure), Some(period)) = (departure, period.filter(|p| !p.is_blank())) else {
        return LoanStatus::Undefined;
    };
    let Some(days) = period.days() else {
        return LoanStatus::InvalidDate;
    };
    match due_date(departure, days) {
        Some(due) => classify_remaining((due - today).num_days()),
        None => LoanStatus::InvalidDate,
    }
}
