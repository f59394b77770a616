//! User actions: loan and maintenance registration, transitions, listings.
//!
//! Every mutating action validates before writing, invalidates the session
//! cache after a successful write, and returns its audit events in an
//! [`ActionOutcome`] for the caller to flush.

mod loans;
mod maintenance;

pub use loans::*;
pub use maintenance::*;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inventory::Notice;
use crate::lifecycle::{normalize_text, LoanPeriod};
use crate::models::Branch;
use crate::session::{EventBuffer, SessionContext};
use crate::store::StoreError;

/// A field-level validation message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Workflow errors.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Result of a mutating action plus the audit events it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome<T> {
    pub value: T,
    pub events: EventBuffer,
}

/// Rows of a listing plus notices for sources that degraded to empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing<T> {
    pub rows: Vec<T>,
    pub notices: Vec<Notice>,
}

fn required_text(field: &str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    Ok(value.to_uppercase())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_uppercase)
}

fn required_date(field: &str, value: Option<NaiveDate>) -> Result<NaiveDate, ValidationError> {
    value.ok_or_else(|| ValidationError::new(field, "is required"))
}

/// Loan period as typed in a form: digits only.
fn required_period(value: &str) -> Result<u32, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("period", "is required"));
    }
    LoanPeriod::Text(value.to_string())
        .days()
        .ok_or_else(|| ValidationError::new("period", "must be a whole number of days"))
}

fn session_branch(session: &SessionContext) -> Result<Branch, ValidationError> {
    session
        .branch
        .ok_or_else(|| ValidationError::new("branch", "no branch selected"))
}

/// Case- and accent-insensitive substring match over any of `fields`.
fn matches_search(term: Option<&str>, fields: &[Option<&str>]) -> bool {
    let Some(term) = term.map(normalize_text).filter(|t| !t.is_empty()) else {
        return true;
    };
    fields
        .iter()
        .flatten()
        .any(|f| normalize_text(f).contains(&term))
}
