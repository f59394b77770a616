//! Inventory catalog models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::lifecycle::normalize_text;

/// A physical pump as listed in the inventory sheet. Read-only to the core;
/// the source of truth for model and maintenance schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    /// Serial as typed in the inventory sheet
    pub serial: String,
    /// Pump model (e.g., "ULTA", "ACTIVAC")
    pub model: Option<String>,
    /// Date of the last preventive maintenance
    pub last_maintenance: Option<NaiveDate>,
    /// Date the next maintenance is due
    pub maintenance_due: Option<NaiveDate>,
}

impl CatalogEntry {
    /// Create an entry with only a serial.
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            model: None,
            last_maintenance: None,
            maintenance_due: None,
        }
    }

    /// Join key.
    pub fn normalized_serial(&self) -> String {
        normalize_text(&self.serial)
    }

    /// Model breakdown key; `None` when the model column is blank.
    pub fn model_key(&self) -> Option<String> {
        self.model
            .as_deref()
            .map(normalize_text)
            .filter(|m| !m.is_empty())
    }

    /// Maintenance is current when the due date is today or later. A missing
    /// due date never qualifies.
    pub fn is_maintenance_current(&self, today: NaiveDate) -> bool {
        self.maintenance_due.is_some_and(|due| due >= today)
    }
}
