//! Maintenance models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::lifecycle::normalize_text;
use crate::models::Branch;

/// Maintenance record status. The only transition is
/// `InMaintenance` → `Returned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    InMaintenance,
    Returned,
}

impl MaintenanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::InMaintenance => "in_maintenance",
            MaintenanceStatus::Returned => "returned",
        }
    }

    /// Parse a stored label, including legacy labels.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "in_maintenance" | "Em Manutenção" => Some(MaintenanceStatus::InMaintenance),
            "returned" | "Devolvida" => Some(MaintenanceStatus::Returned),
            _ => None,
        }
    }
}

/// A pump sent for repair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceRecord {
    /// Store-assigned ID
    pub id: String,
    pub serial: String,
    /// Defect reported at intake
    pub defect: Option<String>,
    pub registration_date: Option<NaiveDate>,
    /// Invoice (NF) issued when the pump was shipped for repair
    pub invoice_number: Option<String>,
    pub status: MaintenanceStatus,
    pub branch: String,
}

impl MaintenanceRecord {
    /// Join key.
    pub fn normalized_serial(&self) -> String {
        normalize_text(&self.serial)
    }

    pub fn in_branch(&self, branch: Branch) -> bool {
        branch.matches(&self.branch)
    }

    pub fn is_open(&self) -> bool {
        self.status == MaintenanceStatus::InMaintenance
    }
}
