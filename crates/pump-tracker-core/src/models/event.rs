//! Audit event model.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One line of the append-only audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    /// When the action happened
    pub occurred_at: DateTime<FixedOffset>,
    /// Upper-cased description (e.g., "PUMP RETURNED (SERIAL: X) ...")
    pub description: String,
    /// Branch the action was performed from
    pub branch: Option<String>,
}

/// Substrings that mark a pump-return event in the log. The second is the
/// marker written by the legacy deployment.
pub const RETURN_EVENT_MARKERS: [&str; 2] = ["PUMP RETURNED", "BOMBA DEVOLVIDA"];

impl EventRecord {
    /// New event; the description is upper-cased.
    pub fn new(
        occurred_at: DateTime<FixedOffset>,
        description: &str,
        branch: Option<String>,
    ) -> Self {
        Self {
            occurred_at,
            description: description.to_uppercase(),
            branch,
        }
    }

    pub fn is_return(&self) -> bool {
        let description = self.description.to_uppercase();
        RETURN_EVENT_MARKERS.iter().any(|m| description.contains(m))
    }
}
