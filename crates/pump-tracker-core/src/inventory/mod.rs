//! Inventory reconciliation and dashboard metrics.
//!
//! Reads here never fail the caller: a source that cannot be fetched or
//! mapped is replaced by an empty set, logged, and reported back as a
//! [`Notice`] alongside the degraded result.

mod metrics;
mod reconciler;

pub use metrics::*;
pub use reconciler::*;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::store::StoreResult;

/// Non-blocking message about a source that degraded to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Which read degraded (e.g., "catalog")
    pub source: String,
    pub message: String,
}

/// Unwrap a read, substituting an empty set on failure.
pub fn degrade_to_empty<T>(
    source: &str,
    result: StoreResult<Vec<T>>,
    notices: &mut Vec<Notice>,
) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(e) => {
            error!(source, error = %e, "read failed, continuing with empty set");
            notices.push(Notice {
                source: source.to_string(),
                message: format!("Could not load {source}: {e}"),
            });
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_degrade_records_notice() {
        let mut notices = Vec::new();
        let rows: Vec<u32> = degrade_to_empty(
            "catalog",
            Err(StoreError::InvalidIdentifier("x y".into())),
            &mut notices,
        );
        assert!(rows.is_empty());
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].source, "catalog");

        let rows = degrade_to_empty("loans", Ok(vec![1, 2]), &mut notices);
        assert_eq!(rows, vec![1, 2]);
        assert_eq!(notices.len(), 1);
    }
}
