//! Dashboard metrics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{degrade_to_empty, reconcile, CatalogIndex, Notice};
use crate::lifecycle::{normalize_opt, Clock, LoanStatus};
use crate::models::Branch;
use crate::store::{fetch_active_loans, fetch_catalog, fetch_open_maintenance, RecordStore};

/// Everything the dashboard shows for one scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsBundle {
    /// Branch the scoped counts refer to; `None` means all branches
    pub scope: Option<Branch>,
    /// Scoped active loans that matched the catalog (sum of `active_by_model`)
    pub active_count: u64,
    /// Scoped active loan rows, catalog match or not
    pub active_rows: u64,
    pub available_count: u64,
    /// Scoped open maintenance records
    pub in_maintenance_count: u64,
    pub catalog_total: u64,
    pub active_by_model: BTreeMap<String, u64>,
    pub available_by_model: BTreeMap<String, u64>,
    /// Scoped active loans by status as of today; every computed label present
    pub status_counts: BTreeMap<LoanStatus, u64>,
    /// Scoped active loans by normalized hospital name
    pub hospital_counts: BTreeMap<String, u64>,
    /// Active loans per branch, always across all branches
    pub branch_counts: BTreeMap<Branch, u64>,
    /// Active loans per branch and model, always across all branches
    pub branch_model_counts: BTreeMap<Branch, BTreeMap<String, u64>>,
    /// Sources that degraded to empty while computing this bundle
    pub notices: Vec<Notice>,
}

/// Computes [`MetricsBundle`]s from the record store.
pub struct MetricsAggregator<'a> {
    store: &'a dyn RecordStore,
    clock: &'a dyn Clock,
}

impl<'a> MetricsAggregator<'a> {
    pub fn new(store: &'a dyn RecordStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Compute the dashboard metrics, scoped to `branch` where the count is
    /// branch-local.
    pub fn compute_metrics(&self, branch: Option<Branch>) -> MetricsBundle {
        let today = self.clock.today();
        let mut notices = Vec::new();

        let catalog = degrade_to_empty("catalog", fetch_catalog(self.store), &mut notices);
        let active = degrade_to_empty("active loans", fetch_active_loans(self.store), &mut notices);
        let maintenance = degrade_to_empty(
            "maintenance",
            fetch_open_maintenance(self.store),
            &mut notices,
        );

        let in_scope = |raw: &str| branch.map_or(true, |b| b.matches(raw));
        let scoped_active: Vec<_> = active.iter().filter(|l| in_scope(&l.branch)).collect();
        let scoped_maintenance = maintenance.iter().filter(|m| in_scope(&m.branch)).count();

        let reconciliation = reconcile(&catalog, &active, &maintenance, branch, today);

        let mut status_counts: BTreeMap<LoanStatus, u64> =
            LoanStatus::COMPUTED.iter().map(|s| (*s, 0)).collect();
        for loan in &scoped_active {
            *status_counts.entry(loan.current_status(today)).or_insert(0) += 1;
        }

        let mut hospital_counts = BTreeMap::new();
        for loan in &scoped_active {
            let hospital = normalize_opt(loan.hospital.as_deref());
            if !hospital.is_empty() {
                *hospital_counts.entry(hospital).or_insert(0) += 1;
            }
        }

        let index = CatalogIndex::new(&catalog);
        let mut branch_counts: BTreeMap<Branch, u64> = Branch::ALL.iter().map(|b| (*b, 0)).collect();
        let mut branch_model_counts: BTreeMap<Branch, BTreeMap<String, u64>> =
            Branch::ALL.iter().map(|b| (*b, BTreeMap::new())).collect();
        for loan in &active {
            let Some(loan_branch) = Branch::parse(&loan.branch) else {
                debug!(serial = %loan.serial, branch = %loan.branch, "active loan outside known branches");
                continue;
            };
            *branch_counts.entry(loan_branch).or_insert(0) += 1;
            if let Some(model) = index.model_of(&loan.serial) {
                *branch_model_counts
                    .entry(loan_branch)
                    .or_default()
                    .entry(model)
                    .or_insert(0) += 1;
            }
        }

        let bundle = MetricsBundle {
            scope: branch,
            active_count: reconciliation.active_by_model.values().sum(),
            active_rows: scoped_active.len() as u64,
            available_count: reconciliation.available.len() as u64,
            in_maintenance_count: scoped_maintenance as u64,
            catalog_total: catalog.len() as u64,
            active_by_model: reconciliation.active_by_model,
            available_by_model: reconciliation.available_by_model,
            status_counts,
            hospital_counts,
            branch_counts,
            branch_model_counts,
            notices,
        };

        info!(
            scope = ?branch,
            active = bundle.active_count,
            available = bundle.available_count,
            in_maintenance = bundle.in_maintenance_count,
            degraded = bundle.notices.len(),
            "computed metrics"
        );
        bundle
    }
}
