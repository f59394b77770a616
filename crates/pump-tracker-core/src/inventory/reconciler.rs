//! Availability: which catalog pumps are neither out on loan nor in repair.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::lifecycle::normalize_text;
use crate::models::{Branch, CatalogEntry, LoanRecord, MaintenanceRecord};

/// Catalog lookup by normalized serial. The first entry wins on duplicates.
pub struct CatalogIndex<'a> {
    by_serial: HashMap<String, &'a CatalogEntry>,
}

impl<'a> CatalogIndex<'a> {
    pub fn new(catalog: &'a [CatalogEntry]) -> Self {
        let mut by_serial = HashMap::with_capacity(catalog.len());
        for entry in catalog {
            by_serial.entry(entry.normalized_serial()).or_insert(entry);
        }
        Self { by_serial }
    }

    /// Entry for a serial as typed anywhere (loan, maintenance, form).
    pub fn get(&self, serial: &str) -> Option<&'a CatalogEntry> {
        self.by_serial.get(&normalize_text(serial)).copied()
    }

    /// Model key for a serial; `None` on a catalog miss or a blank model.
    pub fn model_of(&self, serial: &str) -> Option<String> {
        self.get(serial).and_then(CatalogEntry::model_key)
    }
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Normalized serials out on loan or in repair, across all branches
    pub unavailable_serials: BTreeSet<String>,
    /// Catalog entries free to lend
    pub available: Vec<CatalogEntry>,
    /// Scoped active loans joined to the catalog, by model
    pub active_by_model: BTreeMap<String, u64>,
    /// Available entries by model (never scoped)
    pub available_by_model: BTreeMap<String, u64>,
}

/// Reconcile the catalog against the global active-loan and in-maintenance
/// sets.
///
/// Unavailability is always global: a pump out on loan from another branch
/// is not available here either. `scope` only narrows `active_by_model`.
/// An entry is available when its serial is not unavailable and its
/// maintenance due date is today or later; a missing due date disqualifies.
pub fn reconcile(
    catalog: &[CatalogEntry],
    active_loans: &[LoanRecord],
    in_maintenance: &[MaintenanceRecord],
    scope: Option<Branch>,
    today: NaiveDate,
) -> Reconciliation {
    let index = CatalogIndex::new(catalog);

    let unavailable_serials: BTreeSet<String> = active_loans
        .iter()
        .map(LoanRecord::normalized_serial)
        .chain(
            in_maintenance
                .iter()
                .filter(|m| m.is_open())
                .map(MaintenanceRecord::normalized_serial),
        )
        .collect();

    let available: Vec<CatalogEntry> = catalog
        .iter()
        .filter(|e| !unavailable_serials.contains(&e.normalized_serial()))
        .filter(|e| e.is_maintenance_current(today))
        .cloned()
        .collect();

    let mut active_by_model = BTreeMap::new();
    for loan in active_loans {
        if scope.is_some_and(|b| !loan.in_branch(b)) {
            continue;
        }
        if let Some(model) = index.model_of(&loan.serial) {
            *active_by_model.entry(model).or_insert(0) += 1;
        }
    }

    let mut available_by_model = BTreeMap::new();
    for model in available.iter().filter_map(CatalogEntry::model_key) {
        *available_by_model.entry(model).or_insert(0) += 1;
    }

    Reconciliation {
        unavailable_serials,
        available,
        active_by_model,
        available_by_model,
    }
}
