//! Typed reads and writes over a [`RecordStore`].

use tracing::debug;

use super::{event_to_record, map_records, tables, Query, RecordStore, StoreResult};
use crate::lifecycle::same_key;
use crate::models::{
    Branch, CatalogEntry, EventRecord, LoanRecord, MaintenanceRecord, RETURN_EVENT_MARKERS,
};

/// Every catalog entry.
pub fn fetch_catalog(store: &dyn RecordStore) -> StoreResult<Vec<CatalogEntry>> {
    let records = store.fetch(&Query::select(tables::CATALOG, "*"))?;
    debug!(rows = records.len(), "fetched catalog");
    map_records(&records)
}

/// Active loans across all branches.
pub fn fetch_active_loans(store: &dyn RecordStore) -> StoreResult<Vec<LoanRecord>> {
    fetch_loans(store, true, None)
}

/// Open maintenance records across all branches.
pub fn fetch_open_maintenance(store: &dyn RecordStore) -> StoreResult<Vec<MaintenanceRecord>> {
    fetch_maintenance(store, true, None)
}

/// Loans, optionally restricted to active ones and to a branch.
///
/// Branch matching goes through the normalizer, so it is applied after the
/// read rather than as an exact-match filter.
pub fn fetch_loans(
    store: &dyn RecordStore,
    active_only: bool,
    branch: Option<Branch>,
) -> StoreResult<Vec<LoanRecord>> {
    let mut query = Query::select(tables::LOANS, "*");
    if active_only {
        query = query.eq("active", true);
    }
    let records = store.fetch(&query.order("departure_date", true))?;
    let mut loans: Vec<LoanRecord> = map_records(&records)?;
    if let Some(branch) = branch {
        loans.retain(|l| l.in_branch(branch));
    }
    debug!(rows = loans.len(), active_only, "fetched loans");
    Ok(loans)
}

/// Maintenance records, optionally restricted to open ones and to a branch.
///
/// Open records carry either the current or a legacy status label, so the
/// open filter runs on the mapped status rather than in the query.
pub fn fetch_maintenance(
    store: &dyn RecordStore,
    open_only: bool,
    branch: Option<Branch>,
) -> StoreResult<Vec<MaintenanceRecord>> {
    let query = Query::select(tables::MAINTENANCE, "*").order("registration_date", true);
    let records = store.fetch(&query)?;
    let mut rows: Vec<MaintenanceRecord> = map_records(&records)?;
    if open_only {
        rows.retain(MaintenanceRecord::is_open);
    }
    if let Some(branch) = branch {
        rows.retain(|m| m.in_branch(branch));
    }
    debug!(rows = rows.len(), open_only, "fetched maintenance");
    Ok(rows)
}

/// Loan by ID.
pub fn find_loan(store: &dyn RecordStore, id: &str) -> StoreResult<Option<LoanRecord>> {
    let records = store.fetch(&Query::select(tables::LOANS, "*").eq("id", id))?;
    Ok(map_records::<LoanRecord>(&records)?.into_iter().next())
}

/// Maintenance record by ID.
pub fn find_maintenance(
    store: &dyn RecordStore,
    id: &str,
) -> StoreResult<Option<MaintenanceRecord>> {
    let records = store.fetch(&Query::select(tables::MAINTENANCE, "*").eq("id", id))?;
    Ok(map_records::<MaintenanceRecord>(&records)?.into_iter().next())
}

/// The active loan holding `serial`, compared by normalized key.
pub fn find_active_loan_by_serial(
    store: &dyn RecordStore,
    serial: &str,
) -> StoreResult<Option<LoanRecord>> {
    Ok(fetch_active_loans(store)?
        .into_iter()
        .find(|l| same_key(&l.serial, serial)))
}

/// The open maintenance record for `serial`, compared by normalized key.
pub fn find_open_maintenance_by_serial(
    store: &dyn RecordStore,
    serial: &str,
) -> StoreResult<Option<MaintenanceRecord>> {
    Ok(fetch_open_maintenance(store)?
        .into_iter()
        .find(|m| same_key(&m.serial, serial)))
}

/// Pump-return events under any return marker, newest first.
pub fn fetch_returned_history(
    store: &dyn RecordStore,
    branch: Option<Branch>,
) -> StoreResult<Vec<EventRecord>> {
    let mut events: Vec<EventRecord> = Vec::new();
    for (i, marker) in RETURN_EVENT_MARKERS.iter().enumerate() {
        let query = Query::select(tables::EVENTS, "occurred_at, description, branch")
            .ilike("description", &format!("%{marker}%"));
        let records = store.fetch(&query)?;
        let earlier = &RETURN_EVENT_MARKERS[..i];
        events.extend(
            map_records::<EventRecord>(&records)?
                .into_iter()
                .filter(|e| !earlier.iter().any(|m| e.description.to_uppercase().contains(m))),
        );
    }
    if let Some(branch) = branch {
        events.retain(|e| e.branch.as_deref().is_some_and(|b| branch.matches(b)));
    }
    // Offsets may differ between rows, so sort on the instant itself
    events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    Ok(events)
}

/// Append events in one batch.
pub fn insert_events(store: &dyn RecordStore, events: &[EventRecord]) -> StoreResult<usize> {
    if events.is_empty() {
        return Ok(0);
    }
    let records: Vec<_> = events.iter().map(event_to_record).collect();
    Ok(store.insert(tables::EVENTS, &records)?.len())
}
