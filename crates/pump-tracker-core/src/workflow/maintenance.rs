//! Maintenance desk: repair intake and completion.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{
    matches_search, required_text, session_branch, ActionOutcome, Listing, ValidationError,
    WorkflowError, WorkflowResult,
};
use crate::inventory::{degrade_to_empty, CatalogIndex};
use crate::lifecycle::Clock;
use crate::models::{EventRecord, MaintenanceRecord, MaintenanceStatus};
use crate::session::{cache_key, EventBuffer, SessionContext};
use crate::store::{
    fetch_catalog, fetch_maintenance, find_maintenance, find_open_maintenance_by_serial,
    maintenance_to_record, tables, Filter, Record, RecordStore, StoreError,
};

/// Repair intake form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceForm {
    pub serial: String,
    pub defect: String,
    /// Invoice (NF) the pump was shipped under
    pub invoice_number: String,
    /// Defaults to today
    pub registration_date: Option<NaiveDate>,
}

/// A maintenance row enriched with catalog data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceView {
    pub record: MaintenanceRecord,
    pub model: Option<String>,
    pub last_maintenance: Option<NaiveDate>,
    pub maintenance_due: Option<NaiveDate>,
}

/// Maintenance operations over a record store.
pub struct MaintenanceDesk<'a> {
    store: &'a dyn RecordStore,
    clock: &'a dyn Clock,
}

impl<'a> MaintenanceDesk<'a> {
    pub fn new(store: &'a dyn RecordStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Send a pump to repair. A serial already in repair is rejected.
    pub fn intake(
        &self,
        session: &mut SessionContext,
        form: &MaintenanceForm,
    ) -> WorkflowResult<ActionOutcome<MaintenanceRecord>> {
        let branch = session_branch(session)?;
        let serial = required_text("serial", &form.serial)?;
        let defect = required_text("defect", &form.defect)?;
        let invoice_number = required_text("invoice_number", &form.invoice_number)?;

        if find_open_maintenance_by_serial(self.store, &serial)?.is_some() {
            return Err(already_in_repair(&serial).into());
        }

        let record = MaintenanceRecord {
            id: Uuid::new_v4().to_string(),
            serial: serial.clone(),
            defect: Some(defect),
            registration_date: Some(form.registration_date.unwrap_or_else(|| self.clock.today())),
            invoice_number: Some(invoice_number.clone()),
            status: MaintenanceStatus::InMaintenance,
            branch: branch.as_str().to_string(),
        };

        self.store
            .insert(tables::MAINTENANCE, &[maintenance_to_record(&record)])
            .map_err(|e| match e {
                StoreError::Constraint(_) => already_in_repair(&serial).into(),
                other => WorkflowError::from(other),
            })?;
        session.cache.invalidate_all();
        info!(serial = %record.serial, %branch, "maintenance registered");

        let events = self.event(
            &format!("MAINTENANCE REGISTERED (SERIAL: {serial}, INVOICE: {invoice_number})"),
            &record.branch,
        );
        Ok(ActionOutcome {
            value: record,
            events,
        })
    }

    /// The pump came back from repair.
    pub fn complete(
        &self,
        session: &mut SessionContext,
        id: &str,
    ) -> WorkflowResult<ActionOutcome<MaintenanceRecord>> {
        let current = find_maintenance(self.store, id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("maintenance record {id}")))?;
        if !current.is_open() {
            return Err(WorkflowError::InvalidTransition(format!(
                "maintenance record {id} (serial {}) is already closed",
                current.serial
            )));
        }

        let mut values = Record::new();
        values.insert(
            "status".into(),
            Value::from(MaintenanceStatus::Returned.as_str()),
        );
        self.store.update(
            tables::MAINTENANCE,
            &values,
            &[Filter::Eq("id".into(), Value::from(id))],
        )?;
        session.cache.invalidate_all();
        info!(id, serial = %current.serial, "maintenance completed");

        let events = self.event(
            &format!("MAINTENANCE COMPLETED (SERIAL: {})", current.serial),
            &current.branch,
        );
        Ok(ActionOutcome {
            value: MaintenanceRecord {
                status: MaintenanceStatus::Returned,
                ..current
            },
            events,
        })
    }

    /// Maintenance records in the session's scope, optionally only open ones,
    /// filtered by a substring of serial, defect or invoice number.
    pub fn list(
        &self,
        session: &mut SessionContext,
        open_only: bool,
        search: Option<&str>,
    ) -> Listing<MaintenanceView> {
        let scope = session.branch;
        let key = cache_key(
            "maintenance",
            &[
                scope.map_or("ALL", |b| b.as_str()),
                if open_only { "open" } else { "all" },
                search.unwrap_or(""),
            ],
        );

        session.cache.get_or_compute(&key, || {
            let mut notices = Vec::new();
            let catalog = degrade_to_empty("catalog", fetch_catalog(self.store), &mut notices);
            let records = degrade_to_empty(
                "maintenance",
                fetch_maintenance(self.store, open_only, scope),
                &mut notices,
            );

            let index = CatalogIndex::new(&catalog);
            let rows = records
                .into_iter()
                .filter(|m| {
                    matches_search(
                        search,
                        &[
                            Some(m.serial.as_str()),
                            m.defect.as_deref(),
                            m.invoice_number.as_deref(),
                        ],
                    )
                })
                .map(|record| {
                    let entry = index.get(&record.serial);
                    MaintenanceView {
                        model: entry.and_then(|e| e.model.clone()),
                        last_maintenance: entry.and_then(|e| e.last_maintenance),
                        maintenance_due: entry.and_then(|e| e.maintenance_due),
                        record,
                    }
                })
                .collect();
            Listing { rows, notices }
        })
    }

    fn event(&self, description: &str, branch: &str) -> EventBuffer {
        let mut events = EventBuffer::new();
        events.push(EventRecord::new(
            self.clock.now().fixed_offset(),
            description,
            Some(branch.to_string()),
        ));
        events
    }
}

fn already_in_repair(serial: &str) -> ValidationError {
    ValidationError::new("serial", format!("{serial} is already in maintenance"))
}
