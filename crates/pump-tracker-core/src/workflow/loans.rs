//! Loan desk: register, edit and return pumps on loan.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{
    matches_search, optional_text, required_date, required_period, required_text,
    session_branch, ActionOutcome, Listing, ValidationError, WorkflowError, WorkflowResult,
};
use crate::inventory::{degrade_to_empty, CatalogIndex};
use crate::lifecycle::{
    compute_status, due_date, format_display_date, format_store_date, Clock, LoanPeriod,
    LoanStatus,
};
use crate::models::{EventRecord, LoanRecord};
use crate::session::{cache_key, EventBuffer, SessionContext};
use crate::store::{
    fetch_catalog, fetch_loans, fetch_returned_history, find_active_loan_by_serial, find_loan,
    loan_to_record, tables, Filter, Record, RecordStore, StoreError,
};

/// Loan registration or edit form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanForm {
    pub serial: String,
    pub hospital: String,
    pub patient: String,
    pub physician: String,
    pub insurer: String,
    pub order_ref: Option<String>,
    pub invoice_ref: Option<String>,
    pub departure_date: Option<NaiveDate>,
    /// Period in days, as typed
    pub period: String,
}

/// Pump return form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnForm {
    /// Return invoice (NF de devolução) number
    pub return_invoice: String,
    /// Defaults to today
    pub return_date: Option<NaiveDate>,
}

/// Listing filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanFilter {
    /// Include returned loans
    pub include_returned: bool,
    /// Substring of serial, patient or hospital
    pub search: Option<String>,
}

/// A loan row enriched for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanView {
    pub loan: LoanRecord,
    /// Status as of today
    pub status: LoanStatus,
    pub due_date: Option<NaiveDate>,
    /// Catalog model; `None` on a catalog miss
    pub model: Option<String>,
    pub last_maintenance: Option<NaiveDate>,
    pub maintenance_due: Option<NaiveDate>,
}

/// Loan operations over a record store.
pub struct LoanDesk<'a> {
    store: &'a dyn RecordStore,
    clock: &'a dyn Clock,
}

impl<'a> LoanDesk<'a> {
    pub fn new(store: &'a dyn RecordStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Register a new loan for the session's branch.
    ///
    /// Rejects the form before writing when a required field is missing, the
    /// period is not a number of days, or the serial is already out on an
    /// active loan in any branch.
    pub fn register(
        &self,
        session: &mut SessionContext,
        form: &LoanForm,
    ) -> WorkflowResult<ActionOutcome<LoanRecord>> {
        let branch = session_branch(session)?;
        let serial = required_text("serial", &form.serial)?;
        let hospital = required_text("hospital", &form.hospital)?;
        let patient = required_text("patient", &form.patient)?;
        let physician = required_text("physician", &form.physician)?;
        let insurer = required_text("insurer", &form.insurer)?;
        let departure = required_date("departure_date", form.departure_date)?;
        let days = required_period(&form.period)?;

        if find_active_loan_by_serial(self.store, &serial)?.is_some() {
            return Err(duplicate_serial(&serial).into());
        }

        let today = self.clock.today();
        let period = LoanPeriod::from(days);
        let loan = LoanRecord {
            id: Uuid::new_v4().to_string(),
            serial: serial.clone(),
            hospital: Some(hospital),
            patient: Some(patient),
            physician: Some(physician),
            insurer: Some(insurer),
            order_ref: optional_text(form.order_ref.as_deref()),
            invoice_ref: optional_text(form.invoice_ref.as_deref()),
            registration_date: Some(today),
            departure_date: Some(departure),
            status: Some(compute_status(Some(departure), Some(&period), today)),
            period: Some(period),
            active: true,
            branch: branch.as_str().to_string(),
            return_date: None,
            return_invoice: None,
        };

        self.store
            .insert(tables::LOANS, &[loan_to_record(&loan)])
            .map_err(|e| serial_conflict(e, &serial))?;
        session.cache.invalidate_all();
        info!(serial = %loan.serial, %branch, "loan registered");

        let events = self.event(
            &format!("PUMP REGISTERED (SERIAL: {})", loan.serial),
            &loan.branch,
        );
        Ok(ActionOutcome { value: loan, events })
    }

    /// Overwrite an active loan's data and recompute its status.
    pub fn edit(
        &self,
        session: &mut SessionContext,
        id: &str,
        form: &LoanForm,
    ) -> WorkflowResult<ActionOutcome<LoanRecord>> {
        let current = self.active_loan(id)?;
        let serial = required_text("serial", &form.serial)?;
        let departure = required_date("departure_date", form.departure_date)?;
        let days = required_period(&form.period)?;

        if let Some(other) = find_active_loan_by_serial(self.store, &serial)? {
            if other.id != current.id {
                return Err(duplicate_serial(&serial).into());
            }
        }

        let period = LoanPeriod::from(days);
        let loan = LoanRecord {
            serial: serial.clone(),
            hospital: optional_text(Some(form.hospital.as_str())),
            patient: optional_text(Some(form.patient.as_str())),
            physician: optional_text(Some(form.physician.as_str())),
            insurer: optional_text(Some(form.insurer.as_str())),
            order_ref: optional_text(form.order_ref.as_deref()),
            invoice_ref: optional_text(form.invoice_ref.as_deref()),
            departure_date: Some(departure),
            status: Some(compute_status(Some(departure), Some(&period), self.clock.today())),
            period: Some(period),
            ..current
        };

        let mut values = loan_to_record(&loan);
        for immutable in ["id", "registration_date", "active", "branch", "return_date", "return_invoice"] {
            values.remove(immutable);
        }
        self.update_by_id(&loan.id, &values)
            .map_err(|e| serial_conflict(e, &serial))?;
        session.cache.invalidate_all();
        info!(id, serial = %loan.serial, "loan updated");

        let events = self.event(
            &format!("PUMP DATA UPDATED (SERIAL: {})", loan.serial),
            &loan.branch,
        );
        Ok(ActionOutcome { value: loan, events })
    }

    /// Close a loan: the pump is back. Terminal; a returned loan cannot be
    /// returned again.
    pub fn return_loan(
        &self,
        session: &mut SessionContext,
        id: &str,
        form: &ReturnForm,
    ) -> WorkflowResult<ActionOutcome<LoanRecord>> {
        let current = self.active_loan(id)?;
        let return_invoice = required_text("return_invoice", &form.return_invoice)?;
        let return_date = form.return_date.unwrap_or_else(|| self.clock.today());

        let mut values = Record::new();
        values.insert("active".into(), Value::Bool(false));
        values.insert("status".into(), Value::from(LoanStatus::Returned.as_str()));
        values.insert("return_date".into(), Value::from(format_store_date(return_date)));
        values.insert("return_invoice".into(), Value::from(return_invoice.clone()));
        self.update_by_id(id, &values)?;
        session.cache.invalidate_all();
        info!(id, serial = %current.serial, "loan returned");

        let events = self.event(
            &format!(
                "PUMP RETURNED (SERIAL: {}) ON {} (RETURN INVOICE: {})",
                current.serial,
                format_display_date(return_date),
                return_invoice
            ),
            &current.branch,
        );
        let loan = LoanRecord {
            active: false,
            status: Some(LoanStatus::Returned),
            return_date: Some(return_date),
            return_invoice: Some(return_invoice),
            ..current
        };
        Ok(ActionOutcome { value: loan, events })
    }

    /// Loans in the session's scope, enriched with catalog data and today's
    /// status. Cached per scope and filter.
    pub fn list(&self, session: &mut SessionContext, filter: &LoanFilter) -> Listing<LoanView> {
        let scope = session.branch;
        let key = cache_key(
            "loans",
            &[
                scope.map_or("ALL", |b| b.as_str()),
                if filter.include_returned { "all" } else { "active" },
                filter.search.as_deref().unwrap_or(""),
            ],
        );

        session.cache.get_or_compute(&key, || {
            let mut notices = Vec::new();
            let catalog = degrade_to_empty("catalog", fetch_catalog(self.store), &mut notices);
            let loans = degrade_to_empty(
                "loans",
                fetch_loans(self.store, !filter.include_returned, scope),
                &mut notices,
            );

            let index = CatalogIndex::new(&catalog);
            let today = self.clock.today();
            let rows = loans
                .into_iter()
                .filter(|l| {
                    matches_search(
                        filter.search.as_deref(),
                        &[Some(l.serial.as_str()), l.patient.as_deref(), l.hospital.as_deref()],
                    )
                })
                .map(|loan| {
                    let entry = index.get(&loan.serial);
                    LoanView {
                        status: loan.current_status(today),
                        due_date: loan
                            .departure_date
                            .zip(loan.period.as_ref().and_then(LoanPeriod::days))
                            .and_then(|(d, p)| due_date(d, p)),
                        model: entry.and_then(|e| e.model.clone()),
                        last_maintenance: entry.and_then(|e| e.last_maintenance),
                        maintenance_due: entry.and_then(|e| e.maintenance_due),
                        loan,
                    }
                })
                .collect();
            Listing { rows, notices }
        })
    }

    /// Pump-return events in the session's scope, newest first.
    pub fn returned_history(&self, session: &mut SessionContext) -> Listing<EventRecord> {
        let scope = session.branch;
        let key = cache_key("returned_history", &[scope.map_or("ALL", |b| b.as_str())]);
        session.cache.get_or_compute(&key, || {
            let mut notices = Vec::new();
            let rows = degrade_to_empty(
                "returned history",
                fetch_returned_history(self.store, scope),
                &mut notices,
            );
            Listing { rows, notices }
        })
    }

    fn active_loan(&self, id: &str) -> WorkflowResult<LoanRecord> {
        let loan = find_loan(self.store, id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("loan {id}")))?;
        if !loan.active || loan.status.is_some_and(|s| s.is_terminal()) {
            return Err(WorkflowError::InvalidTransition(format!(
                "loan {id} (serial {}) was already returned",
                loan.serial
            )));
        }
        Ok(loan)
    }

    fn update_by_id(&self, id: &str, values: &Record) -> Result<usize, StoreError> {
        self.store.update(
            tables::LOANS,
            values,
            &[Filter::Eq("id".into(), Value::from(id))],
        )
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

fn duplicate_serial(serial: &str) -> ValidationError {
    ValidationError::new("serial", format!("{serial} already has an active loan"))
}

/// A unique-index hit means another session registered the serial first.
fn serial_conflict(err: StoreError, serial: &str) -> WorkflowError {
    match err {
        StoreError::Constraint(_) => duplicate_serial(serial).into(),
        other => other.into(),
    }
}
