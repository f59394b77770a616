//! Pump Tracker Core Library
//!
//! Inventory, loan and maintenance tracking for a fleet of suction pumps lent
//! to hospitals from three branch sites, plus KPI analysis of the curativo
//! (wound-care) procedure sheet.
//!
//! # Architecture
//!
//! ```text
//!   inventory catalog     loans      maintenance         sheet export
//!          │                │              │                    │
//!          └────────────────┼──────────────┘                    │
//!                           │                                   │
//!                 [RecordStore / mapping]                 [BlobStore]
//!                           │                                   │
//!            ┌──────────────┼──────────────┐                    │
//!            ▼              ▼              ▼                    ▼
//!       Reconciler   Metrics Aggregator  Loan/Maintenance   KPI Engine
//!                                        desks
//!                                          │
//!                                   [EventBuffer] ──flush──▶ audit log
//! ```
//!
//! Every date enters through [`lifecycle::parse_date`] and every join key
//! through [`lifecycle::normalize_text`].
//!
//! # Modules
//!
//! - [`lifecycle`]: normalizer, date parser, status calculator, clocks
//! - [`models`]: typed records (loans, maintenance, catalog, events, branches)
//! - [`store`]: collaborator interfaces, SQLite implementation, mapping layer
//! - [`inventory`]: availability reconciliation and dashboard metrics
//! - [`kpi`]: spreadsheet KPI engine
//! - [`session`]: per-session result cache and audit-event buffer
//! - [`workflow`]: registration, transitions and listings
//! - [`config`]: credentials and the persisted branch selection

pub mod config;
pub mod inventory;
pub mod kpi;
pub mod lifecycle;
pub mod models;
pub mod session;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use config::{BranchConfig, StoreSettings};
pub use inventory::{reconcile, MetricsAggregator, MetricsBundle, Notice, Reconciliation};
pub use kpi::{analyze, analyze_from_store, KpiReport};
pub use lifecycle::{
    compute_status, normalize_text, parse_date, Clock, FixedClock, LoanPeriod, LoanStatus,
    SystemClock,
};
pub use models::{
    Branch, CatalogEntry, EventRecord, LoanRecord, MaintenanceRecord, MaintenanceStatus,
};
pub use session::{EventBuffer, ResultCache, SessionContext};
pub use store::{BlobStore, RecordStore, SqliteStore};
pub use workflow::{LoanDesk, MaintenanceDesk};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::warn;

use crate::session::cache_key;
use crate::workflow::{LoanFilter, LoanForm, LoanView, MaintenanceForm, MaintenanceView, ReturnForm};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PumpTrackerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Analysis error: {0}")]
    AnalysisError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<store::StoreError> for PumpTrackerError {
    fn from(e: store::StoreError) -> Self {
        PumpTrackerError::StorageError(e.to_string())
    }
}

impl From<workflow::WorkflowError> for PumpTrackerError {
    fn from(e: workflow::WorkflowError) -> Self {
        use workflow::WorkflowError;
        match e {
            WorkflowError::Validation(v) => PumpTrackerError::ValidationError(v.to_string()),
            WorkflowError::NotFound(what) => PumpTrackerError::NotFound(what),
            WorkflowError::InvalidTransition(why) => PumpTrackerError::InvalidTransition(why),
            WorkflowError::Store(e) => e.into(),
        }
    }
}

impl From<kpi::KpiError> for PumpTrackerError {
    fn from(e: kpi::KpiError) -> Self {
        match e {
            kpi::KpiError::SourceNotFound(path) => PumpTrackerError::NotFound(path),
            other => PumpTrackerError::AnalysisError(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for PumpTrackerError {
    fn from(e: config::ConfigError) -> Self {
        PumpTrackerError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for PumpTrackerError {
    fn from(e: serde_json::Error) -> Self {
        PumpTrackerError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PumpTrackerError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PumpTrackerError::StorageError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a store at the given path, with no branch selected.
#[uniffi::export]
pub fn open_store(path: String) -> Result<Arc<PumpTrackerCore>, PumpTrackerError> {
    let store = SqliteStore::open(&path)?;
    Ok(Arc::new(PumpTrackerCore::new(store, None)))
}

/// Create an in-memory store (for testing).
#[uniffi::export]
pub fn open_store_in_memory() -> Result<Arc<PumpTrackerCore>, PumpTrackerError> {
    let store = SqliteStore::open_in_memory()?;
    Ok(Arc::new(PumpTrackerCore::new(store, None)))
}

/// Open the store named by `STORE_URL`/`STORE_KEY` and restore the branch
/// saved in `config.json`. Missing credentials fail immediately.
#[uniffi::export]
pub fn open_store_from_env() -> Result<Arc<PumpTrackerCore>, PumpTrackerError> {
    let settings = StoreSettings::from_env()?;
    let branch = BranchConfig::default().load()?;
    let store = SqliteStore::open(settings.database_path())?;
    Ok(Arc::new(PumpTrackerCore::new(store, branch)))
}

/// Install the log subscriber (`RUST_LOG`, default `info`). Safe to call
/// more than once.
#[uniffi::export]
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // Already installed is fine
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Status of a loan as of today.
#[uniffi::export]
pub fn compute_loan_status(departure_date: Option<String>, period_days: Option<String>) -> String {
    let departure = lifecycle::parse_date_opt(departure_date.as_deref());
    let period = period_days.map(LoanPeriod::Text);
    compute_status(departure, period.as_ref(), SystemClock.today())
        .as_str()
        .to_string()
}

/// Normalized join key for free text.
#[uniffi::export]
pub fn normalize_key(text: String) -> String {
    normalize_text(&text)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe store and session wrapper for FFI.
#[derive(uniffi::Object)]
pub struct PumpTrackerCore {
    store: Arc<Mutex<SqliteStore>>,
    session: Mutex<SessionContext>,
    clock: SystemClock,
}

impl PumpTrackerCore {
    fn new(store: SqliteStore, branch: Option<Branch>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            session: Mutex::new(SessionContext::new(branch)),
            clock: SystemClock,
        }
    }

    fn loan_outcome(&self, loan: LoanRecord, audit_warning: Option<String>) -> FfiLoanOutcome {
        let status = loan.current_status(self.clock.today());
        FfiLoanOutcome {
            loan: FfiLoan::from_record(loan, status),
            audit_warning,
        }
    }

    /// Flush an action's events. A failed flush is logged and reported, and
    /// the events are dropped.
    fn flush(
        &self,
        store: &SqliteStore,
        session: &mut SessionContext,
        events: EventBuffer,
    ) -> Option<String> {
        match events.flush(store) {
            Ok(_) => {
                session.cache.invalidate_all();
                None
            }
            Err(e) => {
                warn!(dropped = e.events.len(), "audit events dropped");
                Some(e.to_string())
            }
        }
    }
}

#[uniffi::export]
impl PumpTrackerCore {
    // =========================================================================
    // Branch Selection
    // =========================================================================

    /// Select the branch scope; `None` means all branches.
    pub fn select_branch(&self, branch: Option<String>) -> Result<(), PumpTrackerError> {
        let branch = branch
            .map(|name| Branch::parse(&name).ok_or(config::ConfigError::UnknownBranch(name)))
            .transpose()?;
        self.session.lock()?.select_branch(branch);
        Ok(())
    }

    /// Select a branch and persist the choice to a branch file.
    pub fn save_branch(&self, branch: String, config_path: String) -> Result<(), PumpTrackerError> {
        let parsed = Branch::parse(&branch).ok_or(config::ConfigError::UnknownBranch(branch))?;
        BranchConfig::new(&config_path).save(parsed)?;
        self.session.lock()?.select_branch(Some(parsed));
        Ok(())
    }

    pub fn current_branch(&self) -> Result<Option<String>, PumpTrackerError> {
        Ok(self.session.lock()?.branch.map(|b| b.as_str().to_string()))
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    /// Dashboard metrics for the selected scope. Cached for the freshness
    /// window.
    pub fn compute_metrics(&self) -> Result<FfiMetrics, PumpTrackerError> {
        let store = self.store.lock()?;
        let mut session = self.session.lock()?;
        let scope = session.branch;
        let key = cache_key("metrics", &[scope.map_or("ALL", |b| b.as_str())]);
        let bundle = session.cache.get_or_compute(&key, || {
            MetricsAggregator::new(&*store, &self.clock).compute_metrics(scope)
        });
        Ok(bundle.into())
    }

    // =========================================================================
    // Loan Operations
    // =========================================================================

    pub fn register_loan(&self, form: FfiLoanForm) -> Result<FfiLoanOutcome, PumpTrackerError> {
        let form: LoanForm = form.try_into()?;
        let store = self.store.lock()?;
        let mut session = self.session.lock()?;
        let outcome = LoanDesk::new(&*store, &self.clock).register(&mut session, &form)?;
        let audit_warning = self.flush(&store, &mut session, outcome.events);
        Ok(self.loan_outcome(outcome.value, audit_warning))
    }

    pub fn edit_loan(&self, id: String, form: FfiLoanForm) -> Result<FfiLoanOutcome, PumpTrackerError> {
        let form: LoanForm = form.try_into()?;
        let store = self.store.lock()?;
        let mut session = self.session.lock()?;
        let outcome = LoanDesk::new(&*store, &self.clock).edit(&mut session, &id, &form)?;
        let audit_warning = self.flush(&store, &mut session, outcome.events);
        Ok(self.loan_outcome(outcome.value, audit_warning))
    }

    pub fn return_loan(
        &self,
        id: String,
        return_invoice: String,
        return_date: Option<String>,
    ) -> Result<FfiLoanOutcome, PumpTrackerError> {
        let form = ReturnForm {
            return_invoice,
            return_date: form_date("return_date", return_date)?,
        };
        let store = self.store.lock()?;
        let mut session = self.session.lock()?;
        let outcome = LoanDesk::new(&*store, &self.clock).return_loan(&mut session, &id, &form)?;
        let audit_warning = self.flush(&store, &mut session, outcome.events);
        Ok(self.loan_outcome(outcome.value, audit_warning))
    }

    /// Loans in scope; `search` matches serial, patient or hospital.
    pub fn list_loans(
        &self,
        include_returned: bool,
        search: Option<String>,
    ) -> Result<FfiLoanListing, PumpTrackerError> {
        let store = self.store.lock()?;
        let mut session = self.session.lock()?;
        let filter = LoanFilter {
            include_returned,
            search,
        };
        let listing = LoanDesk::new(&*store, &self.clock).list(&mut session, &filter);
        Ok(FfiLoanListing {
            rows: listing.rows.into_iter().map(Into::into).collect(),
            notices: listing.notices.into_iter().map(Into::into).collect(),
        })
    }

    /// Pump-return events in scope, newest first.
    pub fn returned_history(&self) -> Result<FfiEventListing, PumpTrackerError> {
        let store = self.store.lock()?;
        let mut session = self.session.lock()?;
        let listing = LoanDesk::new(&*store, &self.clock).returned_history(&mut session);
        Ok(FfiEventListing {
            rows: listing.rows.into_iter().map(Into::into).collect(),
            notices: listing.notices.into_iter().map(Into::into).collect(),
        })
    }

    // =========================================================================
    // Maintenance Operations
    // =========================================================================

    pub fn register_maintenance(
        &self,
        form: FfiMaintenanceForm,
    ) -> Result<FfiMaintenanceOutcome, PumpTrackerError> {
        let form: MaintenanceForm = form.try_into()?;
        let store = self.store.lock()?;
        let mut session = self.session.lock()?;
        let outcome = MaintenanceDesk::new(&*store, &self.clock).intake(&mut session, &form)?;
        let audit_warning = self.flush(&store, &mut session, outcome.events);
        Ok(FfiMaintenanceOutcome {
            record: outcome.value.into(),
            audit_warning,
        })
    }

    pub fn complete_maintenance(&self, id: String) -> Result<FfiMaintenanceOutcome, PumpTrackerError> {
        let store = self.store.lock()?;
        let mut session = self.session.lock()?;
        let outcome = MaintenanceDesk::new(&*store, &self.clock).complete(&mut session, &id)?;
        let audit_warning = self.flush(&store, &mut session, outcome.events);
        Ok(FfiMaintenanceOutcome {
            record: outcome.value.into(),
            audit_warning,
        })
    }

    /// Maintenance records in scope; `search` matches serial, defect or
    /// invoice number.
    pub fn list_maintenance(
        &self,
        open_only: bool,
        search: Option<String>,
    ) -> Result<FfiMaintenanceListing, PumpTrackerError> {
        let store = self.store.lock()?;
        let mut session = self.session.lock()?;
        let listing =
            MaintenanceDesk::new(&*store, &self.clock).list(&mut session, open_only, search.as_deref());
        Ok(FfiMaintenanceListing {
            rows: listing.rows.into_iter().map(Into::into).collect(),
            notices: listing.notices.into_iter().map(Into::into).collect(),
        })
    }

    // =========================================================================
    // Documents and KPI
    // =========================================================================

    pub fn upload_document(
        &self,
        path: String,
        bytes: Vec<u8>,
        content_type: String,
        upsert: bool,
    ) -> Result<(), PumpTrackerError> {
        let store = self.store.lock()?;
        store.upload(&path, &bytes, &content_type, upsert)?;
        self.session.lock()?.cache.invalidate_all();
        Ok(())
    }

    pub fn download_document(&self, path: String) -> Result<Option<Vec<u8>>, PumpTrackerError> {
        let store = self.store.lock()?;
        Ok(store.download(&path)?)
    }

    pub fn list_documents(&self, prefix: String) -> Result<Vec<FfiBlobEntry>, PumpTrackerError> {
        let store = self.store.lock()?;
        Ok(store.list(&prefix)?.into_iter().map(Into::into).collect())
    }

    pub fn remove_documents(&self, paths: Vec<String>) -> Result<u32, PumpTrackerError> {
        let store = self.store.lock()?;
        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        let removed = store.remove(&paths)?;
        self.session.lock()?.cache.invalidate_all();
        Ok(removed as u32)
    }

    /// Analyze the curativo sheet stored at `path` (default location when
    /// `None`) and return the report as JSON.
    pub fn analyze_curativo_json(&self, path: Option<String>) -> Result<String, PumpTrackerError> {
        let store = self.store.lock()?;
        let path = path.unwrap_or_else(|| kpi::DEFAULT_SOURCE_PATH.to_string());
        let report = analyze_from_store(&*store, &path)?;
        Ok(serde_json::to_string(&report)?)
    }
}

/// Parse an optional form date; blank is `None`, garbage is rejected.
fn form_date(field: &str, raw: Option<String>) -> Result<Option<NaiveDate>, PumpTrackerError> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(text) => parse_date(text).map(Some).ok_or_else(|| {
            PumpTrackerError::ValidationError(format!("{field}: not a date: {text}"))
        }),
    }
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(lifecycle::format_store_date)
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe loan form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLoanForm {
    pub serial: String,
    pub hospital: String,
    pub patient: String,
    pub physician: String,
    pub insurer: String,
    pub order_ref: Option<String>,
    pub invoice_ref: Option<String>,
    /// `YYYY-MM-DD`
    pub departure_date: Option<String>,
    pub period_days: String,
}

impl TryFrom<FfiLoanForm> for LoanForm {
    type Error = PumpTrackerError;

    fn try_from(form: FfiLoanForm) -> Result<Self, Self::Error> {
        Ok(LoanForm {
            departure_date: form_date("departure_date", form.departure_date)?,
            serial: form.serial,
            hospital: form.hospital,
            patient: form.patient,
            physician: form.physician,
            insurer: form.insurer,
            order_ref: form.order_ref,
            invoice_ref: form.invoice_ref,
            period: form.period_days,
        })
    }
}

/// FFI-safe maintenance intake form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMaintenanceForm {
    pub serial: String,
    pub defect: String,
    pub invoice_number: String,
    pub registration_date: Option<String>,
}

impl TryFrom<FfiMaintenanceForm> for MaintenanceForm {
    type Error = PumpTrackerError;

    fn try_from(form: FfiMaintenanceForm) -> Result<Self, Self::Error> {
        Ok(MaintenanceForm {
            registration_date: form_date("registration_date", form.registration_date)?,
            serial: form.serial,
            defect: form.defect,
            invoice_number: form.invoice_number,
        })
    }
}

/// FFI-safe loan.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLoan {
    pub id: String,
    pub serial: String,
    pub hospital: Option<String>,
    pub patient: Option<String>,
    pub physician: Option<String>,
    pub insurer: Option<String>,
    pub order_ref: Option<String>,
    pub invoice_ref: Option<String>,
    pub registration_date: Option<String>,
    pub departure_date: Option<String>,
    pub period_days: Option<u32>,
    /// Status as of today
    pub status: String,
    pub active: bool,
    pub branch: String,
    pub return_date: Option<String>,
    pub return_invoice: Option<String>,
}

impl FfiLoan {
    fn from_record(loan: LoanRecord, status: LoanStatus) -> Self {
        Self {
            status: status.as_str().to_string(),
            period_days: loan.period.as_ref().and_then(LoanPeriod::days),
            registration_date: format_date(loan.registration_date),
            departure_date: format_date(loan.departure_date),
            return_date: format_date(loan.return_date),
            id: loan.id,
            serial: loan.serial,
            hospital: loan.hospital,
            patient: loan.patient,
            physician: loan.physician,
            insurer: loan.insurer,
            order_ref: loan.order_ref,
            invoice_ref: loan.invoice_ref,
            active: loan.active,
            branch: loan.branch,
            return_invoice: loan.return_invoice,
        }
    }
}

/// FFI-safe loan listing row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLoanView {
    pub loan: FfiLoan,
    pub due_date: Option<String>,
    pub model: Option<String>,
    pub last_maintenance: Option<String>,
    pub maintenance_due: Option<String>,
}

impl From<LoanView> for FfiLoanView {
    fn from(view: LoanView) -> Self {
        Self {
            loan: FfiLoan::from_record(view.loan, view.status),
            due_date: format_date(view.due_date),
            model: view.model,
            last_maintenance: format_date(view.last_maintenance),
            maintenance_due: format_date(view.maintenance_due),
        }
    }
}

/// FFI-safe maintenance record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMaintenance {
    pub id: String,
    pub serial: String,
    pub defect: Option<String>,
    pub registration_date: Option<String>,
    pub invoice_number: Option<String>,
    pub status: String,
    pub branch: String,
}

impl From<MaintenanceRecord> for FfiMaintenance {
    fn from(record: MaintenanceRecord) -> Self {
        Self {
            registration_date: format_date(record.registration_date),
            status: record.status.as_str().to_string(),
            id: record.id,
            serial: record.serial,
            defect: record.defect,
            invoice_number: record.invoice_number,
            branch: record.branch,
        }
    }
}

/// FFI-safe maintenance listing row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMaintenanceView {
    pub record: FfiMaintenance,
    pub model: Option<String>,
    pub last_maintenance: Option<String>,
    pub maintenance_due: Option<String>,
}

impl From<MaintenanceView> for FfiMaintenanceView {
    fn from(view: MaintenanceView) -> Self {
        Self {
            record: view.record.into(),
            model: view.model,
            last_maintenance: format_date(view.last_maintenance),
            maintenance_due: format_date(view.maintenance_due),
        }
    }
}

/// FFI-safe audit event.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEvent {
    /// RFC 3339
    pub occurred_at: String,
    pub description: String,
    pub branch: Option<String>,
}

impl From<EventRecord> for FfiEvent {
    fn from(event: EventRecord) -> Self {
        Self {
            occurred_at: event.occurred_at.to_rfc3339(),
            description: event.description,
            branch: event.branch,
        }
    }
}

/// FFI-safe notice about a degraded source.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNotice {
    pub source: String,
    pub message: String,
}

impl From<Notice> for FfiNotice {
    fn from(notice: Notice) -> Self {
        Self {
            source: notice.source,
            message: notice.message,
        }
    }
}

/// Result of a loan action.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLoanOutcome {
    pub loan: FfiLoan,
    /// Set when the audit log could not be written
    pub audit_warning: Option<String>,
}

/// Result of a maintenance action.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMaintenanceOutcome {
    pub record: FfiMaintenance,
    /// Set when the audit log could not be written
    pub audit_warning: Option<String>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLoanListing {
    pub rows: Vec<FfiLoanView>,
    pub notices: Vec<FfiNotice>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMaintenanceListing {
    pub rows: Vec<FfiMaintenanceView>,
    pub notices: Vec<FfiNotice>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEventListing {
    pub rows: Vec<FfiEvent>,
    pub notices: Vec<FfiNotice>,
}

/// FFI-safe blob listing entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBlobEntry {
    pub name: String,
    pub last_modified: String,
}

impl From<store::BlobEntry> for FfiBlobEntry {
    fn from(entry: store::BlobEntry) -> Self {
        Self {
            name: entry.name,
            last_modified: entry.last_modified,
        }
    }
}

/// FFI-safe dashboard metrics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMetrics {
    pub scope: Option<String>,
    pub active_count: u64,
    pub active_rows: u64,
    pub available_count: u64,
    pub in_maintenance_count: u64,
    pub catalog_total: u64,
    pub active_by_model: HashMap<String, u64>,
    pub available_by_model: HashMap<String, u64>,
    pub status_counts: HashMap<String, u64>,
    pub hospital_counts: HashMap<String, u64>,
    pub branch_counts: HashMap<String, u64>,
    pub branch_model_counts: HashMap<String, HashMap<String, u64>>,
    pub notices: Vec<FfiNotice>,
}

impl From<MetricsBundle> for FfiMetrics {
    fn from(m: MetricsBundle) -> Self {
        Self {
            scope: m.scope.map(|b| b.as_str().to_string()),
            active_count: m.active_count,
            active_rows: m.active_rows,
            available_count: m.available_count,
            in_maintenance_count: m.in_maintenance_count,
            catalog_total: m.catalog_total,
            active_by_model: m.active_by_model.into_iter().collect(),
            available_by_model: m.available_by_model.into_iter().collect(),
            status_counts: m
                .status_counts
                .into_iter()
                .map(|(s, c)| (s.as_str().to_string(), c))
                .collect(),
            hospital_counts: m.hospital_counts.into_iter().collect(),
            branch_counts: m
                .branch_counts
                .into_iter()
                .map(|(b, c)| (b.as_str().to_string(), c))
                .collect(),
            branch_model_counts: m
                .branch_model_counts
                .into_iter()
                .map(|(b, models)| (b.as_str().to_string(), models.into_iter().collect()))
                .collect(),
            notices: m.notices.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan_form(serial: &str) -> FfiLoanForm {
        FfiLoanForm {
            serial: serial.into(),
            hospital: "Hospital de Base".into(),
            patient: "Ana".into(),
            physician: "Dr. Reis".into(),
            insurer: "Particular".into(),
            order_ref: None,
            invoice_ref: Some("NF 10".into()),
            departure_date: Some("2024-01-01".into()),
            period_days: "30".into(),
        }
    }

    #[test]
    fn test_ffi_loan_round() {
        let core = open_store_in_memory().unwrap();
        assert!(matches!(
            core.register_loan(loan_form("SN1")),
            Err(PumpTrackerError::ValidationError(_))
        ));

        core.select_branch(Some("goiânia".into())).unwrap();
        assert_eq!(core.current_branch().unwrap().as_deref(), Some("GOIANIA"));

        let outcome = core.register_loan(loan_form("SN1")).unwrap();
        assert!(outcome.audit_warning.is_none());
        assert_eq!(outcome.loan.period_days, Some(30));

        let listing = core.list_loans(false, None).unwrap();
        assert_eq!(listing.rows.len(), 1);

        let returned = core
            .return_loan(outcome.loan.id.clone(), "NF-D1".into(), Some("2024-02-01".into()))
            .unwrap();
        assert_eq!(returned.loan.status, "returned");
        assert!(core.list_loans(false, None).unwrap().rows.is_empty());

        let history = core.returned_history().unwrap();
        assert_eq!(history.rows.len(), 1);
        assert!(history.rows[0].description.contains("01/02/2024"));
    }

    #[test]
    fn test_ffi_rejects_bad_dates_and_branches() {
        let core = open_store_in_memory().unwrap();
        assert!(matches!(
            core.select_branch(Some("Recife".into())),
            Err(PumpTrackerError::ConfigError(_))
        ));

        core.select_branch(Some("CUIABA".into())).unwrap();
        let mut form = loan_form("SN1");
        form.departure_date = Some("31/02/2024".into());
        assert!(matches!(
            core.register_loan(form),
            Err(PumpTrackerError::ValidationError(_))
        ));
    }

    #[test]
    fn test_ffi_metrics_and_maintenance() {
        let core = open_store_in_memory().unwrap();
        core.select_branch(Some("BRASILIA".into())).unwrap();

        let before = core.compute_metrics().unwrap();
        assert_eq!(before.in_maintenance_count, 0);
        assert_eq!(before.status_counts.len(), 5);

        let intake = core
            .register_maintenance(FfiMaintenanceForm {
                serial: "SN7".into(),
                defect: "Sem vácuo".into(),
                invoice_number: "991".into(),
                registration_date: None,
            })
            .unwrap();

        // The write invalidated the cached bundle
        let after = core.compute_metrics().unwrap();
        assert_eq!(after.in_maintenance_count, 1);

        core.complete_maintenance(intake.record.id).unwrap();
        assert!(core.list_maintenance(true, None).unwrap().rows.is_empty());
        assert_eq!(core.list_maintenance(false, Some("vacuo".into())).unwrap().rows.len(), 1);
    }

    #[test]
    fn test_ffi_curativo_analysis() {
        let core = open_store_in_memory().unwrap();
        core.upload_document(
            kpi::DEFAULT_SOURCE_PATH.into(),
            include_bytes!("../tests/fixtures/bdcurativo.xlsx").to_vec(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".into(),
            true,
        )
        .unwrap();

        let json = core.analyze_curativo_json(None).unwrap();
        let report: KpiReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.row_count, 4);
        assert_eq!(report.avg_invoicing_days, 2.5);

        assert_eq!(core.list_documents("analise".into()).unwrap().len(), 1);
        assert_eq!(core.remove_documents(vec![kpi::DEFAULT_SOURCE_PATH.into()]).unwrap(), 1);
        assert!(matches!(
            core.analyze_curativo_json(None),
            Err(PumpTrackerError::NotFound(_))
        ));
    }
}
