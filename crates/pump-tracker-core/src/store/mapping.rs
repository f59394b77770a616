//! Conversions between store records and domain models.
//!
//! Reads fail fast on a missing required field. Optional columns tolerate
//! nulls, blanks and malformed dates (which become `None` with a warning).

use serde_json::Value;

use super::{tables, Record, StoreError, StoreResult};
use crate::lifecycle::{format_store_date, parse_date, parse_instant, LoanPeriod, LoanStatus};
use crate::models::{CatalogEntry, EventRecord, LoanRecord, MaintenanceRecord, MaintenanceStatus};

/// Typed accessors over one record.
struct Fields<'a> {
    table: &'static str,
    record: &'a Record,
}

impl<'a> Fields<'a> {
    fn new(table: &'static str, record: &'a Record) -> Self {
        Self { table, record }
    }

    /// Scalar as text; numbers are rendered (serials are sometimes numeric).
    fn text(&self, field: &str) -> Option<String> {
        match self.record.get(field)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn required_text(&self, field: &'static str) -> StoreResult<String> {
        self.text(field).ok_or(StoreError::MissingField {
            table: self.table,
            field,
        })
    }

    fn date(&self, field: &str) -> Option<chrono::NaiveDate> {
        match self.record.get(field)? {
            Value::String(s) => parse_date(s),
            _ => None,
        }
    }

    fn flag(&self, field: &'static str) -> StoreResult<bool> {
        match self.record.get(field) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                other => Err(StoreError::InvalidField {
                    table: self.table,
                    field,
                    reason: format!("not a boolean: {other:?}"),
                }),
            },
            _ => Err(StoreError::MissingField {
                table: self.table,
                field,
            }),
        }
    }

    fn period(&self, field: &str) -> Option<LoanPeriod> {
        match self.record.get(field)? {
            Value::Number(n) => Some(match n.as_i64() {
                Some(days) => LoanPeriod::Days(days),
                None => LoanPeriod::Text(n.to_string()),
            }),
            Value::String(s) => Some(LoanPeriod::Text(s.clone())),
            _ => None,
        }
    }
}

impl TryFrom<&Record> for LoanRecord {
    type Error = StoreError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let f = Fields::new(tables::LOANS, record);
        Ok(LoanRecord {
            id: f.required_text("id")?,
            serial: f.required_text("serial")?,
            hospital: f.text("hospital"),
            patient: f.text("patient"),
            physician: f.text("physician"),
            insurer: f.text("insurer"),
            order_ref: f.text("order_ref"),
            invoice_ref: f.text("invoice_ref"),
            registration_date: f.date("registration_date"),
            departure_date: f.date("departure_date"),
            period: f.period("period_days"),
            // Unknown labels are dropped; status is derived again on read
            status: f.text("status").as_deref().and_then(LoanStatus::parse),
            active: f.flag("active")?,
            branch: f.required_text("branch")?,
            return_date: f.date("return_date"),
            return_invoice: f.text("return_invoice"),
        })
    }
}

impl TryFrom<&Record> for MaintenanceRecord {
    type Error = StoreError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let f = Fields::new(tables::MAINTENANCE, record);
        let raw_status = f.required_text("status")?;
        let status = MaintenanceStatus::parse(&raw_status).ok_or_else(|| StoreError::InvalidField {
            table: tables::MAINTENANCE,
            field: "status",
            reason: format!("unknown status {raw_status:?}"),
        })?;

        Ok(MaintenanceRecord {
            id: f.required_text("id")?,
            serial: f.required_text("serial")?,
            defect: f.text("defect"),
            registration_date: f.date("registration_date"),
            invoice_number: f.text("invoice_number"),
            status,
            branch: f.required_text("branch")?,
        })
    }
}

impl TryFrom<&Record> for CatalogEntry {
    type Error = StoreError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let f = Fields::new(tables::CATALOG, record);
        Ok(CatalogEntry {
            serial: f.required_text("serial")?,
            model: f.text("model"),
            last_maintenance: f.date("last_maintenance"),
            maintenance_due: f.date("maintenance_due"),
        })
    }
}

impl TryFrom<&Record> for EventRecord {
    type Error = StoreError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let f = Fields::new(tables::EVENTS, record);
        let raw = f.required_text("occurred_at")?;
        let occurred_at = parse_instant(&raw).ok_or_else(|| StoreError::InvalidField {
            table: tables::EVENTS,
            field: "occurred_at",
            reason: format!("not an ISO-8601 instant: {raw:?}"),
        })?;

        Ok(EventRecord {
            occurred_at,
            description: f.required_text("description")?,
            branch: f.text("branch"),
        })
    }
}

/// Map every record, failing on the first bad one.
pub fn map_records<T>(records: &[Record]) -> StoreResult<Vec<T>>
where
    T: for<'r> TryFrom<&'r Record, Error = StoreError>,
{
    records.iter().map(T::try_from).collect()
}

fn opt_text(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn opt_date(value: Option<chrono::NaiveDate>) -> Value {
    value
        .map(|d| Value::String(format_store_date(d)))
        .unwrap_or(Value::Null)
}

fn period_value(period: &Option<LoanPeriod>) -> Value {
    match period {
        Some(LoanPeriod::Days(n)) => Value::from(*n),
        Some(LoanPeriod::Text(s)) => Value::String(s.clone()),
        None => Value::Null,
    }
}

/// Store record for a loan.
pub fn loan_to_record(loan: &LoanRecord) -> Record {
    let mut r = Record::new();
    r.insert("id".into(), Value::String(loan.id.clone()));
    r.insert("serial".into(), Value::String(loan.serial.clone()));
    r.insert("hospital".into(), opt_text(&loan.hospital));
    r.insert("patient".into(), opt_text(&loan.patient));
    r.insert("physician".into(), opt_text(&loan.physician));
    r.insert("insurer".into(), opt_text(&loan.insurer));
    r.insert("order_ref".into(), opt_text(&loan.order_ref));
    r.insert("invoice_ref".into(), opt_text(&loan.invoice_ref));
    r.insert("registration_date".into(), opt_date(loan.registration_date));
    r.insert("departure_date".into(), opt_date(loan.departure_date));
    r.insert("period_days".into(), period_value(&loan.period));
    r.insert(
        "status".into(),
        loan.status
            .map(|s| Value::String(s.as_str().to_string()))
            .unwrap_or(Value::Null),
    );
    r.insert("active".into(), Value::Bool(loan.active));
    r.insert("branch".into(), Value::String(loan.branch.clone()));
    r.insert("return_date".into(), opt_date(loan.return_date));
    r.insert("return_invoice".into(), opt_text(&loan.return_invoice));
    r
}

/// Store record for a maintenance intake.
pub fn maintenance_to_record(record: &MaintenanceRecord) -> Record {
    let mut r = Record::new();
    r.insert("id".into(), Value::String(record.id.clone()));
    r.insert("serial".into(), Value::String(record.serial.clone()));
    r.insert("defect".into(), opt_text(&record.defect));
    r.insert("registration_date".into(), opt_date(record.registration_date));
    r.insert("invoice_number".into(), opt_text(&record.invoice_number));
    r.insert("status".into(), Value::String(record.status.as_str().to_string()));
    r.insert("branch".into(), Value::String(record.branch.clone()));
    r
}

/// Store record for a catalog entry.
pub fn catalog_to_record(entry: &CatalogEntry) -> Record {
    let mut r = Record::new();
    r.insert("serial".into(), Value::String(entry.serial.clone()));
    r.insert("model".into(), opt_text(&entry.model));
    r.insert("last_maintenance".into(), opt_date(entry.last_maintenance));
    r.insert("maintenance_due".into(), opt_date(entry.maintenance_due));
    r
}

/// Store record for an audit event.
pub fn event_to_record(event: &EventRecord) -> Record {
    let mut r = Record::new();
    r.insert("occurred_at".into(), Value::String(event.occurred_at.to_rfc3339()));
    r.insert("description".into(), Value::String(event.description.clone()));
    r.insert("branch".into(), opt_text(&event.branch));
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_loan_from_record() {
        let r = record(json!({
            "id": "abc",
            "serial": "SN1",
            "hospital": "",
            "departure_date": "2024-01-01",
            "period_days": 30,
            "status": "Fora Prazo",
            "active": 1,
            "branch": "GOIANIA",
            "return_date": "not a date"
        }));
        let loan = LoanRecord::try_from(&r).unwrap();

        assert_eq!(loan.hospital, None);
        assert_eq!(loan.departure_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(loan.period, Some(LoanPeriod::Days(30)));
        assert_eq!(loan.status, Some(LoanStatus::Overdue));
        assert!(loan.active);
        assert_eq!(loan.return_date, None);
    }

    #[test]
    fn test_loan_text_period_kept() {
        let r = record(json!({
            "id": "1", "serial": "SN1", "active": true, "branch": "CUIABA", "period_days": "abc"
        }));
        let loan = LoanRecord::try_from(&r).unwrap();
        assert_eq!(loan.period, Some(LoanPeriod::Text("abc".into())));
    }

    #[test]
    fn test_loan_missing_serial_fails() {
        let r = record(json!({"id": "1", "active": true, "branch": "CUIABA"}));
        let err = LoanRecord::try_from(&r).unwrap_err();
        assert!(matches!(
            err,
            StoreError::MissingField { table: "loans", field: "serial" }
        ));
    }

    #[test]
    fn test_maintenance_status_legacy_label() {
        let r = record(json!({
            "id": "1", "serial": "SN1", "status": "Em Manutenção", "branch": "BRASILIA"
        }));
        let m = MaintenanceRecord::try_from(&r).unwrap();
        assert!(m.is_open());

        let bad = record(json!({"id": "1", "serial": "SN1", "status": "lost", "branch": "BRASILIA"}));
        assert!(matches!(
            MaintenanceRecord::try_from(&bad),
            Err(StoreError::InvalidField { field: "status", .. })
        ));
    }

    #[test]
    fn test_numeric_catalog_serial() {
        let r = record(json!({"serial": 12345, "model": "ULTA"}));
        let entry = CatalogEntry::try_from(&r).unwrap();
        assert_eq!(entry.serial, "12345");
        assert_eq!(entry.maintenance_due, None);
    }

    #[test]
    fn test_event_instant() {
        let r = record(json!({"occurred_at": "2024-03-01T10:00:00Z", "description": "X"}));
        let event = EventRecord::try_from(&r).unwrap();
        assert_eq!(event.occurred_at.to_rfc3339(), "2024-03-01T10:00:00+00:00");

        let bad = record(json!({"occurred_at": "yesterday", "description": "X"}));
        assert!(EventRecord::try_from(&bad).is_err());
    }

    #[test]
    fn test_loan_record_round_trip() {
        let loan = LoanRecord {
            id: "1".into(),
            serial: "SN1".into(),
            hospital: Some("HOSPITAL".into()),
            patient: None,
            physician: None,
            insurer: None,
            order_ref: None,
            invoice_ref: None,
            registration_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            departure_date: NaiveDate::from_ymd_opt(2024, 1, 2),
            period: Some(LoanPeriod::Days(15)),
            status: Some(LoanStatus::OnTime),
            active: true,
            branch: "GOIANIA".into(),
            return_date: None,
            return_invoice: None,
        };
        let r = loan_to_record(&loan);
        assert_eq!(r["departure_date"], json!("2024-01-02"));
        assert_eq!(r["status"], json!("on_time"));
        assert_eq!(LoanRecord::try_from(&r).unwrap(), loan);
    }
}
