//! SQLite implementation of both collaborator interfaces.

use std::path::Path;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde_json::Value;

use super::{
    BlobEntry, BlobStore, Filter, Query, Record, RecordStore, StoreError, StoreResult, SCHEMA,
};

/// SQLite-backed record and blob store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// Initialize schema.
    fn initialize(&self) -> StoreResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl RecordStore for SqliteStore {
    fn fetch(&self, query: &Query) -> StoreResult<Vec<Record>> {
        let columns = if query.columns.is_empty() {
            "*".to_string()
        } else {
            query
                .columns
                .iter()
                .map(|c| quoted(c))
                .collect::<StoreResult<Vec<_>>>()?
                .join(", ")
        };

        let mut bound = Vec::new();
        let mut sql = format!("SELECT {} FROM {}", columns, quoted(&query.table)?);
        sql.push_str(&where_clause(&query.filters, &mut bound)?);
        if let Some(order) = &query.order {
            sql.push_str(&format!(
                " ORDER BY {} {}",
                quoted(&order.column)?,
                if order.descending { "DESC" } else { "ASC" }
            ));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let names = column_names(&stmt);
        let rows = stmt.query_map(params_from_iter(bound.iter()), |row| row_to_record(row, &names))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn count(&self, query: &Query) -> StoreResult<u64> {
        let mut bound = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", quoted(&query.table)?);
        sql.push_str(&where_clause(&query.filters, &mut bound)?);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bound.iter()), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn insert(&self, table: &str, rows: &[Record]) -> StoreResult<Vec<Record>> {
        let table = quoted(table)?;
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = Vec::with_capacity(rows.len());

        for row in rows {
            let sql = if row.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table)
            } else {
                let columns = row
                    .keys()
                    .map(|c| quoted(c))
                    .collect::<StoreResult<Vec<_>>>()?;
                let placeholders = vec!["?"; columns.len()].join(", ");
                format!(
                    "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                    table,
                    columns.join(", "),
                    placeholders
                )
            };
            let bound: Vec<SqlValue> = row.values().map(to_sql_value).collect();

            let mut stmt = tx.prepare(&sql)?;
            let names = column_names(&stmt);
            let record = stmt
                .query_row(params_from_iter(bound.iter()), |r| row_to_record(r, &names))
                .map_err(constraint_aware)?;
            inserted.push(record);
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn update(&self, table: &str, values: &Record, filters: &[Filter]) -> StoreResult<usize> {
        if values.is_empty() {
            return Ok(0);
        }

        let mut bound: Vec<SqlValue> = Vec::new();
        let mut assignments = Vec::with_capacity(values.len());
        for (column, value) in values {
            assignments.push(format!("{} = ?", quoted(column)?));
            bound.push(to_sql_value(value));
        }

        let mut sql = format!("UPDATE {} SET {}", quoted(table)?, assignments.join(", "));
        sql.push_str(&where_clause(filters, &mut bound)?);

        self.conn
            .execute(&sql, params_from_iter(bound.iter()))
            .map_err(constraint_aware)
    }
}

impl BlobStore for SqliteStore {
    fn upload(&self, path: &str, bytes: &[u8], content_type: &str, upsert: bool) -> StoreResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        if upsert {
            self.conn.execute(
                r#"
                INSERT INTO blobs (path, content, content_type, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(path) DO UPDATE SET
                    content = excluded.content,
                    content_type = excluded.content_type,
                    updated_at = excluded.updated_at
                "#,
                params![path, bytes, content_type, now],
            )?;
        } else {
            self.conn
                .execute(
                    "INSERT INTO blobs (path, content, content_type, updated_at) VALUES (?1, ?2, ?3, ?4)",
                    params![path, bytes, content_type, now],
                )
                .map_err(|e| match constraint_aware(e) {
                    StoreError::Constraint(_) => StoreError::Conflict(path.to_string()),
                    other => other,
                })?;
        }
        Ok(())
    }

    fn download(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        self.conn
            .query_row("SELECT content FROM blobs WHERE path = ?", [path], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<BlobEntry>> {
        let folder = prefix.trim_end_matches('/');
        let folder = if folder.is_empty() {
            String::new()
        } else {
            format!("{}/", folder)
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT path, updated_at FROM blobs
            WHERE substr(path, 1, length(?1)) = ?1
            ORDER BY path
            "#,
        )?;
        let rows = stmt.query_map([&folder], |row| {
            let path: String = row.get(0)?;
            Ok(BlobEntry {
                name: path[folder.len()..].to_string(),
                last_modified: row.get(1)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn remove(&self, paths: &[&str]) -> StoreResult<usize> {
        let mut removed = 0;
        for path in paths {
            removed += self.conn.execute("DELETE FROM blobs WHERE path = ?", [path])?;
        }
        Ok(removed)
    }
}

/// Validate and quote an identifier for interpolation into SQL.
fn quoted(name: &str) -> StoreResult<String> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

fn where_clause(filters: &[Filter], bound: &mut Vec<SqlValue>) -> StoreResult<String> {
    if filters.is_empty() {
        return Ok(String::new());
    }

    let mut clauses = Vec::with_capacity(filters.len());
    for filter in filters {
        match filter {
            Filter::Eq(column, Value::Null) => {
                clauses.push(format!("{} IS NULL", quoted(column)?));
            }
            Filter::Eq(column, value) => {
                clauses.push(format!("{} = ?", quoted(column)?));
                bound.push(to_sql_value(value));
            }
            // SQLite LIKE is case-insensitive for ASCII
            Filter::ILike(column, pattern) => {
                clauses.push(format!("{} LIKE ?", quoted(column)?));
                bound.push(SqlValue::Text(pattern.clone()));
            }
        }
    }
    Ok(format!(" WHERE {}", clauses.join(" AND ")))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

fn row_to_record(row: &Row<'_>, names: &[String]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (i, name) in names.iter().enumerate() {
        record.insert(name.clone(), from_sql_ref(row.get_ref(i)?));
    }
    Ok(record)
}

fn constraint_aware(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Constraint(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        _ => StoreError::Sqlite(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tables;
    use serde_json::json;

    fn setup_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn seed_loans(store: &SqliteStore) {
        store
            .insert(
                tables::LOANS,
                &[
                    record(json!({"id": "1", "serial": "SN1", "hospital": "Santa Casa", "active": true, "branch": "GOIANIA"})),
                    record(json!({"id": "2", "serial": "SN2", "hospital": "HOSPITAL BASE", "active": true, "branch": "BRASILIA"})),
                    record(json!({"id": "3", "serial": "SN3", "hospital": "santa luzia", "active": false, "branch": "GOIANIA"})),
                ],
            )
            .unwrap();
    }

    #[test]
    fn test_insert_returns_rows() {
        let store = setup_store();
        let rows = store
            .insert(
                tables::LOANS,
                &[record(json!({"id": "1", "serial": "SN1", "active": true, "branch": "CUIABA", "period_days": 30}))],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["serial"], json!("SN1"));
        assert_eq!(rows[0]["active"], json!(1));
        assert_eq!(rows[0]["period_days"], json!(30));
        assert_eq!(rows[0]["hospital"], Value::Null);
    }

    #[test]
    fn test_fetch_with_filters() {
        let store = setup_store();
        seed_loans(&store);

        let active = store
            .fetch(&Query::select(tables::LOANS, "id, serial").eq("active", true))
            .unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].len(), 2);

        let santa = store
            .fetch(&Query::select(tables::LOANS, "*").ilike("hospital", "%SANTA%").order("serial", true))
            .unwrap();
        assert_eq!(santa.len(), 2);
        assert_eq!(santa[0]["serial"], json!("SN3"));
    }

    #[test]
    fn test_count() {
        let store = setup_store();
        seed_loans(&store);

        let q = Query::select(tables::LOANS, "id").eq("active", true).eq("branch", "GOIANIA");
        assert_eq!(store.count(&q).unwrap(), 1);
        assert_eq!(store.count(&Query::select(tables::LOANS, "id")).unwrap(), 3);
    }

    #[test]
    fn test_update() {
        let store = setup_store();
        seed_loans(&store);

        let changed = store
            .update(
                tables::LOANS,
                &record(json!({"active": false, "status": "returned"})),
                &[Filter::Eq("id".into(), json!("1"))],
            )
            .unwrap();
        assert_eq!(changed, 1);

        let q = Query::select(tables::LOANS, "id").eq("active", true);
        assert_eq!(store.count(&q).unwrap(), 1);
    }

    #[test]
    fn test_constraint_violation_mapped() {
        let store = setup_store();
        seed_loans(&store);

        let err = store
            .insert(
                tables::LOANS,
                &[record(json!({"id": "9", "serial": "SN1", "active": true, "branch": "CUIABA"}))],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn test_batch_insert_is_atomic() {
        let store = setup_store();
        let result = store.insert(
            tables::EVENTS,
            &[
                record(json!({"occurred_at": "2024-01-01T00:00:00+00:00", "description": "A"})),
                record(json!({"description": "missing timestamp"})),
            ],
        );
        assert!(result.is_err());
        assert_eq!(store.count(&Query::select(tables::EVENTS, "id")).unwrap(), 0);
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        let store = setup_store();
        let q = Query::select("loans; DROP TABLE loans", "*");
        assert!(matches!(store.fetch(&q), Err(StoreError::InvalidIdentifier(_))));

        let q = Query::select(tables::LOANS, "*").eq("serial\"--", "x");
        assert!(matches!(store.fetch(&q), Err(StoreError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_blob_round_trip() {
        let store = setup_store();
        store.upload("analise/report.csv", b"a,b\n1,2\n", "text/csv", false).unwrap();

        let bytes = store.download("analise/report.csv").unwrap().unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");
        assert!(store.download("analise/missing.csv").unwrap().is_none());
    }

    #[test]
    fn test_blob_upsert_flag() {
        let store = setup_store();
        store.upload("nfs/a.pdf", b"1", "application/pdf", false).unwrap();

        let err = store.upload("nfs/a.pdf", b"2", "application/pdf", false).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store.upload("nfs/a.pdf", b"2", "application/pdf", true).unwrap();
        assert_eq!(store.download("nfs/a.pdf").unwrap().unwrap(), b"2");
    }

    #[test]
    fn test_blob_list_and_remove() {
        let store = setup_store();
        store.upload("analise/a.csv", b"1", "text/csv", false).unwrap();
        store.upload("analise/b.csv", b"2", "text/csv", false).unwrap();
        store.upload("analise2/c.csv", b"3", "text/csv", false).unwrap();

        let listed = store.list("analise").unwrap();
        let names: Vec<_> = listed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        assert!(!listed[0].last_modified.is_empty());

        assert_eq!(store.remove(&["analise/a.csv", "analise/zzz.csv"]).unwrap(), 1);
        assert_eq!(store.list("analise/").unwrap().len(), 1);
    }
}
