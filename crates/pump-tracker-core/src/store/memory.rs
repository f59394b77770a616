//! Plain in-memory [`RecordStore`] with none of the SQLite schema's
//! constraints, for exercising the query layer against rows written by
//! other deployments.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value;

use super::{Filter, Query, Record, RecordStore, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    tables: RefCell<HashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table from JSON objects.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.tables.borrow_mut();
        let stored = tables.entry(table.to_string()).or_default();
        for row in rows {
            if let Value::Object(record) = row {
                stored.push(record);
            }
        }
    }
}

fn matches(record: &Record, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, value) => record.get(column).unwrap_or(&Value::Null) == value,
        Filter::ILike(column, pattern) => {
            let needle = pattern.trim_matches('%').to_lowercase();
            record
                .get(column)
                .and_then(Value::as_str)
                .is_some_and(|v| v.to_lowercase().contains(&needle))
        }
    })
}

fn sort_key(record: &Record, column: &str) -> String {
    match record.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

impl RecordStore for MemoryStore {
    fn fetch(&self, query: &Query) -> StoreResult<Vec<Record>> {
        let tables = self.tables.borrow();
        let mut rows: Vec<Record> = tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| matches(r, &query.filters)).cloned().collect())
            .unwrap_or_default();
        if let Some(order) = &query.order {
            rows.sort_by_key(|r| sort_key(r, &order.column));
            if order.descending {
                rows.reverse();
            }
        }
        Ok(rows)
    }

    fn count(&self, query: &Query) -> StoreResult<u64> {
        Ok(self.fetch(query)?.len() as u64)
    }

    fn insert(&self, table: &str, rows: &[Record]) -> StoreResult<Vec<Record>> {
        self.tables
            .borrow_mut()
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows.to_vec())
    }

    fn update(&self, table: &str, values: &Record, filters: &[Filter]) -> StoreResult<usize> {
        let mut tables = self.tables.borrow_mut();
        let mut changed = 0;
        for row in tables.get_mut(table).into_iter().flatten() {
            if matches(row, filters) {
                for (column, value) in values {
                    row.insert(column.clone(), value.clone());
                }
                changed += 1;
            }
        }
        Ok(changed)
    }
}
