//! Collaborator interfaces: the record store and the blob store.
//!
//! The core only talks to storage through [`RecordStore`] and [`BlobStore`].
//! [`SqliteStore`] implements both for local use and tests.

mod mapping;
#[cfg(test)]
pub(crate) mod memory;
mod queries;
mod schema;
mod sqlite;

pub use mapping::*;
pub use queries::*;
pub use schema::*;
pub use sqlite::*;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Table names.
pub mod tables {
    pub const LOANS: &str = "loans";
    pub const MAINTENANCE: &str = "maintenance";
    pub const CATALOG: &str = "inventory_catalog";
    pub const EVENTS: &str = "events";
}

/// Storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Missing required field {field} in {table} record")]
    MissingField { table: &'static str, field: &'static str },

    #[error("Invalid value for {field} in {table} record: {reason}")]
    InvalidField {
        table: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("Object already exists: {0}")]
    Conflict(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A flat record: column name → scalar (dates travel as strings).
pub type Record = serde_json::Map<String, Value>;

/// Row filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value` (`IS NULL` for a null value)
    Eq(String, Value),
    /// Case-insensitive pattern match; `%` matches any run of characters
    ILike(String, String),
}

/// Result ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// A filterable select over one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    /// Empty means every column
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Query {
    /// `columns` is a comma-separated list, or `*`.
    pub fn select(table: &str, columns: &str) -> Self {
        let columns = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "*")
            .map(String::from)
            .collect();
        Self {
            table: table.to_string(),
            columns,
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        self.filters
            .push(Filter::ILike(column.to_string(), pattern.to_string()));
        self
    }

    pub fn order(mut self, column: &str, descending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending,
        });
        self
    }
}

/// Record-query collaborator.
pub trait RecordStore {
    /// Rows matching the query.
    fn fetch(&self, query: &Query) -> StoreResult<Vec<Record>>;

    /// Exact number of rows matching the query's filters.
    fn count(&self, query: &Query) -> StoreResult<u64>;

    /// Insert rows in one batch; returns the stored rows.
    fn insert(&self, table: &str, rows: &[Record]) -> StoreResult<Vec<Record>>;

    /// Update rows matching every filter; returns the number changed.
    fn update(&self, table: &str, values: &Record, filters: &[Filter]) -> StoreResult<usize>;
}

/// Blob listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobEntry {
    /// Name relative to the listed prefix
    pub name: String,
    /// Last modification, RFC 3339
    pub last_modified: String,
}

/// Blob-store collaborator. Paths are slash-delimited keys.
pub trait BlobStore {
    /// Store `bytes` at `path`. Without `upsert`, an existing object is a
    /// [`StoreError::Conflict`].
    fn upload(&self, path: &str, bytes: &[u8], content_type: &str, upsert: bool) -> StoreResult<()>;

    /// Object contents, `None` when absent.
    fn download(&self, path: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Objects directly or transitively under `prefix`.
    fn list(&self, prefix: &str) -> StoreResult<Vec<BlobEntry>>;

    /// Delete objects; returns how many existed.
    fn remove(&self, paths: &[&str]) -> StoreResult<usize>;
}
