//! SQLite schema definition.

/// Complete database schema for the pump tracker.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Loans ("comodato")
-- ============================================================================

CREATE TABLE IF NOT EXISTS loans (
    id TEXT PRIMARY KEY,
    serial TEXT NOT NULL,
    hospital TEXT,
    patient TEXT,
    physician TEXT,
    insurer TEXT,
    order_ref TEXT,
    invoice_ref TEXT,
    registration_date TEXT,                      -- YYYY-MM-DD
    departure_date TEXT,                         -- YYYY-MM-DD
    period_days INTEGER,
    status TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    branch TEXT NOT NULL,
    return_date TEXT,
    return_invoice TEXT
);

-- At most one active loan per serial
CREATE UNIQUE INDEX IF NOT EXISTS idx_loans_active_serial ON loans(serial) WHERE active = 1;
CREATE INDEX IF NOT EXISTS idx_loans_branch ON loans(branch, active);

-- ============================================================================
-- Maintenance
-- ============================================================================

CREATE TABLE IF NOT EXISTS maintenance (
    id TEXT PRIMARY KEY,
    serial TEXT NOT NULL,
    defect TEXT,
    registration_date TEXT,
    invoice_number TEXT,
    status TEXT NOT NULL CHECK (status IN ('in_maintenance', 'returned')),
    branch TEXT NOT NULL
);

-- At most one open maintenance record per serial
CREATE UNIQUE INDEX IF NOT EXISTS idx_maintenance_open_serial
    ON maintenance(serial) WHERE status = 'in_maintenance';
CREATE INDEX IF NOT EXISTS idx_maintenance_branch ON maintenance(branch, status);

-- ============================================================================
-- Inventory Catalog (maintained outside the core)
-- ============================================================================

CREATE TABLE IF NOT EXISTS inventory_catalog (
    serial TEXT PRIMARY KEY,
    model TEXT,
    last_maintenance TEXT,
    maintenance_due TEXT
);

-- ============================================================================
-- Audit Log (append-only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    occurred_at TEXT NOT NULL,
    description TEXT NOT NULL,
    branch TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_occurred ON events(occurred_at);

-- ============================================================================
-- Blob Store
-- ============================================================================

CREATE TABLE IF NOT EXISTS blobs (
    path TEXT PRIMARY KEY,
    content BLOB NOT NULL,
    content_type TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
