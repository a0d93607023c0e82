//! SQLite schema definition.

/// Complete database schema for MDLAB.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Users (patients and staff)
-- ============================================================================

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL CHECK (role IN ('patient', 'medtech', 'pathologist', 'receptionist', 'admin')),
    first_name TEXT,
    last_name TEXT,
    contact_number TEXT,
    age INTEGER,
    sex TEXT,
    address TEXT,                                -- JSON string or object
    patient_id TEXT UNIQUE,                      -- NULL until assigned, never overwritten
    password_hash TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);

-- Patient IDs are write-once
CREATE TRIGGER IF NOT EXISTS users_patient_id_immutable BEFORE UPDATE OF patient_id ON users
WHEN old.patient_id IS NOT NULL AND (new.patient_id IS NULL OR new.patient_id != old.patient_id)
BEGIN
    SELECT RAISE(ABORT, 'patient_id is immutable once assigned');
END;

-- ============================================================================
-- Service Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS services (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    price REAL NOT NULL CHECK (price >= 0),
    duration TEXT,
    description TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_popular INTEGER NOT NULL DEFAULT 0,
    requires_fasting INTEGER NOT NULL DEFAULT 0,
    home_visit_available INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- FTS5 virtual table for full-text search
CREATE VIRTUAL TABLE IF NOT EXISTS services_fts USING fts5(
    name,
    category,
    description,
    content='services',
    content_rowid='rowid'
);

-- Triggers to keep FTS5 in sync with main table
CREATE TRIGGER IF NOT EXISTS services_ai AFTER INSERT ON services BEGIN
    INSERT INTO services_fts(rowid, name, category, description)
    VALUES (new.rowid, new.name, new.category, new.description);
END;

CREATE TRIGGER IF NOT EXISTS services_ad AFTER DELETE ON services BEGIN
    INSERT INTO services_fts(services_fts, rowid, name, category, description)
    VALUES ('delete', old.rowid, old.name, old.category, old.description);
END;

CREATE TRIGGER IF NOT EXISTS services_au AFTER UPDATE ON services BEGIN
    INSERT INTO services_fts(services_fts, rowid, name, category, description)
    VALUES ('delete', old.rowid, old.name, old.category, old.description);
    INSERT INTO services_fts(rowid, name, category, description)
    VALUES (new.rowid, new.name, new.category, new.description);
END;

CREATE INDEX IF NOT EXISTS idx_services_active ON services(is_active);

-- ============================================================================
-- Appointments
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    appointment_code TEXT NOT NULL UNIQUE,
    patient_user_id TEXT REFERENCES users(id),
    patient TEXT NOT NULL,                       -- JSON PatientSnapshot
    services TEXT NOT NULL CHECK (services != '[]'), -- JSON array of ServiceSnapshot
    service_name TEXT NOT NULL,
    total_price REAL NOT NULL CHECK (total_price >= 0),
    appointment_date TEXT NOT NULL,              -- YYYY-MM-DD
    appointment_time TEXT NOT NULL,
    appointment_type TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'regular',
    notes TEXT,
    reason_for_visit TEXT,
    status TEXT NOT NULL,
    status_history TEXT NOT NULL DEFAULT '[]',   -- JSON array of StatusChange
    submitted_by TEXT,
    checked_in_at TEXT,
    sample_collected_at TEXT,
    completed_at TEXT,
    cancelled_at TEXT,
    cancellation_reason TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status);
CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_user_id);
CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(appointment_date);
"#;
