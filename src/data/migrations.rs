use rusqlite::Connection;

use crate::error::AppError;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    outcome TEXT NOT NULL,
    document_type TEXT,
    confidence REAL,
    reason TEXT,
    case_id TEXT,
    client_name TEXT,
    new_path TEXT,
    failure_kind TEXT,
    failure_detail TEXT,
    manual_intervention BOOLEAN DEFAULT 0,
    processed_on TEXT NOT NULL,
    recorded_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_audit_day ON audit_log(processed_on);
CREATE INDEX IF NOT EXISTS idx_audit_file ON audit_log(file_name);

CREATE TABLE IF NOT EXISTS operation_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_id TEXT UNIQUE NOT NULL,
    run_id TEXT NOT NULL,
    operation_type TEXT NOT NULL,
    target TEXT NOT NULL,
    metadata TEXT,
    executed_at TEXT DEFAULT CURRENT_TIMESTAMP,
    compensated BOOLEAN DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_operation_run ON operation_log(run_id);

CREATE TABLE IF NOT EXISTS corrections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name TEXT NOT NULL,
    original_type TEXT,
    corrected_type TEXT NOT NULL,
    note TEXT,
    corrected_at TEXT DEFAULT CURRENT_TIMESTAMP
);
";

pub fn run_migrations(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch(SCHEMA_V1)?;
    Ok(())
}
