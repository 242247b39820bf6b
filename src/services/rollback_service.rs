use std::path::PathBuf;

use rusqlite::Connection;
use tracing::{error, info};

use crate::data::repository;
use crate::error::AppError;
use crate::models::operation::{OperationRecord, OperationType};
use crate::services::file_service::FileRelocator;

/// How to undo one mutation that already landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    /// Put a moved or renamed file back where it came from.
    RestoreFile { current: PathBuf, original: PathBuf },
    /// Nothing can be done automatically; rolling back only reports it.
    Irreversible { target: String, description: String },
}

#[derive(Debug)]
struct Entry {
    record: OperationRecord,
    compensation: Compensation,
}

/// Executed mutations for one file, newest last. Consumed by either
/// `commit` or `rollback`.
#[derive(Debug)]
pub struct CompensationStack {
    run_id: String,
    entries: Vec<Entry>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub reverted: Vec<String>,
    pub irreversible: Vec<String>,
    pub failed: Vec<String>,
}

impl RollbackReport {
    pub fn needs_manual_intervention(&self) -> bool {
        !self.irreversible.is_empty() || !self.failed.is_empty()
    }

    /// Operation ids whose compensation ran successfully.
    pub fn compensated_ids(&self) -> &[String] {
        &self.reverted
    }
}

impl CompensationStack {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            entries: Vec::new(),
        }
    }

    /// Register a mutation that has just succeeded. Returns the journal row
    /// describing it.
    pub fn push(
        &mut self,
        operation_type: OperationType,
        target: &str,
        metadata: Option<serde_json::Value>,
        compensation: Compensation,
    ) -> OperationRecord {
        let record = OperationRecord {
            operation_id: uuid::Uuid::new_v4().to_string(),
            run_id: self.run_id.clone(),
            operation_type,
            target: target.to_string(),
            metadata,
            executed_at: chrono::Utc::now().to_rfc3339(),
            compensated: false,
        };
        self.entries.push(Entry {
            record: record.clone(),
            compensation,
        });
        record
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Everything landed; nothing to undo.
    pub fn commit(self) -> usize {
        self.entries.len()
    }

    /// Undo in reverse order of execution. Keeps going past failures so
    /// every entry is either reverted or reported.
    pub fn rollback(self, files: &dyn FileRelocator) -> RollbackReport {
        let mut report = RollbackReport::default();

        for entry in self.entries.into_iter().rev() {
            let op_id = entry.record.operation_id;
            match entry.compensation {
                Compensation::RestoreFile { current, original } => {
                    match files.move_file(&current, &original) {
                        Ok(()) => {
                            info!(
                                run_id = %self.run_id,
                                from = %current.display(),
                                to = %original.display(),
                                "file restored"
                            );
                            report.reverted.push(op_id);
                        }
                        Err(e) => {
                            error!(
                                run_id = %self.run_id,
                                from = %current.display(),
                                to = %original.display(),
                                error = %e,
                                "manual intervention required: file could not be restored"
                            );
                            report.failed.push(op_id);
                        }
                    }
                }
                Compensation::Irreversible {
                    target,
                    description,
                } => {
                    error!(
                        run_id = %self.run_id,
                        target = %target,
                        "manual intervention required: {description}"
                    );
                    report.irreversible.push(op_id);
                }
            }
        }

        report
    }
}

pub fn record_operation(conn: &Connection, record: &OperationRecord) -> Result<(), AppError> {
    repository::insert_operation(conn, record)?;
    Ok(())
}

pub fn mark_compensated(conn: &Connection, report: &RollbackReport) -> Result<(), AppError> {
    for id in report.compensated_ids() {
        repository::mark_compensated(conn, id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::migrations;
    use crate::services::file_service::LocalFiles;
    use std::fs::{self, File};
    use std::io::Write;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mailroom_rollback_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_rollback_restores_moved_file() {
        let base = temp_dir("restore");
        let original = base.join("scan.pdf");
        let moved = base.join("filed.pdf");
        File::create(&original).unwrap().write_all(b"%PDF").unwrap();
        fs::rename(&original, &moved).unwrap();

        let mut stack = CompensationStack::new("run-1");
        stack.push(
            OperationType::Move,
            &moved.to_string_lossy(),
            None,
            Compensation::RestoreFile {
                current: moved.clone(),
                original: original.clone(),
            },
        );
        let report = stack.rollback(&LocalFiles);

        assert!(original.exists());
        assert!(!moved.exists());
        assert_eq!(report.reverted.len(), 1);
        assert!(!report.needs_manual_intervention());
        let _ = fs::remove_dir_all(&base);
    }

    #[test]
    fn test_irreversible_entry_flags_manual_intervention() {
        let base = temp_dir("irreversible");
        let original = base.join("scan.pdf");
        let moved = base.join("filed.pdf");
        File::create(&moved).unwrap().write_all(b"%PDF").unwrap();

        let mut stack = CompensationStack::new("run-2");
        let record_op = stack.push(
            OperationType::RecordUpdate,
            "rec123",
            None,
            Compensation::Irreversible {
                target: "rec123".into(),
                description: "record update cannot be reverted".into(),
            },
        );
        let move_op = stack.push(
            OperationType::Move,
            &moved.to_string_lossy(),
            None,
            Compensation::RestoreFile {
                current: moved.clone(),
                original: original.clone(),
            },
        );
        assert_eq!(stack.len(), 2);

        let report = stack.rollback(&LocalFiles);
        assert_eq!(report.reverted, vec![move_op.operation_id]);
        assert_eq!(report.irreversible, vec![record_op.operation_id]);
        assert!(report.needs_manual_intervention());
        assert!(original.exists());
        let _ = fs::remove_dir_all(&base);
    }

    #[test]
    fn test_failed_restore_is_reported() {
        let base = temp_dir("failed_restore");
        let mut stack = CompensationStack::new("run-3");
        stack.push(
            OperationType::Rename,
            "ghost",
            None,
            Compensation::RestoreFile {
                current: base.join("ghost.pdf"),
                original: base.join("scan.pdf"),
            },
        );
        let report = stack.rollback(&LocalFiles);
        assert_eq!(report.failed.len(), 1);
        assert!(report.needs_manual_intervention());
        let _ = fs::remove_dir_all(&base);
    }

    #[test]
    fn test_commit_discards_entries() {
        let mut stack = CompensationStack::new("run-4");
        assert!(stack.is_empty());
        stack.push(
            OperationType::RecordUpdate,
            "rec1",
            None,
            Compensation::Irreversible {
                target: "rec1".into(),
                description: "n/a".into(),
            },
        );
        assert_eq!(stack.commit(), 1);
    }

    #[test]
    fn test_journal_marks_compensated() {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();

        let mut stack = CompensationStack::new("run-5");
        let record = stack.push(
            OperationType::Move,
            "/scans/a.pdf",
            Some(serde_json::json!({"destination": "/clients/a.pdf"})),
            Compensation::RestoreFile {
                current: PathBuf::from("/clients/a.pdf"),
                original: PathBuf::from("/scans/a.pdf"),
            },
        );
        record_operation(&conn, &record).unwrap();

        let report = RollbackReport {
            reverted: vec![record.operation_id.clone()],
            ..Default::default()
        };
        mark_compensated(&conn, &report).unwrap();

        let ops = repository::list_operations(&conn, "run-5").unwrap();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].compensated);
        assert_eq!(ops[0].operation_type, OperationType::Move);
    }
}
