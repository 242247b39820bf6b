use rusqlite::{params, Connection, Row};

use crate::error::AppError;
use crate::models::audit::{AuditEntry, Correction};
use crate::models::document::DocumentType;
use crate::models::operation::{OperationRecord, OperationType};
use crate::models::processing::Outcome;

const AUDIT_COLUMNS: &str = "run_id, file_name, file_path, outcome, document_type, confidence, reason, case_id, client_name, new_path, failure_kind, failure_detail, manual_intervention, processed_on, recorded_at";

pub fn insert_audit(conn: &Connection, entry: &AuditEntry) -> Result<i64, AppError> {
    conn.execute(
        &format!(
            "INSERT INTO audit_log ({AUDIT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            entry.run_id,
            entry.file_name,
            entry.file_path,
            entry.outcome.as_str(),
            entry.document_type.map(|t| t.label()),
            entry.confidence,
            entry.reason,
            entry.case_id,
            entry.client_name,
            entry.new_path,
            entry.failure_kind,
            entry.failure_detail,
            entry.manual_intervention,
            entry.processed_on,
            entry.recorded_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn audit_from_row(row: &Row) -> rusqlite::Result<AuditEntry> {
    let outcome: String = row.get(3)?;
    let document_type: Option<String> = row.get(4)?;
    Ok(AuditEntry {
        run_id: row.get(0)?,
        file_name: row.get(1)?,
        file_path: row.get(2)?,
        outcome: Outcome::parse(&outcome).unwrap_or(Outcome::Failed),
        document_type: document_type.and_then(|t| t.parse::<DocumentType>().ok()),
        confidence: row.get(5)?,
        reason: row.get(6)?,
        case_id: row.get(7)?,
        client_name: row.get(8)?,
        new_path: row.get(9)?,
        failure_kind: row.get(10)?,
        failure_detail: row.get(11)?,
        manual_intervention: row.get(12)?,
        processed_on: row.get(13)?,
        recorded_at: row.get(14)?,
    })
}

pub fn list_audit_for_day(conn: &Connection, day: &str) -> Result<Vec<AuditEntry>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AUDIT_COLUMNS} FROM audit_log WHERE processed_on = ?1 ORDER BY id ASC"
    ))?;
    let entries = stmt
        .query_map(params![day], audit_from_row)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(entries)
}

/// Letters that came back `Unknown`, newest first. `day` narrows to one date.
pub fn list_unknown(
    conn: &Connection,
    day: Option<&str>,
    limit: u32,
) -> Result<Vec<AuditEntry>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AUDIT_COLUMNS} FROM audit_log
         WHERE document_type = ?1 AND (?2 IS NULL OR processed_on = ?2)
         ORDER BY id DESC LIMIT ?3"
    ))?;
    let entries = stmt
        .query_map(
            params![DocumentType::Unknown.label(), day, limit],
            audit_from_row,
        )?
        .filter_map(|r| r.ok())
        .collect();
    Ok(entries)
}

pub fn latest_audit_for_file(
    conn: &Connection,
    file_name: &str,
) -> Result<Option<AuditEntry>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AUDIT_COLUMNS} FROM audit_log WHERE file_name = ?1 ORDER BY id DESC LIMIT 1"
    ))?;
    let entry = stmt
        .query_row(params![file_name], audit_from_row)
        .optional()?;
    Ok(entry)
}

pub fn insert_operation(conn: &Connection, record: &OperationRecord) -> Result<i64, AppError> {
    let metadata_json = record
        .metadata
        .as_ref()
        .map(|m| serde_json::to_string(m))
        .transpose()?;

    conn.execute(
        "INSERT INTO operation_log (operation_id, run_id, operation_type, target, metadata, executed_at, compensated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.operation_id,
            record.run_id,
            record.operation_type.to_string(),
            record.target,
            metadata_json,
            record.executed_at,
            record.compensated,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn mark_compensated(conn: &Connection, operation_id: &str) -> Result<usize, AppError> {
    let count = conn.execute(
        "UPDATE operation_log SET compensated = 1 WHERE operation_id = ?1",
        params![operation_id],
    )?;
    Ok(count)
}

pub fn list_operations(conn: &Connection, run_id: &str) -> Result<Vec<OperationRecord>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT operation_id, run_id, operation_type, target, metadata, executed_at, compensated
         FROM operation_log WHERE run_id = ?1 ORDER BY id ASC",
    )?;

    let records = stmt
        .query_map(params![run_id], |row| {
            let op_type_str: String = row.get(2)?;
            let metadata_str: Option<String> = row.get(4)?;

            Ok(OperationRecord {
                operation_id: row.get(0)?,
                run_id: row.get(1)?,
                operation_type: op_type_str
                    .parse::<OperationType>()
                    .unwrap_or(OperationType::Move),
                target: row.get(3)?,
                metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
                executed_at: row.get(5)?,
                compensated: row.get(6)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(records)
}

pub fn insert_correction(conn: &Connection, correction: &Correction) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO corrections (file_name, original_type, corrected_type, note, corrected_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            correction.file_name,
            correction.original_type.map(|t| t.label()),
            correction.corrected_type.label(),
            correction.note,
            correction.corrected_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_corrections(conn: &Connection, limit: u32) -> Result<Vec<Correction>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT file_name, original_type, corrected_type, note, corrected_at
         FROM corrections ORDER BY id DESC LIMIT ?1",
    )?;

    let corrections = stmt
        .query_map(params![limit], |row| {
            let original: Option<String> = row.get(1)?;
            let corrected: String = row.get(2)?;
            Ok(Correction {
                file_name: row.get(0)?,
                original_type: original.and_then(|t| t.parse().ok()),
                corrected_type: corrected.parse().unwrap_or_default(),
                note: row.get(3)?,
                corrected_at: row.get(4)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(corrections)
}

/// `(corrected type label, count)`, most frequent first.
pub fn correction_counts(conn: &Connection) -> Result<Vec<(String, i64)>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT corrected_type, COUNT(*) AS n FROM corrections
         GROUP BY corrected_type ORDER BY n DESC, corrected_type ASC",
    )?;
    let counts: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(counts)
}

trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::migrations::run_migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn sample_entry(file_name: &str, outcome: Outcome, document_type: DocumentType) -> AuditEntry {
        AuditEntry {
            run_id: "run-1".to_string(),
            file_name: file_name.to_string(),
            file_path: format!("/scans/{file_name}"),
            outcome,
            document_type: Some(document_type),
            confidence: Some(0.9),
            reason: Some("test".to_string()),
            case_id: None,
            client_name: Some("Jane Doe".to_string()),
            new_path: None,
            failure_kind: None,
            failure_detail: None,
            manual_intervention: false,
            processed_on: "2025-08-04".to_string(),
            recorded_at: "2025-08-04T09:00:00-07:00".to_string(),
        }
    }

    #[test]
    fn test_audit_round_trip() {
        let conn = setup_db();
        let entry = sample_entry("a.pdf", Outcome::Processed, DocumentType::ArAck);
        let id = insert_audit(&conn, &entry).unwrap();
        assert!(id > 0);

        let day = list_audit_for_day(&conn, "2025-08-04").unwrap();
        assert_eq!(day, vec![entry]);
        assert!(list_audit_for_day(&conn, "2025-08-05").unwrap().is_empty());
    }

    #[test]
    fn test_list_unknown_filters_and_orders() {
        let conn = setup_db();
        insert_audit(&conn, &sample_entry("a.pdf", Outcome::Ignored, DocumentType::Unknown)).unwrap();
        insert_audit(&conn, &sample_entry("b.pdf", Outcome::Renamed, DocumentType::RdDeny)).unwrap();
        let mut later = sample_entry("c.pdf", Outcome::Ignored, DocumentType::Unknown);
        later.processed_on = "2025-08-05".to_string();
        insert_audit(&conn, &later).unwrap();

        let all = list_unknown(&conn, None, 10).unwrap();
        let names: Vec<_> = all.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, vec!["c.pdf", "a.pdf"]);

        let one_day = list_unknown(&conn, Some("2025-08-04"), 10).unwrap();
        assert_eq!(one_day.len(), 1);
        assert_eq!(list_unknown(&conn, None, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_latest_audit_for_file() {
        let conn = setup_db();
        insert_audit(&conn, &sample_entry("a.pdf", Outcome::Failed, DocumentType::ArAck)).unwrap();
        insert_audit(&conn, &sample_entry("a.pdf", Outcome::Processed, DocumentType::ArAck)).unwrap();

        let latest = latest_audit_for_file(&conn, "a.pdf").unwrap().unwrap();
        assert_eq!(latest.outcome, Outcome::Processed);
        assert!(latest_audit_for_file(&conn, "missing.pdf").unwrap().is_none());
    }

    #[test]
    fn test_operation_log() {
        let conn = setup_db();
        let record = OperationRecord {
            operation_id: "op-1".to_string(),
            run_id: "run-9".to_string(),
            operation_type: OperationType::RecordUpdate,
            target: "rec123".to_string(),
            metadata: Some(serde_json::json!({"case_id": "50001234"})),
            executed_at: "2025-08-04T09:00:00Z".to_string(),
            compensated: false,
        };
        insert_operation(&conn, &record).unwrap();
        assert_eq!(mark_compensated(&conn, "op-1").unwrap(), 1);
        assert_eq!(mark_compensated(&conn, "op-404").unwrap(), 0);

        let ops = list_operations(&conn, "run-9").unwrap();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].compensated);
        assert_eq!(ops[0].metadata.as_ref().unwrap()["case_id"], "50001234");
    }

    #[test]
    fn test_corrections_are_appended_and_counted() {
        let conn = setup_db();
        for (file, corrected) in [
            ("a.pdf", DocumentType::RdDeny),
            ("b.pdf", DocumentType::RdDeny),
            ("c.pdf", DocumentType::ClaimAck),
        ] {
            insert_correction(
                &conn,
                &Correction {
                    file_name: file.to_string(),
                    original_type: Some(DocumentType::Unknown),
                    corrected_type: corrected,
                    note: None,
                    corrected_at: "2025-08-04T10:00:00Z".to_string(),
                },
            )
            .unwrap();
        }

        let counts = correction_counts(&conn).unwrap();
        assert_eq!(
            counts,
            vec![("RD Deny".to_string(), 2), ("Claim Ack".to_string(), 1)]
        );
        let recent = list_corrections(&conn, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].file_name, "c.pdf");
        assert_eq!(recent[0].original_type, Some(DocumentType::Unknown));
    }
}
