use std::fmt::Write;

use chrono::Local;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use rusqlite::Connection;
use tracing::info;

use crate::data::repository;
use crate::error::AppError;
use crate::models::audit::Correction;
use crate::models::document::DocumentType;

/// Exact label first (case-insensitive), then the best fuzzy match.
/// A tie between the two best candidates is rejected.
pub fn resolve_type(input: &str) -> Result<DocumentType, AppError> {
    if let Ok(exact) = input.parse::<DocumentType>() {
        return Ok(exact);
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    let mut scored: Vec<(i64, DocumentType)> = DocumentType::ALL
        .iter()
        .filter_map(|t| matcher.fuzzy_match(t.label(), input.trim()).map(|s| (s, *t)))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    match scored.as_slice() {
        [] => Err(AppError::General(format!("no document type matches '{input}'"))),
        [(best, _), (second, _), ..] if best == second => {
            let tied: Vec<&str> = scored
                .iter()
                .take_while(|(s, _)| s == best)
                .map(|(_, t)| t.label())
                .collect();
            Err(AppError::General(format!(
                "'{input}' is ambiguous: {}",
                tied.join(", ")
            )))
        }
        [(_, best), ..] => Ok(*best),
    }
}

/// Append a correction. The original type is taken from the latest audit
/// row for that file name, if there is one.
pub fn record_correction(
    conn: &Connection,
    file_name: &str,
    type_input: &str,
    note: Option<&str>,
) -> Result<Correction, AppError> {
    let corrected_type = resolve_type(type_input)?;
    let original_type = repository::latest_audit_for_file(conn, file_name)?
        .and_then(|entry| entry.document_type);

    let correction = Correction {
        file_name: file_name.to_string(),
        original_type,
        corrected_type,
        note: note.map(String::from),
        corrected_at: Local::now().to_rfc3339(),
    };
    repository::insert_correction(conn, &correction)?;
    info!(
        file = %file_name,
        from = original_type.map(|t| t.label()).unwrap_or("-"),
        to = corrected_type.label(),
        "correction recorded"
    );
    Ok(correction)
}

pub fn format_corrections(counts: &[(String, i64)], recent: &[Correction]) -> String {
    if recent.is_empty() && counts.is_empty() {
        return "No corrections recorded.\n".to_string();
    }

    let mut out = String::from("Corrections by type:\n");
    for (label, count) in counts {
        let _ = writeln!(out, "  {label:<28} {count}");
    }
    let _ = writeln!(out, "\nRecent:");
    for c in recent {
        let from = c.original_type.map(|t| t.label()).unwrap_or("-");
        let _ = write!(out, "  {}  {}: {from} -> {}", c.corrected_at, c.file_name, c.corrected_type);
        if let Some(note) = &c.note {
            let _ = write!(out, " ({note})");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::migrations;
    use crate::models::audit::AuditEntry;
    use crate::models::processing::Outcome;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_resolve_exact_label() {
        assert_eq!(resolve_type("ar ack").unwrap(), DocumentType::ArAck);
        assert_eq!(resolve_type("FD Accept CQ").unwrap(), DocumentType::FdAcceptCq);
    }

    #[test]
    fn test_resolve_fuzzy_label() {
        assert_eq!(resolve_type("niosh").unwrap(), DocumentType::NioshWaiver);
        assert_eq!(resolve_type("remand").unwrap(), DocumentType::RemandOrder);
    }

    #[test]
    fn test_resolve_rejects_nonsense() {
        assert!(resolve_type("zzzzqqq").is_err());
    }

    #[test]
    fn test_correction_picks_up_original_type() {
        let conn = test_conn();
        repository::insert_audit(
            &conn,
            &AuditEntry {
                run_id: "run-1".into(),
                file_name: "scan_07.pdf".into(),
                file_path: "/scans/scan_07.pdf".into(),
                outcome: Outcome::Ignored,
                document_type: Some(DocumentType::Unknown),
                confidence: Some(0.0),
                reason: Some("no matching patterns found".into()),
                case_id: None,
                client_name: None,
                new_path: None,
                failure_kind: None,
                failure_detail: None,
                manual_intervention: false,
                processed_on: "2025-08-04".into(),
                recorded_at: "2025-08-04T09:00:00+00:00".into(),
            },
        )
        .unwrap();

        let correction =
            record_correction(&conn, "scan_07.pdf", "IR Ack", Some("faint scan")).unwrap();
        assert_eq!(correction.original_type, Some(DocumentType::Unknown));
        assert_eq!(correction.corrected_type, DocumentType::IrAck);

        let orphan = record_correction(&conn, "never_seen.pdf", "WL", None).unwrap();
        assert_eq!(orphan.original_type, None);

        let counts = repository::correction_counts(&conn).unwrap();
        assert_eq!(counts.len(), 2);
        let recent = repository::list_corrections(&conn, 10).unwrap();
        let text = format_corrections(&counts, &recent);
        assert!(text.contains("scan_07.pdf: Unknown -> IR Ack (faint scan)"));
        assert!(text.contains("never_seen.pdf: - -> WL"));
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_corrections(&[], &[]), "No corrections recorded.\n");
    }
}
