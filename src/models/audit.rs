use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::models::document::DocumentType;
use crate::models::processing::{Outcome, ProcessReport};

/// One row of `audit_log`: the terminal outcome of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub run_id: String,
    pub file_name: String,
    pub file_path: String,
    pub outcome: Outcome,
    pub document_type: Option<DocumentType>,
    pub confidence: Option<f64>,
    pub reason: Option<String>,
    pub case_id: Option<String>,
    pub client_name: Option<String>,
    pub new_path: Option<String>,
    pub failure_kind: Option<String>,
    pub failure_detail: Option<String>,
    pub manual_intervention: bool,
    /// Local calendar day, `YYYY-MM-DD`.
    pub processed_on: String,
    pub recorded_at: String,
}

impl AuditEntry {
    pub fn from_report(report: &ProcessReport, at: DateTime<Local>) -> Self {
        Self {
            run_id: report.run_id.clone(),
            file_name: report.file_name(),
            file_path: report.file_path.to_string_lossy().to_string(),
            outcome: report.outcome,
            document_type: report.document_type,
            confidence: report.confidence,
            reason: report.classification_reason.clone(),
            case_id: report.fields.case_id.clone(),
            client_name: report.fields.client_name.clone(),
            new_path: report
                .new_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            failure_kind: report.failure.as_ref().map(|f| f.kind().to_string()),
            failure_detail: report.failure.as_ref().map(|f| f.to_string()),
            manual_intervention: report.manual_intervention,
            processed_on: at.date_naive().format("%Y-%m-%d").to_string(),
            recorded_at: at.to_rfc3339(),
        }
    }
}

/// A manual reclassification. Stored append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub file_name: String,
    pub original_type: Option<DocumentType>,
    pub corrected_type: DocumentType,
    pub note: Option<String>,
    pub corrected_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::processing::FailureReason;
    use chrono::TimeZone;
    use std::path::PathBuf;

    #[test]
    fn entry_copies_report_fields() {
        let mut report = ProcessReport::new("run-1", PathBuf::from("/scans/scan 01.pdf"));
        report.outcome = Outcome::Failed;
        report.document_type = Some(DocumentType::ArAck);
        report.failure = Some(FailureReason::ClientNotFound {
            name: "Doe, Jane".into(),
        });
        let at = Local.with_ymd_and_hms(2025, 8, 4, 9, 30, 0).unwrap();

        let entry = AuditEntry::from_report(&report, at);
        assert_eq!(entry.file_name, "scan 01.pdf");
        assert_eq!(entry.processed_on, "2025-08-04");
        assert_eq!(entry.failure_kind.as_deref(), Some("client_not_found"));
        assert!(!entry.manual_intervention);
    }
}
