use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::data::repository;
use crate::error::RecordStoreError;
use crate::models::audit::AuditEntry;
use crate::models::classification::{ClassificationResult, ExtractedFields};
use crate::models::document::DocumentType;
use crate::models::operation::{OperationRecord, OperationType};
use crate::models::processing::{
    DailyStats, FailureReason, Outcome, ProcessReport, ProcessingState,
};
use crate::models::record::{ClientRecord, HistoryPolicy};
use crate::services::classification_service;
use crate::services::extraction_service;
use crate::services::file_service::{self, FileRelocator};
use crate::services::ocr_service::TextSource;
use crate::services::record_service::{self, RecordStore};
use crate::services::rename_service;
use crate::services::rollback_service::{self, Compensation, CompensationStack};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub clients_root: PathBuf,
    pub letters_subfolder: String,
    pub history_policy: HistoryPolicy,
    /// Fixes the date used in filenames and history entries. `None` means
    /// today.
    pub date_override: Option<NaiveDate>,
}

type StepResult = Result<Outcome, FailureReason>;

/// Takes one scanned letter from the scan folder to a terminal outcome.
pub struct Pipeline {
    text_source: Box<dyn TextSource>,
    records: Box<dyn RecordStore>,
    files: Box<dyn FileRelocator>,
    settings: PipelineSettings,
    audit_db: Option<Arc<Mutex<Connection>>>,
}

impl Pipeline {
    pub fn new(
        text_source: Box<dyn TextSource>,
        records: Box<dyn RecordStore>,
        files: Box<dyn FileRelocator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            text_source,
            records,
            files,
            settings,
            audit_db: None,
        }
    }

    /// Journal mutations and terminal outcomes into this database.
    pub fn with_audit_db(mut self, db: Arc<Mutex<Connection>>) -> Self {
        self.audit_db = Some(db);
        self
    }

    /// Process one file and count its outcome. Returns whether the file
    /// ended in a success state. Never panics and never returns an error.
    pub fn process_file(&self, path: &Path, stats: &mut DailyStats) -> bool {
        let report = self.process(path);
        stats.record(report.outcome, report.document_type);
        report.outcome.is_success()
    }

    pub fn process(&self, path: &Path) -> ProcessReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut report = ProcessReport::new(&run_id, path.to_path_buf());
        let file_name = report.file_name();

        if rename_service::is_final_form(&file_name) {
            debug!(file = %file_name, "already in final form, skipping");
            report.outcome = Outcome::AlreadyProcessed;
            return report;
        }

        info!(run_id = %run_id, file = %file_name, "processing file");

        let mut stack = CompensationStack::new(&run_id);
        let mut state = ProcessingState::new(path.to_path_buf());
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_steps(&mut report, &mut state, &mut stack)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!(run_id = %run_id, file = %file_name, "panic while processing: {message}");
            Err(FailureReason::Unexpected { message })
        });

        match result {
            Ok(outcome) => {
                stack.commit();
                report.outcome = outcome;
                report.new_path = state.new_path;
            }
            Err(failure) => {
                if !stack.is_empty() {
                    warn!(
                        run_id = %run_id,
                        record_updated = state.record_updated,
                        file_moved = state.file_moved,
                        file_renamed = state.file_renamed,
                        "rolling back {} operation(s)",
                        stack.len()
                    );
                    let rollback = stack.rollback(self.files.as_ref());
                    report.manual_intervention = rollback.needs_manual_intervention();
                    self.with_db(|conn| rollback_service::mark_compensated(conn, &rollback));
                }
                report.outcome = Outcome::Failed;
                report.failure = Some(failure);
            }
        }

        self.log_outcome(&report);
        self.with_db(|conn| {
            repository::insert_audit(conn, &AuditEntry::from_report(&report, Local::now()))
                .map(|_| ())
        });
        report
    }

    fn run_steps(
        &self,
        report: &mut ProcessReport,
        state: &mut ProcessingState,
        stack: &mut CompensationStack,
    ) -> StepResult {
        let path = state.original_path.clone();

        let text = match self.text_source.extract_text(&path) {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => return Err(FailureReason::NoText),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "text extraction failed");
                return Err(FailureReason::NoText);
            }
        };

        let classification = classification_service::classify(&text);
        report.document_type = Some(classification.document_type);
        report.confidence = Some(classification.confidence);
        report.classification_reason = Some(classification.reason.clone());
        debug!(
            document_type = %classification.document_type,
            confidence = classification.confidence,
            reason = %classification.reason,
            "classified"
        );

        if classification.document_type == DocumentType::Unknown {
            return Ok(Outcome::Ignored);
        }

        let fields = extraction_service::extract_for_type(&text, classification.document_type);
        report.fields = fields.clone();
        let (case_id, client_name) = (fields.case_id.as_deref(), fields.client_name.as_deref());
        if !extraction_service::validate_for_type(case_id, client_name, classification.document_type)
        {
            let missing =
                extraction_service::missing_fields(case_id, client_name, classification.document_type);
            return Err(FailureReason::MissingFields {
                fields: missing.into_iter().map(String::from).collect(),
            });
        }

        if classification.document_type.is_primary() {
            self.file_primary(&classification, &fields, state, stack)
        } else {
            self.rename_in_place(&classification, &fields, state, stack)
        }
    }

    // -----------------------------------------------------------------------
    // Primary type: update the client record, then file the letter
    // -----------------------------------------------------------------------

    fn file_primary(
        &self,
        classification: &ClassificationResult,
        fields: &ExtractedFields,
        state: &mut ProcessingState,
        stack: &mut CompensationStack,
    ) -> StepResult {
        let client_name = fields.client_name.as_deref().unwrap_or_default();
        let case_id = fields.case_id.as_deref().unwrap_or_default();

        let formatted = extraction_service::format_for_matching(client_name).ok_or_else(|| {
            FailureReason::NameFormat {
                name: client_name.to_string(),
            }
        })?;

        // Pre-validation. Nothing below this block runs unless every check
        // passes, so a failure here leaves no trace.
        let record = self.lookup_client(&formatted)?;
        state.record_id = Some(record.id.clone());

        let folder = file_service::client_folder(
            &self.settings.clients_root,
            &formatted,
            &self.settings.letters_subfolder,
        )
        .map_err(|_| FailureReason::NameFormat {
            name: formatted.clone(),
        })?;
        if !self.files.folder_exists(&folder) {
            return Err(FailureReason::DestinationMissing { folder });
        }

        let file_name =
            rename_service::generate_filename(classification, Some(client_name), Some(self.today()));
        let destination = folder.join(&file_name);
        if self.files.file_exists(&destination) {
            return Err(FailureReason::NameCollision { path: destination });
        }

        // Execution.
        match record_service::plan_update(&record, case_id, self.settings.history_policy, self.today())
        {
            Some(update) if !update.is_empty() => {
                if let Err(e) = self.records.update(&record.id, &update) {
                    if e.outcome_unknown() {
                        // The write may have landed; rollback must flag it.
                        let op = stack.push(
                            OperationType::RecordUpdate,
                            &record.id,
                            serde_json::to_value(&update).ok(),
                            Compensation::Irreversible {
                                target: record.id.clone(),
                                description: format!(
                                    "update of record {} for {formatted} timed out and may have been applied",
                                    record.id
                                ),
                            },
                        );
                        self.journal(&op);
                    }
                    return Err(FailureReason::RecordUpdate {
                        message: e.to_string(),
                    });
                }
                state.record_updated = true;
                info!(record_id = %record.id, case_id = %case_id, "client record updated");
                let op = stack.push(
                    OperationType::RecordUpdate,
                    &record.id,
                    serde_json::to_value(&update).ok(),
                    Compensation::Irreversible {
                        target: record.id.clone(),
                        description: format!(
                            "record {} for {formatted} was updated but the letter was not filed",
                            record.id
                        ),
                    },
                );
                self.journal(&op);
            }
            _ => info!(record_id = %record.id, "client record already current, no update sent"),
        }

        self.files
            .move_file(&state.original_path, &destination)
            .map_err(|e| FailureReason::FileMove {
                message: e.to_string(),
            })?;
        state.file_moved = true;
        state.new_path = Some(destination.clone());
        let op = stack.push(
            OperationType::Move,
            &state.original_path.to_string_lossy(),
            Some(serde_json::json!({ "destination": destination.to_string_lossy() })),
            Compensation::RestoreFile {
                current: destination,
                original: state.original_path.clone(),
            },
        );
        self.journal(&op);

        Ok(Outcome::Processed)
    }

    fn lookup_client(&self, formatted: &str) -> Result<ClientRecord, FailureReason> {
        let record = match self.records.find_by_name(formatted) {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(FailureReason::ClientNotFound {
                    name: formatted.to_string(),
                })
            }
            Err(RecordStoreError::Ambiguous { name, count }) => {
                return Err(FailureReason::AmbiguousClient { name, count })
            }
            Err(e) => {
                return Err(FailureReason::RecordLookup {
                    message: e.to_string(),
                })
            }
        };
        if !record_service::names_match(formatted, &record) {
            return Err(FailureReason::ClientNameMismatch {
                expected: formatted.to_string(),
                found: record.name,
            });
        }
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Every other known type: rename next to the original
    // -----------------------------------------------------------------------

    fn rename_in_place(
        &self,
        classification: &ClassificationResult,
        fields: &ExtractedFields,
        state: &mut ProcessingState,
        stack: &mut CompensationStack,
    ) -> StepResult {
        let file_name = rename_service::generate_filename(
            classification,
            fields.client_name.as_deref(),
            Some(self.today()),
        );
        let target = file_service::sibling_path(&state.original_path, &file_name);
        if self.files.file_exists(&target) {
            return Err(FailureReason::NameCollision { path: target });
        }

        self.files
            .move_file(&state.original_path, &target)
            .map_err(|e| FailureReason::FileRename {
                message: e.to_string(),
            })?;
        state.file_renamed = true;
        state.new_path = Some(target.clone());
        let op = stack.push(
            OperationType::Rename,
            &state.original_path.to_string_lossy(),
            Some(serde_json::json!({ "new_name": file_name })),
            Compensation::RestoreFile {
                current: target,
                original: state.original_path.clone(),
            },
        );
        self.journal(&op);

        Ok(Outcome::Renamed)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn today(&self) -> NaiveDate {
        self.settings
            .date_override
            .unwrap_or_else(|| Local::now().date_naive())
    }

    fn journal(&self, op: &OperationRecord) {
        self.with_db(|conn| rollback_service::record_operation(conn, op));
    }

    /// Audit writes never change a file's outcome; failures are logged.
    fn with_db<F>(&self, f: F)
    where
        F: FnOnce(&Connection) -> Result<(), crate::error::AppError>,
    {
        let Some(db) = &self.audit_db else {
            return;
        };
        match db.lock() {
            Ok(conn) => {
                if let Err(e) = f(&conn) {
                    warn!(error = %e, "audit write failed");
                }
            }
            Err(_) => warn!("audit database lock poisoned"),
        }
    }

    fn log_outcome(&self, report: &ProcessReport) {
        let file = report.file_name();
        let document_type = report
            .document_type
            .map(|t| t.label())
            .unwrap_or("-");
        match (&report.outcome, &report.failure) {
            (Outcome::Failed, Some(failure)) if report.manual_intervention => error!(
                run_id = %report.run_id,
                file = %file,
                document_type,
                failure = failure.kind(),
                "manual intervention required: {failure}"
            ),
            (Outcome::Failed, Some(failure)) => error!(
                run_id = %report.run_id,
                file = %file,
                document_type,
                failure = failure.kind(),
                "{failure}"
            ),
            (outcome, _) => info!(
                run_id = %report.run_id,
                file = %file,
                document_type,
                outcome = outcome.as_str(),
                new_path = ?report.new_path,
                "file done"
            ),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
