use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::classification::ExtractedFields;
use crate::models::document::DocumentType;

/// Transient per-file state. Lives for one `process` call only.
#[derive(Debug, Clone, Default)]
pub struct ProcessingState {
    pub original_path: PathBuf,
    pub record_id: Option<String>,
    pub record_updated: bool,
    pub file_moved: bool,
    pub file_renamed: bool,
    pub new_path: Option<PathBuf>,
}

impl ProcessingState {
    pub fn new(original_path: PathBuf) -> Self {
        Self {
            original_path,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Filename already in final form; nothing was touched.
    AlreadyProcessed,
    Ignored,
    Processed,
    Renamed,
    Failed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyProcessed => "already_processed",
            Self::Ignored => "ignored",
            Self::Processed => "processed",
            Self::Renamed => "renamed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "already_processed" => Some(Self::AlreadyProcessed),
            "ignored" => Some(Self::Ignored),
            "processed" => Some(Self::Processed),
            "renamed" => Some(Self::Renamed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        self != Self::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    NoText,
    MissingFields { fields: Vec<String> },
    NameFormat { name: String },
    ClientNotFound { name: String },
    AmbiguousClient { name: String, count: usize },
    ClientNameMismatch { expected: String, found: String },
    DestinationMissing { folder: PathBuf },
    NameCollision { path: PathBuf },
    RecordLookup { message: String },
    RecordUpdate { message: String },
    FileMove { message: String },
    FileRename { message: String },
    Unexpected { message: String },
}

impl FailureReason {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoText => "no_text",
            Self::MissingFields { .. } => "missing_fields",
            Self::NameFormat { .. } => "name_format",
            Self::ClientNotFound { .. } => "client_not_found",
            Self::AmbiguousClient { .. } => "ambiguous_client",
            Self::ClientNameMismatch { .. } => "client_name_mismatch",
            Self::DestinationMissing { .. } => "destination_missing",
            Self::NameCollision { .. } => "name_collision",
            Self::RecordLookup { .. } => "record_lookup",
            Self::RecordUpdate { .. } => "record_update",
            Self::FileMove { .. } => "file_move",
            Self::FileRename { .. } => "file_rename",
            Self::Unexpected { .. } => "unexpected",
        }
    }

    /// Failures caught before any mutation was attempted.
    pub fn is_pre_validation(&self) -> bool {
        matches!(
            self,
            Self::ClientNotFound { .. }
                | Self::AmbiguousClient { .. }
                | Self::ClientNameMismatch { .. }
                | Self::DestinationMissing { .. }
                | Self::NameCollision { .. }
                | Self::RecordLookup { .. }
        )
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoText => write!(f, "no text could be extracted"),
            Self::MissingFields { fields } => {
                write!(f, "missing required fields: {}", fields.join(", "))
            }
            Self::NameFormat { name } => {
                write!(f, "cannot format client name for matching: {name}")
            }
            Self::ClientNotFound { name } => write!(f, "client not found in record store: {name}"),
            Self::AmbiguousClient { name, count } => {
                write!(f, "{count} client records match {name}")
            }
            Self::ClientNameMismatch { expected, found } => {
                write!(f, "client name mismatch: expected '{expected}', record has '{found}'")
            }
            Self::DestinationMissing { folder } => {
                write!(f, "destination folder does not exist: {}", folder.display())
            }
            Self::NameCollision { path } => {
                write!(f, "file already exists at destination: {}", path.display())
            }
            Self::RecordLookup { message } => write!(f, "record lookup failed: {message}"),
            Self::RecordUpdate { message } => write!(f, "record update failed: {message}"),
            Self::FileMove { message } => write!(f, "file move failed: {message}"),
            Self::FileRename { message } => write!(f, "file rename failed: {message}"),
            Self::Unexpected { message } => write!(f, "unexpected error: {message}"),
        }
    }
}

/// Everything known about one file once it reaches a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub run_id: String,
    pub file_path: PathBuf,
    pub outcome: Outcome,
    pub document_type: Option<DocumentType>,
    pub confidence: Option<f64>,
    pub classification_reason: Option<String>,
    pub fields: ExtractedFields,
    pub new_path: Option<PathBuf>,
    pub failure: Option<FailureReason>,
    pub manual_intervention: bool,
}

impl ProcessReport {
    pub fn new(run_id: &str, file_path: PathBuf) -> Self {
        Self {
            run_id: run_id.to_string(),
            file_path,
            outcome: Outcome::Failed,
            document_type: None,
            confidence: None,
            classification_reason: None,
            fields: ExtractedFields::default(),
            new_path: None,
            failure: None,
            manual_intervention: false,
        }
    }

    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_path.to_string_lossy().to_string())
    }
}

/// Counters for one day of processing. Owned by whoever drives the
/// pipeline and passed in by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total: u32,
    pub processed: u32,
    pub renamed: u32,
    pub ignored: u32,
    pub failed: u32,
    pub by_type: BTreeMap<DocumentType, u32>,
}

impl DailyStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total: 0,
            processed: 0,
            renamed: 0,
            ignored: 0,
            failed: 0,
            by_type: BTreeMap::new(),
        }
    }

    /// Counts one terminal outcome. `AlreadyProcessed` is not terminal for
    /// stats purposes and leaves every counter alone.
    pub fn record(&mut self, outcome: Outcome, document_type: Option<DocumentType>) {
        let bucket = match outcome {
            Outcome::AlreadyProcessed => return,
            Outcome::Ignored => &mut self.ignored,
            Outcome::Processed => &mut self.processed,
            Outcome::Renamed => &mut self.renamed,
            Outcome::Failed => &mut self.failed,
        };
        *bucket += 1;
        self.total += 1;
        if let Some(t) = document_type {
            *self.by_type.entry(t).or_insert(0) += 1;
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.total == self.processed + self.renamed + self.ignored + self.failed
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{}: {} scanned, {} processed, {} renamed, {} ignored, {} failed",
            self.date, self.total, self.processed, self.renamed, self.ignored, self.failed
        )
    }
}
