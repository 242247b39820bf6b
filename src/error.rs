use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    General(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Errors from the client record store. `Ambiguous` is kept apart from a
/// plain miss so callers never have to guess which record was meant.
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("{count} records match '{name}'")]
    Ambiguous { name: String, count: usize },

    #[error("record store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("record store transport error: {0}")]
    Transport(String),

    #[error("record store request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("malformed record store response: {0}")]
    Malformed(String),
}

impl RecordStoreError {
    /// The request may have reached the store before the client gave up, so
    /// a write may or may not have been applied.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<reqwest::Error> for RecordStoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
