use serde::{Deserialize, Serialize};

/// A client row in the record store, reduced to the fields the pipeline
/// reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    pub case_id: Option<String>,
    pub log: Option<String>,
}

/// Field writes for one record. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub case_id: Option<String>,
    pub log: Option<String>,
}

impl RecordUpdate {
    pub fn is_empty(&self) -> bool {
        self.case_id.is_none() && self.log.is_none()
    }
}

/// Whether the history field is still appended when the case id on the
/// record already matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    #[default]
    AlwaysAppend,
    SkipWhenUnchanged,
}

impl HistoryPolicy {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim() {
            "always_append" => Ok(Self::AlwaysAppend),
            "skip_when_unchanged" => Ok(Self::SkipWhenUnchanged),
            other => Err(format!(
                "invalid history policy '{other}' (expected: always_append|skip_when_unchanged)"
            )),
        }
    }
}
