use serde::{Deserialize, Serialize};

use crate::models::document::{Condition, DocumentType};

/// Structured hints pulled from letter text independent of its type.
/// Every field is optional or possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedHints {
    pub case_id: Option<String>,
    pub amounts: Vec<String>,
    pub percentages: Vec<String>,
    pub doctors: Vec<String>,
    pub conditions: Vec<Condition>,
    pub is_increased: bool,
}

impl ExtractedHints {
    pub fn first_amount(&self) -> Option<&str> {
        self.amounts.first().map(String::as_str)
    }

    pub fn first_condition(&self) -> Option<Condition> {
        self.conditions.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub document_type: DocumentType,
    pub confidence: f64,
    pub hints: ExtractedHints,
    pub reason: String,
}

impl ClassificationResult {
    pub fn unknown(reason: &str) -> Self {
        Self {
            document_type: DocumentType::Unknown,
            confidence: 0.0,
            hints: ExtractedHints::default(),
            reason: reason.to_string(),
        }
    }

    pub fn new(
        document_type: DocumentType,
        confidence: f64,
        hints: ExtractedHints,
        reason: &str,
    ) -> Self {
        Self {
            document_type,
            confidence,
            hints,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub case_id: Option<String>,
    pub client_name: Option<String>,
}
