use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::classification::ExtractedFields;
use crate::models::document::DocumentType;

static CASE_ID_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Case ID Number|CASE ID|Case ID):\s*(\S+)").expect("valid regex")
});
static CLIENT_NAME_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Employee Name|EMPLOYEE):\s*([^\n\r]+)").expect("valid regex")
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Where the name label runs into letterhead or an address block. The
/// earliest hit in the text truncates.
static STOP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bTYLER\b",
        r"(?i)\bBAILEY\b",
        r"(?i)\bSOUTHWEST\b",
        r"(?i)\bNUCLEAR\b",
        r"(?i)\bADVOCATES\b",
        r"(?i)\b\d{2,5}\s+[A-Z]",
        r"(?i)\b[A-Z]{2}\s+\d{5}\b",
        r"(?i)\b\d{5}$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static CORPORATE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:LLC|INC|CORP|LTD)\.?$").expect("valid regex"));

pub const CASE_ID_FIELD: &str = "case_id";
pub const CLIENT_NAME_FIELD: &str = "client_name";

/// Case id after its label. A token that is not entirely digits is treated
/// as absent.
pub fn extract_case_id(text: &str) -> Option<String> {
    let captured = CASE_ID_LABEL.captures(text)?.get(1)?.as_str();
    let token = captured.trim_end_matches(['.', ',', ';', ':']);
    if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        Some(token.to_string())
    } else {
        debug!(token, "case id label found but value is not numeric");
        None
    }
}

pub fn extract_client_name(text: &str) -> Option<String> {
    let raw = CLIENT_NAME_LABEL.captures(text)?.get(1)?.as_str();
    let cleaned = clean_client_name(raw);
    if cleaned.is_none() {
        debug!(raw, "client name label found but value is not a full name");
    }
    cleaned
}

/// Trim a raw label capture down to a "First [Middle] Last" name, or `None`
/// when fewer than two tokens survive.
pub fn clean_client_name(raw: &str) -> Option<String> {
    let mut name = WHITESPACE.replace_all(raw.trim(), " ").to_string();

    let cut = STOP_PATTERNS
        .iter()
        .filter_map(|re| re.find(&name))
        .map(|hit| hit.start())
        .min();
    if let Some(cut) = cut {
        name = name[..cut].trim().to_string();
    }
    let name = CORPORATE_SUFFIX.replace(&name, "").trim().to_string();

    (name.split_whitespace().count() >= 2).then_some(name)
}

pub fn extract_for_type(text: &str, _document_type: DocumentType) -> ExtractedFields {
    ExtractedFields {
        case_id: extract_case_id(text),
        client_name: extract_client_name(text),
    }
}

/// The primary type needs both fields. Every other known type only needs
/// the client name. `Unknown` never validates.
pub fn validate_for_type(
    case_id: Option<&str>,
    client_name: Option<&str>,
    document_type: DocumentType,
) -> bool {
    missing_fields(case_id, client_name, document_type).is_empty() && document_type.is_known()
}

pub fn missing_fields(
    case_id: Option<&str>,
    client_name: Option<&str>,
    document_type: DocumentType,
) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if document_type.is_primary() && case_id.is_none_or(str::is_empty) {
        missing.push(CASE_ID_FIELD);
    }
    if client_name.is_none_or(|n| n.trim().is_empty()) {
        missing.push(CLIENT_NAME_FIELD);
    }
    missing
}

/// "First [Middle] Last" to "Last, First [Middle]" as stored in the record
/// store. A single token cannot be reformatted.
pub fn format_for_matching(client_name: &str) -> Option<String> {
    let parts: Vec<&str> = client_name.split_whitespace().collect();
    match parts.as_slice() {
        [] | [_] => None,
        [given @ .., last] => Some(format!("{last}, {}", given.join(" "))),
    }
}
