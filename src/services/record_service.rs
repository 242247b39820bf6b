use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::AirtableSettings;
use crate::error::{AppError, RecordStoreError};
use crate::models::record::{ClientRecord, HistoryPolicy, RecordUpdate};

const NAME_FIELD: &str = "Name";
const CASE_ID_FIELD: &str = "Case ID";
const LOG_FIELD: &str = "Log";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client records keyed by their "Last, First" name.
pub trait RecordStore: Send {
    /// Exact-name lookup. More than one hit is `RecordStoreError::Ambiguous`,
    /// never a silent pick.
    fn find_by_name(&self, formatted_name: &str) -> Result<Option<ClientRecord>, RecordStoreError>;

    fn update(&self, record_id: &str, update: &RecordUpdate) -> Result<(), RecordStoreError>;
}

pub struct AirtableClient {
    table_url: Url,
    token: String,
    client: reqwest::blocking::Client,
}

impl AirtableClient {
    pub fn new(settings: &AirtableSettings) -> Result<Self, AppError> {
        let mut table_url = Url::parse(settings.api_url.trim_end_matches('/'))
            .map_err(|e| AppError::Config(format!("invalid record store url: {e}")))?;
        table_url
            .path_segments_mut()
            .map_err(|_| AppError::Config("record store url cannot be a base".to_string()))?
            .extend([settings.base_id.as_str(), settings.table.as_str()]);

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            table_url,
            token: settings.token.clone(),
            client,
        })
    }

    fn record_url(&self, record_id: &str) -> Url {
        let mut url = self.table_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(record_id);
        }
        url
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<String, RecordStoreError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    RecordStoreError::Timeout {
                        seconds: REQUEST_TIMEOUT_SECS,
                    }
                } else {
                    RecordStoreError::from(e)
                }
            })?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(RecordStoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl RecordStore for AirtableClient {
    fn find_by_name(&self, formatted_name: &str) -> Result<Option<ClientRecord>, RecordStoreError> {
        let mut url = self.table_url.clone();
        url.query_pairs_mut()
            .append_pair("filterByFormula", &name_formula(formatted_name));

        let body = self.send(self.client.get(url))?;
        let records = parse_records(&body)?;
        debug!(name = formatted_name, hits = records.len(), "record lookup");
        single_match(formatted_name, records)
    }

    fn update(&self, record_id: &str, update: &RecordUpdate) -> Result<(), RecordStoreError> {
        let request = self
            .client
            .patch(self.record_url(record_id))
            .json(&update_body(update));
        self.send(request)?;
        info!(record_id, "record updated");
        Ok(())
    }
}

/// Formula for an exact match on the name field. Quotes and backslashes in
/// the name are escaped.
pub fn name_formula(formatted_name: &str) -> String {
    let escaped = formatted_name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("{{{NAME_FIELD}}} = '{escaped}'")
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<RawRecord>,
}

#[derive(Deserialize)]
struct RawRecord {
    id: String,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

fn field_text(fields: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_records(body: &str) -> Result<Vec<ClientRecord>, RecordStoreError> {
    let parsed: ListResponse =
        serde_json::from_str(body).map_err(|e| RecordStoreError::Malformed(e.to_string()))?;
    Ok(parsed
        .records
        .into_iter()
        .map(|raw| ClientRecord {
            name: field_text(&raw.fields, NAME_FIELD).unwrap_or_default(),
            case_id: field_text(&raw.fields, CASE_ID_FIELD),
            log: field_text(&raw.fields, LOG_FIELD),
            id: raw.id,
        })
        .collect())
}

pub fn single_match(
    formatted_name: &str,
    mut records: Vec<ClientRecord>,
) -> Result<Option<ClientRecord>, RecordStoreError> {
    match records.len() {
        0 => Ok(None),
        1 => Ok(records.pop()),
        count => Err(RecordStoreError::Ambiguous {
            name: formatted_name.to_string(),
            count,
        }),
    }
}

pub fn update_body(update: &RecordUpdate) -> serde_json::Value {
    let mut fields = serde_json::Map::new();
    if let Some(case_id) = &update.case_id {
        fields.insert(CASE_ID_FIELD.to_string(), case_id.clone().into());
    }
    if let Some(log) = &update.log {
        fields.insert(LOG_FIELD.to_string(), log.clone().into());
    }
    serde_json::json!({ "fields": fields })
}

/// The record found must carry exactly the name that was searched for.
pub fn names_match(formatted_name: &str, record: &ClientRecord) -> bool {
    !record.name.is_empty() && record.name == formatted_name
}

pub fn history_entry(date: NaiveDate) -> String {
    format!("Rcvd AR Ack. Filed Away. {} AI", date.format("%m.%d.%y"))
}

/// Writes for filing a new acknowledgment against `record`. The case-id
/// write is dropped when the record already holds that id; under
/// `SkipWhenUnchanged` the whole update is dropped and `None` returned.
pub fn plan_update(
    record: &ClientRecord,
    case_id: &str,
    policy: HistoryPolicy,
    date: NaiveDate,
) -> Option<RecordUpdate> {
    let unchanged = record.case_id.as_deref() == Some(case_id);
    if unchanged && policy == HistoryPolicy::SkipWhenUnchanged {
        return None;
    }

    let entry = history_entry(date);
    let log = match record.log.as_deref() {
        Some(existing) if !existing.is_empty() => format!("{existing}\n{entry}"),
        _ => entry,
    };

    Some(RecordUpdate {
        case_id: (!unchanged).then(|| case_id.to_string()),
        log: Some(log),
    })
}
