use std::fmt::Write;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::data::repository;
use crate::error::AppError;
use crate::models::audit::AuditEntry;
use crate::models::processing::{DailyStats, Outcome};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| AppError::General(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

/// Rebuild one day's counters from the audit log.
pub fn daily_stats(conn: &Connection, date: NaiveDate) -> Result<(DailyStats, Vec<AuditEntry>), AppError> {
    let entries = repository::list_audit_for_day(conn, &date.format(DATE_FORMAT).to_string())?;
    let mut stats = DailyStats::new(date);
    for entry in &entries {
        stats.record(entry.outcome, entry.document_type);
    }
    Ok((stats, entries))
}

pub fn format_daily_report(stats: &DailyStats, entries: &[AuditEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", stats.summary_line());

    if !stats.by_type.is_empty() {
        let _ = writeln!(out, "\nBy type:");
        for (document_type, count) in &stats.by_type {
            let _ = writeln!(out, "  {:<28} {count}", document_type.label());
        }
    }

    let failures: Vec<&AuditEntry> = entries
        .iter()
        .filter(|e| e.outcome == Outcome::Failed)
        .collect();
    if !failures.is_empty() {
        let _ = writeln!(out, "\nFailures:");
        for entry in failures {
            let flag = if entry.manual_intervention {
                " [MANUAL INTERVENTION]"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "  {}: {}{flag}",
                entry.file_name,
                entry.failure_detail.as_deref().unwrap_or("unknown failure")
            );
        }
    }

    out
}

pub fn unknown_documents(
    conn: &Connection,
    date: Option<NaiveDate>,
    limit: u32,
) -> Result<Vec<AuditEntry>, AppError> {
    let day = date.map(|d| d.format(DATE_FORMAT).to_string());
    repository::list_unknown(conn, day.as_deref(), limit)
}

pub fn format_unknown(entries: &[AuditEntry]) -> String {
    if entries.is_empty() {
        return "No unknown documents.\n".to_string();
    }
    let mut out = format!("{} unknown document(s):\n", entries.len());
    for entry in entries {
        let _ = writeln!(out, "  {}  {}", entry.processed_on, entry.file_name);
        let _ = writeln!(out, "      {}", entry.file_path);
    }
    out
}
